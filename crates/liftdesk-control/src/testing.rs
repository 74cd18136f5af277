//! Scripted hardware for controller tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use liftdesk_frame::{ActuatorWriter, FieldWidths, SensorReader};
use liftdesk_transport::{ByteChannel, Result, TransportError};

use crate::leg::{LegController, LegSpec, MotionConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Read { sensor: String, distance: u16 },
    Write(String),
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn writes(log: &EventLog) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|event| match event {
            Event::Write(frame) => Some(frame.clone()),
            Event::Read { .. } => None,
        })
        .collect()
}

pub fn reads(log: &EventLog, sensor: &str) -> Vec<u16> {
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|event| match event {
            Event::Read { sensor: name, distance } if name == sensor => Some(*distance),
            _ => None,
        })
        .collect()
}

/// Sensor that delivers one scripted reading per frame, then goes quiet.
pub struct ScriptedSensor {
    name: String,
    readings: Arc<Mutex<VecDeque<u16>>>,
    rx: Vec<u8>,
    log: EventLog,
    open: bool,
    fail: bool,
}

impl ScriptedSensor {
    pub fn new(name: &str, readings: &[u16], log: &EventLog) -> Self {
        Self {
            name: name.to_string(),
            readings: Arc::new(Mutex::new(readings.iter().copied().collect())),
            rx: Vec::new(),
            log: Arc::clone(log),
            open: false,
            fail: false,
        }
    }

    /// A sensor whose port errors on every poll.
    pub fn failing(name: &str, log: &EventLog) -> Self {
        let mut sensor = Self::new(name, &[], log);
        sensor.fail = true;
        sensor
    }

    /// Handle to the readings not consumed yet.
    pub fn remaining(&self) -> Arc<Mutex<VecDeque<u16>>> {
        Arc::clone(&self.readings)
    }
}

impl ByteChannel for ScriptedSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn bytes_waiting(&mut self) -> Result<usize> {
        if self.fail {
            return Err(TransportError::Io(std::io::Error::other("sensor unplugged")));
        }
        if self.rx.is_empty() {
            if let Some(distance) = self.readings.lock().unwrap().pop_front() {
                let [lo, hi] = distance.to_le_bytes();
                self.rx = vec![0x59, 0x59, lo, hi, 0x20, 0x00, 0x40, 0x07, 0x00];
            }
        }
        Ok(self.rx.len())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        buf.copy_from_slice(&self.rx[..buf.len()]);
        self.log.lock().unwrap().push(Event::Read {
            sensor: self.name.clone(),
            distance: u16::from_le_bytes([self.rx[2], self.rx[3]]),
        });
        self.rx.drain(..buf.len());
        Ok(())
    }

    fn clear_input(&mut self) -> Result<()> {
        self.rx.clear();
        Ok(())
    }

    fn write_all(&mut self, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Actuator board that records every frame into the shared event log.
pub struct RecordingActuator {
    log: EventLog,
    open: bool,
}

impl RecordingActuator {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: Arc::clone(log),
            open: true,
        }
    }
}

impl ByteChannel for RecordingActuator {
    fn name(&self) -> &str {
        "actuator"
    }

    fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn bytes_waiting(&mut self) -> Result<usize> {
        Ok(0)
    }

    fn read_exact(&mut self, _buf: &mut [u8]) -> Result<()> {
        Ok(())
    }

    fn clear_input(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.open {
            return Err(TransportError::Closed("actuator".to_string()));
        }
        self.log
            .lock()
            .unwrap()
            .push(Event::Write(String::from_utf8_lossy(bytes).into_owned()));
        Ok(())
    }
}

pub fn fast_motion() -> MotionConfig {
    MotionConfig {
        poll_interval: Duration::from_millis(1),
        max_travel: Duration::from_millis(20),
        max_move: None,
    }
}

pub fn actuator(log: &EventLog) -> Arc<ActuatorWriter<RecordingActuator>> {
    Arc::new(ActuatorWriter::new(
        RecordingActuator::new(log),
        FieldWidths::new(2, 2).unwrap(),
    ))
}

pub fn leg(
    name: &str,
    identifier: u16,
    sensor: ScriptedSensor,
    actuator: &Arc<ActuatorWriter<RecordingActuator>>,
    motion: MotionConfig,
) -> LegController<ScriptedSensor, RecordingActuator> {
    LegController::new(
        LegSpec::new(name, identifier),
        SensorReader::new(sensor),
        Arc::clone(actuator),
        motion,
    )
}
