use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use liftdesk_frame::{ActuatorWriter, Direction, FrameError, SensorReader};
use liftdesk_transport::ByteChannel;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::error::{DeskError, Result};

/// Where a leg is in its move cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LegState {
    Idle,
    Moving,
    Settled,
    /// The bounded convergence wait expired or the leg's I/O failed mid-move.
    Faulted,
}

/// Identity of one leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegSpec {
    /// Human-readable name used in logs, e.g. `right`.
    pub name: String,
    /// Identifier the actuator board uses for this leg.
    pub identifier: u16,
}

impl LegSpec {
    pub fn new(name: impl Into<String>, identifier: u16) -> Self {
        Self {
            name: name.into(),
            identifier,
        }
    }
}

/// Timing for leg and desk moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionConfig {
    /// Pause between sensor polls while a leg is moving.
    pub poll_interval: Duration,
    /// How long an open-loop full travel runs before stopping.
    pub max_travel: Duration,
    /// Upper bound on a sensor-gated move. `None` waits forever.
    pub max_move: Option<Duration>,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            max_travel: Duration::from_secs(120),
            max_move: None,
        }
    }
}

/// Completion record of one leg move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegReport {
    pub leg: String,
    pub identifier: u16,
    pub target: u32,
    /// Sensor reading that ended the move.
    pub reading: u16,
}

impl fmt::Display for LegReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Leg {} ({}) set to {}. Sensor reading: {}",
            self.leg, self.identifier, self.target, self.reading
        )
    }
}

/// Direction a leg has to travel to reach `target` from `reading`.
///
/// A leg at or above its target goes down, anything below goes up.
pub fn required_direction(target: u32, reading: u16) -> Direction {
    if target <= u32::from(reading) {
        Direction::Down
    } else {
        Direction::Up
    }
}

/// Whether a leg travelling in `direction` has not yet reached `target`.
///
/// Multiplying both sides by the direction sign makes "reached or passed the
/// target" a single comparison for both up and down moves.
pub fn keep_moving(reading: u16, target: u32, direction: Direction) -> bool {
    let sign = i64::from(direction.code());
    i64::from(reading) * sign < i64::from(target) * sign
}

/// Drives one leg using its own distance sensor and the shared actuator board.
pub struct LegController<S, A> {
    spec: LegSpec,
    target: u32,
    direction: Option<Direction>,
    state: LegState,
    sensor: SensorReader<S>,
    actuator: Arc<ActuatorWriter<A>>,
    motion: MotionConfig,
}

impl<S: ByteChannel, A: ByteChannel> LegController<S, A> {
    pub fn new(
        spec: LegSpec,
        sensor: SensorReader<S>,
        actuator: Arc<ActuatorWriter<A>>,
        motion: MotionConfig,
    ) -> Self {
        Self {
            spec,
            target: 0,
            direction: None,
            state: LegState::Idle,
            sensor,
            actuator,
            motion,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn identifier(&self) -> u16 {
        self.spec.identifier
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn state(&self) -> LegState {
        self.state
    }

    /// Direction computed by the last [`check_direction`](Self::check_direction).
    pub fn last_direction(&self) -> Option<Direction> {
        self.direction
    }

    /// Update the target height. Does not move the leg.
    pub fn set_height(&mut self, height: u32) {
        self.target = height;
    }

    /// Distance from the next sensor frame.
    pub fn read_sensor(&mut self) -> Result<u16> {
        Ok(self.sensor.distance()?)
    }

    /// Read the sensor and decide which way the leg has to go.
    pub fn check_direction(&mut self) -> Result<Direction> {
        let reading = self.read_sensor()?;
        let direction = required_direction(self.target, reading);
        debug!(
            leg = %self.spec.name,
            target = self.target,
            reading,
            direction = %direction,
            "direction checked"
        );
        self.direction = Some(direction);
        Ok(direction)
    }

    /// Start the leg's motor.
    pub fn start(&self, direction: Direction) -> Result<()> {
        Ok(self.actuator.send(self.spec.identifier, direction)?)
    }

    /// Stop the leg's motor.
    pub fn stop(&self) -> Result<()> {
        Ok(self.actuator.send(self.spec.identifier, Direction::Stop)?)
    }

    /// Drive the leg to its target and stop it there.
    ///
    /// Blocks until the sensor reports that the target was reached or passed.
    /// Without [`MotionConfig::max_move`] a silent sensor blocks forever.
    pub fn move_to_target(&mut self) -> Result<LegReport> {
        let direction = self.check_direction()?;
        self.start(direction)?;
        self.state = LegState::Moving;
        info!(
            leg = %self.spec.name,
            target = self.target,
            direction = %direction,
            "leg moving"
        );

        let reading = match self.poll_until_converged(direction) {
            Ok(reading) => reading,
            Err(err) => {
                self.state = LegState::Faulted;
                if let Err(stop_err) = self.stop() {
                    warn!(leg = %self.spec.name, error = %stop_err, "failed to stop faulted leg");
                }
                return Err(err);
            }
        };

        self.stop()?;
        self.state = LegState::Settled;

        Ok(LegReport {
            leg: self.spec.name.clone(),
            identifier: self.spec.identifier,
            target: self.target,
            reading,
        })
    }

    fn poll_until_converged(&mut self, direction: Direction) -> Result<u16> {
        let started = Instant::now();
        let mut last_reading = None;
        loop {
            let reading = self.read_bounded(started, last_reading)?;
            last_reading = Some(reading);
            if !keep_moving(reading, self.target, direction) {
                return Ok(reading);
            }
            trace!(leg = %self.spec.name, reading, target = self.target, "leg still moving");
            thread::sleep(self.motion.poll_interval);
        }
    }

    fn read_bounded(&mut self, started: Instant, last_reading: Option<u16>) -> Result<u16> {
        let Some(limit) = self.motion.max_move else {
            return self.read_sensor();
        };

        let remaining = limit.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(self.timeout_error(limit, last_reading));
        }
        match self.sensor.distance_timeout(remaining) {
            Ok(distance) => Ok(distance),
            Err(FrameError::Timeout(_)) => Err(self.timeout_error(limit, last_reading)),
            Err(err) => Err(err.into()),
        }
    }

    fn timeout_error(&self, limit: Duration, last_reading: Option<u16>) -> DeskError {
        DeskError::ConvergenceTimeout {
            leg: self.spec.name.clone(),
            target: self.target,
            waited: limit,
            last_reading,
        }
    }

    /// Close this leg's sensor channel.
    pub fn close_sensor(&mut self) {
        self.sensor.close();
    }
}
