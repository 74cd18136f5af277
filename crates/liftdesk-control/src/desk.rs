use std::fmt;
use std::sync::Arc;
use std::thread;

use liftdesk_frame::{ActuatorWriter, Direction};
use liftdesk_transport::ByteChannel;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::command::Command;
use crate::error::{DeskError, Result};
use crate::leg::{LegController, LegReport, MotionConfig};

/// Direction one leg computed for a height change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegDirection {
    pub leg: String,
    pub direction: Direction,
}

/// What a desk command ended up doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeskOutcome {
    /// Open-loop full travel in one direction.
    Travelled { direction: Direction },
    /// The desk was already commanded to this height; nothing was sent.
    Unchanged { height: u32 },
    /// Legs disagreed on direction; the desk was lowered instead.
    Conflict {
        height: u32,
        directions: Vec<LegDirection>,
    },
    /// Every leg reached the new height.
    Moved { height: u32, legs: Vec<LegReport> },
}

impl fmt::Display for DeskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeskOutcome::Travelled { direction } => write!(f, "Desk travelled {direction}"),
            DeskOutcome::Unchanged { height } => write!(f, "Desk already set to {height}"),
            DeskOutcome::Conflict { height, directions } => {
                write!(f, "Direction conflict for {height}:")?;
                for entry in directions {
                    write!(f, " {}={}", entry.leg, entry.direction)?;
                }
                write!(f, "; lowered desk")
            }
            DeskOutcome::Moved { legs, .. } => {
                for (i, report) in legs.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{report}")?;
                }
                Ok(())
            }
        }
    }
}

/// Keeps the desk level by moving every leg together.
///
/// All legs share one actuator board. Each leg reads its own sensor.
pub struct DeskController<S, A> {
    legs: Vec<LegController<S, A>>,
    actuator: Arc<ActuatorWriter<A>>,
    motion: MotionConfig,
    overall_height: u32,
}

impl<S: ByteChannel, A: ByteChannel> DeskController<S, A> {
    pub fn new(
        actuator: Arc<ActuatorWriter<A>>,
        legs: Vec<LegController<S, A>>,
        motion: MotionConfig,
    ) -> Result<Self> {
        if legs.is_empty() {
            return Err(DeskError::NoLegs);
        }
        Ok(Self {
            legs,
            actuator,
            motion,
            overall_height: 0,
        })
    }

    /// Height most recently commanded through [`set_height`](Self::set_height).
    pub fn overall_height(&self) -> u32 {
        self.overall_height
    }

    pub fn legs(&self) -> &[LegController<S, A>] {
        &self.legs
    }

    /// Move the whole desk to `height`.
    ///
    /// Blocks until every leg has settled. If any leg fails, the error is
    /// returned only after all other legs have finished their moves.
    pub fn set_height(&mut self, height: u32) -> Result<DeskOutcome> {
        if height == self.overall_height {
            info!(height, "desk height unchanged");
            return Ok(DeskOutcome::Unchanged { height });
        }

        self.overall_height = height;
        let mut directions = Vec::with_capacity(self.legs.len());
        for leg in &mut self.legs {
            leg.set_height(height);
            let direction = leg.check_direction()?;
            directions.push(LegDirection {
                leg: leg.name().to_string(),
                direction,
            });
        }

        let first = directions[0].direction;
        if directions.iter().any(|entry| entry.direction != first) {
            warn!(height, ?directions, "legs disagree on direction, lowering desk");
            self.max(Direction::Down)?;
            return Ok(DeskOutcome::Conflict { height, directions });
        }

        info!(height, direction = %first, "moving desk");
        let legs = self.move_legs()?;
        Ok(DeskOutcome::Moved { height, legs })
    }

    fn move_legs(&mut self) -> Result<Vec<LegReport>> {
        let results: Vec<(String, thread::Result<Result<LegReport>>)> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .legs
                .iter_mut()
                .map(|leg| {
                    let name = leg.name().to_string();
                    (name, scope.spawn(move || leg.move_to_target()))
                })
                .collect();
            handles
                .into_iter()
                .map(|(name, handle)| (name, handle.join()))
                .collect()
        });

        let mut reports = Vec::with_capacity(results.len());
        let mut first_error = None;
        for (name, joined) in results {
            let result = joined.unwrap_or_else(|_| Err(DeskError::WorkerPanicked(name.clone())));
            match result {
                Ok(report) => {
                    info!(leg = %report.leg, target = report.target, reading = report.reading, "leg settled");
                    reports.push(report);
                }
                Err(err) => {
                    error!(leg = %name, error = %err, "leg move failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(reports),
        }
    }

    /// Run every leg in `direction` for the full travel time, then stop.
    ///
    /// Open loop: sensors are not read.
    pub fn max(&mut self, direction: Direction) -> Result<()> {
        info!(direction = %direction, travel = ?self.motion.max_travel, "full travel");
        if let Err(err) = self.start_all(direction) {
            if let Err(stop_err) = self.stop_all() {
                warn!(error = %stop_err, "failed to stop legs after start failure");
            }
            return Err(err);
        }
        thread::sleep(self.motion.max_travel);
        self.stop_all()
    }

    fn start_all(&self, direction: Direction) -> Result<()> {
        for leg in &self.legs {
            leg.start(direction)?;
        }
        Ok(())
    }

    /// Send stop to every leg, even if an earlier one fails.
    fn stop_all(&self) -> Result<()> {
        let mut first_error = None;
        for leg in &self.legs {
            if let Err(err) = leg.stop() {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Execute one parsed command.
    pub fn dispatch(&mut self, command: Command) -> Result<DeskOutcome> {
        info!(command = %command, "dispatching command");
        match command {
            Command::Travel(direction) => {
                self.max(direction)?;
                Ok(DeskOutcome::Travelled { direction })
            }
            Command::Height(height) => self.set_height(height),
        }
    }

    /// Parse and execute a raw command payload.
    ///
    /// Payloads that are not a command are logged and dropped with `Ok(None)`.
    pub fn handle_payload(&mut self, payload: &[u8]) -> Result<Option<DeskOutcome>> {
        match Command::from_payload(payload) {
            Ok(command) => self.dispatch(command).map(Some),
            Err(err) => {
                warn!(error = %err, "ignoring invalid command");
                Ok(None)
            }
        }
    }

    /// Close the actuator board, then every sensor.
    pub fn close(&mut self) {
        self.actuator.close();
        for leg in &mut self.legs {
            leg.close_sensor();
        }
        info!("desk channels closed");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::leg::LegState;
    use crate::testing::{
        actuator, event_log, fast_motion, leg, reads, writes, EventLog, RecordingActuator,
        ScriptedSensor,
    };

    fn desk(
        log: &EventLog,
        right: &[u16],
        left: &[u16],
        motion: MotionConfig,
    ) -> DeskController<ScriptedSensor, RecordingActuator> {
        let board = actuator(log);
        let legs = vec![
            leg("right", 1, ScriptedSensor::new("right", right, log), &board, motion),
            leg("left", 2, ScriptedSensor::new("left", left, log), &board, motion),
        ];
        DeskController::new(board, legs, motion).unwrap()
    }

    fn sorted(mut frames: Vec<String>) -> Vec<String> {
        frames.sort();
        frames
    }

    #[test]
    fn new_rejects_empty_leg_list() {
        let log = event_log();
        let board = actuator(&log);
        let legs: Vec<LegController<ScriptedSensor, RecordingActuator>> = Vec::new();
        assert!(matches!(
            DeskController::new(board, legs, fast_motion()),
            Err(DeskError::NoLegs)
        ));
    }

    #[test]
    fn both_legs_move_to_new_height() {
        let log = event_log();
        let mut desk = desk(&log, &[150, 150, 120, 95], &[140, 140, 100], fast_motion());

        let outcome = desk.set_height(100).unwrap();

        let DeskOutcome::Moved { height, legs } = outcome else {
            panic!("expected a move, got {outcome:?}");
        };
        assert_eq!(height, 100);
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0].leg, "right");
        assert_eq!(legs[0].reading, 95);
        assert_eq!(legs[1].leg, "left");
        assert_eq!(legs[1].reading, 100);
        assert_eq!(
            sorted(writes(&log)),
            vec!["01-1", "0100", "02-1", "0200"]
        );
        assert_eq!(desk.overall_height(), 100);
        assert!(desk.legs().iter().all(|leg| leg.state() == LegState::Settled));
    }

    #[test]
    fn repeated_height_writes_nothing() {
        let log = event_log();
        let mut desk = desk(&log, &[150, 150, 90], &[150, 150, 90], fast_motion());

        desk.set_height(100).unwrap();
        let events_after_first = log.lock().unwrap().len();

        let outcome = desk.set_height(100).unwrap();

        assert_eq!(outcome, DeskOutcome::Unchanged { height: 100 });
        assert_eq!(log.lock().unwrap().len(), events_after_first);
    }

    #[test]
    fn direction_conflict_lowers_desk_without_gated_move() {
        let log = event_log();
        let mut desk = desk(&log, &[150, 150, 150], &[50, 50, 50], fast_motion());

        let outcome = desk.set_height(100).unwrap();

        assert_eq!(
            outcome,
            DeskOutcome::Conflict {
                height: 100,
                directions: vec![
                    LegDirection { leg: "right".into(), direction: Direction::Down },
                    LegDirection { leg: "left".into(), direction: Direction::Up },
                ],
            }
        );
        assert_eq!(writes(&log), vec!["01-1", "02-1", "0100", "0200"]);
        assert_eq!(reads(&log, "right"), vec![150]);
        assert_eq!(reads(&log, "left"), vec![50]);
    }

    #[test]
    fn up_payload_runs_open_loop_travel() {
        let log = event_log();
        let mut desk = desk(&log, &[10], &[10], fast_motion());

        let outcome = desk.handle_payload(b"up").unwrap();

        assert_eq!(outcome, Some(DeskOutcome::Travelled { direction: Direction::Up }));
        assert_eq!(writes(&log), vec!["0101", "0201", "0100", "0200"]);
        assert!(reads(&log, "right").is_empty());
        assert!(reads(&log, "left").is_empty());
        assert_eq!(desk.overall_height(), 0);
    }

    #[test]
    fn height_payload_dispatches_set_height() {
        let log = event_log();
        let mut desk = desk(&log, &[50, 50, 80], &[50, 50, 85], fast_motion());

        let outcome = desk.handle_payload(b"80").unwrap();

        assert!(matches!(outcome, Some(DeskOutcome::Moved { height: 80, .. })));
        assert_eq!(sorted(writes(&log)), vec!["0100", "0101", "0200", "0201"]);
    }

    #[test]
    fn invalid_payload_is_dropped() {
        let log = event_log();
        let mut desk = desk(&log, &[150], &[150], fast_motion());

        for payload in [&b"sideways"[..], b"", b"-5", b"12.5", b"\xff\xfe"] {
            assert_eq!(desk.handle_payload(payload).unwrap(), None);
        }
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(desk.overall_height(), 0);
    }

    #[test]
    fn failing_leg_reports_after_other_leg_finishes() {
        let log = event_log();
        let motion = MotionConfig {
            max_move: Some(Duration::from_millis(40)),
            ..fast_motion()
        };
        let mut desk = desk(&log, &[150, 150], &[150, 150, 120, 90], motion);

        let err = desk.set_height(100).unwrap_err();

        assert!(matches!(err, DeskError::ConvergenceTimeout { ref leg, .. } if leg == "right"));
        assert_eq!(reads(&log, "left"), vec![150, 150, 120, 90]);
        assert_eq!(
            sorted(writes(&log)),
            vec!["01-1", "0100", "02-1", "0200"]
        );
        assert_eq!(desk.legs()[0].state(), LegState::Faulted);
        assert_eq!(desk.legs()[1].state(), LegState::Settled);
    }

    #[test]
    fn close_shuts_actuator_board() {
        let log = event_log();
        let mut desk = desk(&log, &[], &[], fast_motion());

        desk.close();

        assert!(desk.handle_payload(b"down").is_err());
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let outcome = DeskOutcome::Travelled { direction: Direction::Down };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json, serde_json::json!({"outcome": "travelled", "direction": "down"}));
    }
}
