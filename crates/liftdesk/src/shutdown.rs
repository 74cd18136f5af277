use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use liftdesk_control::DeskController;
use liftdesk_transport::ByteChannel;
use tracing::{info, warn};

use crate::exit::{CliError, CliResult, INTERNAL, INTERRUPTED};
use crate::mqtt::CommandSubscriber;

/// Scoped teardown shared by the signal path and the fatal-error path.
///
/// The first interrupt only raises the request flag; the command in flight
/// finishes and the caller tears down. A second interrupt exits at once.
pub struct Shutdown {
    requested: Arc<AtomicBool>,
    completed: bool,
}

impl Shutdown {
    /// Create the guard and hook it to SIGINT/SIGTERM.
    pub fn install() -> CliResult<Self> {
        let shutdown = Self::new();
        let requested = Arc::clone(&shutdown.requested);
        ctrlc::set_handler(move || {
            if requested.swap(true, Ordering::SeqCst) {
                warn!("second interrupt, exiting without teardown");
                std::process::exit(INTERRUPTED);
            }
            info!("shutdown requested, finishing current command");
        })
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
        Ok(shutdown)
    }

    fn new() -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            completed: false,
        }
    }

    pub fn requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Close the actuator, then the sensors, then the command channel.
    ///
    /// Only the first call does anything.
    pub fn run<S: ByteChannel, A: ByteChannel>(
        &mut self,
        desk: &mut DeskController<S, A>,
        commands: Option<&mut CommandSubscriber>,
    ) {
        if self.completed {
            return;
        }
        self.completed = true;
        self.requested.store(true, Ordering::SeqCst);

        info!("shutting down");
        desk.close();
        if let Some(commands) = commands {
            commands.close();
        }
        info!("shutdown complete");
    }
}
