use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use liftdesk_control::DeskController;
use liftdesk_transport::ByteChannel;
use tracing::{error, info};

use crate::cmd::{load_config, Globals, RunArgs};
use crate::exit::{desk_error, CliError, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::hardware::open_desk;
use crate::mqtt::{CommandSubscriber, Delivery};
use crate::output::{print_outcome, OutputFormat};
use crate::shutdown::Shutdown;

/// How often the command loop checks for a shutdown request.
const SHUTDOWN_POLL: Duration = Duration::from_millis(250);

pub fn run(_args: RunArgs, globals: &Globals) -> CliResult<i32> {
    let config = load_config(&globals.config)?;
    let mut shutdown = Shutdown::install()?;
    let mut desk = open_desk(&config)?;

    let mut commands = match CommandSubscriber::connect(&config.mqtt) {
        Ok(commands) => commands,
        Err(err) => {
            shutdown.run(&mut desk, None);
            return Err(err);
        }
    };

    let result = serve(&mut desk, &commands, &shutdown, globals.format);
    if let Err(err) = &result {
        error!(error = %err, "fatal error, shutting down");
    }
    shutdown.run(&mut desk, Some(&mut commands));
    result.map(|()| SUCCESS)
}

fn serve<S: ByteChannel, A: ByteChannel>(
    desk: &mut DeskController<S, A>,
    commands: &CommandSubscriber,
    shutdown: &Shutdown,
    format: OutputFormat,
) -> CliResult<()> {
    while !shutdown.requested() {
        match commands.recv_timeout(SHUTDOWN_POLL) {
            Ok(Delivery::Connected) => {
                info!(topic = %commands.topic(), "listening for desk commands");
            }
            Ok(Delivery::Command(payload)) => {
                if let Some(outcome) = desk
                    .handle_payload(&payload)
                    .map_err(|err| desk_error("command failed", err))?
                {
                    info!(outcome = %outcome, "command complete");
                    print_outcome(&outcome, format);
                }
            }
            Ok(Delivery::Failed(message)) => {
                return Err(CliError::new(
                    TRANSPORT_ERROR,
                    format!("mqtt connection failed: {message}"),
                ));
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(CliError::new(TRANSPORT_ERROR, "mqtt connection thread stopped"));
            }
        }
    }
    info!("no longer accepting commands");
    Ok(())
}
