use liftdesk_control::Command;

use crate::cmd::{load_config, Globals, SendArgs};
use crate::exit::{desk_error, CliResult, SUCCESS};
use crate::hardware::open_desk;
use crate::output::print_outcome;
use crate::shutdown::Shutdown;

pub fn run(args: SendArgs, globals: &Globals) -> CliResult<i32> {
    let command: Command = args
        .command
        .parse()
        .map_err(|err| desk_error("invalid command", err))?;
    let config = load_config(&globals.config)?;

    // Interrupts wait for the move to finish so no leg is left running.
    let mut shutdown = Shutdown::install()?;
    let mut desk = open_desk(&config)?;
    let result = desk.dispatch(command);
    shutdown.run(&mut desk, None);

    let outcome = result.map_err(|err| desk_error("command failed", err))?;
    print_outcome(&outcome, globals.format);
    Ok(SUCCESS)
}
