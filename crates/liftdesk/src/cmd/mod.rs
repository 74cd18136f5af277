use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use liftdesk::config::Config;

use crate::exit::{config_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod ports;
pub mod read;
pub mod run;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the desk service: subscribe to the command topic and move the desk.
    Run(RunArgs),
    /// Send one command ("up", "down" or a height) straight to the desk.
    Send(SendArgs),
    /// Print sensor readings.
    Read(ReadArgs),
    /// List serial ports visible to this host.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Options shared by every subcommand.
#[derive(Debug)]
pub struct Globals {
    pub config: PathBuf,
    pub format: OutputFormat,
}

pub fn run(command: Command, globals: &Globals) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, globals),
        Command::Send(args) => send::run(args, globals),
        Command::Read(args) => read::run(args, globals),
        Command::Ports(args) => ports::run(args, globals.format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// "up", "down", or a target height in sensor units.
    pub command: String,
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Only read this leg's sensor. Default: every leg.
    #[arg(long)]
    pub leg: Option<String>,
    /// Number of frames to read per leg.
    #[arg(long, default_value = "1")]
    pub count: usize,
    /// Maximum wait for each frame (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub timeout: String,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn load_config(path: &Path) -> CliResult<Config> {
    Config::load(path).map_err(config_error)
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
