use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use liftdesk_control::DeskOutcome;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One decoded sensor frame, labelled with its leg.
#[derive(Debug, Serialize)]
pub struct ReadingOutput<'a> {
    pub leg: &'a str,
    pub port: &'a str,
    pub distance: u16,
    pub strength: u16,
    pub temperature: f64,
}

#[derive(Debug, Serialize)]
pub struct PortOutput {
    pub port: String,
    pub kind: &'static str,
    pub details: String,
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn print_outcome(outcome: &DeskOutcome, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(outcome),
        OutputFormat::Table => {
            let mut table = table(vec!["LEG", "TARGET", "DIRECTION", "READING"]);
            match outcome {
                DeskOutcome::Travelled { direction } => {
                    table.add_row(vec![
                        "all".to_string(),
                        "-".to_string(),
                        direction.to_string(),
                        "-".to_string(),
                    ]);
                }
                DeskOutcome::Unchanged { height } => {
                    table.add_row(vec![
                        "all".to_string(),
                        height.to_string(),
                        "stop".to_string(),
                        "-".to_string(),
                    ]);
                }
                DeskOutcome::Conflict { height, directions } => {
                    for entry in directions {
                        table.add_row(vec![
                            entry.leg.clone(),
                            height.to_string(),
                            entry.direction.to_string(),
                            "-".to_string(),
                        ]);
                    }
                }
                DeskOutcome::Moved { legs, .. } => {
                    for report in legs {
                        table.add_row(vec![
                            report.leg.clone(),
                            report.target.to_string(),
                            "stop".to_string(),
                            report.reading.to_string(),
                        ]);
                    }
                }
            }
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{outcome}"),
    }
}

pub fn print_reading(reading: &ReadingOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(reading),
        OutputFormat::Table => {
            let mut table = table(vec!["LEG", "PORT", "DISTANCE", "STRENGTH", "TEMP"]);
            table.add_row(vec![
                reading.leg.to_string(),
                reading.port.to_string(),
                reading.distance.to_string(),
                reading.strength.to_string(),
                format!("{:.1}", reading.temperature),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "leg={} port={} distance={} strength={} temperature={:.1}",
                reading.leg, reading.port, reading.distance, reading.strength, reading.temperature
            );
        }
    }
}

pub fn print_ports(ports: &[PortOutput], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(ports),
        OutputFormat::Table => {
            let mut table = table(vec!["PORT", "TYPE", "DETAILS"]);
            for port in ports {
                table.add_row(vec![port.port.clone(), port.kind.to_string(), port.details.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for port in ports {
                println!("{} ({}) {}", port.port, port.kind, port.details);
            }
        }
    }
}
