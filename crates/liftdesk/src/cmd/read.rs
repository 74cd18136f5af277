use liftdesk::config::LegSection;

use crate::cmd::{load_config, parse_duration, Globals, ReadArgs};
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, USAGE};
use crate::hardware::open_sensor;
use crate::output::{print_reading, ReadingOutput};

pub fn run(args: ReadArgs, globals: &Globals) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    if args.count == 0 {
        return Err(CliError::new(USAGE, "--count must be greater than zero"));
    }
    let config = load_config(&globals.config)?;

    let legs: Vec<&LegSection> = match &args.leg {
        Some(name) => vec![config
            .leg(name)
            .ok_or_else(|| CliError::new(USAGE, format!("unknown leg {name}")))?],
        None => config.legs.iter().collect(),
    };

    let mut sensors = Vec::with_capacity(legs.len());
    for leg in legs {
        sensors.push((leg, open_sensor(&config, leg)?));
    }

    for _ in 0..args.count {
        for (leg, sensor) in &mut sensors {
            let frame = sensor
                .read_frame_timeout(timeout)
                .map_err(|err| frame_error(&format!("failed to read {} sensor", leg.name), err))?;
            print_reading(
                &ReadingOutput {
                    leg: &leg.name,
                    port: &leg.sensor_port,
                    distance: frame.distance,
                    strength: frame.strength,
                    temperature: frame.temperature,
                },
                globals.format,
            );
        }
    }

    Ok(SUCCESS)
}
