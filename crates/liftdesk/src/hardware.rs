use std::sync::Arc;

use liftdesk::config::{Config, LegSection};
use liftdesk_control::{DeskController, LegController, LegSpec};
use liftdesk_frame::{ActuatorWriter, SensorReader};
use liftdesk_transport::{ChannelLifecycle, SerialChannel};
use tracing::info;

use crate::exit::{config_error, desk_error, transport_error, CliResult};

pub type SerialDesk = DeskController<SerialChannel, SerialChannel>;

/// Open the actuator board and every leg sensor named in `config`.
pub fn open_desk(config: &Config) -> CliResult<SerialDesk> {
    let widths = config.field_widths().map_err(config_error)?;
    let settings = config.actuator_settings();
    let port = settings.path.clone();
    let actuator = SerialChannel::open_with(settings)
        .map_err(|err| transport_error("failed to open actuator", err))?;
    let actuator = Arc::new(ActuatorWriter::new(actuator, widths));
    info!(port = %port, "actuator ready");

    let motion = config.motion_config();
    let mut legs = Vec::with_capacity(config.legs.len());
    for leg in &config.legs {
        let sensor = open_sensor(config, leg)?;
        legs.push(LegController::new(
            LegSpec::new(leg.name.clone(), leg.identifier),
            sensor,
            Arc::clone(&actuator),
            motion,
        ));
    }

    DeskController::new(actuator, legs, motion).map_err(|err| desk_error("failed to set up desk", err))
}

/// Sensor reader for one leg. Hold-open sensors are opened here so a missing
/// device fails at startup rather than mid-move.
pub fn open_sensor(config: &Config, leg: &LegSection) -> CliResult<SensorReader<SerialChannel>> {
    let settings = config.sensor_settings(leg);
    let sensor_config = config.sensor_config();
    let channel = match sensor_config.lifecycle {
        ChannelLifecycle::HoldOpen => SerialChannel::open_with(settings)
            .map_err(|err| transport_error(&format!("failed to open {} sensor", leg.name), err))?,
        ChannelLifecycle::OpenPerRead => SerialChannel::new(settings),
    };
    info!(
        leg = %leg.name,
        port = %leg.sensor_port,
        lifecycle = sensor_config.lifecycle.as_str(),
        sync = sensor_config.sync.as_str(),
        "sensor ready"
    );
    Ok(SensorReader::with_config(channel, sensor_config))
}
