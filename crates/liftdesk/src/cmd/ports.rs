use serialport::{SerialPortInfo, SerialPortType};

use crate::cmd::PortsArgs;
use crate::exit::{CliError, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_ports, OutputFormat, PortOutput};

pub fn run(_args: PortsArgs, format: OutputFormat) -> CliResult<i32> {
    let mut ports = serialport::available_ports().map_err(|err| {
        CliError::new(TRANSPORT_ERROR, format!("failed to list serial ports: {err}"))
    })?;
    ports.sort_by(|a, b| a.port_name.cmp(&b.port_name));

    let rows: Vec<PortOutput> = ports.into_iter().map(port_output).collect();
    print_ports(&rows, format);
    Ok(SUCCESS)
}

fn port_output(info: SerialPortInfo) -> PortOutput {
    let (kind, details) = match info.port_type {
        SerialPortType::UsbPort(usb) => {
            let mut details = format!("{:04x}:{:04x}", usb.vid, usb.pid);
            for part in [usb.manufacturer, usb.product, usb.serial_number]
                .into_iter()
                .flatten()
            {
                details.push(' ');
                details.push_str(&part);
            }
            ("usb", details)
        }
        SerialPortType::PciPort => ("pci", String::new()),
        SerialPortType::BluetoothPort => ("bluetooth", String::new()),
        SerialPortType::Unknown => ("unknown", String::new()),
    };
    PortOutput {
        port: info.port_name,
        kind,
        details,
    }
}
