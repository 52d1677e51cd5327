use std::io;
use std::time::Duration;

use log::{debug, info, warn};
use serialport::{SerialPortInfo, SerialPortType};

use crate::error::{ProbeError, Result};

use super::Transport;

/// Serial port settings for the probe link (8N1, no flow control).
const DATA_BITS: serialport::DataBits = serialport::DataBits::Eight;
const STOP_BITS: serialport::StopBits = serialport::StopBits::One;
const PARITY: serialport::Parity = serialport::Parity::None;
const FLOW_CONTROL: serialport::FlowControl = serialport::FlowControl::None;

/// A probe transport backed by a native serial port.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    pub fn new(port: Box<dyn serialport::SerialPort>) -> Self {
        Self { port }
    }

    pub fn name(&self) -> Option<String> {
        self.port.name()
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        io::Write::write_all(&mut self.port, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(&mut self.port)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut self.port, buf)
    }

    fn bytes_to_read(&mut self) -> io::Result<usize> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(io::Error::other)
    }
}

/// Every serial port the OS reports.
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    Ok(serialport::available_ports()?)
}

/// Find the serial port the probe's USB cable is attached to.
///
/// Picks the first USB serial port. The probe cable uses a generic
/// USB-serial bridge, so there is no product string to match on.
pub fn find_port() -> Result<String> {
    let ports = list_ports()?;

    for port in &ports {
        debug!("found port: {} ({:?})", port.port_name, port.port_type);
    }

    if let Some(port) = ports
        .iter()
        .find(|p| matches!(p.port_type, SerialPortType::UsbPort(_)))
    {
        info!("using USB serial port {}", port.port_name);
        return Ok(port.port_name.clone());
    }

    if ports.is_empty() {
        warn!("no serial ports found");
    } else {
        warn!("no USB serial port among {} port(s):", ports.len());
        for port in &ports {
            warn!("  {} ({:?})", port.port_name, port.port_type);
        }
    }

    Err(ProbeError::PortNotFound)
}

/// Open a serial port with probe settings (8N1, no flow control).
pub fn open_port(port_name: &str, baud_rate: u32, timeout: Duration) -> Result<SerialTransport> {
    let port = serialport::new(port_name, baud_rate)
        .data_bits(DATA_BITS)
        .stop_bits(STOP_BITS)
        .parity(PARITY)
        .flow_control(FLOW_CONTROL)
        .timeout(timeout)
        .open()?;

    info!("opened {port_name} at {baud_rate} baud");
    Ok(SerialTransport::new(port))
}
