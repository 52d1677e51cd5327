use std::io::ErrorKind;
use std::thread;
use std::time::Duration;

use log::{debug, trace, warn};

use crate::error::{ProbeError, Result};
use crate::normalize::{self, NormalizedValues};
use crate::protocol::Command;
use crate::response::{self, DecodedReading};
use crate::transport::Transport;

/// Configuration for the probe request cycle.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Time to wait between writing a request and reading what has arrived.
    pub settle: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(500),
        }
    }
}

/// A connection to a U-50 probe.
pub struct Probe {
    transport: Box<dyn Transport>,
    config: ProbeConfig,
    command: Command,
}

impl Probe {
    /// Create a new `Probe` from an already-open transport and config.
    pub fn new(transport: Box<dyn Transport>, config: ProbeConfig) -> Self {
        Self {
            transport,
            config,
            command: Command::read_data(),
        }
    }

    /// Open `port_name` with probe serial settings.
    #[cfg(feature = "serial")]
    pub fn open(
        port_name: &str,
        baud_rate: u32,
        timeout: Duration,
        config: ProbeConfig,
    ) -> Result<Self> {
        let transport = crate::transport::serial::open_port(port_name, baud_rate, timeout)?;
        Ok(Self::new(Box::new(transport), config))
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Send the read-data request and return whatever the probe answered.
    ///
    /// Waits [`ProbeConfig::settle`] after writing, then reads exactly the
    /// bytes that are waiting. No framing or length check happens here.
    pub fn request(&mut self) -> Result<String> {
        let bytes = self.command.to_bytes();

        debug!("TX: {}", self.command);
        self.transport.write_all(&bytes)?;
        self.transport.flush()?;

        if !self.config.settle.is_zero() {
            thread::sleep(self.config.settle);
        }

        let waiting = self.transport.bytes_to_read()?;
        if waiting == 0 {
            warn!("no bytes waiting after {:?}", self.config.settle);
            return Err(ProbeError::NoResponse);
        }

        let received = self.read_waiting(waiting)?;
        if received.is_empty() {
            return Err(ProbeError::NoResponse);
        }
        if !received.is_ascii() {
            return Err(ProbeError::NonAscii);
        }

        debug!("received {} bytes", received.len());
        let text = String::from_utf8(received).map_err(|_| ProbeError::NonAscii)?;
        trace!("RX: {text:?}");
        Ok(text)
    }

    /// Read up to `waiting` bytes, stopping early if the port goes quiet.
    fn read_waiting(&mut self, waiting: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; waiting];
        let mut filled = 0;
        while filled < waiting {
            match self.transport.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) => return Err(ProbeError::Io(e)),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }

    /// Request a measurement and run both decoders over it.
    ///
    /// A frame the fixed-width decoder rejects fails the whole reading.
    pub fn read_reading(&mut self) -> Result<(DecodedReading, NormalizedValues)> {
        let raw = self.request()?;
        let reading = response::decode_response(&raw)?;
        let values = normalize::normalize(&raw);
        Ok((reading, values))
    }
}
