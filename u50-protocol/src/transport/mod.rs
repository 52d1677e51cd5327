use std::io;

#[cfg(feature = "serial")]
pub mod serial;

/// A byte-oriented transport to the probe.
///
/// Implementors provide read/write access to a serial-like connection.
/// The transport is synchronous and blocking.
pub trait Transport: Send {
    /// Write all bytes to the transport.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Flush any buffered output.
    fn flush(&mut self) -> io::Result<()>;

    /// Read bytes into the buffer. Returns the number of bytes read.
    /// Should return `Ok(0)` or `Err(TimedOut)` on timeout, not block forever.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Number of received bytes waiting to be read.
    fn bytes_to_read(&mut self) -> io::Result<usize>;
}
