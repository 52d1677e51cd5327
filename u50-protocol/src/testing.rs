use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use crate::protocol::{DATE_OFFSET, Field, RESPONSE_MARKER, TERMINATOR, layout};
use crate::transport::Transport;

/// Builds `#RD` response frames field by field.
///
/// Unset fields are left blank (spaces).
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    buf: Vec<u8>,
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuilder {
    pub fn new() -> Self {
        let mut buf = vec![b' '; layout::FULL_LEN];
        buf[..RESPONSE_MARKER.len()].copy_from_slice(RESPONSE_MARKER.as_bytes());
        Self { buf }
    }

    fn put(mut self, field: Field, base: usize, value: &str) -> Self {
        assert!(
            value.len() <= field.len,
            "{value:?} does not fit {} ({} bytes)",
            field.name,
            field.len
        );
        let start = base + field.offset;
        let dest = &mut self.buf[start..start + field.len];
        dest.fill(b' ');
        dest[..value.len()].copy_from_slice(value.as_bytes());
        self
    }

    pub fn site_name(self, name: &str) -> Self {
        self.put(layout::SITE_NAME, 0, name)
    }

    pub fn probe_status(self, status: char) -> Self {
        self.put(layout::PROBE_STATUS, 0, &status.to_string())
    }

    pub fn probe_error(self, error: char) -> Self {
        self.put(layout::PROBE_ERROR, 0, &error.to_string())
    }

    pub fn parameter(
        self,
        index: usize,
        code: &str,
        status: char,
        error: char,
        data: &str,
        unit: char,
    ) -> Self {
        let base = layout::parameter_base(index);
        self.put(layout::CODE, base, code)
            .put(layout::STATUS, base, &status.to_string())
            .put(layout::ERROR, base, &error.to_string())
            .put(layout::DATA, base, data)
            .put(layout::UNIT, base, &unit.to_string())
    }

    /// Twelve characters, `YYMMDDhhmmss`.
    pub fn date_time(self, text: &str) -> Self {
        let mut builder = self;
        for (i, field) in layout::DATE_TIME.into_iter().enumerate() {
            let value = text.get(i * 2..i * 2 + 2).unwrap_or("");
            builder = builder.put(field, DATE_OFFSET, value);
        }
        builder
    }

    /// The GPS block as it appears on the wire, starting at the latitude degrees.
    pub fn gps(mut self, text: &str) -> Self {
        let start = DATE_OFFSET + layout::LAT_DEGREES.offset;
        let end = DATE_OFFSET + layout::LON_HEMISPHERE.end();
        assert!(text.len() <= end - start, "GPS block too long");
        self.buf[start..end].fill(b' ');
        self.buf[start..start + text.len()].copy_from_slice(text.as_bytes());
        self
    }

    /// The frame followed by CRLF, as read from the port.
    pub fn build(self) -> String {
        let mut frame = String::from_utf8(self.buf).expect("frame is ASCII");
        frame.push_str(TERMINATOR);
        frame
    }
}

#[derive(Debug, Default)]
struct Script {
    responses: VecDeque<Vec<u8>>,
    repeat: Option<Vec<u8>>,
    pending: VecDeque<u8>,
    writes: Vec<Vec<u8>>,
}

/// In-memory [`Transport`] that answers every write with the next scripted response.
///
/// Clones share the same script, so a test can keep a handle after moving
/// the transport into a probe.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request with the same bytes.
    pub fn repeating(response: impl Into<Vec<u8>>) -> Self {
        let mock = Self::new();
        mock.script.lock().unwrap().repeat = Some(response.into());
        mock
    }

    /// Queue a response for a future request. Queued responses win over a repeating one.
    pub fn push_response(&self, response: impl Into<Vec<u8>>) {
        self.script
            .lock()
            .unwrap()
            .responses
            .push_back(response.into());
    }

    /// Everything written so far, one entry per `write_all` call.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.script.lock().unwrap().writes.clone()
    }

    pub fn request_count(&self) -> usize {
        self.script.lock().unwrap().writes.len()
    }
}

impl Transport for MockTransport {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut script = self.script.lock().unwrap();
        script.writes.push(buf.to_vec());
        let mut next = script.responses.pop_front();
        if next.is_none() {
            next = script.repeat.clone();
        }
        if let Some(response) = next {
            script.pending.extend(response);
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut script = self.script.lock().unwrap();
        let n = buf.len().min(script.pending.len());
        for (slot, byte) in buf.iter_mut().zip(script.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn bytes_to_read(&mut self) -> io::Result<usize> {
        Ok(self.script.lock().unwrap().pending.len())
    }
}
