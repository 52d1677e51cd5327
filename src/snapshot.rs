use std::fmt;

use chrono::{DateTime, Local};

use u50_protocol::{DecodedReading, NormalizedValues};

/// One published measurement: both decoder views of the same response.
///
/// Snapshots are immutable once published and shared as `Arc<Snapshot>`,
/// so readers always see a complete reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub reading: DecodedReading,
    pub values: NormalizedValues,
    /// Host clock at the time the response was decoded.
    pub captured_at: DateTime<Local>,
}

impl Snapshot {
    pub fn new(reading: DecodedReading, values: NormalizedValues) -> Self {
        Self {
            reading,
            values,
            captured_at: Local::now(),
        }
    }

    pub fn has_values(&self) -> bool {
        !self.values.is_empty()
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reading = &self.reading;
        writeln!(f, "Site name: {}", reading.site_name)?;
        writeln!(
            f,
            "Probe status: {}, Error: {}",
            reading.probe_status, reading.probe_error
        )?;
        write!(f, "{}", self.values)?;
        if let Some(ts) = &reading.timestamp {
            writeln!(f, "Timestamp: {ts}")?;
        }
        if let Some(gps) = &reading.gps {
            writeln!(f, "GPS Location: {gps}")?;
        }
        Ok(())
    }
}
