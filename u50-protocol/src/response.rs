use log::warn;

use crate::error::{ProbeError, Result};
use crate::gps::{self, GpsCoordinates, Timestamp};
use crate::parameter::ParameterKind;
use crate::protocol::{DATE_OFFSET, Field, PARAMETER_COUNT, RESPONSE_MARKER, layout};

/// One fixed-width parameter block of a measurement response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Two-character parameter code, as sent.
    pub code: String,
    pub status: char,
    pub error: char,
    /// Numeric data field with surrounding spaces removed. May be a placeholder.
    pub data: String,
    pub unit: char,
}

impl Parameter {
    /// Quantity named by the code field, if the code is known.
    pub fn kind(&self) -> Option<ParameterKind> {
        ParameterKind::from_code(&self.code)
    }
}

/// A fully decoded `#RD` response.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedReading {
    pub site_name: String,
    pub probe_status: char,
    pub probe_error: char,
    /// Always [`PARAMETER_COUNT`] entries, in protocol order.
    pub parameters: Vec<Parameter>,
    pub timestamp: Option<Timestamp>,
    pub gps: Option<GpsCoordinates>,
}

impl DecodedReading {
    /// First parameter slot whose code names `kind`.
    pub fn parameter(&self, kind: ParameterKind) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.kind() == Some(kind))
    }
}

fn structural<'a>(raw: &'a str, base: usize, field: Field) -> Result<&'a str> {
    field
        .slice(raw, base)
        .ok_or(ProbeError::MalformedFrame(field.name))
}

fn structural_char(raw: &str, base: usize, field: Field) -> Result<char> {
    structural(raw, base, field)?
        .chars()
        .next()
        .ok_or(ProbeError::MalformedFrame(field.name))
}

fn decode_parameter(raw: &str, index: usize) -> Result<Parameter> {
    let base = layout::parameter_base(index);
    Ok(Parameter {
        code: structural(raw, base, layout::CODE)?.to_string(),
        status: structural_char(raw, base, layout::STATUS)?,
        error: structural_char(raw, base, layout::ERROR)?,
        data: structural(raw, base, layout::DATA)?.trim().to_string(),
        unit: structural_char(raw, base, layout::UNIT)?,
    })
}

/// Decode a raw `#RD` response.
///
/// The header and the thirteen parameter blocks are mandatory: a missing
/// marker or a frame too short to hold them is [`ProbeError::MalformedFrame`].
/// The timestamp and GPS position are optional and become `None` (with a log
/// line) when they cannot be decoded.
pub fn decode_response(raw: &str) -> Result<DecodedReading> {
    if !raw.starts_with(RESPONSE_MARKER) {
        return Err(ProbeError::MalformedFrame(layout::MARKER.name));
    }

    let site_name = structural(raw, 0, layout::SITE_NAME)?.trim().to_string();
    let probe_status = structural_char(raw, 0, layout::PROBE_STATUS)?;
    let probe_error = structural_char(raw, 0, layout::PROBE_ERROR)?;

    let parameters = (0..PARAMETER_COUNT)
        .map(|index| decode_parameter(raw, index))
        .collect::<Result<Vec<_>>>()?;

    let timestamp = gps::decode_timestamp(raw, DATE_OFFSET)
        .inspect_err(|e| warn!("error parsing timestamp: {e}"))
        .ok();
    let gps = gps::decode_gps(raw, DATE_OFFSET)
        .inspect_err(|e| warn!("error parsing GPS coordinates: {e}"))
        .ok()
        .flatten();

    Ok(DecodedReading {
        site_name,
        probe_status,
        probe_error,
        parameters,
        timestamp,
        gps,
    })
}
