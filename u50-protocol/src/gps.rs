use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::error::{ProbeError, Result};
use crate::protocol::{Field, layout};

/// Years in the date block are offsets from this year.
pub const YEAR_BASE: i32 = 2000;

/// Longitude/latitude degree values meaning "no GPS fix".
pub const NO_FIX_LATITUDE: &str = "--";
pub const NO_FIX_LONGITUDE: &str = "---";

/// Instrument clock reading taken with the measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    pub fn second(&self) -> u32 {
        self.0.second()
    }

    pub fn as_datetime(&self) -> NaiveDateTime {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S"))
    }
}

/// One coordinate as degrees, minutes, seconds and a hemisphere letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Angle {
    pub degrees: u16,
    pub minutes: u8,
    pub seconds: u8,
    pub hemisphere: char,
}

impl Angle {
    /// Decimal degrees, negative for the southern and western hemispheres.
    pub fn to_decimal(&self) -> f64 {
        let value =
            self.degrees as f64 + self.minutes as f64 / 60.0 + self.seconds as f64 / 3600.0;
        match self.hemisphere {
            'S' | 's' | 'W' | 'w' => -value,
            _ => value,
        }
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}°{}'{}\"{}",
            self.degrees, self.minutes, self.seconds, self.hemisphere
        )
    }
}

/// GPS position attached to a measurement. Either complete or absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsCoordinates {
    /// Two-digit degrees, N/S indicator.
    pub latitude: Angle,
    /// Three-digit degrees, E/W indicator.
    pub longitude: Angle,
}

impl fmt::Display for GpsCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

fn slice<'a>(raw: &'a str, base: usize, field: Field) -> Result<&'a str> {
    field
        .slice(raw, base)
        .ok_or_else(|| ProbeError::field(field.name, "<out of range>"))
}

fn number<T: std::str::FromStr>(field: Field, text: &str) -> Result<T> {
    text.trim()
        .parse()
        .map_err(|_| ProbeError::field(field.name, text))
}

fn indicator(field: Field, text: &str) -> Result<char> {
    text.chars()
        .next()
        .ok_or_else(|| ProbeError::field(field.name, text))
}

/// Decode the six two-digit date/time fields starting at `base`.
///
/// The fields must also form a valid calendar date and time of day.
pub fn decode_timestamp(raw: &str, base: usize) -> Result<Timestamp> {
    let mut values = [0u32; 6];
    for (value, field) in values.iter_mut().zip(layout::DATE_TIME) {
        *value = number(field, slice(raw, base, field)?)?;
    }
    let [year, month, day, hour, minute, second] = values;

    NaiveDate::from_ymd_opt(YEAR_BASE + year as i32, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .map(Timestamp)
        .ok_or_else(|| {
            ProbeError::field(
                "timestamp",
                format!("{year:02}{month:02}{day:02}{hour:02}{minute:02}{second:02}"),
            )
        })
}

/// Decode the GPS sub-fields relative to `base`.
///
/// Returns `Ok(None)` when either degree field carries its no-fix sentinel.
/// A partially valid position is never returned.
pub fn decode_gps(raw: &str, base: usize) -> Result<Option<GpsCoordinates>> {
    let lat_degrees = slice(raw, base, layout::LAT_DEGREES)?;
    let lat_minutes = slice(raw, base, layout::LAT_MINUTES)?;
    let lat_seconds = slice(raw, base, layout::LAT_SECONDS)?;
    let north_south = slice(raw, base, layout::LAT_HEMISPHERE)?;
    let lon_degrees = slice(raw, base, layout::LON_DEGREES)?;
    let lon_minutes = slice(raw, base, layout::LON_MINUTES)?;
    let lon_seconds = slice(raw, base, layout::LON_SECONDS)?;
    let east_west = slice(raw, base, layout::LON_HEMISPHERE)?;

    if lat_degrees == NO_FIX_LATITUDE || lon_degrees == NO_FIX_LONGITUDE {
        return Ok(None);
    }

    Ok(Some(GpsCoordinates {
        latitude: Angle {
            degrees: number(layout::LAT_DEGREES, lat_degrees)?,
            minutes: number(layout::LAT_MINUTES, lat_minutes)?,
            seconds: number(layout::LAT_SECONDS, lat_seconds)?,
            hemisphere: indicator(layout::LAT_HEMISPHERE, north_south)?,
        },
        longitude: Angle {
            degrees: number(layout::LON_DEGREES, lon_degrees)?,
            minutes: number(layout::LON_MINUTES, lon_minutes)?,
            seconds: number(layout::LON_SECONDS, lon_seconds)?,
            hemisphere: indicator(layout::LON_HEMISPHERE, east_west)?,
        },
    }))
}
