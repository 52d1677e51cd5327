use std::fmt;

/// Payload of the "read data" request.
pub const READ_DATA: &str = "#RD@";
/// Every measurement response starts with this marker.
pub const RESPONSE_MARKER: &str = "#RD";
/// Line terminator appended to every request.
pub const TERMINATOR: &str = "\r\n";

/// Number of parameter blocks in a measurement response.
pub const PARAMETER_COUNT: usize = 13;
/// Byte offset of the first parameter block.
pub const PARAMETER_OFFSET: usize = 29;
/// Width of one parameter block.
pub const PARAMETER_STRIDE: usize = 11;
/// Byte offset of the date/time/GPS block.
pub const DATE_OFFSET: usize = 173;

/// Serial link settings (8N1, no flow control).
pub const BAUD_RATE: u32 = 19200;

/// A fixed-width field inside a response frame.
///
/// `offset` is relative to a base that depends on the block the field lives in:
/// the frame start for the header, the block start for parameter fields, and
/// [`DATE_OFFSET`] for date/time and GPS fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub offset: usize,
    pub len: usize,
}

impl Field {
    pub const fn new(name: &'static str, offset: usize, len: usize) -> Self {
        Self { name, offset, len }
    }

    /// One past the last byte of the field, relative to its base.
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }

    /// Slice this field out of `raw`. Returns `None` if the frame is too short.
    pub fn slice<'a>(&self, raw: &'a str, base: usize) -> Option<&'a str> {
        raw.get(base + self.offset..base + self.end())
    }
}

/// Frame layout of a `#RD` response.
///
/// The decoder and the test fixtures are both driven by these tables.
pub mod layout {
    use super::{DATE_OFFSET, Field, PARAMETER_COUNT, PARAMETER_OFFSET, PARAMETER_STRIDE};

    pub const MARKER: Field = Field::new("marker", 0, 3);
    pub const SITE_NAME: Field = Field::new("site name", 3, 20);
    pub const PROBE_STATUS: Field = Field::new("probe status", 23, 1);
    pub const PROBE_ERROR: Field = Field::new("probe error", 24, 1);

    pub const CODE: Field = Field::new("parameter code", 0, 2);
    pub const STATUS: Field = Field::new("parameter status", 2, 1);
    pub const ERROR: Field = Field::new("parameter error", 3, 1);
    pub const DATA: Field = Field::new("parameter data", 4, 5);
    pub const UNIT: Field = Field::new("parameter unit", 9, 1);

    pub const YEAR: Field = Field::new("year", 0, 2);
    pub const MONTH: Field = Field::new("month", 2, 2);
    pub const DAY: Field = Field::new("day", 4, 2);
    pub const HOUR: Field = Field::new("hour", 6, 2);
    pub const MINUTE: Field = Field::new("minute", 8, 2);
    pub const SECOND: Field = Field::new("second", 10, 2);

    pub const LAT_DEGREES: Field = Field::new("latitude degrees", 12, 2);
    pub const LAT_MINUTES: Field = Field::new("latitude minutes", 14, 2);
    pub const LAT_SECONDS: Field = Field::new("latitude seconds", 16, 2);
    pub const LAT_HEMISPHERE: Field = Field::new("N/S indicator", 19, 1);
    pub const LON_DEGREES: Field = Field::new("longitude degrees", 20, 3);
    pub const LON_MINUTES: Field = Field::new("longitude minutes", 23, 2);
    pub const LON_SECONDS: Field = Field::new("longitude seconds", 25, 2);
    pub const LON_HEMISPHERE: Field = Field::new("E/W indicator", 28, 1);

    pub const HEADER: [Field; 3] = [SITE_NAME, PROBE_STATUS, PROBE_ERROR];
    pub const PARAMETER: [Field; 5] = [CODE, STATUS, ERROR, DATA, UNIT];
    pub const DATE_TIME: [Field; 6] = [YEAR, MONTH, DAY, HOUR, MINUTE, SECOND];
    pub const GPS: [Field; 8] = [
        LAT_DEGREES,
        LAT_MINUTES,
        LAT_SECONDS,
        LAT_HEMISPHERE,
        LON_DEGREES,
        LON_MINUTES,
        LON_SECONDS,
        LON_HEMISPHERE,
    ];

    /// Start of parameter block `index`.
    pub const fn parameter_base(index: usize) -> usize {
        PARAMETER_OFFSET + PARAMETER_STRIDE * index
    }

    /// Shortest frame that still holds the header and all parameter blocks.
    pub const STRUCTURAL_LEN: usize = parameter_base(PARAMETER_COUNT - 1) + UNIT.end();

    /// Length of a frame carrying the complete date/time/GPS block.
    pub const FULL_LEN: usize = DATE_OFFSET + LON_HEMISPHERE.end();
}

/// XOR of every byte of `payload`.
pub fn checksum(payload: &str) -> u8 {
    payload.bytes().fold(0, |acc, b| acc ^ b)
}

/// A request frame: payload, two uppercase hex checksum digits, CRLF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    payload: &'static str,
    checksum: u8,
}

impl Command {
    /// The read-data request (`#RD@`), the only request the probe link uses.
    pub fn read_data() -> Self {
        Self {
            payload: READ_DATA,
            checksum: checksum(READ_DATA),
        }
    }

    pub fn payload(&self) -> &str {
        self.payload
    }

    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Full wire text including the terminator.
    pub fn to_wire(&self) -> String {
        format!("{}{:02X}{}", self.payload, self.checksum, TERMINATOR)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_wire().into_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02X}", self.payload, self.checksum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_hand_computed() {
        // '#' 0x23 ^ 'R' 0x52 = 0x71, ^ 'D' 0x44 = 0x35, ^ '@' 0x40 = 0x75
        assert_eq!(checksum("#RD@"), 0x75);
        assert_eq!(Command::read_data().checksum(), 0x75);
    }

    #[test]
    fn test_checksum_is_xor_fold() {
        let expected = READ_DATA.chars().fold(0u32, |acc, c| acc ^ c as u32);
        assert_eq!(checksum(READ_DATA) as u32, expected);
    }

    #[test]
    fn test_checksum_empty() {
        assert_eq!(checksum(""), 0);
    }

    #[test]
    fn test_read_data_wire_format() {
        let cmd = Command::read_data();
        assert_eq!(cmd.to_wire(), "#RD@75\r\n");
        assert_eq!(cmd.to_bytes(), b"#RD@75\r\n".to_vec());
        assert_eq!(cmd.to_string(), "#RD@75");
    }

    #[test]
    fn test_checksum_is_two_uppercase_digits() {
        let wire = Command::read_data().to_wire();
        let digits = &wire[READ_DATA.len()..READ_DATA.len() + 2];
        assert!(digits.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_layout_constants() {
        assert_eq!(layout::parameter_base(0), 29);
        assert_eq!(layout::parameter_base(12), 29 + 11 * 12);
        assert_eq!(layout::STRUCTURAL_LEN, 171);
        assert_eq!(layout::FULL_LEN, 202);
        assert!(layout::STRUCTURAL_LEN <= DATE_OFFSET);
    }

    #[test]
    fn test_parameter_fields_fit_stride() {
        for field in layout::PARAMETER {
            assert!(field.end() <= PARAMETER_STRIDE, "{} overflows its block", field.name);
        }
    }

    #[test]
    fn test_field_slice_out_of_range() {
        assert_eq!(layout::SITE_NAME.slice("#RDabc", 0), None);
        assert_eq!(layout::MARKER.slice("#RDabc", 0), Some("#RD"));
    }
}
