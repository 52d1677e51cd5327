use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProbeError>;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[cfg(feature = "serial")]
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no USB serial port found")]
    PortNotFound,

    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),

    #[error("no response received")]
    NoResponse,

    #[error("response contains non-ASCII bytes")]
    NonAscii,

    #[error("cannot decode {field} from {value:?}")]
    FieldDecode { field: &'static str, value: String },
}

impl ProbeError {
    pub(crate) fn field(field: &'static str, value: impl Into<String>) -> Self {
        Self::FieldDecode {
            field,
            value: value.into(),
        }
    }
}
