pub mod error;
pub mod gps;
pub mod normalize;
pub mod parameter;
pub mod probe;
pub mod protocol;
pub mod response;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{ProbeError, Result};
pub use gps::{Angle, GpsCoordinates, Timestamp};
pub use normalize::{Label, NormalizedValues};
pub use parameter::ParameterKind;
pub use probe::{Probe, ProbeConfig};
pub use protocol::Command;
pub use response::{DecodedReading, Parameter};
pub use transport::Transport;
