pub mod config;
pub mod error;
pub mod scheduler;
pub mod snapshot;
pub mod webhook;

pub use config::Config;
pub use error::{Result, TelemetryError};
pub use scheduler::{LoopKind, LoopState, Scheduler};
pub use snapshot::Snapshot;
pub use webhook::{Dispatch, FieldMap, Payload, WebhookClient};
