pub mod error;
pub mod record;
pub mod sink;
pub mod layer;
pub mod rotation;

pub mod init;
pub mod noop_sink;
pub mod response;

pub use error::LogError;
pub use init::{get_logger, Logger, LoggerConfig, LoggerHandle, LoggerRegistry};
pub use record::{LogRecord, Severity};
pub use response::{build, build_here, CallerLocation, Responder, Response, ResponseStatus};
