//! Uniform `{status, message, data}` result envelope.
//!
//! Every envelope built through a [`Responder`] (or the [`build`] /
//! [`resp!`](crate::resp) shortcuts) is logged once, at a severity derived
//! from its status, and tagged with the file and function of the code that
//! asked for it.

use crate::error::LogError;
use crate::init::{get_logger, LoggerHandle};
use crate::record::Severity;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::panic::Location;
use std::path::Path;

/// Function name recorded when only the source file of the caller is known.
pub const UNKNOWN_FUNC: &str = "?";

/// Outcome of an operation, serialized as a lowercase string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Warning,
    Error,
    Critical,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Success => "success",
            ResponseStatus::Warning => "warning",
            ResponseStatus::Error => "error",
            ResponseStatus::Critical => "critical",
        }
    }

    /// Severity the envelope is logged at.
    pub fn severity(&self) -> Severity {
        match self {
            ResponseStatus::Success => Severity::Info,
            ResponseStatus::Warning => Severity::Warning,
            ResponseStatus::Error => Severity::Error,
            ResponseStatus::Critical => Severity::Critical,
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result envelope handed back to the caller. Never persisted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response<T> {
    pub status: ResponseStatus,
    pub message: String,
    pub data: Option<T>,
}

impl<T> Response<T> {
    pub fn new(status: ResponseStatus, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            status,
            message: message.into(),
            data,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

/// Source file (base name only) and function a log entry is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallerLocation {
    file: String,
    func: String,
}

impl CallerLocation {
    pub fn new(file: impl AsRef<str>, func: impl Into<String>) -> Self {
        let file = file.as_ref();
        let base = Path::new(file)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(file);
        Self {
            file: base.to_string(),
            func: func.into(),
        }
    }

    /// Build from a source path and the type name of an item nested in the
    /// calling function, as produced by [`caller!`](crate::caller).
    ///
    /// `my_crate::orders::place_order::{{closure}}::f` resolves to
    /// `place_order`.
    pub fn from_fn_path(file: &str, type_name: &str) -> Self {
        let mut path = type_name.strip_suffix("::f").unwrap_or(type_name);
        while let Some(outer) = path.strip_suffix("::{{closure}}") {
            path = outer;
        }
        let func = path.rsplit("::").next().unwrap_or(path);
        Self::new(file, func)
    }

    /// Location of the nearest caller not marked `#[track_caller]`.
    ///
    /// Only the file is available this way; the function is recorded as
    /// [`UNKNOWN_FUNC`]. Prefer [`caller!`](crate::caller) where the call
    /// site can name itself.
    #[track_caller]
    pub fn here() -> Self {
        Self::new(Location::caller().file(), UNKNOWN_FUNC)
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn func(&self) -> &str {
        &self.func
    }
}

impl fmt::Display for CallerLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.file, self.func)
    }
}

/// [`CallerLocation`] of the enclosing function.
#[macro_export]
macro_rules! caller {
    () => {
        $crate::response::CallerLocation::from_fn_path(file!(), {
            fn f() {}
            fn type_name_of<T>(_: T) -> &'static str {
                ::std::any::type_name::<T>()
            }
            type_name_of(f)
        })
    };
}

/// Build a [`Response`] attributed to the enclosing function and log it
/// through [`get_logger`].
///
/// `resp!(status, message)` carries no data; `resp!(status, message, data)`
/// wraps `data` in `Some`.
#[macro_export]
macro_rules! resp {
    ($status:expr, $message:expr) => {
        $crate::response::build::<()>(&$crate::caller!(), $status, $message, None)
    };
    ($status:expr, $message:expr, $data:expr) => {
        $crate::response::build(&$crate::caller!(), $status, $message, Some($data))
    };
}

/// Builds envelopes and logs them through an injected logger.
#[derive(Clone)]
pub struct Responder {
    logger: LoggerHandle,
}

impl Responder {
    pub fn new(logger: LoggerHandle) -> Self {
        Self { logger }
    }

    /// Responder over the process-wide `app` logger.
    pub fn global() -> Result<Self, LogError> {
        Ok(Self::new(get_logger()?))
    }

    pub fn logger(&self) -> &LoggerHandle {
        &self.logger
    }

    /// Build an envelope and log its message attributed to `caller`.
    pub fn respond<T>(
        &self,
        caller: &CallerLocation,
        status: ResponseStatus,
        message: impl Into<String>,
        data: Option<T>,
    ) -> Response<T> {
        let response = Response::new(status, message, data);
        log_response(&self.logger, caller, &response, None);
        response
    }

    /// Like [`Responder::respond`], additionally attaching `error` (and its
    /// source chain) to warning, error and critical entries. A success
    /// envelope ignores it.
    pub fn respond_err<T>(
        &self,
        caller: &CallerLocation,
        status: ResponseStatus,
        message: impl Into<String>,
        data: Option<T>,
        error: &(dyn Error + 'static),
    ) -> Response<T> {
        let response = Response::new(status, message, data);
        log_response(&self.logger, caller, &response, Some(error));
        response
    }
}

fn log_response<T>(
    logger: &LoggerHandle,
    caller: &CallerLocation,
    response: &Response<T>,
    error: Option<&(dyn Error + 'static)>,
) {
    let error = match response.status {
        ResponseStatus::Success => None,
        _ => error,
    };
    logger.log(response.status.severity(), caller, &response.message, error);
}

/// Build an envelope attributed to `caller` and log it through the
/// process-wide logger.
///
/// A public-facing function takes the location from its own caller and
/// passes it through, so the entry names whoever called that function:
///
/// ```ignore
/// fn create_user(caller: CallerLocation) -> Response<u32> {
///     build(&caller, ResponseStatus::Success, "user created", Some(1))
/// }
///
/// create_user(caller!());
/// ```
///
/// Logger setup failures are reported on stderr; the envelope is returned
/// regardless.
pub fn build<T>(
    caller: &CallerLocation,
    status: ResponseStatus,
    message: impl Into<String>,
    data: Option<T>,
) -> Response<T> {
    match Responder::global() {
        Ok(responder) => responder.respond(caller, status, message, data),
        Err(e) => {
            eprintln!("failed to set up logger: {}", e);
            Response::new(status, message, data)
        }
    }
}

/// Build an envelope attributed to the nearest caller that is not
/// `#[track_caller]`, file only.
///
/// Marking the public function that calls `build_here` with
/// `#[track_caller]` attributes the entry to the file of whoever called that
/// function. The function name is not recoverable this way and is logged as
/// [`UNKNOWN_FUNC`]; use [`build`] with [`caller!`](crate::caller) to get it.
#[track_caller]
pub fn build_here<T>(
    status: ResponseStatus,
    message: impl Into<String>,
    data: Option<T>,
) -> Response<T> {
    build(&CallerLocation::here(), status, message, data)
}
