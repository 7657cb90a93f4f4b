use crate::error::LogError;
use crate::layer::RecordLayer;
use crate::record::Severity;
use crate::response::CallerLocation;
use crate::rotation::{RotatingFileHandler, RotationConfig, SharedHandler};
use crate::sink::LogSink;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::sync::{Arc, OnceLock};
use tracing::Dispatch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Name of the logger returned by [`get_logger`].
pub const DEFAULT_LOGGER_NAME: &str = "app";

/// Configuration of a logger built by the registry.
///
/// **Fields**
/// - `rotation`: where the rotating file lives and how many rotated files
///   to keep.
/// - `min_level`: records below this severity are dropped.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   added next to the file layer and records are echoed to the console.
#[derive(Clone, Debug)]
pub struct LoggerConfig {
    pub rotation: RotationConfig,
    pub min_level: Severity,
    pub enable_stdout: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            rotation: RotationConfig::default(),
            min_level: Severity::Info,
            enable_stdout: false,
        }
    }
}

/// Shared handle to a configured logger.
pub type LoggerHandle = Arc<Logger>;

/// A named logger owning its own `tracing` dispatch.
///
/// Events emitted through [`Logger::in_scope`] or [`Logger::log`] only reach
/// this logger's layers, never the process-global subscriber (unless the
/// logger was installed with [`install_global`]).
pub struct Logger {
    name: String,
    dispatch: Dispatch,
    handlers: Vec<Arc<dyn LogSink>>,
    file_handler: Option<SharedHandler>,
    min_level: Severity,
}

impl Logger {
    /// Build a logger writing to a [`RotatingFileHandler`], creating the log
    /// directory first if it does not exist.
    pub fn build(name: &str, config: &LoggerConfig) -> Result<LoggerHandle, LogError> {
        let dir = &config.rotation.dir;
        fs::create_dir_all(dir).map_err(|source| LogError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        let handler = SharedHandler::new(RotatingFileHandler::new(config.rotation.clone())?);
        let sink: Arc<dyn LogSink> = Arc::new(handler.clone());
        Ok(Arc::new(Self::assemble(
            name,
            sink,
            Some(handler),
            config.min_level,
            config.enable_stdout,
        )))
    }

    /// Build a logger over an arbitrary sink, without touching the filesystem.
    pub fn with_sink(name: &str, sink: Arc<dyn LogSink>, min_level: Severity) -> LoggerHandle {
        Arc::new(Self::assemble(name, sink, None, min_level, false))
    }

    fn assemble(
        name: &str,
        sink: Arc<dyn LogSink>,
        file_handler: Option<SharedHandler>,
        min_level: Severity,
        enable_stdout: bool,
    ) -> Self {
        let layer = RecordLayer::new(Arc::clone(&sink), min_level);

        // The two subscriber shapes have different types, so each is boxed
        // into a `Dispatch` separately.
        let dispatch = if enable_stdout {
            let fmt_layer = tracing_subscriber::fmt::layer();
            Dispatch::new(Registry::default().with(layer).with(fmt_layer))
        } else {
            Dispatch::new(Registry::default().with(layer))
        };

        Self {
            name: name.to_string(),
            dispatch,
            handlers: vec![sink],
            file_handler,
            min_level,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn has_handlers(&self) -> bool {
        !self.handlers.is_empty()
    }

    pub fn min_level(&self) -> Severity {
        self.min_level
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// The rotating file handler, if this logger writes to one.
    pub fn file_handler(&self) -> Option<&SharedHandler> {
        self.file_handler.as_ref()
    }

    /// Run `f` with this logger as the current `tracing` dispatcher.
    pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Emit one record tagged with `caller`.
    ///
    /// `Critical` is sent at `tracing` level `ERROR` with a
    /// `severity = "critical"` field.
    pub fn log(
        &self,
        severity: Severity,
        caller: &CallerLocation,
        message: &str,
        error: Option<&(dyn Error + 'static)>,
    ) {
        let file = caller.file();
        let func = caller.func();
        self.in_scope(|| match severity {
            Severity::Debug => {
                tracing::debug!(file, func, error, "{}", message)
            }
            Severity::Info => {
                tracing::info!(file, func, error, "{}", message)
            }
            Severity::Warning => {
                tracing::warn!(file, func, error, "{}", message)
            }
            Severity::Error => {
                tracing::error!(file, func, error, "{}", message)
            }
            Severity::Critical => {
                tracing::error!(severity = "critical", file, func, error, "{}", message)
            }
        });
    }

    pub fn flush(&self) -> Result<(), LogError> {
        for handler in &self.handlers {
            handler.flush()?;
        }
        Ok(())
    }
}

/// Registry of loggers keyed by name.
///
/// Lookup and creation happen under one lock, so a name is only ever
/// built once and repeated requests never stack extra handlers.
#[derive(Default)]
pub struct LoggerRegistry {
    loggers: Mutex<HashMap<String, LoggerHandle>>,
}

impl LoggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<LoggerHandle> {
        self.loggers.lock().get(name).cloned()
    }

    /// Return the logger registered under `name`, building it from
    /// `config` on first request.
    pub fn get_or_init(&self, name: &str, config: &LoggerConfig) -> Result<LoggerHandle, LogError> {
        let mut loggers = self.loggers.lock();
        if let Some(logger) = loggers.get(name) {
            if logger.has_handlers() {
                return Ok(Arc::clone(logger));
            }
        }

        let logger = Logger::build(name, config)?;
        loggers.insert(name.to_string(), Arc::clone(&logger));
        Ok(logger)
    }

    /// Register an already built logger, replacing any previous one.
    pub fn insert(&self, logger: LoggerHandle) {
        self.loggers
            .lock()
            .insert(logger.name().to_string(), logger);
    }

    pub fn len(&self) -> usize {
        self.loggers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.lock().is_empty()
    }
}

static GLOBAL_REGISTRY: OnceLock<LoggerRegistry> = OnceLock::new();

/// Process-wide registry backing [`get_logger`].
pub fn global_registry() -> &'static LoggerRegistry {
    GLOBAL_REGISTRY.get_or_init(LoggerRegistry::new)
}

/// Return the process-wide `app` logger, building it with
/// [`LoggerConfig::default`] (`log/Today.log`, 7 rotated files, INFO) on
/// first call.
pub fn get_logger() -> Result<LoggerHandle, LogError> {
    global_registry().get_or_init(DEFAULT_LOGGER_NAME, &LoggerConfig::default())
}

/// Install a logger's dispatch as the global default subscriber so plain
/// `tracing` macros anywhere in the process reach its file.
///
/// Fails if another global subscriber is already installed.
pub fn install_global(logger: &LoggerHandle) -> Result<(), LogError> {
    tracing::dispatcher::set_global_default(logger.dispatch().clone())?;
    Ok(())
}

/// Build (or fetch) the `app` logger with `config` and install it globally.
pub fn init_tracing_with_config(config: LoggerConfig) -> Result<LoggerHandle, LogError> {
    let logger = global_registry().get_or_init(DEFAULT_LOGGER_NAME, &config)?;
    install_global(&logger)?;
    Ok(logger)
}

/// Initialize tracing with the default configuration.
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`LoggerConfig::default`].
pub fn init_tracing() -> Result<LoggerHandle, LogError> {
    init_tracing_with_config(LoggerConfig::default())
}
