use std::io;
use std::path::PathBuf;

/// Error type returned by the rotating file handler and logger setup.
///
/// Filesystem failures carry the path that was being touched so a failed
/// rollover can be traced back to the offending file.
#[derive(thiserror::Error, Debug)]
pub enum LogError {
    #[error("failed to create log directory {}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to open log file {}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to write log file {}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to rename {} to {}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("failed to remove log file {}", path.display())]
    Remove { path: PathBuf, source: io::Error },

    #[error("failed to list log directory {}", path.display())]
    ReadDir { path: PathBuf, source: io::Error },

    #[error("a global tracing subscriber is already installed")]
    GlobalSubscriber(#[from] tracing::dispatcher::SetGlobalDefaultError),
}
