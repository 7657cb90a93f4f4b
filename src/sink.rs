use crate::error::LogError;
use crate::record::LogRecord;
use parking_lot::Mutex;

/// Destination for [`LogRecord`]s produced by the logging layer.
///
/// Implementations are responsible for persisting records somewhere
/// concrete (the rotating file, memory, stdout, etc). The layer calls
/// `write` synchronously on the thread that emitted the event.
pub trait LogSink: Send + Sync {
    /// Write a single log record.
    ///
    /// **Parameters**
    /// - `record`: fully-populated [`LogRecord`] produced by the layer.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was written.
    /// - `Err(..)` if the destination failed (I/O error during write or
    ///   rollover). Nothing is retried.
    fn write(&self, record: &LogRecord) -> Result<(), LogError>;

    /// Flush any buffered records, if the sink implements buffering.
    ///
    /// Default implementation is a no-op.
    fn flush(&self) -> Result<(), LogError> {
        Ok(())
    }
}

/// A sink that keeps every record in memory.
///
/// Handy for tests and for embedders that want to inspect what was logged
/// without touching the filesystem.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records written so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn write(&self, record: &LogRecord) -> Result<(), LogError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}
