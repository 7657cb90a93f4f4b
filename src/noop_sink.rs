use crate::error::LogError;
use crate::record::LogRecord;
use crate::sink::LogSink;

/// A sink that simply drops all records.
///
/// Useful for measuring the overhead of the layer and the envelope itself
/// without any file I/O.
#[derive(Clone, Default)]
pub struct NoopSink;

impl LogSink for NoopSink {
    fn write(&self, _record: &LogRecord) -> Result<(), LogError> {
        Ok(())
    }
}
