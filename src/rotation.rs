use crate::error::LogError;
use crate::record::LogRecord;
use crate::sink::LogSink;
use chrono::{DateTime, Days, Local, TimeZone};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Directory holding the active and rotated log files.
pub const DEFAULT_LOG_DIR: &str = "log";

/// Name of the file currently being written.
pub const DEFAULT_FILE_NAME: &str = "Today.log";

/// Number of rotated files kept by default. `0` disables pruning.
pub const DEFAULT_BACKUP_COUNT: usize = 7;

/// Date layout of the raw suffix proposed for a rotated file.
const ROTATED_SUFFIX_FORMAT: &str = "%Y-%m-%d";

/// Extension appended to rotated files once their name is normalized.
const ROTATED_EXTENSION: &str = ".log";

/// Entries whose lowercased name contains this marker are already normalized
/// (or active) and are left alone by the rename pass.
const NORMALIZED_MARKER: &str = "log";

/// Configuration of a [`RotatingFileHandler`].
///
/// **Fields**
/// - `dir`: directory receiving the active and rotated files.
/// - `file_name`: name of the active file inside `dir`.
/// - `backup_count`: maximum number of rotated files kept, `0` keeps all.
/// - `lazy`: when `true` the active file is only opened on first write.
#[derive(Clone, Debug)]
pub struct RotationConfig {
    pub dir: PathBuf,
    pub file_name: String,
    pub backup_count: usize,
    pub lazy: bool,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_LOG_DIR),
            file_name: DEFAULT_FILE_NAME.to_string(),
            backup_count: DEFAULT_BACKUP_COUNT,
            lazy: true,
        }
    }
}

/// File handler that rolls over at local midnight, renames the rotated file
/// to a separator-free date (`20240115.log`) and prunes the oldest rotated
/// file once more than `backup_count` are present.
///
/// Lexicographic order of the normalized names equals chronological order,
/// which is what the prune pass relies on to pick the oldest file.
#[derive(Debug)]
pub struct RotatingFileHandler {
    config: RotationConfig,
    path: PathBuf,
    file: Option<File>,
    rollover_at: DateTime<Local>,
}

impl RotatingFileHandler {
    /// Create a handler using the current local time as reference.
    pub fn new(config: RotationConfig) -> Result<Self, LogError> {
        Self::new_at(config, Local::now())
    }

    /// Create a handler with an explicit reference time.
    ///
    /// If the active file already exists its modification time is used
    /// instead, so a file left over from a previous day is rotated on the
    /// first write after a restart.
    pub fn new_at(config: RotationConfig, now: DateTime<Local>) -> Result<Self, LogError> {
        let path = config.dir.join(&config.file_name);
        let reference = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .map(DateTime::<Local>::from)
            .unwrap_or(now);

        let mut handler = Self {
            rollover_at: next_midnight(reference),
            config,
            path,
            file: None,
        };
        if !handler.config.lazy {
            handler.open()?;
        }
        Ok(handler)
    }

    pub fn config(&self) -> &RotationConfig {
        &self.config
    }

    /// Full path of the active log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next point in time at which a write triggers a rollover.
    pub fn next_rollover(&self) -> DateTime<Local> {
        self.rollover_at
    }

    pub fn should_rollover(&self, now: DateTime<Local>) -> bool {
        now >= self.rollover_at
    }

    /// Append one rendered line to the active file.
    pub fn emit(&mut self, line: &str) -> Result<(), LogError> {
        self.emit_at(line, Local::now())
    }

    /// Append one rendered line as if the current time were `now`, rolling
    /// over first if `now` crossed the boundary.
    pub fn emit_at(&mut self, line: &str, now: DateTime<Local>) -> Result<(), LogError> {
        if self.should_rollover(now) {
            self.rollover_at(now)?;
        }

        let path = self.path.clone();
        let file = self.open()?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .and_then(|_| file.flush())
            .map_err(|source| LogError::Write { path, source })
    }

    pub fn flush(&mut self) -> Result<(), LogError> {
        match self.file.as_mut() {
            Some(file) => file.flush().map_err(|source| LogError::Write {
                path: self.path.clone(),
                source,
            }),
            None => Ok(()),
        }
    }

    /// Roll over using the current local time.
    pub fn rollover(&mut self) -> Result<(), LogError> {
        self.rollover_at(Local::now())
    }

    /// Close the active file, rotate it, normalize rotated names and prune
    /// the oldest rotated file if the retention count is exceeded.
    ///
    /// Only one file is pruned per rollover.
    pub fn rollover_at(&mut self, now: DateTime<Local>) -> Result<(), LogError> {
        self.base_rollover(now)?;
        self.rename_rotated()?;
        self.prune()
    }

    /// Name the rotated file gets before the rename pass: the proposed
    /// `<file_name>.<suffix>` with the active file name stripped out.
    pub fn rotated_name(&self, suffix: &str) -> String {
        let proposed = format!("{}.{}", self.config.file_name, suffix);
        proposed.replace(&self.config.file_name, "")
    }

    /// Rotated files currently on disk, oldest first.
    pub fn rotated_files(&self) -> Result<Vec<PathBuf>, LogError> {
        Ok(self
            .rotated_names()?
            .into_iter()
            .map(|name| self.config.dir.join(name))
            .collect())
    }

    fn open(&mut self) -> Result<&mut File, LogError> {
        let file = match self.file.take() {
            Some(file) => file,
            None => OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|source| LogError::Open {
                    path: self.path.clone(),
                    source,
                })?,
        };
        Ok(self.file.insert(file))
    }

    fn base_rollover(&mut self, now: DateTime<Local>) -> Result<(), LogError> {
        if let Some(mut file) = self.file.take() {
            file.flush().map_err(|source| LogError::Write {
                path: self.path.clone(),
                source,
            })?;
        }

        let ended = self
            .rollover_at
            .date_naive()
            .checked_sub_days(Days::new(1))
            .unwrap_or_else(|| self.rollover_at.date_naive());
        let suffix = ended.format(ROTATED_SUFFIX_FORMAT).to_string();
        let target = self.config.dir.join(self.rotated_name(&suffix));

        if target.exists() {
            fs::remove_file(&target).map_err(|source| LogError::Remove {
                path: target.clone(),
                source,
            })?;
        }
        if self.path.exists() {
            fs::rename(&self.path, &target).map_err(|source| LogError::Rename {
                from: self.path.clone(),
                to: target.clone(),
                source,
            })?;
        }

        self.rollover_at = next_midnight(now);
        if !self.config.lazy {
            self.open()?;
        }
        Ok(())
    }

    fn rename_rotated(&self) -> Result<(), LogError> {
        for name in self.file_names()? {
            if name.to_lowercase().contains(NORMALIZED_MARKER) || name == self.config.file_name {
                continue;
            }

            let from = self.config.dir.join(&name);
            let to = self.config.dir.join(normalize_rotated_name(&name));
            fs::rename(&from, &to).map_err(|source| LogError::Rename { from, to, source })?;
        }
        Ok(())
    }

    fn prune(&self) -> Result<(), LogError> {
        if self.config.backup_count == 0 {
            return Ok(());
        }

        let names = self.rotated_names()?;
        if names.len() > self.config.backup_count {
            let oldest = self.config.dir.join(&names[0]);
            if oldest.exists() {
                fs::remove_file(&oldest).map_err(|source| LogError::Remove {
                    path: oldest.clone(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    fn rotated_names(&self) -> Result<Vec<String>, LogError> {
        let mut names: Vec<String> = self
            .file_names()?
            .into_iter()
            .filter(|name| !name.contains(&self.config.file_name))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Names of the regular files in the log directory.
    fn file_names(&self) -> Result<Vec<String>, LogError> {
        let dir = &self.config.dir;
        let read_dir_err = |source: io::Error| LogError::ReadDir {
            path: dir.clone(),
            source,
        };

        let mut names = Vec::new();
        for entry in fs::read_dir(dir).map_err(read_dir_err)? {
            let entry = entry.map_err(read_dir_err)?;
            if !entry.file_type().map_err(read_dir_err)?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}

/// Strip every separator (anything not ASCII alphanumeric) and append the
/// `.log` extension: `.2024-01-15` becomes `20240115.log`.
pub fn normalize_rotated_name(name: &str) -> String {
    let mut normalized: String = name.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    normalized.push_str(ROTATED_EXTENSION);
    normalized
}

/// First local midnight strictly after `t`.
fn next_midnight(t: DateTime<Local>) -> DateTime<Local> {
    t.date_naive()
        .checked_add_days(Days::new(1))
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| Local.from_local_datetime(&midnight).earliest())
        .unwrap_or_else(|| t + chrono::Duration::days(1))
}

/// A [`RotatingFileHandler`] shared between the layer and its owner.
#[derive(Clone, Debug)]
pub struct SharedHandler(Arc<Mutex<RotatingFileHandler>>);

impl SharedHandler {
    pub fn new(handler: RotatingFileHandler) -> Self {
        SharedHandler(Arc::new(Mutex::new(handler)))
    }

    /// Run `f` with exclusive access to the handler.
    pub fn with<R>(&self, f: impl FnOnce(&mut RotatingFileHandler) -> R) -> R {
        let mut guard = self.0.lock();
        f(&mut guard)
    }
}

impl LogSink for SharedHandler {
    fn write(&self, record: &LogRecord) -> Result<(), LogError> {
        self.0.lock().emit(&record.to_line())
    }

    fn flush(&self) -> Result<(), LogError> {
        self.0.lock().flush()
    }
}
