//! Size-rotated file sink with a scheduled forced rotation
//!
//! The active file is rotated when a write would push it past the size
//! limit, and additionally once per [`FORCED_ROTATION_INTERVAL`] by a
//! background thread owned by the sink. Rotated files are renamed to
//! `<stem>-<local time><ext>` (plus `.gz` when compressed) next to the active
//! file; stale backups are removed after every rotation.
//!
//! Writes go through a buffer that the same thread flushes every
//! [`FLUSH_INTERVAL`], so records reach the file shortly after they are
//! logged even when the buffer never fills.

use crate::config::FileLogConfig;
use crate::core::error::{LoggerError, Result};
use crate::core::metrics::diagnostics;
use crate::core::sink::Sink;
use crate::core::timestamp::{format_backup_time, parse_backup_time};
use chrono::{DateTime, Local};
use crossbeam_channel::{select, Sender};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Period of the forced rotation performed by the background thread
pub const FORCED_ROTATION_INTERVAL: Duration = Duration::from_secs(3600);

/// Period of the background flush of buffered records
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Limits applied to one rotating file
///
/// # Examples
///
/// ```
/// use logkit::sinks::RotationPolicy;
/// use std::time::Duration;
///
/// let policy = RotationPolicy::default()
///     .with_max_size(10 * 1024 * 1024)
///     .with_max_backups(7)
///     .with_max_age(Some(Duration::from_secs(3 * 24 * 3600)))
///     .with_compression(true);
///
/// assert_eq!(policy.max_backups, 7);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Rotate before the file would exceed this many bytes
    pub max_size_bytes: u64,
    /// Backups to keep, newest first (0 keeps all)
    pub max_backups: usize,
    /// Remove backups older than this (`None` keeps all)
    pub max_age: Option<Duration>,
    /// Gzip rotated files
    pub compress: bool,
    /// Write buffer capacity
    pub buffer_size: usize,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::from(&FileLogConfig::default())
    }
}

impl From<&FileLogConfig> for RotationPolicy {
    fn from(cfg: &FileLogConfig) -> Self {
        let max_age = (cfg.max_days > 0)
            .then(|| Duration::from_secs(u64::from(cfg.max_days) * 24 * 3600));
        Self {
            max_size_bytes: cfg.max_size_bytes(),
            max_backups: cfg.max_backups,
            max_age,
            compress: cfg.compress,
            buffer_size: cfg.buffer_size(),
        }
    }
}

impl RotationPolicy {
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size_bytes = bytes;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backups = count;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_age(mut self, age: Option<Duration>) -> Self {
        self.max_age = age;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes;
        self
    }
}

/// A rotated file found next to the active one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    pub path: PathBuf,
    pub rotated_at: DateTime<Local>,
}

/// Active file state, guarded by the sink's mutex
struct RotatingFile {
    path: PathBuf,
    policy: RotationPolicy,
    writer: Option<BufWriter<File>>,
    current_size: u64,
    last_backup: Option<DateTime<Local>>,
}

impl RotatingFile {
    fn open(path: PathBuf, policy: RotationPolicy) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "create log directory",
                    format!("Failed to create directory '{}'", parent.display()),
                    e,
                )
            })?;
        }

        let mut file = Self {
            path,
            policy,
            writer: None,
            current_size: 0,
            last_backup: None,
        };
        file.open_active()?;
        Ok(file)
    }

    fn open_active(&mut self) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                LoggerError::file_sink(
                    self.path.display().to_string(),
                    format!("Failed to open: {}", e),
                )
            })?;

        self.current_size = file
            .metadata()
            .map_err(|e| {
                LoggerError::file_sink(
                    self.path.display().to_string(),
                    format!("Cannot access file metadata: {}", e),
                )
            })?
            .len();
        self.writer = Some(BufWriter::with_capacity(self.policy.buffer_size, file));
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        let len = buf.len() as u64;
        if len > self.policy.max_size_bytes {
            return Err(LoggerError::file_sink(
                self.path.display().to_string(),
                format!(
                    "write length {} exceeds maximum file size {}",
                    len, self.policy.max_size_bytes
                ),
            ));
        }

        if self.writer.is_none() {
            self.open_active()?;
        }
        if self.current_size + len > self.policy.max_size_bytes {
            self.rotate()?;
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::writer("Writer not initialized"))?;
        writer.write_all(buf).map_err(|e| {
            LoggerError::file_sink(
                self.path.display().to_string(),
                format!("Failed to write log entry: {}", e),
            )
        })?;
        self.current_size += len;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush().map_err(|e| {
                LoggerError::file_sink(
                    self.path.display().to_string(),
                    format!("Failed to flush: {}", e),
                )
            })?;
        }
        Ok(())
    }

    /// Move the active file aside, reopen it empty and prune old backups
    fn rotate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
        }

        if self.path.exists() {
            let mut at = Local::now();
            if let Some(last) = self.last_backup {
                at = at.max(last + chrono::Duration::milliseconds(1));
            }
            let (backup, at) = self.unused_backup_path(at);
            self.last_backup = Some(at);
            fs::rename(&self.path, &backup).map_err(|e| {
                LoggerError::file_rotation(
                    self.path.display().to_string(),
                    format!("Failed to rotate current log file: {}", e),
                )
            })?;
            if self.policy.compress {
                compress_file(&backup)?;
            }
        }

        self.open_active().map_err(|e| {
            LoggerError::file_rotation(
                self.path.display().to_string(),
                format!("Failed to create new log file: {}", e),
            )
        })?;

        self.remove_stale_backups()
    }

    fn name_parts(&self) -> (String, String) {
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("app")
            .to_string();
        let ext = self
            .path
            .extension()
            .and_then(|s| s.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        (stem, ext)
    }

    fn backup_path(&self, at: DateTime<Local>) -> PathBuf {
        let (stem, ext) = self.name_parts();
        self.path
            .with_file_name(format!("{}-{}{}", stem, format_backup_time(&at), ext))
    }

    /// Backup path for `at`, nudged forward a millisecond at a time on collision
    fn unused_backup_path(&self, mut at: DateTime<Local>) -> (PathBuf, DateTime<Local>) {
        loop {
            let candidate = self.backup_path(at);
            let mut compressed = candidate.clone().into_os_string();
            compressed.push(".gz");
            if !candidate.exists() && !Path::new(&compressed).exists() {
                return (candidate, at);
            }
            at += chrono::Duration::milliseconds(1);
        }
    }

    /// Backups of this file, newest first
    fn backups(&self) -> Result<Vec<Backup>> {
        let (stem, ext) = self.name_parts();
        let prefix = format!("{}-", stem);
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let entries = fs::read_dir(&dir).map_err(|e| {
            LoggerError::io_operation(
                "list backups",
                format!("Failed to read directory '{}'", dir.display()),
                e,
            )
        })?;

        let mut backups: Vec<Backup> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let rest = name.strip_prefix(&prefix)?;
                let rest = rest.strip_suffix(".gz").unwrap_or(rest);
                let stamp = rest.strip_suffix(ext.as_str())?;
                let rotated_at = parse_backup_time(stamp)?;
                Some(Backup {
                    path: entry.path(),
                    rotated_at,
                })
            })
            .collect();

        backups.sort_by(|a, b| b.rotated_at.cmp(&a.rotated_at));
        Ok(backups)
    }

    fn remove_stale_backups(&self) -> Result<()> {
        if self.policy.max_backups == 0 && self.policy.max_age.is_none() {
            return Ok(());
        }

        let cutoff = self
            .policy
            .max_age
            .and_then(|age| chrono::Duration::from_std(age).ok())
            .map(|age| Local::now() - age);

        let mut failures = Vec::new();
        for (index, backup) in self.backups()?.into_iter().enumerate() {
            let over_count = self.policy.max_backups > 0 && index >= self.policy.max_backups;
            let too_old = cutoff.map_or(false, |cutoff| backup.rotated_at < cutoff);
            if !(over_count || too_old) {
                continue;
            }
            if let Err(e) = fs::remove_file(&backup.path) {
                failures.push(format!("{}: {}", backup.path.display(), e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(LoggerError::file_rotation(
                self.path.display().to_string(),
                format!("Failed to remove old backups: {}", failures.join("; ")),
            ))
        }
    }
}

/// Gzip `path` into `<path>.gz`, removing the original only on success
fn compress_file(path: &Path) -> Result<()> {
    use std::io::{BufReader, Read};

    let mut gz_path = path.as_os_str().to_owned();
    gz_path.push(".gz");
    let gz_path = PathBuf::from(gz_path);
    let mut temp_path = gz_path.clone().into_os_string();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    let input = File::open(path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to open file for compression: {}", path.display()),
            e,
        )
    })?;
    let mut reader = BufReader::with_capacity(64 * 1024, input);

    let output = File::create(&temp_path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to create temporary compressed file: {}", temp_path.display()),
            e,
        )
    })?;
    let mut encoder = flate2::write::GzEncoder::new(
        BufWriter::with_capacity(64 * 1024, output),
        flate2::Compression::default(),
    );

    let mut buffer = vec![0u8; 64 * 1024];
    let streamed: std::io::Result<()> = (|| {
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            encoder.write_all(&buffer[..bytes_read])?;
        }
        encoder.finish()?.flush()
    })();

    if let Err(e) = streamed {
        let _ = fs::remove_file(&temp_path);
        return Err(LoggerError::io_operation(
            "compress log file",
            format!("Failed to compress '{}'", path.display()),
            e,
        ));
    }

    fs::rename(&temp_path, &gz_path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to rename compressed file to: {}", gz_path.display()),
            e,
        )
    })?;

    if let Err(e) = fs::remove_file(path) {
        eprintln!(
            "[LOGGER WARNING] Compression succeeded but failed to remove original file {}: {}",
            path.display(),
            e
        );
    }
    Ok(())
}

struct RotationWorker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl RotationWorker {
    fn spawn(file: Arc<Mutex<RotatingFile>>, interval: Duration) -> Result<Self> {
        let (stop, stopped) = crossbeam_channel::bounded::<()>(1);
        let ticker = crossbeam_channel::tick(interval);
        let flusher = crossbeam_channel::tick(FLUSH_INTERVAL);

        let handle = std::thread::Builder::new()
            .name("log-rotation".to_string())
            .spawn(move || loop {
                select! {
                    recv(ticker) -> _ => {
                        if let Err(e) = file.lock().rotate() {
                            diagnostics().report_rotation_failure(&e);
                        }
                    }
                    recv(flusher) -> _ => {
                        if let Err(e) = file.lock().flush() {
                            diagnostics().report_sync_failure("rotating_file", &e);
                        }
                    }
                    recv(stopped) -> _ => break,
                }
            })
            .map_err(|e| {
                LoggerError::io_operation("spawn rotation thread", "Failed to start thread", e)
            })?;

        Ok(Self { stop, handle })
    }

    fn stop(self) {
        let _ = self.stop.send(());
        if self.handle.join().is_err() {
            eprintln!("[LOGGER ERROR] Rotation thread panicked");
        }
    }
}

/// File sink with size-triggered and scheduled rotation
///
/// # Examples
///
/// ```no_run
/// use logkit::config::FileLogConfig;
/// use logkit::core::Sink;
/// use logkit::sinks::RotatingFileSink;
///
/// let cfg = FileLogConfig::new("/var/log/orders/app.log")
///     .with_max_size(100)
///     .with_max_backups(5);
/// let sink = RotatingFileSink::new(&cfg).unwrap();
/// sink.write(b"{\"msg\":\"started\"}\n").unwrap();
/// sink.close().unwrap();
/// ```
pub struct RotatingFileSink {
    path: PathBuf,
    file: Arc<Mutex<RotatingFile>>,
    worker: Mutex<Option<RotationWorker>>,
}

impl RotatingFileSink {
    /// Open the sink described by `cfg`, with the hourly forced rotation
    pub fn new(cfg: &FileLogConfig) -> Result<Self> {
        Self::open(cfg.path(), RotationPolicy::from(cfg))
    }

    /// Open `path` with an explicit policy, with the hourly forced rotation
    pub fn open<P: AsRef<Path>>(path: P, policy: RotationPolicy) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = Arc::new(Mutex::new(RotatingFile::open(path.clone(), policy)?));
        let worker = RotationWorker::spawn(Arc::clone(&file), FORCED_ROTATION_INTERVAL)?;
        Ok(Self {
            path,
            file,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Restart the background rotation on a different period
    pub fn with_rotation_interval(self, interval: Duration) -> Result<Self> {
        self.stop_worker();
        let worker = RotationWorker::spawn(Arc::clone(&self.file), interval)?;
        *self.worker.lock() = Some(worker);
        Ok(self)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> RotationPolicy {
        self.file.lock().policy.clone()
    }

    /// Bytes in the active file, including buffered ones
    pub fn current_size(&self) -> u64 {
        self.file.lock().current_size
    }

    /// Rotate now, regardless of size
    pub fn rotate(&self) -> Result<()> {
        self.file.lock().rotate()
    }

    /// Rotated files next to the active one, newest first
    pub fn backups(&self) -> Result<Vec<Backup>> {
        self.file.lock().backups()
    }

    /// Whether the background rotation and flush thread is running
    pub fn is_rotating(&self) -> bool {
        self.worker.lock().is_some()
    }

    fn stop_worker(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.stop();
        }
    }
}

impl Sink for RotatingFileSink {
    fn write(&self, buf: &[u8]) -> Result<()> {
        self.file.lock().write(buf)
    }

    fn flush(&self) -> Result<()> {
        self.file.lock().flush()
    }

    fn close(&self) -> Result<()> {
        self.stop_worker();
        self.flush()
    }

    fn name(&self) -> &str {
        "rotating_file"
    }
}

impl Drop for RotatingFileSink {
    fn drop(&mut self) {
        self.stop_worker();
        if let Err(e) = self.file.lock().flush() {
            diagnostics().report_sync_failure(self.name(), &e);
        }
    }
}
