//! Fatal-stream capture
//!
//! Panics and aborts write to the process's stderr, which is often discarded
//! by service supervisors. Redirecting stderr into `panic.log` next to the
//! log files keeps those messages.

use crate::core::{LoggerError, Result};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

pub const PANIC_FILE_NAME: &str = "panic.log";

/// Path of the panic file for a base log file
pub fn panic_log_path(log_path: &Path) -> PathBuf {
    match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(PANIC_FILE_NAME),
        _ => PathBuf::from(PANIC_FILE_NAME),
    }
}

/// Point the process's stderr at `<dir of log_path>/panic.log`
///
/// Does nothing for an empty path. On non-unix targets this succeeds without
/// redirecting.
pub fn redirect_fatal_stream<P: AsRef<Path>>(log_path: P) -> Result<()> {
    let log_path = log_path.as_ref();
    if log_path.as_os_str().is_empty() {
        return Ok(());
    }

    let panic_path = panic_log_path(log_path);
    if let Some(dir) = panic_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| {
            LoggerError::io_operation(
                "create panic log directory",
                format!("Failed to create directory '{}'", dir.display()),
                e,
            )
        })?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .read(true)
        .open(&panic_path)
        .map_err(|e| {
            LoggerError::io_operation(
                "open panic log",
                format!("Failed to open '{}'", panic_path.display()),
                e,
            )
        })?;

    redirect_stderr(&file)
}

#[cfg(unix)]
fn redirect_stderr(file: &File) -> Result<()> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: both descriptors are open for the duration of the call; dup2
    // atomically replaces fd 2 and the file may be closed afterwards.
    let rc = unsafe { libc::dup2(file.as_raw_fd(), libc::STDERR_FILENO) };
    if rc == -1 {
        return Err(LoggerError::io_operation(
            "redirect stderr",
            "dup2 onto stderr failed",
            std::io::Error::last_os_error(),
        ));
    }
    Ok(())
}

#[cfg(not(unix))]
fn redirect_stderr(_file: &File) -> Result<()> {
    Ok(())
}
