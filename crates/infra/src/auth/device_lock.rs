//! Cross-process device lock
//!
//! The PIV device is the one shared mutable resource in the system: batch
//! workers are separate OS processes, and two of them driving the device at
//! once corrupts the PC/SC session. The lock is an OS advisory lock on a
//! file keyed by device serial, held only around the on-device operation.
//! The kernel releases it when the holding process exits, so a crashed
//! holder never wedges the device and there is no stale-file takeover to
//! race on.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use fs2::FileExt;
use steward_domain::{Result, StewardError};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct DeviceLock {
    file: File,
}

impl DeviceLock {
    /// Acquire the lock for the device with the given serial, blocking up
    /// to `timeout`.
    ///
    /// # Errors
    /// Returns `StewardError::Signer` when the lock cannot be acquired
    /// within the timeout or the lock file cannot be opened.
    pub fn acquire<P: AsRef<Path>>(lock_dir: P, serial: u32, timeout: Duration) -> Result<Self> {
        let lock_file = lock_dir.as_ref().join(format!("steward-piv-{serial}.lock"));
        let deadline = Instant::now() + timeout;

        // The file is never deleted; existence carries no meaning, only the
        // advisory lock does. Deleting on release would reopen the window
        // where a waiter holds a lock on an unlinked inode while a fresh
        // holder locks a new file at the same path.
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_file)
            .map_err(|e| {
                StewardError::Signer(format!(
                    "failed to open device lock {}: {e}",
                    lock_file.display()
                ))
            })?;

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    // Holder PID is informational, for operators inspecting
                    // a contended lock; the flock itself is the lock.
                    let current_pid = std::process::id();
                    let _ = file.set_len(0);
                    let _ = write!(file, "{current_pid}");
                    tracing::debug!(serial, pid = current_pid, "device_lock.acquired");
                    return Ok(Self { file });
                }
                Err(_) if Instant::now() < deadline => std::thread::sleep(POLL_INTERVAL),
                Err(_) => {
                    return Err(StewardError::Signer(format!(
                        "device {serial} is locked by another process"
                    )));
                }
            }
        }
    }
}

impl Drop for DeviceLock {
    fn drop(&mut self) {
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            tracing::warn!(error = %e, "device_lock.release_failed");
        } else {
            tracing::debug!("device_lock.released");
        }
    }
}
