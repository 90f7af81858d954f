//! Cross-process operation lock
//!
//! Two invocations racing on the same gadget could both see it unbound and
//! both rebind it. Mount and unmount hold an exclusive `flock` for their whole
//! detach, mutate, reattach sequence; a second invocation fails fast.

use std::fs::{File, OpenOptions};
use std::path::Path;

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use tracing::debug;

use crate::error::{AppError, Result};

/// Held exclusive lock; released on drop
pub struct OperationLock {
    _lock: Flock<File>,
}

impl OperationLock {
    /// Take the lock at `path` without waiting
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| AppError::io(path, e))?;

        let lock = Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|(_, errno)| {
            if errno == Errno::EWOULDBLOCK {
                AppError::Busy(format!(
                    "another usbdrive operation holds {}",
                    path.display()
                ))
            } else {
                AppError::io(path, std::io::Error::from(errno))
            }
        })?;

        debug!("Acquired operation lock {}", path.display());
        Ok(Self { _lock: lock })
    }
}
