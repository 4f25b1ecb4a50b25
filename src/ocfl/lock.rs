use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process;

use log::error;

use crate::error::{FocflError, Result};
use crate::ocfl::{layout, util};

/// Advisory per-object write locks backed by lock files.
///
/// Lock files are named with the same encoding the store uses for object directories, so
/// the lock namespace maps one-to-one onto object roots. Each lock file is stamped with
/// its holder, and a contention error reports that stamp, which matters when several
/// processes share one storage root.
pub struct ObjectLocks {
    locks_dir: PathBuf,
}

/// Exclusive hold on one object, released when the guard drops
pub struct ObjectLock {
    object_id: String,
    lock_file: PathBuf,
}

impl ObjectLocks {
    /// Creates a lock registry rooted at `locks_dir`. The directory must already exist.
    pub fn new(locks_dir: impl AsRef<Path>) -> Self {
        Self {
            locks_dir: locks_dir.as_ref().to_path_buf(),
        }
    }

    /// Attempts to take the exclusive lock on the object without blocking. The lock is
    /// not reentrant; a second attempt fails with `FocflError::Locked` naming the holder
    /// recorded in the lock file.
    pub fn try_lock(&self, object_id: &str) -> Result<ObjectLock> {
        let lock_file = self.lock_file(object_id);

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_file)
        {
            Ok(mut file) => {
                // The lock is held once the file exists; the stamp is diagnostics only
                let _ = write!(file, "pid {}", process::id());
                Ok(ObjectLock {
                    object_id: object_id.to_string(),
                    lock_file,
                })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(FocflError::Locked {
                object_id: object_id.to_string(),
                message: format!("held by {}", read_holder(&lock_file)),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn lock_file(&self, object_id: &str) -> PathBuf {
        self.locks_dir
            .join(format!("{}.lock", layout::object_root_name(object_id)))
    }
}

impl ObjectLock {
    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

impl Drop for ObjectLock {
    fn drop(&mut self) {
        if let Err(e) = util::remove_file_ignore_not_found(&self.lock_file) {
            error!("Failed to release lock on object {}: {}", self.object_id, e);
        }
    }
}

fn read_holder(lock_file: &Path) -> String {
    match fs::read_to_string(lock_file) {
        Ok(holder) if !holder.trim().is_empty() => holder.trim().to_string(),
        _ => "an unknown holder".to_string(),
    }
}
