use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::error::{FocflError, Result};
use crate::ocfl::{
    util, ChangeSet, CommitMode, ObjectLock, ObjectStore, PreparedUpdate, StagedWrite, VersionNum,
};

/// Lifecycle of an object sub-session
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
enum OssState {
    Open,
    Prepared,
    Committed,
    Closed,
}

/// A staged change to a single logical path. A later write replaces an earlier write and a
/// later delete discards an earlier write, so at most one effective op remains per path.
#[derive(Debug)]
enum PendingOp {
    Write(PathBuf),
    Delete,
}

/// Accumulates every change a storage session makes to one OCFL object and applies them
/// through the store's prepare/commit protocol. All staged content lives in a subtree of
/// the owning session's staging directory.
pub struct ObjectSession {
    object_id: String,
    staging_dir: PathBuf,
    store: Arc<dyn ObjectStore>,
    inner: Mutex<Inner>,
}

struct Inner {
    state: OssState,
    commit_mode: CommitMode,
    pending: BTreeMap<String, PendingOp>,
    purge: bool,
    prepared: Option<PreparedUpdate>,
    /// Held from prepare until close so no other session can touch the object mid-commit
    lock: Option<ObjectLock>,
}

impl ObjectSession {
    pub fn new(
        object_id: &str,
        staging_dir: PathBuf,
        store: Arc<dyn ObjectStore>,
        commit_mode: CommitMode,
    ) -> Result<Self> {
        fs::create_dir_all(&staging_dir)?;

        Ok(Self {
            object_id: object_id.to_string(),
            staging_dir,
            store,
            inner: Mutex::new(Inner {
                state: OssState::Open,
                commit_mode,
                pending: BTreeMap::new(),
                purge: false,
                prepared: None,
                lock: None,
            }),
        })
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn commit_mode(&self) -> CommitMode {
        self.inner.lock().unwrap().commit_mode
    }

    pub fn set_commit_mode(&self, mode: CommitMode) {
        self.inner.lock().unwrap().commit_mode = mode;
    }

    pub fn has_pending_changes(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.purge || !inner.pending.is_empty()
    }

    /// Stages new content at the logical path, replacing any previously staged write
    pub fn stage_write(&self, logical_path: &str, bytes: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        self.ensure_open(&inner)?;
        self.ensure_not_purged(&inner)?;

        let staged_path = self.staged_path(logical_path);
        if let Some(parent) = staged_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&staged_path, bytes)?;

        inner
            .pending
            .insert(logical_path.to_string(), PendingOp::Write(staged_path));

        Ok(())
    }

    /// Stages the removal of the logical path, discarding any previously staged write
    pub fn stage_delete(&self, logical_path: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        self.ensure_open(&inner)?;
        self.ensure_not_purged(&inner)?;

        if let Some(PendingOp::Write(staged)) = inner.pending.get(logical_path) {
            util::remove_file_ignore_not_found(staged)?;
        }

        inner
            .pending
            .insert(logical_path.to_string(), PendingOp::Delete);

        Ok(())
    }

    /// Converts the sub-session into a whole-object purge, discarding staged path ops
    pub fn mark_purge(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        self.ensure_open(&inner)?;

        inner.pending.clear();
        inner.purge = true;

        Ok(())
    }

    /// Reads the logical path, preferring staged content for head reads. Version reads
    /// always go to the store: staged content has no version number yet.
    pub fn read(
        &self,
        logical_path: &str,
        version: Option<VersionNum>,
        sink: &mut dyn Write,
    ) -> Result<()> {
        if version.is_none() {
            let inner = self.inner.lock().unwrap();

            if inner.purge {
                return Err(FocflError::NotFound(format!(
                    "Object {} is staged for purge",
                    self.object_id
                )));
            }

            match inner.pending.get(logical_path) {
                Some(PendingOp::Write(staged)) => {
                    let mut file = File::open(staged)?;
                    io::copy(&mut file, sink)?;
                    return Ok(());
                }
                Some(PendingOp::Delete) => {
                    return Err(FocflError::NotFound(format!(
                        "Path {} in object {}",
                        logical_path, self.object_id
                    )));
                }
                None => {}
            }
        }

        self.store
            .read(&self.object_id, logical_path, version, sink)
    }

    /// Returns the logical paths the object's head will contain if this sub-session
    /// commits: the store's head paths adjusted for staged writes and deletes.
    pub fn effective_head_paths(&self) -> Result<Vec<String>> {
        let mut paths: std::collections::BTreeSet<String> =
            self.store.head_paths(&self.object_id)?.into_iter().collect();

        let inner = self.inner.lock().unwrap();

        if inner.purge {
            return Ok(Vec::new());
        }

        for (logical_path, op) in &inner.pending {
            match op {
                PendingOp::Write(_) => {
                    paths.insert(logical_path.clone());
                }
                PendingOp::Delete => {
                    paths.remove(logical_path);
                }
            }
        }

        Ok(paths.into_iter().collect())
    }

    /// Validates the pending change set and materializes it in the store's temporary
    /// area. Acquires the store's object lock, which is held until `close`.
    pub fn prepare(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();

        if inner.state != OssState::Open {
            return Err(FocflError::IllegalState(format!(
                "Cannot prepare object {} in state {:?}",
                self.object_id, inner.state
            )));
        }

        inner.lock = Some(self.store.acquire_lock(&self.object_id)?);

        let prepared = if inner.purge {
            PreparedUpdate::Purge {
                object_id: self.object_id.clone(),
            }
        } else {
            let mut writes = Vec::new();
            let mut deletes = Vec::new();

            for (logical_path, op) in &inner.pending {
                match op {
                    PendingOp::Write(staged) => writes.push(StagedWrite {
                        logical_path: logical_path.clone(),
                        source: staged.clone(),
                    }),
                    PendingOp::Delete => deletes.push(logical_path.clone()),
                }
            }

            let change_set = ChangeSet {
                object_id: self.object_id.clone(),
                writes,
                deletes,
                message: None,
            };

            self.store.prepare(change_set, inner.commit_mode)?
        };

        inner.prepared = Some(prepared);
        inner.state = OssState::Prepared;

        Ok(())
    }

    /// Promotes the prepared update into the object's durable layout
    pub fn commit(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();

        if inner.state != OssState::Prepared {
            return Err(FocflError::IllegalState(format!(
                "Cannot commit object {} in state {:?}",
                self.object_id, inner.state
            )));
        }

        let prepared = inner
            .prepared
            .take()
            .expect("a prepared sub-session must hold a prepared update");

        self.store.commit(prepared)?;
        inner.state = OssState::Committed;

        info!("Object sub-session for {} committed", self.object_id);

        Ok(())
    }

    /// Releases the sub-session. Safe to call in any state; uncommitted prepared work is
    /// discarded and the object lock is released.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();

        if let Some(prepared) = inner.prepared.take() {
            if let Err(e) = self.store.discard(prepared) {
                warn!(
                    "Failed to discard prepared update for object {}: {}",
                    self.object_id, e
                );
            }
        }

        inner.lock = None;
        inner.state = OssState::Closed;
    }

    fn ensure_open(&self, inner: &Inner) -> Result<()> {
        if inner.state != OssState::Open {
            return Err(FocflError::IllegalState(format!(
                "Object sub-session for {} is {:?}",
                self.object_id, inner.state
            )));
        }
        Ok(())
    }

    fn ensure_not_purged(&self, inner: &Inner) -> Result<()> {
        if inner.purge {
            return Err(FocflError::IllegalState(format!(
                "Object {} is staged for purge",
                self.object_id
            )));
        }
        Ok(())
    }

    /// Where staged content for the logical path lives within the session staging area
    fn staged_path(&self, logical_path: &str) -> PathBuf {
        self.staging_dir.join(logical_path)
    }
}
