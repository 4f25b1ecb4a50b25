use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::config::Config;
use crate::error::{FocflError, Result};
use crate::ocfl::{layout, FsObjectStore, ObjectStore};
use crate::persist::index::OcflIndex;
use crate::persist::session::{SessionState, StorageSession};

/// Hands out storage sessions by transaction id and reaps the staging directories of
/// sessions that were abandoned without a commit or rollback.
pub struct SessionManager {
    config: Config,
    store: Arc<dyn ObjectStore>,
    index: Arc<OcflIndex>,
    sessions: Mutex<HashMap<String, Arc<StorageSession>>>,
}

impl SessionManager {
    /// Opens the repository at the configured storage root
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::open(&config.storage_root)?);
        Self::with_store(config, store)
    }

    /// Opens the repository against a caller supplied object store
    pub fn with_store(config: Config, store: Arc<dyn ObjectStore>) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.session_staging_root)?;

        let index = Arc::new(OcflIndex::open(&config.index_path)?);

        Ok(Self {
            config,
            store,
            index,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the read-write session bound to the transaction id, creating it on first
    /// request. Concurrent calls for the same id observe the same instance.
    pub fn session(&self, tx_id: &str) -> Result<Arc<StorageSession>> {
        if tx_id.trim().is_empty() {
            return Err(FocflError::IllegalArgument(
                "Transaction ids may not be blank".to_string(),
            ));
        }

        let mut sessions = self.sessions.lock().unwrap();

        if let Some(existing) = sessions.get(tx_id) {
            if !is_terminal(existing.state()) {
                return Ok(existing.clone());
            }
        }

        let staging_dir = self
            .config
            .session_staging_root
            .join(layout::object_root_name(tx_id));

        let session = Arc::new(StorageSession::writable(
            tx_id.to_string(),
            staging_dir,
            self.store.clone(),
            self.index.clone(),
            self.config.commit_mode_default,
            self.config.rollback_drain_timeout(),
        )?);

        sessions.insert(tx_id.to_string(), session.clone());

        info!("Opened storage session {}", tx_id);

        Ok(session)
    }

    /// Returns a transient read-only session. Read-only sessions have no id, no staging
    /// directory, and treat commit and rollback as no-ops.
    pub fn read_only(&self) -> StorageSession {
        StorageSession::read_only(self.store.clone(), self.index.clone())
    }

    /// Removes staging directories left behind by sessions that were neither committed
    /// nor rolled back within the configured timeout. Returns the number of directories
    /// removed.
    pub fn reap_orphaned(&self) -> Result<usize> {
        let live: HashSet<String> = {
            let mut sessions = self.sessions.lock().unwrap();
            sessions.retain(|_, session| !is_terminal(session.state()));
            sessions
                .keys()
                .map(|tx_id| layout::object_root_name(tx_id))
                .collect()
        };

        let staging_root = &self.config.session_staging_root;
        if !staging_root.exists() {
            return Ok(0);
        }

        let mut reaped = 0;

        for entry in fs::read_dir(staging_root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            if live.contains(&name) {
                continue;
            }

            let age = entry
                .metadata()?
                .modified()?
                .elapsed()
                .unwrap_or_default();

            if age >= self.config.orphan_session_timeout() {
                warn!("Reaping orphaned session staging directory {}", name);
                if let Err(e) = fs::remove_dir_all(entry.path()) {
                    warn!("Failed to remove staging directory {}: {}", name, e);
                } else {
                    reaped += 1;
                }
            }
        }

        Ok(reaped)
    }
}

fn is_terminal(state: SessionState) -> bool {
    matches!(
        state,
        SessionState::Committed | SessionState::RolledBack | SessionState::RollbackFailed
    )
}
