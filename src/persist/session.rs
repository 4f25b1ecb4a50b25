use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local};
use log::{info, warn};
use strum_macros::Display as EnumDisplay;

use crate::error::{FocflError, Result, RollbackError};
use crate::ocfl::consts::INDEX_COMMIT_TARGET;
use crate::ocfl::{layout, util, CommitMode, ObjectStore, VersionDetails, VersionNum};
use crate::persist::headers::{
    binary_body_logical_path, container_body_logical_path, headers_logical_path,
    InteractionModel, ResourceHeaders,
};
use crate::persist::index::OcflIndex;
use crate::persist::inflight::InflightCounter;
use crate::persist::object_session::ObjectSession;
use crate::persist::ops::ResourceOperation;
use crate::persist::persister::Persister;
use crate::persist::ResourceId;

/// Lifecycle of a storage session. Transitions are monotonic; the terminal states are
/// `Committed`, `RolledBack`, and `RollbackFailed`.
#[derive(Debug, Eq, PartialEq, Copy, Clone, EnumDisplay)]
pub enum SessionState {
    #[strum(serialize = "open")]
    Open,
    #[strum(serialize = "commit-started")]
    CommitStarted,
    #[strum(serialize = "prepare-failed")]
    PrepareFailed,
    #[strum(serialize = "committed")]
    Committed,
    #[strum(serialize = "commit-failed")]
    CommitFailed,
    #[strum(serialize = "rolling-back")]
    RollingBack,
    #[strum(serialize = "rolled-back")]
    RolledBack,
    #[strum(serialize = "rollback-failed")]
    RollbackFailed,
}

/// The transactional facade over the object store and the resource index. A session
/// accumulates staged changes across any number of objects and applies them with a
/// two-phase commit that visits objects in a stable order.
///
/// A session may be driven from multiple threads: persists register on an in-flight
/// counter and commit/rollback wait for it to drain before touching the store.
pub struct StorageSession {
    /// `None` for read-only sessions
    session_id: Option<String>,
    staging_dir: Option<PathBuf>,
    store: Arc<dyn ObjectStore>,
    index: Arc<OcflIndex>,
    commit_mode: CommitMode,
    drain_timeout: Duration,
    state: Mutex<SessionState>,
    registry: Mutex<BTreeMap<String, Arc<ObjectSession>>>,
    /// Object sub-sessions that already committed, kept so rollback can attempt to undo them
    committed: Mutex<Vec<Arc<ObjectSession>>>,
    inflight: InflightCounter,
}

impl StorageSession {
    pub(crate) fn writable(
        session_id: String,
        staging_dir: PathBuf,
        store: Arc<dyn ObjectStore>,
        index: Arc<OcflIndex>,
        commit_mode: CommitMode,
        drain_timeout: Duration,
    ) -> Result<Self> {
        fs::create_dir_all(&staging_dir)?;

        Ok(Self {
            session_id: Some(session_id),
            staging_dir: Some(staging_dir),
            store,
            index,
            commit_mode,
            drain_timeout,
            state: Mutex::new(SessionState::Open),
            registry: Mutex::new(BTreeMap::new()),
            committed: Mutex::new(Vec::new()),
            inflight: InflightCounter::new(),
        })
    }

    pub(crate) fn read_only(store: Arc<dyn ObjectStore>, index: Arc<OcflIndex>) -> Self {
        Self {
            session_id: None,
            staging_dir: None,
            store,
            index,
            commit_mode: CommitMode::NewVersion,
            drain_timeout: Duration::from_millis(0),
            state: Mutex::new(SessionState::Open),
            registry: Mutex::new(BTreeMap::new()),
            committed: Mutex::new(Vec::new()),
            inflight: InflightCounter::new(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn is_read_only(&self) -> bool {
        self.session_id.is_none()
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    /// Stages a resource operation. Any number of persists may run concurrently; each one
    /// registers on the in-flight counter so commit and rollback can wait them out.
    /// Failures bubble up immediately and leave the session open.
    pub fn persist(&self, operation: ResourceOperation) -> Result<()> {
        if self.is_read_only() {
            return Err(FocflError::UnsupportedOperation(
                "Cannot persist to a read-only session".to_string(),
            ));
        }

        // Registering while holding the state lock means commit cannot slip between the
        // state check and the registration.
        let _guard = {
            let state = self.state.lock().unwrap();
            if *state != SessionState::Open {
                return Err(FocflError::SessionClosed(self.display_id()));
            }
            self.inflight.register()
        };

        operation.stage(self)
    }

    /// Returns the resource's header sidecar
    pub fn get_headers(
        &self,
        id: &ResourceId,
        version: Option<VersionNum>,
    ) -> Result<ResourceHeaders> {
        self.ensure_readable()?;
        self.read_headers(id, version)
    }

    /// Returns the serialized triples of an RDF source
    pub fn get_triples(&self, id: &ResourceId, version: Option<VersionNum>) -> Result<Vec<u8>> {
        self.ensure_readable()?;

        let (headers, relative_path, ocfl_id) = self.locate(id, version)?;

        if headers.interaction_model != InteractionModel::BasicContainer {
            return Err(FocflError::IllegalArgument(format!(
                "Resource {} is not an RDF source",
                id
            )));
        }

        self.read_logical(&ocfl_id, &container_body_logical_path(&relative_path), version)
    }

    /// Returns the content of a non-RDF source
    pub fn get_binary(&self, id: &ResourceId, version: Option<VersionNum>) -> Result<Vec<u8>> {
        self.ensure_readable()?;

        let (headers, relative_path, ocfl_id) = self.locate(id, version)?;

        if headers.interaction_model != InteractionModel::NonRdfSource {
            return Err(FocflError::IllegalArgument(format!(
                "Resource {} is not a non-RDF source",
                id
            )));
        }

        self.read_logical(
            &ocfl_id,
            &binary_body_logical_path(&relative_path, id.last_segment()),
            version,
        )
    }

    /// Returns the immutable versions that contain the resource, in ascending order
    pub fn list_versions(&self, id: &ResourceId) -> Result<Vec<VersionDetails>> {
        self.ensure_readable()?;

        let mapping = self.index.get(self.session_id(), id)?;
        let relative_path = self.relative_path(id, &mapping.root_id)?;
        let headers_path = headers_logical_path(&relative_path);

        let mut versions = Vec::new();
        for details in self.store.list_versions(&mapping.ocfl_id)? {
            if self
                .store
                .contains_path(&mapping.ocfl_id, &headers_path, details.version_num)?
            {
                versions.push(details);
            }
        }

        Ok(versions)
    }

    /// Resolves a memento timestamp to the most recent version created at or before it
    pub fn version_at(
        &self,
        id: &ResourceId,
        timestamp: DateTime<Local>,
    ) -> Result<VersionDetails> {
        let versions = self.list_versions(id)?;

        versions
            .into_iter()
            .rev()
            .find(|v| v.created <= timestamp)
            .ok_or_else(|| {
                FocflError::NotFound(format!("Resource {} has no version at {}", id, timestamp))
            })
    }

    /// Pre-commit hook. The two-phase work happens inside `commit`, which can only run
    /// once in-flight persists have drained; this asserts the session is still able to
    /// commit so callers can fail fast before starting the drain.
    pub fn prepare(&self) -> Result<()> {
        if self.is_read_only() {
            return Ok(());
        }

        if self.state() != SessionState::Open {
            return Err(FocflError::SessionClosed(self.display_id()));
        }

        Ok(())
    }

    /// Commits the session: drains in-flight persists, prepares every touched object in
    /// ascending object-id order, commits them in the same order, then commits the
    /// resource index and removes the staging directory.
    pub fn commit(&self) -> Result<()> {
        let session_id = match &self.session_id {
            // Read-only sessions have nothing to commit
            None => return Ok(()),
            Some(session_id) => session_id,
        };

        {
            let mut state = self.state.lock().unwrap();
            if *state != SessionState::Open {
                return Err(FocflError::SessionClosed(self.display_id()));
            }
            *state = SessionState::CommitStarted;
        }

        info!("Committing session {}", session_id);

        // No new persists can register; wait for the stragglers
        self.inflight.await_zero();

        let mut sessions: Vec<Arc<ObjectSession>> =
            self.registry.lock().unwrap().values().cloned().collect();
        sessions.sort_by(|a, b| a.object_id().cmp(b.object_id()));

        for object_session in &sessions {
            if let Err(e) = object_session.prepare() {
                self.set_state(SessionState::PrepareFailed);
                return Err(FocflError::PrepareFailed {
                    object_id: object_session.object_id().to_string(),
                    source: Box::new(e),
                });
            }
        }

        for object_session in &sessions {
            match object_session.commit() {
                Ok(()) => {
                    self.committed.lock().unwrap().push(object_session.clone());
                    object_session.close();
                }
                Err(e) => {
                    self.set_state(SessionState::CommitFailed);
                    return Err(FocflError::CommitFailed {
                        object_id: object_session.object_id().to_string(),
                        source: Box::new(e),
                    });
                }
            }
        }

        // The index commits only after every object is durable
        if let Err(e) = self.index.commit(session_id) {
            self.set_state(SessionState::CommitFailed);
            return Err(FocflError::CommitFailed {
                object_id: INDEX_COMMIT_TARGET.to_string(),
                source: Box::new(e),
            });
        }

        self.remove_staging_dir();
        self.set_state(SessionState::Committed);

        info!("Session {} committed", session_id);

        Ok(())
    }

    /// Rolls the session back. Valid from the open state and from a failed commit. Object
    /// sub-sessions that already committed cannot always be undone; each one that cannot
    /// is reported in the aggregated `RollbackFailed` error.
    pub fn rollback(&self) -> Result<()> {
        let session_id = match &self.session_id {
            // Read-only sessions have nothing to roll back
            None => return Ok(()),
            Some(session_id) => session_id,
        };

        let commit_started = {
            let state = self.state.lock().unwrap();
            match *state {
                SessionState::Open => false,
                SessionState::PrepareFailed | SessionState::CommitFailed => true,
                other => {
                    return Err(FocflError::IllegalState(format!(
                        "Cannot roll back session {} in state {}",
                        session_id, other
                    )));
                }
            }
        };

        // When commit never started persists may still be running; give them a bounded
        // window to drain. Timing out leaves the session untouched.
        if !commit_started && !self.inflight.await_zero_bounded(self.drain_timeout) {
            return Err(FocflError::RollbackFailed(RollbackError::drain_timeout(
                session_id,
            )));
        }

        {
            let mut state = self.state.lock().unwrap();
            match *state {
                SessionState::Open
                | SessionState::PrepareFailed
                | SessionState::CommitFailed => *state = SessionState::RollingBack,
                other => {
                    return Err(FocflError::IllegalState(format!(
                        "Cannot roll back session {} in state {}",
                        session_id, other
                    )));
                }
            }
        }

        info!("Rolling back session {}", session_id);

        let committed: Vec<Arc<ObjectSession>> = self.committed.lock().unwrap().clone();
        let all: Vec<Arc<ObjectSession>> =
            self.registry.lock().unwrap().values().cloned().collect();

        for object_session in &all {
            if !committed.iter().any(|c| Arc::ptr_eq(c, object_session)) {
                object_session.close();
            }
        }

        let mut failures = Vec::new();

        for object_session in &committed {
            match object_session.commit_mode() {
                CommitMode::MutableHead => failures.push(format!(
                    "object {}: changes were already committed to the mutable head",
                    object_session.object_id()
                )),
                CommitMode::NewVersion => {
                    if let Err(e) = self.store.revert_version(object_session.object_id()) {
                        failures.push(format!("object {}: {}", object_session.object_id(), e));
                    }
                }
            }
        }

        self.index.rollback(session_id);
        self.remove_staging_dir();

        if failures.is_empty() {
            self.set_state(SessionState::RolledBack);
            info!("Session {} rolled back", session_id);
            Ok(())
        } else {
            self.set_state(SessionState::RollbackFailed);
            Err(FocflError::RollbackFailed(RollbackError::new(failures)))
        }
    }

    /// The session id persisters stage index changes under. Read-only sessions have none.
    pub(crate) fn writer_id(&self) -> Result<&str> {
        self.session_id.as_deref().ok_or_else(|| {
            FocflError::UnsupportedOperation(
                "Cannot persist to a read-only session".to_string(),
            )
        })
    }

    pub(crate) fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub(crate) fn index(&self) -> &OcflIndex {
        &self.index
    }

    pub(crate) fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Returns the sub-session for the OCFL object, creating it on first touch
    pub(crate) fn object_session(&self, ocfl_id: &str) -> Result<Arc<ObjectSession>> {
        let staging_dir = self.staging_dir.as_ref().ok_or_else(|| {
            FocflError::UnsupportedOperation(
                "Cannot persist to a read-only session".to_string(),
            )
        })?;

        let mut registry = self.registry.lock().unwrap();

        if let Some(object_session) = registry.get(ocfl_id) {
            return Ok(object_session.clone());
        }

        let object_session = Arc::new(ObjectSession::new(
            ocfl_id,
            staging_dir.join(layout::object_root_name(ocfl_id)),
            self.store.clone(),
            self.commit_mode,
        )?);
        registry.insert(ocfl_id.to_string(), object_session.clone());

        Ok(object_session)
    }

    /// Returns the sub-session for the OCFL object only if the session already touched it
    pub(crate) fn existing_object_session(&self, ocfl_id: &str) -> Option<Arc<ObjectSession>> {
        self.registry.lock().unwrap().get(ocfl_id).cloned()
    }

    /// Reads a resource's headers without the public state check; persisters run while
    /// the session is draining into a commit and must still be able to resolve resources.
    pub(crate) fn read_headers(
        &self,
        id: &ResourceId,
        version: Option<VersionNum>,
    ) -> Result<ResourceHeaders> {
        let mapping = self.index.get(self.session_id(), id)?;
        let relative_path = self.relative_path(id, &mapping.root_id)?;

        let bytes = self.read_logical(
            &mapping.ocfl_id,
            &headers_logical_path(&relative_path),
            version,
        )?;

        ResourceHeaders::from_json(&bytes)
    }

    fn locate(
        &self,
        id: &ResourceId,
        version: Option<VersionNum>,
    ) -> Result<(ResourceHeaders, String, String)> {
        let mapping = self.index.get(self.session_id(), id)?;
        let relative_path = self.relative_path(id, &mapping.root_id)?;

        let headers = self.read_headers(id, version)?;

        if headers.deleted {
            return Err(FocflError::NotFound(format!(
                "Resource {} has been deleted",
                id
            )));
        }

        Ok((headers, relative_path, mapping.ocfl_id))
    }

    fn relative_path(&self, id: &ResourceId, root_id: &ResourceId) -> Result<String> {
        id.relative_to(root_id)
            .map(|rel| rel.to_string())
            .ok_or_else(|| {
                FocflError::IllegalState(format!(
                    "Resource {} is mapped to root {} but is not below it",
                    id, root_id
                ))
            })
    }

    /// Reads a logical path through the object's sub-session when one exists, so staged
    /// changes are visible to the session that made them.
    fn read_logical(
        &self,
        ocfl_id: &str,
        logical_path: &str,
        version: Option<VersionNum>,
    ) -> Result<Vec<u8>> {
        let object_session = {
            let registry = self.registry.lock().unwrap();
            registry.get(ocfl_id).cloned()
        };

        let mut bytes = Vec::new();

        match object_session {
            Some(object_session) => {
                object_session.read(logical_path, version, &mut bytes)?
            }
            None => self.store.read(ocfl_id, logical_path, version, &mut bytes)?,
        }

        Ok(bytes)
    }

    fn ensure_readable(&self) -> Result<()> {
        if self.session_id.is_some() && self.state() != SessionState::Open {
            return Err(FocflError::SessionClosed(self.display_id()));
        }
        Ok(())
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap() = state;
    }

    fn display_id(&self) -> String {
        self.session_id
            .clone()
            .unwrap_or_else(|| "read-only".to_string())
    }

    /// Best-effort staging cleanup; every terminal transition funnels through here
    fn remove_staging_dir(&self) {
        if let Some(staging_dir) = &self.staging_dir {
            if let Err(e) = util::remove_dir_all_ignore_not_found(staging_dir) {
                warn!(
                    "Failed to remove staging directory {}: {}",
                    staging_dir.to_string_lossy(),
                    e
                );
            }
        }
    }
}
