use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{FocflError, Result};
use crate::ocfl::util;
use crate::persist::ResourceId;

/// Maps a logical resource id to the OCFL object that stores it and to the root resource
/// within that object. Atomic resources map to themselves; archival group members map to
/// the group.
#[derive(Deserialize, Serialize, Debug, Eq, PartialEq, Clone)]
pub struct Mapping {
    pub ocfl_id: String,
    pub root_id: ResourceId,
}

/// The persistent Fedora to OCFL index. Committed mappings are shared process-wide;
/// sessions stage additions and removals in a delta that becomes visible to everyone
/// only when the session commits.
pub struct OcflIndex {
    index_path: PathBuf,
    state: RwLock<IndexState>,
    deltas: Mutex<HashMap<String, SessionDelta>>,
}

#[derive(Default)]
struct IndexState {
    forward: BTreeMap<ResourceId, Mapping>,
    /// Rebuilt from the forward map; never persisted
    reverse: HashMap<String, HashSet<ResourceId>>,
}

#[derive(Default)]
struct SessionDelta {
    adds: BTreeMap<ResourceId, Mapping>,
    removes: HashSet<ResourceId>,
}

impl Mapping {
    pub fn new(ocfl_id: impl Into<String>, root_id: ResourceId) -> Self {
        Self {
            ocfl_id: ocfl_id.into(),
            root_id,
        }
    }
}

impl OcflIndex {
    /// Opens the index, loading any previously persisted mappings
    pub fn open(index_path: impl AsRef<Path>) -> Result<Self> {
        let index_path = index_path.as_ref().to_path_buf();

        let forward: BTreeMap<ResourceId, Mapping> = if index_path.exists() {
            serde_json::from_slice(&fs::read(&index_path)?)?
        } else {
            BTreeMap::new()
        };

        let mut state = IndexState {
            forward,
            reverse: HashMap::new(),
        };
        state.rebuild_reverse();

        info!(
            "Opened resource index at {} with {} mappings",
            index_path.to_string_lossy(),
            state.forward.len()
        );

        Ok(Self {
            index_path,
            state: RwLock::new(state),
            deltas: Mutex::new(HashMap::new()),
        })
    }

    /// Resolves a resource id, consulting the session's staged delta first when a session
    /// is provided.
    pub fn get(&self, session_id: Option<&str>, id: &ResourceId) -> Result<Mapping> {
        if let Some(session_id) = session_id {
            let deltas = self.deltas.lock().unwrap();
            if let Some(delta) = deltas.get(session_id) {
                if delta.removes.contains(id) {
                    return Err(FocflError::NotFound(format!("Resource {}", id)));
                }
                if let Some(mapping) = delta.adds.get(id) {
                    return Ok(mapping.clone());
                }
            }
        }

        self.state
            .read()
            .unwrap()
            .forward
            .get(id)
            .cloned()
            .ok_or_else(|| FocflError::NotFound(format!("Resource {}", id)))
    }

    /// Stages a new mapping in the session's delta
    pub fn add(&self, session_id: &str, id: ResourceId, mapping: Mapping) {
        let mut deltas = self.deltas.lock().unwrap();
        let delta = deltas.entry(session_id.to_string()).or_default();
        delta.removes.remove(&id);
        delta.adds.insert(id, mapping);
    }

    /// Stages the removal of a mapping in the session's delta
    pub fn remove(&self, session_id: &str, id: &ResourceId) {
        let mut deltas = self.deltas.lock().unwrap();
        let delta = deltas.entry(session_id.to_string()).or_default();
        delta.adds.remove(id);
        delta.removes.insert(id.clone());
    }

    /// Returns every resource id mapped into the OCFL object, as seen by the session
    pub fn ids_for_object(&self, session_id: Option<&str>, ocfl_id: &str) -> Vec<ResourceId> {
        let mut ids: HashSet<ResourceId> = self
            .state
            .read()
            .unwrap()
            .reverse
            .get(ocfl_id)
            .cloned()
            .unwrap_or_default();

        if let Some(session_id) = session_id {
            let deltas = self.deltas.lock().unwrap();
            if let Some(delta) = deltas.get(session_id) {
                for (id, mapping) in &delta.adds {
                    if mapping.ocfl_id == ocfl_id {
                        ids.insert(id.clone());
                    }
                }
                for id in &delta.removes {
                    ids.remove(id);
                }
            }
        }

        let mut ids: Vec<ResourceId> = ids.into_iter().collect();
        ids.sort();
        ids
    }

    /// Applies the session's delta to the committed state and persists it
    pub fn commit(&self, session_id: &str) -> Result<()> {
        let delta = self.deltas.lock().unwrap().remove(session_id);

        let delta = match delta {
            Some(delta) => delta,
            None => return Ok(()),
        };

        let mut state = self.state.write().unwrap();

        for id in &delta.removes {
            state.forward.remove(id);
        }
        for (id, mapping) in delta.adds {
            state.forward.insert(id, mapping);
        }
        state.rebuild_reverse();

        self.persist(&state)
    }

    /// Discards the session's staged delta
    pub fn rollback(&self, session_id: &str) {
        self.deltas.lock().unwrap().remove(session_id);
    }

    fn persist(&self, state: &IndexState) -> Result<()> {
        if let Some(parent) = self.index_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let bytes = serde_json::to_vec_pretty(&state.forward)?;
        util::write_atomic(&self.index_path, &bytes)
    }
}

impl IndexState {
    fn rebuild_reverse(&mut self) {
        self.reverse.clear();
        for (id, mapping) in &self.forward {
            self.reverse
                .entry(mapping.ocfl_id.clone())
                .or_default()
                .insert(id.clone());
        }
    }
}
