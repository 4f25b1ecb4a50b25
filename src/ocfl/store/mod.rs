use std::io::Write;
use std::path::PathBuf;

use crate::error::Result;
use crate::ocfl::inventory::Inventory;
use crate::ocfl::lock::ObjectLock;
use crate::ocfl::{CommitMode, VersionDetails, VersionNum};

pub mod fs;

/// The set of changes a storage session has accumulated for one OCFL object. Writes
/// reference files in the session's staging directory; deletes name logical paths that
/// must not appear in the next head state.
#[derive(Debug)]
pub struct ChangeSet {
    pub object_id: String,
    pub writes: Vec<StagedWrite>,
    pub deletes: Vec<String>,
    pub message: Option<String>,
}

/// A single staged file write
#[derive(Debug)]
pub struct StagedWrite {
    /// The logical path the file occupies within the object
    pub logical_path: String,
    /// The staged file holding the new content
    pub source: PathBuf,
}

/// A fully validated update that is ready to be promoted into an object's durable layout
#[derive(Debug)]
pub enum PreparedUpdate {
    Version(Box<PreparedVersion>),
    Purge { object_id: String },
}

/// A prepared version: the new inventory plus a temporary area containing every new
/// content file, laid out so that commit only needs to rename things into place.
#[derive(Debug)]
pub struct PreparedVersion {
    pub object_id: String,
    pub mode: CommitMode,
    pub version_num: VersionNum,
    pub prep_dir: PathBuf,
    pub inventory: Inventory,
    pub is_new_object: bool,
}

impl PreparedUpdate {
    pub fn object_id(&self) -> &str {
        match self {
            PreparedUpdate::Version(prepared) => &prepared.object_id,
            PreparedUpdate::Purge { object_id } => object_id,
        }
    }
}

/// OCFL storage interface. Implementations are responsible for interacting with the
/// physical files on disk.
pub trait ObjectStore: Send + Sync {
    /// Returns true if the object exists in the store, committed or with only a mutable head
    fn contains(&self, object_id: &str) -> Result<bool>;

    /// Returns true if the object has an unpromoted mutable head
    fn has_staged_changes(&self, object_id: &str) -> Result<bool>;

    /// Writes the file at the logical path to the sink. A `version` of `None` reads the
    /// head: the mutable head if one exists, the most recent immutable version otherwise.
    fn read(
        &self,
        object_id: &str,
        logical_path: &str,
        version: Option<VersionNum>,
        sink: &mut dyn Write,
    ) -> Result<()>;

    /// Returns every logical path in the object's head state. Returns an empty list if the
    /// object does not exist.
    fn head_paths(&self, object_id: &str) -> Result<Vec<String>>;

    /// Returns the metadata of the object's immutable versions in ascending order
    fn list_versions(&self, object_id: &str) -> Result<Vec<VersionDetails>>;

    /// Returns true if the logical path exists in the state of the specified immutable
    /// version
    fn contains_path(
        &self,
        object_id: &str,
        logical_path: &str,
        version: VersionNum,
    ) -> Result<bool>;

    /// Acquires the store's per-object lock. The lock serializes prepare/commit/purge
    /// across sessions and is released when the returned guard is dropped.
    fn acquire_lock(&self, object_id: &str) -> Result<ObjectLock>;

    /// Validates the change set and materializes the new version in a temporary area
    /// without touching the object's durable layout.
    fn prepare(&self, change_set: ChangeSet, mode: CommitMode) -> Result<PreparedUpdate>;

    /// Atomically promotes a prepared update into the object's durable layout
    fn commit(&self, update: PreparedUpdate) -> Result<()>;

    /// Discards a prepared update without applying it
    fn discard(&self, update: PreparedUpdate) -> Result<()>;

    /// Removes the object from the store entirely. Removing an object that does not exist
    /// is a no-op.
    fn purge(&self, object_id: &str) -> Result<()>;

    /// Reverts the object to the version preceding its current head
    fn revert_version(&self, object_id: &str) -> Result<()>;
}
