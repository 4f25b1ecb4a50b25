//! Local filesystem OCFL object store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use walkdir::WalkDir;

use super::{ChangeSet, ObjectStore, PreparedUpdate, PreparedVersion};
use crate::error::{not_found, FocflError, Result};
use crate::ocfl::consts::*;
use crate::ocfl::digest::{DigestAlgorithm, HexDigest};
use crate::ocfl::inventory::{Inventory, Version};
use crate::ocfl::lock::{ObjectLock, ObjectLocks};
use crate::ocfl::{layout, paths, util, CommitMode, VersionDetails, VersionNum};

/// Local filesystem OCFL object store
pub struct FsObjectStore {
    /// The path to the OCFL storage root
    storage_root: PathBuf,
    /// Serializes prepare/commit/purge per object across sessions
    locks: ObjectLocks,
}

impl FsObjectStore {
    /// Opens the store at `storage_root`, creating the root and its focfl extension
    /// directories if they do not exist.
    pub fn open(storage_root: impl AsRef<Path>) -> Result<Self> {
        let storage_root = storage_root.as_ref().to_path_buf();

        if storage_root.exists() && !storage_root.is_dir() {
            return Err(FocflError::IllegalState(format!(
                "Storage root {} is not a directory",
                storage_root.to_string_lossy()
            )));
        }

        fs::create_dir_all(&storage_root)?;
        fs::create_dir_all(paths::prepare_extension_path(&storage_root))?;
        let locks_dir = paths::locks_extension_path(&storage_root);
        fs::create_dir_all(&locks_dir)?;

        Ok(Self {
            storage_root,
            locks: ObjectLocks::new(locks_dir),
        })
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Physical path to the object's root directory
    fn object_root(&self, object_id: &str) -> PathBuf {
        self.storage_root.join(layout::object_root_name(object_id))
    }

    /// Temporary area prepared updates for the object are built in
    fn prep_dir(&self, object_id: &str) -> PathBuf {
        paths::prepare_extension_path(&self.storage_root).join(layout::object_root_name(object_id))
    }

    /// Loads the object's committed root inventory, if the object has committed versions
    fn load_root_inventory(&self, object_id: &str) -> Result<Option<Inventory>> {
        let path = paths::inventory_path(self.object_root(object_id));

        if !path.exists() {
            return Ok(None);
        }

        let mut inventory = parse_inventory(&path, object_id)?;
        inventory.mutable_head = false;
        Ok(Some(inventory))
    }

    /// Loads the mutable head's shadow inventory, if the object has a mutable head
    fn load_head_inventory(&self, object_id: &str) -> Result<Option<Inventory>> {
        let path = paths::inventory_path(paths::mutable_head_path(self.object_root(object_id)));

        if !path.exists() {
            return Ok(None);
        }

        let mut inventory = parse_inventory(&path, object_id)?;
        inventory.mutable_head = true;
        Ok(Some(inventory))
    }

    /// Returns the inventory describing the object's head: the mutable head shadow
    /// inventory when one exists, the committed root inventory otherwise.
    fn effective_inventory(&self, object_id: &str) -> Result<Inventory> {
        if let Some(head) = self.load_head_inventory(object_id)? {
            return Ok(head);
        }
        match self.load_root_inventory(object_id)? {
            Some(root) => Ok(root),
            None => Err(not_found(object_id, None)),
        }
    }

    fn prepare_new_version(
        &self,
        change_set: ChangeSet,
        root_inv: Option<Inventory>,
        head_inv: Option<Inventory>,
        new_state: BTreeMap<String, HexDigest>,
        staged: HashMap<String, PathBuf>,
        prep_dir: PathBuf,
    ) -> Result<PreparedVersion> {
        let object_id = change_set.object_id;
        let is_new_object = !self.contains(&object_id)?;

        let version_num = match &root_inv {
            Some(inv) => inv.head.next()?,
            None => VersionNum::v1(),
        };

        let mut inventory =
            root_inv.unwrap_or_else(|| Inventory::new_object(&object_id, version_num));

        let content_prefix = format!("{}/{}", version_num, DEFAULT_CONTENT_DIR);
        let content_dir = paths::content_path(&prep_dir, version_num);

        for (logical_path, digest) in &new_state {
            if inventory.durable_content_path(digest).is_some() {
                continue;
            }

            let target = content_dir.join(logical_path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }

            match staged.get(logical_path) {
                Some(source) => {
                    fs::copy(source, &target)?;
                }
                None => {
                    // The bytes only exist in the mutable head; promotion moves them into
                    // the immutable version.
                    let head_inv = head_inv.as_ref().ok_or_else(|| FocflError::CorruptObject {
                        object_id: object_id.clone(),
                        message: format!("No content found for logical path {}", logical_path),
                    })?;
                    let content_path = head_inv.content_path_for_digest(digest)?;
                    fs::copy(self.object_root(&object_id).join(content_path), &target)?;
                }
            }

            inventory.add_manifest_entry(
                digest.clone(),
                paths::join(&content_prefix, logical_path),
            );
        }

        inventory.add_version(version_num, Version::new(new_state, change_set.message));

        write_inventory(&paths::version_path(&prep_dir, version_num), &inventory)?;

        Ok(PreparedVersion {
            object_id,
            mode: CommitMode::NewVersion,
            version_num,
            prep_dir,
            inventory,
            is_new_object,
        })
    }

    fn prepare_mutable_head(
        &self,
        change_set: ChangeSet,
        root_inv: Option<Inventory>,
        head_inv: Option<Inventory>,
        new_state: BTreeMap<String, HexDigest>,
        staged: HashMap<String, PathBuf>,
        prep_dir: PathBuf,
    ) -> Result<PreparedVersion> {
        let object_id = change_set.object_id;
        let is_new_object = !self.contains(&object_id)?;

        let (mut inventory, shadow_num) = match head_inv {
            Some(inv) => {
                let shadow = inv.head;
                (inv, shadow)
            }
            None => match root_inv {
                Some(inv) => {
                    let shadow = inv.head.next()?;
                    (inv, shadow)
                }
                None => (
                    Inventory::new_object(&object_id, VersionNum::v1()),
                    VersionNum::v1(),
                ),
            },
        };
        inventory.mutable_head = true;

        let content_dir = prep_dir.join(DEFAULT_CONTENT_DIR);
        fs::create_dir_all(&content_dir)?;

        // Head content files are named by digest. Logical paths change independently of
        // their bytes while the head is mutable, so content addressing is the only naming
        // scheme that cannot collide across head commits.
        for (logical_path, digest) in &new_state {
            if inventory.content_path_for_digest(digest).is_ok() {
                continue;
            }

            let source = staged.get(logical_path).ok_or_else(|| {
                FocflError::CorruptObject {
                    object_id: object_id.clone(),
                    message: format!("No content found for logical path {}", logical_path),
                }
            })?;

            fs::copy(source, content_dir.join(digest.as_str()))?;

            inventory.add_manifest_entry(
                digest.clone(),
                paths::join(MUTABLE_HEAD_CONTENT_DIR, digest.as_str()),
            );
        }

        inventory.add_version(shadow_num, Version::new(new_state, change_set.message));
        inventory.prune_head_manifest();

        write_inventory(&prep_dir, &inventory)?;

        Ok(PreparedVersion {
            object_id,
            mode: CommitMode::MutableHead,
            version_num: shadow_num,
            prep_dir,
            inventory,
            is_new_object,
        })
    }

    fn commit_new_version(&self, prepared: PreparedVersion) -> Result<()> {
        let object_root = self.object_root(&prepared.object_id);
        let version_dir = paths::version_path(&object_root, prepared.version_num);

        if version_dir.exists() {
            return Err(FocflError::Conflict {
                object_id: prepared.object_id.clone(),
                message: format!("Version {} already exists", prepared.version_num),
            });
        }

        if prepared.is_new_object {
            init_object_root(&object_root)?;
        }

        fs::rename(
            paths::version_path(&prepared.prep_dir, prepared.version_num),
            &version_dir,
        )?;

        write_inventory(&object_root, &prepared.inventory)?;

        // The mutable head, if there was one, has been folded into the new version
        util::remove_dir_all_ignore_not_found(paths::mutable_head_ext_path(&object_root))?;
        let extensions = paths::extensions_path(&object_root);
        if extensions.exists() && util::dir_is_empty(&extensions)? {
            fs::remove_dir(&extensions)?;
        }

        util::remove_dir_all_ignore_not_found(&prepared.prep_dir)?;

        info!(
            "Committed version {} of object {}",
            prepared.version_num, prepared.object_id
        );

        Ok(())
    }

    fn commit_mutable_head(&self, prepared: PreparedVersion) -> Result<()> {
        let object_root = self.object_root(&prepared.object_id);

        if prepared.is_new_object {
            init_object_root(&object_root)?;
        }

        let head_dir = paths::mutable_head_path(&object_root);
        let head_content = paths::mutable_head_content_path(&object_root);
        fs::create_dir_all(&head_content)?;

        let prep_content = prepared.prep_dir.join(DEFAULT_CONTENT_DIR);
        if prep_content.exists() {
            for entry in WalkDir::new(&prep_content) {
                let entry = entry?;
                if entry.file_type().is_file() {
                    let relative = entry
                        .path()
                        .strip_prefix(&prep_content)
                        .expect("walked path must be under the prep content dir");
                    util::move_file(entry.path(), head_content.join(relative))?;
                }
            }
        }

        write_inventory(&head_dir, &prepared.inventory)?;
        self.rm_orphaned_head_files(&object_root, &prepared.inventory)?;

        util::remove_dir_all_ignore_not_found(&prepared.prep_dir)?;

        info!(
            "Committed mutable head of object {} at {}",
            prepared.object_id, prepared.version_num
        );

        Ok(())
    }

    /// Removes mutable head content files that the head inventory no longer references
    fn rm_orphaned_head_files(&self, object_root: &Path, inventory: &Inventory) -> Result<()> {
        let head_content = paths::mutable_head_content_path(object_root);
        if !head_content.exists() {
            return Ok(());
        }

        let referenced: HashSet<String> = inventory.head_content_paths();

        for entry in WalkDir::new(&head_content) {
            let entry = entry?;
            if entry.file_type().is_file() {
                let relative = entry
                    .path()
                    .strip_prefix(object_root)
                    .expect("walked path must be under the object root")
                    .to_string_lossy()
                    .replace('\\', "/");
                if !referenced.contains(&relative) {
                    fs::remove_file(entry.path())?;
                }
            }
        }

        Ok(())
    }
}

impl ObjectStore for FsObjectStore {
    fn contains(&self, object_id: &str) -> Result<bool> {
        Ok(paths::object_namaste_path(self.object_root(object_id)).exists())
    }

    fn has_staged_changes(&self, object_id: &str) -> Result<bool> {
        Ok(
            paths::inventory_path(paths::mutable_head_path(self.object_root(object_id)))
                .exists(),
        )
    }

    fn read(
        &self,
        object_id: &str,
        logical_path: &str,
        version: Option<VersionNum>,
        sink: &mut dyn Write,
    ) -> Result<()> {
        let inventory = match version {
            // Version reads address immutable versions only
            Some(_) => self
                .load_root_inventory(object_id)?
                .ok_or_else(|| not_found(object_id, version))?,
            None => self.effective_inventory(object_id)?,
        };

        let version_num = version.unwrap_or(inventory.head);
        inventory.get_version(version_num)?;

        let content_path = inventory.content_path_for_logical_path(logical_path, version_num)?;
        let storage_path = self.object_root(object_id).join(content_path);

        if !storage_path.exists() {
            return Err(FocflError::CorruptObject {
                object_id: object_id.to_string(),
                message: format!("Content file {} is missing", content_path),
            });
        }

        let mut file = File::open(storage_path)?;
        io::copy(&mut file, sink)?;

        Ok(())
    }

    fn head_paths(&self, object_id: &str) -> Result<Vec<String>> {
        match self.load_head_inventory(object_id)? {
            Some(inventory) => Ok(inventory.head_version().logical_paths().cloned().collect()),
            None => match self.load_root_inventory(object_id)? {
                Some(inventory) => {
                    Ok(inventory.head_version().logical_paths().cloned().collect())
                }
                None => Ok(Vec::new()),
            },
        }
    }

    fn list_versions(&self, object_id: &str) -> Result<Vec<VersionDetails>> {
        match self.load_root_inventory(object_id)? {
            Some(inventory) => {
                let mut versions = Vec::with_capacity(inventory.versions.len());
                for (num, version) in &inventory.versions {
                    versions.push(VersionDetails {
                        version_num: *num,
                        created: version.created,
                        message: version.message.clone(),
                    });
                }
                Ok(versions)
            }
            None => {
                if self.contains(object_id)? {
                    // Mutable head only; nothing has been promoted yet
                    Ok(Vec::new())
                } else {
                    Err(not_found(object_id, None))
                }
            }
        }
    }

    fn contains_path(
        &self,
        object_id: &str,
        logical_path: &str,
        version: VersionNum,
    ) -> Result<bool> {
        match self.load_root_inventory(object_id)? {
            Some(inventory) => Ok(inventory.digest_for(logical_path, version).is_some()),
            None => Ok(false),
        }
    }

    fn acquire_lock(&self, object_id: &str) -> Result<ObjectLock> {
        self.locks.try_lock(object_id)
    }

    fn prepare(&self, change_set: ChangeSet, mode: CommitMode) -> Result<PreparedUpdate> {
        let prep_dir = self.prep_dir(&change_set.object_id);
        // A leftover prepare area means a previous session crashed before commit
        if prep_dir.exists() {
            warn!(
                "Removing abandoned prepare area for object {}",
                change_set.object_id
            );
            fs::remove_dir_all(&prep_dir)?;
        }
        fs::create_dir_all(&prep_dir)?;

        let root_inv = self.load_root_inventory(&change_set.object_id)?;
        let head_inv = self.load_head_inventory(&change_set.object_id)?;

        let mut new_state = match (&head_inv, &root_inv) {
            (Some(head), _) => head.head_version().state_cloned(),
            (None, Some(root)) => root.head_version().state_cloned(),
            (None, None) => BTreeMap::new(),
        };

        let mut staged = HashMap::new();

        for write in &change_set.writes {
            let mut file = File::open(&write.source)?;
            let digest = DigestAlgorithm::Sha512.hash_hex(&mut file)?;
            new_state.insert(write.logical_path.clone(), digest);
            staged.insert(write.logical_path.clone(), write.source.clone());
        }

        for delete in &change_set.deletes {
            new_state.remove(delete);
        }

        let prepared = match mode {
            CommitMode::NewVersion => self.prepare_new_version(
                change_set, root_inv, head_inv, new_state, staged, prep_dir,
            )?,
            CommitMode::MutableHead => self.prepare_mutable_head(
                change_set, root_inv, head_inv, new_state, staged, prep_dir,
            )?,
        };

        Ok(PreparedUpdate::Version(Box::new(prepared)))
    }

    fn commit(&self, update: PreparedUpdate) -> Result<()> {
        match update {
            PreparedUpdate::Purge { object_id } => self.purge(&object_id),
            PreparedUpdate::Version(prepared) => match prepared.mode {
                CommitMode::NewVersion => self.commit_new_version(*prepared),
                CommitMode::MutableHead => self.commit_mutable_head(*prepared),
            },
        }
    }

    fn discard(&self, update: PreparedUpdate) -> Result<()> {
        if let PreparedUpdate::Version(prepared) = update {
            util::remove_dir_all_ignore_not_found(&prepared.prep_dir)?;
        }
        Ok(())
    }

    fn purge(&self, object_id: &str) -> Result<()> {
        util::remove_dir_all_ignore_not_found(self.prep_dir(object_id))?;

        let object_root = self.object_root(object_id);
        if object_root.exists() {
            info!("Purging object {}", object_id);
            fs::remove_dir_all(&object_root)?;
        }

        Ok(())
    }

    fn revert_version(&self, object_id: &str) -> Result<()> {
        Err(FocflError::UnsupportedOperation(format!(
            "The store does not support reverting a committed version of object {}",
            object_id
        )))
    }
}

/// Creates an object root with its namaste declaration
fn init_object_root(object_root: &Path) -> Result<()> {
    fs::create_dir_all(object_root)?;
    let namaste = paths::object_namaste_path(object_root);
    if !namaste.exists() {
        fs::write(namaste, OBJECT_NAMASTE_CONTENT)?;
    }
    Ok(())
}

/// Serializes an inventory and its digest sidecar into the specified directory
fn write_inventory(dir: &Path, inventory: &Inventory) -> Result<()> {
    fs::create_dir_all(dir)?;

    let bytes = serde_json::to_vec_pretty(inventory)?;
    let digest = DigestAlgorithm::Sha512.hash_hex(&mut bytes.as_slice())?;

    util::write_atomic(paths::inventory_path(dir), &bytes)?;
    util::write_atomic(
        paths::sidecar_path(dir, DigestAlgorithm::Sha512),
        format!("{}  {}\n", digest, INVENTORY_FILE).as_bytes(),
    )?;

    Ok(())
}

/// Parses an inventory file and verifies it against its digest sidecar
fn parse_inventory(inventory_path: &Path, object_id: &str) -> Result<Inventory> {
    let bytes = fs::read(inventory_path)?;

    let sidecar_path = paths::sidecar_path(
        inventory_path.parent().expect("inventory must have a parent"),
        DigestAlgorithm::Sha512,
    );
    if sidecar_path.exists() {
        let recorded = fs::read_to_string(&sidecar_path)?;
        let recorded = recorded.split_whitespace().next().unwrap_or("");
        let actual = DigestAlgorithm::Sha512.hash_hex(&mut bytes.as_slice())?;
        if HexDigest::from(recorded) != actual {
            return Err(FocflError::CorruptObject {
                object_id: object_id.to_string(),
                message: format!(
                    "Inventory digest {} does not match sidecar {}",
                    actual, recorded
                ),
            });
        }
    }

    let inventory: Inventory = serde_json::from_slice(&bytes)?;

    if inventory.id != object_id {
        return Err(FocflError::CorruptObject {
            object_id: object_id.to_string(),
            message: format!(
                "Expected inventory for object {} but found object {}",
                object_id, inventory.id
            ),
        });
    }

    inventory.validate()?;

    Ok(inventory)
}
