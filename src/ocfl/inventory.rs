use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{not_found, FocflError, Result};
use crate::ocfl::consts::{DEFAULT_CONTENT_DIR, INVENTORY_TYPE, MUTABLE_HEAD_EXT_DIR};
use crate::ocfl::digest::{DigestAlgorithm, HexDigest};
use crate::ocfl::VersionNum;

/// OCFL inventory serialization object
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub id: String,
    #[serde(rename = "type")]
    pub type_declaration: String,
    pub digest_algorithm: DigestAlgorithm,
    pub head: VersionNum,
    pub content_directory: Option<String>,
    manifest: BTreeMap<HexDigest, Vec<String>>,
    pub versions: BTreeMap<VersionNum, Version>,

    /// Indicates that this inventory is the mutable head extension's shadow inventory
    #[serde(skip)]
    pub mutable_head: bool,
}

/// OCFL version serialization object
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Version {
    pub created: DateTime<Local>,
    #[serde(with = "crate::ocfl::serde::digest_path_map")]
    state: BTreeMap<String, HexDigest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Inventory {
    /// Creates the inventory for a brand new object with a single empty version
    pub fn new_object(object_id: &str, version_num: VersionNum) -> Self {
        let mut versions = BTreeMap::new();
        versions.insert(version_num, Version::new(BTreeMap::new(), None));

        Self {
            id: object_id.to_string(),
            type_declaration: INVENTORY_TYPE.to_string(),
            digest_algorithm: DigestAlgorithm::Sha512,
            head: version_num,
            content_directory: Some(DEFAULT_CONTENT_DIR.to_string()),
            manifest: BTreeMap::new(),
            versions,
            mutable_head: false,
        }
    }

    /// Returns true if the object has exactly one version
    pub fn is_new(&self) -> bool {
        self.head.number == 1
    }

    /// Returns a reference to the HEAD version
    pub fn head_version(&self) -> &Version {
        // The head version must exist because it is validated when the inventory is loaded
        self.versions.get(&self.head).unwrap()
    }

    /// Returns a reference to the specified version or an error if it does not exist.
    pub fn get_version(&self, version_num: VersionNum) -> Result<&Version> {
        match self.versions.get(&version_num) {
            Some(v) => Ok(v),
            None => Err(not_found(&self.id, Some(version_num))),
        }
    }

    /// Installs a new version and moves the head forward to it
    pub fn add_version(&mut self, version_num: VersionNum, version: Version) {
        self.versions.insert(version_num, version);
        self.head = version_num;
    }

    /// Binds a digest to a content path in the manifest. Duplicate bindings are ignored.
    pub fn add_manifest_entry(&mut self, digest: HexDigest, content_path: String) {
        let paths = self.manifest.entry(digest).or_default();
        if !paths.iter().any(|p| p == &content_path) {
            paths.push(content_path);
        }
    }

    /// Returns the digest bound to a logical path in the specified version, if any
    pub fn digest_for(&self, logical_path: &str, version_num: VersionNum) -> Option<&HexDigest> {
        self.versions
            .get(&version_num)
            .and_then(|v| v.lookup_digest(logical_path))
    }

    /// Returns a content path for the digest, preferring paths in immutable version
    /// directories over mutable head paths.
    pub fn content_path_for_digest(&self, digest: &HexDigest) -> Result<&String> {
        match self.manifest.get(digest) {
            Some(paths) => paths
                .iter()
                .find(|p| !is_mutable_head_path(p))
                .or_else(|| paths.first())
                .ok_or_else(|| FocflError::CorruptObject {
                    object_id: self.id.clone(),
                    message: format!("Digest {} is not mapped to any content paths", digest),
                }),
            None => Err(FocflError::CorruptObject {
                object_id: self.id.clone(),
                message: format!("Digest {} not found in manifest", digest),
            }),
        }
    }

    /// Returns a content path for the digest only if one exists in an immutable version
    /// directory. Mutable head content does not survive promotion, so it never qualifies
    /// for reuse.
    pub fn durable_content_path(&self, digest: &HexDigest) -> Option<&String> {
        self.manifest
            .get(digest)?
            .iter()
            .find(|p| !is_mutable_head_path(p))
    }

    /// Returns the content path serving the logical path in the specified version
    pub fn content_path_for_logical_path(
        &self,
        logical_path: &str,
        version_num: VersionNum,
    ) -> Result<&String> {
        let digest = self.digest_for(logical_path, version_num).ok_or_else(|| {
            FocflError::NotFound(format!(
                "Path {} not found in object {} version {}",
                logical_path, self.id, version_num
            ))
        })?;

        self.content_path_for_digest(digest)
    }

    /// Validates that the head version referenced by the inventory exists
    pub fn validate(&self) -> Result<()> {
        if !self.versions.contains_key(&self.head) {
            return Err(FocflError::CorruptObject {
                object_id: self.id.clone(),
                message: format!("HEAD version {} was not found", self.head),
            });
        }
        Ok(())
    }

    /// Drops mutable head content bindings whose digest the head version no longer
    /// references, then drops any manifest entry left without paths. The files themselves
    /// are removed by the store's orphan sweep.
    pub fn prune_head_manifest(&mut self) {
        let referenced: std::collections::HashSet<HexDigest> = self
            .head_version()
            .state
            .values()
            .cloned()
            .collect();

        self.manifest.retain(|digest, paths| {
            if !referenced.contains(digest) {
                paths.retain(|p| !is_mutable_head_path(p));
            }
            !paths.is_empty()
        });
    }

    /// Returns every manifest content path that lives in the mutable head extension
    pub fn head_content_paths(&self) -> std::collections::HashSet<String> {
        self.manifest
            .values()
            .flatten()
            .filter(|p| is_mutable_head_path(p))
            .cloned()
            .collect()
    }
}

impl Version {
    pub fn new(state: BTreeMap<String, HexDigest>, message: Option<String>) -> Self {
        Self {
            created: Local::now(),
            state,
            message,
        }
    }

    /// Returns the digest of the file at the logical path, if the path exists in this version
    pub fn lookup_digest(&self, logical_path: &str) -> Option<&HexDigest> {
        self.state.get(logical_path)
    }

    /// Returns an iterator over the logical paths in this version
    pub fn logical_paths(&self) -> impl Iterator<Item = &String> {
        self.state.keys()
    }

    /// Returns a copy of the version's state map
    pub fn state_cloned(&self) -> BTreeMap<String, HexDigest> {
        self.state.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

/// Returns true if the content path lives in the mutable head extension
pub fn is_mutable_head_path(content_path: &str) -> bool {
    content_path.starts_with(MUTABLE_HEAD_EXT_DIR)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use maplit::btreemap;

    use super::{Inventory, Version};
    use crate::ocfl::digest::HexDigest;
    use crate::ocfl::VersionNum;

    #[test]
    fn new_object_has_empty_head() {
        let inventory = Inventory::new_object("obj", VersionNum::v1());
        assert!(inventory.is_new());
        assert!(inventory.head_version().is_empty());
    }

    #[test]
    fn versions_move_head_forward() {
        let mut inventory = Inventory::new_object("obj", VersionNum::v1());

        let state = btreemap! {
            "fcr-container.nt".to_string() => HexDigest::from("abc"),
        };
        inventory.add_version(VersionNum::new(2), Version::new(state, None));

        assert_eq!(inventory.head, VersionNum::new(2));
        assert_eq!(
            inventory
                .digest_for("fcr-container.nt", VersionNum::new(2))
                .unwrap(),
            &HexDigest::from("abc")
        );
        assert!(inventory
            .digest_for("fcr-container.nt", VersionNum::v1())
            .is_none());
    }

    #[test]
    fn round_trips_through_ocfl_json() {
        let mut inventory = Inventory::new_object("obj", VersionNum::v1());
        let state = btreemap! {
            "a.nt".to_string() => HexDigest::from("d1"),
            "b.nt".to_string() => HexDigest::from("d1"),
            "c.bin".to_string() => HexDigest::from("d2"),
        };
        inventory.add_version(VersionNum::new(2), Version::new(state.clone(), None));
        inventory.add_manifest_entry(HexDigest::from("d1"), "v2/content/a.nt".to_string());
        inventory.add_manifest_entry(HexDigest::from("d2"), "v2/content/c.bin".to_string());

        let json = serde_json::to_string(&inventory).unwrap();
        let parsed: Inventory = serde_json::from_str(&json).unwrap();

        let parsed_state: BTreeMap<_, _> = parsed
            .get_version(VersionNum::new(2))
            .unwrap()
            .state_cloned();
        assert_eq!(parsed_state, state);
        assert_eq!(
            parsed.content_path_for_digest(&HexDigest::from("d2")).unwrap(),
            "v2/content/c.bin"
        );
    }

    #[test]
    fn prefers_immutable_content_paths() {
        let mut inventory = Inventory::new_object("obj", VersionNum::v1());
        inventory.add_manifest_entry(
            HexDigest::from("d1"),
            "extensions/0005-mutable-head/head/content/a.nt".to_string(),
        );
        inventory.add_manifest_entry(HexDigest::from("d1"), "v1/content/a.nt".to_string());

        assert_eq!(
            inventory.content_path_for_digest(&HexDigest::from("d1")).unwrap(),
            "v1/content/a.nt"
        );
        assert_eq!(
            inventory.durable_content_path(&HexDigest::from("d1")).unwrap(),
            "v1/content/a.nt"
        );
    }
}
