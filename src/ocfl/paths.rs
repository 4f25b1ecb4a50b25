use std::path::{Path, PathBuf};

use crate::ocfl::consts::*;
use crate::ocfl::{DigestAlgorithm, VersionNum};

/// Returns the path to `inventory.json` within the specified directory
pub fn inventory_path<P>(dir: P) -> PathBuf
where
    P: AsRef<Path>,
{
    dir.as_ref().join(INVENTORY_FILE)
}

/// Returns the path to `inventory.json.ALGO` within the specified directory
pub fn sidecar_path<P>(dir: P, algorithm: DigestAlgorithm) -> PathBuf
where
    P: AsRef<Path>,
{
    dir.as_ref().join(sidecar_name(algorithm))
}

/// Returns the name of an inventory sidecar for the specified algorithm
pub fn sidecar_name(algorithm: DigestAlgorithm) -> String {
    format!("{}.{}", INVENTORY_FILE, algorithm)
}

/// Returns the path to an object's namaste file
pub fn object_namaste_path<P>(object_root: P) -> PathBuf
where
    P: AsRef<Path>,
{
    object_root.as_ref().join(OBJECT_NAMASTE_FILE)
}

/// Returns the path to the version directory within the object root
pub fn version_path<P>(object_root: P, version_num: VersionNum) -> PathBuf
where
    P: AsRef<Path>,
{
    object_root.as_ref().join(version_num.to_string())
}

/// Returns a version's content directory
pub fn content_path<P>(object_root: P, version_num: VersionNum) -> PathBuf
where
    P: AsRef<Path>,
{
    let mut version_dir = version_path(object_root, version_num);
    version_dir.push(DEFAULT_CONTENT_DIR);
    version_dir
}

/// Returns the path to the mutable head directory within the object root
pub fn mutable_head_path<P>(object_root: P) -> PathBuf
where
    P: AsRef<Path>,
{
    object_root.as_ref().join(MUTABLE_HEAD_DIR)
}

/// Returns the path to the mutable head extension root within the object root
pub fn mutable_head_ext_path<P>(object_root: P) -> PathBuf
where
    P: AsRef<Path>,
{
    object_root.as_ref().join(MUTABLE_HEAD_EXT_DIR)
}

/// Returns the path to the mutable head content directory within the object root
pub fn mutable_head_content_path<P>(object_root: P) -> PathBuf
where
    P: AsRef<Path>,
{
    object_root.as_ref().join(MUTABLE_HEAD_CONTENT_DIR)
}

/// Returns the path to the `extensions` directory within the specified directory
pub fn extensions_path<P>(dir: P) -> PathBuf
where
    P: AsRef<Path>,
{
    dir.as_ref().join(EXTENSIONS_DIR)
}

/// Returns the store-root directory prepared updates are staged into before commit
pub fn prepare_extension_path<P>(storage_root: P) -> PathBuf
where
    P: AsRef<Path>,
{
    let mut extensions = extensions_path(storage_root);
    extensions.push(PREPARE_EXTENSION);
    extensions
}

/// Returns the store-root directory object lock files are created in
pub fn locks_extension_path<P>(storage_root: P) -> PathBuf
where
    P: AsRef<Path>,
{
    let mut extensions = extensions_path(storage_root);
    extensions.push(LOCKS_EXTENSION);
    extensions
}

/// Returns the default location of the persisted resource index
pub fn index_extension_path<P>(storage_root: P) -> PathBuf
where
    P: AsRef<Path>,
{
    let mut extensions = extensions_path(storage_root);
    extensions.push(INDEX_EXTENSION);
    extensions.push(INDEX_FILE);
    extensions
}

/// Joins two string path parts, inserting a `/` if needed
pub fn join(part1: &str, part2: &str) -> String {
    let mut joined = match part1.ends_with('/') {
        true => part1[..part1.len() - 1].to_string(),
        false => part1.to_string(),
    };

    if !part2.is_empty() {
        if !joined.is_empty() && !part2.starts_with('/') {
            joined.push('/');
        }
        joined.push_str(part2);
    }

    joined
}
