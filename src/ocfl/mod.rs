//! The OCFL side of the persistence core: object layout, inventories, digests, and the
//! [`ObjectStore`] abstraction with its filesystem implementation.

pub use self::digest::{DigestAlgorithm, DigestReader, DigestWriter, HexDigest};
pub use self::inventory::{Inventory, Version};
pub use self::lock::{ObjectLock, ObjectLocks};
pub use self::store::fs::FsObjectStore;
pub use self::store::{ChangeSet, ObjectStore, PreparedUpdate, PreparedVersion, StagedWrite};
pub use self::types::{CommitMode, VersionDetails, VersionNum};

pub mod consts;
mod digest;
mod inventory;
pub mod layout;
mod lock;
pub mod paths;
mod serde;
mod store;
mod types;
pub mod util;
