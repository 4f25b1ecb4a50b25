//! The transactional persistence side of the crate: resource identifiers and headers,
//! the Fedora to OCFL resource index, typed resource operations, and the storage session
//! machinery that applies them to the object store.

pub use self::headers::{InteractionModel, ResourceHeaders};
pub use self::index::{Mapping, OcflIndex};
pub use self::manager::SessionManager;
pub use self::ops::{
    CreateBinaryOperation, CreateRdfOperation, CreateVersionOperation, DeleteOperation,
    PurgeOperation, ResourceOperation, UpdateBinaryOperation, UpdateRdfOperation,
};
pub use self::session::{SessionState, StorageSession};
pub use self::types::{ResourceId, ServerManagedPropsMode};

pub mod headers;
mod index;
mod inflight;
mod manager;
mod object_session;
mod ops;
mod persister;
mod session;
mod types;
