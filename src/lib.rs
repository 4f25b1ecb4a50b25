//! Transactional persistence core for Fedora-style linked-data repositories, storing
//! resources in [OCFL](https://ocfl.io/) objects on a local filesystem.
//!
//! A [`SessionManager`] hands out [`StorageSession`]s keyed by transaction id. A session
//! accepts typed resource operations via `persist`, stages them in per-object
//! sub-sessions, and applies everything with a two-phase commit:
//!
//! ```no_run
//! use focfl::persist::{CreateRdfOperation, ResourceId, SessionManager};
//! use focfl::Config;
//!
//! # fn main() -> focfl::Result<()> {
//! let manager = SessionManager::new(Config::new("path/to/ocfl/root"))?;
//!
//! let session = manager.session("tx-1")?;
//! let id = ResourceId::new("my-container")?;
//! session.persist(CreateRdfOperation::new(id).triples(b"<a> <b> <c> .\n".to_vec()).into())?;
//! session.commit()?;
//! # Ok(())
//! # }
//! ```

pub use self::config::Config;
pub use self::error::{FocflError, Result, RollbackError};
pub use self::ocfl::CommitMode;

pub mod config;
pub mod error;
pub mod ocfl;
pub mod persist;
