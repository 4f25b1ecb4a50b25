use core::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::{error, io};

use thiserror::Error;

pub type Result<T, E = FocflError> = core::result::Result<T, E>;

/// Application errors
#[derive(Error)]
pub enum FocflError {
    #[error("Object {object_id} is corrupt: {message}")]
    CorruptObject { object_id: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Session {0} is closed to further operations")]
    SessionClosed(String),

    #[error("Operation is not supported: {0}")]
    UnsupportedOperation(String),

    #[error("Digest mismatch: expected {expected} but content was {actual}")]
    InvalidDigest { expected: String, actual: String },

    #[error("Failed to lock object {object_id}: {message}")]
    Locked { object_id: String, message: String },

    #[error("Conflicting change to object {object_id}: {message}")]
    Conflict { object_id: String, message: String },

    #[error("Failed to prepare changes to {object_id}: {source}")]
    PrepareFailed {
        object_id: String,
        source: Box<FocflError>,
    },

    #[error("Failed to commit changes to {object_id}: {source}")]
    CommitFailed {
        object_id: String,
        source: Box<FocflError>,
    },

    #[error("Rollback failed: {0}")]
    RollbackFailed(RollbackError),

    #[error("{0}")]
    General(String),

    #[error("{0}")]
    Io(io::Error),

    #[error("{0}")]
    Wrapped(Box<dyn error::Error + Send + Sync>),
}

/// Aggregates the per-object failures encountered while rolling a session back
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct RollbackError {
    failures: Vec<String>,
}

impl RollbackError {
    pub fn new(failures: Vec<String>) -> Self {
        Self { failures }
    }

    /// A rollback failure raised when in-flight persists did not drain in time. The store
    /// was not touched.
    pub fn drain_timeout(session_id: &str) -> Self {
        Self {
            failures: vec![format!(
                "Timed out waiting for in-flight operations on session {} to complete",
                session_id
            )],
        }
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }
}

impl Display for RollbackError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.failures.join("; "))
    }
}

/// Constructs a `FocflError::NotFound` error for an object or object version
pub fn not_found(object_id: &str, version_num: Option<crate::ocfl::VersionNum>) -> FocflError {
    match version_num {
        Some(version) => FocflError::NotFound(format!("Object {} version {}", object_id, version)),
        None => FocflError::NotFound(format!("Object {}", object_id)),
    }
}

impl Debug for FocflError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl From<io::Error> for FocflError {
    fn from(e: io::Error) -> Self {
        FocflError::Io(e)
    }
}

impl From<serde_json::Error> for FocflError {
    fn from(e: serde_json::Error) -> Self {
        FocflError::Wrapped(Box::new(e))
    }
}

impl From<walkdir::Error> for FocflError {
    fn from(e: walkdir::Error) -> Self {
        FocflError::Wrapped(Box::new(e))
    }
}

impl From<toml::de::Error> for FocflError {
    fn from(e: toml::de::Error) -> Self {
        FocflError::Wrapped(Box::new(e))
    }
}
