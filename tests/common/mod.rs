#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use focfl::ocfl::{FsObjectStore, ObjectStore};
use focfl::persist::{
    CreateBinaryOperation, CreateRdfOperation, ResourceId, ServerManagedPropsMode, SessionManager,
};
use focfl::{CommitMode, Config};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn test_config(root: &Path, commit_mode: CommitMode) -> Config {
    let mut config = Config::new(root.join("ocfl-root"));
    config.session_staging_root = root.join("staging");
    config.commit_mode_default = commit_mode;
    config.rollback_drain_timeout_ms = 250;
    config
}

/// Opens a repository on a fresh filesystem store, returning the store as well so tests
/// can make object-level assertions.
pub fn new_repo(root: &Path, commit_mode: CommitMode) -> (SessionManager, Arc<FsObjectStore>) {
    init_logger();
    let config = test_config(root, commit_mode);
    let store = Arc::new(FsObjectStore::open(&config.storage_root).unwrap());
    let manager = SessionManager::with_store(config, store.clone()).unwrap();
    (manager, store)
}

/// Opens a repository against a caller supplied store implementation
pub fn new_repo_with_store(
    root: &Path,
    commit_mode: CommitMode,
    store: Arc<dyn ObjectStore>,
) -> SessionManager {
    init_logger();
    SessionManager::with_store(test_config(root, commit_mode), store).unwrap()
}

pub fn rid(id: &str) -> ResourceId {
    ResourceId::new(id).unwrap()
}

pub fn create_container(id: &str, parent: Option<&str>, triples: &str) -> CreateRdfOperation {
    let mut op = CreateRdfOperation::new(rid(id))
        .server_managed(ServerManagedPropsMode::Strict)
        .triples(triples.as_bytes().to_vec());
    if let Some(parent) = parent {
        op = op.with_parent(rid(parent));
    }
    op
}

pub fn create_archival_group(id: &str, triples: &str) -> CreateRdfOperation {
    create_container(id, None, triples).archival_group(true)
}

pub fn create_binary(id: &str, parent: Option<&str>, content: &[u8]) -> CreateBinaryOperation {
    let mut op = CreateBinaryOperation::new(rid(id))
        .server_managed(ServerManagedPropsMode::Strict)
        .content(content.to_vec());
    if let Some(parent) = parent {
        op = op.with_parent(rid(parent));
    }
    op
}
