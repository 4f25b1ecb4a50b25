use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use rand::Rng;
use tempfile::TempDir;

use focfl::ocfl::{
    ChangeSet, DigestAlgorithm, FsObjectStore, HexDigest, ObjectLock, ObjectStore,
    PreparedUpdate, VersionDetails, VersionNum,
};
use focfl::persist::{
    CreateVersionOperation, DeleteOperation, PurgeOperation, SessionManager, SessionState,
    UpdateRdfOperation,
};
use focfl::{CommitMode, FocflError};

use common::*;

mod common;

/// Wraps the filesystem store and injects failures into prepare or commit for specific
/// objects, so two-phase commit failure handling can be exercised.
struct FailingStore {
    inner: FsObjectStore,
    fail_prepare_on: Option<String>,
    fail_commit_on: Option<String>,
}

impl FailingStore {
    fn injected() -> FocflError {
        FocflError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "injected failure",
        ))
    }
}

impl ObjectStore for FailingStore {
    fn contains(&self, object_id: &str) -> focfl::Result<bool> {
        self.inner.contains(object_id)
    }

    fn has_staged_changes(&self, object_id: &str) -> focfl::Result<bool> {
        self.inner.has_staged_changes(object_id)
    }

    fn read(
        &self,
        object_id: &str,
        logical_path: &str,
        version: Option<VersionNum>,
        sink: &mut dyn Write,
    ) -> focfl::Result<()> {
        self.inner.read(object_id, logical_path, version, sink)
    }

    fn head_paths(&self, object_id: &str) -> focfl::Result<Vec<String>> {
        self.inner.head_paths(object_id)
    }

    fn list_versions(&self, object_id: &str) -> focfl::Result<Vec<VersionDetails>> {
        self.inner.list_versions(object_id)
    }

    fn contains_path(
        &self,
        object_id: &str,
        logical_path: &str,
        version: VersionNum,
    ) -> focfl::Result<bool> {
        self.inner.contains_path(object_id, logical_path, version)
    }

    fn acquire_lock(&self, object_id: &str) -> focfl::Result<ObjectLock> {
        self.inner.acquire_lock(object_id)
    }

    fn prepare(
        &self,
        change_set: ChangeSet,
        mode: CommitMode,
    ) -> focfl::Result<PreparedUpdate> {
        if self.fail_prepare_on.as_deref() == Some(change_set.object_id.as_str()) {
            return Err(Self::injected());
        }
        self.inner.prepare(change_set, mode)
    }

    fn commit(&self, update: PreparedUpdate) -> focfl::Result<()> {
        if self.fail_commit_on.as_deref() == Some(update.object_id()) {
            return Err(Self::injected());
        }
        self.inner.commit(update)
    }

    fn discard(&self, update: PreparedUpdate) -> focfl::Result<()> {
        self.inner.discard(update)
    }

    fn purge(&self, object_id: &str) -> focfl::Result<()> {
        self.inner.purge(object_id)
    }

    fn revert_version(&self, object_id: &str) -> focfl::Result<()> {
        self.inner.revert_version(object_id)
    }
}

/// Wraps the filesystem store and stalls reads while the flag is set, standing in for a
/// slow persister.
struct BlockingStore {
    inner: FsObjectStore,
    block_reads: AtomicBool,
}

impl ObjectStore for BlockingStore {
    fn contains(&self, object_id: &str) -> focfl::Result<bool> {
        self.inner.contains(object_id)
    }

    fn has_staged_changes(&self, object_id: &str) -> focfl::Result<bool> {
        self.inner.has_staged_changes(object_id)
    }

    fn read(
        &self,
        object_id: &str,
        logical_path: &str,
        version: Option<VersionNum>,
        sink: &mut dyn Write,
    ) -> focfl::Result<()> {
        while self.block_reads.load(Ordering::Acquire) {
            thread::sleep(Duration::from_millis(5));
        }
        self.inner.read(object_id, logical_path, version, sink)
    }

    fn head_paths(&self, object_id: &str) -> focfl::Result<Vec<String>> {
        self.inner.head_paths(object_id)
    }

    fn list_versions(&self, object_id: &str) -> focfl::Result<Vec<VersionDetails>> {
        self.inner.list_versions(object_id)
    }

    fn contains_path(
        &self,
        object_id: &str,
        logical_path: &str,
        version: VersionNum,
    ) -> focfl::Result<bool> {
        self.inner.contains_path(object_id, logical_path, version)
    }

    fn acquire_lock(&self, object_id: &str) -> focfl::Result<ObjectLock> {
        self.inner.acquire_lock(object_id)
    }

    fn prepare(
        &self,
        change_set: ChangeSet,
        mode: CommitMode,
    ) -> focfl::Result<PreparedUpdate> {
        self.inner.prepare(change_set, mode)
    }

    fn commit(&self, update: PreparedUpdate) -> focfl::Result<()> {
        self.inner.commit(update)
    }

    fn discard(&self, update: PreparedUpdate) -> focfl::Result<()> {
        self.inner.discard(update)
    }

    fn purge(&self, object_id: &str) -> focfl::Result<()> {
        self.inner.purge(object_id)
    }

    fn revert_version(&self, object_id: &str) -> focfl::Result<()> {
        self.inner.revert_version(object_id)
    }
}

#[test]
fn ag_create_then_delete_with_manual_versioning() -> Result<()> {
    let temp = TempDir::new()?;
    let (manager, store) = new_repo(temp.path(), CommitMode::MutableHead);

    let session = manager.session("tx-1")?;
    session.persist(create_archival_group("ag-1", "<> a <AG> .\n").into())?;
    session.commit()?;

    assert!(store.contains("ag-1")?);
    assert!(store.has_staged_changes("ag-1")?);

    let session = manager.session("tx-2")?;
    session.persist(DeleteOperation::new(rid("ag-1")).into())?;
    session.commit()?;

    assert!(store.contains("ag-1")?);
    assert!(!store.has_staged_changes("ag-1")?);

    let reader = manager.read_only();
    let headers = reader.get_headers(&rid("ag-1"), None)?;
    assert!(headers.deleted);
    assert!(matches!(
        reader.get_triples(&rid("ag-1"), None),
        Err(FocflError::NotFound(_))
    ));

    Ok(())
}

#[test]
fn ag_child_create_then_delete() -> Result<()> {
    let temp = TempDir::new()?;
    let (manager, store) = new_repo(temp.path(), CommitMode::MutableHead);

    let session = manager.session("tx-1")?;
    session.persist(create_archival_group("ag-2", "<> a <AG> .\n").into())?;
    session.commit()?;

    let session = manager.session("tx-2")?;
    session.persist(create_container("ag-2/c", Some("ag-2"), "<> a <Child> .\n").into())?;
    session.commit()?;

    assert!(store
        .head_paths("ag-2")?
        .contains(&"c/fcr-container.nt".to_string()));

    let reader = manager.read_only();
    assert_eq!(
        reader.get_triples(&rid("ag-2/c"), None)?,
        b"<> a <Child> .\n".to_vec()
    );

    let session = manager.session("tx-3")?;
    session.persist(DeleteOperation::new(rid("ag-2/c")).into())?;
    session.commit()?;

    assert!(!store
        .head_paths("ag-2")?
        .contains(&"c/fcr-container.nt".to_string()));
    assert!(store.contains("ag-2")?);
    assert!(store.has_staged_changes("ag-2")?);

    assert!(matches!(
        manager.read_only().get_triples(&rid("ag-2/c"), None),
        Err(FocflError::NotFound(_))
    ));

    // The group's own container is untouched
    assert_eq!(
        manager.read_only().get_triples(&rid("ag-2"), None)?,
        b"<> a <AG> .\n".to_vec()
    );

    Ok(())
}

#[test]
fn atomic_create_then_delete() -> Result<()> {
    let temp = TempDir::new()?;
    let (manager, store) = new_repo(temp.path(), CommitMode::MutableHead);

    let created = Local::now();
    let session = manager.session("tx-1")?;
    session.persist(
        create_container("atom-a", None, "<> a <Thing> .\n")
            .server_managed(focfl::persist::ServerManagedPropsMode::Relaxed)
            .created(created)
            .into(),
    )?;
    session.commit()?;

    assert!(store.contains("atom-a")?);
    assert!(store.has_staged_changes("atom-a")?);
    assert_eq!(
        manager.read_only().get_headers(&rid("atom-a"), None)?.created,
        created
    );

    let session = manager.session("tx-2")?;
    session.persist(DeleteOperation::new(rid("atom-a")).into())?;
    session.commit()?;

    assert!(store.contains("atom-a")?);
    assert!(!store.has_staged_changes("atom-a")?);

    Ok(())
}

#[test]
fn concurrent_persists_all_visible_at_commit() -> Result<()> {
    let temp = TempDir::new()?;
    let (manager, store) = new_repo(temp.path(), CommitMode::MutableHead);

    let session = manager.session("tx-1")?;
    session.persist(create_archival_group("ag-c", "<> a <AG> .\n").into())?;
    session.commit()?;

    let session = manager.session("tx-2")?;

    let mut handles = Vec::new();
    for i in 0..5 {
        let session = session.clone();
        handles.push(thread::spawn(move || {
            thread::sleep(Duration::from_millis(rand::thread_rng().gen_range(0..10)));
            let id = format!("ag-c/c{}", i);
            session
                .persist(create_container(&id, Some("ag-c"), "<> a <Child> .\n").into())
                .unwrap();
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    session.prepare()?;
    session.commit()?;

    let head = store.head_paths("ag-c")?;
    for i in 0..5 {
        assert!(
            head.contains(&format!("c{}/fcr-container.nt", i)),
            "missing child {} in {:?}",
            i,
            head
        );
    }

    Ok(())
}

#[test]
fn prepare_failure_surfaces_and_rolls_back() -> Result<()> {
    let temp = TempDir::new()?;
    init_logger();

    let config = test_config(temp.path(), CommitMode::MutableHead);
    let inner = FsObjectStore::open(&config.storage_root)?;
    let store = Arc::new(FailingStore {
        inner,
        fail_prepare_on: Some("obj-b".to_string()),
        fail_commit_on: None,
    });
    let manager = SessionManager::with_store(config.clone(), store.clone())?;

    let session = manager.session("tx-1")?;
    session.persist(create_container("obj-a", None, "<> a <A> .\n").into())?;
    session.persist(create_container("obj-b", None, "<> a <B> .\n").into())?;
    session.persist(create_container("obj-c", None, "<> a <C> .\n").into())?;

    match session.commit() {
        Err(FocflError::PrepareFailed { object_id, .. }) => assert_eq!(object_id, "obj-b"),
        other => panic!("Expected PrepareFailed, got {:?}", other),
    }
    assert_eq!(session.state(), SessionState::PrepareFailed);

    session.rollback()?;
    assert_eq!(session.state(), SessionState::RolledBack);

    // Nothing reached the store and the session staging directory is gone
    assert!(!store.contains("obj-a")?);
    assert!(!store.contains("obj-b")?);
    assert!(!store.contains("obj-c")?);
    assert!(!config.session_staging_root.join("tx-1").exists());

    Ok(())
}

#[test]
fn rollback_after_partial_commit_reports_mutable_heads() -> Result<()> {
    let temp = TempDir::new()?;
    init_logger();

    let config = test_config(temp.path(), CommitMode::MutableHead);
    let inner = FsObjectStore::open(&config.storage_root)?;
    let store = Arc::new(FailingStore {
        inner,
        fail_prepare_on: None,
        fail_commit_on: Some("obj-c".to_string()),
    });
    let manager = SessionManager::with_store(config, store.clone())?;

    let session = manager.session("tx-1")?;
    session.persist(create_container("obj-a", None, "<> a <A> .\n").into())?;
    session.persist(create_container("obj-b", None, "<> a <B> .\n").into())?;
    session.persist(create_container("obj-c", None, "<> a <C> .\n").into())?;

    match session.commit() {
        Err(FocflError::CommitFailed { object_id, .. }) => assert_eq!(object_id, "obj-c"),
        other => panic!("Expected CommitFailed, got {:?}", other),
    }
    assert_eq!(session.state(), SessionState::CommitFailed);

    // The first two objects are already visible in their mutable heads
    assert!(store.contains("obj-a")?);
    assert!(store.contains("obj-b")?);

    match session.rollback() {
        Err(FocflError::RollbackFailed(e)) => {
            assert_eq!(e.failures().len(), 2);
            assert!(e.failures().iter().all(|f| f.contains("mutable head")));
            assert!(e.failures()[0].contains("obj-a"));
            assert!(e.failures()[1].contains("obj-b"));
        }
        other => panic!("Expected RollbackFailed, got {:?}", other),
    }
    assert_eq!(session.state(), SessionState::RollbackFailed);

    Ok(())
}

#[test]
fn persist_and_reads_fail_after_commit() -> Result<()> {
    let temp = TempDir::new()?;
    let (manager, _store) = new_repo(temp.path(), CommitMode::NewVersion);

    let session = manager.session("tx-1")?;
    session.persist(create_container("closed-1", None, "<> a <Thing> .\n").into())?;
    session.commit()?;

    assert!(matches!(
        session.persist(create_container("closed-2", None, "x").into()),
        Err(FocflError::SessionClosed(_))
    ));
    assert!(matches!(
        session.commit(),
        Err(FocflError::SessionClosed(_))
    ));
    assert!(matches!(
        session.get_headers(&rid("closed-1"), None),
        Err(FocflError::SessionClosed(_))
    ));
    assert!(matches!(
        session.rollback(),
        Err(FocflError::IllegalState(_))
    ));

    Ok(())
}

#[test]
fn unmapped_resource_operations_return_not_found() -> Result<()> {
    let temp = TempDir::new()?;
    let (manager, _store) = new_repo(temp.path(), CommitMode::NewVersion);

    let session = manager.session("tx-1")?;

    assert!(matches!(
        session.persist(
            UpdateRdfOperation::new(rid("missing"))
                .triples(b"x".to_vec())
                .into()
        ),
        Err(FocflError::NotFound(_))
    ));
    assert!(matches!(
        session.persist(DeleteOperation::new(rid("missing")).into()),
        Err(FocflError::NotFound(_))
    ));
    assert!(matches!(
        session.persist(PurgeOperation::new(rid("missing")).into()),
        Err(FocflError::NotFound(_))
    ));

    // Persist failures leave the session open
    assert_eq!(session.state(), SessionState::Open);
    session.commit()?;

    Ok(())
}

#[test]
fn empty_commit_touches_nothing() -> Result<()> {
    let temp = TempDir::new()?;
    let (manager, _store) = new_repo(temp.path(), CommitMode::NewVersion);

    let session = manager.session("tx-1")?;
    session.commit()?;
    assert_eq!(session.state(), SessionState::Committed);

    let storage_root = temp.path().join("ocfl-root");
    let non_extension_entries: Vec<_> = std::fs::read_dir(&storage_root)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name() != "extensions")
        .collect();
    assert!(non_extension_entries.is_empty());

    Ok(())
}

#[test]
fn rollback_times_out_while_persists_are_running() -> Result<()> {
    let temp = TempDir::new()?;
    init_logger();

    let config = test_config(temp.path(), CommitMode::MutableHead);
    let inner = FsObjectStore::open(&config.storage_root)?;
    let store = Arc::new(BlockingStore {
        inner,
        block_reads: AtomicBool::new(false),
    });
    let manager = SessionManager::with_store(config, store.clone())?;

    let session = manager.session("tx-1")?;
    session.persist(create_container("parent-1", None, "<> a <Parent> .\n").into())?;
    session.commit()?;

    store.block_reads.store(true, Ordering::Release);

    let session = manager.session("tx-2")?;
    let worker = {
        let session = session.clone();
        thread::spawn(move || {
            // Reads the parent's headers, which blocks while the store is stalled
            session.persist(
                create_container("parent-1/kid", Some("parent-1"), "<> a <Kid> .\n").into(),
            )
        })
    };

    thread::sleep(Duration::from_millis(50));

    match session.rollback() {
        Err(FocflError::RollbackFailed(e)) => {
            assert!(e.failures()[0].contains("Timed out"));
        }
        other => panic!("Expected RollbackFailed, got {:?}", other),
    }
    // The timed out rollback left the session untouched
    assert_eq!(session.state(), SessionState::Open);

    store.block_reads.store(false, Ordering::Release);
    worker.join().unwrap()?;

    session.rollback()?;
    assert_eq!(session.state(), SessionState::RolledBack);

    Ok(())
}

#[test]
fn create_delete_roundtrip_preserves_history() -> Result<()> {
    let temp = TempDir::new()?;
    let (manager, _store) = new_repo(temp.path(), CommitMode::NewVersion);

    let session = manager.session("tx-1")?;
    session.persist(create_container("atom-1", None, "<> a <Thing> .\n").into())?;
    session.commit()?;

    let reader = manager.read_only();
    assert_eq!(
        reader.get_triples(&rid("atom-1"), None)?,
        b"<> a <Thing> .\n".to_vec()
    );

    let versions = reader.list_versions(&rid("atom-1"))?;
    assert_eq!(versions.len(), 1);
    let v1 = versions[0].version_num;

    let after_create = Local::now();
    thread::sleep(Duration::from_millis(20));

    let session = manager.session("tx-2")?;
    session.persist(DeleteOperation::new(rid("atom-1")).into())?;
    session.commit()?;

    let reader = manager.read_only();

    // Head reads behave as if the resource never existed
    assert!(matches!(
        reader.get_triples(&rid("atom-1"), None),
        Err(FocflError::NotFound(_))
    ));
    assert!(reader.get_headers(&rid("atom-1"), None)?.deleted);

    // The pre-delete state is still retrievable as a historical version
    assert_eq!(
        reader.get_triples(&rid("atom-1"), Some(v1))?,
        b"<> a <Thing> .\n".to_vec()
    );
    assert!(!reader.get_headers(&rid("atom-1"), Some(v1))?.deleted);

    let memento = reader.version_at(&rid("atom-1"), after_create)?;
    assert_eq!(memento.version_num, v1);

    Ok(())
}

#[test]
fn create_version_promotes_the_mutable_head() -> Result<()> {
    let temp = TempDir::new()?;
    let (manager, store) = new_repo(temp.path(), CommitMode::MutableHead);

    let session = manager.session("tx-1")?;
    session.persist(create_container("mh-1", None, "<> a <Thing> .\n").into())?;
    session.commit()?;

    assert!(store.has_staged_changes("mh-1")?);
    assert!(manager.read_only().list_versions(&rid("mh-1"))?.is_empty());

    let session = manager.session("tx-2")?;
    session.persist(CreateVersionOperation::new(rid("mh-1")).into())?;
    session.commit()?;

    assert!(!store.has_staged_changes("mh-1")?);

    let versions = manager.read_only().list_versions(&rid("mh-1"))?;
    assert_eq!(versions.len(), 1);
    assert_eq!(
        manager
            .read_only()
            .get_triples(&rid("mh-1"), Some(versions[0].version_num))?,
        b"<> a <Thing> .\n".to_vec()
    );

    Ok(())
}

#[test]
fn create_version_without_changes_fails() -> Result<()> {
    let temp = TempDir::new()?;
    let (manager, _store) = new_repo(temp.path(), CommitMode::NewVersion);

    let session = manager.session("tx-1")?;
    session.persist(create_container("nv-1", None, "<> a <Thing> .\n").into())?;
    session.commit()?;

    let session = manager.session("tx-2")?;
    assert!(matches!(
        session.persist(CreateVersionOperation::new(rid("nv-1")).into()),
        Err(FocflError::IllegalState(_))
    ));

    Ok(())
}

#[test]
fn purge_removes_object_and_mappings() -> Result<()> {
    let temp = TempDir::new()?;
    let (manager, store) = new_repo(temp.path(), CommitMode::NewVersion);

    let session = manager.session("tx-1")?;
    session.persist(create_container("purge-1", None, "<> a <Thing> .\n").into())?;
    session.commit()?;

    assert!(store.contains("purge-1")?);

    let session = manager.session("tx-2")?;
    session.persist(PurgeOperation::new(rid("purge-1")).into())?;
    session.commit()?;

    assert!(!store.contains("purge-1")?);
    assert!(matches!(
        manager.read_only().get_headers(&rid("purge-1"), None),
        Err(FocflError::NotFound(_))
    ));

    Ok(())
}

#[test]
fn purge_of_ag_member_is_rejected() -> Result<()> {
    let temp = TempDir::new()?;
    let (manager, _store) = new_repo(temp.path(), CommitMode::NewVersion);

    let session = manager.session("tx-1")?;
    session.persist(create_archival_group("ag-p", "<> a <AG> .\n").into())?;
    session.persist(create_container("ag-p/c", Some("ag-p"), "<> a <Child> .\n").into())?;
    session.commit()?;

    let session = manager.session("tx-2")?;
    assert!(matches!(
        session.persist(PurgeOperation::new(rid("ag-p/c")).into()),
        Err(FocflError::UnsupportedOperation(_))
    ));

    Ok(())
}

#[test]
fn binary_roundtrip_with_fixity() -> Result<()> {
    let temp = TempDir::new()?;
    let (manager, _store) = new_repo(temp.path(), CommitMode::NewVersion);

    let content = b"payload bytes".to_vec();
    let sha256 = DigestAlgorithm::Sha256.hash_hex(&mut content.as_slice())?;

    let session = manager.session("tx-1")?;
    session.persist(
        create_binary("bin-1", None, &content)
            .mime_type("application/octet-stream")
            .filename("payload.bin")
            .expect_digest(DigestAlgorithm::Sha256, sha256)
            .into(),
    )?;
    session.commit()?;

    let reader = manager.read_only();
    assert_eq!(reader.get_binary(&rid("bin-1"), None)?, content);

    let headers = reader.get_headers(&rid("bin-1"), None)?;
    assert_eq!(headers.content_size, Some(content.len() as u64));
    assert_eq!(headers.mime_type.as_deref(), Some("application/octet-stream"));
    assert!(headers.digests.iter().any(|d| d.starts_with("urn:sha512:")));

    // A body read with the wrong accessor is rejected
    assert!(matches!(
        reader.get_triples(&rid("bin-1"), None),
        Err(FocflError::IllegalArgument(_))
    ));

    Ok(())
}

#[test]
fn binary_create_with_bad_digest_is_rejected() -> Result<()> {
    let temp = TempDir::new()?;
    let (manager, _store) = new_repo(temp.path(), CommitMode::NewVersion);

    let session = manager.session("tx-1")?;
    let result = session.persist(
        create_binary("bin-bad", None, b"payload bytes")
            .expect_digest(DigestAlgorithm::Sha256, HexDigest::from("deadbeef"))
            .into(),
    );

    assert!(matches!(result, Err(FocflError::InvalidDigest { .. })));
    assert_eq!(session.state(), SessionState::Open);

    Ok(())
}

#[test]
fn updates_version_and_last_write_wins() -> Result<()> {
    let temp = TempDir::new()?;
    let (manager, _store) = new_repo(temp.path(), CommitMode::NewVersion);

    let session = manager.session("tx-1")?;
    session.persist(create_container("upd-1", None, "<> a <One> .\n").into())?;
    session.commit()?;

    // Two updates in one session collapse to the last write
    let session = manager.session("tx-2")?;
    session.persist(
        UpdateRdfOperation::new(rid("upd-1"))
            .triples(b"<> a <Two> .\n".to_vec())
            .into(),
    )?;
    session.persist(
        UpdateRdfOperation::new(rid("upd-1"))
            .triples(b"<> a <Three> .\n".to_vec())
            .into(),
    )?;
    session.commit()?;

    let reader = manager.read_only();
    assert_eq!(
        reader.get_triples(&rid("upd-1"), None)?,
        b"<> a <Three> .\n".to_vec()
    );

    let versions = reader.list_versions(&rid("upd-1"))?;
    assert_eq!(versions.len(), 2);
    assert_eq!(
        reader.get_triples(&rid("upd-1"), Some(versions[0].version_num))?,
        b"<> a <One> .\n".to_vec()
    );

    Ok(())
}

#[test]
fn strict_mode_rejects_client_timestamps() -> Result<()> {
    let temp = TempDir::new()?;
    let (manager, _store) = new_repo(temp.path(), CommitMode::NewVersion);

    let session = manager.session("tx-1")?;
    let result = session.persist(
        create_container("strict-1", None, "<> a <Thing> .\n")
            .created(Local::now())
            .into(),
    );

    assert!(matches!(result, Err(FocflError::IllegalArgument(_))));

    Ok(())
}

#[test]
fn rollback_discards_staged_changes() -> Result<()> {
    let temp = TempDir::new()?;
    let (manager, store) = new_repo(temp.path(), CommitMode::NewVersion);

    let session = manager.session("tx-1")?;
    session.persist(create_container("rb-1", None, "<> a <Thing> .\n").into())?;

    // Staged changes are visible inside the session but nowhere else
    assert_eq!(
        session.get_triples(&rid("rb-1"), None)?,
        b"<> a <Thing> .\n".to_vec()
    );
    assert!(matches!(
        manager.read_only().get_headers(&rid("rb-1"), None),
        Err(FocflError::NotFound(_))
    ));

    session.rollback()?;
    assert_eq!(session.state(), SessionState::RolledBack);

    assert!(!store.contains("rb-1")?);
    assert!(matches!(
        manager.read_only().get_headers(&rid("rb-1"), None),
        Err(FocflError::NotFound(_))
    ));

    Ok(())
}
