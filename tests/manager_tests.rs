use std::fs;
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use focfl::persist::{DeleteOperation, SessionManager, SessionState};
use focfl::{CommitMode, FocflError};

use common::*;

mod common;

#[test]
fn same_transaction_id_returns_same_session() -> Result<()> {
    let temp = TempDir::new()?;
    let (manager, _store) = new_repo(temp.path(), CommitMode::NewVersion);

    let first = manager.session("tx-1")?;
    let second = manager.session("tx-1")?;

    assert!(Arc::ptr_eq(&first, &second));

    Ok(())
}

#[test]
fn terminal_sessions_are_replaced() -> Result<()> {
    let temp = TempDir::new()?;
    let (manager, _store) = new_repo(temp.path(), CommitMode::NewVersion);

    let first = manager.session("tx-1")?;
    first.commit()?;
    assert_eq!(first.state(), SessionState::Committed);

    let second = manager.session("tx-1")?;
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.state(), SessionState::Open);

    Ok(())
}

#[test]
fn blank_transaction_ids_are_rejected() -> Result<()> {
    let temp = TempDir::new()?;
    let (manager, _store) = new_repo(temp.path(), CommitMode::NewVersion);

    assert!(matches!(
        manager.session("  "),
        Err(FocflError::IllegalArgument(_))
    ));

    Ok(())
}

#[test]
fn read_only_sessions_cannot_write_but_can_read() -> Result<()> {
    let temp = TempDir::new()?;
    let (manager, _store) = new_repo(temp.path(), CommitMode::NewVersion);

    let session = manager.session("tx-1")?;
    session.persist(create_container("ro-1", None, "<> a <Thing> .\n").into())?;
    session.commit()?;

    let reader = manager.read_only();
    assert!(reader.is_read_only());

    assert!(matches!(
        reader.persist(create_container("ro-2", None, "x").into()),
        Err(FocflError::UnsupportedOperation(_))
    ));
    assert!(matches!(
        reader.persist(DeleteOperation::new(rid("ro-1")).into()),
        Err(FocflError::UnsupportedOperation(_))
    ));

    assert_eq!(
        reader.get_triples(&rid("ro-1"), None)?,
        b"<> a <Thing> .\n".to_vec()
    );

    // Commit and rollback are idempotent no-ops for read-only sessions
    reader.commit()?;
    reader.commit()?;
    reader.rollback()?;
    assert_eq!(reader.get_headers(&rid("ro-1"), None)?.id, rid("ro-1"));

    Ok(())
}

#[test]
fn reap_removes_stale_staging_dirs_but_keeps_live_sessions() -> Result<()> {
    let temp = TempDir::new()?;
    init_logger();

    let mut config = test_config(temp.path(), CommitMode::NewVersion);
    config.orphan_session_timeout_secs = 0;
    let manager = SessionManager::new(config.clone())?;

    // A live session's staging directory must survive the sweep
    let session = manager.session("tx-live")?;
    session.persist(create_container("keep-1", None, "<> a <Thing> .\n").into())?;

    // An abandoned directory from a dead process
    let stale = config.session_staging_root.join("tx-stale");
    fs::create_dir_all(&stale)?;

    let reaped = manager.reap_orphaned()?;

    assert_eq!(reaped, 1);
    assert!(!stale.exists());
    assert!(config.session_staging_root.join("tx-live").exists());

    session.commit()?;

    Ok(())
}
