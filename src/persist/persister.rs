//! One persister per operation kind. The operation enum dispatches statically to the
//! persister that knows how to stage it; an operation a persister cannot apply to its
//! target fails the persist and leaves the session open.

use chrono::{DateTime, Local};
use enum_dispatch::enum_dispatch;
use log::info;

use crate::error::{FocflError, Result};
use crate::ocfl::consts::HEADERS_DIR;
use crate::ocfl::{CommitMode, DigestAlgorithm};
use crate::persist::headers::{
    binary_body_logical_path, container_body_logical_path, digest_urn, headers_logical_path,
    InteractionModel, ResourceHeaders,
};
use crate::persist::index::Mapping;
use crate::persist::ops::*;
use crate::persist::session::StorageSession;
use crate::persist::{ResourceId, ServerManagedPropsMode};

/// Stages one kind of resource operation into a storage session
#[enum_dispatch]
pub trait Persister {
    fn stage(&self, session: &StorageSession) -> Result<()>;
}

/// Where a resource lives: its OCFL object, its root resource, and its path below it
struct Placement {
    ocfl_id: String,
    root_id: ResourceId,
    relative_path: String,
}

impl Persister for CreateRdfOperation {
    fn stage(&self, session: &StorageSession) -> Result<()> {
        let session_id = session.writer_id()?;

        ensure_not_mapped(session, &self.id)?;
        let placement = resolve_placement(session, &self.id, self.parent.as_ref(), self.archival_group)?;
        let (created, last_modified) =
            resolve_timestamps(self.smp_mode, &self.created, &self.last_modified)?;

        let mut headers = ResourceHeaders::new(
            self.id.clone(),
            self.parent.clone(),
            InteractionModel::BasicContainer,
            self.archival_group,
            created,
        );
        headers.last_modified = last_modified;

        let object_session = session.object_session(&placement.ocfl_id)?;
        object_session.stage_write(
            &headers_logical_path(&placement.relative_path),
            &headers.to_json()?,
        )?;
        object_session.stage_write(
            &container_body_logical_path(&placement.relative_path),
            &self.triples,
        )?;

        session.index().add(
            session_id,
            self.id.clone(),
            Mapping::new(placement.ocfl_id.clone(), placement.root_id),
        );

        info!(
            "Staged create of RDF source {} in object {}",
            self.id, placement.ocfl_id
        );

        Ok(())
    }
}

impl Persister for UpdateRdfOperation {
    fn stage(&self, session: &StorageSession) -> Result<()> {
        session.writer_id()?;

        let (mut headers, placement) = resolve_existing(session, &self.id)?;

        if headers.interaction_model != InteractionModel::BasicContainer {
            return Err(FocflError::IllegalArgument(format!(
                "Resource {} is not an RDF source",
                self.id
            )));
        }

        let (_, last_modified) = resolve_timestamps(self.smp_mode, &None, &self.last_modified)?;
        headers.last_modified = last_modified;

        let object_session = session.object_session(&placement.ocfl_id)?;
        object_session.stage_write(
            &headers_logical_path(&placement.relative_path),
            &headers.to_json()?,
        )?;
        object_session.stage_write(
            &container_body_logical_path(&placement.relative_path),
            &self.triples,
        )?;

        info!(
            "Staged update of RDF source {} in object {}",
            self.id, placement.ocfl_id
        );

        Ok(())
    }
}

impl Persister for CreateBinaryOperation {
    fn stage(&self, session: &StorageSession) -> Result<()> {
        let session_id = session.writer_id()?;

        ensure_not_mapped(session, &self.id)?;
        let placement = resolve_placement(session, &self.id, self.parent.as_ref(), false)?;
        let (created, last_modified) =
            resolve_timestamps(self.smp_mode, &self.created, &self.last_modified)?;

        let mut headers = ResourceHeaders::new(
            self.id.clone(),
            self.parent.clone(),
            InteractionModel::NonRdfSource,
            false,
            created,
        );
        headers.last_modified = last_modified;
        describe_binary(
            &mut headers,
            &self.content,
            &self.digests,
            self.mime_type.clone(),
            self.filename.clone(),
        )?;

        let object_session = session.object_session(&placement.ocfl_id)?;
        object_session.stage_write(
            &headers_logical_path(&placement.relative_path),
            &headers.to_json()?,
        )?;
        object_session.stage_write(
            &binary_body_logical_path(&placement.relative_path, self.id.last_segment()),
            &self.content,
        )?;

        session.index().add(
            session_id,
            self.id.clone(),
            Mapping::new(placement.ocfl_id.clone(), placement.root_id),
        );

        info!(
            "Staged create of non-RDF source {} in object {}",
            self.id, placement.ocfl_id
        );

        Ok(())
    }
}

impl Persister for UpdateBinaryOperation {
    fn stage(&self, session: &StorageSession) -> Result<()> {
        session.writer_id()?;

        let (mut headers, placement) = resolve_existing(session, &self.id)?;

        if headers.interaction_model != InteractionModel::NonRdfSource {
            return Err(FocflError::IllegalArgument(format!(
                "Resource {} is not a non-RDF source",
                self.id
            )));
        }

        let (_, last_modified) = resolve_timestamps(self.smp_mode, &None, &self.last_modified)?;
        headers.last_modified = last_modified;
        describe_binary(
            &mut headers,
            &self.content,
            &self.digests,
            self.mime_type.clone(),
            self.filename.clone(),
        )?;

        let object_session = session.object_session(&placement.ocfl_id)?;
        object_session.stage_write(
            &headers_logical_path(&placement.relative_path),
            &headers.to_json()?,
        )?;
        object_session.stage_write(
            &binary_body_logical_path(&placement.relative_path, self.id.last_segment()),
            &self.content,
        )?;

        info!(
            "Staged update of non-RDF source {} in object {}",
            self.id, placement.ocfl_id
        );

        Ok(())
    }
}

impl Persister for DeleteOperation {
    fn stage(&self, session: &StorageSession) -> Result<()> {
        session.writer_id()?;

        let (headers, placement) = resolve_existing(session, &self.id)?;
        let object_session = session.object_session(&placement.ocfl_id)?;

        if placement.relative_path.is_empty() {
            // Root resource: remove everything at head and leave a durable tombstone
            for path in object_session.effective_head_paths()? {
                object_session.stage_delete(&path)?;
            }

            let tombstone = ResourceHeaders::tombstone(headers, Local::now());
            object_session.stage_write(&headers_logical_path(""), &tombstone.to_json()?)?;
            object_session.set_commit_mode(CommitMode::NewVersion);
        } else {
            // Archival group member: remove the member's subtree, the group stays alive
            for path in object_session.effective_head_paths()? {
                if in_resource_subtree(&path, &placement.relative_path) {
                    object_session.stage_delete(&path)?;
                }
            }
        }

        info!(
            "Staged delete of resource {} in object {}",
            self.id, placement.ocfl_id
        );

        Ok(())
    }
}

impl Persister for PurgeOperation {
    fn stage(&self, session: &StorageSession) -> Result<()> {
        let session_id = session.writer_id()?;

        let mapping = session.index().get(Some(session_id), &self.id)?;

        if mapping.root_id != self.id {
            return Err(FocflError::UnsupportedOperation(format!(
                "Cannot purge {}: purges remove whole objects, not archival group members",
                self.id
            )));
        }

        let object_session = session.object_session(&mapping.ocfl_id)?;
        object_session.mark_purge()?;

        for id in session
            .index()
            .ids_for_object(Some(session_id), &mapping.ocfl_id)
        {
            session.index().remove(session_id, &id);
        }

        info!("Staged purge of object {}", mapping.ocfl_id);

        Ok(())
    }
}

impl Persister for CreateVersionOperation {
    fn stage(&self, session: &StorageSession) -> Result<()> {
        let session_id = session.writer_id()?;

        let mapping = session.index().get(Some(session_id), &self.id)?;

        if mapping.root_id != self.id {
            return Err(FocflError::UnsupportedOperation(format!(
                "Cannot version {}: versions are created for whole objects",
                self.id
            )));
        }

        let has_pending = session
            .existing_object_session(&mapping.ocfl_id)
            .map(|object_session| object_session.has_pending_changes())
            .unwrap_or(false);

        if !has_pending && !session.store().has_staged_changes(&mapping.ocfl_id)? {
            return Err(FocflError::IllegalState(format!(
                "Object {} has no staged changes to version",
                mapping.ocfl_id
            )));
        }

        let object_session = session.object_session(&mapping.ocfl_id)?;
        object_session.set_commit_mode(CommitMode::NewVersion);

        info!("Staged version creation for object {}", mapping.ocfl_id);

        Ok(())
    }
}

/// Fails with `IllegalState` when the resource already has a mapping visible to the session
fn ensure_not_mapped(session: &StorageSession, id: &ResourceId) -> Result<()> {
    match session.index().get(session.session_id(), id) {
        Ok(_) => Err(FocflError::IllegalState(format!(
            "Cannot create resource {} because it already exists",
            id
        ))),
        Err(FocflError::NotFound(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Resolves the mapping and current headers of an existing, undeleted resource
fn resolve_existing(
    session: &StorageSession,
    id: &ResourceId,
) -> Result<(ResourceHeaders, Placement)> {
    let mapping = session.index().get(session.session_id(), id)?;
    let headers = session.read_headers(id, None)?;

    if headers.deleted {
        return Err(FocflError::NotFound(format!(
            "Resource {} has been deleted",
            id
        )));
    }

    let relative_path = relative_to_root(id, &mapping.root_id)?;

    Ok((
        headers,
        Placement {
            ocfl_id: mapping.ocfl_id,
            root_id: mapping.root_id,
            relative_path,
        },
    ))
}

/// Decides which OCFL object a new resource lands in. Resources outside an archival
/// group get an object of their own; descendants of an archival group share the group's
/// object.
fn resolve_placement(
    session: &StorageSession,
    id: &ResourceId,
    parent: Option<&ResourceId>,
    archival_group: bool,
) -> Result<Placement> {
    let parent = match parent {
        Some(parent) => parent,
        None => {
            return Ok(Placement {
                ocfl_id: id.as_str().to_string(),
                root_id: id.clone(),
                relative_path: String::new(),
            });
        }
    };

    if id.parent().as_ref() != Some(parent) {
        return Err(FocflError::IllegalArgument(format!(
            "Resource {} is not a direct child of {}",
            id, parent
        )));
    }

    let parent_mapping = session.index().get(session.session_id(), parent)?;
    let parent_headers = session.read_headers(parent, None)?;

    if parent_headers.deleted {
        return Err(FocflError::IllegalState(format!(
            "Cannot create {} because its parent {} has been deleted",
            id, parent
        )));
    }

    let parent_in_group = parent_headers.archival_group || parent_mapping.root_id != *parent;

    if parent_in_group {
        if archival_group {
            return Err(FocflError::UnsupportedOperation(format!(
                "Cannot create archival group {} inside archival group {}",
                id, parent_mapping.root_id
            )));
        }

        let relative_path = relative_to_root(id, &parent_mapping.root_id)?;

        Ok(Placement {
            ocfl_id: parent_mapping.ocfl_id,
            root_id: parent_mapping.root_id,
            relative_path,
        })
    } else {
        Ok(Placement {
            ocfl_id: id.as_str().to_string(),
            root_id: id.clone(),
            relative_path: String::new(),
        })
    }
}

fn relative_to_root(id: &ResourceId, root_id: &ResourceId) -> Result<String> {
    id.relative_to(root_id)
        .map(|rel| rel.to_string())
        .ok_or_else(|| {
            FocflError::IllegalState(format!(
                "Resource {} is mapped to root {} but is not below it",
                id, root_id
            ))
        })
}

/// Resolves creation/modification timestamps, enforcing the server-managed-properties mode
fn resolve_timestamps(
    mode: ServerManagedPropsMode,
    created: &Option<DateTime<Local>>,
    last_modified: &Option<DateTime<Local>>,
) -> Result<(DateTime<Local>, DateTime<Local>)> {
    if mode == ServerManagedPropsMode::Strict
        && (created.is_some() || last_modified.is_some())
    {
        return Err(FocflError::IllegalArgument(
            "Server managed properties may not be supplied in strict mode".to_string(),
        ));
    }

    let now = Local::now();
    let created = created.unwrap_or(now);
    let last_modified = last_modified.unwrap_or(created);

    Ok((created, last_modified))
}

/// Validates caller supplied digests and records the binary's description in its headers
fn describe_binary(
    headers: &mut ResourceHeaders,
    content: &[u8],
    expected_digests: &[(DigestAlgorithm, crate::ocfl::HexDigest)],
    mime_type: Option<String>,
    filename: Option<String>,
) -> Result<()> {
    let mut digests = Vec::new();

    for (algorithm, expected) in expected_digests {
        let actual = algorithm.hash_hex(&mut &content[..])?;
        if &actual != expected {
            return Err(FocflError::InvalidDigest {
                expected: digest_urn(*algorithm, expected),
                actual: digest_urn(*algorithm, &actual),
            });
        }
        digests.push(digest_urn(*algorithm, expected));
    }

    let sha512 = DigestAlgorithm::Sha512.hash_hex(&mut &content[..])?;
    let sha512_urn = digest_urn(DigestAlgorithm::Sha512, &sha512);
    if !digests.contains(&sha512_urn) {
        digests.push(sha512_urn);
    }

    headers.content_size = Some(content.len() as u64);
    headers.mime_type = mime_type;
    headers.filename = filename;
    headers.digests = digests;

    Ok(())
}

/// Returns true if the logical path belongs to the resource at `relative_path`, either as
/// its body, its header sidecar, or anything in its subtree.
fn in_resource_subtree(logical_path: &str, relative_path: &str) -> bool {
    if logical_path == relative_path {
        return true;
    }

    let subtree_prefix = format!("{}/", relative_path);
    if logical_path.starts_with(&subtree_prefix) {
        return true;
    }

    let headers_prefix = format!("{}/{}", HEADERS_DIR, subtree_prefix);
    logical_path == headers_logical_path(relative_path)
        || logical_path.starts_with(&headers_prefix)
}
