//! Typed resource operations. Each operation kind maps statically to exactly one
//! persister, so dispatch is a match over the enum rather than a runtime handler lookup.

use chrono::{DateTime, Local};
use enum_dispatch::enum_dispatch;

use crate::ocfl::{DigestAlgorithm, HexDigest};
use crate::persist::{ResourceId, ServerManagedPropsMode};

/// A resource operation awaiting persistence
#[enum_dispatch(Persister)]
#[derive(Debug)]
pub enum ResourceOperation {
    CreateRdf(CreateRdfOperation),
    UpdateRdf(UpdateRdfOperation),
    CreateBinary(CreateBinaryOperation),
    UpdateBinary(UpdateBinaryOperation),
    Delete(DeleteOperation),
    Purge(PurgeOperation),
    CreateVersion(CreateVersionOperation),
}

impl ResourceOperation {
    /// The id of the resource the operation targets
    pub fn resource_id(&self) -> &ResourceId {
        match self {
            ResourceOperation::CreateRdf(op) => &op.id,
            ResourceOperation::UpdateRdf(op) => &op.id,
            ResourceOperation::CreateBinary(op) => &op.id,
            ResourceOperation::UpdateBinary(op) => &op.id,
            ResourceOperation::Delete(op) => &op.id,
            ResourceOperation::Purge(op) => &op.id,
            ResourceOperation::CreateVersion(op) => &op.id,
        }
    }
}

/// Creates an RDF source, optionally as an archival group or as a member of one
#[derive(Debug)]
pub struct CreateRdfOperation {
    pub id: ResourceId,
    pub parent: Option<ResourceId>,
    pub archival_group: bool,
    pub smp_mode: ServerManagedPropsMode,
    pub triples: Vec<u8>,
    pub created: Option<DateTime<Local>>,
    pub last_modified: Option<DateTime<Local>>,
}

/// Replaces the RDF body of an existing container
#[derive(Debug)]
pub struct UpdateRdfOperation {
    pub id: ResourceId,
    pub smp_mode: ServerManagedPropsMode,
    pub triples: Vec<u8>,
    pub last_modified: Option<DateTime<Local>>,
}

/// Creates a non-RDF source
#[derive(Debug)]
pub struct CreateBinaryOperation {
    pub id: ResourceId,
    pub parent: Option<ResourceId>,
    pub smp_mode: ServerManagedPropsMode,
    pub content: Vec<u8>,
    pub mime_type: Option<String>,
    pub filename: Option<String>,
    /// Caller supplied digests that must match the content
    pub digests: Vec<(DigestAlgorithm, HexDigest)>,
    pub created: Option<DateTime<Local>>,
    pub last_modified: Option<DateTime<Local>>,
}

/// Replaces the content of an existing non-RDF source
#[derive(Debug)]
pub struct UpdateBinaryOperation {
    pub id: ResourceId,
    pub smp_mode: ServerManagedPropsMode,
    pub content: Vec<u8>,
    pub mime_type: Option<String>,
    pub filename: Option<String>,
    pub digests: Vec<(DigestAlgorithm, HexDigest)>,
    pub last_modified: Option<DateTime<Local>>,
}

/// Deletes a resource, leaving its history and a tombstone behind
#[derive(Debug)]
pub struct DeleteOperation {
    pub id: ResourceId,
}

/// Removes a whole OCFL object and its index mappings
#[derive(Debug)]
pub struct PurgeOperation {
    pub id: ResourceId,
}

/// Promotes an object's mutable head to an immutable version
#[derive(Debug)]
pub struct CreateVersionOperation {
    pub id: ResourceId,
}

impl CreateRdfOperation {
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            parent: None,
            archival_group: false,
            smp_mode: ServerManagedPropsMode::Strict,
            triples: Vec::new(),
            created: None,
            last_modified: None,
        }
    }

    pub fn with_parent(mut self, parent: ResourceId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn archival_group(mut self, archival_group: bool) -> Self {
        self.archival_group = archival_group;
        self
    }

    pub fn server_managed(mut self, mode: ServerManagedPropsMode) -> Self {
        self.smp_mode = mode;
        self
    }

    pub fn triples(mut self, triples: impl Into<Vec<u8>>) -> Self {
        self.triples = triples.into();
        self
    }

    pub fn created(mut self, created: DateTime<Local>) -> Self {
        self.created = Some(created);
        self
    }

    pub fn last_modified(mut self, last_modified: DateTime<Local>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }
}

impl UpdateRdfOperation {
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            smp_mode: ServerManagedPropsMode::Strict,
            triples: Vec::new(),
            last_modified: None,
        }
    }

    pub fn server_managed(mut self, mode: ServerManagedPropsMode) -> Self {
        self.smp_mode = mode;
        self
    }

    pub fn triples(mut self, triples: impl Into<Vec<u8>>) -> Self {
        self.triples = triples.into();
        self
    }

    pub fn last_modified(mut self, last_modified: DateTime<Local>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }
}

impl CreateBinaryOperation {
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            parent: None,
            smp_mode: ServerManagedPropsMode::Strict,
            content: Vec::new(),
            mime_type: None,
            filename: None,
            digests: Vec::new(),
            created: None,
            last_modified: None,
        }
    }

    pub fn with_parent(mut self, parent: ResourceId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn server_managed(mut self, mode: ServerManagedPropsMode) -> Self {
        self.smp_mode = mode;
        self
    }

    pub fn content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = content.into();
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn expect_digest(mut self, algorithm: DigestAlgorithm, digest: HexDigest) -> Self {
        self.digests.push((algorithm, digest));
        self
    }

    pub fn created(mut self, created: DateTime<Local>) -> Self {
        self.created = Some(created);
        self
    }

    pub fn last_modified(mut self, last_modified: DateTime<Local>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }
}

impl UpdateBinaryOperation {
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            smp_mode: ServerManagedPropsMode::Strict,
            content: Vec::new(),
            mime_type: None,
            filename: None,
            digests: Vec::new(),
            last_modified: None,
        }
    }

    pub fn server_managed(mut self, mode: ServerManagedPropsMode) -> Self {
        self.smp_mode = mode;
        self
    }

    pub fn content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = content.into();
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn expect_digest(mut self, algorithm: DigestAlgorithm, digest: HexDigest) -> Self {
        self.digests.push((algorithm, digest));
        self
    }

    pub fn last_modified(mut self, last_modified: DateTime<Local>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }
}

impl DeleteOperation {
    pub fn new(id: ResourceId) -> Self {
        Self { id }
    }
}

impl PurgeOperation {
    pub fn new(id: ResourceId) -> Self {
        Self { id }
    }
}

impl CreateVersionOperation {
    pub fn new(id: ResourceId) -> Self {
        Self { id }
    }
}
