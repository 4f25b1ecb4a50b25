use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use strum_macros::{Display as EnumDisplay, EnumString};

use crate::error::Result;
use crate::ocfl::consts::{CONTAINER_BODY_FILE, HEADERS_DIR, HEADERS_SUFFIX, ROOT_HEADERS_FILE};
use crate::ocfl::{DigestAlgorithm, HexDigest};
use crate::persist::ResourceId;

/// How a resource interacts with the repository: as an RDF container or as a binary
#[derive(Deserialize, Serialize, Debug, Eq, PartialEq, Copy, Clone, EnumString, EnumDisplay)]
pub enum InteractionModel {
    #[serde(rename = "basic-container")]
    #[strum(serialize = "basic-container")]
    BasicContainer,
    #[serde(rename = "non-rdf-source")]
    #[strum(serialize = "non-rdf-source")]
    NonRdfSource,
}

/// The header sidecar persisted next to every resource. Sidecars are versioned members of
/// the OCFL object, so historical header reads come for free.
#[derive(Deserialize, Serialize, Debug, Eq, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ResourceHeaders {
    pub id: ResourceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ResourceId>,
    pub interaction_model: InteractionModel,
    #[serde(default)]
    pub archival_group: bool,
    #[serde(default)]
    pub deleted: bool,
    pub created: DateTime<Local>,
    pub last_modified: DateTime<Local>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub digests: Vec<String>,
}

impl ResourceHeaders {
    /// Creates headers for a new resource stamped with the given timestamps
    pub fn new(
        id: ResourceId,
        parent: Option<ResourceId>,
        interaction_model: InteractionModel,
        archival_group: bool,
        created: DateTime<Local>,
    ) -> Self {
        Self {
            id,
            parent,
            interaction_model,
            archival_group,
            deleted: false,
            created,
            last_modified: created,
            content_size: None,
            mime_type: None,
            filename: None,
            digests: Vec::new(),
        }
    }

    /// Creates the tombstone left behind when a root resource is deleted
    pub fn tombstone(mut headers: ResourceHeaders, deleted_at: DateTime<Local>) -> Self {
        headers.deleted = true;
        headers.last_modified = deleted_at;
        headers.content_size = None;
        headers.digests = Vec::new();
        headers
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Formats a digest the way header sidecars record them, eg `urn:sha512:abc...`
pub fn digest_urn(algorithm: DigestAlgorithm, digest: &HexDigest) -> String {
    format!("urn:{}:{}", algorithm, digest)
}

/// Returns the logical path of a resource's header sidecar. `relative_path` is the
/// resource's path below its root resource, empty for the root itself.
pub fn headers_logical_path(relative_path: &str) -> String {
    if relative_path.is_empty() {
        format!("{}/{}", HEADERS_DIR, ROOT_HEADERS_FILE)
    } else {
        format!("{}/{}{}", HEADERS_DIR, relative_path, HEADERS_SUFFIX)
    }
}

/// Returns the logical path of a container's RDF body
pub fn container_body_logical_path(relative_path: &str) -> String {
    if relative_path.is_empty() {
        CONTAINER_BODY_FILE.to_string()
    } else {
        format!("{}/{}", relative_path, CONTAINER_BODY_FILE)
    }
}

/// Returns the logical path of a binary's content. The file is named after the final
/// segment of the resource id.
pub fn binary_body_logical_path(relative_path: &str, last_segment: &str) -> String {
    if relative_path.is_empty() {
        last_segment.to_string()
    } else {
        relative_path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Local;

    use super::{
        container_body_logical_path, headers_logical_path, InteractionModel, ResourceHeaders,
    };
    use crate::persist::ResourceId;

    #[test]
    fn headers_round_trip() {
        let headers = ResourceHeaders::new(
            ResourceId::new("ag/child").unwrap(),
            Some(ResourceId::new("ag").unwrap()),
            InteractionModel::BasicContainer,
            false,
            Local::now(),
        );

        let bytes = headers.to_json().unwrap();
        let parsed = ResourceHeaders::from_json(&bytes).unwrap();

        assert_eq!(parsed, headers);
    }

    #[test]
    fn tombstone_clears_content_fields() {
        let mut headers = ResourceHeaders::new(
            ResourceId::new("bin").unwrap(),
            None,
            InteractionModel::NonRdfSource,
            false,
            Local::now(),
        );
        headers.content_size = Some(42);
        headers.digests = vec!["urn:sha512:abc".to_string()];

        let tombstone = ResourceHeaders::tombstone(headers, Local::now());

        assert!(tombstone.deleted);
        assert!(tombstone.content_size.is_none());
        assert!(tombstone.digests.is_empty());
    }

    #[test]
    fn logical_paths_follow_the_resource_hierarchy() {
        assert_eq!(headers_logical_path(""), ".fcrepo/fcr-root.json");
        assert_eq!(headers_logical_path("c"), ".fcrepo/c.json");
        assert_eq!(container_body_logical_path(""), "fcr-container.nt");
        assert_eq!(container_body_logical_path("c"), "c/fcr-container.nt");
    }
}
