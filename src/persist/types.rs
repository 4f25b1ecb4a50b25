use core::fmt;
use std::convert::TryFrom;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{Display as EnumDisplay, EnumString};

use crate::error::{FocflError, Result};

/// An opaque logical resource identifier. A `/` separated id denotes a resource nested
/// below its parent; whether the ancestors form an archival group is a property of the
/// resources, not of the id.
#[derive(Deserialize, Serialize, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Clone)]
#[serde(try_from = "String")]
#[serde(into = "String")]
pub struct ResourceId(String);

/// Controls whether callers may supply server-managed properties (timestamps) themselves
#[derive(
    Deserialize, Serialize, Debug, Eq, PartialEq, Copy, Clone, EnumString, EnumDisplay,
)]
pub enum ServerManagedPropsMode {
    #[serde(rename = "strict")]
    #[strum(serialize = "strict")]
    Strict,
    #[serde(rename = "relaxed")]
    #[strum(serialize = "relaxed")]
    Relaxed,
}

impl ResourceId {
    pub fn new(id: impl AsRef<str>) -> Result<Self> {
        let id = id.as_ref();

        if id.is_empty() {
            return Err(FocflError::IllegalArgument(
                "Resource ids may not be blank".to_string(),
            ));
        }
        if id.starts_with('/') || id.ends_with('/') {
            return Err(FocflError::IllegalArgument(format!(
                "Resource id {} must not begin or end with '/'",
                id
            )));
        }
        if id.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
            return Err(FocflError::IllegalArgument(format!(
                "Resource id {} contains an invalid segment",
                id
            )));
        }

        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the id of the parent resource, or `None` for a top-level id
    pub fn parent(&self) -> Option<ResourceId> {
        self.0
            .rfind('/')
            .map(|index| ResourceId(self.0[..index].to_string()))
    }

    /// Returns the final `/` separated segment of the id
    pub fn last_segment(&self) -> &str {
        match self.0.rfind('/') {
            Some(index) => &self.0[index + 1..],
            None => &self.0,
        }
    }

    /// Returns the part of this id below `ancestor`: the empty string when the ids are
    /// equal, and `None` when this id is not at or below `ancestor`.
    pub fn relative_to(&self, ancestor: &ResourceId) -> Option<&str> {
        if self == ancestor {
            return Some("");
        }

        let prefix = &ancestor.0;
        if self.0.len() > prefix.len()
            && self.0.starts_with(prefix.as_str())
            && self.0.as_bytes()[prefix.len()] == b'/'
        {
            Some(&self.0[prefix.len() + 1..])
        } else {
            None
        }
    }
}

impl TryFrom<&str> for ResourceId {
    type Error = FocflError;

    fn try_from(id: &str) -> Result<Self, Self::Error> {
        ResourceId::new(id)
    }
}

impl TryFrom<String> for ResourceId {
    type Error = FocflError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        ResourceId::new(id)
    }
}

impl FromStr for ResourceId {
    type Err = FocflError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        ResourceId::new(id)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
