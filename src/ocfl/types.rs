use core::fmt;
use std::cmp::Ordering;
use std::convert::TryFrom;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::{Display as EnumDisplay, EnumString};

use crate::error::{FocflError, Result};

static VERSION_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^v\d+$"#).unwrap());

/// Represents an [OCFL object version](https://ocfl.io/1.0/spec/#version-directories).
#[derive(Deserialize, Serialize, Debug, Copy, Clone)]
#[serde(try_from = "&str")]
#[serde(into = "String")]
pub struct VersionNum {
    pub number: u32,
    pub width: u32,
}

/// Controls what an object sub-session's commit produces: an overwritable mutable head
/// or a new immutable OCFL version.
#[derive(Deserialize, Serialize, Debug, Eq, PartialEq, Copy, Clone, EnumString, EnumDisplay)]
pub enum CommitMode {
    #[serde(rename = "mutable-head")]
    #[strum(serialize = "mutable-head")]
    MutableHead,
    #[serde(rename = "new-version")]
    #[strum(serialize = "new-version")]
    NewVersion,
}

/// Metadata about an immutable object version
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct VersionDetails {
    /// The version number of the version
    pub version_num: VersionNum,
    /// When the version was created
    pub created: DateTime<Local>,
    /// A description of the version
    pub message: Option<String>,
}

impl VersionNum {
    /// Creates a new VersionNum with width 0
    pub fn new(number: u32) -> Self {
        Self { number, width: 0 }
    }

    /// Returns the version for `v1`
    pub fn v1() -> Self {
        Self::new(1)
    }

    /// Returns the previous version, or an Error if the previous version is invalid (less than 1).
    pub fn previous(&self) -> Result<VersionNum> {
        if self.number - 1 < 1 {
            return Err(FocflError::IllegalState(
                "Versions cannot be less than 1".to_string(),
            ));
        }

        Ok(Self {
            number: self.number - 1,
            width: self.width,
        })
    }

    /// Returns the next version, or an Error if the next version is invalid. Version numbers only
    /// have limits if they are zero-padded.
    pub fn next(&self) -> Result<VersionNum> {
        let max = match self.width {
            0 => u32::MAX,
            _ => (10 * (self.width - 1)) - 1,
        };

        if self.number + 1 > max {
            return Err(FocflError::IllegalState(format!(
                "Version cannot be greater than {}",
                max
            )));
        }

        Ok(Self {
            number: self.number + 1,
            width: self.width,
        })
    }
}

impl TryFrom<&str> for VersionNum {
    type Error = FocflError;

    /// Parses a string in the format of `v1` or `v0002` into a `VersionNum`. An error is returned
    /// if the version string is invalid.
    fn try_from(version: &str) -> Result<Self, Self::Error> {
        if !VERSION_REGEX.is_match(version) {
            return Err(FocflError::IllegalArgument(format!(
                "Invalid version {}",
                version
            )));
        }

        match version[1..].parse::<u32>() {
            Ok(num) => {
                if num < 1 {
                    return Err(FocflError::IllegalArgument(format!(
                        "Invalid version {}",
                        version
                    )));
                }

                let width = match version.starts_with("v0") {
                    true => version.len() - 1,
                    false => 0,
                };

                Ok(Self {
                    number: num,
                    width: width as u32,
                })
            }
            Err(_) => Err(FocflError::IllegalArgument(format!(
                "Invalid version {}",
                version
            ))),
        }
    }
}

impl TryFrom<u32> for VersionNum {
    type Error = FocflError;

    fn try_from(version: u32) -> Result<Self, Self::Error> {
        if version < 1 {
            return Err(FocflError::IllegalArgument(format!(
                "Invalid version number {}",
                version
            )));
        }

        Ok(Self {
            number: version,
            width: 0,
        })
    }
}

impl FromStr for VersionNum {
    type Err = FocflError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionNum::try_from(s)
    }
}

impl From<VersionNum> for String {
    fn from(version: VersionNum) -> Self {
        version.to_string()
    }
}

impl Display for VersionNum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{:0width$}",
            self.number,
            width = self.width as usize
        )
    }
}

impl PartialEq for VersionNum {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
    }
}

impl Eq for VersionNum {}

impl std::hash::Hash for VersionNum {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.number.hash(state)
    }
}

impl PartialOrd for VersionNum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionNum {
    fn cmp(&self, other: &Self) -> Ordering {
        self.number.cmp(&other.number)
    }
}

#[cfg(test)]
mod tests {
    use std::convert::TryFrom;

    use super::VersionNum;

    #[test]
    fn parse_version_without_padding() {
        let version = VersionNum::try_from("v3").unwrap();
        assert_eq!(version.number, 3);
        assert_eq!(version.width, 0);
        assert_eq!(version.to_string(), "v3");
    }

    #[test]
    fn parse_version_with_padding() {
        let version = VersionNum::try_from("v0012").unwrap();
        assert_eq!(version.number, 12);
        assert_eq!(version.width, 4);
        assert_eq!(version.to_string(), "v0012");
    }

    #[test]
    fn reject_invalid_versions() {
        assert!(VersionNum::try_from("v0").is_err());
        assert!(VersionNum::try_from("1").is_err());
        assert!(VersionNum::try_from("version").is_err());
    }

    #[test]
    fn next_and_previous() {
        let version = VersionNum::try_from("v2").unwrap();
        assert_eq!(version.next().unwrap().number, 3);
        assert_eq!(version.previous().unwrap().number, 1);
        assert!(version.previous().unwrap().previous().is_err());
    }
}
