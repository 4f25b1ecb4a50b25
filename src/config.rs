use std::convert::TryFrom;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{FocflError, Result};
use crate::ocfl::{paths, CommitMode};

const DEFAULT_ROLLBACK_DRAIN_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_ORPHAN_SESSION_TIMEOUT_SECS: u64 = 600;
const SESSION_STAGING_EXTENSION: &str = "0097-focfl-staging";

/// Repository configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// The OCFL storage root
    pub storage_root: PathBuf,
    /// The directory per-session staging directories are created under
    pub session_staging_root: PathBuf,
    /// The commit mode object sub-sessions default to
    pub commit_mode_default: CommitMode,
    /// How long rollback waits for in-flight persists to drain
    pub rollback_drain_timeout_ms: u64,
    /// How old an abandoned staging directory must be before the session manager reaps it
    pub orphan_session_timeout_secs: u64,
    /// Where the resource index is persisted
    pub index_path: PathBuf,
}

/// On-disk representation of the configuration file
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    storage_root: String,
    session_staging_root: Option<String>,
    commit_mode_default: Option<String>,
    rollback_drain_timeout_ms: Option<u64>,
    orphan_session_timeout_secs: Option<u64>,
    index_path: Option<String>,
}

impl Config {
    /// Creates a configuration rooted at `storage_root` with defaults for everything else
    pub fn new(storage_root: impl AsRef<Path>) -> Self {
        let storage_root = storage_root.as_ref().to_path_buf();
        let mut session_staging_root = paths::extensions_path(&storage_root);
        session_staging_root.push(SESSION_STAGING_EXTENSION);

        Self {
            index_path: paths::index_extension_path(&storage_root),
            session_staging_root,
            storage_root,
            commit_mode_default: CommitMode::NewVersion,
            rollback_drain_timeout_ms: DEFAULT_ROLLBACK_DRAIN_TIMEOUT_MS,
            orphan_session_timeout_secs: DEFAULT_ORPHAN_SESSION_TIMEOUT_SECS,
        }
    }

    /// Parses a toml configuration file
    pub fn load(config_file: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(config_file.as_ref())?;
        let parsed: ConfigFile = toml::from_slice(&bytes)?;

        let mut config = Config::new(parsed.storage_root);

        if let Some(staging) = parsed.session_staging_root {
            config.session_staging_root = PathBuf::from(staging);
        }
        if let Some(mode) = parsed.commit_mode_default {
            config.commit_mode_default = CommitMode::from_str(&mode).map_err(|_| {
                FocflError::InvalidConfiguration(format!("Unknown commit mode: {}", mode))
            })?;
        }
        if let Some(timeout) = parsed.rollback_drain_timeout_ms {
            config.rollback_drain_timeout_ms = timeout;
        }
        if let Some(timeout) = parsed.orphan_session_timeout_secs {
            config.orphan_session_timeout_secs = timeout;
        }
        if let Some(index) = parsed.index_path {
            config.index_path = PathBuf::from(index);
        }

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage_root.as_os_str().is_empty() {
            return Err(FocflError::InvalidConfiguration(
                "A storage root must be specified".to_string(),
            ));
        }

        if self.session_staging_root == self.storage_root {
            return Err(FocflError::InvalidConfiguration(
                "The session staging root must not be the storage root itself".to_string(),
            ));
        }

        if self.rollback_drain_timeout_ms == 0 {
            return Err(FocflError::InvalidConfiguration(
                "The rollback drain timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn rollback_drain_timeout(&self) -> Duration {
        Duration::from_millis(self.rollback_drain_timeout_ms)
    }

    pub fn orphan_session_timeout(&self) -> Duration {
        Duration::from_secs(self.orphan_session_timeout_secs)
    }
}

impl TryFrom<&Path> for Config {
    type Error = FocflError;

    fn try_from(config_file: &Path) -> Result<Self, Self::Error> {
        Config::load(config_file)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use assert_fs::TempDir;

    use super::Config;
    use crate::ocfl::CommitMode;

    #[test]
    fn defaults_are_rooted_under_the_storage_root() {
        let config = Config::new("/var/focfl/root");

        assert_eq!(config.commit_mode_default, CommitMode::NewVersion);
        assert!(config
            .session_staging_root
            .starts_with("/var/focfl/root/extensions"));
        assert!(config.index_path.starts_with("/var/focfl/root/extensions"));
    }

    #[test]
    fn load_toml_overrides() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("config.toml");
        fs::write(
            &file,
            r#"
storage_root = "/data/ocfl"
session_staging_root = "/data/staging"
commit_mode_default = "mutable-head"
rollback_drain_timeout_ms = 5000
"#,
        )
        .unwrap();

        let config = Config::load(&file).unwrap();

        assert_eq!(config.storage_root.to_string_lossy(), "/data/ocfl");
        assert_eq!(config.session_staging_root.to_string_lossy(), "/data/staging");
        assert_eq!(config.commit_mode_default, CommitMode::MutableHead);
        assert_eq!(config.rollback_drain_timeout_ms, 5000);
    }

    #[test]
    fn reject_unknown_commit_mode() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("config.toml");
        fs::write(
            &file,
            r#"
storage_root = "/data/ocfl"
commit_mode_default = "append-only"
"#,
        )
        .unwrap();

        assert!(Config::load(&file).is_err());
    }
}
