//! Configuration and token storage.
//!
//! Precedence, lowest to highest: built-in defaults, `config.toml`,
//! `TALLY_*` environment variables, command-line flags (applied by the CLI
//! layer). The bearer token lives in its own 0600 file, never in config.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::Deserialize;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

pub const DEFAULT_BASE_URL: &str = "https://app.tallyfinance.test";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {detail}")]
    Invalid { path: PathBuf, detail: String },

    #[error("token file {path} is empty")]
    EmptyToken { path: PathBuf },
}

/// Resolved configuration for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub base_url: String,
    pub token_file: PathBuf,
    pub journal_path: PathBuf,
}

/// The subset of fields `config.toml` may set.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    base_url: Option<String>,
    token_file: Option<PathBuf>,
    journal: Option<PathBuf>,
}

fn config_dir() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_default();
    let mut p = PathBuf::from(home);
    p.push(".config");
    p.push("tally");
    p
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

pub fn default_token_path() -> PathBuf {
    config_dir().join("token")
}

pub fn default_journal_path() -> PathBuf {
    config_dir().join("journal.json")
}

impl Config {
    /// Load configuration from `path` (or the default location), then let
    /// environment variables override the file.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
        let file = match fs::read_to_string(&path) {
            Ok(raw) => toml::from_str::<ConfigFile>(&raw).map_err(|e| ConfigError::Invalid {
                path: path.clone(),
                detail: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ConfigFile::default(),
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        Ok(Self {
            base_url: env("TALLY_BASE_URL")
                .or(file.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            token_file: env("TALLY_TOKEN_FILE")
                .map(PathBuf::from)
                .or(file.token_file)
                .unwrap_or_else(default_token_path),
            journal_path: env("TALLY_JOURNAL")
                .map(PathBuf::from)
                .or(file.journal)
                .unwrap_or_else(default_journal_path),
        })
    }
}

pub fn load_token(path: &Path) -> Result<String, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let token = raw.trim().to_string();
    if token.is_empty() {
        return Err(ConfigError::EmptyToken {
            path: path.to_path_buf(),
        });
    }
    Ok(token)
}

pub fn save_token(path: &Path, token: &str) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let mut file = fs::File::create(path).map_err(write_err)?;
    #[cfg(unix)]
    file.set_permissions(fs::Permissions::from_mode(0o600))
        .map_err(write_err)?;
    file.write_all(token.as_bytes()).map_err(write_err)?;
    file.write_all(b"\n").map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&tmp.path().join("absent.toml"))).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn config_file_values_are_picked_up() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            "base_url = \"https://example.test\"\njournal = \"/var/tally/journal.json\"\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.base_url, "https://example.test");
        assert_eq!(config.journal_path, PathBuf::from("/var/tally/journal.json"));
        assert_eq!(config.token_file, default_token_path());
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "bse_url = \"typo\"\n").unwrap();
        assert!(matches!(
            Config::load(Some(&path)),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn token_round_trips_and_rejects_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("token");

        save_token(&path, "secret-token").unwrap();
        assert_eq!(load_token(&path).unwrap(), "secret-token");

        fs::write(&path, "  \n").unwrap();
        assert!(matches!(
            load_token(&path),
            Err(ConfigError::EmptyToken { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn token_file_is_owner_only() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("token");
        save_token(&path, "secret").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
