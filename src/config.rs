//! TOML configuration with environment overrides.
//!
//! Loaded from `--config <path>` or `~/.echobox/config.toml`. Every key has
//! a default, so the service runs with no file at all. `ECHOBOX_*`
//! environment variables win over file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    /// Where this config was loaded from (set after parse, not serialized).
    #[serde(skip)]
    pub config_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Bearer token validity window in seconds.
    pub token_ttl_secs: u64,
    /// PBKDF2 round count for new password digests. Existing digests keep
    /// the rounds they were created with.
    pub pbkdf2_rounds: u32,
    /// HMAC signing secret for tokens. When unset, a random secret is
    /// generated once and persisted under the data dir.
    pub token_secret: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: 4 * 3600,
            pbkdf2_rounds: 100_000,
            token_secret: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite databases and the generated signing secret live here.
    /// Defaults to `~/.echobox`.
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Load from the given path, or from `~/.echobox/config.toml`.
    /// A missing file yields the defaults; a malformed file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path()?,
        };

        let mut config: Config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", config_path.display()))?
        } else {
            Config::default()
        };

        config.config_path = config_path;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("ECHOBOX_HOST") {
            if !host.is_empty() {
                self.gateway.host = host;
            }
        }
        if let Ok(port) = std::env::var("ECHOBOX_PORT") {
            if let Ok(port) = port.parse() {
                self.gateway.port = port;
            }
        }
        if let Ok(secret) = std::env::var("ECHOBOX_TOKEN_SECRET") {
            if !secret.is_empty() {
                self.auth.token_secret = Some(secret);
            }
        }
        if let Ok(ttl) = std::env::var("ECHOBOX_TOKEN_TTL_SECS") {
            if let Ok(ttl) = ttl.parse() {
                self.auth.token_ttl_secs = ttl;
            }
        }
        if let Ok(dir) = std::env::var("ECHOBOX_DATA_DIR") {
            if !dir.is_empty() {
                self.storage.data_dir = Some(PathBuf::from(dir));
            }
        }
    }

    /// Resolved data directory: `storage.data_dir` or `~/.echobox`.
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir(),
        }
    }

    /// Write a commented starter config. Refuses to overwrite an existing
    /// file. Returns the path written.
    pub fn init_at(path: Option<&Path>) -> Result<PathBuf> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path()?,
        };
        if config_path.exists() {
            anyhow::bail!("config already exists at {}", config_path.display());
        }
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&config_path, DEFAULT_CONFIG_TOML)
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        Ok(config_path)
    }
}

fn default_data_dir() -> Result<PathBuf> {
    use directories::UserDirs;

    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("could not find home directory"))?;
    Ok(home.join(".echobox"))
}

fn default_config_path() -> Result<PathBuf> {
    Ok(default_data_dir()?.join("config.toml"))
}

const DEFAULT_CONFIG_TOML: &str = r#"# echobox configuration. Every key is optional; the values below are the
# defaults. Environment variables win over file values: ECHOBOX_HOST,
# ECHOBOX_PORT, ECHOBOX_TOKEN_SECRET, ECHOBOX_TOKEN_TTL_SECS,
# ECHOBOX_DATA_DIR.

[gateway]
host = "127.0.0.1"
port = 8080

[auth]
# Bearer tokens expire this many seconds after issuance.
token_ttl_secs = 14400
# PBKDF2 rounds for new password digests.
pbkdf2_rounds = 100000
# HMAC signing secret for tokens. Leave unset to have one generated and
# stored at <data_dir>/token.secret. Changing it invalidates every
# outstanding token.
# token_secret = ""

[storage]
# SQLite databases and the generated signing secret live here.
# data_dir = "/var/lib/echobox"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/echobox.toml"))).unwrap();
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.auth.token_ttl_secs, 14_400);
        assert_eq!(config.auth.pbkdf2_rounds, 100_000);
        assert!(config.auth.token_secret.is_none());
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[gateway]\nport = 9999").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.gateway.port, 9999);
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.auth.token_ttl_secs, 14_400);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "gateway = not valid toml {{").unwrap();

        assert!(Config::load(Some(file.path())).is_err());
    }

    #[test]
    fn starter_config_parses_back_to_defaults() {
        let config: Config = toml::from_str(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.auth.token_ttl_secs, 14_400);
        assert!(config.storage.data_dir.is_none());
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        let written = Config::init_at(Some(&path)).unwrap();
        assert_eq!(written, path);
        assert!(path.exists());

        assert!(Config::init_at(Some(&path)).is_err());
    }

    #[test]
    fn data_dir_override_wins() {
        let config = Config {
            storage: StorageConfig {
                data_dir: Some(PathBuf::from("/tmp/echobox-test")),
            },
            ..Config::default()
        };
        assert_eq!(
            config.data_dir().unwrap(),
            PathBuf::from("/tmp/echobox-test")
        );
    }
}
