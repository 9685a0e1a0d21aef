//! TOML configuration with env overrides.
//!
//! Every field has a default, so a missing config file is not an error.
//! `JOTTER_SECRET_KEY` overrides the file's signing secret.

use anyhow::{Context, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Placeholder secret in freshly defaulted configs. Serving with it on
/// loopback warns; binding a public address with it is refused.
pub const DEFAULT_SECRET: &str = "change_this_secret";

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}

fn default_secret() -> String {
    DEFAULT_SECRET.to_string()
}

fn default_token_ttl_minutes() -> i64 {
    30
}

fn default_pbkdf2_rounds() -> u32 {
    crate::auth::password::DEFAULT_ROUNDS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Front-end origins allowed to call the API with credentials.
    #[serde(default = "default_cors_origins")]
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_allowed_origins: default_cors_origins(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for access tokens. Process-wide, loaded once.
    #[serde(default = "default_secret")]
    pub secret_key: String,
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,
    #[serde(default = "default_pbkdf2_rounds")]
    pub pbkdf2_rounds: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: default_secret(),
            token_ttl_minutes: default_token_ttl_minutes(),
            pbkdf2_rounds: default_pbkdf2_rounds(),
        }
    }
}

impl AuthConfig {
    pub fn uses_default_secret(&self) -> bool {
        self.secret_key == DEFAULT_SECRET
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file location. Defaults to `~/.jotter/jotter.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| base_dir().join("jotter.db"))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Config {
    /// Load from `path`, or from the default location when `None`. A missing
    /// file yields the built-in defaults. `JOTTER_SECRET_KEY` in the
    /// environment beats whatever the file says.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        if let Ok(secret) = std::env::var("JOTTER_SECRET_KEY") {
            config.apply_secret_override(&secret);
        }
        Ok(config)
    }

    fn load_file(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    fn apply_secret_override(&mut self, secret: &str) {
        if !secret.is_empty() {
            self.auth.secret_key = secret.to_string();
        }
    }

    /// Write a starter config with a freshly generated signing secret.
    pub fn write_starter(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            anyhow::bail!("{} already exists (pass --force to overwrite)", path.display());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut config = Config::default();
        config.auth.secret_key = generate_secret();
        let rendered = toml::to_string_pretty(&config).context("failed to render config")?;
        std::fs::write(path, rendered)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

/// Default config location: `~/.jotter/config.toml`.
pub fn default_config_path() -> PathBuf {
    base_dir().join("config.toml")
}

fn base_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".jotter"))
        .unwrap_or_else(|| PathBuf::from(".jotter"))
}

/// 32 random bytes, hex-encoded.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_file(Some(&tmp.path().join("absent.toml"))).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.auth.token_ttl_minutes, 30);
        assert!(config.auth.uses_default_secret());
        assert_eq!(config.server.cors_allowed_origins.len(), 2);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 9999\n").unwrap();

        let config = Config::load_file(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.auth.pbkdf2_rounds, crate::auth::password::DEFAULT_ROUNDS);
    }

    #[test]
    fn starter_config_round_trips_with_fresh_secret() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        Config::write_starter(&path, false).unwrap();
        let config = Config::load_file(Some(&path)).unwrap();
        assert!(!config.auth.uses_default_secret());
        // 32 bytes hex-encoded.
        assert_eq!(config.auth.secret_key.len(), 64);

        // Refuses to clobber without force.
        assert!(Config::write_starter(&path, false).is_err());
        assert!(Config::write_starter(&path, true).is_ok());
    }

    #[test]
    fn secret_override_beats_the_file_value() {
        // Exercises the override path directly; tests never mutate the
        // real process environment.
        let mut config = Config::default();
        config.auth.secret_key = "from-file".into();

        config.apply_secret_override("from-env");
        assert_eq!(config.auth.secret_key, "from-env");

        // An empty value is treated as unset.
        config.apply_secret_override("");
        assert_eq!(config.auth.secret_key, "from-env");
    }

    #[test]
    fn generated_secrets_are_unique() {
        assert_ne!(generate_secret(), generate_secret());
    }

    #[test]
    fn database_path_default_lives_under_the_dot_dir() {
        let config = DatabaseConfig::default();
        assert!(config.resolved_path().ends_with("jotter.db"));

        let explicit = DatabaseConfig {
            path: Some(PathBuf::from("/tmp/custom.db")),
        };
        assert_eq!(explicit.resolved_path(), PathBuf::from("/tmp/custom.db"));
    }
}
