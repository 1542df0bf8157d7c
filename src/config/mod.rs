//! Daemon configuration.
//!
//! Loaded from a TOML file, then overridden by CLI flags / environment
//! variables (see `main.rs`). The loaded value is wrapped in an `Arc` once at
//! startup and threaded through `AppContext`; nothing mutates it afterwards.

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_TASKS_PER_PROJECT: usize = 1000;
const DEFAULT_SLOW_QUERY_THRESHOLD_MS: u64 = 100;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

// ─── AuthConfig ───────────────────────────────────────────────────────────────

/// Token verification configuration (`[auth]` in config.toml).
///
/// Tokens are verified against the identity provider's signing material.
/// Asymmetric algorithms (RS256, ES256, EdDSA) read the provider's public key
/// from `public_key_file`; HS256 uses `shared_secret` and is intended for
/// local development and tests only.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JWT signature algorithm: "RS256" (default), "ES256", "EdDSA" or "HS256".
    pub algorithm: String,
    /// PEM file with the provider's public key. Required for asymmetric
    /// algorithms.
    pub public_key_file: Option<PathBuf>,
    /// Symmetric signing secret. Required for HS256. Never logged.
    pub shared_secret: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            algorithm: "RS256".to_string(),
            public_key_file: None,
            shared_secret: None,
        }
    }
}

// ─── BootstrapConfig ──────────────────────────────────────────────────────────

/// Optional bootstrap membership grant (`[bootstrap]` in config.toml).
///
/// When configured, every authenticated request adds the requesting user to
/// `project_id` on behalf of `owner_uid`, inside the request transaction.
/// Used to keep a designated default project open to all logged-in users.
/// Absent section = no grant.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BootstrapConfig {
    pub project_id: String,
    pub owner_uid: String,
}

// ─── LimitsConfig ─────────────────────────────────────────────────────────────

/// Hard limits (`[limits]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum number of tasks a single project may hold.
    pub max_tasks_per_project: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_project: DEFAULT_MAX_TASKS_PER_PROJECT,
        }
    }
}

// ─── ObservabilityConfig ──────────────────────────────────────────────────────

/// Observability configuration (`[observability]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log SQLite queries that exceed this threshold (milliseconds).
    /// Set to 0 to disable slow query logging.
    pub slow_query_threshold_ms: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            slow_query_threshold_ms: DEFAULT_SLOW_QUERY_THRESHOLD_MS,
        }
    }
}

// ─── DaemonConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Bind address (default: 127.0.0.1; use 0.0.0.0 for LAN access).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Data directory holding the SQLite database.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    pub auth: AuthConfig,
    pub bootstrap: Option<BootstrapConfig>,
    pub limits: LimitsConfig,
    pub observability: ObservabilityConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: default_bind_address(),
            data_dir: default_data_dir(),
            auth: AuthConfig::default(),
            bootstrap: None,
            limits: LimitsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a TOML file. A missing `path` yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Log the effective configuration at startup.
    ///
    /// Fields are enumerated explicitly; `auth.shared_secret` is the only
    /// secret and is always masked. Do not switch this to struct dumping,
    /// a `{:?}` of the whole config would leak the secret.
    pub fn log_summary(&self) {
        info!("Configuration:");
        for (key, value) in self.summary() {
            info!("  {key} = {value}");
        }
    }

    fn summary(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("port", self.port.to_string()),
            ("bind_address", self.bind_address.clone()),
            ("data_dir", self.data_dir.display().to_string()),
            ("auth.algorithm", self.auth.algorithm.clone()),
            (
                "auth.public_key_file",
                match &self.auth.public_key_file {
                    Some(p) => p.display().to_string(),
                    None => "<unset>".to_string(),
                },
            ),
            (
                "auth.shared_secret",
                if self.auth.shared_secret.is_some() {
                    "******".to_string()
                } else {
                    "<unset>".to_string()
                },
            ),
            (
                "limits.max_tasks_per_project",
                self.limits.max_tasks_per_project.to_string(),
            ),
            (
                "observability.slow_query_threshold_ms",
                self.observability.slow_query_threshold_ms.to_string(),
            ),
        ];
        if let Some(bootstrap) = &self.bootstrap {
            fields.push(("bootstrap.project_id", bootstrap.project_id.clone()));
            fields.push(("bootstrap.owner_uid", bootstrap.owner_uid.clone()));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.auth.algorithm, "RS256");
        assert!(config.bootstrap.is_none());
        assert_eq!(config.limits.max_tasks_per_project, 1000);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            port = 9000
            bind_address = "0.0.0.0"

            [auth]
            algorithm = "HS256"
            shared_secret = "dev-secret"

            [bootstrap]
            project_id = "default-project"
            owner_uid = "12345"

            [limits]
            max_tasks_per_project = 50
        "#;
        let config: DaemonConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.auth.algorithm, "HS256");
        assert_eq!(config.auth.shared_secret.as_deref(), Some("dev-secret"));
        let bootstrap = config.bootstrap.unwrap();
        assert_eq!(bootstrap.project_id, "default-project");
        assert_eq!(bootstrap.owner_uid, "12345");
        assert_eq!(config.limits.max_tasks_per_project, 50);
    }

    #[test]
    fn test_summary_masks_secret() {
        let mut config = DaemonConfig::default();
        config.auth.shared_secret = Some("very-secret".to_string());
        let summary = config.summary();
        let secret = summary
            .iter()
            .find(|(k, _)| *k == "auth.shared_secret")
            .unwrap();
        assert_eq!(secret.1, "******");
        assert!(summary.iter().all(|(_, v)| !v.contains("very-secret")));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = DaemonConfig::load(Some(Path::new("/nonexistent/taskd.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
