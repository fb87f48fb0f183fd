//! Registry credentials in Docker `config.json` format.
//!
//! Reads and writes the `auths` section of `$DOCKER_CONFIG/config.json`
//! (default `~/.docker/config.json`), so credentials from `docker login`
//! are picked up and `imagepin login` is visible to other tools. Keys other
//! than `auths` are preserved on write.

use std::collections::BTreeMap;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use imagepin_core::error::{PinError, Result};
use serde::{Deserialize, Serialize};

/// Key Docker uses for Docker Hub entries.
const DOCKER_HUB_KEY: &str = "https://index.docker.io/v1/";

/// One `auths` entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AuthEntry {
    /// base64("username:password")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
}

impl AuthEntry {
    fn credentials(&self) -> Option<(String, String)> {
        if let (Some(u), Some(p)) = (&self.username, &self.password) {
            return Some((u.clone(), p.clone()));
        }
        let decoded = STANDARD.decode(self.auth.as_deref()?).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (u, p) = decoded.split_once(':')?;
        Some((u.to_string(), p.to_string()))
    }
}

/// Docker config file, only `auths` is interpreted.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    auths: BTreeMap<String, AuthEntry>,
    #[serde(flatten)]
    other: BTreeMap<String, serde_json::Value>,
}

/// Persistent credential store for container registries.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store at `$DOCKER_CONFIG/config.json`, or `~/.docker/config.json`.
    pub fn default_path() -> Result<Self> {
        if let Some(dir) = std::env::var_os("DOCKER_CONFIG") {
            return Ok(Self::new(PathBuf::from(dir).join("config.json")));
        }
        let home = dirs::home_dir().ok_or_else(|| {
            PinError::ConfigError("Cannot determine home directory for credential store".to_string())
        })?;
        Ok(Self::new(home.join(".docker").join("config.json")))
    }

    /// Create a credential store at a custom path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Store credentials for a registry. Overwrites existing entry.
    pub fn store(&self, registry: &str, username: &str, password: &str) -> Result<()> {
        let mut file = self.load()?;
        let key = normalize_registry(registry);
        file.auths.retain(|k, _| normalize_registry(k) != key);
        file.auths.insert(
            key,
            AuthEntry {
                auth: Some(STANDARD.encode(format!("{}:{}", username, password))),
                ..AuthEntry::default()
            },
        );
        self.save(&file)
    }

    /// Get credentials for a registry. Returns `(username, password)`.
    pub fn get(&self, registry: &str) -> Result<Option<(String, String)>> {
        let file = self.load()?;
        let key = normalize_registry(registry);
        Ok(file
            .auths
            .iter()
            .find(|(k, _)| normalize_registry(k) == key)
            .and_then(|(_, entry)| entry.credentials()))
    }

    /// Remove credentials for a registry. Returns true if an entry existed.
    pub fn remove(&self, registry: &str) -> Result<bool> {
        let mut file = self.load()?;
        let key = normalize_registry(registry);
        let before = file.auths.len();
        file.auths.retain(|k, _| normalize_registry(k) != key);
        let removed = file.auths.len() != before;
        if removed {
            self.save(&file)?;
        }
        Ok(removed)
    }

    fn load(&self) -> Result<ConfigFile> {
        if !self.path.exists() {
            return Ok(ConfigFile::default());
        }
        let data = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&data).map_err(|e| {
            PinError::ConfigError(format!(
                "Failed to parse credential store {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Write tmp, then rename over the original.
    fn save(&self, file: &ConfigFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, serde_json::to_string_pretty(file)?)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// Normalize registry keys: Docker Hub aliases collapse to Docker's legacy
/// key, other hosts lose any scheme and trailing slash.
fn normalize_registry(registry: &str) -> String {
    let r = registry.trim().to_lowercase();
    let host = r
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    let host = host.split('/').next().unwrap_or(host);
    match host {
        "docker.io" | "index.docker.io" | "registry-1.docker.io" => DOCKER_HUB_KEY.to_string(),
        other => other.to_string(),
    }
}
