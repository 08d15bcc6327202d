#![allow(clippy::module_name_repetitions)]
//! Runtime configuration: YAML file with env overrides, plus registry credentials.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CUSTOM_IMAGE_ENV_PREFIX: &str = "SCANBOX_CUSTOM_IMAGE_";

/// Settings consumed by the container layer.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "snake_case")]
pub struct Config {
    /// When set, pulls become no-op successes.
    pub disable_docker: bool,
    /// Alternate root used for bind mounts instead of `project_path`.
    pub container_bind_project_path: Option<PathBuf>,
    pub project_path: PathBuf,
    /// Per-tool image overrides, keyed by lower-case tool name.
    pub custom_images: BTreeMap<String, String>,
    #[serde(deserialize_with = "de_secs")]
    pub wait_timeout: Option<Duration>,
}

fn de_secs<'de, D>(d: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(d)?
        .filter(|s| *s > 0)
        .map(Duration::from_secs))
}

fn env_flag(key: &str) -> Option<bool> {
    let v = env::var(key).ok()?;
    let v = v.trim().to_ascii_lowercase();
    if v.is_empty() {
        return None;
    }
    Some(matches!(v.as_str(), "1" | "true" | "yes" | "on"))
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl Config {
    /// Configuration from environment only; project path defaults to the current directory.
    pub fn from_env() -> Self {
        let mut cfg = Config {
            project_path: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            ..Config::default()
        };
        cfg.apply_env();
        cfg
    }

    /// Read a YAML file, then let the environment override it.
    pub fn load(path: &Path) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut cfg: Config = serde_yaml::from_str(&text).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid config {}: {e}", path.display()),
            )
        })?;
        if cfg.project_path.as_os_str().is_empty() {
            cfg.project_path = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        }
        cfg.custom_images = cfg
            .custom_images
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn apply_env(&mut self) {
        if let Some(b) = env_flag("SCANBOX_DISABLE_DOCKER") {
            self.disable_docker = b;
        }
        if let Some(p) = env_nonempty("SCANBOX_CONTAINER_BIND_PROJECT_PATH") {
            self.container_bind_project_path = Some(PathBuf::from(p));
        }
        if let Some(p) = env_nonempty("SCANBOX_PROJECT_PATH") {
            self.project_path = PathBuf::from(p);
        }
        if let Some(secs) = env_nonempty("SCANBOX_WAIT_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(0) => self.wait_timeout = None,
                Ok(n) => self.wait_timeout = Some(Duration::from_secs(n)),
                Err(_) => tracing::warn!(value = %secs, "ignoring invalid SCANBOX_WAIT_TIMEOUT_SECS"),
            }
        }
        // Keep ordering stable for deterministic test assertions
        let mut pairs: Vec<(String, String)> = env::vars()
            .filter_map(|(k, v)| {
                let tool = k.strip_prefix(CUSTOM_IMAGE_ENV_PREFIX)?;
                if tool.is_empty() || v.trim().is_empty() {
                    return None;
                }
                Some((tool.to_ascii_lowercase(), v.trim().to_string()))
            })
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        self.custom_images.extend(pairs);
    }

    /// Custom image configured for a tool, if any.
    pub fn custom_image_for(&self, tool: &str) -> Option<&str> {
        self.custom_images
            .get(&tool.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Basic-auth credentials for pulling from a private registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
    pub server_address: String,
}

impl RegistryCredentials {
    pub fn from_env() -> Self {
        RegistryCredentials {
            username: env::var("SCANBOX_REGISTRY_USERNAME").unwrap_or_default(),
            password: env::var("SCANBOX_REGISTRY_PASSWORD").unwrap_or_default(),
            server_address: env::var("SCANBOX_REGISTRY_ADDRESS").unwrap_or_default(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}
