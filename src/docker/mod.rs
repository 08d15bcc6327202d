#![allow(clippy::module_name_repetitions)]
//! Container engine abstraction and the docker CLI implementation.

mod cli;
mod stream;

pub use cli::{container_runtime_path, DockerCli};

use serde::Deserialize;
use std::io::Read;
use std::time::Duration;

use crate::errors::EngineError;

/// Bind propagation mode for a mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Private,
}

impl Propagation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Propagation::Private => "private",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub source: String,
    pub target: String,
    pub propagation: Propagation,
}

/// Everything needed to create one container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub tty: bool,
    pub cmd: Vec<String>,
    pub env: Vec<(String, String)>,
    pub mounts: Vec<BindMount>,
}

/// What the engine reported once the wait returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitOutcome {
    pub status_code: i64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullOptions {
    /// URL-safe base64 of the JSON auth config, as the engine API expects it.
    pub registry_auth: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerListOptions {
    pub all: bool,
    /// Substring match on container name.
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImageSummary {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "Repository", default)]
    pub repository: String,
    #[serde(rename = "Tag", default)]
    pub tag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ContainerSummary {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "Names", default)]
    pub names: String,
    #[serde(rename = "State", default)]
    pub state: String,
}

/// Byte stream returned by pull and logs; fully drained by the caller.
pub type EngineStream = Box<dyn Read + Send>;

/// The operations this crate needs from a container engine.
///
/// Implementations must be shareable across threads; no call here is retried.
pub trait ContainerEngine: Send + Sync {
    fn ping(&self) -> Result<(), EngineError>;

    /// Local images matching a `reference` filter.
    fn list_images(&self, reference: &str) -> Result<Vec<ImageSummary>, EngineError>;

    fn pull_image(&self, reference: &str, options: &PullOptions)
        -> Result<EngineStream, EngineError>;

    /// Create a container and return its engine-assigned id.
    fn create_container(&self, spec: &ContainerSpec, name: &str) -> Result<String, EngineError>;

    fn start_container(&self, id: &str) -> Result<(), EngineError>;

    /// Block until the container is no longer running. `deadline` of None waits forever.
    fn wait_container(&self, id: &str, deadline: Option<Duration>)
        -> Result<WaitOutcome, EngineError>;

    /// The container's stdout, from the start of its life.
    fn container_logs(&self, id: &str) -> Result<EngineStream, EngineError>;

    fn remove_container(&self, id: &str, force: bool) -> Result<(), EngineError>;

    fn list_containers(
        &self,
        options: &ContainerListOptions,
    ) -> Result<Vec<ContainerSummary>, EngineError>;
}
