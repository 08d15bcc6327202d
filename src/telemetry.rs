//! Logging setup and the structured record used for container lifecycle events.

use std::env;

use tracing_subscriber::EnvFilter;

use crate::run_id::RunId;

/// Install a stderr fmt subscriber. `SCANBOX_LOG` (EnvFilter syntax) wins over `verbose`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = env::var("SCANBOX_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new(default));
    // A second init (tests, embedding) is not an error for us
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Fields attached to every container lifecycle log line.
#[derive(Debug, Clone, Copy)]
pub struct ContainerEvent<'a> {
    pub image: &'a str,
    pub run_id: &'a RunId,
    pub container_id: Option<&'a str>,
}

impl<'a> ContainerEvent<'a> {
    pub fn new(image: &'a str, run_id: &'a RunId) -> Self {
        ContainerEvent {
            image,
            run_id,
            container_id: None,
        }
    }

    pub fn with_container(self, container_id: &'a str) -> Self {
        ContainerEvent {
            container_id: Some(container_id),
            ..self
        }
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!(
            image = self.image,
            analysis_id = %self.run_id,
            container_id = self.container_id.unwrap_or_default(),
            "{message}"
        );
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(
            image = self.image,
            analysis_id = %self.run_id,
            container_id = self.container_id.unwrap_or_default(),
            "{message}"
        );
    }

    pub fn error(&self, message: &str, err: &dyn std::error::Error) {
        tracing::error!(
            image = self.image,
            analysis_id = %self.run_id,
            container_id = self.container_id.unwrap_or_default(),
            error = %err,
            "{message}"
        );
    }
}
