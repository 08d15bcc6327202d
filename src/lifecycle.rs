//! One container per tool invocation: create, start, wait, read logs, remove.

use std::env;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use crate::docker::{BindMount, ContainerEngine, ContainerSpec, Propagation};
use crate::errors::{AnalysisError, CleanupError, EngineError};
use crate::invocation::replace_analysis_id;
use crate::mounts::CONTAINER_SOURCE_DIR;
use crate::run_id::RunId;
use crate::telemetry::ContainerEvent;

/// Host variable forwarded into every analysis container.
pub const FORWARDED_TOKEN_ENV: &str = "GITHUB_TOKEN";

pub struct ContainerLifecycle {
    engine: Arc<dyn ContainerEngine>,
    run_id: RunId,
    mount_source: String,
    wait_timeout: Option<Duration>,
}

impl ContainerLifecycle {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        run_id: RunId,
        mount_source: String,
        wait_timeout: Option<Duration>,
    ) -> Self {
        ContainerLifecycle {
            engine,
            run_id,
            mount_source,
            wait_timeout,
        }
    }

    /// Container config for `cmd` (already substituted) in `image`.
    pub fn container_spec(&self, image: &str, cmd: &str) -> ContainerSpec {
        ContainerSpec {
            image: image.to_string(),
            tty: true,
            cmd: vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                format!("cd {CONTAINER_SOURCE_DIR} && {cmd}"),
            ],
            env: vec![(
                FORWARDED_TOKEN_ENV.to_string(),
                env::var(FORWARDED_TOKEN_ENV).unwrap_or_default(),
            )],
            mounts: vec![BindMount {
                source: self.mount_source.clone(),
                target: CONTAINER_SOURCE_DIR.to_string(),
                propagation: Propagation::Private,
            }],
        }
    }

    /// Run `cmd_template` in a fresh container of `image` and return its stdout.
    pub fn run(&self, image: &str, cmd_template: &str) -> Result<String, AnalysisError> {
        if image.is_empty() || cmd_template.is_empty() {
            return Err(AnalysisError::Validation);
        }
        let cmd = replace_analysis_id(cmd_template, &self.run_id);
        let event = ContainerEvent::new(image, &self.run_id);

        let spec = self.container_spec(image, &cmd);
        let id = self
            .engine
            .create_container(&spec, &self.run_id.container_name())
            .map_err(|e| {
                event.error("failed to create container", &e);
                e
            })?;
        let event = event.with_container(&id);

        if let Err(e) = self.engine.start_container(&id) {
            event.error("failed to start container", &e);
            // Not removed here; delete_containers_from_api picks it up by run id.
            event.warn("created container left behind after start failure");
            return Err(e.into());
        }
        event.debug("container created; waiting");

        let result = self.collect_output(&id, &event);
        self.remove(&id, &event);
        result
    }

    fn collect_output(&self, id: &str, event: &ContainerEvent<'_>) -> Result<String, AnalysisError> {
        let outcome = self
            .engine
            .wait_container(id, self.wait_timeout)
            .map_err(|e| match e {
                EngineError::Timeout { after, .. } => AnalysisError::WaitTimeout {
                    container_id: id.to_string(),
                    after,
                },
                other => AnalysisError::Engine(other),
            })?;
        if let Some(message) = outcome.error {
            return Err(AnalysisError::ContainerRuntime {
                container_id: id.to_string(),
                message,
                status_code: outcome.status_code,
            });
        }

        let mut logs = self.engine.container_logs(id)?;
        let mut buf = Vec::new();
        logs.read_to_end(&mut buf).map_err(EngineError::from)?;
        event.debug("container output read");
        String::from_utf8(buf).map_err(|e| {
            EngineError::Parse {
                op: "logs",
                message: format!("container output is not UTF-8: {e}"),
            }
            .into()
        })
    }

    fn remove(&self, id: &str, event: &ContainerEvent<'_>) {
        if let Err(source) = self.engine.remove_container(id, true) {
            let err = CleanupError {
                container_id: id.to_string(),
                source,
            };
            event.error("failed to remove container", &err);
        }
    }
}
