//! Facade used by tool formatters: pull images, run tools, clean up a run.

use std::sync::{Arc, Mutex};

use crate::cleanup::{delete_all, CleanupReport};
use crate::config::{Config, RegistryCredentials};
use crate::docker::ContainerEngine;
use crate::errors::AnalysisError;
use crate::images::{ImageCache, ImagePuller};
use crate::invocation::ToolInvocation;
use crate::lifecycle::ContainerLifecycle;
use crate::mounts::mount_source;
use crate::run_id::RunId;
use crate::telemetry::ContainerEvent;

/// Runs analysis tools for one run. Shared across threads via `Arc`.
pub struct DockerApi {
    engine: Arc<dyn ContainerEngine>,
    run_id: RunId,
    puller: ImagePuller,
    lifecycle: ContainerLifecycle,
}

impl DockerApi {
    pub fn new(engine: Arc<dyn ContainerEngine>, config: Config, run_id: RunId) -> Self {
        Self::with_credentials(engine, config, run_id, RegistryCredentials::from_env())
    }

    pub fn with_credentials(
        engine: Arc<dyn ContainerEngine>,
        config: Config,
        run_id: RunId,
        credentials: RegistryCredentials,
    ) -> Self {
        let lock = Arc::new(Mutex::new(()));
        let cache = ImageCache::new(Arc::clone(&engine), lock);
        let puller = ImagePuller::new(
            Arc::clone(&engine),
            cache,
            credentials,
            config.disable_docker,
        );
        let lifecycle = ContainerLifecycle::new(
            Arc::clone(&engine),
            run_id,
            mount_source(&config, &run_id),
            config.wait_timeout,
        );
        DockerApi {
            engine,
            run_id,
            puller,
            lifecycle,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Run one tool and return its raw stdout.
    pub fn create_analysis_container(&self, inv: &ToolInvocation) -> Result<String, AnalysisError> {
        if inv.is_invalid() {
            return Err(AnalysisError::Validation);
        }
        let image = inv.effective_image();
        let event = ContainerEvent::new(image, &self.run_id);
        match self.lifecycle.run(image, &inv.cmd) {
            Ok(out) => {
                event.debug("analysis container finished");
                Ok(out)
            }
            Err(e) => {
                event.debug("analysis container finished with error");
                Err(e)
            }
        }
    }

    /// Make sure `reference` is available locally.
    pub fn pull_image(&self, reference: &str) -> Result<(), AnalysisError> {
        self.puller.pull_if_missing(reference).map_err(Into::into)
    }

    /// Best-effort removal of every container of this run.
    pub fn delete_containers_from_api(&self) -> CleanupReport {
        delete_all(self.engine.as_ref(), &self.run_id)
    }
}
