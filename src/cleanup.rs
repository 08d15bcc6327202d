//! Force-removal of every container that belongs to one run.

use crate::docker::{ContainerEngine, ContainerListOptions};
use crate::errors::CleanupError;
use crate::run_id::RunId;

/// What a cleanup pass did. Failures are already logged.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub removed: Vec<String>,
    pub failed: Vec<CleanupError>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Remove all containers, running or not, whose name contains `run_id`.
///
/// Never stops early: each removal is attempted even if earlier ones failed.
pub fn delete_all(engine: &dyn ContainerEngine, run_id: &RunId) -> CleanupReport {
    let mut report = CleanupReport::default();
    let options = ContainerListOptions {
        all: true,
        name: Some(run_id.to_string()),
    };
    let containers = match engine.list_containers(&options) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(analysis_id = %run_id, error = %e, "failed to list containers");
            return report;
        }
    };

    for c in containers {
        match engine.remove_container(&c.id, true) {
            Ok(()) => {
                tracing::debug!(analysis_id = %run_id, container_id = %c.id, "container removed");
                report.removed.push(c.id);
            }
            Err(source) => {
                let err = CleanupError {
                    container_id: c.id,
                    source,
                };
                tracing::error!(analysis_id = %run_id, error = %err, "failed to remove container");
                report.failed.push(err);
            }
        }
    }
    report
}
