//! scanbox: run static-analysis tools in throwaway Docker containers.
//!
//! Each analysis run gets a [`RunId`]. Every container created for the run carries
//! that id in its name and mounts `<project>/.scanbox/<run id>` at `/src`, so the
//! whole run can be cleaned up in one pass.
//!
//! ```no_run
//! use std::sync::Arc;
//! use scanbox::{Config, DockerApi, DockerCli, RunId, ToolInvocation};
//!
//! let engine = Arc::new(DockerCli::new()?);
//! let api = DockerApi::new(engine, Config::from_env(), RunId::new());
//! let inv = ToolInvocation::new("bandit", "docker.io/scanbox/bandit:1", "bandit -r . -f json");
//! api.pull_image(inv.effective_image())?;
//! let out = api.create_analysis_container(&inv)?;
//! println!("{out}");
//! api.delete_containers_from_api();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod api;
mod cleanup;
mod config;
pub mod docker;
mod errors;
mod images;
mod invocation;
mod lifecycle;
mod mounts;
mod run_id;
mod telemetry;

pub use api::DockerApi;
pub use cleanup::{delete_all, CleanupReport};
pub use config::{Config, RegistryCredentials};
pub use docker::{container_runtime_path, ContainerEngine, DockerCli};
pub use errors::{
    exit_code_for_analysis_error, exit_code_for_io_error, AnalysisError, CleanupError,
    EngineError,
};
pub use images::{
    pull_options, strip_default_registry, ImageCache, ImagePuller, RegistryAuth,
    DEFAULT_REGISTRY,
};
pub use invocation::{replace_analysis_id, ToolInvocation, ANALYSIS_ID_PLACEHOLDER};
pub use lifecycle::{ContainerLifecycle, FORWARDED_TOKEN_ENV};
pub use mounts::{mount_source, translate_windows_path, CONTAINER_SOURCE_DIR, RUN_FOLDER_NAME};
pub use run_id::RunId;
pub use telemetry::{init_logging, ContainerEvent};
