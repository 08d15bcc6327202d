#![allow(clippy::module_name_repetitions)]
//! Image availability checks and pulls.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::{Arc, Mutex};

use crate::config::RegistryCredentials;
use crate::docker::{ContainerEngine, PullOptions};
use crate::errors::EngineError;

/// Registry that the engine treats as implicit in image references.
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Strip a leading `docker.io/` so the reference filter matches locally cached tags.
pub fn strip_default_registry(reference: &str) -> &str {
    reference
        .strip_prefix(DEFAULT_REGISTRY)
        .and_then(|r| r.strip_prefix('/'))
        .unwrap_or(reference)
}

/// Auth config as the engine API encodes it in the registry-auth header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryAuth {
    pub username: String,
    pub password: String,
    #[serde(rename = "serveraddress", default)]
    pub server_address: String,
}

impl RegistryAuth {
    /// URL-safe base64 of the JSON form.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        Ok(URL_SAFE.encode(serde_json::to_vec(self)?))
    }
}

/// Pull options for the given credentials; auth only when username and password are both set.
pub fn pull_options(creds: &RegistryCredentials) -> PullOptions {
    if !creds.is_complete() {
        return PullOptions::default();
    }
    let auth = RegistryAuth {
        username: creds.username.clone(),
        password: creds.password.clone(),
        server_address: creds.server_address.clone(),
    };
    match auth.encode() {
        Ok(token) => PullOptions {
            registry_auth: Some(token),
        },
        Err(e) => {
            tracing::warn!(error = %e, "could not encode registry credentials; pulling anonymously");
            PullOptions::default()
        }
    }
}

/// Serialized lookup of locally cached images.
///
/// The lock covers the lookup only; a pull that follows runs unlocked, so two
/// callers may both see an image as missing and both pull it.
pub struct ImageCache {
    engine: Arc<dyn ContainerEngine>,
    lock: Arc<Mutex<()>>,
}

impl ImageCache {
    pub fn new(engine: Arc<dyn ContainerEngine>, lock: Arc<Mutex<()>>) -> Self {
        ImageCache { engine, lock }
    }

    /// True if no local image matches `reference`.
    pub fn is_missing(&self, reference: &str) -> Result<bool, EngineError> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let found = self
            .engine
            .list_images(strip_default_registry(reference))
            .map_err(|e| {
                tracing::error!(image = reference, error = %e, "failed to list docker images");
                e
            })?;
        Ok(found.is_empty())
    }
}

pub struct ImagePuller {
    engine: Arc<dyn ContainerEngine>,
    cache: ImageCache,
    credentials: RegistryCredentials,
    disabled: bool,
}

impl ImagePuller {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        cache: ImageCache,
        credentials: RegistryCredentials,
        disabled: bool,
    ) -> Self {
        ImagePuller {
            engine,
            cache,
            credentials,
            disabled,
        }
    }

    /// Pull `reference` unless it is already cached. No-op when docker is disabled.
    pub fn pull_if_missing(&self, reference: &str) -> Result<(), EngineError> {
        if self.disabled {
            return Ok(());
        }
        let missing = self.cache.is_missing(reference).map_err(|e| {
            tracing::error!(image = reference, error = %e, "failed to pull image");
            e
        })?;
        if !missing {
            return Ok(());
        }
        tracing::debug!(image = reference, "image not cached locally; pulling");
        self.pull(reference).map_err(|e| {
            tracing::error!(image = reference, error = %e, "failed to pull image");
            e
        })
    }

    /// Pull `reference` and drain the progress stream to the end.
    pub fn pull(&self, reference: &str) -> Result<(), EngineError> {
        tracing::debug!(image = reference, "pulling image");
        let options = pull_options(&self.credentials);
        let mut stream = self.engine.pull_image(reference, &options)?;
        let drained = io::copy(&mut stream, &mut io::sink())?;
        tracing::debug!(image = reference, bytes = drained, "image pulled");
        Ok(())
    }
}
