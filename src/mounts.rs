#![allow(clippy::module_name_repetitions)]
//! Bind-mount source resolution for analysis containers.

use std::path::PathBuf;

use crate::config::Config;
use crate::run_id::RunId;

/// Hidden per-project folder holding one working copy per run.
pub const RUN_FOLDER_NAME: &str = ".scanbox";

/// Mount target inside every analysis container.
pub const CONTAINER_SOURCE_DIR: &str = "/src";

/// Host path (as the engine expects it) mounted at `/src` for this run.
pub fn mount_source(config: &Config, run_id: &RunId) -> String {
    let base: PathBuf = match config.container_bind_project_path.as_ref() {
        Some(p) if !p.as_os_str().is_empty() => p.clone(),
        _ => config.project_path.clone(),
    };
    let path = base
        .join(RUN_FOLDER_NAME)
        .join(run_id.to_string())
        .to_string_lossy()
        .into_owned();

    if is_drive_letter_path(&path) {
        translate_windows_path(&path)
    } else {
        path
    }
}

fn is_drive_letter_path(path: &str) -> bool {
    path.as_bytes().get(1) == Some(&b':')
}

/// `C:\Users\me\proj` -> `//c//Users//me//proj`.
///
/// Docker Desktop resolves bind sources in this exact doubled form; keep it bit-for-bit.
pub fn translate_windows_path(path: &str) -> String {
    let mut chars = path.chars();
    let drive = chars
        .next()
        .map(|c| c.to_ascii_lowercase().to_string())
        .unwrap_or_default();
    let rest: String = chars.collect();
    let joined = format!("{drive}{rest}");

    let no_colon = joined.replace(':', "");
    let rooted = format!("/{no_colon}");
    let forward = rooted.replace('\\', "/");
    forward.replace('/', "//")
}
