#![allow(clippy::module_name_repetitions)]
//! `ContainerEngine` backed by the docker command-line client.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tempfile::TempDir;
use wait_timeout::ChildExt;
use which::which;

use super::stream::ChildStream;
use super::{
    ContainerEngine, ContainerListOptions, ContainerSpec, ContainerSummary, EngineStream,
    ImageSummary, PullOptions, WaitOutcome,
};
use crate::errors::EngineError;
use crate::images::RegistryAuth;

const DOCKER_HUB_AUTH_KEY: &str = "https://index.docker.io/v1/";

/// Locate the docker binary: `SCANBOX_DOCKER_BIN` if it points at a file, else `docker` on PATH.
pub fn container_runtime_path() -> io::Result<PathBuf> {
    if env::var("SCANBOX_SKIP_DOCKER").ok().as_deref() == Some("1") {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            "Docker disabled by environment override.",
        ));
    }
    if let Some(bin) = env::var_os("SCANBOX_DOCKER_BIN").filter(|v| !v.is_empty()) {
        let p = PathBuf::from(bin);
        if p.is_file() {
            return Ok(p);
        }
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("SCANBOX_DOCKER_BIN does not exist: {}", p.display()),
        ));
    }
    which("docker").map_err(|_| {
        io::Error::new(
            io::ErrorKind::NotFound,
            "Docker is required but was not found in PATH.",
        )
    })
}

/// Drives the docker CLI; one process per engine call.
#[derive(Debug, Clone)]
pub struct DockerCli {
    runtime: PathBuf,
}

fn quote_arg(s: &str) -> String {
    if !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_=./:@,{}".contains(c))
    {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\"'\"'"))
    }
}

fn preview(args: &[OsString]) -> String {
    let mut words = vec!["docker".to_string()];
    words.extend(args.iter().map(|a| quote_arg(&a.to_string_lossy())));
    words.join(" ")
}

fn mount_arg(m: &super::BindMount) -> String {
    let field = |k: &str, v: &str| {
        let kv = format!("{k}={v}");
        // --mount is CSV; quote fields that would otherwise split
        if kv.contains(',') || kv.contains('"') {
            format!("\"{}\"", kv.replace('"', "\"\""))
        } else {
            kv
        }
    };
    [
        "type=bind".to_string(),
        field("source", &m.source),
        field("target", &m.target),
        field("bind-propagation", m.propagation.as_str()),
    ]
    .join(",")
}

/// Build `docker create` arguments for a spec.
pub(crate) fn create_args(spec: &ContainerSpec, name: &str) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["create".into(), "--name".into(), name.into()];
    if spec.tty {
        args.push("-t".into());
    }
    for (k, v) in &spec.env {
        args.push("-e".into());
        args.push(format!("{k}={v}").into());
    }
    for m in &spec.mounts {
        args.push("--mount".into());
        args.push(mount_arg(m).into());
    }
    args.push(spec.image.clone().into());
    args.extend(spec.cmd.iter().map(OsString::from));
    args
}

fn parse_json_lines<T: DeserializeOwned>(op: &'static str, out: &str) -> Result<Vec<T>, EngineError> {
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| {
            serde_json::from_str::<T>(l).map_err(|e| EngineError::Parse {
                op,
                message: format!("{e}: {l}"),
            })
        })
        .collect()
}

/// Client config directory the user's docker CLI reads: `$DOCKER_CONFIG`, else `~/.docker`.
fn user_config_dir() -> Option<PathBuf> {
    env::var_os("DOCKER_CONFIG")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| home::home_dir().map(|h| h.join(".docker")))
}

fn read_user_config(dir: &Path) -> Map<String, Value> {
    let path = dir.join("config.json");
    let Ok(text) = fs::read_to_string(&path) else {
        return Map::new();
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => map,
        _ => {
            tracing::warn!(path = %path.display(), "ignoring unreadable docker client config");
            Map::new()
        }
    }
}

#[cfg(unix)]
fn link_dir(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(not(unix))]
fn link_dir(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let to = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            link_dir(&entry.path(), &to)?;
        } else {
            fs::copy(entry.path(), to)?;
        }
    }
    Ok(())
}

/// Write a throwaway DOCKER_CONFIG: the user's client config from `user_dir`
/// with the credentials carried by `token` merged into `auths`.
///
/// The user's context store is linked in so `currentContext` still resolves
/// to the same daemon as every other call.
fn docker_config_from_token(token: &str, user_dir: Option<&Path>) -> Result<TempDir, EngineError> {
    let raw = URL_SAFE
        .decode(token.as_bytes())
        .map_err(|e| EngineError::Parse {
            op: "pull",
            message: format!("registry auth is not base64: {e}"),
        })?;
    let auth: RegistryAuth = serde_json::from_slice(&raw).map_err(|e| EngineError::Parse {
        op: "pull",
        message: format!("registry auth is not valid json: {e}"),
    })?;
    let server = if auth.server_address.is_empty() {
        DOCKER_HUB_AUTH_KEY.to_string()
    } else {
        auth.server_address.clone()
    };
    let basic = STANDARD.encode(format!("{}:{}", auth.username, auth.password));
    let mut entry = Map::new();
    entry.insert("auth".to_string(), Value::String(basic));

    let mut body = user_dir.map(read_user_config).unwrap_or_default();
    // A credential store or helper for this server would shadow the inline entry
    body.remove("credsStore");
    if let Some(helpers) = body.get_mut("credHelpers").and_then(Value::as_object_mut) {
        helpers.remove(&server);
    }
    let auths = body
        .entry("auths")
        .or_insert_with(|| Value::Object(Map::new()));
    if !auths.is_object() {
        *auths = Value::Object(Map::new());
    }
    if let Some(auths) = auths.as_object_mut() {
        auths.insert(server, Value::Object(entry));
    }

    let dir = tempfile::Builder::new().prefix("scanbox-docker-").tempdir()?;
    fs::write(dir.path().join("config.json"), Value::Object(body).to_string())?;
    if let Some(contexts) = user_dir.map(|d| d.join("contexts")).filter(|p| p.is_dir()) {
        link_dir(&contexts, &dir.path().join("contexts"))?;
    }
    Ok(dir)
}

impl DockerCli {
    /// Use the docker binary found by `container_runtime_path`.
    pub fn new() -> io::Result<Self> {
        Ok(DockerCli {
            runtime: container_runtime_path()?,
        })
    }

    pub fn with_runtime(runtime: impl Into<PathBuf>) -> Self {
        DockerCli {
            runtime: runtime.into(),
        }
    }

    pub fn runtime(&self) -> &Path {
        &self.runtime
    }

    fn command(&self, args: &[OsString]) -> Command {
        tracing::trace!(cmd = %preview(args), "docker");
        let mut cmd = Command::new(&self.runtime);
        cmd.args(args).stdin(Stdio::null());
        cmd
    }

    /// Run to completion and return trimmed stdout, or the failure with stderr.
    fn output(&self, op: &'static str, args: &[OsString]) -> Result<String, EngineError> {
        let out = self.command(args).output()?;
        if !out.status.success() {
            return Err(EngineError::Command {
                op,
                code: out.status.code(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    fn stream(
        &self,
        op: &'static str,
        args: &[OsString],
        config_dir: Option<TempDir>,
    ) -> Result<EngineStream, EngineError> {
        let mut cmd = self.command(args);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        if let Some(dir) = config_dir.as_ref() {
            cmd.env("DOCKER_CONFIG", dir.path());
        }
        let child = cmd.spawn()?;
        Ok(Box::new(ChildStream::new(op, child, config_dir)?))
    }
}

impl ContainerEngine for DockerCli {
    fn ping(&self) -> Result<(), EngineError> {
        let version = self.output(
            "version",
            &[
                "version".into(),
                "--format".into(),
                "{{.Server.Version}}".into(),
            ],
        )?;
        if version.is_empty() {
            return Err(EngineError::Parse {
                op: "version",
                message: "daemon did not report a server version".to_string(),
            });
        }
        Ok(())
    }

    fn list_images(&self, reference: &str) -> Result<Vec<ImageSummary>, EngineError> {
        let out = self.output(
            "image ls",
            &[
                "image".into(),
                "ls".into(),
                "--no-trunc".into(),
                "--filter".into(),
                format!("reference={reference}").into(),
                "--format".into(),
                "{{json .}}".into(),
            ],
        )?;
        parse_json_lines("image ls", &out)
    }

    fn pull_image(
        &self,
        reference: &str,
        options: &PullOptions,
    ) -> Result<EngineStream, EngineError> {
        let config_dir = options
            .registry_auth
            .as_deref()
            .map(|token| docker_config_from_token(token, user_config_dir().as_deref()))
            .transpose()?;
        self.stream("pull", &["pull".into(), reference.into()], config_dir)
    }

    fn create_container(&self, spec: &ContainerSpec, name: &str) -> Result<String, EngineError> {
        let id = self.output("create", &create_args(spec, name))?;
        // Pull chatter may precede the id; the id is always the last line
        let id = id.lines().last().unwrap_or_default().trim().to_string();
        if id.is_empty() {
            return Err(EngineError::Parse {
                op: "create",
                message: "no container id returned".to_string(),
            });
        }
        Ok(id)
    }

    fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.output("start", &["start".into(), id.into()])
            .map(|_| ())
    }

    fn wait_container(
        &self,
        id: &str,
        deadline: Option<Duration>,
    ) -> Result<WaitOutcome, EngineError> {
        let mut child = self
            .command(&["wait".into(), id.into()])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let status = match deadline {
            None => child.wait()?,
            Some(limit) => match child.wait_timeout(limit)? {
                Some(s) => s,
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(EngineError::Timeout { op: "wait", after: limit });
                }
            },
        };
        let out = child.wait_with_output()?;
        if !status.success() {
            return Ok(WaitOutcome {
                status_code: -1,
                error: Some(String::from_utf8_lossy(&out.stderr).trim().to_string()),
            });
        }
        let text = String::from_utf8_lossy(&out.stdout).trim().to_string();
        let status_code = text.parse::<i64>().map_err(|e| EngineError::Parse {
            op: "wait",
            message: format!("{e}: {text:?}"),
        })?;

        Ok(WaitOutcome {
            status_code,
            error: None,
        })
    }

    fn container_logs(&self, id: &str) -> Result<EngineStream, EngineError> {
        self.stream("logs", &["logs".into(), id.into()], None)
    }

    fn remove_container(&self, id: &str, force: bool) -> Result<(), EngineError> {
        let mut args: Vec<OsString> = vec!["rm".into()];
        if force {
            args.push("-f".into());
        }
        args.push(id.into());
        self.output("rm", &args).map(|_| ())
    }

    fn list_containers(
        &self,
        options: &ContainerListOptions,
    ) -> Result<Vec<ContainerSummary>, EngineError> {
        let mut args: Vec<OsString> = vec!["ps".into(), "--no-trunc".into()];
        if options.all {
            args.push("-a".into());
        }
        if let Some(name) = options.name.as_deref() {
            args.push("--filter".into());
            args.push(format!("name={name}").into());
        }
        args.push("--format".into());
        args.push("{{json .}}".into());
        let out = self.output("ps", &args)?;
        parse_json_lines("ps", &out)
    }
}
