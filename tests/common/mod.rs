#![allow(dead_code)]
//! Recording in-memory engine shared by the integration tests.

use std::collections::HashSet;
use std::io::{self, Cursor, Read};
use std::sync::Mutex;
use std::time::Duration;

use scanbox::docker::{
    ContainerListOptions, ContainerSpec, ContainerSummary, EngineStream, ImageSummary,
    PullOptions, WaitOutcome,
};
use scanbox::{ContainerEngine, EngineError};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Ping,
    ListImages(String),
    Pull(String, PullOptions),
    Create(ContainerSpec, String),
    Start(String),
    Wait(String, Option<Duration>),
    Logs(String),
    Remove(String, bool),
    ListContainers(ContainerListOptions),
}

/// Reader that yields some bytes and then fails.
pub struct BrokenReader {
    head: Cursor<Vec<u8>>,
}

impl Read for BrokenReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.head.read(buf)?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream reset"));
        }
        Ok(n)
    }
}

pub fn cmd_failure(op: &'static str) -> EngineError {
    EngineError::Command {
        op,
        code: Some(1),
        stderr: format!("simulated {op} failure"),
    }
}

#[derive(Default)]
pub struct FakeEngine {
    pub calls: Mutex<Vec<Call>>,
    pub cached_images: Vec<String>,
    pub list_images_fails: bool,
    pub pull_fails: bool,
    pub pull_stream_breaks: bool,
    pub create_fails: bool,
    pub start_fails: bool,
    pub wait_outcome: WaitOutcome,
    pub wait_times_out: bool,
    pub logs: Vec<u8>,
    pub logs_stream_breaks: bool,
    pub remove_fails_for: HashSet<String>,
    pub containers: Vec<ContainerSummary>,
    pub list_containers_fails: bool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, c: Call) {
        self.calls.lock().expect("calls lock").push(c);
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn created_spec(&self) -> Option<(ContainerSpec, String)> {
        self.calls().into_iter().find_map(|c| match c {
            Call::Create(spec, name) => Some((spec, name)),
            _ => None,
        })
    }
}

impl ContainerEngine for FakeEngine {
    fn ping(&self) -> Result<(), EngineError> {
        self.record(Call::Ping);
        Ok(())
    }

    fn list_images(&self, reference: &str) -> Result<Vec<ImageSummary>, EngineError> {
        self.record(Call::ListImages(reference.to_string()));
        if self.list_images_fails {
            return Err(cmd_failure("image ls"));
        }
        Ok(self
            .cached_images
            .iter()
            .filter(|i| i.as_str() == reference)
            .map(|i| ImageSummary {
                id: format!("sha256:{}", i.len()),
                repository: i.clone(),
                tag: "latest".to_string(),
            })
            .collect())
    }

    fn pull_image(
        &self,
        reference: &str,
        options: &PullOptions,
    ) -> Result<EngineStream, EngineError> {
        self.record(Call::Pull(reference.to_string(), options.clone()));
        if self.pull_fails {
            return Err(cmd_failure("pull"));
        }
        let progress = b"{\"status\":\"Downloading\"}\n{\"status\":\"Pull complete\"}\n".to_vec();
        if self.pull_stream_breaks {
            return Ok(Box::new(BrokenReader {
                head: Cursor::new(progress),
            }));
        }
        Ok(Box::new(Cursor::new(progress)))
    }

    fn create_container(&self, spec: &ContainerSpec, name: &str) -> Result<String, EngineError> {
        self.record(Call::Create(spec.clone(), name.to_string()));
        if self.create_fails {
            return Err(cmd_failure("create"));
        }
        Ok("c0ffee".to_string())
    }

    fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.record(Call::Start(id.to_string()));
        if self.start_fails {
            return Err(cmd_failure("start"));
        }
        Ok(())
    }

    fn wait_container(
        &self,
        id: &str,
        deadline: Option<Duration>,
    ) -> Result<WaitOutcome, EngineError> {
        self.record(Call::Wait(id.to_string(), deadline));
        if self.wait_times_out {
            return Err(EngineError::Timeout {
                op: "wait",
                after: deadline.unwrap_or_default(),
            });
        }
        Ok(self.wait_outcome.clone())
    }

    fn container_logs(&self, id: &str) -> Result<EngineStream, EngineError> {
        self.record(Call::Logs(id.to_string()));
        if self.logs_stream_breaks {
            return Ok(Box::new(BrokenReader {
                head: Cursor::new(self.logs.clone()),
            }));
        }
        Ok(Box::new(Cursor::new(self.logs.clone())))
    }

    fn remove_container(&self, id: &str, force: bool) -> Result<(), EngineError> {
        self.record(Call::Remove(id.to_string(), force));
        if self.remove_fails_for.contains(id) {
            return Err(cmd_failure("rm"));
        }
        Ok(())
    }

    fn list_containers(
        &self,
        options: &ContainerListOptions,
    ) -> Result<Vec<ContainerSummary>, EngineError> {
        self.record(Call::ListContainers(options.clone()));
        if self.list_containers_fails {
            return Err(cmd_failure("ps"));
        }
        let needle = options.name.clone().unwrap_or_default();
        Ok(self
            .containers
            .iter()
            .filter(|c| c.names.contains(&needle))
            .cloned()
            .collect())
    }
}
