//! Error mapping guide:
//! - EngineError covers transport/API failures talking to the container runtime.
//! - AnalysisError is what one tool invocation returns; it wraps EngineError.
//! - CleanupError is only ever logged; nothing returns it to a caller.
//! - Map io::ErrorKind::NotFound to exit code 127, validation to 2, all others to 1.
use std::fmt;
use std::io;
use std::time::Duration;

/// Failure while talking to the container engine.
#[derive(Debug)]
pub enum EngineError {
    /// Spawning or reading from the runtime process failed.
    Io(io::Error),
    /// The runtime ran but reported failure.
    Command {
        op: &'static str,
        code: Option<i32>,
        stderr: String,
    },
    /// The runtime answered with something we could not interpret.
    Parse { op: &'static str, message: String },
    /// A caller-supplied deadline elapsed.
    Timeout { op: &'static str, after: Duration },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Io(e) => write!(f, "{e}"),
            EngineError::Command { op, code, stderr } => {
                let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                let stderr = stderr.trim();
                if stderr.is_empty() {
                    write!(f, "docker {op} failed (exit {code})")
                } else {
                    write!(f, "docker {op} failed (exit {code}): {stderr}")
                }
            }
            EngineError::Parse { op, message } => {
                write!(f, "docker {op}: unexpected output: {message}")
            }
            EngineError::Timeout { op, after } => {
                write!(f, "docker {op} did not finish within {}s", after.as_secs())
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for EngineError {
    fn from(e: io::Error) -> Self {
        EngineError::Io(e)
    }
}

/// Result of a single analysis invocation gone wrong.
#[derive(Debug)]
pub enum AnalysisError {
    /// Image or command was empty; rejected before any engine call.
    Validation,
    Engine(EngineError),
    /// The wait call reported an error for the container.
    ContainerRuntime {
        container_id: String,
        message: String,
        status_code: i64,
    },
    /// The configured wait deadline elapsed before the container stopped.
    WaitTimeout {
        container_id: String,
        after: Duration,
    },
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::Validation => f.write_str("image or cmd is empty"),
            AnalysisError::Engine(e) => write!(f, "{e}"),
            AnalysisError::ContainerRuntime {
                container_id,
                message,
                status_code,
            } => write!(
                f,
                "Error on wait container {container_id}: {message} | Exited with status {status_code}"
            ),
            AnalysisError::WaitTimeout {
                container_id,
                after,
            } => write!(
                f,
                "container {container_id} still running after {}s",
                after.as_secs()
            ),
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalysisError::Engine(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EngineError> for AnalysisError {
    fn from(e: EngineError) -> Self {
        AnalysisError::Engine(e)
    }
}

/// Removal failure for one container. Logged at the point of failure and dropped.
#[derive(Debug)]
pub struct CleanupError {
    pub container_id: String,
    pub source: EngineError,
}

impl fmt::Display for CleanupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to remove container {}: {}",
            self.container_id, self.source
        )
    }
}

impl std::error::Error for CleanupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Map an io::Error to a process exit code:
/// - 127 for NotFound (command not found)
/// - 1 for all other errors
pub fn exit_code_for_io_error(e: &io::Error) -> u8 {
    if e.kind() == io::ErrorKind::NotFound {
        127
    } else {
        1
    }
}

/// Convert AnalysisError to exit code (parity with io::Error mapping).
pub fn exit_code_for_analysis_error(e: &AnalysisError) -> u8 {
    match e {
        AnalysisError::Validation => 2,
        AnalysisError::Engine(EngineError::Io(ioe)) => exit_code_for_io_error(ioe),
        _ => 1,
    }
}
