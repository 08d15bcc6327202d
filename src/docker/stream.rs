//! Child-process stdout exposed as a `Read` that fails at EOF if the process failed.

use std::io::{self, Read};
use std::process::{Child, ChildStdout};
use std::thread::JoinHandle;

use tempfile::TempDir;

pub(crate) struct ChildStream {
    op: &'static str,
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    finished: bool,
    // Keeps a temporary DOCKER_CONFIG alive until the child exits.
    _config_dir: Option<TempDir>,
}

impl ChildStream {
    /// Take ownership of a spawned child with piped stdout (and optionally stderr).
    pub(crate) fn new(
        op: &'static str,
        mut child: Child,
        config_dir: Option<TempDir>,
    ) -> io::Result<Self> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other(format!("docker {op}: stdout not captured")))?;
        // Drain stderr on its own thread so a chatty runtime cannot block stdout.
        let stderr = child.stderr.take().map(|mut err| {
            std::thread::spawn(move || {
                let mut s = String::new();
                let _ = err.read_to_string(&mut s);
                s
            })
        });
        Ok(ChildStream {
            op,
            child,
            stdout: Some(stdout),
            stderr,
            finished: false,
            _config_dir: config_dir,
        })
    }

    fn finish(&mut self) -> io::Result<()> {
        self.finished = true;
        self.stdout = None;
        let status = self.child.wait()?;
        let stderr = self
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        if status.success() {
            return Ok(());
        }
        let code = status
            .code()
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        Err(io::Error::other(format!(
            "docker {} failed (exit {}): {}",
            self.op,
            code,
            stderr.trim()
        )))
    }
}

impl Read for ChildStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.finished {
            return Ok(0);
        }
        let n = match self.stdout.as_mut() {
            Some(out) => out.read(buf)?,
            None => 0,
        };
        if n == 0 && !buf.is_empty() {
            self.finish()?;
        }
        Ok(n)
    }
}

impl Drop for ChildStream {
    fn drop(&mut self) {
        if !self.finished {
            // Abandoned mid-stream; reap the child rather than leak it
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
