use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{JoinHandle, sleep};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::error::ProcessError;
use super::output::ProcessOutput;
use crate::utils::threads::spawn_named_thread;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Minimum time given to the output readers once the process exited.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

type SharedBuffer = Arc<Mutex<Vec<u8>>>;

////////////////////////////////////////////////////////////////////////////////////
// States for Not Started/Started process
////////////////////////////////////////////////////////////////////////////////////
pub struct CommandNotStarted {
    cmd: Command,
    description: String,
}

pub struct AsyncProcess {
    description: String,
    process: Child,
    stdin: Option<ChildStdin>,
    stdout: SharedBuffer,
    stderr: SharedBuffer,
    readers: Vec<JoinHandle<()>>,
    status: Option<ExitStatus>,
}

////////////////////////////////////////////////////////////////////////////////////
// Not Started
////////////////////////////////////////////////////////////////////////////////////
impl CommandNotStarted {
    pub fn new<P, I, A>(program: P, args: I) -> Self
    where
        P: AsRef<OsStr>,
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        let mut cmd = Command::new(program);
        cmd.args(args);
        let description = describe(&cmd);
        Self { cmd, description }
    }

    pub fn with_workdir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cmd.current_dir(dir);
        self
    }

    pub fn with_envs<I, K, V>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.cmd.envs(envs);
        self
    }

    /// Command line as it will be executed, used in logs and errors.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn start(mut self) -> Result<AsyncProcess, ProcessError> {
        self.cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut process = self.cmd.spawn().map_err(|source| ProcessError::Spawn {
            command: self.description.clone(),
            source,
        })?;
        debug!(pid = process.id(), command = %self.description, "process started");

        let stdin = process.stdin.take();
        let stdout = process
            .stdout
            .take()
            .ok_or(ProcessError::StreamPipeError("stdout".to_string()))?;
        let stderr = process
            .stderr
            .take()
            .ok_or(ProcessError::StreamPipeError("stderr".to_string()))?;

        let stdout_buffer = SharedBuffer::default();
        let stderr_buffer = SharedBuffer::default();
        let readers = vec![
            spawn_reader("stdout-reader", stdout, stdout_buffer.clone())?,
            spawn_reader("stderr-reader", stderr, stderr_buffer.clone())?,
        ];

        Ok(AsyncProcess {
            description: self.description,
            process,
            stdin,
            stdout: stdout_buffer,
            stderr: stderr_buffer,
            readers,
            status: None,
        })
    }
}

fn describe(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}

fn spawn_reader<R>(
    name: &str,
    stream: R,
    buffer: SharedBuffer,
) -> Result<JoinHandle<()>, ProcessError>
where
    R: Read + Send + 'static,
{
    let stream_name = name.to_string();
    let handle = spawn_named_thread(name, move || {
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) => break,
                Ok(_) => {
                    trace!(stream = %stream_name, "{}", String::from_utf8_lossy(&line).trim_end());
                    buffer
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&line);
                }
                Err(err) => {
                    debug!(stream = %stream_name, %err, "stopped reading process output");
                    break;
                }
            }
        }
    })?;
    Ok(handle)
}

fn snapshot(buffer: &SharedBuffer) -> String {
    String::from_utf8_lossy(&buffer.lock().unwrap_or_else(PoisonError::into_inner)).into_owned()
}

////////////////////////////////////////////////////////////////////////////////////
// Started
////////////////////////////////////////////////////////////////////////////////////
impl AsyncProcess {
    pub fn pid(&self) -> u32 {
        self.process.id()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Writes `data` to the process stdin. Stdin stays open until [AsyncProcess::close_stdin].
    pub fn write_stdin(&mut self, data: &[u8]) -> Result<(), ProcessError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ProcessError::StdinClosed(self.description.clone()))?;
        stdin.write_all(data)?;
        stdin.flush()?;
        Ok(())
    }

    /// Closes stdin so the process observes end of input.
    pub fn close_stdin(&mut self) {
        self.stdin.take();
    }

    pub fn is_running(&mut self) -> bool {
        self.status.is_none() && self.process.try_wait().is_ok_and(|v| v.is_none())
    }

    /// Output captured so far, as `(stdout, stderr)`. Does not block nor interfere with the process.
    pub fn current_output(&self) -> (String, String) {
        (snapshot(&self.stdout), snapshot(&self.stderr))
    }

    /// Blocks until the process exits or `timeout` elapses.
    ///
    /// On timeout the process is left running and [ProcessError::Timeout] is returned with the
    /// output captured so far.
    pub fn wait(&mut self, timeout: Duration) -> Result<ExitStatus, ProcessError> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.process.try_wait()? {
                debug!(pid = self.pid(), %status, "process exited");
                self.status = Some(status);
                return Ok(status);
            }
            let now = Instant::now();
            if now >= deadline {
                let (stdout, stderr) = self.current_output();
                return Err(ProcessError::Timeout {
                    command: self.description.clone(),
                    timeout,
                    stdout,
                    stderr,
                });
            }
            sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Waits for completion within `timeout`, drains both output streams and returns the output.
    ///
    /// Draining gets whatever is left of `timeout`, and at least [DRAIN_GRACE]. Streams still open
    /// after that, e.g. held by a background descendant, are reported as [ProcessError::Timeout]
    /// with the partial output. A non-zero exit status is reported as [ProcessError::Failed]
    /// carrying both streams.
    pub fn sync(&mut self, timeout: Duration) -> Result<ProcessOutput, ProcessError> {
        let deadline = Instant::now() + timeout;
        let status = self.wait(timeout)?;
        self.close_stdin();
        self.drain_readers(deadline.max(Instant::now() + DRAIN_GRACE), timeout)?;

        let (stdout, stderr) = self.current_output();
        if !status.success() {
            return Err(ProcessError::Failed {
                command: self.description.clone(),
                exit_code: status.code(),
                stdout,
                stderr,
            });
        }
        Ok(ProcessOutput::new(status, stdout, stderr))
    }

    /// Joins the reader threads, failing at `deadline` when a descendant keeps the pipes open.
    fn drain_readers(&mut self, deadline: Instant, timeout: Duration) -> Result<(), ProcessError> {
        while !self.readers.iter().all(JoinHandle::is_finished) && Instant::now() < deadline {
            sleep(POLL_INTERVAL);
        }
        let (finished, pending): (Vec<_>, Vec<_>) =
            self.readers.drain(..).partition(JoinHandle::is_finished);
        for handle in finished {
            if handle.join().is_err() {
                warn!(command = %self.description, "output reader panicked");
            }
        }
        if pending.is_empty() {
            return Ok(());
        }
        debug!(command = %self.description, "output streams still open after process exit");
        self.readers = pending;
        let (stdout, stderr) = self.current_output();
        Err(ProcessError::Timeout {
            command: self.description.clone(),
            timeout,
            stdout,
            stderr,
        })
    }

    pub fn kill(&mut self) -> Result<(), ProcessError> {
        if self.is_running() {
            self.process.kill()?;
        }
        let status = self.process.wait()?;
        self.status = Some(status);
        Ok(())
    }

    /// Asks the process to stop and kills it if it is still running after `grace`.
    pub fn terminate(&mut self, grace: Duration) -> Result<(), ProcessError> {
        if !self.is_running() {
            return Ok(());
        }
        let graceful_shutdown_result = self.graceful_shutdown();
        if let Err(err) = &graceful_shutdown_result {
            warn!(pid = self.pid(), %err, "graceful shutdown failed");
        }

        if graceful_shutdown_result.is_err() || self.is_running_after_timeout(grace) {
            return self.kill();
        }
        Ok(())
    }

    fn is_running_after_timeout(&mut self, timeout: Duration) -> bool {
        self.wait(timeout).is_err()
    }

    #[cfg(target_family = "unix")]
    fn graceful_shutdown(&self) -> Result<(), ProcessError> {
        use nix::{sys::signal, unistd::Pid};

        signal::kill(Pid::from_raw(self.pid() as i32), signal::SIGTERM)
            .map_err(|e| ProcessError::from(std::io::Error::from(e)))
    }

    #[cfg(not(target_family = "unix"))]
    fn graceful_shutdown(&mut self) -> Result<(), ProcessError> {
        self.kill()
    }
}

impl Drop for AsyncProcess {
    fn drop(&mut self) {
        if self.status.is_none() {
            let _ = self.process.kill();
            let _ = self.process.wait();
        }
    }
}
