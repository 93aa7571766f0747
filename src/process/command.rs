use std::io;
use std::os::unix::process::CommandExt;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace, warn};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command as TokioCommand};
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::timeout;

use crate::process::{ExecConfig, PartialOutput, ProcessError, ProcessResult};

/// Command wrapper for process execution
#[derive(Debug, Clone)]
pub struct Command {
    /// Program to execute
    program: String,

    /// Arguments to pass to the program
    args: Vec<String>,
}

impl Command {
    /// Create a new command
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Run `script` through the system shell, like `sh -c "<script>"`
    pub fn shell<S: Into<String>>(script: S) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Spawn the command in its own process group with both output
    /// streams piped
    pub fn spawn(&self) -> ProcessResult<ProcessHandle> {
        debug!("Spawning command: {} {:?}", self.program, self.args);

        let mut std_cmd = std::process::Command::new(&self.program);
        std_cmd.args(&self.args).process_group(0);

        let mut cmd = TokioCommand::from(std_cmd);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(ProcessError::SpawnError)?;
        let group = child
            .id()
            .and_then(|pid| i32::try_from(pid).ok())
            .map(Pid::from_raw);

        Ok(ProcessHandle {
            child,
            group,
            program: self.program.clone(),
        })
    }

    /// Run the command to completion, capturing stdout and stderr.
    ///
    /// Both streams are drained by their own task while the process runs,
    /// so a chatty process never blocks on a full pipe. A non-zero exit is
    /// not an error here; check [`CapturedOutput::status`]. When the run is
    /// cut short the error carries whatever was read until then.
    pub async fn run(&self, config: &ExecConfig) -> ProcessResult<CapturedOutput> {
        let mut handle = self.spawn()?;

        let mut stdout = Drain::spawn(handle.child.stdout.take());
        let mut stderr = Drain::spawn(handle.child.stderr.take());

        let Some(status) = handle.wait_with_timeout(config).await? else {
            // The group is gone, so the pipes close promptly
            let _ = timeout(config.wait_delay, async {
                let _ = stdout.wait().await;
                let _ = stderr.wait().await;
            })
            .await;
            let partial = PartialOutput {
                stdout: stdout.abandon().await,
                stderr: stderr.abandon().await,
            };
            return Err(ProcessError::Timeout {
                after: config.timeout,
                partial,
            });
        };

        // A background process inheriting the pipes can keep them open
        // after the shell exits; give the readers at most `wait_delay`.
        let drained = timeout(config.wait_delay, async { (stdout.wait().await, stderr.wait().await) }).await;

        match drained {
            Ok((out, err)) => {
                out?;
                err?;
            }
            Err(_) => {
                warn!(
                    "[{}] output streams still open {:?} after exit, killing its process group",
                    self.program, config.wait_delay
                );
                handle.kill_group();
                let partial = PartialOutput {
                    stdout: stdout.abandon().await,
                    stderr: stderr.abandon().await,
                };
                return Err(ProcessError::WaitDelay {
                    after: config.wait_delay,
                    partial,
                });
            }
        }

        let stdout = stdout.abandon().await;
        let stderr = stderr.abandon().await;

        trace!(
            "[{}] exited with {}, {} bytes stdout, {} bytes stderr",
            self.program,
            status,
            stdout.len(),
            stderr.len()
        );

        Ok(CapturedOutput {
            status,
            stdout,
            stderr,
        })
    }
}

/// Everything a finished process produced
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    /// Exit status
    pub status: ExitStatus,

    /// Captured standard output
    pub stdout: Vec<u8>,

    /// Captured standard error
    pub stderr: Vec<u8>,
}

impl CapturedOutput {
    /// Standard output, lossily decoded for diagnostics
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Standard error, lossily decoded for diagnostics
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Handle to a running process and the group it leads
pub struct ProcessHandle {
    /// Child process
    child: Child,

    /// Process group, equal to the child's pid
    group: Option<Pid>,

    /// Program name
    program: String,
}

impl ProcessHandle {
    /// Wait for the process to exit, `None` if it had to be terminated.
    ///
    /// Past `config.timeout` the whole process group is asked to stop with
    /// SIGTERM and gets `config.wait_delay` before it is killed.
    pub async fn wait_with_timeout(&mut self, config: &ExecConfig) -> ProcessResult<Option<ExitStatus>> {
        let waited = timeout(config.timeout, self.child.wait()).await;
        match waited {
            Ok(Ok(status)) => Ok(Some(status)),
            Ok(Err(e)) => Err(ProcessError::WaitError(e)),
            Err(_) => {
                warn!("[{}] timed out after {:?}, terminating", self.program, config.timeout);
                self.terminate(config.wait_delay).await;
                Ok(None)
            }
        }
    }

    /// Send SIGTERM to the process group, then SIGKILL to whatever
    /// outlives `grace`
    pub async fn terminate(&mut self, grace: Duration) {
        if let Some(group) = self.group {
            match signal::killpg(group, Signal::SIGTERM) {
                Ok(()) => {
                    if timeout(grace, self.child.wait()).await.is_ok() {
                        // Members that ignored SIGTERM outlive the leader
                        self.kill_group();
                        return;
                    }
                    warn!("[{}] still running {:?} after SIGTERM, killing", self.program, grace);
                }
                Err(e) => warn!("[{}] cannot send SIGTERM: {}", self.program, e),
            }
        }

        self.kill_group();
        if let Err(e) = self.child.kill().await {
            warn!("[{}] failed to kill process: {}", self.program, e);
        }
    }

    /// SIGKILL every process left in the group
    pub fn kill_group(&self) {
        let Some(group) = self.group else {
            return;
        };
        match signal::killpg(group, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => warn!("[{}] cannot kill process group {}: {}", self.program, group, e),
        }
    }
}

/// Reader task copying one output stream into a shared buffer, so the
/// bytes read so far survive an aborted read
struct Drain {
    task: JoinHandle<io::Result<()>>,
    buf: Arc<Mutex<Vec<u8>>>,
}

impl Drain {
    fn spawn<R>(stream: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);

        let task = tokio::spawn(async move {
            let Some(mut stream) = stream else {
                return Ok(());
            };
            let mut chunk = [0u8; 8192];
            loop {
                let n = stream.read(&mut chunk).await?;
                if n == 0 {
                    return Ok(());
                }
                sink.lock().await.extend_from_slice(&chunk[..n]);
            }
        });

        Self { task, buf }
    }

    /// Wait for EOF; must not be called again once it returned
    async fn wait(&mut self) -> ProcessResult<()> {
        joined((&mut self.task).await)
    }

    /// Stop reading and hand over what was read
    async fn abandon(self) -> Vec<u8> {
        self.task.abort();
        std::mem::take(&mut *self.buf.lock().await)
    }
}

fn joined(result: Result<io::Result<()>, JoinError>) -> ProcessResult<()> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ProcessError::ReadError(e)),
        Err(e) => Err(ProcessError::Other(format!("stream reader failed: {}", e))),
    }
}
