//  PROCESS.rs
//    by Lut99
//
//  Created:
//    17 Feb 2023, 09:21:44
//  Last edited:
//    22 Feb 2023, 13:02:19
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the runner for the external workload processes. The
//!   executors only see the `ProcessManager` and `ProcessProxy` traits, so
//!   that they can be tested without any real binaries.
//

use std::fmt::{Display, Formatter, Result as FResult};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use crate::errors::ProcessError as Error;


/***** TESTS *****/
#[cfg(all(test, unix))]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn sh(script: &str) -> CommandSpec { CommandSpec::new("sh", [ "-c", script ]) }

    #[tokio::test]
    async fn process_captures_output_and_code() {
        let mut proc: Box<dyn ProcessProxy> = TokioProcessManager.create(&sh("echo hello; echo oops >&2; exit 3")).unwrap();
        assert!(!proc.is_running());
        proc.start().await.unwrap();
        assert!(proc.is_running());

        let output: ProcessOutput = proc.wait(&CancellationToken::new()).await.unwrap().unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.stderr, "oops\n");
        assert!(output.started <= output.exited);
        assert!(!proc.is_running());
    }

    #[tokio::test]
    async fn process_cancel_kills() {
        let mut proc: Box<dyn ProcessProxy> = TokioProcessManager.create(&sh("sleep 30")).unwrap();
        proc.start().await.unwrap();

        let token: CancellationToken = CancellationToken::new();
        let canceller = {
            let token: CancellationToken = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                token.cancel();
            })
        };
        let start: Instant = Instant::now();
        assert!(proc.wait(&token).await.unwrap().is_none());
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(!proc.is_running());
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn process_lifecycle_errors() {
        let mut proc: Box<dyn ProcessProxy> = TokioProcessManager.create(&sh("true")).unwrap();
        assert!(matches!(proc.wait(&CancellationToken::new()).await, Err(Error::NotStarted{ .. })));
        proc.start().await.unwrap();
        assert!(matches!(proc.start().await, Err(Error::AlreadyStarted{ .. })));
        assert!(proc.wait(&CancellationToken::new()).await.unwrap().unwrap().success());
        // Killing an exited process is fine
        proc.kill().await.unwrap();

        let mut spec: CommandSpec = sh("true");
        spec.working_dir = Some(PathBuf::from("/this/path/does/not/exist"));
        let mut proc: Box<dyn ProcessProxy> = TokioProcessManager.create(&spec).unwrap();
        assert!(matches!(proc.start().await, Err(Error::WorkingDirNotFound{ .. })));

        let mut proc: Box<dyn ProcessProxy> = TokioProcessManager.create(&CommandSpec::new("/this/binary/does/not/exist", Vec::<String>::new())).unwrap();
        assert!(matches!(proc.start().await, Err(Error::SpawnError{ .. })));
    }

    #[test]
    fn process_command_line() {
        assert_eq!(CommandSpec::new("memtier", [ "--server=1.2.3.5", "--port=6379" ]).command_line(), "memtier --server=1.2.3.5 --port=6379");
        assert_eq!(CommandSpec::new("tool", [ "a b" ]).command_line(), "tool \"a b\"");
    }
}





/***** HELPER FUNCTIONS *****/
/// Reads the given pipe to the end in the background.
fn collect(pipe: Option<impl 'static + AsyncRead + Send + Unpin>) -> Option<JoinHandle<String>> {
    let mut pipe = pipe?;
    Some(tokio::spawn(async move {
        let mut raw: Vec<u8> = Vec::new();
        if let Err(err) = pipe.read_to_end(&mut raw).await { warn!("Failed to read process output: {}", err); }
        String::from_utf8_lossy(&raw).into_owned()
    }))
}

/// Waits for a background reader to complete.
async fn join(handle: Option<JoinHandle<String>>) -> String {
    match handle {
        Some(handle) => match handle.await {
            Ok(text) => text,
            Err(err) => { warn!("Process output reader failed: {}", err); String::new() },
        },
        None => String::new(),
    }
}





/***** LIBRARY *****/
/// Describes how to start an external process.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandSpec {
    /// The binary to run.
    pub path        : PathBuf,
    /// The arguments to pass to it.
    pub args        : Vec<String>,
    /// The directory to run it in. Uses the current directory if omitted.
    pub working_dir : Option<PathBuf>,
}

impl CommandSpec {
    /// Constructor for the CommandSpec that runs in the current directory.
    #[inline]
    pub fn new(path: impl Into<PathBuf>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { path: path.into(), args: args.into_iter().map(|a| a.into()).collect(), working_dir: None }
    }

    /// Returns the command line this spec runs, as it would be typed in a shell.
    pub fn command_line(&self) -> String {
        let mut line: String = self.path.display().to_string();
        for arg in &self.args {
            line.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                line.push_str(&format!("{:?}", arg));
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

impl Display for CommandSpec {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult { write!(f, "{}", self.command_line()) }
}



/// The result of a process that ran to completion.
#[derive(Clone, Debug)]
pub struct ProcessOutput {
    /// The code it exited with, if any (there is none when it was killed by a signal).
    pub exit_code : Option<i32>,
    /// Everything it wrote to stdout.
    pub stdout    : String,
    /// Everything it wrote to stderr.
    pub stderr    : String,
    /// When it was started.
    pub started   : DateTime<Utc>,
    /// When it exited.
    pub exited    : DateTime<Utc>,
}

impl ProcessOutput {
    /// Returns whether the process exited with code 0.
    #[inline]
    pub fn success(&self) -> bool { self.exit_code == Some(0) }
}



/// Creates processes. The seam between executors and the operating system.
pub trait ProcessManager: Send + Sync {
    /// Prepares a process for the given command. Does not start it yet.
    ///
    /// # Errors
    /// This function may error if the manager refuses the command.
    fn create(&self, spec: &CommandSpec) -> Result<Box<dyn ProcessProxy>, Error>;
}

/// A handle to a single process, exclusively owned by whoever created it.
#[async_trait]
pub trait ProcessProxy: Send {
    /// The command line of the process.
    fn command_line(&self) -> String;

    /// Starts the process. Returns as soon as it has been spawned.
    ///
    /// # Errors
    /// This function errors if the process could not be spawned or was already started.
    async fn start(&mut self) -> Result<(), Error>;

    /// Waits for the started process to exit.
    ///
    /// # Arguments
    /// - `token`: If cancelled, the process is killed and `None` is returned.
    ///
    /// # Returns
    /// The [`ProcessOutput`] of the process, or `None` if cancelled.
    ///
    /// # Errors
    /// This function errors if the process was never started or waiting for it failed.
    async fn wait(&mut self, token: &CancellationToken) -> Result<Option<ProcessOutput>, Error>;

    /// Force-kills the process if it is running. Does nothing otherwise.
    ///
    /// # Errors
    /// This function errors if the operating system refused to kill the process.
    async fn kill(&mut self) -> Result<(), Error>;

    /// Returns whether the process has been started and has not been waited for or killed.
    fn is_running(&self) -> bool;
}



/// The ProcessManager that spawns actual processes using tokio.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioProcessManager;

impl ProcessManager for TokioProcessManager {
    #[inline]
    fn create(&self, spec: &CommandSpec) -> Result<Box<dyn ProcessProxy>, Error> {
        Ok(Box::new(TokioProcess::new(spec.clone())))
    }
}



/// A process spawned with tokio. It is killed when dropped.
#[derive(Debug)]
pub struct TokioProcess {
    /// What to run.
    spec    : CommandSpec,
    /// The process itself, while it runs.
    child   : Option<Child>,
    /// Whether the process has been started at some point.
    started : Option<DateTime<Utc>>,
    /// The readers of the stdout and stderr pipes.
    stdout  : Option<JoinHandle<String>>,
    stderr  : Option<JoinHandle<String>>,
}

impl TokioProcess {
    /// Constructor for the TokioProcess.
    #[inline]
    pub fn new(spec: CommandSpec) -> Self { Self { spec, child: None, started: None, stdout: None, stderr: None } }
}

#[async_trait]
impl ProcessProxy for TokioProcess {
    #[inline]
    fn command_line(&self) -> String { self.spec.command_line() }

    async fn start(&mut self) -> Result<(), Error> {
        if self.started.is_some() { return Err(Error::AlreadyStarted{ command: self.command_line() }); }
        if let Some(dir) = &self.spec.working_dir {
            if !dir.is_dir() { return Err(Error::WorkingDirNotFound{ path: dir.clone() }); }
        }

        // Prepare the command
        let mut cmd: Command = Command::new(&self.spec.path);
        cmd.args(&self.spec.args);
        if let Some(dir) = &self.spec.working_dir { cmd.current_dir(dir); }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        // Spawn it
        debug!("Spawning '{}'...", self.command_line());
        let mut child: Child = match cmd.spawn() {
            Ok(child) => child,
            Err(err)  => { return Err(Error::SpawnError{ command: self.command_line(), err }); },
        };
        info!("Started process '{}' (PID {})", self.command_line(), child.id().map(|id| id.to_string()).unwrap_or_else(|| "?".into()));
        self.stdout  = collect(child.stdout.take());
        self.stderr  = collect(child.stderr.take());
        self.started = Some(Utc::now());
        self.child   = Some(child);
        Ok(())
    }

    async fn wait(&mut self, token: &CancellationToken) -> Result<Option<ProcessOutput>, Error> {
        let started: DateTime<Utc> = match (&self.child, self.started) {
            (Some(_), Some(started)) => started,
            _                        => { return Err(Error::NotStarted{ command: self.command_line() }); },
        };

        // Wait until it exits or we are told to stop
        let status: Option<std::io::Result<ExitStatus>> = match self.child.as_mut() {
            Some(child) => tokio::select! {
                biased;
                _      = token.cancelled() => None,
                status = child.wait()      => Some(status),
            },
            None => None,
        };
        let status: ExitStatus = match status {
            Some(Ok(status)) => status,
            Some(Err(err))   => { return Err(Error::WaitError{ command: self.command_line(), err }); },
            None => {
                debug!("Wait for '{}' cancelled; killing it", self.command_line());
                self.kill().await?;
                return Ok(None);
            },
        };
        let exited: DateTime<Utc> = Utc::now();
        self.child = None;

        // Collect the output
        let stdout: String = join(self.stdout.take()).await;
        let stderr: String = join(self.stderr.take()).await;
        debug!("Process '{}' exited with {}", self.command_line(), status);
        Ok(Some(ProcessOutput { exit_code: status.code(), stdout, stderr, started, exited }))
    }

    async fn kill(&mut self) -> Result<(), Error> {
        if let Some(mut child) = self.child.take() {
            info!("Killing process '{}'...", self.command_line());
            if let Err(err) = child.kill().await { return Err(Error::KillError{ command: self.command_line(), err }); }
        }
        for reader in [ self.stdout.take(), self.stderr.take() ].into_iter().flatten() { reader.abort(); }
        Ok(())
    }

    #[inline]
    fn is_running(&self) -> bool { self.child.is_some() }
}
