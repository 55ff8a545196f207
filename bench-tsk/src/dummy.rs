//  DUMMY.rs
//    by Lut99
//
//  Created:
//    17 Feb 2023, 11:02:37
//  Last edited:
//    21 Feb 2023, 16:45:10
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements a Dummy process manager for unit test purposes only. It
//!   spawns nothing, but remembers what it was asked to run.
//

use std::io::ErrorKind;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use tokio_util::sync::CancellationToken;

pub use crate::errors::ProcessError as Error;
use crate::process::{CommandSpec, ProcessManager, ProcessOutput, ProcessProxy};


/***** TESTS *****/
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dummy_records_started_processes() {
        let manager: DummyProcessManager = DummyProcessManager::new().with_stdout("latency 1.5 ms\n");
        let mut proc: Box<dyn ProcessProxy> = manager.create(&CommandSpec::new("redis-server", [ "--port", "6379" ])).unwrap();
        // Creating is not starting
        assert!(manager.launched().is_empty());

        proc.start().await.unwrap();
        assert_eq!(manager.launched(), vec![ "redis-server --port 6379".to_string() ]);
        let output: ProcessOutput = proc.wait(&CancellationToken::new()).await.unwrap().unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "latency 1.5 ms\n");
    }

    #[tokio::test]
    async fn dummy_blocks_until_cancelled() {
        let manager: DummyProcessManager = DummyProcessManager::new().blocking();
        let mut proc: Box<dyn ProcessProxy> = manager.create(&CommandSpec::new("server", Vec::<String>::new())).unwrap();
        proc.start().await.unwrap();

        let token: CancellationToken = CancellationToken::new();
        token.cancel();
        assert!(proc.wait(&token).await.unwrap().is_none());
        assert!(!proc.is_running());
        assert_eq!(manager.killed(), 1);
    }
}





/***** LIBRARY *****/
/// Defines what the processes of a [`DummyProcessManager`] do.
#[derive(Clone, Debug)]
struct DummyBehaviour {
    /// The code to exit with.
    exit_code   : i32,
    /// The stdout to produce.
    stdout      : String,
    /// If true, processes never exit by themselves.
    blocking    : bool,
    /// If true, processes fail to start.
    spawn_fails : bool,
}



/// The DummyProcessManager implements a [`ProcessManager`] whose processes don't do any actual work.
#[derive(Clone, Debug)]
pub struct DummyProcessManager {
    /// What the processes do.
    behaviour : DummyBehaviour,
    /// The command lines of every process started so far.
    launched  : Arc<Mutex<Vec<String>>>,
    /// The number of processes killed so far.
    killed    : Arc<Mutex<usize>>,
}

impl DummyProcessManager {
    /// Constructor for a DummyProcessManager whose processes immediately exit successfully without output.
    #[inline]
    pub fn new() -> Self {
        Self {
            behaviour : DummyBehaviour { exit_code: 0, stdout: String::new(), blocking: false, spawn_fails: false },
            launched  : Arc::new(Mutex::new(vec![])),
            killed    : Arc::new(Mutex::new(0)),
        }
    }

    /// Makes processes exit with the given code.
    #[inline]
    pub fn with_exit_code(mut self, code: i32) -> Self { self.behaviour.exit_code = code; self }

    /// Makes processes write the given text to stdout.
    #[inline]
    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self { self.behaviour.stdout = stdout.into(); self }

    /// Makes processes run until they are killed.
    #[inline]
    pub fn blocking(mut self) -> Self { self.behaviour.blocking = true; self }

    /// Makes processes fail to start.
    #[inline]
    pub fn failing_spawn(mut self) -> Self { self.behaviour.spawn_fails = true; self }



    /// Returns the command lines of all processes started by this manager (or its clones), in order.
    #[inline]
    pub fn launched(&self) -> Vec<String> { self.launched.lock().unwrap().clone() }

    /// Returns the number of processes killed while they were running.
    #[inline]
    pub fn killed(&self) -> usize { *self.killed.lock().unwrap() }
}

impl Default for DummyProcessManager {
    #[inline]
    fn default() -> Self { Self::new() }
}

impl ProcessManager for DummyProcessManager {
    fn create(&self, spec: &CommandSpec) -> Result<Box<dyn ProcessProxy>, Error> {
        Ok(Box::new(DummyProcess {
            command_line : spec.command_line(),
            behaviour    : self.behaviour.clone(),
            launched     : self.launched.clone(),
            killed       : self.killed.clone(),
            started      : None,
            running      : false,
        }))
    }
}



/// A process of the [`DummyProcessManager`].
#[derive(Debug)]
struct DummyProcess {
    command_line : String,
    behaviour    : DummyBehaviour,
    launched     : Arc<Mutex<Vec<String>>>,
    killed       : Arc<Mutex<usize>>,

    started : Option<DateTime<Utc>>,
    running : bool,
}

#[async_trait]
impl ProcessProxy for DummyProcess {
    #[inline]
    fn command_line(&self) -> String { self.command_line.clone() }

    async fn start(&mut self) -> Result<(), Error> {
        if self.started.is_some() { return Err(Error::AlreadyStarted{ command: self.command_line.clone() }); }
        if self.behaviour.spawn_fails {
            return Err(Error::SpawnError{ command: self.command_line.clone(), err: std::io::Error::new(ErrorKind::NotFound, "dummy process refuses to start") });
        }

        info!("Processing dummy start of '{}'", self.command_line);
        self.launched.lock().unwrap().push(self.command_line.clone());
        self.started = Some(Utc::now());
        self.running = true;
        Ok(())
    }

    async fn wait(&mut self, token: &CancellationToken) -> Result<Option<ProcessOutput>, Error> {
        let started: DateTime<Utc> = match self.started {
            Some(started) if self.running => started,
            _                             => { return Err(Error::NotStarted{ command: self.command_line.clone() }); },
        };

        if self.behaviour.blocking {
            token.cancelled().await;
            self.kill().await?;
            return Ok(None);
        }
        self.running = false;
        Ok(Some(ProcessOutput {
            exit_code : Some(self.behaviour.exit_code),
            stdout    : self.behaviour.stdout.clone(),
            stderr    : String::new(),
            started,
            exited    : Utc::now(),
        }))
    }

    async fn kill(&mut self) -> Result<(), Error> {
        if self.running {
            info!("Processing dummy kill of '{}'", self.command_line);
            *self.killed.lock().unwrap() += 1;
            self.running = false;
        }
        Ok(())
    }

    #[inline]
    fn is_running(&self) -> bool { self.running }
}
