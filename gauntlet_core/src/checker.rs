use crate::executor::exit_code;
use crate::pool::CommandPool;
use crate::signal::wait_for_exit;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use thiserror::Error;

const CHECK_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Target executable not found: {0:?}")]
    TargetNotFound(PathBuf),

    #[error("Failed to spawn target {path:?}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Replay I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Result of one deterministic replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The target exited on its own within the timeout.
    Exited(i32),
    /// The target was still running when the timeout elapsed; it was
    /// killed and reaped.
    TimedOut,
}

/// Replays a fixed solution script against the target under one overall
/// timeout.
///
/// Unlike the fuzzing runner there is no escalation and no retry: the
/// whole pool is delivered as a single stdin payload, the target's output
/// is discarded, and the only question is whether it exits in time.
pub struct SolutionChecker {
    target: PathBuf,
    timeout: Duration,
}

impl SolutionChecker {
    pub fn new(target: PathBuf, timeout: Duration) -> Self {
        Self { target, timeout }
    }

    pub fn run(&self, pool: &CommandPool) -> Result<CheckOutcome, CheckError> {
        let payload = pool.commands().join("\n") + "\n";

        let mut child = Command::new(&self.target)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    CheckError::TargetNotFound(self.target.clone())
                } else {
                    CheckError::Spawn {
                        path: self.target.clone(),
                        source: e,
                    }
                }
            })?;

        // Delivery happens off-thread so the timeout below bounds the whole
        // replay; a payload larger than the pipe buffer would otherwise
        // block here with no deadline. The target may exit before reading
        // the whole payload, so a broken pipe is not a failure. Dropping
        // the handle closes the stream so the target sees EOF.
        let stdin = child.stdin.take();
        let feeder = thread::spawn(move || {
            if let Some(mut stdin) = stdin {
                let _ = stdin.write_all(payload.as_bytes());
            }
        });

        let verdict = match wait_for_exit(&mut child, self.timeout, CHECK_POLL_INTERVAL) {
            Ok(Some(status)) => Ok(CheckOutcome::Exited(exit_code(status))),
            Ok(None) => {
                let _ = child.kill();
                child
                    .wait()
                    .map(|_| CheckOutcome::TimedOut)
                    .map_err(CheckError::from)
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(CheckError::Io(e))
            }
        };

        // The target is gone by now, so a blocked write has broken its
        // pipe and the feeder cannot outlive the verdict.
        let _ = feeder.join();
        verdict
    }
}
