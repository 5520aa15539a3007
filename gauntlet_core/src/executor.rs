use crate::config::RunnerSettings;
use crate::journal::AttemptJournal;
use crate::signal::{SignalEscalator, wait_for_exit};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// How one attempt against the target ended.
///
/// `Finished` means the target exited on its own, before any termination
/// signal was sent; the payload is the observed exit code. A forced
/// termination is always `NotFinished`, even if the exit code happens to
/// be zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Finished(i32),
    NotFinished,
}

#[derive(Error, Debug)]
pub enum ExecutorError {
    /// The target executable could not be launched at all. Reported
    /// distinctly from a target that launched but did not finish.
    #[error("Failed to spawn target {path:?}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Attempt I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// The suspension points of one attempt.
#[derive(Debug, Clone, Copy)]
pub struct AttemptTimings {
    /// Delay between spawn and the first command, for target init.
    pub warmup: Duration,
    /// Delay after each command write.
    pub command_delay: Duration,
    /// Window after the last command during which a natural exit is
    /// still awaited before escalation.
    pub finish_grace: Duration,
    /// Liveness polling step.
    pub poll_interval: Duration,
    /// Bounded wait after each escalation signal.
    pub stage_wait: Duration,
}

impl Default for AttemptTimings {
    fn default() -> Self {
        Self {
            warmup: Duration::from_millis(1000),
            command_delay: Duration::from_millis(10),
            finish_grace: Duration::from_millis(400),
            poll_interval: Duration::from_millis(50),
            stage_wait: Duration::from_millis(1000),
        }
    }
}

impl From<&RunnerSettings> for AttemptTimings {
    fn from(settings: &RunnerSettings) -> Self {
        Self {
            warmup: settings.warmup(),
            command_delay: settings.command_delay(),
            finish_grace: settings.finish_grace(),
            poll_interval: settings.poll_interval(),
            stage_wait: settings.stage_wait(),
        }
    }
}

/// Manages one child process from spawn to exit, within one attempt.
///
/// The target is spawned as leader of its own session, so one signal can
/// reach it and anything it forks. Its stdout and stderr are merged into a
/// single pipe drained by a background thread into the journal, while the
/// control flow writes commands and polls for exit.
#[derive(Debug)]
pub struct TargetExecutor {
    target: PathBuf,
    working_dir: Option<PathBuf>,
    timings: AttemptTimings,
}

impl TargetExecutor {
    pub fn new(target: PathBuf, working_dir: Option<PathBuf>, timings: AttemptTimings) -> Self {
        Self {
            target,
            working_dir,
            timings,
        }
    }

    /// Runs one full attempt: spawn, warm up, feed `commands`, await a
    /// natural exit, escalate if the target hangs.
    ///
    /// The child, its pipes, and the journal's temp file are owned by this
    /// attempt; the child's stdin is closed and the drain thread joined on
    /// every exit path.
    pub fn run_attempt(
        &self,
        commands: &[String],
        journal: &Arc<AttemptJournal>,
    ) -> Result<AttemptOutcome, ExecutorError> {
        // One pipe carries both output streams, so the log sees them in
        // arrival order.
        let (merged_read, merged_write) = nix::unistd::pipe().map_err(io::Error::from)?;
        let stderr_write = merged_write.try_clone()?;

        let mut cmd = Command::new(&self.target);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::from(merged_write))
            .stderr(Stdio::from(stderr_write));
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        unsafe {
            cmd.pre_exec(|| {
                // New session: the child becomes a process-group leader,
                // so escalation signals reach its whole group.
                nix::unistd::setsid()?;
                Ok(())
            });
        }

        let mut child = cmd.spawn().map_err(|e| ExecutorError::Spawn {
            path: self.target.clone(),
            source: e,
        })?;
        // The Command still holds the parent's copies of the pipe write
        // ends; drop it so the drain thread sees EOF once the child dies.
        drop(cmd);

        let drain = {
            let journal = Arc::clone(journal);
            let reader = BufReader::new(File::from(merged_read));
            thread::spawn(move || drain_output(reader, journal))
        };

        let mut stdin = child.stdin.take();
        let outcome = self.drive(&mut child, stdin.as_mut(), commands, journal);

        // Finalization is unconditional: stdin closes first so a live
        // target sees EOF, then the child is collected and the drain
        // thread joined, on the error routes as well.
        drop(stdin);
        let reaped = self.reap(&mut child);
        let _ = drain.join();
        let outcome = outcome?;
        reaped?;
        Ok(outcome)
    }

    /// The attempt body: warm up, feed commands, await a natural exit,
    /// escalate if the target hangs. Cleanup is the caller's job.
    fn drive(
        &self,
        child: &mut Child,
        stdin: Option<&mut ChildStdin>,
        commands: &[String],
        journal: &AttemptJournal,
    ) -> Result<AttemptOutcome, ExecutorError> {
        thread::sleep(self.timings.warmup);

        let mut natural: Option<ExitStatus> = None;
        if let Some(pipe) = stdin {
            for command in commands {
                if let Some(status) = child.try_wait()? {
                    natural = Some(status);
                    break;
                }
                // A failed write means the pipe closed under us because the
                // child exited; stop feeding, the grace poll below settles it.
                if write_command(pipe, command).is_err() {
                    break;
                }
                journal.echo_input(command)?;
                thread::sleep(self.timings.command_delay);
            }
        }

        if natural.is_none() {
            natural = wait_for_exit(child, self.timings.finish_grace, self.timings.poll_interval)?;
        }

        match natural {
            Some(status) => Ok(AttemptOutcome::Finished(exit_code(status))),
            None => {
                let escalator =
                    SignalEscalator::new(self.timings.stage_wait, self.timings.poll_interval);
                escalator.run(child)?;
                Ok(AttemptOutcome::NotFinished)
            }
        }
    }

    /// Collects the child on every path, falling back to a direct kill if
    /// even SIGKILL to the group did not take.
    fn reap(&self, child: &mut Child) -> io::Result<()> {
        if wait_for_exit(child, Duration::from_secs(2), self.timings.poll_interval)?.is_none() {
            let _ = child.kill();
            child.wait()?;
        }
        Ok(())
    }
}

/// The exit code recorded for a natural finish. Deaths by signal are
/// reported as the negated signal number.
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|s| -s))
        .unwrap_or(-1)
}

fn write_command(stdin: &mut ChildStdin, command: &str) -> io::Result<()> {
    stdin.write_all(command.as_bytes())?;
    stdin.write_all(b"\n")?;
    stdin.flush()
}

/// Drains the merged output stream line by line into the journal until it
/// closes. Read errors (broken pipe on termination) are end-of-stream, not
/// failures.
fn drain_output(reader: impl BufRead, journal: Arc<AttemptJournal>) {
    for line in reader.lines() {
        let Ok(line) = line else { break };
        if journal.append_output(&line).is_err() {
            break;
        }
    }
}
