use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use std::io;
use std::process::{Child, ExitStatus};
use std::time::{Duration, Instant};

/// Polls a child's liveness in `step` increments for at most `window`.
///
/// Returns the exit status if the child exits within the window, `None`
/// if the window elapses with the child still alive.
pub fn wait_for_exit(
    child: &mut Child,
    window: Duration,
    step: Duration,
) -> io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= window {
            return Ok(None);
        }
        std::thread::sleep(step);
    }
}

/// Force-terminates a hung process group with the least aggressive signal
/// that works.
///
/// Stages run strictly in sequence: SIGINT, then SIGTERM, then SIGKILL,
/// each sent to the whole process group and each followed by a bounded
/// wait of `stage_wait`. A later stage is only reached after the prior
/// stage's full wait elapsed with the process still alive. The SIGKILL
/// wait is best-effort; there is no further escalation.
///
/// An exit observed here never counts as a natural finish; the caller
/// classifies the attempt `NotFinished` regardless of the exit code.
#[derive(Debug, Clone, Copy)]
pub struct SignalEscalator {
    pub stage_wait: Duration,
    pub poll_interval: Duration,
}

const STAGES: [Signal; 3] = [Signal::SIGINT, Signal::SIGTERM, Signal::SIGKILL];

impl SignalEscalator {
    pub fn new(stage_wait: Duration, poll_interval: Duration) -> Self {
        Self {
            stage_wait,
            poll_interval,
        }
    }

    /// Runs the escalation sequence against `child`'s process group.
    ///
    /// The child must have been spawned as a group leader, so its pid is
    /// also the pgid. Returns once an exit is observed or the final
    /// SIGKILL wait elapses.
    pub fn run(&self, child: &mut Child) -> io::Result<()> {
        let pgid = Pid::from_raw(child.id() as i32);

        for signal in STAGES {
            match killpg(pgid, signal) {
                Ok(()) => {}
                // The group vanished between the liveness check and the
                // signal: the process already exited, nothing left to do.
                Err(Errno::ESRCH) => return Ok(()),
                Err(e) => {
                    eprintln!("Failed to send {signal} to process group {pgid}: {e}");
                }
            }
            if wait_for_exit(child, self.stage_wait, self.poll_interval)?.is_some() {
                return Ok(());
            }
        }
        Ok(())
    }
}
