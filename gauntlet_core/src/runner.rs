use crate::config::RunnerSettings;
use crate::executor::{AttemptTimings, ExecutorError, TargetExecutor};
use crate::journal::AttemptJournal;
use crate::pool::{CommandPool, PoolError};
use rand_core::RngCore;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors that abort the run before or during the attempt loop.
///
/// Forced terminations are not errors; they are
/// [`crate::executor::AttemptOutcome::NotFinished`] and simply consume an
/// attempt.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Target executable not found: {0:?}")]
    TargetNotFound(PathBuf),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error("Attempt log I/O failed: {0}")]
    Journal(#[from] std::io::Error),
}

/// Overall verdict of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    /// Some attempt finished naturally; its log was promoted to `log_path`.
    Success { attempt: u32, log_path: PathBuf },
    /// Every attempt was exhausted without a natural finish. No log file
    /// exists on disk.
    Exhausted { attempts: u32 },
}

/// Repeats the full attempt cycle up to a bound, stopping at the first
/// natural finish.
#[derive(Debug)]
pub struct AttemptRunner {
    target: PathBuf,
    pool: CommandPool,
    executor: TargetExecutor,
    max_commands: usize,
    max_attempts: u32,
}

impl AttemptRunner {
    /// Validates preconditions once, before any attempt: the target must
    /// exist and its command pool must yield at least one usable command.
    pub fn new(target: PathBuf, settings: &RunnerSettings) -> Result<Self, RunnerError> {
        if !target.exists() {
            return Err(RunnerError::TargetNotFound(target));
        }
        let pool = CommandPool::load(&CommandPool::inputs_path_for(&target))?;
        let executor = TargetExecutor::new(
            target.clone(),
            settings.working_dir.clone(),
            AttemptTimings::from(settings),
        );
        Ok(Self {
            target,
            pool,
            executor,
            max_commands: settings.max_commands,
            max_attempts: settings.max_attempts,
        })
    }

    pub fn pool(&self) -> &CommandPool {
        &self.pool
    }

    /// Runs attempts until one finishes naturally or the bound is hit.
    ///
    /// Each attempt gets a fresh command sequence drawn from the pool with
    /// the injected RNG, so a fixed seed reproduces the whole run.
    pub fn run(&self, rng: &mut dyn RngCore) -> Result<RunReport, RunnerError> {
        for attempt in 1..=self.max_attempts {
            println!("[attempt {attempt}] starting...");
            let commands = self.pool.sample_sequence(self.max_commands, rng);
            let journal = Arc::new(AttemptJournal::begin(&self.target)?);

            let outcome = self.executor.run_attempt(&commands, &journal)?;
            let promoted = journal.finish(&outcome)?;

            if let Some(log_path) = promoted {
                return Ok(RunReport::Success { attempt, log_path });
            }
        }
        Ok(RunReport::Exhausted {
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn script_target(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("game.sh");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn write_pool(target: &Path, content: &str) {
        fs::write(CommandPool::inputs_path_for(target), content).unwrap();
    }

    fn fast_settings(max_commands: usize, max_attempts: u32) -> RunnerSettings {
        RunnerSettings {
            max_commands,
            max_attempts,
            warmup_ms: 20,
            command_delay_ms: 1,
            finish_grace_ms: 300,
            poll_interval_ms: 10,
            stage_wait_ms: 200,
            working_dir: None,
            seed: None,
        }
    }

    fn seeded_rng() -> ChaCha8Rng {
        ChaCha8Rng::from_seed([9u8; 32])
    }

    #[test]
    fn immediate_exit_succeeds_on_the_first_attempt() {
        // Pool {x, y}, five commands, one attempt, target ignores all
        // input and exits 0 right away.
        let dir = tempfile::tempdir().unwrap();
        let target = script_target(dir.path(), "exit 0");
        write_pool(&target, "x\ny\n");

        let runner = AttemptRunner::new(target.clone(), &fast_settings(5, 1)).unwrap();
        let report = runner.run(&mut seeded_rng()).unwrap();

        let expected_log = journal::log_path_for(&target);
        match report {
            RunReport::Success { attempt, log_path } => {
                assert_eq!(attempt, 1);
                assert_eq!(log_path, expected_log);
            }
            other => panic!("Expected success, got {other:?}"),
        }

        let content = fs::read_to_string(&expected_log).unwrap();
        assert!(content.starts_with("%% [SESSION START]\n"));
        assert!(content.ends_with("%% [SESSION FINISHED rc=0]\n"));
    }

    #[test]
    fn hung_target_exhausts_all_attempts_and_leaves_no_log() {
        let dir = tempfile::tempdir().unwrap();
        let target = script_target(dir.path(), "sleep 30");
        write_pool(&target, "x\n");

        let runner = AttemptRunner::new(target.clone(), &fast_settings(2, 2)).unwrap();
        let report = runner.run(&mut seeded_rng()).unwrap();

        assert_eq!(report, RunReport::Exhausted { attempts: 2 });
        assert!(!journal::log_path_for(&target).exists());
    }

    #[test]
    fn missing_target_fails_before_any_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing.sh");

        match AttemptRunner::new(target.clone(), &fast_settings(5, 1)) {
            Err(RunnerError::TargetNotFound(p)) => assert_eq!(p, target),
            other => panic!("Expected TargetNotFound, got {other:?}"),
        }
    }

    #[test]
    fn comment_only_pool_fails_before_any_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let target = script_target(dir.path(), "exit 0");
        write_pool(&target, "# nothing here\n\n   \n");

        match AttemptRunner::new(target, &fast_settings(5, 1)) {
            Err(RunnerError::Pool(PoolError::Empty(_))) => {}
            other => panic!("Expected an empty-pool error, got {other:?}"),
        }
    }

    #[test]
    fn run_stops_at_the_first_finished_attempt() {
        let dir = tempfile::tempdir().unwrap();
        // The target appends to a side file on every spawn, so we can
        // count how many attempts actually executed.
        let spawn_log = dir.path().join("spawns");
        let target = script_target(
            dir.path(),
            &format!("echo spawned >> {}\nexit 0", spawn_log.display()),
        );
        write_pool(&target, "x\n");

        let runner = AttemptRunner::new(target, &fast_settings(3, 5)).unwrap();
        let report = runner.run(&mut seeded_rng()).unwrap();

        assert!(matches!(report, RunReport::Success { attempt: 1, .. }));
        let spawns = fs::read_to_string(&spawn_log).unwrap();
        assert_eq!(spawns.lines().count(), 1, "later attempts must not run");
    }
}
