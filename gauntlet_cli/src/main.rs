use gauntlet_core::config::GauntletConfig;
use gauntlet_core::runner::{AttemptRunner, RunReport};

use clap::Parser;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use std::path::PathBuf;

/// Exit code for precondition failures, before any attempt runs.
const USAGE_ERROR: i32 = 2;

#[derive(Parser, Debug)]
#[clap(author, version, long_about = None)]
#[clap(
    about = "Headless runner: feed random commands to a console program, stop after the first attempt that finishes naturally (log saved only then)."
)]
struct Cli {
    /// Path of the target executable to run.
    target: PathBuf,
    /// Maximum number of commands to send per attempt.
    max_commands: Option<usize>,
    /// Maximum number of attempts.
    attempts: Option<u32>,
    /// Milliseconds to wait after writing each command.
    #[clap(long)]
    delay_ms: Option<u64>,
    /// Milliseconds to allow the target to exit on its own after feeding input.
    #[clap(long)]
    finish_grace_ms: Option<u64>,
    /// Working directory to launch the target in.
    #[clap(long)]
    cwd: Option<PathBuf>,
    /// Fixed RNG seed, for reproducible runs.
    #[clap(long)]
    seed: Option<u64>,
    #[clap(short, long, value_parser)]
    config_file: Option<PathBuf>,
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    let config = match &cli.config_file {
        Some(config_path) => GauntletConfig::load_from_file(config_path)?,
        None => {
            let default_config_path = PathBuf::from("config.toml");
            if default_config_path.exists() {
                GauntletConfig::load_from_file(&default_config_path)?
            } else {
                GauntletConfig::default()
            }
        }
    };

    let mut settings = config.runner.unwrap_or_default();
    if let Some(max_commands) = cli.max_commands {
        settings.max_commands = max_commands;
    }
    if let Some(attempts) = cli.attempts {
        settings.max_attempts = attempts;
    }
    if let Some(delay_ms) = cli.delay_ms {
        settings.command_delay_ms = delay_ms;
    }
    if let Some(finish_grace_ms) = cli.finish_grace_ms {
        settings.finish_grace_ms = finish_grace_ms;
    }
    if cli.cwd.is_some() {
        settings.working_dir = cli.cwd;
    }
    if cli.seed.is_some() {
        settings.seed = cli.seed;
    }

    let runner = match AttemptRunner::new(cli.target, &settings) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(USAGE_ERROR);
        }
    };

    let mut rng = match settings.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::seed_from_u64(rand::random::<u64>()),
    };

    match runner.run(&mut rng)? {
        RunReport::Success { attempt, log_path } => {
            println!(
                "[success] attempt {attempt} - saved log to: {}",
                log_path.display()
            );
            Ok(())
        }
        RunReport::Exhausted { .. } => {
            println!("[no-success] all attempts ended without a natural finish; no logs saved.");
            std::process::exit(1);
        }
    }
}
