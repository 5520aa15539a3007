use gauntlet_core::checker::{CheckError, CheckOutcome, SolutionChecker};
use gauntlet_core::config::GauntletConfig;
use gauntlet_core::pool::CommandPool;

use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

#[derive(Parser, Debug)]
#[clap(author, version, long_about = None)]
#[clap(about = "Feed the fixed solution script to a console program and report if it finished.")]
struct Cli {
    /// Path to the target executable.
    target: PathBuf,
    /// Milliseconds to wait for the target to exit after sending input.
    #[clap(long)]
    timeout_ms: Option<u64>,
    #[clap(short, long, value_parser)]
    config_file: Option<PathBuf>,
}

fn report(stream: &mut StandardStream, color: Color, message: &str) {
    let _ = stream.set_color(ColorSpec::new().set_fg(Some(color)));
    let _ = writeln!(stream, "{message}");
    let _ = stream.reset();
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

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

    let mut settings = config.checker.unwrap_or_default();
    if let Some(timeout_ms) = cli.timeout_ms {
        settings.timeout_ms = timeout_ms;
    }

    let solution_path = CommandPool::solution_path_for(&cli.target);
    let pool = match CommandPool::load(&solution_path) {
        Ok(pool) => pool,
        Err(e) => {
            report(&mut stdout, Color::Red, &format!("ERROR: {e}"));
            std::process::exit(2);
        }
    };

    let checker = SolutionChecker::new(cli.target, settings.timeout());
    match checker.run(&pool) {
        Ok(CheckOutcome::Exited(code)) => {
            report(&mut stdout, Color::Green, "SUCCESS!");
            // Mirror the target's own exit code when it is nonzero.
            std::process::exit(code);
        }
        Ok(CheckOutcome::TimedOut) => {
            report(&mut stdout, Color::Yellow, "TARGET NOT FINISHED");
            std::process::exit(1);
        }
        Err(CheckError::TargetNotFound(path)) => {
            report(
                &mut stdout,
                Color::Red,
                &format!("ERROR: target not found: {}", path.display()),
            );
            std::process::exit(2);
        }
        Err(e) => Err(e.into()),
    }
}
