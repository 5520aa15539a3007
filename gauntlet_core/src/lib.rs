pub mod checker;
pub mod config;
pub mod executor;
pub mod journal;
pub mod pool;
pub mod runner;
pub mod signal;

pub use checker::{CheckError, CheckOutcome, SolutionChecker};
pub use config::{CheckerSettings, GauntletConfig, RunnerSettings};
pub use executor::{AttemptOutcome, AttemptTimings, ExecutorError, TargetExecutor};
pub use journal::AttemptJournal;
pub use pool::{CommandPool, PoolError};
pub use runner::{AttemptRunner, RunReport, RunnerError};
pub use signal::SignalEscalator;
