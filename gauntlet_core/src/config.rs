use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Settings for the randomized attempt runner.
///
/// All durations are stored as milliseconds in the TOML file and exposed
/// as [`Duration`] accessors.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct RunnerSettings {
    /// Maximum number of commands written to the target per attempt.
    #[serde(default = "default_max_commands")]
    pub max_commands: usize,
    /// Maximum number of attempts before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first command, so the target can initialize.
    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,
    /// Delay after each command write.
    #[serde(default = "default_command_delay_ms")]
    pub command_delay_ms: u64,
    /// How long to wait for a natural exit after the last command.
    #[serde(default = "default_finish_grace_ms")]
    pub finish_grace_ms: u64,
    /// Liveness polling step.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Bounded wait after each escalation signal.
    #[serde(default = "default_stage_wait_ms")]
    pub stage_wait_ms: u64,
    /// Working directory the target is launched in.
    pub working_dir: Option<PathBuf>,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

pub fn default_max_commands() -> usize {
    200
}
pub fn default_max_attempts() -> u32 {
    10
}
fn default_warmup_ms() -> u64 {
    1000
}
fn default_command_delay_ms() -> u64 {
    10
}
fn default_finish_grace_ms() -> u64 {
    400
}
fn default_poll_interval_ms() -> u64 {
    50
}
fn default_stage_wait_ms() -> u64 {
    1000
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            max_commands: default_max_commands(),
            max_attempts: default_max_attempts(),
            warmup_ms: default_warmup_ms(),
            command_delay_ms: default_command_delay_ms(),
            finish_grace_ms: default_finish_grace_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            stage_wait_ms: default_stage_wait_ms(),
            working_dir: None,
            seed: None,
        }
    }
}

impl RunnerSettings {
    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }
    pub fn command_delay(&self) -> Duration {
        Duration::from_millis(self.command_delay_ms)
    }
    pub fn finish_grace(&self) -> Duration {
        Duration::from_millis(self.finish_grace_ms)
    }
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
    pub fn stage_wait(&self) -> Duration {
        Duration::from_millis(self.stage_wait_ms)
    }
}

/// Settings for the deterministic replay checker.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct CheckerSettings {
    /// Overall time the target gets to exit after the payload is delivered.
    #[serde(default = "default_check_timeout_ms")]
    pub timeout_ms: u64,
}

pub fn default_check_timeout_ms() -> u64 {
    250
}

impl Default for CheckerSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_check_timeout_ms(),
        }
    }
}

impl CheckerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct GauntletConfig {
    #[serde(default)]
    pub runner: Option<RunnerSettings>,
    #[serde(default)]
    pub checker: Option<CheckerSettings>,
}

impl GauntletConfig {
    pub fn load_from_file(path: &PathBuf) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;

        let config: GauntletConfig = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_config_yields_no_sections() {
        let config: GauntletConfig = toml::from_str("").unwrap();
        assert!(config.runner.is_none());
        assert!(config.checker.is_none());
    }

    #[test]
    fn runner_section_fills_unset_fields_with_defaults() {
        let config: GauntletConfig = toml::from_str(
            r#"
            [runner]
            max-commands = 50
            command-delay-ms = 5
            "#,
        )
        .unwrap();

        let runner = config.runner.expect("runner section should be present");
        assert_eq!(runner.max_commands, 50);
        assert_eq!(runner.command_delay(), Duration::from_millis(5));
        assert_eq!(runner.max_attempts, default_max_attempts());
        assert_eq!(runner.finish_grace(), Duration::from_millis(400));
        assert_eq!(runner.stage_wait(), Duration::from_millis(1000));
        assert!(runner.seed.is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<GauntletConfig, _> = toml::from_str(
            r#"
            [runner]
            max-comands = 50
            "#,
        );
        assert!(result.is_err(), "typoed key should fail deserialization");
    }

    #[test]
    fn load_from_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[checker]\ntimeout-ms = 900").unwrap();

        let config = GauntletConfig::load_from_file(&path).unwrap();
        let checker = config.checker.expect("checker section should be present");
        assert_eq!(checker.timeout(), Duration::from_millis(900));
    }

    #[test]
    fn load_from_missing_file_is_an_error() {
        let path = PathBuf::from("/nonexistent/gauntlet/config.toml");
        assert!(GauntletConfig::load_from_file(&path).is_err());
    }
}
