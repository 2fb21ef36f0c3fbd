use clap::Args;
use color_eyre::eyre::{Result, WrapErr};
use powerflow_power::{PowerCli, PowerWorkflow, RetryPolicy, DEFAULT_POWER_CLI};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Agent configuration, read from an optional YAML file
///
/// ```yaml
/// power_cli: maas.power
/// search_path: /snap/maas/current/bin:/usr/bin
/// retry:
///   max_attempts: 3
///   initial_backoff: 1
///   max_backoff: 10
///   timeout: 60
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Power CLI executable name or path
    pub power_cli: String,

    /// Directories to search for the power CLI instead of `$PATH`
    pub search_path: Option<String>,

    /// Retry policy for power activities
    pub retry: RetryPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            power_cli: DEFAULT_POWER_CLI.to_string(),
            search_path: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// Command-line and environment overrides for [`AgentConfig`]
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// YAML configuration file
    #[arg(long, env = "POWERFLOW_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Power CLI executable name or path
    #[arg(long, env = "POWERFLOW_POWER_CLI", global = true)]
    pub power_cli: Option<String>,

    /// Timeout for each power CLI run, in seconds
    #[arg(long, env = "POWERFLOW_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Attempts per power operation before giving up
    #[arg(long, env = "POWERFLOW_MAX_ATTEMPTS", global = true)]
    pub max_attempts: Option<u32>,
}

impl AgentConfig {
    /// Load the configuration file, or defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml(&contents)
            .wrap_err_with(|| format!("Failed to parse config file {}", path.display()))?;

        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Apply command-line overrides on top of the file settings
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(power_cli) = &overrides.power_cli {
            self.power_cli = power_cli.clone();
        }
        if let Some(timeout) = overrides.timeout {
            self.retry = self.retry.with_timeout(Duration::from_secs(timeout));
        }
        if let Some(max_attempts) = overrides.max_attempts {
            self.retry = self.retry.with_max_attempts(max_attempts);
        }
        self
    }

    /// Build the power workflow runner described by this configuration
    pub fn workflow(&self) -> PowerWorkflow<PowerCli> {
        let mut cli = PowerCli::with_program(&self.power_cli);
        if let Some(search_path) = &self.search_path {
            cli = cli.with_search_path(search_path);
        }
        PowerWorkflow::new(cli).with_retry_policy(self.retry.clone())
    }
}
