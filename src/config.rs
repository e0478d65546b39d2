//! Command-line parameters and session configuration.
//!
//! The CLI is parsed exactly once at startup into a [`Cli`], converted into an
//! immutable [`SessionConfig`], validated, and handed to the session by value.

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::error::{Error, Result};

/// Port used when `--port` is not given.
pub const DEFAULT_PORT: &str = "8000";

/// Fixed pause between container start and suite execution.
pub const DEFAULT_READINESS_DELAY: Duration = Duration::from_secs(5);

/// Grace period given to the container to stop before it is killed.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(15);

/// Command used to run the test suite.
pub const DEFAULT_SUITE_COMMAND: &str = "cargo test";

/// Prefix for generated container names.
pub const DEFAULT_NAME_PREFIX: &str = "e2e";

/// Host interface the container port is bound to.
pub const HOST_BIND_ADDRESS: &str = "0.0.0.0";

/// Deploys the system under test and runs the end-to-end suite against it.
#[derive(Debug, Parser)]
#[command(name = "e2e-testing")]
#[command(version)]
#[command(after_help = "EXAMPLES:
    e2e-testing --project-id demo local --image myapp:test
    e2e-testing --test-flags='--nocapture smoke' local --image myapp:test --port 9000

ENVIRONMENT VARIABLES:
    PROJECT_ID   Project id/name (instead of --project-id)
    RUST_LOG     Log filter for the bootstrap itself")]
pub struct Cli {
    #[command(subcommand)]
    pub target: Target,

    /// Test flags to pass through to the test runner, e.g. --test-flags='--nocapture'
    #[arg(long, global = true, allow_hyphen_values = true, default_value = "")]
    pub test_flags: String,

    /// Project id/name (required)
    // Optional to clap because global args cannot be required; enforced in `SessionConfig::from_cli`.
    #[arg(long, global = true, env = "PROJECT_ID")]
    pub project_id: Option<String>,

    /// Command that runs the test suite
    #[arg(long, global = true, allow_hyphen_values = true, default_value = DEFAULT_SUITE_COMMAND)]
    pub suite_cmd: String,

    /// Prefix for the container name
    #[arg(long, global = true, default_value = DEFAULT_NAME_PREFIX)]
    pub name_prefix: String,
}

/// Environment the system under test is deployed to.
#[derive(Debug, Subcommand)]
pub enum Target {
    /// Run the system under test in a Docker container on the local host
    Local(LocalCmd),
}

/// Parameters of the `local` target.
#[derive(Debug, Args)]
pub struct LocalCmd {
    /// Docker container image to deploy and test
    #[arg(long)]
    pub image: String,

    /// Port the service listens on; bound to the same port on the host
    #[arg(long, default_value = DEFAULT_PORT)]
    pub port: String,
}

/// Deployment mode of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Local,
}

/// Immutable configuration for one test session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionConfig {
    /// Deployment mode.
    pub mode: Mode,
    /// Project id/name, exported to the suite.
    pub project_id: String,
    /// Image the container is created from.
    pub image: String,
    /// Port exposed by the container and bound on the host.
    pub port: String,
    /// Extra arguments for the test runner.
    pub test_flags: Vec<String>,
    /// Program and arguments that run the suite.
    pub suite_command: Vec<String>,
    /// Prefix for the generated container name.
    pub name_prefix: String,
    /// Pause between start and suite execution.
    pub readiness_delay: Duration,
    /// Grace period for stopping the container.
    pub stop_grace: Duration,
}

impl SessionConfig {
    /// Creates a local-mode configuration with default port, delays and suite command.
    pub fn new(project_id: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            mode: Mode::Local,
            project_id: project_id.into(),
            image: image.into(),
            port: DEFAULT_PORT.to_string(),
            test_flags: Vec::new(),
            suite_command: DEFAULT_SUITE_COMMAND
                .split_whitespace()
                .map(String::from)
                .collect(),
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            readiness_delay: DEFAULT_READINESS_DELAY,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    /// Builds the configuration from parsed command-line arguments.
    ///
    /// `--test-flags` and `--suite-cmd` are split shell-style. A missing
    /// project id is a configuration error.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let project_id = cli.project_id.ok_or_else(|| {
            Error::Config("--project-id (or PROJECT_ID) is required".to_string())
        })?;
        let test_flags = shell_words::split(&cli.test_flags)
            .map_err(|e| Error::Config(format!("invalid --test-flags: {}", e)))?;
        let suite_command = shell_words::split(&cli.suite_cmd)
            .map_err(|e| Error::Config(format!("invalid --suite-cmd: {}", e)))?;

        let config = match cli.target {
            Target::Local(local) => Self::new(project_id, local.image).with_port(local.port),
        };

        Ok(config
            .with_test_flags(test_flags)
            .with_suite_command(suite_command)
            .with_name_prefix(cli.name_prefix))
    }

    /// Sets the port.
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = port.into();
        self
    }

    /// Sets the pass-through test flags.
    pub fn with_test_flags(mut self, flags: Vec<String>) -> Self {
        self.test_flags = flags;
        self
    }

    /// Sets the suite command.
    pub fn with_suite_command(mut self, command: Vec<String>) -> Self {
        self.suite_command = command;
        self
    }

    /// Sets the container name prefix.
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Sets the readiness delay.
    pub fn with_readiness_delay(mut self, delay: Duration) -> Self {
        self.readiness_delay = delay;
        self
    }

    /// Sets the stop grace period.
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// URL the suite should use to reach the service.
    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

/// Validation result containing all found issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Fatal issues.
    pub errors: Vec<String>,
    /// Non-fatal issues.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Adds an error to the result.
    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Adds a warning to the result.
    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Converts to a Result, failing if there are errors.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(Error::Config(self.errors.join("; ")))
        }
    }
}

/// Trait for validatable configuration types.
pub trait Validate {
    /// Validates the configuration and returns any issues found.
    fn validate(&self) -> ValidationResult;
}

impl Validate for SessionConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.project_id.trim().is_empty() {
            result.add_error("project id cannot be empty");
        }

        if self.image.trim().is_empty() {
            result.add_error("image cannot be empty");
        } else if self.image.chars().any(char::is_whitespace) {
            result.add_error(format!("image '{}' contains whitespace", self.image));
        }

        match self.port.parse::<u16>() {
            Ok(0) | Err(_) => {
                result.add_error(format!("port '{}' is not a valid TCP port", self.port));
            }
            Ok(port) if port < 1024 => {
                result.add_warning(format!(
                    "port {} is privileged and may fail to bind on the host",
                    port
                ));
            }
            Ok(_) => {}
        }

        if self.suite_command.is_empty() {
            result.add_error("suite command cannot be empty");
        }

        if self.name_prefix.is_empty()
            || !self
                .name_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            result.add_error(format!(
                "name prefix '{}' is not a valid container name",
                self.name_prefix
            ));
        }

        // Docker only accepts whole seconds.
        if self.stop_grace.subsec_nanos() != 0 {
            result.add_warning("stop grace is rounded down to whole seconds");
        }

        result
    }
}
