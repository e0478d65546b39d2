//! Test suite execution.
//!
//! The suite runs as a child process (by default `cargo test`) with inherited
//! stdio, so its output and exit status are the session's.

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::SessionConfig;
use crate::error::{Error, Result};

/// Environment variable carrying the project id to the suite.
pub const PROJECT_ID_VAR: &str = "PROJECT_ID";

/// Environment variable carrying the service port to the suite.
pub const PORT_VAR: &str = "PORT";

/// Environment variable carrying the service base URL to the suite.
pub const BASE_URL_VAR: &str = "E2E_BASE_URL";

/// Exit status of a suite run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuiteOutcome {
    /// Exit code, or `None` if the runner was killed by a signal.
    pub exit_code: Option<i32>,
}

impl SuiteOutcome {
    pub fn passed() -> Self {
        Self { exit_code: Some(0) }
    }

    pub fn failed(code: i32) -> Self {
        Self {
            exit_code: Some(code),
        }
    }

    /// Returns true if every test passed.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Process exit code to report; signal deaths map to 1.
    pub fn process_exit_code(&self) -> i32 {
        self.exit_code.unwrap_or(1)
    }
}

/// Runs the test suite against a ready environment.
#[async_trait]
pub trait SuiteExecutor: Send + Sync {
    /// Executes the suite and waits for it to finish.
    async fn execute(&self, config: &SessionConfig) -> Result<SuiteOutcome>;

    /// Returns the name of this executor.
    fn name(&self) -> &str;
}

/// Executor that runs the configured suite command as a child process.
#[derive(Debug, Clone, Default)]
pub struct CommandSuite;

impl CommandSuite {
    pub fn new() -> Self {
        Self
    }

    /// Builds the argument list: the suite command followed by the
    /// pass-through flags, separated by `--` unless the command already
    /// contains one.
    pub fn build_args(config: &SessionConfig) -> Vec<String> {
        let mut args: Vec<String> = config.suite_command.iter().skip(1).cloned().collect();

        if !config.test_flags.is_empty() {
            if !args.iter().any(|a| a == "--") {
                args.push("--".to_string());
            }
            args.extend(config.test_flags.iter().cloned());
        }

        args
    }
}

#[async_trait]
impl SuiteExecutor for CommandSuite {
    async fn execute(&self, config: &SessionConfig) -> Result<SuiteOutcome> {
        let program = config
            .suite_command
            .first()
            .ok_or_else(|| Error::Suite("suite command is empty".to_string()))?;
        let args = Self::build_args(config);

        tracing::info!(program = %program, args = ?args, "running test suite");

        let status = Command::new(program)
            .args(&args)
            .env(PROJECT_ID_VAR, &config.project_id)
            .env(PORT_VAR, &config.port)
            .env(BASE_URL_VAR, config.base_url())
            .status()
            .await
            .map_err(|e| Error::Suite(format!("failed to run {}: {}", program, e)))?;

        Ok(SuiteOutcome {
            exit_code: status.code(),
        })
    }

    fn name(&self) -> &str {
        "command"
    }
}
