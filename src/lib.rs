//! e2e-testing - end-to-end test bootstrap
//!
//! This library deploys the system under test into a single Docker container,
//! streams its logs, runs the test suite against it once it has had time to
//! start, and tears the container down afterward.

pub mod cleanup;
pub mod config;
pub mod environment;
pub mod error;
pub mod logs;
pub mod session;
pub mod suite;

#[cfg(test)]
pub(crate) mod testing;

pub use cleanup::Cleanup;
pub use config::{Cli, LocalCmd, Mode, SessionConfig, Target, Validate, ValidationResult};
pub use environment::{ContainerRuntime, ContainerSpec, DockerRuntime, LogChunk};
pub use error::{Error, Result};
pub use logs::{ForwardStats, LogForwarder};
pub use session::{Environment, Session, SessionOutcome, SetupFailure};
pub use suite::{CommandSuite, SuiteExecutor, SuiteOutcome};
