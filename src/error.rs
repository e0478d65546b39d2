//! Error types for the e2e test bootstrap.

use thiserror::Error;

/// Top-level error type for session operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Could not reach the container runtime.
    #[error("failed to connect to container runtime: {0}")]
    Connect(String),

    /// Failed to create the container.
    #[error("failed to create container from image {image}: {reason}")]
    ContainerCreate { image: String, reason: String },

    /// Failed to start a created container.
    #[error("failed to start container {id}: {reason}")]
    ContainerStart { id: String, reason: String },

    /// Failed to attach to the container's log stream.
    #[error("failed to read logs of container {id}: {reason}")]
    ContainerLogs { id: String, reason: String },

    /// Failed to stop the container during teardown.
    #[error("failed to stop container {id}: {reason}")]
    ContainerStop { id: String, reason: String },

    /// Failed to remove the container during teardown.
    #[error("failed to remove container {id}: {reason}")]
    ContainerRemove { id: String, reason: String },

    /// The test suite could not be launched.
    #[error("test suite error: {0}")]
    Suite(String),

    /// Invalid invocation parameters.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true if this error must abort the process rather than
    /// produce a normal exit code.
    ///
    /// Everything that touches the container lifecycle is fatal: a container
    /// that cannot be created, started, or torn down leaves the host in a
    /// state the harness does not try to recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Connect(_)
                | Error::ContainerCreate { .. }
                | Error::ContainerStart { .. }
                | Error::ContainerLogs { .. }
                | Error::ContainerStop { .. }
                | Error::ContainerRemove { .. }
        )
    }

    /// Returns true if this error happened while tearing the container down.
    pub fn is_teardown(&self) -> bool {
        matches!(
            self,
            Error::ContainerStop { .. } | Error::ContainerRemove { .. }
        )
    }
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
