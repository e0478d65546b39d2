//! Execution environments for the system under test.
//!
//! This module provides the [`ContainerRuntime`] trait for container lifecycle
//! operations and the [`DockerRuntime`] implementation backed by the Docker
//! Engine API.

mod docker;
mod provider;

pub use docker::DockerRuntime;
pub use provider::{
    ContainerRuntime, ContainerSpec, CreatedContainer, HostBinding, LogChunk, LogStream,
};
