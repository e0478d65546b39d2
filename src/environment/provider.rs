//! Container runtime trait and types.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::{SessionConfig, HOST_BIND_ADDRESS};
use crate::error::Result;

/// Everything needed to create the container for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Image to create the container from.
    pub image: String,
    /// Container name, if any.
    pub name: Option<String>,
    /// Environment variables in `KEY=value` form.
    pub env: Vec<String>,
    /// Exposed container port (`<port>/tcp`) mapped to its host binding.
    pub port_bindings: HashMap<String, HostBinding>,
}

/// Host side of a port binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBinding {
    pub host_ip: String,
    pub host_port: String,
}

impl ContainerSpec {
    /// Builds the spec for a session: the configured port is exposed, bound to
    /// the same port on all host interfaces, and injected as `PORT`.
    pub fn for_session(config: &SessionConfig) -> Self {
        let short_id = &uuid::Uuid::new_v4().simple().to_string()[..8];
        let binding = HostBinding {
            host_ip: HOST_BIND_ADDRESS.to_string(),
            host_port: config.port.clone(),
        };

        Self {
            image: config.image.clone(),
            name: Some(format!("{}-{}", config.name_prefix, short_id)),
            env: vec![format!("PORT={}", config.port)],
            port_bindings: HashMap::from([(format!("{}/tcp", config.port), binding)]),
        }
    }
}

/// Response to a successful create.
#[derive(Debug, Clone, Default)]
pub struct CreatedContainer {
    /// Runtime-assigned container id.
    pub id: String,
    /// Warnings reported by the runtime.
    pub warnings: Vec<String>,
}

/// One demultiplexed chunk of container output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogChunk {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

/// Follow-mode stream of container output.
pub type LogStream = BoxStream<'static, Result<LogChunk>>;

/// Lifecycle operations against a container runtime.
///
/// Every call blocks (asynchronously) until the runtime confirms the
/// operation. Implementations map runtime failures onto the matching
/// [`crate::Error`] variant.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Creates a container without starting it.
    async fn create(&self, spec: &ContainerSpec) -> Result<CreatedContainer>;

    /// Starts a created container.
    async fn start(&self, id: &str) -> Result<()>;

    /// Attaches to the combined stdout/stderr stream in follow mode.
    async fn logs(&self, id: &str) -> Result<LogStream>;

    /// Stops a running container, killing it after `grace`.
    async fn stop(&self, id: &str, grace: Duration) -> Result<()>;

    /// Removes a stopped or never-started container.
    async fn remove(&self, id: &str) -> Result<()>;
}
