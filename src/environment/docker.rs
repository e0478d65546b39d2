//! Docker Engine backend for [`ContainerRuntime`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::models::{HostConfig, PortBinding};
use bollard::Docker;
use futures::StreamExt;

use crate::error::{Error, Result};

use super::provider::{ContainerRuntime, ContainerSpec, CreatedContainer, LogChunk, LogStream};

/// Container runtime talking to the local Docker daemon.
#[derive(Clone)]
pub struct DockerRuntime {
    client: Docker,
}

impl DockerRuntime {
    /// Connects using the standard environment (`DOCKER_HOST`, `DOCKER_CERT_PATH`, ...),
    /// falling back to the platform's default socket.
    ///
    /// This does not contact the daemon; an unreachable daemon surfaces on
    /// the first lifecycle call.
    pub fn connect() -> Result<Self> {
        let client =
            Docker::connect_with_defaults().map_err(|e| Error::Connect(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn with_client(client: Docker) -> Self {
        Self { client }
    }

    fn build_config(spec: &ContainerSpec) -> Config<String> {
        let exposed_ports = spec
            .port_bindings
            .keys()
            .map(|port| (port.clone(), HashMap::new()))
            .collect();

        let port_bindings = spec
            .port_bindings
            .iter()
            .map(|(port, binding)| {
                (
                    port.clone(),
                    Some(vec![PortBinding {
                        host_ip: Some(binding.host_ip.clone()),
                        host_port: Some(binding.host_port.clone()),
                    }]),
                )
            })
            .collect();

        Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            exposed_ports: Some(exposed_ports),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Whole seconds the daemon waits before killing the container, saturating at `i64::MAX`.
fn stop_timeout_secs(grace: Duration) -> i64 {
    i64::try_from(grace.as_secs()).unwrap_or(i64::MAX)
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn create(&self, spec: &ContainerSpec) -> Result<CreatedContainer> {
        let options = spec.name.clone().map(|name| CreateContainerOptions {
            name,
            platform: None,
        });

        let response = self
            .client
            .create_container(options, Self::build_config(spec))
            .await
            .map_err(|e| Error::ContainerCreate {
                image: spec.image.clone(),
                reason: e.to_string(),
            })?;

        Ok(CreatedContainer {
            id: response.id,
            warnings: response.warnings,
        })
    }

    async fn start(&self, id: &str) -> Result<()> {
        self.client
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Error::ContainerStart {
                id: id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn logs(&self, id: &str) -> Result<LogStream> {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            tail: "all".to_string(),
            ..Default::default()
        };

        let container_id = id.to_string();
        let stream = self
            .client
            .logs(id, Some(options))
            .filter_map(move |item| {
                let chunk = match item {
                    Ok(LogOutput::StdOut { message }) | Ok(LogOutput::Console { message }) => {
                        Some(Ok(LogChunk::Stdout(message.to_vec())))
                    }
                    Ok(LogOutput::StdErr { message }) => {
                        Some(Ok(LogChunk::Stderr(message.to_vec())))
                    }
                    Ok(LogOutput::StdIn { .. }) => None,
                    Err(e) => Some(Err(Error::ContainerLogs {
                        id: container_id.clone(),
                        reason: e.to_string(),
                    })),
                };
                futures::future::ready(chunk)
            })
            .boxed();

        Ok(stream)
    }

    async fn stop(&self, id: &str, grace: Duration) -> Result<()> {
        let options = StopContainerOptions {
            t: stop_timeout_secs(grace),
        };

        self.client
            .stop_container(id, Some(options))
            .await
            .map_err(|e| Error::ContainerStop {
                id: id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.client
            .remove_container(id, None::<RemoveContainerOptions>)
            .await
            .map_err(|e| Error::ContainerRemove {
                id: id.to_string(),
                reason: e.to_string(),
            })
    }
}
