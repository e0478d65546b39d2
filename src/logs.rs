//! Background forwarding of container logs to the console.
//!
//! The forwarder runs as its own tokio task alongside the readiness wait and
//! the suite. Read errors end the task with a warning; they never reach the
//! session.

use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;

use crate::environment::{LogChunk, LogStream};

/// What a forwarder moved before its stream ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStats {
    /// Bytes copied to stdout.
    pub stdout_bytes: u64,
    /// Bytes copied to stderr.
    pub stderr_bytes: u64,
    /// Whether the stream ended with a read error.
    pub read_error: bool,
}

/// Handle to a spawned log-forwarding task.
///
/// The handle is kept so shutdown can wait for the tail of the logs; the
/// task otherwise ends on its own when the container is removed.
pub struct LogForwarder {
    container_id: String,
    handle: JoinHandle<ForwardStats>,
}

impl LogForwarder {
    /// Spawns a forwarder writing to the process's stdout and stderr.
    pub fn spawn(container_id: impl Into<String>, stream: LogStream) -> Self {
        Self::spawn_with_writers(container_id, stream, tokio::io::stdout(), tokio::io::stderr())
    }

    /// Spawns a forwarder writing to the given sinks.
    pub fn spawn_with_writers<O, E>(
        container_id: impl Into<String>,
        stream: LogStream,
        mut stdout: O,
        mut stderr: E,
    ) -> Self
    where
        O: AsyncWrite + Unpin + Send + 'static,
        E: AsyncWrite + Unpin + Send + 'static,
    {
        let container_id = container_id.into();
        let task_id = container_id.clone();
        let handle = tokio::spawn(async move {
            forward(&task_id, stream, &mut stdout, &mut stderr).await
        });

        Self {
            container_id,
            handle,
        }
    }

    /// Returns the id of the container being followed.
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Waits up to `timeout` for the stream to end.
    ///
    /// Returns `None` if the task did not finish in time (it is aborted) or
    /// if it panicked.
    pub async fn join_with_timeout(mut self, timeout: Duration) -> Option<ForwardStats> {
        match tokio::time::timeout(timeout, &mut self.handle).await {
            Ok(Ok(stats)) => Some(stats),
            Ok(Err(e)) => {
                tracing::warn!(container_id = %self.container_id, error = %e, "log forwarder failed");
                None
            }
            Err(_) => {
                tracing::debug!(container_id = %self.container_id, "abandoning log forwarder");
                self.handle.abort();
                None
            }
        }
    }
}

/// Copies a demultiplexed log stream into the two sinks until it ends.
pub(crate) async fn forward<O, E>(
    container_id: &str,
    mut stream: LogStream,
    stdout: &mut O,
    stderr: &mut E,
) -> ForwardStats
where
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let mut stats = ForwardStats::default();

    while let Some(item) = stream.next().await {
        let written = match item {
            Ok(LogChunk::Stdout(bytes)) => {
                stats.stdout_bytes += bytes.len() as u64;
                write_chunk(stdout, &bytes).await
            }
            Ok(LogChunk::Stderr(bytes)) => {
                stats.stderr_bytes += bytes.len() as u64;
                write_chunk(stderr, &bytes).await
            }
            Err(e) => {
                tracing::warn!(container_id = %container_id, error = %e, "error while reading logs");
                stats.read_error = true;
                break;
            }
        };

        if let Err(e) = written {
            tracing::warn!(container_id = %container_id, error = %e, "failed to forward logs");
            break;
        }
    }

    tracing::debug!(
        container_id = %container_id,
        stdout_bytes = stats.stdout_bytes,
        stderr_bytes = stats.stderr_bytes,
        "log stream ended"
    );
    stats
}

async fn write_chunk<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    writer.write_all(bytes).await?;
    writer.flush().await
}
