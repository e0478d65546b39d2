//! In-memory runtime and suite doubles for unit tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::time::Instant;

use crate::config::SessionConfig;
use crate::environment::{ContainerRuntime, ContainerSpec, CreatedContainer, LogChunk, LogStream};
use crate::error::{Error, Result};
use crate::suite::{SuiteExecutor, SuiteOutcome};

pub(crate) const CONTAINER_ID: &str = "container-1";

/// Runtime that records every call and fails the operations it is told to.
#[derive(Clone, Default)]
pub(crate) struct RecordingRuntime {
    inner: Arc<RecordingInner>,
}

#[derive(Default)]
struct RecordingInner {
    operations: Mutex<Vec<String>>,
    specs: Mutex<Vec<ContainerSpec>>,
    failing: Mutex<HashSet<&'static str>>,
    warnings: Mutex<Vec<String>>,
    log_chunks: Mutex<Vec<LogChunk>>,
}

impl RecordingRuntime {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Makes `op` ("create", "start", "logs", "stop", "remove") fail.
    pub(crate) fn failing(self, op: &'static str) -> Self {
        self.inner.failing.lock().unwrap().insert(op);
        self
    }

    pub(crate) fn with_warnings(self, warnings: &[&str]) -> Self {
        *self.inner.warnings.lock().unwrap() = warnings.iter().map(|w| w.to_string()).collect();
        self
    }

    pub(crate) fn with_logs(self, chunks: Vec<LogChunk>) -> Self {
        *self.inner.log_chunks.lock().unwrap() = chunks;
        self
    }

    pub(crate) fn operations(&self) -> Vec<String> {
        self.inner.operations.lock().unwrap().clone()
    }

    pub(crate) fn specs(&self) -> Vec<ContainerSpec> {
        self.inner.specs.lock().unwrap().clone()
    }

    fn record(&self, entry: impl Into<String>) {
        self.inner.operations.lock().unwrap().push(entry.into());
    }

    fn fails(&self, op: &str) -> bool {
        self.inner.failing.lock().unwrap().contains(op)
    }
}

#[async_trait]
impl ContainerRuntime for RecordingRuntime {
    async fn create(&self, spec: &ContainerSpec) -> Result<CreatedContainer> {
        self.record(format!("create:{}", spec.image));
        if self.fails("create") {
            return Err(Error::ContainerCreate {
                image: spec.image.clone(),
                reason: "connection refused".to_string(),
            });
        }
        self.inner.specs.lock().unwrap().push(spec.clone());
        Ok(CreatedContainer {
            id: CONTAINER_ID.to_string(),
            warnings: self.inner.warnings.lock().unwrap().clone(),
        })
    }

    async fn start(&self, id: &str) -> Result<()> {
        self.record(format!("start:{id}"));
        if self.fails("start") {
            return Err(Error::ContainerStart {
                id: id.to_string(),
                reason: "port is already allocated".to_string(),
            });
        }
        Ok(())
    }

    async fn logs(&self, id: &str) -> Result<LogStream> {
        self.record(format!("logs:{id}"));
        if self.fails("logs") {
            return Err(Error::ContainerLogs {
                id: id.to_string(),
                reason: "no such container".to_string(),
            });
        }
        let chunks = self.inner.log_chunks.lock().unwrap().clone();
        Ok(futures::stream::iter(chunks.into_iter().map(Ok)).boxed())
    }

    async fn stop(&self, id: &str, grace: Duration) -> Result<()> {
        self.record(format!("stop:{id}:{}", grace.as_secs()));
        if self.fails("stop") {
            return Err(Error::ContainerStop {
                id: id.to_string(),
                reason: "timeout".to_string(),
            });
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.record(format!("remove:{id}"));
        if self.fails("remove") {
            return Err(Error::ContainerRemove {
                id: id.to_string(),
                reason: "removal already in progress".to_string(),
            });
        }
        Ok(())
    }
}

/// Suite that returns a fixed outcome and remembers when it ran.
#[derive(Clone)]
pub(crate) struct ScriptedSuite {
    outcome: Option<SuiteOutcome>,
    started_at: Arc<Mutex<Vec<Instant>>>,
}

impl ScriptedSuite {
    pub(crate) fn passing() -> Self {
        Self::returning(SuiteOutcome::passed())
    }

    pub(crate) fn returning(outcome: SuiteOutcome) -> Self {
        Self {
            outcome: Some(outcome),
            started_at: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A suite whose runner cannot be launched.
    pub(crate) fn unlaunchable() -> Self {
        Self {
            outcome: None,
            started_at: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn runs(&self) -> Vec<Instant> {
        self.started_at.lock().unwrap().clone()
    }
}

#[async_trait]
impl SuiteExecutor for ScriptedSuite {
    async fn execute(&self, _config: &SessionConfig) -> Result<SuiteOutcome> {
        self.started_at.lock().unwrap().push(Instant::now());
        self.outcome
            .ok_or_else(|| Error::Suite("failed to run cargo: not found".to_string()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
