//! Teardown actions bound to a provisioned container.

use std::time::Duration;

use crate::environment::ContainerRuntime;
use crate::error::Result;

/// What has to be undone for a container, given how far provisioning got.
///
/// A `Cleanup` is consumed by [`Cleanup::run`], so it can run at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a bound cleanup must be run or the container leaks"]
pub enum Cleanup {
    /// Nothing was created.
    Noop,
    /// Created but never started.
    Remove { id: String },
    /// Started; stop within `grace`, then remove.
    StopAndRemove { id: String, grace: Duration },
}

impl Cleanup {
    /// Returns the id of the container this cleanup tears down, if any.
    pub fn container_id(&self) -> Option<&str> {
        match self {
            Cleanup::Noop => None,
            Cleanup::Remove { id } | Cleanup::StopAndRemove { id, .. } => Some(id.as_str()),
        }
    }

    /// Tears the container down.
    ///
    /// Stop always precedes remove. Errors are returned as-is; callers treat
    /// them as fatal.
    pub async fn run(self, runtime: &dyn ContainerRuntime) -> Result<()> {
        match self {
            Cleanup::Noop => Ok(()),
            Cleanup::Remove { id } => {
                tracing::info!(container_id = %id, "removing container");
                runtime.remove(&id).await
            }
            Cleanup::StopAndRemove { id, grace } => {
                tracing::info!(
                    container_id = %id,
                    grace_secs = grace.as_secs(),
                    "stopping and removing container"
                );
                runtime.stop(&id, grace).await?;
                runtime.remove(&id).await
            }
        }
    }
}
