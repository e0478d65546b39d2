//! Test session runner.
//!
//! A session provisions one container, waits a fixed delay for the service to
//! come up, runs the suite against it, and tears the container down on every
//! path that got as far as creating it:
//!
//! ```text
//! Unprovisioned -> Created -> Started -> LogStreaming -> Ready -> SuiteRunning -> TornDown
//!                     |          |
//!                     +----------+--------------------------------------------> TornDown
//! ```

use std::time::Duration;

use tokio::time::Instant;

use crate::cleanup::Cleanup;
use crate::config::SessionConfig;
use crate::environment::{ContainerRuntime, ContainerSpec};
use crate::error::{Error, Result};
use crate::logs::LogForwarder;
use crate::suite::{SuiteExecutor, SuiteOutcome};

/// How long teardown waits for the log forwarder to drain.
pub const LOG_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A provisioned, started container with its bound teardown.
pub struct Environment {
    id: String,
    cleanup: Cleanup,
    logs: LogForwarder,
}

impl Environment {
    /// Returns the container id.
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Provisioning failed part-way; `cleanup` undoes whatever was created.
#[derive(Debug)]
pub struct SetupFailure {
    pub cleanup: Cleanup,
    pub error: Error,
}

/// Result of a completed session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// Id of the container the suite ran against.
    pub container_id: String,
    /// Exit status of the suite.
    pub suite: SuiteOutcome,
    /// Wall-clock time from provisioning to teardown.
    pub elapsed: Duration,
}

/// Runs one test session against a container runtime.
pub struct Session<R: ContainerRuntime> {
    config: SessionConfig,
    runtime: R,
    suite: Box<dyn SuiteExecutor>,
}

impl<R: ContainerRuntime> Session<R> {
    /// Creates a session for the given configuration.
    pub fn new(config: SessionConfig, runtime: R, suite: Box<dyn SuiteExecutor>) -> Self {
        Self {
            config,
            runtime,
            suite,
        }
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Runs the whole session.
    ///
    /// Returns the suite outcome when the container was provisioned and torn
    /// down cleanly, whatever the suite's result. Any lifecycle error is
    /// returned after the bound cleanup has been attempted; see
    /// [`Error::is_fatal`].
    pub async fn run(&self) -> Result<SessionOutcome> {
        let started = Instant::now();

        let env = match self.provision().await {
            Ok(env) => env,
            Err(SetupFailure { cleanup, error }) => {
                tracing::error!(
                    error = %error,
                    container_id = ?cleanup.container_id(),
                    "failed to set up environment"
                );
                cleanup.run(&self.runtime).await?;
                return Err(error);
            }
        };
        let container_id = env.id.clone();

        self.await_readiness().await;

        tracing::info!(container_id = %container_id, suite = %self.suite.name(), "executing suite");
        let suite = self.suite.execute(&self.config).await;

        self.teardown(env).await?;
        let suite = suite?;

        tracing::info!(
            container_id = %container_id,
            exit_code = ?suite.exit_code,
            "session finished"
        );

        Ok(SessionOutcome {
            container_id,
            suite,
            elapsed: started.elapsed(),
        })
    }

    /// Creates, starts and attaches to the container.
    ///
    /// On failure the returned [`SetupFailure`] carries the cleanup matching
    /// how far provisioning got: nothing after a failed create, removal after
    /// a failed start, stop and removal after a failed log attach.
    pub async fn provision(&self) -> std::result::Result<Environment, SetupFailure> {
        let spec = ContainerSpec::for_session(&self.config);

        let created = match self.runtime.create(&spec).await {
            Ok(created) => created,
            Err(error) => {
                return Err(SetupFailure {
                    cleanup: Cleanup::Noop,
                    error,
                })
            }
        };
        let id = created.id;

        if !created.warnings.is_empty() {
            tracing::warn!(container_id = %id, warnings = ?created.warnings, "container created with warnings");
        }
        tracing::info!(
            container_id = %id,
            image = %spec.image,
            port = %self.config.port,
            "created container"
        );

        if let Err(error) = self.runtime.start(&id).await {
            return Err(SetupFailure {
                cleanup: Cleanup::Remove { id },
                error,
            });
        }

        let cleanup = Cleanup::StopAndRemove {
            id: id.clone(),
            grace: self.config.stop_grace,
        };

        let stream = match self.runtime.logs(&id).await {
            Ok(stream) => stream,
            Err(error) => return Err(SetupFailure { cleanup, error }),
        };
        let logs = LogForwarder::spawn(id.clone(), stream);

        tracing::info!(container_id = %id, "started container");
        Ok(Environment { id, cleanup, logs })
    }

    /// Waits the fixed readiness delay. No health check is made.
    pub async fn await_readiness(&self) {
        tracing::info!(
            delay_secs = self.config.readiness_delay.as_secs(),
            "waiting for service to start"
        );
        tokio::time::sleep(self.config.readiness_delay).await;
    }

    /// Stops and removes the container, then gives the log forwarder a
    /// moment to flush.
    pub async fn teardown(&self, env: Environment) -> Result<()> {
        let Environment { cleanup, logs, .. } = env;
        cleanup.run(&self.runtime).await?;

        if logs.join_with_timeout(LOG_DRAIN_TIMEOUT).await.is_none() {
            tracing::debug!("log stream still open after teardown");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{HostBinding, LogChunk};
    use crate::testing::{RecordingRuntime, ScriptedSuite, CONTAINER_ID};

    fn config() -> SessionConfig {
        SessionConfig::new("demo", "myapp:test")
    }

    fn session(runtime: &RecordingRuntime, suite: &ScriptedSuite) -> Session<RecordingRuntime> {
        Session::new(config(), runtime.clone(), Box::new(suite.clone()))
    }

    fn ops(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn happy_path_creates_and_removes_exactly_one_container() {
        let runtime = RecordingRuntime::new()
            .with_warnings(&["memory limit ignored"])
            .with_logs(vec![LogChunk::Stdout(b"listening\n".to_vec())]);
        let suite = ScriptedSuite::passing();

        let outcome = session(&runtime, &suite).run().await.unwrap();

        assert_eq!(outcome.container_id, CONTAINER_ID);
        assert!(outcome.suite.success());
        assert_eq!(
            runtime.operations(),
            ops(&[
                "create:myapp:test",
                "start:container-1",
                "logs:container-1",
                "stop:container-1:15",
                "remove:container-1",
            ])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn container_gets_port_binding_and_env() {
        let runtime = RecordingRuntime::new();
        let suite = ScriptedSuite::passing();

        session(&runtime, &suite).run().await.unwrap();

        let specs = runtime.specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].env, vec!["PORT=8000".to_string()]);
        assert_eq!(
            specs[0].port_bindings["8000/tcp"],
            HostBinding {
                host_ip: "0.0.0.0".to_string(),
                host_port: "8000".to_string(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn suite_starts_after_readiness_delay() {
        let runtime = RecordingRuntime::new();
        let suite = ScriptedSuite::passing();
        let before = Instant::now();

        let outcome = session(&runtime, &suite).run().await.unwrap();

        let runs = suite.runs();
        assert_eq!(runs.len(), 1);
        assert!(runs[0] - before >= Duration::from_secs(5));
        assert!(outcome.elapsed >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn create_failure_touches_nothing_else() {
        let runtime = RecordingRuntime::new().failing("create");
        let suite = ScriptedSuite::passing();

        let err = session(&runtime, &suite).run().await.unwrap_err();

        assert!(matches!(err, Error::ContainerCreate { .. }));
        assert!(err.is_fatal());
        assert_eq!(runtime.operations(), ops(&["create:myapp:test"]));
        assert!(suite.runs().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn start_failure_still_removes_container() {
        let runtime = RecordingRuntime::new().failing("start");
        let suite = ScriptedSuite::passing();

        let err = session(&runtime, &suite).run().await.unwrap_err();

        assert!(matches!(err, Error::ContainerStart { .. }));
        assert_eq!(
            runtime.operations(),
            ops(&["create:myapp:test", "start:container-1", "remove:container-1"])
        );
        assert!(suite.runs().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn log_attach_failure_stops_and_removes() {
        let runtime = RecordingRuntime::new().failing("logs");
        let suite = ScriptedSuite::passing();

        let err = session(&runtime, &suite).run().await.unwrap_err();

        assert!(matches!(err, Error::ContainerLogs { .. }));
        assert_eq!(
            runtime.operations(),
            ops(&[
                "create:myapp:test",
                "start:container-1",
                "logs:container-1",
                "stop:container-1:15",
                "remove:container-1",
            ])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failing_suite_still_tears_down() {
        let runtime = RecordingRuntime::new();
        let suite = ScriptedSuite::returning(SuiteOutcome::failed(101));

        let outcome = session(&runtime, &suite).run().await.unwrap();

        assert_eq!(outcome.suite.process_exit_code(), 101);
        let operations = runtime.operations();
        assert_eq!(&operations[3..], &ops(&["stop:container-1:15", "remove:container-1"])[..]);
    }

    #[tokio::test(start_paused = true)]
    async fn unlaunchable_suite_tears_down_then_reports() {
        let runtime = RecordingRuntime::new();
        let suite = ScriptedSuite::unlaunchable();

        let err = session(&runtime, &suite).run().await.unwrap_err();

        assert!(matches!(err, Error::Suite(_)));
        assert!(!err.is_fatal());
        assert!(runtime.operations().contains(&"remove:container-1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_failure_is_fatal_and_skips_remove() {
        let runtime = RecordingRuntime::new().failing("stop");
        let suite = ScriptedSuite::passing();

        let err = session(&runtime, &suite).run().await.unwrap_err();

        assert!(matches!(err, Error::ContainerStop { .. }));
        assert!(err.is_teardown());
        assert_eq!(
            runtime.operations().last().map(String::as_str),
            Some("stop:container-1:15")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn remove_failure_is_fatal_even_when_suite_passes() {
        let runtime = RecordingRuntime::new().failing("remove");
        let suite = ScriptedSuite::passing();

        let err = session(&runtime, &suite).run().await.unwrap_err();

        assert!(matches!(err, Error::ContainerRemove { .. }));
        assert_eq!(suite.runs().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_uses_configured_grace() {
        let runtime = RecordingRuntime::new();
        let suite = ScriptedSuite::passing();
        let session = Session::new(
            config().with_stop_grace(Duration::from_secs(3)),
            runtime.clone(),
            Box::new(suite),
        );

        session.run().await.unwrap();

        assert!(runtime
            .operations()
            .contains(&"stop:container-1:3".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn provision_binds_full_cleanup_after_start() {
        let runtime = RecordingRuntime::new();
        let suite = ScriptedSuite::passing();
        let session = session(&runtime, &suite);

        let env = session.provision().await.unwrap_or_else(|f| panic!("{}", f.error));

        assert_eq!(env.id(), CONTAINER_ID);
        assert_eq!(
            env.cleanup,
            Cleanup::StopAndRemove {
                id: CONTAINER_ID.to_string(),
                grace: Duration::from_secs(15),
            }
        );
        session.teardown(env).await.unwrap();
    }
}
