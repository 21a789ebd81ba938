//! Daemon orchestration -- assembly and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `hooklog-daemon`.
//! It loads configuration, builds the log pipeline together with its query
//! service, manages startup/shutdown ordering, and runs the main loop.
//!
//! # Startup Order
//!
//! 1. PID file
//! 2. Log pipeline (store writer, then datagram receiver)
//! 3. Uptime updater (metrics enabled only)
//!
//! # Shutdown Order
//!
//! 1. Background tasks (uptime updater)
//! 2. Log pipeline (receiver stops, persistence queue drains)
//! 3. PID file removal

use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::broadcast;

use hooklog_core::config::HooklogConfig;
use hooklog_core::error::{ConfigError, HooklogError};
use hooklog_core::pipeline::{HealthStatus, Pipeline};
use hooklog_pipeline::{LogPipeline, LogPipelineBuilder, PipelineConfig, QueryService};

use crate::health::{DaemonHealth, ModuleHealth, aggregate_status};
use crate::metrics_server;

/// Interval between periodic health reports in the main loop.
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Interval between uptime gauge updates.
const UPTIME_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist. Environment overrides apply in both cases.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read, parsed or validated.
pub async fn load_config(path: &Path) -> Result<HooklogConfig> {
    match HooklogConfig::load(path).await {
        Ok(config) => Ok(config),
        Err(HooklogError::Config(ConfigError::FileNotFound { path })) => {
            tracing::warn!(path = path.as_str(), "config file not found, using defaults");
            let mut config = HooklogConfig::default();
            config.apply_env_overrides();
            Ok(config)
        }
        Err(e) => Err(anyhow::anyhow!("failed to load config: {}", e)),
    }
}

/// The main daemon orchestrator.
///
/// Manages the complete lifecycle of the log pipeline:
/// configuration, ordered startup, health monitoring, and graceful shutdown.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: HooklogConfig,
    /// Ingestion pipeline.
    pipeline: LogPipeline,
    /// Read/admin contract sharing the pipeline's store, buffer and hub.
    query: QueryService,
    /// Shutdown broadcast sender (signals all background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
    /// Inject sample lines right after startup.
    inject_samples: bool,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be parsed or is invalid
    /// - The store cannot be opened
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = load_config(config_path).await?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    pub fn build_from_config(config: HooklogConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        // Install metrics recorder before the pipeline starts counting
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            record_build_info();
        }

        tracing::info!(
            bind = config.receiver.bind.as_str(),
            store = config.storage.path.as_str(),
            "initializing log pipeline"
        );
        let (pipeline, query) = LogPipelineBuilder::new()
            .config(PipelineConfig::from_core(&config))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build log pipeline: {}", e))?;

        let (shutdown_tx, _) = broadcast::channel(4);

        Ok(Self {
            config,
            pipeline,
            query,
            shutdown_tx,
            start_time: Instant::now(),
            inject_samples: false,
        })
    }

    /// Inject the built-in sample lines once the pipeline is running.
    pub fn with_sample_injection(mut self, enabled: bool) -> Self {
        self.inject_samples = enabled;
        self
    }

    /// Start the pipeline and block until `SIGTERM` or `SIGINT`.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(wait_for_shutdown_signal()).await
    }

    /// Start the pipeline and block until `shutdown` resolves.
    ///
    /// The future yields the name of the trigger for logging.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = Result<&'static str>>,
    {
        let pid_path = (!self.config.general.pid_file.is_empty())
            .then(|| self.config.general.pid_file.clone());
        if let Some(path) = &pid_path {
            write_pid_file(Path::new(path))?;
        }

        if let Err(e) = self.pipeline.start().await {
            tracing::error!(error = %e, "log pipeline failed to start");
            if let Some(path) = &pid_path {
                remove_pid_file(Path::new(path));
            }
            return Err(anyhow::anyhow!("failed to start log pipeline: {}", e));
        }

        if self.inject_samples {
            self.query.inject_samples();
        }

        let mut uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.shutdown_tx.subscribe()));

        tracing::info!("entering main loop");
        let signal = self.wait_with_health_reports(shutdown).await;
        match &signal {
            Ok(name) => tracing::info!(signal = *name, "shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "shutdown signal handling failed"),
        }

        let _ = self.shutdown_tx.send(());
        if let Some(task) = uptime_task.take() {
            let _ = task.await;
        }

        let stopped = self.pipeline.stop().await;

        if let Some(path) = &pid_path {
            remove_pid_file(Path::new(path));
        }

        stopped.map_err(|e| anyhow::anyhow!("failed to stop log pipeline: {}", e))?;
        signal.map(|_| ())
    }

    async fn wait_with_health_reports<F>(&self, shutdown: F) -> Result<&'static str>
    where
        F: Future<Output = Result<&'static str>>,
    {
        tokio::pin!(shutdown);
        let mut interval = tokio::time::interval(HEALTH_CHECK_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                signal = &mut shutdown => return signal,
                _ = interval.tick() => {
                    let health = self.health().await;
                    match &health.status {
                        HealthStatus::Healthy => tracing::debug!(
                            uptime_secs = health.uptime_secs,
                            buffer_size = health.buffer_size,
                            clients = health.clients_connected,
                            "daemon healthy"
                        ),
                        status => tracing::warn!(
                            status = %status,
                            uptime_secs = health.uptime_secs,
                            "daemon health degraded"
                        ),
                    }
                }
            }
        }
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let modules = vec![ModuleHealth {
            name: "log-pipeline".to_owned(),
            enabled: true,
            status: self.pipeline.health_check().await,
        }];

        DaemonHealth {
            status: aggregate_status(&modules),
            uptime_secs: self.start_time.elapsed().as_secs(),
            modules,
            receiver: self.pipeline.receiver_stats(),
            buffer_size: self.pipeline.buffer_len(),
            clients_connected: self.pipeline.subscriber_count(),
        }
    }

    /// Query service handle (list, stats, clear, recent, subscribe).
    pub fn query(&self) -> QueryService {
        self.query.clone()
    }

    /// Address the datagram receiver is bound to, while running.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.pipeline.local_addr()
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &HooklogConfig {
        &self.config
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Write the current process PID to a file.
///
/// Used to prevent duplicate daemon instances.
///
/// # Security
///
/// - Uses `create_new(true)` to atomically create the file
/// - Verifies the created file is a regular file
/// - Creates the parent directory with 0o700 permissions
///
/// # Errors
///
/// Returns an error if the PID file already exists or cannot be written.
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            fs::DirBuilder::new()
                .mode(0o700)
                .recursive(true)
                .create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    if !file.metadata()?.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    writeln!(file, "{}", pid)?;

    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on daemon shutdown.
///
/// Logs a warning but does not fail if the file cannot be removed.
pub fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file");
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

/// Record the build info gauge (always 1, with version label).
fn record_build_info() {
    use hooklog_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "daemon metrics recorded");
}

/// Spawn a background task that periodically updates the uptime metric.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    use hooklog_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPTIME_UPDATE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_write_pid_file_creates_parent_directory() {
        // Given: A path with non-existent parent directory
        let dir = tempfile::tempdir().expect("temp dir");
        let pid_file = dir.path().join("subdir").join("test.pid");

        // When: Writing PID file
        write_pid_file(&pid_file).expect("write_pid_file should create parent directory");

        // Then: File exists and holds our PID
        let content = fs::read_to_string(&pid_file).expect("should read PID file");
        assert_eq!(content.trim(), std::process::id().to_string());
    }

    #[test]
    fn test_write_pid_file_fails_if_already_exists() {
        // Given: An existing PID file
        let dir = tempfile::tempdir().expect("temp dir");
        let pid_file = dir.path().join("hooklog.pid");
        fs::write(&pid_file, "12345").expect("should write initial PID file");

        // When: Attempting to write PID file again
        let err = write_pid_file(&pid_file).expect_err("duplicate PID file should fail");

        // Then: Error names the existing PID
        let msg = err.to_string();
        assert!(msg.contains("already exists"), "got: {msg}");
        assert!(msg.contains("12345"), "got: {msg}");
    }

    #[test]
    fn test_remove_pid_file_handles_nonexistent_gracefully() {
        // Given: A non-existent PID file
        let dir = tempfile::tempdir().expect("temp dir");
        let pid_file = dir.path().join("missing.pid");

        // When/Then: Removal does not panic
        remove_pid_file(&pid_file);
        assert!(!pid_file.exists());
    }

    #[tokio::test]
    async fn test_uptime_updater_stops_on_shutdown() {
        // Given: A running uptime updater
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = spawn_uptime_updater(Instant::now(), shutdown_rx);

        // When: Sending shutdown signal
        let _ = shutdown_tx.send(());

        // Then: Task completes quickly
        let result = tokio::time::timeout(Duration::from_millis(500), task).await;
        assert!(result.is_ok(), "uptime updater should shut down within timeout");
    }

    #[tokio::test]
    async fn test_load_config_falls_back_to_defaults_when_missing() {
        // Given: A path that does not exist
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("absent.toml");

        // When: Loading config
        let config = load_config(&path).await.expect("missing file uses defaults");

        // Then: Defaults are returned
        assert_eq!(config.buffer.capacity, 1000);
        assert_eq!(config.hub.recent_count, 10);
    }

    #[tokio::test]
    async fn test_load_config_rejects_malformed_file() {
        // Given: A file with invalid TOML
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[buffer\ncapacity = ").expect("write");

        // When/Then: Loading fails
        assert!(load_config(&path).await.is_err());
    }
}
