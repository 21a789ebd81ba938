//! CLI argument definitions for hooklog-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use hooklog_core::config::HooklogConfig;

/// Hooked-app log collector daemon.
///
/// Receives log lines over UDP, classifies them, keeps a recent tail in
/// memory, persists them to SQLite and fans them out to live subscribers.
#[derive(Parser, Debug)]
#[command(name = "hooklog-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to hooklog.toml configuration file.
    ///
    /// A missing file is not an error; built-in defaults are used instead.
    #[arg(short, long, default_value = "hooklog.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override the UDP bind address (e.g. 0.0.0.0:9999).
    #[arg(long)]
    pub bind: Option<String>,

    /// Override the SQLite database path.
    #[arg(long)]
    pub db: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Inject the built-in sample log lines once after startup.
    #[arg(long)]
    pub inject_samples: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,
}

impl DaemonCli {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut HooklogConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(bind) = &self.bind {
            config.receiver.bind = bind.clone();
        }
        if let Some(db) = &self.db {
            config.storage.path = db.clone();
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file = pid_file.clone();
        }
    }
}
