//! Command line and environment configuration of both executables.

use crate::activation::DEFAULT_SOCKET_GROUP;
use clap::Parser;
use std::time::Duration;

/// Sender identity used by the daemon and looked up by the report.
pub const DEFAULT_IDENTIFIER: &str = "sampled";

/// Socket-activated daemon greeting every peer and journaling who it was.
#[derive(Clone, Debug, Parser)]
#[command(name = "sampled", version)]
pub struct DaemonConfig {
    /// Name of the socket group (FileDescriptorName=) to serve
    #[arg(long, env = "SAMPLED_SOCKET_GROUP", default_value = DEFAULT_SOCKET_GROUP)]
    pub socket_group: String,

    /// Sender identity (SYSLOG_IDENTIFIER) of every journal record
    #[arg(long, env = "SAMPLED_IDENTIFIER", default_value = DEFAULT_IDENTIFIER)]
    pub identifier: String,

    /// Pause after each session, in milliseconds; 0 disables it
    #[arg(long, env = "SAMPLED_LINGER_MS", default_value_t = 1000)]
    pub linger_ms: u64,

    /// Also write every record to standard error
    #[arg(long = "stderr", env = "SAMPLED_LOG_STDERR")]
    pub log_stderr: bool,

    /// Leave LISTEN_PID, LISTEN_FDS and LISTEN_FDNAMES in the environment
    #[arg(long)]
    pub keep_environment: bool,
}

impl DaemonConfig {
    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }
}

impl Default for DaemonConfig {
    fn default() -> DaemonConfig {
        DaemonConfig {
            socket_group: DEFAULT_SOCKET_GROUP.to_owned(),
            identifier: DEFAULT_IDENTIFIER.to_owned(),
            linger_ms: 1000,
            log_stderr: false,
            keep_environment: false,
        }
    }
}

/// Summarize the connections logged by the daemon.
///
/// Offsets are whole hours before now. The defaults report on the last hour.
#[derive(Clone, Debug, Parser)]
#[command(name = "sampled-report", version, allow_negative_numbers = true)]
pub struct ReportArgs {
    /// Maximum severity to include, 0 (Emergency) through 7 (Debug)
    #[arg(short = 'l', value_name = "max_level", default_value_t = 5)]
    pub max_level: i64,

    /// Start of the interval, in hours before now
    #[arg(short = 's', value_name = "start_offset", default_value_t = 1)]
    pub start_offset: i64,

    /// End of the interval, in hours before now
    #[arg(short = 'e', value_name = "end_offset", default_value_t = 0)]
    pub end_offset: i64,

    /// Read the journal files in this directory instead of the local journal
    #[arg(short = 'D', long)]
    pub directory: Option<String>,

    /// Sender identity to report on
    #[arg(long, default_value = DEFAULT_IDENTIFIER)]
    pub identifier: String,

    /// Read the current user's journal (combines with --system)
    #[arg(long)]
    pub user: bool,

    /// Read the system journal (combines with --user)
    #[arg(long)]
    pub system: bool,

    /// Only report entries logged on this machine
    #[arg(long)]
    pub local: bool,
}

impl Default for ReportArgs {
    fn default() -> ReportArgs {
        ReportArgs {
            max_level: 5,
            start_offset: 1,
            end_offset: 0,
            directory: None,
            identifier: DEFAULT_IDENTIFIER.to_owned(),
            user: false,
            system: false,
            local: false,
        }
    }
}
