//! Failure taxonomy of the daemon and the report tool.
//!
//! Startup and loop failures end the daemon; session-level failures never
//! leave [`crate::session`] and so have no type here.

use std::io;
use thiserror::Error;

/// The check-in with the supervisor did not yield usable sockets.
#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("check-in IPC failure: {0}")]
    CheckinTransportFailed(#[source] io::Error),
    #[error("check-in failed: {}", io::Error::from_raw_os_error(*.0))]
    CheckinRejected(i32),
    #[error("no label found")]
    NoLabel,
    #[error("no sockets found to answer requests on")]
    NoSockets,
    #[error("no sockets named {0:?} found to answer requests on")]
    NoNamedSocketGroup(String),
}

/// A listening descriptor could not be put under readiness notification.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("epoll_create1(): {0}")]
    Create(#[source] io::Error),
    #[error("descriptor {fd} is not a listening stream socket")]
    NotListening { fd: i32 },
    #[error("epoll_ctl({fd}): {source}")]
    Add { fd: i32, source: io::Error },
    #[error("signalfd(): {0}")]
    Signals(#[source] io::Error),
}

/// Waiting on the readiness queue failed.
#[derive(Debug, Error)]
#[error("epoll_wait(): {0}")]
pub struct WaitError(#[from] pub io::Error);

/// Everything that makes the daemon exit with failure status.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Activation(#[from] ActivationError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Wait(#[from] WaitError),
}

impl DaemonError {
    /// Whether the daemon failed before entering its accept loop.
    pub fn is_startup(&self) -> bool {
        !matches!(self, DaemonError::Wait(_))
    }
}

/// Invalid report tool arguments.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("Invalid value for max_level.")]
    MaxLevel,
    #[error("Invalid value for start_offset.")]
    StartOffset,
    #[error("Invalid value for end_offset.")]
    EndOffset,
    #[error("Invalid time interval.")]
    Interval,
}

/// The journal could not be opened, filtered or read.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unable to open journal: {0}")]
    Open(#[source] io::Error),
    #[error("unable to set query: {0}")]
    Match(#[source] io::Error),
    #[error("search failed: {0}")]
    Search(#[source] io::Error),
    #[error("unable to write report: {0}")]
    Output(#[source] io::Error),
}
