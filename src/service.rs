//! Daemon lifecycle: check in, register, serve, report how it ended.

use crate::accept::{AcceptLoop, ListenerSet};
use crate::activation::{ActivationClient, Supervisor};
use crate::config::DaemonConfig;
use crate::daemon::{self, STATE_READY, STATE_STATUS, STATE_STOPPING};
use crate::error::DaemonError;
use crate::logging::Logger;
use crate::readiness::ReadinessQueue;
use crate::session::SessionHandler;
use std::process::ExitCode;

/// Tell the supervisor about a state change, if it listens for that.
fn notify<'a>(log: &Logger, state: impl IntoIterator<Item = (&'a str, &'a str)>) {
    match daemon::notify(false, state) {
        Ok(true) => {}
        Ok(false) => log.debug("supervisor does not accept notifications"),
        Err(e) => log.debug(format_args!("sd_notify(): {e}")),
    }
}

/// Run the daemon until its supervisor stops it.
///
/// Returns `Ok` on a clean shutdown. Errors are returned unlogged.
pub fn run<S: Supervisor>(
    config: &DaemonConfig,
    supervisor: S,
    log: &Logger,
) -> Result<(), DaemonError> {
    let checkin = ActivationClient::new(supervisor, &config.socket_group, log.clone()).check_in()?;

    let mut queue = ReadinessQueue::new()?;
    queue.watch_termination()?;
    let count = checkin.listening_descriptors.len();
    let listeners = ListenerSet::new(checkin.listening_descriptors);
    listeners.register(&queue)?;

    let status = format!("Accepting connections on {count} socket(s)");
    notify(log, [(STATE_READY, "1"), (STATE_STATUS, status.as_str())]);

    let handler = SessionHandler::new(log.clone(), config.linger());
    let result = AcceptLoop::new(queue, listeners, handler, log.clone()).run();

    notify(log, [(STATE_STOPPING, "1")]);
    result.map_err(DaemonError::from)
}

/// Log how the daemon ended and turn that into a process status.
pub fn exit_status(result: Result<(), DaemonError>, log: &Logger) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_startup() => {
            log.error(format_args!("unable to start: {e}"));
            ExitCode::FAILURE
        }
        Err(e) => {
            log.error(format_args!("stopped serving: {e}"));
            ExitCode::FAILURE
        }
    }
}
