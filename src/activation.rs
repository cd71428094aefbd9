//! Startup check-in with the process supervisor.
//!
//! The supervisor owns the listening sockets; at startup the daemon asks for
//! its job description and takes the descriptors of one named socket group.
//! See <http://0pointer.de/blog/projects/socket-activation.html> for the
//! systemd flavour of the hand-off.

use crate::daemon;
use crate::error::ActivationError;
use crate::logging::Logger;
use crate::login::{self, UnitType};
use std::collections::BTreeMap;
use std::io;
use std::os::unix::io::{FromRawFd, OwnedFd, RawFd};

/// Socket group served when nothing else is configured.
pub const DEFAULT_SOCKET_GROUP: &str = "MyListenerSocket";

/// Socket groups of a job, by name, each in hand-off order.
pub type SocketGroups = BTreeMap<String, Vec<OwnedFd>>;

/// What the supervisor answered to a check-in request.
#[derive(Debug)]
pub enum CheckinResponse {
    /// The supervisor refused, reporting an errno value.
    Error(i32),
    Job(JobDescription),
}

/// The parts of a job description the daemon cares about.
#[derive(Debug, Default)]
pub struct JobDescription {
    pub label: Option<String>,
    pub sockets: Option<SocketGroups>,
}

/// A process supervisor the daemon can check in with.
pub trait Supervisor {
    /// Perform the check-in exchange. `Err` means the supervisor could not
    /// be talked to at all.
    fn check_in(&mut self) -> io::Result<CheckinResponse>;
}

impl<S: Supervisor + ?Sized> Supervisor for &mut S {
    fn check_in(&mut self) -> io::Result<CheckinResponse> {
        (**self).check_in()
    }
}

/// The validated outcome of a check-in.
#[derive(Debug)]
pub struct CheckinResult {
    pub label: String,
    /// Listening descriptors of the configured group, never empty.
    pub listening_descriptors: Vec<OwnedFd>,
}

/// Performs the check-in and validates the job description.
pub struct ActivationClient<S> {
    supervisor: S,
    socket_group: String,
    log: Logger,
}

impl<S: Supervisor> ActivationClient<S> {
    pub fn new(supervisor: S, socket_group: &str, log: Logger) -> ActivationClient<S> {
        ActivationClient {
            supervisor,
            socket_group: socket_group.to_owned(),
            log,
        }
    }

    /// Check in with the supervisor and take the configured socket group.
    ///
    /// Ownership of the returned descriptors passes to the caller. Groups
    /// other than the configured one are released with the response.
    pub fn check_in(&mut self) -> Result<CheckinResult, ActivationError> {
        let job = match self
            .supervisor
            .check_in()
            .map_err(ActivationError::CheckinTransportFailed)?
        {
            CheckinResponse::Error(code) => return Err(ActivationError::CheckinRejected(code)),
            CheckinResponse::Job(job) => job,
        };

        let label = job.label.ok_or(ActivationError::NoLabel)?;
        self.log.notice(format_args!("Label: {label}"));

        let mut sockets = job.sockets.ok_or(ActivationError::NoSockets)?;
        if sockets.len() > 1 {
            self.log.warning("Some sockets will be ignored!");
        }

        let listening_descriptors = sockets
            .remove(&self.socket_group)
            .filter(|fds| !fds.is_empty())
            .ok_or_else(|| ActivationError::NoNamedSocketGroup(self.socket_group.clone()))?;

        Ok(CheckinResult {
            label,
            listening_descriptors,
        })
    }
}

/// Gather named descriptors into socket groups, keeping their order.
pub fn group_by_name<I>(fds: I) -> SocketGroups
where
    I: IntoIterator<Item = (OwnedFd, String)>,
{
    let mut groups = SocketGroups::new();
    for (fd, name) in fds {
        groups.entry(name).or_default().push(fd);
    }
    groups
}

/// The systemd hand-off: `$LISTEN_PID`, `$LISTEN_FDS` and `$LISTEN_FDNAMES`.
///
/// The job label is the unit the process runs in.
#[derive(Debug)]
pub struct Systemd {
    unset_environment: bool,
    taken: bool,
}

impl Systemd {
    pub fn new(unset_environment: bool) -> Systemd {
        Systemd {
            unset_environment,
            taken: false,
        }
    }

    fn label() -> Option<String> {
        login::get_unit(UnitType::SystemUnit, None)
            .or_else(|_| login::get_unit(UnitType::UserUnit, None))
            .ok()
    }
}

impl Supervisor for Systemd {
    fn check_in(&mut self) -> io::Result<CheckinResponse> {
        if self.taken {
            return Ok(CheckinResponse::Error(libc::EALREADY));
        }

        let listen_pid = std::env::var("LISTEN_PID").map_err(|_| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "LISTEN_PID is not set, not started by a socket-activating supervisor",
            )
        })?;
        if listen_pid.trim().parse::<u32>().ok() != Some(std::process::id()) {
            return Ok(CheckinResponse::Error(libc::ESRCH));
        }

        let named = match daemon::listen_fds_with_names(self.unset_environment) {
            Ok(named) => named,
            Err(e) => return Ok(CheckinResponse::Error(e.raw_os_error().unwrap_or(libc::EIO))),
        };
        self.taken = true;
        log::debug!("supervisor passed {} descriptor(s)", named.len());

        let sockets = if named.is_empty() {
            None
        } else {
            // The supervisor handed these over for this process alone, once.
            Some(group_by_name(named.into_iter().map(|(fd, name): (RawFd, String)| {
                (unsafe { OwnedFd::from_raw_fd(fd) }, name)
            })))
        };

        Ok(CheckinResponse::Job(JobDescription {
            label: Systemd::label(),
            sockets,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixDatagram;

    fn fd() -> OwnedFd {
        let (a, _b) = UnixDatagram::pair().unwrap();
        OwnedFd::from(a)
    }

    #[test]
    fn grouping_keeps_hand_off_order() {
        let fds: Vec<OwnedFd> = (0..3).map(|_| fd()).collect();
        let raw: Vec<RawFd> = fds.iter().map(AsRawFd::as_raw_fd).collect();
        let names = ["web", "admin", "web"];

        let groups = group_by_name(fds.into_iter().zip(names.iter().map(|n| n.to_string())));

        assert_eq!(groups.len(), 2);
        let web: Vec<RawFd> = groups["web"].iter().map(AsRawFd::as_raw_fd).collect();
        assert_eq!(web, vec![raw[0], raw[2]]);
        assert_eq!(groups["admin"][0].as_raw_fd(), raw[1]);
    }
}
