//! High-level interface to the systemd daemon module: socket activation
//! hand-off and service manager notification.

use super::{ffi_result, free_cstring, Result};
use sampled_sys::daemon as ffi;
use libc::{c_char, c_int};
use std::ffi::CString;
use std::io::ErrorKind;
use std::os::unix::io::RawFd;
use std::ptr;

/// Options for checking whether a socket is in listening mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Listening {
    /// Verify that socket is in listening mode
    IsListening,
    /// Verify that socket is not in listening mode
    IsNotListening,
    /// Don't check whether socket is listening
    NoListeningCheck,
}

/// Socket type to check for in [`is_socket`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocketType {
    Stream,
    Datagram,
    SeqPacket,
}

/// Number of the first passed file descriptor
pub const LISTEN_FDS_START: RawFd = ffi::SD_LISTEN_FDS_START;

/// Tells the service manager that service startup is finished.
pub const STATE_READY: &str = "READY";
/// Tells the service manager that the service is beginning its shutdown.
pub const STATE_STOPPING: &str = "STOPPING";
/// Passes a single-line status string back to the service manager.
pub const STATE_STATUS: &str = "STATUS";

/// Returns how many file descriptors have been passed. Removes the
/// `$LISTEN_FDS` and `$LISTEN_PID` file descriptors from the environment if
/// `unset_environment` is `true`
pub fn listen_fds(unset_environment: bool) -> Result<usize> {
    let fds = sd_try!(ffi::sd_listen_fds(unset_environment as c_int));
    Ok(fds as usize)
}

/// Like [`listen_fds`], but also returns the name of every descriptor, as
/// configured with `FileDescriptorName=` (`"unknown"` when the supervisor
/// passed no names).
///
/// The descriptors are returned as raw numbers; the caller decides who owns
/// them and must not take ownership twice.
pub fn listen_fds_with_names(unset_environment: bool) -> Result<Vec<(RawFd, String)>> {
    let mut names: *mut *mut c_char = ptr::null_mut();
    let n = ffi_result(unsafe {
        ffi::sd_listen_fds_with_names(unset_environment as c_int, &mut names)
    })? as usize;

    let mut fds = Vec::with_capacity(n);
    if names.is_null() {
        fds.extend((0..n).map(|i| (LISTEN_FDS_START + i as RawFd, String::from("unknown"))));
        return Ok(fds);
    }

    // `names` is a NULL terminated strv holding exactly `n` entries.
    unsafe {
        for i in 0..n {
            let name = free_cstring(*names.add(i)).unwrap_or_else(|| String::from("unknown"));
            fds.push((LISTEN_FDS_START + i as RawFd, name));
        }
        libc::free(names as *mut libc::c_void);
    }
    Ok(fds)
}

fn c_socktype(socktype: Option<SocketType>) -> c_int {
    match socktype {
        Some(SocketType::Stream) => libc::SOCK_STREAM,
        Some(SocketType::Datagram) => libc::SOCK_DGRAM,
        Some(SocketType::SeqPacket) => libc::SOCK_SEQPACKET,
        None => 0,
    }
}

fn c_listening(listening: Listening) -> c_int {
    match listening {
        Listening::IsListening => 1,
        Listening::IsNotListening => 0,
        Listening::NoListeningCheck => -1,
    }
}

/// Identifies whether the passed file descriptor is a socket. If family and
/// type are supplied, they must match as well. See `Listening` for listening
/// check parameters.
pub fn is_socket(
    fd: RawFd,
    family: Option<c_int>,
    socktype: Option<SocketType>,
    listening: Listening,
) -> Result<bool> {
    let result = sd_try!(ffi::sd_is_socket(
        fd,
        family.unwrap_or(0),
        c_socktype(socktype),
        c_listening(listening)
    ));
    Ok(result != 0)
}

/// Notify the service manager about a state change.
///
/// `state` is a sequence of `(key, value)` pairs, sent as newline separated
/// `KEY=value` assignments. Returns `false` if the manager could not be
/// contacted because this process was not started under a notify-aware
/// service (i.e. `$NOTIFY_SOCKET` is unset).
pub fn notify<I, K, V>(unset_environment: bool, state: I) -> Result<bool>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut assignments = String::new();
    for (k, v) in state {
        assignments.push_str(k.as_ref());
        assignments.push('=');
        assignments.push_str(v.as_ref());
        assignments.push('\n');
    }
    let c_state =
        CString::new(assignments).map_err(|e| crate::Error::new(ErrorKind::InvalidInput, e))?;
    let result = sd_try!(ffi::sd_notify(unset_environment as c_int, c_state.as_ptr()));
    Ok(result != 0)
}

/// Returns true if the system was booted with systemd.
pub fn booted() -> Result<bool> {
    let result = sd_try!(ffi::sd_booted());
    Ok(result != 0)
}
