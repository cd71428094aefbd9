#![warn(rust_2018_idioms)]

//! A socket-activated greeting daemon and its connection report.
//!
//! The daemon never binds a socket itself. It checks in with its supervisor
//! to receive already-listening descriptors ([`activation`]), waits for
//! connections on them ([`readiness`], [`accept`]), and for each peer writes
//! a structured journal record and a fixed greeting ([`session`]). The report
//! side ([`report`]) queries the journal for those records.
//!
//! The modules [`daemon`], [`journal`] and [`login`] are thin safe wrappers
//! over libsystemd, in the shape of the usual systemd bindings.

extern crate sampled_sys as ffi;

use std::ffi::CStr;
use std::time;

pub use std::io::{Error, Result};

/// An analogue of `?` for systemd FFI calls.
///
/// The parameter should be a call to a systemd FFI fn with an i32 return
/// value. It is called, and if the return is negative then `sd_try!()`
/// interprets it as an error code and returns `io::Error` from the enclosing
/// fn. Otherwise, the value of `sd_try!()` is the non-negative value returned
/// by the FFI call.
macro_rules! sd_try {
    ($e:expr) => {{
        let ret: i32;
        unsafe {
            ret = $e;
        }
        if ret < 0 {
            return Err($crate::Error::from_raw_os_error(-ret));
        }
        ret
    }};
}

pub mod daemon;
pub mod journal;
pub mod login;

pub mod accept;
pub mod activation;
pub mod config;
pub mod error;
pub mod logging;
pub mod readiness;
pub mod report;
pub mod service;
pub mod session;

pub use crate::activation::{ActivationClient, CheckinResult, Supervisor, Systemd};
pub use crate::config::{DaemonConfig, ReportArgs};
pub use crate::error::{
    ActivationError, DaemonError, QueryError, RegistrationError, UsageError, WaitError,
};
pub use crate::logging::Logger;

/// Convert a systemd ffi return value into a Result
pub(crate) fn ffi_result(ret: ffi::c_int) -> Result<ffi::c_int> {
    if ret < 0 {
        Err(Error::from_raw_os_error(-ret))
    } else {
        Ok(ret)
    }
}

/// Take ownership of a `malloc`ed C string handed back by libsystemd.
///
/// Returns `None` for a null pointer. Invalid UTF-8 is replaced lossily.
///
/// # Safety
///
/// `s` must be null or a valid, nul-terminated, `malloc` allocated string
/// that nothing else will free.
pub(crate) unsafe fn free_cstring(s: *mut ffi::c_char) -> Option<String> {
    if s.is_null() {
        return None;
    }
    let owned = CStr::from_ptr(s).to_string_lossy().into_owned();
    libc::free(s as *mut ffi::c_void);
    Some(owned)
}

pub(crate) fn usec_from_duration(duration: time::Duration) -> u64 {
    let sub_usecs = u64::from(duration.subsec_micros());
    duration.as_secs() * 1_000_000 + sub_usecs
}

pub(crate) fn system_time_from_realtime_usec(usec: u64) -> time::SystemTime {
    time::UNIX_EPOCH + time::Duration::from_micros(usec)
}

pub(crate) fn realtime_usec_from_system_time(t: time::SystemTime) -> u64 {
    t.duration_since(time::UNIX_EPOCH)
        .map(usec_from_duration)
        .unwrap_or(0)
}
