use super::{free_cstring, Result};
use sampled_sys::login as ffi;
use libc::{c_char, pid_t};
use std::io::{Error, ErrorKind};
use std::ptr;

/// Systemd slice and unit types
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitType {
    /// User slice, service or scope unit
    UserUnit,
    /// System slice, service or scope unit
    SystemUnit,
}

/// Determines the systemd unit (i.e. service or scope unit) identifier of a process.
///
/// Specific processes can be optionally targeted via their PID. When no PID is
/// specified, operation is executed for the calling process.
/// This method can be used to retrieve either a system or an user unit identifier.
pub fn get_unit(unit_type: UnitType, pid: Option<pid_t>) -> Result<String> {
    let mut c_unit_name: *mut c_char = ptr::null_mut();
    let p: pid_t = pid.unwrap_or(0);
    match unit_type {
        UnitType::UserUnit => sd_try!(ffi::sd_pid_get_user_unit(p, &mut c_unit_name)),
        UnitType::SystemUnit => sd_try!(ffi::sd_pid_get_unit(p, &mut c_unit_name)),
    };
    unsafe { free_cstring(c_unit_name) }
        .ok_or_else(|| Error::new(ErrorKind::InvalidData, "libsystemd returned no unit name"))
}
