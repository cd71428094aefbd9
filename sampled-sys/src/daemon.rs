use super::{c_char, c_int};

/// First descriptor number passed by the supervisor.
pub const SD_LISTEN_FDS_START: c_int = 3;

extern "C" {
    pub fn sd_listen_fds(unset_environment: c_int) -> c_int;
    pub fn sd_listen_fds_with_names(unset_environment: c_int, names: *mut *mut *mut c_char) -> c_int;
    pub fn sd_is_socket(fd: c_int, family: c_int, sock_type: c_int, listening: c_int) -> c_int;
    pub fn sd_notify(unset_environment: c_int, state: *const c_char) -> c_int;
    pub fn sd_booted() -> c_int;
}
