use super::{c_char, c_int, pid_t};

extern "C" {
    pub fn sd_pid_get_unit(pid: pid_t, unit: *mut *mut c_char) -> c_int;
    pub fn sd_pid_get_user_unit(pid: pid_t, unit: *mut *mut c_char) -> c_int;
}
