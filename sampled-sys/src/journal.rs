#![allow(non_camel_case_types)]

use super::ConstIovec;
use super::{c_char, c_int, c_void, size_t};

pub const SD_JOURNAL_LOCAL_ONLY: c_int = 1;
pub const SD_JOURNAL_SYSTEM: c_int = 4;
pub const SD_JOURNAL_CURRENT_USER: c_int = 8;

/// Opaque journal reader context.
#[repr(C)]
pub struct sd_journal {
    _private: [u8; 0],
}

extern "C" {
    pub fn sd_journal_sendv(iv: *const ConstIovec, n: c_int) -> c_int;

    pub fn sd_journal_open(ret: *mut *mut sd_journal, flags: c_int) -> c_int;
    pub fn sd_journal_open_directory(
        ret: *mut *mut sd_journal,
        path: *const c_char,
        flags: c_int,
    ) -> c_int;
    pub fn sd_journal_close(j: *mut sd_journal);

    pub fn sd_journal_next(j: *mut sd_journal) -> c_int;
    pub fn sd_journal_get_realtime_usec(j: *mut sd_journal, ret: *mut u64) -> c_int;

    pub fn sd_journal_enumerate_data(
        j: *mut sd_journal,
        data: *mut *const c_void,
        l: *mut size_t,
    ) -> c_int;
    pub fn sd_journal_restart_data(j: *mut sd_journal);

    pub fn sd_journal_add_match(j: *mut sd_journal, data: *const c_void, size: size_t) -> c_int;
    pub fn sd_journal_add_conjunction(j: *mut sd_journal) -> c_int;
    pub fn sd_journal_flush_matches(j: *mut sd_journal);

    pub fn sd_journal_seek_head(j: *mut sd_journal) -> c_int;
    pub fn sd_journal_seek_realtime_usec(j: *mut sd_journal, usec: u64) -> c_int;
}
