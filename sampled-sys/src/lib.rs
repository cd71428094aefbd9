//! Raw declarations for the libsystemd entry points sampled relies on:
//! socket activation and readiness notification (`sd-daemon`), the journal
//! (`sd-journal`) and process unit lookup (`sd-login`).
//!
//! Everything here mirrors the C headers; see the systemd man pages for the
//! semantics. The safe layer lives in the `sampled` crate.

pub use libc::{pid_t, size_t};
pub use std::os::raw::{c_char, c_int, c_void};

pub mod daemon;
pub mod journal;
pub mod login;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ConstIovec {
    pub iov_base: *const c_void,
    pub iov_len: size_t,
}

/// Borrow each string as an iovec, for `sd_journal_sendv()`.
///
/// The returned vector must not outlive `args`.
pub fn array_to_iovecs(args: &[&str]) -> Vec<ConstIovec> {
    args.iter()
        .map(|d| ConstIovec {
            iov_base: d.as_ptr() as *const c_void,
            iov_len: d.len() as size_t,
        })
        .collect()
}
