//! High-level interface to the systemd journal.
//!
//! The main interface for writing to the journal is [`send`] (and the
//! [`JournalLog`] logger built on it); the main interface for reading the
//! journal is [`Journal`], created through [`OpenOptions`].

use super::{
    ffi_result, realtime_usec_from_system_time, system_time_from_realtime_usec, Result,
};
use crate::logging;
use cstr_argument::CStrArgument;
use sampled_sys::array_to_iovecs;
use sampled_sys::journal as ffi;
use foreign_types::{foreign_type, ForeignType, ForeignTypeRef};
use libc::{c_int, c_void, size_t};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::collections::BTreeMap;
use std::io::{Error, ErrorKind, Write};
use std::{fmt, ptr, slice, time};

/// Syslog severities, as stored in the journal's `PRIORITY` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Priority {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

impl Priority {
    pub const ALL: [Priority; 8] = [
        Priority::Emergency,
        Priority::Alert,
        Priority::Critical,
        Priority::Error,
        Priority::Warning,
        Priority::Notice,
        Priority::Info,
        Priority::Debug,
    ];

    /// Look up a numeric syslog level (0 through 7).
    pub fn from_level(level: i64) -> Option<Priority> {
        usize::try_from(level)
            .ok()
            .and_then(|i| Priority::ALL.get(i).copied())
    }

    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Priority::Emergency => "Emergency",
            Priority::Alert => "Alert",
            Priority::Critical => "Critical",
            Priority::Error => "Error",
            Priority::Warning => "Warning",
            Priority::Notice => "Notice",
            Priority::Info => "Info",
            Priority::Debug => "Debug",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Level> for Priority {
    fn from(level: Level) -> Priority {
        match level {
            Level::Error => Priority::Error,
            Level::Warn => Priority::Warning,
            Level::Info => Priority::Info,
            Level::Debug | Level::Trace => Priority::Debug,
        }
    }
}

/// Send preformatted fields to systemd.
///
/// This is a relatively low-level operation and probably not suitable unless
/// you need precise control over which fields are sent to systemd.
pub fn send(args: &[&str]) -> c_int {
    let iovecs = array_to_iovecs(args);
    unsafe { ffi::sd_journal_sendv(iovecs.as_ptr(), iovecs.len() as c_int) }
}

/// Like [`send`], but reports failure as an `io::Error`.
pub fn send_result(args: &[&str]) -> Result<()> {
    ffi_result(send(args)).map(|_| ())
}

/// Send a simple message to systemd-journald.
pub fn print(priority: Priority, s: &str) -> c_int {
    send(&[
        &format!("PRIORITY={}", priority.level()),
        &format!("MESSAGE={s}"),
    ])
}

/// Send a `log::Record` to systemd-journald, tagged with `identifier`.
pub fn log_record(identifier: &str, record: &Record<'_>) {
    let mut keys = vec![
        format!("PRIORITY={}", Priority::from(record.level()).level()),
        format!("MESSAGE={}", record.args()),
        format!("SYSLOG_IDENTIFIER={identifier}"),
        format!("TARGET={}", record.target()),
    ];

    if let Some(line) = record.line() {
        keys.push(format!("CODE_LINE={line}"));
    }
    if let Some(file) = record.file() {
        keys.push(format!("CODE_FILE={file}"));
    }
    if let Some(module_path) = record.module_path() {
        keys.push(format!("CODE_FUNCTION={module_path}"));
    }

    let str_keys = keys.iter().map(AsRef::as_ref).collect::<Vec<_>>();
    send(&str_keys);
}

/// Logger implementation over systemd-journald.
///
/// With `echo_stderr` set every record is also written to standard error,
/// in the same format as [`StderrSink`](crate::logging::StderrSink).
pub struct JournalLog {
    identifier: String,
    echo_stderr: bool,
}

impl Log for JournalLog {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        log_record(&self.identifier, record);
        if let Some(line) = self.echo_line(record) {
            let _ = std::io::stderr().lock().write_all(line.as_bytes());
        }
    }

    fn flush(&self) {
        // There is no flushing required.
    }
}

impl JournalLog {
    pub fn new(identifier: &str, echo_stderr: bool) -> JournalLog {
        JournalLog {
            identifier: identifier.to_owned(),
            echo_stderr,
        }
    }

    /// Install a journal logger as the `log` facade backend.
    pub fn init(
        identifier: &str,
        max_level: LevelFilter,
        echo_stderr: bool,
    ) -> std::result::Result<(), SetLoggerError> {
        let logger = Box::leak(Box::new(JournalLog::new(identifier, echo_stderr)));
        log::set_logger(logger)?;
        log::set_max_level(max_level);
        Ok(())
    }

    fn echo_line(&self, record: &Record<'_>) -> Option<String> {
        if !self.echo_stderr {
            return None;
        }
        Some(logging::stderr_line(
            &self.identifier,
            Priority::from(record.level()),
            &record.args().to_string(),
            &[],
        ))
    }
}

/// A single log entry from journal: its realtime timestamp plus every field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JournalEntry {
    pub timestamp: time::SystemTime,
    pub fields: JournalRecord,
}

/// The fields of a journal entry, by name.
pub type JournalRecord = BTreeMap<String, String>;

/// Split a `FIELD=value` journal data blob.
fn split_field(data: &[u8]) -> Option<(&[u8], &[u8])> {
    memchr::memchr(b'=', data).map(|eq| (&data[..eq], &data[eq + 1..]))
}

/// Represents the set of journal files to read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpenOptions {
    current_user: bool,
    system: bool,
    local_only: bool,
}

impl OpenOptions {
    /// Open the journal of the current user. Combines with `system`.
    pub fn current_user(&mut self, current_user: bool) -> &mut Self {
        self.current_user = current_user;
        self
    }

    /// Open the system journal. If neither this nor `current_user` is set,
    /// all journal files the caller may read are opened.
    pub fn system(&mut self, system: bool) -> &mut Self {
        self.system = system;
        self
    }

    /// Only include entries originating from localhost.
    pub fn local_only(&mut self, local_only: bool) -> &mut Self {
        self.local_only = local_only;
        self
    }

    fn flags(&self) -> c_int {
        let mut flags = 0;
        if self.current_user {
            flags |= ffi::SD_JOURNAL_CURRENT_USER;
        }
        if self.system {
            flags |= ffi::SD_JOURNAL_SYSTEM;
        }
        if self.local_only {
            flags |= ffi::SD_JOURNAL_LOCAL_ONLY;
        }
        flags
    }

    /// Open the systemd journal for reading, positioned at its head.
    pub fn open(&self) -> Result<Journal> {
        let mut jp = ptr::null_mut();
        ffi_result(unsafe { ffi::sd_journal_open(&mut jp, self.flags()) })?;
        let mut journal = unsafe { Journal::from_ptr(jp) };
        journal.seek_head()?;
        Ok(journal)
    }

    /// Open the journal files in a specific directory, positioned at their
    /// head. The other options do not apply here and are ignored.
    pub fn open_directory<A: CStrArgument>(&self, path: A) -> Result<Journal> {
        let path = path
            .try_into_cstr()
            .map_err(|_| Error::new(ErrorKind::InvalidInput, "journal path contains a nul byte"))?;
        let mut jp = ptr::null_mut();
        ffi_result(unsafe {
            ffi::sd_journal_open_directory(&mut jp, path.as_ref().as_ptr(), 0)
        })?;
        let mut journal = unsafe { Journal::from_ptr(jp) };
        journal.seek_head()?;
        Ok(journal)
    }
}

foreign_type! {
    /// A reader for systemd journal.
    ///
    /// Supports filtering with matches, seeking and forward iteration.
    pub unsafe type Journal: Send {
        type CType = ffi::sd_journal;
        fn drop = ffi::sd_journal_close;
    }
}

impl JournalRef {
    /// Move to the next entry. Returns `false` at the end of the journal.
    pub fn next(&mut self) -> Result<bool> {
        let ret = ffi_result(unsafe { ffi::sd_journal_next(self.as_ptr()) })?;
        Ok(ret > 0)
    }

    /// Seek to the first entry of the journal.
    pub fn seek_head(&mut self) -> Result<()> {
        ffi_result(unsafe { ffi::sd_journal_seek_head(self.as_ptr()) })?;
        Ok(())
    }

    /// Seek to the first entry at or after `since`. Call [`next`] afterwards
    /// to land on it.
    ///
    /// [`next`]: JournalRef::next
    pub fn seek_realtime(&mut self, since: time::SystemTime) -> Result<()> {
        let usec = realtime_usec_from_system_time(since);
        ffi_result(unsafe { ffi::sd_journal_seek_realtime_usec(self.as_ptr(), usec) })?;
        Ok(())
    }

    /// Returns timestamp at which current journal entry is recorded.
    pub fn timestamp(&self) -> Result<time::SystemTime> {
        let mut timestamp_us: u64 = 0;
        ffi_result(unsafe {
            ffi::sd_journal_get_realtime_usec(self.as_ptr(), &mut timestamp_us)
        })?;
        Ok(system_time_from_realtime_usec(timestamp_us))
    }

    /// Collect every field of the current entry.
    pub fn record(&self) -> Result<JournalRecord> {
        unsafe { ffi::sd_journal_restart_data(self.as_ptr()) }

        let mut ret = JournalRecord::new();
        let mut data: *const c_void = ptr::null();
        let mut sz: size_t = 0;
        while ffi_result(unsafe {
            ffi::sd_journal_enumerate_data(self.as_ptr(), &mut data, &mut sz)
        })? > 0
        {
            let b = unsafe { slice::from_raw_parts(data as *const u8, sz) };
            if let Some((name, value)) = split_field(b) {
                ret.insert(
                    String::from_utf8_lossy(name).into_owned(),
                    String::from_utf8_lossy(value).into_owned(),
                );
            }
        }
        Ok(ret)
    }

    /// Advance and read the next entry. Returns `Ok(None)` if there are no
    /// more entries to read.
    pub fn next_entry(&mut self) -> Result<Option<JournalEntry>> {
        if !self.next()? {
            return Ok(None);
        }
        Ok(Some(JournalEntry {
            timestamp: self.timestamp()?,
            fields: self.record()?,
        }))
    }

    /// Adds a match by which to filter the entries of the journal.
    /// If a match is applied, only entries with this field set will be iterated.
    /// Matches on the same field are combined with OR, different fields with AND.
    pub fn match_add<T: Into<Vec<u8>>>(&mut self, key: &str, val: T) -> Result<&mut JournalRef> {
        let mut filter = Vec::<u8>::from(key);
        filter.push(b'=');
        filter.extend(val.into());
        let data = filter.as_ptr() as *const c_void;
        let datalen = filter.len() as size_t;
        ffi_result(unsafe { ffi::sd_journal_add_match(self.as_ptr(), data, datalen) })?;
        Ok(self)
    }

    /// Inserts a conjunction (i.e. logical AND) in the match list.
    pub fn match_and(&mut self) -> Result<&mut JournalRef> {
        ffi_result(unsafe { ffi::sd_journal_add_conjunction(self.as_ptr()) })?;
        Ok(self)
    }

    /// Flushes all matches, disjunction and conjunction terms.
    /// After this call all filtering is removed and all entries in
    /// the journal will be iterated again.
    pub fn match_flush(&mut self) -> Result<&mut JournalRef> {
        unsafe { ffi::sd_journal_flush_matches(self.as_ptr()) };
        Ok(self)
    }
}
