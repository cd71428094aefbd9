//! Structured event records and the sinks they are written to.
//!
//! Components receive a [`Logger`] when they are built instead of reaching
//! for a process-wide handle. Attributes travel with the single record they
//! belong to, so nothing set for one peer can show up on the next record.

use crate::journal::{self, Priority};
use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

/// Journal field naming the sender of a record.
pub const FIELD_IDENTIFIER: &str = "SYSLOG_IDENTIFIER";
/// Journal field holding the numeric address of a connected peer.
pub const FIELD_REMOTE_HOST: &str = "REMOTE_HOST";
/// Journal field holding the numeric port of a connected peer.
pub const FIELD_REMOTE_PORT: &str = "REMOTE_PORT";

/// One structured event, borrowed for the duration of a write.
#[derive(Clone, Copy, Debug)]
pub struct Record<'a> {
    pub identifier: &'a str,
    pub priority: Priority,
    pub message: &'a str,
    pub fields: &'a [(&'a str, &'a str)],
}

/// Somewhere records go.
pub trait Sink {
    fn emit(&self, record: &Record<'_>);
}

/// Writes records to the systemd journal.
#[derive(Clone, Copy, Debug, Default)]
pub struct JournalSink;

impl Sink for JournalSink {
    fn emit(&self, record: &Record<'_>) {
        let mut keys = vec![
            format!("PRIORITY={}", record.priority.level()),
            format!("MESSAGE={}", record.message),
            format!("{FIELD_IDENTIFIER}={}", record.identifier),
        ];
        keys.extend(record.fields.iter().map(|(k, v)| format!("{k}={v}")));

        let str_keys = keys.iter().map(AsRef::as_ref).collect::<Vec<_>>();
        // Nowhere left to report a failing journal; other sinks still run.
        let _ = journal::send_result(&str_keys);
    }
}

/// Writes records to standard error, one line each.
#[derive(Clone, Copy, Debug, Default)]
pub struct StderrSink;

impl Sink for StderrSink {
    fn emit(&self, record: &Record<'_>) {
        let line = stderr_line(
            record.identifier,
            record.priority,
            record.message,
            record.fields,
        );
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
    }
}

/// Format one record the way it appears on standard error, newline included.
pub(crate) fn stderr_line(
    identifier: &str,
    priority: Priority,
    message: &str,
    fields: &[(&str, &str)],
) -> String {
    let mut line = format!(
        "{identifier}[{}] <{priority}>: {message}",
        std::process::id()
    );
    for (k, v) in fields {
        line.push_str(&format!(" {k}={v}"));
    }
    line.push('\n');
    line
}

/// A record as kept by [`MemorySink`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedRecord {
    pub identifier: String,
    pub priority: Priority,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl OwnedRecord {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Keeps every record in memory. Clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    records: Rc<RefCell<Vec<OwnedRecord>>>,
}

impl MemorySink {
    pub fn new() -> MemorySink {
        MemorySink::default()
    }

    pub fn records(&self) -> Vec<OwnedRecord> {
        self.records.borrow().clone()
    }
}

impl Sink for MemorySink {
    fn emit(&self, record: &Record<'_>) {
        self.records.borrow_mut().push(OwnedRecord {
            identifier: record.identifier.to_owned(),
            priority: record.priority,
            message: record.message.to_owned(),
            fields: record
                .fields
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        });
    }
}

/// Cheaply clonable handle stamping records with a sender identity and
/// handing them to every configured sink.
#[derive(Clone)]
pub struct Logger {
    identifier: Rc<str>,
    sinks: Rc<[Box<dyn Sink>]>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("identifier", &self.identifier)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl Logger {
    pub fn new(identifier: &str, sinks: Vec<Box<dyn Sink>>) -> Logger {
        Logger {
            identifier: Rc::from(identifier),
            sinks: Rc::from(sinks),
        }
    }

    /// Emit one record carrying `fields` and nothing else.
    pub fn log(&self, priority: Priority, message: &str, fields: &[(&str, &str)]) {
        let record = Record {
            identifier: &self.identifier,
            priority,
            message,
            fields,
        };
        for sink in self.sinks.iter() {
            sink.emit(&record);
        }
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.log(Priority::Error, &message.to_string(), &[]);
    }

    pub fn warning(&self, message: impl fmt::Display) {
        self.log(Priority::Warning, &message.to_string(), &[]);
    }

    pub fn notice(&self, message: impl fmt::Display) {
        self.log(Priority::Notice, &message.to_string(), &[]);
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.log(Priority::Debug, &message.to_string(), &[]);
    }
}
