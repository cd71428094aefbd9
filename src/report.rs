//! Connection summary built from the daemon's journal records.
//!
//! Typical use:
//!
//! ```text
//! sampled-report -l 4 -s 12 -e 6
//! ```
//!
//! lists every connection logged at Warning or more severe between twelve
//! and six hours ago.

use crate::config::ReportArgs;
use crate::error::{QueryError, UsageError};
use crate::journal::{JournalEntry, JournalRef, OpenOptions, Priority};
use crate::logging::{FIELD_IDENTIFIER, FIELD_REMOTE_HOST};
use chrono::{DateTime, Local};
use std::io::{self, Write};
use std::time::{Duration, SystemTime};

const HOUR: Duration = Duration::from_secs(60 * 60);

/// Validated report arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportOptions {
    pub max_priority: Priority,
    /// Hours before now where the window starts.
    pub start_offset: u32,
    /// Hours before now where the window ends; 0 means "now", unbounded.
    pub end_offset: u32,
}

impl ReportArgs {
    pub fn validate(&self) -> Result<ReportOptions, UsageError> {
        let max_priority = Priority::from_level(self.max_level).ok_or(UsageError::MaxLevel)?;
        let start_offset = u32::try_from(self.start_offset).map_err(|_| UsageError::StartOffset)?;
        let end_offset = u32::try_from(self.end_offset).map_err(|_| UsageError::EndOffset)?;
        if start_offset <= end_offset {
            return Err(UsageError::Interval);
        }
        Ok(ReportOptions {
            max_priority,
            start_offset,
            end_offset,
        })
    }

    /// Which journal files to read. Without `--user` or `--system` every
    /// journal the caller may read is opened.
    pub fn open_options(&self) -> OpenOptions {
        let mut options = OpenOptions::default();
        options
            .current_user(self.user)
            .system(self.system)
            .local_only(self.local);
        options
    }
}

/// Usage text printed alongside a [`UsageError`].
pub const USAGE: &str = "\
usage: sampled-report [-l max_level] [-s start_offset] [-e end_offset]
max_level must be an integer in the range 0 to 7.
Default is 5.
start_offset and end_offset are integers that denote a number
of hours before the time at which the program is run.
Default start_offset is 1 and end_offset is 0 (i.e. messages in the last hour).";

/// Which records to report: all conditions must hold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    pub sender: String,
    pub max_priority: Priority,
    /// Field that must be present and non-empty.
    pub present: &'static str,
    pub since: SystemTime,
    /// Inclusive end of the window, if bounded.
    pub until: Option<SystemTime>,
}

impl Query {
    pub fn new(sender: &str, options: &ReportOptions, now: SystemTime) -> Query {
        let until = match options.end_offset {
            0 => None,
            hours => Some(now - HOUR * hours),
        };
        Query {
            sender: sender.to_owned(),
            max_priority: options.max_priority,
            present: FIELD_REMOTE_HOST,
            since: now - HOUR * options.start_offset,
            until,
        }
    }

    /// Install the sender and priority matches on `journal` and seek to the
    /// start of the window.
    pub fn apply(&self, journal: &mut JournalRef) -> io::Result<()> {
        journal.match_flush()?;
        journal.match_add(FIELD_IDENTIFIER, self.sender.as_str())?;
        journal.match_and()?;
        for priority in Priority::ALL.iter().filter(|p| **p <= self.max_priority) {
            // Same-field matches are alternatives.
            journal.match_add("PRIORITY", priority.level().to_string())?;
        }
        journal.seek_realtime(self.since)
    }

    /// Whether `entry` satisfies every condition of the query.
    pub fn accepts(&self, entry: &JournalEntry) -> bool {
        let field = |name: &str| entry.fields.get(name).map(String::as_str);

        let priority_ok = field("PRIORITY")
            .and_then(|p| p.parse::<i64>().ok())
            .and_then(Priority::from_level)
            .map_or(false, |p| p <= self.max_priority);

        field(FIELD_IDENTIFIER) == Some(self.sender.as_str())
            && priority_ok
            && field(self.present).map_or(false, |v| !v.is_empty())
            && entry.timestamp >= self.since
            && !self.is_past_window(entry)
    }

    fn is_past_window(&self, entry: &JournalEntry) -> bool {
        self.until.map_or(false, |until| entry.timestamp > until)
    }
}

/// A forward-only stream of entries, oldest first.
pub trait EntrySource {
    fn next_entry(&mut self) -> io::Result<Option<JournalEntry>>;
}

impl EntrySource for JournalRef {
    fn next_entry(&mut self) -> io::Result<Option<JournalEntry>> {
        JournalRef::next_entry(self)
    }
}

impl<S: EntrySource + ?Sized> EntrySource for &mut S {
    fn next_entry(&mut self) -> io::Result<Option<JournalEntry>> {
        (**self).next_entry()
    }
}

/// Entries matching a query, read lazily. Ends at the first entry past the
/// window or the first error.
pub struct Matches<'q, S> {
    query: &'q Query,
    source: S,
    done: bool,
}

impl<'q, S: EntrySource> Iterator for Matches<'q, S> {
    type Item = io::Result<JournalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.source.next_entry() {
                // Entries come in journal order, so this reads no further than
                // the window. One that a backwards clock step logged later
                // with an earlier timestamp is not reported.
                Ok(Some(entry)) if self.query.is_past_window(&entry) => self.done = true,
                Ok(Some(entry)) if self.query.accepts(&entry) => return Some(Ok(entry)),
                Ok(Some(_)) => {}
                Ok(None) => self.done = true,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

/// Filter `source` through `query`.
pub fn search<S: EntrySource>(query: &Query, source: S) -> Matches<'_, S> {
    Matches {
        query,
        source,
        done: false,
    }
}

/// Format a timestamp for the report's first column.
pub fn format_time(t: SystemTime) -> String {
    DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn row<W: Write>(out: &mut W, time: &str, host: &str) -> io::Result<()> {
    writeln!(out, "{time:<25} {host}")
}

/// Write the report for `matches`: nothing at all if there are none,
/// otherwise a header and one row per match. Returns the number of rows.
pub fn render<W, I>(out: &mut W, matches: I) -> Result<usize, QueryError>
where
    W: Write,
    I: IntoIterator<Item = io::Result<JournalEntry>>,
{
    let mut rows = 0;
    for entry in matches {
        let entry = entry.map_err(QueryError::Search)?;
        if rows == 0 {
            row(out, "Time", "IP Address").map_err(QueryError::Output)?;
        }
        let host = entry
            .fields
            .get(FIELD_REMOTE_HOST)
            .map(String::as_str)
            .unwrap_or_default();
        row(out, &format_time(entry.timestamp), host).map_err(QueryError::Output)?;
        rows += 1;
    }
    out.flush().map_err(QueryError::Output)?;
    Ok(rows)
}

/// Open the journal `args` names, run `query` and print the report.
pub fn run<W: Write>(args: &ReportArgs, query: &Query, out: &mut W) -> Result<usize, QueryError> {
    let options = args.open_options();
    let mut journal = match &args.directory {
        Some(dir) => options.open_directory(dir.as_str()),
        None => options.open(),
    }
    .map_err(QueryError::Open)?;

    query.apply(&mut journal).map_err(QueryError::Match)?;
    render(out, search(query, &mut *journal))
}
