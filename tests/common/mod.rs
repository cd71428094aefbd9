#![allow(dead_code)]

use sampled::accept::Acceptor;
use sampled::error::WaitError;
use sampled::logging::{Logger, MemorySink};
use sampled::readiness::{ConnectionEvent, Monitor, Readiness};
use sampled::session::{Connection, Peer, ResolveError, WrapError};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::{self, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::rc::Rc;

pub fn memory_logger() -> (Logger, MemorySink) {
    let sink = MemorySink::new();
    (Logger::new("sampled", vec![Box::new(sink.clone())]), sink)
}

/// Plays back a fixed sequence of readiness results, then reports closure.
pub struct ScriptedMonitor {
    script: VecDeque<Result<Readiness, WaitError>>,
}

impl ScriptedMonitor {
    pub fn new<I: IntoIterator<Item = Result<Readiness, WaitError>>>(script: I) -> Self {
        ScriptedMonitor {
            script: script.into_iter().collect(),
        }
    }
}

impl Monitor for ScriptedMonitor {
    fn wait(&mut self) -> Result<Readiness, WaitError> {
        self.script.pop_front().unwrap_or(Ok(Readiness::Closed))
    }
}

pub fn ready(listener: RawFd) -> Result<Readiness, WaitError> {
    Ok(Readiness::Ready(ConnectionEvent { listener }))
}

/// Bookkeeping shared by a fake connection and the stream it turns into.
#[derive(Clone, Default)]
pub struct Tally {
    pub closes: Rc<Cell<usize>>,
    pub written: Rc<RefCell<Vec<u8>>>,
}

impl Tally {
    pub fn closes(&self) -> usize {
        self.closes.get()
    }

    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.written.borrow()).into_owned()
    }
}

pub struct FakeConnection {
    pub fd: RawFd,
    pub peer: Result<Peer, ResolveError>,
    pub wrap_fails: bool,
    pub write_fails: bool,
    pub tally: Tally,
    owns_fd: bool,
}

impl FakeConnection {
    pub fn new(fd: RawFd, tally: &Tally) -> Self {
        FakeConnection {
            fd,
            peer: Ok(Peer {
                host: format!("192.0.2.{fd}"),
                port: format!("{}", 40000 + fd),
            }),
            wrap_fails: false,
            write_fails: false,
            tally: tally.clone(),
            owns_fd: true,
        }
    }

    pub fn unresolvable(mut self) -> Self {
        self.peer = Err(ResolveError {
            code: -6,
            message: String::from("ai_family not supported"),
        });
        self
    }

    pub fn wrap_fails(mut self) -> Self {
        self.wrap_fails = true;
        self
    }

    pub fn write_fails(mut self) -> Self {
        self.write_fails = true;
        self
    }
}

impl AsRawFd for FakeConnection {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        if self.owns_fd {
            self.tally.closes.set(self.tally.closes.get() + 1);
        }
    }
}

impl Connection for FakeConnection {
    type Stream = FakeStream;

    fn peer(&self) -> Result<Peer, ResolveError> {
        self.peer.clone()
    }

    fn into_stream(mut self) -> Result<FakeStream, WrapError<FakeConnection>> {
        if self.wrap_fails {
            return Err(WrapError {
                error: io::Error::from_raw_os_error(libc::EMFILE),
                connection: self,
            });
        }
        self.owns_fd = false;
        Ok(FakeStream {
            tally: self.tally.clone(),
            fails: self.write_fails,
        })
    }
}

pub struct FakeStream {
    tally: Tally,
    fails: bool,
}

impl Write for FakeStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fails {
            return Err(io::Error::from_raw_os_error(libc::EPIPE));
        }
        self.tally.written.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.tally.closes.set(self.tally.closes.get() + 1);
    }
}

/// Hands out prepared accept outcomes in order.
pub struct ScriptedAcceptor {
    outcomes: VecDeque<io::Result<FakeConnection>>,
    pub events: Vec<ConnectionEvent>,
}

impl ScriptedAcceptor {
    pub fn new<I: IntoIterator<Item = io::Result<FakeConnection>>>(outcomes: I) -> Self {
        ScriptedAcceptor {
            outcomes: outcomes.into_iter().collect(),
            events: Vec::new(),
        }
    }
}

impl Acceptor for ScriptedAcceptor {
    type Connection = FakeConnection;

    fn accept(&mut self, event: ConnectionEvent) -> io::Result<FakeConnection> {
        self.events.push(event);
        self.outcomes
            .pop_front()
            .unwrap_or_else(|| Err(io::Error::from_raw_os_error(libc::EAGAIN)))
    }
}
