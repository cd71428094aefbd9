//! The daemon's steady state: wait, accept, hand off, repeat.

use crate::daemon::{self, Listening, SocketType};
use crate::error::{RegistrationError, WaitError};
use crate::logging::Logger;
use crate::readiness::{ConnectionEvent, Monitor, Readiness, ReadinessQueue};
use crate::session::{Accepted, Connection, SessionHandler};
use socket2::Socket;
use std::io;
use std::os::unix::io::{AsFd, AsRawFd, OwnedFd};

/// Accepts a connection on the listener an event names.
pub trait Acceptor {
    type Connection: Connection;

    fn accept(&mut self, event: ConnectionEvent) -> io::Result<Self::Connection>;
}

impl<A: Acceptor + ?Sized> Acceptor for &mut A {
    type Connection = A::Connection;

    fn accept(&mut self, event: ConnectionEvent) -> io::Result<Self::Connection> {
        (**self).accept(event)
    }
}

/// The listening sockets handed over at check-in.
#[derive(Debug)]
pub struct ListenerSet {
    sockets: Vec<Socket>,
}

impl ListenerSet {
    pub fn new(fds: Vec<OwnedFd>) -> ListenerSet {
        ListenerSet {
            sockets: fds.into_iter().map(Socket::from).collect(),
        }
    }

    /// Register every listener with `queue`.
    ///
    /// Each descriptor must be a listening stream socket; it is switched to
    /// non-blocking mode so a connection that vanished before `accept`
    /// fails the accept instead of stalling the loop.
    pub fn register(&self, queue: &ReadinessQueue) -> Result<(), RegistrationError> {
        for socket in &self.sockets {
            let fd = socket.as_raw_fd();
            let listening = daemon::is_socket(
                fd,
                None,
                Some(SocketType::Stream),
                Listening::IsListening,
            )
            .map_err(|source| RegistrationError::Add { fd, source })?;
            if !listening {
                return Err(RegistrationError::NotListening { fd });
            }
            socket
                .set_nonblocking(true)
                .map_err(|source| RegistrationError::Add { fd, source })?;
            queue.register(socket.as_fd())?;
        }
        Ok(())
    }
}

impl Acceptor for ListenerSet {
    type Connection = Accepted;

    fn accept(&mut self, event: ConnectionEvent) -> io::Result<Accepted> {
        let listener = self
            .sockets
            .iter()
            .find(|s| s.as_raw_fd() == event.listener)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EBADF))?;
        let (socket, peer) = listener.accept()?;
        Ok(Accepted::new(socket, peer))
    }
}

/// Serves connections one at a time until the monitor reports closure.
pub struct AcceptLoop<M, A> {
    monitor: M,
    acceptor: A,
    handler: SessionHandler,
    log: Logger,
}

impl<M: Monitor, A: Acceptor> AcceptLoop<M, A> {
    pub fn new(monitor: M, acceptor: A, handler: SessionHandler, log: Logger) -> AcceptLoop<M, A> {
        AcceptLoop {
            monitor,
            acceptor,
            handler,
            log,
        }
    }

    /// Run until the monitor is closed (`Ok`) or fails (`Err`).
    ///
    /// A failed accept is logged and the loop carries on.
    pub fn run(&mut self) -> Result<(), WaitError> {
        loop {
            let event = match self.monitor.wait()? {
                Readiness::Ready(event) => event,
                Readiness::Closed => return Ok(()),
            };

            match self.acceptor.accept(event) {
                Ok(connection) => self.handler.handle(connection),
                Err(e) => self.log.error(format_args!("accept(): {e}")),
            }
        }
    }
}
