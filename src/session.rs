//! Per-connection work: log the peer, greet it, hang up.
//!
//! Nothing in here reports failure to the caller. Every error is logged and
//! the connection's descriptor is closed on every path, exactly once, by
//! dropping whichever value owns it at that point.

use crate::journal::Priority;
use crate::logging::{Logger, FIELD_REMOTE_HOST, FIELD_REMOTE_PORT};
use libc::c_char;
use socket2::{SockAddr, Socket};
use std::ffi::CStr;
use std::fmt;
use std::io::{self, BufWriter, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::thread;
use std::time::Duration;

/// What every peer is told.
pub const GREETING: &str = "hello world!";

/// Numeric address and port of a peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Peer {
    pub host: String,
    pub port: String,
}

/// The peer address could not be turned into numeric host and port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolveError {
    pub code: i32,
    pub message: String,
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ResolveError {}

/// A connection could not be turned into a stream; it comes back unchanged.
#[derive(Debug)]
pub struct WrapError<C> {
    pub error: io::Error,
    pub connection: C,
}

/// An accepted connection, owning its descriptor.
pub trait Connection: AsRawFd + Sized {
    type Stream: Write;

    fn peer(&self) -> Result<Peer, ResolveError>;

    /// Prepare the descriptor for writing the greeting.
    fn into_stream(self) -> Result<Self::Stream, WrapError<Self>>;
}

/// Resolve a socket address to numeric host and port with `getnameinfo`.
pub fn resolve(addr: &SockAddr) -> Result<Peer, ResolveError> {
    let mut host = [0 as c_char; 1025];
    let mut port = [0 as c_char; 32];
    let ret = unsafe {
        libc::getnameinfo(
            addr.as_ptr() as *const libc::sockaddr,
            addr.len(),
            host.as_mut_ptr(),
            host.len() as libc::socklen_t,
            port.as_mut_ptr(),
            port.len() as libc::socklen_t,
            libc::NI_NUMERICHOST | libc::NI_NUMERICSERV,
        )
    };
    if ret != 0 {
        let message = unsafe { CStr::from_ptr(libc::gai_strerror(ret)) }
            .to_string_lossy()
            .into_owned();
        return Err(ResolveError { code: ret, message });
    }

    let (host, port) = unsafe { (CStr::from_ptr(host.as_ptr()), CStr::from_ptr(port.as_ptr())) };
    Ok(Peer {
        host: host.to_string_lossy().into_owned(),
        port: port.to_string_lossy().into_owned(),
    })
}

/// A connection accepted from one of the listening sockets.
#[derive(Debug)]
pub struct Accepted {
    socket: Socket,
    peer: SockAddr,
}

impl Accepted {
    pub fn new(socket: Socket, peer: SockAddr) -> Accepted {
        Accepted { socket, peer }
    }
}

impl AsRawFd for Accepted {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

impl Connection for Accepted {
    type Stream = Socket;

    fn peer(&self) -> Result<Peer, ResolveError> {
        resolve(&self.peer)
    }

    fn into_stream(self) -> Result<Socket, WrapError<Accepted>> {
        // Some platforms hand out accepted sockets with the listener's
        // O_NONBLOCK; the greeting is written with blocking semantics.
        match self.socket.set_nonblocking(false) {
            Ok(()) => Ok(self.socket),
            Err(error) => Err(WrapError {
                error,
                connection: self,
            }),
        }
    }
}

/// Greets one connection at a time.
#[derive(Debug)]
pub struct SessionHandler {
    log: Logger,
    linger: Duration,
}

impl SessionHandler {
    pub fn new(log: Logger, linger: Duration) -> SessionHandler {
        SessionHandler { log, linger }
    }

    pub fn handle<C: Connection>(&self, connection: C) {
        match connection.peer() {
            Ok(peer) => self.log.log(
                Priority::Notice,
                "Connection established",
                &[
                    (FIELD_REMOTE_HOST, peer.host.as_str()),
                    (FIELD_REMOTE_PORT, peer.port.as_str()),
                ],
            ),
            Err(e) => self.log.notice(format_args!("getnameinfo(): {e}")),
        }

        self.log
            .debug(format_args!("got file descriptor {}", connection.as_raw_fd()));

        match connection.into_stream() {
            Ok(stream) => self.greet(stream),
            Err(WrapError { error, connection }) => {
                self.log.error(format_args!(
                    "unable to open a stream on descriptor {}: {error}",
                    connection.as_raw_fd()
                ));
                drop(connection);
            }
        }

        if !self.linger.is_zero() {
            thread::sleep(self.linger);
        }
    }

    fn greet<S: Write>(&self, stream: S) {
        let mut out = BufWriter::new(stream);
        let written = writeln!(out, "{GREETING}").and_then(|()| out.flush());
        if let Err(e) = written {
            self.log.error(format_args!("unable to greet peer: {e}"));
        }
        // Drop the stream without retrying whatever is still buffered.
        let (stream, _unwritten) = out.into_parts();
        drop(stream);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;
    use std::net::SocketAddr;

    #[test]
    fn numeric_host_and_port() {
        let addr: SocketAddr = "192.0.2.1:4242".parse().unwrap();
        assert_eq!(
            resolve(&SockAddr::from(addr)),
            Ok(Peer {
                host: "192.0.2.1".to_owned(),
                port: "4242".to_owned(),
            })
        );
    }

    #[test]
    fn unknown_family_reports_resolver_error() {
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        storage.ss_family = libc::AF_NETLINK as libc::sa_family_t;
        let len = mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t;
        let addr = unsafe { SockAddr::new(storage, len) };

        let err = resolve(&addr).unwrap_err();
        assert_eq!(err.code, libc::EAI_FAMILY);
        assert!(!err.message.is_empty());
    }
}
