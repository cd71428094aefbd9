//! Readiness notification for the listening descriptors, on `epoll`.
//!
//! A termination signal (SIGTERM from the supervisor, SIGINT interactively)
//! is read through a `signalfd` registered in the same queue and surfaces as
//! [`Readiness::Closed`], the clean shutdown sentinel.

use crate::error::{RegistrationError, WaitError};
use libc::c_int;
use std::io::{self, ErrorKind};
use std::mem;
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;

const SIGNAL_TOKEN: u64 = u64::MAX;

fn cvt(ret: c_int) -> io::Result<c_int> {
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

/// A listening descriptor has a connection waiting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub listener: RawFd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    Ready(ConnectionEvent),
    /// Nothing more will arrive; shut down cleanly.
    Closed,
}

/// Blocks until a registered descriptor is ready, one event per call.
pub trait Monitor {
    fn wait(&mut self) -> Result<Readiness, WaitError>;
}

impl<M: Monitor + ?Sized> Monitor for &mut M {
    fn wait(&mut self) -> Result<Readiness, WaitError> {
        (**self).wait()
    }
}

/// The process' one readiness queue.
#[derive(Debug)]
pub struct ReadinessQueue {
    epoll: OwnedFd,
    signals: Option<OwnedFd>,
}

impl ReadinessQueue {
    pub fn new() -> Result<ReadinessQueue, RegistrationError> {
        let fd = cvt(unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) })
            .map_err(RegistrationError::Create)?;
        Ok(ReadinessQueue {
            epoll: unsafe { OwnedFd::from_raw_fd(fd) },
            signals: None,
        })
    }

    /// Deliver a [`ConnectionEvent`] whenever `fd` becomes readable.
    pub fn register(&self, fd: BorrowedFd<'_>) -> Result<(), RegistrationError> {
        let raw = fd.as_raw_fd();
        self.add(raw, raw as u64)
    }

    fn add(&self, fd: RawFd, token: u64) -> Result<(), RegistrationError> {
        let mut event = libc::epoll_event {
            events: libc::EPOLLIN as u32,
            u64: token,
        };
        cvt(unsafe {
            libc::epoll_ctl(self.epoll.as_raw_fd(), libc::EPOLL_CTL_ADD, fd, &mut event)
        })
        .map_err(|source| RegistrationError::Add { fd, source })?;
        log::debug!("watching descriptor {fd}");
        Ok(())
    }

    /// Turn SIGTERM and SIGINT into [`Readiness::Closed`].
    ///
    /// The signals are blocked for the calling thread, which must be the one
    /// that waits.
    pub fn watch_termination(&mut self) -> Result<(), RegistrationError> {
        let fd = unsafe {
            let mut set: libc::sigset_t = mem::zeroed();
            libc::sigemptyset(&mut set);
            libc::sigaddset(&mut set, libc::SIGTERM);
            libc::sigaddset(&mut set, libc::SIGINT);

            let ret = libc::pthread_sigmask(libc::SIG_BLOCK, &set, ptr::null_mut());
            if ret != 0 {
                return Err(RegistrationError::Signals(io::Error::from_raw_os_error(ret)));
            }
            let fd = cvt(libc::signalfd(-1, &set, libc::SFD_CLOEXEC))
                .map_err(RegistrationError::Signals)?;
            OwnedFd::from_raw_fd(fd)
        };
        self.add(fd.as_raw_fd(), SIGNAL_TOKEN)?;
        self.signals = Some(fd);
        Ok(())
    }

    fn drain_signal(&self) {
        let Some(signals) = self.signals.as_ref() else {
            return;
        };
        let mut info: libc::signalfd_siginfo = unsafe { mem::zeroed() };
        let size = mem::size_of::<libc::signalfd_siginfo>();
        let n = unsafe {
            libc::read(
                signals.as_raw_fd(),
                &mut info as *mut libc::signalfd_siginfo as *mut libc::c_void,
                size,
            )
        };
        if n == size as isize {
            log::info!("received signal {}, shutting down", info.ssi_signo);
        } else {
            log::debug!("signalfd read: {}", io::Error::last_os_error());
        }
    }
}

impl AsFd for ReadinessQueue {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.epoll.as_fd()
    }
}

impl Monitor for ReadinessQueue {
    fn wait(&mut self) -> Result<Readiness, WaitError> {
        let mut event = libc::epoll_event { events: 0, u64: 0 };
        let n = loop {
            match cvt(unsafe { libc::epoll_wait(self.epoll.as_raw_fd(), &mut event, 1, -1) }) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(WaitError(e)),
            }
        };
        if n == 0 {
            return Ok(Readiness::Closed);
        }

        let token = event.u64;
        if token == SIGNAL_TOKEN {
            self.drain_signal();
            return Ok(Readiness::Closed);
        }
        Ok(Readiness::Ready(ConnectionEvent {
            listener: token as RawFd,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::net::{TcpListener, TcpStream};

    #[test]
    fn listener_with_pending_connection_is_ready() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut queue = ReadinessQueue::new().unwrap();
        queue.register(listener.as_fd()).unwrap();

        let _client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();

        assert_eq!(
            queue.wait().unwrap(),
            Readiness::Ready(ConnectionEvent {
                listener: listener.as_raw_fd()
            })
        );
    }

    #[test]
    fn termination_signal_closes_the_queue() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut queue = ReadinessQueue::new().unwrap();
        queue.register(listener.as_fd()).unwrap();
        queue.watch_termination().unwrap();

        // SIGTERM is now blocked for this thread, so it stays pending on the
        // signalfd instead of killing the test process.
        let ret = unsafe { libc::pthread_kill(libc::pthread_self(), libc::SIGTERM) };
        assert_eq!(ret, 0);

        assert_eq!(queue.wait().unwrap(), Readiness::Closed);
    }

    #[test]
    fn registering_twice_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let queue = ReadinessQueue::new().unwrap();
        queue.register(listener.as_fd()).unwrap();

        match queue.register(listener.as_fd()) {
            Err(RegistrationError::Add { fd, source }) => {
                assert_eq!(fd, listener.as_raw_fd());
                assert_eq!(source.raw_os_error(), Some(libc::EEXIST));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn regular_files_cannot_be_watched() {
        let file = File::open(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml")).unwrap();
        let queue = ReadinessQueue::new().unwrap();
        assert!(matches!(
            queue.register(file.as_fd()),
            Err(RegistrationError::Add { .. })
        ));
    }
}
