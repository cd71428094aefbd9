mod common;

use common::{memory_logger, ready, ScriptedMonitor};
use sampled::accept::{AcceptLoop, ListenerSet};
use sampled::error::WaitError;
use sampled::journal::Priority;
use sampled::logging::{FIELD_REMOTE_HOST, FIELD_REMOTE_PORT};
use sampled::readiness::{Monitor, Readiness, ReadinessQueue};
use sampled::session::{Accepted, SessionHandler};
use sampled::RegistrationError;
use socket2::{Domain, SockAddr, Socket, Type};
use std::io::Read;
use std::mem;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::unix::io::{AsRawFd, OwnedFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::time::Duration;

/// Passes through the first `remaining` results of a real queue, then closes.
struct Bounded {
    queue: ReadinessQueue,
    remaining: usize,
}

impl Monitor for Bounded {
    fn wait(&mut self) -> Result<Readiness, WaitError> {
        if self.remaining == 0 {
            return Ok(Readiness::Closed);
        }
        self.remaining -= 1;
        self.queue.wait()
    }
}

fn serve(listeners: ListenerSet, events: usize) -> Vec<sampled::logging::OwnedRecord> {
    let (log, sink) = memory_logger();
    let queue = ReadinessQueue::new().unwrap();
    listeners.register(&queue).unwrap();

    AcceptLoop::new(
        Bounded {
            queue,
            remaining: events,
        },
        listeners,
        SessionHandler::new(log.clone(), Duration::ZERO),
        log,
    )
    .run()
    .unwrap();
    sink.records()
}

#[test]
fn tcp_peer_is_greeted_and_journaled() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let mut client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let client_port = client.local_addr().unwrap().port().to_string();

    let records = serve(ListenerSet::new(vec![OwnedFd::from(listener)]), 1);

    let mut greeting = String::new();
    client.read_to_string(&mut greeting).unwrap();
    assert_eq!(greeting, "hello world!\n");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].message, "Connection established");
    assert_eq!(records[0].priority, Priority::Notice);
    assert_eq!(records[0].field(FIELD_REMOTE_HOST), Some("127.0.0.1"));
    assert_eq!(records[0].field(FIELD_REMOTE_PORT), Some(client_port.as_str()));
    assert_eq!(records[1].priority, Priority::Debug);
    assert!(records[1].message.starts_with("got file descriptor "));
    assert!(records[1].fields.is_empty());
}

#[test]
fn connections_are_served_one_after_another() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let mut clients: Vec<TcpStream> = (0..3).map(|_| TcpStream::connect(addr).unwrap()).collect();

    let records = serve(ListenerSet::new(vec![OwnedFd::from(listener)]), 3);

    for client in &mut clients {
        let mut greeting = String::new();
        client.read_to_string(&mut greeting).unwrap();
        assert_eq!(greeting, "hello world!\n");
    }
    let ports: Vec<&str> = records
        .iter()
        .filter_map(|r| r.field(FIELD_REMOTE_PORT))
        .collect();
    assert_eq!(ports.len(), 3);
}

/// An address of a family `getnameinfo` does not handle.
fn netlink_addr() -> SockAddr {
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    storage.ss_family = libc::AF_NETLINK as libc::sa_family_t;
    let len = mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t;
    unsafe { SockAddr::new(storage, len) }
}

#[test]
fn unresolvable_peer_is_still_greeted() {
    let (log, sink) = memory_logger();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let mut client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let (server, _) = listener.accept().unwrap();

    SessionHandler::new(log, Duration::ZERO)
        .handle(Accepted::new(Socket::from(server), netlink_addr()));

    let mut greeting = String::new();
    client.read_to_string(&mut greeting).unwrap();
    assert_eq!(greeting, "hello world!\n");

    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].priority, Priority::Notice);
    assert!(records[0].message.starts_with("getnameinfo(): "));
    assert!(records.iter().all(|r| r.field(FIELD_REMOTE_HOST).is_none()));
    assert!(records[1].message.starts_with("got file descriptor "));
}

#[test]
fn unix_peer_is_greeted() {
    let path = std::env::temp_dir().join(format!("sampled-test-{}.sock", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path).unwrap();
    let mut client = UnixStream::connect(&path).unwrap();

    let records = serve(ListenerSet::new(vec![OwnedFd::from(listener)]), 1);
    let _ = std::fs::remove_file(&path);

    let mut greeting = String::new();
    client.read_to_string(&mut greeting).unwrap();
    assert_eq!(greeting, "hello world!\n");

    // glibc names every local socket peer "localhost", without a port.
    assert_eq!(records[0].message, "Connection established");
    assert_eq!(records[0].field(FIELD_REMOTE_HOST), Some("localhost"));
    assert_eq!(records[0].field(FIELD_REMOTE_PORT), Some(""));
}

#[test]
fn bound_but_not_listening_socket_is_refused() {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, None).unwrap();
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    socket.bind(&SockAddr::from(addr)).unwrap();
    let fd = socket.as_raw_fd();

    let listeners = ListenerSet::new(vec![OwnedFd::from(socket)]);
    let queue = ReadinessQueue::new().unwrap();

    match listeners.register(&queue) {
        Err(RegistrationError::NotListening { fd: rejected }) => assert_eq!(rejected, fd),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn accept_with_nothing_pending_is_not_fatal() {
    let (log, sink) = memory_logger();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let fd = listener.as_raw_fd();
    let mut client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();

    let listeners = ListenerSet::new(vec![OwnedFd::from(listener)]);
    let queue = ReadinessQueue::new().unwrap();
    listeners.register(&queue).unwrap();

    // Second event has no connection behind it; the third names no listener.
    let result = AcceptLoop::new(
        ScriptedMonitor::new([ready(fd), ready(fd), ready(-1)]),
        listeners,
        SessionHandler::new(log.clone(), Duration::ZERO),
        log,
    )
    .run();
    assert!(result.is_ok());

    let mut greeting = String::new();
    client.read_to_string(&mut greeting).unwrap();
    assert_eq!(greeting, "hello world!\n");

    let errors: Vec<_> = sink
        .records()
        .into_iter()
        .filter(|r| r.priority == Priority::Error)
        .collect();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|r| r.message.starts_with("accept(): ")));
}
