//! Socket listener and worker pool.
//!
//! ```text
//!   accept thread ──Connection──▶ Queue (PopOldest) ──▶ worker 1..n
//!                                                          │
//!                                   InputBuffer ──lines──▶ Store ──▶ OutputBuffer
//! ```
//!
//! Shutdown order: raise the flag, stop accepting, join the queue, close
//! what is still queued, join the workers.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::net::TcpListener;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::counters::Counter;
use crate::error::{RequestError, ResponseCode, ServerError};
use crate::io::{Channel, Connection, InputBuffer, OutputBuffer, RequestResult};
use crate::queue::{Queue, QueueJoinStrategy, QueuePopStrategy, QueueStatus};
use crate::store::Store;
use crate::triggers::Trigger;

/// Pause between polls of the non-blocking listener.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Upper bound for a single blocked socket write.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Where clients connect: a UNIX socket path or a TCP `host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddress {
    Unix(PathBuf),
    Tcp(String),
}

impl FromStr for ListenAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("empty listen address".to_string());
        }
        if s.starts_with('/') || s.starts_with('.') || !s.contains(':') {
            Ok(ListenAddress::Unix(PathBuf::from(s)))
        } else {
            Ok(ListenAddress::Tcp(s.to_string()))
        }
    }
}

impl fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddress::Unix(path) => write!(f, "{}", path.display()),
            ListenAddress::Tcp(address) => f.write_str(address),
        }
    }
}

enum Listener {
    Unix(UnixListener),
    Tcp(TcpListener),
}

impl Listener {
    fn bind(address: &ListenAddress) -> Result<Self, ServerError> {
        let bind_error = |source| ServerError::Bind {
            address: address.to_string(),
            source,
        };
        let listener = match address {
            ListenAddress::Unix(path) => {
                if path.exists() {
                    fs::remove_file(path).map_err(bind_error)?;
                }
                let listener = UnixListener::bind(path).map_err(bind_error)?;
                fs::set_permissions(path, fs::Permissions::from_mode(0o666)).map_err(bind_error)?;
                listener.set_nonblocking(true).map_err(bind_error)?;
                Listener::Unix(listener)
            }
            ListenAddress::Tcp(addr) => {
                let listener = TcpListener::bind(addr).map_err(bind_error)?;
                listener.set_nonblocking(true).map_err(bind_error)?;
                Listener::Tcp(listener)
            }
        };
        Ok(listener)
    }

    fn accept(&self) -> std::io::Result<Connection> {
        match self {
            Listener::Unix(l) => {
                let (stream, _) = l.accept()?;
                stream.set_nonblocking(false)?;
                Ok(Connection::Unix(stream))
            }
            Listener::Tcp(l) => {
                let (stream, _) = l.accept()?;
                stream.set_nonblocking(false)?;
                Ok(Connection::Tcp(stream))
            }
        }
    }

    fn local_port(&self) -> Option<u16> {
        match self {
            Listener::Unix(_) => None,
            Listener::Tcp(l) => l.local_addr().ok().map(|a| a.port()),
        }
    }
}

/// A running listener with its worker threads.
pub struct Server {
    store: Arc<Store>,
    address: ListenAddress,
    local_port: Option<u16>,
    queue: Arc<Queue<Connection>>,
    acceptor: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl Server {
    /// Binds `address` and starts the accept thread and the workers.
    pub fn start(store: Arc<Store>, address: ListenAddress) -> Result<Self, ServerError> {
        let listener = Listener::bind(&address)?;
        let local_port = listener.local_port();
        let threads = store.context().settings.num_client_threads.max(1);
        let queue = Arc::new(Queue::with_join_strategy(Some(threads), QueueJoinStrategy::ShutdownPush));

        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let store = Arc::clone(&store);
            let queue = Arc::clone(&queue);
            let handle = thread::Builder::new()
                .name(format!("livestatus-{i}"))
                .spawn(move || worker(&store, &queue))
                .map_err(ServerError::Spawn)?;
            workers.push(handle);
        }

        let acceptor = {
            let store = Arc::clone(&store);
            let queue = Arc::clone(&queue);
            thread::Builder::new()
                .name("livestatus-accept".to_string())
                .spawn(move || accept_loop(&listener, &store, &queue))
                .map_err(ServerError::Spawn)?
        };

        info!("listening on {} with {} worker threads", address, threads);
        Ok(Self {
            store,
            address,
            local_port,
            queue,
            acceptor: Some(acceptor),
            workers,
        })
    }

    /// Port actually bound for TCP addresses, e.g. after binding port 0.
    pub fn local_port(&self) -> Option<u16> {
        self.local_port
    }

    pub fn shutdown(mut self) {
        let ctx = self.store.context();
        ctx.should_terminate.store(true, Ordering::SeqCst);
        ctx.triggers.notify_all(Trigger::All);

        if let Some(acceptor) = self.acceptor.take()
            && acceptor.join().is_err()
        {
            error!("accept thread panicked");
        }
        self.queue.join();
        let abandoned = self.queue.drain();
        if !abandoned.is_empty() {
            info!("closing {} queued connections", abandoned.len());
        }
        drop(abandoned);
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
        if let ListenAddress::Unix(path) = &self.address
            && let Err(e) = fs::remove_file(path)
        {
            warn!("cannot remove socket {}: {}", path.display(), e);
        }
        info!("listener on {} stopped", self.address);
    }
}

fn accept_loop(listener: &Listener, store: &Store, queue: &Queue<Connection>) {
    let ctx = store.context();
    while !ctx.should_terminate() {
        match listener.accept() {
            Ok(connection) => {
                ctx.counters.increment(Counter::Connections);
                let (status, evicted) = queue.push_evicting(connection);
                match status {
                    QueueStatus::Overflow => {
                        ctx.counters.increment(Counter::Overflows);
                        warn!("queue full, dropped the oldest waiting connection");
                    }
                    QueueStatus::Joinable => debug!("queue joined, closing new connection"),
                    QueueStatus::Ok => {}
                }
                drop(evicted);
                ctx.counters.set_queued_connections(queue.approx_size());
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => {
                warn!("accept failed: {}", e);
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
    debug!("accept thread stopped");
}

fn worker(store: &Store, queue: &Queue<Connection>) {
    while let Some((connection, remaining)) = queue.pop(QueuePopStrategy::Blocking, None) {
        let ctx = store.context();
        ctx.counters.set_queued_connections(remaining);
        if ctx.should_terminate() {
            break;
        }
        handle_connection(store, connection);
    }
}

/// Answers requests on one connection until the client closes it, keepalive
/// ends or the engine shuts down.
pub fn handle_connection<C: Channel>(store: &Store, channel: C) {
    let ctx = store.context();
    let peer = channel.peer();
    let mut writer = match channel.try_clone() {
        Ok(writer) => writer,
        Err(e) => {
            warn!("cannot duplicate connection from {}: {}", peer, e);
            return;
        }
    };
    if let Err(e) = writer.set_write_timeout(Some(WRITE_TIMEOUT)) {
        debug!("cannot set write timeout for {}: {}", peer, e);
    }

    ctx.counters.connection_started();
    let mut input = InputBuffer::new(
        channel,
        Arc::clone(&ctx.should_terminate),
        ctx.settings.query_timeout,
        ctx.settings.idle_timeout,
    );
    loop {
        let failure = match input.read_request() {
            RequestResult::RequestRead => None,
            RequestResult::LineTooLong => Some(RequestError::payload_too_large("maximum request size exceeded")),
            RequestResult::InvalidUtf8 => Some(RequestError::invalid_request("request is not valid UTF-8")),
            RequestResult::Timeout if input.has_pending_data() => Some(RequestError::new(
                ResponseCode::IncompleteRequest,
                "Timeout while reading request",
            )),
            other => {
                debug!("closing connection from {}: {:?}", peer, other);
                break;
            }
        };

        let mut output = OutputBuffer::new(
            &mut writer,
            Arc::clone(&ctx.should_terminate),
            ctx.settings.max_response_size,
        );
        let keepalive = match failure {
            Some(error) => {
                output.set_error(error);
                false
            }
            None => store.answer_request(&input.get_lines(), &mut output),
        };
        output.flush();
        if !keepalive || ctx.should_terminate() {
            break;
        }
    }
    ctx.counters.connection_finished();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{Shutdown, TcpStream};
    use std::os::unix::net::UnixStream;
    use std::sync::atomic::AtomicBool;

    use crate::config::Settings;
    use crate::core::{InMemoryCore, ObjectDefinitions};
    use crate::io::MemoryChannel;
    use crate::tables::Context;

    fn store_with(settings: Settings) -> Arc<Store> {
        let core = Arc::new(InMemoryCore::new(ObjectDefinitions::typical_site()));
        let ctx = Context::new(core, settings, Arc::new(AtomicBool::new(false)));
        Arc::new(Store::new(Arc::new(ctx)))
    }

    fn store() -> Arc<Store> {
        store_with(Settings {
            num_client_threads: 2,
            ..Settings::default()
        })
    }

    #[test]
    fn test_listen_address() {
        assert_eq!(
            "/tmp/live".parse::<ListenAddress>(),
            Ok(ListenAddress::Unix(PathBuf::from("/tmp/live")))
        );
        assert_eq!(
            "127.0.0.1:6557".parse::<ListenAddress>(),
            Ok(ListenAddress::Tcp("127.0.0.1:6557".to_string()))
        );
        assert!("".parse::<ListenAddress>().is_err());
    }

    #[test]
    fn test_keepalive_requests_on_one_connection() {
        let store = store();
        let channel = MemoryChannel::with_request(
            "GET hosts\nColumns: name\nFilter: name = myhost\nKeepAlive: on\n\n\
             GET services\nStats: state = 2\n\n",
        );
        handle_connection(&store, channel.clone());
        assert_eq!(channel.output_string(), "myhost\n3\n");
        assert_eq!(store.context().counters.active_connections(), 0);
    }

    #[test]
    fn test_error_keeps_fixed16_header() {
        let store = store();
        let channel = MemoryChannel::with_request("GET hosts\nColumns: nope\nResponseHeader: fixed16\n\n");
        handle_connection(&store, channel.clone());
        let out = channel.output_string();
        assert!(out.starts_with("400 "), "{out}");
        assert!(out.ends_with("Table 'hosts' has no column 'nope'\n"));
    }

    #[test]
    fn test_unknown_table_keeps_connection_open() {
        let store = store();
        let channel = MemoryChannel::with_request(
            "GET nosuchtable\nKeepAlive: on\nResponseHeader: fixed16\n\n\
             GET hosts\nColumns: name\nFilter: name = router\nResponseHeader: fixed16\n\n",
        );
        handle_connection(&store, channel.clone());
        assert_eq!(
            channel.output_string(),
            "404          35\nTable 'nosuchtable' does not exist\n200           7\nrouter\n"
        );
    }

    #[test]
    fn test_unterminated_request_is_answered() {
        let store = store();
        let channel = MemoryChannel::with_request("GET status\nColumns: program_version");
        handle_connection(&store, channel.clone());
        assert_eq!(channel.output_string(), "2.3.0\n");
    }

    #[test]
    fn test_unix_socket_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live");
        let store = store();
        let server = Server::start(Arc::clone(&store), ListenAddress::Unix(path.clone())).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o666);

        let mut client = UnixStream::connect(&path).unwrap();
        client.write_all(b"GET hosts\nColumns: name\nFilter: name ~ ^r\n\n").unwrap();
        client.shutdown(Shutdown::Write).unwrap();
        let mut answer = String::new();
        client.read_to_string(&mut answer).unwrap();
        assert_eq!(answer, "router\n");

        server.shutdown();
        assert!(!path.exists());
        assert!(store.context().counters.value(Counter::Connections) >= 1);
    }

    #[test]
    fn test_tcp_roundtrip() {
        let store = store();
        let server = Server::start(Arc::clone(&store), ListenAddress::Tcp("127.0.0.1:0".to_string())).unwrap();
        let port = server.local_port().unwrap();

        let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();
        client
            .write_all(b"GET services\nColumns: description\nFilter: host_name = router\n\n")
            .unwrap();
        client.shutdown(Shutdown::Write).unwrap();
        let mut answer = String::new();
        client.read_to_string(&mut answer).unwrap();
        assert_eq!(answer, "Interface 1\n");

        server.shutdown();
    }
}
