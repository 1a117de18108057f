//! Claims the control socket and accepts clients on a background thread.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use biolink_config::SocketEndpoint;

use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET, ListenerError};

#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
#[cfg(unix)]
use std::path::Path;

const IDLE_PAUSE: Duration = Duration::from_millis(25);
const FAILURE_PAUSE: Duration = Duration::from_millis(150);

/// A claimed control socket that is not serving yet.
///
/// Dropping it, or stopping the loop it was moved into, removes the Unix
/// socket file it created.
#[derive(Debug)]
pub(crate) struct SocketListener {
    endpoint: SocketEndpoint,
    acceptor: Acceptor,
}

#[derive(Debug)]
enum Acceptor {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl Acceptor {
    fn claim(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        match endpoint {
            SocketEndpoint::Tcp { host, port } => listen_tcp(host, *port).map(Self::Tcp),
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => listen_unix(path.as_std_path()).map(Self::Unix),
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => Err(ListenerError::UnsupportedUnix {
                endpoint: endpoint.to_string(),
            }),
        }
    }

    fn poll_mode(&self) -> io::Result<()> {
        match self {
            Self::Tcp(listener) => listener.set_nonblocking(true),
            #[cfg(unix)]
            Self::Unix(listener) => listener.set_nonblocking(true),
        }
    }

    /// Next waiting client, switched back to blocking IO.
    fn next_client(&self) -> io::Result<Option<ConnectionStream>> {
        let accepted = match self {
            Self::Tcp(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Tcp(stream))
            }),
            #[cfg(unix)]
            Self::Unix(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Unix(stream))
            }),
        };
        match accepted {
            Ok(stream) => Ok(Some(stream)),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }
}

impl SocketListener {
    /// Claims `endpoint`.
    ///
    /// A Unix socket file left by a stopped daemon is replaced; one that a
    /// running daemon still answers on is refused.
    pub(crate) fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let acceptor = Acceptor::claim(endpoint)?;
        info!(
            target: LISTENER_TARGET,
            endpoint = %endpoint,
            "claimed control socket"
        );
        Ok(Self {
            endpoint: endpoint.clone(),
            acceptor,
        })
    }

    /// Bound TCP address; `None` for Unix sockets.
    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        match &self.acceptor {
            Acceptor::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            Acceptor::Unix(_) => None,
        }
    }

    /// Serves clients on a background thread until the handle is stopped.
    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        self.acceptor
            .poll_mode()
            .map_err(ListenerError::NonBlocking)?;
        let stopping = Arc::new(AtomicBool::new(false));
        let accept_loop = AcceptLoop {
            listener: self,
            handler,
            stopping: Arc::clone(&stopping),
        };
        let thread = thread::Builder::new()
            .name("biolinkd-accept".to_owned())
            .spawn(move || accept_loop.run())
            .map_err(ListenerError::Spawn)?;
        Ok(ListenerHandle {
            stopping,
            thread: Some(thread),
        })
    }
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let SocketEndpoint::Unix { path } = &self.endpoint
            && let Err(error) = fs::remove_file(path.as_std_path())
            && error.kind() != io::ErrorKind::NotFound
        {
            warn!(
                target: LISTENER_TARGET,
                error = %error,
                path = %path,
                "failed to remove control socket file"
            );
        }
    }
}

struct AcceptLoop {
    listener: SocketListener,
    handler: Arc<dyn ConnectionHandler>,
    stopping: Arc<AtomicBool>,
}

impl AcceptLoop {
    fn run(self) {
        let mut clients = 0_u64;
        let mut failing = None::<io::ErrorKind>;
        while !self.stopping.load(Ordering::SeqCst) {
            match self.listener.acceptor.next_client() {
                Ok(Some(stream)) => {
                    failing = None;
                    clients = clients.wrapping_add(1);
                    self.hand_off(clients, stream);
                }
                Ok(None) => thread::sleep(IDLE_PAUSE),
                Err(error) => {
                    // Repeats of the same failure are logged once.
                    if failing.replace(error.kind()) != Some(error.kind()) {
                        warn!(
                            target: LISTENER_TARGET,
                            error = %error,
                            "control socket accept failed"
                        );
                    }
                    thread::sleep(FAILURE_PAUSE);
                }
            }
        }
        debug!(
            target: LISTENER_TARGET,
            endpoint = %self.listener.endpoint,
            clients,
            "control socket closed"
        );
    }

    fn hand_off(&self, client: u64, stream: ConnectionStream) {
        let handler = Arc::clone(&self.handler);
        let spawned = thread::Builder::new()
            .name(format!("biolinkd-client-{client}"))
            .spawn(move || handler.handle(stream));
        if let Err(error) = spawned {
            warn!(
                target: LISTENER_TARGET,
                client,
                error = %error,
                "no thread for control client; dropping it"
            );
        }
    }
}

/// Running accept loop. Dropping the handle asks the loop to stop.
#[derive(Debug)]
pub(crate) struct ListenerHandle {
    stopping: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Stops accepting and waits for the loop to release the socket.
    pub(crate) fn stop(mut self) -> Result<(), ListenerError> {
        self.stopping.store(true, Ordering::SeqCst);
        self.thread
            .take()
            .map_or(Ok(()), |thread| {
                thread.join().map_err(|_| ListenerError::Panicked)
            })
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stopping.store(true, Ordering::SeqCst);
    }
}

fn listen_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?
        .next()
        .ok_or_else(|| ListenerError::NoAddress {
            host: host.to_owned(),
            port,
        })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::BindTcp { addr, source })
}

/// What currently occupies a Unix socket path.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occupant {
    Nothing,
    StaleSocket,
    LiveDaemon,
    OtherFile,
}

#[cfg(unix)]
fn occupant(path: &Path) -> Result<Occupant, ListenerError> {
    let inspect_failed = |source| ListenerError::Inspect {
        path: path.to_path_buf(),
        source,
    };
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Occupant::Nothing),
        Err(error) => return Err(inspect_failed(error)),
    };
    if !metadata.file_type().is_socket() {
        return Ok(Occupant::OtherFile);
    }
    match UnixStream::connect(path) {
        Ok(_daemon) => Ok(Occupant::LiveDaemon),
        Err(error)
            if matches!(
                error.kind(),
                io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
            ) =>
        {
            Ok(Occupant::StaleSocket)
        }
        Err(error) => Err(inspect_failed(error)),
    }
}

#[cfg(unix)]
fn listen_unix(path: &Path) -> Result<UnixListener, ListenerError> {
    match occupant(path)? {
        Occupant::Nothing => {}
        Occupant::StaleSocket => {
            info!(
                target: LISTENER_TARGET,
                path = %path.display(),
                "replacing control socket left by a stopped daemon"
            );
            fs::remove_file(path).map_err(|source| ListenerError::RemoveStale {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Occupant::LiveDaemon => {
            return Err(ListenerError::AlreadyServed {
                path: path.to_path_buf(),
            });
        }
        Occupant::OtherFile => {
            return Err(ListenerError::NotASocket {
                path: path.to_path_buf(),
            });
        }
    }
    UnixListener::bind(path).map_err(|source| ListenerError::BindUnix {
        path: path.to_path_buf(),
        source,
    })
}
