//! Failures while claiming or serving the control socket.

use std::io;
use std::net::SocketAddr;
#[cfg(unix)]
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced while claiming or serving the control socket.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The TCP host did not resolve.
    #[error("cannot resolve {host}:{port}: {source}")]
    Resolve {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// The TCP host resolved to no address.
    #[error("{host}:{port} resolved to no address")]
    NoAddress {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
    },
    /// The TCP port could not be bound.
    #[error("cannot listen on {addr}: {source}")]
    BindTcp {
        /// Resolved address.
        addr: SocketAddr,
        /// Bind error.
        #[source]
        source: io::Error,
    },
    /// Unix sockets are not available on this platform.
    #[cfg(not(unix))]
    #[error("unix control sockets are unsupported here: {endpoint}")]
    UnsupportedUnix {
        /// Configured endpoint.
        endpoint: String,
    },
    /// The Unix socket path could not be bound.
    #[cfg(unix)]
    #[error("cannot listen on {}: {source}", .path.display())]
    BindUnix {
        /// Socket path.
        path: PathBuf,
        /// Bind error.
        #[source]
        source: io::Error,
    },
    /// A running daemon answers on the socket path.
    #[cfg(unix)]
    #[error("another daemon is serving {}", .path.display())]
    AlreadyServed {
        /// Socket path.
        path: PathBuf,
    },
    /// Something other than a socket occupies the path.
    #[cfg(unix)]
    #[error("{} exists and is not a socket", .path.display())]
    NotASocket {
        /// Occupied path.
        path: PathBuf,
    },
    /// The existing socket path could not be checked.
    #[cfg(unix)]
    #[error("cannot inspect {}: {source}", .path.display())]
    Inspect {
        /// Socket path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// A socket left by a stopped daemon could not be removed.
    #[cfg(unix)]
    #[error("cannot remove stale socket {}: {source}", .path.display())]
    RemoveStale {
        /// Socket path.
        path: PathBuf,
        /// Removal error.
        #[source]
        source: io::Error,
    },
    /// The listener refused non-blocking mode.
    #[error("cannot make the control socket non-blocking: {0}")]
    NonBlocking(#[source] io::Error),
    /// The accept thread could not be spawned.
    #[error("cannot spawn the accept thread: {0}")]
    Spawn(#[source] io::Error),
    /// The accept thread panicked.
    #[error("accept thread panicked")]
    Panicked,
}
