//! Error types for the two layers of the proxy: the pipeline that handles
//! one connection, and the small pieces around it (CLI argument parsing,
//! upstream connection setup).

use thiserror::Error;

/// Everything that can end a single connection's handling early. Each
/// variant maps to exactly one wire-level reply in `response.rs`, except
/// `Io`, which means the connection is already unusable and nothing can be
/// sent back.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The request line didn't parse as `<method> <uri> <version>`, or the
    /// URI wasn't an absolute `http://host[:port]/path` form.
    #[error("malformed request line: {0}")]
    Malformed(String),

    /// Anything other than `GET`.
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    /// DNS resolution or the upstream TCP connect failed.
    #[error("could not reach upstream {host}:{port}: {source}")]
    UpstreamUnreachable {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// A read or write against either socket failed for a reason other than
    /// the ordinary "peer went away" cases, which are handled separately.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl RequestError {
    /// `true` if the originating socket error is just the client or the
    /// upstream going away mid-stream, which ends the connection quietly
    /// rather than as a logged failure.
    pub fn is_peer_gone(&self) -> bool {
        match self {
            RequestError::Io(e) => is_peer_gone(e),
            RequestError::UpstreamUnreachable { source, .. } => is_peer_gone(source),
            _ => false,
        }
    }
}

/// `BrokenPipe`/`ConnectionReset` are the two ways a TCP peer's departure
/// shows up in `std::io::Error`; treat both as a quiet disconnect rather
/// than a failure worth logging at warning level.
pub fn is_peer_gone(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset
    )
}

/// Failures from parsing the CLI's single `<port>` argument.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("usage: captive-proxy <port>")]
    MissingPort,

    #[error("invalid port {0:?}: {1}")]
    InvalidPort(String, std::num::ParseIntError),
}
