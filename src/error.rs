use std::io;

use thiserror::Error;

/// Failure kinds for the whole service. `Config` and `Socket` are fatal at
/// startup; every other kind is fatal only to the session that hit it — the
/// worker ends, the server keeps accepting.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("socket error: {0}")]
    Socket(#[source] io::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Malformed peer input, e.g. a line that fills the buffer without a
    /// newline, or a transfer that ends before its marker.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A pipeline stage could not be resolved or spawned. The command loop
    /// reports and continues; the session survives.
    #[error("exec error: {0}")]
    Exec(String),
}

pub type Result<T> = std::result::Result<T, Error>;
