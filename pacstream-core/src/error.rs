//! Domain-specific error types for the pacstream server.
//!
//! Errors are grouped by the component that raises them. Session-scoped
//! errors (`ProtocolError`, `PipelineError`, `SessionError`) never leave
//! their session; only [`StartupError`] is fatal to the whole process.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

// ── ProtocolError ────────────────────────────────────────────────

/// Malformed or truncated wire data. Fatal to the session that saw it.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The stream closed in the middle of a message.
    #[error("stream closed mid-message ({buffered} bytes buffered)")]
    Truncated { buffered: usize },

    /// A message started with a tag this protocol does not define.
    #[error("unknown message tag: {0:?}")]
    UnknownTag(String),

    /// A string does not fit behind a 2-byte length prefix.
    #[error("string too long for the wire: {0} bytes (max 65535)")]
    StringTooLong(usize),

    /// A string field was not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// A byte-array length prefix was negative.
    #[error("negative byte length: {0}")]
    NegativeLength(i32),

    /// A frame payload exceeded the codec limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A field decoded, but its content violates the message format.
    #[error("malformed message: {0}")]
    Malformed(&'static str),

    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
}

// ── StoreError ───────────────────────────────────────────────────

/// Failure of the fixed-record results file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("results file I/O: {0}")]
    Io(#[from] std::io::Error),

    /// The file length is not a whole number of records.
    #[error("results file corrupt: length {len} is not a multiple of {record_size}")]
    Corrupt { len: u64, record_size: usize },

    #[error("record index {index} out of range (count {count})")]
    IndexOutOfRange { index: u64, count: u64 },
}

// ── PipelineError ────────────────────────────────────────────────

/// Capture, compression or transmission failure. Stops only the
/// pipeline of the session it belongs to.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("capture failed: {0}")]
    Capture(String),

    #[error("jpeg encode failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("frame transmit failed: {0}")]
    Transmit(#[from] ProtocolError),

    /// The pipeline task panicked or was aborted.
    #[error("pipeline task ended abnormally: {0}")]
    Aborted(String),
}

// ── SessionError ─────────────────────────────────────────────────

/// Anything that tears a session down before its orderly end.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The handler attempted a phase change the state machine forbids.
    #[error("invalid session transition: {0}")]
    InvalidTransition(&'static str),

    /// The client closed the connection where a reply was required.
    #[error("client closed the connection")]
    UnexpectedEof,

    /// The client stayed silent past the configured read timeout.
    #[error("no data from client within {0:?}")]
    ReadTimeout(Duration),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Whether the session can still tell the client about this error
    /// before closing. Write failures on the socket itself cannot be
    /// reported over that socket.
    pub fn is_reportable(&self) -> bool {
        !matches!(
            self,
            SessionError::Protocol(ProtocolError::Io(_)) | SessionError::UnexpectedEof
        )
    }
}

// ── StartupError ─────────────────────────────────────────────────

/// Server-level failure. The only error kind that is process-fatal.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("accept failed on {local}: {source}")]
    Accept {
        local: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("cannot open results store: {0}")]
    Store(#[from] StoreError),
}
