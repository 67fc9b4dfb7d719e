//! # pacstream-core
//!
//! Session engine for the pacstream game server.
//!
//! This crate contains:
//! - **Message / Codec**: tagged wire messages and `WireCodec` for framed TCP I/O via `tokio_util`
//! - **Connection**: a session's reader and its lock-guarded, shareable writer
//! - **Store**: the fixed-record results file and its best-player query
//! - **Pipeline**: paced capture → JPEG → send frame streaming
//! - **Session**: per-client lifecycle and its phase state machine
//! - **Game / Auth**: the collaborator traits a server plugs in
//! - **Client**: a small protocol client
//! - **Error**: `thiserror`-based error families

pub mod auth;
pub mod client;
pub mod codec;
pub mod connection;
pub mod error;
pub mod game;
pub mod message;
pub mod pipeline;
pub mod session;
pub mod store;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use auth::CredentialValidator;
pub use client::GameClient;
pub use codec::{MAX_FRAME_SIZE, WireCodec};
pub use connection::{MessageReader, MessageWriter};
pub use error::{PipelineError, ProtocolError, SessionError, StartupError, StoreError};
pub use game::{CELLS_PER_MOVE, EatenFruit, Game, GameFactory, MoveOutcome, SharedGame};
pub use message::{Direction, GameResult, Message, Tag};
pub use pipeline::{FramePipeline, FrameProducer, JpegFrameProducer, PipelineHandle, StreamConfig};
pub use session::{Session, SessionContext, SessionOutcome, SessionPhase};
pub use store::{RECORD_SIZE, ResultRecord, ResultsStore, StoreSummary};
