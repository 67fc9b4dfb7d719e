//! One client's lifecycle: authenticate, play, stream, record, close.
//!
//! A [`Session`] owns its connection's reader and one clone of the
//! shared writer; the frame pipeline holds the other clone while the
//! game runs. Every failure path ends in the same teardown: stop the
//! pipeline, tell the client what went wrong if the socket still
//! works, close the stream.

mod state;

pub use state::SessionPhase;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::auth::CredentialValidator;
use crate::connection::{self, MessageReader, MessageWriter};
use crate::error::SessionError;
use crate::game::{CELLS_PER_MOVE, GameFactory, MoveOutcome, SharedGame};
use crate::message::{Direction, GameResult, Message};
use crate::pipeline::{FramePipeline, JpegFrameProducer, PipelineHandle, StreamConfig};
use crate::store::{ResultRecord, ResultsStore};

// ── Wire vocabulary ──────────────────────────────────────────────

/// `AUTH` steps sent by the server.
pub const AUTH_REQUEST: &str = "REQUEST";
pub const AUTH_ACCEPTED: &str = "ACCEPTED";
pub const AUTH_REJECTED: &str = "REJECTED";

/// `MSG` bodies (or prefixes, before the first `|`).
pub const GAME_STARTED: &str = "GAME_STARTED";
pub const REQUEST_MOVE: &str = "REQUEST_MOVE";
pub const MOVE_OK: &str = "MOVE_OK";
pub const LIMIT_REACHED: &str = "LIMIT_REACHED";
pub const FRUIT_EATEN: &str = "FRUIT_EATEN";
pub const INVALID_COMMAND: &str = "INVALID_COMMAND";
pub const UNEXPECTED_MESSAGE: &str = "UNEXPECTED_MESSAGE";
pub const ERROR: &str = "ERROR";

// ── SessionContext ───────────────────────────────────────────────

/// Everything a session borrows from the server. Shared by all sessions.
pub struct SessionContext {
    pub validator: Arc<dyn CredentialValidator>,
    pub games: Arc<dyn GameFactory>,
    pub store: Arc<ResultsStore>,
    pub stream: StreamConfig,
    /// Per-read limit on client silence. `None` waits forever.
    pub read_timeout: Option<Duration>,
}

/// How a session ended when it ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The game finished. Carries the record that was (or should have
    /// been) stored.
    Completed(ResultRecord),
    /// Credentials were refused. Nothing was stored.
    Rejected,
    /// The client hung up before the game finished. Nothing was stored.
    Disconnected,
}

// ── Session ──────────────────────────────────────────────────────

pub struct Session<S> {
    id: u64,
    ctx: Arc<SessionContext>,
    reader: MessageReader<ReadHalf<S>>,
    writer: MessageWriter<WriteHalf<S>>,
    phase: SessionPhase,
    pipeline: Option<PipelineHandle>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(id: u64, stream: S, ctx: Arc<SessionContext>) -> Self {
        let (reader, writer) = connection::split(stream);
        Self {
            id,
            reader: reader.with_timeout(ctx.read_timeout),
            writer,
            ctx,
            phase: SessionPhase::default(),
            pipeline: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    /// Drive the session to its end and release the connection.
    pub async fn run(mut self) -> Result<SessionOutcome, SessionError> {
        let span = info_span!("session", id = self.id);
        async move {
            let result = match self.drive().await {
                Err(SessionError::UnexpectedEof) => Ok(SessionOutcome::Disconnected),
                other => other,
            };
            self.teardown(result.as_ref().err()).await;

            match &result {
                Ok(SessionOutcome::Completed(record)) => info!("session finished: {record}"),
                Ok(SessionOutcome::Rejected) => info!("session closed after rejection"),
                Ok(SessionOutcome::Disconnected) => {
                    info!(phase = %self.phase, "client disconnected")
                }
                Err(e) => warn!(phase = %self.phase, "session failed: {e}"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn drive(&mut self) -> Result<SessionOutcome, SessionError> {
        let Some(player) = self.authenticate().await? else {
            return Ok(SessionOutcome::Rejected);
        };

        let game = SharedGame::new(self.ctx.games.create(&player));
        self.writer
            .send(Message::text(format!("{GAME_STARTED}|{player}")))
            .await?;
        self.start_pipeline(game.clone());
        info!(player = %player, "game started");

        while !is_finished(&game) {
            self.play_turn(&game).await?;
        }

        self.finish(&player, &game).await
    }

    // ── Authenticating ───────────────────────────────────────────

    /// `Some(player)` when accepted, `None` when rejected.
    async fn authenticate(&mut self) -> Result<Option<String>, SessionError> {
        self.phase.begin_auth()?;
        self.writer
            .send(Message::auth(AUTH_REQUEST, "send player name and secret"))
            .await?;

        let (name, secret) = match self.recv().await? {
            Message::Auth { step, payload } => (step.trim().to_string(), payload),
            other => {
                debug!(tag = %other.tag(), "expected credentials");
                (String::new(), String::new())
            }
        };

        if !name.is_empty() && self.ctx.validator.validate(&name, &secret).await {
            self.phase.accept(name.clone())?;
            self.writer
                .send(Message::auth(AUTH_ACCEPTED, format!("welcome {name}")))
                .await?;
            info!(player = %name, "authenticated");
            Ok(Some(name))
        } else {
            self.phase.reject()?;
            self.writer
                .send(Message::auth(AUTH_REJECTED, "invalid credentials"))
                .await?;
            info!(player = %name, "authentication rejected");
            Ok(None)
        }
    }

    // ── Playing ──────────────────────────────────────────────────

    fn start_pipeline(&mut self, game: SharedGame) {
        let cfg = &self.ctx.stream;
        match JpegFrameProducer::new(game, cfg.width, cfg.height, cfg.quality) {
            Ok(producer) => {
                let pipeline = FramePipeline::new(producer, self.writer.clone(), cfg.target_fps);
                self.pipeline = Some(pipeline.spawn());
            }
            Err(e) => warn!("playing without video: {e}"),
        }
    }

    async fn play_turn(&mut self, game: &SharedGame) -> Result<(), SessionError> {
        self.writer.send(Message::text(REQUEST_MOVE)).await?;

        let reply = match self.recv().await? {
            Message::Command(text) => match text.parse::<Direction>() {
                Ok(direction) => {
                    let (outcome, total) = apply_move(game, direction);
                    debug!(%direction, cells = outcome.cells_moved, total, "move");
                    return self.report_move(&outcome, total).await;
                }
                Err(e) => {
                    debug!("{e}");
                    INVALID_COMMAND
                }
            },
            other => {
                debug!(tag = %other.tag(), "unexpected message during play");
                UNEXPECTED_MESSAGE
            }
        };
        self.writer.send(Message::text(reply)).await?;
        Ok(())
    }

    async fn report_move(&self, outcome: &MoveOutcome, total: i32) -> Result<(), SessionError> {
        let movement = if outcome.limit_reached() {
            format!("{LIMIT_REACHED}|{}", outcome.cells_moved)
        } else {
            format!("{MOVE_OK}|{CELLS_PER_MOVE}")
        };
        self.writer.send(Message::text(movement)).await?;

        if let Some(fruit) = &outcome.fruit {
            info!(fruit = %fruit.name, points = fruit.points, total, "fruit eaten");
            self.writer
                .send(Message::text(format!(
                    "{FRUIT_EATEN}|{}|{}|{total}",
                    fruit.name, fruit.points
                )))
                .await?;
        }
        Ok(())
    }

    // ── Finished ─────────────────────────────────────────────────

    async fn finish(
        &mut self,
        player: &str,
        game: &SharedGame,
    ) -> Result<SessionOutcome, SessionError> {
        let (score, elapsed) = final_score(game);
        self.stop_pipeline().await;
        debug!(score, elapsed, played = ?self.phase.playing_for(), "game over");
        self.phase.finish()?;

        let record = ResultRecord::new(player, score, elapsed);
        let store = Arc::clone(&self.ctx.store);
        let to_store = record.clone();
        match tokio::task::spawn_blocking(move || store.append(&to_store)).await {
            Ok(Ok(())) => debug!("result stored"),
            Ok(Err(e)) => warn!("could not store result: {e}"),
            Err(e) => warn!("result writer task failed: {e}"),
        }

        self.writer
            .send(Message::Result(GameResult::from(&record)))
            .await?;
        Ok(SessionOutcome::Completed(record))
    }

    // ── Teardown ─────────────────────────────────────────────────

    async fn teardown(&mut self, error: Option<&SessionError>) {
        self.stop_pipeline().await;

        if self.phase.is_playing() {
            debug!(played = ?self.phase.playing_for(), "game abandoned");
        }

        if let Some(e) = error.filter(|e| e.is_reportable()) {
            if let Err(send) = self.writer.send(Message::text(format!("{ERROR}|{e}"))).await {
                debug!("could not report error to client: {send}");
            }
        }
        if let Err(e) = self.writer.close().await {
            debug!("close: {e}");
        }
    }

    async fn stop_pipeline(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            // Failures are logged by the handle.
            let _ = pipeline.stop().await;
        }
    }

    async fn recv(&mut self) -> Result<Message, SessionError> {
        self.reader.recv().await?.ok_or(SessionError::UnexpectedEof)
    }
}

// Game access stays in plain functions so no lock guard is ever held
// across an await.

fn is_finished(game: &SharedGame) -> bool {
    game.lock().is_finished()
}

fn apply_move(game: &SharedGame, direction: Direction) -> (MoveOutcome, i32) {
    let mut game = game.lock();
    let outcome = game.move_player(direction);
    (outcome, game.score())
}

fn final_score(game: &SharedGame) -> (i32, i64) {
    let game = game.lock();
    (game.score(), game.elapsed_secs())
}
