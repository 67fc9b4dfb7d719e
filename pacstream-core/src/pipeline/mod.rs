//! Per-session frame streaming.
//!
//! One [`FramePipeline`] task per playing session repeats
//! capture → compress → send, paced to the target frame rate. It shares
//! the session's [`MessageWriter`], so every frame goes out as a single
//! locked write and can never split a message the command loop is
//! sending at the same time.
//!
//! Pacing never accumulates debt: when a frame takes longer than the
//! interval the next one starts immediately, and no frame is sent twice
//! to catch up.

mod jpeg;

pub use jpeg::{JpegFrameProducer, jpeg_quality};

use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncWrite;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, warn};

use crate::connection::MessageWriter;
use crate::error::PipelineError;
use crate::message::Message;

// ── StreamConfig ─────────────────────────────────────────────────

/// Frame streaming parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Frames per second, at least 1.
    pub target_fps: u32,
    /// JPEG quality in `0.0..=1.0`.
    pub quality: f32,
    pub width: u32,
    pub height: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            target_fps: 30,
            quality: 0.5,
            width: 800,
            height: 600,
        }
    }
}

impl StreamConfig {
    pub fn frame_interval(&self) -> Duration {
        frame_interval(self.target_fps)
    }
}

fn frame_interval(target_fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(target_fps.max(1)))
}

// ── FrameProducer ────────────────────────────────────────────────

/// Captures and compresses one frame. Runs on the blocking pool, off the
/// async workers.
pub trait FrameProducer: Send + 'static {
    fn produce(&mut self) -> Result<Bytes, PipelineError>;
}

// ── FramePipeline ────────────────────────────────────────────────

pub struct FramePipeline<P, W> {
    producer: P,
    writer: MessageWriter<W>,
    interval: Duration,
}

impl<P, W> FramePipeline<P, W>
where
    P: FrameProducer,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(producer: P, writer: MessageWriter<W>, target_fps: u32) -> Self {
        Self {
            producer,
            writer,
            interval: frame_interval(target_fps),
        }
    }

    /// Start streaming on its own task.
    pub fn spawn(self) -> PipelineHandle {
        let token = CancellationToken::new();
        let join = tokio::spawn(self.run(token.clone()).in_current_span());
        PipelineHandle {
            token,
            join: Some(join),
        }
    }

    /// Stream until `token` is cancelled or the connection fails.
    /// Returns the number of frames queued on the connection.
    ///
    /// A failed send ends the loop quietly with `Ok`: the session owning
    /// the connection sees the same failure and tears down itself.
    pub async fn run(self, token: CancellationToken) -> Result<u64, PipelineError> {
        let Self {
            mut producer,
            writer,
            interval,
        } = self;
        let mut sent: u64 = 0;

        while !token.is_cancelled() {
            let loop_start = Instant::now();

            // 1. Capture + compress.
            let (returned, frame) = tokio::task::spawn_blocking(move || {
                let frame = producer.produce();
                (producer, frame)
            })
            .await
            .map_err(|e| PipelineError::Aborted(e.to_string()))?;
            producer = returned;
            let frame = frame?;

            // 2. Send. Cancellation may cut a frame's flush short; its
            //    remaining bytes stay buffered in the writer and go out
            //    before the session's next message.
            match writer.send_cancellable(Message::Frame(frame), &token).await {
                Ok(true) => sent += 1,
                Ok(false) => break,
                Err(e) => {
                    debug!("frame pipeline stopping after send failure: {e}");
                    break;
                }
            }

            // 3. Pacing.
            tokio::select! {
                _ = token.cancelled() => break,
                _ = pace(loop_start, interval) => {}
            }
        }

        Ok(sent)
    }
}

/// Sleep for whatever is left of `interval` since `loop_start`.
async fn pace(loop_start: Instant, interval: Duration) {
    let elapsed = loop_start.elapsed();
    if elapsed < interval {
        tokio::time::sleep(interval - elapsed).await;
    }
}

// ── PipelineHandle ───────────────────────────────────────────────

/// Owner's handle on a running pipeline. Dropping it cancels the task.
pub struct PipelineHandle {
    token: CancellationToken,
    join: Option<JoinHandle<Result<u64, PipelineError>>>,
}

impl PipelineHandle {
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel the pipeline and wait for it. Returns the frame count, or
    /// the error that had already stopped it.
    pub async fn stop(mut self) -> Result<u64, PipelineError> {
        self.token.cancel();
        let Some(join) = self.join.take() else {
            return Ok(0);
        };
        let outcome = match join.await {
            Ok(result) => result,
            Err(e) => Err(PipelineError::Aborted(e.to_string())),
        };
        match &outcome {
            Ok(frames) => debug!(frames, "frame pipeline stopped"),
            Err(e) => warn!("frame pipeline failed: {e}"),
        }
        outcome
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
