//! Game collaborator interface.
//!
//! The session handler never knows the board rules. It drives a game
//! through [`Game`], and the frame pipeline renders the same instance
//! through the [`SharedGame`] handle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::RgbImage;

use crate::message::Direction;

/// Cells a single command asks the player to move.
pub const CELLS_PER_MOVE: u32 = 4;

/// A fruit consumed during a move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EatenFruit {
    pub name: String,
    pub points: i32,
}

/// What one move actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Cells travelled, at most [`CELLS_PER_MOVE`]. Fewer means the
    /// board edge stopped the player.
    pub cells_moved: u32,
    pub fruit: Option<EatenFruit>,
}

impl MoveOutcome {
    pub fn limit_reached(&self) -> bool {
        self.cells_moved < CELLS_PER_MOVE
    }
}

pub trait Game {
    fn move_player(&mut self, direction: Direction) -> MoveOutcome;

    /// All fruit consumed.
    fn is_finished(&self) -> bool;

    fn score(&self) -> i32;

    /// Whole seconds since the game was created.
    fn elapsed_secs(&self) -> i64;

    fn fruits_remaining(&self) -> usize;

    /// Draw the current state onto `surface`, which already has the
    /// configured frame dimensions.
    fn render(&self, surface: &mut RgbImage);
}

/// Creates one game per authenticated player.
pub trait GameFactory: Send + Sync {
    fn create(&self, player: &str) -> Box<dyn Game + Send>;
}

/// A game shared between the command loop and the frame pipeline.
#[derive(Clone)]
pub struct SharedGame {
    inner: Arc<Mutex<Box<dyn Game + Send>>>,
}

impl SharedGame {
    pub fn new(game: Box<dyn Game + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(game)),
        }
    }

    /// Lock the game. A panic in another holder does not leave the board
    /// in a state worth refusing, so poisoning is ignored.
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn Game + Send>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn render_into(&self, surface: &mut RgbImage) {
        self.lock().render(surface);
    }
}
