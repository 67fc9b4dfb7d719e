//! Reference Pac-Man board.
//!
//! Pixel-space rules: the player is a 30 px sprite that moves 20 px per
//! cell and up to four cells per command, stopping at the board edge.
//! After each command the sprite eats at most one fruit whose circle
//! overlaps its own. The game ends when no fruit is left.

use std::time::Instant;

use image::{Rgb, RgbImage};
use rand::Rng;

use pacstream_core::{
    CELLS_PER_MOVE, Direction, EatenFruit, Game, GameFactory, MoveOutcome,
};

/// Player sprite diameter.
pub const PACMAN_SIZE: i32 = 30;
/// Pixels travelled per cell.
pub const CELL_PX: i32 = 20;
/// Fruit sprite diameter.
pub const FRUIT_SIZE: i32 = 25;
/// Fruits are never placed closer than this to the board edge.
pub const EDGE_MARGIN: i32 = 50;

const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const PACMAN_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

// ── Fruit ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FruitKind {
    Cherry,
    Strawberry,
    Orange,
    Apple,
    Melon,
    Galaxian,
    Bell,
    Key,
}

impl FruitKind {
    pub const ALL: [FruitKind; 8] = [
        FruitKind::Cherry,
        FruitKind::Strawberry,
        FruitKind::Orange,
        FruitKind::Apple,
        FruitKind::Melon,
        FruitKind::Galaxian,
        FruitKind::Bell,
        FruitKind::Key,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            FruitKind::Cherry => "Cherry",
            FruitKind::Strawberry => "Strawberry",
            FruitKind::Orange => "Orange",
            FruitKind::Apple => "Apple",
            FruitKind::Melon => "Melon",
            FruitKind::Galaxian => "Galaxian",
            FruitKind::Bell => "Bell",
            FruitKind::Key => "Key",
        }
    }

    pub const fn points(self) -> i32 {
        match self {
            FruitKind::Cherry => 100,
            FruitKind::Strawberry => 300,
            FruitKind::Orange => 500,
            FruitKind::Apple => 700,
            FruitKind::Melon => 1000,
            FruitKind::Galaxian => 2000,
            FruitKind::Bell => 3000,
            FruitKind::Key => 5000,
        }
    }

    const fn color(self) -> Rgb<u8> {
        match self {
            FruitKind::Cherry => Rgb([220, 20, 60]),
            FruitKind::Strawberry => Rgb([255, 60, 90]),
            FruitKind::Orange => Rgb([255, 140, 0]),
            FruitKind::Apple => Rgb([200, 0, 0]),
            FruitKind::Melon => Rgb([60, 200, 60]),
            FruitKind::Galaxian => Rgb([60, 90, 255]),
            FruitKind::Bell => Rgb([255, 215, 0]),
            FruitKind::Key => Rgb([0, 200, 220]),
        }
    }
}

/// A fruit on the board. `x`/`y` is the top-left of its bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fruit {
    pub kind: FruitKind,
    pub x: i32,
    pub y: i32,
}

// ── Board ────────────────────────────────────────────────────────

pub struct Board {
    width: i32,
    height: i32,
    /// Top-left of the player sprite.
    x: i32,
    y: i32,
    facing: Direction,
    fruits: Vec<Fruit>,
    score: i32,
    started: Instant,
}

impl Board {
    /// Player starts at the board centre, facing right.
    pub fn new(width: u32, height: u32, fruits: Vec<Fruit>) -> Self {
        let width = i32::try_from(width).unwrap_or(i32::MAX);
        let height = i32::try_from(height).unwrap_or(i32::MAX);
        Self {
            width,
            height,
            x: width / 2,
            y: height / 2,
            facing: Direction::Right,
            fruits,
            score: 0,
            started: Instant::now(),
        }
    }

    /// `count` fruits of random kinds at random spots away from the edges.
    pub fn random<R: Rng + ?Sized>(width: u32, height: u32, count: usize, rng: &mut R) -> Self {
        let mut board = Self::new(width, height, Vec::with_capacity(count));
        for _ in 0..count {
            let kind = FruitKind::ALL[rng.gen_range(0..FruitKind::ALL.len())];
            let x = random_spot(rng, board.width);
            let y = random_spot(rng, board.height);
            board.fruits.push(Fruit { kind, x, y });
        }
        board
    }

    /// Top-left of the player sprite.
    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn fruits(&self) -> &[Fruit] {
        &self.fruits
    }

    fn fits(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x + PACMAN_SIZE <= self.width && y + PACMAN_SIZE <= self.height
    }

    /// Index of the first fruit overlapping the player.
    fn colliding_fruit(&self) -> Option<usize> {
        let (cx, cy) = (self.x + PACMAN_SIZE / 2, self.y + PACMAN_SIZE / 2);
        let reach = f64::from(PACMAN_SIZE + FRUIT_SIZE) / 2.0;
        self.fruits.iter().position(|f| {
            let dx = f64::from(cx - (f.x + FRUIT_SIZE / 2));
            let dy = f64::from(cy - (f.y + FRUIT_SIZE / 2));
            dx.hypot(dy) < reach
        })
    }
}

fn random_spot<R: Rng + ?Sized>(rng: &mut R, extent: i32) -> i32 {
    let margin = EDGE_MARGIN.min(extent / 4);
    let span = (extent - 2 * margin).max(1);
    margin + rng.gen_range(0..span)
}

impl Game for Board {
    fn move_player(&mut self, direction: Direction) -> MoveOutcome {
        self.facing = direction;
        let (dx, dy) = direction.delta();

        let mut cells_moved = 0;
        while cells_moved < CELLS_PER_MOVE {
            let (nx, ny) = (self.x + dx * CELL_PX, self.y + dy * CELL_PX);
            if !self.fits(nx, ny) {
                break;
            }
            self.x = nx;
            self.y = ny;
            cells_moved += 1;
        }

        let fruit = self.colliding_fruit().map(|i| {
            let eaten = self.fruits.remove(i);
            self.score += eaten.kind.points();
            EatenFruit {
                name: eaten.kind.name().to_string(),
                points: eaten.kind.points(),
            }
        });

        MoveOutcome { cells_moved, fruit }
    }

    fn is_finished(&self) -> bool {
        self.fruits.is_empty()
    }

    fn score(&self) -> i32 {
        self.score
    }

    fn elapsed_secs(&self) -> i64 {
        i64::try_from(self.started.elapsed().as_secs()).unwrap_or(i64::MAX)
    }

    fn fruits_remaining(&self) -> usize {
        self.fruits.len()
    }

    fn render(&self, surface: &mut RgbImage) {
        for px in surface.pixels_mut() {
            *px = BACKGROUND;
        }
        for fruit in &self.fruits {
            let r = FRUIT_SIZE / 2;
            fill_circle(surface, fruit.x + r, fruit.y + r, r, fruit.kind.color());
        }
        draw_pacman(surface, self.x, self.y, self.facing);
    }
}

// ── Raster helpers ───────────────────────────────────────────────

fn fill_circle(img: &mut RgbImage, cx: i32, cy: i32, r: i32, color: Rgb<u8>) {
    for_each_in_circle(img, cx, cy, r, |px, _, _| *px = color);
}

/// Yellow disc with a wedge-shaped mouth opening towards `facing`.
fn draw_pacman(img: &mut RgbImage, x: i32, y: i32, facing: Direction) {
    let r = PACMAN_SIZE / 2;
    let (fx, fy) = facing.delta();
    for_each_in_circle(img, x + r, y + r, r, |px, dx, dy| {
        let along = dx * fx + dy * fy;
        let across = (dx * fy - dy * fx).abs();
        *px = if along > 0 && across * 2 < along {
            BACKGROUND
        } else {
            PACMAN_COLOR
        };
    });
}

fn for_each_in_circle<F>(img: &mut RgbImage, cx: i32, cy: i32, r: i32, mut f: F)
where
    F: FnMut(&mut Rgb<u8>, i32, i32),
{
    let (w, h) = (img.width() as i32, img.height() as i32);
    for py in (cy - r).max(0)..(cy + r + 1).min(h) {
        for px in (cx - r).max(0)..(cx + r + 1).min(w) {
            let (dx, dy) = (px - cx, py - cy);
            if dx * dx + dy * dy <= r * r {
                f(img.get_pixel_mut(px as u32, py as u32), dx, dy);
            }
        }
    }
}

// ── Factory ──────────────────────────────────────────────────────

/// Deals a fresh random board to every player.
#[derive(Debug, Clone)]
pub struct BoardFactory {
    pub width: u32,
    pub height: u32,
    pub fruit_count: usize,
}

impl GameFactory for BoardFactory {
    fn create(&self, player: &str) -> Box<dyn Game + Send> {
        let board = Board::random(
            self.width,
            self.height,
            self.fruit_count,
            &mut rand::thread_rng(),
        );
        tracing::debug!(player, fruits = ?board.fruits(), "board dealt");
        Box::new(board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn fruit(kind: FruitKind, x: i32, y: i32) -> Fruit {
        Fruit { kind, x, y }
    }

    #[test]
    fn full_move_is_four_cells() {
        let mut board = Board::new(800, 600, vec![fruit(FruitKind::Key, 0, 0)]);
        assert_eq!(board.position(), (400, 300));

        let outcome = board.move_player(Direction::Right);
        assert_eq!(outcome.cells_moved, 4);
        assert!(!outcome.limit_reached());
        assert_eq!(board.position(), (480, 300));
    }

    #[test]
    fn edge_stops_the_player() {
        // 30 px sprite starting at x=50 on a 100 px board: only 20 px of room.
        let mut board = Board::new(100, 600, vec![fruit(FruitKind::Key, 0, 0)]);
        let outcome = board.move_player(Direction::Right);
        assert_eq!(outcome.cells_moved, 1);
        assert!(outcome.limit_reached());
        assert_eq!(board.position(), (70, 300));

        assert_eq!(board.move_player(Direction::Right).cells_moved, 0);
    }

    #[test]
    fn eating_the_last_fruit_finishes_the_game() {
        let mut board = Board::new(
            800,
            600,
            vec![
                fruit(FruitKind::Melon, 480, 300),
                fruit(FruitKind::Cherry, 700, 50),
            ],
        );

        let outcome = board.move_player(Direction::Right);
        assert_eq!(
            outcome.fruit,
            Some(EatenFruit {
                name: "Melon".into(),
                points: 1000,
            })
        );
        assert_eq!(board.score(), 1000);
        assert_eq!(board.fruits_remaining(), 1);
        assert!(!board.is_finished());

        assert_eq!(board.move_player(Direction::Left).fruit, None);
        board.fruits.clear();
        assert!(board.is_finished());
    }

    #[test]
    fn one_fruit_per_move() {
        let mut board = Board::new(
            800,
            600,
            vec![
                fruit(FruitKind::Bell, 480, 300),
                fruit(FruitKind::Key, 482, 302),
            ],
        );
        let outcome = board.move_player(Direction::Right);
        assert_eq!(outcome.fruit.map(|f| f.points), Some(3000));
        assert_eq!(board.fruits_remaining(), 1);
    }

    #[test]
    fn random_board_respects_margins() {
        let mut rng = StdRng::seed_from_u64(7);
        let board = Board::random(800, 600, 50, &mut rng);
        assert_eq!(board.fruits().len(), 50);
        for f in board.fruits() {
            assert!((EDGE_MARGIN..800 - EDGE_MARGIN).contains(&f.x));
            assert!((EDGE_MARGIN..600 - EDGE_MARGIN).contains(&f.y));
        }
    }

    #[test]
    fn point_table() {
        let total: i32 = FruitKind::ALL.iter().map(|k| k.points()).sum();
        assert_eq!(total, 100 + 300 + 500 + 700 + 1000 + 2000 + 3000 + 5000);
    }

    #[test]
    fn render_draws_sprites() {
        let board = Board::new(200, 100, vec![fruit(FruitKind::Orange, 10, 10)]);
        let mut surface = RgbImage::new(200, 100);
        board.render(&mut surface);

        // Fruit centre, player body (behind the mouth), empty corner.
        assert_eq!(*surface.get_pixel(22, 22), FruitKind::Orange.color());
        assert_eq!(*surface.get_pixel(105, 65), PACMAN_COLOR);
        assert_eq!(*surface.get_pixel(199, 0), BACKGROUND);
        // Mouth opens to the right.
        assert_eq!(*surface.get_pixel(127, 65), BACKGROUND);
    }

    #[test]
    fn empty_board_is_finished_at_once() {
        let factory = BoardFactory {
            width: 800,
            height: 600,
            fruit_count: 0,
        };
        assert!(factory.create("ana").is_finished());
    }
}
