//! Game surface capture and JPEG compression.

use bytes::Bytes;
use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;

use super::FrameProducer;
use crate::error::PipelineError;
use crate::game::SharedGame;

/// Renders a [`SharedGame`] into a reusable RGB surface and compresses
/// it to JPEG.
pub struct JpegFrameProducer {
    game: SharedGame,
    surface: RgbImage,
    quality: u8,
    /// Size of the last encoded frame, used to pre-size the next buffer.
    last_len: usize,
}

impl JpegFrameProducer {
    /// `quality` is in `0.0..=1.0`, mapped onto the encoder's `1..=100`.
    pub fn new(
        game: SharedGame,
        width: u32,
        height: u32,
        quality: f32,
    ) -> Result<Self, PipelineError> {
        if width == 0 || height == 0 {
            return Err(PipelineError::Capture(format!(
                "empty frame surface {width}x{height}"
            )));
        }
        Ok(Self {
            game,
            surface: RgbImage::new(width, height),
            quality: jpeg_quality(quality),
            last_len: 0,
        })
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl FrameProducer for JpegFrameProducer {
    fn produce(&mut self) -> Result<Bytes, PipelineError> {
        self.game.render_into(&mut self.surface);

        let mut out = Vec::with_capacity(self.last_len.max(4096));
        JpegEncoder::new_with_quality(&mut out, self.quality).encode_image(&self.surface)?;
        self.last_len = out.len();
        Ok(Bytes::from(out))
    }
}

/// Map a `0.0..=1.0` quality onto JPEG's `1..=100` scale.
pub fn jpeg_quality(quality: f32) -> u8 {
    let q = if quality.is_finite() {
        quality.clamp(0.0, 1.0)
    } else {
        0.5
    };
    ((q * 100.0).round() as u8).clamp(1, 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Game, MoveOutcome};
    use crate::message::Direction;

    struct Flat([u8; 3]);

    impl Game for Flat {
        fn move_player(&mut self, _direction: Direction) -> MoveOutcome {
            MoveOutcome {
                cells_moved: 0,
                fruit: None,
            }
        }
        fn is_finished(&self) -> bool {
            false
        }
        fn score(&self) -> i32 {
            0
        }
        fn elapsed_secs(&self) -> i64 {
            0
        }
        fn fruits_remaining(&self) -> usize {
            1
        }
        fn render(&self, surface: &mut RgbImage) {
            for px in surface.pixels_mut() {
                px.0 = self.0;
            }
        }
    }

    #[test]
    fn quality_mapping() {
        assert_eq!(jpeg_quality(0.5), 50);
        assert_eq!(jpeg_quality(0.0), 1);
        assert_eq!(jpeg_quality(1.0), 100);
        assert_eq!(jpeg_quality(7.0), 100);
        assert_eq!(jpeg_quality(f32::NAN), 50);
    }

    #[test]
    fn produces_a_jpeg() {
        let game = SharedGame::new(Box::new(Flat([10, 20, 200])));
        let mut producer = JpegFrameProducer::new(game, 64, 48, 0.5).unwrap();
        let frame = producer.produce().unwrap();

        // SOI marker ... EOI marker.
        assert_eq!(&frame[..2], &[0xFF, 0xD8]);
        assert_eq!(&frame[frame.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn empty_surface_is_refused() {
        let game = SharedGame::new(Box::new(Flat([0, 0, 0])));
        assert!(matches!(
            JpegFrameProducer::new(game, 0, 10, 0.5),
            Err(PipelineError::Capture(_))
        ));
    }
}
