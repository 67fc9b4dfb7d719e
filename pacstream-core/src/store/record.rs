//! Fixed-width binary encoding of one completed game.
//!
//! ```text
//! name:     50 UTF-16 code units, big-endian, space padded (100 bytes)
//! score:    i32 big-endian                                 (4 bytes)
//! elapsed:  i64 big-endian, seconds                        (8 bytes)
//! ```
//!
//! This is the only place that knows the byte offsets; the store works
//! in whole records.

use crate::message::GameResult;

/// Name field width in UTF-16 code units.
pub const NAME_UNITS: usize = 50;

/// Bytes per record on disk.
pub const RECORD_SIZE: usize = NAME_UNITS * 2 + 4 + 8;

const PAD: u16 = b' ' as u16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    name: String,
    pub score: i32,
    pub elapsed_secs: i64,
}

impl ResultRecord {
    /// Names longer than [`NAME_UNITS`] UTF-16 units are truncated on a
    /// character boundary.
    pub fn new(name: &str, score: i32, elapsed_secs: i64) -> Self {
        Self {
            name: truncate_utf16(name, NAME_UNITS).to_string(),
            score,
            elapsed_secs,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `self` ranks above `other`: higher score wins, ties go to
    /// the shorter game.
    pub fn beats(&self, other: &ResultRecord) -> bool {
        self.score > other.score
            || (self.score == other.score && self.elapsed_secs < other.elapsed_secs)
    }

    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];

        let units = self
            .name
            .encode_utf16()
            .chain(std::iter::repeat(PAD))
            .take(NAME_UNITS);
        for (i, unit) in units.enumerate() {
            buf[i * 2..i * 2 + 2].copy_from_slice(&unit.to_be_bytes());
        }

        let score_at = NAME_UNITS * 2;
        buf[score_at..score_at + 4].copy_from_slice(&self.score.to_be_bytes());
        buf[score_at + 4..].copy_from_slice(&self.elapsed_secs.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8; RECORD_SIZE]) -> Self {
        let units: Vec<u16> = buf[..NAME_UNITS * 2]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        let name = String::from_utf16_lossy(&units);

        let score_at = NAME_UNITS * 2;
        let mut score = [0u8; 4];
        score.copy_from_slice(&buf[score_at..score_at + 4]);
        let mut elapsed = [0u8; 8];
        elapsed.copy_from_slice(&buf[score_at + 4..]);

        Self {
            name: name.trim_end_matches(' ').to_string(),
            score: i32::from_be_bytes(score),
            elapsed_secs: i64::from_be_bytes(elapsed),
        }
    }
}

impl From<&ResultRecord> for GameResult {
    fn from(record: &ResultRecord) -> Self {
        GameResult {
            player: record.name.clone(),
            score: record.score,
            elapsed_secs: record.elapsed_secs,
        }
    }
}

impl std::fmt::Display for ResultRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} | {} points | {} s",
            self.name, self.score, self.elapsed_secs
        )
    }
}

fn truncate_utf16(s: &str, max_units: usize) -> &str {
    let mut units = 0;
    for (idx, ch) in s.char_indices() {
        units += ch.len_utf16();
        if units > max_units {
            return &s[..idx];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_size_matches_layout() {
        assert_eq!(RECORD_SIZE, 112);
        assert_eq!(ResultRecord::new("a", 1, 1).encode().len(), RECORD_SIZE);
    }

    #[test]
    fn decode_restores_fields_and_trims_padding() {
        let rec = ResultRecord::new("ana", -300, 9_000_000_000);
        let back = ResultRecord::decode(&rec.encode());
        assert_eq!(back, rec);
        assert_eq!(back.name(), "ana");
    }

    #[test]
    fn name_is_utf16_big_endian_space_padded() {
        let buf = ResultRecord::new("Zé", 0, 0).encode();
        assert_eq!(&buf[0..4], &[0x00, b'Z', 0x00, 0xE9]);
        assert_eq!(&buf[4..6], &[0x00, b' ']);
        assert_eq!(&buf[98..100], &[0x00, b' ']);
    }

    #[test]
    fn long_names_are_truncated() {
        let long = "x".repeat(80);
        let rec = ResultRecord::new(&long, 5, 6);
        assert_eq!(rec.name().len(), NAME_UNITS);
        assert_eq!(ResultRecord::decode(&rec.encode()), rec);
    }

    #[test]
    fn truncation_never_splits_a_surrogate_pair() {
        // 49 units of ASCII followed by a 2-unit emoji.
        let name = format!("{}\u{1F352}", "y".repeat(49));
        let rec = ResultRecord::new(&name, 0, 0);
        assert_eq!(rec.name(), "y".repeat(49));
    }

    #[test]
    fn ranking_prefers_score_then_speed() {
        let slow = ResultRecord::new("a", 200, 30);
        let fast = ResultRecord::new("b", 200, 20);
        let low = ResultRecord::new("c", 100, 1);
        assert!(fast.beats(&slow));
        assert!(!slow.beats(&fast));
        assert!(slow.beats(&low));
        assert!(!fast.beats(&fast.clone()));
    }
}
