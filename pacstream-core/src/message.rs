//! Wire message types.
//!
//! Every message on the wire starts with a short [`Tag`] token and is
//! followed by the fields that tag requires, in a fixed order:
//!
//! | Tag    | Direction        | Fields                              |
//! |--------|------------------|-------------------------------------|
//! | `AUTH` | either           | step string, payload string         |
//! | `CMD`  | client → server  | direction string                    |
//! | `MSG`  | server → client  | text string                         |
//! | `FRM`  | server → client  | i32 length, raw JPEG bytes          |
//! | `RES`  | server → client  | `player|score|elapsed` string       |

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::error::ProtocolError;

// ── Tag ──────────────────────────────────────────────────────────

/// Message discriminant written before every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Auth,
    Command,
    Text,
    Frame,
    Result,
}

impl Tag {
    /// The token written on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Tag::Auth => "AUTH",
            Tag::Command => "CMD",
            Tag::Text => "MSG",
            Tag::Frame => "FRM",
            Tag::Result => "RES",
        }
    }
}

impl TryFrom<&str> for Tag {
    type Error = ProtocolError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "AUTH" => Ok(Tag::Auth),
            "CMD" => Ok(Tag::Command),
            "MSG" => Ok(Tag::Text),
            "FRM" => Ok(Tag::Frame),
            "RES" => Ok(Tag::Result),
            other => Err(ProtocolError::UnknownTag(other.to_string())),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Direction ────────────────────────────────────────────────────

/// A movement command issued by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
        }
    }

    /// Unit step `(dx, dy)` in screen coordinates (y grows downwards).
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Direction::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown direction: {s:?}"))
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── GameResult ───────────────────────────────────────────────────

/// Final outcome of one game, carried by a `RES` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameResult {
    pub player: String,
    pub score: i32,
    pub elapsed_secs: i64,
}

impl GameResult {
    /// `player|score|elapsed`.
    pub fn to_wire(&self) -> String {
        format!("{}|{}|{}", self.player, self.score, self.elapsed_secs)
    }

    /// Parse `player|score|elapsed`. The player name may itself contain
    /// `|`; the numeric fields are taken from the right.
    pub fn from_wire(text: &str) -> Result<Self, ProtocolError> {
        let mut parts = text.rsplitn(3, '|');
        let elapsed = parts.next();
        let score = parts.next();
        let player = parts.next();

        match (player, score, elapsed) {
            (Some(player), Some(score), Some(elapsed)) => Ok(Self {
                player: player.to_string(),
                score: score
                    .parse()
                    .map_err(|_| ProtocolError::Malformed("result score is not an i32"))?,
                elapsed_secs: elapsed
                    .parse()
                    .map_err(|_| ProtocolError::Malformed("result elapsed is not an i64"))?,
            }),
            _ => Err(ProtocolError::Malformed(
                "result must be player|score|elapsed",
            )),
        }
    }
}

// ── Message ──────────────────────────────────────────────────────

/// One complete protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Authentication exchange. Server to client, `step` names the stage
    /// (`REQUEST`, `ACCEPTED`, `REJECTED`) and `payload` is human text.
    /// Client to server, `step` carries the player name and `payload`
    /// the secret.
    Auth { step: String, payload: String },
    /// Movement command.
    Command(String),
    /// Informational text.
    Text(String),
    /// One JPEG-compressed video frame.
    Frame(Bytes),
    /// Final game outcome.
    Result(GameResult),
}

impl Message {
    pub fn tag(&self) -> Tag {
        match self {
            Message::Auth { .. } => Tag::Auth,
            Message::Command(_) => Tag::Command,
            Message::Text(_) => Tag::Text,
            Message::Frame(_) => Tag::Frame,
            Message::Result(_) => Tag::Result,
        }
    }

    pub fn auth(step: impl Into<String>, payload: impl Into<String>) -> Self {
        Message::Auth {
            step: step.into(),
            payload: payload.into(),
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Message::Text(body.into())
    }

    pub fn command(direction: Direction) -> Self {
        Message::Command(direction.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_roundtrip() {
        for tag in [Tag::Auth, Tag::Command, Tag::Text, Tag::Frame, Tag::Result] {
            assert_eq!(Tag::try_from(tag.as_str()).unwrap(), tag);
        }
    }

    #[test]
    fn tag_invalid() {
        assert!(matches!(
            Tag::try_from("NOPE"),
            Err(ProtocolError::UnknownTag(t)) if t == "NOPE"
        ));
    }

    #[test]
    fn direction_parse_is_lenient() {
        assert_eq!(" up ".parse::<Direction>().unwrap(), Direction::Up);
        assert_eq!("Right".parse::<Direction>().unwrap(), Direction::Right);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn result_wire_format() {
        let r = GameResult {
            player: "ana".into(),
            score: 2100,
            elapsed_secs: 47,
        };
        assert_eq!(r.to_wire(), "ana|2100|47");
        assert_eq!(GameResult::from_wire("ana|2100|47").unwrap(), r);
    }

    #[test]
    fn result_player_may_contain_separator() {
        let r = GameResult::from_wire("a|b|5|9").unwrap();
        assert_eq!(r.player, "a|b");
        assert_eq!(r.score, 5);
        assert_eq!(r.elapsed_secs, 9);
    }

    #[test]
    fn result_rejects_garbage() {
        assert!(GameResult::from_wire("only-name").is_err());
        assert!(GameResult::from_wire("x|NaN|1").is_err());
    }
}
