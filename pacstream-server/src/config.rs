//! Configuration for the pacstream server.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use pacstream_core::{StartupError, StreamConfig};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub network: NetworkConfig,
    pub streaming: StreamingConfig,
    pub board: BoardConfig,
    pub results: ResultsConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub bind_address: String,
    /// TCP port for game clients.
    pub port: u16,
    /// Concurrent session cap. 0 = unlimited.
    pub max_sessions: usize,
    /// Seconds a client may stay silent when a reply is due. 0 = forever.
    pub read_timeout_secs: u64,
}

/// Video streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Target frames per second.
    pub fps: u32,
    /// JPEG quality, 0.0 to 1.0.
    pub jpeg_quality: f32,
}

/// Game board.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Board (and frame) width in pixels.
    pub width: u32,
    pub height: u32,
    /// Fruits placed per game.
    pub fruit_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultsConfig {
    /// Results file. Created with its directory on first use.
    pub path: PathBuf,
}

/// Preloaded credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Player name → secret.
    pub users: BTreeMap<String, String>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            port: 8080,
            max_sessions: 0,
            read_timeout_secs: 0,
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            jpeg_quality: 0.5,
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            fruit_count: 4,
        }
    }
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/results.dat"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ServerConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Listening address from `network.bind_address` and `network.port`.
    pub fn listen_addr(&self) -> Result<SocketAddr, StartupError> {
        let text = format!("{}:{}", self.network.bind_address, self.network.port);
        text.parse()
            .map_err(|e| StartupError::Config(format!("bad listen address {text:?}: {e}")))
    }

    /// Streaming settings with fps clamped to `1..=60` and quality to
    /// `0.0..=1.0`. The frame is the board size.
    pub fn to_stream_config(&self) -> StreamConfig {
        let quality = if self.streaming.jpeg_quality.is_finite() {
            self.streaming.jpeg_quality.clamp(0.0, 1.0)
        } else {
            StreamingConfig::default().jpeg_quality
        };
        StreamConfig {
            target_fps: self.streaming.fps.clamp(1, 60),
            quality,
            width: self.board.width,
            height: self.board.height,
        }
    }

    /// `None` when the timeout is disabled.
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.network.read_timeout_secs > 0)
            .then(|| Duration::from_secs(self.network.read_timeout_secs))
    }

    /// `None` when sessions are unlimited.
    pub fn max_sessions(&self) -> Option<usize> {
        (self.network.max_sessions > 0).then_some(self.network.max_sessions)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&ServerConfig::default()).unwrap();
        assert!(text.contains("port = 8080"));
        assert!(text.contains("fps"));
        assert!(text.contains("results.dat"));
    }

    #[test]
    fn roundtrip_config() {
        let mut cfg = ServerConfig::default();
        cfg.auth.users.insert("ana".into(), "pw".into());
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ServerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.port, 8080);
        assert_eq!(parsed.streaming.fps, 30);
        assert_eq!(parsed.auth.users.get("ana").map(String::as_str), Some("pw"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed: ServerConfig = toml::from_str(
            r#"
            [network]
            port = 9000

            [auth.users]
            bob = "hunter2"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.network.port, 9000);
        assert_eq!(parsed.network.bind_address, "0.0.0.0");
        assert_eq!(parsed.board.fruit_count, 4);
        assert_eq!(parsed.auth.users.len(), 1);
    }

    #[test]
    fn to_stream_config_clamps() {
        let mut cfg = ServerConfig::default();
        cfg.streaming.fps = 120;
        cfg.streaming.jpeg_quality = 3.0;
        let stream = cfg.to_stream_config();
        assert_eq!(stream.target_fps, 60);
        assert_eq!(stream.quality, 1.0);
        assert_eq!((stream.width, stream.height), (800, 600));

        cfg.streaming.fps = 0;
        assert_eq!(cfg.to_stream_config().target_fps, 1);
    }

    #[test]
    fn optional_limits_default_off() {
        let mut cfg = ServerConfig::default();
        assert_eq!(cfg.read_timeout(), None);
        assert_eq!(cfg.max_sessions(), None);

        cfg.network.read_timeout_secs = 30;
        cfg.network.max_sessions = 8;
        assert_eq!(cfg.read_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(cfg.max_sessions(), Some(8));
    }

    #[test]
    fn listen_addr_parses() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.listen_addr().unwrap().port(), 8080);

        let mut bad = ServerConfig::default();
        bad.network.bind_address = "not an ip".into();
        assert!(matches!(bad.listen_addr(), Err(StartupError::Config(_))));
    }

    #[test]
    fn missing_file_falls_back() {
        let cfg = ServerConfig::load(Path::new("/definitely/not/here.toml"));
        assert_eq!(cfg.network.port, 8080);
    }

    #[test]
    fn written_default_loads_back() {
        let path = std::env::temp_dir().join(format!(
            "pacstream-config-{}.toml",
            std::process::id()
        ));
        ServerConfig::write_default(&path).unwrap();
        let cfg = ServerConfig::load(&path);
        assert_eq!(cfg.network.port, 8080);
        assert_eq!(cfg.streaming.fps, 30);
        assert_eq!(cfg.results.path, PathBuf::from("data/results.dat"));
        std::fs::remove_file(&path).unwrap();
    }
}
