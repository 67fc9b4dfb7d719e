//! Connection acceptor.
//!
//! Binds the game port and hands every accepted socket to its own
//! [`Session`] task. A session's failure stays inside that task; the
//! accept loop only ends on shutdown or on an accept error while the
//! server is still live.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pacstream_core::session::ERROR;
use pacstream_core::{Message, MessageWriter, ResultsStore, Session, SessionContext, StartupError};

use crate::board::BoardFactory;
use crate::config::ServerConfig;
use crate::credentials::StaticCredentials;

/// Sent to a client refused because every session slot is taken.
pub const SERVER_FULL: &str = "server full";

// ── GameServer ───────────────────────────────────────────────────

pub struct GameServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    ctx: Arc<SessionContext>,
    /// Present only when a session cap is configured.
    slots: Option<Arc<Semaphore>>,
}

impl GameServer {
    /// Bind `addr`. Failure is fatal; there is no retry on another port.
    pub async fn bind(
        addr: SocketAddr,
        ctx: Arc<SessionContext>,
        max_sessions: Option<usize>,
    ) -> Result<Self, StartupError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| StartupError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| StartupError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        Ok(Self {
            listener,
            local_addr,
            ctx,
            slots: max_sessions.map(|n| Arc::new(Semaphore::new(n))),
        })
    }

    /// Build the session context from `config` (results store, board,
    /// credential table) and bind the configured address.
    pub async fn from_config(config: &ServerConfig) -> Result<Self, StartupError> {
        let credentials = StaticCredentials::new(&config.auth.users);
        if credentials.is_empty() {
            warn!("no users configured; every login will be rejected");
        } else {
            info!("{} users loaded", credentials.len());
        }

        let ctx = Arc::new(SessionContext {
            validator: Arc::new(credentials),
            games: Arc::new(BoardFactory {
                width: config.board.width,
                height: config.board.height,
                fruit_count: config.board.fruit_count,
            }),
            store: Arc::new(ResultsStore::open(&config.results.path)?),
            stream: config.to_stream_config(),
            read_timeout: config.read_timeout(),
        });
        Self::bind(config.listen_addr()?, ctx, config.max_sessions()).await
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn store(&self) -> Arc<ResultsStore> {
        Arc::clone(&self.ctx.store)
    }

    /// Accept until `shutdown` is cancelled. Live sessions are aborted
    /// on the way out.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), StartupError> {
        info!("pacstream listening on {}", self.local_addr);

        let mut sessions = JoinSet::new();
        let mut next_id: u64 = 0;

        let result = loop {
            let accept = tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),
                Some(done) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = done {
                        warn!("session task ended abnormally: {e}");
                    }
                    continue;
                }
                accept = self.listener.accept() => accept,
            };

            let (stream, peer) = match accept {
                Ok(pair) => pair,
                // The listener going away during shutdown is not a failure.
                Err(_) if shutdown.is_cancelled() => break Ok(()),
                Err(source) => {
                    break Err(StartupError::Accept {
                        local: self.local_addr,
                        source,
                    });
                }
            };

            let permit = match &self.slots {
                None => None,
                Some(slots) => match Arc::clone(slots).try_acquire_owned() {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        warn!(%peer, "session limit reached; turning client away");
                        tokio::spawn(turn_away(stream));
                        continue;
                    }
                },
            };

            if let Err(e) = stream.set_nodelay(true) {
                debug!(%peer, "set_nodelay: {e}");
            }

            let id = next_id;
            next_id += 1;
            info!(session = id, %peer, active = sessions.len() + 1, "client connected");

            let session = Session::new(id, stream, Arc::clone(&self.ctx));
            sessions.spawn(async move {
                let _permit = permit;
                // Outcome and errors are logged by the session itself.
                let _ = session.run().await;
            });
        };

        if !sessions.is_empty() {
            info!(active = sessions.len(), "aborting live sessions");
        }
        sessions.shutdown().await;
        info!("pacstream server stopped");
        result
    }
}

/// Tell a refused client why, then close its socket.
async fn turn_away(stream: TcpStream) {
    let writer = MessageWriter::new(stream);
    if let Err(e) = writer.send(Message::text(format!("{ERROR}|{SERVER_FULL}"))).await {
        debug!("could not notify refused client: {e}");
    }
    if let Err(e) = writer.close().await {
        debug!("close: {e}");
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use pacstream_core::{GameClient, StreamConfig};

    fn context(fruit_count: usize) -> Arc<SessionContext> {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir()
            .join(format!("pacstream-service-{}-{n}", std::process::id()))
            .join("results.dat");

        let mut users = BTreeMap::new();
        users.insert("ana".to_string(), "pw".to_string());
        Arc::new(SessionContext {
            validator: Arc::new(StaticCredentials::new(&users)),
            games: Arc::new(BoardFactory {
                width: 160,
                height: 120,
                fruit_count,
            }),
            store: Arc::new(ResultsStore::open(path).unwrap()),
            stream: StreamConfig {
                target_fps: 10,
                quality: 0.5,
                width: 160,
                height: 120,
            },
            read_timeout: None,
        })
    }

    fn localhost() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn serves_a_game_and_stops_on_cancel() {
        let ctx = context(0);
        let server = GameServer::bind(localhost(), Arc::clone(&ctx), None)
            .await
            .unwrap();
        let addr = server.local_addr();
        let shutdown = CancellationToken::new();
        let running = tokio::spawn(server.run(shutdown.clone()));

        let mut client = GameClient::connect(addr).await.unwrap();
        assert!(client.login("ana", "pw").await.unwrap());
        assert_eq!(
            client.next_message().await.unwrap(),
            Some(Message::text("GAME_STARTED|ana"))
        );
        // An empty board is over immediately.
        assert!(matches!(
            client.next_message().await.unwrap(),
            Some(Message::Result(r)) if r.player == "ana" && r.score == 0
        ));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
        assert_eq!(ctx.store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn port_in_use_is_a_startup_error() {
        let first = GameServer::bind(localhost(), context(1), None)
            .await
            .unwrap();
        let taken = first.local_addr();

        match GameServer::bind(taken, context(1), None).await {
            Err(StartupError::Bind { addr, .. }) => assert_eq!(addr, taken.to_string()),
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("second bind succeeded"),
        }
    }

    #[tokio::test]
    async fn session_cap_turns_extra_clients_away() {
        let server = GameServer::bind(localhost(), context(1), Some(1))
            .await
            .unwrap();
        let addr = server.local_addr();
        let shutdown = CancellationToken::new();
        let running = tokio::spawn(server.run(shutdown.clone()));

        let mut first = GameClient::connect(addr).await.unwrap();
        assert!(matches!(
            first.next_message().await.unwrap(),
            Some(Message::Auth { .. })
        ));

        let mut second = GameClient::connect(addr).await.unwrap();
        let turned_away = tokio::time::timeout(Duration::from_secs(5), second.recv())
            .await
            .expect("second client left hanging")
            .unwrap();
        assert_eq!(turned_away, Some(Message::text("ERROR|server full")));
        assert_eq!(second.recv().await.unwrap(), None);

        // The first session is unaffected.
        assert!(first.login("ana", "pw").await.unwrap());

        shutdown.cancel();
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn a_failing_session_does_not_stop_the_acceptor() {
        let server = GameServer::bind(localhost(), context(0), None)
            .await
            .unwrap();
        let addr = server.local_addr();
        let shutdown = CancellationToken::new();
        let running = tokio::spawn(server.run(shutdown.clone()));

        // Garbage instead of credentials.
        {
            use tokio::io::AsyncWriteExt;
            let mut raw = tokio::net::TcpStream::connect(addr).await.unwrap();
            raw.write_all(&[0, 4, b'J', b'U', b'N', b'K']).await.unwrap();
        }

        let mut client = GameClient::connect(addr).await.unwrap();
        assert!(client.login("ana", "pw").await.unwrap());

        shutdown.cancel();
        running.await.unwrap().unwrap();
    }
}
