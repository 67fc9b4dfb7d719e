//! End-to-end: a server built from a TOML config, driven by real clients.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use pacstream_core::{GameClient, Message};
use pacstream_server::config::ServerConfig;
use pacstream_server::service::GameServer;

fn config_with_results_in(dir: &std::path::Path) -> ServerConfig {
    let text = format!(
        r#"
        [network]
        bind_address = "127.0.0.1"
        port = 0

        [streaming]
        fps = 15
        jpeg_quality = 0.3

        [board]
        width = 320
        height = 240
        fruit_count = 0

        [results]
        path = "{}"

        [auth.users]
        ana = "pw"
        "#,
        dir.join("results.dat").display().to_string().replace('\\', "/")
    );
    toml::from_str(&text).unwrap()
}

#[tokio::test]
async fn configured_server_records_games_and_rejects_strangers() {
    let dir = std::env::temp_dir().join(format!("pacstream-smoke-{}", std::process::id()));
    let config = config_with_results_in(&dir);
    assert_eq!(config.to_stream_config().target_fps, 15);

    let server = GameServer::from_config(&config).await.unwrap();
    let addr = server.local_addr();
    let store = server.store();
    store.truncate().unwrap();

    let shutdown = CancellationToken::new();
    let running = tokio::spawn(server.run(shutdown.clone()));

    // Unknown player.
    let mut stranger = GameClient::connect(addr).await.unwrap();
    assert!(!stranger.login("eve", "pw").await.unwrap());
    assert_eq!(stranger.recv().await.unwrap(), None);

    // Known player; an empty board ends right after the start notice.
    let mut client = GameClient::connect(addr).await.unwrap();
    assert!(client.login("ana", "pw").await.unwrap());
    assert_eq!(
        client.next_message().await.unwrap(),
        Some(Message::text("GAME_STARTED|ana"))
    );
    let result = tokio::time::timeout(Duration::from_secs(5), client.next_message())
        .await
        .expect("no result")
        .unwrap();
    assert!(matches!(result, Some(Message::Result(r)) if r.player == "ana"));

    shutdown.cancel();
    running.await.unwrap().unwrap();

    let summary = store.summary().unwrap().unwrap();
    assert_eq!(summary.count, 1);
    assert_eq!(store.best_player().unwrap().unwrap().name(), "ana");
}
