//! End-to-end tests against an in-process WebSocket server.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Instant, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{WebSocketStream, accept_async, accept_hdr_async};
use tokio_util::sync::CancellationToken;
use tracing::Level;

use signlink_client::{
    ClientConfig, ConnectionState, FixedDelay, Session, SessionEnd, Supervisor,
};
use signlink_core::logging::capture_logs;
use signlink_core::{
    Dispatcher, FullSigResponse, PlaceholderSigner, SchemaProfile, decode_envelope, decode_payload,
};
use signlink_settings::SignlinkSettings;

const TIMEOUT: Duration = Duration::from_secs(5);
const CLIENT_ID: &str = "cli-int";

type ServerWs = WebSocketStream<TcpStream>;

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    (listener, url)
}

fn session(url: &str) -> Session {
    let mut settings = SignlinkSettings::default();
    settings.endpoint.url = url.to_string();
    settings.endpoint.client_id = CLIENT_ID.to_string();
    let config = ClientConfig::from_settings(&settings).unwrap();
    let dispatcher = Dispatcher::new(CLIENT_ID, SchemaProfile::PartialSig, Arc::new(PlaceholderSigner));
    Session::new(Arc::new(config), Arc::new(dispatcher))
}

async fn accept(listener: &TcpListener) -> ServerWs {
    let (stream, _) = timeout(TIMEOUT, listener.accept()).await.unwrap().unwrap();
    accept_async(stream).await.unwrap()
}

fn partial_sig(tx: &str) -> Message {
    Message::Text(
        json!({
            "action": "sendClient",
            "operationType": "PartialSig",
            "message": {
                "accountHash": "0xabc",
                "teamId": "team-1",
                "transactionId": tx,
                "partialSig": "ps",
            },
        })
        .to_string()
        .into(),
    )
}

async fn next_full_sig(ws: &mut ServerWs) -> FullSigResponse {
    loop {
        let frame = timeout(TIMEOUT, ws.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = frame {
            let envelope = decode_envelope(text.as_bytes()).unwrap();
            assert_eq!(envelope.operation_type, "FullSig");
            assert_eq!(envelope.source_id.as_deref(), Some(CLIENT_ID));
            return decode_payload(&envelope).unwrap();
        }
    }
}

#[tokio::test]
async fn signs_over_real_socket() {
    let (listener, url) = bind().await;
    let session = Arc::new(session(&url));
    let cancel = CancellationToken::new();
    let client = {
        let session = session.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { session.connect_and_listen(&cancel).await })
    };

    let (stream, _) = timeout(TIMEOUT, listener.accept()).await.unwrap().unwrap();
    let mut uri = String::new();
    let mut ws = accept_hdr_async(
        stream,
        |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            uri = req.uri().to_string();
            Ok(resp)
        },
    )
    .await
    .unwrap();
    assert_eq!(uri, format!("/ws?type=cli&cliId={CLIENT_ID}"));

    ws.send(Message::Text("garbage".into())).await.unwrap();
    ws.send(partial_sig("tx-42")).await.unwrap();

    let reply = next_full_sig(&mut ws).await;
    assert_eq!(reply.transaction_id, "tx-42");
    assert_eq!(reply.team_id, "team-1");
    assert_eq!(reply.account_hash, "0xabc");
    assert_eq!(session.state(), ConnectionState::Open);

    cancel.cancel();
    let end = timeout(TIMEOUT, client).await.unwrap().unwrap();
    assert_matches!(end, Ok(SessionEnd::Cancelled));
    assert_eq!(session.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn reconnects_after_server_drop() {
    let (listener, url) = bind().await;
    let delay = Duration::from_millis(200);
    let cancel = CancellationToken::new();
    let supervisor = tokio::spawn(
        Supervisor::new(session(&url), Box::new(FixedDelay(delay))).run(cancel.clone()),
    );

    let first = accept(&listener).await;
    let dropped_at = Instant::now();
    drop(first);

    let mut second = accept(&listener).await;
    assert!(dropped_at.elapsed() >= delay);

    second.send(partial_sig("tx-after")).await.unwrap();
    assert_eq!(next_full_sig(&mut second).await.transaction_id, "tx-after");

    cancel.cancel();
    timeout(TIMEOUT, supervisor).await.unwrap().unwrap();
}

#[tokio::test]
async fn orderly_close_is_followed_by_delay() {
    let (listener, url) = bind().await;
    let delay = Duration::from_millis(150);
    let cancel = CancellationToken::new();
    let supervisor = tokio::spawn(
        Supervisor::new(session(&url), Box::new(FixedDelay(delay))).run(cancel.clone()),
    );

    let mut first = accept(&listener).await;
    first.close(None).await.unwrap();
    let closed_at = Instant::now();
    // drain the close handshake
    while let Ok(Some(Ok(_))) = timeout(TIMEOUT, first.next()).await {}

    let _second = accept(&listener).await;
    assert!(closed_at.elapsed() >= delay);

    cancel.cancel();
    timeout(TIMEOUT, supervisor).await.unwrap().unwrap();
}

#[tokio::test]
async fn refused_dials_are_retried() {
    let (logs, _guard) = capture_logs();
    let (listener, url) = bind().await;
    drop(listener);

    let cancel = CancellationToken::new();
    let supervisor = tokio::spawn(
        Supervisor::new(session(&url), Box::new(FixedDelay(Duration::from_millis(20))))
            .run(cancel.clone()),
    );

    let deadline = Instant::now() + TIMEOUT;
    while logs.matching("connection failed").len() < 3 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cancel.cancel();
    timeout(TIMEOUT, supervisor).await.unwrap().unwrap();

    let failures = logs.matching("connection failed");
    assert!(failures.len() >= 3);
    assert!(failures.iter().all(|e| e.level == Level::WARN));
    assert!(logs.has_message("supervisor stopped"));
}
