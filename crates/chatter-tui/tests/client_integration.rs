//! Integration tests driving the client connection against a real
//! relay server.
//!
//! Tests CAN use `.unwrap()` and `.expect()`. We test the panic-free
//! behavior of production code through assertions.

use std::net::SocketAddr;
use std::time::Duration;

use chatter_protocol::{HexColor, Message};
use chatter_tui::client::{connect, ServerConnection};
use chatter_tui::input::Event;
use chatterd::router::{spawn_router, RouterHandle};
use chatterd::server::ChatServer;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn color(s: &str) -> HexColor {
    s.parse().expect("valid color")
}

/// Spawns a relay server on an ephemeral port.
async fn spawn_server(cancel: CancellationToken) -> (SocketAddr, RouterHandle) {
    let router = spawn_router(cancel.clone());
    let server = ChatServer::bind("127.0.0.1", 0, None, router.clone(), cancel)
        .await
        .expect("bind server");
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(async move {
        server.run().await;
    });
    (addr, router)
}

/// Polls the registry until `count` peers are registered.
async fn wait_for_peers(router: &RouterHandle, count: usize) {
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    loop {
        let peers = router.peers().await.expect("router alive");
        if peers.len() == count {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {count} peers, have {}",
            peers.len()
        );
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// A client connection wired up the way the TUI wires it.
struct TestPeer {
    events: mpsc::UnboundedReceiver<Event>,
    outbound: mpsc::UnboundedSender<Message>,
}

impl TestPeer {
    async fn spawn(addr: SocketAddr, username: &str, cancel: CancellationToken) -> Self {
        let stream = connect(&addr.ip().to_string(), addr.port(), None)
            .await
            .expect("connect");

        let (event_tx, events) = mpsc::unbounded_channel();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let hello = Message::join(username, color("ff0000"));
        let connection = ServerConnection::new(event_tx, outbound_rx, cancel, hello);
        tokio::spawn(connection.run(stream));

        Self { events, outbound }
    }

    async fn next_event(&mut self) -> Event {
        match timeout(EVENT_TIMEOUT, self.events.recv()).await {
            Ok(Some(event)) => event,
            other => panic!("expected an event, got {other:?}"),
        }
    }

    /// Waits for the next inbound chat, skipping notices.
    async fn next_chat(&mut self) -> Message {
        loop {
            match self.next_event().await {
                Event::Inbound(msg @ Message::Chat { .. }) => return msg,
                Event::Inbound(_) => continue,
                other => panic!("expected Inbound, got {other:?}"),
            }
        }
    }
}

#[tokio::test]
async fn test_chat_round_trip_through_server() {
    let cancel = CancellationToken::new();
    let (addr, router) = spawn_server(cancel.clone()).await;

    let mut alice = TestPeer::spawn(addr, "alice", cancel.clone()).await;
    wait_for_peers(&router, 1).await;
    let mut bob = TestPeer::spawn(addr, "bob", cancel.clone()).await;
    wait_for_peers(&router, 2).await;

    // Alice hears bob's arrival.
    match alice.next_event().await {
        Event::Inbound(Message::Join { username, .. }) => assert_eq!(username, "bob"),
        other => panic!("expected join notice, got {other:?}"),
    }

    alice
        .outbound
        .send(Message::chat("alice", color("ff0000"), "hello"))
        .expect("send");

    // The sender sees its own line only through the echo, and both
    // peers see the same frame.
    let alice_saw = alice.next_chat().await;
    let bob_saw = bob.next_chat().await;
    assert_eq!(alice_saw, bob_saw);
    assert_eq!(alice_saw.body(), Some("hello"));

    cancel.cancel();
}

#[tokio::test]
async fn test_server_shutdown_surfaces_as_disconnect() {
    let server_cancel = CancellationToken::new();
    let (addr, router) = spawn_server(server_cancel.clone()).await;

    let client_cancel = CancellationToken::new();
    let mut alice = TestPeer::spawn(addr, "alice", client_cancel.clone()).await;
    wait_for_peers(&router, 1).await;

    server_cancel.cancel();

    let mut saw_disconnect = false;
    for _ in 0..5 {
        match alice.next_event().await {
            Event::Disconnected => {
                saw_disconnect = true;
                break;
            }
            Event::Inbound(_) => continue,
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert!(saw_disconnect, "never saw Disconnected");

    client_cancel.cancel();
}
