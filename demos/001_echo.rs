//! Echo round trip over the bundled transport.
//!
//! Demonstrates:
//! - Constructing a socket with sub-protocols and options
//! - `onopen` / `onmessage` / `onclose` handlers
//! - `addEventListener` next to a legacy handler
//! - Text, binary and JSON sends
//! - A weak handle inside the error listener
//!
//! Usage:
//!   cargo run --example 001_echo
//!   cargo run --example 001_echo -- --debug
//!   cargo run --example 001_echo -- --url ws://127.0.0.1:9001/

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::Args;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use websocket_compat::{
    Event, EventKind, SubProtocols, WebSocket, WebSocketOptions, listener,
};

// ============================================================================
// Constants
// ============================================================================

const MESSAGES: usize = 3;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let url = match args.url {
        Some(url) => url,
        None => {
            let addr = common::spawn_echo_server().await?;
            format!("ws://{addr}/")
        }
    };

    println!("[1] Connecting to {url}");
    let options = WebSocketOptions::new()
        .with_connect_timeout(Duration::from_secs(5))
        .with_close_timeout(Duration::from_secs(2));
    let ws = WebSocket::with_options(&url, SubProtocols::none(), options)?;
    println!("    readyState = {}", ws.ready_state());

    let (done_tx, done_rx) = oneshot::channel();
    let done_tx = Mutex::new(Some(done_tx));

    // ------------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------------

    let sender = ws.clone();
    ws.set_onopen(move |_| {
        println!("[2] Open, sending {MESSAGES} messages");
        sender.send("hello");
        sender.send(vec![0xde_u8, 0xad, 0xbe, 0xef]);
        if let Err(e) = sender.send_json(&serde_json::json!({ "op": "ping", "seq": 1 })) {
            eprintln!("    send_json failed: {e}");
        }
    });

    let received = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&received);
    let closer = ws.clone();
    ws.set_onmessage(move |event| {
        if let Event::Message(message) = event {
            println!("    <- {:?}", message.data());
        }
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if n == MESSAGES {
            println!("[3] All echoes received, closing");
            closer.close();
        }
    });

    // Error listeners outlive the close; keep only a weak handle
    let weak = ws.downgrade();
    ws.add_event_listener(
        EventKind::Error,
        listener(move |event| {
            if let Some(err) = event.as_error() {
                let state = weak.upgrade().map(|ws| ws.ready_state());
                eprintln!("    error: {err} (readyState = {state:?})");
            }
        }),
    );

    ws.set_onclose(move |event| {
        println!("[4] Closed: {:?}", event.close_frame());
        if let Some(tx) = done_tx.lock().take() {
            let _ = tx.send(());
        }
    });

    // ------------------------------------------------------------------------
    // Wait
    // ------------------------------------------------------------------------

    if tokio::time::timeout(Duration::from_secs(10), done_rx)
        .await
        .is_err()
    {
        println!("    Timed out, closing");
        ws.close();
    }

    println!("    readyState = {}", ws.ready_state());
    Ok(())
}
