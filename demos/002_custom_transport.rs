//! Facade over a caller-supplied transport.
//!
//! Demonstrates:
//! - Implementing `Transport` for an in-process loopback
//! - Driving the `Dispatcher` by hand
//! - Closing before open: one `close` event, delivered later
//!
//! Usage:
//!   cargo run --example 002_custom_transport
//!   cargo run --example 002_custom_transport -- --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use common::Args;
use websocket_compat::{
    CloseCode, CloseFrame, Completion, Data, Notifier, Result, SubProtocols, Transport, WebSocket,
};

// ============================================================================
// Loopback Transport
// ============================================================================

/// Echoes every payload back. Closes only once opened.
struct Loopback {
    notifier: Notifier,
    opened: bool,
}

impl Loopback {
    fn new(notifier: Notifier, opened: bool) -> Self {
        if opened {
            notifier.open();
        }
        Self { notifier, opened }
    }
}

impl Transport for Loopback {
    fn transmit(&self, data: Data, completion: Completion) {
        self.notifier.message(data);
        completion(Ok(()));
    }

    fn request_close(&self) {
        if self.opened {
            self.notifier
                .close(Some(CloseFrame::new(CloseCode::NORMAL, "loopback closed")));
        }
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // ------------------------------------------------------------------------
    // Normal lifecycle
    // ------------------------------------------------------------------------

    println!("[1] Loopback socket");
    let (ws, mut dispatcher) =
        WebSocket::with_transport("ws://loopback.invalid/", ["demo.v1"], |notifier| {
            Loopback::new(notifier, true)
        })?;

    ws.set_onopen(|_| println!("    open"));
    ws.set_onmessage(|event| {
        if let Some(message) = event.as_message() {
            println!("    <- {:?}", message.data());
        }
    });
    ws.set_onclose(|event| println!("    close {:?}", event.close_frame()));

    ws.send("ping");
    println!("    readyState = {} (nothing dispatched yet)", ws.ready_state());

    let count = dispatcher.dispatch_pending();
    println!("    dispatched {count}, readyState = {}", ws.ready_state());

    ws.close();
    dispatcher.dispatch_pending();
    println!("    readyState = {}", ws.ready_state());

    // ------------------------------------------------------------------------
    // Close before open
    // ------------------------------------------------------------------------

    println!("[2] Close before open");
    let (ws, mut dispatcher) =
        WebSocket::with_transport("ws://loopback.invalid/", SubProtocols::none(), |notifier| {
            Loopback::new(notifier, false)
        })?;

    ws.set_onclose(|event| println!("    close {:?}", event.close_frame()));

    ws.close();
    println!("    readyState = {} after close()", ws.ready_state());

    dispatcher.dispatch_pending();
    println!("    readyState = {}", ws.ready_state());

    Ok(())
}
