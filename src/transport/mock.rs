//! Scriptable transport for unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::protocol::{CloseFrame, Data, SubProtocols};
use crate::socket::{Dispatcher, WebSocket};

use super::{Completion, Notifier, Transport};

pub(crate) const TEST_URL: &str = "ws://127.0.0.1:9001/socket";

#[derive(Default)]
struct Recorded {
    transmitted: Vec<Data>,
    completions: VecDeque<Completion>,
    close_requests: usize,
}

/// Records every call; never completes anything on its own.
pub(crate) struct MockTransport {
    recorded: Arc<Mutex<Recorded>>,
}

impl Transport for MockTransport {
    fn transmit(&self, data: Data, completion: Completion) {
        let mut recorded = self.recorded.lock();
        recorded.transmitted.push(data);
        recorded.completions.push_back(completion);
    }

    fn request_close(&self) {
        self.recorded.lock().close_requests += 1;
    }
}

/// Test-side view of a [`MockTransport`]: inspects calls and injects
/// notifications as the transport would.
pub(crate) struct MockHandle {
    recorded: Arc<Mutex<Recorded>>,
    notifier: Notifier,
}

impl MockHandle {
    pub(crate) fn open(&self) {
        self.notifier.open();
    }

    pub(crate) fn close(&self, frame: Option<CloseFrame>) {
        self.notifier.close(frame);
    }

    pub(crate) fn message(&self, data: impl Into<Data>) {
        self.notifier.message(data);
    }

    pub(crate) fn error(&self, err: Error) {
        self.notifier.error(err);
    }

    pub(crate) fn transmitted(&self) -> Vec<Data> {
        self.recorded.lock().transmitted.clone()
    }

    pub(crate) fn close_requests(&self) -> usize {
        self.recorded.lock().close_requests
    }

    /// Resolves the oldest pending transmission. Returns `false` if none.
    pub(crate) fn complete_next(&self, result: Result<()>) -> bool {
        let completion = self.recorded.lock().completions.pop_front();
        match completion {
            Some(completion) => {
                completion(result);
                true
            }
            None => false,
        }
    }
}

/// Builds a socket over a mock transport at [`TEST_URL`].
pub(crate) fn connect() -> (WebSocket, Dispatcher, MockHandle) {
    connect_with(TEST_URL, SubProtocols::none()).expect("test url is valid")
}

pub(crate) fn connect_with(
    url: &str,
    protocols: impl Into<SubProtocols>,
) -> Result<(WebSocket, Dispatcher, MockHandle)> {
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    let mut handle_notifier = None;

    let transport_recorded = Arc::clone(&recorded);
    let (ws, dispatcher) = WebSocket::with_transport(url, protocols, |notifier| {
        handle_notifier = Some(notifier);
        MockTransport {
            recorded: transport_recorded,
        }
    })?;

    let handle = MockHandle {
        recorded,
        notifier: handle_notifier.expect("factory runs during construction"),
    };
    Ok((ws, dispatcher, handle))
}
