//! Scripted in-memory transport and callback recorder shared by the
//! integration tests.

#![allow(dead_code)]

use std::{cell::RefCell, rc::Rc};

use bytes::{Bytes, BytesMut};
use ws_engine::{
    ConnectionInfo, Error, Message, ReadyState, Transport, WebSocket, WebSocketConfig,
    handshake::derive_accept_key,
};

#[derive(Default)]
struct Inner {
    incoming: BytesMut,
    sent: Vec<u8>,
    connected_to: Option<String>,
    remote_closed: bool,
    refuse_writes: bool,
    discarded: bool,
}

/// A transport fed by the test instead of a socket. The paired
/// [`MockHandle`] scripts the server side and inspects what the engine sent.
pub struct MockTransport {
    inner: Rc<RefCell<Inner>>,
}

/// Test-side handle to a [`MockTransport`].
#[derive(Clone)]
pub struct MockHandle {
    inner: Rc<RefCell<Inner>>,
}

impl MockTransport {
    pub fn new() -> (MockTransport, MockHandle) {
        let inner = Rc::new(RefCell::new(Inner::default()));
        (
            MockTransport {
                inner: inner.clone(),
            },
            MockHandle { inner },
        )
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, info: &ConnectionInfo) {
        self.inner.borrow_mut().connected_to = Some(format!("{}:{}", info.host(), info.port()));
    }

    fn send(&mut self, data: &[u8]) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.refuse_writes {
            return false;
        }
        inner.sent.extend_from_slice(data);
        true
    }

    fn read(&mut self, size: usize) -> Bytes {
        let mut inner = self.inner.borrow_mut();
        let take = size.min(inner.incoming.len());
        inner.incoming.split_to(take).freeze()
    }

    fn read_line(&mut self, _max_size: usize) -> Option<String> {
        let mut inner = self.inner.borrow_mut();
        let position = inner.incoming.iter().position(|&byte| byte == b'\n')?;
        let line = inner.incoming.split_to(position + 1);
        let line = &line[..line.len() - 1];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        Some(String::from_utf8_lossy(line).into_owned())
    }

    fn can_read(&self) -> bool {
        !self.inner.borrow().incoming.is_empty()
    }

    fn can_read_line(&self) -> bool {
        self.inner.borrow().incoming.iter().any(|&byte| byte == b'\n')
    }

    fn eof(&self) -> bool {
        let inner = self.inner.borrow();
        inner.remote_closed && inner.incoming.is_empty()
    }

    fn close(&mut self) {
        self.inner.borrow_mut().remote_closed = true;
    }

    fn discard(&mut self) {
        self.inner.borrow_mut().discarded = true;
    }
}

impl MockHandle {
    /// Queues bytes as if the server had sent them.
    pub fn push(&self, bytes: &[u8]) {
        self.inner.borrow_mut().incoming.extend_from_slice(bytes);
    }

    /// Marks the server side of the stream as closed. `eof` turns true once
    /// the queued bytes are drained.
    pub fn close_remote(&self) {
        self.inner.borrow_mut().remote_closed = true;
    }

    /// Makes every subsequent write fail.
    pub fn refuse_writes(&self) {
        self.inner.borrow_mut().refuse_writes = true;
    }

    /// Takes everything the engine has written so far.
    pub fn take_sent(&self) -> Vec<u8> {
        std::mem::take(&mut self.inner.borrow_mut().sent)
    }

    pub fn connected_to(&self) -> Option<String> {
        self.inner.borrow().connected_to.clone()
    }

    pub fn discarded(&self) -> bool {
        self.inner.borrow().discarded
    }
}

/// One host-visible callback invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Open,
    Message(Message),
    Error(Error),
    Close {
        code: u16,
        reason: String,
        was_clean: bool,
    },
}

/// Records the engine's callbacks in order.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Rc<RefCell<Vec<Event>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, ws: &mut WebSocket<MockTransport>) {
        let events = self.events.clone();
        ws.on_open(move || events.borrow_mut().push(Event::Open));
        let events = self.events.clone();
        ws.on_message(move |message| events.borrow_mut().push(Event::Message(message)));
        let events = self.events.clone();
        ws.on_error(move |error| events.borrow_mut().push(Event::Error(error)));
        let events = self.events.clone();
        ws.on_close(move |code, reason, was_clean| {
            events.borrow_mut().push(Event::Close {
                code,
                reason: reason.to_owned(),
                was_clean,
            })
        });
    }

    /// Drains the recorded events.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut self.events.borrow_mut())
    }
}

/// Pulls the `Sec-WebSocket-Key` value out of a captured handshake request.
pub fn extract_key(request: &[u8]) -> String {
    let text = std::str::from_utf8(request).expect("handshake request is not UTF-8");
    text.lines()
        .find_map(|line| line.strip_prefix("Sec-WebSocket-Key: "))
        .expect("request has no Sec-WebSocket-Key header")
        .trim()
        .to_owned()
}

/// A minimal valid 101 response for the request's key.
pub fn accept_response(request: &[u8]) -> String {
    let accept = derive_accept_key(extract_key(request).as_bytes());
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\
         \r\n"
    )
}

/// Creates an engine wired to a mock transport and recorder, not yet started.
pub fn websocket(
    info: ConnectionInfo,
    config: WebSocketConfig,
) -> (WebSocket<MockTransport>, MockHandle, Recorder) {
    let (transport, handle) = MockTransport::new();
    let mut ws = WebSocket::with_config(info, transport, config);
    let recorder = Recorder::new();
    recorder.attach(&mut ws);
    (ws, handle, recorder)
}

/// Drives a connection all the way to `Open`, consuming the `Open` event.
pub fn open_websocket(url: &str) -> (WebSocket<MockTransport>, MockHandle, Recorder) {
    open_websocket_with_config(url, WebSocketConfig::default())
}

/// Like [`open_websocket`] with an explicit engine configuration.
pub fn open_websocket_with_config(
    url: &str,
    config: WebSocketConfig,
) -> (WebSocket<MockTransport>, MockHandle, Recorder) {
    let info = ConnectionInfo::new(url.parse().unwrap()).unwrap();
    let (mut ws, handle, recorder) = websocket(info, config);

    ws.start().unwrap();
    ws.transport_connected();
    let request = handle.take_sent();
    handle.push(accept_response(&request).as_bytes());
    ws.transport_ready_to_read();

    assert_eq!(recorder.take(), vec![Event::Open]);
    assert_eq!(ws.ready_state(), ReadyState::Open);
    (ws, handle, recorder)
}

/// Splits a client frame captured off the wire into its first byte and the
/// unmasked payload, checking the MASK bit and the length encoding on the
/// way.
pub fn parse_client_frame(wire: &[u8]) -> (u8, Vec<u8>) {
    let (frame, rest) = split_client_frame(wire);
    assert!(rest.is_empty(), "trailing bytes after the frame");
    frame
}

/// Like [`parse_client_frame`] for a buffer holding several frames; returns
/// the first frame and the remainder.
pub fn split_client_frame(wire: &[u8]) -> ((u8, Vec<u8>), &[u8]) {
    assert!(wire.len() >= 2, "frame shorter than a header");
    let first = wire[0];
    assert_ne!(wire[1] & 0x80, 0, "client frame is not masked");

    let (length, mut at) = match wire[1] & 0x7F {
        126 => (u16::from_be_bytes([wire[2], wire[3]]) as usize, 4),
        127 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&wire[2..10]);
            (u64::from_be_bytes(raw) as usize, 10)
        }
        n => (n as usize, 2),
    };

    let key = [wire[at], wire[at + 1], wire[at + 2], wire[at + 3]];
    at += 4;

    let mut payload = wire[at..at + length].to_vec();
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i & 3];
    }
    ((first, payload), &wire[at + length..])
}

/// The masking key of a captured client frame.
pub fn client_frame_mask(wire: &[u8]) -> [u8; 4] {
    let at = match wire[1] & 0x7F {
        126 => 4,
        127 => 10,
        _ => 2,
    };
    [wire[at], wire[at + 1], wire[at + 2], wire[at + 3]]
}
