use bytes::BytesMut;
use log::{debug, trace, warn};

use crate::{
    connection::ConnectionInfo,
    error::{CapacityError, Error, HandshakeError, ProtocolError, Result},
    handshake::client::{ClientHandshake, HandshakeProgress},
    protocol::{
        frame::{
            Frame,
            codec::{FrameDecoder, FrameEncoder},
            coding::{CloseCode, Control, Data, OpCode},
        },
        message::{IncompleteMessage, Message},
    },
    transport::Transport,
};

/// Longest header line accepted from the server during the handshake.
const MAX_HEADER_LINE: usize = 4096;

/// How much the engine asks the transport for per read call.
const READ_CHUNK: usize = 4096;

/// The configuration for a WebSocket connection.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct WebSocketConfig {
    /// The maximum payload size of a single incoming frame. `None` means no
    /// limit. Frames announcing a larger payload are rejected before any
    /// allocation happens.
    ///
    /// The default value is 16 MiB, which should be reasonably big for all
    /// normal use-cases but small enough to prevent memory eating by a
    /// malicious peer.
    pub max_frame_size: Option<usize>,
    /// The maximum size of an incoming message across all of its fragments.
    /// `None` means no limit.
    ///
    /// The default value is 64 MiB.
    pub max_message_size: Option<usize>,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_frame_size: Some(16 << 20),
            max_message_size: Some(64 << 20),
        }
    }
}

impl WebSocketConfig {
    /// Sets [`Self::max_frame_size`].
    pub fn max_frame_size(mut self, max_frame_size: Option<usize>) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Sets [`Self::max_message_size`].
    pub fn max_message_size(mut self, max_message_size: Option<usize>) -> Self {
        self.max_message_size = max_message_size;
        self
    }
}

/// Host-visible connection lifecycle, as exposed by
/// [`WebSocket::ready_state`]. It only ever moves forward in the order the
/// variants are declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    /// The transport or the opening handshake is still in progress.
    Connecting,
    /// Messages can flow in both directions.
    Open,
    /// A close frame has been received; awaiting transport shutdown.
    Closing,
    /// The connection is finished, cleanly or not.
    Closed,
}

/// Fine-grained engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InternalState {
    NotStarted,
    EstablishingProtocolConnection,
    SendingClientHandshake,
    WaitingForServerHandshake,
    Open,
    Closing,
    Closed,
    Errored,
}

/// A client-side WebSocket protocol engine.
///
/// The engine owns a [`Transport`] and is driven entirely by events: the
/// host's event loop reports transport progress through
/// [`transport_connected`](Self::transport_connected),
/// [`transport_ready_to_read`](Self::transport_ready_to_read) and
/// [`transport_error`](Self::transport_error), and the engine reports
/// connection progress back through the `on_open`, `on_message`, `on_error`
/// and `on_close` callback slots. Nothing blocks; whenever the transport has
/// no bytes ready the engine simply returns and resumes on the next event.
///
/// Exactly one of `on_error` and `on_close` fires per connection, after
/// which the transport has been discarded and no further callbacks occur.
/// Callbacks must not re-enter the engine; queue follow-up work on the
/// host's event loop instead.
pub struct WebSocket<T: Transport> {
    connection: ConnectionInfo,
    config: WebSocketConfig,
    transport: Option<T>,
    state: InternalState,
    handshake: ClientHandshake,
    decoder: FrameDecoder,
    read_buf: BytesMut,
    /// Receive: a fragmented message being reassembled.
    incomplete: Option<IncompleteMessage>,
    /// 1005 until the peer's close frame says otherwise.
    last_close_code: u16,
    last_close_reason: String,
    on_open: Option<Box<dyn FnMut()>>,
    on_message: Option<Box<dyn FnMut(Message)>>,
    on_error: Option<Box<dyn FnMut(Error)>>,
    on_close: Option<Box<dyn FnMut(u16, &str, bool)>>,
}

impl<T: Transport> WebSocket<T> {
    /// Creates an engine for the given connection over the given transport.
    pub fn new(connection: ConnectionInfo, transport: T) -> Self {
        Self::with_config(connection, transport, WebSocketConfig::default())
    }

    /// The same as [`new`](Self::new) but with an explicit configuration.
    pub fn with_config(connection: ConnectionInfo, transport: T, config: WebSocketConfig) -> Self {
        Self {
            connection,
            config,
            transport: Some(transport),
            state: InternalState::NotStarted,
            handshake: ClientHandshake::new(),
            decoder: FrameDecoder::new(config.max_frame_size),
            read_buf: BytesMut::new(),
            incomplete: None,
            last_close_code: CloseCode::Status.into(),
            last_close_reason: String::new(),
            on_open: None,
            on_message: None,
            on_error: None,
            on_close: None,
        }
    }

    /// The connection parameters this engine was created with.
    pub fn connection(&self) -> &ConnectionInfo {
        &self.connection
    }

    /// Reads the configuration.
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }

    /// Sets the callback fired once the server accepts the upgrade.
    pub fn on_open(&mut self, callback: impl FnMut() + 'static) {
        self.on_open = Some(Box::new(callback));
    }

    /// Sets the callback fired for every complete inbound message, in the
    /// order the server sent them.
    pub fn on_message(&mut self, callback: impl FnMut(Message) + 'static) {
        self.on_message = Some(Box::new(callback));
    }

    /// Sets the callback fired when the connection fails. Final.
    pub fn on_error(&mut self, callback: impl FnMut(Error) + 'static) {
        self.on_error = Some(Box::new(callback));
    }

    /// Sets the callback fired when the connection finishes cleanly, with the
    /// peer's close code and reason and a clean-closure flag. Final.
    pub fn on_close(&mut self, callback: impl FnMut(u16, &str, bool) + 'static) {
        self.on_close = Some(Box::new(callback));
    }

    /// The coarse-grained connection state.
    pub fn ready_state(&self) -> ReadyState {
        match self.state {
            InternalState::NotStarted
            | InternalState::EstablishingProtocolConnection
            | InternalState::SendingClientHandshake
            | InternalState::WaitingForServerHandshake => ReadyState::Connecting,
            InternalState::Open => ReadyState::Open,
            InternalState::Closing => ReadyState::Closing,
            InternalState::Closed | InternalState::Errored => ReadyState::Closed,
        }
    }

    /// Initiates the transport connection. May be called once.
    pub fn start(&mut self) -> Result<()> {
        if self.state != InternalState::NotStarted {
            return Err(Error::AlreadyStarted);
        }
        let Some(transport) = self.transport.as_mut() else {
            return Err(Error::NotConnected);
        };
        self.state = InternalState::EstablishingProtocolConnection;
        transport.connect(&self.connection);
        Ok(())
    }

    /// Sends one unfragmented text or binary message. The connection must be
    /// open.
    pub fn send(&mut self, message: Message) -> Result<()> {
        if self.state != InternalState::Open {
            return Err(Error::NotConnected);
        }
        let opcode = if message.is_text() {
            OpCode::Data(Data::Text)
        } else {
            OpCode::Data(Data::Binary)
        };
        self.send_frame(Frame::message(message.into_data(), opcode, true))
    }

    /// Sends a close frame with the given status code and reason. The
    /// connection must be open; it moves to `Closing` when the server's close
    /// echo arrives and finishes when the transport reports EOF.
    pub fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        if self.state != InternalState::Open {
            return Err(Error::NotConnected);
        }
        self.send_frame(Frame::close(code, reason))
    }

    /// To be called by the host when the transport's byte stream is
    /// established. Sends the client handshake.
    pub fn transport_connected(&mut self) {
        if self.state != InternalState::EstablishingProtocolConnection {
            return;
        }
        self.state = InternalState::SendingClientHandshake;
        self.send_client_handshake();
        self.drain_read();
    }

    /// To be called by the host whenever the transport has bytes (or EOF)
    /// ready for the engine.
    pub fn transport_ready_to_read(&mut self) {
        self.drain_read();
    }

    /// To be called by the host when the transport fails.
    pub fn transport_error(&mut self) {
        debug!("websocket: connection error on the underlying socket");
        self.fatal_error(Error::CouldNotEstablishConnection);
    }

    fn send_client_handshake(&mut self) {
        let request = self.handshake.request(&self.connection);
        trace!("websocket: sending client handshake to {}", self.connection.host());
        self.state = InternalState::WaitingForServerHandshake;

        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        if !transport.send(&request) {
            self.fatal_error(Error::SendFailed);
        }
    }

    /// Consumes whatever the transport has ready, suspending (by returning)
    /// as soon as it runs dry.
    fn drain_read(&mut self) {
        loop {
            let Some(transport) = self.transport.as_ref() else {
                return;
            };
            if transport.eof() {
                self.handle_remote_eof();
                return;
            }

            match self.state {
                InternalState::WaitingForServerHandshake => {
                    if !transport.can_read_line() {
                        return;
                    }
                    self.read_server_handshake();
                    if self.state != InternalState::Open {
                        return;
                    }
                    // upgraded: go round again for any frames that arrived
                    // behind the headers
                }
                InternalState::Open | InternalState::Closing => {
                    self.read_frames();
                    return;
                }
                _ => return,
            }
        }
    }

    /// Feeds buffered response lines to the handshake, suspending between
    /// lines whenever the transport has no complete one.
    fn read_server_handshake(&mut self) {
        while self.state == InternalState::WaitingForServerHandshake {
            let line = match self.transport.as_mut() {
                Some(transport) if transport.can_read_line() => {
                    transport.read_line(MAX_HEADER_LINE)
                }
                _ => None,
            };
            let Some(line) = line else {
                return;
            };

            match self.handshake.process_line(&line, &self.connection) {
                Ok(HandshakeProgress::Pending) => (),
                Ok(HandshakeProgress::Complete) => {
                    debug!("websocket: connection upgraded");
                    self.state = InternalState::Open;
                    self.notify_open();
                }
                Err(error) => {
                    warn!("websocket: server handshake failed: {error}");
                    self.fatal_error(Error::ConnectionUpgradeFailed(error));
                }
            }
        }
    }

    /// Pulls all ready bytes into the read buffer and dispatches every
    /// complete frame in it.
    fn read_frames(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        while transport.can_read() {
            let chunk = transport.read(READ_CHUNK);
            if chunk.is_empty() {
                break;
            }
            self.read_buf.extend_from_slice(&chunk);
        }

        while matches!(self.state, InternalState::Open | InternalState::Closing) {
            match self.decoder.decode(&mut self.read_buf) {
                Ok(Some(frame)) => self.handle_frame(frame),
                Ok(None) => return,
                Err(error) => {
                    warn!("websocket: could not decode frame: {error}");
                    self.fail_connection(CloseCode::Size, error);
                    return;
                }
            }
            if self.transport.is_none() {
                return;
            }
        }
    }

    fn handle_frame(&mut self, frame: Frame) {
        let header = *frame.header();

        // MUST be 0 unless an extension is negotiated that defines meanings
        // for non-zero values. (RFC 6455)
        if header.rsv1 || header.rsv2 || header.rsv3 {
            self.fail_connection(
                CloseCode::Protocol,
                Error::Protocol(ProtocolError::NonZeroReservedBits),
            );
            return;
        }

        match header.opcode {
            OpCode::Control(ctl) => {
                // All control frames MUST have a payload length of 125 bytes
                // or less and MUST NOT be fragmented. (RFC 6455)
                if !header.is_final {
                    self.fail_connection(
                        CloseCode::Protocol,
                        Error::Protocol(ProtocolError::FragmentedControlFrame),
                    );
                    return;
                }
                if frame.payload().len() > 125 {
                    self.fail_connection(
                        CloseCode::Protocol,
                        Error::Protocol(ProtocolError::ControlFrameTooBig),
                    );
                    return;
                }

                match ctl {
                    Control::Close => self.handle_close_frame(frame),
                    Control::Ping => {
                        trace!("websocket: ping with {} payload bytes", frame.payload().len());
                        // Replies are only possible while fully open.
                        if self.state == InternalState::Open {
                            let _ = self.send_frame(Frame::pong(frame.into_payload()));
                        }
                    }
                    Control::Pong => trace!("websocket: pong ignored"),
                    Control::Reserved(opcode) => {
                        warn!("websocket: ignoring frame with unknown opcode {opcode}");
                    }
                }
            }
            OpCode::Data(data) => self.handle_data_frame(data, frame),
        }
    }

    /// Records the peer's close code and reason and moves to `Closing`. No
    /// reply is sent; `on_close` delivery waits for the transport to reach
    /// EOF.
    fn handle_close_frame(&mut self, frame: Frame) {
        match frame.into_close() {
            Ok(Some((code, reason))) => {
                debug!("websocket: close frame with code {code}");
                self.last_close_code = code;
                self.last_close_reason = reason;
                self.state = InternalState::Closing;
            }
            Ok(None) => {
                debug!("websocket: close frame without a status code");
                self.state = InternalState::Closing;
            }
            Err(error) => {
                let code = match error {
                    ProtocolError::InvalidUtf8 => CloseCode::Invalid,
                    _ => CloseCode::Protocol,
                };
                self.fail_connection(code, Error::Protocol(error));
            }
        }
    }

    fn handle_data_frame(&mut self, data: Data, frame: Frame) {
        let fin = frame.header().is_final;
        match data {
            Data::Continue => {
                let Some(mut incomplete) = self.incomplete.take() else {
                    self.fail_connection(
                        CloseCode::Protocol,
                        Error::Protocol(ProtocolError::UnexpectedContinuation),
                    );
                    return;
                };
                if let Err(error) =
                    incomplete.extend(frame.payload(), self.config.max_message_size)
                {
                    self.fail_connection(CloseCode::Size, error);
                    return;
                }
                if fin {
                    self.complete_message(incomplete);
                } else {
                    self.incomplete = Some(incomplete);
                }
            }

            Data::Text | Data::Binary => {
                if self.incomplete.is_some() {
                    let opcode = OpCode::Data(data).into();
                    self.fail_connection(
                        CloseCode::Protocol,
                        Error::Protocol(ProtocolError::ExpectedContinuation(opcode)),
                    );
                    return;
                }
                let is_text = data == Data::Text;

                if fin {
                    if let Err(error) =
                        check_max_size(frame.payload().len(), self.config.max_message_size)
                    {
                        self.fail_connection(CloseCode::Size, error);
                        return;
                    }
                    // Failing the connection with status 1007 is mandated for
                    // text that is not valid UTF-8. (RFC 6455 section 8.1)
                    if is_text && simdutf8::basic::from_utf8(frame.payload()).is_err() {
                        self.fail_connection(
                            CloseCode::Invalid,
                            Error::Protocol(ProtocolError::InvalidUtf8),
                        );
                        return;
                    }
                    self.notify_message(Message::from_parts(frame.into_payload(), is_text));
                } else {
                    let mut incomplete = IncompleteMessage::new(is_text);
                    if let Err(error) =
                        incomplete.extend(frame.payload(), self.config.max_message_size)
                    {
                        self.fail_connection(CloseCode::Size, error);
                        return;
                    }
                    self.incomplete = Some(incomplete);
                }
            }

            Data::Reserved(opcode) => {
                warn!("websocket: ignoring frame with unknown opcode {opcode}");
            }
        }
    }

    fn complete_message(&mut self, incomplete: IncompleteMessage) {
        match incomplete.complete() {
            Ok(message) => self.notify_message(message),
            Err(error) => {
                let code = match error {
                    Error::Protocol(ProtocolError::InvalidUtf8) => CloseCode::Invalid,
                    _ => CloseCode::Size,
                };
                self.fail_connection(code, error);
            }
        }
    }

    /// The transport has no more bytes and never will. A clean close if the
    /// stream ended on a frame boundary, an error otherwise.
    fn handle_remote_eof(&mut self) {
        match self.state {
            InternalState::Open | InternalState::Closing => {
                if !self.read_buf.is_empty() {
                    debug!(
                        "websocket: server disconnected with {} bytes of a frame pending",
                        self.read_buf.len()
                    );
                    self.fatal_error(Error::ServerClosedSocket);
                    return;
                }
                self.state = InternalState::Closed;
                let code = self.last_close_code;
                let reason = std::mem::take(&mut self.last_close_reason);
                self.notify_close(code, &reason, true);
                self.discard_connection();
            }
            InternalState::EstablishingProtocolConnection => {
                self.fatal_error(Error::CouldNotEstablishConnection);
            }
            InternalState::SendingClientHandshake | InternalState::WaitingForServerHandshake => {
                self.fatal_error(Error::ConnectionUpgradeFailed(HandshakeError::UnexpectedEof));
            }
            _ => (),
        }
    }

    /// Masks and transmits one frame.
    fn send_frame(&mut self, mut frame: Frame) -> Result<()> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(Error::NotConnected);
        };
        // Section 5.1: a client MUST mask all frames that it sends to the
        // server, with a new key per frame.
        frame.set_random_mask();

        let mut buf = BytesMut::new();
        FrameEncoder.encode(frame, &mut buf);
        if transport.send(&buf) {
            Ok(())
        } else {
            warn!("websocket: transport rejected a {}-byte frame", buf.len());
            self.fatal_error(Error::SendFailed);
            Err(Error::SendFailed)
        }
    }

    /// Fails the connection over a protocol violation: best-effort close
    /// frame on the wire, then the fatal error path.
    fn fail_connection(&mut self, code: CloseCode, error: Error) {
        if self.state == InternalState::Open {
            if let Some(transport) = self.transport.as_mut() {
                let mut frame = Frame::close(code.into(), "");
                frame.set_random_mask();
                let mut buf = BytesMut::new();
                FrameEncoder.encode(frame, &mut buf);
                let _ = transport.send(&buf);
            }
        }
        self.fatal_error(error);
    }

    /// Moves to the terminal `Errored` state, reports the error and drops
    /// the transport. No further callbacks fire.
    fn fatal_error(&mut self, error: Error) {
        if matches!(self.state, InternalState::Closed | InternalState::Errored) {
            return;
        }
        self.state = InternalState::Errored;
        self.notify_error(error);
        self.discard_connection();
    }

    fn discard_connection(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.discard();
        }
        self.read_buf.clear();
        self.incomplete = None;
    }

    fn notify_open(&mut self) {
        if let Some(callback) = self.on_open.as_mut() {
            callback();
        }
    }

    fn notify_message(&mut self, message: Message) {
        if let Some(callback) = self.on_message.as_mut() {
            callback(message);
        }
    }

    fn notify_error(&mut self, error: Error) {
        if let Some(callback) = self.on_error.as_mut() {
            callback(error);
        }
    }

    fn notify_close(&mut self, code: u16, reason: &str, was_clean: bool) {
        if let Some(callback) = self.on_close.as_mut() {
            callback(code, reason, was_clean);
        }
    }
}

#[inline]
fn check_max_size(size: usize, max_size: Option<usize>) -> Result<()> {
    if let Some(max_size) = max_size
        && size > max_size
    {
        return Err(Error::Capacity(CapacityError::MessageTooLong {
            size,
            max_size,
        }));
    }

    Ok(())
}
