//! Error types for the protocol engine.

use thiserror::Error;

/// Result type of all engine operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure reasons reported to the host, either as a return value or through
/// the `on_error` callback.
///
/// Errors delivered through `on_error` are fatal: the engine has moved to its
/// terminal `Closed` ready-state and discarded the transport. Errors returned
/// from `send`/`close`/`start` leave the connection state untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The transport reported a connection error before the opening handshake
    /// completed.
    #[error("could not establish connection")]
    CouldNotEstablishConnection,

    /// The server's handshake response was malformed or failed validation.
    #[error("connection upgrade failed: {0}")]
    ConnectionUpgradeFailed(HandshakeError),

    /// The transport reached EOF in the middle of a frame.
    #[error("server closed the socket mid-frame")]
    ServerClosedSocket,

    /// Reserved for host-initiated aborts.
    #[error("client disconnected")]
    ClientDisconnected,

    /// The transport rejected an outgoing write.
    #[error("transport rejected an outgoing write")]
    SendFailed,

    /// The operation requires an open connection.
    #[error("connection is not open")]
    NotConnected,

    /// `start` was called more than once.
    #[error("connection already started")]
    AlreadyStarted,

    /// The peer violated the WebSocket protocol.
    #[error("websocket protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// A frame or message exceeded a configured size limit.
    #[error("space limit exceeded: {0}")]
    Capacity(#[from] CapacityError),

    /// The connection URL is not usable for a WebSocket connection.
    #[error("invalid url: {0}")]
    Url(#[from] UrlError),
}

/// Violations of the server handshake requirements of RFC 6455 section 4.1.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HandshakeError {
    /// The status line did not split into version and status code.
    #[error("malformed status line")]
    MalformedStatusLine,
    /// The response used an HTTP version other than 1.1.
    #[error("unsupported HTTP version: {0}")]
    UnsupportedHttpVersion(String),
    /// Any status other than 101, including redirects and auth challenges.
    #[error("unexpected status code: {0}")]
    UnexpectedStatusCode(String),
    /// A header line without a `:` separator.
    #[error("malformed header line")]
    MalformedHeader,
    /// `Upgrade` header present but not `websocket`.
    #[error("\"Upgrade\" header is {0:?}, expected \"websocket\"")]
    InvalidUpgradeHeader(String),
    /// `Connection` header present but not `Upgrade`.
    #[error("\"Connection\" header is {0:?}, expected \"Upgrade\"")]
    InvalidConnectionHeader(String),
    /// `Sec-WebSocket-Accept` did not match the derived key.
    #[error("\"Sec-WebSocket-Accept\" header mismatch")]
    AcceptKeyMismatch,
    /// The server selected an extension the client did not offer.
    #[error("server selected extension {0:?} which was not requested")]
    UnexpectedExtension(String),
    /// The server selected a subprotocol the client did not offer.
    #[error("server selected subprotocol {0:?} which was not requested")]
    UnexpectedProtocol(String),
    /// The terminating blank line arrived without an `Upgrade` header.
    #[error("missing \"Upgrade\" header")]
    MissingUpgradeHeader,
    /// The terminating blank line arrived without a `Connection` header.
    #[error("missing \"Connection\" header")]
    MissingConnectionHeader,
    /// The terminating blank line arrived without `Sec-WebSocket-Accept`.
    #[error("missing \"Sec-WebSocket-Accept\" header")]
    MissingAcceptHeader,
    /// The transport reached EOF before the response completed.
    #[error("connection closed during the handshake")]
    UnexpectedEof,
}

/// Violations of the framing rules of RFC 6455 section 5.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProtocolError {
    /// A reserved bit was set without a negotiated extension.
    #[error("reserved bits are non-zero")]
    NonZeroReservedBits,
    /// A control frame arrived with the FIN bit clear.
    #[error("fragmented control frame")]
    FragmentedControlFrame,
    /// A control frame carried more than 125 bytes of payload.
    #[error("control frame too big")]
    ControlFrameTooBig,
    /// A continuation frame arrived with no message in progress.
    #[error("continuation frame without a pending message")]
    UnexpectedContinuation,
    /// A new data frame arrived while a fragmented message was pending.
    #[error("expected a continuation frame, got data opcode {0}")]
    ExpectedContinuation(u8),
    /// A close frame payload of exactly one byte.
    #[error("invalid close sequence")]
    InvalidCloseSequence,
    /// A text payload or close reason was not valid UTF-8.
    #[error("invalid UTF-8")]
    InvalidUtf8,
}

/// Size-limit violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CapacityError {
    /// A single frame's payload exceeded the configured cap.
    #[error("frame of {size} bytes exceeds the limit of {max_size} bytes")]
    FrameTooLong {
        /// Payload length announced by the frame header.
        size: u64,
        /// Configured maximum.
        max_size: usize,
    },
    /// A (possibly fragmented) message exceeded the configured cap.
    #[error("message of {size} bytes exceeds the limit of {max_size} bytes")]
    MessageTooLong {
        /// Accumulated message size.
        size: usize,
        /// Configured maximum.
        max_size: usize,
    },
}

/// Problems with the connection URL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UrlError {
    /// The scheme is not one of `ws`, `wss`, `http`, `https`.
    #[error("unsupported url scheme")]
    UnsupportedScheme,
    /// The URL has no host.
    #[error("no host name in the url")]
    NoHostName,
}
