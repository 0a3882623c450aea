//! Event-driven, client-side implementation of the WebSocket protocol
//! ([RFC 6455](https://tools.ietf.org/html/rfc6455)).
//!
//! The engine performs the opening HTTP upgrade over a host-provided
//! [`Transport`], validates the server's response, then encodes and decodes
//! the frame format, delivering whole messages (text or binary, fragmented
//! or not) through callback slots while handling ping/pong, masking and
//! close semantics itself.
//!
//! Nothing here blocks and there is no runtime: the host's event loop
//! reports transport progress by calling
//! [`WebSocket::transport_connected`],
//! [`WebSocket::transport_ready_to_read`] and
//! [`WebSocket::transport_error`], and the engine suspends by returning
//! whenever the transport has nothing ready.

#![deny(
    missing_docs,
    unused_must_use,
    unused_mut,
    unused_imports,
    unused_import_braces
)]

pub mod error;
pub use error::{Error, Result};

pub mod connection;
pub mod handshake;
pub mod protocol;
pub mod transport;

// re-export bytes since used in the `Message` and `Transport` APIs.
pub use bytes::Bytes;

pub use crate::{
    connection::ConnectionInfo,
    protocol::{Message, ReadyState, WebSocket, WebSocketConfig},
    transport::Transport,
};
