//! WebSocket protocol implementation.

pub mod frame;

mod message;

pub use message::Message;

mod websocket;
pub use websocket::{ReadyState, WebSocket, WebSocketConfig};
