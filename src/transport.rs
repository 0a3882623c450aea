//! The byte-stream capability the engine drives.

use bytes::Bytes;

use crate::connection::ConnectionInfo;

/// A non-blocking byte stream with line-framed read helpers, typically a TCP
/// or TLS socket owned by the host's event loop.
///
/// The engine owns the transport from [`start`](crate::WebSocket::start)
/// until it discards the connection, and is the only party reading or
/// writing it. All read primitives must be non-blocking: the engine calls
/// them only after the matching `can_*` predicate reports true, and treats
/// an empty result as "nothing available" rather than blocking.
///
/// Connection events travel the other way: when the underlying stream
/// connects, has bytes ready, or fails, the host calls
/// [`WebSocket::transport_connected`](crate::WebSocket::transport_connected),
/// [`WebSocket::transport_ready_to_read`](crate::WebSocket::transport_ready_to_read)
/// or [`WebSocket::transport_error`](crate::WebSocket::transport_error).
pub trait Transport {
    /// Initiates the underlying byte stream towards `info`'s host and port.
    ///
    /// Completion is signalled through the engine's `transport_connected` /
    /// `transport_error` entry points, not through a return value.
    fn connect(&mut self, info: &ConnectionInfo);

    /// Best-effort write of the entire slice. Returns whether the transport
    /// accepted all of it.
    fn send(&mut self, data: &[u8]) -> bool;

    /// Reads up to `size` bytes; may return fewer, and returns an empty
    /// buffer at EOF or when nothing is buffered.
    fn read(&mut self, size: usize) -> Bytes;

    /// Reads one CRLF-terminated line of at most `max_size` bytes, without
    /// its terminator. Returns `None` when no complete line is buffered.
    fn read_line(&mut self, max_size: usize) -> Option<String>;

    /// Whether `read` would currently return bytes.
    fn can_read(&self) -> bool;

    /// Whether `read_line` would currently return a line.
    fn can_read_line(&self) -> bool;

    /// Whether the peer has closed the stream and no buffered bytes remain.
    fn eof(&self) -> bool;

    /// Shuts the stream down gracefully.
    fn close(&mut self);

    /// Drops the connection immediately, releasing any resources.
    fn discard(&mut self);
}
