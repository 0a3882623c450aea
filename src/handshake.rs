//! WebSocket opening handshake.

pub mod client;

use sha1::{Digest, Sha1};

/// Derives the `Sec-WebSocket-Accept` value for a `Sec-WebSocket-Key`.
///
/// The engine computes this for its own key and compares it against the
/// server's header, proving the server actually understood the upgrade.
pub fn derive_accept_key(request_key: &[u8]) -> String {
    // ... field is constructed by concatenating /key/ ...
    // ... with the string "258EAFA5-E914-47DA-95CA-C5AB0DC85B11" (RFC 6455)
    const WS_GUID: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
    let mut sha1 = Sha1::default();
    sha1.update(request_key);
    sha1.update(WS_GUID);
    data_encoding::BASE64.encode(&sha1.finalize())
}
