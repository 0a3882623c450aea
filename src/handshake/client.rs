//! Client handshake: request construction and response validation.

use std::fmt::Write;

use bytes::BytesMut;
use log::debug;

use super::derive_accept_key;
use crate::{connection::ConnectionInfo, error::HandshakeError};

/// Generates a random key for the `Sec-WebSocket-Key` header.
pub fn generate_key() -> String {
    // a base64-encoded (see Section 4 of [RFC4648]) value that,
    // when decoded, is 16 bytes in length (RFC 6455)
    let r: [u8; 16] = rand::random();
    data_encoding::BASE64.encode(&r)
}

/// Outcome of feeding one response line to the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeProgress {
    /// More response lines are needed.
    Pending,
    /// The response is valid and the connection is upgraded.
    Complete,
}

/// State of one connection's opening handshake.
///
/// Keeps the nonce offered in `Sec-WebSocket-Key` and which of the mandatory
/// response headers have been seen, so validation can suspend whenever the
/// transport has no complete line buffered and resume on the next one.
#[derive(Debug)]
pub struct ClientHandshake {
    key: String,
    status_received: bool,
    saw_upgrade: bool,
    saw_connection: bool,
    saw_accept: bool,
}

impl ClientHandshake {
    /// Starts a handshake with a fresh random key.
    pub fn new() -> Self {
        Self {
            key: generate_key(),
            status_received: false,
            saw_upgrade: false,
            saw_connection: false,
            saw_accept: false,
        }
    }

    /// The Base64-encoded nonce sent as `Sec-WebSocket-Key`.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Renders the upgrade request of RFC 6455 section 4.1.
    ///
    /// The `Host` header carries a port only when the URL's effective port
    /// differs from the scheme default.
    pub fn request(&self, info: &ConnectionInfo) -> BytesMut {
        let mut dst = BytesMut::with_capacity(256 + info.headers().len() * 35);

        write!(dst, "GET {} HTTP/1.1\r\n", info.resource_name()).unwrap();

        write!(dst, "Host: {}", info.host()).unwrap();
        if info.port() != info.default_port() {
            write!(dst, ":{}", info.port()).unwrap();
        }
        dst.extend_from_slice(b"\r\n");

        dst.extend_from_slice(b"Upgrade: websocket\r\n");
        dst.extend_from_slice(b"Connection: Upgrade\r\n");
        write!(dst, "Sec-WebSocket-Key: {}\r\n", self.key).unwrap();

        if let Some(origin) = info.origin() {
            write!(dst, "Origin: {origin}\r\n").unwrap();
        }
        if !info.protocols().is_empty() {
            write!(dst, "Sec-WebSocket-Protocol: {}\r\n", info.protocols().join(", ")).unwrap();
        }
        if !info.extensions().is_empty() {
            write!(dst, "Sec-WebSocket-Extensions: {}\r\n", info.extensions().join(", ")).unwrap();
        }
        for (name, value) in info.headers() {
            write!(dst, "{name}: {value}\r\n").unwrap();
        }

        dst.extend_from_slice(b"Sec-WebSocket-Version: 13\r\n");
        dst.extend_from_slice(b"\r\n");
        dst
    }

    /// Validates one line of the server's response.
    ///
    /// The first line must be an `HTTP/1.1 101` status. Header lines are then
    /// checked per RFC 6455 section 4.1: `Upgrade` and `Connection` must
    /// match case-insensitively, `Sec-WebSocket-Accept` must equal the key
    /// derived from ours, and every extension or subprotocol the server
    /// selects must be one we offered. The terminating blank line requires
    /// all three mandatory headers to have been seen.
    pub fn process_line(
        &mut self,
        line: &str,
        info: &ConnectionInfo,
    ) -> Result<HandshakeProgress, HandshakeError> {
        if !self.status_received {
            return self.process_status_line(line);
        }

        if line.trim().is_empty() {
            if !self.saw_upgrade {
                return Err(HandshakeError::MissingUpgradeHeader);
            }
            if !self.saw_connection {
                return Err(HandshakeError::MissingConnectionHeader);
            }
            if !self.saw_accept {
                return Err(HandshakeError::MissingAcceptHeader);
            }
            return Ok(HandshakeProgress::Complete);
        }

        let (name, value) = line
            .split_once(':')
            .ok_or(HandshakeError::MalformedHeader)?;
        let value = value.trim();

        if name.eq_ignore_ascii_case("Upgrade") {
            if !value.eq_ignore_ascii_case("websocket") {
                return Err(HandshakeError::InvalidUpgradeHeader(value.to_owned()));
            }
            self.saw_upgrade = true;
        } else if name.eq_ignore_ascii_case("Connection") {
            if !value.eq_ignore_ascii_case("Upgrade") {
                return Err(HandshakeError::InvalidConnectionHeader(value.to_owned()));
            }
            self.saw_connection = true;
        } else if name.eq_ignore_ascii_case("Sec-WebSocket-Accept") {
            if value != derive_accept_key(self.key.as_bytes()) {
                debug!("handshake: \"Sec-WebSocket-Accept\" does not match our key");
                return Err(HandshakeError::AcceptKeyMismatch);
            }
            self.saw_accept = true;
        } else if name.eq_ignore_ascii_case("Sec-WebSocket-Extensions") {
            check_echoed_tokens(value, info.extensions())
                .map_err(HandshakeError::UnexpectedExtension)?;
        } else if name.eq_ignore_ascii_case("Sec-WebSocket-Protocol") {
            check_echoed_tokens(value, info.protocols())
                .map_err(HandshakeError::UnexpectedProtocol)?;
        }

        Ok(HandshakeProgress::Pending)
    }

    fn process_status_line(&mut self, line: &str) -> Result<HandshakeProgress, HandshakeError> {
        let mut parts = line.split(' ').filter(|part| !part.is_empty());
        let version = parts.next().ok_or(HandshakeError::MalformedStatusLine)?;
        let status = parts.next().ok_or(HandshakeError::MalformedStatusLine)?;

        if version != "HTTP/1.1" {
            return Err(HandshakeError::UnsupportedHttpVersion(version.to_owned()));
        }
        // 1. If the status code is not 101, the client handles the response
        // per HTTP procedures - redirects and auth challenges included, which
        // we do not follow. (RFC 6455)
        if status != "101" {
            return Err(HandshakeError::UnexpectedStatusCode(status.to_owned()));
        }

        self.status_received = true;
        Ok(HandshakeProgress::Pending)
    }
}

impl Default for ClientHandshake {
    fn default() -> Self {
        Self::new()
    }
}

/// Requires every comma-separated token the server sent to be among the
/// values the client offered, comparing case-insensitively.
fn check_echoed_tokens(value: &str, offered: &[String]) -> Result<(), String> {
    for token in value.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if !offered.iter().any(|o| o.eq_ignore_ascii_case(token)) {
            return Err(token.to_owned());
        }
    }
    Ok(())
}
