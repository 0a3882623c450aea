use std::fmt;

use bytes::{Bytes, BytesMut};

use crate::error::{CapacityError, Error, ProtocolError, Result};

/// A whole application message, as delivered to and accepted from the host.
///
/// Text messages carry UTF-8; payloads arriving from the peer are validated
/// before delivery. Binary messages carry arbitrary bytes.
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct Message {
    payload: Bytes,
    is_text: bool,
}

impl Message {
    /// Creates a text message.
    pub fn text(string: impl Into<String>) -> Message {
        Message {
            payload: Bytes::from(string.into()),
            is_text: true,
        }
    }

    /// Creates a binary message.
    pub fn binary(data: impl Into<Bytes>) -> Message {
        Message {
            payload: data.into(),
            is_text: false,
        }
    }

    pub(crate) fn from_parts(payload: Bytes, is_text: bool) -> Message {
        Message { payload, is_text }
    }

    /// Indicates whether this is a text message.
    pub fn is_text(&self) -> bool {
        self.is_text
    }

    /// Indicates whether this is a binary message.
    pub fn is_binary(&self) -> bool {
        !self.is_text
    }

    /// The payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.payload
    }

    /// The payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns true if the message has no content.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Consumes the message, returning the payload.
    pub fn into_data(self) -> Bytes {
        self.payload
    }

    /// Views the payload as a string, converting binary data if it happens to
    /// be valid UTF-8.
    pub fn to_text(&self) -> Result<&str> {
        simdutf8::basic::from_utf8(&self.payload)
            .map_err(|_| Error::Protocol(ProtocolError::InvalidUtf8))
    }
}

impl From<String> for Message {
    #[inline]
    fn from(string: String) -> Self {
        Message::text(string)
    }
}

impl<'s> From<&'s str> for Message {
    #[inline]
    fn from(string: &'s str) -> Self {
        Message::text(string)
    }
}

impl<'b> From<&'b [u8]> for Message {
    #[inline]
    fn from(data: &'b [u8]) -> Self {
        Message::binary(Bytes::copy_from_slice(data))
    }
}

impl From<Vec<u8>> for Message {
    #[inline]
    fn from(data: Vec<u8>) -> Self {
        Message::binary(data)
    }
}

impl From<Bytes> for Message {
    #[inline]
    fn from(data: Bytes) -> Self {
        Message::binary(data)
    }
}

impl From<Message> for Bytes {
    #[inline]
    fn from(message: Message) -> Self {
        message.into_data()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        if let Ok(string) = self.to_text() {
            write!(f, "{string}")
        } else {
            write!(f, "Binary Data<length={}>", self.len())
        }
    }
}

/// Accumulator for a fragmented message.
///
/// Collects the payloads of a `fin=0` data frame and its continuations; the
/// final fragment completes the buffer into one `Message` typed after the
/// opening frame. UTF-8 is checked once, over the assembled text.
#[derive(Debug)]
pub(crate) struct IncompleteMessage {
    buf: BytesMut,
    is_text: bool,
}

impl IncompleteMessage {
    /// Starts a message of the given type.
    pub(crate) fn new(is_text: bool) -> Self {
        Self {
            buf: BytesMut::new(),
            is_text,
        }
    }

    /// Adds one fragment's payload.
    ///
    /// The check is written against the remaining headroom so that two
    /// fragments summing past `usize::MAX` cannot overflow.
    pub(crate) fn extend(&mut self, tail: &[u8], size_limit: Option<usize>) -> Result<()> {
        let max_size = size_limit.unwrap_or(usize::MAX);
        let my_size = self.buf.len();
        let portion_size = tail.len();
        if my_size > max_size || portion_size > max_size - my_size {
            return Err(Error::Capacity(CapacityError::MessageTooLong {
                size: my_size.saturating_add(portion_size),
                max_size,
            }));
        }

        self.buf.extend_from_slice(tail);
        Ok(())
    }

    /// Converts the accumulated fragments into a complete message.
    pub(crate) fn complete(self) -> Result<Message> {
        if self.is_text {
            simdutf8::basic::from_utf8(&self.buf)
                .map_err(|_| Error::Protocol(ProtocolError::InvalidUtf8))?;
        }
        Ok(Message::from_parts(self.buf.freeze(), self.is_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let t = Message::text("test".to_owned());
        assert_eq!(t.to_string(), "test".to_owned());

        let bin = Message::binary(vec![0, 1, 3, 4, 241]);
        assert_eq!(bin.to_string(), "Binary Data<length=5>".to_owned());
    }

    #[test]
    fn binary_convert() {
        let bin = [6u8, 7, 8, 9, 10, 241];
        let msg = Message::from(&bin[..]);
        assert!(msg.is_binary());
        assert!(msg.to_text().is_err());
    }

    #[test]
    fn text_convert() {
        let s = "kiwotsukete";
        let msg = Message::from(s);
        assert!(msg.is_text());
        assert_eq!(msg.to_text().unwrap(), s);
    }

    #[test]
    fn reassembly_keeps_the_opening_type() {
        let mut incomplete = IncompleteMessage::new(true);
        incomplete.extend(b"Hello, ", None).unwrap();
        incomplete.extend(b"World!", None).unwrap();
        let msg = incomplete.complete().unwrap();
        assert!(msg.is_text());
        assert_eq!(msg.to_text().unwrap(), "Hello, World!");
    }

    #[test]
    fn reassembly_respects_the_size_limit() {
        let mut incomplete = IncompleteMessage::new(false);
        incomplete.extend(&[0u8; 8], Some(10)).unwrap();
        assert!(matches!(
            incomplete.extend(&[0u8; 3], Some(10)),
            Err(Error::Capacity(CapacityError::MessageTooLong {
                size: 11,
                max_size: 10
            }))
        ));
    }

    #[test]
    fn fragmented_text_must_be_utf8_overall() {
        // two fragments that split a multi-byte scalar are fine...
        let bytes = "é".as_bytes();
        let mut incomplete = IncompleteMessage::new(true);
        incomplete.extend(&bytes[..1], None).unwrap();
        incomplete.extend(&bytes[1..], None).unwrap();
        assert_eq!(incomplete.complete().unwrap().to_text().unwrap(), "é");

        // ...a dangling lead byte is not
        let mut incomplete = IncompleteMessage::new(true);
        incomplete.extend(&bytes[..1], None).unwrap();
        assert!(matches!(
            incomplete.complete(),
            Err(Error::Protocol(ProtocolError::InvalidUtf8))
        ));
    }
}
