//! WebSocket opcode and close-code definitions (RFC 6455 section 11).

/// The 4-bit frame type field.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum OpCode {
    /// Data frame (continuation, text or binary).
    Data(Data),
    /// Control frame (close, ping or pong).
    Control(Control),
}

/// Data frame opcodes.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Data {
    /// 0x0: continuation of a fragmented message.
    Continue,
    /// 0x1: UTF-8 text.
    Text,
    /// 0x2: arbitrary bytes.
    Binary,
    /// 0x3-0x7: reserved for further data frames.
    Reserved(u8),
}

/// Control frame opcodes.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Control {
    /// 0x8: connection close.
    Close,
    /// 0x9: ping.
    Ping,
    /// 0xA: pong.
    Pong,
    /// 0xB-0xF: reserved for further control frames.
    Reserved(u8),
}

impl From<OpCode> for u8 {
    fn from(code: OpCode) -> Self {
        match code {
            OpCode::Data(Data::Continue) => 0x0,
            OpCode::Data(Data::Text) => 0x1,
            OpCode::Data(Data::Binary) => 0x2,
            OpCode::Data(Data::Reserved(i)) => i,
            OpCode::Control(Control::Close) => 0x8,
            OpCode::Control(Control::Ping) => 0x9,
            OpCode::Control(Control::Pong) => 0xA,
            OpCode::Control(Control::Reserved(i)) => i,
        }
    }
}

impl From<u8> for OpCode {
    fn from(byte: u8) -> Self {
        match byte & 0x0F {
            0x0 => OpCode::Data(Data::Continue),
            0x1 => OpCode::Data(Data::Text),
            0x2 => OpCode::Data(Data::Binary),
            i @ 0x3..=0x7 => OpCode::Data(Data::Reserved(i)),
            0x8 => OpCode::Control(Control::Close),
            0x9 => OpCode::Control(Control::Ping),
            0xA => OpCode::Control(Control::Pong),
            i => OpCode::Control(Control::Reserved(i)),
        }
    }
}

/// Status codes for close frames, as defined in RFC 6455 section 7.4.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CloseCode {
    /// 1000: normal closure.
    Normal,
    /// 1001: endpoint going away.
    Away,
    /// 1002: protocol error.
    Protocol,
    /// 1003: unacceptable data type.
    Unsupported,
    /// 1005: no status code present. Must not be sent on the wire.
    Status,
    /// 1006: abnormal closure. Must not be sent on the wire.
    Abnormal,
    /// 1007: payload inconsistent with the message type (e.g. bad UTF-8).
    Invalid,
    /// 1008: message violates the endpoint's policy.
    Policy,
    /// 1009: message too big to process.
    Size,
    /// 1010: server did not negotiate a required extension.
    Extension,
    /// 1011: unexpected server condition.
    Error,
    /// 1015: TLS handshake failure. Must not be sent on the wire.
    Tls,
    /// 0-999: unused range.
    Bad(u16),
    /// Any other code.
    Other(u16),
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        match code {
            CloseCode::Normal => 1000,
            CloseCode::Away => 1001,
            CloseCode::Protocol => 1002,
            CloseCode::Unsupported => 1003,
            CloseCode::Status => 1005,
            CloseCode::Abnormal => 1006,
            CloseCode::Invalid => 1007,
            CloseCode::Policy => 1008,
            CloseCode::Size => 1009,
            CloseCode::Extension => 1010,
            CloseCode::Error => 1011,
            CloseCode::Tls => 1015,
            CloseCode::Bad(code) | CloseCode::Other(code) => code,
        }
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::Away,
            1002 => CloseCode::Protocol,
            1003 => CloseCode::Unsupported,
            1005 => CloseCode::Status,
            1006 => CloseCode::Abnormal,
            1007 => CloseCode::Invalid,
            1008 => CloseCode::Policy,
            1009 => CloseCode::Size,
            1010 => CloseCode::Extension,
            1011 => CloseCode::Error,
            1015 => CloseCode::Tls,
            0..=999 => CloseCode::Bad(code),
            _ => CloseCode::Other(code),
        }
    }
}
