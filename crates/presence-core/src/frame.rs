//! Wire framing for the presence IPC protocol.
//!
//! Every frame is an 8-byte little-endian header followed by the payload:
//!
//! ```text
//! [u32 LE: opcode][u32 LE: len][payload bytes of len]
//! ```
//!
//! The payload is conventionally the UTF-8 text of a JSON object. There is no
//! padding and no terminator. Reading is always two steps (header, then the
//! advertised payload) because a transport read may return less than asked.

use crate::config::ProtocolConfig;
use crate::error::FrameError;
use std::fmt;

/// Frame opcodes, numbered by their wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Handshake,
    Frame,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    pub fn as_u32(&self) -> u32 {
        match self {
            OpCode::Handshake => 0,
            OpCode::Frame => 1,
            OpCode::Close => 2,
            OpCode::Ping => 3,
            OpCode::Pong => 4,
        }
    }
}

impl TryFrom<u32> for OpCode {
    type Error = FrameError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OpCode::Handshake),
            1 => Ok(OpCode::Frame),
            2 => Ok(OpCode::Close),
            3 => Ok(OpCode::Ping),
            4 => Ok(OpCode::Pong),
            other => Err(FrameError::UnknownOpcode(other)),
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpCode::Handshake => "HANDSHAKE",
            OpCode::Frame => "FRAME",
            OpCode::Close => "CLOSE",
            OpCode::Ping => "PING",
            OpCode::Pong => "PONG",
        };
        f.write_str(name)
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub opcode: OpCode,
    /// Payload byte count.
    pub length: usize,
}

impl FrameHeader {
    pub const SIZE: usize = ProtocolConfig::HEADER_SIZE;

    /// Decode a header from the first 8 bytes of `bytes`.
    ///
    /// Fails on a short buffer, an opcode outside the table, or an advertised
    /// length larger than a frame can carry. All three are protocol errors.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < Self::SIZE {
            return Err(FrameError::ShortHeader { len: bytes.len() });
        }

        let opcode = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let length = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;

        let opcode = OpCode::try_from(opcode)?;

        if length > ProtocolConfig::MAX_PAYLOAD_SIZE {
            return Err(FrameError::PayloadTooLarge {
                len: length,
                max: ProtocolConfig::MAX_PAYLOAD_SIZE,
            });
        }

        Ok(Self { opcode, length })
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut header = [0u8; Self::SIZE];
        header[..4].copy_from_slice(&self.opcode.as_u32().to_le_bytes());
        header[4..].copy_from_slice(&(self.length as u32).to_le_bytes());
        header
    }
}

/// One opcode-tagged unit on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: OpCode,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(opcode: OpCode, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        encode(self.opcode, &self.payload)
    }

    /// Decode a complete frame held in one buffer.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let header = FrameHeader::decode(bytes)?;
        let body = &bytes[FrameHeader::SIZE..];

        if body.len() < header.length {
            return Err(FrameError::ShortPayload {
                expected: header.length,
                actual: body.len(),
            });
        }

        Ok(Self {
            opcode: header.opcode,
            payload: body[..header.length].to_vec(),
        })
    }

    /// The payload as text.
    pub fn text(&self) -> Result<&str, FrameError> {
        decode_payload(&self.payload, self.payload.len())
    }
}

/// Encode `payload` behind an 8-byte header.
pub fn encode(opcode: OpCode, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.len() > ProtocolConfig::MAX_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooLarge {
            len: payload.len(),
            max: ProtocolConfig::MAX_PAYLOAD_SIZE,
        });
    }

    let header = FrameHeader {
        opcode,
        length: payload.len(),
    };

    let mut buf = Vec::with_capacity(FrameHeader::SIZE + payload.len());
    buf.extend_from_slice(&header.to_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Reinterpret the first `length` bytes of `bytes` as UTF-8 text.
pub fn decode_payload(bytes: &[u8], length: usize) -> Result<&str, FrameError> {
    if bytes.len() < length {
        return Err(FrameError::ShortPayload {
            expected: length,
            actual: bytes.len(),
        });
    }

    Ok(std::str::from_utf8(&bytes[..length])?)
}
