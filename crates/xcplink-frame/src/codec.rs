use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::command::Command;
use crate::error::{FrameError, Result};

/// Frame header: length (2) + counter (2) = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Byte order of the header fields, fixed per concrete link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

/// How packets are wrapped on a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Length + counter header in front of every packet (Ethernet, SxI).
    LengthPrefixed(ByteOrder),
    /// The packet is the whole frame body (CAN).
    Headerless,
}

/// The length-prefixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Payload length, command/PID byte included.
    pub length: u16,
    /// Sequence counter of the sender.
    pub counter: u16,
}

/// A received packet with its header fields.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Declared payload length (from the header, or the payload length on headerless links).
    pub length: usize,
    /// Sender counter (0 on headerless links).
    pub counter: u16,
    /// The packet, PID byte first.
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame whose declared length is the payload length.
    pub fn new(counter: u16, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            length: payload.len(),
            counter,
            payload,
        }
    }

    /// The total wire size of this frame on a length-prefixed link.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a header.
///
/// Wire format:
/// ```text
/// ┌─────────────┬─────────────┬──────────────────────────┐
/// │ Length (2B) │ Counter (2B)│ Packet (Length bytes)    │
/// │             │             │ PID/command, then data   │
/// └─────────────┴─────────────┴──────────────────────────┘
/// ```
pub fn encode_header(header: Header, order: ByteOrder, dst: &mut BytesMut) {
    dst.reserve(HEADER_SIZE);
    match order {
        ByteOrder::Little => {
            dst.put_u16_le(header.length);
            dst.put_u16_le(header.counter);
        }
        ByteOrder::Big => {
            dst.put_u16(header.length);
            dst.put_u16(header.counter);
        }
    }
}

fn parse_header(src: &[u8], order: ByteOrder) -> Header {
    let (length, counter) = match order {
        ByteOrder::Little => (
            u16::from_le_bytes([src[0], src[1]]),
            u16::from_le_bytes([src[2], src[3]]),
        ),
        ByteOrder::Big => (
            u16::from_be_bytes([src[0], src[1]]),
            u16::from_be_bytes([src[2], src[3]]),
        ),
    };
    Header { length, counter }
}

/// Encode a command request (`[header][command][args]`).
pub fn encode_request(
    framing: Framing,
    command: Command,
    args: &[u8],
    counter: u16,
    dst: &mut BytesMut,
) -> Result<()> {
    let length = command.encoded_len() + args.len();
    if length > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: length,
            max: MAX_PAYLOAD,
        });
    }

    if let Framing::LengthPrefixed(order) = framing {
        let header = Header {
            length: length as u16,
            counter,
        };
        encode_header(header, order, dst);
    }
    dst.reserve(length);
    command.put(dst);
    dst.put_slice(args);
    Ok(())
}

/// Decode a frame from a stream buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, order: ByteOrder) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let header = parse_header(&src[..HEADER_SIZE], order);
    let total = HEADER_SIZE + header.length as usize;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(header.length as usize).freeze();

    Ok(Some(Frame {
        length: header.length as usize,
        counter: header.counter,
        payload,
    }))
}

/// Decode one datagram carrying a single packet.
///
/// The declared length is reported as-is; comparing it to the received
/// payload is left to the dispatcher.
pub fn decode_datagram(datagram: &[u8], order: ByteOrder) -> Result<Frame> {
    if datagram.len() < HEADER_SIZE {
        return Err(FrameError::Truncated {
            len: datagram.len(),
            need: HEADER_SIZE,
        });
    }

    let header = parse_header(&datagram[..HEADER_SIZE], order);
    Ok(Frame {
        length: header.length as usize,
        counter: header.counter,
        payload: Bytes::copy_from_slice(&datagram[HEADER_SIZE..]),
    })
}

/// Configuration for the frame reader/writer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Header byte order. Default: little-endian.
    pub byte_order: ByteOrder,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::Little,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
