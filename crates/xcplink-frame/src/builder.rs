use bytes::{Bytes, BytesMut};

use crate::codec::{encode_request, Framing};
use crate::command::Command;
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Builds outgoing request frames and owns the send counter.
///
/// The counter advances modulo 65536 after every successful build, whether
/// or not the frame is later delivered.
#[derive(Debug)]
pub struct RequestBuilder {
    framing: Framing,
    counter: u16,
    buf: BytesMut,
}

impl RequestBuilder {
    pub fn new(framing: Framing) -> Self {
        Self::with_counter(framing, 0)
    }

    /// Start from an explicit counter value.
    pub fn with_counter(framing: Framing, counter: u16) -> Self {
        Self {
            framing,
            counter,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode `[header][command][args]` and advance the counter.
    pub fn build(&mut self, command: Command, args: &[u8]) -> Result<Bytes> {
        self.buf.clear();
        encode_request(self.framing, command, args, self.counter, &mut self.buf)?;
        self.counter = self.counter.wrapping_add(1);
        Ok(self.buf.split().freeze())
    }

    /// Counter value the next frame will carry.
    pub fn counter(&self) -> u16 {
        self.counter
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }
}
