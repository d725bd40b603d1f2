//! XCP packet framing.
//!
//! Every packet starts with a PID byte that decides where it goes on the
//! master side (response, event, service request or DAQ sample). On
//! length-prefixed links each packet is additionally wrapped in a header:
//! - a 2-byte payload length
//! - a 2-byte sequence counter
//!
//! Bus links (CAN) carry the bare packet with no header.

pub mod builder;
pub mod codec;
pub mod command;
pub mod error;
pub mod pid;
pub mod reader;
pub mod writer;

pub use builder::RequestBuilder;
pub use codec::{
    decode_datagram, decode_frame, encode_header, ByteOrder, Frame, FrameConfig, Framing, Header,
    HEADER_SIZE, MAX_PAYLOAD,
};
pub use command::{command_name, Command, SYNCH};
pub use error::{FrameError, Result};
pub use pid::{classify, Category, ERR, EV, RES, SERV};
pub use reader::FrameReader;
pub use writer::FrameWriter;
