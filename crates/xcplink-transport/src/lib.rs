//! Socket link abstraction for xcplink.
//!
//! Provides one connected stream type over the network links that carry
//! length-prefixed XCP frames:
//! - TCP streams (frames are reassembled from the byte stream)
//! - connected UDP sockets (one datagram per read)
//!
//! This is the lowest layer of xcplink. The framing and engine crates build
//! on the [`NetStream`] type provided here.

pub mod error;
pub mod net;
pub mod traits;

pub use error::{Result, TransportError};
pub use net::{connect, resolve, Protocol};
pub use traits::NetStream;
