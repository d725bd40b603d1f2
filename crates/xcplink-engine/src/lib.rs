//! The XCP frame transport engine.
//!
//! A [`FrameTransport`] owns one [`Link`], a listener thread that reads
//! inbound packets, and four queues the packets are sorted into by PID.
//! Requests pair a command with the next response; block mode sends several
//! commands and collects the fragmented answer in one go.

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod eth;
pub mod link;
pub mod listener;
pub mod registry;
pub mod timing;

pub use dispatch::{Dispatcher, SampleRecord};
pub use engine::{
    EngineConfig, FrameTransport, DEFAULT_BLOCK_RECEIVE_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
};
pub use error::{EngineError, Result};
pub use eth::{EthSettings, StreamLink};
pub use link::{Inbound, Link};
pub use registry::{TransportConstructor, TransportRegistry};
pub use timing::RequestTiming;
