//! The contract between the engine and a concrete link backend.

use xcplink_frame::{Frame, FrameError, Framing};

use crate::dispatch::Dispatcher;
use crate::error::Result;

/// Receive half polled by the listener thread.
pub trait Inbound: Send {
    /// Fetch the next inbound frame.
    ///
    /// `Ok(None)` means nothing arrived within the backend's poll interval.
    /// `Err(FrameError::ConnectionClosed)` ends the listener; other errors
    /// are logged and polling continues.
    fn poll(&mut self) -> std::result::Result<Option<Frame>, FrameError>;
}

/// A concrete link (Ethernet socket, CAN bus, ...).
pub trait Link: Send {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// How outgoing packets are wrapped.
    fn framing(&self) -> Framing;

    /// Whether the dispatcher compares declared and received lengths.
    ///
    /// Stream links reassemble by the declared length, so a mismatch cannot
    /// be observed there.
    fn verifies_frame_size(&self) -> bool;

    /// Whether the engine should run its own listener thread over
    /// [`Link::inbound`]. Links fed by driver callbacks return false.
    fn uses_default_listener(&self) -> bool {
        true
    }

    /// Hand the link the dispatcher so callback-driven backends can queue frames.
    fn attach(&mut self, dispatcher: Dispatcher) -> Result<()> {
        let _ = dispatcher;
        Ok(())
    }

    /// Create the receive half for the listener thread.
    fn inbound(&mut self) -> Result<Box<dyn Inbound>>;

    /// Bring the link up. Called after the listener has started.
    fn connect(&mut self) -> Result<()>;

    /// Send one fully built frame.
    fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Tear the link down.
    fn close_connection(&mut self) -> Result<()>;

    /// Timestamp resolution of received frames in nanoseconds, if the backend has one.
    fn timestamp_resolution(&self) -> Option<u64> {
        None
    }
}
