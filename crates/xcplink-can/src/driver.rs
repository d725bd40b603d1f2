//! What a CAN driver backend must provide.

use std::sync::Arc;

use bytes::Bytes;
use embedded_can::Id;
use xcplink_config::{Configuration, ParameterMap};

use crate::dlc::dlc_for;
use crate::error::Result;
use crate::filter::AcceptanceFilter;
use crate::identifier::Identifier;
use crate::timing::BitTiming;

/// Called by callback-driven drivers with the payload of every received frame.
pub type ReceiveCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// A frame as seen on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanFrame {
    pub identifier: Identifier,
    /// Frame length from the DLC (0..=8, or a CAN-FD size up to 64).
    pub dlc: usize,
    pub data: Bytes,
    /// Reception time in driver ticks, see [`CanDriver::timestamp_resolution`].
    pub timestamp: u64,
}

impl CanFrame {
    /// Create a frame; fails if no DLC can carry `data`.
    pub fn new(identifier: Identifier, data: impl Into<Bytes>, timestamp: u64) -> Result<Self> {
        let data = data.into();
        let dlc = dlc_for(isize::try_from(data.len()).unwrap_or(isize::MAX))?;
        Ok(Self {
            identifier,
            dlc,
            data,
            timestamp,
        })
    }
}

impl embedded_can::Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        CanFrame::new(Identifier::from(id.into()), Bytes::copy_from_slice(data), 0).ok()
    }

    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        None
    }

    fn is_extended(&self) -> bool {
        self.identifier.is_extended()
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        self.identifier.into()
    }

    /// The frame length the DLC encodes, which may exceed `data().len()`
    /// for CAN-FD payloads between the fixed sizes.
    fn dlc(&self) -> usize {
        self.dlc
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Everything a driver needs to set up its channel.
#[derive(Debug, Clone)]
pub struct DriverContext {
    /// Identifier the master transmits on.
    pub master: Identifier,
    /// Identifier the slave answers on.
    pub slave: Identifier,
    /// Optional broadcast identifier.
    pub broadcast: Option<Identifier>,
    /// Receive filter passing the slave identifier.
    pub filter: AcceptanceFilter,
    pub bit_timing: BitTiming,
    /// Outgoing frames are padded to 8 bytes by the binding.
    pub max_dlc_required: bool,
    /// When false, the driver must deliver frames through the receive callback.
    pub use_default_listener: bool,
    /// The driver's own options, validated against [`CanDriver::parameters`].
    pub options: Configuration,
}

/// A CAN interface backend.
///
/// Methods take `&self`: the listener thread reads while the caller's
/// thread transmits, so implementations synchronize internally.
pub trait CanDriver: Send + Sync {
    /// Registry name.
    fn name(&self) -> &str;

    /// Driver-specific options.
    fn parameters(&self) -> ParameterMap {
        ParameterMap::new()
    }

    /// Prepare the channel. Callback-driven drivers keep `on_receive`.
    fn init(&self, context: &DriverContext, on_receive: ReceiveCallback) -> Result<()>;

    /// Send one frame on the master identifier.
    fn transmit(&self, payload: &[u8]) -> Result<()>;

    /// Next received frame, if any. Must not block for long.
    fn read(&self) -> Result<Option<CanFrame>>;

    /// Open the channel.
    fn connect(&self) -> Result<()>;

    /// Close the channel.
    fn close(&self) -> Result<()>;

    /// Duration of one timestamp tick in nanoseconds.
    fn timestamp_resolution(&self) -> u64;
}
