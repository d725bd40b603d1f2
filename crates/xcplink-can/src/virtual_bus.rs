//! In-process CAN bus.
//!
//! [`VirtualDriver`] stands in for an interface card: frames the master
//! transmits are recorded and handed to an optional responder playing the
//! slave, and frames for the master are injected by tests or by that
//! responder. Several drivers may share one [`VirtualBus`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, trace};
use xcplink_config::{ParamKind, ParameterMap};
use xcplink_frame::{ERR, RES, SYNCH};

use crate::driver::{CanDriver, CanFrame, DriverContext, ReceiveCallback};
use crate::error::{CanError, Result};
use crate::identifier::Identifier;
use crate::registry::{DriverPlugin, DriverRegistry};

/// Answer every command with a positive response (`SYNCH` with ERR_CMD_SYNCH).
pub const VIRTUAL_ACK: &str = "VIRTUAL_ACK";

/// Registers the `virtual` driver.
pub const PLUGIN: DriverPlugin = DriverPlugin {
    name: "virtual",
    load,
};

/// Produces the slave's answers to one master frame.
pub type Responder = Box<dyn FnMut(&CanFrame) -> Vec<Vec<u8>> + Send>;

fn load(registry: &mut DriverRegistry) -> Result<()> {
    registry.register("virtual", || Ok(Arc::new(VirtualDriver::new(VirtualBus::new()))));
    Ok(())
}

/// The slave side of a [`VIRTUAL_ACK`] bus.
pub fn acknowledging_responder() -> Responder {
    Box::new(|frame: &CanFrame| {
        let reply = match frame.data.first() {
            Some(&code) if u16::from(code) == SYNCH.code() => vec![ERR, 0x00],
            _ => vec![RES],
        };
        vec![reply]
    })
}

#[derive(Default)]
struct BusState {
    to_master: VecDeque<CanFrame>,
    transmitted: Vec<CanFrame>,
    responder: Option<Responder>,
    callback: Option<ReceiveCallback>,
    master: Option<Identifier>,
    slave: Option<Identifier>,
    open: bool,
}

/// Shared state of one simulated bus.
#[derive(Clone)]
pub struct VirtualBus {
    state: Arc<Mutex<BusState>>,
    epoch: Instant,
}

impl Default for VirtualBus {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualBus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState::default())),
            epoch: Instant::now(),
        }
    }

    /// Install the slave side.
    pub fn set_responder(&self, responder: impl FnMut(&CanFrame) -> Vec<Vec<u8>> + Send + 'static) {
        self.lock().responder = Some(Box::new(responder));
    }

    /// Put a frame for the master on the bus, as sent by the slave.
    pub fn inject(&self, payload: impl Into<Bytes>) -> Result<()> {
        let slave = self.lock().slave.unwrap_or(Identifier::make(0, false)?);
        let frame = CanFrame::new(slave, payload, self.ticks())?;
        self.deliver(frame);
        Ok(())
    }

    /// Frames the master has transmitted so far.
    pub fn transmitted(&self) -> Vec<CanFrame> {
        self.lock().transmitted.clone()
    }

    /// Frames waiting to be read by the master.
    pub fn pending(&self) -> usize {
        self.lock().to_master.len()
    }

    fn deliver(&self, frame: CanFrame) {
        let callback = self.lock().callback.clone();
        match callback {
            // Called without the lock; the callback may take its time.
            Some(callback) => callback(frame.data.as_ref()),
            None => self.lock().to_master.push_back(frame),
        }
    }

    fn ticks(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        // The state stays consistent across a panicking responder.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for VirtualBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("VirtualBus")
            .field("pending", &state.to_master.len())
            .field("transmitted", &state.transmitted.len())
            .field("open", &state.open)
            .finish()
    }
}

/// A [`CanDriver`] on a [`VirtualBus`].
#[derive(Debug, Clone)]
pub struct VirtualDriver {
    bus: VirtualBus,
}

impl VirtualDriver {
    pub fn new(bus: VirtualBus) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &VirtualBus {
        &self.bus
    }
}

impl CanDriver for VirtualDriver {
    fn name(&self) -> &str {
        "virtual"
    }

    fn parameters(&self) -> ParameterMap {
        ParameterMap::new().optional(VIRTUAL_ACK, ParamKind::Bool, false)
    }

    fn init(&self, context: &DriverContext, on_receive: ReceiveCallback) -> Result<()> {
        let acknowledge = context.options.get_bool(VIRTUAL_ACK).unwrap_or(false);

        let mut state = self.bus.lock();
        state.master = Some(context.master);
        state.slave = Some(context.slave);
        if !context.use_default_listener {
            state.callback = Some(on_receive);
        }
        if acknowledge && state.responder.is_none() {
            state.responder = Some(acknowledging_responder());
        }

        debug!(
            master = %context.master,
            slave = %context.slave,
            filter = %context.filter,
            callback = state.callback.is_some(),
            "virtual CAN driver initialized"
        );
        Ok(())
    }

    fn transmit(&self, payload: &[u8]) -> Result<()> {
        let (frame, responder) = {
            let mut state = self.bus.lock();
            if !state.open {
                return Err(CanError::Driver("virtual bus is not connected".into()));
            }
            let master = state.master.unwrap_or(Identifier::make(0, false)?);
            let frame = CanFrame::new(master, Bytes::copy_from_slice(payload), self.bus.ticks())?;
            state.transmitted.push(frame.clone());
            (frame, state.responder.take())
        };
        trace!(id = %frame.identifier, len = frame.data.len(), "virtual CAN transmit");

        let Some(mut responder) = responder else {
            return Ok(());
        };
        let replies = responder(&frame);
        {
            let mut state = self.bus.lock();
            if state.responder.is_none() {
                state.responder = Some(responder);
            }
        }

        for reply in replies {
            self.bus.inject(reply)?;
        }
        Ok(())
    }

    fn read(&self) -> Result<Option<CanFrame>> {
        Ok(self.bus.lock().to_master.pop_front())
    }

    fn connect(&self) -> Result<()> {
        self.bus.lock().open = true;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut state = self.bus.lock();
        state.open = false;
        state.callback = None;
        Ok(())
    }

    fn timestamp_resolution(&self) -> u64 {
        1_000
    }
}
