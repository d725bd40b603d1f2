//! XCP on CAN: the bus binding of the frame transport engine.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, warn};
use xcplink_config::{Configuration, ParamKind, ParameterMap};
use xcplink_engine::{Dispatcher, EngineError, FrameTransport, Inbound, Link, TransportRegistry};
use xcplink_frame::{Frame, FrameError, Framing};

use crate::dlc::{dlc_for, pad_frame};
use crate::driver::{CanDriver, DriverContext, ReceiveCallback};
use crate::error::Result;
use crate::filter::calculate_filter;
use crate::identifier::Identifier;
use crate::registry::DriverRegistry;
use crate::timing::{
    BitTiming, BAUDRATE, BTL_CYCLES, SAMPLE_POINT, SAMPLE_RATE, SJW, TSEG1, TSEG2,
};

pub const CAN_DRIVER: &str = "CAN_DRIVER";
pub const CAN_ID_MASTER: &str = "CAN_ID_MASTER";
pub const CAN_ID_SLAVE: &str = "CAN_ID_SLAVE";
pub const CAN_ID_BROADCAST: &str = "CAN_ID_BROADCAST";
pub const MAX_DLC_REQUIRED: &str = "MAX_DLC_REQUIRED";
pub const CAN_USE_DEFAULT_LISTENER: &str = "CAN_USE_DEFAULT_LISTENER";

/// Options understood by the CAN transport (driver options come on top).
pub fn parameter_map() -> ParameterMap {
    let timing = BitTiming::default();
    ParameterMap::base()
        .required(CAN_DRIVER, ParamKind::Str)
        .required(CAN_ID_MASTER, ParamKind::Int)
        .required(CAN_ID_SLAVE, ParamKind::Int)
        .optional_unset(CAN_ID_BROADCAST, ParamKind::Int)
        .optional(BAUDRATE, ParamKind::Float, timing.baudrate)
        .optional(BTL_CYCLES, ParamKind::Int, timing.btl_cycles)
        .optional(SAMPLE_RATE, ParamKind::Int, timing.sample_rate)
        .optional(SAMPLE_POINT, ParamKind::Float, timing.sample_point)
        .optional(SJW, ParamKind::Int, timing.sjw)
        .optional(TSEG1, ParamKind::Int, timing.tseg1)
        .optional(TSEG2, ParamKind::Int, timing.tseg2)
        .optional(MAX_DLC_REQUIRED, ParamKind::Bool, false)
        .optional(CAN_USE_DEFAULT_LISTENER, ParamKind::Bool, true)
}

/// A [`Link`] over a CAN driver.
///
/// Packets travel headerless, one per frame. Inbound frames reach the
/// engine either through the listener polling [`CanDriver::read`] or
/// through the receive callback handed to the driver at attach time.
pub struct CanLink {
    driver: Arc<dyn CanDriver>,
    context: DriverContext,
}

impl CanLink {
    pub fn new(driver: Arc<dyn CanDriver>, context: DriverContext) -> Self {
        Self { driver, context }
    }

    /// Resolve the driver and build its context from a validated
    /// configuration. Driver options are read from `raw`.
    pub fn from_config(
        config: &Configuration,
        raw: &Value,
        drivers: &DriverRegistry,
    ) -> Result<Self> {
        let driver = drivers.create(config.get_str(CAN_DRIVER)?)?;
        let options = Configuration::new(&driver.parameters(), raw)?;

        let master = Identifier::from_option(config.get_int(CAN_ID_MASTER)?)?;
        let slave = Identifier::from_option(config.get_int(CAN_ID_SLAVE)?)?;
        let broadcast = if config.contains(CAN_ID_BROADCAST) {
            Some(Identifier::from_option(config.get_int(CAN_ID_BROADCAST)?)?)
        } else {
            None
        };

        let context = DriverContext {
            master,
            slave,
            broadcast,
            filter: calculate_filter(&[slave])?,
            bit_timing: BitTiming::from_config(config)?,
            max_dlc_required: config.get_bool(MAX_DLC_REQUIRED)?,
            use_default_listener: config.get_bool(CAN_USE_DEFAULT_LISTENER)?,
            options,
        };

        debug!(
            driver = driver.name(),
            %master,
            %slave,
            filter = %context.filter,
            baudrate = context.bit_timing.baudrate,
            "CAN link configured"
        );
        Ok(Self::new(driver, context))
    }

    pub fn context(&self) -> &DriverContext {
        &self.context
    }

    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }
}

impl Link for CanLink {
    fn name(&self) -> &'static str {
        "can"
    }

    fn framing(&self) -> Framing {
        Framing::Headerless
    }

    fn verifies_frame_size(&self) -> bool {
        true
    }

    fn uses_default_listener(&self) -> bool {
        self.context.use_default_listener
    }

    fn attach(&mut self, dispatcher: Dispatcher) -> xcplink_engine::Result<()> {
        let on_receive: ReceiveCallback = Arc::new(move |payload: &[u8]| {
            let frame = Bytes::copy_from_slice(payload);
            if let Err(err) = dispatcher.process_response(frame, payload.len(), 0) {
                warn!(error = %err, "dropping CAN frame");
            }
        });
        self.driver.init(&self.context, on_receive)?;
        Ok(())
    }

    fn inbound(&mut self) -> xcplink_engine::Result<Box<dyn Inbound>> {
        Ok(Box::new(DriverInbound {
            driver: Arc::clone(&self.driver),
        }))
    }

    fn connect(&mut self) -> xcplink_engine::Result<()> {
        self.driver.connect()?;
        debug!(driver = self.driver.name(), "CAN link up");
        Ok(())
    }

    fn send(&mut self, frame: &[u8]) -> xcplink_engine::Result<()> {
        dlc_for(isize::try_from(frame.len()).unwrap_or(isize::MAX))?;
        let padded = pad_frame(frame, self.context.max_dlc_required);
        self.driver.transmit(&padded)?;
        Ok(())
    }

    fn close_connection(&mut self) -> xcplink_engine::Result<()> {
        self.driver.close()?;
        Ok(())
    }

    fn timestamp_resolution(&self) -> Option<u64> {
        Some(self.driver.timestamp_resolution())
    }
}

struct DriverInbound {
    driver: Arc<dyn CanDriver>,
}

impl Inbound for DriverInbound {
    fn poll(&mut self) -> std::result::Result<Option<Frame>, FrameError> {
        match self.driver.read() {
            Ok(frame) => Ok(frame.map(|frame| Frame::new(0, frame.data))),
            Err(err) => Err(FrameError::Io(std::io::Error::other(err))),
        }
    }
}

/// Build a CAN transport from raw options.
pub fn create_transport(
    raw: &Value,
    drivers: &DriverRegistry,
) -> std::result::Result<FrameTransport, EngineError> {
    let config = Configuration::new(&parameter_map(), raw)?;
    let link = CanLink::from_config(&config, raw, drivers)?;
    FrameTransport::new(Box::new(link), &config)
}

/// Add the `can` transport, resolving drivers through `drivers`.
pub fn register_transport(registry: &mut TransportRegistry, drivers: Arc<DriverRegistry>) {
    registry.register("can", move |raw| create_transport(raw, &drivers));
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use xcplink_config::ConfigError;

    use super::*;
    use crate::error::CanError;
    use crate::virtual_bus::{VirtualBus, VirtualDriver};

    fn registry_with(bus: &VirtualBus) -> DriverRegistry {
        let mut drivers = DriverRegistry::new();
        let bus = bus.clone();
        drivers.register("virtual", move || Ok(Arc::new(VirtualDriver::new(bus.clone()))));
        drivers
    }

    fn link(raw: Value) -> Result<CanLink> {
        let config = Configuration::new(&parameter_map(), &raw)?;
        CanLink::from_config(&config, &raw, &registry_with(&VirtualBus::new()))
    }

    #[test]
    fn context_from_defaults() {
        let link = link(json!({
            "CAN_DRIVER": "virtual",
            "CAN_ID_MASTER": 0x7E0,
            "CAN_ID_SLAVE": 0x7E1,
        }))
        .unwrap();

        let context = link.context();
        assert_eq!(context.master, Identifier::new(0x7E0).unwrap());
        assert_eq!(context.slave, Identifier::new(0x7E1).unwrap());
        assert_eq!(context.broadcast, None);
        assert!(context.filter.accepts(0x7E1));
        assert!(!context.filter.accepts(0x7E0));
        assert_eq!(context.bit_timing, BitTiming::default());
        assert!(!context.max_dlc_required);
        assert!(context.use_default_listener);
        assert_eq!(link.driver_name(), "virtual");
        assert!(link.uses_default_listener());
        assert_eq!(link.framing(), Framing::Headerless);
    }

    #[test]
    fn extended_and_broadcast_ids() {
        let link = link(json!({
            "CAN_DRIVER": "Virtual",
            "CAN_ID_MASTER": 0x98DA_F100u32,
            "CAN_ID_SLAVE": 0x98DA_00F1u32,
            "CAN_ID_BROADCAST": 0x7DF,
            "BAUDRATE": 500000.0,
        }))
        .unwrap();

        let context = link.context();
        assert!(context.slave.is_extended());
        assert_eq!(context.slave.id(), 0x18DA_00F1);
        assert_eq!(context.filter.mask, 0x1FFF_FFFF);
        assert_eq!(context.broadcast, Some(Identifier::new(0x7DF).unwrap()));
        assert_eq!(context.bit_timing.baudrate, 500000.0);
    }

    #[test]
    fn required_options_enforced() {
        let err = link(json!({ "CAN_DRIVER": "virtual", "CAN_ID_MASTER": 1 }))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            CanError::Config(ConfigError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn out_of_range_identifier_rejected() {
        let err = link(json!({
            "CAN_DRIVER": "virtual",
            "CAN_ID_MASTER": 0x800,
            "CAN_ID_SLAVE": 0x7E1,
        }))
        .err()
        .unwrap();
        assert!(matches!(
            err,
            CanError::IdentifierOutOfRange {
                id: 0x800,
                extended: false
            }
        ));
    }

    #[test]
    fn unknown_driver_rejected() {
        let err = link(json!({
            "CAN_DRIVER": "kvaser",
            "CAN_ID_MASTER": 0x7E0,
            "CAN_ID_SLAVE": 0x7E1,
        }))
        .err()
        .unwrap();
        assert!(matches!(err, CanError::UnknownDriver { .. }));
    }

    #[test]
    fn send_checks_length_before_transmit() {
        let bus = VirtualBus::new();
        let raw = json!({
            "CAN_DRIVER": "virtual",
            "CAN_ID_MASTER": 0x7E0,
            "CAN_ID_SLAVE": 0x7E1,
            "MAX_DLC_REQUIRED": true,
        });
        let config = Configuration::new(&parameter_map(), &raw).unwrap();
        let mut link = CanLink::from_config(&config, &raw, &registry_with(&bus)).unwrap();
        link.connect().unwrap();

        let err = link.send(&[0u8; 65]).unwrap_err();
        assert!(matches!(err, EngineError::Backend(_)));
        assert!(bus.transmitted().is_empty());

        link.send(&[0xFF, 0x00]).unwrap();
        assert_eq!(
            bus.transmitted()[0].data.as_ref(),
            &[0xFF, 0x00, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(link.timestamp_resolution(), Some(1_000));
    }
}
