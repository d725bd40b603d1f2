//! XCP transport layer for calibration and measurement masters.
//!
//! xcplink moves XCP packets between a master and an ECU: it frames
//! requests, sorts inbound packets by PID into response, event, service
//! request and DAQ queues, and pairs commands with their responses.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP/UDP sockets
//! - [`frame`]: PIDs, command codes, length-prefixed and headerless framing
//! - [`config`]: option maps and validated configurations
//! - [`engine`]: the frame transport engine, registry and Ethernet link
//! - [`can`]: CAN addressing, drivers and the bus link (behind `can` feature)

/// Re-export transport types.
pub mod transport {
    pub use xcplink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use xcplink_frame::*;
}

/// Re-export configuration types.
pub mod config {
    pub use xcplink_config::*;
}

/// Re-export engine types.
pub mod engine {
    pub use xcplink_engine::*;
}

/// Re-export CAN types (requires `can` feature).
#[cfg(feature = "can")]
pub mod can {
    pub use xcplink_can::*;
}

#[cfg(feature = "can")]
pub use backends::{backends, Backends};

#[cfg(feature = "can")]
mod backends {
    use std::sync::Arc;

    use xcplink_can::{register_transport, DriverRegistry, LoadReport};
    use xcplink_engine::TransportRegistry;

    /// Every built-in transport and CAN driver, wired together.
    #[derive(Debug, Clone)]
    pub struct Backends {
        pub transports: TransportRegistry,
        pub drivers: Arc<DriverRegistry>,
        /// Outcome of loading the driver plugins.
        pub report: LoadReport,
    }

    /// Build the `eth` and `can` transports over the built-in drivers.
    pub fn backends() -> Backends {
        let (drivers, report) = DriverRegistry::builtin();
        let drivers = Arc::new(drivers);

        let mut transports = TransportRegistry::builtin();
        register_transport(&mut transports, Arc::clone(&drivers));

        Backends {
            transports,
            drivers,
            report,
        }
    }

}
