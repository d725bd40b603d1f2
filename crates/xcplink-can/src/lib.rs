//! XCP on CAN.
//!
//! Identifier handling, DLC mapping and padding, acceptance filters and bit
//! timing, plus the [`CanDriver`] contract and the [`CanLink`] binding that
//! plugs a driver into the frame transport engine. Drivers are resolved by
//! name through a [`DriverRegistry`]; the in-process `virtual` driver is
//! always available.

pub mod dlc;
pub mod driver;
pub mod error;
pub mod filter;
pub mod identifier;
pub mod registry;
pub mod timing;
pub mod transport;
pub mod virtual_bus;

pub use dlc::{dlc_code, dlc_for, pad_frame, MAX_CLASSIC_LENGTH, MAX_FD_LENGTH};
pub use driver::{CanDriver, CanFrame, DriverContext, ReceiveCallback};
pub use error::{CanError, Result};
pub use filter::{calculate_filter, AcceptanceFilter};
pub use identifier::{Identifier, CAN_EXTENDED_ID, MAX_11_BIT_IDENTIFIER, MAX_29_BIT_IDENTIFIER};
pub use registry::{DriverConstructor, DriverPlugin, DriverRegistry, LoadReport, PluginFailure};
pub use timing::{sample_point_to_tsegs, BitTiming};
pub use transport::{create_transport, parameter_map, register_transport, CanLink};
pub use virtual_bus::{VirtualBus, VirtualDriver};
