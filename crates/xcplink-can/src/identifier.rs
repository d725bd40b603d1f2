//! XCP-formatted CAN identifiers.
//!
//! Configuration carries identifiers as 32-bit values where bit 31 marks a
//! 29-bit extended identifier. [`Identifier`] validates and normalizes them.

use embedded_can::{ExtendedId, Id, StandardId};

use crate::error::{CanError, Result};

/// Marker bit for extended identifiers in the raw encoding.
pub const CAN_EXTENDED_ID: u32 = 0x8000_0000;

pub const MAX_11_BIT_IDENTIFIER: u32 = (1 << 11) - 1;
pub const MAX_29_BIT_IDENTIFIER: u32 = (1 << 29) - 1;

/// Returns true if the raw value carries the extended marker.
pub fn is_extended_identifier(raw: u32) -> bool {
    raw & CAN_EXTENDED_ID == CAN_EXTENDED_ID
}

/// Raw value with the extended marker removed.
pub fn strip_identifier(raw: u32) -> u32 {
    raw & !CAN_EXTENDED_ID
}

/// A validated bus identifier.
///
/// Equality and hashing consider the bus id and format only, not the raw
/// encoding it was built from.
#[derive(Debug, Clone, Copy, Eq)]
pub struct Identifier {
    id: u32,
    extended: bool,
    raw: u32,
}

impl Identifier {
    /// Parse a raw XCP identifier (bit 31 = extended).
    pub fn new(raw: u32) -> Result<Self> {
        let id = strip_identifier(raw);
        let extended = is_extended_identifier(raw);
        let max = if extended {
            MAX_29_BIT_IDENTIFIER
        } else {
            MAX_11_BIT_IDENTIFIER
        };
        if id > max {
            return Err(CanError::IdentifierOutOfRange {
                id: u64::from(id),
                extended,
            });
        }
        Ok(Self { id, extended, raw })
    }

    /// Build from a bus id and format.
    pub fn make(id: u32, extended: bool) -> Result<Self> {
        if id & CAN_EXTENDED_ID != 0 {
            return Err(CanError::IdentifierOutOfRange {
                id: u64::from(id),
                extended,
            });
        }
        Self::new(if extended { id | CAN_EXTENDED_ID } else { id })
    }

    /// Parse a raw identifier taken from a configuration integer.
    pub fn from_option(value: i64) -> Result<Self> {
        let raw = u32::try_from(value).map_err(|_| CanError::IdentifierOutOfRange {
            id: value as u64,
            extended: true,
        })?;
        Self::new(raw)
    }

    /// Identifier as seen on the bus.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The raw XCP encoding.
    pub fn raw(&self) -> u32 {
        self.raw
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.extended == other.extended
    }
}

impl std::hash::Hash for Identifier {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.extended.hash(state);
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.extended {
            write!(f, "0x{:08X}x", self.id)
        } else {
            write!(f, "0x{:03X}", self.id)
        }
    }
}

impl From<Identifier> for Id {
    fn from(identifier: Identifier) -> Self {
        // Ranges are checked at construction.
        if identifier.extended {
            Id::Extended(ExtendedId::new(identifier.id).unwrap_or(ExtendedId::MAX))
        } else {
            let id = u16::try_from(identifier.id).unwrap_or(StandardId::MAX.as_raw());
            Id::Standard(StandardId::new(id).unwrap_or(StandardId::MAX))
        }
    }
}

impl From<Id> for Identifier {
    fn from(id: Id) -> Self {
        match id {
            Id::Standard(id) => {
                let id = u32::from(id.as_raw());
                Self {
                    id,
                    extended: false,
                    raw: id,
                }
            }
            Id::Extended(id) => Self {
                id: id.as_raw(),
                extended: true,
                raw: id.as_raw() | CAN_EXTENDED_ID,
            },
        }
    }
}
