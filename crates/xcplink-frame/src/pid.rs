//! Packet identifiers.
//!
//! The first byte of every slave→master packet selects its category:
//! 0xFF..=0xFE are command responses, 0xFD events, 0xFC service requests,
//! and everything below is a DAQ sample (the byte is then the ODT number).
//!
//! Only ERR (0xFE) marks a negative response. RES (0xFF) is always positive,
//! so a 0xFF packet is never checked for an error code.

/// Positive command response.
pub const RES: u8 = 0xFF;

/// Negative command response, followed by one error code byte.
pub const ERR: u8 = 0xFE;

/// Event packet.
pub const EV: u8 = 0xFD;

/// Service request packet.
pub const SERV: u8 = 0xFC;

/// Inbound packet category, one queue each on the master side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Response,
    Event,
    ServiceRequest,
    Sample,
}

impl Category {
    pub fn name(&self) -> &'static str {
        match self {
            Category::Response => "RESPONSE",
            Category::Event => "EVENT",
            Category::ServiceRequest => "SERV",
            Category::Sample => "DAQ",
        }
    }
}

/// Classify a packet by its PID byte.
pub fn classify(pid: u8) -> Category {
    match pid {
        ERR..=RES => Category::Response,
        EV => Category::Event,
        SERV => Category::ServiceRequest,
        _ => Category::Sample,
    }
}

/// Returns true if the packet is a negative response.
pub fn is_error(packet: &[u8]) -> bool {
    packet.first() == Some(&ERR)
}

/// Human-readable name of an ERR packet error code.
pub fn error_name(code: u8) -> &'static str {
    match code {
        0x00 => "ERR_CMD_SYNCH",
        0x10 => "ERR_CMD_BUSY",
        0x11 => "ERR_DAQ_ACTIVE",
        0x12 => "ERR_PGM_ACTIVE",
        0x20 => "ERR_CMD_UNKNOWN",
        0x21 => "ERR_CMD_SYNTAX",
        0x22 => "ERR_OUT_OF_RANGE",
        0x23 => "ERR_WRITE_PROTECTED",
        0x24 => "ERR_ACCESS_DENIED",
        0x25 => "ERR_ACCESS_LOCKED",
        0x26 => "ERR_PAGE_NOT_VALID",
        0x27 => "ERR_MODE_NOT_VALID",
        0x28 => "ERR_SEGMENT_NOT_VALID",
        0x29 => "ERR_SEQUENCE",
        0x2A => "ERR_DAQ_CONFIG",
        0x30 => "ERR_MEMORY_OVERFLOW",
        0x31 => "ERR_GENERIC",
        0x32 => "ERR_VERIFY",
        0x33 => "ERR_RESOURCE_TEMPORARY_NOT_ACCESSIBLE",
        _ => "ERR_UNKNOWN",
    }
}
