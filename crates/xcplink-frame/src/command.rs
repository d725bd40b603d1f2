//! Master→slave command codes.
//!
//! Codes up to 0xFF go on the wire as one byte. Wider codes are written
//! big-endian with the minimal number of bytes.

use bytes::BufMut;

/// A command code as sent by the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command(u16);

impl Command {
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    pub const fn code(&self) -> u16 {
        self.0
    }

    /// Number of bytes the code occupies on the wire.
    pub const fn encoded_len(&self) -> usize {
        if self.0 > 0xFF {
            2
        } else {
            1
        }
    }

    /// Append the command bytes to `dst`.
    pub fn put(&self, dst: &mut impl BufMut) {
        if self.encoded_len() == 2 {
            dst.put_u16(self.0);
        } else {
            dst.put_u8(self.0 as u8);
        }
    }

    /// Look up a command by its protocol name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        COMMANDS
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(command, _)| *command)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(0x{:02X})", command_name(*self), self.0)
    }
}

pub const CONNECT: Command = Command(0xFF);
pub const DISCONNECT: Command = Command(0xFE);
pub const GET_STATUS: Command = Command(0xFD);
/// Resynchronization. Its ERR_CMD_SYNCH answer is the expected reply.
pub const SYNCH: Command = Command(0xFC);
pub const GET_COMM_MODE_INFO: Command = Command(0xFB);
pub const GET_ID: Command = Command(0xFA);
pub const SET_REQUEST: Command = Command(0xF9);
pub const GET_SEED: Command = Command(0xF8);
pub const UNLOCK: Command = Command(0xF7);
pub const SET_MTA: Command = Command(0xF6);
pub const UPLOAD: Command = Command(0xF5);
pub const SHORT_UPLOAD: Command = Command(0xF4);
pub const BUILD_CHECKSUM: Command = Command(0xF3);
pub const TRANSPORT_LAYER_CMD: Command = Command(0xF2);
pub const USER_CMD: Command = Command(0xF1);
pub const DOWNLOAD: Command = Command(0xF0);
pub const DOWNLOAD_NEXT: Command = Command(0xEF);
pub const DOWNLOAD_MAX: Command = Command(0xEE);
pub const SHORT_DOWNLOAD: Command = Command(0xED);
pub const MODIFY_BITS: Command = Command(0xEC);
pub const SET_CAL_PAGE: Command = Command(0xEB);
pub const GET_CAL_PAGE: Command = Command(0xEA);
pub const CLEAR_DAQ_LIST: Command = Command(0xE3);
pub const SET_DAQ_PTR: Command = Command(0xE2);
pub const WRITE_DAQ: Command = Command(0xE1);
pub const SET_DAQ_LIST_MODE: Command = Command(0xE0);
pub const START_STOP_DAQ_LIST: Command = Command(0xDE);
pub const START_STOP_SYNCH: Command = Command(0xDD);
pub const GET_DAQ_CLOCK: Command = Command(0xDC);
pub const FREE_DAQ: Command = Command(0xD6);
pub const ALLOC_DAQ: Command = Command(0xD5);
pub const ALLOC_ODT: Command = Command(0xD4);
pub const ALLOC_ODT_ENTRY: Command = Command(0xD3);
pub const PROGRAM_START: Command = Command(0xD2);
pub const PROGRAM_CLEAR: Command = Command(0xD1);
pub const PROGRAM: Command = Command(0xD0);
pub const PROGRAM_RESET: Command = Command(0xCF);
pub const PROGRAM_NEXT: Command = Command(0xCA);
pub const PROGRAM_MAX: Command = Command(0xC9);
pub const PROGRAM_VERIFY: Command = Command(0xC8);

const COMMANDS: &[(Command, &str)] = &[
    (CONNECT, "CONNECT"),
    (DISCONNECT, "DISCONNECT"),
    (GET_STATUS, "GET_STATUS"),
    (SYNCH, "SYNCH"),
    (GET_COMM_MODE_INFO, "GET_COMM_MODE_INFO"),
    (GET_ID, "GET_ID"),
    (SET_REQUEST, "SET_REQUEST"),
    (GET_SEED, "GET_SEED"),
    (UNLOCK, "UNLOCK"),
    (SET_MTA, "SET_MTA"),
    (UPLOAD, "UPLOAD"),
    (SHORT_UPLOAD, "SHORT_UPLOAD"),
    (BUILD_CHECKSUM, "BUILD_CHECKSUM"),
    (TRANSPORT_LAYER_CMD, "TRANSPORT_LAYER_CMD"),
    (USER_CMD, "USER_CMD"),
    (DOWNLOAD, "DOWNLOAD"),
    (DOWNLOAD_NEXT, "DOWNLOAD_NEXT"),
    (DOWNLOAD_MAX, "DOWNLOAD_MAX"),
    (SHORT_DOWNLOAD, "SHORT_DOWNLOAD"),
    (MODIFY_BITS, "MODIFY_BITS"),
    (SET_CAL_PAGE, "SET_CAL_PAGE"),
    (GET_CAL_PAGE, "GET_CAL_PAGE"),
    (CLEAR_DAQ_LIST, "CLEAR_DAQ_LIST"),
    (SET_DAQ_PTR, "SET_DAQ_PTR"),
    (WRITE_DAQ, "WRITE_DAQ"),
    (SET_DAQ_LIST_MODE, "SET_DAQ_LIST_MODE"),
    (START_STOP_DAQ_LIST, "START_STOP_DAQ_LIST"),
    (START_STOP_SYNCH, "START_STOP_SYNCH"),
    (GET_DAQ_CLOCK, "GET_DAQ_CLOCK"),
    (FREE_DAQ, "FREE_DAQ"),
    (ALLOC_DAQ, "ALLOC_DAQ"),
    (ALLOC_ODT, "ALLOC_ODT"),
    (ALLOC_ODT_ENTRY, "ALLOC_ODT_ENTRY"),
    (PROGRAM_START, "PROGRAM_START"),
    (PROGRAM_CLEAR, "PROGRAM_CLEAR"),
    (PROGRAM, "PROGRAM"),
    (PROGRAM_RESET, "PROGRAM_RESET"),
    (PROGRAM_NEXT, "PROGRAM_NEXT"),
    (PROGRAM_MAX, "PROGRAM_MAX"),
    (PROGRAM_VERIFY, "PROGRAM_VERIFY"),
];

/// Returns the protocol name of a command code.
pub fn command_name(command: Command) -> &'static str {
    COMMANDS
        .iter()
        .find(|(c, _)| *c == command)
        .map(|(_, name)| *name)
        .unwrap_or("USER")
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    #[test]
    fn single_byte_codes_encode_as_one_byte() {
        let mut buf = BytesMut::new();
        DOWNLOAD_MAX.put(&mut buf);
        assert_eq!(buf.as_ref(), &[0xEE]);
        assert_eq!(DOWNLOAD_MAX.encoded_len(), 1);
    }

    #[test]
    fn wide_codes_encode_big_endian() {
        let mut buf = BytesMut::new();
        Command::new(0xF2FF).put(&mut buf);
        assert_eq!(buf.as_ref(), &[0xF2, 0xFF]);
    }

    #[test]
    fn names_resolve_both_ways() {
        assert_eq!(command_name(SYNCH), "SYNCH");
        assert_eq!(Command::from_name("get_status"), Some(GET_STATUS));
        assert_eq!(Command::from_name("nope"), None);
        assert_eq!(command_name(Command::new(0x10)), "USER");
        assert_eq!(CONNECT.to_string(), "CONNECT(0xFF)");
    }
}
