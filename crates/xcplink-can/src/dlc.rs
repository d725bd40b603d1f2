//! Payload length to DLC mapping and send-side padding.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CanError, Result};

/// Largest classic CAN payload; also the padded frame size.
pub const MAX_CLASSIC_LENGTH: usize = 8;

/// Largest CAN-FD payload.
pub const MAX_FD_LENGTH: usize = 64;

/// Payload lengths CAN-FD can carry above 8 bytes.
const FD_LENGTHS: [usize; 7] = [12, 16, 20, 24, 32, 48, 64];

/// Smallest frame length able to carry `length` bytes.
///
/// 0..=8 map to themselves, 9..=64 round up to the next CAN-FD size.
pub fn dlc_for(length: isize) -> Result<usize> {
    let len = usize::try_from(length).map_err(|_| CanError::LengthOutOfRange(length))?;
    if len <= MAX_CLASSIC_LENGTH {
        return Ok(len);
    }
    FD_LENGTHS
        .iter()
        .copied()
        .find(|fd| len <= *fd)
        .ok_or(CanError::LengthOutOfRange(length))
}

/// The 4-bit DLC code for a payload length.
pub fn dlc_code(length: usize) -> Result<u8> {
    let length = isize::try_from(length).map_err(|_| CanError::LengthOutOfRange(isize::MAX))?;
    let dlc = dlc_for(length)?;
    let code = match dlc {
        0..=8 => dlc,
        _ => {
            let index = FD_LENGTHS
                .iter()
                .position(|fd| *fd == dlc)
                .ok_or(CanError::LengthOutOfRange(length))?;
            9 + index
        }
    };
    Ok(code as u8)
}

/// Zero-pad `frame` to 8 bytes when `max_dlc_required` is set.
///
/// Frames of 8 bytes or more pass through unchanged.
pub fn pad_frame(frame: &[u8], max_dlc_required: bool) -> Bytes {
    if !max_dlc_required || frame.len() >= MAX_CLASSIC_LENGTH {
        return Bytes::copy_from_slice(frame);
    }

    let mut padded = BytesMut::with_capacity(MAX_CLASSIC_LENGTH);
    padded.put_slice(frame);
    padded.put_bytes(0, MAX_CLASSIC_LENGTH - frame.len());
    padded.freeze()
}
