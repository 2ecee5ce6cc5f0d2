//! Wire layout of a frame on the serial link.
//!
//! # Frame Format
//!
//! ```text
//! +------+------+-----+---------------------+-----+-----+
//! | 0xFF | 0xFF | LEN | PAYLOAD (LEN-3)     | CK1 | CK2 |
//! +------+------+-----+---------------------+-----+-----+
//! ```
//!
//! `LEN` counts itself, the payload and both checksum bytes, so an empty
//! payload has `LEN == 3` and the largest payload is 252 bytes. `CK1` and
//! `CK2` are computed over `LEN` and the payload (see
//! [`checksum`](super::checksum)).

use super::checksum::{CHECKSUM_LEN, Checksum};
use crate::error::{Error, Result};
use bytes::{BufMut, BytesMut};

/// Value of each of the two header bytes.
pub const HEADER_BYTE: u8 = 0xFF;

/// Frame header.
pub const HEADER: [u8; 2] = [HEADER_BYTE, HEADER_BYTE];

/// Size of the length field.
pub const LENGTH_FIELD_SIZE: usize = 1;

/// Smallest valid `LEN` value (empty payload).
pub const MIN_FRAME_LEN: u8 = (LENGTH_FIELD_SIZE + CHECKSUM_LEN) as u8;

/// Largest `LEN` value representable in the length byte.
pub const MAX_FRAME_LEN: u8 = u8::MAX;

/// Largest payload that fits in one frame.
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_LEN as usize - MIN_FRAME_LEN as usize;

/// Returns the `LEN` byte for a payload of `payload_len` bytes.
pub fn frame_len(payload_len: usize) -> Result<u8> {
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(Error::PayloadTooLarge(payload_len));
    }
    Ok((payload_len + MIN_FRAME_LEN as usize) as u8)
}

/// Total bytes on the wire for a payload, header included.
pub fn wire_size(payload_len: usize) -> usize {
    HEADER.len() + MIN_FRAME_LEN as usize + payload_len
}

/// Appends the encoded frame for `payload` to `dst`.
pub fn encode(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = frame_len(payload.len())?;

    dst.reserve(wire_size(payload.len()));
    dst.put_slice(&HEADER);
    let body_start = dst.len();
    dst.put_u8(len);
    dst.put_slice(payload);

    let checksum = Checksum::compute(&dst[body_start..]);
    dst.put_slice(&checksum.to_bytes());

    Ok(())
}

/// Encodes `payload` into a freshly allocated frame.
pub fn to_frame_bytes(payload: &[u8]) -> Result<Vec<u8>> {
    let mut buf = BytesMut::with_capacity(wire_size(payload.len()));
    encode(payload, &mut buf)?;
    Ok(buf.to_vec())
}
