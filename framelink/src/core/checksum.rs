//! Two-byte frame checksum.
//!
//! The first byte is the XOR of every covered byte, the second is its
//! complement. Both have the low bit cleared.
//!
//! # Example
//!
//! ```rust
//! use framelink::core::checksum;
//!
//! let frame = [0x04, 0x2A, 0x2E, 0xD0];
//! assert_eq!(checksum::checksum1(&frame[..2]), 0x2E);
//! assert_eq!(checksum::checksum2(0x2E), 0xD0);
//! assert!(checksum::validate(&frame));
//! ```

/// Mask applied to both checksum bytes; the low bit is always zero.
pub const CHECKSUM_MASK: u8 = 0xFE;

/// Number of trailing checksum bytes in a frame.
pub const CHECKSUM_LEN: usize = 2;

/// XOR-folds `data` and clears the low bit.
///
/// `data` must not include the trailing checksum bytes.
#[inline]
pub fn checksum1(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &byte| acc ^ byte) & CHECKSUM_MASK
}

/// Complement of `checksum1`, low bit cleared.
#[inline]
pub const fn checksum2(checksum1: u8) -> u8 {
    !checksum1 & CHECKSUM_MASK
}

/// Checksum pair as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksum {
    pub ck1: u8,
    pub ck2: u8,
}

impl Checksum {
    /// Computes the pair over `data` (length byte plus payload).
    #[inline]
    pub fn compute(data: &[u8]) -> Self {
        let ck1 = checksum1(data);
        Self {
            ck1,
            ck2: checksum2(ck1),
        }
    }

    /// Returns the pair in wire order.
    #[inline]
    pub const fn to_bytes(self) -> [u8; CHECKSUM_LEN] {
        [self.ck1, self.ck2]
    }
}

/// Checks a frame body (length byte, payload, ck1, ck2).
///
/// Anything of length two or less is rejected rather than sliced.
pub fn validate(frame: &[u8]) -> bool {
    if frame.len() <= CHECKSUM_LEN {
        return false;
    }

    let (covered, received) = frame.split_at(frame.len() - CHECKSUM_LEN);
    Checksum::compute(covered).to_bytes() == received
}
