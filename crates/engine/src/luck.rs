use sha2::{Digest, Sha256};

use crate::grid::Cell;

const UNIT_MANTISSA_BITS: u32 = 53;

/// Maps a seed string to a reproducible value in `[0, 1)`.
///
/// SHA-256 of the UTF-8 seed; the first eight digest bytes are read
/// big-endian and the top 53 bits become the mantissa.
pub fn luck(seed: &str) -> f64 {
    let digest = Sha256::digest(seed.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    let bits = u64::from_be_bytes(head) >> (64 - UNIT_MANTISSA_BITS);
    bits as f64 / (1u64 << UNIT_MANTISSA_BITS) as f64
}

pub fn cell_seed(cell: Cell, purpose: Option<&str>) -> String {
    match purpose {
        Some(purpose) => format!("{},{},{purpose}", cell.i, cell.j),
        None => format!("{},{}", cell.i, cell.j),
    }
}
