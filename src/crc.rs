//! CRC-8/ROHC calculation for the built-in codec engine.
//!
//! Thin wrapper around the `crc` crate providing the 8-bit CRC used to guard
//! context-initialization packets (RFC 3095, Section 5.9.1).

use crc::{CRC_8_ROHC, Crc};
use std::fmt;

/// Pre-initialized CRC-8/ROHC instance, intended for reuse across packets.
pub struct Crc8 {
    calculator: Crc<u8>,
}

impl fmt::Debug for Crc8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crc8")
            .field("calculator", &format_args!("Crc<u8>(CRC_8_ROHC)"))
            .finish()
    }
}

impl Crc8 {
    /// Creates a new calculator with the CRC-8/ROHC algorithm initialized.
    pub fn new() -> Self {
        Self {
            calculator: Crc::<u8>::new(&CRC_8_ROHC),
        }
    }

    /// Calculates the 8-bit ROHC CRC over `input`.
    #[inline]
    pub fn checksum(&self, input: &[u8]) -> u8 {
        self.calculator.checksum(input)
    }
}

impl Default for Crc8 {
    fn default() -> Self {
        Self::new()
    }
}
