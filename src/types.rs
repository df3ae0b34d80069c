//! Core type definitions for the verification harness.

use std::fmt;

/// Context identifier for a compression/decompression flow.
///
/// Newtype over `u16` so CIDs cannot be mixed up with lengths or ports at
/// compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct ContextId(pub u16);

impl ContextId {
    /// Creates a new instance.
    #[inline]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Raw value.
    #[inline]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Index into a per-CID slot collection.
    #[inline]
    pub const fn as_index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CID{}", self.0)
    }
}

impl From<u16> for ContextId {
    #[inline]
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<ContextId> for u16 {
    #[inline]
    fn from(value: ContextId) -> Self {
        value.0
    }
}

impl PartialEq<u16> for ContextId {
    #[inline]
    fn eq(&self, other: &u16) -> bool {
        self.0 == *other
    }
}

impl PartialEq<ContextId> for u16 {
    #[inline]
    fn eq(&self, other: &ContextId) -> bool {
        *self == other.0
    }
}
