use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A half-open address range `[start, start + size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressRange {
    pub start: u64,
    pub size: u64,
}

impl AddressRange {
    pub const fn new(start: u64, size: u64) -> Self {
        Self { start, size }
    }

    /// Exclusive end address.
    ///
    /// Saturates at `u64::MAX`; [`AddressRange::validate`] rejects ranges where that matters.
    #[inline]
    pub const fn end(&self) -> u64 {
        self.start.saturating_add(self.size)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr - self.start < self.size
    }

    /// Returns `true` if `[addr, addr + len)` lies entirely inside this range.
    ///
    /// A zero-length span is contained if its start address is.
    #[inline]
    pub fn contains_span(&self, addr: u64, len: u64) -> bool {
        self.contains(addr) && len <= self.size - (addr - self.start)
    }

    pub fn overlaps(&self, other: &AddressRange) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.start < other.end()
            && other.start < self.end()
    }

    /// Offset of `addr` from the start of the range, if it is inside.
    #[inline]
    pub fn offset_of(&self, addr: u64) -> Option<u64> {
        self.contains(addr).then(|| addr - self.start)
    }

    /// Rejects empty ranges and ranges that run past the top of the 64-bit address space.
    ///
    /// `index` identifies the range in error messages when validating a list.
    pub fn validate(&self, index: usize) -> Result<(), ConfigError> {
        if self.size == 0 {
            return Err(ConfigError::EmptyRange {
                index,
                start: self.start,
            });
        }
        if self.start.checked_add(self.size).is_none() {
            return Err(ConfigError::RangeOverflow {
                index,
                start: self.start,
                size: self.size,
            });
        }
        Ok(())
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:x}, 0x{:x})", self.start, self.end())
    }
}
