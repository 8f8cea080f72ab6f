//! Sizing of the data slots and of the version bitmap that tracks them.
//!
//! ```text
//! offset 0                         : u32 data size (header)
//! offset 4                         : bitmap, bit 0 of byte 0 is the erased reference
//! offset 4 + bitmap                : slot 1
//! offset 4 + bitmap + data size    : slot 2
//! ...
//! ```

use crate::error::Error;
use crate::platform::align_ceil;
use crate::raw::{HEADER_SIZE, WORD_SIZE};

/// Geometry of a sector holding versions of `data_size` bytes. All sizes are multiples of four.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Layout {
    data_size: usize,
    bitmap_size: usize,
    sector_size: usize,
}

impl Layout {
    /// Computes the smallest word aligned bitmap able to track every version that fits into the
    /// sector next to it, plus one reference bit.
    ///
    /// `requested` is clamped up to `min_size` and aligned to four bytes. Sizes of zero or above
    /// `sector_size - 8` are rejected with [`Error::InvalidSize`].
    pub fn compute(requested: usize, sector_size: usize, min_size: usize) -> Result<Self, Error> {
        let max_size = sector_size.saturating_sub(HEADER_SIZE + WORD_SIZE);
        if requested == 0 || requested > max_size {
            return Err(Error::InvalidSize);
        }

        let data_size = align_ceil(requested.max(min_size), WORD_SIZE);
        if data_size > max_size {
            return Err(Error::InvalidSize);
        }

        // The slot count shrinks while the bitmap grows, so the first size that fits is the
        // smallest one.
        let mut bitmap_size = 0;
        loop {
            bitmap_size += WORD_SIZE;
            let free = sector_size
                .checked_sub(HEADER_SIZE + bitmap_size)
                .ok_or(Error::InvalidSize)?;
            let versions = free / data_size;
            // one bit per version plus the reference bit
            if versions < bitmap_size * 8 {
                break;
            }
        }

        Ok(Self {
            data_size,
            bitmap_size,
            sector_size,
        })
    }

    pub const fn data_size(&self) -> usize {
        self.data_size
    }

    pub const fn bitmap_size(&self) -> usize {
        self.bitmap_size
    }

    pub const fn sector_size(&self) -> usize {
        self.sector_size
    }

    /// Sector offset of slot 1.
    pub const fn first_slot(&self) -> usize {
        HEADER_SIZE + self.bitmap_size
    }

    /// Number of versions that fit into the sector before it has to be erased.
    pub const fn slot_count(&self) -> usize {
        (self.sector_size - self.first_slot()) / self.data_size
    }

    /// 1-based slot index, which is also the index of its bit in the bitmap.
    pub(crate) const fn slot_index(&self, offset: usize) -> usize {
        1 + (offset - self.first_slot()) / self.data_size
    }

    /// Whether a slot starting at `offset` lies completely within the sector.
    pub(crate) const fn contains_slot(&self, offset: usize) -> bool {
        offset >= self.first_slot() && offset + self.data_size <= self.sector_size
    }

    /// Whether another version fits behind the slot at `offset`.
    pub(crate) const fn can_append(&self, offset: usize) -> bool {
        offset + 2 * self.data_size <= self.sector_size
    }
}
