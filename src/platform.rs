use crate::error::Error;
use crate::raw::{HEADER_SIZE, WORD_SIZE};
use embedded_storage::nor_flash::NorFlash;

/// Any NOR flash that implements the `embedded-storage` traits can back an EEPROM, e.g.
/// `esp_storage::FlashStorage`. Implementations must follow program-only-over-erased semantics.
pub trait Platform: NorFlash {}

impl<T: NorFlash> Platform for T {}

pub trait AlignedOps: Platform {
    /// Checks that header, bitmap words and data slots (all multiples of [`WORD_SIZE`] at
    /// [`WORD_SIZE`] aligned offsets) can be read and written without splitting.
    fn validate_geometry() -> Result<(), Error> {
        let word_aligned = |size: usize| size != 0 && WORD_SIZE.is_multiple_of(size);

        if !word_aligned(Self::READ_SIZE) || !word_aligned(Self::WRITE_SIZE) {
            return Err(Error::InvalidFlashGeometry);
        }

        if !Self::ERASE_SIZE.is_multiple_of(WORD_SIZE)
            || Self::ERASE_SIZE < HEADER_SIZE + 2 * WORD_SIZE
        {
            return Err(Error::InvalidFlashGeometry);
        }

        Ok(())
    }
}

#[inline(always)]
pub(crate) const fn align_ceil(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size.saturating_add(alignment - 1) & !(alignment - 1)
    } else {
        size.saturating_add(alignment - 1) / alignment * alignment
    }
}

#[inline(always)]
pub(crate) const fn align_floor(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size & !(alignment - 1)
    } else {
        size / alignment * alignment
    }
}

impl<T: Platform> AlignedOps for T {}
