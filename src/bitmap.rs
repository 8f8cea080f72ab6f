use crate::layout::Layout;
use crate::platform::align_floor;
use crate::raw::WORD_SIZE;
use alloc::vec;
use alloc::vec::Vec;
#[cfg(feature = "defmt")]
use defmt::trace;

/// The value a bit holds right after an erase. Bit 0 of the bitmap is never programmed, so it
/// always shows the polarity of the flash it was read from.
#[derive(strum::Display, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum Polarity {
    /// Erased bits read as 1, programming clears them.
    ErasedHigh,
    /// Erased bits read as 0, programming sets them.
    ErasedLow,
}

impl Polarity {
    pub(crate) fn of(reference: u8) -> Self {
        if reference & 1 != 0 {
            Polarity::ErasedHigh
        } else {
            Polarity::ErasedLow
        }
    }

    pub(crate) fn erased_byte(self) -> u8 {
        match self {
            Polarity::ErasedHigh => 0xFF,
            Polarity::ErasedLow => 0x00,
        }
    }
}

/// In-memory copy of the bitmap following the header. Bit `i` (i >= 1) flips away from the
/// erased polarity once slot `i` has been written.
pub(crate) struct VersionBitmap {
    bytes: Vec<u8>,
}

impl VersionBitmap {
    pub(crate) fn new(size: usize) -> Self {
        Self {
            bytes: vec![0xFF; size],
        }
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub(crate) fn polarity(&self) -> Polarity {
        Polarity::of(self.bytes.first().copied().unwrap_or(0xFF))
    }

    /// Resets every bit to the erased state, mirroring a freshly erased sector.
    pub(crate) fn reset(&mut self, polarity: Polarity) {
        self.bytes.fill(polarity.erased_byte());
    }

    fn is_erased(&self, bit: usize) -> bool {
        let byte = self.bytes[bit / 8];
        let mask = 1u8 << (bit % 8);
        match self.polarity() {
            Polarity::ErasedHigh => byte & mask != 0,
            Polarity::ErasedLow => byte & mask == 0,
        }
    }

    /// Returns the sector offset of the most recently written slot, or `None` if the bitmap was
    /// never initialized (the first version bit is still erased).
    ///
    /// If every bit is used up the offset behind the last tracked slot is returned. Callers
    /// have to check it against the sector bounds before trusting it.
    pub(crate) fn locate_current(&self, layout: &Layout) -> Option<usize> {
        debug_assert_eq!(self.bytes.len(), layout.bitmap_size());

        if self.bytes.is_empty() || self.is_erased(1) {
            return None;
        }

        let mut offset = layout.first_slot();
        for bit in 2..self.bytes.len() * 8 {
            // the first untouched bit follows the current version
            if self.is_erased(bit) {
                #[cfg(feature = "defmt")]
                trace!("locate_current: slot {} @{:#06x}", bit - 1, offset);

                return Some(offset);
            }
            offset += layout.data_size();
        }

        Some(offset)
    }

    /// Flips the bit of `slot` and returns the word aligned byte index of the bitmap word that
    /// has to be written back.
    pub(crate) fn mark_used(&mut self, slot: usize) -> usize {
        let byte = slot / 8;
        let mask = 1u8 << (slot % 8);

        match self.polarity() {
            Polarity::ErasedHigh => self.bytes[byte] &= !mask,
            Polarity::ErasedLow => self.bytes[byte] |= mask,
        }

        align_floor(byte, WORD_SIZE)
    }

    pub(crate) fn word(&self, start: usize) -> &[u8] {
        &self.bytes[start..start + WORD_SIZE]
    }
}
