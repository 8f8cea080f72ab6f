use crate::error::Error;
use crate::platform::{AlignedOps, Platform};
#[cfg(feature = "defmt")]
use defmt::trace;

/// Every structure in the sector (header, bitmap words, data slots) is a multiple of this size
/// and starts at an offset aligned to it.
pub(crate) const WORD_SIZE: usize = 4;

/// The header only holds the aligned data slot size.
pub(crate) const HEADER_SIZE: usize = 4;

/// Sector offset of the first bitmap byte.
pub(crate) const BITMAP_OFFSET: usize = HEADER_SIZE;

/// Sector header, persisted as little endian `u32` at offset 0.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Header {
    pub(crate) data_size: u32,
}

impl Header {
    pub(crate) fn to_bytes(self) -> [u8; HEADER_SIZE] {
        self.data_size.to_le_bytes()
    }

    pub(crate) fn from_bytes(raw: [u8; HEADER_SIZE]) -> Self {
        Self {
            data_size: u32::from_le_bytes(raw),
        }
    }
}

/// Access to a single erase sector of the flash device. All offsets are relative to the sector
/// start. Each physical operation runs inside its own critical section which is released
/// before the call returns, no matter if the operation succeeded.
pub(crate) struct SectorFlash<T: Platform> {
    pub(crate) hal: T,
    base: u32,
}

impl<T: Platform> SectorFlash<T> {
    pub(crate) fn new(hal: T, sector: u32) -> Result<Self, Error> {
        T::validate_geometry()?;

        let base = (sector as usize)
            .checked_mul(T::ERASE_SIZE)
            .ok_or(Error::InvalidSector)?;
        let end = base
            .checked_add(T::ERASE_SIZE)
            .ok_or(Error::InvalidSector)?;
        if end > hal.capacity() {
            return Err(Error::InvalidSector);
        }

        Ok(Self {
            hal,
            base: u32::try_from(base).map_err(|_| Error::InvalidSector)?,
        })
    }

    pub(crate) const fn size() -> usize {
        T::ERASE_SIZE
    }

    pub(crate) fn read(&mut self, offset: usize, bytes: &mut [u8]) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("read @{:#08x}: [{}]", offset, bytes.len());

        let address = self.address(offset, bytes.len())?;
        critical_section::with(|_| self.hal.read(address, bytes)).map_err(|_| Error::FlashError)
    }

    pub(crate) fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("write @{:#08x}: [{}]", offset, bytes.len());

        let address = self.address(offset, bytes.len())?;
        critical_section::with(|_| self.hal.write(address, bytes)).map_err(|_| Error::FlashError)
    }

    pub(crate) fn erase(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("erase @{:#08x}", self.base);

        #[cfg(feature = "debug-logs")]
        println!("  raw: erase sector @{:#08x}", self.base);

        let from = self.base;
        let to = from + T::ERASE_SIZE as u32;
        critical_section::with(|_| self.hal.erase(from, to)).map_err(|_| Error::FlashError)
    }

    pub(crate) fn read_header(&mut self) -> Result<Header, Error> {
        let mut raw = [0u8; HEADER_SIZE];
        self.read(0, &mut raw)?;
        Ok(Header::from_bytes(raw))
    }

    pub(crate) fn write_header(&mut self, header: Header) -> Result<(), Error> {
        self.write(0, &header.to_bytes())
    }

    /// Translates a sector relative range into an absolute flash address. Accesses crossing
    /// the sector end never reach the device.
    fn address(&self, offset: usize, len: usize) -> Result<u32, Error> {
        match offset.checked_add(len) {
            Some(end) if end <= T::ERASE_SIZE => Ok(self.base + offset as u32),
            _ => Err(Error::FlashError),
        }
    }
}
