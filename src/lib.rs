#![doc = include_str!("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

mod bitmap;
pub mod error;
mod get;
mod internal;
pub mod layout;
pub mod platform;
mod put;
mod raw;

pub use get::Get;
pub use layout::Layout;
pub use put::Put;

extern crate alloc;

use crate::error::Error;
use crate::internal::{Cursor, Session};
use crate::platform::Platform;
use crate::raw::SectorFlash;
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

/// Sizes below this are rounded up. A tiny buffer would need a huge bitmap to track all of
/// its versions and scanning it on startup would take a long time.
pub const EEPROM_MIN_SIZE: usize = 16;

/// Where and how the EEPROM is stored.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Index of the erase sector, the sector starts at `sector * ERASE_SIZE`.
    pub sector: u32,
    /// Requested sizes are clamped up to this value. Defaults to [`EEPROM_MIN_SIZE`].
    pub min_size: usize,
}

impl Config {
    pub const fn new(sector: u32) -> Self {
        Self {
            sector,
            min_size: EEPROM_MIN_SIZE,
        }
    }

    pub const fn with_min_size(self, min_size: usize) -> Self {
        Self { min_size, ..self }
    }
}

/// Lifecycle of the buffer relative to what is stored in flash.
#[derive(strum::Display, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// `initialize` was not called yet or the EEPROM was torn down.
    Uninitialized,
    /// No valid version was found in flash (or it was wiped).
    Empty,
    /// The buffer matches the most recently committed version.
    Loaded,
    /// The buffer has changes which are not committed yet.
    Modified,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub state: State,
    pub data_size: usize,
    pub bitmap_size: usize,
    /// Versions fitting into the sector before it has to be erased.
    pub slots: usize,
    /// 1-based index of the slot holding the current version.
    pub current_slot: Option<usize>,
    pub percent_used: Option<u8>,
}

/// Emulates a byte addressable EEPROM on top of a single flash sector.
///
/// Every commit appends a full copy of the buffer to the sector and flips one bit in a bitmap
/// to mark it as the newest. The sector is only erased once it is full, which keeps the number
/// of erase cycles low for small buffers.
pub struct Eeprom<T: Platform> {
    pub(crate) flash: SectorFlash<T>,
    pub(crate) min_size: usize,
    pub(crate) session: Option<Session>,
}

impl<T: Platform> Eeprom<T> {
    /// Creates an uninitialized EEPROM in `config.sector`. The flash is not accessed until
    /// [`Self::initialize`].
    pub fn new(hal: T, config: Config) -> Result<Eeprom<T>, Error> {
        Ok(Self {
            flash: SectorFlash::new(hal, config.sector)?,
            min_size: config.min_size,
            session: None,
        })
    }

    /// Allocates a buffer of `size` bytes (rounded up, see [`Layout::compute`]) and loads the
    /// most recent version from flash.
    ///
    /// If the sector was written with a different size, is corrupt or can't be read, the
    /// buffer starts out zeroed and the sector is re-laid out on the first commit. Only an
    /// invalid size is reported; in that case the current session is kept as is.
    pub fn initialize(&mut self, size: usize) -> Result<(), Error> {
        let layout = Layout::compute(size, SectorFlash::<T>::size(), self.min_size)?;

        #[cfg(feature = "defmt")]
        trace!("initialize: {} -> {}", size, layout.data_size());

        self.session = Some(Self::load_session(&mut self.flash, layout));
        Ok(())
    }

    /// Reads a byte from the buffer. Out of range addresses read as zero.
    pub fn read(&self, address: usize) -> u8 {
        self.session
            .as_ref()
            .and_then(|session| session.data.get(address).copied())
            .unwrap_or(0)
    }

    /// Writes a byte to the buffer. Out of range addresses are ignored. The buffer is only
    /// marked as modified if the value actually changes.
    pub fn write(&mut self, address: usize, value: u8) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match session.data.get_mut(address) {
            Some(byte) if *byte != value => {
                *byte = value;
                session.dirty = true;
            }
            _ => {}
        }
    }

    /// Reads a fixed width value stored little endian at `address`.
    ///
    /// Returns `None` if the value doesn't fit into the buffer.
    pub fn get<R>(&self, address: usize) -> Option<R>
    where
        Eeprom<T>: Get<R>,
    {
        Get::get(self, address)
    }

    /// Stores a value little endian at `address`. Values not fitting into the buffer are
    /// ignored.
    pub fn put<R>(&mut self, address: usize, value: R)
    where
        Eeprom<T>: Put<R>,
    {
        Put::put(self, address, value)
    }

    /// Writes the buffer to flash if it was modified since the last commit.
    ///
    /// On failure the previous version stays current (unless the sector was already erased)
    /// and the buffer stays modified, so the commit can be retried.
    pub fn commit(&mut self) -> Result<(), Error> {
        let session = self.session.as_mut().ok_or(Error::NotInitialized)?;
        if !session.dirty {
            return Ok(());
        }

        match Self::write_version(&mut self.flash, session) {
            Ok(()) => {
                session.dirty = false;
                Ok(())
            }
            Err(_e) => {
                #[cfg(feature = "defmt")]
                warn!("commit failed: {}", _e);

                Err(_e)
            }
        }
    }

    /// Commits the buffer into slot 1 of a freshly erased sector, even if it is unchanged and
    /// there is room left.
    pub fn commit_reset(&mut self) -> Result<(), Error> {
        let session = self.session.as_mut().ok_or(Error::NotInitialized)?;
        let previous = session.cursor;
        session.cursor = Cursor::Reset;
        session.dirty = true;

        let result = self.commit();
        if result.is_err() {
            // the sector wasn't erased, so the previous version is still valid
            if let Some(session) = self.session.as_mut().filter(|s| s.cursor == Cursor::Reset) {
                session.cursor = previous;
            }
        }
        result
    }

    /// Erases the sector. Header and bitmap are written by the next commit.
    ///
    /// The buffer is kept. Unless it is all zeros (what an empty sector loads as) it no longer
    /// matches the flash and is marked as modified.
    pub fn wipe(&mut self) -> Result<(), Error> {
        let session = self.session.as_mut().ok_or(Error::NotInitialized)?;

        self.flash.erase()?;
        session.cursor = Cursor::Absent;
        if session.data.iter().any(|&byte| byte != 0) {
            session.dirty = true;
        }
        Ok(())
    }

    /// How much of the sector is used up, in percent. `None` until a version was committed or
    /// found in flash.
    pub fn percent_used(&self) -> Option<u8> {
        self.session.as_ref().and_then(Session::percent_used)
    }

    /// Commits pending changes and releases the buffer. A failing commit is logged but
    /// otherwise ignored.
    pub fn teardown(&mut self) {
        if self.session.is_none() {
            return;
        }

        if let Err(_e) = self.commit() {
            #[cfg(feature = "defmt")]
            warn!("teardown: changes lost: {}", _e);

            #[cfg(feature = "debug-logs")]
            println!("teardown: changes lost: {_e:?}");
        }
        self.session = None;
    }

    /// Size of the buffer, 0 while uninitialized.
    pub fn len(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, |session| session.layout.data_size())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The whole buffer, empty while uninitialized.
    pub fn as_bytes(&self) -> &[u8] {
        self.session
            .as_ref()
            .map(|session| session.data.as_slice())
            .unwrap_or(&[])
    }

    pub fn state(&self) -> State {
        self.session
            .as_ref()
            .map_or(State::Uninitialized, Session::state)
    }

    /// The layout of the current session.
    pub fn layout(&self) -> Option<Layout> {
        self.session.as_ref().map(|session| session.layout)
    }

    /// Size of the backing sector, given by the erase size of the flash.
    pub fn sector_size(&self) -> usize {
        SectorFlash::<T>::size()
    }

    pub fn statistics(&self) -> Statistics {
        match self.session.as_ref() {
            None => Statistics {
                state: State::Uninitialized,
                data_size: 0,
                bitmap_size: 0,
                slots: 0,
                current_slot: None,
                percent_used: None,
            },
            Some(session) => Statistics {
                state: session.state(),
                data_size: session.layout.data_size(),
                bitmap_size: session.layout.bitmap_size(),
                slots: session.layout.slot_count(),
                current_slot: session.current_slot(),
                percent_used: session.percent_used(),
            },
        }
    }

    /// Drops the buffer without committing and hands back the flash.
    pub fn release(self) -> T {
        self.flash.hal
    }

    /// Borrows `len` bytes of the buffer starting at `address`.
    pub(crate) fn bytes(&self, address: usize, len: usize) -> Option<&[u8]> {
        let session = self.session.as_ref()?;
        let end = address.checked_add(len)?;
        session.data.get(address..end)
    }

    /// Copies `bytes` into the buffer at `address` if they fit and differ.
    pub(crate) fn store(&mut self, address: usize, bytes: &[u8]) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(end) = address.checked_add(bytes.len()) else {
            return;
        };
        let Some(target) = session.data.get_mut(address..end) else {
            return;
        };

        if target != bytes {
            target.copy_from_slice(bytes);
            session.dirty = true;
        }
    }
}
