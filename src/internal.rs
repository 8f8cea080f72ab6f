use crate::bitmap::{Polarity, VersionBitmap};
use crate::error::Error;
use crate::layout::Layout;
use crate::platform::Platform;
use crate::raw::{BITMAP_OFFSET, Header, SectorFlash, WORD_SIZE};
use crate::{Eeprom, State};
use alloc::vec;
use alloc::vec::Vec;
#[cfg(feature = "defmt")]
use defmt::{debug, trace, warn};

/// Position of the most recently committed version within the sector.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum Cursor {
    /// The sector holds no structurally valid version.
    Absent,
    /// Sector offset of the current slot.
    At(usize),
    /// The next commit erases and re-lays out the sector regardless of free space.
    Reset,
}

/// Buffers and bookkeeping owned by an initialized EEPROM. Sized once in `initialize` and
/// released in `teardown`.
pub(crate) struct Session {
    pub(crate) layout: Layout,
    pub(crate) data: Vec<u8>,
    pub(crate) bitmap: VersionBitmap,
    /// Read back of the next slot before appending to it.
    scratch: Vec<u8>,
    pub(crate) cursor: Cursor,
    pub(crate) dirty: bool,
}

impl Session {
    fn new(layout: Layout) -> Self {
        Self {
            layout,
            data: vec![0u8; layout.data_size()],
            bitmap: VersionBitmap::new(layout.bitmap_size()),
            scratch: vec![0u8; layout.data_size()],
            cursor: Cursor::Absent,
            dirty: false,
        }
    }

    pub(crate) fn state(&self) -> State {
        match (self.dirty, self.cursor) {
            (true, _) => State::Modified,
            (false, Cursor::At(_)) => State::Loaded,
            (false, _) => State::Empty,
        }
    }

    pub(crate) fn current_slot(&self) -> Option<usize> {
        match self.cursor {
            Cursor::At(offset) if self.layout.contains_slot(offset) => {
                Some(self.layout.slot_index(offset))
            }
            _ => None,
        }
    }

    pub(crate) fn percent_used(&self) -> Option<u8> {
        let slot = self.current_slot()?;
        let percent = (100 * slot / self.layout.slot_count()).min(100);
        Some(percent as u8)
    }
}

impl<T: Platform> Eeprom<T> {
    /// Reads header, bitmap and current version. Anything that doesn't add up results in an
    /// empty session; the flash is not touched until the next commit.
    pub(crate) fn load_session(flash: &mut SectorFlash<T>, layout: Layout) -> Session {
        #[cfg(feature = "defmt")]
        debug!(
            "load_session: data {} bitmap {} slots {}",
            layout.data_size(),
            layout.bitmap_size(),
            layout.slot_count()
        );

        let mut session = Session::new(layout);
        match Self::load_current_version(flash, &mut session) {
            Ok(offset) => {
                #[cfg(feature = "debug-logs")]
                println!("internal: loaded version @{offset:#06x}");

                session.cursor = Cursor::At(offset);
            }
            Err(_e) => {
                #[cfg(feature = "defmt")]
                warn!("load_session: starting empty: {}", _e);

                #[cfg(feature = "debug-logs")]
                println!("internal: starting empty: {_e:?}");

                session.data.fill(0);
                session.cursor = Cursor::Absent;
            }
        }
        session
    }

    fn load_current_version(
        flash: &mut SectorFlash<T>,
        session: &mut Session,
    ) -> Result<usize, Error> {
        let layout = session.layout;

        let header = flash.read_header()?;
        if header.data_size as usize != layout.data_size() {
            return Err(Error::StructureMismatch);
        }

        flash.read(BITMAP_OFFSET, session.bitmap.as_mut_bytes())?;

        let offset = session
            .bitmap
            .locate_current(&layout)
            .filter(|&offset| layout.contains_slot(offset))
            .ok_or(Error::StructureMismatch)?;

        flash.read(offset, &mut session.data)?;
        Ok(offset)
    }

    /// Persists the buffer as a new version, either behind the current one or, if there is no
    /// room left (or no valid structure), in slot 1 of a freshly erased sector.
    ///
    /// The slot behind the current version is only reused while it still reads erased. A torn
    /// append (failed commit or power loss between data and bitmap write) leaves it programmed,
    /// so the next commit re-lays out the sector instead.
    ///
    /// The cursor only moves on success. A failure after the erase leaves it at
    /// [`Cursor::Absent`] as the previous version is gone.
    pub(crate) fn write_version(
        flash: &mut SectorFlash<T>,
        session: &mut Session,
    ) -> Result<(), Error> {
        let layout = session.layout;

        let target = match session.cursor {
            Cursor::At(offset) if layout.can_append(offset) => {
                let next = offset + layout.data_size();
                if Self::slot_is_erased(flash, session, next)? {
                    next
                } else {
                    Self::relayout(flash, session)?
                }
            }
            _ => Self::relayout(flash, session)?,
        };

        #[cfg(feature = "defmt")]
        trace!("write_version: @{:#06x}", target);

        flash.write(target, &session.data)?;

        let word = session.bitmap.mark_used(layout.slot_index(target));
        flash.write(BITMAP_OFFSET + word, session.bitmap.word(word))?;

        session.cursor = Cursor::At(target);
        Ok(())
    }

    fn slot_is_erased(
        flash: &mut SectorFlash<T>,
        session: &mut Session,
        offset: usize,
    ) -> Result<bool, Error> {
        flash.read(offset, &mut session.scratch)?;

        let erased = session.bitmap.polarity().erased_byte();
        let clean = session.scratch.iter().all(|&byte| byte == erased);
        if !clean {
            #[cfg(feature = "defmt")]
            warn!("slot @{:#06x} already programmed", offset);

            #[cfg(feature = "debug-logs")]
            println!("internal: slot @{offset:#06x} already programmed");
        }
        Ok(clean)
    }

    /// Erases the sector and writes a new header. The bitmap is reset to the polarity observed
    /// on the erased flash. Returns the offset of slot 1.
    fn relayout(flash: &mut SectorFlash<T>, session: &mut Session) -> Result<usize, Error> {
        let layout = session.layout;

        #[cfg(feature = "defmt")]
        debug!("relayout: cursor {}", session.cursor);

        #[cfg(feature = "debug-logs")]
        println!("internal: relayout from {:?}", session.cursor);

        flash.erase()?;
        session.cursor = Cursor::Absent;

        flash.write_header(Header {
            data_size: layout.data_size() as u32,
        })?;

        let mut reference = [0u8; WORD_SIZE];
        flash.read(BITMAP_OFFSET, &mut reference)?;
        session.bitmap.reset(Polarity::of(reference[0]));

        Ok(layout.first_slot())
    }
}
