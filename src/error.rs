use thiserror::Error;

/// Errors that can occur during EEPROM operations. Marked as non-exhaustive to allow for future
/// additions without breaking the API. Out-of-range buffer accesses are not part of
/// this list: reads return zero and writes are ignored.
#[derive(Error, Debug, PartialEq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The requested size is zero or does not fit into a single sector next to the header and
    /// the smallest possible bitmap.
    #[error("invalid size")]
    InvalidSize,

    /// The configured sector does not lie within the capacity of the flash device.
    #[error("invalid sector")]
    InvalidSector,

    /// The flash device cannot be driven with 4 byte aligned reads and writes, or its erase
    /// size is too small to hold a header, a bitmap and one data slot.
    #[error("invalid flash geometry")]
    InvalidFlashGeometry,

    /// `initialize` has not been called (or failed), so there is nothing to persist.
    #[error("not initialized")]
    NotInitialized,

    /// The internal error value is returned from the provided `&mut impl NorFlash`
    #[error("internal flash error")]
    FlashError,

    /// Persisted header or bitmap don't match the current configuration. Only used internally,
    /// the session silently continues without prior data.
    #[error("structure mismatch")]
    StructureMismatch,
}
