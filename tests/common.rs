#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

pub const FLASH_SECTOR_SIZE: usize = 4096;
pub const SMALL_SECTOR_SIZE: usize = 64;
pub const WORD_SIZE: usize = 4;
pub const HEADER_SIZE: usize = 4;

pub type Flash4k = Flash<FLASH_SECTOR_SIZE>;
pub type Flash64 = Flash<SMALL_SECTOR_SIZE>;

/// RAM backed NOR flash with sectors of `SECTOR` bytes. Writes can only move bits away from the
/// erased value, like real flash.
pub struct Flash<const SECTOR: usize = FLASH_SECTOR_SIZE> {
    pub buf: Vec<u8>,
    pub erased: u8,
    pub fail_after_operation: usize,
    pub fail_operation: Option<usize>,
    pub operations: Vec<Operation>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Read { offset: u32, len: usize },
    Write { offset: u32, len: usize },
    Erase { offset: u32, len: usize },
}

impl<const SECTOR: usize> Flash<SECTOR> {
    pub fn new(sectors: usize) -> Self {
        Self::new_with_fault(sectors, usize::MAX)
    }

    /// Flash which reads 0x00 after an erase and sets bits when programmed.
    pub fn new_erased_low(sectors: usize) -> Self {
        Self {
            buf: vec![0x00u8; SECTOR * sectors],
            erased: 0x00,
            fail_after_operation: usize::MAX,
            fail_operation: None,
            operations: Vec::new(),
        }
    }

    /// Only the operation following `operation` successful ones fails, the retry succeeds.
    pub fn new_with_single_fault(sectors: usize, operation: usize) -> Self {
        Self {
            fail_operation: Some(operation),
            ..Self::new(sectors)
        }
    }

    /// Every operation fails once `fail_after_operation` operations succeeded.
    pub fn new_with_fault(sectors: usize, fail_after_operation: usize) -> Self {
        Self {
            buf: vec![0xffu8; SECTOR * sectors],
            erased: 0xff,
            fail_after_operation,
            fail_operation: None,
            operations: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn sector(&self, index: usize) -> &[u8] {
        &self.buf[index * SECTOR..(index + 1) * SECTOR]
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
    }

    pub fn erases(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Erase { .. }))
            .count()
    }

    pub fn writes(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Write { .. }))
            .count()
    }

    pub fn dump_operations(&self) {
        println!("Operations:");
        for op in &self.operations {
            println!("  {:?}", op);
        }
    }

    fn check_fault(&mut self) -> Result<(), FlashError> {
        let done = self.operations.len();
        let single = self.fail_operation.take_if(|operation| *operation == done);
        if done >= self.fail_after_operation || single.is_some() {
            println!("    flash: FAULT");
            return Err(FlashError);
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct FlashError;

impl NorFlashError for FlashError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

impl<const SECTOR: usize> ErrorType for Flash<SECTOR> {
    type Error = FlashError;
}

impl<const SECTOR: usize> ReadNorFlash for Flash<SECTOR> {
    const READ_SIZE: usize = WORD_SIZE;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::READ_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::READ_SIZE));

        println!(
            "    flash: read:  0x{offset:04X}[0x{:04X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );
        self.check_fault()?;
        self.operations.push(Operation::Read {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        bytes.copy_from_slice(&self.buf[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl<const SECTOR: usize> NorFlash for Flash<SECTOR> {
    const WRITE_SIZE: usize = WORD_SIZE;

    const ERASE_SIZE: usize = SECTOR;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        assert!(from.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(to.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(from < to);

        println!(
            "    flash: erase: {from:04X} - {to:04X} #{:>2}",
            self.operations.len()
        );
        self.check_fault()?;
        self.operations.push(Operation::Erase {
            offset: from,
            len: (to - from) as usize,
        });

        for addr in from..to {
            self.buf[addr as usize] = self.erased;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::WRITE_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::WRITE_SIZE));
        assert!(!bytes.is_empty());

        println!(
            "    flash: write: 0x{offset:04X}[0x{:04X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );
        self.check_fault()?;
        self.operations.push(Operation::Write {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        for (i, &val) in bytes.iter().enumerate() {
            // programming can only move bits away from the erased state
            if self.erased == 0xff {
                self.buf[offset + i] &= val;
            } else {
                self.buf[offset + i] |= val;
            }
        }
        Ok(())
    }
}
