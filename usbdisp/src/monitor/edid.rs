//! Monitor capability block (EDID) retrieval.
//!
//! Bytes are fetched and stored, not parsed. Two sources:
//!
//! - HDMI companion chip: block 0, then as many extension blocks as byte
//!   126 announces (at most 7)
//! - Direct DDC over the adapter I2C controller: block 0 only, read a dword
//!   at a time from address 0x50

use crate::driver::traits::{Clock, HdmiChip, I2cBus};
use crate::error::{HdmiError, I2cError};

pub const EDID_BLOCK_SIZE: usize = 128;

/// Block 0 plus up to 7 extensions.
pub const EDID_MAX_BLOCKS: usize = 8;

/// DDC slave address of the monitor EEPROM.
pub const EDID_I2C_ADDR: u8 = 0x50;

const EXTENSION_COUNT_OFFSET: usize = 126;
const CHECKSUM_OFFSET: usize = 127;

/// Cached raw capability data.
#[derive(Clone, PartialEq, Eq)]
pub struct CapabilityBlock {
    blocks: [[u8; EDID_BLOCK_SIZE]; EDID_MAX_BLOCKS],
    /// Blocks holding data read from the monitor.
    valid: usize,
}

impl Default for CapabilityBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityBlock {
    pub const fn new() -> Self {
        Self {
            blocks: [[0; EDID_BLOCK_SIZE]; EDID_MAX_BLOCKS],
            valid: 0,
        }
    }

    pub fn block(&self, index: usize) -> Option<&[u8; EDID_BLOCK_SIZE]> {
        self.blocks.get(index)
    }

    /// Number of blocks read successfully.
    pub fn valid_blocks(&self) -> usize {
        self.valid
    }

    pub fn is_empty(&self) -> bool {
        self.valid == 0
    }

    /// Extension count announced by block 0 (counts above 7 read as 0).
    pub fn extension_count(&self) -> usize {
        match self.blocks[0][EXTENSION_COUNT_OFFSET] as usize {
            n if n < EDID_MAX_BLOCKS => n,
            _ => 0,
        }
    }

    pub fn clear(&mut self) {
        self.blocks = [[0; EDID_BLOCK_SIZE]; EDID_MAX_BLOCKS];
        self.valid = 0;
    }

    /// Read through the HDMI companion chip.
    pub fn read_from_hdmi(&mut self, chip: &dyn HdmiChip) -> Result<usize, HdmiError> {
        self.clear();

        if let Err(e) = chip.read_edid_block(0, &mut self.blocks[0]) {
            self.blocks[0] = [0; EDID_BLOCK_SIZE];
            return Err(e);
        }
        self.valid = 1;

        for index in 1..=self.extension_count() {
            if let Err(e) = chip.read_edid_block(index as u8, &mut self.blocks[index]) {
                log::warn!("usbdisp: EDID extension {} unreadable: {}", index, e);
                self.blocks[index] = [0; EDID_BLOCK_SIZE];
                break;
            }
            self.valid += 1;
        }

        fix_checksum(&mut self.blocks[0]);
        Ok(self.valid)
    }

    /// Read block 0 over DDC, one dword per transaction with `delay_ms`
    /// between transactions.
    pub fn read_from_i2c(
        &mut self,
        bus: &dyn I2cBus,
        clock: &dyn Clock,
        delay_ms: u32,
    ) -> Result<usize, I2cError> {
        self.clear();

        for offset in (0..EDID_BLOCK_SIZE).step_by(4) {
            let word = match bus.read_dword(EDID_I2C_ADDR, offset as u8) {
                Ok(word) => word,
                Err(e) => {
                    self.blocks[0] = [0; EDID_BLOCK_SIZE];
                    return Err(e);
                }
            };
            self.blocks[0][offset..offset + 4].copy_from_slice(&word.to_le_bytes());
            clock.delay_ms(delay_ms);
        }

        self.valid = 1;
        fix_checksum(&mut self.blocks[0]);
        Ok(self.valid)
    }
}

impl core::fmt::Debug for CapabilityBlock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CapabilityBlock")
            .field("valid", &self.valid)
            .field("extensions", &self.extension_count())
            .finish()
    }
}

/// Rewrite the last byte so the block sums to zero.
fn fix_checksum(block: &mut [u8; EDID_BLOCK_SIZE]) {
    let sum = block[..CHECKSUM_OFFSET]
        .iter()
        .fold(0u8, |acc, b| acc.wrapping_add(*b));
    block[CHECKSUM_OFFSET] = sum.wrapping_neg();
}
