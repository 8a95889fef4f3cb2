//! Pre-allocated transfer buffer.

use alloc::boxed::Box;
use alloc::vec;

/// One fixed-capacity transfer buffer.
///
/// Allocated once by the pool and never freed individually. Whoever holds
/// the value owns the bytes; the pool tracks where it is by `index`.
pub struct TransferBuffer {
    data: Box<[u8]>,
    index: u16,
}

impl TransferBuffer {
    pub(crate) fn new(capacity: usize, index: u16) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            index,
        }
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl core::fmt::Debug for TransferBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransferBuffer")
            .field("index", &self.index)
            .field("capacity", &self.data.len())
            .finish()
    }
}
