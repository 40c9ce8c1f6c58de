/*++

Licensed under the Apache-2.0 license.

File Name:

    ram.rs

Abstract:

    File contains the little-endian RAM device used as backing memory for
    bus-mastering peripherals and in tests.

--*/

use std::ops::Range;

use crate::{Bus, BusError, Peripheral};
use soc_emu_types::{AccessWidth, BusAddr, BusData};

/// Read/write memory device
pub struct Ram {
    data: Vec<u8>,
}

impl Ram {
    /// Create new RAM
    ///
    /// # Arguments
    ///
    /// * `data` - Initial contents; its length is the size of the device
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn mmap_size(&self) -> BusAddr {
        self.data.len() as BusAddr
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes touched by an access of `len` bytes at `addr`, if they all exist
    fn span(&self, addr: BusAddr, len: usize) -> Option<Range<usize>> {
        let start = usize::try_from(addr).ok()?;
        let end = start.checked_add(len)?;
        (end <= self.data.len()).then_some(start..end)
    }
}

impl Bus for Ram {
    /// Read data of specified size from given address
    ///
    /// # Error
    ///
    /// * `BusError` - Exception with cause `BusError::LoadAccessFault`
    fn read(&mut self, size: AccessWidth, addr: BusAddr) -> Result<BusData, BusError> {
        let span = self
            .span(addr, size.bytes())
            .filter(|span| !span.is_empty())
            .ok_or(BusError::LoadAccessFault)?;
        Ok(self.data[span]
            .iter()
            .rev()
            .fold(0, |acc, byte| acc << 8 | BusData::from(*byte)))
    }

    /// Write data of specified size to given address
    ///
    /// # Error
    ///
    /// * `BusError` - Exception with cause `BusError::StoreAccessFault`
    fn write(&mut self, size: AccessWidth, addr: BusAddr, val: BusData) -> Result<(), BusError> {
        let span = self
            .span(addr, size.bytes())
            .filter(|span| !span.is_empty())
            .ok_or(BusError::StoreAccessFault)?;
        for (i, byte) in self.data[span].iter_mut().enumerate() {
            *byte = (val >> (i * 8)) as u8;
        }
        Ok(())
    }

    fn read_bytes(&mut self, addr: BusAddr, buf: &mut [u8]) -> Result<(), BusError> {
        let span = self
            .span(addr, buf.len())
            .ok_or(BusError::LoadAccessFault)?;
        buf.copy_from_slice(&self.data[span]);
        Ok(())
    }
}

impl Peripheral for Ram {
    fn size(&self) -> BusAddr {
        self.mmap_size()
    }
}
