/*++

Licensed under the Apache-2.0 license.

File Name:

    bus.rs

Abstract:

    File contains definition of the Bus and Peripheral traits.

--*/

use std::{cell::RefCell, rc::Rc};

use crate::LineReceiver;
use soc_emu_types::{AccessWidth, BusAddr, BusData};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BusError {
    /// Load address misaligned exception
    LoadAddrMisaligned,

    /// Load access fault exception
    LoadAccessFault,

    /// Store address misaligned exception
    StoreAddrMisaligned,

    /// Store access fault exception
    StoreAccessFault,
}

/// Represents an abstract memory bus. Used to read and write from RAM and
/// peripheral addresses.
pub trait Bus {
    /// Read data of specified size from given address
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the read
    /// * `addr` - Address to read from
    ///
    /// # Error
    ///
    /// * `BusError` - Exception with cause `BusError::LoadAccessFault` or `BusError::LoadAddrMisaligned`
    fn read(&mut self, size: AccessWidth, addr: BusAddr) -> Result<BusData, BusError>;

    /// Write data of specified size to given address
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the write
    /// * `addr` - Address to write
    /// * `val` - Data to write
    ///
    /// # Error
    ///
    /// * `BusError` - Exception with cause `BusError::StoreAccessFault` or `BusError::StoreAddrMisaligned`
    fn write(&mut self, size: AccessWidth, addr: BusAddr, val: BusData) -> Result<(), BusError>;

    /// Restore the power-on state. Callbacks attached to registers are not
    /// invoked.
    fn reset(&mut self) {
        // By default, do nothing
    }

    /// This method is used to notify peripherals of the passage of time.
    fn poll(&mut self) {
        // By default, do nothing
    }

    /// Fill `buf` with consecutive bytes starting at `addr`.
    ///
    /// # Error
    ///
    /// * `BusError::LoadAccessFault` - Some byte of the range is not readable
    fn read_bytes(&mut self, addr: BusAddr, buf: &mut [u8]) -> Result<(), BusError> {
        for (i, byte) in buf.iter_mut().enumerate() {
            let addr = addr
                .checked_add(i as BusAddr)
                .ok_or(BusError::LoadAccessFault)?;
            *byte = self.read(AccessWidth::Byte, addr)? as u8;
        }
        Ok(())
    }

    /// Write the bytes of `data` to consecutive addresses starting at `addr`.
    ///
    /// # Error
    ///
    /// * `BusError::StoreAccessFault` - Some byte of the range is not writable
    fn write_bytes(&mut self, addr: BusAddr, data: &[u8]) -> Result<(), BusError> {
        for (i, byte) in data.iter().enumerate() {
            let addr = addr
                .checked_add(i as BusAddr)
                .ok_or(BusError::StoreAccessFault)?;
            self.write(AccessWidth::Byte, addr, BusData::from(*byte))?;
        }
        Ok(())
    }
}

/// A device that can be mapped onto a bus.
pub trait Peripheral: Bus {
    /// Size of the address window decoded by the device, in bytes
    fn size(&self) -> BusAddr;

    /// Returns the input-line capability if the device receives external
    /// stimuli.
    fn as_line_receiver(&mut self) -> Option<&mut dyn LineReceiver> {
        None
    }
}

impl<T: Bus + ?Sized> Bus for Box<T> {
    fn read(&mut self, size: AccessWidth, addr: BusAddr) -> Result<BusData, BusError> {
        (**self).read(size, addr)
    }

    fn write(&mut self, size: AccessWidth, addr: BusAddr, val: BusData) -> Result<(), BusError> {
        (**self).write(size, addr, val)
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn poll(&mut self) {
        (**self).poll()
    }
}

/// Shared handle to a bus. A re-entrant access (the device is already busy
/// serving an access on the same call stack) faults instead of panicking.
impl<T: Bus + ?Sized> Bus for Rc<RefCell<T>> {
    fn read(&mut self, size: AccessWidth, addr: BusAddr) -> Result<BusData, BusError> {
        self.try_borrow_mut()
            .map_err(|_| BusError::LoadAccessFault)?
            .read(size, addr)
    }

    fn write(&mut self, size: AccessWidth, addr: BusAddr, val: BusData) -> Result<(), BusError> {
        self.try_borrow_mut()
            .map_err(|_| BusError::StoreAccessFault)?
            .write(size, addr, val)
    }

    fn reset(&mut self) {
        if let Ok(mut bus) = self.try_borrow_mut() {
            bus.reset();
        }
    }

    fn poll(&mut self) {
        if let Ok(mut bus) = self.try_borrow_mut() {
            bus.poll();
        }
    }
}

impl<T: Peripheral + ?Sized> Peripheral for Rc<RefCell<T>> {
    fn size(&self) -> BusAddr {
        self.try_borrow().map_or(0, |dev| dev.size())
    }
}
