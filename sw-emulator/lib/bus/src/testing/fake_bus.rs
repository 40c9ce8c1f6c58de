/*++

Licensed under the Apache-2.0 license.

File Name:

    fake_bus.rs

Abstract:

    File contains code for a fake implementation of the Bus trait.

--*/
use soc_emu_types::{AccessWidth, BusAddr, BusData};

use crate::{testing::Log, Bus, BusError};

/// A Bus implementation that logs all calls, and allows the user to override
/// the return value of the methods.
///
/// # Example
///
/// ```
/// use soc_emu_bus::{Bus, testing::FakeBus};
/// use soc_emu_types::AccessWidth;
///
/// let mut fake_bus = FakeBus::new();
/// fake_bus.read_result = Ok(35);
/// assert_eq!(fake_bus.read(AccessWidth::Word, 0xdeadcafe), Ok(35));
/// assert_eq!("read(AccessWidth::Word, 0xdeadcafe)\n", fake_bus.log.take());
/// ```
pub struct FakeBus {
    pub log: Log,
    pub read_result: Result<BusData, crate::BusError>,
    pub write_result: Result<(), crate::BusError>,
}
impl FakeBus {
    pub fn new() -> Self {
        Self {
            log: Log::new(),
            read_result: Ok(0),
            write_result: Ok(()),
        }
    }
}
impl Default for FakeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for FakeBus {
    fn read(&mut self, size: AccessWidth, addr: BusAddr) -> Result<BusData, BusError> {
        self.log
            .push_line(format_args!("read(AccessWidth::{size:?}, {addr:#x})"));
        self.read_result
    }

    fn write(&mut self, size: AccessWidth, addr: BusAddr, val: BusData) -> Result<(), BusError> {
        self.log
            .push_line(format_args!("write(AccessWidth::{size:?}, {addr:#x}, {val:#x})"));
        self.write_result
    }
}
