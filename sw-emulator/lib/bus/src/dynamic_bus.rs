/*++

Licensed under the Apache-2.0 license.

File Name:

    dynamic_bus.rs

Abstract:

    File contains DynamicBus type.

--*/

use std::ops::RangeInclusive;

use crate::{Bus, BusConfigError, BusError, Peripheral};
use log::debug;
use soc_emu_types::{AccessWidth, BusAddr, BusData};

struct MappedDevice {
    name: String,
    mmap_range: RangeInclusive<BusAddr>,
    dev: Box<dyn Peripheral>,
}

/// A bus that uses dynamic-dispatch to delegate to a runtime-modifiable list
/// of peripherals, ordered by address.
#[derive(Default)]
pub struct DynamicBus {
    devs: Vec<MappedDevice>,
}

impl DynamicBus {
    pub fn new() -> DynamicBus {
        Self { devs: Vec::new() }
    }

    /// Attach the specified device to the bus
    ///
    /// # Arguments
    ///
    /// * `name` - Name used in diagnostics and by `set_line`
    /// * `mmap_range` - Addresses decoded by the device
    /// * `dev` - Device to attach
    ///
    /// # Error
    ///
    /// * `BusConfigError` - The range collides with an attached device or
    ///   does not match the size of the device
    pub fn attach_dev(
        &mut self,
        name: &str,
        mmap_range: RangeInclusive<BusAddr>,
        dev: Box<dyn Peripheral>,
    ) -> Result<(), BusConfigError> {
        let mapped = mmap_range
            .end()
            .wrapping_sub(*mmap_range.start())
            .wrapping_add(1);
        if mmap_range.is_empty() || mapped != dev.size() {
            return Err(BusConfigError::SizeMismatch {
                name: name.into(),
                size: dev.size(),
                mapped,
            });
        }
        let mut index = 0;
        for cur_dev in self.devs.iter() {
            let cur = &cur_dev.mmap_range;
            // Check if the device range overlaps existing device
            if mmap_range.end() >= cur.start() && mmap_range.start() <= cur.end() {
                return Err(BusConfigError::Collision {
                    name: name.into(),
                    start: *mmap_range.start(),
                    end: *mmap_range.end(),
                    other: cur_dev.name.clone(),
                    other_start: *cur.start(),
                    other_end: *cur.end(),
                });
            }
            // Found the position to insert the device
            if mmap_range.start() < cur.start() {
                break;
            }
            index += 1;
        }
        debug!(
            "attached {name} at {:#010x}-{:#010x}",
            mmap_range.start(),
            mmap_range.end()
        );
        self.devs.insert(
            index,
            MappedDevice {
                name: name.into(),
                mmap_range,
                dev,
            },
        );
        Ok(())
    }

    /// Drive input `line` of the device attached as `name`.
    ///
    /// # Error
    ///
    /// * `BusConfigError::UnknownDevice` - No device is attached as `name`
    /// * `BusConfigError::NotALineReceiver` - The device has no input lines
    pub fn set_line(&mut self, name: &str, line: usize, value: bool) -> Result<(), BusConfigError> {
        let dev = self
            .devs
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| BusConfigError::UnknownDevice(name.into()))?;
        let receiver = dev
            .dev
            .as_line_receiver()
            .ok_or_else(|| BusConfigError::NotALineReceiver(name.into()))?;
        receiver.on_line(line, value);
        Ok(())
    }

    fn find(&mut self, addr: BusAddr) -> Option<&mut MappedDevice> {
        self.devs.iter_mut().find(|d| d.mmap_range.contains(&addr))
    }
}

impl Bus for DynamicBus {
    fn read(&mut self, size: AccessWidth, addr: BusAddr) -> Result<BusData, BusError> {
        match self.find(addr) {
            Some(dev) => dev.dev.read(size, addr - dev.mmap_range.start()),
            None => Err(BusError::LoadAccessFault),
        }
    }

    fn write(&mut self, size: AccessWidth, addr: BusAddr, val: BusData) -> Result<(), BusError> {
        match self.find(addr) {
            Some(dev) => dev.dev.write(size, addr - dev.mmap_range.start(), val),
            None => Err(BusError::StoreAccessFault),
        }
    }

    /// Reset every device in ascending address order
    fn reset(&mut self) {
        for dev in self.devs.iter_mut() {
            dev.dev.reset();
        }
    }

    fn poll(&mut self) {
        for dev in self.devs.iter_mut() {
            dev.dev.poll();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{BusError, LineReceiver, Ram};

    #[test]
    fn test_dynamic_bus_read() {
        let mut bus = DynamicBus::new();
        let ram = Ram::new(vec![1, 2]);
        bus.attach_dev("RAM0", 1..=2, Box::new(ram)).unwrap();
        assert_eq!(bus.read(AccessWidth::Byte, 1).ok(), Some(1));
        assert_eq!(bus.read(AccessWidth::Byte, 2).ok(), Some(2));
        assert_eq!(
            bus.read(AccessWidth::Byte, 3).err(),
            Some(BusError::LoadAccessFault),
        );
    }

    #[test]
    fn test_dynamic_bus_write() {
        let mut bus = DynamicBus::new();
        let ram = Ram::new(vec![1, 2]);
        bus.attach_dev("RAM0", 1..=2, Box::new(ram)).unwrap();
        assert_eq!(bus.write(AccessWidth::Byte, 1, 3).ok(), Some(()));
        assert_eq!(bus.read(AccessWidth::Byte, 1).ok(), Some(3));
        assert_eq!(bus.write(AccessWidth::Byte, 2, 4).ok(), Some(()));
        assert_eq!(bus.read(AccessWidth::Byte, 2).ok(), Some(4));
        assert_eq!(
            bus.write(AccessWidth::Byte, 3, 0).err(),
            Some(BusError::StoreAccessFault),
        );
    }

    fn is_sorted<T>(slice: &[T]) -> bool
    where
        T: Ord,
    {
        slice.windows(2).all(|s| s[0] <= s[1])
    }

    #[test]
    fn test_attach_dev() {
        let mut bus = DynamicBus::new();
        // Attach valid devices
        bus.attach_dev("RAM0", 1..=2, Box::new(Ram::new(vec![1, 2])))
            .unwrap();
        bus.attach_dev("RAM1", 0..=0, Box::new(Ram::new(vec![1])))
            .unwrap();
        bus.attach_dev("RAM2", 3..=3, Box::new(Ram::new(vec![1])))
            .unwrap();

        // Try inserting devices whose address maps overlap existing devices
        let err = bus
            .attach_dev("RAM3", 1..=1, Box::new(Ram::new(vec![1])))
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Address space for device RAM3 (0x00000001-0x00000001) collides with device RAM0 (0x00000001-0x00000002)");

        let err = bus
            .attach_dev("RAM4", 2..=2, Box::new(Ram::new(vec![1])))
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Address space for device RAM4 (0x00000002-0x00000002) collides with device RAM0 (0x00000001-0x00000002)");

        let addrs: Vec<BusAddr> = bus
            .devs
            .iter()
            .flat_map(|d| [*d.mmap_range.start(), *d.mmap_range.end()])
            .collect();
        assert_eq!(addrs.len(), 6);
        assert!(is_sorted(&addrs));
    }

    #[test]
    fn test_attach_dev_size_mismatch() {
        let mut bus = DynamicBus::new();
        assert_eq!(
            bus.attach_dev("RAM0", 0..=7, Box::new(Ram::new(vec![0; 4]))),
            Err(BusConfigError::SizeMismatch {
                name: "RAM0".into(),
                size: 4,
                mapped: 8
            })
        );
    }

    struct Button {
        ram: Ram,
        pressed: Vec<(usize, bool)>,
    }

    impl Bus for Button {
        fn read(&mut self, size: AccessWidth, addr: BusAddr) -> Result<BusData, BusError> {
            self.ram.read(size, addr)
        }

        fn write(&mut self, size: AccessWidth, addr: BusAddr, val: BusData) -> Result<(), BusError> {
            self.ram.write(size, addr, val)
        }

        fn reset(&mut self) {
            self.pressed.clear();
        }
    }

    impl LineReceiver for Button {
        fn on_line(&mut self, line: usize, value: bool) {
            self.pressed.push((line, value));
        }
    }

    impl Peripheral for Button {
        fn size(&self) -> BusAddr {
            self.ram.mmap_size()
        }

        fn as_line_receiver(&mut self) -> Option<&mut dyn LineReceiver> {
            Some(self)
        }
    }

    #[test]
    fn test_set_line_requires_line_receiver() {
        let mut bus = DynamicBus::new();
        bus.attach_dev("RAM0", 0..=3, Box::new(Ram::new(vec![0; 4])))
            .unwrap();
        let button = Button {
            ram: Ram::new(vec![0; 4]),
            pressed: Vec::new(),
        };
        bus.attach_dev("BUTTON", 0x10..=0x13, Box::new(button))
            .unwrap();

        assert_eq!(bus.set_line("BUTTON", 2, true), Ok(()));
        assert_eq!(
            bus.set_line("RAM0", 0, true),
            Err(BusConfigError::NotALineReceiver("RAM0".into()))
        );
        assert_eq!(
            bus.set_line("GPIO", 0, true),
            Err(BusConfigError::UnknownDevice("GPIO".into()))
        );
    }
}
