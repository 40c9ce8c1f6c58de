/*++

Licensed under the Apache-2.0 license.

File Name:

    translation.rs

Abstract:

    File contains the width-adaptation layer that serves narrower or wider
    accesses on top of registers of one native width.

--*/

use bitflags::bitflags;
use soc_emu_types::{AccessWidth, BusAddr, BusData};

bitflags! {
    /// Access widths a peripheral accepts besides its native width.
    ///
    /// `X_TO_Y` lets an access of width X reach native registers of width Y.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AllowedTranslations: u16 {
        const BYTE_TO_WORD = 1 << 0;
        const BYTE_TO_DOUBLE_WORD = 1 << 1;
        const BYTE_TO_QUAD_WORD = 1 << 2;
        const WORD_TO_BYTE = 1 << 3;
        const WORD_TO_DOUBLE_WORD = 1 << 4;
        const WORD_TO_QUAD_WORD = 1 << 5;
        const DOUBLE_WORD_TO_BYTE = 1 << 6;
        const DOUBLE_WORD_TO_WORD = 1 << 7;
        const DOUBLE_WORD_TO_QUAD_WORD = 1 << 8;
        const QUAD_WORD_TO_BYTE = 1 << 9;
        const QUAD_WORD_TO_WORD = 1 << 10;
        const QUAD_WORD_TO_DOUBLE_WORD = 1 << 11;
    }
}

impl AllowedTranslations {
    /// The flag naming an `access`-width access served by `native` registers
    pub fn between(access: AccessWidth, native: AccessWidth) -> Option<Self> {
        use AccessWidth::*;
        let flag = match (access, native) {
            (Byte, Word) => Self::BYTE_TO_WORD,
            (Byte, DoubleWord) => Self::BYTE_TO_DOUBLE_WORD,
            (Byte, QuadWord) => Self::BYTE_TO_QUAD_WORD,
            (Word, Byte) => Self::WORD_TO_BYTE,
            (Word, DoubleWord) => Self::WORD_TO_DOUBLE_WORD,
            (Word, QuadWord) => Self::WORD_TO_QUAD_WORD,
            (DoubleWord, Byte) => Self::DOUBLE_WORD_TO_BYTE,
            (DoubleWord, Word) => Self::DOUBLE_WORD_TO_WORD,
            (DoubleWord, QuadWord) => Self::DOUBLE_WORD_TO_QUAD_WORD,
            (QuadWord, Byte) => Self::QUAD_WORD_TO_BYTE,
            (QuadWord, Word) => Self::QUAD_WORD_TO_WORD,
            (QuadWord, DoubleWord) => Self::QUAD_WORD_TO_DOUBLE_WORD,
            _ => return None,
        };
        Some(flag)
    }

    pub fn permits(self, access: AccessWidth, native: AccessWidth) -> bool {
        if access == AccessWidth::Invalid || native == AccessWidth::Invalid {
            return false;
        }
        access == native || Self::between(access, native).map_or(false, |t| self.contains(t))
    }
}

/// Byte order used to place narrow lanes inside a native register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

/// Native-width register storage the translator operates on.
pub trait NativeAccess {
    fn native_width(&self) -> AccessWidth;

    /// Read the native register at `offset`, `None` when nothing is mapped.
    fn read_native(&mut self, offset: BusAddr) -> Option<BusData>;

    /// Write the bits of `value` selected by `lane` to the native register at
    /// `offset`. Returns `false` when nothing is mapped.
    fn write_native(&mut self, offset: BusAddr, value: BusData, lane: BusData) -> bool;
}

/// Position of a narrow access inside its native register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lane {
    /// Offset of the native register
    pub offset: BusAddr,
    /// Bit shift of the lane inside the native register
    pub shift: u32,
    /// Lane mask at its position in the native register
    pub mask: BusData,
}

/// Static width-adaptation configuration of a peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Translator {
    pub allowed: AllowedTranslations,
    pub endianness: Endianness,
}

impl Translator {
    pub fn new(allowed: AllowedTranslations, endianness: Endianness) -> Self {
        Self {
            allowed,
            endianness,
        }
    }

    fn lane_shift(&self, lane_offset: u64, lane_bytes: u64, total_bytes: u64) -> u32 {
        let byte = match self.endianness {
            Endianness::Little => lane_offset,
            Endianness::Big => total_bytes - lane_bytes - lane_offset,
        };
        (byte * 8) as u32
    }

    /// Locate a narrow access of `size` at `offset` inside a native register.
    /// `None` if the translation is not permitted or the access is not
    /// aligned to its own width.
    pub fn lane(&self, native: AccessWidth, size: AccessWidth, offset: BusAddr) -> Option<Lane> {
        if !self.allowed.permits(size, native) || size.bytes() > native.bytes() {
            return None;
        }
        if !size.is_aligned(offset) {
            return None;
        }
        let base = native.align_down(offset);
        let shift = self.lane_shift(
            offset - base,
            size.bytes() as u64,
            native.bytes() as u64,
        );
        Some(Lane {
            offset: base,
            shift,
            mask: size.mask() << shift,
        })
    }

    /// Read `size` bits at `offset`. `None` is an unhandled access.
    pub fn read(
        &self,
        target: &mut dyn NativeAccess,
        size: AccessWidth,
        offset: BusAddr,
    ) -> Option<BusData> {
        let native = target.native_width();
        if size == native {
            return target.read_native(offset);
        }
        if size.bytes() < native.bytes() {
            let lane = self.lane(native, size, offset)?;
            return target
                .read_native(lane.offset)
                .map(|value| (value & lane.mask) >> lane.shift);
        }
        if !self.allowed.permits(size, native) || !native.is_aligned(offset) {
            return None;
        }
        let step = native.bytes() as u64;
        let total = size.bytes() as u64;
        let mut mapped = false;
        let mut result = 0;
        for i in 0..total / step {
            let part = target.read_native(offset + i * step);
            mapped |= part.is_some();
            let shift = self.lane_shift(i * step, step, total);
            result |= (part.unwrap_or(0) & native.mask()) << shift;
        }
        mapped.then_some(result)
    }

    /// Write `size` bits of `value` at `offset`. Returns `false` for an
    /// unhandled access.
    pub fn write(
        &self,
        target: &mut dyn NativeAccess,
        size: AccessWidth,
        offset: BusAddr,
        value: BusData,
    ) -> bool {
        let native = target.native_width();
        if size == native {
            return target.write_native(offset, value, native.mask());
        }
        if size.bytes() < native.bytes() {
            return match self.lane(native, size, offset) {
                Some(lane) => {
                    target.write_native(lane.offset, (value << lane.shift) & lane.mask, lane.mask)
                }
                None => false,
            };
        }
        if !self.allowed.permits(size, native) || !native.is_aligned(offset) {
            return false;
        }
        let step = native.bytes() as u64;
        let total = size.bytes() as u64;
        let mut mapped = false;
        for i in 0..total / step {
            let shift = self.lane_shift(i * step, step, total);
            let part = (value >> shift) & native.mask();
            mapped |= target.write_native(offset + i * step, part, native.mask());
        }
        mapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct Words {
        width: AccessWidth,
        regs: BTreeMap<BusAddr, BusData>,
        writes: Vec<(BusAddr, BusData, BusData)>,
    }

    impl Words {
        fn new(width: AccessWidth, offsets: &[BusAddr]) -> Self {
            Self {
                width,
                regs: offsets.iter().map(|o| (*o, 0)).collect(),
                writes: Vec::new(),
            }
        }
    }

    impl NativeAccess for Words {
        fn native_width(&self) -> AccessWidth {
            self.width
        }

        fn read_native(&mut self, offset: BusAddr) -> Option<BusData> {
            self.regs.get(&offset).copied()
        }

        fn write_native(&mut self, offset: BusAddr, value: BusData, lane: BusData) -> bool {
            self.writes.push((offset, value, lane));
            match self.regs.get_mut(&offset) {
                Some(reg) => {
                    *reg = (*reg & !lane) | (value & lane);
                    true
                }
                None => false,
            }
        }
    }

    fn narrow() -> Translator {
        Translator::new(
            AllowedTranslations::BYTE_TO_DOUBLE_WORD | AllowedTranslations::WORD_TO_DOUBLE_WORD,
            Endianness::Little,
        )
    }

    #[test]
    fn test_permits() {
        let allowed = AllowedTranslations::BYTE_TO_DOUBLE_WORD;
        assert!(allowed.permits(AccessWidth::DoubleWord, AccessWidth::DoubleWord));
        assert!(allowed.permits(AccessWidth::Byte, AccessWidth::DoubleWord));
        assert!(!allowed.permits(AccessWidth::Word, AccessWidth::DoubleWord));
        assert!(!allowed.permits(AccessWidth::DoubleWord, AccessWidth::Byte));
        assert!(!allowed.permits(AccessWidth::Invalid, AccessWidth::Invalid));
    }

    #[test]
    fn test_narrow_read_little_endian() {
        let mut regs = Words::new(AccessWidth::DoubleWord, &[0x4]);
        regs.regs.insert(0x4, 0x4433_2211);
        let t = narrow();
        assert_eq!(t.read(&mut regs, AccessWidth::Byte, 0x4), Some(0x11));
        assert_eq!(t.read(&mut regs, AccessWidth::Byte, 0x7), Some(0x44));
        assert_eq!(t.read(&mut regs, AccessWidth::Word, 0x6), Some(0x4433));
        assert_eq!(t.read(&mut regs, AccessWidth::Word, 0x5), None);
        assert_eq!(t.read(&mut regs, AccessWidth::Byte, 0x8), None);
    }

    #[test]
    fn test_narrow_read_big_endian() {
        let mut regs = Words::new(AccessWidth::DoubleWord, &[0x0]);
        regs.regs.insert(0x0, 0x4433_2211);
        let t = Translator::new(AllowedTranslations::BYTE_TO_DOUBLE_WORD, Endianness::Big);
        assert_eq!(t.read(&mut regs, AccessWidth::Byte, 0x0), Some(0x44));
        assert_eq!(t.read(&mut regs, AccessWidth::Byte, 0x3), Some(0x11));
    }

    #[test]
    fn test_narrow_write_uses_lane_mask() {
        let mut regs = Words::new(AccessWidth::DoubleWord, &[0x0]);
        let t = narrow();
        assert!(t.write(&mut regs, AccessWidth::Byte, 0x2, 0x1ab));
        assert_eq!(regs.writes, [(0x0, 0x00ab_0000, 0x00ff_0000)]);
        assert_eq!(regs.regs[&0x0], 0x00ab_0000);
    }

    #[test]
    fn test_disallowed_width_is_unhandled() {
        let mut regs = Words::new(AccessWidth::DoubleWord, &[0x0]);
        let t = Translator::new(AllowedTranslations::BYTE_TO_DOUBLE_WORD, Endianness::Little);
        assert_eq!(t.read(&mut regs, AccessWidth::Word, 0x0), None);
        assert!(!t.write(&mut regs, AccessWidth::Word, 0x0, 1));
        assert_eq!(t.read(&mut regs, AccessWidth::QuadWord, 0x0), None);
        assert!(regs.writes.is_empty());
    }

    #[test]
    fn test_byte_writes_compose_like_one_native_write() {
        let t = narrow();
        let mut by_bytes = Words::new(AccessWidth::DoubleWord, &[0x10]);
        for (i, byte) in 0xdead_beefu64.to_le_bytes()[..4].iter().enumerate() {
            assert!(t.write(&mut by_bytes, AccessWidth::Byte, 0x10 + i as u64, *byte as u64));
        }
        let mut native = Words::new(AccessWidth::DoubleWord, &[0x10]);
        assert!(t.write(&mut native, AccessWidth::DoubleWord, 0x10, 0xdead_beef));
        assert_eq!(
            t.read(&mut by_bytes, AccessWidth::DoubleWord, 0x10),
            t.read(&mut native, AccessWidth::DoubleWord, 0x10)
        );
    }

    #[test]
    fn test_wide_access_over_byte_registers() {
        let mut regs = Words::new(AccessWidth::Byte, &[0x0, 0x1, 0x3]);
        let t = Translator::new(AllowedTranslations::DOUBLE_WORD_TO_BYTE, Endianness::Little);
        assert!(t.write(&mut regs, AccessWidth::DoubleWord, 0x0, 0x4433_2211));
        assert_eq!(regs.regs[&0x0], 0x11);
        assert_eq!(regs.regs[&0x1], 0x22);
        assert_eq!(regs.regs[&0x3], 0x44);
        assert_eq!(
            t.read(&mut regs, AccessWidth::DoubleWord, 0x0),
            Some(0x4400_2211)
        );
        assert_eq!(t.read(&mut regs, AccessWidth::DoubleWord, 0x8), None);
    }

    #[test]
    fn test_wide_access_big_endian() {
        let mut regs = Words::new(AccessWidth::Word, &[0x0, 0x2]);
        let t = Translator::new(AllowedTranslations::DOUBLE_WORD_TO_WORD, Endianness::Big);
        assert!(t.write(&mut regs, AccessWidth::DoubleWord, 0x0, 0x1122_3344));
        assert_eq!(regs.regs[&0x0], 0x1122);
        assert_eq!(regs.regs[&0x2], 0x3344);
    }
}
