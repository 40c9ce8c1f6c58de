/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the SoC Emulator Types library.

--*/

mod macros;

/// Widest data word carried by a single bus access
pub type BusData = u64;

/// Bus address, relative to whatever the owner of the bus maps
pub type BusAddr = u64;

emu_enum!(
    /// Bus access width
    #[derive(Debug, Eq, PartialEq, Copy, Clone, Hash)]
    pub AccessWidth;
    usize;
    {
        Byte = 1,
        Word = 2,
        DoubleWord = 4,
        QuadWord = 8,
    };
    Invalid
);

impl AccessWidth {
    /// All valid widths, narrowest first
    pub const ALL: [AccessWidth; 4] = [
        AccessWidth::Byte,
        AccessWidth::Word,
        AccessWidth::DoubleWord,
        AccessWidth::QuadWord,
    ];

    /// Number of bytes moved by an access of this width (0 for `Invalid`)
    pub fn bytes(self) -> usize {
        self.value().unwrap_or(0)
    }

    pub fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }

    /// Mask covering the low `bits()` bits of a `BusData`
    pub fn mask(self) -> BusData {
        match self.bits() {
            0 => 0,
            bits if bits >= 64 => BusData::MAX,
            bits => (1 << bits) - 1,
        }
    }

    /// Align `addr` down to a multiple of this width
    pub fn align_down(self, addr: BusAddr) -> BusAddr {
        match self.bytes() {
            0 => addr,
            bytes => addr & !(bytes as BusAddr - 1),
        }
    }

    pub fn is_aligned(self, addr: BusAddr) -> bool {
        self.align_down(addr) == addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_width_from_bytes() {
        assert_eq!(AccessWidth::from(1usize), AccessWidth::Byte);
        assert_eq!(AccessWidth::from(8usize), AccessWidth::QuadWord);
        assert_eq!(AccessWidth::from(3usize), AccessWidth::Invalid);
        assert_eq!(AccessWidth::Invalid.bytes(), 0);
    }

    #[test]
    fn test_access_width_mask() {
        assert_eq!(AccessWidth::Byte.mask(), 0xff);
        assert_eq!(AccessWidth::Word.mask(), 0xffff);
        assert_eq!(AccessWidth::DoubleWord.mask(), 0xffff_ffff);
        assert_eq!(AccessWidth::QuadWord.mask(), u64::MAX);
        assert_eq!(AccessWidth::Invalid.mask(), 0);
    }

    #[test]
    fn test_access_width_align() {
        assert_eq!(AccessWidth::DoubleWord.align_down(0x17), 0x14);
        assert_eq!(AccessWidth::Word.align_down(0x17), 0x16);
        assert!(AccessWidth::QuadWord.is_aligned(0x40));
        assert!(!AccessWidth::QuadWord.is_aligned(0x44));
    }

    #[test]
    fn test_display() {
        assert_eq!(AccessWidth::DoubleWord.to_string(), "DoubleWord");
        assert_eq!(AccessWidth::Invalid.to_string(), "Invalid");
    }
}
