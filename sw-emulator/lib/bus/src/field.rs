/*++

Licensed under the Apache-2.0 license.

File Name:

    field.rs

Abstract:

    File contains the bit-field building block of the register core: access
    modes, bit ranges and field declarations with their hooks.

--*/

use bitflags::bitflags;
use soc_emu_types::BusAddr;
use tock_registers::RegisterLongName;

bitflags! {
    /// Access semantics of a field.
    ///
    /// A mode carries at most one read side effect and at most one write
    /// behaviour. A field without any write flag ignores writes; a field
    /// without any read flag reads as zero.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldMode: u16 {
        const READ = 1 << 0;
        const READ_TO_CLEAR = 1 << 1;
        const READ_TO_SET = 1 << 2;
        const WRITE = 1 << 3;
        const SET = 1 << 4;
        const TOGGLE = 1 << 5;
        const WRITE_ONE_TO_CLEAR = 1 << 6;
        const WRITE_ZERO_TO_CLEAR = 1 << 7;
        const WRITE_ZERO_TO_SET = 1 << 8;
        const WRITE_ZERO_TO_TOGGLE = 1 << 9;
        const WRITE_TO_CLEAR = 1 << 10;
        const WRITE_TO_SET = 1 << 11;

        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

impl FieldMode {
    pub const READ_ONLY: Self = Self::READ;
    pub const WRITE_ONLY: Self = Self::WRITE;

    fn read_side_effects() -> Self {
        Self::READ_TO_CLEAR | Self::READ_TO_SET
    }

    fn write_behaviours() -> Self {
        Self::WRITE
            | Self::SET
            | Self::TOGGLE
            | Self::WRITE_ONE_TO_CLEAR
            | Self::WRITE_ZERO_TO_CLEAR
            | Self::WRITE_ZERO_TO_SET
            | Self::WRITE_ZERO_TO_TOGGLE
            | Self::WRITE_TO_CLEAR
            | Self::WRITE_TO_SET
    }

    pub fn is_readable(self) -> bool {
        self.intersects(Self::READ | Self::read_side_effects())
    }

    pub fn is_writable(self) -> bool {
        self.intersects(Self::write_behaviours())
    }

    /// At most one write behaviour and one read side effect.
    pub fn is_valid(self) -> bool {
        (self & Self::write_behaviours()).bits().count_ones() <= 1
            && (self & Self::read_side_effects()).bits().count_ones() <= 1
    }

    /// Value of a field after `written` hits it while it holds `old`.
    /// All values are field-local (shifted down to bit 0) and `mask` covers
    /// the field width.
    pub fn apply_write(self, old: u64, written: u64, mask: u64) -> u64 {
        let written = written & mask;
        let new = if self.contains(Self::WRITE) {
            written
        } else if self.contains(Self::SET) {
            old | written
        } else if self.contains(Self::TOGGLE) {
            old ^ written
        } else if self.contains(Self::WRITE_ONE_TO_CLEAR) {
            old & !written
        } else if self.contains(Self::WRITE_ZERO_TO_CLEAR) {
            old & written
        } else if self.contains(Self::WRITE_ZERO_TO_SET) {
            old | (!written & mask)
        } else if self.contains(Self::WRITE_ZERO_TO_TOGGLE) {
            old ^ (!written & mask)
        } else if self.contains(Self::WRITE_TO_CLEAR) {
            0
        } else if self.contains(Self::WRITE_TO_SET) {
            mask
        } else {
            old
        };
        new & mask
    }

    /// Bit pattern that leaves `current` unchanged when written. Used to fill
    /// the bits of a field not covered by a narrow access.
    pub fn neutral_value(self, current: u64, mask: u64) -> u64 {
        if self.intersects(Self::SET | Self::TOGGLE | Self::WRITE_ONE_TO_CLEAR) {
            0
        } else if self.intersects(
            Self::WRITE_ZERO_TO_CLEAR | Self::WRITE_ZERO_TO_SET | Self::WRITE_ZERO_TO_TOGGLE,
        ) {
            mask
        } else {
            current & mask
        }
    }

    /// Value of a field after a read returned `old`.
    pub fn apply_read(self, old: u64, mask: u64) -> u64 {
        if self.contains(Self::READ_TO_CLEAR) {
            0
        } else if self.contains(Self::READ_TO_SET) {
            mask
        } else {
            old
        }
    }
}

/// A contiguous bit slice of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitRange {
    pub position: u32,
    pub width: u32,
}

impl BitRange {
    pub const fn new(position: u32, width: u32) -> Self {
        Self { position, width }
    }

    pub const fn bit(position: u32) -> Self {
        Self::new(position, 1)
    }

    /// One past the most significant bit
    pub fn end(&self) -> u32 {
        self.position + self.width
    }

    /// Mask of the field width, not shifted
    pub fn mask(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1 << self.width) - 1
        }
    }

    /// Mask of the field at its position in the register
    pub fn register_mask(&self) -> u64 {
        if self.position >= 64 {
            0
        } else {
            self.mask() << self.position
        }
    }

    pub fn extract(&self, value: u64) -> u64 {
        if self.position >= 64 {
            0
        } else {
            (value >> self.position) & self.mask()
        }
    }

    pub fn insert(&self, into: u64, value: u64) -> u64 {
        let mask = self.register_mask();
        if mask == 0 {
            return into;
        }
        (into & !mask) | ((value << self.position) & mask)
    }

    pub fn overlaps(&self, other: &BitRange) -> bool {
        self.position < other.end() && other.position < self.end()
    }
}

impl From<(u32, u32)> for BitRange {
    /// `(position, width)`
    fn from((position, width): (u32, u32)) -> Self {
        Self::new(position, width)
    }
}

macro_rules! bit_range_from_tock_field {
    ($($t:ty),*) => {$(
        impl<R: RegisterLongName> From<tock_registers::fields::Field<$t, R>> for BitRange {
            fn from(field: tock_registers::fields::Field<$t, R>) -> Self {
                Self::new(field.shift as u32, field.mask.count_ones())
            }
        }
    )*};
}

bit_range_from_tock_field!(u8, u16, u32, u64);

/// Field callback receiving the peripheral state plus `(old, new)`
pub type FieldCallback<C> = Box<dyn FnMut(&mut C, u64, u64) + Send>;

/// Supplies the live value of a field from peripheral state. Receives the
/// currently stored value.
pub type ValueProvider<C> = Box<dyn FnMut(&mut C, u64) -> u64 + Send>;

/// Produces the value a bus read returns, performing the side effect of the
/// read (popping a FIFO, taking a lock). Receives the current value.
pub type ReadProvider<C> = Box<dyn FnMut(&mut C, u64) -> u64 + Send>;

/// A named bit slice of a register with its access mode and optional hooks.
///
/// `C` is the peripheral state handed to every hook.
pub struct Field<C> {
    pub(crate) name: &'static str,
    pub(crate) bits: BitRange,
    pub(crate) mode: FieldMode,
    pub(crate) value_provider: Option<ValueProvider<C>>,
    pub(crate) read_provider: Option<ReadProvider<C>>,
    pub(crate) read_callback: Option<FieldCallback<C>>,
    pub(crate) write_callback: Option<FieldCallback<C>>,
    pub(crate) change_callback: Option<FieldCallback<C>>,
}

impl<C> Field<C> {
    pub fn new(bits: impl Into<BitRange>, mode: FieldMode, name: &'static str) -> Self {
        Self {
            name,
            bits: bits.into(),
            mode,
            value_provider: None,
            read_provider: None,
            read_callback: None,
            write_callback: None,
            change_callback: None,
        }
    }

    /// Single read/write bit
    pub fn flag(position: u32, name: &'static str) -> Self {
        Self::new(BitRange::bit(position), FieldMode::READ_WRITE, name)
    }

    /// Read/write multi-bit value
    pub fn value(position: u32, width: u32, name: &'static str) -> Self {
        Self::new(BitRange::new(position, width), FieldMode::READ_WRITE, name)
    }

    pub fn with_mode(mut self, mode: FieldMode) -> Self {
        self.mode = mode;
        self
    }

    /// Make the field reflect live peripheral state. The provider must be
    /// free of side effects: it runs before every read and peek, and before
    /// writes when the field is writable. Its result replaces the stored
    /// value.
    pub fn with_value_provider(
        mut self,
        provider: impl FnMut(&mut C, u64) -> u64 + Send + 'static,
    ) -> Self {
        self.value_provider = Some(Box::new(provider));
        self
    }

    /// Supply the value of bus reads only. Runs after the value providers of
    /// the register on every read; peeks and writes never call it.
    pub fn with_read_provider(
        mut self,
        provider: impl FnMut(&mut C, u64) -> u64 + Send + 'static,
    ) -> Self {
        self.read_provider = Some(Box::new(provider));
        self
    }

    /// Invoked after every read of the register with the value before and
    /// after read side effects.
    pub fn on_read(mut self, callback: impl FnMut(&mut C, u64, u64) + Send + 'static) -> Self {
        self.read_callback = Some(Box::new(callback));
        self
    }

    /// Invoked on every write touching the field with the old value and the
    /// written slice, after the change callback.
    pub fn on_write(mut self, callback: impl FnMut(&mut C, u64, u64) + Send + 'static) -> Self {
        self.write_callback = Some(Box::new(callback));
        self
    }

    /// Invoked when a read or write changes the stored value.
    pub fn on_change(mut self, callback: impl FnMut(&mut C, u64, u64) + Send + 'static) -> Self {
        self.change_callback = Some(Box::new(callback));
        self
    }

    /// Bind the field to peripheral state: `get` supplies the value and `set`
    /// receives every change the field's mode produces.
    pub fn backed_by(
        self,
        mut get: impl FnMut(&mut C) -> u64 + Send + 'static,
        mut set: impl FnMut(&mut C, u64) + Send + 'static,
    ) -> Self {
        self.with_value_provider(move |ctx, _| get(ctx))
            .on_change(move |ctx, _, new| set(ctx, new))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn bits(&self) -> BitRange {
        self.bits
    }

    pub fn mode(&self) -> FieldMode {
        self.mode
    }
}

/// Location of a field inside a register collection, for peripheral code
/// that inspects or updates stored field values outside of callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub offset: BusAddr,
    pub bits: BitRange,
}

impl FieldRef {
    pub const fn new(offset: BusAddr, position: u32, width: u32) -> Self {
        Self {
            offset,
            bits: BitRange::new(position, width),
        }
    }

    pub fn at(offset: BusAddr, bits: impl Into<BitRange>) -> Self {
        Self {
            offset,
            bits: bits.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tock_registers::register_bitfields;

    register_bitfields! [
        u32,
        Control [
            ENABLE OFFSET(0) NUMBITS(1) [],
            MODE OFFSET(4) NUMBITS(3) [
                Idle = 0,
                Busy = 5,
            ],
        ]
    ];

    #[test]
    fn test_bit_range_from_tock_field() {
        assert_eq!(BitRange::from(Control::ENABLE), BitRange::new(0, 1));
        assert_eq!(BitRange::from(Control::MODE), BitRange::new(4, 3));
    }

    #[test]
    fn test_bit_range_extract_insert() {
        let bits = BitRange::new(4, 3);
        assert_eq!(bits.register_mask(), 0x70);
        assert_eq!(bits.extract(0xffff_ffd5), 0x5);
        assert_eq!(bits.insert(0xffff_ffff, 0x2), 0xffff_ffaf);
        assert_eq!(bits.insert(0, 0xff), 0x70);
    }

    #[test]
    fn test_bit_range_full_width() {
        let bits = BitRange::new(0, 64);
        assert_eq!(bits.mask(), u64::MAX);
        assert_eq!(bits.extract(0xdead_beef_0123_4567), 0xdead_beef_0123_4567);
    }

    #[test]
    fn test_bit_range_overlap() {
        assert!(BitRange::new(1, 5).overlaps(&BitRange::new(0, 2)));
        assert!(!BitRange::new(2, 2).overlaps(&BitRange::new(0, 2)));
        assert!(!BitRange::new(0, 2).overlaps(&BitRange::new(2, 1)));
    }

    #[test]
    fn test_write_modes() {
        let mask = 0xf;
        assert_eq!(FieldMode::READ_WRITE.apply_write(0b1010, 0b0110, mask), 0b0110);
        assert_eq!(FieldMode::READ_ONLY.apply_write(0b1010, 0b0110, mask), 0b1010);
        assert_eq!(FieldMode::SET.apply_write(0b1010, 0b0110, mask), 0b1110);
        assert_eq!(FieldMode::TOGGLE.apply_write(0b1010, 0b0110, mask), 0b1100);
        assert_eq!(
            FieldMode::WRITE_ONE_TO_CLEAR.apply_write(0b1010, 0b0110, mask),
            0b1000
        );
        assert_eq!(
            FieldMode::WRITE_ZERO_TO_CLEAR.apply_write(0b1010, 0b0110, mask),
            0b0010
        );
        assert_eq!(
            FieldMode::WRITE_ZERO_TO_SET.apply_write(0b1010, 0b0110, mask),
            0b1011
        );
        assert_eq!(
            FieldMode::WRITE_ZERO_TO_TOGGLE.apply_write(0b1010, 0b0110, mask),
            0b0011
        );
        assert_eq!(FieldMode::WRITE_TO_CLEAR.apply_write(0b1010, 0, mask), 0);
        assert_eq!(FieldMode::WRITE_TO_SET.apply_write(0b1010, 0, mask), 0xf);
    }

    #[test]
    fn test_neutral_value_leaves_field_unchanged() {
        let mask = 0xff;
        for mode in [
            FieldMode::READ_WRITE,
            FieldMode::SET,
            FieldMode::TOGGLE,
            FieldMode::READ | FieldMode::WRITE_ONE_TO_CLEAR,
            FieldMode::READ | FieldMode::WRITE_ZERO_TO_CLEAR,
            FieldMode::WRITE_ZERO_TO_SET,
            FieldMode::WRITE_ZERO_TO_TOGGLE,
        ] {
            let neutral = mode.neutral_value(0xa5, mask);
            assert_eq!(mode.apply_write(0xa5, neutral, mask), 0xa5, "{mode:?}");
        }
    }

    #[test]
    fn test_mode_validity() {
        assert!(FieldMode::READ_WRITE.is_valid());
        assert!((FieldMode::READ_TO_CLEAR | FieldMode::WRITE_ONE_TO_CLEAR).is_valid());
        assert!(!(FieldMode::WRITE | FieldMode::TOGGLE).is_valid());
        assert!(!(FieldMode::READ_TO_CLEAR | FieldMode::READ_TO_SET).is_valid());
        assert!(!FieldMode::WRITE_ONLY.is_readable());
        assert!(!FieldMode::READ_ONLY.is_writable());
        assert!(FieldMode::READ_TO_SET.is_readable());
    }
}
