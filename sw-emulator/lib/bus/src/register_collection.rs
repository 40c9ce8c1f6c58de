/*++

Licensed under the Apache-2.0 license.

File Name:

    register_collection.rs

Abstract:

    File contains the RegisterCollection type mapping offsets to registers of
    one native width.

--*/

use std::collections::BTreeMap;

use crate::{
    field::FieldRef,
    register::{AliasOp, Register},
    translation::{AllowedTranslations, Endianness, NativeAccess, Translator},
    RegisterError,
};
use log::warn;
use soc_emu_types::{AccessWidth, BusAddr, BusData};

/// Address-to-register map of one peripheral.
///
/// `C` is the peripheral state handed to every field and register callback.
/// The collection does not own it; peripherals keep their state next to the
/// collection and pass it in on every access.
pub struct RegisterCollection<C> {
    name: &'static str,
    width: AccessWidth,
    registers: BTreeMap<BusAddr, Register<C>>,
    translator: Translator,
    alias_stride: Option<BusAddr>,
}

impl<C> RegisterCollection<C> {
    pub fn new(name: &'static str, width: AccessWidth) -> Self {
        Self {
            name,
            width,
            registers: BTreeMap::new(),
            translator: Translator::default(),
            alias_stride: None,
        }
    }

    /// Accept accesses of other widths than the native one
    pub fn with_translations(
        mut self,
        allowed: AllowedTranslations,
        endianness: Endianness,
    ) -> Self {
        self.translator = Translator::new(allowed, endianness);
        self
    }

    /// Mirror every register at `stride`, `2 * stride` and `3 * stride` as
    /// set, clear and toggle aliases.
    pub fn with_aliases(mut self, stride: BusAddr) -> Self {
        self.alias_stride = Some(stride);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn width(&self) -> AccessWidth {
        self.width
    }

    /// Number of bytes decoded by the collection, aliases included
    pub fn span(&self) -> BusAddr {
        let end = self
            .registers
            .keys()
            .next_back()
            .map_or(0, |offset| offset + self.width.bytes() as BusAddr);
        match self.alias_stride {
            Some(stride) => 4 * stride.max(end),
            None => end,
        }
    }

    /// Add `register` at `offset`.
    ///
    /// # Error
    ///
    /// * `RegisterError` - The register is malformed or does not fit the
    ///   collection at `offset`
    pub fn define(&mut self, offset: BusAddr, mut register: Register<C>) -> Result<(), RegisterError> {
        if !self.width.is_aligned(offset) {
            return Err(RegisterError::Misaligned {
                offset,
                width: self.width,
            });
        }
        if register.width() != self.width {
            return Err(RegisterError::WidthMismatch {
                offset,
                found: register.width(),
                expected: self.width,
            });
        }
        if self.registers.contains_key(&offset) {
            return Err(RegisterError::Duplicate { offset });
        }
        if let Some(stride) = self.alias_stride {
            if offset >= stride {
                return Err(RegisterError::InvalidBank("register inside an alias window"));
            }
        }
        register.validate()?;
        register.attach(self.name, offset);
        self.registers.insert(offset, register);
        Ok(())
    }

    /// Define `count` registers starting at `base`, `stride` bytes apart.
    /// `builder` receives an empty register of the native width and the
    /// index of the register in the bank.
    pub fn define_many(
        &mut self,
        base: BusAddr,
        count: usize,
        stride: BusAddr,
        mut builder: impl FnMut(Register<C>, usize) -> Register<C>,
    ) -> Result<(), RegisterError> {
        if count > 1 && stride < self.width.bytes() as BusAddr {
            return Err(RegisterError::InvalidBank("stride narrower than the register width"));
        }
        for index in 0..count {
            let register = builder(Register::new(self.width, 0), index);
            self.define(base + index as BusAddr * stride, register)?;
        }
        Ok(())
    }

    pub fn contains(&self, offset: BusAddr) -> bool {
        self.registers.contains_key(&self.width.align_down(offset))
    }

    pub fn register(&self, offset: BusAddr) -> Option<&Register<C>> {
        self.registers.get(&self.width.align_down(offset))
    }

    /// Native read, `None` if no register is defined at `offset`
    pub fn try_read(&mut self, ctx: &mut C, offset: BusAddr) -> Option<u64> {
        self.registers
            .get_mut(&self.width.align_down(offset))
            .map(|register| register.read(ctx))
    }

    /// Native write, `false` if no register is defined at `offset`
    pub fn try_write(&mut self, ctx: &mut C, offset: BusAddr, value: u64) -> bool {
        self.try_write_masked(ctx, offset, value, u64::MAX)
    }

    pub fn try_write_masked(&mut self, ctx: &mut C, offset: BusAddr, value: u64, lane: u64) -> bool {
        match self.registers.get_mut(&self.width.align_down(offset)) {
            Some(register) => {
                register.write_masked(ctx, value, lane);
                true
            }
            None => false,
        }
    }

    /// Native read. An unmapped offset is logged and reads as zero.
    pub fn read(&mut self, ctx: &mut C, offset: BusAddr) -> u64 {
        match self.try_read(ctx, offset) {
            Some(value) => value,
            None => {
                self.unhandled(self.width, offset, None);
                0
            }
        }
    }

    /// Native write. A write to an unmapped offset is logged and dropped.
    pub fn write(&mut self, ctx: &mut C, offset: BusAddr, value: u64) {
        if !self.try_write(ctx, offset, value) {
            self.unhandled(self.width, offset, Some(value));
        }
    }

    /// Readable value of a register without read side effects
    pub fn peek(&mut self, ctx: &mut C, offset: BusAddr) -> Option<u64> {
        self.registers
            .get_mut(&self.width.align_down(offset))
            .map(|register| register.peek(ctx))
    }

    /// Stored value of a register, value providers are not consulted
    pub fn value(&self, offset: BusAddr) -> Option<u64> {
        self.register(offset).map(|register| register.value())
    }

    /// Restore every register to its reset value, in ascending offset order.
    /// No callbacks are invoked.
    pub fn reset(&mut self) {
        for register in self.registers.values_mut() {
            register.reset();
        }
    }

    /// Stored value of a field, zero if its register is not defined
    pub fn field(&self, field: FieldRef) -> u64 {
        self.register(field.offset)
            .map_or(0, |register| register.field_value(field.bits))
    }

    /// Overwrite the stored value of a field without invoking callbacks
    pub fn set_field(&mut self, field: FieldRef, value: u64) {
        match self.registers.get_mut(&self.width.align_down(field.offset)) {
            Some(register) => register.set_field_value(field.bits, value),
            None => warn!(
                "{}: field at {:#x} set but no register is defined there",
                self.name, field.offset
            ),
        }
    }

    /// Bus-facing read of `size` at `offset`, translating widths and
    /// resolving alias windows. Unhandled accesses are logged and read as 0.
    pub fn read_access(&mut self, ctx: &mut C, size: AccessWidth, offset: BusAddr) -> BusData {
        let (base, _) = self.split_alias(offset);
        let translator = self.translator;
        let mut bound = BoundCollection {
            width: self.width,
            registers: &mut self.registers,
            ctx,
        };
        match translator.read(&mut bound, size, base) {
            Some(value) => value,
            None => {
                self.unhandled(size, offset, None);
                0
            }
        }
    }

    /// Bus-facing write of `size` at `offset`. Unhandled accesses are logged
    /// and dropped.
    pub fn write_access(&mut self, ctx: &mut C, size: AccessWidth, offset: BusAddr, value: BusData) {
        let handled = match self.split_alias(offset) {
            (base, Some(op)) => self.write_alias(ctx, size, base, value, op),
            (base, None) => {
                let translator = self.translator;
                let mut bound = BoundCollection {
                    width: self.width,
                    registers: &mut self.registers,
                    ctx,
                };
                translator.write(&mut bound, size, base, value)
            }
        };
        if !handled {
            self.unhandled(size, offset, Some(value));
        }
    }

    fn split_alias(&self, offset: BusAddr) -> (BusAddr, Option<AliasOp>) {
        let Some(stride) = self.alias_stride.filter(|s| *s > 0) else {
            return (offset, None);
        };
        let alias = match offset / stride {
            1 => AliasOp::Set,
            2 => AliasOp::Clear,
            3 => AliasOp::Toggle,
            _ => return (offset, None),
        };
        (offset % stride, Some(alias))
    }

    fn write_alias(
        &mut self,
        ctx: &mut C,
        size: AccessWidth,
        base: BusAddr,
        value: BusData,
        op: AliasOp,
    ) -> bool {
        let native = self.width;
        let (offset, shift, lane) = if size == native {
            (native.align_down(base), 0, native.mask())
        } else if size.bytes() < native.bytes() {
            match self.translator.lane(native, size, base) {
                Some(lane) => (lane.offset, lane.shift, lane.mask),
                None => return false,
            }
        } else {
            return false;
        };
        let Some(register) = self.registers.get_mut(&offset) else {
            return false;
        };
        register.write_alias(ctx, op, value << shift, lane);
        true
    }

    fn unhandled(&self, size: AccessWidth, offset: BusAddr, value: Option<BusData>) {
        match value {
            Some(value) => warn!(
                "{}: unhandled {} write of {:#x} at offset {:#x}",
                self.name, size, value, offset
            ),
            None => warn!(
                "{}: unhandled {} read at offset {:#x}, returning 0",
                self.name, size, offset
            ),
        }
    }
}

/// Registers paired with the peripheral state for one access
struct BoundCollection<'a, C> {
    width: AccessWidth,
    registers: &'a mut BTreeMap<BusAddr, Register<C>>,
    ctx: &'a mut C,
}

impl<C> NativeAccess for BoundCollection<'_, C> {
    fn native_width(&self) -> AccessWidth {
        self.width
    }

    fn read_native(&mut self, offset: BusAddr) -> Option<BusData> {
        let ctx = &mut *self.ctx;
        self.registers
            .get_mut(&self.width.align_down(offset))
            .map(|register| register.read(ctx))
    }

    fn write_native(&mut self, offset: BusAddr, value: BusData, lane: BusData) -> bool {
        match self.registers.get_mut(&self.width.align_down(offset)) {
            Some(register) => {
                register.write_masked(&mut *self.ctx, value, lane);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Field, FieldMode};

    #[derive(Default)]
    struct State {
        events: Vec<&'static str>,
        irq: bool,
    }

    fn collection() -> RegisterCollection<State> {
        let mut regs = RegisterCollection::new("test", AccessWidth::DoubleWord).with_translations(
            AllowedTranslations::BYTE_TO_DOUBLE_WORD | AllowedTranslations::WORD_TO_DOUBLE_WORD,
            Endianness::Little,
        );
        regs.define(
            0x0,
            Register::new(AccessWidth::DoubleWord, 0x1234_5678)
                .with_value_field((0, 32), FieldMode::READ_WRITE, "DATA"),
        )
        .unwrap();
        regs.define(
            0x4,
            Register::new(AccessWidth::DoubleWord, 0)
                .with_field(
                    Field::value(0, 8, "CONFIG")
                        .on_write(|s: &mut State, _, _| s.events.push("CONFIG")),
                )
                .with_flag(8, FieldMode::WRITE_ONE_TO_CLEAR, "PENDING")
                .with_change_callback(|s: &mut State, _, new| s.irq = new & (1 << 8) != 0),
        )
        .unwrap();
        regs
    }

    #[test]
    fn test_define_errors() {
        let mut regs = collection();
        assert_eq!(
            regs.define(0x2, Register::new(AccessWidth::DoubleWord, 0)),
            Err(RegisterError::Misaligned {
                offset: 0x2,
                width: AccessWidth::DoubleWord
            })
        );
        assert_eq!(
            regs.define(0x8, Register::new(AccessWidth::Word, 0)),
            Err(RegisterError::WidthMismatch {
                offset: 0x8,
                found: AccessWidth::Word,
                expected: AccessWidth::DoubleWord
            })
        );
        assert_eq!(
            regs.define(0x4, Register::new(AccessWidth::DoubleWord, 0)),
            Err(RegisterError::Duplicate { offset: 0x4 })
        );
        let bad = Register::new(AccessWidth::DoubleWord, 0)
            .with_field(Field::value(0, 4, "A"))
            .with_field(Field::value(2, 4, "B"));
        assert_eq!(
            regs.define(0x8, bad),
            Err(RegisterError::Overlap {
                name: "B",
                other: "A"
            })
        );
        assert!(!regs.contains(0x8));
    }

    #[test]
    fn test_unmapped_offsets() {
        let mut regs = collection();
        let mut state = State::default();
        assert_eq!(regs.read(&mut state, 0x100), 0);
        regs.write(&mut state, 0x100, 0xffff_ffff);
        assert_eq!(regs.read_access(&mut state, AccessWidth::Byte, 0x101), 0);
        regs.write_access(&mut state, AccessWidth::QuadWord, 0x0, 0);
        assert_eq!(regs.read(&mut state, 0x0), 0x1234_5678);
        assert!(state.events.is_empty());
    }

    #[test]
    fn test_reset_restores_declared_values() {
        let mut regs = collection();
        let mut state = State::default();
        regs.write(&mut state, 0x0, 0xdead_beef);
        regs.write(&mut state, 0x4, 0x42);
        state.events.clear();
        regs.reset();
        assert_eq!(regs.read(&mut state, 0x0), 0x1234_5678);
        assert_eq!(regs.read(&mut state, 0x4), 0);
        assert!(state.events.is_empty());
    }

    #[test]
    fn test_define_many() {
        let mut regs: RegisterCollection<State> =
            RegisterCollection::new("bank", AccessWidth::DoubleWord);
        regs.define_many(0x40, 4, 0x10, |reg, i| {
            reg.with_reset_value(i as u64)
                .with_value_field((0, 8), FieldMode::READ_WRITE, "ENTRY")
        })
        .unwrap();
        let mut state = State::default();
        assert_eq!(regs.read(&mut state, 0x40), 0);
        assert_eq!(regs.read(&mut state, 0x70), 3);
        assert!(!regs.contains(0x44));
        assert_eq!(regs.span(), 0x74);
        assert_eq!(
            regs.define_many(0x80, 2, 2, |reg, _| reg),
            Err(RegisterError::InvalidBank("stride narrower than the register width"))
        );
    }

    #[test]
    fn test_narrow_write_keeps_neighbour_fields() {
        let mut regs = collection();
        let mut state = State::default();
        regs.set_field(FieldRef::new(0x4, 8, 1), 1);

        // Byte 0 only holds CONFIG; the pending flag must survive.
        regs.write_access(&mut state, AccessWidth::Byte, 0x4, 0xff);
        assert_eq!(regs.value(0x4), Some(0x1ff));
        assert_eq!(state.events, ["CONFIG"]);

        // Byte 1 only holds PENDING; CONFIG fires no callback.
        state.events.clear();
        regs.write_access(&mut state, AccessWidth::Byte, 0x5, 0x01);
        assert_eq!(regs.value(0x4), Some(0xff));
        assert!(state.events.is_empty());
        assert!(!state.irq);
    }

    #[test]
    fn test_narrow_reads() {
        let mut regs = collection();
        let mut state = State::default();
        assert_eq!(regs.read_access(&mut state, AccessWidth::Byte, 0x1), 0x56);
        assert_eq!(regs.read_access(&mut state, AccessWidth::Word, 0x2), 0x1234);
        assert_eq!(regs.read_access(&mut state, AccessWidth::Word, 0x1), 0);
    }

    #[test]
    fn test_byte_writes_compose() {
        let mut regs = collection();
        let mut state = State::default();
        for (i, byte) in [0xefu64, 0xbe, 0xad, 0xde].iter().enumerate() {
            regs.write_access(&mut state, AccessWidth::Byte, i as u64, *byte);
        }
        assert_eq!(
            regs.read_access(&mut state, AccessWidth::DoubleWord, 0x0),
            0xdead_beef
        );
    }

    #[test]
    fn test_alias_windows() {
        let mut regs: RegisterCollection<State> =
            RegisterCollection::new("alias", AccessWidth::DoubleWord)
                .with_translations(AllowedTranslations::BYTE_TO_DOUBLE_WORD, Endianness::Little)
                .with_aliases(0x1000);
        regs.define(
            0x8,
            Register::new(AccessWidth::DoubleWord, 0x0f)
                .with_value_field((0, 16), FieldMode::READ_WRITE, "BITS"),
        )
        .unwrap();
        let mut state = State::default();
        regs.write_access(&mut state, AccessWidth::DoubleWord, 0x1008, 0x30);
        assert_eq!(regs.value(0x8), Some(0x3f));
        regs.write_access(&mut state, AccessWidth::DoubleWord, 0x2008, 0x03);
        assert_eq!(regs.value(0x8), Some(0x3c));
        regs.write_access(&mut state, AccessWidth::Byte, 0x3009, 0x01);
        assert_eq!(regs.value(0x8), Some(0x13c));
        assert_eq!(
            regs.read_access(&mut state, AccessWidth::DoubleWord, 0x3008),
            0x13c
        );
        assert_eq!(regs.span(), 0x4000);
        assert_eq!(
            regs.define(0x1000, Register::new(AccessWidth::DoubleWord, 0)),
            Err(RegisterError::InvalidBank("register inside an alias window"))
        );
    }

    #[test]
    fn test_alias_windows_over_flags_and_status() {
        let mut regs: RegisterCollection<State> =
            RegisterCollection::new("alias", AccessWidth::DoubleWord)
                .with_translations(AllowedTranslations::BYTE_TO_DOUBLE_WORD, Endianness::Little)
                .with_aliases(0x1000);
        regs.define(
            0x0,
            Register::new(AccessWidth::DoubleWord, 0x3)
                .with_value_field((0, 8), FieldMode::READ | FieldMode::WRITE_ONE_TO_CLEAR, "IF")
                .with_field(
                    Field::value(8, 8, "STATUS")
                        .with_mode(FieldMode::READ_ONLY)
                        .with_value_provider(|s: &mut State, _| {
                            s.events.push("STATUS");
                            0x5a
                        }),
                )
                .with_change_callback(|s: &mut State, _, new| s.irq = new & 0xff != 0),
        )
        .unwrap();
        let mut state = State::default();

        regs.write_access(&mut state, AccessWidth::DoubleWord, 0x2000, 0x1);
        assert_eq!(regs.value(0x0), Some(0x2));
        regs.write_access(&mut state, AccessWidth::Byte, 0x2000, 0x2);
        assert_eq!(regs.value(0x0), Some(0x0));
        assert!(!state.irq);

        // Set and toggle reach the flags but not the read-only status byte
        regs.write_access(&mut state, AccessWidth::DoubleWord, 0x1000, 0xff80);
        assert_eq!(regs.value(0x0), Some(0x80));
        assert!(state.irq);
        regs.write_access(&mut state, AccessWidth::Byte, 0x3001, 0xff);
        assert_eq!(regs.value(0x0), Some(0x80));
        assert!(state.events.is_empty());

        assert_eq!(regs.read(&mut state, 0x0), 0x5a80);
        assert_eq!(state.events, ["STATUS"]);
    }

    #[test]
    fn test_field_refs() {
        let mut regs = collection();
        let pending = FieldRef::new(0x4, 8, 1);
        assert_eq!(regs.field(pending), 0);
        regs.set_field(pending, 1);
        assert_eq!(regs.field(pending), 1);
        assert_eq!(regs.field(FieldRef::new(0x40, 0, 1)), 0);
    }
}
