/*++

Licensed under the Apache-2.0 license.

File Name:

    register.rs

Abstract:

    File contains the Register type: an ordered set of fields, tags and
    reserved ranges with a reset value and callback dispatch.

--*/

use crate::{
    field::{BitRange, Field},
    FieldMode, RegisterError,
};
use log::{error, warn};
use soc_emu_types::{AccessWidth, BusAddr};

/// Register callback receiving the peripheral state plus `(old, new)`
pub type RegisterCallback<C> = Box<dyn FnMut(&mut C, u64, u64) + Send>;

struct Tag {
    name: &'static str,
    bits: BitRange,
    allowed: Option<u64>,
}

struct Claim {
    name: &'static str,
    bits: BitRange,
}

/// Operation of a set, clear or toggle alias window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasOp {
    Set,
    Clear,
    Toggle,
}

impl AliasOp {
    fn apply(self, current: u64, operand: u64) -> u64 {
        match self {
            AliasOp::Set => current | operand,
            AliasOp::Clear => current & !operand,
            AliasOp::Toggle => current ^ operand,
        }
    }

    fn applies_to(self, mode: FieldMode) -> bool {
        mode.is_writable() && (mode.is_readable() || self != AliasOp::Clear)
    }

    /// Field-local value the alias presents to `field`
    fn written<C>(self, field: &Field<C>, old: u64, operand: u64) -> u64 {
        let operand = field.bits.extract(operand);
        if field.mode.is_readable() {
            self.apply(field.bits.extract(old), operand)
        } else {
            operand
        }
    }
}

/// A register of a fixed access width.
///
/// Registers are built with a chain of `with_*` calls. Declaration mistakes
/// (overlaps, ranges outside the register) are recorded and reported when the
/// register is defined in a [`crate::RegisterCollection`].
///
/// Bits covered by no field, tag or ignored range behave as reserved bits:
/// they read as zero and writing them is logged.
pub struct Register<C> {
    width: AccessWidth,
    reset_value: u64,
    value: u64,
    fields: Vec<Field<C>>,
    tags: Vec<Tag>,
    claims: Vec<Claim>,
    reserved: u64,
    ignored: u64,
    read_callbacks: Vec<RegisterCallback<C>>,
    write_callbacks: Vec<RegisterCallback<C>>,
    change_callbacks: Vec<RegisterCallback<C>>,
    error: Option<RegisterError>,
    owner: &'static str,
    offset: BusAddr,
}

impl<C> Register<C> {
    pub fn new(width: AccessWidth, reset_value: u64) -> Self {
        let reset_value = reset_value & width.mask();
        Self {
            width,
            reset_value,
            value: reset_value,
            fields: Vec::new(),
            tags: Vec::new(),
            claims: Vec::new(),
            reserved: 0,
            ignored: 0,
            read_callbacks: Vec::new(),
            write_callbacks: Vec::new(),
            change_callbacks: Vec::new(),
            error: None,
            owner: "",
            offset: 0,
        }
    }

    pub fn with_reset_value(mut self, reset_value: u64) -> Self {
        self.reset_value = reset_value & self.width.mask();
        self.value = self.reset_value;
        self
    }

    pub fn with_field(mut self, field: Field<C>) -> Self {
        if !field.mode.is_valid() {
            self.fail(RegisterError::ConflictingModes { name: field.name });
            return self;
        }
        if self.claim(field.name, field.bits) {
            let index = self
                .fields
                .partition_point(|f| f.bits.position < field.bits.position);
            self.fields.insert(index, field);
        }
        self
    }

    /// Single-bit field with the given mode
    pub fn with_flag(self, position: u32, mode: FieldMode, name: &'static str) -> Self {
        self.with_field(Field::new(BitRange::bit(position), mode, name))
    }

    /// Multi-bit field with the given mode
    pub fn with_value_field(
        self,
        bits: impl Into<BitRange>,
        mode: FieldMode,
        name: &'static str,
    ) -> Self {
        self.with_field(Field::new(bits, mode, name))
    }

    /// Placeholder for functionality that is not modelled. Reads as zero,
    /// writes are logged by name.
    pub fn with_tag(mut self, name: &'static str, bits: impl Into<BitRange>) -> Self {
        let bits = bits.into();
        if self.claim(name, bits) {
            self.tags.push(Tag {
                name,
                bits,
                allowed: None,
            });
        }
        self
    }

    pub fn with_tagged_flag(self, name: &'static str, position: u32) -> Self {
        self.with_tag(name, BitRange::bit(position))
    }

    /// Tag that software is expected to write only with `allowed`; other
    /// values are reported as errors.
    pub fn with_tag_allowed(
        mut self,
        name: &'static str,
        bits: impl Into<BitRange>,
        allowed: u64,
    ) -> Self {
        let bits = bits.into();
        if allowed & !bits.mask() != 0 {
            self.fail(RegisterError::AllowedValueTooWide {
                name,
                value: allowed,
                width: bits.width,
            });
            return self;
        }
        if self.claim(name, bits) {
            self.tags.push(Tag {
                name,
                bits,
                allowed: Some(allowed),
            });
        }
        self
    }

    pub fn with_reserved_bits(mut self, position: u32, width: u32) -> Self {
        let bits = BitRange::new(position, width);
        if self.claim("reserved", bits) {
            self.reserved |= bits.register_mask();
        }
        self
    }

    /// Bits without function that still latch the last written value
    pub fn with_ignored_bits(mut self, position: u32, width: u32) -> Self {
        let bits = BitRange::new(position, width);
        if self.claim("ignored", bits) {
            self.ignored |= bits.register_mask();
        }
        self
    }

    pub fn with_read_callback(
        mut self,
        callback: impl FnMut(&mut C, u64, u64) + Send + 'static,
    ) -> Self {
        self.read_callbacks.push(Box::new(callback));
        self
    }

    /// Invoked after the field callbacks of every write, with the old value
    /// and the written value.
    pub fn with_write_callback(
        mut self,
        callback: impl FnMut(&mut C, u64, u64) + Send + 'static,
    ) -> Self {
        self.write_callbacks.push(Box::new(callback));
        self
    }

    /// Invoked after the write callbacks when the stored value changed.
    pub fn with_change_callback(
        mut self,
        callback: impl FnMut(&mut C, u64, u64) + Send + 'static,
    ) -> Self {
        self.change_callbacks.push(Box::new(callback));
        self
    }

    fn fail(&mut self, err: RegisterError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn claim(&mut self, name: &'static str, bits: BitRange) -> bool {
        if bits.width == 0 {
            self.fail(RegisterError::ZeroWidth { name });
            return false;
        }
        if bits.end() > self.width.bits() {
            self.fail(RegisterError::OutOfRange {
                name,
                position: bits.position,
                end: bits.end(),
                register_bits: self.width.bits(),
            });
            return false;
        }
        if let Some(other) = self.claims.iter().find(|c| c.bits.overlaps(&bits)) {
            let other = other.name;
            self.fail(RegisterError::Overlap { name, other });
            return false;
        }
        self.claims.push(Claim { name, bits });
        true
    }

    /// Report the first declaration error, if any.
    pub fn validate(&self) -> Result<(), RegisterError> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub(crate) fn attach(&mut self, owner: &'static str, offset: BusAddr) {
        self.owner = owner;
        self.offset = offset;
    }

    pub fn width(&self) -> AccessWidth {
        self.width
    }

    pub fn reset_value(&self) -> u64 {
        self.reset_value
    }

    /// Stored value, without consulting value providers
    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn field_value(&self, bits: BitRange) -> u64 {
        bits.extract(self.value)
    }

    /// Overwrite part of the stored value without firing callbacks
    pub fn set_field_value(&mut self, bits: BitRange, value: u64) {
        self.value = bits.insert(self.value, value) & self.width.mask();
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field<C>> {
        self.fields.iter()
    }

    /// Bits returned by a read
    pub fn readable_mask(&self) -> u64 {
        self.fields
            .iter()
            .filter(|f| f.mode.is_readable())
            .fold(self.ignored, |mask, f| mask | f.bits.register_mask())
    }

    fn field_mask(&self) -> u64 {
        self.fields
            .iter()
            .fold(self.ignored, |mask, f| mask | f.bits.register_mask())
    }

    /// Restore the declared reset value. No callbacks are invoked.
    pub fn reset(&mut self) {
        self.value = self.reset_value;
    }

    /// Pull live values from the value providers. Writes only consult the
    /// providers of writable fields, whose mode needs the current value.
    fn refresh(&mut self, ctx: &mut C, writable_only: bool) {
        let value = &mut self.value;
        for field in self.fields.iter_mut() {
            if writable_only && !field.mode.is_writable() {
                continue;
            }
            if let Some(provider) = field.value_provider.as_mut() {
                let provided = provider(ctx, field.bits.extract(*value));
                *value = field.bits.insert(*value, provided);
            }
        }
    }

    /// Readable value with value providers applied, without read side
    /// effects or read callbacks.
    pub fn peek(&mut self, ctx: &mut C) -> u64 {
        self.refresh(ctx, false);
        self.value & self.readable_mask()
    }

    pub fn read(&mut self, ctx: &mut C) -> u64 {
        if self.fields.is_empty() && self.ignored == 0 {
            warn!(
                "{}: register {:#x} has no fields, reading as 0",
                self.owner, self.offset
            );
        }
        self.refresh(ctx, false);
        let value = &mut self.value;
        for field in self.fields.iter_mut() {
            if let Some(provider) = field.read_provider.as_mut() {
                let provided = provider(ctx, field.bits.extract(*value));
                *value = field.bits.insert(*value, provided);
            }
        }
        let old = self.value;
        let result = old & self.readable_mask();

        let new = self.fields.iter().fold(old, |value, f| {
            let mode_value = f.mode.apply_read(f.bits.extract(old), f.bits.mask());
            f.bits.insert(value, mode_value)
        });
        self.value = new;

        for field in self.fields.iter_mut() {
            let (field_old, field_new) = (field.bits.extract(old), field.bits.extract(new));
            if let Some(callback) = field.read_callback.as_mut() {
                callback(ctx, field_old, field_new);
            }
            if field_old != field_new {
                if let Some(callback) = field.change_callback.as_mut() {
                    callback(ctx, field_old, field_new);
                }
            }
        }
        for callback in self.read_callbacks.iter_mut() {
            callback(ctx, old, new);
        }
        if old != new {
            for callback in self.change_callbacks.iter_mut() {
                callback(ctx, old, new);
            }
        }
        result
    }

    pub fn write(&mut self, ctx: &mut C, value: u64) {
        self.write_masked(ctx, value, u64::MAX);
    }

    /// Write only the bits selected by `lane`. Fields entirely outside the
    /// lane keep their value and fire no callbacks; bits of a partially
    /// covered field outside the lane are written with a value that leaves
    /// them unchanged. Read-only fields are left untouched.
    pub fn write_masked(&mut self, ctx: &mut C, value: u64, lane: u64) {
        let lane = lane & self.width.mask();
        let value = value & lane;
        self.refresh(ctx, true);
        let old = self.value;

        let mut new = old;
        for field in self.fields.iter() {
            if field.bits.register_mask() & lane == 0 {
                continue;
            }
            let written = written_slice(field, old, value, lane);
            let field_new =
                field
                    .mode
                    .apply_write(field.bits.extract(old), written, field.bits.mask());
            new = field.bits.insert(new, field_new);
        }
        let ignored = self.ignored & lane;
        self.value = ((new & !ignored) | (value & ignored)) & self.width.mask();

        self.report_unhandled_bits(value, lane);
        self.dispatch_write(ctx, old, lane, value | (old & !lane), |field| {
            written_slice(field, old, value, lane)
        });
    }

    /// Apply a set, clear or toggle alias access to the stored value.
    ///
    /// The operation bypasses the write mode of readable fields: a clear
    /// alias clears a write-one-to-clear flag just as it clears a plain bit.
    /// Write-only trigger fields see the operand as a regular write for set
    /// and toggle, and are not touched by clear. Read-only fields never
    /// change.
    pub fn write_alias(&mut self, ctx: &mut C, op: AliasOp, value: u64, lane: u64) {
        let lane = lane & self.width.mask();
        let operand = value & lane;
        self.refresh(ctx, true);
        let old = self.value;

        let lane = self
            .fields
            .iter()
            .filter(|f| !op.applies_to(f.mode))
            .fold(lane, |lane, f| lane & !f.bits.register_mask());
        if lane & self.field_mask() == 0 {
            self.report_unhandled_bits(operand, lane);
            return;
        }

        let mut new = old;
        let mut composed = old;
        for field in self.fields.iter() {
            if field.bits.register_mask() & lane == 0 {
                continue;
            }
            let field_old = field.bits.extract(old);
            let written = op.written(field, old, operand);
            let field_new = if field.mode.is_readable() {
                written
            } else {
                field.mode.apply_write(field_old, written, field.bits.mask())
            };
            new = field.bits.insert(new, field_new);
            composed = field.bits.insert(composed, written);
        }
        let ignored = self.ignored & lane;
        let ignored_new = op.apply(old, operand) & ignored;
        self.value = ((new & !ignored) | ignored_new) & self.width.mask();
        let composed = (composed & !ignored) | ignored_new;

        self.report_unhandled_bits(operand, lane);
        self.dispatch_write(ctx, old, lane, composed, |field| {
            op.written(field, old, operand)
        });
    }

    /// Field and register callbacks of a write that moved the stored value
    /// from `old` to its current value. `written` gives the field-local value
    /// presented to each field touched by `lane`.
    fn dispatch_write(
        &mut self,
        ctx: &mut C,
        old: u64,
        lane: u64,
        composed: u64,
        written: impl Fn(&Field<C>) -> u64,
    ) {
        let new = self.value;
        for field in self.fields.iter_mut() {
            if field.bits.register_mask() & lane == 0 {
                continue;
            }
            let written = written(field);
            let (field_old, field_new) = (field.bits.extract(old), field.bits.extract(new));
            if field_old != field_new {
                if let Some(callback) = field.change_callback.as_mut() {
                    callback(ctx, field_old, field_new);
                }
            }
            if let Some(callback) = field.write_callback.as_mut() {
                callback(ctx, field_old, written);
            }
        }

        for callback in self.write_callbacks.iter_mut() {
            callback(ctx, old, composed);
        }
        if old != new {
            for callback in self.change_callbacks.iter_mut() {
                callback(ctx, old, new);
            }
        }
    }

    fn report_unhandled_bits(&self, value: u64, lane: u64) {
        let stray = value & !self.field_mask();
        for tag in self.tags.iter() {
            if tag.bits.register_mask() & lane == 0 {
                continue;
            }
            let written = tag.bits.extract(value);
            match tag.allowed {
                Some(allowed) if written != allowed => error!(
                    "{}: register {:#x}: tag {} written with {:#x}, only {:#x} is allowed",
                    self.owner, self.offset, tag.name, written, allowed
                ),
                None if written != 0 => warn!(
                    "{}: register {:#x}: unhandled write of {:#x} to tag {}",
                    self.owner, self.offset, written, tag.name
                ),
                _ => {}
            }
        }
        let tag_mask = self
            .tags
            .iter()
            .fold(0, |mask, t| mask | t.bits.register_mask());
        let reserved = stray & self.reserved;
        if reserved != 0 {
            warn!(
                "{}: register {:#x}: write of {:#x} to reserved bits",
                self.owner, self.offset, reserved
            );
        }
        let undeclared = stray & !self.reserved & !tag_mask;
        if undeclared != 0 {
            warn!(
                "{}: register {:#x}: unhandled bits {:#x} written",
                self.owner, self.offset, undeclared
            );
        }
    }
}

/// Field-local value a write of `value` over `lane` presents to `field`.
fn written_slice<C>(field: &Field<C>, old: u64, value: u64, lane: u64) -> u64 {
    let mask = field.bits.mask();
    let field_lane = field.bits.extract(lane);
    let neutral = field
        .mode
        .neutral_value(field.bits.extract(old), mask);
    (field.bits.extract(value) & field_lane) | (neutral & !field_lane & mask)
}
