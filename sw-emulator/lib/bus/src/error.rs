/*++

Licensed under the Apache-2.0 license.

File Name:

    error.rs

Abstract:

    File contains the construction-time error types of the register core and
    the dynamic bus.

--*/

use soc_emu_types::{AccessWidth, BusAddr};
use thiserror::Error;

/// A malformed register or register collection declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("`{name}` (bits {position}..{end}) does not fit in a {register_bits}-bit register")]
    OutOfRange {
        name: &'static str,
        position: u32,
        end: u32,
        register_bits: u32,
    },

    #[error("`{name}` has zero width")]
    ZeroWidth { name: &'static str },

    #[error("`{name}` overlaps `{other}`")]
    Overlap {
        name: &'static str,
        other: &'static str,
    },

    #[error("field `{name}` combines more than one write or read side effect")]
    ConflictingModes { name: &'static str },

    #[error("allowed value {value:#x} of tag `{name}` does not fit in {width} bits")]
    AllowedValueTooWide {
        name: &'static str,
        value: u64,
        width: u32,
    },

    #[error("register at {offset:#x} is {found} wide but the collection is {expected}")]
    WidthMismatch {
        offset: BusAddr,
        found: AccessWidth,
        expected: AccessWidth,
    },

    #[error("register offset {offset:#x} is not aligned to {width}")]
    Misaligned { offset: BusAddr, width: AccessWidth },

    #[error("register offset {offset:#x} is already defined")]
    Duplicate { offset: BusAddr },

    #[error("invalid register bank: {0}")]
    InvalidBank(&'static str),
}

/// A bus wiring mistake detected while assembling a system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusConfigError {
    #[error("Address space for device {name} ({start:#010x}-{end:#010x}) collides with device {other} ({other_start:#010x}-{other_end:#010x})")]
    Collision {
        name: String,
        start: BusAddr,
        end: BusAddr,
        other: String,
        other_start: BusAddr,
        other_end: BusAddr,
    },

    #[error("device {name} decodes {size:#x} bytes but was mapped onto {mapped:#x} bytes")]
    SizeMismatch {
        name: String,
        size: BusAddr,
        mapped: BusAddr,
    },

    #[error("no device named {0}")]
    UnknownDevice(String),

    #[error("device {0} does not receive input lines")]
    NotALineReceiver(String),
}
