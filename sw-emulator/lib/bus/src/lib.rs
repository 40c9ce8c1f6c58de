/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the SoC Emulator Bus library.

--*/
mod bus;
mod dynamic_bus;
mod error;
mod field;
mod initiator;
mod line;
mod ram;
mod register;
mod register_collection;
mod translation;

pub mod testing;

pub use crate::bus::{Bus, BusError, Peripheral};
pub use crate::dynamic_bus::DynamicBus;
pub use crate::error::{BusConfigError, RegisterError};
pub use crate::field::{
    BitRange, Field, FieldCallback, FieldMode, FieldRef, ReadProvider, ValueProvider,
};
pub use crate::initiator::{
    FixedInitiator, Initiator, InitiatorGuard, InitiatorSource, ThreadInitiator,
};
pub use crate::line::{Line, LineReceiver, ListenerHandle, Listeners};
pub use crate::ram::Ram;
pub use crate::register::{AliasOp, Register, RegisterCallback};
pub use crate::register_collection::RegisterCollection;
pub use crate::translation::{AllowedTranslations, Endianness, Lane, NativeAccess, Translator};
