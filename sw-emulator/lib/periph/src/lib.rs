/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the SoC Emulator Peripheral library.

--*/
pub mod clock_gen;
pub mod crc;
pub mod hw_semaphore;
pub mod interrupt_aggregator;
pub mod rng;
pub mod window_mmu;

pub use clock_gen::{SystemClock, XtalOscillator};
pub use crc::{crc, CrcEngine, CrcError, CrcParams};
pub use hw_semaphore::{HwSemaphore, HwSemaphoreArgs, Semaphore};
pub use interrupt_aggregator::{InterruptAggregator, InterruptAggregatorArgs};
pub use rng::{Rng, RngArgs};
pub use window_mmu::{MatchPolicy, MmuFault, Privileges, Window, WindowMmu, WindowMmuArgs};
