/*++

Licensed under the Apache-2.0 license.

File Name:

    mod.rs

Abstract:

    File contains exports for code useful for testing Bus traits and
    peripherals.

--*/
mod fake_bus;
mod line_recorder;
mod log;

pub use fake_bus::FakeBus;
pub use line_recorder::LineRecorder;
pub use self::log::{Log, LogCapture};
