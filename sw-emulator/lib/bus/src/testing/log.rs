/*++

Licensed under the Apache-2.0 license.

File Name:

    log.rs

Abstract:

    File contains a shared text log for fakes used in unit tests, and a
    logger routing `log` records into it.

--*/
use std::{
    cell::RefCell,
    fmt::Display,
    sync::{Arc, Mutex, MutexGuard, Once, PoisonError},
};

use log::{LevelFilter, Metadata, Record};

/// Line-oriented log that fakes append to and tests inspect.
///
/// Clones share one buffer, and the buffer may be written from any thread,
/// so a fake handed to a peripheral (or to another core's thread) still
/// reports back to the test holding the original.
///
/// ```
/// use soc_emu_bus::testing::Log;
///
/// let log = Log::new();
/// log.clone().push_line("read(AccessWidth::Byte, 0x0)");
/// assert_eq!(log.contents(), "read(AccessWidth::Byte, 0x0)\n");
/// assert_eq!(log.take(), "read(AccessWidth::Byte, 0x0)\n");
/// assert!(log.is_empty());
/// ```
#[derive(Clone, Default)]
pub struct Log {
    buf: Arc<Mutex<String>>,
}

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    fn buf(&self) -> MutexGuard<'_, String> {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `line` followed by a newline
    pub fn push_line(&self, line: impl Display) {
        let mut buf = self.buf();
        buf.push_str(&line.to_string());
        buf.push('\n');
    }

    /// Copy of the log, leaving it untouched
    pub fn contents(&self) -> String {
        self.buf().clone()
    }

    /// Empty the log and return what it held. Useful for asserting on the
    /// most recent actions only.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.buf())
    }

    pub fn is_empty(&self) -> bool {
        self.buf().is_empty()
    }
}

thread_local! {
    static CAPTURE: RefCell<Option<Log>> = const { RefCell::new(None) };
}

struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        CAPTURE.with(|capture| {
            if let Some(log) = capture.borrow().as_ref() {
                log.push_line(format_args!("{} {}", record.level(), record.args()));
            }
        });
    }

    fn flush(&self) {}
}

/// Routes the `log` records of the current thread into a [`Log`], one
/// `LEVEL message` line per record, until dropped.
pub struct LogCapture {
    log: Log,
    previous: Option<Log>,
}

impl LogCapture {
    /// Start capturing. The capturing logger is installed on first use; if
    /// the process already has another logger nothing is captured.
    pub fn start() -> Self {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            static LOGGER: CaptureLogger = CaptureLogger;
            if log::set_logger(&LOGGER).is_ok() {
                log::set_max_level(LevelFilter::Trace);
            }
        });
        let log = Log::new();
        let previous = CAPTURE.with(|capture| capture.replace(Some(log.clone())));
        Self { log, previous }
    }

    pub fn log(&self) -> &Log {
        &self.log
    }
}

impl Drop for LogCapture {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CAPTURE.with(|capture| *capture.borrow_mut() = previous);
    }
}
