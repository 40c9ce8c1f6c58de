/*++

Licensed under the Apache-2.0 license.

File Name:

    line_recorder.rs

Abstract:

    File contains a listener that records the levels driven on a Line.

--*/
use std::sync::{Arc, Mutex, PoisonError};

use crate::{Line, ListenerHandle};

/// Records every level a `Line` notifies, for assertions in unit tests.
///
/// # Example
///
/// ```
/// use soc_emu_bus::{Line, testing::LineRecorder};
///
/// let mut irq = Line::new("IRQ");
/// let irq_log = LineRecorder::attach(&mut irq);
/// irq.blink();
/// assert_eq!(irq_log.take(), [true, false]);
/// ```
#[derive(Clone, Default)]
pub struct LineRecorder {
    levels: Arc<Mutex<Vec<bool>>>,
}

impl LineRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a new recorder to `line`
    pub fn attach(line: &mut Line) -> Self {
        let recorder = Self::new();
        recorder.subscribe_to(line);
        recorder
    }

    pub fn subscribe_to(&self, line: &mut Line) -> ListenerHandle {
        let levels = self.levels.clone();
        line.subscribe(move |level| {
            levels
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(level)
        })
    }

    /// Returns the recorded levels and clears the record
    pub fn take(&self) -> Vec<bool> {
        std::mem::take(&mut *self.levels.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Last level seen, if any
    pub fn last(&self) -> Option<bool> {
        self.levels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .copied()
    }
}
