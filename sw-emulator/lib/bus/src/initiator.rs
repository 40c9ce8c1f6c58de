/*++

Licensed under the Apache-2.0 license.

File Name:

    initiator.rs

Abstract:

    File contains the identity of the core issuing the current bus access.

--*/

use std::cell::Cell;

/// Core and process issuing a bus transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Initiator {
    pub core_id: u8,
    pub proc_id: u8,
}

impl Initiator {
    pub fn new(core_id: u8, proc_id: u8) -> Self {
        Self { core_id, proc_id }
    }
}

/// Resolves the initiator of the access currently being served.
///
/// Returns `None` when the access did not originate from a core context
/// (a debugger poke, a DMA engine).
pub trait InitiatorSource: Send {
    fn current_initiator(&self) -> Option<Initiator>;
}

/// Always reports the same initiator
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedInitiator(pub Option<Initiator>);

impl InitiatorSource for FixedInitiator {
    fn current_initiator(&self) -> Option<Initiator> {
        self.0
    }
}

thread_local! {
    static CURRENT: Cell<Option<Initiator>> = const { Cell::new(None) };
}

/// Per-thread initiator, for systems that run each emulated core on its own
/// thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadInitiator;

impl ThreadInitiator {
    /// Make `initiator` the identity of the calling thread until the returned
    /// guard is dropped.
    pub fn enter(initiator: Initiator) -> InitiatorGuard {
        let previous = CURRENT.with(|current| current.replace(Some(initiator)));
        InitiatorGuard { previous }
    }
}

impl InitiatorSource for ThreadInitiator {
    fn current_initiator(&self) -> Option<Initiator> {
        CURRENT.with(|current| current.get())
    }
}

/// Restores the previous thread identity on drop
#[must_use]
pub struct InitiatorGuard {
    previous: Option<Initiator>,
}

impl Drop for InitiatorGuard {
    fn drop(&mut self) {
        CURRENT.with(|current| current.set(self.previous));
    }
}
