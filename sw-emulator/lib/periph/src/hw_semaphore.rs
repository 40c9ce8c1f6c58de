/*++

Licensed under the Apache-2.0 license.

File Name:

    hw_semaphore.rs

Abstract:

    File contains the hardware semaphore: an array of lock entries shared by
    several cores, with 2-step (write) and 1-step (read) locking.

--*/

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError},
};

use log::{debug, info, warn};
use soc_emu_bus::{
    Bus, BusError, Field, FieldMode, FixedInitiator, InitiatorSource, Line, ListenerHandle,
    Listeners, Peripheral, Register, RegisterCollection, RegisterError,
};
use soc_emu_types::{AccessWidth, BusAddr, BusData};

pub const R_OFFSET: BusAddr = 0x000;
pub const RLR_OFFSET: BusAddr = 0x080;
pub const IER_OFFSET: BusAddr = 0x100;
pub const ICR_OFFSET: BusAddr = 0x104;
pub const ISR_OFFSET: BusAddr = 0x108;
pub const MISR_OFFSET: BusAddr = 0x10c;
pub const CR_OFFSET: BusAddr = 0x140;
pub const KEYR_OFFSET: BusAddr = 0x144;

pub const MAX_SEMAPHORES: usize = 32;

const LOCK_BIT: u32 = 31;
const CORE_ID_SHIFT: u32 = 8;
const KEY_SHIFT: u32 = 16;

/// One semaphore entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Semaphore {
    pub locked: bool,
    pub proc_id: u8,
    pub core_id: u8,
}

impl Semaphore {
    /// Register encoding: `PROCID` bits 0..7, `COREID` bits 8..11, `LOCK` bit 31
    pub fn encode(&self) -> u32 {
        u32::from(self.proc_id)
            | (u32::from(self.core_id & 0xf) << CORE_ID_SHIFT)
            | (u32::from(self.locked) << LOCK_BIT)
    }

    pub fn decode(value: u32) -> Self {
        Self {
            locked: value & (1 << LOCK_BIT) != 0,
            proc_id: value as u8,
            core_id: ((value >> CORE_ID_SHIFT) & 0xf) as u8,
        }
    }

    fn held_by(&self, proc_id: u8, core_id: u8) -> bool {
        self.locked && self.proc_id == proc_id && self.core_id == core_id
    }
}

/// Hardware semaphore configuration
pub struct HwSemaphoreArgs {
    /// Number of semaphores, at most 32
    pub count: usize,
    /// Key that `CR` writes must carry to release all semaphores of a core
    pub clear_key: u16,
    /// Identity of the core issuing the current bus access
    pub initiator: Box<dyn InitiatorSource>,
}

impl Default for HwSemaphoreArgs {
    fn default() -> Self {
        Self {
            count: MAX_SEMAPHORES,
            clear_key: 0,
            initiator: Box::new(FixedInitiator(None)),
        }
    }
}

struct SemState {
    entries: Vec<Semaphore>,
    ier: u32,
    isr: u32,
    key: u16,
    reset_key: u16,
    initiator: Box<dyn InitiatorSource>,
    irq: Line,
    /// Level changes of `irq` not yet handed to listeners
    edges: Vec<bool>,
}

impl SemState {
    fn write_lock(&mut self, index: usize, release: bool, proc_id: u8, core_id: u8) -> bool {
        let Some(entry) = self.entries.get_mut(index) else {
            warn!("hw_semaphore: semaphore {index} does not exist");
            return false;
        };
        if release {
            if entry.held_by(proc_id, core_id) {
                *entry = Semaphore::default();
                self.released(index);
                return true;
            }
            if entry.locked {
                warn!(
                    "hw_semaphore: core {core_id} proc {proc_id} cannot release semaphore {index} held by core {} proc {}",
                    entry.core_id, entry.proc_id
                );
            } else {
                info!("hw_semaphore: release of free semaphore {index} ignored");
            }
            return false;
        }
        if !entry.locked {
            *entry = Semaphore {
                locked: true,
                proc_id,
                core_id,
            };
            debug!("hw_semaphore: semaphore {index} locked by core {core_id} proc {proc_id}");
            return true;
        }
        if entry.held_by(proc_id, core_id) {
            return true;
        }
        warn!(
            "hw_semaphore: core {core_id} proc {proc_id} cannot lock semaphore {index} held by core {} proc {}",
            entry.core_id, entry.proc_id
        );
        false
    }

    /// 1-step lock on behalf of the current initiator
    fn read_lock(&mut self, index: usize) -> Option<Semaphore> {
        let entry = *self.entries.get(index)?;
        if entry.locked {
            return Some(entry);
        }
        match self.initiator.current_initiator() {
            Some(initiator) => {
                self.write_lock(index, false, 0, initiator.core_id);
            }
            None => warn!("hw_semaphore: 1-step lock of {index} without an initiating core"),
        }
        self.entries.get(index).copied()
    }

    /// 2-step lock or release through the `R` register
    fn register_write(&mut self, index: usize, value: u32) {
        let request = Semaphore::decode(value);
        if let Some(initiator) = self.initiator.current_initiator() {
            if initiator.core_id != request.core_id {
                warn!(
                    "hw_semaphore: core {} wrote semaphore {index} with COREID {}",
                    initiator.core_id, request.core_id
                );
                return;
            }
        }
        self.write_lock(index, !request.locked, request.proc_id, request.core_id);
    }

    fn clear_core(&mut self, core_id: u8, key: u16) {
        if key != self.key {
            warn!("hw_semaphore: clear of core {core_id} with wrong key {key:#x}");
            return;
        }
        for index in 0..self.entries.len() {
            if self.entries[index].locked && self.entries[index].core_id == core_id {
                self.entries[index] = Semaphore::default();
                self.released(index);
            }
        }
    }

    fn released(&mut self, index: usize) {
        self.isr |= 1 << index;
        self.update_irq();
    }

    fn update_irq(&mut self) {
        let level = self.isr & self.ier != 0;
        if level != self.irq.is_set() {
            self.irq.set(level);
            self.edges.push(level);
        }
    }

    fn reset(&mut self) {
        self.entries
            .iter_mut()
            .for_each(|e| *e = Semaphore::default());
        self.ier = 0;
        self.isr = 0;
        self.key = self.reset_key;
        self.update_irq();
    }
}

struct Inner {
    regs: RegisterCollection<SemState>,
    state: SemState,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking listener must not wedge every core
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Delivers irq edges to listeners once the semaphore state is unlocked.
///
/// Edges caused by a listener calling back into the semaphore are queued and
/// delivered by the running dispatch after that listener returns.
#[derive(Default)]
struct IrqFanout {
    pending: Mutex<VecDeque<bool>>,
    listeners: Mutex<Listeners<bool>>,
}

impl IrqFanout {
    fn queue(&self, edges: Vec<bool>) {
        if !edges.is_empty() {
            guard(&self.pending).extend(edges);
        }
    }

    fn deliver(&self) {
        loop {
            let mut listeners = match self.listeners.try_lock() {
                Ok(listeners) => listeners,
                Err(TryLockError::Poisoned(err)) => err.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };
            loop {
                let next = guard(&self.pending).pop_front();
                let Some(level) = next else { break };
                listeners.notify(level);
            }
            drop(listeners);
            // An edge queued while the listeners were released is ours
            if guard(&self.pending).is_empty() {
                return;
            }
        }
    }
}

/// Hardware semaphore peripheral.
///
/// The peripheral is a shared handle: clones refer to the same semaphores,
/// so every core's bus can own one. Each register access, including its
/// callbacks, runs with the internal lock held. Irq listeners run after the
/// lock is released and may access the semaphore again, but must not
/// subscribe or unsubscribe from inside a notification.
#[derive(Clone)]
pub struct HwSemaphore {
    inner: Arc<Mutex<Inner>>,
    irq: Arc<IrqFanout>,
}

impl HwSemaphore {
    pub const SIZE: BusAddr = 0x200;

    pub fn new(args: HwSemaphoreArgs) -> Result<Self, RegisterError> {
        if args.count == 0 || args.count > MAX_SEMAPHORES {
            return Err(RegisterError::InvalidBank(
                "semaphore count must be between 1 and 32",
            ));
        }
        let mut regs = RegisterCollection::new("hw_semaphore", AccessWidth::DoubleWord);

        regs.define_many(R_OFFSET, args.count, 4, |reg, i| {
            reg.with_field(
                Field::new((0, 8), FieldMode::READ_ONLY, "PROCID")
                    .with_value_provider(move |s: &mut SemState, _| s.entries[i].proc_id.into()),
            )
            .with_field(
                Field::new((CORE_ID_SHIFT, 4), FieldMode::READ_ONLY, "COREID")
                    .with_value_provider(move |s: &mut SemState, _| s.entries[i].core_id.into()),
            )
            .with_reserved_bits(12, 19)
            .with_field(
                Field::new((LOCK_BIT, 1), FieldMode::READ_ONLY, "LOCK")
                    .with_value_provider(move |s: &mut SemState, _| s.entries[i].locked.into()),
            )
            .with_write_callback(move |s: &mut SemState, _, written| {
                s.register_write(i, written as u32)
            })
        })?;

        // Only a bus read of RLR performs the 1-step lock
        regs.define_many(RLR_OFFSET, args.count, 4, |reg, i| {
            reg.with_field(
                Field::new((0, 32), FieldMode::READ_ONLY, "RLR")
                    .with_value_provider(move |s: &mut SemState, _| s.entries[i].encode().into())
                    .with_read_provider(move |s: &mut SemState, _| {
                        s.read_lock(i).map_or(0, |entry| entry.encode().into())
                    }),
            )
        })?;

        regs.define(
            IER_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0)
                .with_field(Field::value(0, 32, "IER").backed_by(
                    |s: &mut SemState| s.ier.into(),
                    |s: &mut SemState, v| s.ier = v as u32,
                ))
                .with_write_callback(|s: &mut SemState, _, _| s.update_irq()),
        )?;
        regs.define(
            ICR_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0)
                .with_field(
                    Field::new((0, 32), FieldMode::WRITE_TO_CLEAR, "ICR")
                        .on_write(|s: &mut SemState, _, written| s.isr &= !(written as u32)),
                )
                .with_write_callback(|s: &mut SemState, _, _| s.update_irq()),
        )?;
        regs.define(
            ISR_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0).with_field(
                Field::new((0, 32), FieldMode::READ_ONLY, "ISR")
                    .with_value_provider(|s: &mut SemState, _| s.isr.into()),
            ),
        )?;
        regs.define(
            MISR_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0).with_field(
                Field::new((0, 32), FieldMode::READ_ONLY, "MISR")
                    .with_value_provider(|s: &mut SemState, _| (s.isr & s.ier).into()),
            ),
        )?;
        regs.define(
            CR_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0)
                .with_reserved_bits(0, 8)
                .with_value_field((CORE_ID_SHIFT, 4), FieldMode::WRITE_TO_CLEAR, "COREID")
                .with_reserved_bits(12, 4)
                .with_value_field((KEY_SHIFT, 16), FieldMode::WRITE_TO_CLEAR, "KEY")
                .with_write_callback(|s: &mut SemState, _, written| {
                    let core_id = ((written >> CORE_ID_SHIFT) & 0xf) as u8;
                    s.clear_core(core_id, (written >> KEY_SHIFT) as u16)
                }),
        )?;
        regs.define(
            KEYR_OFFSET,
            Register::new(AccessWidth::DoubleWord, u64::from(args.clear_key) << KEY_SHIFT)
                .with_reserved_bits(0, 16)
                .with_field(Field::value(KEY_SHIFT, 16, "KEY").backed_by(
                    |s: &mut SemState| s.key.into(),
                    |s: &mut SemState, v| s.key = v as u16,
                )),
        )?;

        let state = SemState {
            entries: vec![Semaphore::default(); args.count],
            ier: 0,
            isr: 0,
            key: args.clear_key,
            reset_key: args.clear_key,
            initiator: args.initiator,
            irq: Line::new("hsem_irq"),
            edges: Vec::new(),
        };
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner { regs, state })),
            irq: Arc::new(IrqFanout::default()),
        })
    }

    /// Run `f` with the state locked, then hand the irq edges it caused to
    /// the listeners.
    fn access<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let result = {
            let mut inner = guard(&self.inner);
            let result = f(&mut inner);
            self.irq.queue(std::mem::take(&mut inner.state.edges));
            result
        };
        self.irq.deliver();
        result
    }

    /// 2-step lock (`release == false`) or release of semaphore `index`.
    /// Returns whether the request was granted.
    pub fn write_lock(&self, index: usize, release: bool, proc_id: u8, core_id: u8) -> bool {
        self.access(|inner| inner.state.write_lock(index, release, proc_id, core_id))
    }

    /// 1-step lock of semaphore `index` for the current initiator. Returns
    /// the entry after the attempt.
    pub fn read_lock(&self, index: usize) -> Option<Semaphore> {
        self.access(|inner| inner.state.read_lock(index))
    }

    pub fn entry(&self, index: usize) -> Option<Semaphore> {
        guard(&self.inner).state.entries.get(index).copied()
    }

    pub fn subscribe_irq(&self, listener: impl FnMut(bool) + Send + 'static) -> ListenerHandle {
        guard(&self.irq.listeners).subscribe(listener)
    }

    pub fn unsubscribe_irq(&self, handle: ListenerHandle) -> bool {
        guard(&self.irq.listeners).unsubscribe(handle)
    }

    pub fn irq_is_set(&self) -> bool {
        guard(&self.inner).state.irq.is_set()
    }

    /// Register read through a shared reference
    pub fn bus_read(&self, size: AccessWidth, addr: BusAddr) -> BusData {
        self.access(|inner| {
            let Inner { regs, state } = inner;
            regs.read_access(state, size, addr)
        })
    }

    /// Register write through a shared reference
    pub fn bus_write(&self, size: AccessWidth, addr: BusAddr, val: BusData) {
        self.access(|inner| {
            let Inner { regs, state } = inner;
            regs.write_access(state, size, addr, val)
        })
    }
}

impl Bus for HwSemaphore {
    fn read(&mut self, size: AccessWidth, addr: BusAddr) -> Result<BusData, BusError> {
        Ok(self.bus_read(size, addr))
    }

    fn write(&mut self, size: AccessWidth, addr: BusAddr, val: BusData) -> Result<(), BusError> {
        self.bus_write(size, addr, val);
        Ok(())
    }

    fn reset(&mut self) {
        self.access(|inner| {
            inner.regs.reset();
            inner.state.reset();
        })
    }
}

impl Peripheral for HwSemaphore {
    fn size(&self) -> BusAddr {
        Self::SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soc_emu_bus::{Initiator, ThreadInitiator};
    use std::sync::atomic::{AtomicBool, Ordering};

    const LOCK: u64 = 1 << LOCK_BIT;

    fn r(proc_id: u64, core_id: u64, lock: bool) -> u64 {
        proc_id | (core_id << CORE_ID_SHIFT) | if lock { LOCK } else { 0 }
    }

    fn semaphore(initiator: Option<Initiator>) -> HwSemaphore {
        HwSemaphore::new(HwSemaphoreArgs {
            count: 4,
            clear_key: 0x1234,
            initiator: Box::new(FixedInitiator(initiator)),
        })
        .unwrap()
    }

    #[test]
    fn test_ownership_scenario() {
        let sem = semaphore(None);
        assert_eq!(sem.entry(0), Some(Semaphore::default()));

        assert!(sem.write_lock(0, false, 5, 3));
        assert_eq!(
            sem.entry(0),
            Some(Semaphore {
                locked: true,
                proc_id: 5,
                core_id: 3
            })
        );
        // Another process may not take it
        assert!(!sem.write_lock(0, false, 7, 3));
        assert_eq!(sem.entry(0).unwrap().proc_id, 5);

        // Wrong credentials do not release
        assert!(!sem.write_lock(0, true, 9, 3));
        assert!(sem.entry(0).unwrap().locked);

        assert!(sem.write_lock(0, true, 5, 3));
        assert_eq!(sem.entry(0), Some(Semaphore::default()));
    }

    #[test]
    fn test_relock_by_owner_succeeds() {
        let sem = semaphore(None);
        assert!(sem.write_lock(1, false, 2, 1));
        assert!(sem.write_lock(1, false, 2, 1));
        assert!(!sem.write_lock(9, false, 2, 1));
        assert!(!sem.write_lock(2, true, 2, 1));
    }

    #[test]
    fn test_two_step_through_registers() {
        let mut sem = semaphore(Some(Initiator::new(3, 0)));
        sem.write(AccessWidth::DoubleWord, R_OFFSET + 4, r(5, 3, true))
            .unwrap();
        assert_eq!(
            sem.read(AccessWidth::DoubleWord, R_OFFSET + 4),
            Ok(r(5, 3, true))
        );

        // A different process on the same core is rejected; state reverts
        sem.write(AccessWidth::DoubleWord, R_OFFSET + 4, r(7, 3, true))
            .unwrap();
        assert_eq!(
            sem.read(AccessWidth::DoubleWord, R_OFFSET + 4),
            Ok(r(5, 3, true))
        );

        // COREID must match the initiating core
        sem.write(AccessWidth::DoubleWord, R_OFFSET + 8, r(1, 2, true))
            .unwrap();
        assert_eq!(sem.read(AccessWidth::DoubleWord, R_OFFSET + 8), Ok(0));

        sem.write(AccessWidth::DoubleWord, R_OFFSET + 4, r(5, 3, false))
            .unwrap();
        assert_eq!(sem.read(AccessWidth::DoubleWord, R_OFFSET + 4), Ok(0));
    }

    #[test]
    fn test_one_step_lock() {
        let mut sem = semaphore(Some(Initiator::new(2, 9)));
        assert_eq!(
            sem.read(AccessWidth::DoubleWord, RLR_OFFSET),
            Ok(r(0, 2, true))
        );
        assert_eq!(
            sem.entry(0),
            Some(Semaphore {
                locked: true,
                proc_id: 0,
                core_id: 2
            })
        );
        // Already held: the read reports the owner
        assert!(sem.write_lock(1, false, 4, 1));
        assert_eq!(
            sem.read(AccessWidth::DoubleWord, RLR_OFFSET + 4),
            Ok(r(4, 1, true))
        );
        assert_eq!(
            sem.read_lock(1),
            Some(Semaphore {
                locked: true,
                proc_id: 4,
                core_id: 1
            })
        );
    }

    #[test]
    fn test_one_step_lock_without_initiator() {
        let mut sem = semaphore(None);
        assert_eq!(sem.read(AccessWidth::DoubleWord, RLR_OFFSET), Ok(0));
        assert!(!sem.entry(0).unwrap().locked);
    }

    #[test]
    fn test_write_to_lock_register_does_not_lock() {
        let mut sem = semaphore(Some(Initiator::new(2, 0)));
        sem.write(AccessWidth::DoubleWord, RLR_OFFSET, 0).unwrap();
        sem.write(AccessWidth::DoubleWord, RLR_OFFSET + 4, r(1, 2, true))
            .unwrap();
        assert_eq!(sem.entry(0), Some(Semaphore::default()));
        assert_eq!(sem.entry(1), Some(Semaphore::default()));

        // Writes to the read-only status registers change nothing either
        sem.write(AccessWidth::DoubleWord, ISR_OFFSET, 0xffff_ffff)
            .unwrap();
        assert_eq!(sem.read(AccessWidth::DoubleWord, ISR_OFFSET), Ok(0));
    }

    #[test]
    fn test_release_interrupt() {
        let mut sem = semaphore(None);
        let seen = Arc::new(AtomicBool::new(false));
        let flag = seen.clone();
        sem.subscribe_irq(move |level| flag.store(level, Ordering::SeqCst));
        sem.write(AccessWidth::DoubleWord, IER_OFFSET, 0b10).unwrap();

        assert!(sem.write_lock(0, false, 1, 1));
        assert!(sem.write_lock(0, true, 1, 1));
        assert_eq!(sem.read(AccessWidth::DoubleWord, ISR_OFFSET), Ok(0b01));
        assert_eq!(sem.read(AccessWidth::DoubleWord, MISR_OFFSET), Ok(0));
        assert!(!sem.irq_is_set());

        assert!(sem.write_lock(1, false, 1, 1));
        assert!(sem.write_lock(1, true, 1, 1));
        assert_eq!(sem.read(AccessWidth::DoubleWord, MISR_OFFSET), Ok(0b10));
        assert!(seen.load(Ordering::SeqCst));

        sem.write(AccessWidth::DoubleWord, ICR_OFFSET, 0b11).unwrap();
        assert_eq!(sem.read(AccessWidth::DoubleWord, ISR_OFFSET), Ok(0));
        assert_eq!(sem.read(AccessWidth::DoubleWord, ICR_OFFSET), Ok(0));
        assert!(!seen.load(Ordering::SeqCst));
    }

    #[test]
    fn test_clear_by_core() {
        let mut sem = semaphore(None);
        assert!(sem.write_lock(0, false, 1, 2));
        assert!(sem.write_lock(1, false, 7, 2));
        assert!(sem.write_lock(2, false, 1, 3));

        // Wrong key
        sem.write(AccessWidth::DoubleWord, CR_OFFSET, (0x4321 << KEY_SHIFT) | (2 << 8))
            .unwrap();
        assert!(sem.entry(0).unwrap().locked);

        sem.write(AccessWidth::DoubleWord, CR_OFFSET, (0x1234 << KEY_SHIFT) | (2 << 8))
            .unwrap();
        assert!(!sem.entry(0).unwrap().locked);
        assert!(!sem.entry(1).unwrap().locked);
        assert!(sem.entry(2).unwrap().locked);
        assert_eq!(sem.read(AccessWidth::DoubleWord, ISR_OFFSET), Ok(0b011));

        // The key itself is programmable
        sem.write(AccessWidth::DoubleWord, KEYR_OFFSET, 0xbeef << KEY_SHIFT)
            .unwrap();
        assert_eq!(
            sem.read(AccessWidth::DoubleWord, KEYR_OFFSET),
            Ok(0xbeef << KEY_SHIFT)
        );
        sem.write(AccessWidth::DoubleWord, CR_OFFSET, (0xbeef << KEY_SHIFT) | (3 << 8))
            .unwrap();
        assert!(!sem.entry(2).unwrap().locked);
    }

    #[test]
    fn test_reset() {
        let mut sem = semaphore(None);
        assert!(sem.write_lock(3, false, 1, 1));
        sem.write(AccessWidth::DoubleWord, KEYR_OFFSET, 0).unwrap();
        sem.reset();
        assert_eq!(sem.entry(3), Some(Semaphore::default()));
        assert_eq!(
            sem.read(AccessWidth::DoubleWord, KEYR_OFFSET),
            Ok(0x1234 << KEY_SHIFT)
        );
    }

    #[test]
    fn test_thread_initiators_share_one_semaphore() {
        let sem = HwSemaphore::new(HwSemaphoreArgs {
            count: 1,
            initiator: Box::new(ThreadInitiator),
            ..Default::default()
        })
        .unwrap();
        let winners: Vec<_> = (1..=4u8)
            .map(|core| {
                let mut sem = sem.clone();
                std::thread::spawn(move || {
                    let _id = ThreadInitiator::enter(Initiator::new(core, 0));
                    let value = sem.read(AccessWidth::DoubleWord, RLR_OFFSET).unwrap();
                    Semaphore::decode(value as u32).core_id == core
                })
            })
            .map(|t| t.join().unwrap())
            .collect();
        assert_eq!(winners.iter().filter(|won| **won).count(), 1);
    }

    #[test]
    fn test_invalid_count() {
        assert!(HwSemaphore::new(HwSemaphoreArgs {
            count: 33,
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn test_irq_listener_may_access_the_semaphore() {
        let sem = semaphore(None);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (sink, handle) = (seen.clone(), sem.clone());
        sem.subscribe_irq(move |level| {
            sink.lock().unwrap().push(level);
            if level {
                handle.bus_write(AccessWidth::DoubleWord, ICR_OFFSET, 0xffff_ffff);
            }
        });
        sem.bus_write(AccessWidth::DoubleWord, IER_OFFSET, 0b1);

        assert!(sem.write_lock(0, false, 1, 1));
        assert!(sem.write_lock(0, true, 1, 1));
        assert_eq!(*seen.lock().unwrap(), [true, false]);
        assert!(!sem.irq_is_set());
        assert_eq!(sem.bus_read(AccessWidth::DoubleWord, ISR_OFFSET), 0);
    }
}
