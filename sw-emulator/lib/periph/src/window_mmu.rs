/*++

Licensed under the Apache-2.0 license.

File Name:

    window_mmu.rs

Abstract:

    File contains the window MMU: a bank of address windows that remap and
    access-check transactions passing through it.

--*/

use bitflags::bitflags;
use log::{debug, warn};
use soc_emu_bus::{
    Bus, BusError, Field, FieldMode, Line, ListenerHandle, Listeners, Peripheral, Register,
    RegisterCollection, RegisterError,
};
use soc_emu_types::{AccessWidth, BusAddr, BusData};
use thiserror::Error;

pub const WINDOW_STRIDE: BusAddr = 0x10;
pub const START_OFFSET: BusAddr = 0x0;
pub const END_OFFSET: BusAddr = 0x4;
pub const ADDEND_OFFSET: BusAddr = 0x8;
pub const PRIV_OFFSET: BusAddr = 0xc;

pub const FAULT_ADDR_OFFSET: BusAddr = 0x400;
pub const FAULT_STATUS_OFFSET: BusAddr = 0x404;
pub const FAULT_IRQ_EN_OFFSET: BusAddr = 0x408;

/// Windows that fit below the fault registers
pub const MAX_WINDOWS: usize = (FAULT_ADDR_OFFSET / WINDOW_STRIDE) as usize;

const PRIV_ENABLE_BIT: u32 = 31;

bitflags! {
    /// Access types a window permits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Privileges: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXECUTE = 1 << 2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct FaultStatus: u32 {
        const MISS = 1 << 0;
        const PRIVILEGE = 1 << 1;
        const AMBIGUOUS = 1 << 2;
    }
}

/// How a lookup treats an address covered by more than one window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// The lowest-numbered enabled window wins
    #[default]
    FirstMatch,
    /// Overlapping windows fault
    FaultOnOverlap,
}

/// A failed translation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MmuFault {
    #[error("no window maps {0:#010x}")]
    Miss(BusAddr),
    #[error("{access:?} access to {addr:#010x} denied by window {window}")]
    Privilege {
        addr: BusAddr,
        window: usize,
        access: Privileges,
    },
    #[error("{0:#010x} is mapped by more than one window")]
    Ambiguous(BusAddr),
}

impl MmuFault {
    pub fn addr(&self) -> BusAddr {
        match *self {
            MmuFault::Miss(addr) | MmuFault::Ambiguous(addr) => addr,
            MmuFault::Privilege { addr, .. } => addr,
        }
    }

    fn status(&self) -> FaultStatus {
        match self {
            MmuFault::Miss(_) => FaultStatus::MISS,
            MmuFault::Privilege { .. } => FaultStatus::PRIVILEGE,
            MmuFault::Ambiguous(_) => FaultStatus::AMBIGUOUS,
        }
    }
}

/// Address window: `[start, end)` is mapped onto `[start + addend, end + addend)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    pub start: u32,
    pub end: u32,
    pub addend: u32,
    pub privileges: Privileges,
    pub enabled: bool,
}

impl Window {
    pub fn contains(&self, addr: u32) -> bool {
        self.enabled && self.start <= addr && addr < self.end
    }

    /// Translated address. The window space is 32 bits wide and wraps.
    pub fn translate(&self, addr: u32) -> u32 {
        addr.wrapping_add(self.addend)
    }
}

/// Window MMU configuration
pub struct WindowMmuArgs {
    pub windows: usize,
    pub policy: MatchPolicy,
}

impl Default for WindowMmuArgs {
    fn default() -> Self {
        Self {
            windows: 8,
            policy: MatchPolicy::FirstMatch,
        }
    }
}

struct MmuState {
    windows: Vec<Window>,
    policy: MatchPolicy,
    fault_addr: u32,
    fault_status: FaultStatus,
    fault_irq_en: bool,
    irq: Line,
    fault_listeners: Listeners<MmuFault>,
}

impl MmuState {
    fn lookup(&self, addr: BusAddr, access: Privileges) -> Result<BusAddr, MmuFault> {
        let Ok(addr32) = u32::try_from(addr) else {
            return Err(MmuFault::Miss(addr));
        };
        let mut hits = self
            .windows
            .iter()
            .enumerate()
            .filter(|(_, w)| w.contains(addr32));
        let (index, window) = hits.next().ok_or(MmuFault::Miss(addr))?;
        if self.policy == MatchPolicy::FaultOnOverlap && hits.next().is_some() {
            return Err(MmuFault::Ambiguous(addr));
        }
        if !window.privileges.contains(access) {
            return Err(MmuFault::Privilege {
                addr,
                window: index,
                access,
            });
        }
        Ok(window.translate(addr32).into())
    }

    fn record(&mut self, fault: MmuFault) {
        warn!("window_mmu: {fault}");
        self.fault_addr = fault.addr() as u32;
        self.fault_status |= fault.status();
        self.update_irq();
        self.fault_listeners.notify(fault);
    }

    fn update_irq(&mut self) {
        self.irq
            .set(self.fault_irq_en && !self.fault_status.is_empty());
    }

    fn reset(&mut self) {
        self.windows.iter_mut().for_each(|w| *w = Window::default());
        self.fault_addr = 0;
        self.fault_status = FaultStatus::empty();
        self.fault_irq_en = false;
        self.update_irq();
    }
}

/// Window MMU peripheral.
///
/// Window `i` is programmed through `START`, `END`, `ADDEND` and `PRIV` at
/// `i * 0x10`. Transactions are passed through `access_read` and
/// `access_write`.
pub struct WindowMmu {
    regs: RegisterCollection<MmuState>,
    state: MmuState,
}

/// Window word `get`/`set` pair mirrored into `MmuState`
fn window_word(
    reg: Register<MmuState>,
    index: usize,
    name: &'static str,
    get: fn(&Window) -> u32,
    set: fn(&mut Window, u32),
) -> Register<MmuState> {
    reg.with_field(Field::value(0, 32, name).backed_by(
        move |s: &mut MmuState| get(&s.windows[index]).into(),
        move |s: &mut MmuState, v| set(&mut s.windows[index], v as u32),
    ))
}

impl WindowMmu {
    pub const SIZE: BusAddr = 0x800;

    pub fn new(args: WindowMmuArgs) -> Result<Self, RegisterError> {
        if args.windows == 0 || args.windows > MAX_WINDOWS {
            return Err(RegisterError::InvalidBank(
                "window count must be between 1 and 64",
            ));
        }
        let mut regs = RegisterCollection::new("window_mmu", AccessWidth::DoubleWord);

        regs.define_many(START_OFFSET, args.windows, WINDOW_STRIDE, |reg, i| {
            window_word(reg, i, "START", |w| w.start, |w, v| w.start = v)
        })?;
        regs.define_many(END_OFFSET, args.windows, WINDOW_STRIDE, |reg, i| {
            window_word(reg, i, "END", |w| w.end, |w, v| w.end = v)
        })?;
        regs.define_many(ADDEND_OFFSET, args.windows, WINDOW_STRIDE, |reg, i| {
            window_word(reg, i, "ADDEND", |w| w.addend, |w, v| w.addend = v)
        })?;
        regs.define_many(PRIV_OFFSET, args.windows, WINDOW_STRIDE, |reg, i| {
            reg.with_field(Field::value(0, 3, "PRIV").backed_by(
                move |s: &mut MmuState| s.windows[i].privileges.bits().into(),
                move |s: &mut MmuState, v| {
                    s.windows[i].privileges = Privileges::from_bits_truncate(v as u32)
                },
            ))
            .with_reserved_bits(3, 28)
            .with_field(Field::flag(PRIV_ENABLE_BIT, "ENABLE").backed_by(
                move |s: &mut MmuState| s.windows[i].enabled.into(),
                move |s: &mut MmuState, v| s.windows[i].enabled = v != 0,
            ))
        })?;

        regs.define(
            FAULT_ADDR_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0).with_field(
                Field::new((0, 32), FieldMode::READ_ONLY, "FAULT_ADDR")
                    .with_value_provider(|s: &mut MmuState, _| s.fault_addr.into()),
            ),
        )?;
        regs.define(
            FAULT_STATUS_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0)
                .with_field(
                    Field::new(
                        (0, 3),
                        FieldMode::READ | FieldMode::WRITE_ONE_TO_CLEAR,
                        "FAULT_STATUS",
                    )
                    .backed_by(
                        |s: &mut MmuState| s.fault_status.bits().into(),
                        |s: &mut MmuState, v| {
                            s.fault_status = FaultStatus::from_bits_truncate(v as u32)
                        },
                    ),
                )
                .with_write_callback(|s: &mut MmuState, _, _| s.update_irq()),
        )?;
        regs.define(
            FAULT_IRQ_EN_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0)
                .with_field(Field::flag(0, "FAULT_IRQ_EN").backed_by(
                    |s: &mut MmuState| s.fault_irq_en.into(),
                    |s: &mut MmuState, v| s.fault_irq_en = v != 0,
                ))
                .with_write_callback(|s: &mut MmuState, _, _| s.update_irq()),
        )?;

        Ok(Self {
            regs,
            state: MmuState {
                windows: vec![Window::default(); args.windows],
                policy: args.policy,
                fault_addr: 0,
                fault_status: FaultStatus::empty(),
                fault_irq_en: false,
                irq: Line::new("mmu_fault"),
                fault_listeners: Listeners::new(),
            },
        })
    }

    pub fn window(&self, index: usize) -> Option<&Window> {
        self.state.windows.get(index)
    }

    /// Program window `index` directly, bypassing the register interface
    pub fn set_window(&mut self, index: usize, window: Window) -> bool {
        match self.state.windows.get_mut(index) {
            Some(w) => {
                *w = window;
                true
            }
            None => false,
        }
    }

    pub fn irq(&mut self) -> &mut Line {
        &mut self.state.irq
    }

    /// Register a listener invoked with every fault, after the fault
    /// registers and the IRQ line were updated.
    pub fn on_fault(&mut self, listener: impl FnMut(MmuFault) + Send + 'static) -> ListenerHandle {
        self.state.fault_listeners.subscribe(listener)
    }

    pub fn remove_fault_listener(&mut self, handle: ListenerHandle) -> bool {
        self.state.fault_listeners.unsubscribe(handle)
    }

    /// Translate `addr` for an `access` transaction. A fault is recorded in
    /// the fault registers and reported to the fault listeners.
    pub fn translate(&mut self, addr: BusAddr, access: Privileges) -> Result<BusAddr, MmuFault> {
        let result = self.state.lookup(addr, access);
        match result {
            Ok(translated) => debug!("window_mmu: {addr:#010x} -> {translated:#010x}"),
            Err(fault) => self.state.record(fault),
        }
        result
    }

    /// Translate and forward a read to `downstream`
    pub fn access_read(
        &mut self,
        downstream: &mut dyn Bus,
        size: AccessWidth,
        addr: BusAddr,
    ) -> Result<BusData, BusError> {
        let addr = self
            .translate(addr, Privileges::READ)
            .map_err(|_| BusError::LoadAccessFault)?;
        downstream.read(size, addr)
    }

    /// Translate and forward a write to `downstream`
    pub fn access_write(
        &mut self,
        downstream: &mut dyn Bus,
        size: AccessWidth,
        addr: BusAddr,
        val: BusData,
    ) -> Result<(), BusError> {
        let addr = self
            .translate(addr, Privileges::WRITE)
            .map_err(|_| BusError::StoreAccessFault)?;
        downstream.write(size, addr, val)
    }

    /// Translate and forward an instruction fetch to `downstream`
    pub fn access_fetch(
        &mut self,
        downstream: &mut dyn Bus,
        size: AccessWidth,
        addr: BusAddr,
    ) -> Result<BusData, BusError> {
        let addr = self
            .translate(addr, Privileges::EXECUTE)
            .map_err(|_| BusError::LoadAccessFault)?;
        downstream.read(size, addr)
    }
}

impl Bus for WindowMmu {
    fn read(&mut self, size: AccessWidth, addr: BusAddr) -> Result<BusData, BusError> {
        Ok(self.regs.read_access(&mut self.state, size, addr))
    }

    fn write(&mut self, size: AccessWidth, addr: BusAddr, val: BusData) -> Result<(), BusError> {
        self.regs.write_access(&mut self.state, size, addr, val);
        Ok(())
    }

    fn reset(&mut self) {
        self.regs.reset();
        self.state.reset();
    }
}

impl Peripheral for WindowMmu {
    fn size(&self) -> BusAddr {
        Self::SIZE
    }
}
