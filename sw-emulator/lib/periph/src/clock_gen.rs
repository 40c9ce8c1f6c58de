/*++

Licensed under the Apache-2.0 license.

File Name:

    clock_gen.rs

Abstract:

    File contains the high frequency crystal oscillator and the system clock
    selection that depends on it.

--*/

use log::{debug, info, warn};
use smlang::statemachine;
use soc_emu_bus::{
    Bus, BusError, Field, FieldMode, Line, ListenerHandle, Listeners, Peripheral, Register,
    RegisterCollection, RegisterError,
};
use soc_emu_types::{emu_enum, AccessWidth, BusAddr, BusData};
use tock_registers::{register_bitfields, LocalRegisterCopy};

register_bitfields! [
    u32,

    /// Control register
    Ctrl [
        FORCE_EN OFFSET(0) NUMBITS(1) [],
        DISABLE_ON_DEMAND OFFSET(1) NUMBITS(1) [],
    ],

    /// Command register
    Cmd [
        COREBIAS_OPT OFFSET(0) NUMBITS(1) [],
    ],

    /// Status register
    Status [
        RDY OFFSET(0) NUMBITS(1) [],
        COREBIAS_RDY OFFSET(1) NUMBITS(1) [],
        ENS OFFSET(16) NUMBITS(1) [],
        STATE OFFSET(24) NUMBITS(3) [],
        LOCK OFFSET(31) NUMBITS(1) [],
    ],

    /// Interrupt flag and enable registers
    Interrupt [
        RDY OFFSET(0) NUMBITS(1) [],
    ],

    /// Lock register
    Lock [
        LOCKKEY OFFSET(0) NUMBITS(16) [],
    ],

    /// Clock control register
    ClkCtrl [
        SYS_CLK_SEL OFFSET(0) NUMBITS(2) [],
        RUNNING_AT_RCLP OFFSET(12) NUMBITS(1) [],
        RUNNING_AT_RC32M OFFSET(13) NUMBITS(1) [],
        RUNNING_AT_XTAL32M OFFSET(14) NUMBITS(1) [],
        RUNNING_AT_DBLR64M OFFSET(15) NUMBITS(1) [],
    ],

    /// Switch to crystal register
    Switch2Xtal [
        SWITCH OFFSET(0) NUMBITS(1) [],
    ],
];

pub const CTRL_OFFSET: BusAddr = 0x00;
pub const CMD_OFFSET: BusAddr = 0x08;
pub const STATUS_OFFSET: BusAddr = 0x58;
pub const IF_OFFSET: BusAddr = 0x70;
pub const IEN_OFFSET: BusAddr = 0x74;
pub const LOCK_OFFSET: BusAddr = 0x80;
pub const CLK_CTRL_OFFSET: BusAddr = 0x90;
pub const SWITCH2XTAL_OFFSET: BusAddr = 0x94;

/// Distance between the register block and its SET, CLR and TGL aliases
pub const ALIAS_STRIDE: BusAddr = 0x1000;

/// `LOCKKEY` value that unlocks the configuration registers
pub const UNLOCK_CODE: u16 = 0x580e;

emu_enum!(
    /// System clock source
    #[derive(Debug, Eq, PartialEq, Copy, Clone)]
    pub SystemClock;
    u32;
    {
        Rclp = 0,
        Rc32m = 1,
        Xtal32m = 2,
        Dblr64m = 3,
    };
    Invalid
);

impl SystemClock {
    /// Whether the clock is derived from the crystal oscillator
    pub fn needs_xtal(self) -> bool {
        matches!(self, SystemClock::Xtal32m | SystemClock::Dblr64m)
    }
}

statemachine! {
    transitions: {
        // CurrentState Event [guard] / action = NextState

        *Idle + Enable = WaitLdo,
        WaitLdo + LdoReady = WaitCoreBias,
        WaitCoreBias + CoreBiasDone = WaitSteady,
        WaitSteady + Steady / ready = Run,

        WaitLdo + Disable / stop = Idle,
        WaitCoreBias + Disable / stop = Idle,
        WaitSteady + Disable / stop = Idle,
        Run + Disable / stop = Idle
    }
}

/// Start-up state carried by the oscillator state machine
pub struct Context {
    /// Latched `IF.RDY`
    ready_flag: bool,
    core_bias_ready: bool,
    on_ready: Listeners<()>,
}

impl Context {
    fn new(on_ready: Listeners<()>) -> Self {
        Self {
            ready_flag: false,
            core_bias_ready: false,
            on_ready,
        }
    }
}

impl StateMachineContext for Context {
    // actions
    fn ready(&mut self) {
        self.ready_flag = true;
        self.on_ready.notify(());
    }

    fn stop(&mut self) {
        self.core_bias_ready = false;
    }
}

struct OscState {
    machine: StateMachine<Context>,
    force_en: bool,
    disable_on_demand: bool,
    locked: bool,
    ien: bool,
    sys_clk: SystemClock,
    irq: Line,
}

impl OscState {
    fn new() -> Self {
        Self {
            machine: StateMachine::new(Context::new(Listeners::new())),
            force_en: false,
            disable_on_demand: true,
            locked: false,
            ien: false,
            sys_clk: SystemClock::Rc32m,
            irq: Line::new("hfxo_irq"),
        }
    }

    fn is_running(&self) -> bool {
        matches!(self.machine.state(), States::Run)
    }

    fn is_enabled(&self) -> bool {
        !matches!(self.machine.state(), States::Idle)
    }

    fn state_index(&self) -> u64 {
        match self.machine.state() {
            States::Idle => 0,
            States::WaitLdo => 1,
            States::WaitCoreBias => 2,
            States::WaitSteady => 3,
            States::Run => 4,
        }
    }

    /// Start-up completes within the triggering write
    fn enable(&mut self) {
        if self.is_enabled() {
            return;
        }
        for event in [
            Events::Enable,
            Events::LdoReady,
            Events::CoreBiasDone,
            Events::Steady,
        ] {
            let _ = self.machine.process_event(event);
        }
        debug!("hfxo: oscillator running");
        self.update_irq();
    }

    fn disable(&mut self) {
        if !self.is_enabled() {
            return;
        }
        let _ = self.machine.process_event(Events::Disable);
        debug!("hfxo: oscillator stopped");
        if self.sys_clk.needs_xtal() {
            warn!(
                "hfxo: oscillator stopped while clocking {}, falling back to Rc32m",
                self.sys_clk
            );
            self.sys_clk = SystemClock::Rc32m;
        }
    }

    fn ctrl_written(&mut self, old: u64) {
        if self.locked {
            warn!("hfxo: CTRL write ignored, registers are locked");
            return;
        }
        let old = LocalRegisterCopy::<u32, Ctrl::Register>::new(old as u32);
        let was_forced = old.is_set(Ctrl::FORCE_EN);
        if self.force_en && !was_forced {
            self.enable();
        } else if !self.force_en && was_forced && self.disable_on_demand {
            self.disable();
        } else if !self.force_en && self.disable_on_demand && !old.is_set(Ctrl::DISABLE_ON_DEMAND)
        {
            self.disable();
        }
    }

    fn optimize_core_bias(&mut self) {
        if self.locked {
            warn!("hfxo: CMD write ignored, registers are locked");
            return;
        }
        self.machine.context_mut().core_bias_ready = true;
    }

    fn select_clock(&mut self, clock: SystemClock) {
        if clock == self.sys_clk {
            return;
        }
        if clock.needs_xtal() && !self.is_running() {
            warn!("hfxo: cannot select {clock} while the oscillator is stopped");
            return;
        }
        info!("hfxo: system clock {} -> {}", self.sys_clk, clock);
        self.sys_clk = clock;
    }

    fn switch_to_xtal(&mut self) {
        if self.is_running() && self.sys_clk == SystemClock::Rc32m {
            self.select_clock(SystemClock::Xtal32m);
        } else {
            warn!(
                "hfxo: switch to crystal ignored, oscillator running: {}, clock: {}",
                self.is_running(),
                self.sys_clk
            );
        }
    }

    fn update_irq(&mut self) {
        self.irq.set(self.ien && self.machine.context().ready_flag);
    }

    fn reset(&mut self) {
        let on_ready = std::mem::take(&mut self.machine.context_mut().on_ready);
        self.machine = StateMachine::new(Context::new(on_ready));
        self.force_en = false;
        self.disable_on_demand = true;
        self.locked = false;
        self.ien = false;
        self.sys_clk = SystemClock::Rc32m;
        self.update_irq();
    }
}

fn running_at(clock: SystemClock) -> impl FnMut(&mut OscState, u64) -> u64 + Send {
    move |s: &mut OscState, _| (s.sys_clk == clock).into()
}

/// High frequency crystal oscillator peripheral
pub struct XtalOscillator {
    regs: RegisterCollection<OscState>,
    state: OscState,
}

impl XtalOscillator {
    /// Size of the register window, alias windows included
    pub const SIZE: BusAddr = 0x4000;

    pub fn new() -> Result<Self, RegisterError> {
        let mut regs =
            RegisterCollection::new("hfxo", AccessWidth::DoubleWord).with_aliases(ALIAS_STRIDE);

        regs.define(
            CTRL_OFFSET,
            Register::new(
                AccessWidth::DoubleWord,
                Ctrl::DISABLE_ON_DEMAND::SET.value.into(),
            )
            .with_field(
                Field::new(Ctrl::FORCE_EN, FieldMode::READ_WRITE, "FORCE_EN").backed_by(
                    |s: &mut OscState| s.force_en.into(),
                    |s: &mut OscState, v| {
                        if !s.locked {
                            s.force_en = v != 0
                        }
                    },
                ),
            )
            .with_field(
                Field::new(
                    Ctrl::DISABLE_ON_DEMAND,
                    FieldMode::READ_WRITE,
                    "DISABLE_ON_DEMAND",
                )
                .backed_by(
                    |s: &mut OscState| s.disable_on_demand.into(),
                    |s: &mut OscState, v| {
                        if !s.locked {
                            s.disable_on_demand = v != 0
                        }
                    },
                ),
            )
            .with_reserved_bits(2, 30)
            .with_write_callback(|s: &mut OscState, old, _| s.ctrl_written(old)),
        )?;

        regs.define(
            CMD_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0)
                .with_field(
                    Field::new(Cmd::COREBIAS_OPT, FieldMode::WRITE_TO_CLEAR, "COREBIAS_OPT")
                        .on_write(|s: &mut OscState, _, written| {
                            if written != 0 {
                                s.optimize_core_bias()
                            }
                        }),
                )
                .with_reserved_bits(1, 31),
        )?;

        regs.define(
            STATUS_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0)
                .with_field(
                    Field::new(Status::RDY, FieldMode::READ_ONLY, "RDY")
                        .with_value_provider(|s: &mut OscState, _| s.is_running().into()),
                )
                .with_field(
                    Field::new(Status::COREBIAS_RDY, FieldMode::READ_ONLY, "COREBIAS_RDY")
                        .with_value_provider(|s: &mut OscState, _| {
                            s.machine.context().core_bias_ready.into()
                        }),
                )
                .with_reserved_bits(2, 14)
                .with_field(
                    Field::new(Status::ENS, FieldMode::READ_ONLY, "ENS")
                        .with_value_provider(|s: &mut OscState, _| s.is_enabled().into()),
                )
                .with_reserved_bits(17, 7)
                .with_field(
                    Field::new(Status::STATE, FieldMode::READ_ONLY, "STATE")
                        .with_value_provider(|s: &mut OscState, _| s.state_index()),
                )
                .with_reserved_bits(27, 4)
                .with_field(
                    Field::new(Status::LOCK, FieldMode::READ_ONLY, "LOCK")
                        .with_value_provider(|s: &mut OscState, _| s.locked.into()),
                ),
        )?;

        regs.define(
            IF_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0)
                .with_field(
                    Field::new(Interrupt::RDY, FieldMode::READ_WRITE, "RDY").backed_by(
                        |s: &mut OscState| s.machine.context().ready_flag.into(),
                        |s: &mut OscState, v| s.machine.context_mut().ready_flag = v != 0,
                    ),
                )
                .with_reserved_bits(1, 31)
                .with_write_callback(|s: &mut OscState, _, _| s.update_irq()),
        )?;

        regs.define(
            IEN_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0)
                .with_field(
                    Field::new(Interrupt::RDY, FieldMode::READ_WRITE, "RDY").backed_by(
                        |s: &mut OscState| s.ien.into(),
                        |s: &mut OscState, v| s.ien = v != 0,
                    ),
                )
                .with_reserved_bits(1, 31)
                .with_write_callback(|s: &mut OscState, _, _| s.update_irq()),
        )?;

        regs.define(
            LOCK_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0)
                .with_field(
                    Field::new(Lock::LOCKKEY, FieldMode::WRITE_TO_CLEAR, "LOCKKEY").on_write(
                        |s: &mut OscState, _, written| {
                            s.locked = written != u64::from(UNLOCK_CODE);
                            debug!("hfxo: registers locked: {}", s.locked);
                        },
                    ),
                )
                .with_reserved_bits(16, 16),
        )?;

        regs.define(
            CLK_CTRL_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0)
                .with_field(
                    Field::new(ClkCtrl::SYS_CLK_SEL, FieldMode::READ_WRITE, "SYS_CLK_SEL")
                        .backed_by(
                            |s: &mut OscState| s.sys_clk.value().unwrap_or_default().into(),
                            |s: &mut OscState, v| s.select_clock(SystemClock::from(v as u32)),
                        ),
                )
                .with_reserved_bits(2, 10)
                .with_field(
                    Field::new(ClkCtrl::RUNNING_AT_RCLP, FieldMode::READ_ONLY, "RUNNING_AT_RCLP")
                        .with_value_provider(running_at(SystemClock::Rclp)),
                )
                .with_field(
                    Field::new(
                        ClkCtrl::RUNNING_AT_RC32M,
                        FieldMode::READ_ONLY,
                        "RUNNING_AT_RC32M",
                    )
                    .with_value_provider(running_at(SystemClock::Rc32m)),
                )
                .with_field(
                    Field::new(
                        ClkCtrl::RUNNING_AT_XTAL32M,
                        FieldMode::READ_ONLY,
                        "RUNNING_AT_XTAL32M",
                    )
                    .with_value_provider(running_at(SystemClock::Xtal32m)),
                )
                .with_field(
                    Field::new(
                        ClkCtrl::RUNNING_AT_DBLR64M,
                        FieldMode::READ_ONLY,
                        "RUNNING_AT_DBLR64M",
                    )
                    .with_value_provider(running_at(SystemClock::Dblr64m)),
                )
                .with_reserved_bits(16, 16),
        )?;

        regs.define(
            SWITCH2XTAL_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0)
                .with_field(
                    Field::new(Switch2Xtal::SWITCH, FieldMode::WRITE_TO_CLEAR, "SWITCH").on_write(
                        |s: &mut OscState, _, written| {
                            if written != 0 {
                                s.switch_to_xtal()
                            }
                        },
                    ),
                )
                .with_reserved_bits(1, 31),
        )?;

        Ok(Self {
            regs,
            state: OscState::new(),
        })
    }

    /// Register a listener invoked every time the oscillator becomes ready
    pub fn on_ready(&mut self, listener: impl FnMut(()) + Send + 'static) -> ListenerHandle {
        self.state.machine.context_mut().on_ready.subscribe(listener)
    }

    pub fn remove_ready_listener(&mut self, handle: ListenerHandle) -> bool {
        self.state.machine.context_mut().on_ready.unsubscribe(handle)
    }

    pub fn irq(&mut self) -> &mut Line {
        &mut self.state.irq
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn system_clock(&self) -> SystemClock {
        self.state.sys_clk
    }
}

impl Bus for XtalOscillator {
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

impl Peripheral for XtalOscillator {
    fn size(&self) -> BusAddr {
        Self::SIZE
    }
}
