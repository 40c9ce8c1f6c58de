/*++

Licensed under the Apache-2.0 license.

File Name:

    rng.rs

Abstract:

    File contains the true random number generator: a FIFO of random words
    plus a bank of entropy registers read straight from the source.

--*/

use std::collections::VecDeque;

use log::{debug, warn};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use soc_emu_bus::{
    Bus, BusError, Field, FieldMode, Line, Peripheral, Register, RegisterCollection,
    RegisterError,
};
use soc_emu_types::{AccessWidth, BusAddr, BusData};
use tock_registers::{register_bitfields, LocalRegisterCopy};

register_bitfields! [
    u32,

    /// Control register
    Control [
        ENABLE OFFSET(0) NUMBITS(1) [],
        FULL_IEN OFFSET(7) NUMBITS(1) [],
        SOFT_RESET OFFSET(8) NUMBITS(1) [],
    ],

    /// Status register
    Status [
        FULL_IF OFFSET(7) NUMBITS(1) [],
    ],
];

pub const CONTROL_OFFSET: BusAddr = 0x00;
pub const FIFO_LEVEL_OFFSET: BusAddr = 0x04;
pub const FIFO_DEPTH_OFFSET: BusAddr = 0x08;
pub const STATUS_OFFSET: BusAddr = 0x0c;
pub const FIFO_OFFSET: BusAddr = 0x10;
pub const ENTROPY_OFFSET: BusAddr = 0x40;

pub const ENTROPY_WORDS: usize = 16;
const MAX_FIFO_DEPTH: usize = 256;

/// RNG configuration
pub struct RngArgs {
    /// Number of words the FIFO holds
    pub fifo_depth: usize,
    /// Source of every word handed out
    pub source: Box<dyn RngCore + Send>,
}

impl Default for RngArgs {
    fn default() -> Self {
        Self {
            fifo_depth: 64,
            source: Box::new(StdRng::from_entropy()),
        }
    }
}

struct RngState {
    enabled: bool,
    full_ien: bool,
    full_if: bool,
    fifo: VecDeque<u32>,
    depth: usize,
    source: Box<dyn RngCore + Send>,
    irq: Line,
}

impl RngState {
    fn fill(&mut self) {
        if self.fifo.len() >= self.depth {
            return;
        }
        while self.fifo.len() < self.depth {
            self.fifo.push_back(self.source.next_u32());
        }
        debug!("rng: FIFO full");
        self.full_if = true;
        self.update_irq();
    }

    fn flush(&mut self) {
        self.fifo.clear();
        self.full_if = false;
        self.update_irq();
    }

    fn head(&self) -> u64 {
        if !self.enabled {
            return 0;
        }
        self.fifo.front().copied().unwrap_or_default().into()
    }

    /// Hand out the head of the FIFO and top it up again
    fn pop(&mut self) -> u64 {
        if !self.enabled {
            warn!("rng: FIFO read while disabled, returning 0");
            return 0;
        }
        if self.fifo.is_empty() {
            self.fill();
        }
        let word = self.fifo.pop_front().unwrap_or_default();
        self.fifo.push_back(self.source.next_u32());
        word.into()
    }

    fn entropy(&mut self) -> u64 {
        if !self.enabled {
            warn!("rng: entropy read while disabled, returning 0");
            return 0;
        }
        self.source.next_u32().into()
    }

    fn control_written(&mut self, old: u64, written: u64) {
        let old = LocalRegisterCopy::<u32, Control::Register>::new(old as u32);
        let written = LocalRegisterCopy::<u32, Control::Register>::new(written as u32);
        if written.is_set(Control::SOFT_RESET) {
            debug!("rng: soft reset");
            self.flush();
        } else if self.enabled && !old.is_set(Control::ENABLE) {
            self.fill();
        }
        self.update_irq();
    }

    fn update_irq(&mut self) {
        self.irq.set(self.full_ien && self.full_if);
    }

    fn reset(&mut self) {
        self.enabled = false;
        self.full_ien = false;
        self.fifo.clear();
        self.full_if = false;
        self.update_irq();
    }
}

/// True random number generator peripheral
pub struct Rng {
    regs: RegisterCollection<RngState>,
    state: RngState,
}

impl Rng {
    pub const SIZE: BusAddr = 0x100;

    pub fn new(args: RngArgs) -> Result<Self, RegisterError> {
        if args.fifo_depth == 0 || args.fifo_depth > MAX_FIFO_DEPTH {
            return Err(RegisterError::InvalidBank(
                "FIFO depth must be between 1 and 256",
            ));
        }
        let mut regs = RegisterCollection::new("rng", AccessWidth::DoubleWord);

        regs.define(
            CONTROL_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0)
                .with_field(
                    Field::new(Control::ENABLE, FieldMode::READ_WRITE, "ENABLE").backed_by(
                        |s: &mut RngState| s.enabled.into(),
                        |s: &mut RngState, v| s.enabled = v != 0,
                    ),
                )
                .with_reserved_bits(1, 6)
                .with_field(
                    Field::new(Control::FULL_IEN, FieldMode::READ_WRITE, "FULL_IEN").backed_by(
                        |s: &mut RngState| s.full_ien.into(),
                        |s: &mut RngState, v| s.full_ien = v != 0,
                    ),
                )
                .with_field(Field::new(
                    Control::SOFT_RESET,
                    FieldMode::WRITE_TO_CLEAR,
                    "SOFT_RESET",
                ))
                .with_reserved_bits(9, 23)
                .with_write_callback(|s: &mut RngState, old, written| {
                    s.control_written(old, written)
                }),
        )?;

        regs.define(
            FIFO_LEVEL_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0).with_field(
                Field::new((0, 32), FieldMode::READ_ONLY, "LEVEL")
                    .with_value_provider(|s: &mut RngState, _| s.fifo.len() as u64),
            ),
        )?;
        regs.define(
            FIFO_DEPTH_OFFSET,
            Register::new(AccessWidth::DoubleWord, args.fifo_depth as u64).with_value_field(
                (0, 32),
                FieldMode::READ_ONLY,
                "DEPTH",
            ),
        )?;
        regs.define(
            STATUS_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0)
                .with_reserved_bits(0, 7)
                .with_field(
                    Field::new(
                        Status::FULL_IF,
                        FieldMode::READ | FieldMode::WRITE_ONE_TO_CLEAR,
                        "FULL_IF",
                    )
                    .backed_by(
                        |s: &mut RngState| s.full_if.into(),
                        |s: &mut RngState, v| s.full_if = v != 0,
                    ),
                )
                .with_reserved_bits(8, 24)
                .with_write_callback(|s: &mut RngState, _, _| s.update_irq()),
        )?;

        // Peeks show the head of the FIFO; only a bus read pops it
        regs.define(
            FIFO_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0).with_field(
                Field::new((0, 32), FieldMode::READ_ONLY, "DATA")
                    .with_value_provider(|s: &mut RngState, _| s.head())
                    .with_read_provider(|s: &mut RngState, _| s.pop()),
            ),
        )?;

        regs.define_many(ENTROPY_OFFSET, ENTROPY_WORDS, 4, |reg, _| {
            reg.with_field(
                Field::new((0, 32), FieldMode::READ_ONLY, "ENTROPY")
                    .with_read_provider(|s: &mut RngState, _| s.entropy()),
            )
        })?;

        Ok(Self {
            regs,
            state: RngState {
                enabled: false,
                full_ien: false,
                full_if: false,
                fifo: VecDeque::with_capacity(args.fifo_depth),
                depth: args.fifo_depth,
                source: args.source,
                irq: Line::new("rng_irq"),
            },
        })
    }

    pub fn irq(&mut self) -> &mut Line {
        &mut self.state.irq
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    pub fn fifo_level(&self) -> usize {
        self.state.fifo.len()
    }
}

impl Bus for Rng {
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

impl Peripheral for Rng {
    fn size(&self) -> BusAddr {
        Self::SIZE
    }
}
