/*++

Licensed under the Apache-2.0 license.

File Name:

    interrupt_aggregator.rs

Abstract:

    File contains the interrupt aggregator: one sticky event bank fanned out
    to several destination lines, each with its own enable mask.

--*/

use log::warn;
use soc_emu_bus::{
    AllowedTranslations, Bus, BusError, Endianness, Field, FieldMode, Line, LineReceiver,
    Peripheral, Register, RegisterCollection, RegisterError,
};
use soc_emu_types::{AccessWidth, BusAddr, BusData};

pub const INTR_STATE_OFFSET: BusAddr = 0x00;
pub const INTR_TEST_OFFSET: BusAddr = 0x04;
pub const INTR_ENABLE_OFFSET: BusAddr = 0x10;

const MAX_DESTINATIONS: usize = 16;
const EVENT_COUNT: usize = 32;

/// Interrupt aggregator configuration
pub struct InterruptAggregatorArgs {
    /// Number of output lines, each with its own enable register
    pub destinations: usize,
}

impl Default for InterruptAggregatorArgs {
    fn default() -> Self {
        Self { destinations: 1 }
    }
}

struct AggregatorState {
    pending: u32,
    enables: Vec<u32>,
    lines: Vec<Line>,
}

impl AggregatorState {
    fn update_lines(&mut self) {
        for (line, enable) in self.lines.iter_mut().zip(self.enables.iter()) {
            line.set(self.pending & enable != 0);
        }
    }
}

/// Interrupt aggregator peripheral
pub struct InterruptAggregator {
    regs: RegisterCollection<AggregatorState>,
    state: AggregatorState,
}

impl InterruptAggregator {
    /// Size of the register window
    pub const SIZE: BusAddr = 0x100;

    pub fn new(args: InterruptAggregatorArgs) -> Result<Self, RegisterError> {
        if args.destinations == 0 || args.destinations > MAX_DESTINATIONS {
            return Err(RegisterError::InvalidBank(
                "destination count must be between 1 and 16",
            ));
        }
        let mut regs = RegisterCollection::new("intr_aggregator", AccessWidth::DoubleWord)
            .with_translations(
                AllowedTranslations::BYTE_TO_DOUBLE_WORD | AllowedTranslations::WORD_TO_DOUBLE_WORD,
                Endianness::Little,
            );

        regs.define(
            INTR_STATE_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0)
                .with_field(
                    Field::new(
                        (0, 32),
                        FieldMode::READ | FieldMode::WRITE_ONE_TO_CLEAR,
                        "STATE",
                    )
                    .backed_by(
                        |s: &mut AggregatorState| s.pending.into(),
                        |s: &mut AggregatorState, v| s.pending = v as u32,
                    ),
                )
                .with_write_callback(|s: &mut AggregatorState, _, _| s.update_lines()),
        )?;

        regs.define(
            INTR_TEST_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0)
                .with_field(
                    Field::new((0, 32), FieldMode::WRITE_TO_CLEAR, "TEST").on_write(
                        |s: &mut AggregatorState, _, written| s.pending |= written as u32,
                    ),
                )
                .with_write_callback(|s: &mut AggregatorState, _, _| s.update_lines()),
        )?;

        regs.define_many(INTR_ENABLE_OFFSET, args.destinations, 4, |reg, d| {
            reg.with_field(Field::value(0, 32, "ENABLE").backed_by(
                move |s: &mut AggregatorState| s.enables[d].into(),
                move |s: &mut AggregatorState, v| s.enables[d] = v as u32,
            ))
            .with_write_callback(|s: &mut AggregatorState, _, _| s.update_lines())
        })?;

        Ok(Self {
            regs,
            state: AggregatorState {
                pending: 0,
                enables: vec![0; args.destinations],
                lines: (0..args.destinations).map(|_| Line::new("irq")).collect(),
            },
        })
    }

    /// Output line of destination `dest`
    pub fn line(&mut self, dest: usize) -> Option<&mut Line> {
        self.state.lines.get_mut(dest)
    }

    pub fn pending(&self) -> u32 {
        self.state.pending
    }

    /// Latch event `event` as if its source had fired
    pub fn raise(&mut self, event: usize) {
        if event >= EVENT_COUNT {
            warn!("intr_aggregator: event {event} does not exist");
            return;
        }
        self.state.pending |= 1 << event;
        self.state.update_lines();
    }
}

impl Bus for InterruptAggregator {
    fn read(&mut self, size: AccessWidth, addr: BusAddr) -> Result<BusData, BusError> {
        Ok(self.regs.read_access(&mut self.state, size, addr))
    }

    fn write(&mut self, size: AccessWidth, addr: BusAddr, val: BusData) -> Result<(), BusError> {
        self.regs.write_access(&mut self.state, size, addr, val);
        Ok(())
    }

    fn reset(&mut self) {
        self.regs.reset();
        self.state.pending = 0;
        self.state.enables.iter_mut().for_each(|e| *e = 0);
        self.state.update_lines();
    }
}

impl LineReceiver for InterruptAggregator {
    fn on_line(&mut self, line: usize, value: bool) {
        if value {
            self.raise(line);
        }
    }
}

impl Peripheral for InterruptAggregator {
    fn size(&self) -> BusAddr {
        Self::SIZE
    }

    fn as_line_receiver(&mut self) -> Option<&mut dyn LineReceiver> {
        Some(self)
    }
}
