/*++

Licensed under the Apache-2.0 license.

File Name:

    crc.rs

Abstract:

    File contains the CRC engine peripheral and the CRC algorithm it runs.

--*/

use log::{debug, warn};
use soc_emu_bus::{
    Bus, BusError, Field, FieldMode, FieldRef, Line, Peripheral, Register, RegisterCollection,
    RegisterError,
};
use soc_emu_types::{AccessWidth, BusAddr, BusData};
use thiserror::Error;
use tock_registers::{register_bitfields, LocalRegisterCopy};

register_bitfields! [
    u32,

    /// Control register
    Control [
        START OFFSET(0) NUMBITS(1) [],
        WIDTH OFFSET(1) NUMBITS(2) [
            Bits8 = 0,
            Bits16 = 1,
            Bits32 = 2,
        ],
        REFIN OFFSET(3) NUMBITS(1) [],
        REFOUT OFFSET(4) NUMBITS(1) [],
        IRQ_EN OFFSET(5) NUMBITS(1) [],
    ],

    /// Status register
    Status [
        DONE OFFSET(0) NUMBITS(1) [],
        ERROR OFFSET(1) NUMBITS(1) [],
        BUS_FAULT OFFSET(2) NUMBITS(1) [],
    ],
];

pub const CTRL_OFFSET: BusAddr = 0x00;
pub const POLY_OFFSET: BusAddr = 0x04;
pub const SEED_OFFSET: BusAddr = 0x08;
pub const XOR_OUT_OFFSET: BusAddr = 0x0c;
pub const SRC_ADDR_OFFSET: BusAddr = 0x10;
pub const LENGTH_OFFSET: BusAddr = 0x14;
pub const RESULT_OFFSET: BusAddr = 0x18;
pub const STATUS_OFFSET: BusAddr = 0x1c;

const CTRL_WIDTH: FieldRef = FieldRef::new(CTRL_OFFSET, 1, 2);

/// Longest transfer a single run may request
const MAX_LENGTH: u32 = 0x10_0000;

/// Rejected CRC parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CrcError {
    #[error("unsupported CRC width {0}")]
    InvalidWidth(u32),
    #[error("polynomial {0:#x} does not fit the CRC width")]
    InvalidPolynomial(u32),
    #[error("seed {0:#x} does not fit the CRC width")]
    InvalidSeed(u32),
}

/// Parameters of a CRC computation in the usual Rocksoft notation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrcParams {
    width: u32,
    poly: u32,
    init: u32,
    refin: bool,
    refout: bool,
    xor_out: u32,
}

impl CrcParams {
    /// Validate a parameter set. `width` is 8, 16 or 32; `poly` is given
    /// without its implicit top bit.
    pub fn new(
        width: u32,
        poly: u32,
        init: u32,
        refin: bool,
        refout: bool,
        xor_out: u32,
    ) -> Result<Self, CrcError> {
        if !matches!(width, 8 | 16 | 32) {
            return Err(CrcError::InvalidWidth(width));
        }
        let mask = width_mask(width);
        if poly == 0 || poly & !mask != 0 {
            return Err(CrcError::InvalidPolynomial(poly));
        }
        if init & !mask != 0 {
            return Err(CrcError::InvalidSeed(init));
        }
        Ok(Self {
            width,
            poly,
            init,
            refin,
            refout,
            xor_out: xor_out & mask,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// CRC of `data`
    pub fn digest(&self, data: &[u8]) -> u32 {
        crc(self, data)
    }
}

fn width_mask(width: u32) -> u32 {
    (((1u64) << width) - 1) as u32
}

/// Bitwise MSB-first CRC with optional input and output reflection.
pub fn crc(params: &CrcParams, data: &[u8]) -> u32 {
    let width = params.width;
    let mask = u64::from(width_mask(width));
    let top = 1u64 << (width - 1);
    let poly = u64::from(params.poly);

    let mut crc = u64::from(params.init);
    for byte in data {
        let byte = if params.refin {
            byte.reverse_bits()
        } else {
            *byte
        };
        crc ^= u64::from(byte) << (width - 8);
        for _ in 0..8 {
            crc = if crc & top != 0 {
                (crc << 1) ^ poly
            } else {
                crc << 1
            };
            crc &= mask;
        }
    }
    let mut crc = crc as u32;
    if params.refout {
        crc = crc.reverse_bits() >> (32 - width);
    }
    crc ^ params.xor_out
}

struct CrcState {
    ctrl: LocalRegisterCopy<u32, Control::Register>,
    poly: u32,
    seed: u32,
    xor_out: u32,
    src_addr: u32,
    length: u32,
    result: u32,
    status: LocalRegisterCopy<u32, Status::Register>,
    dma: Box<dyn Bus>,
    irq: Line,
}

impl CrcState {
    const RESET_POLY: u32 = 0x04c1_1db7;
    const RESET_SEED: u32 = 0xffff_ffff;

    fn reset(&mut self) {
        self.ctrl.set(0);
        self.poly = Self::RESET_POLY;
        self.seed = Self::RESET_SEED;
        self.xor_out = 0;
        self.src_addr = 0;
        self.length = 0;
        self.result = 0;
        self.status.set(0);
        self.update_irq();
    }

    fn params(&self) -> Result<CrcParams, CrcError> {
        let width = match self.ctrl.read_as_enum(Control::WIDTH) {
            Some(Control::WIDTH::Value::Bits8) => 8,
            Some(Control::WIDTH::Value::Bits16) => 16,
            Some(Control::WIDTH::Value::Bits32) => 32,
            None => return Err(CrcError::InvalidWidth(self.ctrl.read(Control::WIDTH))),
        };
        CrcParams::new(
            width,
            self.poly,
            self.seed,
            self.ctrl.is_set(Control::REFIN),
            self.ctrl.is_set(Control::REFOUT),
            self.xor_out,
        )
    }

    fn start(&mut self) {
        self.status.modify(Status::DONE::CLEAR);
        let params = match self.params() {
            Ok(params) => params,
            Err(err) => {
                warn!("crc: {err}");
                self.status.modify(Status::ERROR::SET);
                return self.update_irq();
            }
        };
        if self.length > MAX_LENGTH {
            warn!("crc: transfer of {:#x} bytes exceeds the engine limit", self.length);
            self.status.modify(Status::ERROR::SET);
            return self.update_irq();
        }
        let mut data = vec![0u8; self.length as usize];
        match self.dma.read_bytes(self.src_addr.into(), &mut data) {
            Ok(()) => {
                self.result = params.digest(&data);
                debug!(
                    "crc: {:#x} bytes at {:#010x} -> {:#x}",
                    self.length, self.src_addr, self.result
                );
                self.status.modify(Status::DONE::SET);
            }
            Err(err) => {
                warn!(
                    "crc: reading {:#x} bytes at {:#010x} failed: {err:?}",
                    self.length, self.src_addr
                );
                self.status.modify(Status::ERROR::SET + Status::BUS_FAULT::SET);
            }
        }
        self.update_irq();
    }

    fn update_irq(&mut self) {
        let pending = self.status.is_set(Status::DONE) || self.status.is_set(Status::ERROR);
        self.irq
            .set(self.ctrl.is_set(Control::IRQ_EN) && pending);
    }
}

/// Builds a plain read/write 32-bit register mirrored into `CrcState`
fn backed_word(
    name: &'static str,
    reset: u32,
    get: fn(&CrcState) -> u32,
    set: fn(&mut CrcState, u32),
) -> Register<CrcState> {
    Register::new(AccessWidth::DoubleWord, reset.into()).with_field(
        Field::value(0, 32, name).backed_by(
            move |s: &mut CrcState| get(s).into(),
            move |s: &mut CrcState, v| set(s, v as u32),
        ),
    )
}

/// Builds a W1C status flag mirrored into `CrcState`
fn status_flag(
    field: tock_registers::fields::Field<u32, Status::Register>,
    name: &'static str,
) -> Field<CrcState> {
    Field::new(
        field,
        FieldMode::READ | FieldMode::WRITE_ONE_TO_CLEAR,
        name,
    )
    .backed_by(
        move |s: &mut CrcState| s.status.read(field).into(),
        move |s: &mut CrcState, v| s.status.modify(field.val(v as u32)),
    )
}

/// CRC engine peripheral.
///
/// Writing `CTRL.START` reads `LENGTH` bytes from `SRC_ADDR` over the bus
/// given at construction and stores the CRC in `RESULT`.
pub struct CrcEngine {
    regs: RegisterCollection<CrcState>,
    state: CrcState,
}

impl CrcEngine {
    pub const SIZE: BusAddr = 0x20;

    /// Create a CRC engine fetching its input through `dma`
    pub fn new(dma: Box<dyn Bus>) -> Result<Self, RegisterError> {
        let mut regs = RegisterCollection::new("crc", AccessWidth::DoubleWord);

        regs.define(
            CTRL_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0)
                .with_field(Field::new(
                    Control::START,
                    FieldMode::WRITE_ONE_TO_CLEAR,
                    "START",
                ))
                .with_field(Field::new(Control::WIDTH, FieldMode::READ_WRITE, "WIDTH"))
                .with_field(Field::new(Control::REFIN, FieldMode::READ_WRITE, "REFIN"))
                .with_field(Field::new(Control::REFOUT, FieldMode::READ_WRITE, "REFOUT"))
                .with_field(Field::new(Control::IRQ_EN, FieldMode::READ_WRITE, "IRQ_EN"))
                .with_reserved_bits(6, 26)
                .with_write_callback(|s: &mut CrcState, _, written| {
                    s.ctrl.set(written as u32);
                    if s.ctrl.is_set(Control::START) {
                        s.start();
                    } else {
                        s.update_irq();
                    }
                    s.ctrl.modify(Control::START::CLEAR);
                }),
        )?;

        regs.define(
            POLY_OFFSET,
            backed_word("POLY", CrcState::RESET_POLY, |s| s.poly, |s, v| s.poly = v),
        )?;
        regs.define(
            SEED_OFFSET,
            backed_word("SEED", CrcState::RESET_SEED, |s| s.seed, |s, v| s.seed = v),
        )?;
        regs.define(
            XOR_OUT_OFFSET,
            backed_word("XOR_OUT", 0, |s| s.xor_out, |s, v| s.xor_out = v),
        )?;
        regs.define(
            SRC_ADDR_OFFSET,
            backed_word("SRC_ADDR", 0, |s| s.src_addr, |s, v| s.src_addr = v),
        )?;
        regs.define(
            LENGTH_OFFSET,
            backed_word("LENGTH", 0, |s| s.length, |s, v| s.length = v),
        )?;

        regs.define(
            RESULT_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0).with_field(
                Field::new((0, 32), FieldMode::READ_ONLY, "RESULT")
                    .with_value_provider(|s: &mut CrcState, _| s.result.into()),
            ),
        )?;

        regs.define(
            STATUS_OFFSET,
            Register::new(AccessWidth::DoubleWord, 0)
                .with_field(status_flag(Status::DONE, "DONE"))
                .with_field(status_flag(Status::ERROR, "ERROR"))
                .with_field(status_flag(Status::BUS_FAULT, "BUS_FAULT"))
                .with_write_callback(|s: &mut CrcState, _, _| s.update_irq()),
        )?;

        let mut state = CrcState {
            ctrl: LocalRegisterCopy::new(0),
            poly: 0,
            seed: 0,
            xor_out: 0,
            src_addr: 0,
            length: 0,
            result: 0,
            status: LocalRegisterCopy::new(0),
            dma,
            irq: Line::new("crc_irq"),
        };
        state.reset();
        Ok(Self { regs, state })
    }

    pub fn irq(&mut self) -> &mut Line {
        &mut self.state.irq
    }

    /// Configured CRC width field, raw
    pub fn width_select(&self) -> u64 {
        self.regs.field(CTRL_WIDTH)
    }
}

impl Bus for CrcEngine {
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

impl Peripheral for CrcEngine {
    fn size(&self) -> BusAddr {
        Self::SIZE
    }
}
