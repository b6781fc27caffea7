// CPU flag bits as documented in gbdev.io/pandocs/The_CPU_Flags.html
const FLAG_Z: u8 = 0x80; // Zero
const FLAG_N: u8 = 0x40; // Subtract
const FLAG_H: u8 = 0x20; // Half Carry
const FLAG_C: u8 = 0x10; // Carry

// Only bits 4-7 of F exist in hardware; the low nibble always reads zero.
const FLAG_MASK: u8 = 0xF0;

/// The F register with named single-bit accessors.
///
/// Stores the raw byte but masks the low nibble on every write so the
/// register can never hold bits that do not exist on hardware.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags(u8);

impl Flags {
    pub fn new() -> Self {
        Flags(0)
    }

    pub fn from_bits(bits: u8) -> Self {
        Flags(bits & FLAG_MASK)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn zero(self) -> bool {
        self.0 & FLAG_Z != 0
    }

    pub fn subtract(self) -> bool {
        self.0 & FLAG_N != 0
    }

    pub fn half_carry(self) -> bool {
        self.0 & FLAG_H != 0
    }

    pub fn carry(self) -> bool {
        self.0 & FLAG_C != 0
    }

    pub fn set_zero(&mut self, value: bool) {
        self.assign(FLAG_Z, value);
    }

    pub fn set_subtract(&mut self, value: bool) {
        self.assign(FLAG_N, value);
    }

    pub fn set_half_carry(&mut self, value: bool) {
        self.assign(FLAG_H, value);
    }

    pub fn set_carry(&mut self, value: bool) {
        self.assign(FLAG_C, value);
    }

    /// Set all four flags at once. Most ALU paths rewrite the whole register,
    /// so this keeps call sites short.
    pub fn set_all(&mut self, zero: bool, subtract: bool, half_carry: bool, carry: bool) {
        self.set_zero(zero);
        self.set_subtract(subtract);
        self.set_half_carry(half_carry);
        self.set_carry(carry);
    }

    fn assign(&mut self, bit: u8, value: bool) {
        if value {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }
}

/// The CPU register file.
///
/// Eight named 8-bit registers addressable individually or through the four
/// 16-bit pair views (BC, DE, HL, AF). Pairing is little-endian in the sense
/// that the low-order register of each pair holds the low byte of the 16-bit
/// view.
pub struct Registers {
    pub a: u8,
    pub f: Flags,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
    /// Interrupt master enable.
    pub ime: bool,
    /// Set by HALT; cleared when an enabled interrupt becomes pending.
    pub halted: bool,
    /// Set when the previously fetched byte was the 0xCB escape opcode.
    pub prefixed: bool,
}

// Power-on register state: SP starts at the top of HRAM, PC at 0x0000 so the
// boot image executes first.
const POWER_ON_SP: u16 = 0xFFFE;
const POWER_ON_PC: u16 = 0x0000;

impl Registers {
    pub fn new() -> Self {
        Self {
            a: 0,
            f: Flags::new(),
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            sp: POWER_ON_SP,
            pc: POWER_ON_PC,
            ime: false,
            halted: false,
            prefixed: false,
        }
    }

    pub fn bc(&self) -> u16 {
        ((self.b as u16) << 8) | self.c as u16
    }

    pub fn set_bc(&mut self, val: u16) {
        self.b = (val >> 8) as u8;
        self.c = val as u8;
    }

    pub fn de(&self) -> u16 {
        ((self.d as u16) << 8) | self.e as u16
    }

    pub fn set_de(&mut self, val: u16) {
        self.d = (val >> 8) as u8;
        self.e = val as u8;
    }

    pub fn hl(&self) -> u16 {
        ((self.h as u16) << 8) | self.l as u16
    }

    pub fn set_hl(&mut self, val: u16) {
        self.h = (val >> 8) as u8;
        self.l = val as u8;
    }

    pub fn af(&self) -> u16 {
        ((self.a as u16) << 8) | self.f.bits() as u16
    }

    pub fn set_af(&mut self, val: u16) {
        self.a = (val >> 8) as u8;
        self.f = Flags::from_bits(val as u8);
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}
