use log::warn;

use crate::decode::{
    self, AluOp, Cond, Indirect, Instruction, Prefixed, Reg8, Reg16, Reg16Stack, RotOp,
};
use crate::mmu::Mmu;
use crate::registers::Registers;

// Interrupt sources in dispatch priority order, with their IF/IE bits and
// handler vectors.
const INTERRUPTS: [(u8, u16); 5] = [
    (0x01, 0x0040), // vblank
    (0x02, 0x0048), // LCD STAT
    (0x04, 0x0050), // timer
    (0x08, 0x0058), // serial
    (0x10, 0x0060), // joypad
];

/// Cycle cost of pushing PC and jumping to an interrupt vector.
const DISPATCH_CYCLES: u32 = 20;

/// Cycle cost of an idle step while halted, and of the 0xCB escape fetch.
const HALT_IDLE_CYCLES: u32 = 4;
const PREFIX_FETCH_CYCLES: u32 = 4;

/// Fixed cost of every extended-table instruction.
const PREFIXED_CYCLES: u32 = 8;

/// Faults the execute engine cannot resolve on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepError {
    /// The fetched byte was one of the eleven removed opcode slots. No
    /// cycles elapse; the caller decides whether to stop or skip.
    UnimplementedOpcode { opcode: u8, pc: u16 },
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepError::UnimplementedOpcode { opcode, pc } => {
                write!(f, "unimplemented opcode {opcode:#04x} at {pc:#06x}")
            }
        }
    }
}

impl std::error::Error for StepError {}

/// The Sharp LR35902 CPU core.
///
/// [`Cpu::step`] runs exactly one instruction (or one idle halt cycle) and
/// returns its cycle cost; interrupt dispatch is a separate explicit call so
/// the driver controls the order of CPU, PPU and interrupt work per tick.
pub struct Cpu {
    pub regs: Registers,
    /// Total elapsed cycles since power-on.
    pub cycles: u64,
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            cycles: 0,
        }
    }

    /// Execute one instruction at PC and return its cycle cost.
    ///
    /// While halted, no fetch happens and the step costs a fixed four
    /// cycles. After a 0xCB escape the next step runs one extended-table
    /// instruction at a fixed eight cycles.
    pub fn step(&mut self, mmu: &mut Mmu) -> Result<u32, StepError> {
        if self.regs.halted {
            self.cycles += HALT_IDLE_CYCLES as u64;
            return Ok(HALT_IDLE_CYCLES);
        }

        if self.regs.prefixed {
            self.regs.prefixed = false;
            let opcode = self.fetch8(mmu);
            self.execute_prefixed(decode::decode_prefixed(opcode), mmu);
            self.cycles += PREFIXED_CYCLES as u64;
            return Ok(PREFIXED_CYCLES);
        }

        let pc = self.regs.pc;
        let opcode = self.fetch8(mmu);
        let cycles = match decode::decode(opcode) {
            Instruction::Unimplemented(opcode) => {
                warn!("unimplemented opcode {opcode:#04x} at {pc:#06x}");
                return Err(StepError::UnimplementedOpcode { opcode, pc });
            }
            instr => self.execute(instr, mmu),
        };
        self.cycles += cycles as u64;
        Ok(cycles)
    }

    /// Dispatch the highest-priority pending interrupt, if any. Returns the
    /// cycle cost (zero when nothing was dispatched).
    ///
    /// A pending interrupt always wakes a halted CPU, even with IME
    /// disabled; in that case execution resumes without a dispatch.
    pub fn service_interrupts(&mut self, mmu: &mut Mmu) -> u32 {
        let pending = mmu.if_reg & mmu.ie_reg & 0x1F;
        if pending == 0 {
            return 0;
        }
        self.regs.halted = false;
        if !self.regs.ime {
            return 0;
        }
        for (bit, vector) in INTERRUPTS {
            if pending & bit != 0 {
                self.regs.ime = false;
                mmu.if_reg &= !bit;
                self.push16(mmu, self.regs.pc);
                self.regs.pc = vector;
                self.cycles += DISPATCH_CYCLES as u64;
                return DISPATCH_CYCLES;
            }
        }
        0
    }

    fn execute(&mut self, instr: Instruction, mmu: &mut Mmu) -> u32 {
        match instr {
            Instruction::Nop => 4,
            Instruction::Stop => {
                // STOP is encoded as 0x10 0x00; skip the padding byte.
                let _ = self.fetch8(mmu);
                4
            }
            Instruction::Halt => {
                self.regs.halted = true;
                4
            }
            Instruction::DisableInterrupts => {
                self.regs.ime = false;
                4
            }
            Instruction::EnableInterrupts => {
                self.regs.ime = true;
                4
            }
            Instruction::Prefix => {
                self.regs.prefixed = true;
                PREFIX_FETCH_CYCLES
            }

            Instruction::Load { dst, src } => {
                let val = self.read_operand(src, mmu);
                self.write_operand(dst, val, mmu);
                if dst == Reg8::HlMem || src == Reg8::HlMem { 8 } else { 4 }
            }
            Instruction::LoadImm(reg) => {
                let val = self.fetch8(mmu);
                self.write_operand(reg, val, mmu);
                if reg == Reg8::HlMem { 12 } else { 8 }
            }
            Instruction::LoadPairImm(pair) => {
                let val = self.fetch16(mmu);
                self.write_pair(pair, val);
                12
            }
            Instruction::StoreSp => {
                let addr = self.fetch16(mmu);
                mmu.write16(addr, self.regs.sp);
                20
            }
            Instruction::StoreAcc(ind) => {
                let addr = self.indirect_addr(ind);
                mmu.write(addr, self.regs.a);
                8
            }
            Instruction::LoadAcc(ind) => {
                let addr = self.indirect_addr(ind);
                self.regs.a = mmu.read(addr);
                8
            }
            Instruction::LoadSpHl => {
                self.regs.sp = self.regs.hl();
                8
            }

            Instruction::IncPair(pair) => {
                self.write_pair(pair, self.read_pair(pair).wrapping_add(1));
                8
            }
            Instruction::DecPair(pair) => {
                self.write_pair(pair, self.read_pair(pair).wrapping_sub(1));
                8
            }
            Instruction::Inc(reg) => {
                let val = self.read_operand(reg, mmu);
                let res = val.wrapping_add(1);
                self.regs.f.set_zero(res == 0);
                self.regs.f.set_subtract(false);
                self.regs.f.set_half_carry(val & 0x0F == 0x0F);
                self.write_operand(reg, res, mmu);
                if reg == Reg8::HlMem { 12 } else { 4 }
            }
            Instruction::Dec(reg) => {
                let val = self.read_operand(reg, mmu);
                let res = val.wrapping_sub(1);
                self.regs.f.set_zero(res == 0);
                self.regs.f.set_subtract(true);
                self.regs.f.set_half_carry(val & 0x0F == 0);
                self.write_operand(reg, res, mmu);
                if reg == Reg8::HlMem { 12 } else { 4 }
            }
            Instruction::AddHlPair(pair) => {
                let hl = self.regs.hl();
                let val = self.read_pair(pair);
                let (res, carry) = hl.overflowing_add(val);
                self.regs.f.set_subtract(false);
                self.regs.f.set_half_carry((hl & 0x0FFF) + (val & 0x0FFF) > 0x0FFF);
                self.regs.f.set_carry(carry);
                self.regs.set_hl(res);
                8
            }
            Instruction::AddSpImm => {
                let offset = self.fetch8(mmu) as i8;
                self.regs.sp = self.sp_offset(offset);
                16
            }
            Instruction::LoadHlSpOffset => {
                let offset = self.fetch8(mmu) as i8;
                let res = self.sp_offset(offset);
                self.regs.set_hl(res);
                12
            }

            Instruction::RotateAcc(op) => {
                let res = self.rotate(op, self.regs.a);
                self.regs.a = res;
                // The accumulator forms always clear Z.
                self.regs.f.set_zero(false);
                4
            }
            Instruction::Daa => {
                self.daa();
                4
            }
            Instruction::Cpl => {
                self.regs.a = !self.regs.a;
                self.regs.f.set_subtract(true);
                self.regs.f.set_half_carry(true);
                4
            }
            Instruction::Scf => {
                self.regs.f.set_subtract(false);
                self.regs.f.set_half_carry(false);
                self.regs.f.set_carry(true);
                4
            }
            Instruction::Ccf => {
                let carry = self.regs.f.carry();
                self.regs.f.set_subtract(false);
                self.regs.f.set_half_carry(false);
                self.regs.f.set_carry(!carry);
                4
            }

            Instruction::Alu { op, src } => {
                let val = self.read_operand(src, mmu);
                self.alu(op, val);
                if src == Reg8::HlMem { 8 } else { 4 }
            }
            Instruction::AluImm(op) => {
                let val = self.fetch8(mmu);
                self.alu(op, val);
                8
            }

            Instruction::JumpRel(cond) => {
                let offset = self.fetch8(mmu) as i8;
                if self.condition(cond) {
                    self.regs.pc = self.regs.pc.wrapping_add(offset as u16);
                    12
                } else {
                    8
                }
            }
            Instruction::Jump(cond) => {
                let addr = self.fetch16(mmu);
                if self.condition(cond) {
                    self.regs.pc = addr;
                    16
                } else {
                    12
                }
            }
            Instruction::JumpHl => {
                self.regs.pc = self.regs.hl();
                4
            }
            Instruction::Call(cond) => {
                let addr = self.fetch16(mmu);
                if self.condition(cond) {
                    self.push16(mmu, self.regs.pc);
                    self.regs.pc = addr;
                    24
                } else {
                    12
                }
            }
            Instruction::Ret(Cond::Always) => {
                self.regs.pc = self.pop16(mmu);
                16
            }
            Instruction::Ret(cond) => {
                if self.condition(cond) {
                    self.regs.pc = self.pop16(mmu);
                    20
                } else {
                    8
                }
            }
            Instruction::Reti => {
                self.regs.pc = self.pop16(mmu);
                self.regs.ime = true;
                16
            }
            Instruction::Rst(vector) => {
                self.push16(mmu, self.regs.pc);
                self.regs.pc = vector;
                16
            }

            Instruction::Push(pair) => {
                let val = self.read_stack_pair(pair);
                self.push16(mmu, val);
                16
            }
            Instruction::Pop(pair) => {
                let val = self.pop16(mmu);
                self.write_stack_pair(pair, val);
                12
            }

            Instruction::StoreHighImm => {
                let offset = self.fetch8(mmu);
                mmu.write(0xFF00 | offset as u16, self.regs.a);
                12
            }
            Instruction::LoadHighImm => {
                let offset = self.fetch8(mmu);
                self.regs.a = mmu.read(0xFF00 | offset as u16);
                12
            }
            Instruction::StoreHighC => {
                mmu.write(0xFF00 | self.regs.c as u16, self.regs.a);
                8
            }
            Instruction::LoadHighC => {
                self.regs.a = mmu.read(0xFF00 | self.regs.c as u16);
                8
            }
            Instruction::StoreAccAbs => {
                let addr = self.fetch16(mmu);
                mmu.write(addr, self.regs.a);
                16
            }
            Instruction::LoadAccAbs => {
                let addr = self.fetch16(mmu);
                self.regs.a = mmu.read(addr);
                16
            }

            // Filtered out in step() before execute is reached.
            Instruction::Unimplemented(_) => 0,
        }
    }

    fn execute_prefixed(&mut self, instr: Prefixed, mmu: &mut Mmu) {
        match instr {
            Prefixed::Rotate { op, reg } => {
                let val = self.read_operand(reg, mmu);
                let res = self.rotate(op, val);
                self.write_operand(reg, res, mmu);
            }
            Prefixed::Bit { bit, reg } => {
                let val = self.read_operand(reg, mmu);
                self.regs.f.set_zero(val & (1 << bit) == 0);
                self.regs.f.set_subtract(false);
                self.regs.f.set_half_carry(true);
            }
            Prefixed::Res { bit, reg } => {
                let val = self.read_operand(reg, mmu);
                self.write_operand(reg, val & !(1 << bit), mmu);
            }
            Prefixed::Set { bit, reg } => {
                let val = self.read_operand(reg, mmu);
                self.write_operand(reg, val | (1 << bit), mmu);
            }
        }
    }

    fn fetch8(&mut self, mmu: &Mmu) -> u8 {
        let val = mmu.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        val
    }

    fn fetch16(&mut self, mmu: &Mmu) -> u16 {
        let lo = self.fetch8(mmu) as u16;
        let hi = self.fetch8(mmu) as u16;
        hi << 8 | lo
    }

    fn read_operand(&self, reg: Reg8, mmu: &Mmu) -> u8 {
        match reg {
            Reg8::B => self.regs.b,
            Reg8::C => self.regs.c,
            Reg8::D => self.regs.d,
            Reg8::E => self.regs.e,
            Reg8::H => self.regs.h,
            Reg8::L => self.regs.l,
            Reg8::HlMem => mmu.read(self.regs.hl()),
            Reg8::A => self.regs.a,
        }
    }

    fn write_operand(&mut self, reg: Reg8, val: u8, mmu: &mut Mmu) {
        match reg {
            Reg8::B => self.regs.b = val,
            Reg8::C => self.regs.c = val,
            Reg8::D => self.regs.d = val,
            Reg8::E => self.regs.e = val,
            Reg8::H => self.regs.h = val,
            Reg8::L => self.regs.l = val,
            Reg8::HlMem => mmu.write(self.regs.hl(), val),
            Reg8::A => self.regs.a = val,
        }
    }

    fn read_pair(&self, pair: Reg16) -> u16 {
        match pair {
            Reg16::Bc => self.regs.bc(),
            Reg16::De => self.regs.de(),
            Reg16::Hl => self.regs.hl(),
            Reg16::Sp => self.regs.sp,
        }
    }

    fn write_pair(&mut self, pair: Reg16, val: u16) {
        match pair {
            Reg16::Bc => self.regs.set_bc(val),
            Reg16::De => self.regs.set_de(val),
            Reg16::Hl => self.regs.set_hl(val),
            Reg16::Sp => self.regs.sp = val,
        }
    }

    fn read_stack_pair(&self, pair: Reg16Stack) -> u16 {
        match pair {
            Reg16Stack::Bc => self.regs.bc(),
            Reg16Stack::De => self.regs.de(),
            Reg16Stack::Hl => self.regs.hl(),
            Reg16Stack::Af => self.regs.af(),
        }
    }

    fn write_stack_pair(&mut self, pair: Reg16Stack, val: u16) {
        match pair {
            Reg16Stack::Bc => self.regs.set_bc(val),
            Reg16Stack::De => self.regs.set_de(val),
            Reg16Stack::Hl => self.regs.set_hl(val),
            // F's low nibble is masked by the register file.
            Reg16Stack::Af => self.regs.set_af(val),
        }
    }

    /// Resolve an indirect accumulator address, applying the HL
    /// post-increment/decrement as a side effect.
    fn indirect_addr(&mut self, ind: Indirect) -> u16 {
        match ind {
            Indirect::Bc => self.regs.bc(),
            Indirect::De => self.regs.de(),
            Indirect::HlInc => {
                let hl = self.regs.hl();
                self.regs.set_hl(hl.wrapping_add(1));
                hl
            }
            Indirect::HlDec => {
                let hl = self.regs.hl();
                self.regs.set_hl(hl.wrapping_sub(1));
                hl
            }
        }
    }

    fn condition(&self, cond: Cond) -> bool {
        match cond {
            Cond::NotZero => !self.regs.f.zero(),
            Cond::Zero => self.regs.f.zero(),
            Cond::NotCarry => !self.regs.f.carry(),
            Cond::Carry => self.regs.f.carry(),
            Cond::Always => true,
        }
    }

    fn push16(&mut self, mmu: &mut Mmu, val: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        mmu.write(self.regs.sp, (val >> 8) as u8);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        mmu.write(self.regs.sp, val as u8);
    }

    fn pop16(&mut self, mmu: &Mmu) -> u16 {
        let lo = mmu.read(self.regs.sp) as u16;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = mmu.read(self.regs.sp) as u16;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        hi << 8 | lo
    }

    /// Eight-way accumulator arithmetic/logic, writing A (except CP) and all
    /// four flags.
    fn alu(&mut self, op: AluOp, val: u8) {
        let a = self.regs.a;
        match op {
            AluOp::Add => {
                let (res, carry) = a.overflowing_add(val);
                let half = (a & 0x0F) + (val & 0x0F) > 0x0F;
                self.regs.f.set_all(res == 0, false, half, carry);
                self.regs.a = res;
            }
            AluOp::Adc => {
                let carry_in = self.regs.f.carry() as u8;
                let res = a.wrapping_add(val).wrapping_add(carry_in);
                let half = (a & 0x0F) + (val & 0x0F) + carry_in > 0x0F;
                let carry = a as u16 + val as u16 + carry_in as u16 > 0xFF;
                self.regs.f.set_all(res == 0, false, half, carry);
                self.regs.a = res;
            }
            AluOp::Sub => {
                let (res, carry) = a.overflowing_sub(val);
                let half = a & 0x0F < val & 0x0F;
                self.regs.f.set_all(res == 0, true, half, carry);
                self.regs.a = res;
            }
            AluOp::Sbc => {
                let carry_in = self.regs.f.carry() as u8;
                let res = a.wrapping_sub(val).wrapping_sub(carry_in);
                let half = (a & 0x0F) < (val & 0x0F) + carry_in;
                let carry = (a as u16) < val as u16 + carry_in as u16;
                self.regs.f.set_all(res == 0, true, half, carry);
                self.regs.a = res;
            }
            AluOp::And => {
                let res = a & val;
                self.regs.f.set_all(res == 0, false, true, false);
                self.regs.a = res;
            }
            AluOp::Xor => {
                let res = a ^ val;
                self.regs.f.set_all(res == 0, false, false, false);
                self.regs.a = res;
            }
            AluOp::Or => {
                let res = a | val;
                self.regs.f.set_all(res == 0, false, false, false);
                self.regs.a = res;
            }
            AluOp::Cp => {
                let (res, carry) = a.overflowing_sub(val);
                let half = a & 0x0F < val & 0x0F;
                self.regs.f.set_all(res == 0, true, half, carry);
            }
        }
    }

    /// Rotate/shift/swap on an arbitrary byte, setting Z/N/H/C from the
    /// result. The RLCA-family accumulator forms clear Z afterwards.
    fn rotate(&mut self, op: RotOp, val: u8) -> u8 {
        let carry_in = self.regs.f.carry() as u8;
        let (res, carry) = match op {
            RotOp::Rlc => (val.rotate_left(1), val & 0x80 != 0),
            RotOp::Rrc => (val.rotate_right(1), val & 0x01 != 0),
            RotOp::Rl => (val << 1 | carry_in, val & 0x80 != 0),
            RotOp::Rr => (val >> 1 | carry_in << 7, val & 0x01 != 0),
            RotOp::Sla => (val << 1, val & 0x80 != 0),
            RotOp::Sra => (val >> 1 | (val & 0x80), val & 0x01 != 0),
            RotOp::Swap => (val.rotate_left(4), false),
            RotOp::Srl => (val >> 1, val & 0x01 != 0),
        };
        self.regs.f.set_all(res == 0, false, false, carry);
        res
    }

    /// SP plus a sign-extended 8-bit offset. H and C come from the unsigned
    /// low-byte addition; Z and N are cleared.
    fn sp_offset(&mut self, offset: i8) -> u16 {
        let sp = self.regs.sp;
        let off = offset as u16;
        let half = (sp & 0x000F) + (off & 0x000F) > 0x000F;
        let carry = (sp & 0x00FF) + (off & 0x00FF) > 0x00FF;
        self.regs.f.set_all(false, false, half, carry);
        sp.wrapping_add(off)
    }

    /// Decimal-adjust A after BCD addition or subtraction.
    fn daa(&mut self) {
        let mut a = self.regs.a;
        let mut carry = self.regs.f.carry();
        if self.regs.f.subtract() {
            if self.regs.f.carry() {
                a = a.wrapping_sub(0x60);
            }
            if self.regs.f.half_carry() {
                a = a.wrapping_sub(0x06);
            }
        } else {
            if self.regs.f.carry() || a > 0x99 {
                a = a.wrapping_add(0x60);
                carry = true;
            }
            if self.regs.f.half_carry() || a & 0x0F > 0x09 {
                a = a.wrapping_add(0x06);
            }
        }
        self.regs.a = a;
        self.regs.f.set_zero(a == 0);
        self.regs.f.set_half_carry(false);
        self.regs.f.set_carry(carry);
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
