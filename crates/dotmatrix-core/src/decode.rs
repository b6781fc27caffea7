//! Pure opcode decoding.
//!
//! Every opcode byte is split into the standard Z80-family bit fields and
//! mapped to a tagged [`Instruction`] descriptor. Decoding has no side
//! effects and no access to machine state, so the whole table can be tested
//! independently of the execute step in [`crate::cpu`].
//!
//! Field layout (see gb-archive's "Decoding Gameboy Z80 Opcodes"):
//! `x = bits[7:6]`, `y = bits[5:3]`, `z = bits[2:0]`, `p = y >> 1`,
//! `q = y & 1`.

/// The five bit fields of an opcode byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpcodeFields {
    pub x: u8,
    pub y: u8,
    pub z: u8,
    pub p: u8,
    pub q: u8,
}

impl OpcodeFields {
    pub fn split(opcode: u8) -> Self {
        let y = (opcode >> 3) & 0x07;
        Self {
            x: opcode >> 6,
            y,
            z: opcode & 0x07,
            p: y >> 1,
            q: y & 1,
        }
    }
}

/// An 8-bit operand as indexed by the `y`/`z` fields. Index 6 is the memory
/// cell addressed by HL rather than a register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reg8 {
    B,
    C,
    D,
    E,
    H,
    L,
    HlMem,
    A,
}

impl Reg8 {
    fn from_index(index: u8) -> Self {
        match index & 0x07 {
            0 => Reg8::B,
            1 => Reg8::C,
            2 => Reg8::D,
            3 => Reg8::E,
            4 => Reg8::H,
            5 => Reg8::L,
            6 => Reg8::HlMem,
            _ => Reg8::A,
        }
    }
}

/// A 16-bit register pair as indexed by `p` (the `rp` table).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reg16 {
    Bc,
    De,
    Hl,
    Sp,
}

impl Reg16 {
    fn from_index(index: u8) -> Self {
        match index & 0x03 {
            0 => Reg16::Bc,
            1 => Reg16::De,
            2 => Reg16::Hl,
            _ => Reg16::Sp,
        }
    }
}

/// A 16-bit register pair for PUSH/POP (the `rp2` table, AF instead of SP).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reg16Stack {
    Bc,
    De,
    Hl,
    Af,
}

impl Reg16Stack {
    fn from_index(index: u8) -> Self {
        match index & 0x03 {
            0 => Reg16Stack::Bc,
            1 => Reg16Stack::De,
            2 => Reg16Stack::Hl,
            _ => Reg16Stack::Af,
        }
    }
}

/// Addressing mode for the accumulator load/store block at x=0, z=2.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Indirect {
    Bc,
    De,
    /// (HL) with post-increment of HL.
    HlInc,
    /// (HL) with post-decrement of HL.
    HlDec,
}

impl Indirect {
    fn from_index(index: u8) -> Self {
        match index & 0x03 {
            0 => Indirect::Bc,
            1 => Indirect::De,
            2 => Indirect::HlInc,
            _ => Indirect::HlDec,
        }
    }
}

/// Branch condition as indexed by the `cc` table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cond {
    NotZero,
    Zero,
    NotCarry,
    Carry,
    Always,
}

impl Cond {
    fn from_index(index: u8) -> Self {
        match index & 0x03 {
            0 => Cond::NotZero,
            1 => Cond::Zero,
            2 => Cond::NotCarry,
            _ => Cond::Carry,
        }
    }
}

/// The eight-way arithmetic/logic map indexed by `y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    /// Compare: flags of SUB with no register mutation.
    Cp,
}

impl AluOp {
    fn from_index(index: u8) -> Self {
        match index & 0x07 {
            0 => AluOp::Add,
            1 => AluOp::Adc,
            2 => AluOp::Sub,
            3 => AluOp::Sbc,
            4 => AluOp::And,
            5 => AluOp::Xor,
            6 => AluOp::Or,
            _ => AluOp::Cp,
        }
    }
}

/// The rotate/shift/swap family of the extended (0xCB) table, indexed by `y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RotOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
}

impl RotOp {
    fn from_index(index: u8) -> Self {
        match index & 0x07 {
            0 => RotOp::Rlc,
            1 => RotOp::Rrc,
            2 => RotOp::Rl,
            3 => RotOp::Rr,
            4 => RotOp::Sla,
            5 => RotOp::Sra,
            6 => RotOp::Swap,
            _ => RotOp::Srl,
        }
    }
}

/// A decoded primary-table instruction: operation kind plus operand
/// selectors. Immediate operand bytes are fetched by the execute step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    Stop,
    Halt,
    DisableInterrupts,
    EnableInterrupts,
    /// 0xCB escape: the next fetched byte selects from the extended table.
    Prefix,
    /// Return and enable interrupts in one step.
    Reti,
    Load { dst: Reg8, src: Reg8 },
    LoadImm(Reg8),
    LoadPairImm(Reg16),
    /// LD (a16), SP
    StoreSp,
    StoreAcc(Indirect),
    LoadAcc(Indirect),
    IncPair(Reg16),
    DecPair(Reg16),
    Inc(Reg8),
    Dec(Reg8),
    AddHlPair(Reg16),
    /// RLCA/RRCA/RLA/RRA (only the four rotate entries are valid here).
    RotateAcc(RotOp),
    Daa,
    Cpl,
    Scf,
    Ccf,
    Alu { op: AluOp, src: Reg8 },
    AluImm(AluOp),
    JumpRel(Cond),
    Jump(Cond),
    JumpHl,
    Call(Cond),
    Ret(Cond),
    Rst(u16),
    Push(Reg16Stack),
    Pop(Reg16Stack),
    /// LDH (a8), A
    StoreHighImm,
    /// LDH A, (a8)
    LoadHighImm,
    /// LD (0xFF00 + C), A
    StoreHighC,
    /// LD A, (0xFF00 + C)
    LoadHighC,
    /// LD (a16), A
    StoreAccAbs,
    /// LD A, (a16)
    LoadAccAbs,
    AddSpImm,
    LoadHlSpOffset,
    LoadSpHl,
    /// A documented removed/unused opcode slot.
    Unimplemented(u8),
}

/// A decoded extended-table (0xCB-prefixed) instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prefixed {
    Rotate { op: RotOp, reg: Reg8 },
    Bit { bit: u8, reg: Reg8 },
    Res { bit: u8, reg: Reg8 },
    Set { bit: u8, reg: Reg8 },
}

/// Decode a primary-table opcode byte.
pub fn decode(opcode: u8) -> Instruction {
    let OpcodeFields { x, y, z, p, q } = OpcodeFields::split(opcode);
    match x {
        0 => match z {
            0 => match y {
                0 => Instruction::Nop,
                1 => Instruction::StoreSp,
                2 => Instruction::Stop,
                3 => Instruction::JumpRel(Cond::Always),
                _ => Instruction::JumpRel(Cond::from_index(y - 4)),
            },
            1 => {
                if q == 0 {
                    Instruction::LoadPairImm(Reg16::from_index(p))
                } else {
                    Instruction::AddHlPair(Reg16::from_index(p))
                }
            }
            2 => {
                if q == 0 {
                    Instruction::StoreAcc(Indirect::from_index(p))
                } else {
                    Instruction::LoadAcc(Indirect::from_index(p))
                }
            }
            3 => {
                if q == 0 {
                    Instruction::IncPair(Reg16::from_index(p))
                } else {
                    Instruction::DecPair(Reg16::from_index(p))
                }
            }
            4 => Instruction::Inc(Reg8::from_index(y)),
            5 => Instruction::Dec(Reg8::from_index(y)),
            6 => Instruction::LoadImm(Reg8::from_index(y)),
            _ => match y {
                0..=3 => Instruction::RotateAcc(RotOp::from_index(y)),
                4 => Instruction::Daa,
                5 => Instruction::Cpl,
                6 => Instruction::Scf,
                _ => Instruction::Ccf,
            },
        },
        1 => {
            if z == 6 && y == 6 {
                Instruction::Halt
            } else {
                Instruction::Load {
                    dst: Reg8::from_index(y),
                    src: Reg8::from_index(z),
                }
            }
        }
        2 => Instruction::Alu {
            op: AluOp::from_index(y),
            src: Reg8::from_index(z),
        },
        _ => match z {
            0 => match y {
                0..=3 => Instruction::Ret(Cond::from_index(y)),
                4 => Instruction::StoreHighImm,
                5 => Instruction::AddSpImm,
                6 => Instruction::LoadHighImm,
                _ => Instruction::LoadHlSpOffset,
            },
            1 => {
                if q == 0 {
                    Instruction::Pop(Reg16Stack::from_index(p))
                } else {
                    match p {
                        0 => Instruction::Ret(Cond::Always),
                        1 => Instruction::Reti,
                        2 => Instruction::JumpHl,
                        _ => Instruction::LoadSpHl,
                    }
                }
            }
            2 => match y {
                0..=3 => Instruction::Jump(Cond::from_index(y)),
                4 => Instruction::StoreHighC,
                5 => Instruction::StoreAccAbs,
                6 => Instruction::LoadHighC,
                _ => Instruction::LoadAccAbs,
            },
            3 => match y {
                0 => Instruction::Jump(Cond::Always),
                1 => Instruction::Prefix,
                6 => Instruction::DisableInterrupts,
                7 => Instruction::EnableInterrupts,
                _ => Instruction::Unimplemented(opcode),
            },
            4 => match y {
                0..=3 => Instruction::Call(Cond::from_index(y)),
                _ => Instruction::Unimplemented(opcode),
            },
            5 => {
                if q == 0 {
                    Instruction::Push(Reg16Stack::from_index(p))
                } else if p == 0 {
                    Instruction::Call(Cond::Always)
                } else {
                    Instruction::Unimplemented(opcode)
                }
            }
            6 => Instruction::AluImm(AluOp::from_index(y)),
            _ => Instruction::Rst(y as u16 * 8),
        },
    }
}

/// Decode an extended-table opcode byte (the byte following 0xCB).
pub fn decode_prefixed(opcode: u8) -> Prefixed {
    let OpcodeFields { x, y, z, .. } = OpcodeFields::split(opcode);
    let reg = Reg8::from_index(z);
    match x {
        0 => Prefixed::Rotate {
            op: RotOp::from_index(y),
            reg,
        },
        1 => Prefixed::Bit { bit: y, reg },
        2 => Prefixed::Res { bit: y, reg },
        _ => Prefixed::Set { bit: y, reg },
    }
}
