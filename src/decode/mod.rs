use std::fmt;

use {Error, Result};
use self::formats::{Opcode, Funct, ROperands, IOperands, JOperands};

pub mod formats;

/// Width of an instruction word, in binary digits.
pub const WORD_BITS: usize = 32;
pub const OPCODE_BITS: usize = 6;

static REG_NAMES: [&'static str; 16] = [
    "$zero", "$at", "$v0", "$v1", "$a0", "$a1", "$a2", "$a3",
    "$t0",   "$t1", "$t2", "$t3", "$t4", "$t5", "$t6", "$t7",
];

/// A register operand. Only codes 0..15 have names.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reg(u8);

impl Reg {
    pub fn new(n: u32) -> Result<Reg> {
        if (n as usize) < REG_NAMES.len() {
            Ok(Reg(n as u8))
        } else {
            Err(Error::BadRegister(n))
        }
    }

    pub fn num(&self) -> u8 {
        self.0
    }

    pub fn name(&self) -> &'static str {
        REG_NAMES[self.0 as usize]
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub type Imm = u32;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Instruction {
    ADD(ROperands),
    SUB(ROperands),
    AND(ROperands),
    OR(ROperands),
    SLT(ROperands),

    LW(IOperands),
    SW(IOperands),
    BEQ(IOperands),
    BNE(IOperands),

    J(JOperands),
    JAL(JOperands),
}

macro_rules! instruction {
    ($opcode:ident, $operands:expr) => {
        Ok(Instruction::$opcode($operands))
    };
}

pub fn decode(bits: u32) -> Result<Instruction> {
    match Opcode::from_inst(bits)? {
        Opcode::Special => {
            let op = formats::decode_r(bits)?;
            match Funct::from_inst(bits)? {
                Funct::Add => instruction!(ADD, op),
                Funct::Sub => instruction!(SUB, op),
                Funct::And => instruction!(AND, op),
                Funct::Or  => instruction!(OR,  op),
                Funct::Slt => instruction!(SLT, op),
            }
        }

        Opcode::Lw  => instruction!(LW,  formats::decode_i(bits)?),
        Opcode::Sw  => instruction!(SW,  formats::decode_i(bits)?),
        Opcode::Beq => instruction!(BEQ, formats::decode_i(bits)?),
        Opcode::Bne => instruction!(BNE, formats::decode_i(bits)?),

        Opcode::J   => instruction!(J,   formats::decode_j(bits)),
        Opcode::Jal => instruction!(JAL, formats::decode_j(bits)),
    }
}

fn parse_bits(digits: &str) -> Option<u32> {
    let mut bits = 0u32;
    for b in digits.bytes() {
        bits = (bits << 1) | match b {
            b'0' => 0,
            b'1' => 1,
            _ => return None,
        };
    }
    Some(bits)
}

/// Parse a word written as exactly 32 `0`/`1` characters, most significant
/// bit first.
pub fn parse_word(word: &str) -> Result<u32> {
    if word.chars().count() != WORD_BITS {
        return Err(Error::BadLength(word.to_owned()));
    }

    parse_bits(word).ok_or_else(|| Error::BadDigit(word.to_owned()))
}

/// Decode a cleaned 32-character line.
///
/// An unrecognised opcode is reported before stray characters elsewhere in
/// the word, so `2000...` gives `Unknown opcode: 200000`.
pub fn decode_str(word: &str) -> Result<Instruction> {
    match parse_word(word) {
        Ok(bits) => decode(bits),
        Err(Error::BadDigit(_)) => {
            let opcode: String = word.chars().take(OPCODE_BITS).collect();
            match parse_bits(&opcode).map(|op| Opcode::from_inst(op << 26)) {
                Some(Ok(_)) => Err(Error::BadDigit(word.to_owned())),
                _ => Err(Error::BadOpcode(opcode)),
            }
        }
        Err(e) => Err(e),
    }
}

impl Instruction {
    /// Register written by this instruction, if any.
    ///
    /// Writes to `$zero` are discarded by the hardware and don't count.
    pub fn dest(&self) -> Option<Reg> {
        use self::Instruction::*;

        let rd = match *self {
            ADD(ref op) | SUB(ref op) | AND(ref op) | OR(ref op) | SLT(ref op) => op.rd,
            LW(ref op) => op.rt,
            SW(_) | BEQ(_) | BNE(_) | J(_) | JAL(_) => return None,
        };
        if rd.num() == 0 { None } else { Some(rd) }
    }

    /// Registers read by this instruction.
    pub fn sources(&self) -> Vec<Reg> {
        use self::Instruction::*;

        match *self {
            ADD(ref op) | SUB(ref op) | AND(ref op) | OR(ref op) | SLT(ref op)
                => vec![op.rs, op.rt],
            LW(ref op) => vec![op.rs],
            SW(ref op) | BEQ(ref op) | BNE(ref op) => vec![op.rs, op.rt],
            J(_) | JAL(_) => vec![],
        }
    }

    pub fn is_load(&self) -> bool {
        match *self {
            Instruction::LW(_) => true,
            _ => false,
        }
    }

    pub fn is_memory(&self) -> bool {
        match *self {
            Instruction::LW(_) | Instruction::SW(_) => true,
            _ => false,
        }
    }

    /// Branches and jumps.
    pub fn is_control(&self) -> bool {
        match *self {
            Instruction::BEQ(_) | Instruction::BNE(_)
                | Instruction::J(_) | Instruction::JAL(_) => true,
            _ => false,
        }
    }

    /// Control transfers that are taken no matter what the registers hold.
    pub fn is_jump(&self) -> bool {
        match *self {
            Instruction::J(_) | Instruction::JAL(_) => true,
            _ => false,
        }
    }
}

// `jal` is printed as `j`, matching the output of the tool this replaces.
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::Instruction::*;

        match *self {
            ADD(ref op) => write!(f, "add {}, {}, {}", op.rd, op.rs, op.rt),
            SUB(ref op) => write!(f, "sub {}, {}, {}", op.rd, op.rs, op.rt),
            AND(ref op) => write!(f, "and {}, {}, {}", op.rd, op.rs, op.rt),
             OR(ref op) => write!(f, "or {}, {}, {}",  op.rd, op.rs, op.rt),
            SLT(ref op) => write!(f, "slt {}, {}, {}", op.rd, op.rs, op.rt),

             LW(ref op) => write!(f, "lw {}, {}({})", op.rt, op.imm, op.rs),
             SW(ref op) => write!(f, "sw {}, {}({})", op.rt, op.imm, op.rs),
            BEQ(ref op) => write!(f, "beq {}, {}, {}", op.rs, op.rt, op.imm),
            BNE(ref op) => write!(f, "bne {}, {}, {}", op.rs, op.rt, op.imm),

            J(ref op) | JAL(ref op) => write!(f, "j {}", op.target),
        }
    }
}
