use num::FromPrimitive;

use {Error, Result};
use super::{Reg, Imm};

enum_from_primitive! {
    /// The "opcode" field of the instruction encoding, bits 31..26.
    ///
    /// `Special` words carry their operation in the funct field instead.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub enum Opcode {
        Special = 0b000000,
        J       = 0b000010,
        Jal     = 0b000011,
        Beq     = 0b000100,
        Bne     = 0b000101,
        Lw      = 0b100011,
        Sw      = 0b101011,
    }
}

impl Opcode {
    pub fn from_inst(bits: u32) -> Result<Opcode> {
        let op = bits >> 26;
        match FromPrimitive::from_u32(op) {
            Some(o) => Ok(o),
            None => Err(Error::BadOpcode(format!("{:06b}", op))),
        }
    }
}

enum_from_primitive! {
    /// The "funct" field of a `Special` word, bits 5..0.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub enum Funct {
        Add = 0b100000,
        Sub = 0b100010,
        And = 0b100100,
        Or  = 0b100101,
        Slt = 0b101010,
     // Shifts, mult/div and jr are not decoded.
    }
}

impl Funct {
    pub fn from_inst(bits: u32) -> Result<Funct> {
        let funct = bits & 0b111111;
        match FromPrimitive::from_u32(funct) {
            Some(f) => Ok(f),
            None => Err(Error::BadFunct(funct)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ROperands {
    pub rd: Reg,
    pub rs: Reg,
    pub rt: Reg,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IOperands {
    pub rs: Reg,
    pub rt: Reg,
    pub imm: Imm,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct JOperands {
    /// Byte address: the 26-bit word index scaled by 4.
    pub target: Imm,
}

fn reg(bits: u32) -> Result<Reg> {
    Reg::new(bits & 0b11111)
}

pub fn decode_r(bits: u32) -> Result<ROperands> {
    Ok(ROperands {
        rs: reg(bits >> 21)?,
        rt: reg(bits >> 16)?,
        rd: reg(bits >> 11)?,
    })
}

// No sign extension: the immediate is read as a plain 16-bit number.
pub fn decode_i(bits: u32) -> Result<IOperands> {
    Ok(IOperands {
        rs: reg(bits >> 21)?,
        rt: reg(bits >> 16)?,
        imm: bits & 0xFFFF,
    })
}

pub fn decode_j(bits: u32) -> JOperands {
    JOperands {
        target: (bits & 0x03FF_FFFF) << 2,
    }
}
