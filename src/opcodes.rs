use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::registers::RegisterId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Add,
    Sub,
    AddWithCarry,
    Inc,
    LoadDirect,
    ReadIo,
    Store,
    ShiftLeft,
    ShiftRight,
    And,
    Or,
    Xor,
    Complement,
    BranchIfZero,
    BranchIfCarry,
    Halt,
}

impl Opcode {
    pub const ALL: [Opcode; 16] = [
        Opcode::Add,
        Opcode::Sub,
        Opcode::AddWithCarry,
        Opcode::Inc,
        Opcode::LoadDirect,
        Opcode::ReadIo,
        Opcode::Store,
        Opcode::ShiftLeft,
        Opcode::ShiftRight,
        Opcode::And,
        Opcode::Or,
        Opcode::Xor,
        Opcode::Complement,
        Opcode::BranchIfZero,
        Opcode::BranchIfCarry,
        Opcode::Halt,
    ];

    pub fn byte(self) -> u8 {
        match self {
            Opcode::Add => 0x00,
            Opcode::Sub => 0x01,
            Opcode::AddWithCarry => 0x02,
            Opcode::Inc => 0x03,
            Opcode::LoadDirect => 0x04,
            Opcode::ReadIo => 0x05,
            Opcode::Store => 0x06,
            Opcode::ShiftLeft => 0x07,
            Opcode::ShiftRight => 0x08,
            Opcode::And => 0x09,
            Opcode::Or => 0x0A,
            Opcode::Xor => 0x0B,
            Opcode::Complement => 0x0C,
            Opcode::BranchIfZero => 0x0D,
            Opcode::BranchIfCarry => 0x0E,
            Opcode::Halt => 0x10,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::AddWithCarry => "ADDC",
            Opcode::Inc => "INC",
            Opcode::LoadDirect => "LDD",
            Opcode::ReadIo => "READ",
            Opcode::Store => "STR",
            Opcode::ShiftLeft => "SHL",
            Opcode::ShiftRight => "SHR",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Xor => "XOR",
            Opcode::Complement => "COMP",
            Opcode::BranchIfZero => "BEQ",
            Opcode::BranchIfCarry => "BIC",
            Opcode::Halt => "END",
        }
    }

    /// Number of bytes following the opcode.
    pub fn operand_count(self) -> usize {
        match self {
            Opcode::Halt => 0,
            Opcode::Inc
            | Opcode::ReadIo
            | Opcode::ShiftLeft
            | Opcode::ShiftRight
            | Opcode::Complement
            | Opcode::BranchIfZero
            | Opcode::BranchIfCarry => 1,
            Opcode::Add
            | Opcode::Sub
            | Opcode::AddWithCarry
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::LoadDirect
            | Opcode::Store => 2,
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = DecodeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x00 => Ok(Opcode::Add),
            0x01 => Ok(Opcode::Sub),
            0x02 => Ok(Opcode::AddWithCarry),
            0x03 => Ok(Opcode::Inc),
            0x04 => Ok(Opcode::LoadDirect),
            0x05 => Ok(Opcode::ReadIo),
            0x06 => Ok(Opcode::Store),
            0x07 => Ok(Opcode::ShiftLeft),
            0x08 => Ok(Opcode::ShiftRight),
            0x09 => Ok(Opcode::And),
            0x0A => Ok(Opcode::Or),
            0x0B => Ok(Opcode::Xor),
            0x0C => Ok(Opcode::Complement),
            0x0D => Ok(Opcode::BranchIfZero),
            0x0E => Ok(Opcode::BranchIfCarry),
            0x10 => Ok(Opcode::Halt),
            other => Err(DecodeError::Opcode(other)),
        }
    }
}

/// A resolved operand, as reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Operand {
    Register(RegisterId),
    Address(u8),
    Target(u8),
}

/// A fully decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Add { dst: RegisterId, src: RegisterId },
    Sub { dst: RegisterId, src: RegisterId },
    AddWithCarry { dst: RegisterId, src: RegisterId },
    Inc { reg: RegisterId },
    LoadDirect { dst: RegisterId, address: u8 },
    ReadIo { dst: RegisterId },
    Store { src: RegisterId, address: u8 },
    ShiftLeft { reg: RegisterId },
    ShiftRight { reg: RegisterId },
    And { dst: RegisterId, src: RegisterId },
    Or { dst: RegisterId, src: RegisterId },
    Xor { dst: RegisterId, src: RegisterId },
    Complement { reg: RegisterId },
    BranchIfZero { target: u8 },
    BranchIfCarry { target: u8 },
    Halt,
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Add { .. } => Opcode::Add,
            Instruction::Sub { .. } => Opcode::Sub,
            Instruction::AddWithCarry { .. } => Opcode::AddWithCarry,
            Instruction::Inc { .. } => Opcode::Inc,
            Instruction::LoadDirect { .. } => Opcode::LoadDirect,
            Instruction::ReadIo { .. } => Opcode::ReadIo,
            Instruction::Store { .. } => Opcode::Store,
            Instruction::ShiftLeft { .. } => Opcode::ShiftLeft,
            Instruction::ShiftRight { .. } => Opcode::ShiftRight,
            Instruction::And { .. } => Opcode::And,
            Instruction::Or { .. } => Opcode::Or,
            Instruction::Xor { .. } => Opcode::Xor,
            Instruction::Complement { .. } => Opcode::Complement,
            Instruction::BranchIfZero { .. } => Opcode::BranchIfZero,
            Instruction::BranchIfCarry { .. } => Opcode::BranchIfCarry,
            Instruction::Halt => Opcode::Halt,
        }
    }

    pub fn operands(&self) -> Vec<Operand> {
        use Operand::{Address, Register, Target};

        match *self {
            Instruction::Add { dst, src }
            | Instruction::Sub { dst, src }
            | Instruction::AddWithCarry { dst, src }
            | Instruction::And { dst, src }
            | Instruction::Or { dst, src }
            | Instruction::Xor { dst, src } => vec![Register(dst), Register(src)],
            Instruction::Inc { reg }
            | Instruction::ShiftLeft { reg }
            | Instruction::ShiftRight { reg }
            | Instruction::Complement { reg } => vec![Register(reg)],
            Instruction::ReadIo { dst } => vec![Register(dst)],
            Instruction::LoadDirect { dst, address } => vec![Register(dst), Address(address)],
            Instruction::Store { src, address } => vec![Register(src), Address(address)],
            Instruction::BranchIfZero { target } | Instruction::BranchIfCarry { target } => {
                vec![Target(target)]
            }
            Instruction::Halt => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_table() {
        for opcode in Opcode::ALL {
            assert_eq!(Opcode::try_from(opcode.byte()), Ok(opcode));
        }
        assert_eq!(Opcode::LoadDirect.byte(), 0x04);
        assert_eq!(Opcode::BranchIfCarry.byte(), 0x0E);
        assert_eq!(Opcode::Halt.byte(), 0x10);
    }

    #[test]
    fn test_unknown_opcodes_rejected() {
        assert_eq!(Opcode::try_from(0x0F), Err(DecodeError::Opcode(0x0F)));
        for byte in 0x11..=0xFF {
            assert!(Opcode::try_from(byte).is_err());
        }
    }

    #[test]
    fn test_operand_counts() {
        assert_eq!(Opcode::Halt.operand_count(), 0);
        assert_eq!(Opcode::BranchIfZero.operand_count(), 1);
        assert_eq!(Opcode::ReadIo.operand_count(), 1);
        assert_eq!(Opcode::Store.operand_count(), 2);
        assert_eq!(Opcode::Xor.operand_count(), 2);
    }

    #[test]
    fn test_operands_reported() {
        let ins = Instruction::Store { src: RegisterId::C, address: 12 };
        assert_eq!(ins.opcode(), Opcode::Store);
        assert_eq!(
            ins.operands(),
            vec![Operand::Register(RegisterId::C), Operand::Address(12)]
        );
    }
}
