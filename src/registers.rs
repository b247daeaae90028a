use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BoundsError, DecodeError};
use crate::memory::Memory;

/// The five general-purpose registers, selected by bytes 0xF0..=0xF4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterId {
    A,
    B,
    C,
    D,
    E,
}

impl RegisterId {
    pub const ALL: [RegisterId; 5] = [
        RegisterId::A,
        RegisterId::B,
        RegisterId::C,
        RegisterId::D,
        RegisterId::E,
    ];

    pub fn selector(self) -> u8 {
        match self {
            RegisterId::A => 0xF0,
            RegisterId::B => 0xF1,
            RegisterId::C => 0xF2,
            RegisterId::D => 0xF3,
            RegisterId::E => 0xF4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RegisterId::A => "A",
            RegisterId::B => "B",
            RegisterId::C => "C",
            RegisterId::D => "D",
            RegisterId::E => "E",
        }
    }
}

impl TryFrom<u8> for RegisterId {
    type Error = DecodeError;

    fn try_from(selector: u8) -> Result<Self, Self::Error> {
        match selector {
            0xF0 => Ok(RegisterId::A),
            0xF1 => Ok(RegisterId::B),
            0xF2 => Ok(RegisterId::C),
            0xF3 => Ok(RegisterId::D),
            0xF4 => Ok(RegisterId::E),
            other => Err(DecodeError::Register(other)),
        }
    }
}

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Plain copy of all five register values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSnapshot {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterFile {
    a: u8,
    b: u8,
    c: u8,
    d: u8,
    e: u8,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&mut self, id: RegisterId) -> &mut u8 {
        match id {
            RegisterId::A => &mut self.a,
            RegisterId::B => &mut self.b,
            RegisterId::C => &mut self.c,
            RegisterId::D => &mut self.d,
            RegisterId::E => &mut self.e,
        }
    }

    pub fn load(&mut self, id: RegisterId, value: u8) {
        *self.cell(id) = value;
    }

    pub fn read(&self, id: RegisterId) -> u8 {
        match id {
            RegisterId::A => self.a,
            RegisterId::B => self.b,
            RegisterId::C => self.c,
            RegisterId::D => self.d,
            RegisterId::E => self.e,
        }
    }

    pub fn store_to_memory(
        &self,
        id: RegisterId,
        memory: &mut Memory,
        address: u8,
    ) -> Result<(), BoundsError> {
        memory.write(address, self.read(id))
    }

    // Logical shifts, vacated bit is zero
    pub fn shift_left(&mut self, id: RegisterId) {
        let cell = self.cell(id);
        *cell <<= 1;
    }

    pub fn shift_right(&mut self, id: RegisterId) {
        let cell = self.cell(id);
        *cell >>= 1;
    }

    pub fn snapshot(&self) -> RegisterSnapshot {
        RegisterSnapshot {
            a: self.a,
            b: self.b,
            c: self.c,
            d: self.d,
            e: self.e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_decode() {
        for id in RegisterId::ALL {
            assert_eq!(RegisterId::try_from(id.selector()), Ok(id));
        }
        assert_eq!(RegisterId::try_from(0xF5), Err(DecodeError::Register(0xF5)));
        assert_eq!(RegisterId::try_from(0x00), Err(DecodeError::Register(0x00)));
    }

    #[test]
    fn test_registers_are_independent() {
        let mut regs = RegisterFile::new();
        regs.load(RegisterId::C, 0x42);
        assert_eq!(regs.read(RegisterId::C), 0x42);
        assert_eq!(regs.read(RegisterId::A), 0);
        assert_eq!(regs.snapshot(), RegisterSnapshot { c: 0x42, ..Default::default() });
    }

    #[test]
    fn test_logical_shifts() {
        let mut regs = RegisterFile::new();
        regs.load(RegisterId::A, 0x81);
        regs.shift_left(RegisterId::A);
        assert_eq!(regs.read(RegisterId::A), 0x02);

        regs.load(RegisterId::B, 0x81);
        regs.shift_right(RegisterId::B);
        assert_eq!(regs.read(RegisterId::B), 0x40);
    }

    #[test]
    fn test_store_to_memory() {
        let mut regs = RegisterFile::new();
        let mut memory = Memory::new();
        regs.load(RegisterId::D, 9);

        regs.store_to_memory(RegisterId::D, &mut memory, 42).unwrap();
        assert_eq!(memory.read(42), Ok(9));
        assert_eq!(
            regs.store_to_memory(RegisterId::D, &mut memory, 100),
            Err(BoundsError::Memory(100))
        );
    }
}
