use crate::error::BoundsError;

/// Number of addressable cells in the memory bank.
pub const MEMORY_SIZE: usize = 100;

/// Cell the arithmetic unit stages its results in.
pub const SCRATCH_ADDRESS: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    data: [u8; MEMORY_SIZE],
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            data: [0; MEMORY_SIZE],
        }
    }

    pub fn read(&self, address: u8) -> Result<u8, BoundsError> {
        self.data
            .get(address as usize)
            .copied()
            .ok_or(BoundsError::Memory(address as usize))
    }

    pub fn write(&mut self, address: u8, value: u8) -> Result<(), BoundsError> {
        let cell = self
            .data
            .get_mut(address as usize)
            .ok_or(BoundsError::Memory(address as usize))?;
        *cell = value;
        Ok(())
    }

    // Seed a run of cells before execution starts
    pub fn load(&mut self, start: u8, data: &[u8]) -> Result<(), BoundsError> {
        let start = start as usize;
        let end = start + data.len();
        if end > MEMORY_SIZE {
            return Err(BoundsError::Memory(end - 1));
        }
        self.data[start..end].copy_from_slice(data);
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn clear(&mut self) {
        self.data = [0; MEMORY_SIZE];
    }
}
