use crate::error::StackUnderflow;

/// LIFO scratch storage the arithmetic unit saves registers to.
#[derive(Debug, Clone, Default)]
pub struct TempStack {
    values: Vec<u8>,
    pushes: u64,
    pops: u64,
}

impl TempStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: u8) {
        self.values.push(value);
        self.pushes += 1;
    }

    pub fn pop(&mut self) -> Result<u8, StackUnderflow> {
        let value = self.values.pop().ok_or(StackUnderflow)?;
        self.pops += 1;
        Ok(value)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Lifetime push count.
    pub fn pushes(&self) -> u64 {
        self.pushes
    }

    /// Lifetime successful pop count.
    pub fn pops(&self) -> u64 {
        self.pops
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}
