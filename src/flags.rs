use serde::{Deserialize, Serialize};

/// Condition flags produced by the adder.
///
/// Only the ADD algorithm writes these (SUB and ADDC reach them through
/// their internal ADD). Logic, shift, INC and load/store instructions leave
/// them untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRegister {
    carry: bool,
    zero: bool,
    overflow: bool,
    negative: bool,
}

impl FlagRegister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn carry(&self) -> bool { self.carry }
    pub fn zero(&self) -> bool { self.zero }
    pub fn overflow(&self) -> bool { self.overflow }
    pub fn negative(&self) -> bool { self.negative }

    pub fn set_carry(&mut self, value: bool) { self.carry = value; }
    pub fn set_zero(&mut self, value: bool) { self.zero = value; }
    pub fn set_overflow(&mut self, value: bool) { self.overflow = value; }
    pub fn set_negative(&mut self, value: bool) { self.negative = value; }

    pub fn clear_carry(&mut self) { self.carry = false; }
    pub fn clear_zero(&mut self) { self.zero = false; }
    pub fn clear_overflow(&mut self) { self.overflow = false; }
    pub fn clear_negative(&mut self) { self.negative = false; }

    pub fn clear_all(&mut self) {
        self.clear_carry();
        self.clear_zero();
        self.clear_overflow();
        self.clear_negative();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_independent() {
        let mut flags = FlagRegister::new();
        flags.set_carry(true);
        flags.set_negative(true);

        assert!(flags.carry());
        assert!(!flags.zero());
        assert!(!flags.overflow());
        assert!(flags.negative());

        flags.clear_carry();
        assert!(!flags.carry());
        assert!(flags.negative());
    }

    #[test]
    fn test_clear_all() {
        let mut flags = FlagRegister::new();
        flags.set_carry(true);
        flags.set_zero(true);
        flags.set_overflow(true);
        flags.set_negative(true);

        flags.clear_all();
        assert_eq!(flags, FlagRegister::default());
    }
}
