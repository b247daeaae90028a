//! Arithmetic unit.
//!
//! Addition is rebuilt from a 7-bit magnitude add and a separate sign-bit
//! add so that both partial carries are visible:
//!
//! ```text
//!   a = s_a | m_a        m_a + m_b           -> 8 bits, bit 7 is c1
//!   b = s_b | m_b        s_a + s_b + c1      -> 2 bits, bit 1 is carry-out
//!
//!   C = carry-out        V = carry-out ^ c1
//!   N = result bit 7     Z = result == 0
//! ```
//!
//! The registers double as working storage. Everything an operation
//! clobbers is pushed to the temporary stack first and popped back before
//! returning, so the register file comes out bit-for-bit unchanged. The
//! result is staged in the scratch memory cell and returned.

use tracing::trace;

use crate::error::Fault;
use crate::flags::FlagRegister;
use crate::logic;
use crate::memory::{Memory, SCRATCH_ADDRESS};
use crate::registers::{RegisterFile, RegisterId};
use crate::stack::TempStack;
use crate::LOG_TARGET;

use RegisterId::{A, B, C, D, E};

const SIGN_BIT: u8 = 0x80;
const MAGNITUDE_BITS: u8 = 0x7F;

pub struct ArithmeticUnit<'a> {
    registers: &'a mut RegisterFile,
    flags: &'a mut FlagRegister,
    memory: &'a mut Memory,
    stack: &'a mut TempStack,
}

impl<'a> ArithmeticUnit<'a> {
    pub fn new(
        registers: &'a mut RegisterFile,
        flags: &'a mut FlagRegister,
        memory: &'a mut Memory,
        stack: &'a mut TempStack,
    ) -> Self {
        ArithmeticUnit {
            registers,
            flags,
            memory,
            stack,
        }
    }

    fn save(&mut self, ids: &[RegisterId]) {
        for &id in ids {
            self.stack.push(self.registers.read(id));
        }
    }

    // Pops in reverse of `save` order
    fn restore(&mut self, ids: &[RegisterId]) -> Result<(), Fault> {
        for &id in ids.iter().rev() {
            let value = self.stack.pop()?;
            self.registers.load(id, value);
        }
        Ok(())
    }

    fn stage(&mut self, id: RegisterId) -> Result<u8, Fault> {
        self.registers.store_to_memory(id, self.memory, SCRATCH_ADDRESS)?;
        Ok(self.memory.read(SCRATCH_ADDRESS)?)
    }

    /// 8-bit addition; sets all four flags.
    pub fn add(&mut self, a: u8, b: u8) -> Result<u8, Fault> {
        const SAVED: [RegisterId; 5] = [A, B, C, D, E];
        self.save(&SAVED);

        let regs = &mut *self.registers;

        // Sign bits in A/B, magnitudes in C/D
        regs.load(A, a & SIGN_BIT);
        regs.load(B, b & SIGN_BIT);
        regs.load(C, a & MAGNITUDE_BITS);
        regs.load(D, b & MAGNITUDE_BITS);

        regs.load(C, regs.read(C).wrapping_add(regs.read(D)));
        let c1 = regs.read(C) & SIGN_BIT == SIGN_BIT;

        self.stack.push(regs.read(C));

        // Line the sign bits and c1 up at bit 6 and add them
        regs.load(C, regs.read(C) & SIGN_BIT);
        regs.shift_right(C);
        regs.shift_right(A);
        regs.shift_right(B);
        regs.load(
            A,
            regs.read(A).wrapping_add(regs.read(B)).wrapping_add(regs.read(C)),
        );
        let carry = regs.read(A) & SIGN_BIT == SIGN_BIT;

        // Drop the carry-out, leaving the result sign in bit 7
        regs.load(E, regs.read(A));
        regs.shift_left(E);

        let magnitude = self.stack.pop()? & MAGNITUDE_BITS;
        let regs = &mut *self.registers;
        regs.load(C, magnitude);
        regs.load(A, regs.read(E).wrapping_add(regs.read(C)));

        let result = self.stage(A)?;
        let negative = result & SIGN_BIT == SIGN_BIT;
        let zero = result == 0;

        self.restore(&SAVED)?;

        trace!(target: LOG_TARGET, a, b, c1, carry, result, "add");

        self.flags.set_carry(carry);
        self.flags.set_negative(negative);
        self.flags.set_overflow(carry ^ c1);
        self.flags.set_zero(zero);

        Ok(result)
    }

    /// ADD plus one when carry was set beforehand. Flags are those of the plain ADD.
    pub fn add_with_carry(&mut self, a: u8, b: u8) -> Result<u8, Fault> {
        let carry_in = self.flags.carry();
        self.save(&[B]);

        let sum = self.add(a, b)?;
        let sum = if carry_in { self.increment(sum) } else { sum };
        self.registers.load(B, sum);
        let result = self.stage(B)?;

        self.restore(&[B])?;
        Ok(result)
    }

    /// `a + (~b + 1)`; flags are whatever the internal ADD produced.
    pub fn subtract(&mut self, a: u8, b: u8) -> Result<u8, Fault> {
        const SAVED: [RegisterId; 3] = [A, B, C];
        self.save(&SAVED);

        self.registers.load(A, a);
        self.registers.load(C, logic::complement(b));
        let negated = self.increment(self.registers.read(C));
        self.registers.load(B, negated);

        let (lhs, rhs) = (self.registers.read(A), self.registers.read(B));
        let difference = self.add(lhs, rhs)?;
        self.registers.load(A, difference);
        let result = self.stage(A)?;

        self.restore(&SAVED)?;
        Ok(result)
    }

    /// Flag-transparent `a + 1`.
    pub fn increment(&self, a: u8) -> u8 {
        a.wrapping_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StackUnderflow;
    use rand::Rng;

    struct Parts {
        registers: RegisterFile,
        flags: FlagRegister,
        memory: Memory,
        stack: TempStack,
    }

    impl Parts {
        fn new() -> Self {
            Parts {
                registers: RegisterFile::new(),
                flags: FlagRegister::new(),
                memory: Memory::new(),
                stack: TempStack::new(),
            }
        }

        fn alu(&mut self) -> ArithmeticUnit<'_> {
            ArithmeticUnit::new(
                &mut self.registers,
                &mut self.flags,
                &mut self.memory,
                &mut self.stack,
            )
        }
    }

    fn expected_overflow(a: u8, b: u8, result: u8) -> bool {
        let sa = a & 0x80;
        sa == b & 0x80 && sa != result & 0x80
    }

    #[test]
    fn test_add_all_pairs() {
        let mut parts = Parts::new();
        for a in 0..=255u8 {
            for b in 0..=255u8 {
                let result = parts.alu().add(a, b).unwrap();
                let sum = a as u16 + b as u16;

                assert_eq!(result, a.wrapping_add(b), "{a} + {b}");
                assert_eq!(parts.flags.carry(), sum >= 256, "carry {a} + {b}");
                assert_eq!(parts.flags.zero(), result == 0, "zero {a} + {b}");
                assert_eq!(parts.flags.negative(), result & 0x80 != 0, "negative {a} + {b}");
                assert_eq!(
                    parts.flags.overflow(),
                    expected_overflow(a, b, result),
                    "overflow {a} + {b}"
                );
                assert_eq!(parts.memory.read(SCRATCH_ADDRESS), Ok(result));
            }
        }
    }

    #[test]
    fn test_subtract_matches_negated_add() {
        let mut sub_parts = Parts::new();
        let mut add_parts = Parts::new();
        for a in 0..=255u8 {
            for b in 0..=255u8 {
                let difference = sub_parts.alu().subtract(a, b).unwrap();
                let sum = add_parts.alu().add(a, b.wrapping_neg()).unwrap();

                assert_eq!(difference, sum, "{a} - {b}");
                assert_eq!(difference, a.wrapping_sub(b));
                assert_eq!(sub_parts.flags, add_parts.flags, "flags {a} - {b}");
            }
        }
    }

    #[test]
    fn test_add_200_plus_100() {
        let mut parts = Parts::new();
        let result = parts.alu().add(200, 100).unwrap();
        assert_eq!(result, 44);
        assert!(parts.flags.carry());
        assert!(!parts.flags.overflow());
        assert!(!parts.flags.zero());
        assert!(!parts.flags.negative());
    }

    #[test]
    fn test_signed_overflow() {
        let mut parts = Parts::new();
        // 127 + 1 crosses into the negative range
        assert_eq!(parts.alu().add(0x7F, 0x01).unwrap(), 0x80);
        assert!(parts.flags.overflow());
        assert!(parts.flags.negative());
        assert!(!parts.flags.carry());

        // -128 + -128
        assert_eq!(parts.alu().add(0x80, 0x80).unwrap(), 0x00);
        assert!(parts.flags.overflow());
        assert!(parts.flags.carry());
        assert!(parts.flags.zero());
    }

    #[test]
    fn test_add_with_carry() {
        let mut parts = Parts::new();
        parts.flags.set_carry(true);
        assert_eq!(parts.alu().add_with_carry(2, 3).unwrap(), 6);
        // flags reflect the plain 2 + 3
        assert!(!parts.flags.carry());

        assert_eq!(parts.alu().add_with_carry(2, 3).unwrap(), 5);

        parts.alu().add(0xFF, 0x01).unwrap();
        assert!(parts.flags.carry());
        assert_eq!(parts.alu().add_with_carry(0xFF, 0x00).unwrap(), 0x00);
        assert!(!parts.flags.zero());
    }

    #[test]
    fn test_increment_is_flag_transparent() {
        let mut parts = Parts::new();
        parts.flags.set_zero(true);
        let flags_before = parts.flags;
        assert_eq!(parts.alu().increment(0xFF), 0x00);
        assert_eq!(parts.alu().increment(41), 42);
        assert_eq!(parts.flags, flags_before);
    }

    #[test]
    fn test_operations_leave_registers_unchanged() {
        let mut rng = rand::thread_rng();
        let mut parts = Parts::new();

        for _ in 0..500 {
            for id in RegisterId::ALL {
                parts.registers.load(id, rng.gen());
            }
            parts.flags.set_carry(rng.gen());
            let before = parts.registers.snapshot();
            let (a, b): (u8, u8) = (rng.gen(), rng.gen());

            parts.alu().add(a, b).unwrap();
            assert_eq!(parts.registers.snapshot(), before);

            parts.alu().add_with_carry(a, b).unwrap();
            assert_eq!(parts.registers.snapshot(), before);

            parts.alu().subtract(a, b).unwrap();
            assert_eq!(parts.registers.snapshot(), before);
        }
    }

    #[test]
    fn test_stack_discipline() {
        let mut parts = Parts::new();

        parts.alu().add(1, 2).unwrap();
        assert_eq!(parts.stack.pushes(), parts.stack.pops());
        assert!(parts.stack.is_empty());

        parts.alu().subtract(1, 2).unwrap();
        assert_eq!(parts.stack.pushes(), parts.stack.pops());

        parts.alu().add_with_carry(1, 2).unwrap();
        assert_eq!(parts.stack.pushes(), parts.stack.pops());
        assert!(parts.stack.is_empty());

        // ADD saves five registers plus the magnitude sum
        assert_eq!(parts.stack.pushes(), 6 + (3 + 6) + (1 + 6));

        assert_eq!(parts.stack.pop(), Err(StackUnderflow));
    }
}
