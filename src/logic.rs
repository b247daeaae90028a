//! Stateless bitwise operations. None of these touch the flags.

pub fn and(a: u8, b: u8) -> u8 {
    a & b
}

pub fn or(a: u8, b: u8) -> u8 {
    a | b
}

pub fn xor(a: u8, b: u8) -> u8 {
    a ^ b
}

/// One's complement.
pub fn complement(a: u8) -> u8 {
    !a
}
