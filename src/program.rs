use std::path::Path;

use tracing::warn;

use crate::error::{BoundsError, LoadError};
use crate::LOG_TARGET;

/// Maximum number of bytes a program image can hold.
pub const PROGRAM_CAPACITY: usize = 50;

/// Read-only instruction bytes, fixed before execution starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramImage {
    bytes: Vec<u8>,
}

impl ProgramImage {
    pub fn new(bytes: &[u8]) -> Result<Self, LoadError> {
        if bytes.len() > PROGRAM_CAPACITY {
            return Err(LoadError::TooLong(bytes.len()));
        }
        Ok(ProgramImage {
            bytes: bytes.to_vec(),
        })
    }

    /// Parses a machine-code listing: one decimal value per line.
    ///
    /// Each line is read the way C's `atoi` reads it: leading whitespace is
    /// skipped, an optional sign and the leading digits are taken, anything
    /// after them is ignored, and a line without digits reads as zero. Values
    /// are truncated to 8 bits. Listings longer than [`PROGRAM_CAPACITY`]
    /// lines are cut short.
    pub fn parse_listing(listing: &str) -> Self {
        let total = listing.lines().count();
        if total > PROGRAM_CAPACITY {
            warn!(
                target: LOG_TARGET,
                lines = total,
                capacity = PROGRAM_CAPACITY,
                "program listing truncated"
            );
        }

        let bytes = listing
            .lines()
            .take(PROGRAM_CAPACITY)
            .map(parse_decimal_byte)
            .collect();
        ProgramImage { bytes }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let listing = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::parse_listing(&listing))
    }

    pub fn fetch(&self, pc: u8) -> Result<u8, BoundsError> {
        self.bytes
            .get(pc as usize)
            .copied()
            .ok_or(BoundsError::ProgramCounter(pc as usize))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Reads one decimal value with `atoi` leniency, truncated to a byte.
pub fn parse_decimal_byte(line: &str) -> u8 {
    let trimmed = line.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u32, |acc, d| acc.wrapping_mul(10).wrapping_add((d - b'0') as u32));

    let value = if negative { value.wrapping_neg() } else { value };
    value as u8
}
