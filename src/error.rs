use thiserror::Error;

use crate::memory::MEMORY_SIZE;
use crate::program::PROGRAM_CAPACITY;

/// A byte that does not name any known opcode or register selector.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unrecognized opcode 0x{0:02X}")]
    Opcode(u8),

    #[error("unrecognized register selector 0x{0:02X}")]
    Register(u8),
}

/// An address outside the memory bank or the loaded program image.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BoundsError {
    #[error("memory address {0} outside 0..{MEMORY_SIZE}")]
    Memory(usize),

    // Also raised when execution runs past the last loaded byte without END.
    #[error("program counter {0} outside loaded program (capacity {PROGRAM_CAPACITY})")]
    ProgramCounter(usize),
}

/// The temporary stack was popped more often than it was pushed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("temporary stack underflow")]
pub struct StackUnderflow;

/// The input collaborator could not supply a value for READ.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("character input unavailable: {0}")]
pub struct InputUnavailable(pub String);

/// Everything that can stop an instruction from completing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Bounds(#[from] BoundsError),

    #[error("internal error: {0}")]
    StackUnderflow(#[from] StackUnderflow),

    #[error(transparent)]
    InputUnavailable(#[from] InputUnavailable),
}

impl Fault {
    /// Faults that indicate a defect in the arithmetic unit rather than a bad program.
    pub fn is_internal(&self) -> bool {
        matches!(self, Fault::StackUnderflow(_))
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Fault::Decode(_) => "decode",
            Fault::Bounds(_) => "bounds",
            Fault::StackUnderflow(_) => "stack_underflow",
            Fault::InputUnavailable(_) => "input_unavailable",
        }
    }
}

/// A fault located at the instruction that raised it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{fault} (pc={pc}{})", opcode_suffix(.opcode))]
pub struct CpuError {
    /// Address of the failing instruction's opcode byte.
    pub pc: u8,
    /// The opcode byte, if it could be fetched at all.
    pub opcode: Option<u8>,
    #[source]
    pub fault: Fault,
}

impl CpuError {
    pub fn is_internal(&self) -> bool {
        self.fault.is_internal()
    }
}

fn opcode_suffix(opcode: &Option<u8>) -> String {
    match opcode {
        Some(opcode) => format!(", opcode=0x{:02X}", opcode),
        None => String::new(),
    }
}

/// Failures while reading a machine-code listing.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read program listing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("program has {0} bytes, capacity is {PROGRAM_CAPACITY}")]
    TooLong(usize),
}

/// Result type for control-unit operations.
pub type Result<T, E = CpuError> = std::result::Result<T, E>;
