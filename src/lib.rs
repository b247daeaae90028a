//! # 8-bit Teaching Processor Emulator
//!
//! A model of a minimal 8-bit processor: five registers, a 100-cell memory
//! bank, a four-flag status register and a control unit that fetches,
//! decodes and executes a program of at most 50 bytes.
//!
//! The arithmetic unit does not lean on native overflow detection. Addition
//! is rebuilt from a 7-bit magnitude add and a separate sign-bit add, so the
//! carry into and out of bit 7 (and from them the carry and overflow flags)
//! are computed explicitly.
//!
//! ## Features
//!
//! - 15 instructions plus END, in fixed 1–3 byte formats
//! - Bit-explicit ADD, ADDC, SUB (two's complement) and flag-transparent INC
//! - Typed, located faults instead of undefined behaviour
//! - Per-instruction [`StepEvent`]s for observers
//! - A machine-code listing loader, console renderer and HTTP service
//!
//! ## Example
//!
//! ```rust
//! use cpu8_emulator::{ProgramImage, RegisterId, ScriptedInput, CPU};
//!
//! // LDD A, MEM[5] ; LDD B, MEM[6] ; ADD A, B ; END
//! let program = ProgramImage::new(&[0x04, 0xF0, 5, 0x04, 0xF1, 6, 0x00, 0xF0, 0xF1, 0x10]).unwrap();
//! let mut cpu = CPU::with_program(program);
//! cpu.memory_mut().write(5, 3).unwrap();
//! cpu.memory_mut().write(6, 4).unwrap();
//!
//! let summary = cpu.run(&mut ScriptedInput::default(), None, |_| {}).unwrap();
//!
//! assert!(summary.halted);
//! assert_eq!(cpu.register(RegisterId::A), 7);
//! ```

pub mod alu;
pub mod config;
pub mod console;
pub mod cpu;
pub mod error;
pub mod flags;
pub mod logic;
pub mod memory;
pub mod metrics;
pub mod opcodes;
pub mod program;
pub mod registers;
pub mod server;
pub mod stack;
pub mod trace;

pub(crate) const LOG_TARGET: &str = "cpu8";

pub use cpu::{RunState, RunSummary, CPU};
pub use error::{CpuError, Fault};
pub use flags::FlagRegister;
pub use memory::Memory;
pub use opcodes::{Instruction, Opcode, Operand};
pub use program::ProgramImage;
pub use registers::{RegisterFile, RegisterId};
pub use trace::{InputSource, LineInput, PromptedInput, ScriptedInput, StepEvent};
