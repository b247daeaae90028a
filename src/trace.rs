//! Collaborator seams: the per-instruction event handed to observers and
//! the character input source READ pulls from.

use std::collections::VecDeque;
use std::io::{BufRead, Write};

use serde::Serialize;

use crate::error::InputUnavailable;
use crate::flags::FlagRegister;
use crate::opcodes::{Opcode, Operand};
use crate::program::parse_decimal_byte;
use crate::registers::RegisterSnapshot;

/// What one completed instruction did, with the post-execution state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepEvent {
    /// Address of the opcode byte.
    pub pc: u8,
    pub opcode: Opcode,
    pub mnemonic: &'static str,
    pub operands: Vec<Operand>,
    pub branch_taken: bool,
    pub next_pc: u8,
    pub registers: RegisterSnapshot,
    pub flags: FlagRegister,
}

/// Supplies one value each time READ executes. May block.
pub trait InputSource {
    fn read_value(&mut self) -> Result<u8, InputUnavailable>;
}

/// Pre-queued input values; running dry is an error.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    values: VecDeque<u8>,
}

impl ScriptedInput {
    pub fn new(values: impl IntoIterator<Item = u8>) -> Self {
        ScriptedInput {
            values: values.into_iter().collect(),
        }
    }

    pub fn push(&mut self, value: u8) {
        self.values.push_back(value);
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl InputSource for ScriptedInput {
    fn read_value(&mut self) -> Result<u8, InputUnavailable> {
        self.values
            .pop_front()
            .ok_or_else(|| InputUnavailable("input queue is empty".to_string()))
    }
}

/// Reads one decimal value per line from a reader, stdin by default.
pub struct LineInput<R> {
    reader: R,
}

impl LineInput<std::io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        LineInput {
            reader: std::io::stdin().lock(),
        }
    }
}

impl<R: BufRead> LineInput<R> {
    pub fn new(reader: R) -> Self {
        LineInput { reader }
    }
}

impl<R: BufRead> InputSource for LineInput<R> {
    fn read_value(&mut self) -> Result<u8, InputUnavailable> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => Err(InputUnavailable("end of input".to_string())),
            Ok(_) => Ok(parse_decimal_byte(&line)),
            Err(e) => Err(InputUnavailable(e.to_string())),
        }
    }
}

/// Writes a prompt before every value the wrapped source reads.
pub struct PromptedInput<I, W> {
    inner: I,
    out: W,
    prompt: String,
}

impl<I: InputSource, W: Write> PromptedInput<I, W> {
    pub fn new(inner: I, out: W, prompt: impl Into<String>) -> Self {
        PromptedInput {
            inner,
            out,
            prompt: prompt.into(),
        }
    }
}

impl<I: InputSource, W: Write> InputSource for PromptedInput<I, W> {
    fn read_value(&mut self) -> Result<u8, InputUnavailable> {
        write!(self.out, "{}", self.prompt)
            .and_then(|_| self.out.flush())
            .map_err(|e| InputUnavailable(e.to_string()))?;
        self.inner.read_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_input_runs_dry() {
        let mut input = ScriptedInput::new([7, 8]);
        assert_eq!(input.read_value(), Ok(7));
        assert_eq!(input.read_value(), Ok(8));
        assert!(input.read_value().is_err());
    }

    #[test]
    fn test_line_input() {
        let mut input = LineInput::new(&b"65\n  12 \n"[..]);
        assert_eq!(input.read_value(), Ok(65));
        assert_eq!(input.read_value(), Ok(12));
        assert_eq!(
            input.read_value(),
            Err(InputUnavailable("end of input".to_string()))
        );
    }

    #[test]
    fn test_prompt_written_before_each_read() {
        let mut prompts = Vec::new();
        {
            let lines = LineInput::new(&b"3\n"[..]);
            let mut input = PromptedInput::new(lines, &mut prompts, "Enter char value: ");
            assert_eq!(input.read_value(), Ok(3));
            assert!(input.read_value().is_err());
        }
        assert_eq!(prompts, b"Enter char value: Enter char value: ");
    }

    #[test]
    fn test_event_serializes() {
        let event = StepEvent {
            pc: 0,
            opcode: Opcode::Inc,
            mnemonic: "INC",
            operands: vec![Operand::Register(crate::registers::RegisterId::A)],
            branch_taken: false,
            next_pc: 2,
            registers: RegisterSnapshot { a: 1, ..Default::default() },
            flags: FlagRegister::new(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["mnemonic"], "INC");
        assert_eq!(json["operands"][0]["kind"], "register");
        assert_eq!(json["operands"][0]["value"], "A");
        assert_eq!(json["registers"]["a"], 1);
        assert_eq!(json["flags"]["carry"], false);
    }
}
