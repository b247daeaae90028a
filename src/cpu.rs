use serde::Serialize;
use tracing::{debug, warn};

use crate::alu::ArithmeticUnit;
use crate::error::{CpuError, Fault, Result};
use crate::flags::FlagRegister;
use crate::logic;
use crate::memory::Memory;
use crate::metrics::{record_fault, record_instruction, Timer};
use crate::opcodes::{Instruction, Opcode};
use crate::program::ProgramImage;
use crate::registers::{RegisterFile, RegisterId};
use crate::stack::TempStack;
use crate::trace::{InputSource, StepEvent};
use crate::LOG_TARGET;

/// Where the control unit is in its fetch/decode/execute cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Fetch,
    Decode,
    Execute,
    Halted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub steps_executed: u64,
    pub halted: bool,
    pub pc: u8,
}

/// The whole machine: datapath state plus the control unit driving it.
#[derive(Debug, Clone)]
pub struct CPU {
    registers: RegisterFile,
    flags: FlagRegister,
    memory: Memory,
    stack: TempStack,
    program: ProgramImage,
    pc: u8,
    state: RunState,
    instructions: u64,
}

impl Default for CPU {
    fn default() -> Self {
        Self::new()
    }
}

impl CPU {
    pub fn new() -> Self {
        let mut flags = FlagRegister::new();
        flags.clear_all();
        CPU {
            registers: RegisterFile::new(),
            flags,
            memory: Memory::new(),
            stack: TempStack::new(),
            program: ProgramImage::default(),
            pc: 0,
            state: RunState::Fetch,
            instructions: 0,
        }
    }

    pub fn with_program(program: ProgramImage) -> Self {
        let mut cpu = Self::new();
        cpu.program = program;
        cpu
    }

    /// Installs a new program and resets the control unit. Memory is kept.
    pub fn load_program(&mut self, program: ProgramImage) {
        self.program = program;
        self.reset();
    }

    /// Clears registers, flags, the temporary stack and the program counter.
    pub fn reset(&mut self) {
        self.registers = RegisterFile::new();
        self.flags.clear_all();
        self.stack.clear();
        self.pc = 0;
        self.state = RunState::Fetch;
        self.instructions = 0;
    }

    pub fn clear_memory(&mut self) {
        self.memory.clear();
    }

    /// Runs one fetch/decode/execute cycle. Returns `None` once halted.
    ///
    /// On a fault the program counter is left pointing at the failing
    /// instruction's opcode byte.
    pub fn step(&mut self, input: &mut dyn InputSource) -> Result<Option<StepEvent>> {
        if self.state == RunState::Halted {
            return Ok(None);
        }

        let start_pc = self.pc;
        let timer = Timer::new();
        let mut opcode = None;

        match self.cycle(input, &mut opcode) {
            Ok(event) => {
                self.instructions += 1;
                record_instruction(event.opcode.byte(), event.mnemonic, timer.elapsed());
                debug!(
                    target: LOG_TARGET,
                    pc = event.pc,
                    instruction = event.mnemonic,
                    next_pc = event.next_pc,
                    "executed"
                );
                Ok(Some(event))
            }
            Err(fault) => {
                self.pc = start_pc;
                self.state = RunState::Fetch;
                record_fault(fault.kind());
                warn!(target: LOG_TARGET, pc = start_pc, ?opcode, %fault, "instruction faulted");
                Err(CpuError {
                    pc: start_pc,
                    opcode,
                    fault,
                })
            }
        }
    }

    /// Steps until END, a fault, or `max_steps` instructions.
    pub fn run<F>(
        &mut self,
        input: &mut dyn InputSource,
        max_steps: Option<u64>,
        mut observer: F,
    ) -> Result<RunSummary>
    where
        F: FnMut(&StepEvent),
    {
        let mut steps = 0;
        while !self.is_halted() && max_steps.map_or(true, |max| steps < max) {
            match self.step(input)? {
                Some(event) => {
                    observer(&event);
                    steps += 1;
                }
                None => break,
            }
        }

        Ok(RunSummary {
            steps_executed: steps,
            halted: self.is_halted(),
            pc: self.pc,
        })
    }

    fn cycle(
        &mut self,
        input: &mut dyn InputSource,
        opcode: &mut Option<u8>,
    ) -> Result<StepEvent, Fault> {
        let pc = self.pc;

        self.state = RunState::Fetch;
        let byte = self.fetch_byte()?;
        *opcode = Some(byte);

        self.state = RunState::Decode;
        let instruction = self.decode(byte)?;

        self.state = RunState::Execute;
        let branch_taken = self.execute(instruction, input)?;

        self.state = match instruction {
            Instruction::Halt => RunState::Halted,
            _ => RunState::Fetch,
        };

        let op = instruction.opcode();
        Ok(StepEvent {
            pc,
            opcode: op,
            mnemonic: op.mnemonic(),
            operands: instruction.operands(),
            branch_taken,
            next_pc: self.pc,
            registers: self.registers.snapshot(),
            flags: self.flags,
        })
    }

    fn fetch_byte(&mut self) -> Result<u8, Fault> {
        let byte = self.program.fetch(self.pc)?;
        self.pc = self.pc.wrapping_add(1);
        Ok(byte)
    }

    fn fetch_register(&mut self) -> Result<RegisterId, Fault> {
        let selector = self.fetch_byte()?;
        Ok(RegisterId::try_from(selector)?)
    }

    fn decode(&mut self, byte: u8) -> Result<Instruction, Fault> {
        let opcode = Opcode::try_from(byte)?;

        let instruction = match opcode {
            Opcode::Add => Instruction::Add {
                dst: self.fetch_register()?,
                src: self.fetch_register()?,
            },
            Opcode::Sub => Instruction::Sub {
                dst: self.fetch_register()?,
                src: self.fetch_register()?,
            },
            Opcode::AddWithCarry => Instruction::AddWithCarry {
                dst: self.fetch_register()?,
                src: self.fetch_register()?,
            },
            Opcode::And => Instruction::And {
                dst: self.fetch_register()?,
                src: self.fetch_register()?,
            },
            Opcode::Or => Instruction::Or {
                dst: self.fetch_register()?,
                src: self.fetch_register()?,
            },
            Opcode::Xor => Instruction::Xor {
                dst: self.fetch_register()?,
                src: self.fetch_register()?,
            },
            Opcode::Inc => Instruction::Inc {
                reg: self.fetch_register()?,
            },
            Opcode::ShiftLeft => Instruction::ShiftLeft {
                reg: self.fetch_register()?,
            },
            Opcode::ShiftRight => Instruction::ShiftRight {
                reg: self.fetch_register()?,
            },
            Opcode::Complement => Instruction::Complement {
                reg: self.fetch_register()?,
            },
            Opcode::ReadIo => Instruction::ReadIo {
                dst: self.fetch_register()?,
            },
            Opcode::LoadDirect => Instruction::LoadDirect {
                dst: self.fetch_register()?,
                address: self.fetch_byte()?,
            },
            Opcode::Store => Instruction::Store {
                src: self.fetch_register()?,
                address: self.fetch_byte()?,
            },
            Opcode::BranchIfZero => Instruction::BranchIfZero {
                target: self.fetch_byte()?,
            },
            Opcode::BranchIfCarry => Instruction::BranchIfCarry {
                target: self.fetch_byte()?,
            },
            Opcode::Halt => Instruction::Halt,
        };
        Ok(instruction)
    }

    fn alu(&mut self) -> ArithmeticUnit<'_> {
        ArithmeticUnit::new(
            &mut self.registers,
            &mut self.flags,
            &mut self.memory,
            &mut self.stack,
        )
    }

    fn arithmetic<F>(&mut self, dst: RegisterId, src: RegisterId, op: F) -> Result<(), Fault>
    where
        F: FnOnce(&mut ArithmeticUnit<'_>, u8, u8) -> Result<u8, Fault>,
    {
        let (a, b) = (self.registers.read(dst), self.registers.read(src));
        let result = op(&mut self.alu(), a, b)?;
        self.registers.load(dst, result);
        Ok(())
    }

    fn bitwise(&mut self, dst: RegisterId, src: RegisterId, op: fn(u8, u8) -> u8) {
        let result = op(self.registers.read(dst), self.registers.read(src));
        self.registers.load(dst, result);
    }

    // Returns whether a branch was taken
    fn execute(&mut self, instruction: Instruction, input: &mut dyn InputSource) -> Result<bool, Fault> {
        match instruction {
            Instruction::Add { dst, src } => self.arithmetic(dst, src, |alu, a, b| alu.add(a, b))?,
            Instruction::Sub { dst, src } => {
                self.arithmetic(dst, src, |alu, a, b| alu.subtract(a, b))?
            }
            Instruction::AddWithCarry { dst, src } => {
                self.arithmetic(dst, src, |alu, a, b| alu.add_with_carry(a, b))?
            }
            Instruction::Inc { reg } => {
                let value = self.registers.read(reg);
                let result = self.alu().increment(value);
                self.registers.load(reg, result);
            }
            Instruction::LoadDirect { dst, address } => {
                let value = self.memory.read(address)?;
                self.registers.load(dst, value);
            }
            Instruction::ReadIo { dst } => {
                let value = input.read_value()?;
                self.registers.load(dst, value);
            }
            Instruction::Store { src, address } => {
                self.registers.store_to_memory(src, &mut self.memory, address)?;
            }
            Instruction::ShiftLeft { reg } => self.registers.shift_left(reg),
            Instruction::ShiftRight { reg } => self.registers.shift_right(reg),
            Instruction::And { dst, src } => self.bitwise(dst, src, logic::and),
            Instruction::Or { dst, src } => self.bitwise(dst, src, logic::or),
            Instruction::Xor { dst, src } => self.bitwise(dst, src, logic::xor),
            Instruction::Complement { reg } => {
                let result = logic::complement(self.registers.read(reg));
                self.registers.load(reg, result);
            }
            Instruction::BranchIfZero { target } => return Ok(self.branch_if(self.flags.zero(), target)),
            Instruction::BranchIfCarry { target } => {
                return Ok(self.branch_if(self.flags.carry(), target))
            }
            Instruction::Halt => {}
        }
        Ok(false)
    }

    // Absolute target; the untaken path has already stepped past the operand
    fn branch_if(&mut self, condition: bool, target: u8) -> bool {
        if condition {
            self.pc = target;
        }
        condition
    }

    // Getters
    pub fn register(&self, id: RegisterId) -> u8 { self.registers.read(id) }
    pub fn registers(&self) -> &RegisterFile { &self.registers }
    pub fn flags(&self) -> &FlagRegister { &self.flags }
    pub fn memory(&self) -> &Memory { &self.memory }
    pub fn program(&self) -> &ProgramImage { &self.program }
    pub fn stack(&self) -> &TempStack { &self.stack }
    pub fn pc(&self) -> u8 { self.pc }
    pub fn state(&self) -> RunState { self.state }
    pub fn is_halted(&self) -> bool { self.state == RunState::Halted }
    pub fn instructions_executed(&self) -> u64 { self.instructions }

    // Direct state access for drivers and tests
    pub fn registers_mut(&mut self) -> &mut RegisterFile { &mut self.registers }
    pub fn flags_mut(&mut self) -> &mut FlagRegister { &mut self.flags }
    pub fn memory_mut(&mut self) -> &mut Memory { &mut self.memory }
}
