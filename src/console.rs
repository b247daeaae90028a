//! Text frames for the interactive runner.

use crate::opcodes::{Opcode, Operand};
use crate::trace::StepEvent;

const BANNER: &str = "***************************************";
const RULE: &str = "_______________________________________";

fn operand_label(operand: &Operand) -> String {
    match operand {
        Operand::Register(id) => id.name().to_string(),
        Operand::Address(address) => format!("MEM[{}]", address),
        Operand::Target(target) => target.to_string(),
    }
}

/// Header line naming the instruction. STR lists its memory operand first.
pub fn render_instruction(event: &StepEvent) -> String {
    let mut labels: Vec<String> = event.operands.iter().map(operand_label).collect();
    if event.opcode == Opcode::Store {
        labels.reverse();
    }

    let mut line = event.mnemonic.to_string();
    for label in labels {
        line.push(' ');
        line.push_str(&label);
    }
    format!("{}\n{}\n", BANNER, line)
}

/// Register and flag table after the instruction.
pub fn render_state(event: &StepEvent) -> String {
    let r = &event.registers;
    let f = &event.flags;
    format!(
        "{rule}\nA {}\tB {}\tC {}\tD {}\tE {}\n{rule}\nC {} Z {} V {} N {}\n{banner}\n",
        r.a,
        r.b,
        r.c,
        r.d,
        r.e,
        f.carry(),
        f.zero(),
        f.overflow(),
        f.negative(),
        rule = RULE,
        banner = BANNER,
    )
}

pub fn render_step(event: &StepEvent) -> String {
    format!("{}{}", render_instruction(event), render_state(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::FlagRegister;
    use crate::registers::{RegisterId, RegisterSnapshot};

    fn event(opcode: Opcode, operands: Vec<Operand>) -> StepEvent {
        StepEvent {
            pc: 0,
            opcode,
            mnemonic: opcode.mnemonic(),
            operands,
            branch_taken: false,
            next_pc: 3,
            registers: RegisterSnapshot { a: 7, b: 4, ..Default::default() },
            flags: FlagRegister::new(),
        }
    }

    #[test]
    fn test_render_two_register_instruction() {
        let ev = event(
            Opcode::Add,
            vec![Operand::Register(RegisterId::A), Operand::Register(RegisterId::B)],
        );
        assert!(render_instruction(&ev).ends_with("ADD A B\n"));
    }

    #[test]
    fn test_store_lists_memory_first() {
        let ev = event(
            Opcode::Store,
            vec![Operand::Register(RegisterId::C), Operand::Address(20)],
        );
        assert!(render_instruction(&ev).ends_with("STR MEM[20] C\n"));
    }

    #[test]
    fn test_render_state_table() {
        let ev = event(Opcode::Halt, Vec::new());
        let text = render_state(&ev);
        assert!(text.contains("A 7\tB 4\tC 0\tD 0\tE 0"));
        assert!(text.contains("C false Z false V false N false"));
    }
}
