use cpu8_emulator::error::{BoundsError, Fault};
use cpu8_emulator::{Opcode, ProgramImage, RegisterId, ScriptedInput, CPU};

fn load(program: &[u8]) -> CPU {
    CPU::with_program(ProgramImage::new(program).unwrap())
}

#[test]
fn test_simple_calculation() {
    // LDD A, MEM[5] ; LDD B, MEM[6] ; ADD A, B ; END
    let mut cpu = load(&[0x04, 0xF0, 0x05, 0x04, 0xF1, 0x06, 0x00, 0xF0, 0xF1, 0x10]);
    cpu.memory_mut().write(5, 3).unwrap();
    cpu.memory_mut().write(6, 4).unwrap();

    let summary = cpu.run(&mut ScriptedInput::default(), None, |_| {}).unwrap();

    assert!(summary.halted);
    assert_eq!(cpu.register(RegisterId::A), 7);
    assert!(!cpu.flags().carry());
    assert!(!cpu.flags().zero());
    assert!(!cpu.flags().overflow());
    assert!(!cpu.flags().negative());
    assert_eq!(cpu.memory().read(10), Ok(7));
}

#[test]
fn test_carry_out_of_bit_seven() {
    let mut cpu = load(&[0x04, 0xF0, 0x05, 0x04, 0xF1, 0x06, 0x00, 0xF0, 0xF1, 0x10]);
    cpu.memory_mut().write(5, 200).unwrap();
    cpu.memory_mut().write(6, 100).unwrap();

    cpu.run(&mut ScriptedInput::default(), None, |_| {}).unwrap();

    assert_eq!(cpu.register(RegisterId::A), 44);
    assert!(cpu.flags().carry());
    assert!(!cpu.flags().overflow());
    assert!(!cpu.flags().zero());
    assert!(!cpu.flags().negative());
}

#[test]
fn test_sixteen_bit_add_with_carry() {
    // 0x01F0 + 0x0120 = 0x0310, low bytes in MEM[0]/MEM[2], high in MEM[1]/MEM[3]
    let program = [
        0x04, 0xF0, 0, // LDD A, MEM[0]
        0x04, 0xF1, 2, // LDD B, MEM[2]
        0x00, 0xF0, 0xF1, // ADD A, B
        0x06, 0xF0, 20, // STR A, MEM[20]
        0x04, 0xF2, 1, // LDD C, MEM[1]
        0x04, 0xF3, 3, // LDD D, MEM[3]
        0x02, 0xF2, 0xF3, // ADDC C, D
        0x06, 0xF2, 21, // STR C, MEM[21]
        0x10,
    ];
    let mut cpu = load(&program);
    cpu.memory_mut().load(0, &[0xF0, 0x01, 0x20, 0x01]).unwrap();

    cpu.run(&mut ScriptedInput::default(), None, |_| {}).unwrap();

    assert_eq!(cpu.memory().read(20), Ok(0x10));
    assert_eq!(cpu.memory().read(21), Ok(0x03));
}

#[test]
fn test_read_subtract_and_branch() {
    // READ A ; READ B ; SUB A, B ; BEQ 12 ; INC C ; END ; 12: INC D ; END
    let program = [
        0x05, 0xF0, 0x05, 0xF1, 0x01, 0xF0, 0xF1, 0x0D, 12, 0x03, 0xF2, 0x10, 0x03, 0xF3, 0x10,
    ];

    // equal inputs take the branch
    let mut cpu = load(&program);
    cpu.run(&mut ScriptedInput::new([42, 42]), None, |_| {}).unwrap();
    assert_eq!(cpu.register(RegisterId::A), 0);
    assert_eq!(cpu.register(RegisterId::C), 0);
    assert_eq!(cpu.register(RegisterId::D), 1);

    // 5 - 9 borrows and is negative
    let mut cpu = load(&program);
    cpu.run(&mut ScriptedInput::new([5, 9]), None, |_| {}).unwrap();
    assert_eq!(cpu.register(RegisterId::A), 0xFC);
    assert_eq!(cpu.register(RegisterId::C), 1);
    assert!(!cpu.flags().carry());
    assert!(cpu.flags().negative());
}

#[test]
fn test_events_follow_execution_order() {
    let mut cpu = load(&[0x03, 0xF0, 0x07, 0xF0, 0x10]);
    let mut trace = Vec::new();

    cpu.run(&mut ScriptedInput::default(), None, |event| {
        trace.push((event.pc, event.opcode, event.registers.a))
    })
    .unwrap();

    assert_eq!(
        trace,
        vec![
            (0, Opcode::Inc, 1),
            (2, Opcode::ShiftLeft, 2),
            (4, Opcode::Halt, 2),
        ]
    );
}

#[test]
fn test_missing_end_is_a_bounds_error() {
    let mut cpu = load(&[0x03, 0xF0, 0x03, 0xF0]);
    let err = cpu.run(&mut ScriptedInput::default(), None, |_| {}).unwrap_err();

    assert_eq!(err.pc, 4);
    assert_eq!(err.fault, Fault::Bounds(BoundsError::ProgramCounter(4)));
    assert_eq!(cpu.register(RegisterId::A), 2);
}

#[test]
fn test_listing_file_round_trip() {
    let path = std::env::temp_dir().join(format!("cpu8-listing-{}.mc", std::process::id()));
    std::fs::write(&path, "4\n240\n5\n3\n240\n16\n").unwrap();

    let program = ProgramImage::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let mut cpu = CPU::with_program(program);
    cpu.memory_mut().write(5, 0x7F).unwrap();
    cpu.run(&mut ScriptedInput::default(), None, |_| {}).unwrap();

    assert_eq!(cpu.register(RegisterId::A), 0x80);
    assert!(cpu.is_halted());
}
