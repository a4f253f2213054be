use aero_cpu_core::mem::FlatTestBus;
use aero_cpu_core::{Cpu, Tier0Config};
use aero_x86::{Instruction, MemOperand, Mnemonic, Operand, RepPrefix, Register};

fn new_cpu() -> Cpu {
    Cpu::new(Tier0Config::default())
}

#[test]
fn rep_movsb_copies_the_whole_block() {
    let mut bus = FlatTestBus::new(64);
    bus.load(0, b"hello!!!");
    let mut cpu = new_cpu();
    cpu.state.set_gpr(Register::RSI, 0);
    cpu.state.set_gpr(Register::RDI, 16);
    cpu.state.set_gpr(Register::RCX, 8);
    let insn = Instruction::new(Mnemonic::Movs)
        .with_operand(0, Operand::Mem(MemOperand::flat(0, 8)))
        .with_rep(RepPrefix::Rep);
    cpu.exec(&mut bus, &insn).unwrap();
    assert_eq!(cpu.state.gpr(Register::RCX), 0);
    assert_eq!(cpu.state.gpr(Register::RSI), 8);
    assert_eq!(cpu.state.gpr(Register::RDI), 24);
    let mut out = [0u8; 8];
    for (i, b) in out.iter_mut().enumerate() {
        *b = bus.read_u8(16 + i as u64).unwrap();
    }
    assert_eq!(&out, b"hello!!!");
}

#[test]
fn repnz_scasb_stops_on_first_match() {
    let mut bus = FlatTestBus::new(64);
    bus.load(0, &[1, 2, 3, 9, 5]);
    let mut cpu = new_cpu();
    cpu.state.set_gpr(Register::RDI, 0);
    cpu.state.set_gpr(Register::RAX, 9);
    cpu.state.set_gpr(Register::RCX, 5);
    let insn = Instruction::new(Mnemonic::Scas)
        .with_operand(0, Operand::Mem(MemOperand::flat(0, 8)))
        .with_rep(RepPrefix::Repnz);
    cpu.exec(&mut bus, &insn).unwrap();
    assert_eq!(cpu.state.gpr(Register::RDI), 4);
    assert_eq!(cpu.state.gpr(Register::RCX), 1);
}
