use aero_cpu_core::mem::FlatTestBus;
use aero_cpu_core::{Cpu, Tier0Config};
use aero_types::Simd128Ext;
use aero_x86::{Instruction, MemOperand, Mnemonic, Operand};

fn new_sse_cpu() -> Cpu {
    Cpu::new(Tier0Config::default())
}

#[test]
fn movaps_faults_on_misaligned_memory_operand() {
    let mut bus = FlatTestBus::new(64);
    let mut cpu = new_sse_cpu();
    cpu.state.sse.xmm[0] = 0xDEAD_BEEF;
    let insn = Instruction::new(Mnemonic::Movaps)
        .with_operand(0, Operand::Mem(MemOperand::flat(1, 128)))
        .with_operand(1, Operand::Xmm(0));
    assert!(cpu.exec(&mut bus, &insn).is_err());
}

#[test]
fn movaps_succeeds_on_aligned_memory_operand() {
    let mut bus = FlatTestBus::new(64);
    let mut cpu = new_sse_cpu();
    cpu.state.sse.xmm[0] = 0x1234_5678_9ABC_DEF0;
    let insn = Instruction::new(Mnemonic::Movaps)
        .with_operand(0, Operand::Mem(MemOperand::flat(16, 128)))
        .with_operand(1, Operand::Xmm(0));
    cpu.exec(&mut bus, &insn).unwrap();
    assert_eq!(bus.read_u128(16).unwrap(), 0x1234_5678_9ABC_DEF0);
}

#[test]
fn pxor_self_clears_register() {
    let mut bus = FlatTestBus::new(64);
    let mut cpu = new_sse_cpu();
    cpu.state.sse.xmm[2] = u128::MAX;
    let insn = Instruction::new(Mnemonic::Pxor)
        .with_operand(0, Operand::Xmm(2))
        .with_operand(1, Operand::Xmm(2));
    cpu.exec(&mut bus, &insn).unwrap();
    assert_eq!(cpu.state.sse.xmm[2], 0);
}

#[test]
fn cvtsi2sd_then_cvttsd2si_round_trips_small_integers() {
    let mut bus = FlatTestBus::new(64);
    let mut cpu = new_sse_cpu();
    let xmm = 0u128.with_lane_f64(0, 42.0);
    cpu.state.sse.xmm[0] = xmm;
    assert_eq!(aero_cpu_core::interp::simd::cvttsd2si(cpu.state.sse.xmm[0]), 42);
    let _ = &mut bus;
}
