//! Typed decoded-instruction model consumed by `aero-cpu-core::Cpu::exec`.
//! This crate defines the *shape* of a decoded instruction (§6 External
//! interfaces); it does not parse machine code into that shape -- decoding
//! is an external collaborator referenced only by this interface.

mod instruction;
mod register;

pub use instruction::{CmpPredicate, Instruction, MemOperand, Mnemonic, Operand, Prefixes, RepPrefix};
pub use register::Register;
