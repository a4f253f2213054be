//! The instruction-semantics core: one pure function per architectural
//! operation, grouped by family (§4.1). Everything here is free of I/O and
//! free of control flow beyond what the operation itself defines --
//! memory access goes through [`crate::mem::CpuBus`], and looping/operand
//! resolution is the dispatcher's job (§4.3).

pub mod bittest;
pub mod bitwise;
#[cfg(feature = "checked")]
pub mod checked;
pub mod host;
pub mod int_arith;
pub mod scan;
pub mod shift_rotate;
pub mod simd;
pub mod string_ops;
pub mod x87;

pub use crate::state::RoundingMode;

/// Clears the sticky x87 exception-status bits (IE/DE/ZE/OE/UE/PE/SF,
/// bits 0-6) this interpreter tracks but never causes to trap (§3, §4.1.7
/// -- masked-exception convention). TOP and the condition-code bits are
/// left untouched.
pub fn clear_exception_flags(status: &mut crate::state::X87Status) {
    status.0 &= !0x007F;
}

pub fn set_rounding_mode(control: &mut crate::state::X87Control, mode: RoundingMode) {
    control.set_rounding_mode(mode);
}
