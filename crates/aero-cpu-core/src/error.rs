/// Faults a guest program can legitimately trigger (§7, kind 4): distinct
/// from the fatal invariant violations in `panic!`, these are normal,
/// recoverable-by-the-embedding-VM events delivered through `CpuBus` and
/// `Cpu::step`.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    #[error("#GP(0): general protection fault")]
    GeneralProtection,
    #[error("#PF: page/bounds fault accessing guest memory")]
    MemoryFault,
    #[error("#AC: alignment check on an explicitly-aligned access")]
    AlignmentCheck,
    #[error("#DE: divide error")]
    DivideError,
}

impl Exception {
    pub fn gp0() -> Self {
        Exception::GeneralProtection
    }
}
