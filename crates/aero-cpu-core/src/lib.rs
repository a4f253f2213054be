//! The instruction-semantics core of the emulator: a pure per-operation
//! model (`interp`), the architectural state it operates on (`state`),
//! the memory collaborator contract it reads/writes through (`mem`), and
//! the dispatcher that ties decoded instructions to all three
//! (`dispatch`).

pub mod dispatch;
pub mod error;
pub mod interp;
pub mod mem;
pub mod state;

pub use dispatch::{Cpu, Tier0Config};
pub use error::Exception;
pub use mem::{CpuBus, FlatTestBus};
pub use state::{CpuState, RFlags, RoundingMode, SseState, X87State};
