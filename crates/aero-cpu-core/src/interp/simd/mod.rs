//! §4.1.8 SIMD family (SSE through SSE4.2). Each sub-module covers one
//! functional group; functions take and return plain `u128` packed values
//! ([`aero_types::Simd128Ext`] supplies the lane views) so callers can
//! store them directly in `SseState::xmm`.

mod arith;
mod compare;
mod convert;
mod mask;
mod pack;
mod shift;
mod shuffle;

pub use arith::*;
pub use compare::*;
pub use convert::*;
pub use mask::*;
pub use pack::*;
pub use shift::*;
pub use shuffle::*;
