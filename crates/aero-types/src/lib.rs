//! Fixed-width primitive containers shared by the interpreter core: the
//! 80-bit x87 extended-precision float and lane views over a 128-bit packed
//! SIMD value. Everything here is pure data plus bit manipulation -- no
//! flags, no rounding-mode state, no host bridging.

mod f80;
mod simd128;

pub use f80::F80;
pub use simd128::Simd128Ext;
