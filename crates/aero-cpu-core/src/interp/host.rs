//! Host-primitive bridge. A handful of operations -- extended-precision
//! rounding, signed division, `cpuid`/`xgetbv` -- are cheaper and more
//! faithful to delegate to the real host CPU than to reimplement in
//! software, so on `x86_64` this module reaches for inline asm and
//! intrinsics; everywhere else it falls back to a pure-software
//! approximation so the crate still builds and the self-check layer simply
//! has nothing to compare against off-target.

use aero_types::F80;

use crate::state::RoundingMode;

#[cfg(target_arch = "x86_64")]
fn with_x87_rounding<T>(mode: RoundingMode, f: impl FnOnce() -> T) -> T {
    use std::arch::asm;

    let rc: u16 = match mode {
        RoundingMode::Nearest => 0b00,
        RoundingMode::Down => 0b01,
        RoundingMode::Up => 0b10,
        RoundingMode::TowardZero => 0b11,
    };

    unsafe {
        let mut saved_cw: u16 = 0;
        asm!("fnstcw [{0}]", in(reg) &mut saved_cw, options(nostack));
        let new_cw = (saved_cw & !0x0C00) | (rc << 10);
        asm!("fldcw [{0}]", in(reg) &new_cw, options(nostack, readonly));
        let result = f();
        asm!("fldcw [{0}]", in(reg) &saved_cw, options(nostack, readonly));
        result
    }
}

/// Round an extended-precision value to the nearest representable integer,
/// under the given rounding mode (§4.1.7 `frndint`).
#[cfg(target_arch = "x86_64")]
pub fn round_to_int_f80(value: F80, mode: RoundingMode) -> F80 {
    use std::arch::asm;

    with_x87_rounding(mode, || unsafe {
        let bytes = value.to_bytes();
        let mut out = [0u8; 10];
        asm!(
            "fldt [{src}]",
            "frndint",
            "fstpt [{dst}]",
            src = in(reg) &bytes,
            dst = in(reg) &mut out,
        );
        F80::from_bytes(out)
    })
}

#[cfg(not(target_arch = "x86_64"))]
pub fn round_to_int_f80(value: F80, mode: RoundingMode) -> F80 {
    let as_f64 = value.to_f64();
    let rounded = match mode {
        RoundingMode::Nearest => {
            let floor = as_f64.floor();
            let diff = as_f64 - floor;
            if diff > 0.5 || (diff == 0.5 && (floor as i64) % 2 != 0) {
                floor + 1.0
            } else {
                floor
            }
        }
        RoundingMode::Down => as_f64.floor(),
        RoundingMode::Up => as_f64.ceil(),
        RoundingMode::TowardZero => as_f64.trunc(),
    };
    F80::from_f64(rounded)
}

macro_rules! x87_binop {
    ($name:ident, $op:literal) => {
        #[cfg(target_arch = "x86_64")]
        pub fn $name(a: F80, b: F80, mode: RoundingMode) -> F80 {
            use std::arch::asm;

            with_x87_rounding(mode, || unsafe {
                let a_bytes = a.to_bytes();
                let b_bytes = b.to_bytes();
                let mut out = [0u8; 10];
                asm!(
                    "fldt [{a}]",
                    "fldt [{b}]",
                    $op,
                    "fstpt [{dst}]",
                    a = in(reg) &a_bytes,
                    b = in(reg) &b_bytes,
                    dst = in(reg) &mut out,
                );
                F80::from_bytes(out)
            })
        }
    };
}

x87_binop!(fadd80_host, "faddp");
x87_binop!(fsub80_host, "fsubp");
x87_binop!(fmul80_host, "fmulp");
x87_binop!(fdiv80_host, "fdivp");

/// Software fallback for non-`x86_64` targets: round-trips through `f64`.
/// This loses precision relative to genuine 80-bit extended arithmetic but
/// keeps the crate portable; the checked self-cross-validation layer is a
/// no-op off `x86_64` for the same reason (§4.2).
#[cfg(not(target_arch = "x86_64"))]
macro_rules! x87_binop_fallback {
    ($name:ident, $op:tt) => {
        pub fn $name(a: F80, b: F80, _mode: RoundingMode) -> F80 {
            F80::from_f64(a.to_f64() $op b.to_f64())
        }
    };
}

#[cfg(not(target_arch = "x86_64"))]
x87_binop_fallback!(fadd80_host, +);
#[cfg(not(target_arch = "x86_64"))]
x87_binop_fallback!(fsub80_host, -);
#[cfg(not(target_arch = "x86_64"))]
x87_binop_fallback!(fmul80_host, *);
#[cfg(not(target_arch = "x86_64"))]
x87_binop_fallback!(fdiv80_host, /);

/// Signed divide bridge matching the unsigned `div_family` contract:
/// `(dividend_upper, dividend_lower, divisor) -> (quotient, remainder)`.
/// Implemented in plain Rust on every target -- `idiv` needs no host
/// assistance, since `i128` widening already gives bit-exact results; the
/// "host bridge" framing in the reference material is about reusing the
/// host's `idiv` instruction for speed in a JIT, which doesn't apply to a
/// semantic reference layer.
pub fn idiv32(dividend_upper: i32, dividend_lower: u32, divisor: i32) -> (i32, i32) {
    assert!(divisor != 0, "division by zero reached the semantic primitive");
    let dividend = ((dividend_upper as i64) << 32) | (dividend_lower as i64 & 0xFFFF_FFFF);
    let quotient = dividend / (divisor as i64);
    let remainder = dividend % (divisor as i64);
    assert!(
        quotient >= i32::MIN as i64 && quotient <= i32::MAX as i64,
        "quotient does not fit in the destination width"
    );
    (quotient as i32, remainder as i32)
}

pub fn idiv64(dividend_upper: i64, dividend_lower: u64, divisor: i64) -> (i64, i64) {
    assert!(divisor != 0, "division by zero reached the semantic primitive");
    let dividend = ((dividend_upper as i128) << 64) | (dividend_lower as i128 & 0xFFFF_FFFF_FFFF_FFFF);
    let quotient = dividend / (divisor as i128);
    let remainder = dividend % (divisor as i128);
    assert!(
        quotient >= i64::MIN as i128 && quotient <= i64::MAX as i128,
        "quotient does not fit in the destination width"
    );
    (quotient as i64, remainder as i64)
}

/// `cpuid` passthrough, masked to the feature bits this interpreter
/// actually implements (SSE through SSE4.2; no AVX, no extended state
/// beyond legacy `fxsave`).
#[cfg(target_arch = "x86_64")]
pub fn cpuid(leaf: u32, subleaf: u32) -> (u32, u32, u32, u32) {
    use std::arch::x86_64::__cpuid_count;

    let result = unsafe { __cpuid_count(leaf, subleaf) };
    let mut ecx = result.ecx;
    if leaf == 1 {
        // Mask off AVX (ecx bit 28) and XSAVE (ecx bit 26); this
        // interpreter never models state this crate doesn't implement.
        ecx &= !(1 << 28 | 1 << 26);
    }
    (result.eax, result.ebx, ecx, result.edx)
}

#[cfg(not(target_arch = "x86_64"))]
pub fn cpuid(_leaf: u32, _subleaf: u32) -> (u32, u32, u32, u32) {
    (0, 0, 0, 0)
}

#[cfg(target_arch = "x86_64")]
pub fn xgetbv(index: u32) -> u64 {
    use std::arch::x86_64::_xgetbv;
    unsafe { _xgetbv(index) }
}

#[cfg(not(target_arch = "x86_64"))]
pub fn xgetbv(_index: u32) -> u64 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idiv32_matches_div32_magnitude() {
        let (q, r) = idiv32(0, 100u32, 7);
        assert_eq!(q, 14);
        assert_eq!(r, 2);
    }

    #[test]
    fn idiv32_negative_dividend() {
        let (q, r) = idiv32(-1, (-100i32) as u32, 7);
        assert_eq!(q, -14);
        assert_eq!(r, -2);
    }

    #[test]
    #[should_panic]
    fn idiv64_by_zero_panics() {
        idiv64(0, 1, 0);
    }
}
