//! Self-cross-checking wrapper (§4.2). Each submodule here mirrors the
//! matching pure module name one level up (`checked::int_arith` mirrors
//! `crate::interp::int_arith`, etc.) and re-exports everything from it via
//! `pub use`; a function that this file actually cross-checks is then
//! redefined locally, which shadows the glob-imported pure version for
//! anything calling through `checked::`. `dispatch.rs` binds the module
//! names `int_arith`/`bitwise`/`shift_rotate`/`bittest`/`scan`/`x87`/`simd`
//! to either this module or the plain `interp` one depending on
//! `cfg(debug_assertions)`, so call sites never change.
//!
//! In debug builds on `x86_64`, a cross-checked function re-runs the same
//! operation on the real host CPU -- inline `asm!` for the integer/shift/
//! bit/scan/x87-stack families, `core::arch::x86_64` intrinsics for the
//! SIMD families -- and asserts the host result matches the pure model over
//! whichever flag bits that instruction architecturally defines, before
//! returning the *host*-computed value: that's what real silicon would
//! hand back even if the pure model has a latent bug. Flags this
//! instruction leaves undefined are committed from the pure side unchanged
//! (§4.2 point 6 talks about the *value*; undefined flags are still "don't
//! read this", not "this is also cross-checked"). In release builds, or
//! off `x86_64`, every function here is a zero-cost passthrough to the pure
//! model. A mismatch is logged via `tracing::error!` before the assertion
//! panics, so the divergent inputs survive into whatever log sink the
//! embedding process has configured.

use aero_types::F80;
use aero_x86::CmpPredicate;

use crate::state::RFlags;

fn report_divergence(op: &str, pure: impl std::fmt::Debug, host: impl std::fmt::Debug) {
    tracing::error!(op, ?pure, ?host, "checked interpreter divergence");
}

fn assert_value_match<T: PartialEq + std::fmt::Debug>(op: &str, pure: &T, host: &T) {
    if pure != host {
        report_divergence(op, pure, host);
        panic!("checked interpreter value divergence in {op}");
    }
}

/// Compares `*flags` against `host_bits` over `mask` only, then commits the
/// host's bits for that mask into `*flags`. Bits outside `mask` are left at
/// whatever the pure computation already produced -- this instruction
/// doesn't define them, so there is nothing on the host side worth trusting
/// for them either.
fn cross_check_flags(op: &str, flags: &mut RFlags, host_bits: u64, mask: RFlags) {
    let host_masked = RFlags::from_bits_truncate(host_bits) & mask;
    let pure_masked = *flags & mask;
    if host_masked != pure_masked {
        report_divergence(op, pure_masked, host_masked);
        panic!("checked interpreter flag divergence in {op}");
    }
    *flags = (*flags & !mask) | host_masked;
}

fn mask_arith() -> RFlags {
    RFlags::FLAG_CF | RFlags::FLAG_PF | RFlags::FLAG_ZF | RFlags::FLAG_SF | RFlags::FLAG_OF
}

fn mask_arith_no_carry() -> RFlags {
    RFlags::FLAG_PF | RFlags::FLAG_ZF | RFlags::FLAG_SF | RFlags::FLAG_OF
}

fn mask_carry_overflow() -> RFlags {
    RFlags::FLAG_CF | RFlags::FLAG_OF
}

fn mask_carry() -> RFlags {
    RFlags::FLAG_CF
}

fn mask_zero() -> RFlags {
    RFlags::FLAG_ZF
}

fn mask_carry_zero() -> RFlags {
    RFlags::FLAG_CF | RFlags::FLAG_ZF
}

// ---------------------------------------------------------------------
// Host asm plumbing (integer/shift/bit/scan families). Every helper seeds
// only the flag bits the instruction reads as input (none, for most of
// these -- only ADC/SBB/RCL/RCR read CF in) and captures the full RFLAGS
// via a real `pushfq` right after, so callers mask down to the bits that
// matter before comparing.
// ---------------------------------------------------------------------

macro_rules! host_binop {
    ($fn_name:ident, $insn:literal, $u:ty, $sz:literal) => {
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        fn $fn_name(a: $u, b: $u) -> ($u, u64) {
            let result: $u;
            let rflags: u64;
            unsafe {
                core::arch::asm!(
                    concat!($insn, " {a:", $sz, "}, {b:", $sz, "}"),
                    "pushfq",
                    "pop {flags}",
                    a = inout(reg) a => result,
                    b = in(reg) b,
                    flags = out(reg) rflags,
                );
            }
            (result, rflags)
        }
    };
}

macro_rules! host_binop_carry {
    ($fn_name:ident, $insn:literal, $u:ty, $sz:literal) => {
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        fn $fn_name(a: $u, b: $u, carry_in: bool) -> ($u, u64) {
            let result: $u;
            let rflags: u64;
            let cf_seed: u64 = carry_in as u64;
            unsafe {
                core::arch::asm!(
                    "bt {cf}, 0",
                    concat!($insn, " {a:", $sz, "}, {b:", $sz, "}"),
                    "pushfq",
                    "pop {flags}",
                    cf = in(reg) cf_seed,
                    a = inout(reg) a => result,
                    b = in(reg) b,
                    flags = out(reg) rflags,
                );
            }
            (result, rflags)
        }
    };
}

macro_rules! host_unop {
    ($fn_name:ident, $insn:literal, $u:ty, $sz:literal) => {
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        fn $fn_name(a: $u) -> ($u, u64) {
            let result: $u;
            let rflags: u64;
            unsafe {
                core::arch::asm!(
                    concat!($insn, " {a:", $sz, "}"),
                    "pushfq",
                    "pop {flags}",
                    a = inout(reg) a => result,
                    flags = out(reg) rflags,
                );
            }
            (result, rflags)
        }
    };
}

macro_rules! host_shift {
    ($fn_name:ident, $insn:literal, $u:ty, $sz:literal) => {
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        fn $fn_name(a: $u, count: u8) -> ($u, u64) {
            let result: $u;
            let rflags: u64;
            unsafe {
                core::arch::asm!(
                    concat!($insn, " {a:", $sz, "}, cl"),
                    "pushfq",
                    "pop {flags}",
                    a = inout(reg) a => result,
                    in("cl") count,
                    flags = out(reg) rflags,
                );
            }
            (result, rflags)
        }
    };
}

macro_rules! host_shift_carry {
    ($fn_name:ident, $insn:literal, $u:ty, $sz:literal) => {
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        fn $fn_name(a: $u, count: u8, carry_in: bool) -> ($u, u64) {
            let result: $u;
            let rflags: u64;
            let cf_seed: u64 = carry_in as u64;
            unsafe {
                core::arch::asm!(
                    "bt {cf}, 0",
                    concat!($insn, " {a:", $sz, "}, cl"),
                    "pushfq",
                    "pop {flags}",
                    cf = in(reg) cf_seed,
                    a = inout(reg) a => result,
                    in("cl") count,
                    flags = out(reg) rflags,
                );
            }
            (result, rflags)
        }
    };
}

macro_rules! host_shiftd {
    ($fn_name:ident, $insn:literal, $u:ty, $sz:literal) => {
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        fn $fn_name(dst: $u, src: $u, count: u8) -> ($u, u64) {
            let result: $u;
            let rflags: u64;
            unsafe {
                core::arch::asm!(
                    concat!($insn, " {d:", $sz, "}, {s:", $sz, "}, cl"),
                    "pushfq",
                    "pop {flags}",
                    d = inout(reg) dst => result,
                    s = in(reg) src,
                    in("cl") count,
                    flags = out(reg) rflags,
                );
            }
            (result, rflags)
        }
    };
}

macro_rules! host_bittest {
    ($fn_name:ident, $insn:literal, $u:ty, $sz:literal) => {
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        fn $fn_name(base: $u, index: u32) -> ($u, u64) {
            let idx = index as $u;
            let result: $u;
            let rflags: u64;
            unsafe {
                core::arch::asm!(
                    concat!($insn, " {a:", $sz, "}, {b:", $sz, "}"),
                    "pushfq",
                    "pop {flags}",
                    a = inout(reg) base => result,
                    b = in(reg) idx,
                    flags = out(reg) rflags,
                );
            }
            (result, rflags)
        }
    };
}

macro_rules! host_scan {
    ($fn_name:ident, $insn:literal, $u:ty, $sz:literal) => {
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        fn $fn_name(a: $u) -> ($u, u64) {
            let result: $u;
            let rflags: u64;
            unsafe {
                core::arch::asm!(
                    concat!($insn, " {r:", $sz, "}, {a:", $sz, "}"),
                    "pushfq",
                    "pop {flags}",
                    r = out(reg) result,
                    a = in(reg) a,
                    flags = out(reg) rflags,
                );
            }
            (result, rflags)
        }
    };
}

// ---------------------------------------------------------------------
// int_arith
// ---------------------------------------------------------------------

pub mod int_arith {
    pub use crate::interp::int_arith::*;

    use super::*;

    host_binop!(host_add8, "add", u8, "l");
    host_binop!(host_add16, "add", u16, "x");
    host_binop!(host_add32, "add", u32, "e");
    host_binop!(host_add64, "add", u64, "r");

    host_binop_carry!(host_adc8, "adc", u8, "l");
    host_binop_carry!(host_adc16, "adc", u16, "x");
    host_binop_carry!(host_adc32, "adc", u32, "e");
    host_binop_carry!(host_adc64, "adc", u64, "r");

    host_binop!(host_sub8, "sub", u8, "l");
    host_binop!(host_sub16, "sub", u16, "x");
    host_binop!(host_sub32, "sub", u32, "e");
    host_binop!(host_sub64, "sub", u64, "r");

    host_binop_carry!(host_sbb8, "sbb", u8, "l");
    host_binop_carry!(host_sbb16, "sbb", u16, "x");
    host_binop_carry!(host_sbb32, "sbb", u32, "e");
    host_binop_carry!(host_sbb64, "sbb", u64, "r");

    host_unop!(host_neg8, "neg", u8, "l");
    host_unop!(host_neg16, "neg", u16, "x");
    host_unop!(host_neg32, "neg", u32, "e");
    host_unop!(host_neg64, "neg", u64, "r");

    host_unop!(host_inc8, "inc", u8, "l");
    host_unop!(host_inc16, "inc", u16, "x");
    host_unop!(host_inc32, "inc", u32, "e");
    host_unop!(host_inc64, "inc", u64, "r");

    host_unop!(host_dec8, "dec", u8, "l");
    host_unop!(host_dec16, "dec", u16, "x");
    host_unop!(host_dec32, "dec", u32, "e");
    host_unop!(host_dec64, "dec", u64, "r");

    #[cfg(all(debug_assertions, target_arch = "x86_64"))]
    fn host_mul8(a: u8, b: u8) -> (u8, u8, u64) {
        let ax_in: u16 = a as u16;
        let ax_out: u16;
        let rflags: u64;
        unsafe {
            core::arch::asm!(
                "mul {b}",
                "pushfq",
                "pop {flags}",
                inout("ax") ax_in => ax_out,
                b = in(reg_byte) b,
                flags = out(reg) rflags,
            );
        }
        ((ax_out >> 8) as u8, ax_out as u8, rflags)
    }

    #[cfg(all(debug_assertions, target_arch = "x86_64"))]
    fn host_mul16(a: u16, b: u16) -> (u16, u16, u64) {
        let ax_out: u16;
        let dx: u16;
        let rflags: u64;
        unsafe {
            core::arch::asm!(
                "mul {b:x}",
                "pushfq",
                "pop {flags}",
                inout("ax") a => ax_out,
                out("dx") dx,
                b = in(reg) b,
                flags = out(reg) rflags,
            );
        }
        (dx, ax_out, rflags)
    }

    #[cfg(all(debug_assertions, target_arch = "x86_64"))]
    fn host_mul32(a: u32, b: u32) -> (u32, u32, u64) {
        let eax_out: u32;
        let edx: u32;
        let rflags: u64;
        unsafe {
            core::arch::asm!(
                "mul {b:e}",
                "pushfq",
                "pop {flags}",
                inout("eax") a => eax_out,
                out("edx") edx,
                b = in(reg) b,
                flags = out(reg) rflags,
            );
        }
        (edx, eax_out, rflags)
    }

    #[cfg(all(debug_assertions, target_arch = "x86_64"))]
    fn host_mul64(a: u64, b: u64) -> (u64, u64, u64) {
        let rax_out: u64;
        let rdx: u64;
        let rflags: u64;
        unsafe {
            core::arch::asm!(
                "mul {b}",
                "pushfq",
                "pop {flags}",
                inout("rax") a => rax_out,
                out("rdx") rdx,
                b = in(reg) b,
                flags = out(reg) rflags,
            );
        }
        (rdx, rax_out, rflags)
    }

    #[cfg(all(debug_assertions, target_arch = "x86_64"))]
    fn host_imul16(a: u16, b: u16) -> (u16, u16, u64) {
        let ax_out: u16;
        let dx: u16;
        let rflags: u64;
        unsafe {
            core::arch::asm!(
                "imul {b:x}",
                "pushfq",
                "pop {flags}",
                inout("ax") a => ax_out,
                out("dx") dx,
                b = in(reg) b,
                flags = out(reg) rflags,
            );
        }
        (dx, ax_out, rflags)
    }

    #[cfg(all(debug_assertions, target_arch = "x86_64"))]
    fn host_imul32(a: u32, b: u32) -> (u32, u32, u64) {
        let eax_out: u32;
        let edx: u32;
        let rflags: u64;
        unsafe {
            core::arch::asm!(
                "imul {b:e}",
                "pushfq",
                "pop {flags}",
                inout("eax") a => eax_out,
                out("edx") edx,
                b = in(reg) b,
                flags = out(reg) rflags,
            );
        }
        (edx, eax_out, rflags)
    }

    #[cfg(all(debug_assertions, target_arch = "x86_64"))]
    fn host_imul64(a: u64, b: u64) -> (u64, u64, u64) {
        let rax_out: u64;
        let rdx: u64;
        let rflags: u64;
        unsafe {
            core::arch::asm!(
                "imul {b}",
                "pushfq",
                "pop {flags}",
                inout("rax") a => rax_out,
                out("rdx") rdx,
                b = in(reg) b,
                flags = out(reg) rflags,
            );
        }
        (rdx, rax_out, rflags)
    }

    #[cfg(all(debug_assertions, target_arch = "x86_64"))]
    fn host_div8(upper: u8, lower: u8, divisor: u8) -> (u8, u8) {
        let ax_in: u16 = ((upper as u16) << 8) | (lower as u16);
        let ax_out: u16;
        unsafe {
            core::arch::asm!(
                "div {d}",
                inout("ax") ax_in => ax_out,
                d = in(reg_byte) divisor,
            );
        }
        ((ax_out & 0xFF) as u8, (ax_out >> 8) as u8)
    }

    #[cfg(all(debug_assertions, target_arch = "x86_64"))]
    fn host_div16(upper: u16, lower: u16, divisor: u16) -> (u16, u16) {
        let ax_out: u16;
        let dx_out: u16;
        unsafe {
            core::arch::asm!(
                "div {d:x}",
                inout("ax") lower => ax_out,
                inout("dx") upper => dx_out,
                d = in(reg) divisor,
            );
        }
        (ax_out, dx_out)
    }

    #[cfg(all(debug_assertions, target_arch = "x86_64"))]
    fn host_div32(upper: u32, lower: u32, divisor: u32) -> (u32, u32) {
        let eax_out: u32;
        let edx_out: u32;
        unsafe {
            core::arch::asm!(
                "div {d:e}",
                inout("eax") lower => eax_out,
                inout("edx") upper => edx_out,
                d = in(reg) divisor,
            );
        }
        (eax_out, edx_out)
    }

    #[cfg(all(debug_assertions, target_arch = "x86_64"))]
    fn host_div64(upper: u64, lower: u64, divisor: u64) -> (u64, u64) {
        let rax_out: u64;
        let rdx_out: u64;
        unsafe {
            core::arch::asm!(
                "div {d}",
                inout("rax") lower => rax_out,
                inout("rdx") upper => rdx_out,
                d = in(reg) divisor,
            );
        }
        (rax_out, rdx_out)
    }

    macro_rules! checked_binop {
        ($name:ident, $pure:path, $host:ident, $u:ty, $mask:expr) => {
            pub fn $name(flags: &mut RFlags, dst: $u, src: $u) -> $u {
                let pure_result = $pure(flags, dst, src);
                #[cfg(all(debug_assertions, target_arch = "x86_64"))]
                {
                    let (host_result, bits) = $host(dst, src);
                    assert_value_match(stringify!($name), &pure_result, &host_result);
                    cross_check_flags(stringify!($name), flags, bits, $mask);
                    return host_result;
                }
                #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
                {
                    pure_result
                }
            }
        };
    }

    macro_rules! checked_binop_carry {
        ($name:ident, $pure:path, $host:ident, $u:ty, $mask:expr) => {
            pub fn $name(flags: &mut RFlags, dst: $u, src: $u, carry_in: bool) -> $u {
                let pure_result = $pure(flags, dst, src, carry_in);
                #[cfg(all(debug_assertions, target_arch = "x86_64"))]
                {
                    let (host_result, bits) = $host(dst, src, carry_in);
                    assert_value_match(stringify!($name), &pure_result, &host_result);
                    cross_check_flags(stringify!($name), flags, bits, $mask);
                    return host_result;
                }
                #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
                {
                    pure_result
                }
            }
        };
    }

    macro_rules! checked_unop {
        ($name:ident, $pure:path, $host:ident, $u:ty, $mask:expr) => {
            pub fn $name(flags: &mut RFlags, dst: $u) -> $u {
                let pure_result = $pure(flags, dst);
                #[cfg(all(debug_assertions, target_arch = "x86_64"))]
                {
                    let (host_result, bits) = $host(dst);
                    assert_value_match(stringify!($name), &pure_result, &host_result);
                    cross_check_flags(stringify!($name), flags, bits, $mask);
                    return host_result;
                }
                #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
                {
                    pure_result
                }
            }
        };
    }

    macro_rules! checked_mul {
        ($name:ident, $pure:path, $host:ident, $u:ty) => {
            pub fn $name(flags: &mut RFlags, a: $u, b: $u) -> ($u, $u) {
                let pure_result = $pure(flags, a, b);
                #[cfg(all(debug_assertions, target_arch = "x86_64"))]
                {
                    let (upper, lower, bits) = $host(a, b);
                    assert_value_match(stringify!($name), &pure_result, &(upper, lower));
                    cross_check_flags(stringify!($name), flags, bits, mask_carry_overflow());
                    return (upper, lower);
                }
                #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
                {
                    pure_result
                }
            }
        };
    }

    macro_rules! checked_div {
        ($name:ident, $pure:path, $host:ident, $u:ty) => {
            pub fn $name(dividend_upper: $u, dividend_lower: $u, divisor: $u) -> ($u, $u) {
                let pure_result = $pure(dividend_upper, dividend_lower, divisor);
                #[cfg(all(debug_assertions, target_arch = "x86_64"))]
                {
                    let host_result = $host(dividend_upper, dividend_lower, divisor);
                    assert_value_match(stringify!($name), &pure_result, &host_result);
                    return host_result;
                }
                #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
                {
                    pure_result
                }
            }
        };
    }

    checked_binop!(add8, crate::interp::int_arith::add8, host_add8, u8, mask_arith());
    checked_binop!(add16, crate::interp::int_arith::add16, host_add16, u16, mask_arith());
    checked_binop!(add32, crate::interp::int_arith::add32, host_add32, u32, mask_arith());
    checked_binop!(add64, crate::interp::int_arith::add64, host_add64, u64, mask_arith());

    checked_binop_carry!(adc8, crate::interp::int_arith::adc8, host_adc8, u8, mask_arith());
    checked_binop_carry!(adc16, crate::interp::int_arith::adc16, host_adc16, u16, mask_arith());
    checked_binop_carry!(adc32, crate::interp::int_arith::adc32, host_adc32, u32, mask_arith());
    checked_binop_carry!(adc64, crate::interp::int_arith::adc64, host_adc64, u64, mask_arith());

    checked_binop!(sub8, crate::interp::int_arith::sub8, host_sub8, u8, mask_arith());
    checked_binop!(sub16, crate::interp::int_arith::sub16, host_sub16, u16, mask_arith());
    checked_binop!(sub32, crate::interp::int_arith::sub32, host_sub32, u32, mask_arith());
    checked_binop!(sub64, crate::interp::int_arith::sub64, host_sub64, u64, mask_arith());

    checked_binop_carry!(sbb8, crate::interp::int_arith::sbb8, host_sbb8, u8, mask_arith());
    checked_binop_carry!(sbb16, crate::interp::int_arith::sbb16, host_sbb16, u16, mask_arith());
    checked_binop_carry!(sbb32, crate::interp::int_arith::sbb32, host_sbb32, u32, mask_arith());
    checked_binop_carry!(sbb64, crate::interp::int_arith::sbb64, host_sbb64, u64, mask_arith());

    checked_unop!(neg8, crate::interp::int_arith::neg8, host_neg8, u8, mask_arith());
    checked_unop!(neg16, crate::interp::int_arith::neg16, host_neg16, u16, mask_arith());
    checked_unop!(neg32, crate::interp::int_arith::neg32, host_neg32, u32, mask_arith());
    checked_unop!(neg64, crate::interp::int_arith::neg64, host_neg64, u64, mask_arith());

    checked_unop!(inc8, crate::interp::int_arith::inc8, host_inc8, u8, mask_arith_no_carry());
    checked_unop!(inc16, crate::interp::int_arith::inc16, host_inc16, u16, mask_arith_no_carry());
    checked_unop!(inc32, crate::interp::int_arith::inc32, host_inc32, u32, mask_arith_no_carry());
    checked_unop!(inc64, crate::interp::int_arith::inc64, host_inc64, u64, mask_arith_no_carry());

    checked_unop!(dec8, crate::interp::int_arith::dec8, host_dec8, u8, mask_arith_no_carry());
    checked_unop!(dec16, crate::interp::int_arith::dec16, host_dec16, u16, mask_arith_no_carry());
    checked_unop!(dec32, crate::interp::int_arith::dec32, host_dec32, u32, mask_arith_no_carry());
    checked_unop!(dec64, crate::interp::int_arith::dec64, host_dec64, u64, mask_arith_no_carry());

    checked_mul!(mul8, crate::interp::int_arith::mul8, host_mul8, u8);
    checked_mul!(mul16, crate::interp::int_arith::mul16, host_mul16, u16);
    checked_mul!(mul32, crate::interp::int_arith::mul32, host_mul32, u32);
    checked_mul!(mul64, crate::interp::int_arith::mul64, host_mul64, u64);

    checked_mul!(imul16, crate::interp::int_arith::imul16, host_imul16, u16);
    checked_mul!(imul32, crate::interp::int_arith::imul32, host_imul32, u32);
    checked_mul!(imul64, crate::interp::int_arith::imul64, host_imul64, u64);

    checked_div!(div8, crate::interp::int_arith::div8, host_div8, u8);
    checked_div!(div16, crate::interp::int_arith::div16, host_div16, u16);
    checked_div!(div32, crate::interp::int_arith::div32, host_div32, u32);
    checked_div!(div64, crate::interp::int_arith::div64, host_div64, u64);

    /// `cmp` discards its arithmetic result (§4.1.1); the host-checked
    /// value is still the subtraction, same as the pure model, reusing the
    /// `sub` host helper rather than a separate no-writeback one.
    pub fn cmp8(flags: &mut RFlags, dst: u8, src: u8) -> u8 {
        let pure_result = crate::interp::int_arith::cmp8(flags, dst, src);
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        {
            let (host_result, bits) = host_sub8(dst, src);
            assert_value_match("cmp8", &pure_result, &host_result);
            cross_check_flags("cmp8", flags, bits, mask_arith());
            return host_result;
        }
        #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
        {
            pure_result
        }
    }

    pub fn cmp16(flags: &mut RFlags, dst: u16, src: u16) -> u16 {
        let pure_result = crate::interp::int_arith::cmp16(flags, dst, src);
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        {
            let (host_result, bits) = host_sub16(dst, src);
            assert_value_match("cmp16", &pure_result, &host_result);
            cross_check_flags("cmp16", flags, bits, mask_arith());
            return host_result;
        }
        #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
        {
            pure_result
        }
    }

    pub fn cmp32(flags: &mut RFlags, dst: u32, src: u32) -> u32 {
        let pure_result = crate::interp::int_arith::cmp32(flags, dst, src);
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        {
            let (host_result, bits) = host_sub32(dst, src);
            assert_value_match("cmp32", &pure_result, &host_result);
            cross_check_flags("cmp32", flags, bits, mask_arith());
            return host_result;
        }
        #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
        {
            pure_result
        }
    }

    pub fn cmp64(flags: &mut RFlags, dst: u64, src: u64) -> u64 {
        let pure_result = crate::interp::int_arith::cmp64(flags, dst, src);
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        {
            let (host_result, bits) = host_sub64(dst, src);
            assert_value_match("cmp64", &pure_result, &host_result);
            cross_check_flags("cmp64", flags, bits, mask_arith());
            return host_result;
        }
        #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
        {
            pure_result
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn checked_add32_matches_host() {
            let mut f = RFlags::empty();
            assert_eq!(add32(&mut f, 2, 2), 4);
            assert!(!f.carry());
        }

        #[test]
        fn checked_sub8_borrow_sets_carry() {
            let mut f = RFlags::empty();
            let r = sub8(&mut f, 1, 2);
            assert_eq!(r, 0xFF);
            assert!(f.carry());
        }

        #[test]
        fn checked_mul64_matches_pure_on_full_width_product() {
            let mut f = RFlags::empty();
            let (upper, lower) = mul64(&mut f, u64::MAX, 2);
            assert_eq!((upper, lower), (1, u64::MAX - 1));
            assert!(f.carry());
            assert!(f.overflow());
        }

        #[test]
        fn checked_div32_matches_pure() {
            let (q, r) = div32(0, 100, 7);
            assert_eq!((q, r), (14, 2));
        }
    }
}

// ---------------------------------------------------------------------
// bitwise
// ---------------------------------------------------------------------

pub mod bitwise {
    pub use crate::interp::bitwise::*;

    use super::*;

    host_binop!(host_and8, "and", u8, "l");
    host_binop!(host_and16, "and", u16, "x");
    host_binop!(host_and32, "and", u32, "e");
    host_binop!(host_and64, "and", u64, "r");

    host_binop!(host_or8, "or", u8, "l");
    host_binop!(host_or16, "or", u16, "x");
    host_binop!(host_or32, "or", u32, "e");
    host_binop!(host_or64, "or", u64, "r");

    host_binop!(host_xor8, "xor", u8, "l");
    host_binop!(host_xor16, "xor", u16, "x");
    host_binop!(host_xor32, "xor", u32, "e");
    host_binop!(host_xor64, "xor", u64, "r");

    host_binop!(host_test8, "test", u8, "l");
    host_binop!(host_test16, "test", u16, "x");
    host_binop!(host_test32, "test", u32, "e");
    host_binop!(host_test64, "test", u64, "r");

    macro_rules! checked_logic {
        ($name:ident, $pure:path, $host:ident, $u:ty) => {
            pub fn $name(flags: &mut RFlags, dst: $u, src: $u) -> $u {
                let pure_result = $pure(flags, dst, src);
                #[cfg(all(debug_assertions, target_arch = "x86_64"))]
                {
                    let (host_result, bits) = $host(dst, src);
                    assert_value_match(stringify!($name), &pure_result, &host_result);
                    cross_check_flags(stringify!($name), flags, bits, mask_arith());
                    return host_result;
                }
                #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
                {
                    pure_result
                }
            }
        };
    }

    checked_logic!(and8, crate::interp::bitwise::and8, host_and8, u8);
    checked_logic!(and16, crate::interp::bitwise::and16, host_and16, u16);
    checked_logic!(and32, crate::interp::bitwise::and32, host_and32, u32);
    checked_logic!(and64, crate::interp::bitwise::and64, host_and64, u64);

    checked_logic!(or8, crate::interp::bitwise::or8, host_or8, u8);
    checked_logic!(or16, crate::interp::bitwise::or16, host_or16, u16);
    checked_logic!(or32, crate::interp::bitwise::or32, host_or32, u32);
    checked_logic!(or64, crate::interp::bitwise::or64, host_or64, u64);

    checked_logic!(xor8, crate::interp::bitwise::xor8, host_xor8, u8);
    checked_logic!(xor16, crate::interp::bitwise::xor16, host_xor16, u16);
    checked_logic!(xor32, crate::interp::bitwise::xor32, host_xor32, u32);
    checked_logic!(xor64, crate::interp::bitwise::xor64, host_xor64, u64);

    /// `test` is `and` with the result discarded, same as `cmp`/`sub`.
    pub fn test8(flags: &mut RFlags, dst: u8, src: u8) -> u8 {
        let pure_result = crate::interp::bitwise::test8(flags, dst, src);
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        {
            let (host_result, bits) = host_test8(dst, src);
            assert_value_match("test8", &pure_result, &host_result);
            cross_check_flags("test8", flags, bits, mask_arith());
            return host_result;
        }
        #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
        {
            pure_result
        }
    }

    pub fn test16(flags: &mut RFlags, dst: u16, src: u16) -> u16 {
        let pure_result = crate::interp::bitwise::test16(flags, dst, src);
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        {
            let (host_result, bits) = host_test16(dst, src);
            assert_value_match("test16", &pure_result, &host_result);
            cross_check_flags("test16", flags, bits, mask_arith());
            return host_result;
        }
        #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
        {
            pure_result
        }
    }

    pub fn test32(flags: &mut RFlags, dst: u32, src: u32) -> u32 {
        let pure_result = crate::interp::bitwise::test32(flags, dst, src);
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        {
            let (host_result, bits) = host_test32(dst, src);
            assert_value_match("test32", &pure_result, &host_result);
            cross_check_flags("test32", flags, bits, mask_arith());
            return host_result;
        }
        #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
        {
            pure_result
        }
    }

    pub fn test64(flags: &mut RFlags, dst: u64, src: u64) -> u64 {
        let pure_result = crate::interp::bitwise::test64(flags, dst, src);
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        {
            let (host_result, bits) = host_test64(dst, src);
            assert_value_match("test64", &pure_result, &host_result);
            cross_check_flags("test64", flags, bits, mask_arith());
            return host_result;
        }
        #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
        {
            pure_result
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn checked_and32_matches_host() {
            let mut f = RFlags::empty();
            assert_eq!(and32(&mut f, 0xFF00, 0x0FF0), 0x0F00);
        }

        #[test]
        fn checked_xor64_self_is_zero() {
            let mut f = RFlags::empty();
            assert_eq!(xor64(&mut f, 0xABCD, 0xABCD), 0);
            assert!(f.zero());
        }
    }
}

// ---------------------------------------------------------------------
// shift_rotate
// ---------------------------------------------------------------------

pub mod shift_rotate {
    pub use crate::interp::shift_rotate::*;

    use super::*;

    host_shift!(host_shl8, "shl", u8, "l");
    host_shift!(host_shl16, "shl", u16, "x");
    host_shift!(host_shl32, "shl", u32, "e");
    host_shift!(host_shl64, "shl", u64, "r");

    host_shift!(host_shr8, "shr", u8, "l");
    host_shift!(host_shr16, "shr", u16, "x");
    host_shift!(host_shr32, "shr", u32, "e");
    host_shift!(host_shr64, "shr", u64, "r");

    host_shift!(host_sar8, "sar", u8, "l");
    host_shift!(host_sar16, "sar", u16, "x");
    host_shift!(host_sar32, "sar", u32, "e");
    host_shift!(host_sar64, "sar", u64, "r");

    host_shift!(host_rol8, "rol", u8, "l");
    host_shift!(host_rol16, "rol", u16, "x");
    host_shift!(host_rol32, "rol", u32, "e");
    host_shift!(host_rol64, "rol", u64, "r");

    host_shift!(host_ror8, "ror", u8, "l");
    host_shift!(host_ror16, "ror", u16, "x");
    host_shift!(host_ror32, "ror", u32, "e");
    host_shift!(host_ror64, "ror", u64, "r");

    host_shift_carry!(host_rcl8, "rcl", u8, "l");
    host_shift_carry!(host_rcl16, "rcl", u16, "x");
    host_shift_carry!(host_rcl32, "rcl", u32, "e");
    host_shift_carry!(host_rcl64, "rcl", u64, "r");

    host_shift_carry!(host_rcr8, "rcr", u8, "l");
    host_shift_carry!(host_rcr16, "rcr", u16, "x");
    host_shift_carry!(host_rcr32, "rcr", u32, "e");
    host_shift_carry!(host_rcr64, "rcr", u64, "r");

    host_shiftd!(host_shld32, "shld", u32, "e");
    host_shiftd!(host_shld64, "shld", u64, "r");
    host_shiftd!(host_shrd32, "shrd", u32, "e");
    host_shiftd!(host_shrd64, "shrd", u64, "r");

    /// `shl`/`shr`/`sar`: CF/ZF/SF/PF are always defined once the masked
    /// count is nonzero; OF is only defined at a masked count of exactly 1
    /// (§4.1.3), so it is excluded from the comparison otherwise rather
    /// than asserting on a bit neither side promises to agree on.
    macro_rules! checked_shift {
        ($name:ident, $pure:path, $host:ident, $u:ty, $maskbits:expr) => {
            pub fn $name(flags: &mut RFlags, dst: $u, count: u32) -> $u {
                let pure_result = $pure(flags, dst, count);
                #[cfg(all(debug_assertions, target_arch = "x86_64"))]
                {
                    let masked = count & $maskbits;
                    let (host_result, bits) = $host(dst, count as u8);
                    assert_value_match(stringify!($name), &pure_result, &host_result);
                    if masked != 0 {
                        let mask = if masked == 1 {
                            RFlags::FLAG_CF | RFlags::FLAG_ZF | RFlags::FLAG_SF | RFlags::FLAG_PF | RFlags::FLAG_OF
                        } else {
                            RFlags::FLAG_CF | RFlags::FLAG_ZF | RFlags::FLAG_SF | RFlags::FLAG_PF
                        };
                        cross_check_flags(stringify!($name), flags, bits, mask);
                    }
                    return host_result;
                }
                #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
                {
                    pure_result
                }
            }
        };
    }

    /// `rol`/`ror`: only CF (always) and OF (masked count of 1 only) are
    /// defined; ZF/SF/PF are untouched by the real instruction, same as
    /// the pure model, so they are never part of the comparison here.
    macro_rules! checked_rotate {
        ($name:ident, $pure:path, $host:ident, $u:ty, $maskbits:expr) => {
            pub fn $name(flags: &mut RFlags, dst: $u, count: u32) -> $u {
                let pure_result = $pure(flags, dst, count);
                #[cfg(all(debug_assertions, target_arch = "x86_64"))]
                {
                    let masked = count & $maskbits;
                    let (host_result, bits) = $host(dst, count as u8);
                    assert_value_match(stringify!($name), &pure_result, &host_result);
                    if masked != 0 {
                        let mask = if masked == 1 {
                            RFlags::FLAG_CF | RFlags::FLAG_OF
                        } else {
                            RFlags::FLAG_CF
                        };
                        cross_check_flags(stringify!($name), flags, bits, mask);
                    }
                    return host_result;
                }
                #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
                {
                    pure_result
                }
            }
        };
    }

    /// `rcl`/`rcr`: same flag scope as rotate, but the "defined at count 1"
    /// check is against the *raw* count, matching the pure model's
    /// `(count & mask) == 1` test rather than the post-modulo rotate
    /// amount.
    macro_rules! checked_rotate_carry {
        ($name:ident, $pure:path, $host:ident, $u:ty, $maskbits:expr) => {
            pub fn $name(flags: &mut RFlags, dst: $u, count: u32, carry_in: bool) -> $u {
                let pure_result = $pure(flags, dst, count, carry_in);
                #[cfg(all(debug_assertions, target_arch = "x86_64"))]
                {
                    let masked = count & $maskbits;
                    let (host_result, bits) = $host(dst, count as u8, carry_in);
                    assert_value_match(stringify!($name), &pure_result, &host_result);
                    if masked != 0 {
                        let mask = if masked == 1 {
                            RFlags::FLAG_CF | RFlags::FLAG_OF
                        } else {
                            RFlags::FLAG_CF
                        };
                        cross_check_flags(stringify!($name), flags, bits, mask);
                    }
                    return host_result;
                }
                #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
                {
                    pure_result
                }
            }
        };
    }

    macro_rules! checked_shiftd {
        ($name:ident, $pure:path, $host:ident, $u:ty, $maskbits:expr) => {
            pub fn $name(flags: &mut RFlags, dst: $u, src: $u, count: u32) -> $u {
                let pure_result = $pure(flags, dst, src, count);
                #[cfg(all(debug_assertions, target_arch = "x86_64"))]
                {
                    let masked = count & $maskbits;
                    let (host_result, bits) = $host(dst, src, count as u8);
                    assert_value_match(stringify!($name), &pure_result, &host_result);
                    if masked != 0 {
                        let mask = if masked == 1 {
                            RFlags::FLAG_CF | RFlags::FLAG_ZF | RFlags::FLAG_SF | RFlags::FLAG_PF | RFlags::FLAG_OF
                        } else {
                            RFlags::FLAG_CF | RFlags::FLAG_ZF | RFlags::FLAG_SF | RFlags::FLAG_PF
                        };
                        cross_check_flags(stringify!($name), flags, bits, mask);
                    }
                    return host_result;
                }
                #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
                {
                    pure_result
                }
            }
        };
    }

    checked_shift!(shl8, crate::interp::shift_rotate::shl8, host_shl8, u8, 31);
    checked_shift!(shl16, crate::interp::shift_rotate::shl16, host_shl16, u16, 31);
    checked_shift!(shl32, crate::interp::shift_rotate::shl32, host_shl32, u32, 31);
    checked_shift!(shl64, crate::interp::shift_rotate::shl64, host_shl64, u64, 63);

    checked_shift!(shr8, crate::interp::shift_rotate::shr8, host_shr8, u8, 31);
    checked_shift!(shr16, crate::interp::shift_rotate::shr16, host_shr16, u16, 31);
    checked_shift!(shr32, crate::interp::shift_rotate::shr32, host_shr32, u32, 31);
    checked_shift!(shr64, crate::interp::shift_rotate::shr64, host_shr64, u64, 63);

    checked_shift!(sar8, crate::interp::shift_rotate::sar8, host_sar8, u8, 31);
    checked_shift!(sar16, crate::interp::shift_rotate::sar16, host_sar16, u16, 31);
    checked_shift!(sar32, crate::interp::shift_rotate::sar32, host_sar32, u32, 31);
    checked_shift!(sar64, crate::interp::shift_rotate::sar64, host_sar64, u64, 63);

    checked_rotate!(rol8, crate::interp::shift_rotate::rol8, host_rol8, u8, 31);
    checked_rotate!(rol16, crate::interp::shift_rotate::rol16, host_rol16, u16, 31);
    checked_rotate!(rol32, crate::interp::shift_rotate::rol32, host_rol32, u32, 31);
    checked_rotate!(rol64, crate::interp::shift_rotate::rol64, host_rol64, u64, 63);

    checked_rotate!(ror8, crate::interp::shift_rotate::ror8, host_ror8, u8, 31);
    checked_rotate!(ror16, crate::interp::shift_rotate::ror16, host_ror16, u16, 31);
    checked_rotate!(ror32, crate::interp::shift_rotate::ror32, host_ror32, u32, 31);
    checked_rotate!(ror64, crate::interp::shift_rotate::ror64, host_ror64, u64, 63);

    checked_rotate_carry!(rcl8, crate::interp::shift_rotate::rcl8, host_rcl8, u8, 31);
    checked_rotate_carry!(rcl16, crate::interp::shift_rotate::rcl16, host_rcl16, u16, 31);
    checked_rotate_carry!(rcl32, crate::interp::shift_rotate::rcl32, host_rcl32, u32, 31);
    checked_rotate_carry!(rcl64, crate::interp::shift_rotate::rcl64, host_rcl64, u64, 63);

    checked_rotate_carry!(rcr8, crate::interp::shift_rotate::rcr8, host_rcr8, u8, 31);
    checked_rotate_carry!(rcr16, crate::interp::shift_rotate::rcr16, host_rcr16, u16, 31);
    checked_rotate_carry!(rcr32, crate::interp::shift_rotate::rcr32, host_rcr32, u32, 31);
    checked_rotate_carry!(rcr64, crate::interp::shift_rotate::rcr64, host_rcr64, u64, 63);

    checked_shiftd!(shld32, crate::interp::shift_rotate::shld32, host_shld32, u32, 31);
    checked_shiftd!(shld64, crate::interp::shift_rotate::shld64, host_shld64, u64, 63);
    checked_shiftd!(shrd32, crate::interp::shift_rotate::shrd32, host_shrd32, u32, 31);
    checked_shiftd!(shrd64, crate::interp::shift_rotate::shrd64, host_shrd64, u64, 63);

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn checked_shl32_matches_host_at_count_one() {
            let mut f = RFlags::empty();
            let r = shl32(&mut f, 0x40, 1);
            assert_eq!(r, 0x80);
            assert!(f.overflow());
        }

        #[test]
        fn checked_rcl8_through_carry_matches_host() {
            let mut f = RFlags::empty();
            f.set_carry(true);
            let r = rcl8(&mut f, 0, 1, true);
            assert_eq!(r, 1);
            assert!(!f.carry());
        }

        #[test]
        fn checked_shld32_matches_host() {
            let mut f = RFlags::empty();
            let r = shld32(&mut f, 0, 0xFFFF_FFFF, 8);
            assert_eq!(r, 0xFF);
        }
    }
}

// ---------------------------------------------------------------------
// bittest
// ---------------------------------------------------------------------

pub mod bittest {
    pub use crate::interp::bittest::*;

    use super::*;

    host_bittest!(host_bt16, "bt", u16, "x");
    host_bittest!(host_bt32, "bt", u32, "e");
    host_bittest!(host_bt64, "bt", u64, "r");

    host_bittest!(host_btr16, "btr", u16, "x");
    host_bittest!(host_btr32, "btr", u32, "e");
    host_bittest!(host_btr64, "btr", u64, "r");

    host_bittest!(host_bts16, "bts", u16, "x");
    host_bittest!(host_bts32, "bts", u32, "e");
    host_bittest!(host_bts64, "bts", u64, "r");

    host_bittest!(host_btc16, "btc", u16, "x");
    host_bittest!(host_btc32, "btc", u32, "e");
    host_bittest!(host_btc64, "btc", u64, "r");

    /// `bt` only reads; the only defined flag is CF, which carries the
    /// return value itself.
    macro_rules! checked_bt {
        ($name:ident, $pure:path, $host:ident, $u:ty) => {
            pub fn $name(flags: &mut RFlags, base: $u, index: u32) -> bool {
                let pure_result = $pure(flags, base, index);
                #[cfg(all(debug_assertions, target_arch = "x86_64"))]
                {
                    let (_unused, bits) = $host(base, index);
                    let host_result = RFlags::from_bits_truncate(bits).carry();
                    assert_value_match(stringify!($name), &pure_result, &host_result);
                    cross_check_flags(stringify!($name), flags, bits, mask_carry());
                    return host_result;
                }
                #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
                {
                    pure_result
                }
            }
        };
    }

    macro_rules! checked_bitmod {
        ($name:ident, $pure:path, $host:ident, $u:ty) => {
            pub fn $name(flags: &mut RFlags, base: $u, index: u32) -> $u {
                let pure_result = $pure(flags, base, index);
                #[cfg(all(debug_assertions, target_arch = "x86_64"))]
                {
                    let (host_result, bits) = $host(base, index);
                    assert_value_match(stringify!($name), &pure_result, &host_result);
                    cross_check_flags(stringify!($name), flags, bits, mask_carry());
                    return host_result;
                }
                #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
                {
                    pure_result
                }
            }
        };
    }

    checked_bt!(bt16, crate::interp::bittest::bt16, host_bt16, u16);
    checked_bt!(bt32, crate::interp::bittest::bt32, host_bt32, u32);
    checked_bt!(bt64, crate::interp::bittest::bt64, host_bt64, u64);

    checked_bitmod!(btr16, crate::interp::bittest::btr16, host_btr16, u16);
    checked_bitmod!(btr32, crate::interp::bittest::btr32, host_btr32, u32);
    checked_bitmod!(btr64, crate::interp::bittest::btr64, host_btr64, u64);

    checked_bitmod!(bts16, crate::interp::bittest::bts16, host_bts16, u16);
    checked_bitmod!(bts32, crate::interp::bittest::bts32, host_bts32, u32);
    checked_bitmod!(bts64, crate::interp::bittest::bts64, host_bts64, u64);

    checked_bitmod!(btc16, crate::interp::bittest::btc16, host_btc16, u16);
    checked_bitmod!(btc32, crate::interp::bittest::btc32, host_btc32, u32);
    checked_bitmod!(btc64, crate::interp::bittest::btc64, host_btc64, u64);

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn checked_bt32_matches_host() {
            let mut f = RFlags::empty();
            assert!(bt32(&mut f, 0b100, 2));
            assert!(f.carry());
        }

        #[test]
        fn checked_bts_btr_roundtrip_matches_host() {
            let mut f = RFlags::empty();
            let v = bts32(&mut f, 0, 5);
            assert_eq!(v, 0b10_0000);
            let v2 = btr32(&mut f, v, 5);
            assert_eq!(v2, 0);
        }
    }
}

// ---------------------------------------------------------------------
// scan
// ---------------------------------------------------------------------

pub mod scan {
    pub use crate::interp::scan::*;

    use super::*;

    host_scan!(host_bsr16, "bsr", u16, "x");
    host_scan!(host_bsr32, "bsr", u32, "e");
    host_scan!(host_bsr64, "bsr", u64, "r");

    host_scan!(host_bsf16, "bsf", u16, "x");
    host_scan!(host_bsf32, "bsf", u32, "e");
    host_scan!(host_bsf64, "bsf", u64, "r");

    // TZCNT decodes as BSF on CPUs without BMI1; either way ZF/CF come out
    // the same as the architectural TZCNT definition on any CPU this would
    // realistically run on.
    host_scan!(host_tzcnt16, "tzcnt", u16, "x");
    host_scan!(host_tzcnt32, "tzcnt", u32, "e");
    host_scan!(host_tzcnt64, "tzcnt", u64, "r");

    host_scan!(host_popcnt16, "popcnt", u16, "x");
    host_scan!(host_popcnt32, "popcnt", u32, "e");
    host_scan!(host_popcnt64, "popcnt", u64, "r");

    /// `bsr`/`bsf` on a zero input is architecturally undefined; the pure
    /// model's `U::MAX` convention is deliberate (§9), not something the
    /// host is expected to agree with, so the value compare is skipped in
    /// that case. ZF is always defined and always compared.
    macro_rules! checked_bit_scan {
        ($name:ident, $pure:path, $host:ident, $u:ty) => {
            pub fn $name(flags: &mut RFlags, src: $u) -> $u {
                let pure_result = $pure(flags, src);
                #[cfg(all(debug_assertions, target_arch = "x86_64"))]
                {
                    if src != 0 {
                        let (host_result, bits) = $host(src);
                        assert_value_match(stringify!($name), &pure_result, &host_result);
                        cross_check_flags(stringify!($name), flags, bits, mask_zero());
                        return host_result;
                    }
                    flags.set_zero(true);
                    return pure_result;
                }
                #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
                {
                    pure_result
                }
            }
        };
    }

    macro_rules! checked_tzcnt {
        ($name:ident, $pure:path, $host:ident, $u:ty) => {
            pub fn $name(flags: &mut RFlags, src: $u) -> $u {
                let pure_result = $pure(flags, src);
                #[cfg(all(debug_assertions, target_arch = "x86_64"))]
                {
                    let (host_result, bits) = $host(src);
                    assert_value_match(stringify!($name), &pure_result, &host_result);
                    cross_check_flags(stringify!($name), flags, bits, mask_carry_zero());
                    return host_result;
                }
                #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
                {
                    pure_result
                }
            }
        };
    }

    macro_rules! checked_popcnt {
        ($name:ident, $pure:path, $host:ident, $u:ty) => {
            pub fn $name(flags: &mut RFlags, src: $u) -> $u {
                let pure_result = $pure(flags, src);
                #[cfg(all(debug_assertions, target_arch = "x86_64"))]
                {
                    let (host_result, bits) = $host(src);
                    assert_value_match(stringify!($name), &pure_result, &host_result);
                    cross_check_flags(stringify!($name), flags, bits, mask_arith());
                    return host_result;
                }
                #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
                {
                    pure_result
                }
            }
        };
    }

    checked_bit_scan!(bsr16, crate::interp::scan::bsr16, host_bsr16, u16);
    checked_bit_scan!(bsr32, crate::interp::scan::bsr32, host_bsr32, u32);
    checked_bit_scan!(bsr64, crate::interp::scan::bsr64, host_bsr64, u64);

    checked_bit_scan!(bsf16, crate::interp::scan::bsf16, host_bsf16, u16);
    checked_bit_scan!(bsf32, crate::interp::scan::bsf32, host_bsf32, u32);
    checked_bit_scan!(bsf64, crate::interp::scan::bsf64, host_bsf64, u64);

    checked_tzcnt!(tzcnt16, crate::interp::scan::tzcnt16, host_tzcnt16, u16);
    checked_tzcnt!(tzcnt32, crate::interp::scan::tzcnt32, host_tzcnt32, u32);
    checked_tzcnt!(tzcnt64, crate::interp::scan::tzcnt64, host_tzcnt64, u64);

    checked_popcnt!(popcnt16, crate::interp::scan::popcnt16, host_popcnt16, u16);
    checked_popcnt!(popcnt32, crate::interp::scan::popcnt32, host_popcnt32, u32);
    checked_popcnt!(popcnt64, crate::interp::scan::popcnt64, host_popcnt64, u64);

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn checked_bsr32_matches_host_on_nonzero_input() {
            let mut f = RFlags::empty();
            assert_eq!(bsr32(&mut f, 0b1000), 3);
            assert!(!f.zero());
        }

        #[test]
        fn checked_bsr32_zero_input_keeps_documented_convention() {
            let mut f = RFlags::empty();
            assert_eq!(bsr32(&mut f, 0), u32::MAX);
            assert!(f.zero());
        }

        #[test]
        fn checked_popcnt32_matches_host() {
            let mut f = RFlags::empty();
            assert_eq!(popcnt32(&mut f, 0xFF), 8);
        }
    }
}

// ---------------------------------------------------------------------
// x87
// ---------------------------------------------------------------------

pub mod x87 {
    pub use crate::interp::x87::*;

    use super::*;

    /// Loads `b` then `a` onto the real x87 stack (so `a` ends up ST0,
    /// matching `fcomi(a, b)`'s "compare a against b"), compares-and-pops
    /// once via `{insn} st(1)`, then pops the remaining value explicitly --
    /// net zero effect on stack depth. Rust's own codegen never touches
    /// the x87 stack on `x86_64` (scalar floats go through SSE2), so this
    /// is safe as long as the two loads and two pops stay balanced.
    macro_rules! host_fcomi {
        ($fn_name:ident, $insn:literal) => {
            #[cfg(all(debug_assertions, target_arch = "x86_64"))]
            fn $fn_name(a: F80, b: F80) -> u64 {
                let a_bytes = a.to_bytes();
                let b_bytes = b.to_bytes();
                let rflags: u64;
                unsafe {
                    core::arch::asm!(
                        "fld tbyte ptr [{b_ptr}]",
                        "fld tbyte ptr [{a_ptr}]",
                        concat!($insn, " st(1)"),
                        "fstp st(0)",
                        "pushfq",
                        "pop {flags}",
                        a_ptr = in(reg) a_bytes.as_ptr(),
                        b_ptr = in(reg) b_bytes.as_ptr(),
                        flags = out(reg) rflags,
                    );
                }
                rflags
            }
        };
    }

    host_fcomi!(host_fcomi_raw, "fcomip");
    host_fcomi!(host_fucomi_raw, "fucomip");

    fn fcomi_flags_mask() -> RFlags {
        RFlags::FLAG_CF | RFlags::FLAG_PF | RFlags::FLAG_ZF | RFlags::FLAG_OF | RFlags::FLAG_SF
    }

    pub fn fcomi(flags: &mut RFlags, a: F80, b: F80) {
        crate::interp::x87::fcomi(flags, a, b);
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        {
            let bits = host_fcomi_raw(a, b);
            cross_check_flags("fcomi", flags, bits, fcomi_flags_mask());
        }
    }

    pub fn fucomi(flags: &mut RFlags, a: F80, b: F80) {
        crate::interp::x87::fucomi(flags, a, b);
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        {
            let bits = host_fucomi_raw(a, b);
            cross_check_flags("fucomi", flags, bits, fcomi_flags_mask());
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::state::RoundingMode;

        #[test]
        fn checked_fcomi_equal_matches_host() {
            let mut f = RFlags::empty();
            fcomi(&mut f, F80::from_f64(1.5), F80::from_f64(1.5));
            assert!(f.zero());
            assert!(!f.carry());
            assert!(!f.overflow());
        }

        #[test]
        fn checked_fcomi_less_matches_host() {
            let mut f = RFlags::empty();
            fcomi(&mut f, F80::from_f64(1.0), F80::from_f64(2.0));
            assert!(f.carry());
            assert!(!f.zero());
        }

        #[test]
        fn frndint_still_passes_through_to_host_rounding() {
            let r = frndint(F80::from_f64(2.5), RoundingMode::Nearest);
            assert_eq!(r.to_f64(), 2.0);
        }
    }
}

// ---------------------------------------------------------------------
// simd
// ---------------------------------------------------------------------

pub mod simd {
    pub use crate::interp::simd::*;

    use super::*;

    macro_rules! checked_simd_binop {
        ($name:ident, $pure:path, $intrinsic:ident, $feature:literal) => {
            pub fn $name(a: u128, b: u128) -> u128 {
                let pure_result = $pure(a, b);
                #[cfg(all(debug_assertions, target_arch = "x86_64"))]
                {
                    #[target_feature(enable = $feature)]
                    unsafe fn run(a: u128, b: u128) -> u128 {
                        use std::arch::x86_64::*;
                        let va = _mm_loadu_si128(&a as *const u128 as *const __m128i);
                        let vb = _mm_loadu_si128(&b as *const u128 as *const __m128i);
                        let r = $intrinsic(va, vb);
                        let mut out: u128 = 0;
                        _mm_storeu_si128(&mut out as *mut u128 as *mut __m128i, r);
                        out
                    }
                    let host_result = unsafe { run(a, b) };
                    assert_value_match(stringify!($name), &pure_result, &host_result);
                    return host_result;
                }
                #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
                {
                    pure_result
                }
            }
        };
    }

    checked_simd_binop!(pcmpeqb, crate::interp::simd::pcmpeqb, _mm_cmpeq_epi8, "sse2");
    checked_simd_binop!(pcmpgtb, crate::interp::simd::pcmpgtb, _mm_cmpgt_epi8, "sse2");
    checked_simd_binop!(pcmpeqw, crate::interp::simd::pcmpeqw, _mm_cmpeq_epi16, "sse2");
    checked_simd_binop!(pcmpgtw, crate::interp::simd::pcmpgtw, _mm_cmpgt_epi16, "sse2");
    checked_simd_binop!(pcmpeqd, crate::interp::simd::pcmpeqd, _mm_cmpeq_epi32, "sse2");
    checked_simd_binop!(pcmpgtd, crate::interp::simd::pcmpgtd, _mm_cmpgt_epi32, "sse2");
    checked_simd_binop!(pcmpeqq, crate::interp::simd::pcmpeqq, _mm_cmpeq_epi64, "sse4.1");
    checked_simd_binop!(pcmpgtq, crate::interp::simd::pcmpgtq, _mm_cmpgt_epi64, "sse4.2");

    checked_simd_binop!(pminub, crate::interp::simd::pminub, _mm_min_epu8, "sse2");
    checked_simd_binop!(pmaxub, crate::interp::simd::pmaxub, _mm_max_epu8, "sse2");
    checked_simd_binop!(pminsw, crate::interp::simd::pminsw, _mm_min_epi16, "sse2");
    checked_simd_binop!(pmaxsw, crate::interp::simd::pmaxsw, _mm_max_epi16, "sse2");

    pub fn ptest(flags: &mut RFlags, a: u128, b: u128) {
        let mut pure_flags = *flags;
        crate::interp::simd::ptest(&mut pure_flags, a, b);
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        {
            #[target_feature(enable = "sse4.1")]
            unsafe fn run(a: u128, b: u128) -> (bool, bool) {
                use std::arch::x86_64::*;
                let va = _mm_loadu_si128(&a as *const u128 as *const __m128i);
                let vb = _mm_loadu_si128(&b as *const u128 as *const __m128i);
                let zf = _mm_testz_si128(va, vb) != 0;
                let cf = _mm_testc_si128(va, vb) != 0;
                (zf, cf)
            }
            let (zf, cf) = unsafe { run(a, b) };
            assert_value_match("ptest.zf", &pure_flags.zero(), &zf);
            assert_value_match("ptest.cf", &pure_flags.carry(), &cf);
            flags.set_zero(zf);
            flags.set_carry(cf);
            flags.set_overflow(false);
            flags.set_sign(false);
            return;
        }
        #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
        {
            *flags = pure_flags;
        }
    }

    #[cfg(all(debug_assertions, target_arch = "x86_64"))]
    #[target_feature(enable = "sse")]
    unsafe fn run_cmpps(pred: CmpPredicate, a: u128, b: u128) -> u128 {
        use std::arch::x86_64::*;
        let va = _mm_castsi128_ps(_mm_loadu_si128(&a as *const u128 as *const __m128i));
        let vb = _mm_castsi128_ps(_mm_loadu_si128(&b as *const u128 as *const __m128i));
        let r = match pred {
            CmpPredicate::Eq => _mm_cmpeq_ps(va, vb),
            CmpPredicate::Lt => _mm_cmplt_ps(va, vb),
            CmpPredicate::Le => _mm_cmple_ps(va, vb),
            CmpPredicate::Unord => _mm_cmpunord_ps(va, vb),
            CmpPredicate::Neq => _mm_cmpneq_ps(va, vb),
            CmpPredicate::Nlt => _mm_cmpnlt_ps(va, vb),
            CmpPredicate::Nle => _mm_cmpnle_ps(va, vb),
            CmpPredicate::Ord => _mm_cmpord_ps(va, vb),
        };
        let mut out: u128 = 0;
        _mm_storeu_si128(&mut out as *mut u128 as *mut __m128i, _mm_castps_si128(r));
        out
    }

    #[cfg(all(debug_assertions, target_arch = "x86_64"))]
    #[target_feature(enable = "sse2")]
    unsafe fn run_cmppd(pred: CmpPredicate, a: u128, b: u128) -> u128 {
        use std::arch::x86_64::*;
        let va = _mm_castsi128_pd(_mm_loadu_si128(&a as *const u128 as *const __m128i));
        let vb = _mm_castsi128_pd(_mm_loadu_si128(&b as *const u128 as *const __m128i));
        let r = match pred {
            CmpPredicate::Eq => _mm_cmpeq_pd(va, vb),
            CmpPredicate::Lt => _mm_cmplt_pd(va, vb),
            CmpPredicate::Le => _mm_cmple_pd(va, vb),
            CmpPredicate::Unord => _mm_cmpunord_pd(va, vb),
            CmpPredicate::Neq => _mm_cmpneq_pd(va, vb),
            CmpPredicate::Nlt => _mm_cmpnlt_pd(va, vb),
            CmpPredicate::Nle => _mm_cmpnle_pd(va, vb),
            CmpPredicate::Ord => _mm_cmpord_pd(va, vb),
        };
        let mut out: u128 = 0;
        _mm_storeu_si128(&mut out as *mut u128 as *mut __m128i, _mm_castpd_si128(r));
        out
    }

    #[cfg(all(debug_assertions, target_arch = "x86_64"))]
    #[target_feature(enable = "sse")]
    unsafe fn run_cmpss(pred: CmpPredicate, a: u128, b: u128) -> u128 {
        use std::arch::x86_64::*;
        let va = _mm_castsi128_ps(_mm_loadu_si128(&a as *const u128 as *const __m128i));
        let vb = _mm_castsi128_ps(_mm_loadu_si128(&b as *const u128 as *const __m128i));
        let r = match pred {
            CmpPredicate::Eq => _mm_cmpeq_ss(va, vb),
            CmpPredicate::Lt => _mm_cmplt_ss(va, vb),
            CmpPredicate::Le => _mm_cmple_ss(va, vb),
            CmpPredicate::Unord => _mm_cmpunord_ss(va, vb),
            CmpPredicate::Neq => _mm_cmpneq_ss(va, vb),
            CmpPredicate::Nlt => _mm_cmpnlt_ss(va, vb),
            CmpPredicate::Nle => _mm_cmpnle_ss(va, vb),
            CmpPredicate::Ord => _mm_cmpord_ss(va, vb),
        };
        let mut out: u128 = 0;
        _mm_storeu_si128(&mut out as *mut u128 as *mut __m128i, _mm_castps_si128(r));
        out
    }

    #[cfg(all(debug_assertions, target_arch = "x86_64"))]
    #[target_feature(enable = "sse2")]
    unsafe fn run_cmpsd(pred: CmpPredicate, a: u128, b: u128) -> u128 {
        use std::arch::x86_64::*;
        let va = _mm_castsi128_pd(_mm_loadu_si128(&a as *const u128 as *const __m128i));
        let vb = _mm_castsi128_pd(_mm_loadu_si128(&b as *const u128 as *const __m128i));
        let r = match pred {
            CmpPredicate::Eq => _mm_cmpeq_sd(va, vb),
            CmpPredicate::Lt => _mm_cmplt_sd(va, vb),
            CmpPredicate::Le => _mm_cmple_sd(va, vb),
            CmpPredicate::Unord => _mm_cmpunord_sd(va, vb),
            CmpPredicate::Neq => _mm_cmpneq_sd(va, vb),
            CmpPredicate::Nlt => _mm_cmpnlt_sd(va, vb),
            CmpPredicate::Nle => _mm_cmpnle_sd(va, vb),
            CmpPredicate::Ord => _mm_cmpord_sd(va, vb),
        };
        let mut out: u128 = 0;
        _mm_storeu_si128(&mut out as *mut u128 as *mut __m128i, _mm_castpd_si128(r));
        out
    }

    pub fn cmpps(pred: CmpPredicate, a: u128, b: u128) -> u128 {
        let pure_result = crate::interp::simd::cmpps(pred, a, b);
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        {
            let host_result = unsafe { run_cmpps(pred, a, b) };
            assert_value_match("cmpps", &pure_result, &host_result);
            return host_result;
        }
        #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
        {
            pure_result
        }
    }

    pub fn cmppd(pred: CmpPredicate, a: u128, b: u128) -> u128 {
        let pure_result = crate::interp::simd::cmppd(pred, a, b);
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        {
            let host_result = unsafe { run_cmppd(pred, a, b) };
            assert_value_match("cmppd", &pure_result, &host_result);
            return host_result;
        }
        #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
        {
            pure_result
        }
    }

    pub fn cmpss(pred: CmpPredicate, a: u128, b: u128) -> u128 {
        let pure_result = crate::interp::simd::cmpss(pred, a, b);
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        {
            let host_result = unsafe { run_cmpss(pred, a, b) };
            assert_value_match("cmpss", &pure_result, &host_result);
            return host_result;
        }
        #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
        {
            pure_result
        }
    }

    pub fn cmpsd(pred: CmpPredicate, a: u128, b: u128) -> u128 {
        let pure_result = crate::interp::simd::cmpsd(pred, a, b);
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        {
            let host_result = unsafe { run_cmpsd(pred, a, b) };
            assert_value_match("cmpsd", &pure_result, &host_result);
            return host_result;
        }
        #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
        {
            pure_result
        }
    }

    #[cfg(all(debug_assertions, target_arch = "x86_64"))]
    fn host_comiss(a: u128, b: u128) -> u64 {
        use std::arch::x86_64::*;
        let rflags: u64;
        unsafe {
            let va = _mm_castsi128_ps(_mm_loadu_si128(&a as *const u128 as *const __m128i));
            let vb = _mm_castsi128_ps(_mm_loadu_si128(&b as *const u128 as *const __m128i));
            core::arch::asm!(
                "comiss {a}, {b}",
                "pushfq",
                "pop {flags}",
                a = in(xmm_reg) va,
                b = in(xmm_reg) vb,
                flags = out(reg) rflags,
            );
        }
        rflags
    }

    #[cfg(all(debug_assertions, target_arch = "x86_64"))]
    fn host_comisd(a: u128, b: u128) -> u64 {
        use std::arch::x86_64::*;
        let rflags: u64;
        unsafe {
            let va = _mm_castsi128_pd(_mm_loadu_si128(&a as *const u128 as *const __m128i));
            let vb = _mm_castsi128_pd(_mm_loadu_si128(&b as *const u128 as *const __m128i));
            core::arch::asm!(
                "comisd {a}, {b}",
                "pushfq",
                "pop {flags}",
                a = in(xmm_reg) va,
                b = in(xmm_reg) vb,
                flags = out(reg) rflags,
            );
        }
        rflags
    }

    fn comi_flags_mask() -> RFlags {
        RFlags::FLAG_CF | RFlags::FLAG_PF | RFlags::FLAG_ZF
    }

    pub fn comiss(flags: &mut RFlags, a: u128, b: u128) {
        crate::interp::simd::comiss(flags, a, b);
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        {
            let bits = host_comiss(a, b);
            cross_check_flags("comiss", flags, bits, comi_flags_mask());
        }
    }

    pub fn comisd(flags: &mut RFlags, a: u128, b: u128) {
        crate::interp::simd::comisd(flags, a, b);
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        {
            let bits = host_comisd(a, b);
            cross_check_flags("comisd", flags, bits, comi_flags_mask());
        }
    }

    #[cfg(all(debug_assertions, target_arch = "x86_64"))]
    #[target_feature(enable = "sse")]
    unsafe fn run_addps(a: u128, b: u128) -> u128 {
        use std::arch::x86_64::*;
        let va = _mm_castsi128_ps(_mm_loadu_si128(&a as *const u128 as *const __m128i));
        let vb = _mm_castsi128_ps(_mm_loadu_si128(&b as *const u128 as *const __m128i));
        let r = _mm_add_ps(va, vb);
        let mut out: u128 = 0;
        _mm_storeu_si128(&mut out as *mut u128 as *mut __m128i, _mm_castps_si128(r));
        out
    }

    #[cfg(all(debug_assertions, target_arch = "x86_64"))]
    #[target_feature(enable = "sse2")]
    unsafe fn run_addpd(a: u128, b: u128) -> u128 {
        use std::arch::x86_64::*;
        let va = _mm_castsi128_pd(_mm_loadu_si128(&a as *const u128 as *const __m128i));
        let vb = _mm_castsi128_pd(_mm_loadu_si128(&b as *const u128 as *const __m128i));
        let r = _mm_add_pd(va, vb);
        let mut out: u128 = 0;
        _mm_storeu_si128(&mut out as *mut u128 as *mut __m128i, _mm_castpd_si128(r));
        out
    }

    pub fn addps(a: u128, b: u128) -> u128 {
        let pure_result = crate::interp::simd::addps(a, b);
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        {
            let host_result = unsafe { run_addps(a, b) };
            assert_value_match("addps", &pure_result, &host_result);
            return host_result;
        }
        #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
        {
            pure_result
        }
    }

    pub fn addpd(a: u128, b: u128) -> u128 {
        let pure_result = crate::interp::simd::addpd(a, b);
        #[cfg(all(debug_assertions, target_arch = "x86_64"))]
        {
            let host_result = unsafe { run_addpd(a, b) };
            assert_value_match("addpd", &pure_result, &host_result);
            return host_result;
        }
        #[cfg(not(all(debug_assertions, target_arch = "x86_64")))]
        {
            pure_result
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use aero_types::Simd128Ext;

        #[test]
        fn checked_pcmpeqb_matches_host() {
            assert_eq!(pcmpeqb(0, 0), u128::MAX);
        }

        #[test]
        fn checked_pminsw_matches_host() {
            let a = 0u128.with_lane16(0, 0xFFFFu16);
            let b = 0u128.with_lane16(0, 1u16);
            assert_eq!(pminsw(a, b).lane16(0) as i16, -1);
        }

        #[test]
        fn checked_ptest_matches_host() {
            let mut f = RFlags::empty();
            ptest(&mut f, 0xFF00, 0x00FF);
            assert!(f.zero());
        }

        #[test]
        fn checked_cmpps_eq_matches_host() {
            let a = 0u128.with_lane_f32(0, 1.0);
            let b = 0u128.with_lane_f32(0, 1.0);
            assert_eq!(cmpps(CmpPredicate::Eq, a, b).lane32(0), u32::MAX);
        }

        #[test]
        fn checked_addps_matches_host() {
            let a = 0u128.with_lane_f32(0, 1.5);
            let b = 0u128.with_lane_f32(0, 2.5);
            assert_eq!(addps(a, b).lane_f32(0), 4.0);
        }
    }
}
