//! §4.1.7 x87 floating-point family: `fadd`/`fsub`/`fmul`/`fdiv`/`fcomi`/
//! `fucomi`/`frndint`. Arithmetic is delegated to the host bridge
//! ([`crate::interp::host`]) since bit-exact 80-bit rounding is impractical
//! to reimplement in software; comparison and classification stay pure.

use aero_types::F80;

use crate::interp::host;
use crate::state::{RFlags, RoundingMode};

pub fn fadd(a: F80, b: F80, mode: RoundingMode) -> F80 {
    host::fadd80_host(a, b, mode)
}

pub fn fsub(a: F80, b: F80, mode: RoundingMode) -> F80 {
    host::fsub80_host(a, b, mode)
}

pub fn fmul(a: F80, b: F80, mode: RoundingMode) -> F80 {
    host::fmul80_host(a, b, mode)
}

pub fn fdiv(a: F80, b: F80, mode: RoundingMode) -> F80 {
    host::fdiv80_host(a, b, mode)
}

pub fn frndint(a: F80, mode: RoundingMode) -> F80 {
    host::round_to_int_f80(a, mode)
}

/// Ordered compare (`fcomi`): sets CF/PF/ZF from the relation between `a`
/// and `b`; any NaN operand is "unordered" and sets all three (§4.1.7).
/// OF/SF/AF are architecturally cleared by this instruction, which this
/// function does directly.
pub fn fcomi(flags: &mut RFlags, a: F80, b: F80) {
    compare_common(flags, a, b)
}

/// `fucomi`: same comparison result as `fcomi`; the distinction between the
/// two (QNaN-triggers-#IA or not) is an exception-reporting detail this
/// interpreter does not model (§4.1.7 scope).
pub fn fucomi(flags: &mut RFlags, a: F80, b: F80) {
    compare_common(flags, a, b)
}

fn compare_common(flags: &mut RFlags, a: F80, b: F80) {
    flags.set_overflow(false);
    flags.set_sign(false);
    if a.is_nan() || b.is_nan() {
        flags.set_carry(true);
        flags.set_parity(true);
        flags.set_zero(true);
        return;
    }
    let av = a.to_f64();
    let bv = b.to_f64();
    flags.set_carry(av < bv);
    flags.set_parity(false);
    flags.set_zero(av == bv);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fcomi_equal_sets_zero_only() {
        let mut f = RFlags::empty();
        fcomi(&mut f, F80::from_f64(1.5), F80::from_f64(1.5));
        assert!(f.zero());
        assert!(!f.carry());
        assert!(!f.parity());
    }

    #[test]
    fn fcomi_less_sets_carry_only() {
        let mut f = RFlags::empty();
        fcomi(&mut f, F80::from_f64(1.0), F80::from_f64(2.0));
        assert!(f.carry());
        assert!(!f.zero());
        assert!(!f.parity());
    }

    #[test]
    fn fcomi_nan_sets_all_three() {
        let mut f = RFlags::empty();
        let nan = F80::from_f64(f64::NAN);
        fcomi(&mut f, nan, F80::from_f64(1.0));
        assert!(f.carry());
        assert!(f.parity());
        assert!(f.zero());
    }

    #[test]
    fn frndint_rounds_half_to_even_at_nearest() {
        let r = frndint(F80::from_f64(2.5), RoundingMode::Nearest);
        assert_eq!(r.to_f64(), 2.0);
        let r2 = frndint(F80::from_f64(3.5), RoundingMode::Nearest);
        assert_eq!(r2.to_f64(), 4.0);
    }

    #[test]
    fn frndint_rounds_half_to_even_at_nearest_for_negative_operands() {
        let r = frndint(F80::from_f64(-2.5), RoundingMode::Nearest);
        assert_eq!(r.to_f64(), -2.0);
        let r2 = frndint(F80::from_f64(-3.5), RoundingMode::Nearest);
        assert_eq!(r2.to_f64(), -4.0);
    }

    #[test]
    fn fcomi_clears_overflow_and_sign() {
        let mut f = RFlags::FLAG_OF | RFlags::FLAG_SF;
        fcomi(&mut f, F80::from_f64(1.0), F80::from_f64(1.0));
        assert!(!f.overflow());
        assert!(!f.sign());
    }
}
