//! §4.1.1 Integer arithmetic family: `add`/`adc`/`sub`/`sbb`/`neg`/`inc`/
//! `dec`/`cmp`/`mul`/`imul`/`div`. One concrete function per width, rather
//! than a single generic over a numeric trait, mirroring the reference
//! material's per-width `add8`/`add16`/`add32`/`add64` instantiations (and
//! matching the real instruction set, where each width genuinely is a
//! distinct opcode).

use crate::state::RFlags;

macro_rules! arith_family {
    ($w:expr, $u:ty, $i:ty, $u2:ty, $add:ident, $adc:ident, $sub:ident, $sbb:ident,
     $cmp:ident, $neg:ident, $inc:ident, $dec:ident, $mul:ident) => {
        pub fn $add(flags: &mut RFlags, dst: $u, src: $u) -> $u {
            let (result, carry) = dst.overflowing_add(src);
            let overflow = ((dst ^ src) as $i) >= 0 && ((dst ^ result) as $i) < 0;
            flags.set_carry(carry);
            flags.set_overflow(overflow);
            flags.set_zero(result == 0);
            flags.set_sign((result as $i) < 0);
            flags.set_parity(RFlags::parity_of(result as u64));
            result
        }

        pub fn $adc(flags: &mut RFlags, dst: $u, src: $u, carry_in: bool) -> $u {
            let src_plus_carry = (src as $u2) + (carry_in as $u2);
            let result = ((dst as $u2) + src_plus_carry) as $u;
            let carry = (dst as $u2) + src_plus_carry > <$u>::MAX as $u2;
            let overflow = ((dst ^ src) as $i) >= 0 && ((dst ^ result) as $i) < 0;
            flags.set_carry(carry);
            flags.set_overflow(overflow);
            flags.set_zero(result == 0);
            flags.set_sign((result as $i) < 0);
            flags.set_parity(RFlags::parity_of(result as u64));
            result
        }

        pub fn $sub(flags: &mut RFlags, dst: $u, src: $u) -> $u {
            let (result, carry) = dst.overflowing_sub(src);
            let overflow = ((dst ^ src) as $i) < 0 && ((dst ^ result) as $i) < 0;
            flags.set_carry(carry);
            flags.set_overflow(overflow);
            flags.set_zero(result == 0);
            flags.set_sign((result as $i) < 0);
            flags.set_parity(RFlags::parity_of(result as u64));
            result
        }

        pub fn $sbb(flags: &mut RFlags, dst: $u, src: $u, carry_in: bool) -> $u {
            let src_plus_carry = (src as $u2) + (carry_in as $u2);
            let carry = (dst as $u2) < src_plus_carry;
            let result = (dst as $u2).wrapping_sub(src_plus_carry) as $u;
            let overflow = ((dst ^ src) as $i) < 0 && ((dst ^ result) as $i) < 0;
            flags.set_carry(carry);
            flags.set_overflow(overflow);
            flags.set_zero(result == 0);
            flags.set_sign((result as $i) < 0);
            flags.set_parity(RFlags::parity_of(result as u64));
            result
        }

        /// `cmp` is `sub` with the result discarded (§4.1.1); callers that
        /// only need the flag side effects can ignore the return value.
        pub fn $cmp(flags: &mut RFlags, dst: $u, src: $u) -> $u {
            $sub(flags, dst, src)
        }

        pub fn $neg(flags: &mut RFlags, dst: $u) -> $u {
            $sub(flags, 0, dst)
        }

        pub fn $inc(flags: &mut RFlags, dst: $u) -> $u {
            let result = dst.wrapping_add(1);
            flags.set_overflow(dst == <$i>::MAX as $u);
            flags.set_zero(result == 0);
            flags.set_sign((result as $i) < 0);
            flags.set_parity(RFlags::parity_of(result as u64));
            result
        }

        pub fn $dec(flags: &mut RFlags, dst: $u) -> $u {
            let result = dst.wrapping_sub(1);
            flags.set_overflow(dst == <$i>::MIN as $u);
            flags.set_zero(result == 0);
            flags.set_sign((result as $i) < 0);
            flags.set_parity(RFlags::parity_of(result as u64));
            result
        }

        /// Unsigned multiply; returns `(upper, lower)`. Only `carry`/
        /// `overflow` are defined (§4.1.1); the other arithmetic flags are
        /// left untouched.
        pub fn $mul(flags: &mut RFlags, a: $u, b: $u) -> ($u, $u) {
            let full = (a as $u2) * (b as $u2);
            let lower = full as $u;
            let upper = (full >> $w) as $u;
            let defined = upper != 0;
            flags.set_carry(defined);
            flags.set_overflow(defined);
            (upper, lower)
        }
    };
}

arith_family!(
    8, u8, i8, u16, add8, adc8, sub8, sbb8, cmp8, neg8, inc8, dec8, mul8
);
arith_family!(
    16, u16, i16, u32, add16, adc16, sub16, sbb16, cmp16, neg16, inc16, dec16, mul16
);
arith_family!(
    32, u32, i32, u64, add32, adc32, sub32, sbb32, cmp32, neg32, inc32, dec32, mul32
);
arith_family!(
    64, u64, i64, u128, add64, adc64, sub64, sbb64, cmp64, neg64, inc64, dec64, mul64
);

/// Signed multiply (16/32/64): returns `(upper, lower)` of the true
/// double-width signed product. `carry = overflow` iff the low-W result is
/// not a faithful sign-extension of that true product (§4.1.1) -- computed
/// from the *actual* wide product, not a truncated same-width product, so
/// the 64-bit case is correct even when neither operand fits in 32 bits.
macro_rules! imul_family {
    ($name:ident, $u:ty, $i:ty, $u2:ty, $i2:ty, $w:expr) => {
        pub fn $name(flags: &mut RFlags, a: $u, b: $u) -> ($u, $u) {
            let full = (a as $i as $i2).wrapping_mul(b as $i as $i2);
            let lower = full as $u2 as $u;
            let upper = (full >> $w) as $u2 as $u;
            let sign_extends = full == (lower as $i as $i2);
            flags.set_carry(!sign_extends);
            flags.set_overflow(!sign_extends);
            (upper, lower)
        }
    };
}

imul_family!(imul16, u16, i16, u32, i32, 16);
imul_family!(imul32, u32, i32, u64, i64, 32);
imul_family!(imul64, u64, i64, u128, i128, 64);

/// Unsigned divide: `(dividend_upper, dividend_lower, divisor) ->
/// (quotient, remainder)`. Panics (fatal invariant violation, §7 kind 1) on
/// division by zero or quotient overflow, matching the "caller is expected
/// to check before invoking" contract (§4.1.1) -- handles the general
/// `dividend_upper != 0` case via the next-wider integer type rather than
/// asserting it away.
macro_rules! div_family {
    ($name:ident, $u:ty, $u2:ty) => {
        pub fn $name(dividend_upper: $u, dividend_lower: $u, divisor: $u) -> ($u, $u) {
            assert!(divisor != 0, "division by zero reached the semantic primitive");
            let dividend = ((dividend_upper as $u2) << <$u>::BITS) | (dividend_lower as $u2);
            let quotient = dividend / (divisor as $u2);
            let remainder = dividend % (divisor as $u2);
            assert!(quotient <= <$u>::MAX as $u2, "quotient does not fit in the destination width");
            (quotient as $u, remainder as $u)
        }
    };
}

div_family!(div8, u8, u16);
div_family!(div16, u16, u32);
div_family!(div32, u32, u64);
div_family!(div64, u64, u128);

/// `cmpxchg`: compare `accumulator` against `dst`; on equality store `src`
/// into `dst`, else load `dst` into the accumulator. Flags mirror the
/// `cmp` performed internally (§4.1.6); returns `(new_dst, new_accumulator,
/// equal)`.
macro_rules! cmpxchg_family {
    ($name:ident, $cmp:ident, $u:ty) => {
        pub fn $name(flags: &mut RFlags, dst: $u, accumulator: $u, src: $u) -> ($u, $u, bool) {
            $cmp(flags, accumulator, dst);
            if accumulator == dst {
                (src, accumulator, true)
            } else {
                (dst, dst, false)
            }
        }
    };
}

cmpxchg_family!(cmpxchg8, cmp8, u8);
cmpxchg_family!(cmpxchg16, cmp16, u16);
cmpxchg_family!(cmpxchg32, cmp32, u32);
cmpxchg_family!(cmpxchg64, cmp64, u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add8_is_commutative_and_matches_spec_example() {
        let mut f1 = RFlags::empty();
        let mut f2 = RFlags::empty();
        assert_eq!(add8(&mut f1, 200, 100), add8(&mut f2, 100, 200));
        assert_eq!(f1, f2);
    }

    #[test]
    fn sub_self_is_zero_with_no_carry() {
        let mut f = RFlags::empty();
        let r = sub32(&mut f, 1234, 1234);
        assert_eq!(r, 0);
        assert!(!f.carry());
        assert!(f.zero());
    }

    #[test]
    fn adc64_carry_propagation_scenario() {
        let mut f = RFlags::empty();
        f.set_carry(true);
        let r = adc64(&mut f, u64::MAX, 0, true);
        assert_eq!(r, 0);
        assert!(f.carry());
        assert!(f.zero());
        assert!(!f.overflow());

        let mut f2 = RFlags::empty();
        f2.set_carry(true);
        let r2 = adc64(&mut f2, 0, u64::MAX, true);
        assert_eq!(r2, 0);
        assert!(f2.carry());
        assert!(f2.zero());
        assert!(!f2.overflow());
    }

    #[test]
    fn imul64_saturation_flags_scenario() {
        let mut f = RFlags::empty();
        let (_upper, lower) = imul64(&mut f, 3, 0xAAAA_AAAA_AAAA_AAAB);
        assert_eq!(lower, 0x0000_0000_0000_0001);
        assert!(f.carry());
        assert!(f.overflow());
    }

    #[test]
    fn imul32_faithful_sign_extension_clears_flags() {
        let mut f = RFlags::empty();
        let (_upper, lower) = imul32(&mut f, 3, 4);
        assert_eq!(lower, 12);
        assert!(!f.carry());
        assert!(!f.overflow());
    }

    #[test]
    fn div64_handles_nonzero_upper_dividend() {
        // 2^64 / 2 = 2^63, with a zero remainder: dividend_upper=1 means
        // the full 128-bit dividend is 2^64.
        let (q, r) = div64(1, 0, 2);
        assert_eq!(q, 1u64 << 63);
        assert_eq!(r, 0);
    }

    #[test]
    #[should_panic]
    fn div_by_zero_panics() {
        div32(0, 10, 0);
    }

    #[test]
    fn cmpxchg_success_and_failure_paths() {
        let mut f = RFlags::empty();
        let (new_dst, new_acc, eq) = cmpxchg32(&mut f, 10, 10, 99);
        assert_eq!((new_dst, new_acc, eq), (99, 10, true));
        assert!(f.zero());

        let mut f2 = RFlags::empty();
        let (new_dst2, new_acc2, eq2) = cmpxchg32(&mut f2, 10, 5, 99);
        assert_eq!((new_dst2, new_acc2, eq2), (10, 10, false));
        assert!(!f2.zero());
    }
}
