//! Packed/scalar compare: integer equal/greater-than, min/max, and the
//! predicate-driven `cmpps`/`cmppd`/`cmpss`/`cmpsd` family (§4.1.8).

use aero_types::Simd128Ext;

use aero_x86::CmpPredicate;

macro_rules! packed_int_eq_gt {
    ($lanes:expr, $u:ty, $i:ty, $eq:ident, $gt:ident, $lane:ident, $with_lane:ident) => {
        pub fn $eq(a: u128, b: u128) -> u128 {
            let mut out = 0u128;
            for i in 0..$lanes {
                let v: $u = if a.$lane(i) == b.$lane(i) { <$u>::MAX } else { 0 };
                out = out.$with_lane(i, v);
            }
            out
        }

        pub fn $gt(a: u128, b: u128) -> u128 {
            let mut out = 0u128;
            for i in 0..$lanes {
                let v: $u = if (a.$lane(i) as $i) > (b.$lane(i) as $i) {
                    <$u>::MAX
                } else {
                    0
                };
                out = out.$with_lane(i, v);
            }
            out
        }
    };
}

/// Signed min/max (the real ISA only has this form for words: `pminsw`/
/// `pmaxsw`, not bytes or dwords).
macro_rules! packed_int_min_max_signed {
    ($lanes:expr, $u:ty, $i:ty, $min:ident, $max:ident, $lane:ident, $with_lane:ident) => {
        pub fn $min(a: u128, b: u128) -> u128 {
            let mut out = 0u128;
            for i in 0..$lanes {
                let v = ((a.$lane(i) as $i).min(b.$lane(i) as $i)) as $u;
                out = out.$with_lane(i, v);
            }
            out
        }

        pub fn $max(a: u128, b: u128) -> u128 {
            let mut out = 0u128;
            for i in 0..$lanes {
                let v = ((a.$lane(i) as $i).max(b.$lane(i) as $i)) as $u;
                out = out.$with_lane(i, v);
            }
            out
        }
    };
}

/// Unsigned min/max (the real ISA only has this form for bytes: `pminub`/
/// `pmaxub`, not words or dwords).
macro_rules! packed_int_min_max_unsigned {
    ($lanes:expr, $minu:ident, $maxu:ident, $lane:ident, $with_lane:ident) => {
        pub fn $minu(a: u128, b: u128) -> u128 {
            let mut out = 0u128;
            for i in 0..$lanes {
                out = out.$with_lane(i, a.$lane(i).min(b.$lane(i)));
            }
            out
        }

        pub fn $maxu(a: u128, b: u128) -> u128 {
            let mut out = 0u128;
            for i in 0..$lanes {
                out = out.$with_lane(i, a.$lane(i).max(b.$lane(i)));
            }
            out
        }
    };
}

packed_int_eq_gt!(16, u8, i8, pcmpeqb, pcmpgtb, lane8, with_lane8);
packed_int_min_max_unsigned!(16, pminub, pmaxub, lane8, with_lane8);

packed_int_eq_gt!(8, u16, i16, pcmpeqw, pcmpgtw, lane16, with_lane16);
packed_int_min_max_signed!(8, u16, i16, pminsw, pmaxsw, lane16, with_lane16);

packed_int_eq_gt!(4, u32, i32, pcmpeqd, pcmpgtd, lane32, with_lane32);

/// `pcmpeqq`/`pcmpgtq`: SSE4.1/SSE4.2 add these at 64-bit lane width, but
/// min/max never got a 64-bit form (§4.1.8), so this skips
/// `packed_int_cmp_family!` and writes the two comparisons directly.
pub fn pcmpeqq(a: u128, b: u128) -> u128 {
    let mut out = 0u128;
    for i in 0..2 {
        out = out.with_lane64(i, if a.lane64(i) == b.lane64(i) { u64::MAX } else { 0 });
    }
    out
}

pub fn pcmpgtq(a: u128, b: u128) -> u128 {
    let mut out = 0u128;
    for i in 0..2 {
        let v = (a.lane64(i) as i64) > (b.lane64(i) as i64);
        out = out.with_lane64(i, if v { u64::MAX } else { 0 });
    }
    out
}

fn predicate_holds(pred: CmpPredicate, a: f64, b: f64) -> bool {
    let unordered = a.is_nan() || b.is_nan();
    match pred {
        CmpPredicate::Eq => !unordered && a == b,
        CmpPredicate::Lt => !unordered && a < b,
        CmpPredicate::Le => !unordered && a <= b,
        CmpPredicate::Unord => unordered,
        CmpPredicate::Neq => unordered || a != b,
        CmpPredicate::Nlt => unordered || !(a < b),
        CmpPredicate::Nle => unordered || !(a <= b),
        CmpPredicate::Ord => !unordered,
    }
}

pub fn cmpps(pred: CmpPredicate, a: u128, b: u128) -> u128 {
    let mut out = 0u128;
    for i in 0..4 {
        let v: u32 = if predicate_holds(pred, a.lane_f32(i) as f64, b.lane_f32(i) as f64) {
            u32::MAX
        } else {
            0
        };
        out = out.with_lane32(i, v);
    }
    out
}

pub fn cmppd(pred: CmpPredicate, a: u128, b: u128) -> u128 {
    let mut out = 0u128;
    for i in 0..2 {
        let v: u64 = if predicate_holds(pred, a.lane_f64(i), b.lane_f64(i)) {
            u64::MAX
        } else {
            0
        };
        out = out.with_lane64(i, v);
    }
    out
}

pub fn cmpss(pred: CmpPredicate, a: u128, b: u128) -> u128 {
    let v: u32 = if predicate_holds(pred, a.lane_f32(0) as f64, b.lane_f32(0) as f64) {
        u32::MAX
    } else {
        0
    };
    a.with_lane32(0, v)
}

pub fn cmpsd(pred: CmpPredicate, a: u128, b: u128) -> u128 {
    let v: u64 = if predicate_holds(pred, a.lane_f64(0), b.lane_f64(0)) {
        u64::MAX
    } else {
        0
    };
    a.with_lane64(0, v)
}

/// `comiss`/`comisd`/`ucomiss`/`ucomisd`: sets ZF/PF/CF exactly as `fcomi`
/// does (§4.1.8); the ordered/unordered distinction is not modeled, same
/// rationale as [`crate::interp::x87::fucomi`].
pub fn comiss(flags: &mut crate::state::RFlags, a: u128, b: u128) {
    compare_scalar(flags, a.lane_f32(0) as f64, b.lane_f32(0) as f64);
}

pub fn comisd(flags: &mut crate::state::RFlags, a: u128, b: u128) {
    compare_scalar(flags, a.lane_f64(0), b.lane_f64(0));
}

fn compare_scalar(flags: &mut crate::state::RFlags, a: f64, b: f64) {
    if a.is_nan() || b.is_nan() {
        flags.set_carry(true);
        flags.set_parity(true);
        flags.set_zero(true);
        return;
    }
    flags.set_carry(a < b);
    flags.set_parity(false);
    flags.set_zero(a == b);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcmpeqb_all_lanes_equal() {
        assert_eq!(pcmpeqb(0, 0), u128::MAX);
    }

    #[test]
    fn pminsw_uses_signed_comparison() {
        let a = 0u128.with_lane16(0, 0xFFFFu16); // -1
        let b = 0u128.with_lane16(0, 1u16);
        assert_eq!(pminsw(a, b).lane16(0) as i16, -1);
    }

    #[test]
    fn pminub_uses_unsigned_comparison() {
        let a = 0u128.with_lane8(0, 0xFFu8);
        let b = 0u128.with_lane8(0, 1u8);
        assert_eq!(pminub(a, b).lane8(0), 1);
    }

    #[test]
    fn cmpps_eq_predicate_false_on_nan() {
        let a = 0u128.with_lane_f32(0, f32::NAN);
        let b = 0u128.with_lane_f32(0, 1.0);
        assert_eq!(cmpps(CmpPredicate::Eq, a, b).lane32(0), 0);
        assert_eq!(cmpps(CmpPredicate::Unord, a, b).lane32(0), u32::MAX);
    }
}
