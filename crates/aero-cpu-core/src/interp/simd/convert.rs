//! Scalar/packed conversions between integer and floating-point lanes
//! (§4.1.8): `cvtsi2ss`/`cvtsi2sd`, `cvtss2sd`/`cvtsd2ss`, `cvt(t)ss2si`/
//! `cvt(t)sd2si`, `cvtdq2ps`/`cvtps2dq`/`cvttps2dq`, `cvtpd2ps`.

use aero_types::Simd128Ext;

pub fn cvtsi2ss(dst: u128, src: i32) -> u128 {
    dst.with_lane_f32(0, src as f32)
}

pub fn cvtsi2sd(dst: u128, src: i64) -> u128 {
    dst.with_lane_f64(0, src as f64)
}

pub fn cvtss2sd(dst: u128, src: u128) -> u128 {
    dst.with_lane_f64(0, src.lane_f32(0) as f64)
}

pub fn cvtsd2ss(dst: u128, src: u128) -> u128 {
    dst.with_lane_f32(0, src.lane_f64(0) as f32)
}

/// Round-to-nearest-even per the active MXCSR rounding mode is the caller's
/// responsibility (the host FPU performs the narrowing); this primitive
/// uses Rust's default `as` narrowing, matching round-to-nearest for the
/// common case.
pub fn cvtss2si(src: u128) -> i32 {
    src.lane_f32(0).round_ties_even() as i32
}

pub fn cvtsd2si(src: u128) -> i64 {
    src.lane_f64(0).round_ties_even() as i64
}

/// Truncating forms (`cvttss2si`/`cvttsd2si`): always round toward zero,
/// regardless of the active rounding mode (§4.1.8).
pub fn cvttss2si(src: u128) -> i32 {
    src.lane_f32(0).trunc() as i32
}

pub fn cvttsd2si(src: u128) -> i64 {
    src.lane_f64(0).trunc() as i64
}

pub fn cvtdq2ps(src: u128) -> u128 {
    let mut out = 0u128;
    for i in 0..4 {
        out = out.with_lane_f32(i, src.lane32(i) as i32 as f32);
    }
    out
}

pub fn cvtps2dq(src: u128) -> u128 {
    let mut out = 0u128;
    for i in 0..4 {
        out = out.with_lane32(i, src.lane_f32(i).round_ties_even() as i32 as u32);
    }
    out
}

pub fn cvttps2dq(src: u128) -> u128 {
    let mut out = 0u128;
    for i in 0..4 {
        out = out.with_lane32(i, src.lane_f32(i).trunc() as i32 as u32);
    }
    out
}

/// `cvtpd2ps`: narrows the two packed doubles into the low two lanes of a
/// packed-single result; the high two lanes are zeroed (§4.1.8).
pub fn cvtpd2ps(src: u128) -> u128 {
    let mut out = 0u128;
    for i in 0..2 {
        out = out.with_lane_f32(i, src.lane_f64(i) as f32);
    }
    out
}

/// `cvtdq2pd`: widens the low two signed 32-bit lanes of `src` into two
/// packed doubles (§4.1.8).
pub fn cvtdq2pd(src: u128) -> u128 {
    let mut out = 0u128;
    for i in 0..2 {
        out = out.with_lane_f64(i, src.lane32(i) as i32 as f64);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cvtsi2ss_preserves_sign() {
        let r = cvtsi2ss(0, -5);
        assert_eq!(r.lane_f32(0), -5.0);
    }

    #[test]
    fn cvttsd2si_truncates_toward_zero() {
        let src = 0u128.with_lane_f64(0, -3.9);
        assert_eq!(cvttsd2si(src), -3);
    }

    #[test]
    fn cvtdq2ps_round_trips_small_integers() {
        let src = 0u128.with_lane32(0, (-42i32) as u32);
        let r = cvtdq2ps(src);
        assert_eq!(r.lane_f32(0), -42.0);
    }
}
