//! Packed arithmetic: integer add/sub (with saturating variants) and
//! packed/scalar single/double-precision float add/sub/mul/div.

use aero_types::Simd128Ext;

macro_rules! packed_int_family {
    ($lanes:expr, $u:ty, $i:ty, $add:ident, $sub:ident, $adds:ident, $subs:ident,
     $addus:ident, $subus:ident, $lane:ident, $with_lane:ident) => {
        pub fn $add(a: u128, b: u128) -> u128 {
            let mut out = 0u128;
            for i in 0..$lanes {
                let r = a.$lane(i).wrapping_add(b.$lane(i));
                out = out.$with_lane(i, r);
            }
            out
        }

        pub fn $sub(a: u128, b: u128) -> u128 {
            let mut out = 0u128;
            for i in 0..$lanes {
                let r = a.$lane(i).wrapping_sub(b.$lane(i));
                out = out.$with_lane(i, r);
            }
            out
        }

        /// Signed saturating add (`paddsb`/`paddsw`).
        pub fn $adds(a: u128, b: u128) -> u128 {
            let mut out = 0u128;
            for i in 0..$lanes {
                let av = a.$lane(i) as $i;
                let bv = b.$lane(i) as $i;
                out = out.$with_lane(i, av.saturating_add(bv) as $u);
            }
            out
        }

        /// Signed saturating sub (`psubsb`/`psubsw`).
        pub fn $subs(a: u128, b: u128) -> u128 {
            let mut out = 0u128;
            for i in 0..$lanes {
                let av = a.$lane(i) as $i;
                let bv = b.$lane(i) as $i;
                out = out.$with_lane(i, av.saturating_sub(bv) as $u);
            }
            out
        }

        /// Unsigned saturating add (`paddusb`/`paddusw`).
        pub fn $addus(a: u128, b: u128) -> u128 {
            let mut out = 0u128;
            for i in 0..$lanes {
                out = out.$with_lane(i, a.$lane(i).saturating_add(b.$lane(i)));
            }
            out
        }

        /// Unsigned saturating sub (`psubusb`/`psubusw`).
        pub fn $subus(a: u128, b: u128) -> u128 {
            let mut out = 0u128;
            for i in 0..$lanes {
                out = out.$with_lane(i, a.$lane(i).saturating_sub(b.$lane(i)));
            }
            out
        }
    };
}

packed_int_family!(
    16, u8, i8, paddb, psubb, paddsb, psubsb, paddusb, psubusb, lane8, with_lane8
);
packed_int_family!(
    8, u16, i16, paddw, psubw, paddsw, psubsw, paddusw, psubusw, lane16, with_lane16
);

// No saturating add/sub exists in the real ISA at 32/64-bit lane width
// (§4.1.8 only defines `paddsb`/`paddsw`/`paddusb`/`paddusw`): these two
// widths only get the wrapping form.
macro_rules! packed_int_wrapping_only {
    ($lanes:expr, $u:ty, $add:ident, $sub:ident, $lane:ident, $with_lane:ident) => {
        pub fn $add(a: u128, b: u128) -> u128 {
            let mut out = 0u128;
            for i in 0..$lanes {
                out = out.$with_lane(i, a.$lane(i).wrapping_add(b.$lane(i)));
            }
            out
        }

        pub fn $sub(a: u128, b: u128) -> u128 {
            let mut out = 0u128;
            for i in 0..$lanes {
                out = out.$with_lane(i, a.$lane(i).wrapping_sub(b.$lane(i)));
            }
            out
        }
    };
}

packed_int_wrapping_only!(4, u32, paddd, psubd, lane32, with_lane32);
packed_int_wrapping_only!(2, u64, paddq, psubq, lane64, with_lane64);

macro_rules! packed_float_family {
    ($lanes:expr, $f:ty, $lane:ident, $with_lane:ident,
     $addp:ident, $subp:ident, $mulp:ident, $divp:ident,
     $adds:ident, $subs:ident, $muls:ident, $divs:ident) => {
        pub fn $addp(a: u128, b: u128) -> u128 {
            let mut out = a;
            for i in 0..$lanes {
                out = out.$with_lane(i, a.$lane(i) + b.$lane(i));
            }
            out
        }

        pub fn $subp(a: u128, b: u128) -> u128 {
            let mut out = a;
            for i in 0..$lanes {
                out = out.$with_lane(i, a.$lane(i) - b.$lane(i));
            }
            out
        }

        pub fn $mulp(a: u128, b: u128) -> u128 {
            let mut out = a;
            for i in 0..$lanes {
                out = out.$with_lane(i, a.$lane(i) * b.$lane(i));
            }
            out
        }

        pub fn $divp(a: u128, b: u128) -> u128 {
            let mut out = a;
            for i in 0..$lanes {
                out = out.$with_lane(i, a.$lane(i) / b.$lane(i));
            }
            out
        }

        /// Scalar form: only lane 0 is computed, lanes 1.. pass through
        /// from `a` untouched (§4.1.8).
        pub fn $adds(a: u128, b: u128) -> u128 {
            a.$with_lane(0, a.$lane(0) + b.$lane(0))
        }

        pub fn $subs(a: u128, b: u128) -> u128 {
            a.$with_lane(0, a.$lane(0) - b.$lane(0))
        }

        pub fn $muls(a: u128, b: u128) -> u128 {
            a.$with_lane(0, a.$lane(0) * b.$lane(0))
        }

        pub fn $divs(a: u128, b: u128) -> u128 {
            a.$with_lane(0, a.$lane(0) / b.$lane(0))
        }
    };
}

packed_float_family!(
    4, f32, lane_f32, with_lane_f32, addps, subps, mulps, divps, addss, subss, mulss, divss
);
packed_float_family!(
    2, f64, lane_f64, with_lane_f64, addpd, subpd, mulpd, divpd, addsd, subsd, mulsd, divsd
);

macro_rules! packed_float_sqrt_minmax {
    ($lanes:expr, $lane:ident, $with_lane:ident,
     $sqrtp:ident, $minp:ident, $maxp:ident, $sqrts:ident, $mins:ident, $maxs:ident) => {
        pub fn $sqrtp(a: u128) -> u128 {
            let mut out = a;
            for i in 0..$lanes {
                out = out.$with_lane(i, a.$lane(i).sqrt());
            }
            out
        }

        /// Per §4.1.8, `minps`/`minpd` return `b` whenever the compare is
        /// unordered or the operands are equal, mirroring the host SSE
        /// instruction rather than Rust's NaN-propagating `f32::min`.
        pub fn $minp(a: u128, b: u128) -> u128 {
            let mut out = a;
            for i in 0..$lanes {
                let (av, bv) = (a.$lane(i), b.$lane(i));
                out = out.$with_lane(i, if av < bv { av } else { bv });
            }
            out
        }

        pub fn $maxp(a: u128, b: u128) -> u128 {
            let mut out = a;
            for i in 0..$lanes {
                let (av, bv) = (a.$lane(i), b.$lane(i));
                out = out.$with_lane(i, if av > bv { av } else { bv });
            }
            out
        }

        pub fn $sqrts(a: u128) -> u128 {
            a.$with_lane(0, a.$lane(0).sqrt())
        }

        pub fn $mins(a: u128, b: u128) -> u128 {
            let (av, bv) = (a.$lane(0), b.$lane(0));
            a.$with_lane(0, if av < bv { av } else { bv })
        }

        pub fn $maxs(a: u128, b: u128) -> u128 {
            let (av, bv) = (a.$lane(0), b.$lane(0));
            a.$with_lane(0, if av > bv { av } else { bv })
        }
    };
}

packed_float_sqrt_minmax!(
    4, lane_f32, with_lane_f32, sqrtps, minps, maxps, sqrtss, minss, maxss
);
packed_float_sqrt_minmax!(
    2, lane_f64, with_lane_f64, sqrtpd, minpd, maxpd, sqrtsd, minsd, maxsd
);

/// `pmullw`: low 16 bits of each signed 16x16 lane product.
pub fn pmullw(a: u128, b: u128) -> u128 {
    let mut out = 0u128;
    for i in 0..8 {
        let p = (a.lane16(i) as i16 as i32) * (b.lane16(i) as i16 as i32);
        out = out.with_lane16(i, p as u16);
    }
    out
}

/// `pmulhw`: high 16 bits of each signed 16x16 lane product.
pub fn pmulhw(a: u128, b: u128) -> u128 {
    let mut out = 0u128;
    for i in 0..8 {
        let p = (a.lane16(i) as i16 as i32) * (b.lane16(i) as i16 as i32);
        out = out.with_lane16(i, (p >> 16) as u16);
    }
    out
}

/// `pmulhuw`: high 16 bits of each unsigned 16x16 lane product.
pub fn pmulhuw(a: u128, b: u128) -> u128 {
    let mut out = 0u128;
    for i in 0..8 {
        let p = (a.lane16(i) as u32) * (b.lane16(i) as u32);
        out = out.with_lane16(i, (p >> 16) as u16);
    }
    out
}

/// `pmuludq`: unsigned 32x32->64 multiply of the even-indexed dwords only.
pub fn pmuludq(a: u128, b: u128) -> u128 {
    let mut out = 0u128;
    for i in 0..2 {
        let p = (a.lane32(2 * i) as u64) * (b.lane32(2 * i) as u64);
        out = out.with_lane64(i, p);
    }
    out
}

/// `pmaddwd`: multiplies adjacent signed 16-bit lane pairs and sums them
/// into a signed 32-bit result.
pub fn pmaddwd(a: u128, b: u128) -> u128 {
    let mut out = 0u128;
    for i in 0..4 {
        let lo = (a.lane16(2 * i) as i16 as i32) * (b.lane16(2 * i) as i16 as i32);
        let hi = (a.lane16(2 * i + 1) as i16 as i32) * (b.lane16(2 * i + 1) as i16 as i32);
        out = out.with_lane32(i, lo.wrapping_add(hi) as u32);
    }
    out
}

/// `pmaddubsw`: multiplies unsigned bytes from `a` by signed bytes from
/// `b` in adjacent pairs, sums with saturation into a signed 16-bit lane.
pub fn pmaddubsw(a: u128, b: u128) -> u128 {
    let mut out = 0u128;
    for i in 0..8 {
        let lo = (a.lane8(2 * i) as i32) * (b.lane8(2 * i) as i8 as i32);
        let hi = (a.lane8(2 * i + 1) as i32) * (b.lane8(2 * i + 1) as i8 as i32);
        let sum = (lo + hi).clamp(i16::MIN as i32, i16::MAX as i32);
        out = out.with_lane16(i, sum as u16);
    }
    out
}

/// `pavgb`/`pavgw`: unsigned rounding average, `(a + b + 1) >> 1`.
pub fn pavgb(a: u128, b: u128) -> u128 {
    let mut out = 0u128;
    for i in 0..16 {
        let v = (a.lane8(i) as u16 + b.lane8(i) as u16 + 1) >> 1;
        out = out.with_lane8(i, v as u8);
    }
    out
}

pub fn pavgw(a: u128, b: u128) -> u128 {
    let mut out = 0u128;
    for i in 0..8 {
        let v = (a.lane16(i) as u32 + b.lane16(i) as u32 + 1) >> 1;
        out = out.with_lane16(i, v as u16);
    }
    out
}

/// `psadbw`: sum of absolute byte differences, per 8-byte half, broadcast
/// into the low 16 bits of each half's 64-bit lane.
pub fn psadbw(a: u128, b: u128) -> u128 {
    let mut out = 0u128;
    for half in 0..2 {
        let mut sum: u64 = 0;
        for i in 0..8 {
            let lane = half * 8 + i;
            sum += (a.lane8(lane) as i32 - b.lane8(lane) as i32).unsigned_abs() as u64;
        }
        out = out.with_lane64(half, sum);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paddb_wraps_per_lane() {
        let a: u128 = 0xFF;
        let b: u128 = 0x01;
        assert_eq!(paddb(a, b), 0);
    }

    #[test]
    fn paddsb_saturates_at_i8_max() {
        let a = 0u128.with_lane8(0, 100u8);
        let b = 0u128.with_lane8(0, 100u8);
        let r = paddsb(a, b);
        assert_eq!(r.lane8(0) as i8, i8::MAX);
    }

    #[test]
    fn psubusw_floors_at_zero() {
        let a = 0u128.with_lane16(0, 5u16);
        let b = 0u128.with_lane16(0, 10u16);
        assert_eq!(psubusw(a, b).lane16(0), 0);
    }

    #[test]
    fn addss_only_touches_lane_zero() {
        let a = 0u128.with_lane_f32(0, 1.0).with_lane_f32(1, 9.0);
        let b = 0u128.with_lane_f32(0, 2.0);
        let r = addss(a, b);
        assert_eq!(r.lane_f32(0), 3.0);
        assert_eq!(r.lane_f32(1), 9.0);
    }

    #[test]
    fn sqrtps_computes_per_lane_root() {
        let a = 0u128.with_lane_f32(0, 9.0).with_lane_f32(1, 16.0);
        let r = sqrtps(a);
        assert_eq!(r.lane_f32(0), 3.0);
        assert_eq!(r.lane_f32(1), 4.0);
    }

    #[test]
    fn minps_prefers_b_when_unordered() {
        let a = 0u128.with_lane_f32(0, f32::NAN);
        let b = 0u128.with_lane_f32(0, 5.0);
        assert_eq!(minps(a, b).lane_f32(0), 5.0);
    }

    #[test]
    fn pmulhw_returns_high_half_of_signed_product() {
        let a = 0u128.with_lane16(0, 0x7FFFu16);
        let b = 0u128.with_lane16(0, 2u16);
        assert_eq!(pmulhw(a, b).lane16(0), 0);
    }

    #[test]
    fn pmaddwd_sums_adjacent_products() {
        let a = 0u128.with_lane16(0, 2u16).with_lane16(1, 3u16);
        let b = 0u128.with_lane16(0, 4u16).with_lane16(1, 5u16);
        assert_eq!(pmaddwd(a, b).lane32(0), 8 + 15);
    }

    #[test]
    fn psadbw_sums_absolute_differences_per_half() {
        let a = 0u128.with_lane8(0, 10u8).with_lane8(1, 20u8);
        let b = 0u128.with_lane8(0, 3u8).with_lane8(1, 25u8);
        assert_eq!(psadbw(a, b).lane64(0), 7 + 5);
    }
}
