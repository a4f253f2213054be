//! Packed shift (§4.1.8). Diverges deliberately from the reference C++
//! source: a shift count at or beyond the lane width produces an all-zero
//! (or, for `psra*`, all-sign) lane rather than relying on a raw C++ shift
//! whose behaviour is undefined once the count reaches the type width.

use aero_types::Simd128Ext;

macro_rules! packed_shift_family {
    ($lanes:expr, $u:ty, $i:ty, $shl:ident, $shrl:ident, $sra:ident, $lane:ident, $with_lane:ident) => {
        /// `psllw`/`pslld`/`psllq`: logical shift left, same count applied
        /// to every lane.
        pub fn $shl(a: u128, count: u64) -> u128 {
            let mut out = 0u128;
            let w = <$u>::BITS as u64;
            for i in 0..$lanes {
                let v = if count >= w { 0 } else { a.$lane(i) << count };
                out = out.$with_lane(i, v);
            }
            out
        }

        /// `psrlw`/`psrld`/`psrlq`: logical shift right.
        pub fn $shrl(a: u128, count: u64) -> u128 {
            let mut out = 0u128;
            let w = <$u>::BITS as u64;
            for i in 0..$lanes {
                let v = if count >= w { 0 } else { a.$lane(i) >> count };
                out = out.$with_lane(i, v);
            }
            out
        }

        /// `psraw`/`psrad`: arithmetic shift right (sign-extending).
        pub fn $sra(a: u128, count: u64) -> u128 {
            let mut out = 0u128;
            let w = <$u>::BITS as u64;
            for i in 0..$lanes {
                let lane = a.$lane(i) as $i;
                let shift = count.min(w - 1) as u32;
                out = out.$with_lane(i, (lane >> shift) as $u);
            }
            out
        }
    };
}

packed_shift_family!(8, u16, i16, psllw, psrlw, psraw, lane16, with_lane16);
packed_shift_family!(4, u32, i32, pslld, psrld, psrad, lane32, with_lane32);

// psllq/psrlq have no arithmetic-shift counterpart in the real ISA.
pub fn psllq(a: u128, count: u64) -> u128 {
    let mut out = 0u128;
    for i in 0..2 {
        let v = if count >= 64 { 0 } else { a.lane64(i) << count };
        out = out.with_lane64(i, v);
    }
    out
}

pub fn psrlq(a: u128, count: u64) -> u128 {
    let mut out = 0u128;
    for i in 0..2 {
        let v = if count >= 64 { 0 } else { a.lane64(i) >> count };
        out = out.with_lane64(i, v);
    }
    out
}

/// `pslldq`/`psrldq`: whole-register byte shift (not lane-wise), count in
/// bytes, clamped to 16.
pub fn pslldq(a: u128, count: u32) -> u128 {
    if count >= 16 {
        return 0;
    }
    a << (count * 8)
}

pub fn psrldq(a: u128, count: u32) -> u128 {
    if count >= 16 {
        return 0;
    }
    a >> (count * 8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn psllw_count_ge_width_is_zero() {
        let a = 0u128.with_lane16(0, 0xFFFFu16);
        assert_eq!(psllw(a, 16).lane16(0), 0);
    }

    #[test]
    fn psrad_preserves_sign() {
        let a = 0u128.with_lane32(0, 0x8000_0000u32);
        let r = psrad(a, 31);
        assert_eq!(r.lane32(0), 0xFFFF_FFFF);
    }

    #[test]
    fn pslldq_shifts_whole_bytes() {
        let a = 0x0000_0000_0000_0000_0000_0000_0000_00FFu128;
        assert_eq!(pslldq(a, 1), 0xFF00);
    }
}
