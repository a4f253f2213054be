//! Pack-with-saturation and unpack/interleave (§4.1.8).

use aero_types::Simd128Ext;

/// `packsswb`: 16 signed 16-bit lanes (8 from `a`, 8 from `b`) saturated
/// into 16 signed 8-bit lanes.
pub fn packsswb(a: u128, b: u128) -> u128 {
    let mut out = 0u128;
    for i in 0..8 {
        out = out.with_lane8(i, (a.lane16(i) as i16).clamp(i8::MIN as i16, i8::MAX as i16) as u8);
    }
    for i in 0..8 {
        out = out.with_lane8(8 + i, (b.lane16(i) as i16).clamp(i8::MIN as i16, i8::MAX as i16) as u8);
    }
    out
}

pub fn packuswb(a: u128, b: u128) -> u128 {
    let mut out = 0u128;
    for i in 0..8 {
        out = out.with_lane8(i, (a.lane16(i) as i16).clamp(0, u8::MAX as i16) as u8);
    }
    for i in 0..8 {
        out = out.with_lane8(8 + i, (b.lane16(i) as i16).clamp(0, u8::MAX as i16) as u8);
    }
    out
}

pub fn packssdw(a: u128, b: u128) -> u128 {
    let mut out = 0u128;
    for i in 0..4 {
        out = out.with_lane16(i, (a.lane32(i) as i32).clamp(i16::MIN as i32, i16::MAX as i32) as u16);
    }
    for i in 0..4 {
        out = out.with_lane16(4 + i, (b.lane32(i) as i32).clamp(i16::MIN as i32, i16::MAX as i32) as u16);
    }
    out
}

/// `packusdw`: 8 signed 32-bit lanes (4 from `a`, 4 from `b`) saturated
/// into 8 unsigned 16-bit lanes.
pub fn packusdw(a: u128, b: u128) -> u128 {
    let mut out = 0u128;
    for i in 0..4 {
        out = out.with_lane16(i, (a.lane32(i) as i32).clamp(0, u16::MAX as i32) as u16);
    }
    for i in 0..4 {
        out = out.with_lane16(4 + i, (b.lane32(i) as i32).clamp(0, u16::MAX as i32) as u16);
    }
    out
}

macro_rules! unpack_family {
    ($lanes_half:expr, $u:ty, $lo:ident, $hi:ident, $lane:ident, $with_lane:ident) => {
        /// Interleave the low half of `a` and `b`.
        pub fn $lo(a: u128, b: u128) -> u128 {
            let mut out = 0u128;
            for i in 0..$lanes_half {
                out = out.$with_lane(2 * i, a.$lane(i));
                out = out.$with_lane(2 * i + 1, b.$lane(i));
            }
            out
        }

        /// Interleave the high half of `a` and `b`.
        pub fn $hi(a: u128, b: u128) -> u128 {
            let mut out = 0u128;
            for i in 0..$lanes_half {
                out = out.$with_lane(2 * i, a.$lane($lanes_half + i));
                out = out.$with_lane(2 * i + 1, b.$lane($lanes_half + i));
            }
            out
        }
    };
}

unpack_family!(8, u8, punpcklbw, punpckhbw, lane8, with_lane8);
unpack_family!(4, u16, punpcklwd, punpckhwd, lane16, with_lane16);
unpack_family!(2, u32, punpckldq, punpckhdq, lane32, with_lane32);
unpack_family!(1, u64, punpcklqdq, punpckhqdq, lane64, with_lane64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packsswb_saturates_out_of_range_lanes() {
        let a = 0u128.with_lane16(0, 200u16); // > i8::MAX
        let r = packsswb(a, 0);
        assert_eq!(r.lane8(0) as i8, i8::MAX);
    }

    #[test]
    fn punpcklbw_interleaves_low_bytes() {
        let a = 0u128.with_lane8(0, 0xAAu8);
        let b = 0u128.with_lane8(0, 0xBBu8);
        let r = punpcklbw(a, b);
        assert_eq!(r.lane8(0), 0xAA);
        assert_eq!(r.lane8(1), 0xBB);
    }

    #[test]
    fn punpckhqdq_takes_upper_quadwords() {
        let a = 0u128.with_lane64(1, 0x1111_2222_3333_4444u64);
        let b = 0u128.with_lane64(1, 0x5555_6666_7777_8888u64);
        let r = punpckhqdq(a, b);
        assert_eq!(r.lane64(0), 0x1111_2222_3333_4444);
        assert_eq!(r.lane64(1), 0x5555_6666_7777_8888);
    }
}
