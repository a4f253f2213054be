//! §4.1.3 Shift/rotate family: `shl`/`shr`/`sar`/`shld`/`shrd`/`rol`/`ror`/
//! `rcl`/`rcr`. Every function masks its count the same way (`count &
//! (W==64 ? 63 : 31)`) and leaves flags untouched when the masked count is
//! zero, per the shared invariant in §3/§4.1.3.

use crate::state::RFlags;

macro_rules! shift_family {
    ($w:expr, $mask:expr, $u:ty, $i:ty, $wide:ty,
     $shl:ident, $shr:ident, $sar:ident, $rol:ident, $ror:ident, $rcl:ident, $rcr:ident) => {
        pub fn $shl(flags: &mut RFlags, dst: $u, count: u32) -> $u {
            let masked = count & $mask;
            if masked == 0 {
                return dst;
            }
            let wide = (dst as $wide) << masked;
            let result = wide as $u;
            let carry = masked <= $w && (wide & (1 as $wide) << $w) != 0;
            flags.set_carry(carry);
            if masked == 1 {
                flags.set_overflow(((result as $i) < 0) != carry);
            }
            flags.set_zero(result == 0);
            flags.set_sign((result as $i) < 0);
            flags.set_parity(RFlags::parity_of(result as u64));
            result
        }

        pub fn $shr(flags: &mut RFlags, dst: $u, count: u32) -> $u {
            let masked = count & $mask;
            if masked == 0 {
                return dst;
            }
            let original_top = (dst as $i) < 0;
            let (result, carry) = if masked >= $w {
                (0, masked == $w && original_top)
            } else {
                (dst >> masked, (dst >> (masked - 1)) & 1 != 0)
            };
            flags.set_carry(carry);
            if masked == 1 {
                flags.set_overflow(original_top);
            }
            flags.set_zero(result == 0);
            flags.set_sign((result as $i) < 0);
            flags.set_parity(RFlags::parity_of(result as u64));
            result
        }

        pub fn $sar(flags: &mut RFlags, dst: $u, count: u32) -> $u {
            let masked = count & $mask;
            if masked == 0 {
                return dst;
            }
            let shift = masked.min($w - 1);
            let result = ((dst as $i) >> shift) as $u;
            let carry = if masked >= $w {
                (dst as $i) < 0
            } else {
                (dst >> (masked - 1)) & 1 != 0
            };
            flags.set_carry(carry);
            if masked == 1 {
                flags.set_overflow(false);
            }
            flags.set_zero(result == 0);
            flags.set_sign((result as $i) < 0);
            flags.set_parity(RFlags::parity_of(result as u64));
            result
        }

        pub fn $rol(flags: &mut RFlags, dst: $u, count: u32) -> $u {
            let masked = count & $mask;
            if masked == 0 {
                return dst;
            }
            let result = dst.rotate_left(masked);
            let carry = result & 1 != 0;
            flags.set_carry(carry);
            if masked == 1 {
                flags.set_overflow(((result as $i) < 0) != carry);
            }
            result
        }

        pub fn $ror(flags: &mut RFlags, dst: $u, count: u32) -> $u {
            let masked = count & $mask;
            if masked == 0 {
                return dst;
            }
            let result = dst.rotate_right(masked);
            let top = (result as $i) < 0;
            let carry = top;
            flags.set_carry(carry);
            if masked == 1 {
                let second = ((result << 1) as $i) < 0;
                flags.set_overflow(top != second);
            }
            result
        }

        pub fn $rcl(flags: &mut RFlags, dst: $u, count: u32, carry_in: bool) -> $u {
            let masked = (count & $mask) % ($w + 1);
            let mut value = dst;
            let mut carry = carry_in;
            for _ in 0..masked {
                let new_carry = (value as $i) < 0;
                value = (value << 1) | (carry as $u);
                carry = new_carry;
            }
            if masked != 0 {
                flags.set_carry(carry);
            }
            if (count & $mask) == 1 {
                flags.set_overflow(((value as $i) < 0) != carry);
            }
            value
        }

        pub fn $rcr(flags: &mut RFlags, dst: $u, count: u32, carry_in: bool) -> $u {
            let masked = (count & $mask) % ($w + 1);
            let mut value = dst;
            let mut carry = carry_in;
            for _ in 0..masked {
                let new_carry = value & 1 != 0;
                value = (value >> 1) | ((carry as $u) << ($w - 1));
                carry = new_carry;
            }
            if masked != 0 {
                flags.set_carry(carry);
            }
            if (count & $mask) == 1 {
                let top = (value as $i) < 0;
                flags.set_overflow(top != carry);
            }
            value
        }
    };
}

// The `$wide` type must be able to hold `dst` shifted left by the worst-case
// masked count (31 for 8/16/32-bit operands, 63 for 64-bit) without
// overflowing the shift itself; `u64` covers every width-<=32 case (at most
// 32 + 31 = 63 bits used) and `u128` covers the 64-bit case (64 + 63 = 127).
shift_family!(8, 31, u8, i8, u64, shl8, shr8, sar8, rol8, ror8, rcl8, rcr8);
shift_family!(16, 31, u16, i16, u64, shl16, shr16, sar16, rol16, ror16, rcl16, rcr16);
shift_family!(32, 31, u32, i32, u64, shl32, shr32, sar32, rol32, ror32, rcl32, rcr32);
shift_family!(64, 63, u64, i64, u128, shl64, shr64, sar64, rol64, ror64, rcl64, rcr64);

/// `shld`: concatenate `dst:src` as a 2W-bit value (`dst` supplies the
/// high half), shift left by the masked count, return the high W bits.
/// Only meaningful at 32/64-bit width (§4.1.3); the mask always stays
/// below W at these widths, so the "count >= width" case the architecture
/// leaves undefined cannot arise here.
macro_rules! shift_double_family {
    ($w:expr, $mask:expr, $u:ty, $i:ty, $wide:ty, $shld:ident, $shrd:ident) => {
        pub fn $shld(flags: &mut RFlags, dst: $u, src: $u, count: u32) -> $u {
            let masked = count & $mask;
            if masked == 0 {
                return dst;
            }
            let combined: $wide = ((dst as $wide) << $w) | (src as $wide);
            let shifted = combined << masked;
            let result = (shifted >> $w) as $u;
            let carry = (combined >> (2 * $w - masked)) & 1 != 0;
            flags.set_carry(carry);
            if masked == 1 {
                flags.set_overflow(((result as $i) < 0) != carry);
            }
            flags.set_zero(result == 0);
            flags.set_sign((result as $i) < 0);
            flags.set_parity(RFlags::parity_of(result as u64));
            result
        }

        pub fn $shrd(flags: &mut RFlags, dst: $u, src: $u, count: u32) -> $u {
            let masked = count & $mask;
            if masked == 0 {
                return dst;
            }
            let original_top = (dst as $i) < 0;
            let combined: $wide = ((src as $wide) << $w) | (dst as $wide);
            let shifted = combined >> masked;
            let result = shifted as $u;
            let carry = (combined >> (masked - 1)) & 1 != 0;
            flags.set_carry(carry);
            if masked == 1 {
                flags.set_overflow(original_top);
            }
            flags.set_zero(result == 0);
            flags.set_sign((result as $i) < 0);
            flags.set_parity(RFlags::parity_of(result as u64));
            result
        }
    };
}

shift_double_family!(32, 31, u32, i32, u64, shld32, shrd32);
shift_double_family!(64, 63, u64, i64, u128, shld64, shrd64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_count_leaves_flags_and_value_unchanged() {
        let mut f = RFlags::empty();
        f.set_carry(true);
        let before = f;
        assert_eq!(shl32(&mut f, 0x1234, 0), 0x1234);
        assert_eq!(f, before);
    }

    #[test]
    fn rol_ror_are_inverses() {
        let x: u32 = 0xDEAD_BEEF;
        for n in 0..32u32 {
            let mut f1 = RFlags::empty();
            let mut f2 = RFlags::empty();
            let rolled = rol32(&mut f1, x, n);
            let back = ror32(&mut f2, rolled, n);
            assert_eq!(back, x, "n={n}");
        }
    }

    #[test]
    fn shl_overflow_only_defined_at_count_one() {
        let mut f = RFlags::empty();
        // 0x40 << 1 = 0x80: sign flips from 0 to 1 with no carry -> OF=1.
        shl8(&mut f, 0x40, 1);
        assert!(f.overflow());
    }

    #[test]
    fn rcl_through_carry() {
        let mut f = RFlags::empty();
        f.set_carry(true);
        // RCL by 1 on 0 with CF=1 rotates the carry into bit 0.
        let r = rcl8(&mut f, 0, 1, true);
        assert_eq!(r, 1);
        assert!(!f.carry());
    }

    #[test]
    fn shr_count_ge_width_is_all_zero_for_8bit() {
        let mut f = RFlags::empty();
        let r = shr8(&mut f, 0xFF, 9);
        assert_eq!(r, 0);
    }
}
