//! §4.1.2 Bitwise family: `and`/`or`/`xor`/`not`/`test`.

use crate::state::RFlags;

macro_rules! bitwise_family {
    ($w:expr, $u:ty, $i:ty, $and:ident, $or:ident, $xor:ident, $not:ident, $test:ident) => {
        pub fn $and(flags: &mut RFlags, dst: $u, src: $u) -> $u {
            let result = dst & src;
            flags.set_carry(false);
            flags.set_overflow(false);
            flags.set_zero(result == 0);
            flags.set_sign((result as $i) < 0);
            flags.set_parity(RFlags::parity_of(result as u64));
            result
        }

        pub fn $or(flags: &mut RFlags, dst: $u, src: $u) -> $u {
            let result = dst | src;
            flags.set_carry(false);
            flags.set_overflow(false);
            flags.set_zero(result == 0);
            flags.set_sign((result as $i) < 0);
            flags.set_parity(RFlags::parity_of(result as u64));
            result
        }

        pub fn $xor(flags: &mut RFlags, dst: $u, src: $u) -> $u {
            let result = dst ^ src;
            flags.set_carry(false);
            flags.set_overflow(false);
            flags.set_zero(result == 0);
            flags.set_sign((result as $i) < 0);
            flags.set_parity(RFlags::parity_of(result as u64));
            result
        }

        /// No flag effect (§4.1.2).
        pub fn $not(dst: $u) -> $u {
            !dst
        }

        /// `and` without writing the result back (§4.1.6).
        pub fn $test(flags: &mut RFlags, dst: $u, src: $u) -> $u {
            $and(flags, dst, src)
        }
    };
}

bitwise_family!(8, u8, i8, and8, or8, xor8, not8, test8);
bitwise_family!(16, u16, i16, and16, or16, xor16, not16, test16);
bitwise_family!(32, u32, i32, and32, or32, xor32, not32, test32);
bitwise_family!(64, u64, i64, and64, or64, xor64, not64, test64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_is_involutive() {
        assert_eq!(not32(not32(0x1234_5678)), 0x1234_5678);
    }

    #[test]
    fn and_or_xor_are_commutative() {
        let mut f1 = RFlags::empty();
        let mut f2 = RFlags::empty();
        assert_eq!(and16(&mut f1, 0xAB, 0x3F), and16(&mut f2, 0x3F, 0xAB));
        assert_eq!(or16(&mut f1, 0xAB, 0x3F), or16(&mut f2, 0x3F, 0xAB));
        assert_eq!(xor16(&mut f1, 0xAB, 0x3F), xor16(&mut f2, 0x3F, 0xAB));
    }
}
