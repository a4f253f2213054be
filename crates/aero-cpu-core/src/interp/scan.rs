//! §4.1.5 Scan & count family: `bsr`/`bsf`/`tzcnt`/`popcnt`/`bswap`.

use crate::state::RFlags;

macro_rules! scan_family {
    ($w:expr, $u:ty, $bsr:ident, $bsf:ident, $tzcnt:ident, $popcnt:ident) => {
        /// Most-significant set bit, 0-based. Undefined-by-architecture
        /// convention for zero input: returns `U::MAX` (§4.1.5, §9).
        pub fn $bsr(flags: &mut RFlags, src: $u) -> $u {
            flags.set_zero(src == 0);
            if src == 0 {
                <$u>::MAX
            } else {
                ($w - 1 - src.leading_zeros()) as $u
            }
        }

        /// Least-significant set bit, 0-based. Same undefined-input
        /// convention as `bsr`.
        pub fn $bsf(flags: &mut RFlags, src: $u) -> $u {
            flags.set_zero(src == 0);
            if src == 0 {
                <$u>::MAX
            } else {
                src.trailing_zeros() as $u
            }
        }

        pub fn $tzcnt(flags: &mut RFlags, src: $u) -> $u {
            let result = src.trailing_zeros() as $u;
            flags.set_carry(src == 0);
            flags.set_zero(result == 0);
            result
        }

        pub fn $popcnt(flags: &mut RFlags, src: $u) -> $u {
            let result = src.count_ones() as $u;
            flags.set_overflow(false);
            flags.set_sign(false);
            flags.set_carry(false);
            flags.set_parity(false);
            flags.set_zero(result == 0);
            result
        }
    };
}

scan_family!(16, u16, bsr16, bsf16, tzcnt16, popcnt16);
scan_family!(32, u32, bsr32, bsf32, tzcnt32, popcnt32);
scan_family!(64, u64, bsr64, bsf64, tzcnt64, popcnt64);

pub fn bswap32(v: u32) -> u32 {
    v.swap_bytes()
}

pub fn bswap64(v: u64) -> u64 {
    v.swap_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tzcnt_zero_is_width_with_carry() {
        let mut f = RFlags::empty();
        assert_eq!(tzcnt32(&mut f, 0), 32);
        assert!(f.carry());
    }

    #[test]
    fn popcnt_complement_identity() {
        let mut f1 = RFlags::empty();
        let mut f2 = RFlags::empty();
        let x: u32 = 0xCAFEBABE;
        assert_eq!(popcnt32(&mut f1, x) + popcnt32(&mut f2, !x), 32);
    }

    #[test]
    fn bswap_is_involutive() {
        assert_eq!(bswap64(bswap64(0x0123_4567_89AB_CDEF)), 0x0123_4567_89AB_CDEF);
    }

    #[test]
    fn bsr_bsf_undefined_convention_on_zero() {
        let mut f = RFlags::empty();
        assert_eq!(bsr32(&mut f, 0), u32::MAX);
        assert!(f.zero());
    }
}
