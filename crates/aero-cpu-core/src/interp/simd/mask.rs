//! Mask extraction (`pmovmskb`/`movmskps`/`movmskpd`), packed logical ops,
//! and `ptest` (§4.1.8).

use aero_types::Simd128Ext;

use crate::state::RFlags;

/// `pmovmskb`: bit `i` of the result is the sign (top) bit of byte lane
/// `i`.
pub fn pmovmskb(src: u128) -> u32 {
    let mut mask = 0u32;
    for i in 0..16 {
        if src.lane8(i) & 0x80 != 0 {
            mask |= 1 << i;
        }
    }
    mask
}

pub fn movmskps(src: u128) -> u32 {
    let mut mask = 0u32;
    for i in 0..4 {
        if src.lane32(i) & 0x8000_0000 != 0 {
            mask |= 1 << i;
        }
    }
    mask
}

pub fn movmskpd(src: u128) -> u32 {
    let mut mask = 0u32;
    for i in 0..2 {
        if src.lane64(i) & 0x8000_0000_0000_0000 != 0 {
            mask |= 1 << i;
        }
    }
    mask
}

pub fn pand(a: u128, b: u128) -> u128 {
    a & b
}

pub fn por(a: u128, b: u128) -> u128 {
    a | b
}

pub fn pxor(a: u128, b: u128) -> u128 {
    a ^ b
}

/// `pandn`: `(!a) & b` (§4.1.8 operand order).
pub fn pandn(a: u128, b: u128) -> u128 {
    (!a) & b
}

/// `ptest`: `ZF = (a & b) == 0`, `CF = ((!a) & b) == 0`. Only these two
/// flags are defined; OF/SF/PF/AF are cleared (§4.1.8).
pub fn ptest(flags: &mut RFlags, a: u128, b: u128) {
    flags.set_zero((a & b) == 0);
    flags.set_carry(((!a) & b) == 0);
    flags.set_overflow(false);
    flags.set_sign(false);
    flags.set_parity(false);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pmovmskb_collects_sign_bits() {
        let src = 0u128.with_lane8(0, 0x80u8).with_lane8(3, 0x80u8);
        assert_eq!(pmovmskb(src), 0b1001);
    }

    #[test]
    fn ptest_zero_when_disjoint() {
        let mut f = RFlags::empty();
        ptest(&mut f, 0xFF00, 0x00FF);
        assert!(f.zero());
    }

    #[test]
    fn ptest_carry_when_b_subset_of_a() {
        let mut f = RFlags::empty();
        ptest(&mut f, 0xFF, 0x0F);
        assert!(f.carry());
    }
}
