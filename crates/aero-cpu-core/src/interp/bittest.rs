//! §4.1.4 Bit-test family: `bt`/`btr`/`bts`/`btc`.

use crate::state::RFlags;

macro_rules! bittest_family {
    ($w:expr, $u:ty, $bt:ident, $btr:ident, $bts:ident, $btc:ident) => {
        pub fn $bt(flags: &mut RFlags, base: $u, index: u32) -> bool {
            let bit = (base >> (index % $w)) & 1 != 0;
            flags.set_carry(bit);
            bit
        }

        pub fn $btr(flags: &mut RFlags, base: $u, index: u32) -> $u {
            let i = index % $w;
            flags.set_carry((base >> i) & 1 != 0);
            base & !((1 as $u) << i)
        }

        pub fn $bts(flags: &mut RFlags, base: $u, index: u32) -> $u {
            let i = index % $w;
            flags.set_carry((base >> i) & 1 != 0);
            base | ((1 as $u) << i)
        }

        pub fn $btc(flags: &mut RFlags, base: $u, index: u32) -> $u {
            let i = index % $w;
            flags.set_carry((base >> i) & 1 != 0);
            base ^ ((1 as $u) << i)
        }
    };
}

bittest_family!(16, u16, bt16, btr16, bts16, btc16);
bittest_family!(32, u32, bt32, btr32, bts32, btc32);
bittest_family!(64, u64, bt64, btr64, bts64, btc64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bt_reads_without_mutating() {
        let mut f = RFlags::empty();
        assert!(bt32(&mut f, 0b100, 2));
        assert!(f.carry());
        assert!(!bt32(&mut f, 0b100, 1));
        assert!(!f.carry());
    }

    #[test]
    fn btr_bts_btc_roundtrip() {
        let mut f = RFlags::empty();
        let v = bts32(&mut f, 0, 5);
        assert_eq!(v, 0b10_0000);
        let v2 = btr32(&mut f, v, 5);
        assert_eq!(v2, 0);
        let v3 = btc32(&mut f, 0, 5);
        assert_eq!(v3, 0b10_0000);
        let v4 = btc32(&mut f, v3, 5);
        assert_eq!(v4, 0);
    }
}
