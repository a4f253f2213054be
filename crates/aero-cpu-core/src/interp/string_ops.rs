//! §4.1.9 String instruction family: `movs`/`stos`/`lods`/`scas`/`cmps`.
//! Each function here performs exactly one element's worth of work and
//! returns the signed pointer delta the caller should apply to the
//! relevant index register(s); the `REP`/`REPE`/`REPNE` looping behaviour
//! lives in the dispatcher (§4.3), which re-invokes these primitives once
//! per iteration and checks `RCX`/`ZF` between iterations.

use crate::error::Exception;
use crate::mem::CpuBus;
use crate::state::RFlags;

fn step(df: bool, width: u64) -> i64 {
    if df {
        -(width as i64)
    } else {
        width as i64
    }
}

macro_rules! string_family {
    ($w:expr, $u:ty, $movs:ident, $stos:ident, $lods:ident, $scas:ident, $cmps:ident, $read:ident, $write:ident, $cmp_fn:path) => {
        pub fn $movs(bus: &mut dyn CpuBus, src: u64, dst: u64, df: bool) -> Result<i64, Exception> {
            let value = bus.$read(src)?;
            bus.$write(dst, value)?;
            Ok(step(df, $w / 8))
        }

        pub fn $stos(bus: &mut dyn CpuBus, dst: u64, value: $u, df: bool) -> Result<i64, Exception> {
            bus.$write(dst, value)?;
            Ok(step(df, $w / 8))
        }

        pub fn $lods(bus: &mut dyn CpuBus, src: u64, df: bool) -> Result<($u, i64), Exception> {
            let value = bus.$read(src)?;
            Ok((value, step(df, $w / 8)))
        }

        /// Returns `(flags-already-applied accumulator comparison, delta)`;
        /// the caller supplies `flags` to update from the implied `cmp`.
        pub fn $scas(
            flags: &mut RFlags,
            bus: &mut dyn CpuBus,
            accumulator: $u,
            addr: u64,
            df: bool,
        ) -> Result<i64, Exception> {
            let value = bus.$read(addr)?;
            $cmp_fn(flags, accumulator, value);
            Ok(step(df, $w / 8))
        }

        pub fn $cmps(
            flags: &mut RFlags,
            bus: &mut dyn CpuBus,
            a_addr: u64,
            b_addr: u64,
            df: bool,
        ) -> Result<i64, Exception> {
            let a = bus.$read(a_addr)?;
            let b = bus.$read(b_addr)?;
            $cmp_fn(flags, a, b);
            Ok(step(df, $w / 8))
        }
    };
}

use crate::interp::int_arith::{cmp16, cmp32, cmp64, cmp8};

string_family!(8, u8, movsb, stosb, lodsb, scasb, cmpsb, read_u8, write_u8, cmp8);
string_family!(16, u16, movsw, stosw, lodsw, scasw, cmpsw, read_u16, write_u16, cmp16);
string_family!(32, u32, movsd, stosd, lodsd, scasd, cmpsd_str, read_u32, write_u32, cmp32);
string_family!(64, u64, movsq, stosq, lodsq, scasq, cmpsq, read_u64, write_u64, cmp64);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::FlatTestBus;

    #[test]
    fn movsb_copies_one_byte_and_steps_forward() {
        let mut bus = FlatTestBus::new(64);
        bus.load(0, &[0xAB]);
        let delta = movsb(&mut bus, 0, 8, false).unwrap();
        assert_eq!(delta, 1);
        assert_eq!(bus.read_u8(8).unwrap(), 0xAB);
    }

    #[test]
    fn stosw_with_direction_flag_steps_backward() {
        let mut bus = FlatTestBus::new(64);
        let delta = stosw(&mut bus, 10, 0x1234, true).unwrap();
        assert_eq!(delta, -2);
        assert_eq!(bus.read_u16(10).unwrap(), 0x1234);
    }

    #[test]
    fn scasb_sets_zero_flag_on_match() {
        let mut bus = FlatTestBus::new(64);
        bus.load(0, &[0x42]);
        let mut flags = RFlags::empty();
        scasb(&mut flags, &mut bus, 0x42, 0, false).unwrap();
        assert!(flags.zero());
    }
}
