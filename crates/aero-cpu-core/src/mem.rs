//! The MMU collaborator interface (§6) consumed by the dispatcher. The real
//! MMU (address translation, page protection) lives outside this crate;
//! `CpuBus` is the narrow contract the dispatcher actually calls through,
//! plus `FlatTestBus`, a flat-memory test double used by this crate's own
//! integration tests.

use crate::error::Exception;

/// Typed reads/writes at widths {8,16,32,64,128} (§6), plus an atomic
/// read-modify-write entry point for `LOCK`-prefixed instructions (§4.3).
pub trait CpuBus {
    fn read_u8(&mut self, vaddr: u64) -> Result<u8, Exception>;
    fn read_u16(&mut self, vaddr: u64) -> Result<u16, Exception>;
    fn read_u32(&mut self, vaddr: u64) -> Result<u32, Exception>;
    fn read_u64(&mut self, vaddr: u64) -> Result<u64, Exception>;
    /// Unaligned 128-bit read (byte-level path; §4.3 alignment policy).
    fn read_u128(&mut self, vaddr: u64) -> Result<u128, Exception>;
    /// Aligned 128-bit read; implementations must fault if `vaddr` is not
    /// 16-byte aligned (§4.3 `MOVAPS`/`MOVAPD`).
    fn read_u128_aligned(&mut self, vaddr: u64) -> Result<u128, Exception> {
        if vaddr % 16 != 0 {
            return Err(Exception::GeneralProtection);
        }
        self.read_u128(vaddr)
    }

    fn write_u8(&mut self, vaddr: u64, val: u8) -> Result<(), Exception>;
    fn write_u16(&mut self, vaddr: u64, val: u16) -> Result<(), Exception>;
    fn write_u32(&mut self, vaddr: u64, val: u32) -> Result<(), Exception>;
    fn write_u64(&mut self, vaddr: u64, val: u64) -> Result<(), Exception>;
    fn write_u128(&mut self, vaddr: u64, val: u128) -> Result<(), Exception>;
    fn write_u128_aligned(&mut self, vaddr: u64, val: u128) -> Result<(), Exception> {
        if vaddr % 16 != 0 {
            return Err(Exception::GeneralProtection);
        }
        self.write_u128(vaddr, val)
    }

    /// Reads an 80-bit (10-byte) x87 value.
    fn read_f80_bytes(&mut self, vaddr: u64) -> Result<[u8; 10], Exception>;
    fn write_f80_bytes(&mut self, vaddr: u64, val: [u8; 10]) -> Result<(), Exception>;

    /// Atomically reads the value at `addr`, calls `f(old) -> new`, writes
    /// `new`, and returns `new`. The semantic primitive runs inside `f`
    /// (§4.3 Atomic operations).
    fn with_exclusive_region_u8(
        &mut self,
        addr: u64,
        f: &mut dyn FnMut(u8) -> u8,
    ) -> Result<u8, Exception> {
        let old = self.read_u8(addr)?;
        let new = f(old);
        self.write_u8(addr, new)?;
        Ok(new)
    }
    fn with_exclusive_region_u16(
        &mut self,
        addr: u64,
        f: &mut dyn FnMut(u16) -> u16,
    ) -> Result<u16, Exception> {
        let old = self.read_u16(addr)?;
        let new = f(old);
        self.write_u16(addr, new)?;
        Ok(new)
    }
    fn with_exclusive_region_u32(
        &mut self,
        addr: u64,
        f: &mut dyn FnMut(u32) -> u32,
    ) -> Result<u32, Exception> {
        let old = self.read_u32(addr)?;
        let new = f(old);
        self.write_u32(addr, new)?;
        Ok(new)
    }
    fn with_exclusive_region_u64(
        &mut self,
        addr: u64,
        f: &mut dyn FnMut(u64) -> u64,
    ) -> Result<u64, Exception> {
        let old = self.read_u64(addr)?;
        let new = f(old);
        self.write_u64(addr, new)?;
        Ok(new)
    }

    /// Fetches up to 15 bytes (the longest possible x86 instruction) at
    /// `vaddr` for the (external) decoder; exposed here because some tests
    /// build fixtures against it directly.
    fn fetch(&mut self, vaddr: u64, max_len: usize) -> Result<Vec<u8>, Exception>;
}

/// A flat, bounds-checked byte array implementing `CpuBus`, used by this
/// crate's own integration tests (mirrors the reference crate's
/// `FlatTestBus`/hand-rolled `TestBus` idiom).
pub struct FlatTestBus {
    mem: Vec<u8>,
}

impl FlatTestBus {
    pub fn new(size: usize) -> Self {
        FlatTestBus { mem: vec![0; size] }
    }

    pub fn load(&mut self, addr: u64, bytes: &[u8]) {
        let start = addr as usize;
        self.mem[start..start + bytes.len()].copy_from_slice(bytes);
    }

    fn slice(&mut self, addr: u64, len: usize) -> Result<&mut [u8], Exception> {
        let start = addr as usize;
        self.mem
            .get_mut(start..start + len)
            .ok_or(Exception::MemoryFault)
    }
}

macro_rules! impl_rw {
    ($read:ident, $write:ident, $ty:ty) => {
        fn $read(&mut self, vaddr: u64) -> Result<$ty, Exception> {
            let bytes = self.slice(vaddr, core::mem::size_of::<$ty>())?;
            Ok(<$ty>::from_le_bytes(bytes.try_into().unwrap()))
        }
        fn $write(&mut self, vaddr: u64, val: $ty) -> Result<(), Exception> {
            let bytes = self.slice(vaddr, core::mem::size_of::<$ty>())?;
            bytes.copy_from_slice(&val.to_le_bytes());
            Ok(())
        }
    };
}

impl CpuBus for FlatTestBus {
    impl_rw!(read_u8, write_u8, u8);
    impl_rw!(read_u16, write_u16, u16);
    impl_rw!(read_u32, write_u32, u32);
    impl_rw!(read_u64, write_u64, u64);
    impl_rw!(read_u128, write_u128, u128);

    fn read_f80_bytes(&mut self, vaddr: u64) -> Result<[u8; 10], Exception> {
        let bytes = self.slice(vaddr, 10)?;
        Ok(bytes.try_into().unwrap())
    }

    fn write_f80_bytes(&mut self, vaddr: u64, val: [u8; 10]) -> Result<(), Exception> {
        let bytes = self.slice(vaddr, 10)?;
        bytes.copy_from_slice(&val);
        Ok(())
    }

    fn fetch(&mut self, vaddr: u64, max_len: usize) -> Result<Vec<u8>, Exception> {
        let start = vaddr as usize;
        let end = (start + max_len).min(self.mem.len());
        if start > self.mem.len() {
            return Err(Exception::MemoryFault);
        }
        Ok(self.mem[start..end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_width() {
        let mut bus = FlatTestBus::new(64);
        bus.write_u8(0, 0xAB).unwrap();
        assert_eq!(bus.read_u8(0).unwrap(), 0xAB);
        bus.write_u32(4, 0xDEAD_BEEF).unwrap();
        assert_eq!(bus.read_u32(4).unwrap(), 0xDEAD_BEEF);
        bus.write_u128(16, u128::MAX / 3).unwrap();
        assert_eq!(bus.read_u128(16).unwrap(), u128::MAX / 3);
    }

    #[test]
    fn aligned_read_faults_on_misalignment() {
        let mut bus = FlatTestBus::new(64);
        assert!(bus.read_u128_aligned(1).is_err());
        assert!(bus.read_u128_aligned(16).is_ok());
    }

    #[test]
    fn out_of_bounds_faults() {
        let mut bus = FlatTestBus::new(8);
        assert!(bus.read_u64(4).is_err());
    }
}
