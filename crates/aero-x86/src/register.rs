/// A general-purpose, segment, or SIMD register handle as named by the
/// decoder. Sub-register writes (`EAX`, `AX`, `AL`, `AH`, ...) all name the
/// same underlying 64-bit slot; `Cpu` is responsible for applying the
/// correct read/write width rule (§3 Register file).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Register {
    // 64-bit
    RAX, RCX, RDX, RBX, RSP, RBP, RSI, RDI,
    R8, R9, R10, R11, R12, R13, R14, R15,
    // 32-bit
    EAX, ECX, EDX, EBX, ESP, EBP, ESI, EDI,
    R8D, R9D, R10D, R11D, R12D, R13D, R14D, R15D,
    // 16-bit
    AX, CX, DX, BX, SP, BP, SI, DI,
    R8W, R9W, R10W, R11W, R12W, R13W, R14W, R15W,
    // 8-bit, low byte of the 64-bit register
    AL, CL, DL, BL, SPL, BPL, SIL, DIL,
    R8B, R9B, R10B, R11B, R12B, R13B, R14B, R15B,
    // 8-bit, legacy high byte (only representable for the original four)
    AH, CH, DH, BH,
    // Segments (flat-base model only; §3)
    ES, CS, SS, DS, FS, GS,
}

impl Register {
    pub const fn width(self) -> u32 {
        use Register::*;
        match self {
            RAX | RCX | RDX | RBX | RSP | RBP | RSI | RDI | R8 | R9 | R10 | R11 | R12 | R13
            | R14 | R15 => 64,
            EAX | ECX | EDX | EBX | ESP | EBP | ESI | EDI | R8D | R9D | R10D | R11D | R12D
            | R13D | R14D | R15D => 32,
            AX | CX | DX | BX | SP | BP | SI | DI | R8W | R9W | R10W | R11W | R12W | R13W
            | R14W | R15W => 16,
            AL | CL | DL | BL | SPL | BPL | SIL | DIL | R8B | R9B | R10B | R11B | R12B | R13B
            | R14B | R15B | AH | CH | DH | BH => 8,
            ES | CS | SS | DS | FS | GS => 64,
        }
    }

    /// `true` for the four legacy high-byte names (`AH`/`CH`/`DH`/`BH`),
    /// which read/write bits [15:8] of the GPR slot rather than bits [7:0].
    pub const fn is_high_byte(self) -> bool {
        matches!(self, Register::AH | Register::CH | Register::DH | Register::BH)
    }

    pub const fn is_segment(self) -> bool {
        use Register::*;
        matches!(self, ES | CS | SS | DS | FS | GS)
    }

    /// Index (0..16) of the 64-bit GPR slot this name refers to. Panics for
    /// segment registers; use `is_segment`/`segment_index` for those.
    pub const fn gpr_index(self) -> u8 {
        use Register::*;
        match self {
            RAX | EAX | AX | AL | AH => 0,
            RCX | ECX | CX | CL | CH => 1,
            RDX | EDX | DX | DL | DH => 2,
            RBX | EBX | BX | BL | BH => 3,
            RSP | ESP | SP | SPL => 4,
            RBP | EBP | BP | BPL => 5,
            RSI | ESI | SI | SIL => 6,
            RDI | EDI | DI | DIL => 7,
            R8 | R8D | R8W | R8B => 8,
            R9 | R9D | R9W | R9B => 9,
            R10 | R10D | R10W | R10B => 10,
            R11 | R11D | R11W | R11B => 11,
            R12 | R12D | R12W | R12B => 12,
            R13 | R13D | R13W | R13B => 13,
            R14 | R14D | R14W | R14B => 14,
            R15 | R15D | R15W | R15B => 15,
            ES | CS | SS | DS | FS | GS => panic!("segment registers have no gpr_index"),
        }
    }

    pub const fn segment_index(self) -> u8 {
        use Register::*;
        match self {
            ES => 0,
            CS => 1,
            SS => 2,
            DS => 3,
            FS => 4,
            GS => 5,
            _ => panic!("not a segment register"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths() {
        assert_eq!(Register::RAX.width(), 64);
        assert_eq!(Register::EAX.width(), 32);
        assert_eq!(Register::AX.width(), 16);
        assert_eq!(Register::AL.width(), 8);
        assert_eq!(Register::AH.width(), 8);
    }

    #[test]
    fn high_byte_flag() {
        assert!(Register::AH.is_high_byte());
        assert!(!Register::AL.is_high_byte());
    }

    #[test]
    fn gpr_index_groups_aliases() {
        assert_eq!(Register::RAX.gpr_index(), 0);
        assert_eq!(Register::EAX.gpr_index(), 0);
        assert_eq!(Register::AX.gpr_index(), 0);
        assert_eq!(Register::AL.gpr_index(), 0);
        assert_eq!(Register::AH.gpr_index(), 0);
        assert_eq!(Register::R15B.gpr_index(), 15);
    }
}
