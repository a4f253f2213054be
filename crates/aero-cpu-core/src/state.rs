//! Architectural state owned by the dispatcher (§3, §4.3): the GPR file,
//! RFLAGS, segment bases, the x87 register stack and control/status/tag
//! words, and the SSE control/status word (MXCSR).

use aero_types::F80;

bitflags::bitflags! {
    /// The six modeled arithmetic condition-code bits, stored at their real
    /// RFLAGS bit positions (§6) so `PUSHFQ`/`POPFQ` are a plain reinterpret
    /// rather than a pack/unpack.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct RFlags: u64 {
        const FLAG_CF = 1 << 0;
        const FLAG_PF = 1 << 2;
        const FLAG_ZF = 1 << 6;
        const FLAG_SF = 1 << 7;
        const FLAG_DF = 1 << 10;
        const FLAG_OF = 1 << 11;
    }
}

impl RFlags {
    pub fn carry(self) -> bool {
        self.contains(RFlags::FLAG_CF)
    }
    pub fn parity(self) -> bool {
        self.contains(RFlags::FLAG_PF)
    }
    pub fn zero(self) -> bool {
        self.contains(RFlags::FLAG_ZF)
    }
    pub fn sign(self) -> bool {
        self.contains(RFlags::FLAG_SF)
    }
    pub fn direction(self) -> bool {
        self.contains(RFlags::FLAG_DF)
    }
    pub fn overflow(self) -> bool {
        self.contains(RFlags::FLAG_OF)
    }

    pub fn set_carry(&mut self, v: bool) {
        self.set(RFlags::FLAG_CF, v);
    }
    pub fn set_parity(&mut self, v: bool) {
        self.set(RFlags::FLAG_PF, v);
    }
    pub fn set_zero(&mut self, v: bool) {
        self.set(RFlags::FLAG_ZF, v);
    }
    pub fn set_sign(&mut self, v: bool) {
        self.set(RFlags::FLAG_SF, v);
    }
    pub fn set_direction(&mut self, v: bool) {
        self.set(RFlags::FLAG_DF, v);
    }
    pub fn set_overflow(&mut self, v: bool) {
        self.set(RFlags::FLAG_OF, v);
    }

    /// Even parity of the low 8 bits of `result` (§4.1.1).
    pub fn parity_of(result: u64) -> bool {
        (result as u8).count_ones() % 2 == 0
    }
}

/// Rounding mode shared by the x87 control word and MXCSR's RC field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundingMode {
    Nearest,
    Down,
    Up,
    TowardZero,
}

impl RoundingMode {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => RoundingMode::Nearest,
            1 => RoundingMode::Down,
            2 => RoundingMode::Up,
            _ => RoundingMode::TowardZero,
        }
    }

    pub fn to_bits(self) -> u8 {
        match self {
            RoundingMode::Nearest => 0,
            RoundingMode::Down => 1,
            RoundingMode::Up => 2,
            RoundingMode::TowardZero => 3,
        }
    }
}

/// Per-slot x87 tag word state (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum X87Tag {
    Valid,
    Zero,
    Special,
    Empty,
}

/// x87 control word (CW): exception masks, precision control, rounding
/// control.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct X87Control(pub u16);

impl Default for X87Control {
    fn default() -> Self {
        // Power-on default: all exceptions masked, round-to-nearest,
        // 64-bit (extended) precision.
        X87Control(0x037F)
    }
}

impl X87Control {
    pub fn rounding_mode(self) -> RoundingMode {
        RoundingMode::from_bits((self.0 >> 10) as u8)
    }

    pub fn set_rounding_mode(&mut self, mode: RoundingMode) {
        self.0 = (self.0 & !0x0C00) | ((mode.to_bits() as u16) << 10);
    }
}

/// x87 status word (SW): top-of-stack pointer plus exception/condition bits
/// the core stores but does not dispatch traps for (§3 invariants).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct X87Status(pub u16);

impl X87Status {
    pub fn top(self) -> u8 {
        ((self.0 >> 11) & 0b111) as u8
    }

    pub fn set_top(&mut self, top: u8) {
        self.0 = (self.0 & !0x3800) | (((top & 0b111) as u16) << 11);
    }

    pub fn set_stack_overflow(&mut self, v: bool) {
        // Bit 6 (SF) together with bit 9 (C1) conventionally distinguishes
        // overflow/underflow; the core only needs to record *that* a stack
        // fault occurred (§3 invariants), not disambiguate further.
        let bit = 1u16 << 6;
        if v {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct X87State {
    pub st: [F80; 8],
    pub control: X87Control,
    pub status: X87Status,
    pub tag: [X87Tag; 8],
}

impl Default for X87State {
    fn default() -> Self {
        X87State {
            st: [F80::ZERO; 8],
            control: X87Control::default(),
            status: X87Status::default(),
            tag: [X87Tag::Empty; 8],
        }
    }
}

impl X87State {
    /// `ST(i)`, resolved through the current `top` (§4.3 x87 dispatching).
    pub fn st_index(&self, i: u8) -> usize {
        ((self.status.top() as usize) + i as usize) % 8
    }

    pub fn read_st(&self, i: u8) -> F80 {
        self.st[self.st_index(i)]
    }

    pub fn write_st(&mut self, i: u8, v: F80) {
        let idx = self.st_index(i);
        self.st[idx] = v;
        self.tag[idx] = if v.is_zero() { X87Tag::Zero } else { X87Tag::Valid };
    }

    /// Pre-decrement `top`, write the new `ST(0)` (§4.3). Raises the
    /// stack-overflow status bit, rather than aborting, if the target slot
    /// was not already empty -- the core "stores the state but does not
    /// dispatch traps" (§3 invariants).
    pub fn push(&mut self, v: F80) {
        let new_top = (self.status.top() + 7) % 8;
        if self.tag[new_top as usize] != X87Tag::Empty {
            self.status.set_stack_overflow(true);
        }
        self.status.set_top(new_top);
        self.st[new_top as usize] = v;
        self.tag[new_top as usize] = if v.is_zero() { X87Tag::Zero } else { X87Tag::Valid };
    }

    /// Mark current `ST(0)` empty, post-increment `top` (§4.3).
    pub fn pop(&mut self) {
        let top = self.status.top();
        self.tag[top as usize] = X87Tag::Empty;
        self.status.set_top((top + 1) % 8);
    }
}

bitflags::bitflags! {
    /// SSE control/status word (§3): rounding control, FTZ/DAZ, and the
    /// six exception-status/exception-mask bit pairs, stored but never
    /// caused to trap by this core.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Mxcsr: u32 {
        const MXCSR_IE = 1 << 0;
        const MXCSR_DE = 1 << 1;
        const MXCSR_ZE = 1 << 2;
        const MXCSR_OE = 1 << 3;
        const MXCSR_UE = 1 << 4;
        const MXCSR_PE = 1 << 5;
        const MXCSR_DAZ = 1 << 6;
        const MXCSR_IM = 1 << 7;
        const MXCSR_DM = 1 << 8;
        const MXCSR_ZM = 1 << 9;
        const MXCSR_OM = 1 << 10;
        const MXCSR_UM = 1 << 11;
        const MXCSR_PM = 1 << 12;
        const MXCSR_FZ = 1 << 15;
    }
}

impl Default for Mxcsr {
    fn default() -> Self {
        // Power-on default: all exceptions masked, round-to-nearest.
        Mxcsr::from_bits_truncate(0x1F80)
    }
}

impl Mxcsr {
    pub fn rounding_mode(self) -> RoundingMode {
        RoundingMode::from_bits((self.bits() >> 13) as u8)
    }

    pub fn set_rounding_mode(&mut self, mode: RoundingMode) {
        let bits = (self.bits() & !0x6000) | ((mode.to_bits() as u32) << 13);
        *self = Mxcsr::from_bits_truncate(bits);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SseState {
    pub xmm: [u128; 16],
    pub mxcsr: Mxcsr,
}

impl Default for SseState {
    fn default() -> Self {
        SseState { xmm: [0; 16], mxcsr: Mxcsr::default() }
    }
}

/// The full architectural state of one guest thread of execution (§3
/// Lifecycle: created with the VM, persists for its lifetime).
#[derive(Clone, Debug, PartialEq)]
pub struct CpuState {
    pub gpr: [u64; 16],
    pub rip: u64,
    pub rflags: RFlags,
    /// Flat segment bases, indexed as ES=0, CS=1, SS=2, DS=3, FS=4, GS=5
    /// (§3: selectors are not modeled, only the flat base).
    pub seg_base: [u64; 6],
    pub x87: X87State,
    pub sse: SseState,
}

impl Default for CpuState {
    fn default() -> Self {
        CpuState {
            gpr: [0; 16],
            rip: 0,
            rflags: RFlags::empty(),
            seg_base: [0; 6],
            x87: X87State::default(),
            sse: SseState::default(),
        }
    }
}

impl CpuState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gpr(&self, reg: aero_x86::Register) -> u64 {
        use aero_x86::Register;
        if reg.is_segment() {
            return self.seg_base[reg.segment_index() as usize];
        }
        let slot = self.gpr[reg.gpr_index() as usize];
        match reg.width() {
            64 => slot,
            32 => slot & 0xFFFF_FFFF,
            16 => slot & 0xFFFF,
            8 => {
                if reg.is_high_byte() {
                    (slot >> 8) & 0xFF
                } else {
                    slot & 0xFF
                }
            }
            _ => unreachable!(),
        }
    }

    /// Writes `value` to `reg` observing the sub-register update rule
    /// (§3): 32-bit writes zero-extend to 64 bits, 16/8-bit writes leave
    /// the remaining upper bits of the 64-bit slot untouched.
    pub fn set_gpr(&mut self, reg: aero_x86::Register, value: u64) {
        use aero_x86::Register;
        if reg.is_segment() {
            self.seg_base[reg.segment_index() as usize] = value;
            return;
        }
        let idx = reg.gpr_index() as usize;
        match reg.width() {
            64 => self.gpr[idx] = value,
            32 => self.gpr[idx] = value & 0xFFFF_FFFF,
            16 => self.gpr[idx] = (self.gpr[idx] & !0xFFFFu64) | (value & 0xFFFF),
            8 => {
                if reg.is_high_byte() {
                    self.gpr[idx] = (self.gpr[idx] & !0xFF00u64) | ((value & 0xFF) << 8);
                } else {
                    self.gpr[idx] = (self.gpr[idx] & !0xFFu64) | (value & 0xFF);
                }
            }
            _ => unreachable!(),
        }
    }

    pub fn set_rip(&mut self, rip: u64) {
        self.rip = rip;
    }

    /// Packs the six modeled flag bits into a 64-bit RFLAGS-layout word
    /// (§6). Unmodeled bits read as zero.
    pub fn rflags_u64(&self) -> u64 {
        self.rflags.bits()
    }

    pub fn set_rflags_u64(&mut self, bits: u64) {
        self.rflags = RFlags::from_bits_truncate(bits);
    }
}
