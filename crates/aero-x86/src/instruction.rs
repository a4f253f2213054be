use crate::register::Register;

/// Scalar/packed floating-point compare predicate, as encoded in the
/// immediate byte of `CMPSS`/`CMPSD`/`CMPPS`/`CMPPD` (§4.1.8).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpPredicate {
    Eq,
    Lt,
    Le,
    Unord,
    Neq,
    Nlt,
    Nle,
    Ord,
}

/// `REP`-family prefix on a string instruction (§4.1.9).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RepPrefix {
    #[default]
    None,
    Rep,
    Repz,
    Repnz,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct MemOperand {
    pub segment: Option<Register>,
    pub base: Option<Register>,
    pub index: Option<Register>,
    pub scale: u8,
    pub disp: i64,
    /// Access width in bits: one of {8,16,32,64,80,128}.
    pub width: u32,
}

impl MemOperand {
    pub fn flat(disp: i64, width: u32) -> Self {
        MemOperand { segment: None, base: None, index: None, scale: 1, disp, width }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    Reg(Register),
    /// `XMM0`..`XMM15`, addressed by index.
    Xmm(u8),
    /// `ST(i)`, already resolved by the decoder to an index relative to the
    /// *current* `top` (the dispatcher does not re-resolve it; §4.3).
    St(u8),
    Mem(MemOperand),
    /// A sign-extended immediate; callers mask/reinterpret to the operand
    /// width implied by the mnemonic.
    Imm(i64),
    Predicate(CmpPredicate),
    /// A literal branch/call target, already resolved to an absolute
    /// address by the decoder (rip-relative encodings are pre-resolved).
    Addr(u64),
}

/// The full closed set of mnemonics this core models. One tag per
/// distinct instruction identity (not parameterized by width, mirroring how
/// `ADD r32, r32` and `ADD r8, r8` are genuinely distinct opcodes on real
/// silicon) except where §4.1 explicitly describes a single width-generic
/// primitive family and the decoder is expected to carry the width on the
/// operand itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum Mnemonic {
    // 4.1.1 integer arithmetic (width carried by the register/mem operand)
    Add, Adc, Sub, Sbb, Cmp, Neg, Inc, Dec,
    Mul, Imul, Div, Idiv,
    // 4.1.2 bitwise
    And, Or, Xor, Not, Test,
    // 4.1.3 shift/rotate
    Shl, Shr, Sar, Shld, Shrd, Rol, Ror, Rcl, Rcr,
    // 4.1.4 bit test
    Bt, Btr, Bts, Btc,
    // 4.1.5 scan & count
    Bsr, Bsf, Tzcnt, Popcnt, Bswap,
    // 4.1.6 compare-and-exchange & test
    Cmpxchg,
    // 4.1.7 x87
    Fadd, Fsub, Fmul, Fdiv, Fcomi, Fucomi, Frndint, Fld, Fstp,
    // 4.1.8 SIMD: move/shuffle
    Movss, Movsd, Movaps, Movapd, Movups, Movupd,
    Shufps, Shufpd, Pshufb, Pshufd, Pshuflw, Pshufhw,
    PunpcklBw, PunpcklWd, PunpcklDq, PunpcklQdq,
    PunpckhBw, PunpckhWd, PunpckhDq, PunpckhQdq,
    Unpcklps, Unpcklpd, Unpckhps, Unpckhpd,
    Pslldq, Psrldq, Palignr,
    // SIMD arithmetic
    Addps, Addpd, Addss, Addsd,
    Subps, Subpd, Subss, Subsd,
    Mulps, Mulpd, Mulss, Mulsd,
    Divps, Divpd, Divss, Divsd,
    Sqrtps, Sqrtpd, Sqrtss, Sqrtsd,
    Minps, Minpd, Minss, Minsd,
    Maxps, Maxpd, Maxss, Maxsd,
    Cmpps, Cmppd, Cmpss, Cmpsd,
    Comiss, Comisd, Ucomiss, Ucomisd,
    // packed integer
    Paddb, Paddw, Paddd, Paddq,
    Psubb, Psubw, Psubd, Psubq,
    Paddsb, Paddsw, Paddusb, Paddusw,
    Psubsb, Psubsw, Psubusb, Psubusw,
    Pmullw, Pmulhw, Pmulhuw, Pmuludq, Pmaddwd, Pmaddubsw,
    Pcmpeqb, Pcmpeqw, Pcmpeqd, Pcmpeqq,
    Pcmpgtb, Pcmpgtw, Pcmpgtd, Pcmpgtq,
    Psllw, Pslld, Psllq, Psrlw, Psrld, Psrlq, Psraw, Psrad,
    Pavgb, Pavgw, Pmaxsw, Pmaxub, Pminsw, Pminub, Psadbw,
    Packuswb, Packsswb, Packssdw, Packusdw,
    Pand, Pandn, Por, Pxor, Andpd, Andnpd, Orpd, Xorpd,
    Pmovmskb, Movmskps, Movmskpd, Ptest, Pcmpistri,
    // conversions
    Cvtsi2ss, Cvtsi2sd, Cvtss2sd, Cvtsd2ss,
    Cvtss2si, Cvtsd2si, Cvttss2si, Cvttsd2si,
    Cvtdq2ps, Cvtdq2pd, Cvtps2dq, Cvttps2dq, Cvtpd2ps,
    // 4.1.9 string family
    Movs, Stos, Lods, Scas, Cmps,
    // dispatcher-level (§4.3)
    Push, Pop, Call, Ret, Jmp,
    Pushfq, Popfq,
    Fxsave, Fxrstor,
    Ud2, Hlt, Syscall,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Prefixes {
    pub lock: bool,
    pub rep: RepPrefix,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub mnemonic: Mnemonic,
    pub operands: [Option<Operand>; 3],
    pub prefixes: Prefixes,
}

impl Instruction {
    pub fn new(mnemonic: Mnemonic) -> Self {
        Instruction { mnemonic, operands: [None, None, None], prefixes: Prefixes::default() }
    }

    pub fn with_operand(mut self, i: usize, op: Operand) -> Self {
        self.operands[i] = Some(op);
        self
    }

    pub fn with_lock(mut self) -> Self {
        self.prefixes.lock = true;
        self
    }

    pub fn with_rep(mut self, rep: RepPrefix) -> Self {
        self.prefixes.rep = rep;
        self
    }

    pub fn operand(&self, i: usize) -> Operand {
        self.operands[i].expect("decoder produced an instruction missing a required operand")
    }
}
