//! Micro-operation definitions.
//!
//! Every instruction's behaviour is expressed as short sequences of typed
//! micro-operations attached to its machine cycles. The interpreter in
//! `cpu/interp.rs` executes them in order against the register/bus model;
//! micro-operations never branch - all control variation is expressed
//! through the scheduler's timing-variant selection.

use crate::registers::{Reg8, Reg16};

/// A micro-operation, tagged by family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Micro {
    /// Moves between registers, the internal latches and PC.
    Data(DataOp),
    /// Arithmetic/logic through the ALU operand buffers.
    Alu(AluOp),
    /// CPU control: timing selection, interrupt flip-flops, modes.
    Ctl(CtlOp),
    /// Register bookkeeping without flag effects.
    Reg(RegOp),
}

/// Data-path micro-operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOp {
    /// Sample a register onto the internal data bus latch (low byte).
    ToData(Reg8),
    /// Send the data bus latch (low byte) into a register.
    FromData(Reg8),
    /// Sample a register pair onto the data bus latch (low + high).
    ToDataWide(Reg16),
    /// Send the data bus latch word into a register pair.
    FromDataWide(Reg16),
    /// Drive the address bus latch from a register pair.
    AddrFrom(Reg16),
    /// Drive the address bus latch from the data bus latch word.
    AddrFromData,
    /// Address bus latch = index register + displacement latch; WZ follows.
    AddrIndexDisp(Reg16),
    /// Store the address bus latch into a register pair.
    AddrTo(Reg16),
    /// Address bus latch = accumulator page: (A << 8) | low data latch.
    AddrAccPage,
    /// Address bus latch -= 1.
    AddrDec,
    /// Low data latch = 0 (the undocumented OUT (C),0).
    DataZero,
    /// Swap the data bus latch word with a register pair.
    ExDataWide(Reg16),
    /// WZ = data word; PC follows if the condition holds.
    JumpIf(Cond),
    /// PC += sign-extended low data latch; WZ follows (JR/DJNZ).
    JumpRel,
}

/// Flag conditions for conditional control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Always,
    /// Zero flag clear.
    Nz,
    /// Zero flag set.
    Z,
    /// Carry flag clear.
    Nc,
    /// Carry flag set.
    C,
    /// Parity odd.
    Po,
    /// Parity even.
    Pe,
    /// Sign positive.
    P,
    /// Sign negative.
    M,
}

impl Cond {
    /// Condition from the 3-bit cc field of an opcode.
    #[must_use]
    pub fn from_cc(cc: u8) -> Self {
        match cc & 7 {
            0 => Self::Nz,
            1 => Self::Z,
            2 => Self::Nc,
            3 => Self::C,
            4 => Self::Po,
            5 => Self::Pe,
            6 => Self::P,
            _ => Self::M,
        }
    }

    /// Mnemonic suffix for descriptions.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Always => "",
            Self::Nz => "NZ",
            Self::Z => "Z",
            Self::Nc => "NC",
            Self::C => "C",
            Self::Po => "PO",
            Self::Pe => "PE",
            Self::P => "P",
            Self::M => "M",
        }
    }
}

/// The eight accumulator ALU operations, in opcode order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alu8 {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

impl Alu8 {
    /// Operation from bits 5-3 of an arithmetic-group opcode.
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        match bits & 7 {
            0 => Self::Add,
            1 => Self::Adc,
            2 => Self::Sub,
            3 => Self::Sbc,
            4 => Self::And,
            5 => Self::Xor,
            6 => Self::Or,
            _ => Self::Cp,
        }
    }
}

/// Rotate/shift kinds, in CB-opcode order. `Sll` is undocumented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotKind {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Sll,
    Srl,
}

impl RotKind {
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        match bits & 7 {
            0 => Self::Rlc,
            1 => Self::Rrc,
            2 => Self::Rl,
            3 => Self::Rr,
            4 => Self::Sla,
            5 => Self::Sra,
            6 => Self::Sll,
            _ => Self::Srl,
        }
    }
}

/// ALU operand source: a named register or the data bus latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Src8 {
    Reg(Reg8),
    Data,
}

/// ALU result target: a named register or the data bus latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tgt8 {
    Reg(Reg8),
    Data,
}

/// Block instruction direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDir {
    Inc,
    Dec,
}

/// Kind of block instruction, for the repeat-step flag fixups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Transfer,
    Compare,
    Io,
}

/// ALU micro-operations. Left operand buffer is loaded from the
/// accumulator (8-bit group) or HL/IX/IY (16-bit group); the right
/// buffer from the named source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    /// Accumulator arithmetic/logic with the given source.
    Op8(Alu8, Src8),
    /// Increment target; fixed left operand of one, no carry out.
    Inc8(Tgt8),
    /// Decrement target; fixed left operand of one, no carry out.
    Dec8(Tgt8),
    /// BCD adjust of the accumulator from current flags.
    Daa,
    /// Complement accumulator.
    Cpl,
    /// Negate accumulator.
    Neg,
    /// Set carry (undocumented X/Y via the Q register).
    Scf,
    /// Complement carry (undocumented X/Y via the Q register).
    Ccf,
    /// 16-bit add into HL/IX/IY; S/Z/P preserved.
    Add16 { dst: Reg16, src: Reg16 },
    /// 16-bit add with carry into HL; 16-bit zero semantics.
    Adc16(Reg16),
    /// 16-bit subtract with borrow from HL; 16-bit zero semantics.
    Sbc16(Reg16),
    /// Rotate or shift a target.
    Rot(RotKind, Tgt8),
    /// Accumulator fast-path rotates (RLCA/RRCA/RLA/RRA): S/Z/P kept.
    RotA(RotKind),
    /// Test a bit; X/Y from the named source byte.
    Bit { bit: u8, src: Tgt8, xy_from_wz: bool },
    /// Set a bit in the target.
    SetBit(u8, Tgt8),
    /// Reset a bit in the target.
    ResBit(u8, Tgt8),
    /// BCD-digit rotate between A and the data latch (RLD/RRD).
    RotDigit(BlockDir),
    /// Flags for IN r,(C) from the data latch.
    InFlags,
    /// Flags for LD A,I / LD A,R (P/V from IFF2).
    IrFlags,
    /// One step of LDI/LDD-class transfer: moves the byte latch to (DE),
    /// steps HL/DE, decrements BC, computes the documented+undocumented
    /// flags for the non-repeating form.
    BlockTransfer(BlockDir),
    /// One step of CPI/CPD-class compare.
    BlockCompare(BlockDir),
    /// One step of INI/IND-class port-to-memory move.
    BlockIn(BlockDir),
    /// One step of OUTI/OUTD-class memory-to-port move.
    BlockOut(BlockDir),
    /// Repeat-step flag fixup (X/Y from PCH, recomputed H and P/V for
    /// the I/O forms). Runs in the extra 5-T cycle of LDIR-class ops.
    BlockRepeatFlags(BlockKind),
}

/// CPU control micro-operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtlOp {
    /// Switch to alternate timing when the condition is false.
    AltUnless(Cond),
    /// Switch to alternate timing when the last zero test was zero.
    AltIfZero,
    /// Reset all registers and flip-flops to power-on values.
    PowerOnReset,
    /// Enter the halt state.
    Halt,
    /// Write the interrupt flip-flops.
    SetIff { iff1: bool, iff2: bool },
    /// EI: both flip-flops set, effective after the next instruction.
    EiDelayed,
    /// RETN: copy IFF2 back into IFF1.
    CopyIff2,
    /// Set the interrupt mode (0, 1 or 2).
    SetIm(u8),
}

/// Register micro-operations (no flag effects).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegOp {
    Inc16(Reg16),
    Dec16(Reg16),
    /// Decrement an 8-bit register without touching flags (DJNZ, OUTI).
    Dec8Quiet(Reg8),
    /// Swap DE and HL.
    ExDeHl,
    /// Swap AF and AF'.
    ExAfAf,
    /// Swap BC/DE/HL with the shadow set.
    Exx,
    /// Increment the refresh register (bit 7 preserved).
    Refresh,
    /// Latch whether a register pair is zero, for `AltIfZero`.
    TestZero16(Reg16),
    /// Latch whether an 8-bit register is zero, for `AltIfZero`.
    TestZero8(Reg8),
    /// Load PC and WZ with one of the eight page-zero restart targets.
    RstAddr(u8),
    /// Wind PC back by the resolved encoded length to repeat the
    /// instruction. Dead DD/FD prefixes are not re-executed.
    RepeatInstr(u8),
    /// WZ bookkeeping.
    SetWz(WzOp),
}

/// WZ (MEMPTR) update rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WzOp {
    /// WZ = address latch + 1.
    AddrPlus1,
    /// WZ = address latch - 1.
    AddrMinus1,
    /// WZ = (A << 8) | ((address latch + 1) & 0xFF) - the LD (nn),A rule.
    HiAFromAddrPlus1,
    /// WZ = data bus latch word.
    FromData,
    /// WZ = PC + 1 (block repeat rule).
    PcPlus1,
}

/// Maximum micro-operations attached to one machine cycle.
pub const MAX_MICROS: usize = 8;

/// A fixed-capacity, in-order micro-operation sequence.
/// Fixed size to avoid allocation in the per-cycle hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MicroSeq {
    ops: [Micro; MAX_MICROS],
    len: u8,
}

impl MicroSeq {
    pub const EMPTY: Self = Self {
        ops: [Micro::Reg(RegOp::Refresh); MAX_MICROS],
        len: 0,
    };

    #[must_use]
    pub fn of(ops: &[Micro]) -> Self {
        let mut seq = Self::EMPTY;
        for &op in ops {
            seq.push(op);
        }
        seq
    }

    /// Append a micro-op. Overflow is a programming error.
    pub fn push(&mut self, op: Micro) {
        assert!(
            (self.len as usize) < MAX_MICROS,
            "micro-op sequence overflow"
        );
        self.ops[self.len as usize] = op;
        self.len += 1;
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = Micro> + '_ {
        self.ops[..self.len as usize].iter().copied()
    }
}

impl Default for MicroSeq {
    fn default() -> Self {
        Self::EMPTY
    }
}
