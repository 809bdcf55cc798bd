//! The micro-operation interpreter.
//!
//! Micro-ops run against the register file and the internal latches only;
//! bus traffic is the scheduler's job. Flag-writing operations funnel
//! through `set_f`, which also maintains the Q register used by the
//! undocumented SCF/CCF X/Y behaviour.

use crate::alu;
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
use crate::microcode::{
    Alu8, AluOp, BlockDir, BlockKind, Cond, CtlOp, DataOp, Micro, MicroSeq, RegOp, RotKind, Src8,
    Tgt8, WzOp,
};
use crate::registers::Reg16;

use super::Z80;

/// Side effects a micro-op sequence reports back to the scheduler.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Effects {
    /// A timing selector chose the alternate tail.
    pub select_alt: bool,
}

impl Z80 {
    /// Write F and record it in the Q register.
    pub(crate) fn set_f(&mut self, f: u8) {
        self.regs.f = f;
        self.last_q = f;
    }

    pub(crate) fn data_word(&self) -> u16 {
        u16::from(self.data_hi) << 8 | u16::from(self.data_lo)
    }

    fn set_data_word(&mut self, word: u16) {
        self.data_hi = (word >> 8) as u8;
        self.data_lo = word as u8;
    }

    /// Evaluate a flag condition against F.
    pub(crate) fn cond(&self, cond: Cond) -> bool {
        let f = self.regs.f;
        match cond {
            Cond::Always => true,
            Cond::Nz => f & ZF == 0,
            Cond::Z => f & ZF != 0,
            Cond::Nc => f & CF == 0,
            Cond::C => f & CF != 0,
            Cond::Po => f & PF == 0,
            Cond::Pe => f & PF != 0,
            Cond::P => f & SF == 0,
            Cond::M => f & SF != 0,
        }
    }

    fn read_tgt(&self, tgt: Tgt8) -> u8 {
        match tgt {
            Tgt8::Reg(r) => self.regs.get8(r),
            Tgt8::Data => self.data_lo,
        }
    }

    fn write_tgt(&mut self, tgt: Tgt8, value: u8) {
        match tgt {
            Tgt8::Reg(r) => self.regs.set8(r, value),
            Tgt8::Data => self.data_lo = value,
        }
    }

    /// Run one micro-op sequence to completion.
    pub(crate) fn run_seq(&mut self, seq: MicroSeq) -> Effects {
        let mut fx = Effects::default();
        for op in seq.iter() {
            match op {
                Micro::Data(op) => self.run_data(op),
                Micro::Alu(op) => self.run_alu(op),
                Micro::Ctl(op) => self.run_ctl(op, &mut fx),
                Micro::Reg(op) => self.run_reg(op),
            }
        }
        fx
    }

    fn run_data(&mut self, op: DataOp) {
        match op {
            DataOp::ToData(r) => self.data_lo = self.regs.get8(r),
            DataOp::FromData(r) => self.regs.set8(r, self.data_lo),
            DataOp::ToDataWide(rr) => {
                let word = self.regs.get16(rr);
                self.set_data_word(word);
            }
            DataOp::FromDataWide(rr) => {
                let word = self.data_word();
                self.regs.set16(rr, word);
            }
            DataOp::AddrFrom(rr) => self.addr = self.regs.get16(rr),
            DataOp::AddrFromData => self.addr = self.data_word(),
            DataOp::AddrIndexDisp(rr) => {
                self.addr = self.regs.get16(rr).wrapping_add_signed(i16::from(self.disp));
                self.regs.wz = self.addr;
            }
            DataOp::AddrTo(rr) => self.regs.set16(rr, self.addr),
            DataOp::AddrAccPage => {
                self.addr = u16::from(self.regs.a) << 8 | u16::from(self.data_lo);
            }
            DataOp::AddrDec => self.addr = self.addr.wrapping_sub(1),
            DataOp::DataZero => self.data_lo = 0,
            DataOp::ExDataWide(rr) => {
                let word = self.data_word();
                let pair = self.regs.get16(rr);
                self.regs.set16(rr, word);
                self.set_data_word(pair);
            }
            DataOp::JumpIf(cond) => {
                let target = self.data_word();
                self.regs.wz = target;
                if self.cond(cond) {
                    self.regs.pc = target;
                }
            }
            DataOp::JumpRel => {
                let dest = self
                    .regs
                    .pc
                    .wrapping_add_signed(i16::from(self.data_lo as i8));
                self.regs.pc = dest;
                self.regs.wz = dest;
            }
        }
    }

    fn src8(&self, src: Src8) -> u8 {
        match src {
            Src8::Reg(r) => self.regs.get8(r),
            Src8::Data => self.data_lo,
        }
    }

    fn rotate(&self, kind: RotKind, value: u8) -> alu::AluResult {
        let carry = self.regs.f & CF != 0;
        match kind {
            RotKind::Rlc => alu::rlc8(value),
            RotKind::Rrc => alu::rrc8(value),
            RotKind::Rl => alu::rl8(value, carry),
            RotKind::Rr => alu::rr8(value, carry),
            RotKind::Sla => alu::sla8(value),
            RotKind::Sra => alu::sra8(value),
            RotKind::Sll => alu::sll8(value),
            RotKind::Srl => alu::srl8(value),
        }
    }

    #[allow(clippy::too_many_lines)]
    fn run_alu(&mut self, op: AluOp) {
        let f = self.regs.f;
        let a = self.regs.a;
        match op {
            AluOp::Op8(op, src) => {
                let b = self.src8(src);
                let carry = f & CF != 0;
                let r = match op {
                    Alu8::Add => alu::add8(a, b, false),
                    Alu8::Adc => alu::add8(a, b, carry),
                    Alu8::Sub => alu::sub8(a, b, false),
                    Alu8::Sbc => alu::sub8(a, b, carry),
                    Alu8::And => alu::and8(a, b),
                    Alu8::Xor => alu::xor8(a, b),
                    Alu8::Or => alu::or8(a, b),
                    Alu8::Cp => alu::cp8(a, b),
                };
                self.regs.a = r.value;
                self.set_f(r.flags);
            }
            AluOp::Inc8(tgt) => {
                let r = alu::inc8(self.read_tgt(tgt));
                self.write_tgt(tgt, r.value);
                self.set_f((f & CF) | r.flags);
            }
            AluOp::Dec8(tgt) => {
                let r = alu::dec8(self.read_tgt(tgt));
                self.write_tgt(tgt, r.value);
                self.set_f((f & CF) | r.flags);
            }
            AluOp::Daa => {
                let r = alu::daa(a, f);
                self.regs.a = r.value;
                self.set_f(r.flags);
            }
            AluOp::Cpl => {
                let value = !a;
                self.regs.a = value;
                self.set_f((f & (SF | ZF | PF | CF)) | HF | NF | (value & (XF | YF)));
            }
            AluOp::Neg => {
                let r = alu::neg8(a);
                self.regs.a = r.value;
                self.set_f(r.flags);
            }
            AluOp::Scf => self.set_f(alu::scf_flags(f, a, self.prev_q)),
            AluOp::Ccf => self.set_f(alu::ccf_flags(f, a, self.prev_q)),
            AluOp::Add16 { dst, src } => {
                let (value, partial) = alu::add16(self.regs.get16(dst), self.regs.get16(src));
                self.regs.set16(dst, value);
                self.set_f((f & (SF | ZF | PF)) | partial);
            }
            AluOp::Adc16(src) => {
                let (value, flags) =
                    alu::adc16(self.regs.hl(), self.regs.get16(src), f & CF != 0);
                self.regs.set_hl(value);
                self.set_f(flags);
            }
            AluOp::Sbc16(src) => {
                let (value, flags) =
                    alu::sbc16(self.regs.hl(), self.regs.get16(src), f & CF != 0);
                self.regs.set_hl(value);
                self.set_f(flags);
            }
            AluOp::Rot(kind, tgt) => {
                let r = self.rotate(kind, self.read_tgt(tgt));
                self.write_tgt(tgt, r.value);
                self.set_f(r.flags);
            }
            AluOp::RotA(kind) => {
                let r = self.rotate(kind, a);
                self.regs.a = r.value;
                self.set_f((f & (SF | ZF | PF)) | (r.flags & (XF | YF | CF)));
            }
            AluOp::Bit {
                bit,
                src,
                xy_from_wz,
            } => {
                let value = self.read_tgt(src);
                let xy = if xy_from_wz {
                    (self.regs.wz >> 8) as u8
                } else {
                    value
                };
                self.set_f((f & CF) | alu::bit_flags(value, bit, xy));
            }
            AluOp::SetBit(bit, tgt) => {
                let value = self.read_tgt(tgt) | (1 << bit);
                self.write_tgt(tgt, value);
            }
            AluOp::ResBit(bit, tgt) => {
                let value = self.read_tgt(tgt) & !(1 << bit);
                self.write_tgt(tgt, value);
            }
            AluOp::RotDigit(dir) => {
                let (acc, mem, flags) = match dir {
                    BlockDir::Inc => alu::rld_digits(a, self.data_lo),
                    BlockDir::Dec => alu::rrd_digits(a, self.data_lo),
                };
                self.regs.a = acc;
                self.data_lo = mem;
                self.set_f(flags | (f & CF));
            }
            AluOp::InFlags => self.set_f(alu::in_flags(self.data_lo, f)),
            AluOp::IrFlags => self.set_f(alu::ir_flags(self.regs.a, f, self.regs.iff2)),
            AluOp::BlockTransfer(dir) => {
                let value = self.data_lo;
                self.step_pair(Reg16::Hl, dir);
                self.step_pair(Reg16::De, dir);
                let bc = self.regs.bc().wrapping_sub(1);
                self.regs.set_bc(bc);
                let n = value.wrapping_add(a);
                self.set_f(alu::block_transfer_flags(f, n, bc != 0));
            }
            AluOp::BlockCompare(dir) => {
                let value = self.data_lo;
                self.regs.wz = match dir {
                    BlockDir::Inc => self.regs.wz.wrapping_add(1),
                    BlockDir::Dec => self.regs.wz.wrapping_sub(1),
                };
                self.step_pair(Reg16::Hl, dir);
                let bc = self.regs.bc().wrapping_sub(1);
                self.regs.set_bc(bc);
                self.set_f(alu::block_compare_flags(f, a, value, bc != 0));
            }
            AluOp::BlockIn(dir) => {
                let value = self.data_lo;
                self.regs.b = self.regs.b.wrapping_sub(1);
                self.step_pair(Reg16::Hl, dir);
                let c_next = match dir {
                    BlockDir::Inc => self.regs.c.wrapping_add(1),
                    BlockDir::Dec => self.regs.c.wrapping_sub(1),
                };
                let k = u16::from(value) + u16::from(c_next);
                self.block_value = value;
                self.block_k = k;
                self.set_f(alu::block_io_flags(self.regs.b, value, k));
            }
            AluOp::BlockOut(dir) => {
                // B was already decremented while forming the port address.
                let value = self.data_lo;
                self.step_pair(Reg16::Hl, dir);
                let k = u16::from(value) + u16::from(self.regs.l);
                self.block_value = value;
                self.block_k = k;
                self.set_f(alu::block_io_flags(self.regs.b, value, k));
            }
            AluOp::BlockRepeatFlags(kind) => {
                let pch = (self.regs.pc >> 8) as u8;
                let fixed = match kind {
                    BlockKind::Transfer | BlockKind::Compare => alu::block_repeat_xy(f, pch),
                    BlockKind::Io => {
                        alu::block_io_repeat_flags(self.regs.b, self.block_value, self.block_k, pch)
                    }
                };
                self.set_f(fixed);
            }
        }
    }

    fn step_pair(&mut self, rr: Reg16, dir: BlockDir) {
        let value = self.regs.get16(rr);
        let next = match dir {
            BlockDir::Inc => value.wrapping_add(1),
            BlockDir::Dec => value.wrapping_sub(1),
        };
        self.regs.set16(rr, next);
    }

    fn run_ctl(&mut self, op: CtlOp, fx: &mut Effects) {
        match op {
            CtlOp::AltUnless(cond) => {
                if !self.cond(cond) {
                    fx.select_alt = true;
                }
            }
            CtlOp::AltIfZero => {
                if self.last_zero {
                    fx.select_alt = true;
                }
            }
            CtlOp::PowerOnReset => {
                self.regs.pc = 0;
                self.regs.wz = 0;
                self.regs.i = 0;
                self.regs.r = 0;
                self.regs.iff1 = false;
                self.regs.iff2 = false;
                self.regs.im = 0;
                self.regs.set_af(0xFFFF);
                self.regs.sp = 0xFFFF;
                self.regs.halted = false;
            }
            CtlOp::Halt => self.regs.halted = true,
            CtlOp::SetIff { iff1, iff2 } => {
                self.regs.iff1 = iff1;
                self.regs.iff2 = iff2;
            }
            CtlOp::EiDelayed => {
                self.regs.iff1 = true;
                self.regs.iff2 = true;
                self.ei_gate = true;
            }
            CtlOp::CopyIff2 => self.regs.iff1 = self.regs.iff2,
            CtlOp::SetIm(mode) => {
                assert!(mode <= 2, "interrupt mode {mode} out of range");
                self.regs.im = mode;
            }
        }
    }

    fn run_reg(&mut self, op: RegOp) {
        match op {
            RegOp::Inc16(rr) => {
                let value = self.regs.get16(rr).wrapping_add(1);
                self.regs.set16(rr, value);
            }
            RegOp::Dec16(rr) => {
                let value = self.regs.get16(rr).wrapping_sub(1);
                self.regs.set16(rr, value);
            }
            RegOp::Dec8Quiet(r) => {
                let value = self.regs.get8(r).wrapping_sub(1);
                self.regs.set8(r, value);
            }
            RegOp::ExDeHl => self.regs.ex_de_hl(),
            RegOp::ExAfAf => self.regs.ex_af_af(),
            RegOp::Exx => self.regs.exx(),
            RegOp::Refresh => self.regs.refresh(),
            RegOp::TestZero16(rr) => self.last_zero = self.regs.get16(rr) == 0,
            RegOp::TestZero8(r) => self.last_zero = self.regs.get8(r) == 0,
            RegOp::RstAddr(target) => {
                self.regs.pc = u16::from(target);
                self.regs.wz = self.regs.pc;
            }
            RegOp::RepeatInstr(len) => {
                self.regs.pc = self.regs.pc.wrapping_sub(u16::from(len));
            }
            RegOp::SetWz(op) => {
                self.regs.wz = match op {
                    WzOp::AddrPlus1 => self.addr.wrapping_add(1),
                    WzOp::AddrMinus1 => self.addr.wrapping_sub(1),
                    WzOp::HiAFromAddrPlus1 => {
                        u16::from(self.regs.a) << 8 | (self.addr.wrapping_add(1) & 0x00FF)
                    }
                    WzOp::FromData => self.data_word(),
                    WzOp::PcPlus1 => self.regs.pc.wrapping_add(1),
                };
            }
        }
    }
}
