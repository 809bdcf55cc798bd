//! Instruction lowering: resolved opcodes into machine-cycle programs.
//!
//! Runs once per instruction, at the moment the decoder completes. The
//! catalog fixed the timing shape; this module attaches the bus steps and
//! micro-ops. Conditions that are already decided by the current flags
//! (JR cc, RET cc, CALL cc, DJNZ) pick their timing here; conditions that
//! only materialise mid-instruction (the repeating block forms) go through
//! the alternate-tail selectors instead.

use crate::catalog::CycleKind;
use crate::decoder::PrefixState;
use crate::microcode::{
    Alu8, AluOp, BlockDir, BlockKind, Cond, CtlOp, DataOp, Micro, MicroSeq, RegOp, RotKind, Src8,
    Tgt8, WzOp,
};
use crate::registers::{Reg8, Reg16};
use crate::scheduler::{BusStep, CycleStep, Half};

use super::Z80;

fn m(ops: &[Micro]) -> MicroSeq {
    MicroSeq::of(ops)
}

fn read_cycle(t: u8, bus: BusStep) -> CycleStep {
    CycleStep::new(CycleKind::MemRead, t, bus)
}

fn write_cycle(t: u8, bus: BusStep) -> CycleStep {
    CycleStep::new(CycleKind::MemWrite, t, bus)
}

fn internal_cycle(t: u8) -> CycleStep {
    CycleStep::new(CycleKind::Internal, t, BusStep::Internal)
}

fn pop_cycle(t: u8, half: Half) -> CycleStep {
    CycleStep::new(CycleKind::StackRead, t, BusStep::Pop(half))
}

fn push_cycle(half: Half) -> CycleStep {
    CycleStep::new(CycleKind::StackWrite, 3, BusStep::Push(half))
}

fn port_in_cycle() -> CycleStep {
    CycleStep::new(CycleKind::PortRead, 4, BusStep::PortIn)
}

fn port_out_cycle() -> CycleStep {
    CycleStep::new(CycleKind::PortWrite, 4, BusStep::PortOut)
}

/// r[code] for the 3-bit register fields; `None` is the (HL) slot.
fn reg8(code: u8) -> Option<Reg8> {
    match code & 7 {
        0 => Some(Reg8::B),
        1 => Some(Reg8::C),
        2 => Some(Reg8::D),
        3 => Some(Reg8::E),
        4 => Some(Reg8::H),
        5 => Some(Reg8::L),
        6 => None,
        _ => Some(Reg8::A),
    }
}

/// H and L become the index-register halves under DD/FD.
fn remap_half(reg: Reg8, ii: Reg16) -> Reg8 {
    match (reg, ii) {
        (Reg8::H, Reg16::Ix) => Reg8::IxH,
        (Reg8::L, Reg16::Ix) => Reg8::IxL,
        (Reg8::H, Reg16::Iy) => Reg8::IyH,
        (Reg8::L, Reg16::Iy) => Reg8::IyL,
        _ => reg,
    }
}

fn pair(p: u8) -> Reg16 {
    match p & 3 {
        0 => Reg16::Bc,
        1 => Reg16::De,
        2 => Reg16::Hl,
        _ => Reg16::Sp,
    }
}

fn pair_af(p: u8) -> Reg16 {
    match p & 3 {
        0 => Reg16::Bc,
        1 => Reg16::De,
        2 => Reg16::Hl,
        _ => Reg16::Af,
    }
}

impl Z80 {
    /// Lower the instruction the decoder just resolved.
    pub(crate) fn lower(&mut self) {
        self.program.clear();
        let op = self.decoder.opcode();
        match self.decoder.table() {
            PrefixState::None => self.lower_main(op),
            PrefixState::Cb => self.lower_cb(op),
            PrefixState::Ed => self.lower_ed(op),
            PrefixState::Dd => self.lower_indexed(op, Reg16::Ix),
            PrefixState::Fd => self.lower_indexed(op, Reg16::Iy),
            PrefixState::DdCb => {
                self.disp = self.decoder.displacement();
                self.lower_index_cb(op, Reg16::Ix);
            }
            PrefixState::FdCb => {
                self.disp = self.decoder.displacement();
                self.lower_index_cb(op, Reg16::Iy);
            }
        }
    }

    /// Extend the in-flight fetch cycle and attach its cycle-end micros.
    fn fetch_tail(&mut self, extra_t: u8, micros: MicroSeq) {
        self.cycle_t += extra_t;
        self.current.micros = micros;
    }

    /// LD rr, nn.
    fn load16_imm(&mut self, rr: Reg16) {
        self.program.push(read_cycle(3, BusStep::ReadPc(Half::Lo)));
        self.program.push(
            read_cycle(3, BusStep::ReadPc(Half::Hi))
                .micros(m(&[Micro::Data(DataOp::FromDataWide(rr))])),
        );
    }

    /// LD (nn), rr.
    fn store16_ext(&mut self, rr: Reg16) {
        self.program.push(read_cycle(3, BusStep::ReadPc(Half::Lo)));
        self.program.push(
            read_cycle(3, BusStep::ReadPc(Half::Hi)).micros(m(&[
                Micro::Data(DataOp::AddrFromData),
                Micro::Reg(RegOp::SetWz(WzOp::AddrPlus1)),
                Micro::Data(DataOp::ToDataWide(rr)),
            ])),
        );
        self.program
            .push(write_cycle(3, BusStep::WriteBump(Half::Lo)));
        self.program.push(write_cycle(3, BusStep::Write(Half::Hi)));
    }

    /// LD rr, (nn).
    fn load16_ext(&mut self, rr: Reg16) {
        self.program.push(read_cycle(3, BusStep::ReadPc(Half::Lo)));
        self.program.push(
            read_cycle(3, BusStep::ReadPc(Half::Hi)).micros(m(&[
                Micro::Data(DataOp::AddrFromData),
                Micro::Reg(RegOp::SetWz(WzOp::AddrPlus1)),
            ])),
        );
        self.program
            .push(read_cycle(3, BusStep::ReadBump(Half::Lo)));
        self.program.push(
            read_cycle(3, BusStep::Read(Half::Hi))
                .micros(m(&[Micro::Data(DataOp::FromDataWide(rr))])),
        );
    }

    /// ADD rr, ss (7 T-states of internal addition after the fetch).
    fn add16(&mut self, dst: Reg16, src: Reg16) {
        self.program.push(
            internal_cycle(4).setup(m(&[
                Micro::Data(DataOp::AddrFrom(dst)),
                Micro::Reg(RegOp::SetWz(WzOp::AddrPlus1)),
            ])),
        );
        self.program
            .push(internal_cycle(3).micros(m(&[Micro::Alu(AluOp::Add16 { dst, src })])));
    }

    /// EX (SP), rr. SP itself is untouched; the word at the stack top is
    /// addressed through the address latch.
    fn exchange_stack_top(&mut self, rr: Reg16) {
        self.program.push(
            CycleStep::new(CycleKind::StackRead, 3, BusStep::ReadBump(Half::Lo))
                .setup(m(&[Micro::Data(DataOp::AddrFrom(Reg16::Sp))])),
        );
        self.program.push(
            CycleStep::new(CycleKind::StackRead, 4, BusStep::Read(Half::Hi)).micros(m(&[
                Micro::Reg(RegOp::SetWz(WzOp::FromData)),
                Micro::Data(DataOp::ExDataWide(rr)),
            ])),
        );
        self.program.push(
            CycleStep::new(CycleKind::StackWrite, 3, BusStep::Write(Half::Hi))
                .micros(m(&[Micro::Data(DataOp::AddrDec)])),
        );
        self.program
            .push(CycleStep::new(CycleKind::StackWrite, 5, BusStep::Write(Half::Lo)));
    }

    /// The (ii+d) displacement fetch and address-add padding.
    fn index_prelude(&mut self) {
        self.program.push(read_cycle(3, BusStep::ReadDisp));
        self.program.push(internal_cycle(5));
    }

    #[allow(clippy::too_many_lines)]
    fn lower_main(&mut self, op: u8) {
        let x = op >> 6;
        let y = (op >> 3) & 7;
        let z = op & 7;
        let p = y >> 1;
        let q = y & 1;

        match (x, z) {
            (0, 0) => match y {
                0 => {}
                1 => self.fetch_tail(0, m(&[Micro::Reg(RegOp::ExAfAf)])),
                2 => {
                    // DJNZ: B is decremented during the extended fetch, so
                    // the outcome is already known here.
                    self.fetch_tail(1, m(&[Micro::Reg(RegOp::Dec8Quiet(Reg8::B))]));
                    self.program.push(read_cycle(3, BusStep::ReadPc(Half::Lo)));
                    if self.regs.b.wrapping_sub(1) != 0 {
                        self.program
                            .push(internal_cycle(5).micros(m(&[Micro::Data(DataOp::JumpRel)])));
                    }
                }
                3 => {
                    self.program.push(read_cycle(3, BusStep::ReadPc(Half::Lo)));
                    self.program
                        .push(internal_cycle(5).micros(m(&[Micro::Data(DataOp::JumpRel)])));
                }
                _ => {
                    self.program.push(read_cycle(3, BusStep::ReadPc(Half::Lo)));
                    if self.cond(Cond::from_cc(y - 4)) {
                        self.program
                            .push(internal_cycle(5).micros(m(&[Micro::Data(DataOp::JumpRel)])));
                    }
                }
            },
            (0, 1) if q == 0 => self.load16_imm(pair(p)),
            (0, 1) => self.add16(Reg16::Hl, pair(p)),
            (0, 2) => match (q, p) {
                (0, 0 | 1) => self.program.push(
                    write_cycle(3, BusStep::Write(Half::Lo)).setup(m(&[
                        Micro::Data(DataOp::AddrFrom(pair(p))),
                        Micro::Data(DataOp::ToData(Reg8::A)),
                        Micro::Reg(RegOp::SetWz(WzOp::HiAFromAddrPlus1)),
                    ])),
                ),
                (0, 2) => self.store16_ext(Reg16::Hl),
                (0, _) => {
                    self.program.push(read_cycle(3, BusStep::ReadPc(Half::Lo)));
                    self.program.push(
                        read_cycle(3, BusStep::ReadPc(Half::Hi))
                            .micros(m(&[Micro::Data(DataOp::AddrFromData)])),
                    );
                    self.program.push(
                        write_cycle(3, BusStep::Write(Half::Lo)).setup(m(&[
                            Micro::Data(DataOp::ToData(Reg8::A)),
                            Micro::Reg(RegOp::SetWz(WzOp::HiAFromAddrPlus1)),
                        ])),
                    );
                }
                (_, 0 | 1) => self.program.push(
                    read_cycle(3, BusStep::Read(Half::Lo))
                        .setup(m(&[
                            Micro::Data(DataOp::AddrFrom(pair(p))),
                            Micro::Reg(RegOp::SetWz(WzOp::AddrPlus1)),
                        ]))
                        .micros(m(&[Micro::Data(DataOp::FromData(Reg8::A))])),
                ),
                (_, 2) => self.load16_ext(Reg16::Hl),
                _ => {
                    self.program.push(read_cycle(3, BusStep::ReadPc(Half::Lo)));
                    self.program.push(
                        read_cycle(3, BusStep::ReadPc(Half::Hi)).micros(m(&[
                            Micro::Data(DataOp::AddrFromData),
                            Micro::Reg(RegOp::SetWz(WzOp::AddrPlus1)),
                        ])),
                    );
                    self.program.push(
                        read_cycle(3, BusStep::Read(Half::Lo))
                            .micros(m(&[Micro::Data(DataOp::FromData(Reg8::A))])),
                    );
                }
            },
            (0, 3) => {
                let op = if q == 0 {
                    RegOp::Inc16(pair(p))
                } else {
                    RegOp::Dec16(pair(p))
                };
                self.fetch_tail(2, m(&[Micro::Reg(op)]));
            }
            (0, 4 | 5) => {
                let alu = |tgt| {
                    if z == 4 {
                        AluOp::Inc8(tgt)
                    } else {
                        AluOp::Dec8(tgt)
                    }
                };
                match reg8(y) {
                    Some(reg) => self.fetch_tail(0, m(&[Micro::Alu(alu(Tgt8::Reg(reg)))])),
                    None => {
                        self.program.push(
                            read_cycle(4, BusStep::Read(Half::Lo))
                                .setup(m(&[Micro::Data(DataOp::AddrFrom(Reg16::Hl))]))
                                .micros(m(&[Micro::Alu(alu(Tgt8::Data))])),
                        );
                        self.program.push(write_cycle(3, BusStep::Write(Half::Lo)));
                    }
                }
            }
            (0, 6) => match reg8(y) {
                Some(reg) => self.program.push(
                    read_cycle(3, BusStep::ReadPc(Half::Lo))
                        .micros(m(&[Micro::Data(DataOp::FromData(reg))])),
                ),
                None => {
                    self.program.push(read_cycle(3, BusStep::ReadPc(Half::Lo)));
                    self.program.push(
                        write_cycle(3, BusStep::Write(Half::Lo))
                            .setup(m(&[Micro::Data(DataOp::AddrFrom(Reg16::Hl))])),
                    );
                }
            },
            (0, 7) => {
                let alu = match y {
                    0 => AluOp::RotA(RotKind::Rlc),
                    1 => AluOp::RotA(RotKind::Rrc),
                    2 => AluOp::RotA(RotKind::Rl),
                    3 => AluOp::RotA(RotKind::Rr),
                    4 => AluOp::Daa,
                    5 => AluOp::Cpl,
                    6 => AluOp::Scf,
                    _ => AluOp::Ccf,
                };
                self.fetch_tail(0, m(&[Micro::Alu(alu)]));
            }
            (1, _) => match (reg8(y), reg8(z)) {
                (None, None) => self.fetch_tail(0, m(&[Micro::Ctl(CtlOp::Halt)])),
                (Some(dst), Some(src)) => self.fetch_tail(
                    0,
                    m(&[
                        Micro::Data(DataOp::ToData(src)),
                        Micro::Data(DataOp::FromData(dst)),
                    ]),
                ),
                (Some(dst), None) => self.program.push(
                    read_cycle(3, BusStep::Read(Half::Lo))
                        .setup(m(&[Micro::Data(DataOp::AddrFrom(Reg16::Hl))]))
                        .micros(m(&[Micro::Data(DataOp::FromData(dst))])),
                ),
                (None, Some(src)) => self.program.push(
                    write_cycle(3, BusStep::Write(Half::Lo)).setup(m(&[
                        Micro::Data(DataOp::AddrFrom(Reg16::Hl)),
                        Micro::Data(DataOp::ToData(src)),
                    ])),
                ),
            },
            (2, _) => {
                let alu = Alu8::from_bits(y);
                match reg8(z) {
                    Some(reg) => {
                        self.fetch_tail(0, m(&[Micro::Alu(AluOp::Op8(alu, Src8::Reg(reg)))]));
                    }
                    None => self.program.push(
                        read_cycle(3, BusStep::Read(Half::Lo))
                            .setup(m(&[Micro::Data(DataOp::AddrFrom(Reg16::Hl))]))
                            .micros(m(&[Micro::Alu(AluOp::Op8(alu, Src8::Data))])),
                    ),
                }
            }
            (3, 0) => {
                self.fetch_tail(1, MicroSeq::EMPTY);
                if self.cond(Cond::from_cc(y)) {
                    self.program.push(pop_cycle(3, Half::Lo));
                    self.program.push(
                        pop_cycle(3, Half::Hi)
                            .micros(m(&[Micro::Data(DataOp::JumpIf(Cond::Always))])),
                    );
                }
            }
            (3, 1) if q == 0 => {
                self.program.push(pop_cycle(3, Half::Lo));
                self.program.push(
                    pop_cycle(3, Half::Hi)
                        .micros(m(&[Micro::Data(DataOp::FromDataWide(pair_af(p)))])),
                );
            }
            (3, 1) => match p {
                0 => {
                    self.program.push(pop_cycle(3, Half::Lo));
                    self.program.push(
                        pop_cycle(3, Half::Hi)
                            .micros(m(&[Micro::Data(DataOp::JumpIf(Cond::Always))])),
                    );
                }
                1 => self.fetch_tail(0, m(&[Micro::Reg(RegOp::Exx)])),
                2 => self.fetch_tail(
                    0,
                    m(&[
                        Micro::Data(DataOp::AddrFrom(Reg16::Hl)),
                        Micro::Data(DataOp::AddrTo(Reg16::Pc)),
                    ]),
                ),
                _ => self.fetch_tail(
                    2,
                    m(&[
                        Micro::Data(DataOp::ToDataWide(Reg16::Hl)),
                        Micro::Data(DataOp::FromDataWide(Reg16::Sp)),
                    ]),
                ),
            },
            (3, 2) => {
                self.program.push(read_cycle(3, BusStep::ReadPc(Half::Lo)));
                self.program.push(
                    read_cycle(3, BusStep::ReadPc(Half::Hi))
                        .micros(m(&[Micro::Data(DataOp::JumpIf(Cond::from_cc(y)))])),
                );
            }
            (3, 3) => match y {
                0 => {
                    self.program.push(read_cycle(3, BusStep::ReadPc(Half::Lo)));
                    self.program.push(
                        read_cycle(3, BusStep::ReadPc(Half::Hi))
                            .micros(m(&[Micro::Data(DataOp::JumpIf(Cond::Always))])),
                    );
                }
                2 => {
                    self.program.push(read_cycle(3, BusStep::ReadPc(Half::Lo)));
                    self.program.push(port_out_cycle().setup(m(&[
                        Micro::Data(DataOp::AddrAccPage),
                        Micro::Reg(RegOp::SetWz(WzOp::HiAFromAddrPlus1)),
                        Micro::Data(DataOp::ToData(Reg8::A)),
                    ])));
                }
                3 => {
                    self.program.push(read_cycle(3, BusStep::ReadPc(Half::Lo)));
                    self.program.push(
                        port_in_cycle()
                            .setup(m(&[
                                Micro::Data(DataOp::AddrAccPage),
                                Micro::Reg(RegOp::SetWz(WzOp::AddrPlus1)),
                            ]))
                            .micros(m(&[Micro::Data(DataOp::FromData(Reg8::A))])),
                    );
                }
                4 => self.exchange_stack_top(Reg16::Hl),
                5 => self.fetch_tail(0, m(&[Micro::Reg(RegOp::ExDeHl)])),
                6 => self.fetch_tail(
                    0,
                    m(&[Micro::Ctl(CtlOp::SetIff {
                        iff1: false,
                        iff2: false,
                    })]),
                ),
                7 => self.fetch_tail(0, m(&[Micro::Ctl(CtlOp::EiDelayed)])),
                _ => unreachable!("0xCB is consumed as a prefix"),
            },
            (3, 4) => self.lower_call(Some(Cond::from_cc(y))),
            (3, 5) if q == 0 => {
                self.fetch_tail(1, MicroSeq::EMPTY);
                self.program.push(
                    push_cycle(Half::Hi)
                        .setup(m(&[Micro::Data(DataOp::ToDataWide(pair_af(p)))])),
                );
                self.program.push(push_cycle(Half::Lo));
            }
            (3, 5) => match p {
                0 => self.lower_call(None),
                _ => unreachable!("0xDD/0xED/0xFD are consumed as prefixes"),
            },
            (3, 6) => self.program.push(
                read_cycle(3, BusStep::ReadPc(Half::Lo))
                    .micros(m(&[Micro::Alu(AluOp::Op8(Alu8::from_bits(y), Src8::Data))])),
            ),
            (3, 7) => {
                self.fetch_tail(1, MicroSeq::EMPTY);
                self.program.push(
                    push_cycle(Half::Hi)
                        .setup(m(&[Micro::Data(DataOp::ToDataWide(Reg16::Pc))])),
                );
                self.program
                    .push(push_cycle(Half::Lo).micros(m(&[Micro::Reg(RegOp::RstAddr(y * 8))])));
            }
            _ => unreachable!(),
        }
    }

    /// CALL nn and CALL cc, nn.
    fn lower_call(&mut self, cond: Option<Cond>) {
        let taken = cond.is_none_or(|c| self.cond(c));
        self.program.push(read_cycle(3, BusStep::ReadPc(Half::Lo)));
        if taken {
            self.program.push(
                read_cycle(4, BusStep::ReadPc(Half::Hi)).micros(m(&[
                    Micro::Reg(RegOp::SetWz(WzOp::FromData)),
                    Micro::Data(DataOp::ToDataWide(Reg16::Pc)),
                ])),
            );
            self.program.push(push_cycle(Half::Hi));
            self.program.push(push_cycle(Half::Lo).micros(m(&[
                Micro::Data(DataOp::AddrFrom(Reg16::Wz)),
                Micro::Data(DataOp::AddrTo(Reg16::Pc)),
            ])));
        } else {
            self.program.push(
                read_cycle(3, BusStep::ReadPc(Half::Hi))
                    .micros(m(&[Micro::Reg(RegOp::SetWz(WzOp::FromData))])),
            );
        }
    }

    fn lower_cb(&mut self, op: u8) {
        let x = op >> 6;
        let y = (op >> 3) & 7;
        let z = op & 7;

        let alu = match x {
            0 => AluOp::Rot(RotKind::from_bits(y), Tgt8::Data),
            1 => AluOp::Bit {
                bit: y,
                src: Tgt8::Data,
                xy_from_wz: true,
            },
            2 => AluOp::ResBit(y, Tgt8::Data),
            _ => AluOp::SetBit(y, Tgt8::Data),
        };

        match reg8(z) {
            Some(reg) => {
                let alu = match x {
                    0 => AluOp::Rot(RotKind::from_bits(y), Tgt8::Reg(reg)),
                    1 => AluOp::Bit {
                        bit: y,
                        src: Tgt8::Reg(reg),
                        xy_from_wz: false,
                    },
                    2 => AluOp::ResBit(y, Tgt8::Reg(reg)),
                    _ => AluOp::SetBit(y, Tgt8::Reg(reg)),
                };
                self.fetch_tail(0, m(&[Micro::Alu(alu)]));
            }
            None => {
                self.program.push(
                    read_cycle(4, BusStep::Read(Half::Lo))
                        .setup(m(&[Micro::Data(DataOp::AddrFrom(Reg16::Hl))]))
                        .micros(m(&[Micro::Alu(alu)])),
                );
                if x != 1 {
                    self.program.push(write_cycle(3, BusStep::Write(Half::Lo)));
                }
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    fn lower_ed(&mut self, op: u8) {
        let x = op >> 6;
        let y = (op >> 3) & 7;
        let z = op & 7;
        let p = y >> 1;
        let q = y & 1;

        match (x, z) {
            (1, 0) => {
                let mut micros = m(&[Micro::Alu(AluOp::InFlags)]);
                if let Some(reg) = reg8(y) {
                    micros.push(Micro::Data(DataOp::FromData(reg)));
                }
                self.program.push(
                    port_in_cycle()
                        .setup(m(&[
                            Micro::Data(DataOp::AddrFrom(Reg16::Bc)),
                            Micro::Reg(RegOp::SetWz(WzOp::AddrPlus1)),
                        ]))
                        .micros(micros),
                );
            }
            (1, 1) => {
                let data = match reg8(y) {
                    Some(reg) => Micro::Data(DataOp::ToData(reg)),
                    None => Micro::Data(DataOp::DataZero),
                };
                self.program.push(port_out_cycle().setup(m(&[
                    Micro::Data(DataOp::AddrFrom(Reg16::Bc)),
                    Micro::Reg(RegOp::SetWz(WzOp::AddrPlus1)),
                    data,
                ])));
            }
            (1, 2) => {
                let alu = if q == 0 {
                    AluOp::Sbc16(pair(p))
                } else {
                    AluOp::Adc16(pair(p))
                };
                self.program.push(internal_cycle(4).setup(m(&[
                    Micro::Data(DataOp::AddrFrom(Reg16::Hl)),
                    Micro::Reg(RegOp::SetWz(WzOp::AddrPlus1)),
                ])));
                self.program
                    .push(internal_cycle(3).micros(m(&[Micro::Alu(alu)])));
            }
            (1, 3) if q == 0 => self.store16_ext(pair(p)),
            (1, 3) => self.load16_ext(pair(p)),
            (1, 4) => self.fetch_tail(0, m(&[Micro::Alu(AluOp::Neg)])),
            (1, 5) => {
                self.program.push(pop_cycle(3, Half::Lo));
                self.program.push(pop_cycle(3, Half::Hi).micros(m(&[
                    Micro::Data(DataOp::JumpIf(Cond::Always)),
                    Micro::Ctl(CtlOp::CopyIff2),
                ])));
            }
            (1, 6) => {
                let mode = [0, 0, 1, 2, 0, 0, 1, 2][y as usize];
                self.fetch_tail(0, m(&[Micro::Ctl(CtlOp::SetIm(mode))]));
            }
            (1, 7) => match y {
                0 => self.fetch_tail(
                    1,
                    m(&[
                        Micro::Data(DataOp::ToData(Reg8::A)),
                        Micro::Data(DataOp::FromData(Reg8::I)),
                    ]),
                ),
                1 => self.fetch_tail(
                    1,
                    m(&[
                        Micro::Data(DataOp::ToData(Reg8::A)),
                        Micro::Data(DataOp::FromData(Reg8::R)),
                    ]),
                ),
                2 => self.fetch_tail(
                    1,
                    m(&[
                        Micro::Data(DataOp::ToData(Reg8::I)),
                        Micro::Data(DataOp::FromData(Reg8::A)),
                        Micro::Alu(AluOp::IrFlags),
                    ]),
                ),
                3 => self.fetch_tail(
                    1,
                    m(&[
                        Micro::Data(DataOp::ToData(Reg8::R)),
                        Micro::Data(DataOp::FromData(Reg8::A)),
                        Micro::Alu(AluOp::IrFlags),
                    ]),
                ),
                4 | 5 => {
                    let dir = if y == 4 { BlockDir::Dec } else { BlockDir::Inc };
                    self.program.push(
                        read_cycle(3, BusStep::Read(Half::Lo)).setup(m(&[
                            Micro::Data(DataOp::AddrFrom(Reg16::Hl)),
                            Micro::Reg(RegOp::SetWz(WzOp::AddrPlus1)),
                        ])),
                    );
                    self.program
                        .push(internal_cycle(4).micros(m(&[Micro::Alu(AluOp::RotDigit(dir))])));
                    self.program.push(write_cycle(3, BusStep::Write(Half::Lo)));
                }
                _ => {} // ED holes: an 8-T NOP
            },
            (2, 0..=3) if y >= 4 => self.lower_block(y, z),
            _ => {} // ED holes: an 8-T NOP
        }
    }

    /// The sixteen block instructions (LDI..OTDR quadrant).
    fn lower_block(&mut self, y: u8, z: u8) {
        let dir = if y & 1 == 0 {
            BlockDir::Inc
        } else {
            BlockDir::Dec
        };
        let repeat = y >= 6;

        match z {
            0 => {
                self.program.push(
                    read_cycle(3, BusStep::Read(Half::Lo))
                        .setup(m(&[Micro::Data(DataOp::AddrFrom(Reg16::Hl))])),
                );
                let mut micros = m(&[Micro::Alu(AluOp::BlockTransfer(dir))]);
                if repeat {
                    micros.push(Micro::Reg(RegOp::TestZero16(Reg16::Bc)));
                    micros.push(Micro::Ctl(CtlOp::AltIfZero));
                }
                self.program.push(
                    write_cycle(5, BusStep::Write(Half::Lo))
                        .setup(m(&[Micro::Data(DataOp::AddrFrom(Reg16::De))]))
                        .micros(micros),
                );
                if repeat {
                    self.push_repeat_cycle(BlockKind::Transfer);
                }
            }
            1 => {
                self.program.push(
                    read_cycle(3, BusStep::Read(Half::Lo))
                        .setup(m(&[Micro::Data(DataOp::AddrFrom(Reg16::Hl))])),
                );
                let mut micros = m(&[Micro::Alu(AluOp::BlockCompare(dir))]);
                if repeat {
                    micros.push(Micro::Reg(RegOp::TestZero16(Reg16::Bc)));
                    micros.push(Micro::Ctl(CtlOp::AltIfZero));
                    micros.push(Micro::Ctl(CtlOp::AltUnless(Cond::Nz)));
                }
                self.program.push(internal_cycle(5).micros(micros));
                if repeat {
                    self.push_repeat_cycle(BlockKind::Compare);
                }
            }
            2 => {
                let wz = if dir == BlockDir::Inc {
                    WzOp::AddrPlus1
                } else {
                    WzOp::AddrMinus1
                };
                self.fetch_tail(1, MicroSeq::EMPTY);
                self.program.push(port_in_cycle().setup(m(&[
                    Micro::Data(DataOp::AddrFrom(Reg16::Bc)),
                    Micro::Reg(RegOp::SetWz(wz)),
                ])));
                let mut micros = m(&[Micro::Alu(AluOp::BlockIn(dir))]);
                if repeat {
                    micros.push(Micro::Reg(RegOp::TestZero8(Reg8::B)));
                    micros.push(Micro::Ctl(CtlOp::AltIfZero));
                }
                self.program.push(
                    write_cycle(3, BusStep::Write(Half::Lo))
                        .setup(m(&[Micro::Data(DataOp::AddrFrom(Reg16::Hl))]))
                        .micros(micros),
                );
                if repeat {
                    self.push_repeat_cycle(BlockKind::Io);
                }
            }
            _ => {
                let wz = if dir == BlockDir::Inc {
                    WzOp::AddrPlus1
                } else {
                    WzOp::AddrMinus1
                };
                self.fetch_tail(1, MicroSeq::EMPTY);
                self.program.push(
                    read_cycle(3, BusStep::Read(Half::Lo))
                        .setup(m(&[Micro::Data(DataOp::AddrFrom(Reg16::Hl))])),
                );
                let mut micros = m(&[Micro::Alu(AluOp::BlockOut(dir))]);
                if repeat {
                    micros.push(Micro::Reg(RegOp::TestZero8(Reg8::B)));
                    micros.push(Micro::Ctl(CtlOp::AltIfZero));
                }
                self.program.push(
                    port_out_cycle()
                        .setup(m(&[
                            Micro::Reg(RegOp::Dec8Quiet(Reg8::B)),
                            Micro::Data(DataOp::AddrFrom(Reg16::Bc)),
                            Micro::Reg(RegOp::SetWz(wz)),
                        ]))
                        .micros(micros),
                );
                if repeat {
                    self.push_repeat_cycle(BlockKind::Io);
                }
            }
        }
    }

    /// The 5-T repeat cycle of the LDIR class. Selected out (replaced by
    /// the empty alternate tail) when the termination test fires. PC winds
    /// back over the two resolved bytes only, so a dead index prefix in
    /// front of the block opcode is not paid again on later iterations.
    fn push_repeat_cycle(&mut self, kind: BlockKind) {
        self.program.push(internal_cycle(5).micros(m(&[
            Micro::Reg(RegOp::RepeatInstr(2)),
            Micro::Alu(AluOp::BlockRepeatFlags(kind)),
            Micro::Reg(RegOp::SetWz(WzOp::PcPlus1)),
        ])));
    }

    #[allow(clippy::too_many_lines)]
    fn lower_indexed(&mut self, op: u8, ii: Reg16) {
        let x = op >> 6;
        let y = (op >> 3) & 7;
        let z = op & 7;
        let p = y >> 1;
        let q = y & 1;

        match (x, z) {
            (0, 1) if q == 1 => {
                let src = if p == 2 { ii } else { pair(p) };
                self.add16(ii, src);
            }
            (0, 1) if p == 2 => self.load16_imm(ii),
            (0, 2) if p == 2 && q == 0 => self.store16_ext(ii),
            (0, 2) if p == 2 => self.load16_ext(ii),
            (0, 3) if p == 2 => {
                let op = if q == 0 {
                    RegOp::Inc16(ii)
                } else {
                    RegOp::Dec16(ii)
                };
                self.fetch_tail(2, m(&[Micro::Reg(op)]));
            }
            (0, 4 | 5) if y == 6 => {
                let alu = if z == 4 {
                    AluOp::Inc8(Tgt8::Data)
                } else {
                    AluOp::Dec8(Tgt8::Data)
                };
                self.index_prelude();
                self.program.push(
                    read_cycle(4, BusStep::Read(Half::Lo))
                        .setup(m(&[Micro::Data(DataOp::AddrIndexDisp(ii))]))
                        .micros(m(&[Micro::Alu(alu)])),
                );
                self.program.push(write_cycle(3, BusStep::Write(Half::Lo)));
            }
            (0, 4 | 5) if y == 4 || y == 5 => {
                let reg = remap_half(if y == 4 { Reg8::H } else { Reg8::L }, ii);
                let alu = if z == 4 {
                    AluOp::Inc8(Tgt8::Reg(reg))
                } else {
                    AluOp::Dec8(Tgt8::Reg(reg))
                };
                self.fetch_tail(0, m(&[Micro::Alu(alu)]));
            }
            (0, 6) if y == 6 => {
                self.program.push(read_cycle(3, BusStep::ReadDisp));
                self.program.push(read_cycle(5, BusStep::ReadPc(Half::Lo)));
                self.program.push(
                    write_cycle(3, BusStep::Write(Half::Lo))
                        .setup(m(&[Micro::Data(DataOp::AddrIndexDisp(ii))])),
                );
            }
            (0, 6) if y == 4 || y == 5 => {
                let reg = remap_half(if y == 4 { Reg8::H } else { Reg8::L }, ii);
                self.program.push(
                    read_cycle(3, BusStep::ReadPc(Half::Lo))
                        .micros(m(&[Micro::Data(DataOp::FromData(reg))])),
                );
            }
            (1, _) => match (reg8(y), reg8(z)) {
                (None, None) => self.lower_main(op), // DD 76 is plain HALT
                (Some(dst), None) => {
                    self.index_prelude();
                    self.program.push(
                        read_cycle(3, BusStep::Read(Half::Lo))
                            .setup(m(&[Micro::Data(DataOp::AddrIndexDisp(ii))]))
                            .micros(m(&[Micro::Data(DataOp::FromData(dst))])),
                    );
                }
                (None, Some(src)) => {
                    self.index_prelude();
                    self.program.push(
                        write_cycle(3, BusStep::Write(Half::Lo)).setup(m(&[
                            Micro::Data(DataOp::AddrIndexDisp(ii)),
                            Micro::Data(DataOp::ToData(src)),
                        ])),
                    );
                }
                (Some(dst), Some(src)) => {
                    if !matches!(dst, Reg8::H | Reg8::L) && !matches!(src, Reg8::H | Reg8::L) {
                        self.lower_main(op);
                    } else {
                        self.fetch_tail(
                            0,
                            m(&[
                                Micro::Data(DataOp::ToData(remap_half(src, ii))),
                                Micro::Data(DataOp::FromData(remap_half(dst, ii))),
                            ]),
                        );
                    }
                }
            },
            (2, _) => {
                let alu = Alu8::from_bits(y);
                match reg8(z) {
                    None => {
                        self.index_prelude();
                        self.program.push(
                            read_cycle(3, BusStep::Read(Half::Lo))
                                .setup(m(&[Micro::Data(DataOp::AddrIndexDisp(ii))]))
                                .micros(m(&[Micro::Alu(AluOp::Op8(alu, Src8::Data))])),
                        );
                    }
                    Some(reg) if matches!(reg, Reg8::H | Reg8::L) => {
                        let reg = remap_half(reg, ii);
                        self.fetch_tail(0, m(&[Micro::Alu(AluOp::Op8(alu, Src8::Reg(reg)))]));
                    }
                    Some(_) => self.lower_main(op),
                }
            }
            _ => match op {
                0xE1 => {
                    self.program.push(pop_cycle(3, Half::Lo));
                    self.program.push(
                        pop_cycle(3, Half::Hi)
                            .micros(m(&[Micro::Data(DataOp::FromDataWide(ii))])),
                    );
                }
                0xE3 => self.exchange_stack_top(ii),
                0xE5 => {
                    self.fetch_tail(1, MicroSeq::EMPTY);
                    self.program.push(
                        push_cycle(Half::Hi)
                            .setup(m(&[Micro::Data(DataOp::ToDataWide(ii))])),
                    );
                    self.program.push(push_cycle(Half::Lo));
                }
                0xE9 => self.fetch_tail(
                    0,
                    m(&[
                        Micro::Data(DataOp::AddrFrom(ii)),
                        Micro::Data(DataOp::AddrTo(Reg16::Pc)),
                    ]),
                ),
                0xF9 => self.fetch_tail(
                    2,
                    m(&[
                        Micro::Data(DataOp::ToDataWide(ii)),
                        Micro::Data(DataOp::FromDataWide(Reg16::Sp)),
                    ]),
                ),
                _ => self.lower_main(op),
            },
        }
    }

    fn lower_index_cb(&mut self, op: u8, ii: Reg16) {
        let x = op >> 6;
        let y = (op >> 3) & 7;
        let z = op & 7;

        if x == 1 {
            self.program.push(
                read_cycle(4, BusStep::Read(Half::Lo))
                    .setup(m(&[Micro::Data(DataOp::AddrIndexDisp(ii))]))
                    .micros(m(&[Micro::Alu(AluOp::Bit {
                        bit: y,
                        src: Tgt8::Data,
                        xy_from_wz: true,
                    })])),
            );
            return;
        }

        let alu = match x {
            0 => AluOp::Rot(RotKind::from_bits(y), Tgt8::Data),
            2 => AluOp::ResBit(y, Tgt8::Data),
            _ => AluOp::SetBit(y, Tgt8::Data),
        };
        let mut micros = m(&[Micro::Alu(alu)]);
        // Undocumented forms copy the written value into a register.
        if let Some(reg) = reg8(z) {
            micros.push(Micro::Data(DataOp::FromData(reg)));
        }
        self.program.push(
            read_cycle(4, BusStep::Read(Half::Lo))
                .setup(m(&[Micro::Data(DataOp::AddrIndexDisp(ii))]))
                .micros(micros),
        );
        self.program.push(write_cycle(3, BusStep::Write(Half::Lo)));
    }
}
