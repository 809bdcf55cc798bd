//! Catalog construction: the opcode tables.
//!
//! Entries are interned by (group, mnemonic, undocumented) so every encoding
//! of one instruction form lands in the same descriptor as a variant. The
//! tables below follow the usual x/y/z/p/q decomposition of the opcode byte.

use std::collections::HashMap;

use super::{
    AddressingTag, Catalog, CycleKind, ExecutionTiming, InstructionDescriptor, Lookup,
    MachineCycleSpec, Operand, ParameterVariant,
};
use crate::microcode::Cond;
use crate::registers::{Reg8, Reg16};

fn fetch(t: u8) -> MachineCycleSpec {
    MachineCycleSpec::new(CycleKind::OpcodeFetch, t)
}

fn read(t: u8) -> MachineCycleSpec {
    MachineCycleSpec::new(CycleKind::MemRead, t)
}

fn write(t: u8) -> MachineCycleSpec {
    MachineCycleSpec::new(CycleKind::MemWrite, t)
}

fn spop(t: u8) -> MachineCycleSpec {
    MachineCycleSpec::new(CycleKind::StackRead, t)
}

fn spush(t: u8) -> MachineCycleSpec {
    MachineCycleSpec::new(CycleKind::StackWrite, t)
}

fn port_in() -> MachineCycleSpec {
    MachineCycleSpec::new(CycleKind::PortRead, 4)
}

fn port_out() -> MachineCycleSpec {
    MachineCycleSpec::new(CycleKind::PortWrite, 4)
}

fn ack(t: u8) -> MachineCycleSpec {
    MachineCycleSpec::new(CycleKind::IntAck, t)
}

fn internal(t: u8) -> MachineCycleSpec {
    MachineCycleSpec::new(CycleKind::Internal, t)
}

fn timing(total: u8, cycles: &[MachineCycleSpec]) -> ExecutionTiming {
    ExecutionTiming::new(total, cycles.to_vec(), None)
}

fn timing_if(total: u8, cycles: &[MachineCycleSpec], cond: &'static str) -> ExecutionTiming {
    ExecutionTiming::new(total, cycles.to_vec(), Some(cond))
}

/// One table slot before interning.
struct Entry {
    group: &'static str,
    mnemonic: &'static str,
    operands: [Option<Operand>; 3],
    size: u8,
    primary: ExecutionTiming,
    alternate: Option<ExecutionTiming>,
    undocumented: bool,
    internal: bool,
}

impl Entry {
    fn new(group: &'static str, mnemonic: &'static str, size: u8, primary: ExecutionTiming) -> Self {
        Self {
            group,
            mnemonic,
            operands: [None; 3],
            size,
            primary,
            alternate: None,
            undocumented: false,
            internal: false,
        }
    }

    fn op1(mut self, a: Operand) -> Self {
        self.operands = [Some(a), None, None];
        self
    }

    fn op2(mut self, a: Operand, b: Operand) -> Self {
        self.operands = [Some(a), Some(b), None];
        self
    }

    fn alt(mut self, alternate: ExecutionTiming) -> Self {
        self.alternate = Some(alternate);
        self
    }

    fn undoc(mut self) -> Self {
        self.undocumented = true;
        self
    }

    fn internal(mut self) -> Self {
        self.internal = true;
        self
    }
}

struct Builder {
    descriptors: Vec<InstructionDescriptor>,
    index: HashMap<(&'static str, &'static str, bool), u16>,
}

impl Builder {
    fn new() -> Self {
        Self {
            descriptors: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn add(&mut self, entry: Entry) -> Lookup {
        let key = (entry.group, entry.mnemonic, entry.undocumented);
        let descriptor = *self.index.entry(key).or_insert_with(|| {
            let mut addressing: [Option<AddressingTag>; 3] = [None; 3];
            for (slot, operand) in addressing.iter_mut().zip(entry.operands.iter()) {
                *slot = operand.as_ref().map(Operand::tag);
            }
            self.descriptors.push(InstructionDescriptor {
                group: entry.group,
                mnemonic: entry.mnemonic,
                addressing,
                variants: Vec::new(),
                undocumented: entry.undocumented,
                internal: entry.internal,
            });
            u16::try_from(self.descriptors.len() - 1).unwrap_or_else(|_| unreachable!())
        });
        let variants = &mut self.descriptors[descriptor as usize].variants;
        variants.push(ParameterVariant {
            operands: entry.operands,
            size: entry.size,
            primary: entry.primary,
            alternate: entry.alternate,
        });
        Lookup {
            descriptor,
            variant: u16::try_from(variants.len() - 1).unwrap_or_else(|_| unreachable!()),
        }
    }
}

/// r[z] encoding: index 6 is the (HL) slot.
const R8: [Option<Reg8>; 8] = [
    Some(Reg8::B),
    Some(Reg8::C),
    Some(Reg8::D),
    Some(Reg8::E),
    Some(Reg8::H),
    Some(Reg8::L),
    None,
    Some(Reg8::A),
];

fn rp(p: u8) -> Reg16 {
    match p {
        0 => Reg16::Bc,
        1 => Reg16::De,
        2 => Reg16::Hl,
        _ => Reg16::Sp,
    }
}

fn rp_af(p: u8) -> Reg16 {
    match p {
        0 => Reg16::Bc,
        1 => Reg16::De,
        2 => Reg16::Hl,
        _ => Reg16::Af,
    }
}

const ALU_R: [&str; 8] = [
    "ADD A, r", "ADC A, r", "SUB r", "SBC A, r", "AND r", "XOR r", "OR r", "CP r",
];
const ALU_HL: [&str; 8] = [
    "ADD A, (HL)",
    "ADC A, (HL)",
    "SUB (HL)",
    "SBC A, (HL)",
    "AND (HL)",
    "XOR (HL)",
    "OR (HL)",
    "CP (HL)",
];
const ALU_N: [&str; 8] = [
    "ADD A, n", "ADC A, n", "SUB n", "SBC A, n", "AND n", "XOR n", "OR n", "CP n",
];
const ALU_IDX: [&str; 8] = [
    "ADD A, (ii+d)",
    "ADC A, (ii+d)",
    "SUB (ii+d)",
    "SBC A, (ii+d)",
    "AND (ii+d)",
    "XOR (ii+d)",
    "OR (ii+d)",
    "CP (ii+d)",
];

const ROT_R: [&str; 8] = [
    "RLC r", "RRC r", "RL r", "RR r", "SLA r", "SRA r", "SLL r", "SRL r",
];
const ROT_HL: [&str; 8] = [
    "RLC (HL)",
    "RRC (HL)",
    "RL (HL)",
    "RR (HL)",
    "SLA (HL)",
    "SRA (HL)",
    "SLL (HL)",
    "SRL (HL)",
];
const ROT_IDX: [&str; 8] = [
    "RLC (ii+d)",
    "RRC (ii+d)",
    "RL (ii+d)",
    "RR (ii+d)",
    "SLA (ii+d)",
    "SRA (ii+d)",
    "SLL (ii+d)",
    "SRL (ii+d)",
];

fn main_entry(op: u8) -> Option<Entry> {
    let x = op >> 6;
    let y = (op >> 3) & 7;
    let z = op & 7;
    let p = y >> 1;
    let q = y & 1;

    let e = match (x, z) {
        (0, 0) => match y {
            0 => Entry::new("control", "NOP", 1, timing(4, &[fetch(4)])),
            1 => Entry::new("exchange", "EX AF, AF'", 1, timing(4, &[fetch(4)]))
                .op2(Operand::Pair(Reg16::Af), Operand::ShadowAf),
            2 => Entry::new(
                "jump",
                "DJNZ d",
                2,
                timing_if(13, &[fetch(5), read(3), internal(5)], "B != 0"),
            )
            .op1(Operand::Rel)
            .alt(timing(8, &[fetch(5), read(3)])),
            3 => Entry::new("jump", "JR d", 2, timing(12, &[fetch(4), read(3), internal(5)]))
                .op1(Operand::Rel),
            _ => Entry::new(
                "jump",
                "JR cc, d",
                2,
                timing_if(12, &[fetch(4), read(3), internal(5)], "condition met"),
            )
            .op2(Operand::Cond(Cond::from_cc(y - 4)), Operand::Rel)
            .alt(timing(7, &[fetch(4), read(3)])),
        },
        (0, 1) if q == 0 => Entry::new(
            "load16",
            "LD rr, nn",
            3,
            timing(10, &[fetch(4), read(3), read(3)]),
        )
        .op2(Operand::Pair(rp(p)), Operand::Imm16),
        (0, 1) => Entry::new(
            "alu16",
            "ADD HL, rr",
            1,
            timing(11, &[fetch(4), internal(4), internal(3)]),
        )
        .op2(Operand::Pair(Reg16::Hl), Operand::Pair(rp(p))),
        (0, 2) => match (q, p) {
            (0, 0 | 1) => Entry::new("load8", "LD (rr), A", 1, timing(7, &[fetch(4), write(3)]))
                .op2(Operand::Indirect(rp(p)), Operand::Reg(Reg8::A)),
            (0, 2) => Entry::new(
                "load16",
                "LD (nn), HL",
                3,
                timing(16, &[fetch(4), read(3), read(3), write(3), write(3)]),
            )
            .op2(Operand::Addr, Operand::Pair(Reg16::Hl)),
            (0, _) => Entry::new(
                "load8",
                "LD (nn), A",
                3,
                timing(13, &[fetch(4), read(3), read(3), write(3)]),
            )
            .op2(Operand::Addr, Operand::Reg(Reg8::A)),
            (_, 0 | 1) => Entry::new("load8", "LD A, (rr)", 1, timing(7, &[fetch(4), read(3)]))
                .op2(Operand::Reg(Reg8::A), Operand::Indirect(rp(p))),
            (_, 2) => Entry::new(
                "load16",
                "LD HL, (nn)",
                3,
                timing(16, &[fetch(4), read(3), read(3), read(3), read(3)]),
            )
            .op2(Operand::Pair(Reg16::Hl), Operand::Addr),
            _ => Entry::new(
                "load8",
                "LD A, (nn)",
                3,
                timing(13, &[fetch(4), read(3), read(3), read(3)]),
            )
            .op2(Operand::Reg(Reg8::A), Operand::Addr),
        },
        (0, 3) if q == 0 => Entry::new("alu16", "INC rr", 1, timing(6, &[fetch(6)]))
            .op1(Operand::Pair(rp(p))),
        (0, 3) => Entry::new("alu16", "DEC rr", 1, timing(6, &[fetch(6)]))
            .op1(Operand::Pair(rp(p))),
        (0, 4) => match R8[y as usize] {
            Some(reg) => {
                Entry::new("alu8", "INC r", 1, timing(4, &[fetch(4)])).op1(Operand::Reg(reg))
            }
            None => Entry::new("alu8", "INC (HL)", 1, timing(11, &[fetch(4), read(4), write(3)]))
                .op1(Operand::Indirect(Reg16::Hl)),
        },
        (0, 5) => match R8[y as usize] {
            Some(reg) => {
                Entry::new("alu8", "DEC r", 1, timing(4, &[fetch(4)])).op1(Operand::Reg(reg))
            }
            None => Entry::new("alu8", "DEC (HL)", 1, timing(11, &[fetch(4), read(4), write(3)]))
                .op1(Operand::Indirect(Reg16::Hl)),
        },
        (0, 6) => match R8[y as usize] {
            Some(reg) => Entry::new("load8", "LD r, n", 2, timing(7, &[fetch(4), read(3)]))
                .op2(Operand::Reg(reg), Operand::Imm8),
            None => Entry::new("load8", "LD (HL), n", 2, timing(10, &[fetch(4), read(3), write(3)]))
                .op2(Operand::Indirect(Reg16::Hl), Operand::Imm8),
        },
        (0, 7) => {
            let mnemonic = match y {
                0 => "RLCA",
                1 => "RRCA",
                2 => "RLA",
                3 => "RRA",
                4 => "DAA",
                5 => "CPL",
                6 => "SCF",
                _ => "CCF",
            };
            let group = if y < 4 { "rotshift" } else { "alu8" };
            Entry::new(group, mnemonic, 1, timing(4, &[fetch(4)]))
        }
        (1, _) => match (R8[y as usize], R8[z as usize]) {
            (None, None) => Entry::new("control", "HALT", 1, timing(4, &[fetch(4)])),
            (Some(dst), Some(src)) => Entry::new("load8", "LD r, r'", 1, timing(4, &[fetch(4)]))
                .op2(Operand::Reg(dst), Operand::Reg(src)),
            (Some(dst), None) => Entry::new("load8", "LD r, (HL)", 1, timing(7, &[fetch(4), read(3)]))
                .op2(Operand::Reg(dst), Operand::Indirect(Reg16::Hl)),
            (None, Some(src)) => Entry::new("load8", "LD (HL), r", 1, timing(7, &[fetch(4), write(3)]))
                .op2(Operand::Indirect(Reg16::Hl), Operand::Reg(src)),
        },
        (2, _) => match R8[z as usize] {
            Some(reg) => Entry::new("alu8", ALU_R[y as usize], 1, timing(4, &[fetch(4)]))
                .op1(Operand::Reg(reg)),
            None => Entry::new("alu8", ALU_HL[y as usize], 1, timing(7, &[fetch(4), read(3)]))
                .op1(Operand::Indirect(Reg16::Hl)),
        },
        (3, 0) => Entry::new(
            "call",
            "RET cc",
            1,
            timing_if(11, &[fetch(5), spop(3), spop(3)], "condition met"),
        )
        .op1(Operand::Cond(Cond::from_cc(y)))
        .alt(timing(5, &[fetch(5)])),
        (3, 1) if q == 0 => Entry::new(
            "stack",
            "POP rr",
            1,
            timing(10, &[fetch(4), spop(3), spop(3)]),
        )
        .op1(Operand::Pair(rp_af(p))),
        (3, 1) => match p {
            0 => Entry::new("call", "RET", 1, timing(10, &[fetch(4), spop(3), spop(3)])),
            1 => Entry::new("exchange", "EXX", 1, timing(4, &[fetch(4)])),
            2 => Entry::new("jump", "JP (HL)", 1, timing(4, &[fetch(4)]))
                .op1(Operand::Indirect(Reg16::Hl)),
            _ => Entry::new("load16", "LD SP, HL", 1, timing(6, &[fetch(6)]))
                .op2(Operand::Pair(Reg16::Sp), Operand::Pair(Reg16::Hl)),
        },
        (3, 2) => Entry::new(
            "jump",
            "JP cc, nn",
            3,
            timing(10, &[fetch(4), read(3), read(3)]),
        )
        .op2(Operand::Cond(Cond::from_cc(y)), Operand::Imm16),
        (3, 3) => match y {
            0 => Entry::new("jump", "JP nn", 3, timing(10, &[fetch(4), read(3), read(3)]))
                .op1(Operand::Imm16),
            2 => Entry::new("io", "OUT (n), A", 2, timing(11, &[fetch(4), read(3), port_out()]))
                .op2(Operand::PortImm, Operand::Reg(Reg8::A)),
            3 => Entry::new("io", "IN A, (n)", 2, timing(11, &[fetch(4), read(3), port_in()]))
                .op2(Operand::Reg(Reg8::A), Operand::PortImm),
            4 => Entry::new(
                "exchange",
                "EX (SP), HL",
                1,
                timing(19, &[fetch(4), spop(3), spop(4), spush(3), spush(5)]),
            )
            .op2(Operand::Indirect(Reg16::Sp), Operand::Pair(Reg16::Hl)),
            5 => Entry::new("exchange", "EX DE, HL", 1, timing(4, &[fetch(4)]))
                .op2(Operand::Pair(Reg16::De), Operand::Pair(Reg16::Hl)),
            6 => Entry::new("interrupt", "DI", 1, timing(4, &[fetch(4)])),
            7 => Entry::new("interrupt", "EI", 1, timing(4, &[fetch(4)])),
            _ => return None, // 0xCB prefix
        },
        (3, 4) => Entry::new(
            "call",
            "CALL cc, nn",
            3,
            timing_if(
                17,
                &[fetch(4), read(3), read(4), spush(3), spush(3)],
                "condition met",
            ),
        )
        .op2(Operand::Cond(Cond::from_cc(y)), Operand::Imm16)
        .alt(timing(10, &[fetch(4), read(3), read(3)])),
        (3, 5) if q == 0 => Entry::new(
            "stack",
            "PUSH rr",
            1,
            timing(11, &[fetch(5), spush(3), spush(3)]),
        )
        .op1(Operand::Pair(rp_af(p))),
        (3, 5) => match p {
            0 => Entry::new(
                "call",
                "CALL nn",
                3,
                timing(17, &[fetch(4), read(3), read(4), spush(3), spush(3)]),
            )
            .op1(Operand::Imm16),
            _ => return None, // 0xDD / 0xED / 0xFD prefixes
        },
        (3, 6) => Entry::new("alu8", ALU_N[y as usize], 2, timing(7, &[fetch(4), read(3)]))
            .op1(Operand::Imm8),
        (3, 7) => Entry::new(
            "call",
            "RST p",
            1,
            timing(11, &[fetch(5), spush(3), spush(3)]),
        )
        .op1(Operand::Rst(y * 8)),
        _ => unreachable!(),
    };
    Some(e)
}

fn main_table(b: &mut Builder) -> [Lookup; 256] {
    let mut table = [Lookup {
        descriptor: 0,
        variant: 0,
    }; 256];
    for op in 0..=255u8 {
        if let Some(entry) = main_entry(op) {
            table[op as usize] = b.add(entry);
        }
    }
    // Prefix byte slots are never reached through resolution; alias NOP.
    for prefix in [0xCBusize, 0xDD, 0xED, 0xFD] {
        table[prefix] = table[0];
    }
    table
}

fn cb_table(b: &mut Builder) -> [Lookup; 256] {
    let mut table = [Lookup {
        descriptor: 0,
        variant: 0,
    }; 256];
    for op in 0..=255u8 {
        let x = op >> 6;
        let y = (op >> 3) & 7;
        let z = op & 7;
        let entry = match (x, R8[z as usize]) {
            (0, Some(reg)) => {
                let e = Entry::new("rotshift", ROT_R[y as usize], 2, timing(8, &[fetch(4), fetch(4)]))
                    .op1(Operand::Reg(reg));
                if y == 6 { e.undoc() } else { e }
            }
            (0, None) => {
                let e = Entry::new(
                    "rotshift",
                    ROT_HL[y as usize],
                    2,
                    timing(15, &[fetch(4), fetch(4), read(4), write(3)]),
                )
                .op1(Operand::Indirect(Reg16::Hl));
                if y == 6 { e.undoc() } else { e }
            }
            (1, Some(reg)) => Entry::new("bitops", "BIT b, r", 2, timing(8, &[fetch(4), fetch(4)]))
                .op2(Operand::Bit(y), Operand::Reg(reg)),
            (1, None) => Entry::new(
                "bitops",
                "BIT b, (HL)",
                2,
                timing(12, &[fetch(4), fetch(4), read(4)]),
            )
            .op2(Operand::Bit(y), Operand::Indirect(Reg16::Hl)),
            (2, Some(reg)) => Entry::new("bitops", "RES b, r", 2, timing(8, &[fetch(4), fetch(4)]))
                .op2(Operand::Bit(y), Operand::Reg(reg)),
            (2, None) => Entry::new(
                "bitops",
                "RES b, (HL)",
                2,
                timing(15, &[fetch(4), fetch(4), read(4), write(3)]),
            )
            .op2(Operand::Bit(y), Operand::Indirect(Reg16::Hl)),
            (_, Some(reg)) => Entry::new("bitops", "SET b, r", 2, timing(8, &[fetch(4), fetch(4)]))
                .op2(Operand::Bit(y), Operand::Reg(reg)),
            (_, None) => Entry::new(
                "bitops",
                "SET b, (HL)",
                2,
                timing(15, &[fetch(4), fetch(4), read(4), write(3)]),
            )
            .op2(Operand::Bit(y), Operand::Indirect(Reg16::Hl)),
        };
        table[op as usize] = b.add(entry);
    }
    table
}

fn ed_entry(op: u8) -> Entry {
    let x = op >> 6;
    let y = (op >> 3) & 7;
    let z = op & 7;
    let p = y >> 1;
    let q = y & 1;

    let hole = || {
        Entry::new("control", "NOP*", 2, timing(8, &[fetch(4), fetch(4)])).undoc()
    };

    match (x, z) {
        (1, 0) => match R8[y as usize] {
            Some(reg) => Entry::new(
                "io",
                "IN r, (C)",
                2,
                timing(12, &[fetch(4), fetch(4), port_in()]),
            )
            .op2(Operand::Reg(reg), Operand::PortC),
            None => Entry::new(
                "io",
                "IN (C)",
                2,
                timing(12, &[fetch(4), fetch(4), port_in()]),
            )
            .op1(Operand::PortC)
            .undoc(),
        },
        (1, 1) => match R8[y as usize] {
            Some(reg) => Entry::new(
                "io",
                "OUT (C), r",
                2,
                timing(12, &[fetch(4), fetch(4), port_out()]),
            )
            .op2(Operand::PortC, Operand::Reg(reg)),
            None => Entry::new(
                "io",
                "OUT (C), 0",
                2,
                timing(12, &[fetch(4), fetch(4), port_out()]),
            )
            .op1(Operand::PortC)
            .undoc(),
        },
        (1, 2) if q == 0 => Entry::new(
            "alu16",
            "SBC HL, rr",
            2,
            timing(15, &[fetch(4), fetch(4), internal(4), internal(3)]),
        )
        .op2(Operand::Pair(Reg16::Hl), Operand::Pair(rp(p))),
        (1, 2) => Entry::new(
            "alu16",
            "ADC HL, rr",
            2,
            timing(15, &[fetch(4), fetch(4), internal(4), internal(3)]),
        )
        .op2(Operand::Pair(Reg16::Hl), Operand::Pair(rp(p))),
        (1, 3) if q == 0 => Entry::new(
            "load16",
            "LD (nn), rr",
            4,
            timing(20, &[fetch(4), fetch(4), read(3), read(3), write(3), write(3)]),
        )
        .op2(Operand::Addr, Operand::Pair(rp(p))),
        (1, 3) => Entry::new(
            "load16",
            "LD rr, (nn)",
            4,
            timing(20, &[fetch(4), fetch(4), read(3), read(3), read(3), read(3)]),
        )
        .op2(Operand::Pair(rp(p)), Operand::Addr),
        (1, 4) => {
            let e = Entry::new("alu8", "NEG", 2, timing(8, &[fetch(4), fetch(4)]));
            if y == 0 { e } else { e.undoc() }
        }
        (1, 5) => {
            let mnemonic = if y == 1 { "RETI" } else { "RETN" };
            let e = Entry::new(
                "interrupt",
                mnemonic,
                2,
                timing(14, &[fetch(4), fetch(4), spop(3), spop(3)]),
            );
            if y <= 1 { e } else { e.undoc() }
        }
        (1, 6) => {
            let (mnemonic, documented) = match y {
                0 => ("IM 0", true),
                2 => ("IM 1", true),
                3 => ("IM 2", true),
                1 | 4 | 5 => ("IM 0", false),
                6 => ("IM 1", false),
                _ => ("IM 2", false),
            };
            let e = Entry::new("interrupt", mnemonic, 2, timing(8, &[fetch(4), fetch(4)]));
            if documented { e } else { e.undoc() }
        }
        (1, 7) => match y {
            0 => Entry::new("load8", "LD I, A", 2, timing(9, &[fetch(4), fetch(5)]))
                .op2(Operand::Reg(Reg8::I), Operand::Reg(Reg8::A)),
            1 => Entry::new("load8", "LD R, A", 2, timing(9, &[fetch(4), fetch(5)]))
                .op2(Operand::Reg(Reg8::R), Operand::Reg(Reg8::A)),
            2 => Entry::new("load8", "LD A, I", 2, timing(9, &[fetch(4), fetch(5)]))
                .op2(Operand::Reg(Reg8::A), Operand::Reg(Reg8::I)),
            3 => Entry::new("load8", "LD A, R", 2, timing(9, &[fetch(4), fetch(5)]))
                .op2(Operand::Reg(Reg8::A), Operand::Reg(Reg8::R)),
            4 => Entry::new(
                "rotshift",
                "RRD",
                2,
                timing(18, &[fetch(4), fetch(4), read(3), internal(4), write(3)]),
            ),
            5 => Entry::new(
                "rotshift",
                "RLD",
                2,
                timing(18, &[fetch(4), fetch(4), read(3), internal(4), write(3)]),
            ),
            _ => hole(),
        },
        (2, 0..=3) if y >= 4 => {
            let repeat = y >= 6;
            match (z, repeat) {
                (0, false) => Entry::new(
                    "block",
                    if y == 4 { "LDI" } else { "LDD" },
                    2,
                    timing(16, &[fetch(4), fetch(4), read(3), write(5)]),
                ),
                (0, true) => Entry::new(
                    "block",
                    if y == 6 { "LDIR" } else { "LDDR" },
                    2,
                    timing_if(
                        21,
                        &[fetch(4), fetch(4), read(3), write(5), internal(5)],
                        "BC != 0",
                    ),
                )
                .alt(timing(16, &[fetch(4), fetch(4), read(3), write(5)])),
                (1, false) => Entry::new(
                    "block",
                    if y == 4 { "CPI" } else { "CPD" },
                    2,
                    timing(16, &[fetch(4), fetch(4), read(3), internal(5)]),
                ),
                (1, true) => Entry::new(
                    "block",
                    if y == 6 { "CPIR" } else { "CPDR" },
                    2,
                    timing_if(
                        21,
                        &[fetch(4), fetch(4), read(3), internal(5), internal(5)],
                        "BC != 0 and A != (HL)",
                    ),
                )
                .alt(timing(16, &[fetch(4), fetch(4), read(3), internal(5)])),
                (2, false) => Entry::new(
                    "block",
                    if y == 4 { "INI" } else { "IND" },
                    2,
                    timing(16, &[fetch(4), fetch(5), port_in(), write(3)]),
                ),
                (2, true) => Entry::new(
                    "block",
                    if y == 6 { "INIR" } else { "INDR" },
                    2,
                    timing_if(
                        21,
                        &[fetch(4), fetch(5), port_in(), write(3), internal(5)],
                        "B != 0",
                    ),
                )
                .alt(timing(16, &[fetch(4), fetch(5), port_in(), write(3)])),
                (_, false) => Entry::new(
                    "block",
                    if y == 4 { "OUTI" } else { "OUTD" },
                    2,
                    timing(16, &[fetch(4), fetch(5), read(3), port_out()]),
                ),
                (_, true) => Entry::new(
                    "block",
                    if y == 6 { "OTIR" } else { "OTDR" },
                    2,
                    timing_if(
                        21,
                        &[fetch(4), fetch(5), read(3), port_out(), internal(5)],
                        "B != 0",
                    ),
                )
                .alt(timing(16, &[fetch(4), fetch(5), read(3), port_out()])),
            }
        }
        _ => hole(),
    }
}

fn ed_table(b: &mut Builder) -> [Lookup; 256] {
    let mut table = [Lookup {
        descriptor: 0,
        variant: 0,
    }; 256];
    for op in 0..=255u8 {
        table[op as usize] = b.add(ed_entry(op));
    }
    table
}

/// The IX/IY half-register standing in for H or L under a DD/FD prefix.
fn index_half(index: Reg16, reg: Reg8) -> Reg8 {
    match (index, reg) {
        (Reg16::Ix, Reg8::H) => Reg8::IxH,
        (Reg16::Ix, Reg8::L) => Reg8::IxL,
        (Reg16::Iy, Reg8::H) => Reg8::IyH,
        (Reg16::Iy, Reg8::L) => Reg8::IyL,
        _ => reg,
    }
}

fn indexed_entry(op: u8, index: Reg16) -> Option<Entry> {
    let x = op >> 6;
    let y = (op >> 3) & 7;
    let z = op & 7;
    let p = y >> 1;
    let q = y & 1;

    let e = match (x, z) {
        (0, 1) if q == 1 => {
            let src = if p == 2 { index } else { rp(p) };
            Entry::new(
                "alu16",
                "ADD ii, rr",
                2,
                timing(15, &[fetch(4), fetch(4), internal(4), internal(3)]),
            )
            .op2(Operand::Pair(index), Operand::Pair(src))
        }
        (0, 1) if p == 2 => Entry::new(
            "load16",
            "LD ii, nn",
            4,
            timing(14, &[fetch(4), fetch(4), read(3), read(3)]),
        )
        .op2(Operand::Pair(index), Operand::Imm16),
        (0, 2) if p == 2 && q == 0 => Entry::new(
            "load16",
            "LD (nn), ii",
            4,
            timing(20, &[fetch(4), fetch(4), read(3), read(3), write(3), write(3)]),
        )
        .op2(Operand::Addr, Operand::Pair(index)),
        (0, 2) if p == 2 => Entry::new(
            "load16",
            "LD ii, (nn)",
            4,
            timing(20, &[fetch(4), fetch(4), read(3), read(3), read(3), read(3)]),
        )
        .op2(Operand::Pair(index), Operand::Addr),
        (0, 3) if p == 2 => {
            let mnemonic = if q == 0 { "INC ii" } else { "DEC ii" };
            Entry::new("alu16", mnemonic, 2, timing(10, &[fetch(4), fetch(6)]))
                .op1(Operand::Pair(index))
        }
        (0, 4 | 5) if y == 6 => {
            let mnemonic = if z == 4 { "INC (ii+d)" } else { "DEC (ii+d)" };
            Entry::new(
                "alu8",
                mnemonic,
                3,
                timing(23, &[fetch(4), fetch(4), read(3), internal(5), read(4), write(3)]),
            )
            .op1(Operand::Indexed(index))
        }
        (0, 4 | 5) if y == 4 || y == 5 => {
            let mnemonic = if z == 4 { "INC r" } else { "DEC r" };
            Entry::new("alu8", mnemonic, 2, timing(8, &[fetch(4), fetch(4)]))
                .op1(Operand::Reg(index_half(index, R8[y as usize]?)))
                .undoc()
        }
        (0, 6) if y == 6 => Entry::new(
            "load8",
            "LD (ii+d), n",
            4,
            timing(19, &[fetch(4), fetch(4), read(3), read(5), write(3)]),
        )
        .op2(Operand::Indexed(index), Operand::Imm8),
        (0, 6) if y == 4 || y == 5 => Entry::new(
            "load8",
            "LD r, n",
            3,
            timing(11, &[fetch(4), fetch(4), read(3)]),
        )
        .op2(
            Operand::Reg(index_half(index, R8[y as usize]?)),
            Operand::Imm8,
        )
        .undoc(),
        (1, _) => {
            if y == 6 && z == 6 {
                return None; // DD 76 is plain HALT
            }
            match (R8[y as usize], R8[z as usize]) {
                (Some(dst), None) => Entry::new(
                    "load8",
                    "LD r, (ii+d)",
                    3,
                    timing(19, &[fetch(4), fetch(4), read(3), internal(5), read(3)]),
                )
                .op2(Operand::Reg(dst), Operand::Indexed(index)),
                (None, Some(src)) => Entry::new(
                    "load8",
                    "LD (ii+d), r",
                    3,
                    timing(19, &[fetch(4), fetch(4), read(3), internal(5), write(3)]),
                )
                .op2(Operand::Indexed(index), Operand::Reg(src)),
                (Some(dst), Some(src)) => {
                    if !matches!(dst, Reg8::H | Reg8::L) && !matches!(src, Reg8::H | Reg8::L) {
                        return None; // no H/L involved: plain alias
                    }
                    Entry::new("load8", "LD r, r'", 2, timing(8, &[fetch(4), fetch(4)]))
                        .op2(
                            Operand::Reg(index_half(index, dst)),
                            Operand::Reg(index_half(index, src)),
                        )
                        .undoc()
                }
                (None, None) => unreachable!(),
            }
        }
        (2, _) => match R8[z as usize] {
            None => Entry::new(
                "alu8",
                ALU_IDX[y as usize],
                3,
                timing(19, &[fetch(4), fetch(4), read(3), internal(5), read(3)]),
            )
            .op1(Operand::Indexed(index)),
            Some(reg) if matches!(reg, Reg8::H | Reg8::L) => {
                Entry::new("alu8", ALU_R[y as usize], 2, timing(8, &[fetch(4), fetch(4)]))
                    .op1(Operand::Reg(index_half(index, reg)))
                    .undoc()
            }
            Some(_) => return None,
        },
        (3, 1) if op == 0xE1 => Entry::new(
            "stack",
            "POP ii",
            2,
            timing(14, &[fetch(4), fetch(4), spop(3), spop(3)]),
        )
        .op1(Operand::Pair(index)),
        (3, 1) if op == 0xE9 => Entry::new("jump", "JP (ii)", 2, timing(8, &[fetch(4), fetch(4)]))
            .op1(Operand::Indirect(index)),
        (3, 1) if op == 0xF9 => Entry::new("load16", "LD SP, ii", 2, timing(10, &[fetch(4), fetch(6)]))
            .op2(Operand::Pair(Reg16::Sp), Operand::Pair(index)),
        (3, 3) if op == 0xE3 => Entry::new(
            "exchange",
            "EX (SP), ii",
            2,
            timing(23, &[fetch(4), fetch(4), spop(3), spop(4), spush(3), spush(5)]),
        )
        .op2(Operand::Indirect(Reg16::Sp), Operand::Pair(index)),
        (3, 5) if op == 0xE5 => Entry::new(
            "stack",
            "PUSH ii",
            2,
            timing(15, &[fetch(4), fetch(5), spush(3), spush(3)]),
        )
        .op1(Operand::Pair(index)),
        _ => return None,
    };
    Some(e)
}

fn indexed_table(b: &mut Builder, main: &[Lookup; 256], index: Reg16) -> [Lookup; 256] {
    let mut table = *main;
    for op in 0..=255u8 {
        if let Some(entry) = indexed_entry(op, index) {
            table[op as usize] = b.add(entry);
        }
    }
    table
}

fn indexed_cb_table(b: &mut Builder, index: Reg16) -> [Lookup; 256] {
    let mut table = [Lookup {
        descriptor: 0,
        variant: 0,
    }; 256];
    for op in 0..=255u8 {
        let x = op >> 6;
        let y = (op >> 3) & 7;
        let z = op & 7;
        let copy = R8[z as usize];
        let rw = timing(
            23,
            &[fetch(4), fetch(4), read(3), read(5), read(4), write(3)],
        );
        let entry = match x {
            0 => {
                let e = Entry::new("rotshift", ROT_IDX[y as usize], 4, rw)
                    .op1(Operand::Indexed(index));
                // Register-copy forms and SLL are undocumented.
                if copy.is_some() || y == 6 { e.undoc() } else { e }
            }
            1 => {
                let e = Entry::new(
                    "bitops",
                    "BIT b, (ii+d)",
                    4,
                    timing(20, &[fetch(4), fetch(4), read(3), read(5), read(4)]),
                )
                .op2(Operand::Bit(y), Operand::Indexed(index));
                if copy.is_some() { e.undoc() } else { e }
            }
            2 => {
                let e = Entry::new("bitops", "RES b, (ii+d)", 4, rw)
                    .op2(Operand::Bit(y), Operand::Indexed(index));
                if copy.is_some() { e.undoc() } else { e }
            }
            _ => {
                let e = Entry::new("bitops", "SET b, (ii+d)", 4, rw)
                    .op2(Operand::Bit(y), Operand::Indexed(index));
                if copy.is_some() { e.undoc() } else { e }
            }
        };
        table[op as usize] = b.add(entry);
    }
    table
}

impl Catalog {
    pub(super) fn build() -> Self {
        let mut b = Builder::new();
        let main = main_table(&mut b);
        let cb = cb_table(&mut b);
        let ed = ed_table(&mut b);
        let dd = indexed_table(&mut b, &main, Reg16::Ix);
        let fd = indexed_table(&mut b, &main, Reg16::Iy);
        let ddcb = indexed_cb_table(&mut b, Reg16::Ix);
        let fdcb = indexed_cb_table(&mut b, Reg16::Iy);

        // Controller-injected pseudo-instructions. Size 0: nothing is
        // fetched from the instruction stream.
        let reset = b.add(
            Entry::new("interrupt", "*RESET", 0, timing(3, &[internal(3)])).internal(),
        );
        let nmi = b.add(
            Entry::new(
                "interrupt",
                "*NMI",
                0,
                timing(11, &[fetch(5), spush(3), spush(3)]),
            )
            .internal(),
        );
        let int_mode0 = b.add(
            Entry::new("interrupt", "*INT0", 0, timing(6, &[ack(6)])).internal(),
        );
        let int_mode1 = b.add(
            Entry::new(
                "interrupt",
                "*INT1",
                0,
                timing(13, &[ack(7), spush(3), spush(3)]),
            )
            .internal(),
        );
        let int_mode2 = b.add(
            Entry::new(
                "interrupt",
                "*INT2",
                0,
                timing(19, &[ack(7), spush(3), spush(3), read(3), read(3)]),
            )
            .internal(),
        );

        Self {
            descriptors: b.descriptors,
            main,
            cb,
            ed,
            dd,
            fd,
            ddcb,
            fdcb,
            reset,
            nmi,
            int_mode0,
            int_mode1,
            int_mode2,
        }
    }
}
