//! The static instruction catalog.
//!
//! One immutable table, built on first use and addressed by index for the
//! rest of the process lifetime. Descriptors group an instruction form
//! ("LD r, r'"); parameter variants carry the concrete operands and the
//! machine-cycle timings. Nothing in here is ever mutated at runtime -
//! alternate-timing selection is the scheduler's job.

use std::sync::LazyLock;

use crate::decoder::PrefixState;
use crate::microcode::Cond;
use crate::registers::{Reg8, Reg16};

mod build;

/// Machine cycle type, asserted on the control bus for the whole cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    /// M1: opcode fetch with refresh.
    OpcodeFetch,
    MemRead,
    MemWrite,
    StackRead,
    StackWrite,
    PortRead,
    PortWrite,
    /// M1 with IORQ: interrupt acknowledge.
    IntAck,
    /// No bus transaction.
    Internal,
}

impl CycleKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::OpcodeFetch => "opcode-fetch",
            Self::MemRead => "mem-read",
            Self::MemWrite => "mem-write",
            Self::StackRead => "stack-read",
            Self::StackWrite => "stack-write",
            Self::PortRead => "port-read",
            Self::PortWrite => "port-write",
            Self::IntAck => "int-ack",
            Self::Internal => "internal",
        }
    }
}

/// One machine cycle: its type and T-state count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineCycleSpec {
    pub kind: CycleKind,
    pub t_states: u8,
}

impl MachineCycleSpec {
    /// A zero-length machine cycle is a programming error.
    #[must_use]
    pub fn new(kind: CycleKind, t_states: u8) -> Self {
        assert!(t_states >= 1, "machine cycle must span at least one T-state");
        Self { kind, t_states }
    }

    /// Index of the last half-T-state of this cycle.
    #[must_use]
    pub const fn last_half_state(&self) -> u8 {
        2 * self.t_states - 1
    }
}

/// An ordered list of machine cycles with its declared total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionTiming {
    pub cycles: Vec<MachineCycleSpec>,
    pub total_t_states: u8,
    /// Human-readable condition under which this timing applies.
    pub condition: Option<&'static str>,
}

impl ExecutionTiming {
    /// Build a timing, checking the declared total against the cycles.
    #[must_use]
    pub fn new(
        total_t_states: u8,
        cycles: Vec<MachineCycleSpec>,
        condition: Option<&'static str>,
    ) -> Self {
        let sum: u8 = cycles.iter().map(|c| c.t_states).sum();
        assert_eq!(
            sum, total_t_states,
            "machine cycle T-states must sum to the declared total"
        );
        Self {
            cycles,
            total_t_states,
            condition,
        }
    }
}

/// Addressing mode tags, one per operand slot of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingTag {
    Implied,
    Register,
    RegisterPair,
    RegisterIndirect,
    Immediate,
    ImmediateExtended,
    /// (nn) - 16-bit address operand.
    Extended,
    /// (IX+d) / (IY+d).
    Indexed,
    Relative,
    BitPosition,
    Condition,
    PortImmediate,
    PortRegister,
    RestartTarget,
}

/// A concrete operand slot value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Reg(Reg8),
    Pair(Reg16),
    /// The shadow AF' pair (EX AF,AF' only).
    ShadowAf,
    /// (rr) - memory addressed by a pair.
    Indirect(Reg16),
    /// 8-bit immediate, value in the fetched code.
    Imm8,
    /// 16-bit immediate, value in the fetched code.
    Imm16,
    /// (nn) address, value in the fetched code.
    Addr,
    /// (IX+d) / (IY+d), displacement in the fetched code.
    Indexed(Reg16),
    /// Relative displacement, value in the fetched code.
    Rel,
    Bit(u8),
    Cond(Cond),
    /// RST target address (0x00..0x38).
    Rst(u8),
    /// (n) port operand.
    PortImm,
    /// (C) port operand.
    PortC,
}

impl Operand {
    /// The addressing-mode tag this operand kind falls under.
    #[must_use]
    pub fn tag(&self) -> AddressingTag {
        match self {
            Self::Reg(_) => AddressingTag::Register,
            Self::Pair(_) | Self::ShadowAf => AddressingTag::RegisterPair,
            Self::Indirect(_) => AddressingTag::RegisterIndirect,
            Self::Imm8 => AddressingTag::Immediate,
            Self::Imm16 => AddressingTag::ImmediateExtended,
            Self::Addr => AddressingTag::Extended,
            Self::Indexed(_) => AddressingTag::Indexed,
            Self::Rel => AddressingTag::Relative,
            Self::Bit(_) => AddressingTag::BitPosition,
            Self::Cond(_) => AddressingTag::Condition,
            Self::Rst(_) => AddressingTag::RestartTarget,
            Self::PortImm => AddressingTag::PortImmediate,
            Self::PortC => AddressingTag::PortRegister,
        }
    }
}

/// Concrete operands, encoded size and timing(s) for one encoding of an
/// instruction form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterVariant {
    pub operands: [Option<Operand>; 3],
    /// Encoded size in bytes, prefixes included.
    pub size: u8,
    pub primary: ExecutionTiming,
    /// Taken when the primary's condition fails (branch not taken,
    /// counter reached zero).
    pub alternate: Option<ExecutionTiming>,
}

/// An instruction form: group, mnemonic template and its variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionDescriptor {
    pub group: &'static str,
    pub mnemonic: &'static str,
    pub addressing: [Option<AddressingTag>; 3],
    pub variants: Vec<ParameterVariant>,
    pub undocumented: bool,
    /// Pseudo-instruction injected by the interrupt/reset controller.
    pub internal: bool,
}

/// A resolved (descriptor, variant) pair - indices into the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup {
    pub descriptor: u16,
    pub variant: u16,
}

/// Outcome of feeding one byte to the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The byte was a prefix; decoding continues in the given state.
    Pending(PrefixState),
    /// A complete opcode.
    Resolved(Lookup),
}

/// The process-wide instruction catalog.
pub struct Catalog {
    descriptors: Vec<InstructionDescriptor>,
    main: [Lookup; 256],
    cb: [Lookup; 256],
    ed: [Lookup; 256],
    dd: [Lookup; 256],
    fd: [Lookup; 256],
    ddcb: [Lookup; 256],
    fdcb: [Lookup; 256],
    reset: Lookup,
    nmi: Lookup,
    int_mode0: Lookup,
    int_mode1: Lookup,
    int_mode2: Lookup,
}

static CATALOG: LazyLock<Catalog> = LazyLock::new(Catalog::build);

impl Catalog {
    /// The shared catalog instance.
    #[must_use]
    pub fn get() -> &'static Self {
        &CATALOG
    }

    /// Resolve one opcode byte under the given prefix state.
    ///
    /// Total: every byte value maps to a prefix continuation or a
    /// descriptor, documented or not.
    #[must_use]
    pub fn resolve(&self, prefix: PrefixState, byte: u8) -> Resolution {
        match prefix {
            PrefixState::None => match byte {
                0xCB => Resolution::Pending(PrefixState::Cb),
                0xED => Resolution::Pending(PrefixState::Ed),
                0xDD => Resolution::Pending(PrefixState::Dd),
                0xFD => Resolution::Pending(PrefixState::Fd),
                _ => Resolution::Resolved(self.main[byte as usize]),
            },
            PrefixState::Cb => Resolution::Resolved(self.cb[byte as usize]),
            PrefixState::Ed => Resolution::Resolved(self.ed[byte as usize]),
            PrefixState::Dd => match byte {
                0xCB => Resolution::Pending(PrefixState::DdCb),
                // Prefix chains: the last DD/FD wins, ED cancels.
                0xDD => Resolution::Pending(PrefixState::Dd),
                0xFD => Resolution::Pending(PrefixState::Fd),
                0xED => Resolution::Pending(PrefixState::Ed),
                _ => Resolution::Resolved(self.dd[byte as usize]),
            },
            PrefixState::Fd => match byte {
                0xCB => Resolution::Pending(PrefixState::FdCb),
                0xDD => Resolution::Pending(PrefixState::Dd),
                0xFD => Resolution::Pending(PrefixState::Fd),
                0xED => Resolution::Pending(PrefixState::Ed),
                _ => Resolution::Resolved(self.fd[byte as usize]),
            },
            PrefixState::DdCb => Resolution::Resolved(self.ddcb[byte as usize]),
            PrefixState::FdCb => Resolution::Resolved(self.fdcb[byte as usize]),
        }
    }

    /// Descriptor by index. Out-of-range is a programming error.
    #[must_use]
    pub fn descriptor(&self, index: u16) -> &InstructionDescriptor {
        &self.descriptors[index as usize]
    }

    /// Descriptor and variant for a lookup.
    #[must_use]
    pub fn variant(&self, lookup: Lookup) -> (&InstructionDescriptor, &ParameterVariant) {
        let desc = self.descriptor(lookup.descriptor);
        (desc, &desc.variants[lookup.variant as usize])
    }

    #[must_use]
    pub fn descriptor_count(&self) -> usize {
        self.descriptors.len()
    }

    /// Iterate over every descriptor.
    pub fn descriptors(&self) -> impl Iterator<Item = &InstructionDescriptor> {
        self.descriptors.iter()
    }

    // Pseudo-instructions injected by the interrupt/reset controller.

    #[must_use]
    pub fn reset_pseudo(&self) -> Lookup {
        self.reset
    }

    #[must_use]
    pub fn nmi_pseudo(&self) -> Lookup {
        self.nmi
    }

    /// Maskable-interrupt pseudo-instruction for the given mode.
    #[must_use]
    pub fn int_pseudo(&self, mode: u8) -> Lookup {
        match mode {
            0 => self.int_mode0,
            1 => self.int_mode1,
            2 => self.int_mode2,
            _ => panic!("interrupt mode {mode} out of range"),
        }
    }
}
