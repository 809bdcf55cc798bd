//! Machine-cycle program representation.
//!
//! Once an instruction is resolved, the execution core lowers it into a
//! `Program`: an ordered list of machine cycles, each carrying its bus
//! transaction, T-state length and two micro-op sequences (setup at cycle
//! start, the rest at cycle end). Conditional instructions whose outcome is
//! only known mid-flight schedule their longest shape and let a selector
//! micro-op cut the tail when the shorter alternate timing applies.

use crate::catalog::CycleKind;
use crate::microcode::MicroSeq;

/// Which byte of a 16-bit transfer a bus step moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Half {
    Lo,
    Hi,
}

/// The bus transaction a machine cycle performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusStep {
    /// Read at PC into the data latch, then PC += 1.
    ReadPc(Half),
    /// Read at PC into the displacement latch, then PC += 1.
    ReadDisp,
    /// Read at the address latch into the data latch.
    Read(Half),
    /// Read at the address latch, then address latch += 1.
    ReadBump(Half),
    /// Write the data latch at the address latch.
    Write(Half),
    /// Write the data latch at the address latch, then address latch += 1.
    WriteBump(Half),
    /// SP -= 1, then write the data latch at SP.
    Push(Half),
    /// Read at SP into the data latch, then SP += 1.
    Pop(Half),
    /// Port read at the address latch into the low data latch.
    PortIn,
    /// Port write of the low data latch at the address latch.
    PortOut,
    /// Interrupt acknowledge: latch the device byte.
    IntAck,
    /// No bus transaction.
    Internal,
}

/// One scheduled machine cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleStep {
    pub kind: CycleKind,
    pub t_states: u8,
    pub bus: BusStep,
    /// Runs at the first half-T-state, before the bus transaction.
    pub setup: MicroSeq,
    /// Runs at the last half-T-state of the cycle.
    pub micros: MicroSeq,
}

impl CycleStep {
    #[must_use]
    pub fn new(kind: CycleKind, t_states: u8, bus: BusStep) -> Self {
        assert!(t_states >= 1, "machine cycle must span at least one T-state");
        Self {
            kind,
            t_states,
            bus,
            setup: MicroSeq::EMPTY,
            micros: MicroSeq::EMPTY,
        }
    }

    #[must_use]
    pub fn setup(mut self, seq: MicroSeq) -> Self {
        self.setup = seq;
        self
    }

    #[must_use]
    pub fn micros(mut self, seq: MicroSeq) -> Self {
        self.micros = seq;
        self
    }
}

/// The remaining machine cycles of the current instruction.
///
/// Built once per instruction at decode completion; the backing storage is
/// reused across instructions.
#[derive(Debug, Default)]
pub struct Program {
    steps: Vec<CycleStep>,
    cursor: usize,
}

impl Program {
    /// Drop all state and start a new instruction.
    pub fn clear(&mut self) {
        self.steps.clear();
        self.cursor = 0;
    }

    pub fn push(&mut self, step: CycleStep) {
        self.steps.push(step);
    }

    /// The cycle at the cursor, if any remain.
    #[must_use]
    pub fn current(&self) -> Option<&CycleStep> {
        self.steps.get(self.cursor)
    }

    /// Move past the current cycle.
    pub fn advance(&mut self) {
        self.cursor += 1;
    }

    /// Drop everything after the current cycle: the alternate (shorter)
    /// timing applies from here.
    pub fn select_alternate(&mut self) {
        self.steps.truncate(self.cursor + 1);
    }
}
