//! Machine-cycle-accurate Zilog Z80 execution engine.
//!
//! Each call to `tick()` advances exactly one half-T-state. Instructions
//! are resolved against an immutable instruction catalog, scheduled
//! machine cycle by machine cycle, and executed as sequences of typed
//! micro-operations.

mod alu;
mod catalog;
mod cpu;
mod decoder;
mod flags;
mod interrupt;
mod microcode;
mod registers;
mod scheduler;

pub use catalog::{
    AddressingTag, Catalog, CycleKind, ExecutionTiming, InstructionDescriptor, Lookup,
    MachineCycleSpec, Operand, ParameterVariant, Resolution,
};
pub use cpu::Z80;
pub use decoder::PrefixState;
pub use flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
pub use interrupt::CoreState;
pub use microcode::{Cond, Micro};
pub use registers::{Reg8, Reg16, Registers};
