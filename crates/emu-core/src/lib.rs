//! Core traits and types for cycle-accurate CPU emulation.
//!
//! Everything advances in half-T-state ticks. All component timing derives
//! from this. No exceptions.

mod bus;
mod cpu;
mod events;
mod observable;
mod ticks;

pub use bus::{Bus, ReadResult, SimpleBus};
pub use cpu::Cpu;
pub use events::{EVENT_ALL, Event, EventKind, Subscription};
pub use observable::{Observable, Value};
pub use ticks::Ticks;
