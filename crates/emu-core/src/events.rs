//! Lifecycle events emitted during execution.
//!
//! Events are the push-side counterpart to `Observable`: external loggers
//! and debuggers subscribe to the boundaries they care about and receive a
//! read-only snapshot at each one. Callbacks must not feed anything back
//! into the CPU; they see state, they do not change it.

use crate::Ticks;

/// Event kinds, also usable as subscription mask bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// One half-T-state elapsed.
    TStateBoundary,
    /// The last half-T-state of a machine cycle.
    MachineCycleEnd,
    /// An opcode fetch (M1) cycle completed.
    FetchEnd,
    /// The last machine cycle of an instruction completed.
    InstructionEnd,
}

impl EventKind {
    #[must_use]
    pub const fn mask(self) -> u8 {
        match self {
            Self::TStateBoundary => 0b0001,
            Self::MachineCycleEnd => 0b0010,
            Self::FetchEnd => 0b0100,
            Self::InstructionEnd => 0b1000,
        }
    }
}

/// Subscribe to every event kind.
pub const EVENT_ALL: u8 = 0b1111;

/// A lifecycle event with a read-only register snapshot.
///
/// `R` is the CPU's register snapshot type; the borrow keeps callbacks
/// from holding state past the emission point.
#[derive(Debug)]
pub struct Event<'a, R> {
    pub kind: EventKind,
    /// Half-T-state index within the current machine cycle.
    pub half_t: u8,
    /// Machine-cycle index within the current instruction.
    pub cycle: u8,
    /// Total ticks elapsed since CPU creation.
    pub total: Ticks,
    pub registers: &'a R,
}

/// A registered event callback.
pub struct Subscription<R> {
    pub mask: u8,
    pub hook: Box<dyn FnMut(&Event<'_, R>)>,
}

impl<R> Subscription<R> {
    #[must_use]
    pub fn new(mask: u8, hook: Box<dyn FnMut(&Event<'_, R>)>) -> Self {
        Self { mask, hook }
    }

    pub fn fire(&mut self, event: &Event<'_, R>) {
        if self.mask & event.kind.mask() != 0 {
            (self.hook)(event);
        }
    }
}
