//! External control inputs: /RESET, /NMI, /INT and the service decision.
//!
//! Lines are sampled at instruction boundaries (reset at machine-cycle
//! boundaries) with a fixed priority: reset, then NMI, then the maskable
//! interrupt. NMI is edge-triggered and latched; INT is level-sampled and
//! gated by IFF1 and the one-instruction EI delay.

use std::collections::VecDeque;

/// Coarse execution state, exposed through the query interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoreState {
    #[default]
    Running,
    /// HALT executed; fetching is suspended until an interrupt or reset.
    Halted,
    /// Executing the non-maskable service sequence.
    ServicingNmi,
    /// Executing the maskable service sequence.
    ServicingInt,
    /// /RESET held active.
    Resetting,
}

impl CoreState {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Halted => "halted",
            Self::ServicingNmi => "nmi",
            Self::ServicingInt => "int",
            Self::Resetting => "reset",
        }
    }
}

/// Which service sequence to inject next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Reset,
    Nmi,
    Int,
}

/// Latches for the external control lines.
#[derive(Debug, Default)]
pub struct Controller {
    reset_pending: bool,
    nmi_pending: bool,
    int_pending: bool,
    /// Bytes the interrupting device will place on the bus during
    /// acknowledge cycles (mode 0 instruction bytes, mode 2 vector).
    device_bytes: VecDeque<u8>,
    /// /BUSREQ level (DMA request).
    bus_requested: bool,
}

impl Controller {
    /// Pulse /RESET. Takes effect at the next machine-cycle boundary.
    pub fn signal_reset(&mut self) {
        self.reset_pending = true;
    }

    /// Falling edge on /NMI. Latched until serviced.
    pub fn signal_nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Assert /INT for the next instruction boundary. Returns whether the
    /// request will be honoured there; an inhibited request is dropped,
    /// as a real device would keep the line asserted and retry.
    pub fn signal_int(&mut self, iff1: bool, ei_gate: bool) -> bool {
        let accepted = iff1 && !ei_gate;
        self.int_pending = accepted;
        accepted
    }

    /// Queue a byte for the device side of an acknowledge or vector read.
    pub fn push_device_byte(&mut self, byte: u8) {
        self.device_bytes.push_back(byte);
    }

    /// Next device byte; an idle bus reads as 0xFF.
    pub fn device_byte(&mut self) -> u8 {
        self.device_bytes.pop_front().unwrap_or(0xFF)
    }

    pub fn set_bus_request(&mut self, active: bool) {
        self.bus_requested = active;
    }

    #[must_use]
    pub fn bus_requested(&self) -> bool {
        self.bus_requested
    }

    /// Decide and consume the service to run at an instruction boundary.
    /// A losing or inhibited INT request is dropped.
    pub fn take_service(&mut self, iff1: bool, ei_gate: bool) -> Option<Service> {
        let int_taken = std::mem::take(&mut self.int_pending) && iff1 && !ei_gate;
        if self.reset_pending {
            self.reset_pending = false;
            return Some(Service::Reset);
        }
        if self.nmi_pending {
            self.nmi_pending = false;
            return Some(Service::Nmi);
        }
        if int_taken {
            return Some(Service::Int);
        }
        None
    }

    /// Consume a pending reset at a machine-cycle boundary.
    pub fn take_reset(&mut self) -> bool {
        std::mem::take(&mut self.reset_pending)
    }

    /// Reset drops every other pending request along with the queued
    /// device bytes.
    pub fn flush_pending(&mut self) {
        self.nmi_pending = false;
        self.int_pending = false;
        self.device_bytes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_outranks_nmi_outranks_int() {
        let mut c = Controller::default();
        c.signal_reset();
        c.signal_nmi();
        assert!(c.signal_int(true, false));
        assert_eq!(c.take_service(true, false), Some(Service::Reset));
        assert_eq!(c.take_service(true, false), Some(Service::Nmi));
        // The INT latch is cleared when it loses arbitration.
        assert_eq!(c.take_service(true, false), None);
    }

    #[test]
    fn nmi_is_latched_until_serviced() {
        let mut c = Controller::default();
        c.signal_nmi();
        assert_eq!(c.take_service(false, false), Some(Service::Nmi));
        assert_eq!(c.take_service(false, false), None);
    }

    #[test]
    fn int_is_gated_by_iff1_and_ei_delay() {
        let mut c = Controller::default();
        assert!(!c.signal_int(false, false));
        assert_eq!(c.take_service(false, false), None);
        assert!(!c.signal_int(true, true));
        assert_eq!(c.take_service(true, true), None);
        assert!(c.signal_int(true, false));
        assert_eq!(c.take_service(true, false), Some(Service::Int));
    }

    #[test]
    fn device_bytes_drain_in_order_and_default_high() {
        let mut c = Controller::default();
        c.push_device_byte(0xCF);
        c.push_device_byte(0x12);
        assert_eq!(c.device_byte(), 0xCF);
        assert_eq!(c.device_byte(), 0x12);
        assert_eq!(c.device_byte(), 0xFF);
    }
}
