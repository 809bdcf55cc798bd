//! Memory and I/O bus interface.

/// Result of a bus read: the data byte plus any wait states the device
/// inserted before it could respond.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadResult {
    pub data: u8,
    /// Extra T-states the CPU must insert into the current machine cycle.
    pub wait: u8,
}

impl ReadResult {
    #[must_use]
    pub const fn new(data: u8) -> Self {
        Self { data, wait: 0 }
    }

    #[must_use]
    pub const fn with_wait(data: u8, wait: u8) -> Self {
        Self { data, wait }
    }
}

/// Memory and I/O bus interface.
///
/// The CPU does not own the bus; it is passed into `tick()` so that other
/// components can share it and inject wait states. I/O accesses carry the
/// full 16-bit address: the port number on the low half and whatever the
/// CPU drove on A8-A15 (B for IN r,(C), A for IN A,(n)) on the high half.
pub trait Bus {
    /// Read a byte from memory.
    fn read(&mut self, address: u16) -> ReadResult;

    /// Write a byte to memory. Returns inserted wait states.
    fn write(&mut self, address: u16, value: u8) -> u8;

    /// Read a byte from an I/O port.
    fn io_read(&mut self, address: u16) -> ReadResult;

    /// Write a byte to an I/O port. Returns inserted wait states.
    fn io_write(&mut self, address: u16, value: u8) -> u8;
}

/// Flat 64 KiB RAM with pluggable I/O port values, for tests.
pub struct SimpleBus {
    ram: Vec<u8>,
    /// Value returned for any I/O read (per low port byte).
    io_in: [u8; 256],
    /// Last value written per low port byte.
    io_out: [u8; 256],
    /// Wait states reported on every memory access (models slow memory).
    pub mem_wait: u8,
}

impl SimpleBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ram: vec![0; 0x1_0000],
            io_in: [0xFF; 256],
            io_out: [0; 256],
            mem_wait: 0,
        }
    }

    /// Copy bytes into RAM starting at `addr`.
    pub fn load(&mut self, addr: u16, bytes: &[u8]) {
        for (offset, &byte) in bytes.iter().enumerate() {
            let a = addr.wrapping_add(offset as u16);
            self.ram[a as usize] = byte;
        }
    }

    /// Inspect RAM without going through the bus.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        self.ram[addr as usize]
    }

    /// Preload the value an I/O read of `port` will return.
    pub fn set_io_in(&mut self, port: u8, value: u8) {
        self.io_in[port as usize] = value;
    }

    /// Last value written to `port`.
    #[must_use]
    pub fn io_out(&self, port: u8) -> u8 {
        self.io_out[port as usize]
    }
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SimpleBus {
    fn read(&mut self, address: u16) -> ReadResult {
        ReadResult::with_wait(self.ram[address as usize], self.mem_wait)
    }

    fn write(&mut self, address: u16, value: u8) -> u8 {
        self.ram[address as usize] = value;
        self.mem_wait
    }

    fn io_read(&mut self, address: u16) -> ReadResult {
        ReadResult::new(self.io_in[(address & 0xFF) as usize])
    }

    fn io_write(&mut self, address: u16, value: u8) -> u8 {
        self.io_out[(address & 0xFF) as usize] = value;
        0
    }
}
