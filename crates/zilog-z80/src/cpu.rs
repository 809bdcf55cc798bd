//! The Z80 execution core.
//!
//! `Z80` advances in half-T-states: `tick` is called twice per clock
//! period, which is enough resolution to model mid-cycle bus sampling and
//! wait-state insertion. Instructions run in three phases: the decoder
//! consumes opcode bytes from M1 fetch cycles, the resolved instruction is
//! lowered into a machine-cycle program, and the scheduler walks that
//! program until it is exhausted. Interrupt and reset requests are folded
//! in at the boundaries where the hardware samples them.

use emu_core::{Bus, Cpu, Event, EventKind, Observable, Subscription, Ticks, Value};

use crate::catalog::CycleKind;
use crate::decoder::{DecodeStep, Decoder};
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
use crate::interrupt::{Controller, CoreState, Service};
use crate::microcode::{CtlOp, DataOp, Micro, MicroSeq, RegOp};
use crate::registers::Registers;
use crate::scheduler::{BusStep, CycleStep, Half, Program};

mod exec;
mod interp;

/// What the in-flight machine cycle is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// An M1 fetch feeding the decoder.
    Decode,
    /// The DDCB/FDCB displacement read.
    Displacement,
    /// The DDCB/FDCB final opcode read.
    SubOpcode,
    /// Walking the lowered program.
    Run,
    /// Halted: idle refresh cycles between interrupt checks.
    HaltIdle,
}

/// A Zilog Z80, cycle-stepped at half-T-state resolution.
pub struct Z80 {
    pub(crate) regs: Registers,
    pub(crate) decoder: Decoder,
    pub(crate) program: Program,
    ctrl: Controller,
    state: CoreState,

    // In-flight machine cycle.
    pub(crate) current: CycleStep,
    pub(crate) cycle_t: u8,
    half: u8,
    mcycle: u8,
    phase: Phase,
    decode_step: DecodeStep,
    /// Executing an IM 0 injected instruction: opcode and operand bytes
    /// come from the data bus, not memory, and PC does not advance.
    im0: bool,

    // Internal latches.
    pub(crate) addr: u16,
    pub(crate) data_lo: u8,
    pub(crate) data_hi: u8,
    pub(crate) disp: i8,

    // Flag plumbing.
    pub(crate) prev_q: u8,
    pub(crate) last_q: u8,
    pub(crate) last_zero: bool,
    pub(crate) ei_gate: bool,
    pub(crate) released: bool,
    pub(crate) block_value: u8,
    pub(crate) block_k: u16,

    total: Ticks,
    instructions: u64,
    subs: Vec<Subscription<Registers>>,
}

impl Default for Z80 {
    fn default() -> Self {
        Self::new()
    }
}

impl Z80 {
    #[must_use]
    pub fn new() -> Self {
        let mut cpu = Self {
            regs: Registers::power_on(),
            decoder: Decoder::default(),
            program: Program::default(),
            ctrl: Controller::default(),
            state: CoreState::Running,
            current: CycleStep::new(CycleKind::OpcodeFetch, 4, BusStep::Internal),
            cycle_t: 4,
            half: 0,
            mcycle: 0,
            phase: Phase::Decode,
            decode_step: DecodeStep::NeedFetch,
            im0: false,
            addr: 0,
            data_lo: 0,
            data_hi: 0,
            disp: 0,
            prev_q: 0,
            last_q: 0,
            last_zero: false,
            ei_gate: false,
            released: false,
            block_value: 0,
            block_k: 0,
            total: Ticks(0),
            instructions: 0,
            subs: Vec::new(),
        };
        cpu.begin_instruction();
        cpu
    }

    /// Register an event callback. Mask bits select the event kinds.
    pub fn subscribe(&mut self, mask: u8, hook: Box<dyn FnMut(&Event<'_, Registers>)>) {
        self.subs.push(Subscription::new(mask, hook));
    }

    /// Queue a byte the interrupting device will place on the data bus
    /// during the next acknowledge cycle.
    pub fn set_interrupt_data(&mut self, byte: u8) {
        self.ctrl.push_device_byte(byte);
    }

    /// Assert or release the bus request line. While granted, the CPU
    /// idles between instructions with its buses released.
    pub fn bus_request(&mut self, active: bool) {
        self.ctrl.set_bus_request(active);
    }

    /// Total elapsed half-T-states.
    #[must_use]
    pub fn ticks(&self) -> Ticks {
        self.total
    }

    /// Execution state, for external schedulers and debuggers.
    #[must_use]
    pub fn core_state(&self) -> CoreState {
        self.state
    }

    fn emit(&mut self, kind: EventKind) {
        if self.subs.is_empty() {
            return;
        }
        let mut subs = std::mem::take(&mut self.subs);
        let event = Event {
            kind,
            half_t: self.half,
            cycle: self.mcycle,
            total: self.total,
            registers: &self.regs,
        };
        for sub in &mut subs {
            sub.fire(&event);
        }
        self.subs = subs;
    }

    /// Extra wait T-states reported by the bus stretch the current cycle.
    fn stretch(&mut self, wait: u8) {
        self.cycle_t += wait;
    }

    fn begin_cycle(&mut self, step: CycleStep) {
        self.current = step;
        self.cycle_t = step.t_states;
        self.half = 0;
    }

    /// Start decoding a fresh instruction.
    fn begin_instruction(&mut self) {
        self.state = CoreState::Running;
        self.decoder.begin();
        self.mcycle = 0;
        self.phase = Phase::Decode;
        self.decode_step = DecodeStep::NeedFetch;
        self.begin_cycle(CycleStep::new(CycleKind::OpcodeFetch, 4, BusStep::Internal));
    }

    /// While halted the CPU executes internal refresh cycles, sampling
    /// interrupts after each one.
    fn begin_halt_cycle(&mut self) {
        self.state = CoreState::Halted;
        self.mcycle = 0;
        self.phase = Phase::HaltIdle;
        self.begin_cycle(CycleStep::new(CycleKind::OpcodeFetch, 4, BusStep::Internal));
    }

    /// Hand over from the decoder to the lowered program.
    fn begin_program(&mut self) {
        self.phase = Phase::Run;
        match self.program.current() {
            Some(step) => {
                let step = *step;
                self.mcycle += 1;
                self.begin_cycle(step);
            }
            None => self.instruction_end(),
        }
    }

    /// The boundary where interrupts are sampled and Q rolls over.
    fn instruction_end(&mut self) {
        self.emit(EventKind::InstructionEnd);
        self.instructions += 1;
        self.prev_q = self.last_q;
        self.last_q = 0;
        self.im0 = false;
        let gate = std::mem::take(&mut self.ei_gate);
        match self.ctrl.take_service(self.regs.iff1, gate) {
            Some(Service::Reset) => self.inject_reset(),
            Some(Service::Nmi) => self.inject_nmi(),
            Some(Service::Int) => self.inject_int(),
            None => {
                if self.ctrl.bus_requested() {
                    self.released = true;
                }
                if self.regs.halted {
                    self.begin_halt_cycle();
                } else {
                    self.begin_instruction();
                }
            }
        }
    }

    /// RESET: a short internal sequence that re-initialises the control
    /// registers. Data registers keep whatever they held.
    fn inject_reset(&mut self) {
        self.state = CoreState::Resetting;
        self.regs.halted = false;
        self.ctrl.flush_pending();
        self.program.clear();
        self.program.push(
            CycleStep::new(CycleKind::Internal, 3, BusStep::Internal)
                .micros(MicroSeq::of(&[Micro::Ctl(CtlOp::PowerOnReset)])),
        );
        self.begin_program();
    }

    /// NMI: 11 T-states, push PC, jump to 0066h. Only IFF1 is cleared, so
    /// RETN can restore the pre-interrupt enable state from IFF2.
    fn inject_nmi(&mut self) {
        self.state = CoreState::ServicingNmi;
        self.regs.halted = false;
        self.regs.iff1 = false;
        self.program.clear();
        self.program.push(
            CycleStep::new(CycleKind::OpcodeFetch, 5, BusStep::Internal).setup(MicroSeq::of(&[
                Micro::Reg(RegOp::Refresh),
                Micro::Data(DataOp::ToDataWide(crate::registers::Reg16::Pc)),
            ])),
        );
        self.program
            .push(CycleStep::new(CycleKind::StackWrite, 3, BusStep::Push(Half::Hi)));
        self.program.push(
            CycleStep::new(CycleKind::StackWrite, 3, BusStep::Push(Half::Lo))
                .micros(MicroSeq::of(&[Micro::Reg(RegOp::RstAddr(0x66))])),
        );
        self.begin_program();
    }

    /// Maskable interrupt, dispatched per the current interrupt mode.
    fn inject_int(&mut self) {
        self.state = CoreState::ServicingInt;
        self.regs.halted = false;
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        match self.regs.im {
            0 => {
                // The device supplies the opcode; decode it off the data
                // bus through a lengthened acknowledge fetch.
                self.im0 = true;
                self.decoder.begin();
                self.mcycle = 0;
                self.phase = Phase::Decode;
                self.decode_step = DecodeStep::NeedFetch;
                self.begin_cycle(CycleStep::new(CycleKind::IntAck, 6, BusStep::Internal));
            }
            1 => {
                // The acknowledge byte is ignored; RST 38h is hardwired.
                let _ = self.ctrl.device_byte();
                self.program.clear();
                self.program.push(
                    CycleStep::new(CycleKind::IntAck, 7, BusStep::Internal).setup(MicroSeq::of(
                        &[
                            Micro::Reg(RegOp::Refresh),
                            Micro::Data(DataOp::ToDataWide(crate::registers::Reg16::Pc)),
                        ],
                    )),
                );
                self.program.push(CycleStep::new(
                    CycleKind::StackWrite,
                    3,
                    BusStep::Push(Half::Hi),
                ));
                self.program.push(
                    CycleStep::new(CycleKind::StackWrite, 3, BusStep::Push(Half::Lo))
                        .micros(MicroSeq::of(&[Micro::Reg(RegOp::RstAddr(0x38))])),
                );
                self.begin_program();
            }
            _ => {
                // I forms the vector-table page; the acknowledged byte
                // selects the entry.
                self.data_hi = self.regs.i;
                self.program.clear();
                self.program.push(
                    CycleStep::new(CycleKind::IntAck, 7, BusStep::IntAck)
                        .setup(MicroSeq::of(&[Micro::Reg(RegOp::Refresh)]))
                        .micros(MicroSeq::of(&[
                            Micro::Data(DataOp::AddrFromData),
                            Micro::Data(DataOp::ToDataWide(crate::registers::Reg16::Pc)),
                        ])),
                );
                self.program.push(CycleStep::new(
                    CycleKind::StackWrite,
                    3,
                    BusStep::Push(Half::Hi),
                ));
                self.program.push(CycleStep::new(
                    CycleKind::StackWrite,
                    3,
                    BusStep::Push(Half::Lo),
                ));
                self.program
                    .push(CycleStep::new(CycleKind::MemRead, 3, BusStep::ReadBump(Half::Lo)));
                self.program.push(
                    CycleStep::new(CycleKind::MemRead, 3, BusStep::Read(Half::Hi)).micros(
                        MicroSeq::of(&[Micro::Data(DataOp::JumpIf(
                            crate::microcode::Cond::Always,
                        ))]),
                    ),
                );
                self.begin_program();
            }
        }
    }

    /// Fetch one instruction byte: from memory at PC, or from the device
    /// during IM 0 service.
    fn fetch_byte<B: Bus>(&mut self, bus: &mut B) -> u8 {
        if self.im0 {
            self.ctrl.device_byte()
        } else {
            let result = bus.read(self.regs.pc);
            self.stretch(result.wait);
            self.regs.pc = self.regs.pc.wrapping_add(1);
            result.data
        }
    }

    fn store_half(&mut self, half: Half, value: u8) {
        match half {
            Half::Lo => self.data_lo = value,
            Half::Hi => self.data_hi = value,
        }
    }

    fn load_half(&self, half: Half) -> u8 {
        match half {
            Half::Lo => self.data_lo,
            Half::Hi => self.data_hi,
        }
    }

    /// The bus transaction of the current cycle, at its sample point.
    fn run_bus<B: Bus>(&mut self, bus: &mut B) {
        match self.current.bus {
            BusStep::ReadPc(half) => {
                let byte = self.fetch_byte(bus);
                self.store_half(half, byte);
            }
            BusStep::ReadDisp => {
                let byte = self.fetch_byte(bus);
                self.disp = byte as i8;
            }
            BusStep::Read(half) => {
                let result = bus.read(self.addr);
                self.stretch(result.wait);
                self.store_half(half, result.data);
            }
            BusStep::ReadBump(half) => {
                let result = bus.read(self.addr);
                self.stretch(result.wait);
                self.store_half(half, result.data);
                self.addr = self.addr.wrapping_add(1);
            }
            BusStep::Write(half) => {
                let wait = bus.write(self.addr, self.load_half(half));
                self.stretch(wait);
            }
            BusStep::WriteBump(half) => {
                let wait = bus.write(self.addr, self.load_half(half));
                self.stretch(wait);
                self.addr = self.addr.wrapping_add(1);
            }
            BusStep::Push(half) => {
                self.regs.sp = self.regs.sp.wrapping_sub(1);
                let wait = bus.write(self.regs.sp, self.load_half(half));
                self.stretch(wait);
            }
            BusStep::Pop(half) => {
                let result = bus.read(self.regs.sp);
                self.stretch(result.wait);
                self.regs.sp = self.regs.sp.wrapping_add(1);
                self.store_half(half, result.data);
            }
            BusStep::PortIn => {
                let result = bus.io_read(self.addr);
                self.stretch(result.wait);
                self.data_lo = result.data;
            }
            BusStep::PortOut => {
                let wait = bus.io_write(self.addr, self.data_lo);
                self.stretch(wait);
            }
            BusStep::IntAck => self.data_lo = self.ctrl.device_byte(),
            BusStep::Internal => {}
        }
    }

    /// The mid-cycle sample point: where the data bus is read or driven.
    fn bus_sample<B: Bus>(&mut self, bus: &mut B) {
        match self.phase {
            Phase::Decode | Phase::SubOpcode => {
                let byte = self.fetch_byte(bus);
                if self.phase == Phase::Decode {
                    self.regs.refresh();
                }
                self.decode_step = self.decoder.accept(byte);
                if let DecodeStep::Done(_) = self.decode_step {
                    self.lower();
                }
            }
            Phase::Displacement => {
                let byte = self.fetch_byte(bus);
                self.decode_step = self.decoder.accept_displacement(byte);
            }
            Phase::Run => self.run_bus(bus),
            Phase::HaltIdle => self.regs.refresh(),
        }
    }

    /// The last half-T-state of a machine cycle: micro-ops run, events
    /// fire, and the next cycle (or instruction) is selected.
    fn cycle_end(&mut self) {
        let micros = self.current.micros;
        let fx = self.run_seq(micros);
        if fx.select_alt {
            self.program.select_alternate();
        }
        if self.current.kind == CycleKind::OpcodeFetch {
            self.emit(EventKind::FetchEnd);
        }
        self.emit(EventKind::MachineCycleEnd);

        // RESET is sampled every machine cycle, not just at instruction
        // boundaries.
        if self.ctrl.take_reset() {
            self.inject_reset();
            return;
        }

        match self.phase {
            Phase::Decode | Phase::Displacement | Phase::SubOpcode => match self.decode_step {
                DecodeStep::NeedFetch => {
                    self.mcycle += 1;
                    self.phase = Phase::Decode;
                    self.begin_cycle(CycleStep::new(
                        CycleKind::OpcodeFetch,
                        4,
                        BusStep::Internal,
                    ));
                }
                DecodeStep::NeedDisplacement => {
                    self.mcycle += 1;
                    self.phase = Phase::Displacement;
                    self.begin_cycle(CycleStep::new(CycleKind::MemRead, 3, BusStep::Internal));
                }
                DecodeStep::NeedSubOpcode => {
                    self.mcycle += 1;
                    self.phase = Phase::SubOpcode;
                    self.begin_cycle(CycleStep::new(CycleKind::MemRead, 5, BusStep::Internal));
                }
                DecodeStep::Done(_) => self.begin_program(),
            },
            Phase::Run => {
                self.program.advance();
                match self.program.current() {
                    Some(step) => {
                        let step = *step;
                        self.mcycle += 1;
                        self.begin_cycle(step);
                    }
                    None => self.instruction_end(),
                }
            }
            Phase::HaltIdle => self.instruction_end(),
        }
    }
}

impl Cpu for Z80 {
    type Registers = Registers;

    fn tick<B: Bus>(&mut self, bus: &mut B) {
        self.total.0 += 1;

        // Bus released: idle until the requester lets go.
        if self.released {
            if self.ctrl.bus_requested() {
                return;
            }
            self.released = false;
        }

        if self.half == 0 {
            let setup = self.current.setup;
            let _ = self.run_seq(setup);
        }

        let sample = match self.current.kind {
            CycleKind::PortRead | CycleKind::PortWrite | CycleKind::IntAck => 6,
            _ => 4,
        };
        if self.half == sample {
            self.bus_sample(bus);
        }

        self.emit(EventKind::TStateBoundary);

        if self.half == 2 * self.cycle_t - 1 {
            self.cycle_end();
        } else {
            self.half += 1;
        }
    }

    fn pc(&self) -> u16 {
        self.regs.pc
    }

    fn registers(&self) -> Registers {
        self.regs
    }

    fn is_halted(&self) -> bool {
        self.regs.halted
    }

    fn interrupt(&mut self) -> bool {
        self.ctrl.signal_int(self.regs.iff1, self.ei_gate)
    }

    fn nmi(&mut self) {
        self.ctrl.signal_nmi();
    }

    fn reset(&mut self) {
        self.ctrl.signal_reset();
    }
}

/// All paths answered by [`Z80::query`].
pub const Z80_QUERY_PATHS: &[&str] = &[
    "a", "f", "b", "c", "d", "e", "h", "l", "af", "bc", "de", "hl", "af'", "bc'", "de'", "hl'",
    "ix", "iy", "sp", "pc", "wz", "i", "r", "im", "iff1", "iff2", "halted", "q", "state",
    "flags.s", "flags.z", "flags.y", "flags.h", "flags.x", "flags.p", "flags.n", "flags.c",
    "cycle.kind", "cycle.half", "prefix", "ticks", "instructions",
];

impl Observable for Z80 {
    fn query(&self, path: &str) -> Option<Value> {
        let r = &self.regs;
        let flag = |bit: u8| Value::Bool(r.f & bit != 0);
        Some(match path {
            "a" => r.a.into(),
            "f" => r.f.into(),
            "b" => r.b.into(),
            "c" => r.c.into(),
            "d" => r.d.into(),
            "e" => r.e.into(),
            "h" => r.h.into(),
            "l" => r.l.into(),
            "af" => r.af().into(),
            "bc" => r.bc().into(),
            "de" => r.de().into(),
            "hl" => r.hl().into(),
            "af'" => (u16::from(r.a_alt) << 8 | u16::from(r.f_alt)).into(),
            "bc'" => (u16::from(r.b_alt) << 8 | u16::from(r.c_alt)).into(),
            "de'" => (u16::from(r.d_alt) << 8 | u16::from(r.e_alt)).into(),
            "hl'" => (u16::from(r.h_alt) << 8 | u16::from(r.l_alt)).into(),
            "ix" => r.ix.into(),
            "iy" => r.iy.into(),
            "sp" => r.sp.into(),
            "pc" => r.pc.into(),
            "wz" => r.wz.into(),
            "i" => r.i.into(),
            "r" => r.r.into(),
            "im" => r.im.into(),
            "iff1" => r.iff1.into(),
            "iff2" => r.iff2.into(),
            "halted" => r.halted.into(),
            "q" => self.prev_q.into(),
            "state" => self.state.name().into(),
            "flags.s" => flag(SF),
            "flags.z" => flag(ZF),
            "flags.y" => flag(YF),
            "flags.h" => flag(HF),
            "flags.x" => flag(XF),
            "flags.p" => flag(PF),
            "flags.n" => flag(NF),
            "flags.c" => flag(CF),
            "cycle.kind" => self.current.kind.name().into(),
            "cycle.half" => self.half.into(),
            "prefix" => self.decoder.table().name().into(),
            "ticks" => self.total.0.into(),
            "instructions" => self.instructions.into(),
            _ => return None,
        })
    }

    fn query_paths(&self) -> &'static [&'static str] {
        Z80_QUERY_PATHS
    }
}

#[cfg(feature = "test-utils")]
impl Z80 {
    /// Direct register access for test setup.
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.regs.pc = pc;
        self.begin_instruction();
    }

    pub fn set_sp(&mut self, sp: u16) {
        self.regs.sp = sp;
    }

    /// Seed the Q register as if the previous instruction wrote F.
    pub fn set_q(&mut self, q: u8) {
        self.prev_q = q;
    }

    /// The Q register after the last completed instruction.
    #[must_use]
    pub fn q(&self) -> u8 {
        self.prev_q
    }

    #[must_use]
    pub fn a(&self) -> u8 {
        self.regs.a
    }

    #[must_use]
    pub fn f(&self) -> u8 {
        self.regs.f
    }

    #[must_use]
    pub fn bc(&self) -> u16 {
        self.regs.bc()
    }

    #[must_use]
    pub fn de(&self) -> u16 {
        self.regs.de()
    }

    #[must_use]
    pub fn hl(&self) -> u16 {
        self.regs.hl()
    }

    #[must_use]
    pub fn sp(&self) -> u16 {
        self.regs.sp
    }

    #[must_use]
    pub fn ix(&self) -> u16 {
        self.regs.ix
    }

    #[must_use]
    pub fn iy(&self) -> u16 {
        self.regs.iy
    }

    /// Run until the next instruction boundary. Returns the instruction's
    /// length in T-states.
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let before = self.instructions;
        let start = self.total.0;
        while self.instructions == before {
            self.tick(bus);
        }
        ((self.total.0 - start) / 2) as u32
    }
}
