//! Single-instruction state-transition vectors.
//!
//! Each JSON file under `tests/data/` holds an array of cases in the
//! SingleStepTests layout: an initial CPU/RAM state, the expected final
//! state, and one `cycles` entry per T-state. Drop the full published set
//! into the directory to widen coverage; the bundled files cover one
//! representative per instruction family.

use std::collections::HashMap;
use std::fs;
use std::panic;
use std::path::Path;

use emu_core::{Bus, Cpu, ReadResult};
use serde::Deserialize;
use zilog_z80::Z80;

/// Flat 64KB RAM bus with preloadable I/O port values.
struct TestBus {
    ram: Vec<u8>,
    io_read_values: HashMap<u16, u8>,
}

impl TestBus {
    fn new() -> Self {
        Self {
            ram: vec![0; 0x1_0000],
            io_read_values: HashMap::new(),
        }
    }

    fn load_ram(&mut self, entries: &[(u16, u8)]) {
        for &(addr, value) in entries {
            self.ram[addr as usize] = value;
        }
    }

    fn peek(&self, addr: u16) -> u8 {
        self.ram[addr as usize]
    }
}

impl Bus for TestBus {
    fn read(&mut self, address: u16) -> ReadResult {
        ReadResult::new(self.ram[address as usize])
    }

    fn write(&mut self, address: u16, value: u8) -> u8 {
        self.ram[address as usize] = value;
        0
    }

    fn io_read(&mut self, address: u16) -> ReadResult {
        let value = self.io_read_values.get(&address).copied().unwrap_or(0xFF);
        ReadResult::new(value)
    }

    fn io_write(&mut self, _address: u16, _value: u8) -> u8 {
        0
    }
}

#[derive(Deserialize)]
struct TestCase {
    name: String,
    initial: CpuState,
    #[serde(rename = "final")]
    final_state: CpuState,
    cycles: Vec<serde_json::Value>,
    #[serde(default)]
    ports: Vec<(u16, u8, String)>,
}

#[derive(Deserialize)]
struct CpuState {
    pc: u16,
    sp: u16,
    a: u8,
    b: u8,
    c: u8,
    d: u8,
    e: u8,
    f: u8,
    h: u8,
    l: u8,
    i: u8,
    r: u8,
    ix: u16,
    iy: u16,
    wz: u16,
    #[serde(rename = "af_")]
    af_alt: u16,
    #[serde(rename = "bc_")]
    bc_alt: u16,
    #[serde(rename = "de_")]
    de_alt: u16,
    #[serde(rename = "hl_")]
    hl_alt: u16,
    iff1: u8,
    iff2: u8,
    im: u8,
    #[serde(default)]
    q: u8,
    ram: Vec<(u16, u8)>,
}

fn setup(cpu: &mut Z80, bus: &mut TestBus, state: &CpuState, ports: &[(u16, u8, String)]) {
    bus.load_ram(&state.ram);
    bus.io_read_values.clear();
    for &(port, value, ref dir) in ports {
        if dir == "r" {
            bus.io_read_values.insert(port, value);
        }
    }

    let regs = cpu.registers_mut();
    regs.a = state.a;
    regs.f = state.f;
    regs.b = state.b;
    regs.c = state.c;
    regs.d = state.d;
    regs.e = state.e;
    regs.h = state.h;
    regs.l = state.l;
    regs.a_alt = (state.af_alt >> 8) as u8;
    regs.f_alt = state.af_alt as u8;
    regs.b_alt = (state.bc_alt >> 8) as u8;
    regs.c_alt = state.bc_alt as u8;
    regs.d_alt = (state.de_alt >> 8) as u8;
    regs.e_alt = state.de_alt as u8;
    regs.h_alt = (state.hl_alt >> 8) as u8;
    regs.l_alt = state.hl_alt as u8;
    regs.ix = state.ix;
    regs.iy = state.iy;
    regs.sp = state.sp;
    regs.i = state.i;
    regs.r = state.r;
    regs.wz = state.wz;
    regs.iff1 = state.iff1 != 0;
    regs.iff2 = state.iff2 != 0;
    regs.im = state.im;
    cpu.set_q(state.q);
    cpu.set_pc(state.pc);
}

fn compare(cpu: &Z80, bus: &TestBus, expected: &CpuState) -> Vec<String> {
    let mut errors = Vec::new();
    let regs = cpu.registers();

    check_u8(&mut errors, "A", regs.a, expected.a);
    check_u8(&mut errors, "F", regs.f, expected.f);
    check_u8(&mut errors, "B", regs.b, expected.b);
    check_u8(&mut errors, "C", regs.c, expected.c);
    check_u8(&mut errors, "D", regs.d, expected.d);
    check_u8(&mut errors, "E", regs.e, expected.e);
    check_u8(&mut errors, "H", regs.h, expected.h);
    check_u8(&mut errors, "L", regs.l, expected.l);

    let af_alt = u16::from(regs.a_alt) << 8 | u16::from(regs.f_alt);
    check_u16(&mut errors, "AF'", af_alt, expected.af_alt);
    let bc_alt = u16::from(regs.b_alt) << 8 | u16::from(regs.c_alt);
    check_u16(&mut errors, "BC'", bc_alt, expected.bc_alt);
    let de_alt = u16::from(regs.d_alt) << 8 | u16::from(regs.e_alt);
    check_u16(&mut errors, "DE'", de_alt, expected.de_alt);
    let hl_alt = u16::from(regs.h_alt) << 8 | u16::from(regs.l_alt);
    check_u16(&mut errors, "HL'", hl_alt, expected.hl_alt);

    check_u16(&mut errors, "IX", regs.ix, expected.ix);
    check_u16(&mut errors, "IY", regs.iy, expected.iy);
    check_u16(&mut errors, "SP", regs.sp, expected.sp);
    check_u16(&mut errors, "PC", regs.pc, expected.pc);
    check_u8(&mut errors, "I", regs.i, expected.i);
    check_u8(&mut errors, "R", regs.r, expected.r);
    check_u16(&mut errors, "WZ", regs.wz, expected.wz);

    if u8::from(regs.iff1) != expected.iff1 {
        errors.push(format!("IFF1: got {}, want {}", u8::from(regs.iff1), expected.iff1));
    }
    if u8::from(regs.iff2) != expected.iff2 {
        errors.push(format!("IFF2: got {}, want {}", u8::from(regs.iff2), expected.iff2));
    }
    check_u8(&mut errors, "IM", regs.im, expected.im);
    check_u8(&mut errors, "Q", cpu.q(), expected.q);

    for &(addr, expected_val) in &expected.ram {
        let actual_val = bus.peek(addr);
        if actual_val != expected_val {
            errors.push(format!(
                "RAM[${addr:04X}]: got ${actual_val:02X}, want ${expected_val:02X}"
            ));
        }
    }

    errors
}

fn check_u8(errors: &mut Vec<String>, name: &str, actual: u8, expected: u8) {
    if actual != expected {
        errors.push(format!("{name}: got ${actual:02X}, want ${expected:02X}"));
    }
}

fn check_u16(errors: &mut Vec<String>, name: &str, actual: u16, expected: u16) {
    if actual != expected {
        errors.push(format!("{name}: got ${actual:04X}, want ${expected:04X}"));
    }
}

#[test]
fn run_all_vectors() {
    let data_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data");
    let pattern = format!("{}/*.json", data_dir.display());

    let mut paths: Vec<_> = glob::glob(&pattern)
        .expect("valid glob pattern")
        .filter_map(Result::ok)
        .collect();
    paths.sort();
    assert!(!paths.is_empty(), "no vector files in {}", data_dir.display());

    let mut total_pass = 0u64;
    let mut failures: Vec<String> = Vec::new();

    for path in &paths {
        let data = fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
        let tests: Vec<TestCase> = serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse {}: {e}", path.display()));

        for test in &tests {
            let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
                let mut cpu = Z80::new();
                let mut bus = TestBus::new();
                setup(&mut cpu, &mut bus, &test.initial, &test.ports);

                let t_states = cpu.step(&mut bus);
                let mut errors = compare(&cpu, &bus, &test.final_state);
                let expected_t = test.cycles.len() as u32;
                if t_states != expected_t {
                    errors.push(format!("T-states: got {t_states}, want {expected_t}"));
                }
                errors
            }));

            match result {
                Ok(errors) if errors.is_empty() => total_pass += 1,
                Ok(errors) => failures.push(format!("[{}]: {}", test.name, errors.join(", "))),
                Err(_) => failures.push(format!("[{}]: panicked", test.name)),
            }
        }
    }

    assert!(
        failures.is_empty(),
        "{} passed, {} failed:\n{}",
        total_pass,
        failures.len(),
        failures.join("\n")
    );
}
