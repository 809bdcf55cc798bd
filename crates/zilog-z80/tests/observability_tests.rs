//! State queries and lifecycle-event subscription.

use std::cell::RefCell;
use std::rc::Rc;

use emu_core::{EVENT_ALL, EventKind, Observable, SimpleBus, Value};
use zilog_z80::Z80;

fn cpu_at(bus: &mut SimpleBus, origin: u16, program: &[u8]) -> Z80 {
    bus.load(origin, program);
    let mut cpu = Z80::new();
    cpu.set_pc(origin);
    cpu
}

#[test]
fn every_advertised_path_answers() {
    let cpu = Z80::new();
    for path in cpu.query_paths() {
        assert!(cpu.query(path).is_some(), "no answer for {path}");
    }
    assert_eq!(cpu.query("no.such.path"), None);
}

#[test]
fn queries_reflect_register_state() {
    let mut bus = SimpleBus::new();
    let mut cpu = cpu_at(&mut bus, 0, &[0x3E, 0x42, 0xA7, 0xAF]); // LD A,0x42; AND A; XOR A
    cpu.step(&mut bus);
    assert_eq!(cpu.query("a"), Some(Value::U8(0x42)));
    assert_eq!(cpu.query("pc"), Some(Value::U16(0x0002)));
    cpu.step(&mut bus); // AND A rewrites F from a nonzero result
    assert_eq!(cpu.query("flags.z"), Some(Value::Bool(false)));
    cpu.step(&mut bus);
    assert_eq!(cpu.query("a"), Some(Value::U8(0x00)));
    assert_eq!(cpu.query("flags.z"), Some(Value::Bool(true)));
    assert_eq!(cpu.query("state"), Some(Value::String("running".into())));
    // Between instructions the next fetch cycle is already staged.
    assert_eq!(
        cpu.query("cycle.kind"),
        Some(Value::String("opcode-fetch".into()))
    );
    assert_eq!(cpu.query("prefix"), Some(Value::String("none".into())));
}

#[test]
fn events_fire_once_per_boundary() {
    let mut bus = SimpleBus::new();
    let mut cpu = cpu_at(&mut bus, 0, &[0x00]); // NOP
    let counts = Rc::new(RefCell::new([0u32; 4]));
    let seen = Rc::clone(&counts);
    cpu.subscribe(
        EVENT_ALL,
        Box::new(move |ev| {
            let slot = match ev.kind {
                EventKind::TStateBoundary => 0,
                EventKind::MachineCycleEnd => 1,
                EventKind::FetchEnd => 2,
                EventKind::InstructionEnd => 3,
            };
            seen.borrow_mut()[slot] += 1;
        }),
    );
    cpu.step(&mut bus);
    let counts = counts.borrow();
    assert_eq!(counts[0], 8, "one boundary per half-T-state");
    assert_eq!(counts[1], 1, "one machine cycle");
    assert_eq!(counts[2], 1, "one fetch");
    assert_eq!(counts[3], 1, "one instruction");
}

#[test]
fn masked_subscription_sees_only_its_kinds() {
    let mut bus = SimpleBus::new();
    let mut cpu = cpu_at(&mut bus, 0, &[0x3E, 0x42, 0x00]); // LD A,0x42; NOP
    let ends = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&ends);
    cpu.subscribe(
        EventKind::InstructionEnd.mask(),
        Box::new(move |ev| {
            assert_eq!(ev.kind, EventKind::InstructionEnd);
            seen.borrow_mut().push((ev.registers.pc, ev.registers.a));
        }),
    );
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    // The snapshot shows state as of each boundary.
    assert_eq!(*ends.borrow(), vec![(0x0002, 0x42), (0x0003, 0x42)]);
}

#[test]
fn machine_cycle_events_track_the_cycle_index() {
    let mut bus = SimpleBus::new();
    let mut cpu = cpu_at(&mut bus, 0, &[0x3E, 0x42]); // LD A,n: fetch + read
    let cycles = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&cycles);
    cpu.subscribe(
        EventKind::MachineCycleEnd.mask(),
        Box::new(move |ev| seen.borrow_mut().push(ev.cycle)),
    );
    cpu.step(&mut bus);
    assert_eq!(*cycles.borrow(), vec![0, 1]);
}
