//! Semantics tests for individual instructions.
//!
//! Each test assembles a short program into a flat RAM bus, runs until
//! HALT, and checks the architectural state it left behind.

use emu_core::{Cpu, SimpleBus};
use zilog_z80::{CF, HF, PF, Z80, ZF};

/// Run until the CPU halts. Panics if it never does.
fn run_until_halt(cpu: &mut Z80, bus: &mut SimpleBus) {
    for _ in 0..100_000 {
        cpu.tick(bus);
        if cpu.is_halted() {
            return;
        }
    }
    panic!("program never halted, pc={:#06X}", cpu.pc());
}

fn run_program(bus: &mut SimpleBus, program: &[u8]) -> Z80 {
    bus.load(0x0000, program);
    let mut cpu = Z80::new();
    cpu.set_pc(0x0000);
    run_until_halt(&mut cpu, bus);
    cpu
}

#[test]
fn nop_advances_pc_only() {
    let mut bus = SimpleBus::new();
    let cpu = run_program(&mut bus, &[0x00, 0x76]);
    assert_eq!(cpu.pc(), 0x0002);
    assert_eq!(cpu.a(), 0xFF); // power-on value untouched
}

#[test]
fn ld_immediate_8_and_16() {
    let mut bus = SimpleBus::new();
    // LD A,0x42; LD BC,0x1234; HALT
    let cpu = run_program(&mut bus, &[0x3E, 0x42, 0x01, 0x34, 0x12, 0x76]);
    assert_eq!(cpu.a(), 0x42);
    assert_eq!(cpu.bc(), 0x1234);
}

#[test]
fn add_a_c() {
    let mut bus = SimpleBus::new();
    // LD A,0x44; LD C,0x11; ADD A,C; HALT
    let cpu = run_program(&mut bus, &[0x3E, 0x44, 0x0E, 0x11, 0x81, 0x76]);
    assert_eq!(cpu.a(), 0x55);
    assert_eq!(cpu.f() & (CF | HF | ZF), 0);
}

#[test]
fn and_with_register() {
    let mut bus = SimpleBus::new();
    // LD A,0xC3; LD B,0x7B; AND B; HALT
    let cpu = run_program(&mut bus, &[0x3E, 0xC3, 0x06, 0x7B, 0xA0, 0x76]);
    assert_eq!(cpu.a(), 0x43);
    assert_ne!(cpu.f() & HF, 0, "AND always sets H");
}

#[test]
fn or_with_register() {
    let mut bus = SimpleBus::new();
    // LD A,0x12; LD H,0x48; OR H; HALT
    let cpu = run_program(&mut bus, &[0x3E, 0x12, 0x26, 0x48, 0xB4, 0x76]);
    assert_eq!(cpu.a(), 0x5A);
}

#[test]
fn cpl_inverts_accumulator() {
    let mut bus = SimpleBus::new();
    // LD A,0xB4; CPL; HALT
    let cpu = run_program(&mut bus, &[0x3E, 0xB4, 0x2F, 0x76]);
    assert_eq!(cpu.a(), 0x4B);
    assert_ne!(cpu.f() & HF, 0);
}

#[test]
fn scf_then_adc_carries_in() {
    let mut bus = SimpleBus::new();
    // LD A,5; LD B,10; SCF; ADC A,B; HALT
    let cpu = run_program(&mut bus, &[0x3E, 0x05, 0x06, 0x0A, 0x37, 0x88, 0x76]);
    assert_eq!(cpu.a(), 16);
    assert_eq!(cpu.f() & CF, 0);
    assert_ne!(cpu.f() & HF, 0);
}

#[test]
fn daa_corrects_bcd_addition() {
    let mut bus = SimpleBus::new();
    // LD A,0x15; ADD A,0x27; DAA; HALT
    let cpu = run_program(&mut bus, &[0x3E, 0x15, 0xC6, 0x27, 0x27, 0x76]);
    assert_eq!(cpu.a(), 0x42);
}

#[test]
fn inc_dec_through_hl() {
    let mut bus = SimpleBus::new();
    bus.load(0x4000, &[0x0F]);
    // LD HL,0x4000; INC (HL); INC (HL); DEC (HL); HALT
    let cpu = run_program(&mut bus, &[0x21, 0x00, 0x40, 0x34, 0x34, 0x35, 0x76]);
    assert_eq!(bus.peek(0x4000), 0x10);
    assert_eq!(cpu.hl(), 0x4000);
}

#[test]
fn push_pop_round_trip() {
    let mut bus = SimpleBus::new();
    // LD SP,0x8000; LD BC,0x1234; PUSH BC; LD BC,0; POP BC; HALT
    let cpu = run_program(
        &mut bus,
        &[0x31, 0x00, 0x80, 0x01, 0x34, 0x12, 0xC5, 0x01, 0x00, 0x00, 0xC1, 0x76],
    );
    assert_eq!(cpu.bc(), 0x1234);
    assert_eq!(cpu.sp(), 0x8000);
    assert_eq!(bus.peek(0x7FFF), 0x12);
    assert_eq!(bus.peek(0x7FFE), 0x34);
}

#[test]
fn call_and_ret() {
    let mut bus = SimpleBus::new();
    // 0x0000: LD SP,0x8000; CALL 0x0010; LD A,0x99; HALT
    bus.load(0x0000, &[0x31, 0x00, 0x80, 0xCD, 0x10, 0x00, 0x3E, 0x99, 0x76]);
    // 0x0010: LD B,0x55; RET
    bus.load(0x0010, &[0x06, 0x55, 0xC9]);

    let mut cpu = Z80::new();
    cpu.set_pc(0x0000);
    run_until_halt(&mut cpu, &mut bus);

    assert_eq!(cpu.a(), 0x99, "execution resumed after RET");
    assert_eq!(cpu.bc() >> 8, 0x55, "subroutine ran");
    assert_eq!(cpu.sp(), 0x8000);
}

#[test]
fn rst_vectors_to_page_zero() {
    let mut bus = SimpleBus::new();
    // 0x0000: LD SP,0x8000; RST 08h
    bus.load(0x0000, &[0x31, 0x00, 0x80, 0xCF]);
    // 0x0008: LD A,0x77; HALT
    bus.load(0x0008, &[0x3E, 0x77, 0x76]);

    let mut cpu = Z80::new();
    cpu.set_pc(0x0000);
    run_until_halt(&mut cpu, &mut bus);

    assert_eq!(cpu.a(), 0x77);
    // Return address of the RST is the byte after it.
    assert_eq!(bus.peek(0x7FFE), 0x04);
    assert_eq!(bus.peek(0x7FFF), 0x00);
}

#[test]
fn djnz_loops_b_times() {
    let mut bus = SimpleBus::new();
    // XOR A; LD B,3; loop: INC A; DJNZ loop; HALT
    let cpu = run_program(&mut bus, &[0xAF, 0x06, 0x03, 0x3C, 0x10, 0xFD, 0x76]);
    assert_eq!(cpu.a(), 3);
    assert_eq!(cpu.bc() >> 8, 0);
}

#[test]
fn jr_conditional_skips_when_false() {
    let mut bus = SimpleBus::new();
    // XOR A (sets Z); JR NZ,+2 (not taken); LD A,0x11; HALT
    let cpu = run_program(&mut bus, &[0xAF, 0x20, 0x02, 0x3E, 0x11, 0x76]);
    assert_eq!(cpu.a(), 0x11);
}

#[test]
fn jp_conditional_taken() {
    let mut bus = SimpleBus::new();
    // LD A,1; OR A (clears Z); JP NZ,0x0010; HALT
    bus.load(0x0000, &[0x3E, 0x01, 0xB7, 0xC2, 0x10, 0x00, 0x76]);
    bus.load(0x0010, &[0x3E, 0x22, 0x76]);

    let mut cpu = Z80::new();
    cpu.set_pc(0x0000);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.a(), 0x22);
}

#[test]
fn exchange_instructions() {
    let mut bus = SimpleBus::new();
    // LD HL,0x1111; LD DE,0x2222; EX DE,HL; HALT
    let cpu = run_program(&mut bus, &[0x21, 0x11, 0x11, 0x11, 0x22, 0x22, 0xEB, 0x76]);
    assert_eq!(cpu.hl(), 0x2222);
    assert_eq!(cpu.de(), 0x1111);
}

#[test]
fn ex_sp_hl_swaps_stack_top() {
    let mut bus = SimpleBus::new();
    bus.load(0x8000, &[0x34, 0x12]);
    // LD SP,0x8000; LD HL,0xABCD; EX (SP),HL; HALT
    let cpu = run_program(&mut bus, &[0x31, 0x00, 0x80, 0x21, 0xCD, 0xAB, 0xE3, 0x76]);
    assert_eq!(cpu.hl(), 0x1234);
    assert_eq!(bus.peek(0x8000), 0xCD);
    assert_eq!(bus.peek(0x8001), 0xAB);
    assert_eq!(cpu.sp(), 0x8000);
}

#[test]
fn indexed_load_store() {
    let mut bus = SimpleBus::new();
    // LD IX,0x4000; LD (IX+5),0x99; LD A,(IX+5); HALT
    let cpu = run_program(
        &mut bus,
        &[0xDD, 0x21, 0x00, 0x40, 0xDD, 0x36, 0x05, 0x99, 0xDD, 0x7E, 0x05, 0x76],
    );
    assert_eq!(bus.peek(0x4005), 0x99);
    assert_eq!(cpu.a(), 0x99);
}

#[test]
fn undocumented_index_halves() {
    let mut bus = SimpleBus::new();
    // LD B,0xAB; LD IXH,B (DD 60); LD IXL,0xCD (DD 2E CD); HALT
    let cpu = run_program(&mut bus, &[0x06, 0xAB, 0xDD, 0x60, 0xDD, 0x2E, 0xCD, 0x76]);
    assert_eq!(cpu.ix(), 0xABCD);
}

#[test]
fn undocumented_sll_shifts_one_in() {
    let mut bus = SimpleBus::new();
    // LD B,0x80; SLL B (CB 30); HALT
    let cpu = run_program(&mut bus, &[0x06, 0x80, 0xCB, 0x30, 0x76]);
    assert_eq!(cpu.bc() >> 8, 0x01);
    assert_ne!(cpu.f() & CF, 0);
}

#[test]
fn indexed_cb_copies_result_to_register() {
    let mut bus = SimpleBus::new();
    bus.load(0x4002, &[0x80]);
    // LD IX,0x4000; RLC (IX+2)->B (DD CB 02 00); HALT
    let cpu = run_program(&mut bus, &[0xDD, 0x21, 0x00, 0x40, 0xDD, 0xCB, 0x02, 0x00, 0x76]);
    assert_eq!(bus.peek(0x4002), 0x01);
    assert_eq!(cpu.bc() >> 8, 0x01);
}

#[test]
fn set_then_bit_then_res() {
    let mut bus = SimpleBus::new();
    // XOR A; SET 3,A; BIT 3,A; HALT
    let cpu = run_program(&mut bus, &[0xAF, 0xCB, 0xDF, 0xCB, 0x5F, 0x76]);
    assert_eq!(cpu.a(), 0x08);
    assert_eq!(cpu.f() & ZF, 0, "bit 3 is set");

    let mut bus = SimpleBus::new();
    // XOR A; SET 3,A; RES 3,A; BIT 3,A; HALT
    let cpu = run_program(&mut bus, &[0xAF, 0xCB, 0xDF, 0xCB, 0x9F, 0xCB, 0x5F, 0x76]);
    assert_eq!(cpu.a(), 0x00);
    assert_ne!(cpu.f() & ZF, 0, "bit 3 is clear again");
}

#[test]
fn ldir_copies_block() {
    let mut bus = SimpleBus::new();
    bus.load(0x4000, &[0xDE, 0xAD, 0xBE]);
    // LD HL,0x4000; LD DE,0x5000; LD BC,3; LDIR; HALT
    let cpu = run_program(
        &mut bus,
        &[0x21, 0x00, 0x40, 0x11, 0x00, 0x50, 0x01, 0x03, 0x00, 0xED, 0xB0, 0x76],
    );
    assert_eq!(bus.peek(0x5000), 0xDE);
    assert_eq!(bus.peek(0x5001), 0xAD);
    assert_eq!(bus.peek(0x5002), 0xBE);
    assert_eq!(cpu.bc(), 0);
    assert_eq!(cpu.hl(), 0x4003);
    assert_eq!(cpu.de(), 0x5003);
    assert_eq!(cpu.f() & PF, 0, "P/V clears when BC exhausts");
}

#[test]
fn cpir_stops_on_match() {
    let mut bus = SimpleBus::new();
    bus.load(0x4000, &[0x01, 0x02, 0x03, 0x04]);
    // LD A,3; LD HL,0x4000; LD BC,4; CPIR; HALT
    let cpu = run_program(
        &mut bus,
        &[0x3E, 0x03, 0x21, 0x00, 0x40, 0x01, 0x04, 0x00, 0xED, 0xB1, 0x76],
    );
    assert_eq!(cpu.hl(), 0x4003, "HL one past the match");
    assert_eq!(cpu.bc(), 1);
    assert_ne!(cpu.f() & ZF, 0, "match found");
}

#[test]
fn out_and_in_ports() {
    let mut bus = SimpleBus::new();
    bus.set_io_in(0x42, 0xAB);
    // LD A,0x5A; OUT (0x10),A; IN A,(0x42); HALT
    let cpu = run_program(&mut bus, &[0x3E, 0x5A, 0xD3, 0x10, 0xDB, 0x42, 0x76]);
    assert_eq!(bus.io_out(0x10), 0x5A);
    assert_eq!(cpu.a(), 0xAB);
}

#[test]
fn in_r_c_sets_flags() {
    let mut bus = SimpleBus::new();
    bus.set_io_in(0x42, 0x00);
    // LD BC,0x0042; IN D,(C); HALT
    let cpu = run_program(&mut bus, &[0x01, 0x42, 0x00, 0xED, 0x50, 0x76]);
    assert_eq!(cpu.de() >> 8, 0x00);
    assert_ne!(cpu.f() & ZF, 0);
    assert_ne!(cpu.f() & PF, 0, "zero has even parity");
}

#[test]
fn rld_rotates_bcd_digits() {
    let mut bus = SimpleBus::new();
    bus.load(0x4000, &[0x34]);
    // LD A,0x12; LD HL,0x4000; RLD; HALT
    let cpu = run_program(&mut bus, &[0x3E, 0x12, 0x21, 0x00, 0x40, 0xED, 0x6F, 0x76]);
    assert_eq!(cpu.a(), 0x13);
    assert_eq!(bus.peek(0x4000), 0x42);
}

#[test]
fn neg_negates_accumulator() {
    let mut bus = SimpleBus::new();
    // LD A,1; NEG; HALT
    let cpu = run_program(&mut bus, &[0x3E, 0x01, 0xED, 0x44, 0x76]);
    assert_eq!(cpu.a(), 0xFF);
    assert_ne!(cpu.f() & CF, 0);
}

#[test]
fn sbc_hl_de() {
    let mut bus = SimpleBus::new();
    // OR A (clear carry); LD HL,0x1000; LD DE,1; SBC HL,DE; HALT
    let cpu = run_program(
        &mut bus,
        &[0xB7, 0x21, 0x00, 0x10, 0x11, 0x01, 0x00, 0xED, 0x52, 0x76],
    );
    assert_eq!(cpu.hl(), 0x0FFF);
}

#[test]
fn ld_ext_16bit() {
    let mut bus = SimpleBus::new();
    // LD HL,0xBEEF; LD (0x4000),HL; LD DE,(0x4000); HALT
    let cpu = run_program(
        &mut bus,
        &[0x21, 0xEF, 0xBE, 0x22, 0x00, 0x40, 0xED, 0x5B, 0x00, 0x40, 0x76],
    );
    assert_eq!(bus.peek(0x4000), 0xEF);
    assert_eq!(bus.peek(0x4001), 0xBE);
    assert_eq!(cpu.de(), 0xBEEF);
}

#[test]
fn ld_a_i_reflects_iff2() {
    let mut bus = SimpleBus::new();
    // LD A,0x55; LD I,A; XOR A; LD A,I; HALT
    let cpu = run_program(&mut bus, &[0x3E, 0x55, 0xED, 0x47, 0xAF, 0xED, 0x57, 0x76]);
    assert_eq!(cpu.a(), 0x55);
    assert_eq!(cpu.f() & PF, 0, "P/V mirrors IFF2, disabled at power-on");
}

#[test]
fn ed_hole_is_a_nop() {
    let mut bus = SimpleBus::new();
    // LD A,7; ED 00 (undocumented NOP); HALT
    let cpu = run_program(&mut bus, &[0x3E, 0x07, 0xED, 0x00, 0x76]);
    assert_eq!(cpu.a(), 0x07);
    assert_eq!(cpu.pc(), 0x0005);
}
