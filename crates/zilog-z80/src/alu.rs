//! ALU operations for the Z80.
//!
//! Pure functions over operand bytes: each returns the result plus a
//! complete flag byte. Callers merge preserved bits (usually just carry)
//! themselves. The block-instruction helpers at the bottom implement the
//! undocumented flag tables exactly; they are not derivable from the
//! ordinary sign/zero/carry rules.

use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, sz53, sz53p};

/// Result of an ALU operation with flags.
#[derive(Debug, Clone, Copy)]
pub struct AluResult {
    pub value: u8,
    pub flags: u8,
}

/// Add two bytes with optional carry, returning result and flags.
#[must_use]
pub fn add8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u8::from(carry);
    let wide = u16::from(a) + u16::from(b) + u16::from(c);
    let result = wide as u8;

    let mut flags = sz53(result);
    if (a & 0x0F) + (b & 0x0F) + c > 0x0F {
        flags |= HF;
    }
    // Overflow: both operands same sign, result different sign
    if (a ^ b) & 0x80 == 0 && (a ^ result) & 0x80 != 0 {
        flags |= PF;
    }
    if wide > 0xFF {
        flags |= CF;
    }

    AluResult {
        value: result,
        flags,
    }
}

/// Subtract two bytes with optional borrow, returning result and flags.
#[must_use]
pub fn sub8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u8::from(carry);
    let result = a.wrapping_sub(b).wrapping_sub(c);

    let mut flags = NF | sz53(result);
    if (a & 0x0F) < (b & 0x0F) + c {
        flags |= HF;
    }
    // Overflow: operands differ in sign, result has the subtrahend's sign
    if (a ^ b) & 0x80 != 0 && (b ^ result) & 0x80 == 0 {
        flags |= PF;
    }
    if u16::from(a) < u16::from(b) + u16::from(c) {
        flags |= CF;
    }

    AluResult {
        value: result,
        flags,
    }
}

/// AND operation. H is always set.
#[must_use]
pub fn and8(a: u8, b: u8) -> AluResult {
    let result = a & b;
    AluResult {
        value: result,
        flags: HF | sz53p(result),
    }
}

/// OR operation.
#[must_use]
pub fn or8(a: u8, b: u8) -> AluResult {
    let result = a | b;
    AluResult {
        value: result,
        flags: sz53p(result),
    }
}

/// XOR operation.
#[must_use]
pub fn xor8(a: u8, b: u8) -> AluResult {
    let result = a ^ b;
    AluResult {
        value: result,
        flags: sz53p(result),
    }
}

/// Compare: subtract without storing the result, accumulator unmodified.
/// X/Y come from the operand, not the difference.
#[must_use]
pub fn cp8(a: u8, b: u8) -> AluResult {
    let mut result = sub8(a, b, false);
    result.flags = (result.flags & !(YF | XF)) | (b & (YF | XF));
    result.value = a;
    result
}

/// Increment byte. Fixed right operand of one, carry not produced.
#[must_use]
pub fn inc8(a: u8) -> AluResult {
    let result = a.wrapping_add(1);
    let mut flags = sz53(result);
    if a & 0x0F == 0x0F {
        flags |= HF;
    }
    if a == 0x7F {
        flags |= PF;
    }
    AluResult {
        value: result,
        flags,
    }
}

/// Decrement byte. Fixed right operand of one, carry not produced.
#[must_use]
pub fn dec8(a: u8) -> AluResult {
    let result = a.wrapping_sub(1);
    let mut flags = NF | sz53(result);
    if a & 0x0F == 0x00 {
        flags |= HF;
    }
    if a == 0x80 {
        flags |= PF;
    }
    AluResult {
        value: result,
        flags,
    }
}

/// BCD adjust after an add or subtract. The correction nibble is derived
/// from the incoming N/H/C flags and the accumulator value.
#[must_use]
pub fn daa(a: u8, f: u8) -> AluResult {
    let nf = f & NF != 0;
    let hf = f & HF != 0;
    let cf = f & CF != 0;

    let mut correction: u8 = 0;
    let mut new_cf = cf;
    if hf || (a & 0x0F) > 9 {
        correction |= 0x06;
    }
    if cf || a > 0x99 {
        correction |= 0x60;
        new_cf = true;
    }

    let result = if nf {
        a.wrapping_sub(correction)
    } else {
        a.wrapping_add(correction)
    };

    let new_hf = if nf {
        hf && (a & 0x0F) < 6
    } else {
        (a & 0x0F) > 9
    };

    let mut flags = sz53p(result);
    if nf {
        flags |= NF;
    }
    if new_cf {
        flags |= CF;
    }
    if new_hf {
        flags |= HF;
    }
    AluResult {
        value: result,
        flags,
    }
}

/// Negate the accumulator (0 - A).
#[must_use]
pub fn neg8(a: u8) -> AluResult {
    sub8(0, a, false)
}

/// Rotate left circular (bit 7 -> carry and bit 0).
#[must_use]
pub fn rlc8(a: u8) -> AluResult {
    let carry = a >> 7;
    rotate_result((a << 1) | carry, carry)
}

/// Rotate right circular (bit 0 -> carry and bit 7).
#[must_use]
pub fn rrc8(a: u8) -> AluResult {
    let carry = a & 1;
    rotate_result((a >> 1) | (carry << 7), carry)
}

/// Rotate left through carry.
#[must_use]
pub fn rl8(a: u8, old_carry: bool) -> AluResult {
    rotate_result((a << 1) | u8::from(old_carry), a >> 7)
}

/// Rotate right through carry.
#[must_use]
pub fn rr8(a: u8, old_carry: bool) -> AluResult {
    rotate_result((a >> 1) | (u8::from(old_carry) << 7), a & 1)
}

/// Shift left arithmetic (bit 0 = 0).
#[must_use]
pub fn sla8(a: u8) -> AluResult {
    rotate_result(a << 1, a >> 7)
}

/// Shift right arithmetic (bit 7 preserved).
#[must_use]
pub fn sra8(a: u8) -> AluResult {
    rotate_result((a >> 1) | (a & 0x80), a & 1)
}

/// Shift left logical (undocumented SLL - bit 0 = 1).
#[must_use]
pub fn sll8(a: u8) -> AluResult {
    rotate_result((a << 1) | 1, a >> 7)
}

/// Shift right logical (bit 7 = 0).
#[must_use]
pub fn srl8(a: u8) -> AluResult {
    rotate_result(a >> 1, a & 1)
}

fn rotate_result(result: u8, carry: u8) -> AluResult {
    let mut flags = sz53p(result);
    if carry != 0 {
        flags |= CF;
    }
    AluResult {
        value: result,
        flags,
    }
}

/// BIT test flags. `xy_source` supplies the undocumented X/Y bits: the
/// tested value for register forms, the high byte of the internal address
/// (WZ) for memory forms. Carry is preserved by the caller.
#[must_use]
pub fn bit_flags(value: u8, bit: u8, xy_source: u8) -> u8 {
    debug_assert!(bit < 8, "bit position out of range");
    let is_zero = value & (1 << bit) == 0;
    let mut flags = HF;
    if is_zero {
        flags |= ZF | PF;
    }
    if bit == 7 && !is_zero {
        flags |= SF;
    }
    flags | (xy_source & (XF | YF))
}

/// BCD-digit rotate left (RLD): low nibble of memory into A's low nibble,
/// A's low nibble into memory's low position, memory high nibble up.
/// Returns (new accumulator, new memory byte, flags without carry).
#[must_use]
pub fn rld_digits(a: u8, mem: u8) -> (u8, u8, u8) {
    let new_a = (a & 0xF0) | (mem >> 4);
    let new_mem = (mem << 4) | (a & 0x0F);
    (new_a, new_mem, sz53p(new_a))
}

/// BCD-digit rotate right (RRD).
#[must_use]
pub fn rrd_digits(a: u8, mem: u8) -> (u8, u8, u8) {
    let new_a = (a & 0xF0) | (mem & 0x0F);
    let new_mem = (a << 4) | (mem >> 4);
    (new_a, new_mem, sz53p(new_a))
}

/// 16-bit add for HL/IX/IY. S/Z/P preserved by the caller.
#[must_use]
pub fn add16(a: u16, b: u16) -> (u16, u8) {
    let wide = u32::from(a) + u32::from(b);
    let result = wide as u16;

    let mut flags = ((result >> 8) as u8) & (YF | XF);
    if (a & 0x0FFF) + (b & 0x0FFF) > 0x0FFF {
        flags |= HF;
    }
    if wide > 0xFFFF {
        flags |= CF;
    }
    (result, flags)
}

/// 16-bit add with carry. Zero flag uses the full 16-bit result.
#[must_use]
pub fn adc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let c = u32::from(carry);
    let wide = u32::from(a) + u32::from(b) + c;
    let result = wide as u16;

    let mut flags = ((result >> 8) as u8) & (YF | XF);
    if result & 0x8000 != 0 {
        flags |= SF;
    }
    if result == 0 {
        flags |= ZF;
    }
    if u32::from(a & 0x0FFF) + u32::from(b & 0x0FFF) + c > 0x0FFF {
        flags |= HF;
    }
    if (a ^ b) & 0x8000 == 0 && (a ^ result) & 0x8000 != 0 {
        flags |= PF;
    }
    if wide > 0xFFFF {
        flags |= CF;
    }
    (result, flags)
}

/// 16-bit subtract with borrow. Zero flag uses the full 16-bit result.
#[must_use]
pub fn sbc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let c = u16::from(carry);
    let result = a.wrapping_sub(b).wrapping_sub(c);

    let mut flags = NF | (((result >> 8) as u8) & (YF | XF));
    if result & 0x8000 != 0 {
        flags |= SF;
    }
    if result == 0 {
        flags |= ZF;
    }
    if (a & 0x0FFF) < (b & 0x0FFF) + c {
        flags |= HF;
    }
    if (a ^ b) & 0x8000 != 0 && (b ^ result) & 0x8000 == 0 {
        flags |= PF;
    }
    if u32::from(a) < u32::from(b) + u32::from(c) {
        flags |= CF;
    }
    (result, flags)
}

// ============================================================================
// Block instruction flag tables
// ============================================================================

/// LDI/LDD/LDIR/LDDR flags (non-repeating form). `n` is the transferred
/// byte plus A; X comes from bit 3 of n, Y from bit 1 of n.
#[must_use]
pub fn block_transfer_flags(f: u8, n: u8, bc_nonzero: bool) -> u8 {
    (f & (SF | ZF | CF))
        | (n & XF)
        | if n & 0x02 != 0 { YF } else { 0 }
        | if bc_nonzero { PF } else { 0 }
}

/// CPI/CPD/CPIR/CPDR flags (non-repeating form). `n` is A - value - H,
/// where H is the half-borrow of the comparison.
#[must_use]
pub fn block_compare_flags(f: u8, a: u8, value: u8, bc_nonzero: bool) -> u8 {
    let result = a.wrapping_sub(value);
    let hf = (a & 0x0F) < (value & 0x0F);
    let n = result.wrapping_sub(u8::from(hf));
    (f & CF)
        | NF
        | if result == 0 { ZF } else { 0 }
        | (result & SF)
        | if hf { HF } else { 0 }
        | (n & XF)
        | if n & 0x02 != 0 { YF } else { 0 }
        | if bc_nonzero { PF } else { 0 }
}

/// Repeating-form X/Y fixup for LDIR/LDDR/CPIR/CPDR: the undocumented
/// bits come from the high byte of PC after it has been wound back.
#[must_use]
pub fn block_repeat_xy(f: u8, pch: u8) -> u8 {
    (f & !(XF | YF)) | (pch & (XF | YF))
}

/// INI/IND/OUTI/OUTD flags (non-repeating form). `b` is B after the
/// decrement; `k` is the 9-bit sum that drives H/C and the parity input.
#[must_use]
pub fn block_io_flags(b: u8, value: u8, k: u16) -> u8 {
    (if b == 0 { ZF } else { 0 })
        | (b & (SF | YF | XF))
        | (if value & 0x80 != 0 { NF } else { 0 })
        | (if k > 0xFF { HF | CF } else { 0 })
        | (sz53p((k as u8 & 7) ^ b) & PF)
}

/// INIR/INDR/OTIR/OTDR flags for a repeating step. H and P/V are
/// recomputed from the would-be next B, X/Y come from PCH.
#[must_use]
pub fn block_io_repeat_flags(b: u8, value: u8, k: u16, pch: u8) -> u8 {
    let hcf = k > 0xFF;
    let nf = value & 0x80 != 0;
    let p = (k as u8 & 7) ^ b;
    let (hf, pf) = if hcf {
        if nf {
            (
                if b & 0x0F == 0 { HF } else { 0 },
                sz53p(p ^ (b.wrapping_sub(1) & 7)) & PF,
            )
        } else {
            (
                if b & 0x0F == 0x0F { HF } else { 0 },
                sz53p(p ^ (b.wrapping_add(1) & 7)) & PF,
            )
        }
    } else {
        (0, sz53p(p ^ (b & 7)) & PF)
    };
    (b & SF)
        | (pch & (XF | YF))
        | if nf { NF } else { 0 }
        | if hcf { CF } else { 0 }
        | hf
        | pf
}

/// Flags for IN r,(C): S/Z/P from the value, H and N cleared, C kept.
#[must_use]
pub fn in_flags(value: u8, f: u8) -> u8 {
    sz53p(value) | (f & CF)
}

/// Flags for LD A,I / LD A,R: P/V mirrors IFF2, C kept.
#[must_use]
pub fn ir_flags(value: u8, f: u8, iff2: bool) -> u8 {
    sz53(value) | (f & CF) | if iff2 { PF } else { 0 }
}

/// SCF undocumented X/Y: OR of the accumulator with bits that changed
/// if the previous instruction wrote F (the Q register effect).
#[must_use]
pub fn scf_flags(f: u8, a: u8, prev_q: u8) -> u8 {
    (f & (SF | ZF | PF)) | CF | (((prev_q ^ f) | a) & (XF | YF))
}

/// CCF: carry inverted, old carry into H, same X/Y rule as SCF.
#[must_use]
pub fn ccf_flags(f: u8, a: u8, prev_q: u8) -> u8 {
    let old_cf = f & CF;
    (f & (SF | ZF | PF))
        | (((prev_q ^ f) | a) & (XF | YF))
        | if old_cf != 0 { HF } else { CF }
}
