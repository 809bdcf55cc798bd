//! Z80 register set and register naming.

/// 8-bit register names, including the undocumented index-register halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg8 {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
    IxH,
    IxL,
    IyH,
    IyL,
    I,
    R,
}

/// 16-bit register names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg16 {
    Af,
    Bc,
    De,
    Hl,
    Ix,
    Iy,
    Sp,
    Pc,
    /// WZ/MEMPTR - internal temporary register.
    Wz,
}

impl Reg16 {
    /// High half of a splittable pair.
    ///
    /// The high/low mapping is fixed per pair (BC↔B/C, IX↔IXh/IXl, ...).
    /// AF, SP, PC and WZ have no architectural 8-bit halves; asking for
    /// one is a programming error and aborts the run.
    #[must_use]
    pub fn high(self) -> Reg8 {
        match self {
            Self::Bc => Reg8::B,
            Self::De => Reg8::D,
            Self::Hl => Reg8::H,
            Self::Ix => Reg8::IxH,
            Self::Iy => Reg8::IyH,
            Self::Af | Self::Sp | Self::Pc | Self::Wz => {
                panic!("{self:?} has no high/low register halves")
            }
        }
    }

    /// Low half of a splittable pair. Same restrictions as [`Reg16::high`].
    #[must_use]
    pub fn low(self) -> Reg8 {
        match self {
            Self::Bc => Reg8::C,
            Self::De => Reg8::E,
            Self::Hl => Reg8::L,
            Self::Ix => Reg8::IxL,
            Self::Iy => Reg8::IyL,
            Self::Af | Self::Sp | Self::Pc | Self::Wz => {
                panic!("{self:?} has no high/low register halves")
            }
        }
    }
}

/// Z80 registers snapshot for observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    // Main registers
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,

    // Alternate registers
    pub a_alt: u8,
    pub f_alt: u8,
    pub b_alt: u8,
    pub c_alt: u8,
    pub d_alt: u8,
    pub e_alt: u8,
    pub h_alt: u8,
    pub l_alt: u8,

    // Index registers
    pub ix: u16,
    pub iy: u16,

    // Other registers
    pub sp: u16,
    pub pc: u16,
    pub i: u8,
    pub r: u8,

    /// WZ/MEMPTR - internal temporary register.
    /// Affects undocumented X/Y flags in BIT instructions and some jumps.
    pub wz: u16,

    // Interrupt state
    pub iff1: bool,
    pub iff2: bool,
    pub im: u8,

    // Halt latch (mirrors the /HALT output pin)
    pub halted: bool,
}

impl Registers {
    /// Get AF register pair.
    #[must_use]
    pub const fn af(&self) -> u16 {
        (self.a as u16) << 8 | self.f as u16
    }

    /// Get BC register pair.
    #[must_use]
    pub const fn bc(&self) -> u16 {
        (self.b as u16) << 8 | self.c as u16
    }

    /// Get DE register pair.
    #[must_use]
    pub const fn de(&self) -> u16 {
        (self.d as u16) << 8 | self.e as u16
    }

    /// Get HL register pair.
    #[must_use]
    pub const fn hl(&self) -> u16 {
        (self.h as u16) << 8 | self.l as u16
    }

    /// Set AF register pair.
    pub fn set_af(&mut self, value: u16) {
        self.a = (value >> 8) as u8;
        self.f = value as u8;
    }

    /// Set BC register pair.
    pub fn set_bc(&mut self, value: u16) {
        self.b = (value >> 8) as u8;
        self.c = value as u8;
    }

    /// Set DE register pair.
    pub fn set_de(&mut self, value: u16) {
        self.d = (value >> 8) as u8;
        self.e = value as u8;
    }

    /// Set HL register pair.
    pub fn set_hl(&mut self, value: u16) {
        self.h = (value >> 8) as u8;
        self.l = value as u8;
    }

    /// Read an 8-bit register by name.
    #[must_use]
    pub fn get8(&self, r: Reg8) -> u8 {
        match r {
            Reg8::A => self.a,
            Reg8::B => self.b,
            Reg8::C => self.c,
            Reg8::D => self.d,
            Reg8::E => self.e,
            Reg8::H => self.h,
            Reg8::L => self.l,
            Reg8::IxH => (self.ix >> 8) as u8,
            Reg8::IxL => self.ix as u8,
            Reg8::IyH => (self.iy >> 8) as u8,
            Reg8::IyL => self.iy as u8,
            Reg8::I => self.i,
            Reg8::R => self.r,
        }
    }

    /// Write an 8-bit register by name.
    pub fn set8(&mut self, r: Reg8, value: u8) {
        match r {
            Reg8::A => self.a = value,
            Reg8::B => self.b = value,
            Reg8::C => self.c = value,
            Reg8::D => self.d = value,
            Reg8::E => self.e = value,
            Reg8::H => self.h = value,
            Reg8::L => self.l = value,
            Reg8::IxH => self.ix = (self.ix & 0x00FF) | (u16::from(value) << 8),
            Reg8::IxL => self.ix = (self.ix & 0xFF00) | u16::from(value),
            Reg8::IyH => self.iy = (self.iy & 0x00FF) | (u16::from(value) << 8),
            Reg8::IyL => self.iy = (self.iy & 0xFF00) | u16::from(value),
            Reg8::I => self.i = value,
            Reg8::R => self.r = value,
        }
    }

    /// Read a 16-bit register by name.
    #[must_use]
    pub fn get16(&self, rr: Reg16) -> u16 {
        match rr {
            Reg16::Af => self.af(),
            Reg16::Bc => self.bc(),
            Reg16::De => self.de(),
            Reg16::Hl => self.hl(),
            Reg16::Ix => self.ix,
            Reg16::Iy => self.iy,
            Reg16::Sp => self.sp,
            Reg16::Pc => self.pc,
            Reg16::Wz => self.wz,
        }
    }

    /// Write a 16-bit register by name.
    pub fn set16(&mut self, rr: Reg16, value: u16) {
        match rr {
            Reg16::Af => self.set_af(value),
            Reg16::Bc => self.set_bc(value),
            Reg16::De => self.set_de(value),
            Reg16::Hl => self.set_hl(value),
            Reg16::Ix => self.ix = value,
            Reg16::Iy => self.iy = value,
            Reg16::Sp => self.sp = value,
            Reg16::Pc => self.pc = value,
            Reg16::Wz => self.wz = value,
        }
    }

    /// Swap HL and DE (EX DE,HL).
    pub fn ex_de_hl(&mut self) {
        core::mem::swap(&mut self.d, &mut self.h);
        core::mem::swap(&mut self.e, &mut self.l);
    }

    /// Swap AF with the shadow AF' (EX AF,AF').
    pub fn ex_af_af(&mut self) {
        core::mem::swap(&mut self.a, &mut self.a_alt);
        core::mem::swap(&mut self.f, &mut self.f_alt);
    }

    /// Swap BC/DE/HL with the shadow set (EXX).
    pub fn exx(&mut self) {
        core::mem::swap(&mut self.b, &mut self.b_alt);
        core::mem::swap(&mut self.c, &mut self.c_alt);
        core::mem::swap(&mut self.d, &mut self.d_alt);
        core::mem::swap(&mut self.e, &mut self.e_alt);
        core::mem::swap(&mut self.h, &mut self.h_alt);
        core::mem::swap(&mut self.l, &mut self.l_alt);
    }

    /// Increment R (lower 7 bits only, bit 7 preserved).
    pub fn refresh(&mut self) {
        self.r = (self.r & 0x80) | (self.r.wrapping_add(1) & 0x7F);
    }

    /// Power-on register values: AF and SP all-ones, everything else zero.
    #[must_use]
    pub fn power_on() -> Self {
        Self {
            a: 0xFF,
            f: 0xFF,
            sp: 0xFFFF,
            ..Self::default()
        }
    }
}
