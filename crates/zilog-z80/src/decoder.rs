//! Byte-at-a-time opcode resolution.
//!
//! The decoder owns no bus access. The execution core feeds it one byte per
//! decode machine cycle and acts on the returned step: fetch another byte,
//! fetch the DDCB/FDCB displacement and sub-opcode, or build the program
//! for a resolved instruction.

use crate::catalog::{Catalog, Lookup, Resolution};

/// Prefix accumulation state between decode bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrefixState {
    #[default]
    None,
    Cb,
    Ed,
    Dd,
    Fd,
    DdCb,
    FdCb,
}

impl PrefixState {
    /// Whether the next decode byte is read as data rather than fetched
    /// with an M1 cycle. DDCB/FDCB displacement and sub-opcode bytes do
    /// not drive refresh.
    #[must_use]
    pub fn reads_as_data(self) -> bool {
        matches!(self, Self::DdCb | Self::FdCb)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Cb => "cb",
            Self::Ed => "ed",
            Self::Dd => "dd",
            Self::Fd => "fd",
            Self::DdCb => "ddcb",
            Self::FdCb => "fdcb",
        }
    }
}

/// What the execution core must do next to make progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStep {
    /// Fetch the next opcode byte with an M1 cycle.
    NeedFetch,
    /// Read the displacement byte (3 T-states, no refresh).
    NeedDisplacement,
    /// Read the sub-opcode byte (5 T-states, no refresh).
    NeedSubOpcode,
    /// Decoding is complete.
    Done(Lookup),
}

/// Decode state for the instruction currently being resolved.
#[derive(Debug, Default)]
pub struct Decoder {
    state: PrefixState,
    /// The byte that completed resolution.
    opcode: u8,
    /// DDCB/FDCB displacement.
    displacement: i8,
}

impl Decoder {
    /// Start decoding a new instruction.
    pub fn begin(&mut self) {
        self.state = PrefixState::None;
        self.opcode = 0;
        self.displacement = 0;
    }

    /// Feed one opcode byte.
    pub fn accept(&mut self, byte: u8) -> DecodeStep {
        match Catalog::get().resolve(self.state, byte) {
            Resolution::Pending(next) => {
                self.state = next;
                if next.reads_as_data() {
                    DecodeStep::NeedDisplacement
                } else {
                    DecodeStep::NeedFetch
                }
            }
            Resolution::Resolved(lookup) => {
                self.opcode = byte;
                DecodeStep::Done(lookup)
            }
        }
    }

    /// Feed the DDCB/FDCB displacement byte.
    pub fn accept_displacement(&mut self, byte: u8) -> DecodeStep {
        assert!(
            self.state.reads_as_data(),
            "displacement byte outside a DDCB/FDCB sequence"
        );
        self.displacement = byte as i8;
        DecodeStep::NeedSubOpcode
    }

    /// Prefix state the final byte resolved under.
    #[must_use]
    pub fn table(&self) -> PrefixState {
        self.state
    }

    /// The byte that completed resolution.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// DDCB/FDCB displacement, zero otherwise.
    #[must_use]
    pub fn displacement(&self) -> i8 {
        self.displacement
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_opcode_resolves_in_one_byte() {
        let mut d = Decoder::default();
        d.begin();
        let DecodeStep::Done(_) = d.accept(0x00) else {
            panic!("NOP must resolve immediately");
        };
        assert_eq!(d.table(), PrefixState::None);
    }

    #[test]
    fn cb_prefix_needs_one_more_fetch() {
        let mut d = Decoder::default();
        d.begin();
        assert_eq!(d.accept(0xCB), DecodeStep::NeedFetch);
        let DecodeStep::Done(_) = d.accept(0x11) else {
            panic!("CB 11 must resolve");
        };
        assert_eq!(d.table(), PrefixState::Cb);
    }

    #[test]
    fn ddcb_sequence_reads_displacement_then_sub_opcode() {
        let mut d = Decoder::default();
        d.begin();
        assert_eq!(d.accept(0xDD), DecodeStep::NeedFetch);
        assert_eq!(d.accept(0xCB), DecodeStep::NeedDisplacement);
        assert_eq!(d.accept_displacement(0xFE), DecodeStep::NeedSubOpcode);
        let DecodeStep::Done(_) = d.accept(0x06) else {
            panic!("DD CB d 06 must resolve");
        };
        assert_eq!(d.displacement(), -2);
        assert_eq!(d.table(), PrefixState::DdCb);
    }

    #[test]
    fn repeated_prefixes_keep_the_last_one() {
        let mut d = Decoder::default();
        d.begin();
        assert_eq!(d.accept(0xDD), DecodeStep::NeedFetch);
        assert_eq!(d.accept(0xFD), DecodeStep::NeedFetch);
        assert_eq!(d.accept(0xDD), DecodeStep::NeedFetch);
        let DecodeStep::Done(_) = d.accept(0x21) else {
            panic!("LD IX, nn must resolve");
        };
        assert_eq!(d.table(), PrefixState::Dd);
    }

    #[test]
    fn ed_cancels_an_index_prefix() {
        let mut d = Decoder::default();
        d.begin();
        assert_eq!(d.accept(0xDD), DecodeStep::NeedFetch);
        assert_eq!(d.accept(0xED), DecodeStep::NeedFetch);
        let DecodeStep::Done(lookup) = d.accept(0xB0) else {
            panic!("DD ED B0 must resolve");
        };
        let (desc, _) = Catalog::get().variant(lookup);
        assert_eq!(desc.mnemonic, "LDIR");
        assert_eq!(d.table(), PrefixState::Ed);
    }
}
