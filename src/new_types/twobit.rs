use super::packed_key::Word;
use derive_more::Into;
use std::fmt;

/// Code returned for anything that is not one of ACGT.
pub const NOT_ACGT: u8 = 4;

const fn build_code_table() -> [u8; 256] {
    let mut lut = [NOT_ACGT; 256];
    lut[b'A' as usize] = 0;
    lut[b'C' as usize] = 1;
    lut[b'G' as usize] = 2;
    lut[b'T' as usize] = 3;
    lut[b'a' as usize] = 0;
    lut[b'c' as usize] = 1;
    lut[b'g' as usize] = 2;
    lut[b't' as usize] = 3;
    lut
}

static CODE: [u8; 256] = build_code_table();

/// ASCII nucleotide to its two bit code, or NOT_ACGT.
#[inline(always)]
pub fn code(ascii: u8) -> u8 {
    CODE[ascii as usize]
}

/// A: 0, C: 1, G: 2, T: 3. The complement of b is 3 - b.
#[derive(new, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Into)]
pub struct TwoBit(u8);

impl TwoBit {
    pub fn from_ascii(ascii: u8) -> Option<TwoBit> {
        TwoBit::from_code(code(ascii))
    }
    /// Accepts 0..=3, anything else is not a base.
    #[inline(always)]
    pub fn from_code(c: u8) -> Option<TwoBit> {
        if c < 4 {
            Some(TwoBit(c))
        } else {
            None
        }
    }
    #[inline(always)]
    pub fn complement(self) -> TwoBit {
        TwoBit(3 - (self.0 & 3))
    }
    #[inline(always)]
    pub(crate) fn as_word(self) -> Word {
        Word::from(self.0 & 3)
    }
    pub fn to_ascii(self) -> u8 {
        b"ACGT"[usize::from(self.0 & 3)]
    }
}

impl fmt::Debug for TwoBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.to_ascii() as char, self.0 & 3)
    }
}
