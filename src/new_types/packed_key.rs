use super::twobit::TwoBit;
use crate::kmerconst::KmerConst;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

pub type Word = u64;
pub const WORD_BITS: usize = Word::BITS as usize;

/// Two bits per base, most significant word first. The leftmost base sits in the
/// high bits of words[0]; bits above the k-mer's bit width are always zero, so the
/// derived ordering on the words is the numeric ordering of the k-mer.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackedKey {
    words: SmallVec<[Word; 2]>,
}

impl PackedKey {
    pub fn empty(kc: &KmerConst) -> Self {
        PackedKey {
            words: SmallVec::from_elem(0, kc.words),
        }
    }
    pub fn from_words(words: &[Word]) -> Self {
        PackedKey {
            words: SmallVec::from_slice(words),
        }
    }
    pub fn words(&self) -> &[Word] {
        &self.words
    }
    pub(crate) fn words_mut(&mut self) -> &mut [Word] {
        &mut self.words
    }

    /// Shift two bits toward the high end and add b at the bottom.
    #[inline]
    pub fn push_back(&mut self, kc: &KmerConst, b: TwoBit) {
        // XXX function is hot
        let n = self.words.len();
        for i in 0..n - 1 {
            self.words[i] = (self.words[i] << 2) | (self.words[i + 1] >> (WORD_BITS - 2));
        }
        self.words[n - 1] = (self.words[n - 1] << 2) | b.as_word();
        self.words[0] &= kc.high_mask;
    }

    /// Shift two bits toward the low end and add b as the leftmost base.
    #[inline]
    pub fn push_front(&mut self, kc: &KmerConst, b: TwoBit) {
        let n = self.words.len();
        for i in (1..n).rev() {
            self.words[i] = (self.words[i] >> 2) | (self.words[i - 1] << (WORD_BITS - 2));
        }
        self.words[0] = (self.words[0] >> 2) | (b.as_word() << kc.bit_shift);
    }

    /// Lower of the two orientations.
    #[inline]
    pub fn canonical<'a>(a: &'a PackedKey, b: &'a PackedKey) -> &'a PackedKey {
        if b < a {
            b
        } else {
            a
        }
    }

    /// Xor of the words; used for the primary slot and the probe step.
    #[inline(always)]
    pub fn xor_hash(&self) -> Word {
        self.words.iter().fold(0, |h, w| h ^ w)
    }

    /// The base at offset i, counted from the left.
    pub fn basepair(&self, kc: &KmerConst, i: usize) -> TwoBit {
        dbg_assert!(i < kc.kmerlen);
        let bit = kc.bitlen - 2 - 2 * i;
        let w = self.words[self.words.len() - 1 - bit / WORD_BITS];
        TwoBit::new(((w >> (bit % WORD_BITS)) & 3) as u8)
    }

    pub fn reverse_complement(&self, kc: &KmerConst) -> PackedKey {
        let mut rc = PackedKey::empty(kc);
        for i in (0..kc.kmerlen).rev() {
            rc.push_back(kc, self.basepair(kc, i).complement());
        }
        rc
    }

    pub fn to_canonical(&self, kc: &KmerConst) -> PackedKey {
        let rc = self.reverse_complement(kc);
        if rc < *self {
            rc
        } else {
            self.clone()
        }
    }

    pub fn is_palindrome(&self, kc: &KmerConst) -> bool {
        self.reverse_complement(kc) == *self
    }

    /// None if seq does not have exactly kmerlen ACGT bases.
    pub fn from_dna(kc: &KmerConst, seq: &[u8]) -> Option<PackedKey> {
        if seq.len() != kc.kmerlen {
            return None;
        }
        let mut key = PackedKey::empty(kc);
        for &b in seq {
            key.push_back(kc, TwoBit::from_ascii(b)?);
        }
        Some(key)
    }

    pub fn to_dna(&self, kc: &KmerConst) -> String {
        (0..kc.kmerlen)
            .map(|i| self.basepair(kc, i).to_ascii() as char)
            .collect()
    }
}

impl fmt::Debug for PackedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, w) in self.words.iter().enumerate() {
            if i != 0 {
                write!(f, " ")?;
            }
            write!(f, "{:#x}", w)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{thread_rng, Rng};

    fn random_dna(len: usize) -> Vec<u8> {
        let mut rng = thread_rng();
        (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
    }

    #[test]
    fn test_u8() {
        let kc = KmerConst::new(4).unwrap();
        let mut key = PackedKey::empty(&kc);
        for i in 0..4 {
            key.push_back(&kc, TwoBit::new(i & 3));
        }
        assert_eq!(key.words(), &[0x1B]); // ACGT => 0123 (in 2bits)
        assert_eq!(key.to_dna(&kc), "ACGT");
    }
    #[test]
    fn test_u64() {
        let kc = KmerConst::new(32).unwrap();
        let mut key = PackedKey::empty(&kc);
        for i in 0..32 {
            key.push_back(&kc, TwoBit::new(i & 3));
        }
        assert_eq!(key.words(), &[0x1B1B1B1B1B1B1B1B]);
    }
    #[test]
    fn high_bits_masked() {
        let kc = KmerConst::new(3).unwrap();
        let mut key = PackedKey::empty(&kc);
        for _ in 0..10 {
            key.push_back(&kc, TwoBit::new(3));
        }
        assert_eq!(key.words(), &[0x3F]);
        for _ in 0..10 {
            key.push_front(&kc, TwoBit::new(1));
        }
        assert_eq!(key.words(), &[0x15]);
    }
    #[test]
    fn multi_word_carry() {
        let kc = KmerConst::new(33).unwrap();
        assert_eq!(kc.words, 2);
        let dna = b"GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAT";
        let key = PackedKey::from_dna(&kc, dna).unwrap();
        assert_eq!(key.words(), &[0x2, 0x3]);
        assert_eq!(key.to_dna(&kc).as_bytes(), dna);

        let mut shifted = key.clone();
        shifted.push_back(&kc, TwoBit::new(0));
        // G falls off, the T moves up one base.
        assert_eq!(shifted.words(), &[0x0, 0xC]);
    }
    #[test]
    fn front_and_back_agree_on_revcmp() {
        let mut rng = thread_rng();
        let kmerlen = rng.gen_range(1..100);
        let kc = KmerConst::new(kmerlen).unwrap();
        let dna = random_dna(kmerlen + rng.gen_range(0..50));
        let mut fwd = PackedKey::empty(&kc);
        let mut rc = PackedKey::empty(&kc);
        for &b in &dna {
            let b2 = TwoBit::from_ascii(b).unwrap();
            fwd.push_back(&kc, b2);
            rc.push_front(&kc, b2.complement());
        }
        assert_eq!(fwd.reverse_complement(&kc), rc);
        assert_eq!(rc.reverse_complement(&kc), fwd);
        assert_eq!(fwd.to_dna(&kc).as_bytes(), &dna[dna.len() - kmerlen..]);
    }
    #[test]
    fn canonical_is_orientation_free() {
        let mut rng = thread_rng();
        for _ in 0..100 {
            let kmerlen = rng.gen_range(1..70);
            let kc = KmerConst::new(kmerlen).unwrap();
            let key = PackedKey::from_dna(&kc, &random_dna(kmerlen)).unwrap();
            let rc = key.reverse_complement(&kc);
            assert_eq!(key.to_canonical(&kc), rc.to_canonical(&kc));
            assert_eq!(PackedKey::canonical(&key, &rc), &key.to_canonical(&kc));
        }
    }
    #[test]
    fn ordering_is_lexicographic_on_bases() {
        let kc = KmerConst::new(40).unwrap();
        let a = PackedKey::from_dna(&kc, &[b"A".repeat(39), b"T".to_vec()].concat()).unwrap();
        let c = PackedKey::from_dna(&kc, &[b"C".to_vec(), b"A".repeat(39)].concat()).unwrap();
        assert!(a < c);
    }
    #[test]
    fn palindrome() {
        let kc = KmerConst::new(4).unwrap();
        assert!(PackedKey::from_dna(&kc, b"ACGT").unwrap().is_palindrome(&kc));
        assert!(!PackedKey::from_dna(&kc, b"AACC").unwrap().is_palindrome(&kc));
    }
    #[test]
    fn xor_hash_uses_all_words() {
        let a = PackedKey::from_words(&[0x1, 0x0]);
        let b = PackedKey::from_words(&[0x0, 0x1]);
        let c = PackedKey::from_words(&[0x1, 0x1]);
        assert_eq!(a.xor_hash(), b.xor_hash());
        assert_eq!(c.xor_hash(), 0);
        assert_ne!(PackedKey::from_words(&[0x3, 0x0]).xor_hash(), 0);
    }
}
