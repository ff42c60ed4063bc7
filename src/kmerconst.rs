// (c) Roel Kluin, 2023, GPL v3

use crate::error::{KmerError, KmerResult};
use crate::new_types::packed_key::{PackedKey, Word, WORD_BITS};
use crate::new_types::twobit::TwoBit;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// Every process derives the same sentinel for a given width.
const SENTINEL_SEED: u64 = 40164;

/// Constants derived from the k-mer length, shared by all keys of one table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KmerConst {
    pub kmerlen: usize,
    pub bitlen: usize,
    /// words per key
    pub words: usize,
    /// clears the bits above bitlen in words[0]
    pub high_mask: Word,
    /// position of the leftmost base within words[0]
    pub bit_shift: u32,
}

impl KmerConst {
    pub fn new(kmerlen: usize) -> KmerResult<Self> {
        if kmerlen == 0 {
            return Err(KmerError::config("k-mer length must be at least 1"));
        }
        let bitlen = kmerlen * 2;
        let words = (bitlen + WORD_BITS - 1) / WORD_BITS;
        let top_bits = bitlen - (words - 1) * WORD_BITS;
        let high_mask = if top_bits == WORD_BITS {
            !0
        } else {
            (1 << top_bits) - 1
        };
        Ok(KmerConst {
            kmerlen,
            bitlen,
            words,
            high_mask,
            bit_shift: (top_bits - 2) as u32,
        })
    }

    pub fn from_bitlen(bitlen: usize) -> KmerResult<Self> {
        if bitlen == 0 || bitlen & 1 != 0 {
            return Err(KmerError::config(format!(
                "bit width {bitlen} is not a positive even number"
            )));
        }
        KmerConst::new(bitlen / 2)
    }

    /// A key whose reverse complement is lower, so it is never canonical and can
    /// mark empty slots.
    pub fn invalid_key(&self) -> PackedKey {
        let mut rng = StdRng::seed_from_u64(SENTINEL_SEED ^ self.bitlen as u64);
        loop {
            let mut key = PackedKey::empty(self);
            for _ in 0..self.kmerlen {
                key.push_back(self, TwoBit::new(rng.gen_range(0..4)));
            }
            if key.reverse_complement(self) < key {
                return key;
            }
        }
    }
}
