// (c) Roel Kluin, 2023, GPL v3

use crate::kmerconst::KmerConst;
use crate::new_types::packed_key::PackedKey;
use crate::new_types::twobit::TwoBit;
use crate::read::SeqRead;

/// Canonical k-mers of one read, left to right, restricted to the read's quality
/// window. Windows containing a non-ACGT base are skipped.
pub struct KmerStream<'a, R: SeqRead + ?Sized> {
    kc: &'a KmerConst,
    read: &'a R,
    pos: usize,
    stop: usize,
    filled: usize,
    fwd: PackedKey,
    rc: PackedKey,
}

impl<'a, R: SeqRead + ?Sized> KmerStream<'a, R> {
    pub fn new(kc: &'a KmerConst, read: &'a R) -> Self {
        let stop = read.quality_stop().min(read.len());
        KmerStream {
            kc,
            read,
            pos: read.quality_start().min(stop),
            stop,
            filled: 0,
            fwd: PackedKey::empty(kc),
            rc: PackedKey::empty(kc),
        }
    }

    /// Like the iterator, but each key comes with the offset of its first base.
    pub fn positioned(self) -> Positioned<'a, R> {
        Positioned(self)
    }

    fn next_positioned(&mut self) -> Option<(usize, PackedKey)> {
        let k = self.kc.kmerlen;
        while self.pos < self.stop {
            let c = self.read.base(self.pos);
            self.pos += 1;
            match TwoBit::from_code(c) {
                Some(b2) => {
                    self.fwd.push_back(self.kc, b2);
                    self.rc.push_front(self.kc, b2.complement());
                    self.filled += 1;
                    if self.filled >= k {
                        let key = PackedKey::canonical(&self.fwd, &self.rc).clone();
                        return Some((self.pos - k, key));
                    }
                }
                // restart the seed after the N
                None => self.filled = 0,
            }
        }
        None
    }
}

impl<'a, R: SeqRead + ?Sized> Iterator for KmerStream<'a, R> {
    type Item = PackedKey;

    fn next(&mut self) -> Option<PackedKey> {
        self.next_positioned().map(|(_, key)| key)
    }
}

pub struct Positioned<'a, R: SeqRead + ?Sized>(KmerStream<'a, R>);

impl<'a, R: SeqRead + ?Sized> Iterator for Positioned<'a, R> {
    type Item = (usize, PackedKey);

    fn next(&mut self) -> Option<(usize, PackedKey)> {
        self.0.next_positioned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::Read;
    use rand::{thread_rng, Rng};

    fn dna(kc: &KmerConst, key: &PackedKey) -> String {
        key.to_dna(kc)
    }

    #[test]
    fn canonical_trimers() {
        let kc = KmerConst::new(3).unwrap();
        let read = Read::new("r", b"ACGTACG".to_vec());
        let kmers: Vec<_> = KmerStream::new(&kc, &read).map(|k| dna(&kc, &k)).collect();
        assert_eq!(kmers, vec!["ACG", "ACG", "GTA", "GTA", "ACG"]);
    }
    #[test]
    fn skips_non_acgt() {
        let kc = KmerConst::new(3).unwrap();
        let read = Read::new("r", b"AACNAAAGNNTT".to_vec());
        let kmers: Vec<_> = KmerStream::new(&kc, &read)
            .positioned()
            .map(|(p, k)| (p, dna(&kc, &k)))
            .collect();
        assert_eq!(
            kmers,
            vec![(0, "AAC".to_string()), (4, "AAA".to_string()), (5, "AAG".to_string())]
        );
    }
    #[test]
    fn honors_quality_window() {
        let kc = KmerConst::new(2).unwrap();
        let mut read = Read::new("r", b"AAAACCCC".to_vec());
        read.set_quality_window(3, 6).unwrap();
        let pos: Vec<_> = KmerStream::new(&kc, &read).positioned().map(|(p, _)| p).collect();
        assert_eq!(pos, vec![3, 4]);
    }
    #[test]
    fn too_short() {
        let kc = KmerConst::new(5).unwrap();
        let read = Read::new("r", b"ACGT".to_vec());
        assert_eq!(KmerStream::new(&kc, &read).count(), 0);
    }
    #[test]
    fn count_bound() {
        let mut rng = thread_rng();
        for _ in 0..50 {
            let k = rng.gen_range(1..40);
            let kc = KmerConst::new(k).unwrap();
            let len = k + rng.gen_range(0..100);
            let clean: Vec<u8> = (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect();
            let read = Read::new("clean", clean.clone());
            assert_eq!(KmerStream::new(&kc, &read).count(), len - k + 1);

            let mut dirty = clean;
            let n = rng.gen_range(0..len);
            dirty[n] = b'N';
            let read = Read::new("dirty", dirty);
            assert!(KmerStream::new(&kc, &read).count() < len - k + 1);
        }
    }
    #[test]
    fn long_kmers_match_reference() {
        let mut rng = thread_rng();
        let k = rng.gen_range(33..90);
        let kc = KmerConst::new(k).unwrap();
        let seq: Vec<u8> = (0..k + 64).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect();
        let read = Read::new("long", seq.clone());
        for (p, key) in KmerStream::new(&kc, &read).positioned() {
            let expect = PackedKey::from_dna(&kc, &seq[p..p + k]).unwrap();
            assert_eq!(key, expect.to_canonical(&kc));
        }
    }
}
