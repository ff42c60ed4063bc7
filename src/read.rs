// (c) Roel Kluin, 2023, GPL v3

use crate::error::{KmerError, KmerResult};
use crate::new_types::twobit::code;

/// Sanger offset of ascii quality strings.
pub const PHRED_OFFSET: u8 = 33;
pub const DEFAULT_MIN_PHRED: u8 = 20;

/// What the k-mer engine needs to see of a read.
pub trait SeqRead {
    fn len(&self) -> usize;

    /// 0..=3 for ACGT, NOT_ACGT for anything else.
    fn base(&self, i: usize) -> u8;

    fn quality_start(&self) -> usize {
        0
    }
    fn quality_stop(&self) -> usize {
        self.len()
    }

    fn is_high_quality(&self, i: usize) -> bool;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An owned read: sequence, optional phred scores and a quality-clip window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Read {
    name: String,
    seq: Vec<u8>,
    phred: Option<Vec<u8>>,
    quality_start: usize,
    quality_stop: usize,
    min_phred: u8,
}

impl Read {
    pub fn new<S: Into<String>>(name: S, seq: Vec<u8>) -> Self {
        let quality_stop = seq.len();
        Read {
            name: name.into(),
            seq,
            phred: None,
            quality_start: 0,
            quality_stop,
            min_phred: DEFAULT_MIN_PHRED,
        }
    }

    /// qual holds ascii scores, one per base.
    pub fn with_quality<S: Into<String>>(name: S, seq: Vec<u8>, qual: &[u8]) -> KmerResult<Self> {
        let mut read = Read::new(name, seq);
        if qual.len() != read.seq.len() {
            return Err(KmerError::input(format!(
                "{}: {} bases but {} quality scores",
                read.name,
                read.seq.len(),
                qual.len()
            )));
        }
        let mut phred = Vec::with_capacity(qual.len());
        for &q in qual {
            phred.push(q.checked_sub(PHRED_OFFSET).ok_or_else(|| {
                KmerError::input(format!("{}: quality {:#x} below offset", read.name, q))
            })?);
        }
        read.phred = Some(phred);
        Ok(read)
    }

    pub fn set_quality_window(&mut self, start: usize, stop: usize) -> KmerResult<()> {
        if start > stop || stop > self.seq.len() {
            return Err(KmerError::input(format!(
                "{}: quality window {}..{} outside of read length {}",
                self.name,
                start,
                stop,
                self.seq.len()
            )));
        }
        self.quality_start = start;
        self.quality_stop = stop;
        Ok(())
    }

    pub fn set_min_phred(&mut self, min_phred: u8) {
        self.min_phred = min_phred;
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn seq(&self) -> &[u8] {
        &self.seq
    }
    pub fn phred(&self) -> Option<&[u8]> {
        self.phred.as_deref()
    }
}

impl SeqRead for Read {
    fn len(&self) -> usize {
        self.seq.len()
    }
    #[inline(always)]
    fn base(&self, i: usize) -> u8 {
        code(self.seq[i])
    }
    fn quality_start(&self) -> usize {
        self.quality_start
    }
    fn quality_stop(&self) -> usize {
        self.quality_stop
    }
    /// Without scores (fasta) every base counts as high quality.
    fn is_high_quality(&self, i: usize) -> bool {
        match &self.phred {
            Some(phred) => phred[i] >= self.min_phred,
            None => true,
        }
    }
}
