// (c) Roel Kluin, 2023, GPL v3

use crate::error::{KmerError, KmerResult};
use crate::kmerstream::KmerStream;
use crate::kmertable::KmerTable;
use crate::read::SeqRead;
use bitvec::prelude::*;

/// Which table counts mark a k-mer as repetitive, and how many such k-mers must
/// cover a base before it is masked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskParams {
    /// counts in low..high are repeats
    pub low: u64,
    pub high: u64,
    pub coverage: u32,
    /// high quality bases needed on both sides to exempt a masked region
    pub anchor: Option<usize>,
}

impl MaskParams {
    pub fn new(low: u64, high: u64, coverage: u32) -> KmerResult<Self> {
        if low >= high {
            return Err(KmerError::config(format!("empty count window {}..{}", low, high)));
        }
        if coverage == 0 {
            return Err(KmerError::config("mask coverage must be at least 1"));
        }
        Ok(MaskParams {
            low,
            high,
            coverage,
            anchor: None,
        })
    }

    pub fn with_anchor(mut self, anchor: usize) -> Self {
        self.anchor = if anchor == 0 { None } else { Some(anchor) };
        self
    }

    fn in_window(&self, count: u64) -> bool {
        self.low <= count && count < self.high
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Evidence {
    Repeat,
    Conditional,
    NonRepeat,
}

/// Per base, the number of k-mers covering it whose count is in the window.
pub fn evidence<R: SeqRead + ?Sized>(table: &KmerTable, read: &R, params: &MaskParams) -> Vec<u32> {
    let k = table.kmerlen();
    let mut diff = vec![0i64; read.len() + 1];
    for (start, key) in KmerStream::new(table.kmerconst(), read).positioned() {
        if params.in_window(table.value(&key)) {
            diff[start] += 1;
            diff[start + k] -= 1;
        }
    }
    let mut acc = 0;
    diff.iter()
        .take(read.len())
        .map(|d| {
            acc += d;
            acc as u32
        })
        .collect()
}

fn classify(ev: u32, params: &MaskParams) -> Evidence {
    match ev {
        0 => Evidence::NonRepeat,
        e if e >= params.coverage => Evidence::Repeat,
        _ => Evidence::Conditional,
    }
}

/// Repeats, plus any conditional run that lies between two repeats. A conditional
/// run after a repeat is held until it meets a repeat (masked) or a real
/// non-repeat or the read end (unmasked).
fn extended_mask(ev: &[u32], params: &MaskParams) -> BitVec {
    let mut mask = bitvec![0; ev.len()];
    let mut after_repeat = false;
    let mut pending: Option<usize> = None;
    for (p, &e) in ev.iter().enumerate() {
        match classify(e, params) {
            Evidence::Repeat => {
                if let Some(s) = pending.take() {
                    mask[s..p].fill(true);
                }
                mask.set(p, true);
                after_repeat = true;
            }
            Evidence::Conditional => {
                if after_repeat && pending.is_none() {
                    pending = Some(p);
                }
            }
            Evidence::NonRepeat => {
                pending = None;
                after_repeat = false;
            }
        }
    }
    mask
}

fn high_quality_unmasked<R: SeqRead + ?Sized>(read: &R, mask: &BitSlice, p: usize) -> bool {
    !mask[p] && read.is_high_quality(p)
}

/// Lift masked regions that have at least `anchor` unmasked high quality bases on
/// either side.
fn exempt_anchored<R: SeqRead + ?Sized>(read: &R, mask: &mut BitVec, anchor: usize) {
    let len = mask.len();
    // prefix[p] = unmasked high quality bases in 0..p
    let mut prefix = Vec::with_capacity(len + 1);
    prefix.push(0usize);
    for p in 0..len {
        let last = prefix[p];
        prefix.push(last + usize::from(high_quality_unmasked(read, mask, p)));
    }
    let total = prefix[len];
    let mut exempt = Vec::new();
    let mut p = 0;
    while p < len {
        if !mask[p] {
            p += 1;
            continue;
        }
        let s = p;
        while p < len && mask[p] {
            p += 1;
        }
        if prefix[s] >= anchor && total - prefix[p] >= anchor {
            exempt.push(s..p);
        }
    }
    for r in exempt {
        mask[r].fill(false);
    }
}

/// Per base: true where the read is masked as repetitive.
pub fn repeat_mask<R: SeqRead + ?Sized>(table: &KmerTable, read: &R, params: &MaskParams) -> BitVec {
    let ev = evidence(table, read, params);
    let mut mask = extended_mask(&ev, params);
    if let Some(anchor) = params.anchor {
        exempt_anchored(read, &mut mask, anchor);
    }
    mask
}

/// High quality bases outside of repeats. A conditional run after a repeat only
/// counts once it ends in a non-repeat.
pub fn unique_phred_count<R: SeqRead + ?Sized>(table: &KmerTable, read: &R, params: &MaskParams) -> usize {
    let ev = evidence(table, read, params);
    let mask = extended_mask(&ev, params);
    (0..read.len())
        .filter(|&p| high_quality_unmasked(read, &mask, p))
        .count()
}

/// The sequence with masked bases in lower case.
pub fn apply_mask(seq: &[u8], mask: &BitSlice) -> Vec<u8> {
    seq.iter()
        .zip(mask.iter().by_vals())
        .map(|(&b, m)| if m { b.to_ascii_lowercase() } else { b })
        .collect()
}
