// (c) Roel Kluin, 2023, GPL v3

use crate::error::{KmerError, KmerResult};
use crate::kmerconst::KmerConst;
use crate::kmertable::{is_prime, KmerTable, Overflow, SmallCount, SMALL_MAX};
use crate::new_types::packed_key::{PackedKey, Word};
use bincode::Options;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::mem::size_of;
use std::path::Path;

const ENGINE: &str = "kmhash k-mer table";
const FORMAT_VERSION: u32 = 1;

/// The words following the header, each a native word.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Shape {
    pub(crate) modulus: u64,
    pub(crate) collision_modulus: u64,
    pub(crate) used: u64,
    pub(crate) tag_count: u64,
    pub(crate) bit_width: u64,
}

pub(crate) const SHAPE_BYTES: usize = 5 * size_of::<Word>();

/// The opening line: engine, word size and byte order of the writer.
pub(crate) fn header() -> String {
    let endian = if cfg!(target_endian = "little") {
        "little"
    } else {
        "big"
    };
    format!(
        "{} v{}, {}-byte words, {}-endian\n",
        ENGINE,
        FORMAT_VERSION,
        size_of::<Word>(),
        endian
    )
}

fn opts() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_native_endian()
}

pub(crate) struct Encoder<W: Write> {
    w: W,
}

impl<W: Write> Encoder<W> {
    pub(crate) fn new(w: W) -> Self {
        Encoder { w }
    }
    pub(crate) fn header(&mut self) -> KmerResult<()> {
        self.bytes(header().as_bytes())
    }
    pub(crate) fn shape(&mut self, shape: &Shape) -> KmerResult<()> {
        Ok(opts().serialize_into(&mut self.w, shape)?)
    }
    pub(crate) fn word(&mut self, v: u64) -> KmerResult<()> {
        Ok(opts().serialize_into(&mut self.w, &v)?)
    }
    pub(crate) fn signed(&mut self, v: i64) -> KmerResult<()> {
        Ok(opts().serialize_into(&mut self.w, &v)?)
    }
    pub(crate) fn bytes(&mut self, b: &[u8]) -> KmerResult<()> {
        Ok(self.w.write_all(b)?)
    }
    pub(crate) fn words(&mut self, words: &[Word]) -> KmerResult<()> {
        words.iter().try_for_each(|&w| self.word(w))
    }
    /// Negated entry count, then (key, count) pairs by ascending key.
    pub(crate) fn overflow(&mut self, overflow: &Overflow) -> KmerResult<()> {
        let mut entries: Vec<_> = overflow.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        self.signed(-(entries.len() as i64))?;
        for (key, count) in entries {
            self.words(key.words())?;
            self.word(*count)?;
        }
        Ok(())
    }
    pub(crate) fn finish(mut self) -> KmerResult<W> {
        self.w.flush()?;
        Ok(self.w)
    }
}

pub(crate) struct Decoder<R: io::Read> {
    r: R,
}

impl<R: io::Read> Decoder<R> {
    pub(crate) fn new(r: R) -> Self {
        Decoder { r }
    }
    pub(crate) fn header(&mut self) -> KmerResult<()> {
        let expect = header();
        let found = self.bytes(expect.len())?;
        if found != expect.as_bytes() {
            return Err(KmerError::format(format!(
                "header mismatch: expected {:?}, found {:?}",
                expect.trim_end(),
                String::from_utf8_lossy(&found).trim_end()
            )));
        }
        Ok(())
    }
    pub(crate) fn shape(&mut self) -> KmerResult<Shape> {
        Ok(opts().deserialize_from(&mut self.r)?)
    }
    pub(crate) fn word(&mut self) -> KmerResult<u64> {
        Ok(opts().deserialize_from(&mut self.r)?)
    }
    pub(crate) fn signed(&mut self) -> KmerResult<i64> {
        Ok(opts().deserialize_from(&mut self.r)?)
    }
    /// Exactly n bytes, or a format error.
    pub(crate) fn bytes(&mut self, n: usize) -> KmerResult<Vec<u8>> {
        let mut buf = Vec::new();
        io::Read::read_to_end(&mut io::Read::take(&mut self.r, n as u64), &mut buf)?;
        if buf.len() != n {
            return Err(KmerError::format("short read"));
        }
        Ok(buf)
    }
    pub(crate) fn key(&mut self, words: usize) -> KmerResult<PackedKey> {
        let mut key = PackedKey::from_words(&vec![0; words]);
        for w in key.words_mut() {
            *w = self.word()?;
        }
        Ok(key)
    }
    pub(crate) fn overflow(&mut self, words: usize, max_entries: usize) -> KmerResult<Overflow> {
        let n = self.signed()?;
        if n > 0 || n.unsigned_abs() > max_entries as u64 {
            return Err(KmerError::format(format!("bad overflow entry count {}", n)));
        }
        let n = n.unsigned_abs() as usize;
        let mut overflow = Overflow::with_capacity(n);
        for _ in 0..n {
            let key = self.key(words)?;
            let count = self.word()?;
            overflow.insert(key, count);
        }
        Ok(overflow)
    }
}

/// A table read back from disk.
pub struct Restored {
    pub table: KmerTable,
    pub metadata: Vec<u8>,
    /// Σ count² over the entries, for normalization.
    pub sum_of_squares: f64,
}

impl Shape {
    pub(crate) fn of(table: &KmerTable) -> Shape {
        Shape {
            modulus: table.modulus as u64,
            collision_modulus: table.collision_modulus as u64,
            used: table.used as u64,
            tag_count: table.tag_count() as u64,
            bit_width: table.kc.bitlen as u64,
        }
    }

    /// modulus, collision modulus and word count, checked for consistency.
    pub(crate) fn validate(&self) -> KmerResult<(usize, usize, KmerConst)> {
        let modulus = usize::try_from(self.modulus)
            .map_err(|_| KmerError::format("modulus does not fit a word"))?;
        let collision_modulus = self.collision_modulus as usize;
        if modulus < 3 || !is_prime(modulus) {
            return Err(KmerError::format(format!("modulus {} is not a prime >= 3", modulus)));
        }
        if collision_modulus == 0 || collision_modulus >= modulus {
            return Err(KmerError::format(format!(
                "collision modulus {} not below modulus {}",
                collision_modulus, modulus
            )));
        }
        if self.used == 0 || self.used > self.modulus {
            return Err(KmerError::format(format!("{} slots used of {}", self.used, modulus)));
        }
        if self.tag_count > 64 {
            return Err(KmerError::format(format!("{} tag counters", self.tag_count)));
        }
        let kc = KmerConst::from_bitlen(self.bit_width as usize)
            .map_err(|_| KmerError::format(format!("bit width {}", self.bit_width)))?;
        Ok((modulus, collision_modulus, kc))
    }
}

fn sum_of_squares(small: &[SmallCount], table: &KmerTable) -> f64 {
    let mut sum = 0.0;
    for (i, &c) in small.iter().enumerate() {
        if c == 0 {
            continue;
        }
        let mut v = u64::from(c) as f64;
        if c == SMALL_MAX {
            if let Some(extra) = table.overflow.get(&table.slot_key(i)) {
                v += *extra as f64;
            }
        }
        sum += v * v;
    }
    sum
}

impl KmerTable {
    pub fn save<P: AsRef<Path>>(&self, path: P, metadata: &[u8]) -> KmerResult<()> {
        let out = BufWriter::new(File::create(path.as_ref())?);
        if let Err(e) = self.save_to(out, metadata) {
            if let Err(rm) = std::fs::remove_file(path.as_ref()) {
                warn!("could not remove {}: {}", path.as_ref().display(), rm);
            }
            return Err(e);
        }
        info!(
            "saved {} k-mers ({} slots) to {}",
            self.size(),
            self.modulus,
            path.as_ref().display()
        );
        Ok(())
    }

    pub fn save_to<W: Write>(&self, w: W, metadata: &[u8]) -> KmerResult<()> {
        if !self.dumps.is_empty() {
            return Err(KmerError::config(
                "table has partial dumps on disk; merge them before saving",
            ));
        }
        let mut enc = Encoder::new(w);
        enc.header()?;
        enc.shape(&Shape::of(self))?;
        enc.bytes(&self.small)?;
        for i in (0..self.modulus).filter(|&i| self.is_occupied(i)) {
            enc.words(self.slot(i))?;
        }
        enc.words(self.invalid.words())?;
        enc.overflow(&self.overflow)?;
        for (tag, overflow) in self.tags.iter().zip(self.tag_overflow.iter()) {
            // empty slots may still hold tag counts after clear(false)
            let live: Vec<SmallCount> = tag
                .iter()
                .zip(self.small.iter())
                .map(|(&t, &s)| if s == 0 { 0 } else { t })
                .collect();
            let live_overflow: Overflow = (0..self.modulus)
                .filter(|&i| self.small[i] != 0 && tag[i] == SMALL_MAX)
                .filter_map(|i| {
                    let key = self.slot_key(i);
                    overflow.get(&key).map(|&extra| (key, extra))
                })
                .collect();
            enc.bytes(&live)?;
            enc.overflow(&live_overflow)?;
        }
        enc.word(metadata.len() as u64)?;
        enc.bytes(metadata)?;
        enc.finish()?;
        Ok(())
    }

    pub fn restore<P: AsRef<Path>>(path: P) -> KmerResult<Restored> {
        let input = BufReader::new(File::open(path.as_ref())?);
        let restored = KmerTable::restore_from(input)?;
        info!(
            "restored {} k-mers ({} slots) from {}",
            restored.table.size(),
            restored.table.modulus,
            path.as_ref().display()
        );
        Ok(restored)
    }

    pub fn restore_from<R: io::Read>(r: R) -> KmerResult<Restored> {
        let mut dec = Decoder::new(r);
        dec.header()?;
        let shape = dec.shape()?;
        let (modulus, collision_modulus, kc) = shape.validate()?;
        let words = kc.words;

        let small = dec.bytes(modulus)?;
        let live = small.iter().filter(|&&c| c != 0).count();
        if live as u64 + 1 != shape.used {
            return Err(KmerError::format(format!(
                "{} occupied slots, but {} used",
                live, shape.used
            )));
        }
        let mut keys = vec![0; modulus * words];
        for i in (0..modulus).filter(|&i| small[i] != 0) {
            for w in keys[i * words..(i + 1) * words].iter_mut() {
                *w = dec.word()?;
            }
        }
        let invalid = dec.key(words)?;
        if invalid.reverse_complement(&kc) >= invalid {
            return Err(KmerError::format("stored sentinel could be a canonical k-mer"));
        }
        for i in (0..modulus).filter(|&i| small[i] == 0) {
            keys[i * words..(i + 1) * words].copy_from_slice(invalid.words());
        }
        let overflow = dec.overflow(words, live)?;

        let tag_count = shape.tag_count as usize;
        let mut tags = Vec::with_capacity(tag_count);
        let mut tag_overflow = Vec::with_capacity(tag_count);
        for _ in 0..tag_count {
            let tag = dec.bytes(modulus)?;
            if tag.iter().zip(small.iter()).any(|(&t, &s)| t != 0 && s == 0) {
                return Err(KmerError::format("tag count for an empty slot"));
            }
            tags.push(tag);
            tag_overflow.push(dec.overflow(words, live)?);
        }
        let meta_len = dec.word()?;
        let metadata = dec.bytes(meta_len as usize)?;

        let mut table = KmerTable::alloc(kc, 0, 0);
        table.modulus = modulus;
        table.collision_modulus = collision_modulus;
        table.used = live + 1;
        table.keys = keys;
        table.tags = tags;
        table.tag_overflow = tag_overflow;
        table.overflow = overflow;
        table.invalid = invalid;
        let sum_of_squares = sum_of_squares(&small, &table);
        table.small = small;
        Ok(Restored {
            table,
            metadata,
            sum_of_squares,
        })
    }

    /// Restore, dropping entries seen fewer than min_count times. A cutoff above 1
    /// also shrinks the table to twice the surviving entries.
    pub fn restore_with_cutoff<P: AsRef<Path>>(path: P, min_count: u64) -> KmerResult<Restored> {
        let mut restored = KmerTable::restore(path)?;
        if min_count > 1 {
            let dropped = restored.table.rehash_with_cutoff(min_count)?;
            info!("dropped {} k-mers seen fewer than {} times", dropped, min_count);
            restored.sum_of_squares = restored.table.sum_of_squares();
        }
        Ok(restored)
    }
}
