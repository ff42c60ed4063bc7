// (c) Roel Kluin, 2023, GPL v3

use crate::error::{KmerError, KmerResult};
use crate::kmerconst::KmerConst;
use crate::kmertable::{KmerTable, Overflow, SmallCount, SMALL_MAX};
use crate::new_types::packed_key::{PackedKey, Word};
use crate::persist::{header, Decoder, Encoder, Shape, SHAPE_BYTES};
use itertools::Itertools;
use log::info;
use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, SeekFrom};
use std::mem::size_of;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// What to do when a new key does not fit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FullPolicy {
    /// report the full table
    #[default]
    Reject,
    /// drop all keys seen once
    CleanHash,
    /// write a sorted dump next to this path prefix and start over
    TmpFile(PathBuf),
}

pub type Entry = (PackedKey, u64);

impl KmerTable {
    pub(crate) fn make_room(&mut self) -> KmerResult<()> {
        match self.policy.clone() {
            FullPolicy::Reject => Err(KmerError::CapacityExceeded {
                capacity: self.capacity(),
            }),
            FullPolicy::CleanHash => {
                let removed = self.retain(|_, c| c > 1);
                if removed == 0 {
                    return Err(KmerError::CapacityExceeded {
                        capacity: self.capacity(),
                    });
                }
                info!("table full: removed {} singleton k-mers", removed);
                Ok(())
            }
            FullPolicy::TmpFile(prefix) => {
                let dump = self.write_dump(&prefix)?;
                info!(
                    "table full: dumped {} k-mers to {}",
                    self.size(),
                    dump.path().display()
                );
                self.dumps.push(dump);
                self.clear(true);
                Ok(())
            }
        }
    }

    /// Laid out like a save of a table whose n slots are exactly the occupied
    /// ones, by ascending key: the shape records modulus n, no collision modulus
    /// and no tags, and the metadata blob is empty.
    fn write_dump(&self, prefix: &Path) -> KmerResult<NamedTempFile> {
        let (dir, name) = if prefix.is_dir() {
            (prefix, "kmhash")
        } else {
            let dir = prefix
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = prefix.file_name().and_then(|n| n.to_str()).unwrap_or("kmhash");
            (dir, name)
        };
        let file = tempfile::Builder::new()
            .prefix(name)
            .suffix(".dump")
            .tempfile_in(dir)?;

        let order = self.sorted_slots();
        let shape = Shape {
            modulus: order.len() as u64,
            collision_modulus: 0,
            used: order.len() as u64 + 1,
            tag_count: 0,
            bit_width: self.kc.bitlen as u64,
        };

        let mut enc = Encoder::new(BufWriter::new(file.as_file()));
        enc.header()?;
        enc.shape(&shape)?;
        let counts: Vec<SmallCount> = order.iter().map(|&i| self.small[i]).collect();
        enc.bytes(&counts)?;
        for &i in order.iter() {
            enc.words(self.slot(i))?;
        }
        enc.words(self.invalid.words())?;
        enc.overflow(&self.overflow)?;
        enc.word(0)?;
        enc.finish()?;
        Ok(file)
    }

    pub fn dump_count(&self) -> usize {
        self.dumps.len()
    }

    /// All entries, those in dumps included, by ascending key. Keys that occur in
    /// several dumps are summed.
    pub fn merged_entries(&self) -> KmerResult<impl Iterator<Item = KmerResult<Entry>> + '_> {
        let mut sources: Vec<Box<dyn Iterator<Item = KmerResult<Entry>> + '_>> =
            Vec::with_capacity(self.dumps.len() + 1);
        for dump in self.dumps.iter() {
            sources.push(Box::new(DumpReader::open(dump, &self.kc)?));
        }
        sources.push(Box::new(self.sorted_entries().into_iter().map(Ok)));

        let merged = sources
            .into_iter()
            .kmerge_by(|a, b| match (a, b) {
                (Ok(x), Ok(y)) => x.0 < y.0,
                // errors first, so they are seen
                (Err(_), _) => true,
                (Ok(_), Err(_)) => false,
            })
            .coalesce(|a, b| match (a, b) {
                (Ok(x), Ok(y)) if x.0 == y.0 => Ok(Ok((x.0, x.1 + y.1))),
                pair => Err(pair),
            });
        Ok(merged)
    }

    /// Merge the dumps back into the table, which is rebuilt for capacity.
    pub fn absorb_dumps(&mut self, capacity: usize) -> KmerResult<()> {
        if self.dumps.is_empty() {
            return Ok(());
        }
        let entries: Vec<Entry> = self.merged_entries()?.collect::<KmerResult<_>>()?;
        if entries.len() > capacity {
            return Err(KmerError::CapacityExceeded { capacity });
        }
        let n = self.dumps.len();
        let mut fresh = KmerTable::alloc(self.kc.clone(), capacity, 0);
        fresh.policy = self.policy.clone();
        for (key, count) in entries.iter() {
            fresh.put(key, *count, &[]);
        }
        *self = fresh;
        info!("merged {} dumps into {} k-mers", n, self.size());
        Ok(())
    }
}

/// Streams the entries of one dump. The overflow map follows the keys, so it is
/// read up front through a second handle.
struct DumpReader {
    dec: Decoder<BufReader<File>>,
    words: usize,
    counts: Vec<SmallCount>,
    overflow: Overflow,
    i: usize,
    failed: bool,
}

impl DumpReader {
    fn open(dump: &NamedTempFile, kc: &KmerConst) -> KmerResult<Self> {
        let mut dec = Decoder::new(BufReader::new(dump.reopen()?));
        dec.header()?;
        let shape = dec.shape()?;
        if shape.bit_width as usize != kc.bitlen {
            return Err(KmerError::format(format!(
                "dump {} holds {}-bit keys, table {}",
                dump.path().display(),
                shape.bit_width,
                kc.bitlen
            )));
        }
        if shape.used != shape.modulus + 1 || shape.tag_count != 0 {
            return Err(KmerError::format(format!(
                "dump {} is not compacted: {} slots, {} used",
                dump.path().display(),
                shape.modulus,
                shape.used
            )));
        }
        let n = shape.modulus as usize;
        let counts = dec.bytes(n)?;

        let key_bytes = (n + 1) * kc.words * size_of::<Word>();
        let at = header().len() + SHAPE_BYTES + n + key_bytes;
        let mut tail = dump.reopen()?;
        tail.seek(SeekFrom::Start(at as u64))?;
        let overflow = Decoder::new(BufReader::new(tail)).overflow(kc.words, n)?;

        Ok(DumpReader {
            dec,
            words: kc.words,
            counts,
            overflow,
            i: 0,
            failed: false,
        })
    }
}

impl Iterator for DumpReader {
    type Item = KmerResult<Entry>;

    fn next(&mut self) -> Option<KmerResult<Entry>> {
        if self.failed || self.i == self.counts.len() {
            return None;
        }
        let c = self.counts[self.i];
        self.i += 1;
        match self.dec.key(self.words) {
            Ok(key) => {
                let mut count = u64::from(c);
                if c == SMALL_MAX {
                    count += self.overflow.get(&key).copied().unwrap_or(0);
                }
                Some(Ok((key, count)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
