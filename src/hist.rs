// (c) Roel Kluin, 2023, GPL v3

use crate::error::{KmerError, KmerResult};
use crate::kmerstream::KmerStream;
use crate::kmertable::KmerTable;
use crate::new_types::packed_key::PackedKey;
use crate::policy::Entry;
use crate::read::Read;
use crate::seqio::ReadTags;
use log::{info, warn};
use std::collections::BTreeMap;
use std::io::Write;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CountStats {
    pub reads: usize,
    pub skipped: usize,
    pub kmers: usize,
    pub tagged_reads: usize,
}

/// Feeds reads into a table, attributing listed reads to their tags.
pub struct ReadCounter<'a> {
    table: &'a mut KmerTable,
    tags: Option<&'a ReadTags>,
    pub stats: CountStats,
}

impl<'a> ReadCounter<'a> {
    pub fn new(table: &'a mut KmerTable, tags: Option<&'a ReadTags>) -> Self {
        ReadCounter {
            table,
            tags,
            stats: CountStats::default(),
        }
    }

    /// A read that failed to parse is logged and skipped; a full table is an error.
    pub fn add(&mut self, read: KmerResult<Read>) -> KmerResult<()> {
        let read = match read {
            Ok(read) => read,
            Err(KmerError::Input(msg)) => {
                warn!("skipping read: {}", msg);
                self.stats.skipped += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.stats.reads += 1;
        let keys: Vec<PackedKey> = KmerStream::new(self.table.kmerconst(), &read).collect();
        for key in keys.iter() {
            self.table.insert(key)?;
        }
        self.stats.kmers += keys.len();

        let mask = self.tags.map_or(0, |t| t.mask_for(read.name()));
        if mask != 0 && self.table.tag_count() > 0 {
            self.stats.tagged_reads += 1;
            for key in keys.iter() {
                self.table.increment_tag(key, mask);
            }
        }
        Ok(())
    }
}

pub fn count_reads<I>(table: &mut KmerTable, reads: I, tags: Option<&ReadTags>) -> KmerResult<CountStats>
where
    I: IntoIterator<Item = KmerResult<Read>>,
{
    let mut counter = ReadCounter::new(table, tags);
    for read in reads {
        counter.add(read)?;
    }
    let stats = counter.stats;
    info!(
        "counted {} k-mers in {} reads ({} skipped, {} tagged)",
        stats.kmers, stats.reads, stats.skipped, stats.tagged_reads
    );
    Ok(stats)
}

/// count -> number of keys with that count
pub fn histogram<I>(entries: I) -> KmerResult<BTreeMap<u64, u64>>
where
    I: IntoIterator<Item = KmerResult<Entry>>,
{
    let mut hist = BTreeMap::new();
    for entry in entries {
        let (_, count) = entry?;
        *hist.entry(count).or_insert(0) += 1;
    }
    Ok(hist)
}

/// Entries seen at least min_count times.
pub fn raw_entries<I>(entries: I, min_count: u64) -> impl Iterator<Item = KmerResult<Entry>>
where
    I: IntoIterator<Item = KmerResult<Entry>>,
{
    entries
        .into_iter()
        .filter(move |e| e.as_ref().map_or(true, |(_, c)| *c >= min_count))
}

/// How tag 0 modifies the reported counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagMode {
    /// report count minus tag; keys only seen in tagged reads drop out
    Subtract,
    /// report the count of keys that were seen in a tagged read
    Add,
}

pub fn tag_report(table: &KmerTable, mode: TagMode) -> KmerResult<Vec<Entry>> {
    if table.tag_count() == 0 {
        return Err(KmerError::config("a tag report needs a table with tag counters"));
    }
    let report = table
        .iter_tags()
        .filter_map(|e| {
            let tag = e.tags[0];
            match mode {
                TagMode::Subtract if e.count > tag => Some((e.key, e.count - tag)),
                TagMode::Add if tag > 0 => Some((e.key, e.count)),
                _ => None,
            }
        })
        .collect();
    Ok(report)
}

pub fn write_histogram<W: Write>(w: W, hist: &BTreeMap<u64, u64>) -> anyhow::Result<()> {
    let mut wtr = csv::WriterBuilder::new().delimiter(b'\t').from_writer(w);
    for (count, n) in hist.iter() {
        wtr.write_record(&[count.to_string(), n.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_raw<W, I>(w: W, table: &KmerTable, entries: I) -> anyhow::Result<()>
where
    W: Write,
    I: IntoIterator<Item = KmerResult<Entry>>,
{
    let kc = table.kmerconst();
    let mut wtr = csv::WriterBuilder::new().delimiter(b'\t').from_writer(w);
    for entry in entries {
        let (key, count) = entry?;
        wtr.write_record(&[key.to_dna(kc), count.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}
