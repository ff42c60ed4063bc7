// (c) Roel Kluin, 2023, GPL v3

use crate::error::KmerResult;
use crate::read::Read;
use ahash::AHashMap;
use anyhow::{anyhow, Result};
use flate2::read::MultiGzDecoder;
use noodles_fasta as fasta;
use noodles_fastq as fastq;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeqFormat {
    Fasta,
    Fastq,
}

fn is_gz(path: &Path) -> bool {
    path.extension() == Some(OsStr::new("gz"))
}

impl SeqFormat {
    /// By extension, looking past a .gz; anything not fastq is read as fasta.
    pub fn detect(path: &Path) -> SeqFormat {
        let inner = if is_gz(path) {
            Path::new(path.file_stem().unwrap_or_default())
        } else {
            path
        };
        match inner.extension().and_then(|e| e.to_str()) {
            Some("fq") | Some("fastq") => SeqFormat::Fastq,
            _ => SeqFormat::Fasta,
        }
    }
}

/// Buffered reader over a file, gunzipped if it ends in .gz
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|e| anyhow!("Error opening {}: {}", path.display(), e))?;
    if is_gz(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Pass every read of a fasta or fastq file to f. Fastq reads that fail to parse
/// are passed as errors, f decides whether to go on.
pub fn for_each_read<F>(path: &Path, min_phred: u8, mut f: F) -> Result<()>
where
    F: FnMut(KmerResult<Read>) -> KmerResult<()>,
{
    let input = open_input(path)?;
    match SeqFormat::detect(path) {
        SeqFormat::Fasta => {
            let mut reader = fasta::Reader::new(input);
            for res in reader.records() {
                let record = res?;
                f(Ok(Read::new(record.name(), record.sequence().as_ref().to_vec())))?;
            }
        }
        SeqFormat::Fastq => {
            let mut reader = fastq::Reader::new(input);
            for res in reader.records() {
                let record = res?;
                let name = String::from_utf8_lossy(record.name()).into_owned();
                let read = Read::with_quality(name, record.sequence().to_vec(), record.quality_scores())
                    .map(|mut read| {
                        read.set_min_phred(min_phred);
                        read
                    });
                f(read)?;
            }
        }
    }
    Ok(())
}

/// Read names, one per line. A leading '@' or '>' and anything after the first
/// whitespace are ignored.
pub fn read_name_list(path: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for line in open_input(path)?.lines() {
        let line = line?;
        if let Some(name) = line.split_whitespace().next() {
            let name = name.trim_start_matches(|c| c == '@' || c == '>');
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}

/// Maps read names to the tag bits their k-mers are attributed to.
#[derive(Default, Debug)]
pub struct ReadTags {
    tags: AHashMap<String, u64>,
}

impl ReadTags {
    pub fn add_names<I: IntoIterator<Item = String>>(&mut self, names: I, tag: usize) {
        for name in names {
            *self.tags.entry(name).or_insert(0) |= 1 << tag;
        }
    }
    pub fn from_file(path: &Path, tag: usize) -> Result<Self> {
        let mut tags = ReadTags::default();
        tags.add_names(read_name_list(path)?, tag);
        Ok(tags)
    }
    /// 0 for names not listed
    pub fn mask_for(&self, name: &str) -> u64 {
        self.tags.get(name).copied().unwrap_or(0)
    }
    pub fn len(&self) -> usize {
        self.tags.len()
    }
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
