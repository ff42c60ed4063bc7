// (c) Roel Kluin, 2023, GPL v3

use super::{count_files, TableArgs};
use crate::error::KmerResult;
use crate::hist::{histogram, raw_entries, tag_report, write_histogram, write_raw, TagMode};
use crate::policy::Entry;
use crate::seqio::ReadTags;
use anyhow::Result;
use clap::Args;
use std::io::{self, BufWriter};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct HistCmd {
    #[command(flatten)]
    pub table: TableArgs,

    /// Print k-mers seen at least this often with their counts, instead of a histogram
    #[arg(short = 'w', long, value_name = "COUNT")]
    pub raw: Option<u64>,

    /// Subtract the k-mers of the reads named in this file from the counts
    #[arg(short = 'l', long, value_name = "FILE", conflicts_with = "add")]
    pub subtract: Option<PathBuf>,

    /// Report only k-mers seen in the reads named in this file
    #[arg(short = 'L', long, value_name = "FILE")]
    pub add: Option<PathBuf>,

    /// Fasta or fastq files, optionally gzipped
    #[arg(value_name = "READS")]
    pub inputs: Vec<PathBuf>,
}

impl HistCmd {
    fn tags(&self) -> Result<Option<(ReadTags, TagMode)>> {
        let sel = match (&self.subtract, &self.add) {
            (Some(path), _) => Some((path, TagMode::Subtract)),
            (None, Some(path)) => Some((path, TagMode::Add)),
            (None, None) => None,
        };
        match sel {
            Some((path, mode)) => Ok(Some((ReadTags::from_file(path, 0)?, mode))),
            None => Ok(None),
        }
    }
}

pub fn hist(cmd: HistCmd) -> Result<()> {
    let tags = cmd.tags()?;
    let mut table = cmd.table.table(usize::from(tags.is_some()))?;
    count_files(
        &mut table,
        &cmd.inputs,
        tags.as_ref().map(|(t, _)| t),
        cmd.table.min_phred,
    )?;
    cmd.table.save_if_asked(&mut table, &cmd.inputs)?;

    let out = BufWriter::new(io::stdout().lock());
    let entries: Box<dyn Iterator<Item = KmerResult<Entry>> + '_> = match &tags {
        Some((_, mode)) => Box::new(tag_report(&table, *mode)?.into_iter().map(Ok)),
        None if table.dump_count() > 0 => Box::new(table.merged_entries()?),
        None => Box::new(table.iter().map(Ok)),
    };
    match cmd.raw {
        Some(min_count) => write_raw(out, &table, raw_entries(entries, min_count))?,
        None => write_histogram(out, &histogram(entries)?)?,
    }
    Ok(())
}
