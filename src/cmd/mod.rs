// (c) Roel Kluin, 2023, GPL v3

pub mod dot;
pub mod hist;
pub mod mask;

use crate::hist::{CountStats, ReadCounter};
use crate::kmertable::{KmerTable, TableConfig};
use crate::policy::FullPolicy;
use crate::read::DEFAULT_MIN_PHRED;
use crate::seqio::{for_each_read, ReadTags};
use anyhow::{ensure, Result};
use clap::Args;
use log::info;
use std::path::{Path, PathBuf};

pub const DEFAULT_KMERLEN: usize = 25;

/// Table options shared by the tools that count reads.
#[derive(Args, Debug, Clone)]
pub struct TableArgs {
    /// k-mer length [default: 25, or that of the restored hash]
    #[arg(short = 'm', long)]
    pub kmerlen: Option<usize>,

    /// Hash capacity; k, m and g multiply by 1024
    #[arg(short = 'z', long, value_parser = parse_size, default_value = "1m", conflicts_with = "restore")]
    pub size: usize,

    /// Restore the table from a saved hash instead of starting empty
    #[arg(short = 'S', long, value_name = "HASH")]
    pub restore: Option<PathBuf>,

    /// Save the table after counting
    #[arg(short = 's', long, value_name = "HASH")]
    pub save: Option<PathBuf>,

    /// When full, drop all k-mers seen once
    #[arg(short = 'Z', long)]
    pub clean_hash: bool,

    /// When full, dump to temporary files with this path prefix
    #[arg(short = 'T', long, value_name = "PREFIX", conflicts_with = "clean_hash")]
    pub tmp_prefix: Option<PathBuf>,

    /// Minimum phred score of a high quality base
    #[arg(short = 'q', long, default_value_t = DEFAULT_MIN_PHRED)]
    pub min_phred: u8,
}

/// 1024-based size suffixes: 4k, 16M, 2g
pub fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();
    let (digits, shift) = match s.chars().last() {
        Some('k') | Some('K') => (&s[..s.len() - 1], 10),
        Some('m') | Some('M') => (&s[..s.len() - 1], 20),
        Some('g') | Some('G') => (&s[..s.len() - 1], 30),
        _ => (s, 0),
    };
    let n: usize = digits
        .parse()
        .map_err(|e| format!("invalid size '{}': {}", s, e))?;
    n.checked_mul(1 << shift)
        .ok_or_else(|| format!("size '{}' is too large", s))
}

impl TableArgs {
    pub fn policy(&self) -> FullPolicy {
        match (&self.tmp_prefix, self.clean_hash) {
            (Some(prefix), _) => FullPolicy::TmpFile(prefix.clone()),
            (None, true) => FullPolicy::CleanHash,
            (None, false) => FullPolicy::Reject,
        }
    }

    /// The restored table, or an empty one per the options.
    pub fn table(&self, tag_count: usize) -> Result<KmerTable> {
        match &self.restore {
            Some(path) => {
                let mut restored = KmerTable::restore(path)?;
                let table = &mut restored.table;
                ensure!(
                    tag_count <= table.tag_count(),
                    "{} has {} tag counters, {} needed",
                    path.display(),
                    table.tag_count(),
                    tag_count
                );
                if let Some(k) = self.kmerlen {
                    ensure!(
                        k == table.kmerlen(),
                        "-m {} given, but {} holds {}-mers",
                        k,
                        path.display(),
                        table.kmerlen()
                    );
                }
                table.set_policy(self.policy())?;
                Ok(restored.table)
            }
            None => {
                let cfg = TableConfig::new(self.size, self.kmerlen.unwrap_or(DEFAULT_KMERLEN))
                    .with_tags(tag_count)
                    .with_policy(self.policy());
                Ok(KmerTable::new(&cfg)?)
            }
        }
    }

    /// Save if asked, merging any partial dumps first. The metadata lists the inputs.
    pub fn save_if_asked(&self, table: &mut KmerTable, inputs: &[PathBuf]) -> Result<()> {
        if let Some(path) = &self.save {
            if table.dump_count() > 0 {
                let distinct = table.merged_entries()?.count();
                table.absorb_dumps(distinct)?;
            }
            let meta = inputs
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join("\t");
            table.save(path, meta.as_bytes())?;
        }
        Ok(())
    }
}

/// Count the k-mers of all inputs into table.
pub fn count_files(
    table: &mut KmerTable,
    inputs: &[PathBuf],
    tags: Option<&ReadTags>,
    min_phred: u8,
) -> Result<CountStats> {
    let mut counter = ReadCounter::new(table, tags);
    for path in inputs {
        info!("Reading {}", path.display());
        for_each_read(path, min_phred, |read| counter.add(read))?;
    }
    let stats = counter.stats;
    info!(
        "counted {} k-mers in {} reads ({} skipped)",
        stats.kmers, stats.reads, stats.skipped
    );
    Ok(stats)
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(parse_size("100"), Ok(100));
        assert_eq!(parse_size("4k"), Ok(4096));
        assert_eq!(parse_size("2M"), Ok(2 << 20));
        assert_eq!(parse_size("1g"), Ok(1 << 30));
        assert!(parse_size("x").is_err());
        assert!(parse_size("").is_err());
    }

    fn args(kmerlen: Option<usize>, restore: Option<PathBuf>) -> TableArgs {
        TableArgs {
            kmerlen,
            size: 64,
            restore,
            save: None,
            clean_hash: false,
            tmp_prefix: None,
            min_phred: DEFAULT_MIN_PHRED,
        }
    }

    #[test]
    fn restored_kmerlen_must_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k7.kmh");
        KmerTable::new(&TableConfig::new(16, 7)).unwrap().save(&path, &[]).unwrap();

        assert_eq!(args(None, Some(path.clone())).table(0).unwrap().kmerlen(), 7);
        assert_eq!(args(Some(7), Some(path.clone())).table(0).unwrap().kmerlen(), 7);
        match args(Some(25), Some(path)).table(0) {
            Err(e) => assert!(e.to_string().contains("-m 25")),
            Ok(_) => panic!("a 7-mer hash restored with -m 25"),
        }
        assert_eq!(args(None, None).table(0).unwrap().kmerlen(), DEFAULT_KMERLEN);
    }
}
