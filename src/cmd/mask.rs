// (c) Roel Kluin, 2023, GPL v3

use super::{count_files, TableArgs};
use crate::error::KmerError;
use crate::mask::{apply_mask, repeat_mask, unique_phred_count, MaskParams};
use crate::seqio::for_each_read;
use anyhow::Result;
use clap::Args;
use log::{info, warn};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct MaskCmd {
    #[command(flatten)]
    pub table: TableArgs,

    /// Lowest count of a repetitive k-mer
    #[arg(long, default_value = "2")]
    pub low: u64,

    /// Counts from here on are not considered repetitive
    #[arg(long, default_value_t = u64::MAX)]
    pub high: u64,

    /// Repetitive k-mers that must cover a base to mask it
    #[arg(short = 'c', long, default_value = "1")]
    pub coverage: u32,

    /// Keep regions flanked by this many unmasked high quality bases on both sides (0: off)
    #[arg(short = 'a', long, default_value = "0")]
    pub anchor: usize,

    /// Print the number of unique high quality bases per read instead
    #[arg(short = 'U', long)]
    pub unique: bool,

    /// Fasta or fastq files, optionally gzipped
    #[arg(value_name = "READS")]
    pub inputs: Vec<PathBuf>,
}

pub fn mask(cmd: MaskCmd) -> Result<()> {
    let params = MaskParams::new(cmd.low, cmd.high, cmd.coverage)?.with_anchor(cmd.anchor);
    let mut table = cmd.table.table(0)?;
    if cmd.table.restore.is_none() {
        count_files(&mut table, &cmd.inputs, None, cmd.table.min_phred)?;
        if table.dump_count() > 0 {
            let distinct = table.merged_entries()?.count();
            table.absorb_dumps(distinct)?;
        }
    }
    cmd.table.save_if_asked(&mut table, &cmd.inputs)?;

    let mut out = BufWriter::new(io::stdout().lock());
    let mut masked = 0;
    for path in cmd.inputs.iter() {
        for_each_read(path, cmd.table.min_phred, |read| {
            let read = match read {
                Ok(read) => read,
                Err(KmerError::Input(msg)) => {
                    warn!("skipping read: {}", msg);
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            if cmd.unique {
                writeln!(out, "{}\t{}", read.name(), unique_phred_count(&table, &read, &params))?;
            } else {
                let m = repeat_mask(&table, &read, &params);
                masked += m.count_ones();
                out.write_all(b">")?;
                out.write_all(read.name().as_bytes())?;
                out.write_all(b"\n")?;
                out.write_all(&apply_mask(read.seq(), &m))?;
                out.write_all(b"\n")?;
            }
            Ok(())
        })?;
    }
    out.flush()?;
    if !cmd.unique {
        info!("masked {} bases", masked);
    }
    Ok(())
}
