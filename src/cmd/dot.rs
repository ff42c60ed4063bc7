// (c) Roel Kluin, 2023, GPL v3

use super::display_name;
use crate::compare::{dot_matrix, shared_identity};
use crate::kmertable::KmerTable;
use crate::screen::screen;
use anyhow::{ensure, Result};
use clap::Args;
use log::info;
use std::io;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct DotCmd {
    /// The first this many hashes are references, screened out of the others
    #[arg(short = 'r', long, default_value = "0")]
    pub refs: usize,

    /// Drop k-mers found in more than this many references; negative counts down from
    /// the number of references
    #[arg(short = 'u', long, default_value = "0", allow_negative_numbers = true)]
    pub threshold: i64,

    /// Ignore k-mers seen fewer times than this
    #[arg(short = 'f', long, default_value = "1")]
    pub min_count: u64,

    /// Worker threads
    #[arg(short = 't', long, default_value = "1")]
    pub threads: usize,

    /// Report normalized dot products rather than shared fractions
    #[arg(long)]
    pub dot: bool,

    /// Compute only the lower triangle and mirror it
    #[arg(long)]
    pub lower: bool,

    /// Decimals in the output
    #[arg(short = 'p', long, default_value = "4")]
    pub precision: usize,

    /// Saved hashes
    #[arg(value_name = "HASH", required = true)]
    pub hashes: Vec<PathBuf>,
}

pub fn dot(cmd: DotCmd) -> Result<()> {
    ensure!(
        cmd.refs < cmd.hashes.len(),
        "{} references leave no hash to compare",
        cmd.refs
    );
    let mut tables = Vec::with_capacity(cmd.hashes.len());
    let mut norms = Vec::with_capacity(cmd.hashes.len());
    for path in cmd.hashes.iter() {
        let restored = KmerTable::restore_with_cutoff(path, cmd.min_count)?;
        norms.push(restored.sum_of_squares.sqrt());
        tables.push(restored.table);
    }
    let (refs, targets) = tables.split_at_mut(cmd.refs);
    let mut norms = norms.split_off(cmd.refs);
    if !refs.is_empty() {
        let refs: Vec<&KmerTable> = refs.iter().collect();
        let removed = screen(&refs, targets, cmd.threshold)?;
        info!("screened out {:?} k-mers", removed);
        norms = targets.iter().map(|t| t.sum_of_squares().sqrt()).collect();
    }

    let targets: Vec<&KmerTable> = targets.iter().collect();
    let mut m = if cmd.dot {
        dot_matrix(&targets, &norms, cmd.threads, cmd.lower)?
    } else {
        shared_identity(&targets, cmd.threads, cmd.lower)?
    };
    let d = m.rescale();
    info!("values scaled by 10^{}", d);
    let names: Vec<String> = cmd.hashes[cmd.refs..].iter().map(|p| display_name(p)).collect();
    m.write_tsv(io::stdout().lock(), &names, cmd.precision)?;
    Ok(())
}
