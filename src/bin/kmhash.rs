extern crate kmhash;

// target/release/kmhash hist -m 25 -z 64m -s reads.kmh reads.fq.gz
// target/release/kmhash dot -t 8 -r 2 -u -1 ref1.kmh ref2.kmh sample*.kmh

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use kmhash::cmd::{dot, hist, mask};

#[derive(Subcommand, Debug)]
enum Commands {
    /// Count k-mers and print their frequency histogram
    Hist(hist::HistCmd),

    /// Lower-case the repetitive bases of reads
    Mask(mask::MaskCmd),

    /// Compare saved hashes pairwise
    Dot(dot::DotCmd),
}

/// Fixed capacity k-mer counting and comparison
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Kmhash {
    /// Turn debugging information on, repeat for more
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    debug: u8,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    let kmhash = Kmhash::parse();

    let level = match kmhash.debug {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    match kmhash.command {
        Commands::Hist(cmd) => hist::hist(cmd),
        Commands::Mask(cmd) => mask::mask(cmd),
        Commands::Dot(cmd) => dot::dot(cmd),
    }
}
