// (c) Roel Kluin, 2023, GPL v3

#[macro_use]
extern crate derive_new;

#[macro_use]
pub mod rdbg;
pub mod cmd;
pub mod compare;
pub mod counter;
pub mod error;
pub mod hist;
pub mod kmerconst;
pub mod kmerstream;
pub mod kmertable;
pub mod mask;
pub mod new_types;
pub mod persist;
pub mod policy;
pub mod read;
pub mod screen;
pub mod seqio;

pub use error::{KmerError, KmerResult};
pub use kmerconst::KmerConst;
pub use kmertable::{KmerTable, TableConfig};
pub use new_types::packed_key::PackedKey;
pub use policy::FullPolicy;
pub use read::{Read, SeqRead};
