// (c) Roel Kluin, 2023, GPL v3

pub mod packed_key;
pub mod twobit;
