// (c) Roel Kluin, 2023, GPL v3

use crate::counter::{run_workers, Counter2D};
use crate::kmertable::KmerTable;
use anyhow::{ensure, Result};
use log::info;
use std::io::Write;

/// Dense row-major matrix of pairwise scores.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    n: usize,
    cells: Vec<f64>,
}

impl Matrix {
    pub fn new(n: usize) -> Self {
        Matrix {
            n,
            cells: vec![0.0; n * n],
        }
    }
    pub fn len(&self) -> usize {
        self.n
    }
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.cells[i * self.n + j]
    }
    pub fn set(&mut self, i: usize, j: usize, v: f64) {
        self.cells[i * self.n + j] = v;
    }
    pub fn row(&self, i: usize) -> &[f64] {
        &self.cells[i * self.n..(i + 1) * self.n]
    }

    pub fn max_off_diagonal(&self) -> f64 {
        let mut max = 0.0f64;
        for i in 0..self.n {
            for j in (0..self.n).filter(|&j| j != i) {
                max = max.max(self.get(i, j));
            }
        }
        max
    }

    /// Smallest d >= 0 for which max_off_diagonal * 10^d reaches 0.1.
    pub fn scale_exponent(&self) -> i32 {
        let max = self.max_off_diagonal();
        if max.is_nan() || max <= 0.0 {
            return 0;
        }
        let mut d = 0;
        while max * 10f64.powi(d) < 0.1 && d < 300 {
            d += 1;
        }
        d
    }

    /// Multiply by 10^scale_exponent; returns the exponent used.
    pub fn rescale(&mut self) -> i32 {
        let d = self.scale_exponent();
        if d != 0 {
            let f = 10f64.powi(d);
            self.cells.iter_mut().for_each(|c| *c *= f);
        }
        d
    }

    /// Tab separated, a header with the names, then one named row per table.
    pub fn write_tsv<W: Write>(&self, w: W, names: &[String], precision: usize) -> Result<()> {
        ensure!(names.len() == self.n, "{} names for {} rows", names.len(), self.n);
        let mut wtr = csv::WriterBuilder::new().delimiter(b'\t').from_writer(w);
        let mut head = Vec::with_capacity(self.n + 1);
        head.push(String::new());
        head.extend(names.iter().cloned());
        wtr.write_record(&head)?;
        for (i, name) in names.iter().enumerate() {
            let mut rec = Vec::with_capacity(self.n + 1);
            rec.push(name.clone());
            rec.extend(self.row(i).iter().map(|v| format!("{:.*}", precision, v)));
            wtr.write_record(&rec)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn smaller_first<'a>(a: &'a KmerTable, b: &'a KmerTable) -> (&'a KmerTable, &'a KmerTable) {
    if a.size() <= b.size() {
        (a, b)
    } else {
        (b, a)
    }
}

/// Number of keys present in both tables.
pub fn shared_count(a: &KmerTable, b: &KmerTable) -> u64 {
    let (small, large) = smaller_first(a, b);
    small.iter().filter(|(key, _)| large.contains(key)).count() as u64
}

/// Σ a(k)·b(k) over the common keys.
pub fn dot_product(a: &KmerTable, b: &KmerTable) -> f64 {
    let (small, large) = smaller_first(a, b);
    small
        .iter()
        .map(|(key, c)| c as f64 * large.value(&key) as f64)
        .sum()
}

fn check_widths(tables: &[&KmerTable]) -> Result<()> {
    if let Some(first) = tables.first() {
        for (i, t) in tables.iter().enumerate() {
            ensure!(
                t.bitlen() == first.bitlen(),
                "table {} has {}-mers, table 0 {}-mers",
                i,
                t.kmerlen(),
                first.kmerlen()
            );
        }
    }
    Ok(())
}

fn ratio(num: u64, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// results[i][j] = shared(i, j) / size(i). With lower only j < i is computed and
/// mirrored as shared / size(j) into results[j][i].
pub fn shared_identity(tables: &[&KmerTable], threads: usize, lower: bool) -> Result<Matrix> {
    check_widths(tables)?;
    let n = tables.len();
    let mut m = Matrix::new(n);
    let pairs = Counter2D::new(n, n, lower);
    info!("shared identity over {} pairs, {} threads", pairs.len(), threads);
    run_workers(
        &pairs,
        threads,
        |&(i, j)| shared_count(tables[i], tables[j]),
        |(i, j), shared| {
            m.set(i, j, ratio(shared, tables[i].size()));
            if lower {
                m.set(j, i, ratio(shared, tables[j].size()));
            }
        },
    )?;
    if lower {
        for i in (0..n).filter(|&i| tables[i].size() > 0) {
            m.set(i, i, 1.0);
        }
    }
    Ok(m)
}

/// Cosine similarity of the count vectors; norms[i] is the Euclidean norm of table i.
pub fn dot_matrix(tables: &[&KmerTable], norms: &[f64], threads: usize, lower: bool) -> Result<Matrix> {
    check_widths(tables)?;
    ensure!(norms.len() == tables.len(), "{} norms for {} tables", norms.len(), tables.len());
    let n = tables.len();
    let mut m = Matrix::new(n);
    let pairs = Counter2D::new(n, n, lower);
    info!("dot products over {} pairs, {} threads", pairs.len(), threads);
    run_workers(
        &pairs,
        threads,
        |&(i, j)| dot_product(tables[i], tables[j]),
        |(i, j), dot| {
            let den = norms[i] * norms[j];
            let v = if den > 0.0 { dot / den } else { 0.0 };
            m.set(i, j, v);
            if lower {
                m.set(j, i, v);
            }
        },
    )?;
    if lower {
        for i in (0..n).filter(|&i| norms[i] > 0.0) {
            m.set(i, i, 1.0);
        }
    }
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmertable::TableConfig;
    use crate::new_types::packed_key::PackedKey;
    use crate::new_types::twobit::TwoBit;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeSet;

    fn distinct_keys(n: usize, kmerlen: usize) -> Vec<PackedKey> {
        let kc = crate::kmerconst::KmerConst::new(kmerlen).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut set = BTreeSet::new();
        while set.len() < n {
            let mut key = PackedKey::empty(&kc);
            for _ in 0..kmerlen {
                key.push_back(&kc, TwoBit::new(rng.gen_range(0..4)));
            }
            set.insert(key.to_canonical(&kc));
        }
        set.into_iter().collect()
    }

    fn table_of(keys: &[PackedKey], times: u64) -> KmerTable {
        let mut t = KmerTable::new(&TableConfig::new(2 * keys.len(), 15)).unwrap();
        for k in keys {
            for _ in 0..times {
                t.increment(k);
            }
        }
        t
    }

    #[test]
    fn shared_identity_divides_by_row_size() {
        let keys = distinct_keys(260, 15);
        let a = table_of(&keys[..100], 1);
        let b = table_of(&keys[60..], 1);
        assert_eq!(shared_count(&a, &b), 40);
        for lower in [false, true] {
            let m = shared_identity(&[&a, &b], 2, lower).unwrap();
            assert!((m.get(0, 1) - 0.4).abs() < 1e-12);
            assert!((m.get(1, 0) - 0.2).abs() < 1e-12);
            assert!((m.get(0, 0) - 1.0).abs() < 1e-12);
            // shared(i, j)·size(i) = shared(j, i)·size(j)
            assert!((m.get(0, 1) * 100.0 - m.get(1, 0) * 200.0).abs() < 1e-9);
        }
    }
    #[test]
    fn dot_of_identical_tables_is_one() {
        let keys = distinct_keys(50, 15);
        let a = table_of(&keys, 3);
        let b = table_of(&keys[..25], 2);
        let norms = [a.sum_of_squares().sqrt(), b.sum_of_squares().sqrt()];
        let m = dot_matrix(&[&a, &b], &norms, 3, false).unwrap();
        assert!((m.get(0, 0) - 1.0).abs() < 1e-12);
        // 25 keys · 3 · 2 over (3·√50)(2·√25)
        let expect = 150.0 / (3.0 * 50f64.sqrt() * 10.0);
        assert!((m.get(0, 1) - expect).abs() < 1e-12);
        assert!((m.get(1, 0) - expect).abs() < 1e-12);
    }
    #[test]
    fn rescale_to_a_tenth() {
        let mut m = Matrix::new(2);
        m.set(0, 0, 1.0);
        m.set(0, 1, 0.0042);
        m.set(1, 0, 0.003);
        assert_eq!(m.rescale(), 2);
        assert!((m.get(0, 1) - 0.42).abs() < 1e-12);
        let mut m = Matrix::new(2);
        m.set(0, 1, 0.5);
        assert_eq!(m.rescale(), 0);
        assert_eq!(Matrix::new(3).scale_exponent(), 0);
    }
    #[test]
    fn fixed_precision_output() {
        let mut m = Matrix::new(2);
        m.set(0, 1, 0.4);
        m.set(1, 0, 0.2);
        let mut out = Vec::new();
        m.write_tsv(&mut out, &["a".to_string(), "b".to_string()], 3).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "\ta\tb\na\t0.000\t0.400\nb\t0.200\t0.000\n");
    }
    #[test]
    fn mixed_widths_are_refused() {
        let a = KmerTable::new(&TableConfig::new(10, 15)).unwrap();
        let b = KmerTable::new(&TableConfig::new(10, 17)).unwrap();
        assert!(shared_identity(&[&a, &b], 1, false).is_err());
    }
}
