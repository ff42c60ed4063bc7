// (c) Roel Kluin, 2023, GPL v3

use crate::error::KmerError;
use anyhow::{anyhow, ensure, Result};
use crossbeam_channel::unbounded;
use log::debug;
use std::cmp;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A source of work items that any number of threads may pull from.
pub trait Dispatch: Sync {
    type Item: Send;

    /// None once exhausted; it stays exhausted.
    fn next_item(&self) -> Option<Self::Item>;
}

// A panicking worker leaves the cursor consistent, so poisoning is ignored.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hands out 0..n, each index once.
#[derive(Debug)]
pub struct Counter1D {
    n: usize,
    cursor: Mutex<usize>,
}

impl Counter1D {
    pub fn new(n: usize) -> Self {
        Counter1D {
            n,
            cursor: Mutex::new(0),
        }
    }
    pub fn len(&self) -> usize {
        self.n
    }
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }
}

impl Dispatch for Counter1D {
    type Item = usize;

    fn next_item(&self) -> Option<usize> {
        let mut c = lock(&self.cursor);
        if *c < self.n {
            *c += 1;
            Some(*c - 1)
        } else {
            None
        }
    }
}

/// Hands out (i, j) over rows x cols in row-major order, with lower only the
/// pairs j < i.
#[derive(Debug)]
pub struct Counter2D {
    rows: usize,
    cols: usize,
    lower: bool,
    cursor: Mutex<(usize, usize)>,
}

impl Counter2D {
    pub fn new(rows: usize, cols: usize, lower: bool) -> Self {
        Counter2D {
            rows,
            cols,
            lower,
            cursor: Mutex::new((0, 0)),
        }
    }

    pub fn is_lower(&self) -> bool {
        self.lower
    }

    /// number of pairs handed out in total
    pub fn len(&self) -> usize {
        if self.lower {
            (0..self.rows).map(|i| cmp::min(i, self.cols)).sum()
        } else {
            self.rows * self.cols
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Dispatch for Counter2D {
    type Item = (usize, usize);

    fn next_item(&self) -> Option<(usize, usize)> {
        let mut c = lock(&self.cursor);
        loop {
            let (i, j) = *c;
            if i >= self.rows {
                return None;
            }
            let row_end = if self.lower {
                cmp::min(i, self.cols)
            } else {
                self.cols
            };
            if j < row_end {
                c.1 += 1;
                return Some((i, j));
            }
            *c = (i + 1, 0);
        }
    }
}

/// Run work on every item of dispatch with `threads` workers. Results are passed
/// to sink on the calling thread, in completion order. Returns the number of items
/// each worker handled.
pub fn run_workers<D, T, F, S>(dispatch: &D, threads: usize, work: F, mut sink: S) -> Result<Vec<usize>>
where
    D: Dispatch,
    T: Send,
    F: Fn(&D::Item) -> T + Sync,
    S: FnMut(D::Item, T),
{
    ensure!(threads > 0, KmerError::config("at least one worker thread is required"));
    let (tx, rx) = unbounded::<(usize, D::Item, T)>();
    let work = &work;
    let per_worker = crossbeam::scope(|s| {
        for w in 0..threads {
            let tx = tx.clone();
            s.spawn(move |_| {
                while let Some(item) = dispatch.next_item() {
                    let out = work(&item);
                    if tx.send((w, item, out)).is_err() {
                        break;
                    }
                }
                dbg_print!("worker {} done", w);
            });
        }
        drop(tx);
        let mut per_worker = vec![0; threads];
        for (w, item, out) in rx.iter() {
            per_worker[w] += 1;
            sink(item, out);
        }
        per_worker
    })
    .map_err(|_| anyhow!("a worker thread panicked"))?;
    debug!("items per worker: {:?}", per_worker);
    Ok(per_worker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn one_dimension_saturates() {
        let c = Counter1D::new(3);
        let got: Vec<_> = std::iter::from_fn(|| c.next_item()).collect();
        assert_eq!(got, vec![0, 1, 2]);
        assert_eq!(c.next_item(), None);
        assert_eq!(c.next_item(), None);
        assert_eq!(Counter1D::new(0).next_item(), None);
    }
    #[test]
    fn row_major() {
        let c = Counter2D::new(2, 3, false);
        let got: Vec<_> = std::iter::from_fn(|| c.next_item()).collect();
        assert_eq!(got, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
        assert_eq!(c.next_item(), None);
    }
    #[test]
    fn strictly_lower() {
        let c = Counter2D::new(4, 4, true);
        assert_eq!(c.len(), 6);
        let got: Vec<_> = std::iter::from_fn(|| c.next_item()).collect();
        assert_eq!(got, vec![(1, 0), (2, 0), (2, 1), (3, 0), (3, 1), (3, 2)]);
        let c = Counter2D::new(5, 2, true);
        assert_eq!(std::iter::from_fn(|| c.next_item()).count(), c.len());
    }
    #[test]
    fn every_item_once() {
        for threads in 1..6 {
            let c = Counter2D::new(37, 23, false);
            let mut seen = HashSet::new();
            let per_worker = run_workers(&c, threads, |&(i, j)| i * 100 + j, |item, v| {
                assert_eq!(v, item.0 * 100 + item.1);
                assert!(seen.insert(item));
            })
            .unwrap();
            assert_eq!(seen.len(), 37 * 23);
            assert_eq!(per_worker.iter().sum::<usize>(), 37 * 23);
        }
    }
    #[test]
    fn zero_threads() {
        let c = Counter1D::new(4);
        assert!(run_workers(&c, 0, |&i| i, |_, _| {}).is_err());
    }
}
