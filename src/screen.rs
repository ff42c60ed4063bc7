// (c) Roel Kluin, 2023, GPL v3

use crate::error::{KmerError, KmerResult};
use crate::kmertable::{KmerTable, TableConfig};
use log::info;

/// Per key, the number of reference tables that contain it.
pub fn shared_table(refs: &[&KmerTable]) -> KmerResult<KmerTable> {
    let first = refs
        .first()
        .ok_or_else(|| KmerError::config("a reference screen needs at least one reference"))?;
    let capacity = refs.iter().map(|t| t.size()).sum();
    let mut shared = KmerTable::new(&TableConfig::new(capacity, first.kmerlen()))?;
    for (i, r) in refs.iter().enumerate() {
        if r.bitlen() != first.bitlen() {
            return Err(KmerError::config(format!(
                "reference {} has {}-mers, reference 0 {}-mers",
                i,
                r.kmerlen(),
                first.kmerlen()
            )));
        }
        for (key, _) in r.iter() {
            shared.insert(&key)?;
        }
    }
    Ok(shared)
}

/// A negative threshold counts down from the number of references.
pub fn effective_threshold(references: usize, threshold: i64) -> u64 {
    if threshold < 0 {
        (references as u64).saturating_sub(threshold.unsigned_abs())
    } else {
        threshold as u64
    }
}

/// Remove from each target the keys found in more than `threshold` references.
/// Returns the number of keys removed per target.
pub fn screen(refs: &[&KmerTable], targets: &mut [KmerTable], threshold: i64) -> KmerResult<Vec<usize>> {
    let shared = shared_table(refs)?;
    for (i, t) in targets.iter().enumerate() {
        if t.bitlen() != shared.bitlen() {
            return Err(KmerError::config(format!(
                "table {} has {}-mers, the references {}-mers",
                i,
                t.kmerlen(),
                shared.kmerlen()
            )));
        }
    }
    let limit = effective_threshold(refs.len(), threshold);
    info!(
        "screening {} tables against {} references: {} shared k-mers, limit {}",
        targets.len(),
        refs.len(),
        shared.size(),
        limit
    );
    let removed: Vec<usize> = targets
        .iter_mut()
        .map(|t| t.retain(|key, _| shared.value(key) <= limit))
        .collect();
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmerconst::KmerConst;
    use crate::new_types::packed_key::PackedKey;

    fn table(kc: &KmerConst, dna: &[&str]) -> KmerTable {
        let mut t = KmerTable::new(&TableConfig::new(16, kc.kmerlen)).unwrap();
        for s in dna {
            let key = PackedKey::from_dna(kc, s.as_bytes()).unwrap().to_canonical(kc);
            t.increment(&key);
        }
        t
    }

    #[test]
    fn thresholds() {
        assert_eq!(effective_threshold(3, 1), 1);
        assert_eq!(effective_threshold(3, -1), 2);
        assert_eq!(effective_threshold(3, -5), 0);
    }
    #[test]
    fn shared_counts_references() {
        let kc = KmerConst::new(5).unwrap();
        let r1 = table(&kc, &["AAAAC", "AAAAG"]);
        let r2 = table(&kc, &["AAAAC"]);
        let shared = shared_table(&[&r1, &r2]).unwrap();
        let key = |s: &str| PackedKey::from_dna(&kc, s.as_bytes()).unwrap();
        assert_eq!(shared.value(&key("AAAAC")), 2);
        assert_eq!(shared.value(&key("AAAAG")), 1);
        assert!(shared_table(&[]).is_err());
    }
    #[test]
    fn negative_threshold() {
        let kc = KmerConst::new(5).unwrap();
        let r1 = table(&kc, &["AAAAC", "AAAAG"]);
        let r2 = table(&kc, &["AAAAC"]);
        let mut targets = vec![table(&kc, &["AAAAC", "AAAAG", "AAACC"])];
        // 2 - 1: keys in 2 references go
        let removed = screen(&[&r1, &r2], &mut targets, -1).unwrap();
        assert_eq!(removed, vec![1]);
        assert_eq!(targets[0].size(), 2);
    }
    #[test]
    fn target_width_must_match() {
        // 5- and 7-mers both fit one word
        let r = table(&KmerConst::new(5).unwrap(), &["AAAAC"]);
        let mut targets = vec![table(&KmerConst::new(7).unwrap(), &["AAAAACC", "AAAACCC"])];
        assert!(matches!(screen(&[&r], &mut targets, 0), Err(KmerError::Config(_))));
        assert_eq!(targets[0].size(), 2);
    }
}
