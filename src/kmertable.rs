// (c) Roel Kluin, 2023, GPL v3

use crate::error::{KmerError, KmerResult};
use crate::kmerconst::KmerConst;
use crate::new_types::packed_key::{PackedKey, Word};
use crate::policy::FullPolicy;
use ahash::AHashMap;
use log::info;
use std::cmp;
use tempfile::NamedTempFile;

pub type SmallCount = u8;
/// A small counter at this value defers the remainder to the overflow map.
pub const SMALL_MAX: SmallCount = SmallCount::MAX;

pub(crate) type Overflow = AHashMap<PackedKey, u64>;

/// Construction parameters of a table.
#[derive(new, Clone, Debug)]
pub struct TableConfig {
    pub capacity: usize,
    pub kmerlen: usize,
    #[new(value = "0")]
    pub tag_count: usize,
    #[new(default)]
    pub policy: FullPolicy,
}

impl TableConfig {
    pub fn with_tags(mut self, tag_count: usize) -> Self {
        self.tag_count = tag_count;
        self
    }
    pub fn with_policy(mut self, policy: FullPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Fixed capacity, open addressed (double hashing) map from canonical k-mer to count.
/// A slot is occupied iff its key differs from the sentinel; occupied slots always
/// have a non-zero small count.
pub struct KmerTable {
    pub(crate) kc: KmerConst,
    pub(crate) modulus: usize,
    pub(crate) collision_modulus: usize,
    /// occupied slots plus the one sentinel that must remain
    pub(crate) used: usize,
    pub(crate) keys: Vec<Word>,
    pub(crate) small: Vec<SmallCount>,
    pub(crate) tags: Vec<Vec<SmallCount>>,
    pub(crate) overflow: Overflow,
    pub(crate) tag_overflow: Vec<Overflow>,
    pub(crate) invalid: PackedKey,
    pub(crate) policy: FullPolicy,
    pub(crate) dumps: Vec<NamedTempFile>,
}

enum Probe {
    Found(usize),
    Empty(usize),
}

/// One table entry with its tag counts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaggedEntry {
    pub key: PackedKey,
    pub count: u64,
    pub tags: Vec<u64>,
}

pub fn is_prime(n: usize) -> bool {
    if n < 4 {
        return n > 1;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }
    let mut d = 5;
    while d * d <= n {
        if n % d == 0 || n % (d + 2) == 0 {
            return false;
        }
        d += 6;
    }
    true
}

pub(crate) fn next_prime(mut n: usize) -> usize {
    while !is_prime(n) {
        n += 1;
    }
    n
}

/// largest prime <= n, for n >= 2
pub(crate) fn prev_prime(mut n: usize) -> usize {
    while n > 2 && !is_prime(n) {
        n -= 1;
    }
    n
}

pub(crate) fn moduli_for(capacity: usize) -> (usize, usize) {
    let modulus = next_prime(cmp::max(3, capacity.saturating_add(1)));
    let collision_modulus = prev_prime(cmp::max(2, modulus / 2));
    (modulus, collision_modulus)
}

impl KmerTable {
    pub fn new(config: &TableConfig) -> KmerResult<Self> {
        let kc = KmerConst::new(config.kmerlen)?;
        if config.tag_count > 0 && matches!(config.policy, FullPolicy::TmpFile(_)) {
            return Err(KmerError::config(
                "tag counters cannot be combined with temporary file dumps",
            ));
        }
        if config.tag_count > 64 {
            return Err(KmerError::config("at most 64 tag counters fit a tag mask"));
        }
        let mut table = KmerTable::alloc(kc, config.capacity, config.tag_count);
        table.policy = config.policy.clone();
        info!(
            "k-mer table: k={}, {} slots, {} tag counters, {:?}",
            table.kc.kmerlen, table.modulus, table.tag_count(), table.policy
        );
        Ok(table)
    }

    /// Initialize for a key bit width rather than a k-mer length.
    pub fn with_bitlen(capacity: usize, bitlen: usize, tag_count: usize) -> KmerResult<Self> {
        let kc = KmerConst::from_bitlen(bitlen)?;
        KmerTable::new(&TableConfig::new(capacity, kc.kmerlen).with_tags(tag_count))
    }

    pub(crate) fn alloc(kc: KmerConst, capacity: usize, tag_count: usize) -> Self {
        let (modulus, collision_modulus) = moduli_for(capacity);
        let invalid = kc.invalid_key();
        let keys = invalid.words().repeat(modulus);
        KmerTable {
            modulus,
            collision_modulus,
            used: 1,
            keys,
            small: vec![0; modulus],
            tags: vec![vec![0; modulus]; tag_count],
            overflow: Overflow::new(),
            tag_overflow: vec![Overflow::new(); tag_count],
            invalid,
            policy: FullPolicy::Reject,
            dumps: Vec::new(),
            kc,
        }
    }

    pub fn kmerconst(&self) -> &KmerConst {
        &self.kc
    }
    pub fn kmerlen(&self) -> usize {
        self.kc.kmerlen
    }
    pub fn bitlen(&self) -> usize {
        self.kc.bitlen
    }
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }
    pub fn modulus(&self) -> usize {
        self.modulus
    }
    pub fn collision_modulus(&self) -> usize {
        self.collision_modulus
    }
    pub fn invalid_key(&self) -> &PackedKey {
        &self.invalid
    }
    pub fn policy(&self) -> &FullPolicy {
        &self.policy
    }
    pub fn set_policy(&mut self, policy: FullPolicy) -> KmerResult<()> {
        if self.tag_count() > 0 && matches!(policy, FullPolicy::TmpFile(_)) {
            return Err(KmerError::config(
                "tag counters cannot be combined with temporary file dumps",
            ));
        }
        self.policy = policy;
        Ok(())
    }
    /// number of distinct keys
    pub fn size(&self) -> usize {
        self.used - 1
    }
    /// number of keys that fit
    pub fn capacity(&self) -> usize {
        self.modulus - 1
    }
    pub fn is_empty(&self) -> bool {
        self.used == 1
    }
    pub fn is_full(&self) -> bool {
        self.used == self.modulus
    }
    pub fn overflow_size(&self) -> usize {
        self.overflow.len()
    }

    #[inline(always)]
    pub(crate) fn slot(&self, i: usize) -> &[Word] {
        let w = self.kc.words;
        &self.keys[i * w..(i + 1) * w]
    }
    pub(crate) fn slot_key(&self, i: usize) -> PackedKey {
        PackedKey::from_words(self.slot(i))
    }
    #[inline(always)]
    pub(crate) fn is_occupied(&self, i: usize) -> bool {
        self.small[i] != 0
    }

    #[inline]
    fn probe(&self, key: &PackedKey) -> Probe {
        dbg_assert_eq!(key.words().len(), self.kc.words);
        let h = key.xor_hash();
        let mut i = (h % self.modulus as Word) as usize;
        let step = self.collision_modulus - (h % self.collision_modulus as Word) as usize;
        loop {
            let slot = self.slot(i);
            if slot == key.words() {
                return Probe::Found(i);
            }
            if slot == self.invalid.words() {
                return Probe::Empty(i);
            }
            // step < modulus and modulus is prime: every slot is visited.
            i += step;
            if i >= self.modulus {
                i -= self.modulus;
            }
        }
    }

    fn install(&mut self, i: usize, key: &PackedKey) {
        dbg_assert!(self.used < self.modulus);
        let w = self.kc.words;
        self.keys[i * w..(i + 1) * w].copy_from_slice(key.words());
        // tag counts left behind by clear(false) do not carry over to a new key
        for (tag, overflow) in self.tags.iter_mut().zip(self.tag_overflow.iter_mut()) {
            tag[i] = 0;
            overflow.remove(key);
        }
        self.used += 1;
    }

    fn bump(counter: &mut SmallCount, overflow: &mut Overflow, key: &PackedKey) {
        if *counter < SMALL_MAX {
            *counter += 1;
            if *counter == SMALL_MAX {
                overflow.insert(key.clone(), 0);
            }
        } else {
            *overflow.entry(key.clone()).or_insert(0) += 1;
        }
    }

    fn combined(counter: SmallCount, overflow: &Overflow, key: &PackedKey) -> u64 {
        let c = u64::from(counter);
        if counter == SMALL_MAX {
            c + overflow.get(key).copied().unwrap_or(0)
        } else {
            c
        }
    }

    fn store(counter: &mut SmallCount, overflow: &mut Overflow, key: &PackedKey, v: u64) {
        if v < u64::from(SMALL_MAX) {
            *counter = v as SmallCount;
            overflow.remove(key);
        } else {
            *counter = SMALL_MAX;
            overflow.insert(key.clone(), v - u64::from(SMALL_MAX));
        }
    }

    /// Count one occurrence. False only if the key is new and the table is full.
    pub fn increment(&mut self, key: &PackedKey) -> bool {
        dbg_assert!(key != &self.invalid, "sentinel {:?} inserted", key);
        match self.probe(key) {
            Probe::Found(i) => {
                KmerTable::bump(&mut self.small[i], &mut self.overflow, key);
                true
            }
            Probe::Empty(i) => {
                if self.used >= self.modulus {
                    return false;
                }
                self.install(i, key);
                self.small[i] = 1;
                true
            }
        }
    }

    /// increment, but on a full table apply the table-full policy and retry once.
    pub fn insert(&mut self, key: &PackedKey) -> KmerResult<()> {
        if self.increment(key) {
            return Ok(());
        }
        self.make_room()?;
        if self.increment(key) {
            Ok(())
        } else {
            Err(KmerError::CapacityExceeded {
                capacity: self.capacity(),
            })
        }
    }

    /// Count one occurrence in each tag counter selected by tag_mask. Keys that are
    /// not in the table are not recorded (false).
    pub fn increment_tag(&mut self, key: &PackedKey, tag_mask: u64) -> bool {
        match self.probe(key) {
            Probe::Found(i) => {
                for t in 0..self.tags.len() {
                    if tag_mask & (1 << t) != 0 {
                        KmerTable::bump(&mut self.tags[t][i], &mut self.tag_overflow[t], key);
                    }
                }
                true
            }
            Probe::Empty(_) => false,
        }
    }

    pub fn value(&self, key: &PackedKey) -> u64 {
        match self.probe(key) {
            Probe::Found(i) => KmerTable::combined(self.small[i], &self.overflow, key),
            Probe::Empty(_) => 0,
        }
    }

    pub fn contains(&self, key: &PackedKey) -> bool {
        matches!(self.probe(key), Probe::Found(_))
    }

    /// value, and the tag counts in out[..tag_count]; absent keys give zeroes.
    pub fn value_with_tags(&self, key: &PackedKey, out: &mut [u64]) -> u64 {
        dbg_assert!(out.len() >= self.tags.len());
        match self.probe(key) {
            Probe::Found(i) => {
                for (t, o) in out.iter_mut().enumerate().take(self.tags.len()) {
                    *o = KmerTable::combined(self.tags[t][i], &self.tag_overflow[t], key);
                }
                KmerTable::combined(self.small[i], &self.overflow, key)
            }
            Probe::Empty(_) => {
                out.iter_mut().take(self.tags.len()).for_each(|o| *o = 0);
                0
            }
        }
    }

    /// Overwrite the count of a key that is present. A zero count is not stored,
    /// use retain to remove keys.
    pub fn assign(&mut self, key: &PackedKey, v: u64) -> bool {
        if v == 0 {
            return false;
        }
        match self.probe(key) {
            Probe::Found(i) => {
                KmerTable::store(&mut self.small[i], &mut self.overflow, key, v);
                true
            }
            Probe::Empty(_) => false,
        }
    }

    /// Place a key with all its counts; used when rebuilding.
    pub(crate) fn put(&mut self, key: &PackedKey, count: u64, tags: &[u64]) -> bool {
        if count == 0 {
            return false;
        }
        let i = match self.probe(key) {
            Probe::Found(i) => i,
            Probe::Empty(i) => {
                if self.used >= self.modulus {
                    return false;
                }
                self.install(i, key);
                i
            }
        };
        KmerTable::store(&mut self.small[i], &mut self.overflow, key, count);
        for (t, &c) in tags.iter().enumerate().take(self.tags.len()) {
            if c != 0 {
                KmerTable::store(&mut self.tags[t][i], &mut self.tag_overflow[t], key, c);
            } else {
                self.tags[t][i] = 0;
                self.tag_overflow[t].remove(key);
            }
        }
        true
    }

    /// Empty the table but keep its allocation, tag counters included. With
    /// zero_tags the tag counts are reset as well, otherwise they are left as they
    /// are and a slot's tag counts are reset when a key is next installed there.
    pub fn clear(&mut self, zero_tags: bool) {
        let w = self.kc.words;
        for chunk in self.keys.chunks_exact_mut(w) {
            chunk.copy_from_slice(self.invalid.words());
        }
        self.small.iter_mut().for_each(|c| *c = 0);
        self.overflow.clear();
        if zero_tags {
            for tag in self.tags.iter_mut() {
                tag.iter_mut().for_each(|c| *c = 0);
            }
            self.tag_overflow.iter_mut().for_each(|o| o.clear());
        }
        self.used = 1;
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter { table: self, i: 0 }
    }

    pub fn iter_tags(&self) -> impl Iterator<Item = TaggedEntry> + '_ {
        (0..self.modulus)
            .filter(move |&i| self.is_occupied(i))
            .map(move |i| self.tagged_entry(i))
    }

    fn tagged_entry(&self, i: usize) -> TaggedEntry {
        let key = self.slot_key(i);
        let tags = (0..self.tags.len())
            .map(|t| KmerTable::combined(self.tags[t][i], &self.tag_overflow[t], &key))
            .collect();
        TaggedEntry {
            count: KmerTable::combined(self.small[i], &self.overflow, &key),
            tags,
            key,
        }
    }

    /// Occupied slots, by ascending key.
    pub(crate) fn sorted_slots(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.modulus).filter(|&i| self.is_occupied(i)).collect();
        order.sort_unstable_by(|&a, &b| self.slot(a).cmp(self.slot(b)));
        order
    }

    pub fn sorted_entries(&self) -> Vec<(PackedKey, u64)> {
        self.sorted_slots()
            .into_iter()
            .map(|i| {
                let key = self.slot_key(i);
                let count = KmerTable::combined(self.small[i], &self.overflow, &key);
                (key, count)
            })
            .collect()
    }

    pub fn sum_of_squares(&self) -> f64 {
        self.iter().map(|(_, c)| (c as f64) * (c as f64)).sum()
    }

    /// Rebuild into a table for capacity, keeping the entries for which keep holds.
    fn rebuild<F>(&mut self, capacity: usize, mut keep: F) -> KmerResult<usize>
    where
        F: FnMut(&PackedKey, u64) -> bool,
    {
        let survivors: Vec<TaggedEntry> = self
            .iter_tags()
            .filter(|e| keep(&e.key, e.count))
            .collect();
        if survivors.len() > capacity {
            return Err(KmerError::CapacityExceeded { capacity });
        }
        let removed = self.size() - survivors.len();
        let (modulus, _) = moduli_for(capacity);
        if modulus == self.modulus {
            self.clear(true);
        } else {
            let mut fresh = KmerTable::alloc(self.kc.clone(), capacity, self.tags.len());
            fresh.policy = self.policy.clone();
            fresh.dumps = std::mem::take(&mut self.dumps);
            *self = fresh;
        }
        for e in survivors.iter() {
            let placed = self.put(&e.key, e.count, &e.tags);
            dbg_assert!(placed);
        }
        Ok(removed)
    }

    /// Keep only the entries for which keep holds; returns the number removed.
    pub fn retain<F>(&mut self, keep: F) -> usize
    where
        F: FnMut(&PackedKey, u64) -> bool,
    {
        let capacity = self.capacity();
        // survivors never outnumber the current entries
        self.rebuild(capacity, keep).unwrap_or(0)
    }

    /// Move all entries into a table sized for capacity.
    pub fn rehash(&mut self, capacity: usize) -> KmerResult<()> {
        self.rebuild(capacity, |_, _| true).map(|_| ())
    }

    /// Drop entries below min_count, then shrink to twice the survivors.
    pub fn rehash_with_cutoff(&mut self, min_count: u64) -> KmerResult<usize> {
        let surviving = self.iter().filter(|&(_, c)| c >= min_count).count();
        let capacity = cmp::max(3, 2 * surviving);
        self.rebuild(capacity, |_, c| c >= min_count)
    }
}

/// (key, count) over the occupied slots, in slot order.
pub struct Iter<'a> {
    table: &'a KmerTable,
    i: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (PackedKey, u64);

    fn next(&mut self) -> Option<(PackedKey, u64)> {
        while self.i < self.table.modulus {
            let i = self.i;
            self.i += 1;
            if self.table.is_occupied(i) {
                let key = self.table.slot_key(i);
                let count = KmerTable::combined(self.table.small[i], &self.table.overflow, &key);
                return Some((key, count));
            }
        }
        None
    }
}

impl<'a> IntoIterator for &'a KmerTable {
    type Item = (PackedKey, u64);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::new_types::twobit::TwoBit;
    use rand::rngs::StdRng;
    use rand::{thread_rng, Rng, SeedableRng};

    fn table(capacity: usize, kmerlen: usize) -> KmerTable {
        KmerTable::new(&TableConfig::new(capacity, kmerlen)).unwrap()
    }

    fn random_key(rng: &mut impl Rng, kc: &KmerConst) -> PackedKey {
        let mut key = PackedKey::empty(kc);
        for _ in 0..kc.kmerlen {
            key.push_back(kc, TwoBit::new(rng.gen_range(0..4)));
        }
        key.to_canonical(kc)
    }

    #[test]
    fn primes() {
        let p: Vec<_> = (0..30).filter(|&n| is_prime(n)).collect();
        assert_eq!(p, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
        assert_eq!(moduli_for(0), (3, 2));
        assert_eq!(moduli_for(4), (5, 2));
        assert_eq!(moduli_for(100), (101, 47));
        assert!(is_prime(1_000_000_007));
    }
    #[test]
    fn counts_small_and_overflow() {
        let mut rng = thread_rng();
        let mut t = table(1000, 21);
        let kc = t.kmerconst().clone();
        let mut expect = AHashMap::new();
        for _ in 0..200 {
            let key = random_key(&mut rng, &kc);
            let n = rng.gen_range(1..600);
            for _ in 0..n {
                assert!(t.increment(&key));
            }
            *expect.entry(key).or_insert(0) += n;
        }
        assert_eq!(t.size(), expect.len());
        for (key, n) in expect.iter() {
            assert_eq!(t.value(key), *n);
        }
        let above = expect.values().filter(|&&n| n >= u64::from(SMALL_MAX)).count();
        assert_eq!(t.overflow_size(), above);
        assert_eq!(t.iter().count(), expect.len());
        for (key, count) in t.iter() {
            assert_eq!(expect[&key], count);
        }
    }
    #[test]
    fn absent_is_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut t = table(50, 40);
        let kc = t.kmerconst().clone();
        let first = random_key(&mut rng, &kc);
        t.increment(&first);
        for _ in 0..100 {
            let key = random_key(&mut rng, &kc);
            if key != first {
                assert_eq!(t.value(&key), 0);
                assert!(!t.contains(&key));
            }
        }
    }
    #[test]
    fn full_table_rejects_new_keys_only() {
        let mut t = table(4, 5);
        assert_eq!(t.modulus(), 5);
        let kc = t.kmerconst().clone();
        let keys: Vec<_> = ["AAAAA", "AAAAC", "AAAAG", "AAACA", "AAACC"]
            .iter()
            .map(|s| PackedKey::from_dna(&kc, s.as_bytes()).unwrap())
            .collect();
        for k in keys.iter().take(4) {
            assert!(t.increment(k));
        }
        assert!(t.is_full());
        assert!(!t.increment(&keys[4]));
        assert!(t.increment(&keys[0]));
        assert_eq!(t.value(&keys[0]), 2);
        match t.insert(&keys[4]) {
            Err(KmerError::CapacityExceeded { capacity }) => assert_eq!(capacity, 4),
            _ => panic!("expected a full table"),
        }
    }
    #[test]
    fn tags() {
        let kc = KmerConst::new(4).unwrap();
        let mut t = KmerTable::new(&TableConfig::new(10, 4).with_tags(2)).unwrap();
        let a = PackedKey::from_dna(&kc, b"AACC").unwrap();
        let b = PackedKey::from_dna(&kc, b"AAAC").unwrap();
        for _ in 0..300 {
            t.increment(&a);
        }
        t.increment(&b);
        for _ in 0..260 {
            assert!(t.increment_tag(&a, 0b01));
        }
        assert!(t.increment_tag(&a, 0b11));
        assert!(!t.increment_tag(&PackedKey::from_dna(&kc, b"ACAC").unwrap(), 0b11));

        let mut out = [0; 2];
        assert_eq!(t.value_with_tags(&a, &mut out), 300);
        assert_eq!(out, [261, 1]);
        assert_eq!(t.value_with_tags(&b, &mut out), 1);
        assert_eq!(out, [0, 0]);
        assert_eq!(t.overflow_size(), 1);
    }
    #[test]
    fn assign_and_retain() {
        let kc = KmerConst::new(4).unwrap();
        let mut t = table(20, 4);
        let keys: Vec<_> = ["AAAA", "AAAC", "AAAG", "AACA"]
            .iter()
            .map(|s| PackedKey::from_dna(&kc, s.as_bytes()).unwrap())
            .collect();
        for (n, k) in keys.iter().enumerate() {
            for _ in 0..=n {
                t.increment(k);
            }
        }
        assert!(t.assign(&keys[0], 1000));
        assert_eq!(t.value(&keys[0]), 1000);
        assert!(t.assign(&keys[0], 7));
        assert_eq!(t.overflow_size(), 0);
        assert!(!t.assign(&keys[1], 0));
        assert!(!t.assign(&PackedKey::from_dna(&kc, b"CCCC").unwrap(), 5));

        let removed = t.retain(|_, c| c % 2 == 1);
        assert_eq!(removed, 2);
        assert_eq!(t.size(), 2);
        assert_eq!(t.value(&keys[0]), 7);
        assert_eq!(t.value(&keys[1]), 0);
        assert_eq!(t.value(&keys[2]), 3);
    }
    #[test]
    fn rehash_keeps_counts() {
        let mut rng = thread_rng();
        let mut t = table(500, 12);
        let kc = t.kmerconst().clone();
        let keys: Vec<_> = (0..300).map(|_| random_key(&mut rng, &kc)).collect();
        for k in keys.iter() {
            t.increment(k);
        }
        let before = t.sorted_entries();
        t.rehash(2000).unwrap();
        assert_eq!(t.modulus(), 2003);
        assert_eq!(t.sorted_entries(), before);
        assert!(t.rehash(10).is_err());

        let n = t.size();
        let dropped = t.rehash_with_cutoff(2).unwrap();
        assert_eq!(t.size(), n - dropped);
        assert!(t.iter().all(|(_, c)| c >= 2));
        assert!(t.capacity() >= 2 * t.size());
    }
    #[test]
    fn clear_resets() {
        let kc = KmerConst::new(8).unwrap();
        let mut t = KmerTable::new(&TableConfig::new(10, 8).with_tags(1)).unwrap();
        let k = PackedKey::from_dna(&kc, b"ACGTTGCA").unwrap().to_canonical(&kc);
        t.increment(&k);
        t.increment_tag(&k, 1);
        t.clear(true);
        assert!(t.is_empty());
        assert_eq!(t.value(&k), 0);
        assert_eq!(t.tag_count(), 1);
        t.increment(&k);
        t.increment_tag(&k, 1);
        t.clear(false);
        assert!(t.is_empty());
        assert_eq!(t.tag_count(), 1);

        // the tag arrays survive, and a reinstalled key starts from zero
        t.increment(&k);
        let mut tags = [7];
        assert_eq!(t.value_with_tags(&k, &mut tags), 1);
        assert_eq!(tags, [0]);
        assert!(t.increment_tag(&k, 1));
        assert_eq!(t.value_with_tags(&k, &mut tags), 1);
        assert_eq!(tags, [1]);

        let mut buf = Vec::new();
        t.save_to(&mut buf, &[]).unwrap();
        let restored = KmerTable::restore_from(buf.as_slice()).unwrap().table;
        assert_eq!(restored.tag_count(), 1);
        assert_eq!(restored.value_with_tags(&k, &mut tags), 1);
        assert_eq!(tags, [1]);
    }
    #[test]
    fn cleared_tags_are_not_saved() {
        let kc = KmerConst::new(8).unwrap();
        let mut t = KmerTable::new(&TableConfig::new(10, 8).with_tags(1)).unwrap();
        let k = PackedKey::from_dna(&kc, b"ACGTTGCA").unwrap().to_canonical(&kc);
        for _ in 0..300 {
            t.increment(&k);
            t.increment_tag(&k, 1);
        }
        t.clear(false);
        assert_eq!(t.tag_count(), 1);
        let mut buf = Vec::new();
        t.save_to(&mut buf, &[]).unwrap();
        let restored = KmerTable::restore_from(buf.as_slice()).unwrap().table;
        assert!(restored.is_empty());
        assert_eq!(restored.tag_count(), 1);
    }
    #[test]
    fn sorted_entries_ascend() {
        let mut rng = thread_rng();
        let mut t = table(200, 35);
        let kc = t.kmerconst().clone();
        for _ in 0..150 {
            t.increment(&random_key(&mut rng, &kc));
        }
        let e = t.sorted_entries();
        assert_eq!(e.len(), t.size());
        assert!(e.windows(2).all(|w| w[0].0 < w[1].0));
    }
    #[test]
    fn tmp_file_with_tags_is_rejected() {
        let cfg = TableConfig::new(10, 4)
            .with_tags(1)
            .with_policy(FullPolicy::TmpFile("dump".into()));
        assert!(matches!(KmerTable::new(&cfg), Err(KmerError::Config(_))));
    }
}
