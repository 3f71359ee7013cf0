//! Resizable chained hash dictionary.
//!
//! Every lookup table of the topology store (addresses, clients per address,
//! topics, published edges per client) is a `HashDict`. Entries are keyed by
//! the sdbm hash of their identifier and kept in per-bucket chains. The
//! bucket array starts with a single slot, doubles when it is full before an
//! insert and halves when it drops under a quarter full after a removal.
//!
//! Entries keep their original key next to the hash and lookups compare
//! both, so two identifiers with colliding hashes never alias.

use crate::utils::error::GraphError;
use crate::utils::hash::sdbm_hash;

#[derive(Debug)]
struct Entry<V> {
    hash: u64,
    key: String,
    value: V,
}

#[derive(Debug)]
pub struct HashDict<V> {
    buckets: Vec<Vec<Entry<V>>>,
    used: usize,
}

impl<V> Default for HashDict<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> HashDict<V> {
    pub fn new() -> Self {
        Self {
            buckets: vec![Vec::new()],
            used: 0,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Number of buckets.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    fn index(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    /// Inserts `value` under `key` at the head of its bucket chain.
    ///
    /// Fails with `Duplicate` if `key` is already present, or `Allocation` if
    /// growing the bucket array failed; in both cases nothing changes.
    pub fn insert(&mut self, key: &str, value: V) -> Result<&mut V, GraphError> {
        self.insert_hashed(sdbm_hash(key), key, value)
    }

    fn insert_hashed(&mut self, hash: u64, key: &str, value: V) -> Result<&mut V, GraphError> {
        if self.find_hashed(hash, key).is_some() {
            return Err(GraphError::Duplicate(key.to_string()));
        }
        if self.used == self.capacity() {
            self.rehash(self.capacity() * 2, Some(hash))?;
        }

        let idx = self.index(hash);
        let chain = &mut self.buckets[idx];
        // already reserved when the array was just rebuilt
        chain.try_reserve(1)?;
        chain.insert(
            0,
            Entry {
                hash,
                key: key.to_string(),
                value,
            },
        );
        self.used += 1;
        Ok(&mut chain[0].value)
    }

    pub fn find(&self, key: &str) -> Option<&V> {
        self.find_hashed(sdbm_hash(key), key)
    }

    fn find_hashed(&self, hash: u64, key: &str) -> Option<&V> {
        self.buckets[self.index(hash)]
            .iter()
            .find(|e| e.hash == hash && e.key == key)
            .map(|e| &e.value)
    }

    pub fn find_mut(&mut self, key: &str) -> Option<&mut V> {
        let hash = sdbm_hash(key);
        let idx = self.index(hash);
        self.buckets[idx]
            .iter_mut()
            .find(|e| e.hash == hash && e.key == key)
            .map(|e| &mut e.value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Unlinks `key` from its chain and returns its value.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.remove_hashed(sdbm_hash(key), key)
    }

    fn remove_hashed(&mut self, hash: u64, key: &str) -> Option<V> {
        let idx = self.index(hash);
        let chain = &mut self.buckets[idx];
        let pos = chain.iter().position(|e| e.hash == hash && e.key == key)?;
        let entry = chain.remove(pos);
        self.used -= 1;
        self.maybe_shrink();
        Some(entry.value)
    }

    /// Removes every entry for which `pred` returns true, in iteration order.
    pub fn remove_where<F>(&mut self, mut pred: F) -> Vec<(String, V)>
    where
        F: FnMut(&str, &mut V) -> bool,
    {
        let mut removed = Vec::new();
        for chain in &mut self.buckets {
            let mut i = 0;
            while i < chain.len() {
                let entry = &mut chain[i];
                if pred(&entry.key, &mut entry.value) {
                    let entry = chain.remove(i);
                    removed.push((entry.key, entry.value));
                } else {
                    i += 1;
                }
            }
        }
        self.used -= removed.len();
        if !removed.is_empty() {
            self.maybe_shrink();
        }
        removed
    }

    /// Iterates in bucket order, then chain order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.buckets
            .iter()
            .flat_map(|chain| chain.iter())
            .map(|e| (e.key.as_str(), &e.value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut V)> {
        self.buckets
            .iter_mut()
            .flat_map(|chain| chain.iter_mut())
            .map(|e| (e.key.as_str(), &mut e.value))
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.iter_mut().map(|(_, v)| v)
    }

    pub fn keys(&self) -> Vec<String> {
        self.iter().map(|(k, _)| k.to_string()).collect()
    }

    /// Halves the bucket array until it is at least a quarter full again.
    fn maybe_shrink(&mut self) {
        loop {
            let capacity = self.capacity();
            if capacity <= 1 || self.used >= capacity / 4 {
                return;
            }
            if let Err(e) = self.rehash(capacity / 2, None) {
                tracing::debug!("Keeping {} buckets after failed shrink: {}", capacity, e);
                return;
            }
        }
    }

    /// Moves every entry into a fresh bucket array of `new_capacity` slots.
    ///
    /// All memory for the new array and its chains is reserved before any
    /// entry moves, so a failure leaves the current array untouched. When
    /// `pending` is set, its chain also gets room for one more entry.
    fn rehash(&mut self, new_capacity: usize, pending: Option<u64>) -> Result<(), GraphError> {
        let new_capacity = new_capacity.max(1);

        let mut counts: Vec<usize> = Vec::new();
        counts.try_reserve_exact(new_capacity)?;
        counts.resize(new_capacity, 0);
        for entry in self.buckets.iter().flat_map(|chain| chain.iter()) {
            counts[(entry.hash % new_capacity as u64) as usize] += 1;
        }
        if let Some(hash) = pending {
            counts[(hash % new_capacity as u64) as usize] += 1;
        }

        let mut buckets: Vec<Vec<Entry<V>>> = Vec::new();
        buckets.try_reserve_exact(new_capacity)?;
        for count in counts {
            let mut chain = Vec::new();
            chain.try_reserve_exact(count)?;
            buckets.push(chain);
        }

        let old = std::mem::replace(&mut self.buckets, buckets);
        for entry in old.into_iter().flatten() {
            let idx = self.index(entry.hash);
            self.buckets[idx].push(entry);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::HashDict;
    use crate::utils::error::GraphError;

    #[test]
    fn starts_with_one_bucket() {
        let dict: HashDict<u32> = HashDict::new();
        assert_eq!(dict.capacity(), 1);
        assert!(dict.is_empty());
    }

    #[test]
    fn grows_by_doubling_and_keeps_entries_findable() {
        let mut dict = HashDict::new();
        for i in 0..100 {
            dict.insert(&format!("client-{i}"), i).unwrap();
        }

        assert_eq!(dict.len(), 100);
        assert_eq!(dict.capacity(), 128);
        for i in 0..100 {
            assert_eq!(dict.find(&format!("client-{i}")), Some(&i));
        }
    }

    #[test]
    fn shrinks_when_mostly_empty() {
        let mut dict = HashDict::new();
        for i in 0..16 {
            dict.insert(&i.to_string(), i).unwrap();
        }
        assert_eq!(dict.capacity(), 16);

        for i in 0..14 {
            assert_eq!(dict.remove(&i.to_string()), Some(i));
        }
        assert_eq!(dict.len(), 2);
        assert!(dict.capacity() < 16);
        assert_eq!(dict.find("14"), Some(&14));
        assert_eq!(dict.find("15"), Some(&15));
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut dict = HashDict::new();
        dict.insert("a", 1).unwrap();
        let err = dict.insert("a", 2).unwrap_err();
        assert!(matches!(err, GraphError::Duplicate(key) if key == "a"));
        assert_eq!(dict.find("a"), Some(&1));
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn colliding_hashes_do_not_alias() {
        let mut dict = HashDict::new();
        dict.insert_hashed(7, "first", 1).unwrap();
        dict.insert_hashed(7, "second", 2).unwrap();

        assert_eq!(dict.find_hashed(7, "first"), Some(&1));
        assert_eq!(dict.find_hashed(7, "second"), Some(&2));
        assert_eq!(dict.find_hashed(7, "third"), None);

        assert_eq!(dict.remove_hashed(7, "first"), Some(1));
        assert_eq!(dict.find_hashed(7, "second"), Some(&2));
    }

    #[test]
    fn remove_missing_key_is_none() {
        let mut dict: HashDict<u32> = HashDict::new();
        assert_eq!(dict.remove("ghost"), None);
        assert_eq!(dict.len(), 0);
    }

    #[test]
    fn remove_where_returns_removed_entries() {
        let mut dict = HashDict::new();
        for i in 0..10 {
            dict.insert(&i.to_string(), i).unwrap();
        }

        let mut removed = dict.remove_where(|_, v| *v % 2 == 0);
        removed.sort_by_key(|(_, v)| *v);

        assert_eq!(removed.len(), 5);
        assert_eq!(removed[0], ("0".to_string(), 0));
        assert_eq!(dict.len(), 5);
        assert!(dict.values().all(|v| v % 2 == 1));
    }

    #[test]
    fn growth_reserves_room_for_the_pending_entry() {
        let mut dict = HashDict::new();
        dict.insert_hashed(3, "a", 1).unwrap();

        dict.rehash(2, Some(5)).unwrap();
        let chain = &dict.buckets[dict.index(5)];
        assert!(chain.capacity() > chain.len());
        assert_eq!(dict.find_hashed(3, "a"), Some(&1));
    }

    #[test]
    fn bulk_removal_shrinks_all_the_way() {
        let mut dict = HashDict::new();
        for i in 0..64 {
            dict.insert(&i.to_string(), i).unwrap();
        }
        assert_eq!(dict.capacity(), 64);

        dict.remove_where(|_, v| *v != 7);
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.capacity(), 4);
        assert_eq!(dict.find("7"), Some(&7));
    }
}
