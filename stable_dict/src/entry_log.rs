//! Append-only storage for keys and values, addressed by insertion position.
//!
//! Entries are only ever appended at the write cursor or updated in place; nothing at this layer
//! removes or moves an entry. The position of an entry (its sequence number) therefore stays
//! valid for the lifetime of the log. Removal is represented one layer up, in the index table,
//! and leaves the logged entry behind as unreachable dead storage.

#[derive(Debug)]
pub struct EntryLog<K, V> {
    keys: Vec<K>,
    values: Vec<V>,
    // Growth threshold, always a power of two (or zero before the first allocation). Tracked
    // apart from the `Vec` allocations: it is the quantity that ties the log to the index table
    // size.
    capacity: usize,
}

impl<K, V> Default for EntryLog<K, V> {
    fn default() -> Self {
        EntryLog {
            keys: Vec::new(),
            values: Vec::new(),
            capacity: 0,
        }
    }
}

impl<K, V> EntryLog<K, V> {
    pub fn with_capacity(capacity: usize) -> Self {
        EntryLog {
            keys: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            capacity,
        }
    }
    /// Total number of entries ever logged, including dead ones.
    pub fn len(&self) -> usize {
        self.keys.len()
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn is_full(&self) -> bool {
        self.keys.len() == self.capacity
    }
    pub fn push(&mut self, key: K, value: V) -> usize {
        debug_assert!(!self.is_full());
        let seq = self.keys.len();
        self.keys.push(key);
        self.values.push(value);
        seq
    }
    pub fn key(&self, seq: usize) -> &K {
        &self.keys[seq]
    }
    pub fn value(&self, seq: usize) -> &V {
        &self.values[seq]
    }
    pub fn value_mut(&mut self, seq: usize) -> &mut V {
        &mut self.values[seq]
    }
    pub fn pair(&self, seq: usize) -> (&K, &V) {
        (&self.keys[seq], &self.values[seq])
    }
    /// Replaces the value of a live entry in place, keeping its sequence number.
    pub fn replace_value(&mut self, seq: usize, value: V) -> V {
        std::mem::replace(&mut self.values[seq], value)
    }
    pub fn grow_to(&mut self, capacity: usize) {
        debug_assert!(capacity >= self.capacity);
        self.keys.reserve(capacity - self.keys.len());
        self.values.reserve(capacity - self.values.len());
        self.capacity = capacity;
    }
    pub fn keys(&self) -> &[K] {
        &self.keys
    }
    pub fn values(&self) -> &[V] {
        &self.values
    }
    pub fn into_parts(self) -> (Vec<K>, Vec<V>) {
        (self.keys, self.values)
    }
}
