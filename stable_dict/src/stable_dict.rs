//! [StableDict] is a hash map that preserves insertion order, including across removals.
use crate::{
    entry_log::EntryLog,
    index_table::{IndexTable, Probe},
    util::impl_iterator,
};
use core::hash::Hash;
use std::{
    borrow::Borrow,
    hash::{BuildHasher, BuildHasherDefault},
    ops,
};
use zwohash::ZwoHasher;

// Entry capacity allocated by the first insertion into a dictionary constructed without a
// capacity. The index table always has twice as many slots as the entry capacity, so that
// occupied and tombstoned slots together can never fill it and probing always terminates.
const INITIAL_CAPACITY: usize = 16;
const MIN_CAPACITY: usize = 4;

fn alloc_capacity(capacity: usize) -> usize {
    if capacity == 0 {
        0
    } else {
        capacity.next_power_of_two().max(MIN_CAPACITY)
    }
}

/// A hash map that preserves the order in which keys were first inserted, even across removals.
///
/// In `StableDict<K, V, S>`, `K: Hash + Eq` is the key type, `V` is the value type and
/// `S: BuildHasher` is used for hashing keys (`S` should usually be omitted, it then defaults to
/// the crate's default hasher).
///
/// Removing an entry leaves its storage behind as unreachable dead weight and is reclaimed only
/// when the dictionary is dropped, cloned or consumed; see the crate docs for the tradeoff this
/// buys.
pub struct StableDict<K, V, S = BuildHasherDefault<ZwoHasher>> {
    slots: IndexTable,
    log: EntryLog<K, V>,
    live: usize,
    build_hasher: S,
}

impl<K, V, S: Default> Default for StableDict<K, V, S> {
    fn default() -> Self {
        StableDict {
            slots: IndexTable::default(),
            log: EntryLog::default(),
            live: 0,
            build_hasher: S::default(),
        }
    }
}

impl<K, V, S: Default> StableDict<K, V, S> {
    /// Returns an empty dictionary.
    ///
    /// Does not allocate; the first insertion allocates room for 16 entries.
    pub fn new() -> Self {
        Self::default()
    }
    /// Returns an empty dictionary with room for `capacity` entries before the first growth.
    ///
    /// The capacity is rounded up to a power of two and counts logged entries, i.e. entries ever
    /// inserted, including since-removed ones.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<K, V, S> StableDict<K, V, S> {
    /// Returns an empty dictionary with the provided BuildHasher.
    pub fn with_hasher(build_hasher: S) -> Self {
        StableDict {
            slots: IndexTable::default(),
            log: EntryLog::default(),
            live: 0,
            build_hasher,
        }
    }
    /// Returns an empty dictionary with the specified capacity and provided BuildHasher.
    pub fn with_capacity_and_hasher(capacity: usize, build_hasher: S) -> Self {
        let capacity = alloc_capacity(capacity);
        let slots = if capacity == 0 {
            IndexTable::default()
        } else {
            IndexTable::with_slots(capacity * 2)
        };
        StableDict {
            slots,
            log: EntryLog::with_capacity(capacity),
            live: 0,
            build_hasher,
        }
    }
}

impl<K: std::fmt::Debug, V: std::fmt::Debug, S> std::fmt::Debug for StableDict<K, V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> StableDict<K, V, S> {
    /// Returns the number of live entries in the dictionary.
    pub fn len(&self) -> usize {
        self.live
    }
    /// Returns `true` if the dictionary contains no live entries.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
    /// Returns an iterator over all key-value pairs in insertion order.
    ///
    /// As long as no entry was ever removed, the live entries are exactly the logged entries and
    /// are yielded straight off the log. Otherwise the live log positions are collected from the
    /// index table and sorted; positions are assigned monotonically, so the sorted order is the
    /// insertion order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let inner = if self.live == self.log.len() {
            IterInner::Dense(self.log.keys().iter().zip(self.log.values().iter()))
        } else {
            IterInner::Sparse {
                keys: self.log.keys(),
                values: self.log.values(),
                seqs: self.sorted_live_seqs().into_iter(),
            }
        };
        Iter { inner }
    }
    /// Returns an iterator over all keys in insertion order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }
    /// Returns an iterator over all values in insertion order.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }
    /// Removes the most recently inserted live entry and returns references to its key and
    /// value, or `None` if the dictionary is empty.
    ///
    /// Updating a value in place does not count as an insertion, so a sequence of calls unwinds
    /// the surviving entries in reverse insertion order. The returned references point at the
    /// now-dead logged entry and stay valid until the dictionary is mutated again.
    pub fn pop_last(&mut self) -> Option<(&K, &V)> {
        let (slot, seq) = self.slots.max_occupied()?;
        self.slots.bury(slot);
        self.live -= 1;
        Some(self.log.pair(seq))
    }
    fn sorted_live_seqs(&self) -> Vec<usize> {
        let mut seqs: Vec<usize> = self.slots.occupied_seqs().collect();
        seqs.sort_unstable();
        seqs
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> StableDict<K, V, S> {
    /// Returns a reference to the value corresponding to the specified key, if it exists.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        Q: Hash + Eq + ?Sized,
        K: Borrow<Q>,
    {
        let hash = self.build_hasher.hash_one(key);
        let seq = self
            .slots
            .find(hash, |seq| self.log.key(seq).borrow() == key)?;
        Some(self.log.value(seq))
    }
    /// Returns a mutable reference to the value corresponding to the specified key, if it
    /// exists.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        Q: Hash + Eq + ?Sized,
        K: Borrow<Q>,
    {
        let hash = self.build_hasher.hash_one(key);
        let seq = self
            .slots
            .find(hash, |seq| self.log.key(seq).borrow() == key)?;
        Some(self.log.value_mut(seq))
    }
    /// Returns `true` if the dictionary contains the specified key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: Hash + Eq + ?Sized,
        K: Borrow<Q>,
    {
        self.get(key).is_some()
    }
    /// Inserts `value` at `key`, replacing and returning any previous value.
    ///
    /// If the key is already present its value is replaced in place and its position in the
    /// insertion order is unchanged. Otherwise the entry is appended at the end of the order.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.entry(key) {
            Entry::Occupied(entry) => Some(entry.insert(value)),
            Entry::Vacant(entry) => {
                entry.insert(value);
                None
            }
        }
    }
    /// Removes the entry with the specified key and returns a reference to its value, or `None`
    /// if the key is absent (in which case nothing changes).
    ///
    /// The order of the remaining entries is unaffected. The returned reference points at the
    /// now-dead logged entry and stays valid until the dictionary is mutated again.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<&V>
    where
        Q: Hash + Eq + ?Sized,
        K: Borrow<Q>,
    {
        self.remove_entry(key).map(|(_, value)| value)
    }
    /// Removes the entry with the specified key and returns references to its key and value, or
    /// `None` if the key is absent (in which case nothing changes).
    ///
    /// The order of the remaining entries is unaffected. The returned references point at the
    /// now-dead logged entry and stay valid until the dictionary is mutated again.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(&K, &V)>
    where
        Q: Hash + Eq + ?Sized,
        K: Borrow<Q>,
    {
        if self.log.capacity() == 0 {
            return None;
        }
        let hash = self.build_hasher.hash_one(key);
        match self
            .slots
            .probe(hash, |seq| self.log.key(seq).borrow() == key)
        {
            Probe::Found { slot, seq } => {
                self.slots.bury(slot);
                self.live -= 1;
                Some(self.log.pair(seq))
            }
            Probe::Vacant { .. } => None,
        }
    }
    /// Returns the entry corresponding to the given key, allowing for insertion and/or in-place
    /// mutation.
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V, S> {
        if self.log.capacity() == 0 {
            self.grow();
        }
        let hash = self.build_hasher.hash_one(&key);
        match self.slots.probe(hash, |seq| self.log.key(seq) == &key) {
            Probe::Found { slot, seq } => Entry::Occupied(OccupiedEntry {
                dict: self,
                slot,
                seq,
            }),
            Probe::Vacant { slot } => Entry::Vacant(VacantEntry {
                dict: self,
                hash,
                slot,
                key,
            }),
        }
    }
}

impl<K: Hash, V, S: BuildHasher> StableDict<K, V, S> {
    // Doubles the entry capacity and rebuilds the index table at twice the new capacity,
    // re-placing only the occupied markers. Tombstones are shed here, dead log entries are not.
    fn grow(&mut self) {
        let new_capacity = match self.log.capacity() {
            0 => INITIAL_CAPACITY,
            capacity => capacity * 2,
        };
        self.log.grow_to(new_capacity);
        let log = &self.log;
        let build_hasher = &self.build_hasher;
        self.slots
            .grow(new_capacity * 2, |seq| build_hasher.hash_one(log.key(seq)));
    }
    #[cfg(test)]
    pub(crate) fn check(&self) {
        assert_eq!(self.live, self.slots.occupied_seqs().count());
        assert!(self.live <= self.log.len());
        assert!(self.log.len() <= self.log.capacity());
        assert_eq!(self.slots.num_slots(), self.log.capacity() * 2);
        for seq in self.slots.occupied_seqs() {
            let hash = self.build_hasher.hash_one(self.log.key(seq));
            assert_eq!(self.slots.find(hash, |other| other == seq), Some(seq));
        }
    }
}

/// An iterator over the entries of a [`StableDict`].
///
/// This struct is created by the [`iter`](`StableDict::iter`) method on [`StableDict`].
pub struct Iter<'a, K, V> {
    inner: IterInner<'a, K, V>,
}

enum IterInner<'a, K, V> {
    Dense(std::iter::Zip<std::slice::Iter<'a, K>, std::slice::Iter<'a, V>>),
    Sparse {
        keys: &'a [K],
        values: &'a [V],
        seqs: std::vec::IntoIter<usize>,
    },
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);
    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            IterInner::Dense(zip) => zip.next(),
            IterInner::Sparse { keys, values, seqs } => {
                let seq = seqs.next()?;
                // Copy the slice borrows out so the returned references get the full lifetime
                // instead of the reborrow through `&mut self`.
                let (keys, values) = (*keys, *values);
                Some((&keys[seq], &values[seq]))
            }
        }
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            IterInner::Dense(zip) => zip.size_hint(),
            IterInner::Sparse { seqs, .. } => seqs.size_hint(),
        }
    }
}

/// An iterator over the keys of a [`StableDict`].
///
/// This struct is created by the [`keys`](`StableDict::keys`) method on [`StableDict`].
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}
impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;
    impl_iterator!(|(key, _)| key);
}

/// An iterator over the values of a [`StableDict`].
///
/// This struct is created by the [`values`](`StableDict::values`) method on [`StableDict`].
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}
impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;
    impl_iterator!(|(_, value)| value);
}

/// An iterator moving entries out of a [`StableDict`].
///
/// This struct is created by the `into_iter` method on [`StableDict`]. Dead logged entries are
/// dropped along the way and are not yielded.
pub struct IntoIter<K, V> {
    inner: std::iter::Zip<std::vec::IntoIter<K>, std::vec::IntoIter<V>>,
    live: LiveSeqs,
    pos: usize,
}

enum LiveSeqs {
    All,
    Sorted(std::vec::IntoIter<usize>),
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);
    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.live {
            LiveSeqs::All => self.inner.next(),
            LiveSeqs::Sorted(seqs) => {
                let seq = seqs.next()?;
                let skip = seq - self.pos;
                self.pos = seq + 1;
                self.inner.nth(skip)
            }
        }
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.live {
            LiveSeqs::All => self.inner.size_hint(),
            LiveSeqs::Sorted(seqs) => seqs.size_hint(),
        }
    }
}

impl<K, V, S> IntoIterator for StableDict<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;
    fn into_iter(self) -> Self::IntoIter {
        let live = if self.live == self.log.len() {
            LiveSeqs::All
        } else {
            LiveSeqs::Sorted(self.sorted_live_seqs().into_iter())
        };
        let (keys, values) = self.log.into_parts();
        IntoIter {
            inner: keys.into_iter().zip(values),
            live,
            pos: 0,
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a StableDict<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A vacant entry in a [`StableDict`].
pub struct VacantEntry<'a, K, V, S> {
    dict: &'a mut StableDict<K, V, S>,
    hash: u64,
    slot: usize,
    key: K,
}

/// An occupied entry in a [`StableDict`].
pub struct OccupiedEntry<'a, K, V, S> {
    dict: &'a mut StableDict<K, V, S>,
    slot: usize,
    seq: usize,
}

/// An entry in a [`StableDict`].
pub enum Entry<'a, K, V, S> {
    /// A vacant entry.
    Vacant(VacantEntry<'a, K, V, S>),
    /// An occupied entry.
    Occupied(OccupiedEntry<'a, K, V, S>),
}

impl<'a, K, V, S> VacantEntry<'a, K, V, S> {
    /// Returns a reference to the key that would be used for insertion.
    pub fn key(&self) -> &K {
        &self.key
    }
    /// Returns the key that would be used for insertion.
    pub fn into_key(self) -> K {
        self.key
    }
}

impl<'a, K: Hash, V, S: BuildHasher> VacantEntry<'a, K, V, S> {
    /// Inserts a value into the entry, returning a mutable reference to the value.
    ///
    /// The new entry goes to the end of the insertion order.
    pub fn insert(self, value: V) -> &'a mut V {
        let VacantEntry {
            dict,
            hash,
            mut slot,
            key,
        } = self;
        if dict.log.is_full() {
            dict.grow();
            // The rebuilt table invalidates the probed slot; the key is still absent, so its
            // slot is the first empty one on the probe path.
            slot = dict.slots.find_empty(hash);
        }
        let seq = dict.log.push(key, value);
        dict.slots.occupy(slot, seq);
        dict.live += 1;
        dict.log.value_mut(seq)
    }
}

impl<'a, K, V, S> OccupiedEntry<'a, K, V, S> {
    /// Returns a reference to the key of the entry.
    pub fn key(&self) -> &K {
        self.dict.log.key(self.seq)
    }
    /// Replaces the value in the entry with the provided value, returning the previous value.
    ///
    /// The entry keeps its position in the insertion order.
    pub fn insert(self, value: V) -> V {
        std::mem::replace(self.into_mut(), value)
    }
    /// Returns a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        self.dict.log.value_mut(self.seq)
    }
    /// Returns a mutable reference to the value in the entry, bound to the lifetime of the
    /// dictionary.
    pub fn into_mut(self) -> &'a mut V {
        self.dict.log.value_mut(self.seq)
    }
    /// Removes the entry from the dictionary and returns references to its key and value.
    ///
    /// The order of the remaining entries is unaffected.
    pub fn remove_entry(self) -> (&'a K, &'a V) {
        let OccupiedEntry { dict, slot, seq } = self;
        dict.slots.bury(slot);
        dict.live -= 1;
        dict.log.pair(seq)
    }
    /// Removes the entry from the dictionary and returns a reference to its value.
    ///
    /// The order of the remaining entries is unaffected.
    pub fn remove(self) -> &'a V {
        self.remove_entry().1
    }
}

impl<'a, K, V, S> Entry<'a, K, V, S> {
    /// Returns a reference to the key of the entry.
    pub fn key(&self) -> &K {
        match self {
            Entry::Vacant(entry) => entry.key(),
            Entry::Occupied(entry) => entry.key(),
        }
    }
    /// Modifies the value by calling `f(&mut value)` if the entry is occupied. Returns the entry
    /// itself.
    pub fn and_modify(self, f: impl FnOnce(&mut V)) -> Self {
        match self {
            Entry::Vacant(entry) => Entry::Vacant(entry),
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
        }
    }
}

impl<'a, K: Hash, V, S: BuildHasher> Entry<'a, K, V, S> {
    /// Inserts the default value if the entry is vacant. Returns a mutable reference to the
    /// entry.
    pub fn or_default(self) -> &'a mut V
    where
        V: Default,
    {
        self.or_insert_with(V::default)
    }
    /// Inserts the provided value if the entry is vacant. Returns a mutable reference to the
    /// entry.
    pub fn or_insert(self, value: V) -> &'a mut V {
        match self {
            Entry::Vacant(entry) => entry.insert(value),
            Entry::Occupied(entry) => entry.into_mut(),
        }
    }
    /// Inserts the value returned by `f()` if the entry is vacant, invoking `f` at most once.
    /// Returns a mutable reference to the entry.
    pub fn or_insert_with(self, f: impl FnOnce() -> V) -> &'a mut V {
        match self {
            Entry::Vacant(entry) => entry.insert(f()),
            Entry::Occupied(entry) => entry.into_mut(),
        }
    }
    /// Inserts the value returned by `f(&key)` if the entry is vacant. Returns a mutable
    /// reference to the entry.
    pub fn or_insert_with_key(self, f: impl FnOnce(&K) -> V) -> &'a mut V {
        match self {
            Entry::Vacant(entry) => {
                let value = f(entry.key());
                entry.insert(value)
            }
            Entry::Occupied(entry) => entry.into_mut(),
        }
    }
}

/// Cloning rebuilds the dictionary compacted: the clone iterates the source in insertion order
/// and re-inserts each pair, so it shares no tombstones, dead entries or excess capacity with
/// the source, and the two are fully independent afterwards.
impl<K: Hash + Eq + Clone, V: Clone, S: BuildHasher + Clone> Clone for StableDict<K, V, S> {
    fn clone(&self) -> Self {
        let mut dict = StableDict::with_capacity_and_hasher(self.live, self.build_hasher.clone());
        for (key, value) in self.iter() {
            dict.insert(key.clone(), value.clone());
        }
        dict
    }
}

impl<K: Hash + Eq, V, S: BuildHasher + Default> FromIterator<(K, V)> for StableDict<K, V, S> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let iter = iter.into_iter();
        let mut dict = StableDict::with_capacity_and_hasher(iter.size_hint().0, S::default());
        for (key, value) in iter {
            dict.insert(key, value);
        }
        dict
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> Extend<(K, V)> for StableDict<K, V, S> {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K: Hash + Eq, V, const N: usize> From<[(K, V); N]> for StableDict<K, V> {
    fn from(pairs: [(K, V); N]) -> Self {
        Self::from_iter(pairs)
    }
}

/// Indexing panics if the key is absent; use [`StableDict::get`] for a fallible lookup.
impl<K, V, S, Q> ops::Index<&Q> for StableDict<K, V, S>
where
    K: Hash + Eq + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    S: BuildHasher,
{
    type Output = V;
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("StableDict: key not found")
    }
}

#[test]
fn test() {
    let mut dict: StableDict<String, usize> = StableDict::default();
    dict.insert("adam".into(), 10);
    dict.insert("eve".into(), 25);
    dict.insert("mallory".into(), 8);
    dict.insert("jim".into(), 14);
    match dict.entry("eve".to_string()) {
        Entry::Vacant(_) => unreachable!(),
        Entry::Occupied(entry) => entry.remove(),
    };
    dbg!(&dict);
    dict.check();
    assert_eq!(
        dict.keys().collect::<Vec<_>>(),
        ["adam", "mallory", "jim"]
    );
}
