//! Open-addressing index table mapping key hashes to entry log positions.
//!
//! The table never sees keys or values. Lookups compare keys through a caller-supplied closure
//! over sequence numbers, and rehashing recomputes hashes through a caller-supplied hashing
//! closure, mirroring how the log and the table are kept decoupled everywhere else.

/// Marker stored at each slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Never written since the last rebuild. Terminates probe sequences.
    Empty,
    /// Resolves lookups to the entry logged at this sequence number.
    Occupied(usize),
    /// Left behind by a removal. Probes continue past it, but it never matches, and it is only
    /// retired by a rebuild.
    Tombstone,
}

/// Outcome of probing for a key.
#[derive(Debug, Clone, Copy)]
pub enum Probe {
    Found { slot: usize, seq: usize },
    /// The key is absent; `slot` is the empty slot a new entry would occupy.
    Vacant { slot: usize },
}

#[derive(Debug, Default)]
pub struct IndexTable {
    slots: Box<[Slot]>,
}

impl IndexTable {
    pub fn with_slots(len: usize) -> Self {
        debug_assert!(len.is_power_of_two());
        IndexTable {
            slots: vec![Slot::Empty; len].into_boxed_slice(),
        }
    }
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }
    fn mask(&self) -> usize {
        self.slots.len() - 1
    }
    /// Linear probe for the entry matching `eq`, starting at the key's home slot.
    ///
    /// Requires a non-empty table with at least one `Empty` slot, which the growth policy
    /// maintains by capping logged entries at half the slot count.
    pub fn probe(&self, hash: u64, mut eq: impl FnMut(usize) -> bool) -> Probe {
        debug_assert!(!self.slots.is_empty());
        let mask = self.mask();
        let mut slot = hash as usize & mask;
        loop {
            match self.slots[slot] {
                Slot::Empty => return Probe::Vacant { slot },
                Slot::Occupied(seq) if eq(seq) => return Probe::Found { slot, seq },
                _ => slot = (slot + 1) & mask,
            }
        }
    }
    /// Read-only lookup, also usable on a table that has never been allocated.
    pub fn find(&self, hash: u64, eq: impl FnMut(usize) -> bool) -> Option<usize> {
        if self.slots.is_empty() {
            return None;
        }
        match self.probe(hash, eq) {
            Probe::Found { seq, .. } => Some(seq),
            Probe::Vacant { .. } => None,
        }
    }
    /// First empty slot on the key's probe path. Only meaningful for keys known to be absent,
    /// i.e. right after a rebuild.
    pub fn find_empty(&self, hash: u64) -> usize {
        let mask = self.mask();
        let mut slot = hash as usize & mask;
        while self.slots[slot] != Slot::Empty {
            slot = (slot + 1) & mask;
        }
        slot
    }
    pub fn occupy(&mut self, slot: usize, seq: usize) {
        debug_assert_eq!(self.slots[slot], Slot::Empty);
        self.slots[slot] = Slot::Occupied(seq);
    }
    pub fn bury(&mut self, slot: usize) {
        debug_assert!(matches!(self.slots[slot], Slot::Occupied(_)));
        self.slots[slot] = Slot::Tombstone;
    }
    /// Rebuilds the table at `new_len` slots, re-placing every occupied marker under the new
    /// size. Tombstones are not carried over.
    pub fn grow(&mut self, new_len: usize, hasher: impl Fn(usize) -> u64) {
        let old = std::mem::replace(self, IndexTable::with_slots(new_len));
        for slot in old.slots.iter() {
            if let Slot::Occupied(seq) = *slot {
                let empty = self.find_empty(hasher(seq));
                self.occupy(empty, seq);
            }
        }
    }
    /// Slot and sequence number of the most recently inserted live entry.
    pub fn max_occupied(&self) -> Option<(usize, usize)> {
        let mut best = None;
        for (slot, marker) in self.slots.iter().enumerate() {
            if let Slot::Occupied(seq) = *marker {
                if best.map_or(true, |(_, max)| seq > max) {
                    best = Some((slot, seq));
                }
            }
        }
        best
    }
    /// Sequence numbers of all live entries, in slot order (not insertion order).
    pub fn occupied_seqs(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().filter_map(|slot| match *slot {
            Slot::Occupied(seq) => Some(seq),
            _ => None,
        })
    }
}
