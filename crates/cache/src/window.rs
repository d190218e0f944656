//! Fixed-capacity ring over an append-only message sequence.
//!
//! Appends are numbered from 1 by a monotonically increasing sequence
//! counter. Append `seq` lands in slot `(seq - 1) % capacity`, so a write
//! touches exactly one slot and the last `capacity` appends are always the
//! ones present.

/// Slot written by append number `seq` (1-based).
pub fn slot_for(seq: u64, capacity: usize) -> usize {
    debug_assert!(seq > 0 && capacity > 0);
    ((seq - 1) % capacity as u64) as usize
}

/// Slots holding live entries after `seq` appends, oldest first.
pub fn read_order(seq: u64, capacity: usize) -> impl Iterator<Item = usize> {
    let live = seq.min(capacity as u64);
    (seq - live + 1..=seq).map(move |s| slot_for(s, capacity))
}

/// In-process ring used by the memory backend.
#[derive(Clone, Debug)]
pub struct Ring<T> {
    seq: u64,
    slots: Vec<Option<T>>,
}

impl<T: Clone> Ring<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            seq: 0,
            slots: vec![None; capacity.max(1)],
        }
    }

    /// Build a ring holding the tail of `items` (oldest first).
    pub fn from_items(capacity: usize, items: &[T]) -> Self {
        let mut ring = Self::new(capacity);
        let skip = items.len().saturating_sub(ring.capacity());
        for item in &items[skip..] {
            ring.push(item.clone());
        }
        ring
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn push(&mut self, item: T) {
        self.seq += 1;
        let slot = slot_for(self.seq, self.capacity());
        self.slots[slot] = Some(item);
    }

    pub fn len(&self) -> usize {
        self.seq.min(self.capacity() as u64) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.seq == 0
    }

    /// Live entries, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        read_order(self.seq, self.capacity())
            .filter_map(|slot| self.slots[slot].clone())
            .collect()
    }
}
