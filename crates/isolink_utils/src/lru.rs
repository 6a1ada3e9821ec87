use std::hash::Hash;

use crate::indexmap::FxIndexMap;

/// Least-recently-used cache with a weight budget instead of an entry count.
/// Weigh every entry as `1` to get a plain entry-bounded LRU.
pub struct WeightedLru<K, V> {
  entries: FxIndexMap<K, V>,
  weigher: fn(&V) -> usize,
  capacity: usize,
  total_weight: usize,
}

impl<K: Hash + Eq, V> WeightedLru<K, V> {
  pub fn new(capacity: usize, weigher: fn(&V) -> usize) -> Self {
    Self { entries: FxIndexMap::default(), weigher, capacity, total_weight: 0 }
  }

  pub fn get(&mut self, key: &K) -> Option<&V> {
    let index = self.entries.get_index_of(key)?;
    let last = self.entries.len() - 1;
    if index != last {
      self.entries.move_index(index, last);
    }
    self.entries.get(key)
  }

  /// Inserts at most-recent position. An entry heavier than the whole budget
  /// is not stored at all.
  pub fn insert(&mut self, key: K, value: V) {
    let weight = (self.weigher)(&value);
    if weight > self.capacity {
      return;
    }
    if let Some(old) = self.entries.shift_remove(&key) {
      self.total_weight -= (self.weigher)(&old);
    }
    self.entries.insert(key, value);
    self.total_weight += weight;
    while self.total_weight > self.capacity {
      let Some((_, evicted)) = self.entries.shift_remove_index(0) else {
        break;
      };
      self.total_weight -= (self.weigher)(&evicted);
    }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn total_weight(&self) -> usize {
    self.total_weight
  }
}
