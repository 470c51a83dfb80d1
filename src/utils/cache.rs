//! Bounded caches shared by the metadata layer.
//!
//! [`BoundedCache`] is a least-recently-used map with a hard size cap. A `get` counts as an
//! access and refreshes the entry's recency, so the entry evicted on overflow is always the one
//! that has gone longest without being read or written.
//!
//! [`RefreshLocks`] hands out one async mutex per key so that a forced refresh of a cache entry
//! runs at most once at a time; concurrent callers queue behind it.

use std::{
	collections::{BTreeMap, HashMap},
	hash::Hash,
	sync::Arc,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Least-recently-used map with a fixed maximum number of entries.
#[derive(Debug, Clone)]
pub struct BoundedCache<K, V> {
	capacity: usize,
	entries: HashMap<K, (V, u64)>,
	recency: BTreeMap<u64, K>,
	tick: u64,
}

impl<K, V> BoundedCache<K, V>
where
	K: Eq + Hash + Clone,
	V: Clone,
{
	/// Creates an empty cache. A capacity of zero is treated as one.
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity: capacity.max(1),
			entries: HashMap::new(),
			recency: BTreeMap::new(),
			tick: 0,
		}
	}

	/// Returns a copy of the value and marks the key as most recently used.
	pub fn get(&mut self, key: &K) -> Option<V> {
		let stamp = self.next_tick();
		let (value, previous) = {
			let entry = self.entries.get_mut(key)?;
			let previous = entry.1;
			entry.1 = stamp;
			(entry.0.clone(), previous)
		};
		self.recency.remove(&previous);
		self.recency.insert(stamp, key.clone());
		Some(value)
	}

	/// Returns the value without touching recency.
	pub fn peek(&self, key: &K) -> Option<&V> {
		self.entries.get(key).map(|(value, _)| value)
	}

	/// Inserts or replaces a value, returning the evicted entry if the cap was exceeded.
	pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
		let stamp = self.next_tick();
		if let Some((_, previous)) = self.entries.insert(key.clone(), (value, stamp)) {
			self.recency.remove(&previous);
		}
		self.recency.insert(stamp, key);

		if self.entries.len() <= self.capacity {
			return None;
		}
		let (_, oldest) = self.recency.pop_first()?;
		self.entries
			.remove(&oldest)
			.map(|(evicted, _)| (oldest, evicted))
	}

	pub fn remove(&mut self, key: &K) -> Option<V> {
		let (value, stamp) = self.entries.remove(key)?;
		self.recency.remove(&stamp);
		Some(value)
	}

	pub fn contains_key(&self, key: &K) -> bool {
		self.entries.contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Keys ordered from least to most recently used.
	pub fn keys_by_recency(&self) -> Vec<K> {
		self.recency.values().cloned().collect()
	}

	fn next_tick(&mut self) -> u64 {
		self.tick += 1;
		self.tick
	}
}

/// Per-key async locks guarding cache refreshes.
pub struct RefreshLocks<K> {
	locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for RefreshLocks<K> {
	fn default() -> Self {
		Self {
			locks: Mutex::new(HashMap::new()),
		}
	}
}

impl<K> RefreshLocks<K>
where
	K: Eq + Hash + Clone,
{
	pub fn new() -> Self {
		Self::default()
	}

	/// Waits until no other refresh for `key` is running and returns the guard.
	pub async fn acquire(&self, key: &K) -> OwnedMutexGuard<()> {
		let lock = {
			let mut locks = self.locks.lock().await;
			// Drop locks nobody is holding or waiting on.
			locks.retain(|_, lock| Arc::strong_count(lock) > 1);
			locks
				.entry(key.clone())
				.or_insert_with(|| Arc::new(Mutex::new(())))
				.clone()
		};
		lock.lock_owned().await
	}
}
