use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

/// Shared map of live handles keyed by source name.
///
/// Readers take the read lock for lookups; connecting a source takes the write lock only to
/// publish the finished handle.
pub struct ClientStorage<T> {
	pub clients: Arc<RwLock<HashMap<String, Arc<T>>>>,
}

impl<T> Default for ClientStorage<T> {
	fn default() -> Self {
		Self {
			clients: Arc::new(RwLock::new(HashMap::new())),
		}
	}
}

impl<T> Clone for ClientStorage<T> {
	fn clone(&self) -> Self {
		Self {
			clients: self.clients.clone(),
		}
	}
}

impl<T> ClientStorage<T> {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn get(&self, name: &str) -> Option<Arc<T>> {
		self.clients.read().await.get(name).cloned()
	}

	/// Publishes a handle; an existing entry for the same name wins.
	pub async fn insert(&self, name: &str, client: T) -> Arc<T> {
		let mut clients = self.clients.write().await;
		clients
			.entry(name.to_string())
			.or_insert_with(|| Arc::new(client))
			.clone()
	}

	pub async fn remove(&self, name: &str) -> Option<Arc<T>> {
		self.clients.write().await.remove(name)
	}

	pub async fn len(&self) -> usize {
		self.clients.read().await.len()
	}
}
