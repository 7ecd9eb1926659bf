//! Per-key FIFO serialization of mutating work.

use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
};

type Lane = Arc<tokio::sync::Mutex<()>>;

/// Runs tasks for the same key one at a time in submission order.
///
/// Tasks for different keys run concurrently. A task that fails or panics releases its key,
/// so later tasks still run.
#[derive(Debug, Default)]
pub struct WriteSerializer {
	lanes: Mutex<HashMap<String, Lane>>,
}
impl WriteSerializer {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn run<F, T>(&self, key: &str, task: F) -> T
	where
		F: Future<Output = T>,
	{
		let lane = self.lane(key);
		let out = {
			let _turn = lane.lock().await;

			task.await
		};

		self.release(key, lane);

		out
	}

	/// Forgets the queue state for `key`. Tasks already waiting keep their place.
	pub fn evict(&self, key: &str) {
		self.lock().remove(key);
	}

	/// Number of keys with queue state.
	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	fn lane(&self, key: &str) -> Lane {
		self.lock().entry(key.to_string()).or_default().clone()
	}

	fn release(&self, key: &str, lane: Lane) {
		let mut lanes = self.lock();

		// One reference in the map plus ours means nobody else is queued.
		if Arc::strong_count(&lane) == 2
			&& lanes.get(key).is_some_and(|current| Arc::ptr_eq(current, &lane))
		{
			lanes.remove(key);
		}
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Lane>> {
		self.lanes.lock().unwrap_or_else(|err| err.into_inner())
	}
}
