use num_traits::ToPrimitive;
use std::sync::{
	atomic::{AtomicU64, Ordering},
	Arc,
};

/// A `ProgressCounter` is shared between the thread doing some work and any threads that want to observe how far along it is. Clones share the same underlying counter.
#[derive(Clone, Debug)]
pub struct ProgressCounter {
	current: Arc<AtomicU64>,
	total: u64,
}

impl ProgressCounter {
	pub fn new(total: u64) -> Self {
		Self {
			current: Arc::new(AtomicU64::new(0)),
			total,
		}
	}

	pub fn total(&self) -> u64 {
		self.total
	}

	pub fn get(&self) -> u64 {
		self.current.load(Ordering::Relaxed)
	}

	pub fn set(&self, value: u64) {
		self.current.store(value, Ordering::Relaxed);
	}

	pub fn inc(&self, amount: u64) {
		self.current.fetch_add(amount, Ordering::Relaxed);
	}

	/// The fraction of the work completed, clamped to [0, 1]. A counter with a total of zero is considered complete.
	pub fn fraction(&self) -> f32 {
		if self.total == 0 {
			return 1.0;
		}
		let fraction = self.get().to_f64().unwrap() / self.total.to_f64().unwrap();
		fraction.min(1.0).to_f32().unwrap()
	}
}

#[test]
fn test_fraction() {
	let counter = ProgressCounter::new(4);
	assert_eq!(counter.fraction(), 0.0);
	let clone = counter.clone();
	clone.inc(1);
	assert_eq!(counter.fraction(), 0.25);
	counter.set(10);
	assert_eq!(clone.fraction(), 1.0);
	assert_eq!(ProgressCounter::new(0).fraction(), 1.0);
}
