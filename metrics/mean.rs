use super::StreamingMetric;
use num_traits::ToPrimitive;

/// The arithmetic mean of a stream of `f32`s, accumulated in `f64`.
#[derive(Clone, Debug, Default)]
pub struct Mean {
	n: u64,
	sum: f64,
}

impl Mean {
	pub fn new() -> Self {
		Self::default()
	}
}

impl StreamingMetric<'_> for Mean {
	type Input = f32;
	type Output = Option<f32>;

	fn update(&mut self, value: f32) {
		self.n += 1;
		self.sum += value.to_f64().unwrap();
	}

	fn merge(&mut self, other: Self) {
		self.n += other.n;
		self.sum += other.sum;
	}

	fn finalize(self) -> Option<f32> {
		if self.n == 0 {
			None
		} else {
			(self.sum / self.n.to_f64().unwrap()).to_f32()
		}
	}
}

#[test]
fn test_mean() {
	let mut left = Mean::new();
	left.update(1.0);
	left.update(2.0);
	let mut right = Mean::new();
	right.update(6.0);
	left.merge(right);
	assert_eq!(left.finalize(), Some(3.0));
	assert_eq!(Mean::new().finalize(), None);
}
