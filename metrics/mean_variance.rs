//! https://en.wikipedia.org/wiki/Algorithms_for_calculating_variance#Parallel_algorithm

use super::StreamingMetric;
use num_traits::ToPrimitive;

/// A streaming computation of the mean and population variance of a sequence of `f32`s.
#[derive(Clone, Debug, Default)]
pub struct MeanVariance {
	n: u64,
	mean: f64,
	m2: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeanVarianceOutput {
	pub n: u64,
	pub mean: f32,
	pub variance: f32,
}

impl MeanVariance {
	pub fn new() -> Self {
		Self::default()
	}
}

impl StreamingMetric<'_> for MeanVariance {
	type Input = f32;
	type Output = Option<MeanVarianceOutput>;

	fn update(&mut self, value: f32) {
		let (mean, m2) = merge_mean_m2(self.n, self.mean, self.m2, 1, value.to_f64().unwrap(), 0.0);
		self.n += 1;
		self.mean = mean;
		self.m2 = m2;
	}

	fn merge(&mut self, other: Self) {
		if other.n == 0 {
			return;
		}
		if self.n == 0 {
			*self = other;
			return;
		}
		let (mean, m2) = merge_mean_m2(self.n, self.mean, self.m2, other.n, other.mean, other.m2);
		self.n += other.n;
		self.mean = mean;
		self.m2 = m2;
	}

	fn finalize(self) -> Option<MeanVarianceOutput> {
		if self.n == 0 {
			return None;
		}
		Some(MeanVarianceOutput {
			n: self.n,
			mean: self.mean.to_f32().unwrap(),
			variance: m2_to_variance(self.m2, self.n),
		})
	}
}

/// Combine two separate means and m2s into a single mean and m2.
pub fn merge_mean_m2(
	n_a: u64,
	mean_a: f64,
	m2_a: f64,
	n_b: u64,
	mean_b: f64,
	m2_b: f64,
) -> (f64, f64) {
	let n_a = n_a.to_f64().unwrap();
	let n_b = n_b.to_f64().unwrap();
	(
		(((n_a * mean_a) + (n_b * mean_b)) / (n_a + n_b)),
		m2_a + m2_b + (mean_b - mean_a) * (mean_b - mean_a) * (n_a * n_b / (n_a + n_b)),
	)
}

pub fn m2_to_variance(m2: f64, n: u64) -> f32 {
	(m2 / n.to_f64().unwrap()) as f32
}

#[test]
fn test_mean_variance() {
	let mut left = MeanVariance::new();
	for value in [2.0, 4.0, 4.0, 4.0].iter() {
		left.update(*value);
	}
	let mut right = MeanVariance::new();
	for value in [5.0, 5.0, 7.0, 9.0].iter() {
		right.update(*value);
	}
	left.merge(right);
	assert_eq!(
		left.finalize(),
		Some(MeanVarianceOutput {
			n: 8,
			mean: 5.0,
			variance: 4.0,
		})
	);
	assert_eq!(MeanVariance::new().finalize(), None);
}
