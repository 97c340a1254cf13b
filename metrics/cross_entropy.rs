use super::{mean::Mean, StreamingMetric};
use ndarray::prelude::*;
use num_traits::clamp;

/// CrossEntropy is the loss function used in multiclass classification. [Learn more](https://en.wikipedia.org/wiki/Cross_entropy#Cross-entropy_loss_function_and_logistic_regression).
#[derive(Default)]
pub struct CrossEntropy(Mean);

/// The input to [CrossEntropy](struct.CrossEntropy.html).
pub struct CrossEntropyInput<'a> {
	/// (n_classes)
	pub probabilities: ArrayView1<'a, f32>,
	/// 0-indexed
	pub label: usize,
}

impl<'a> StreamingMetric<'a> for CrossEntropy {
	type Input = CrossEntropyInput<'a>;
	type Output = Option<f32>;

	fn update(&mut self, value: CrossEntropyInput) {
		// The log is undefined at 0, so the probability is clamped away from it.
		let probability = clamp(
			value.probabilities[value.label],
			std::f32::EPSILON,
			1.0 - std::f32::EPSILON,
		);
		self.0.update(-probability.ln())
	}

	fn merge(&mut self, other: Self) {
		self.0.merge(other.0)
	}

	fn finalize(self) -> Self::Output {
		self.0.finalize()
	}
}

#[test]
fn test_cross_entropy() {
	let mut metric = CrossEntropy::default();
	let probabilities = arr1(&[0.5f32, 0.25, 0.25]);
	metric.update(CrossEntropyInput {
		probabilities: probabilities.view(),
		label: 0,
	});
	let value = metric.finalize().unwrap();
	assert!((value - 2.0f32.ln()).abs() < 1e-6);
}
