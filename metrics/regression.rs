use super::{mean_variance::MeanVariance, StreamingMetric};
use num_traits::ToPrimitive;

/// `RegressionMetrics` computes the common regression metrics: mse, rmse, mae and r2.
#[derive(Default)]
pub struct RegressionMetrics {
	labels: MeanVariance,
	absolute_error: f64,
	squared_error: f64,
}

pub struct RegressionMetricsInput<'a> {
	pub predictions: &'a [f32],
	pub labels: &'a [f32],
}

#[derive(Debug)]
pub struct RegressionMetricsOutput {
	pub mse: f32,
	pub rmse: f32,
	pub mae: f32,
	/// r2 is undefined (NaN) when the labels have zero variance.
	pub r2: f32,
	pub baseline_mse: f32,
	pub baseline_rmse: f32,
}

impl RegressionMetrics {
	pub fn new() -> Self {
		Self::default()
	}
}

impl<'a> StreamingMetric<'a> for RegressionMetrics {
	type Input = RegressionMetricsInput<'a>;
	type Output = RegressionMetricsOutput;

	fn update(&mut self, input: RegressionMetricsInput) {
		for (prediction, label) in input.predictions.iter().zip(input.labels.iter()) {
			self.labels.update(*label);
			let error = (prediction - label).to_f64().unwrap();
			self.absolute_error += error.abs();
			self.squared_error += error * error;
		}
	}

	fn merge(&mut self, other: Self) {
		self.labels.merge(other.labels);
		self.absolute_error += other.absolute_error;
		self.squared_error += other.squared_error;
	}

	fn finalize(self) -> Self::Output {
		let (n, variance) = match self.labels.finalize() {
			Some(output) => (
				output.n.to_f64().unwrap(),
				output.variance.to_f64().unwrap(),
			),
			None => (0.0, f64::NAN),
		};
		let mae = self.absolute_error / n;
		let mse = self.squared_error / n;
		let rmse = mse.sqrt();
		let r2 = 1.0 - self.squared_error / (variance * n);
		let baseline_mse = variance;
		let baseline_rmse = baseline_mse.sqrt();
		RegressionMetricsOutput {
			mse: mse as f32,
			rmse: rmse as f32,
			mae: mae as f32,
			r2: r2 as f32,
			baseline_mse: baseline_mse as f32,
			baseline_rmse: baseline_rmse as f32,
		}
	}
}

#[test]
fn test_regression() {
	let mut metrics = RegressionMetrics::new();
	metrics.update(RegressionMetricsInput {
		predictions: &[2.5, 0.0, 2.0, 8.0],
		labels: &[3.0, -0.5, 2.0, 7.0],
	});
	let metrics = metrics.finalize();
	insta::assert_debug_snapshot!(metrics, @r###"
 RegressionMetricsOutput {
     mse: 0.375,
     rmse: 0.61237246,
     mae: 0.5,
     r2: 0.94860816,
     baseline_mse: 7.296875,
     baseline_rmse: 2.701273,
 }
 "###);
}
