use super::{
	batch_size, column_means, early_stopping_fraction, early_stopping_monitor,
	normalize_importances, train_early_stopping_split, TrainOptions,
};
use automl_metrics::{MeanSquaredError, StreamingMetric};
use automl_util::progress_counter::ProgressCounter;
use itertools::izip;
use ndarray::prelude::*;

/// This struct describes a linear regressor model. You can train one by calling `Regressor::train`.
#[derive(Clone, Debug)]
pub struct Regressor {
	pub bias: f32,
	pub weights: Array1<f32>,
	/// These are the mean values of each feature in the training set.
	pub means: Vec<f32>,
	/// These are the early stopping loss values for each epoch.
	pub losses: Vec<f32>,
}

impl Regressor {
	/// Train a linear regressor. `progress_counter` is incremented once per epoch and set to its total when training finishes.
	pub fn train(
		features: ArrayView2<f32>,
		labels: ArrayView1<f32>,
		options: &TrainOptions,
		progress_counter: &ProgressCounter,
	) -> Self {
		let n_features = features.ncols();
		let (features_train, labels_train, features_early_stopping, labels_early_stopping) =
			train_early_stopping_split(features, labels, early_stopping_fraction(options));
		let mut model = Self {
			bias: 0.0,
			weights: Array1::<f32>::zeros(n_features),
			means: column_means(features_train),
			losses: vec![],
		};
		let mut early_stopping_monitor =
			early_stopping_monitor(options, features_early_stopping.nrows());
		for _ in 0..options.max_epochs {
			progress_counter.inc(1);
			for (features, labels) in izip!(
				features_train.axis_chunks_iter(Axis(0), batch_size(options)),
				labels_train.axis_chunks_iter(Axis(0), batch_size(options)),
			) {
				model.train_batch(features, labels, options);
			}
			if let Some(early_stopping_monitor) = early_stopping_monitor.as_mut() {
				let early_stopping_metric_value = model.compute_early_stopping_metric_value(
					features_early_stopping,
					labels_early_stopping,
				);
				model.losses.push(early_stopping_metric_value);
				if !early_stopping_metric_value.is_finite()
					|| early_stopping_monitor.update(early_stopping_metric_value)
				{
					break;
				}
			}
		}
		progress_counter.set(progress_counter.total());
		model
	}

	fn train_batch(
		&mut self,
		features: ArrayView2<f32>,
		labels: ArrayView1<f32>,
		options: &TrainOptions,
	) {
		let learning_rate = options.learning_rate;
		let predictions = features.dot(&self.weights) + self.bias;
		let py = (predictions - labels).insert_axis(Axis(1));
		let weight_gradients = (&features * &py).mean_axis(Axis(0)).unwrap();
		let bias_gradient: f32 = py.mean_axis(Axis(0)).unwrap()[0];
		for (weight, weight_gradient) in izip!(self.weights.iter_mut(), weight_gradients.iter()) {
			*weight += -learning_rate * (weight_gradient + options.l2_regularization * *weight);
		}
		self.bias += -learning_rate * bias_gradient;
	}

	fn compute_early_stopping_metric_value(
		&self,
		features: ArrayView2<f32>,
		labels: ArrayView1<f32>,
	) -> f32 {
		let mut predictions = Array1::<f32>::zeros(features.nrows());
		self.predict(features, predictions.view_mut());
		let mut metric = MeanSquaredError::default();
		for (prediction, label) in predictions.iter().zip(labels.iter()) {
			metric.update((*prediction, *label));
		}
		metric.finalize().unwrap_or(std::f32::NAN)
	}

	/// Write predictions into `predictions` for the input `features`.
	pub fn predict(&self, features: ArrayView2<f32>, mut predictions: ArrayViewMut1<f32>) {
		predictions.fill(self.bias);
		ndarray::linalg::general_mat_vec_mul(1.0, &features, &self.weights, 1.0, &mut predictions);
	}

	/// The absolute weight of each feature, normalized to sum to one.
	pub fn feature_importances(&self) -> Vec<f32> {
		normalize_importances(self.weights.iter().map(|weight| weight.abs()).collect())
	}
}

#[test]
fn test_regressor() {
	let features = Array2::from_shape_fn((100, 2), |(i, j)| {
		if j == 0 {
			(i as f32 - 50.0) / 50.0
		} else {
			0.0
		}
	});
	let labels = features.column(0).mapv(|x| 2.0 * x + 1.0);
	let options = TrainOptions {
		early_stopping_options: None,
		..Default::default()
	};
	let progress_counter = ProgressCounter::new(options.max_epochs as u64);
	let model = Regressor::train(features.view(), labels.view(), &options, &progress_counter);
	assert!((model.weights[0] - 2.0).abs() < 0.05);
	assert!((model.bias - 1.0).abs() < 0.05);
	assert_eq!(progress_counter.fraction(), 1.0);
	let importances = model.feature_importances();
	assert!(importances[0] > 0.99);
	let mut predictions = Array1::zeros(100);
	model.predict(features.view(), predictions.view_mut());
	assert!((predictions[75] - labels[75]).abs() < 0.1);
}
