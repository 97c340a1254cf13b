use super::{
	batch_size, column_means, early_stopping_fraction, early_stopping_monitor,
	normalize_importances, to_f32, train_early_stopping_split, TrainOptions,
};
use automl_metrics::{CrossEntropy, CrossEntropyInput, StreamingMetric};
use automl_util::progress_counter::ProgressCounter;
use itertools::izip;
use ndarray::prelude::*;
use ndarray::Zip;

/// This struct describes a multiclass linear classifier model. You can train one by calling `MulticlassClassifier::train`.
#[derive(Clone, Debug)]
pub struct MulticlassClassifier {
	/// (n_classes)
	pub biases: Array1<f32>,
	/// (n_features, n_classes)
	pub weights: Array2<f32>,
	/// These are the mean values of each feature in the training set.
	pub means: Vec<f32>,
	/// These are the early stopping loss values for each epoch.
	pub losses: Vec<f32>,
}

impl MulticlassClassifier {
	/// Train a multiclass classifier. `labels` are 0-indexed and less than `n_classes`.
	pub fn train(
		features: ArrayView2<f32>,
		labels: ArrayView1<usize>,
		n_classes: usize,
		options: &TrainOptions,
		progress_counter: &ProgressCounter,
	) -> Self {
		let n_features = features.ncols();
		let (features_train, labels_train, features_early_stopping, labels_early_stopping) =
			train_early_stopping_split(features, labels, early_stopping_fraction(options));
		let mut model = Self {
			biases: Array1::<f32>::zeros(n_classes),
			weights: Array2::<f32>::zeros((n_features, n_classes)),
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
		labels: ArrayView1<usize>,
		options: &TrainOptions,
	) {
		let learning_rate = options.learning_rate;
		let l2_regularization = options.l2_regularization;
		let n_classes = self.weights.ncols();
		let mut logits = features.dot(&self.weights) + &self.biases;
		softmax(logits.view_mut());
		let mut predictions = logits;
		Zip::indexed(predictions.view_mut())
			.and_broadcast(labels.insert_axis(Axis(1)))
			.apply(|(_, class_index), prediction, label| {
				*prediction -= if class_index == *label { 1.0 } else { 0.0 }
			});
		let py = predictions;
		for class_index in 0..n_classes {
			let weight_gradients = (&features * &py.column(class_index).insert_axis(Axis(1)))
				.mean_axis(Axis(0))
				.unwrap();
			Zip::from(self.weights.column_mut(class_index))
				.and(weight_gradients.view())
				.apply(|weight, weight_gradient| {
					*weight += -learning_rate * (weight_gradient + l2_regularization * *weight)
				});
			let bias_gradient = py.column(class_index).mean().unwrap();
			self.biases[class_index] += -learning_rate * bias_gradient;
		}
	}

	fn compute_early_stopping_metric_value(
		&self,
		features: ArrayView2<f32>,
		labels: ArrayView1<usize>,
	) -> f32 {
		let mut probabilities = Array2::<f32>::zeros((features.nrows(), self.biases.len()));
		self.predict(features, probabilities.view_mut());
		let mut metric = CrossEntropy::default();
		for (probabilities, label) in probabilities.axis_iter(Axis(0)).zip(labels.iter()) {
			metric.update(CrossEntropyInput {
				probabilities,
				label: *label,
			});
		}
		metric.finalize().unwrap_or(std::f32::NAN)
	}

	/// Write class probabilities into `probabilities`, which has shape (n_examples, n_classes), for the input `features`.
	pub fn predict(&self, features: ArrayView2<f32>, mut probabilities: ArrayViewMut2<f32>) {
		for mut row in probabilities.genrows_mut() {
			row.assign(&self.biases.view());
		}
		ndarray::linalg::general_mat_mul(1.0, &features, &self.weights, 1.0, &mut probabilities);
		softmax(probabilities);
	}

	/// The absolute weight of each feature summed over classes, normalized to sum to one.
	pub fn feature_importances(&self) -> Vec<f32> {
		normalize_importances(
			self.weights
				.genrows()
				.into_iter()
				.map(|row| row.iter().map(|weight| weight.abs()).sum::<f32>() / to_f32(row.len()))
				.collect(),
		)
	}
}

fn softmax(mut logits: ArrayViewMut2<f32>) {
	for mut logits in logits.genrows_mut() {
		let max = logits.iter().fold(std::f32::MIN, |a, &b| a.max(b));
		logits -= max;
		logits.mapv_inplace(|l| l.exp());
		let sum = logits.iter().fold(0.0, |a, b| a + b);
		logits /= sum;
	}
}

#[test]
fn test_multiclass_classifier() {
	// Each class is indicated by its own feature. The last feature is always zero.
	let n = 90;
	let features = Array2::from_shape_fn((n, 4), |(i, j)| if i % 3 == j { 1.0 } else { 0.0 });
	let labels = Array1::from_shape_fn(n, |i| i % 3);
	let options = TrainOptions::default();
	let progress_counter = ProgressCounter::new(options.max_epochs as u64);
	let model = MulticlassClassifier::train(
		features.view(),
		labels.view(),
		3,
		&options,
		&progress_counter,
	);
	assert_eq!(progress_counter.fraction(), 1.0);
	let mut probabilities = Array2::zeros((n, 3));
	model.predict(features.view(), probabilities.view_mut());
	for (probabilities, label) in probabilities.axis_iter(Axis(0)).zip(labels.iter()) {
		let prediction = probabilities
			.iter()
			.enumerate()
			.max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
			.unwrap()
			.0;
		assert_eq!(prediction, *label);
		assert!((probabilities.sum() - 1.0).abs() < 1e-4);
	}
	let importances = model.feature_importances();
	assert_eq!(importances[3], 0.0);
	assert!((importances.iter().sum::<f32>() - 1.0).abs() < 1e-4);
}
