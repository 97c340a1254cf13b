use ndarray::prelude::*;
use num_traits::ToPrimitive;

/// This function splits the `features` and `labels` arrays into training and early stopping arrays, where the size of the early stopping array will be `features.nrows() * early_stopping_fraction`.
pub fn train_early_stopping_split<'features, 'labels, Label>(
	features: ArrayView2<'features, f32>,
	labels: ArrayView1<'labels, Label>,
	early_stopping_fraction: f32,
) -> (
	ArrayView2<'features, f32>,
	ArrayView1<'labels, Label>,
	ArrayView2<'features, f32>,
	ArrayView1<'labels, Label>,
) {
	let split_index = ((1.0 - early_stopping_fraction) * features.nrows().to_f32().unwrap())
		.to_usize()
		.unwrap()
		.min(features.nrows());
	let (features_train, features_early_stopping) = features.split_at(Axis(0), split_index);
	let (labels_train, labels_early_stopping) = labels.split_at(Axis(0), split_index);
	(
		features_train,
		labels_train,
		features_early_stopping,
		labels_early_stopping,
	)
}

/**
The `EarlyStoppingMonitor` keeps track of the values of an early stopping metric for each epoch, and if enough epochs have passed without a significant improvement in the metric, the `update()` function will return `true` to indicate that training should be stopped.
*/
pub struct EarlyStoppingMonitor {
	threshold: f32,
	epochs: usize,
	n_epochs_without_observed_improvement: usize,
	previous_epoch_metric_value: Option<f32>,
}

impl EarlyStoppingMonitor {
	pub fn new(threshold: f32, epochs: usize) -> Self {
		EarlyStoppingMonitor {
			threshold,
			epochs,
			previous_epoch_metric_value: None,
			n_epochs_without_observed_improvement: 0,
		}
	}

	/// This function updates the `EarlyStoppingMonitor` with the next epoch's early stopping metric. This function returns true if training should stop.
	pub fn update(&mut self, early_stopping_metric_value: f32) -> bool {
		let result = if let Some(previous_stopping_metric) = self.previous_epoch_metric_value {
			if early_stopping_metric_value > previous_stopping_metric
				|| f32::abs(early_stopping_metric_value - previous_stopping_metric) < self.threshold
			{
				self.n_epochs_without_observed_improvement += 1;
				self.n_epochs_without_observed_improvement >= self.epochs
			} else {
				self.n_epochs_without_observed_improvement = 0;
				false
			}
		} else {
			false
		};
		self.previous_epoch_metric_value = Some(early_stopping_metric_value);
		result
	}
}

#[test]
fn test_early_stopping_monitor() {
	let mut monitor = EarlyStoppingMonitor::new(1e-3, 2);
	assert!(!monitor.update(1.0));
	assert!(!monitor.update(0.5));
	assert!(!monitor.update(0.4999));
	assert!(!monitor.update(0.3));
	assert!(!monitor.update(0.31));
	assert!(monitor.update(0.3099));
}

#[test]
fn test_train_early_stopping_split() {
	let features = Array2::<f32>::zeros((10, 2));
	let labels = Array1::<usize>::zeros(10);
	let (features_train, labels_train, features_early_stopping, labels_early_stopping) =
		train_early_stopping_split(features.view(), labels.view(), 0.2);
	assert_eq!(features_train.nrows(), 8);
	assert_eq!(labels_train.len(), 8);
	assert_eq!(features_early_stopping.nrows(), 2);
	assert_eq!(labels_early_stopping.len(), 2);
}
