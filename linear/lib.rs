/*!
This crate is an implementation of linear machine learning models for regression and classification. There are two model types, [`Regressor`](struct.Regressor.html) and [`MulticlassClassifier`](struct.MulticlassClassifier.html). `MulticlassClassifier` trains `n_classes` linear models whose outputs are combined with the `softmax` function, so it also handles binary classification.

Both models are trained with mini-batch gradient descent. The change in loss on a held out early stopping split is monitored after each epoch, and training terminates when the loss has stabilized.
*/

#![allow(clippy::tabs_in_doc_comments)]

use ndarray::prelude::*;
use num_traits::ToPrimitive;

mod early_stopping;
mod multiclass_classifier;
mod regressor;

pub use self::multiclass_classifier::MulticlassClassifier;
pub use self::regressor::Regressor;

use self::early_stopping::{train_early_stopping_split, EarlyStoppingMonitor};

/// These are the options passed to `Regressor::train` and `MulticlassClassifier::train`.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainOptions {
	/// Specify options for early stopping. If the value is `Some`, early stopping will be enabled. If it is `None`, early stopping will be disabled.
	pub early_stopping_options: Option<EarlyStoppingOptions>,
	/// This is the L2 regularization value to use when updating the model parameters.
	pub l2_regularization: f32,
	/// This is the learning rate to use when updating the model parameters.
	pub learning_rate: f32,
	/// This is the maximum number of epochs to train.
	pub max_epochs: usize,
	/// This is the number of examples to use for each batch of training.
	pub n_examples_per_batch: usize,
}

impl Default for TrainOptions {
	fn default() -> Self {
		Self {
			l2_regularization: 0.0,
			learning_rate: 0.1,
			max_epochs: 100,
			n_examples_per_batch: 32,
			early_stopping_options: Some(EarlyStoppingOptions::default()),
		}
	}
}

/// The parameters in this struct control how to determine whether training should stop early after each epoch.
#[derive(Clone, Debug, PartialEq)]
pub struct EarlyStoppingOptions {
	/// This is the fraction of the dataset that is set aside to compute the early stopping metric.
	pub early_stopping_fraction: f32,
	/// If this many epochs pass by without a significant improvement in the early stopping metric over the previous epoch, training will be stopped early.
	pub n_epochs_without_improvement_to_stop: usize,
	/// This is the minimum decrease in the early stopping metric for an epoch to be considered a significant improvement over the previous epoch.
	pub min_decrease_in_loss_for_significant_change: f32,
}

impl Default for EarlyStoppingOptions {
	fn default() -> Self {
		Self {
			early_stopping_fraction: 0.1,
			n_epochs_without_improvement_to_stop: 3,
			min_decrease_in_loss_for_significant_change: 1e-3,
		}
	}
}

/// Compute the mean of each column of `features`. An empty matrix has means of zero.
fn column_means(features: ArrayView2<f32>) -> Vec<f32> {
	features
		.axis_iter(Axis(1))
		.map(|column| column.mean().unwrap_or(0.0))
		.collect()
}

/// Normalize absolute parameter magnitudes so they sum to one. If every magnitude is zero, every importance is zero.
fn normalize_importances(magnitudes: Vec<f32>) -> Vec<f32> {
	let total = magnitudes.iter().sum::<f32>();
	if total > 0.0 {
		magnitudes
			.into_iter()
			.map(|magnitude| magnitude / total)
			.collect()
	} else {
		magnitudes.into_iter().map(|_| 0.0).collect()
	}
}

/// Create the early stopping monitor for `options`, or `None` if early stopping is disabled or there are no examples to evaluate it on.
fn early_stopping_monitor(
	options: &TrainOptions,
	n_early_stopping_examples: usize,
) -> Option<EarlyStoppingMonitor> {
	let early_stopping_options = options.early_stopping_options.as_ref()?;
	if n_early_stopping_examples == 0 {
		return None;
	}
	Some(EarlyStoppingMonitor::new(
		early_stopping_options.min_decrease_in_loss_for_significant_change,
		early_stopping_options.n_epochs_without_improvement_to_stop,
	))
}

fn early_stopping_fraction(options: &TrainOptions) -> f32 {
	options
		.early_stopping_options
		.as_ref()
		.map(|options| options.early_stopping_fraction)
		.unwrap_or(0.0)
}

fn batch_size(options: &TrainOptions) -> usize {
	options.n_examples_per_batch.max(1)
}

fn to_f32(value: usize) -> f32 {
	value.to_f32().unwrap()
}
