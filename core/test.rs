/*!
This module computes the metrics of a trained model on the test split of its prepared data.
*/

use crate::{
	error::TrainingError,
	model::{ClassificationMetrics, Metrics, RegressionMetrics},
	prepare::{Labels, PreparedData},
	trainer::Predictions,
};
use automl_metrics::{self as metrics, StreamingMetric};
use ndarray::prelude::*;
use num_traits::ToPrimitive;

/// Compute metrics for `predictions` made on `data.test.features`. Predictions of the wrong kind or length for the test labels are invalid data.
pub fn evaluate(predictions: &Predictions, data: &PreparedData) -> Result<Metrics, TrainingError> {
	let n_predictions = match predictions {
		Predictions::Classification(probabilities) => probabilities.nrows(),
		Predictions::Regression(predictions) => predictions.len(),
	};
	if n_predictions != data.test.labels.len() {
		return Err(TrainingError::invalid_data(
			None,
			format!(
				"the model made {} predictions for {} test examples",
				n_predictions,
				data.test.labels.len()
			),
		));
	}
	match (predictions, &data.test.labels) {
		(Predictions::Classification(probabilities), Labels::Classification(labels)) => {
			if probabilities.ncols() != data.n_classes() {
				return Err(TrainingError::invalid_data(
					None,
					format!(
						"the model predicted {} classes but there are {}",
						probabilities.ncols(),
						data.n_classes()
					),
				));
			}
			Ok(Metrics::Classification(test_classifier(
				probabilities.view(),
				labels.view(),
				data.n_classes(),
			)))
		}
		(Predictions::Regression(predictions), Labels::Regression(labels)) => Ok(
			Metrics::Regression(test_regressor(predictions.view(), labels.view())),
		),
		(Predictions::Classification(_), Labels::Regression(_)) => Err(
			TrainingError::invalid_data(None, "the model made class predictions for a regression task"),
		),
		(Predictions::Regression(_), Labels::Classification(_)) => Err(
			TrainingError::invalid_data(
				None,
				"the model made numeric predictions for a classification task",
			),
		),
	}
}

fn test_classifier(
	probabilities: ArrayView2<f32>,
	labels: ArrayView1<usize>,
	n_classes: usize,
) -> ClassificationMetrics {
	let predictions = argmax_rows(probabilities);
	let labels = labels.to_vec();
	let mut classification_metrics = metrics::ClassificationMetrics::new(n_classes);
	classification_metrics.update(metrics::ClassificationMetricsInput {
		predictions: &predictions,
		labels: &labels,
	});
	let output = classification_metrics.finalize();
	ClassificationMetrics {
		accuracy: output.accuracy,
		precision: output.precision_weighted,
		recall: output.recall_weighted,
		f1_score: output.f1_score_weighted,
		auc_roc: auc_roc(probabilities, &labels, n_classes),
	}
}

fn test_regressor(predictions: ArrayView1<f32>, labels: ArrayView1<f32>) -> RegressionMetrics {
	let predictions = predictions.to_vec();
	let labels = labels.to_vec();
	let mut regression_metrics = metrics::RegressionMetrics::new();
	regression_metrics.update(metrics::RegressionMetricsInput {
		predictions: &predictions,
		labels: &labels,
	});
	let output = regression_metrics.finalize();
	RegressionMetrics {
		rmse: output.rmse,
		mae: output.mae,
		r2_score: output.r2,
		mse: output.mse,
	}
}

/// The index of the most probable class for each row. Ties go to the first class.
pub fn argmax_rows(probabilities: ArrayView2<f32>) -> Vec<usize> {
	probabilities
		.axis_iter(Axis(0))
		.map(|row| {
			row.iter()
				.enumerate()
				.fold((0, f32::NEG_INFINITY), |(best_index, best), (index, value)| {
					if *value > best {
						(index, *value)
					} else {
						(best_index, best)
					}
				})
				.0
		})
		.collect()
}

/// The probabilities of `class_index` and whether each example belongs to it.
pub fn one_vs_rest(
	probabilities: ArrayView2<f32>,
	labels: &[usize],
	class_index: usize,
) -> (Vec<f32>, Vec<bool>) {
	let class_probabilities = probabilities.column(class_index).to_vec();
	let class_labels = labels.iter().map(|label| *label == class_index).collect();
	(class_probabilities, class_labels)
}

/// The area under the roc curve. Binary tasks use the second class as the positive class. Tasks with more classes average the one vs rest area of every class.
pub fn auc_roc(probabilities: ArrayView2<f32>, labels: &[usize], n_classes: usize) -> f32 {
	match n_classes {
		0 | 1 => 0.0,
		2 => {
			let (probabilities, labels) = one_vs_rest(probabilities, labels, 1);
			metrics::auc_roc(&probabilities, &labels)
		}
		_ => {
			let total: f32 = (0..n_classes)
				.map(|class_index| {
					let (probabilities, labels) = one_vs_rest(probabilities, labels, class_index);
					metrics::auc_roc(&probabilities, &labels)
				})
				.sum();
			total / n_classes.to_f32().unwrap()
		}
	}
}

#[test]
fn test_argmax_rows() {
	let probabilities = arr2(&[[0.1, 0.7, 0.2], [0.5, 0.5, 0.0], [0.0, 0.1, 0.9]]);
	assert_eq!(argmax_rows(probabilities.view()), vec![1, 0, 2]);
}

#[test]
fn test_auc_roc() {
	let probabilities = arr2(&[[0.9, 0.1], [0.8, 0.2], [0.3, 0.7], [0.1, 0.9]]);
	let labels = [0, 0, 1, 1];
	assert_eq!(auc_roc(probabilities.view(), &labels, 2), 1.0);
	let probabilities = arr2(&[
		[0.8, 0.1, 0.1],
		[0.1, 0.8, 0.1],
		[0.1, 0.1, 0.8],
		[0.6, 0.2, 0.2],
	]);
	let labels = [0, 1, 2, 0];
	assert_eq!(auc_roc(probabilities.view(), &labels, 3), 1.0);
}

#[test]
fn test_evaluate() {
	use crate::task::TaskType;
	let data = crate::trainer::test_data(TaskType::Regression);
	let labels = match &data.test.labels {
		Labels::Regression(labels) => labels.clone(),
		_ => unreachable!(),
	};
	let metrics = evaluate(&Predictions::Regression(labels.clone()), &data).unwrap();
	assert_eq!(
		metrics,
		Metrics::Regression(RegressionMetrics {
			rmse: 0.0,
			mae: 0.0,
			r2_score: 1.0,
			mse: 0.0,
		})
	);
}

#[test]
fn test_evaluate_rejects_mismatched_predictions() {
	use crate::{error::TrainingErrorCause, task::TaskType};
	let data = crate::trainer::test_data(TaskType::Regression);
	let n = data.test.labels.len();
	let error = evaluate(&Predictions::Classification(Array2::zeros((n, 3))), &data).unwrap_err();
	assert!(error.model_type.is_none());
	assert!(matches!(error.cause, TrainingErrorCause::InvalidData(_)));
	assert!(evaluate(&Predictions::Regression(Array1::zeros(n + 1)), &data).is_err());
	let data = crate::trainer::test_data(TaskType::Classification);
	let n = data.test.labels.len();
	assert!(evaluate(&Predictions::Regression(Array1::zeros(n)), &data).is_err());
	assert!(evaluate(&Predictions::Classification(Array2::zeros((n, 2))), &data).is_err());
	assert!(evaluate(&Predictions::Classification(Array2::zeros((n, 3))), &data).is_ok());
}
