/*!
This module derives diagnostic visualizations from a trained model's predictions on the test split.
*/

use crate::{
	prepare::{Labels, PreparedData},
	task::TaskType,
	test::{argmax_rows, one_vs_rest},
	trainer::{FittedModel, Predictions},
	Error, Result,
};
use automl_metrics::{self as metrics, StreamingMetric};
use automl_util::id::Id;
use chrono::{DateTime, Utc};
use num_traits::ToPrimitive;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationType {
	ConfusionMatrix,
	RocCurve,
	FeatureImportance,
	ResidualPlot,
}

impl VisualizationType {
	/// The visualizations generated for each completed model of a task, in the order they are generated.
	pub fn for_task(task: TaskType) -> &'static [VisualizationType] {
		match task {
			TaskType::Classification => &[
				VisualizationType::ConfusionMatrix,
				VisualizationType::RocCurve,
				VisualizationType::FeatureImportance,
			],
			TaskType::Regression => &[
				VisualizationType::ResidualPlot,
				VisualizationType::FeatureImportance,
			],
		}
	}
}

impl std::fmt::Display for VisualizationType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			VisualizationType::ConfusionMatrix => "confusion_matrix",
			VisualizationType::RocCurve => "roc_curve",
			VisualizationType::FeatureImportance => "feature_importance",
			VisualizationType::ResidualPlot => "residual_plot",
		};
		write!(f, "{}", s)
	}
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visualization {
	pub id: Id,
	pub model_id: Id,
	pub data: VisualizationData,
	pub created_at: DateTime<Utc>,
}

impl Visualization {
	pub fn new(model_id: Id, data: VisualizationData) -> Self {
		Self {
			id: Id::new(),
			model_id,
			data,
			created_at: Utc::now(),
		}
	}

	pub fn visualization_type(&self) -> VisualizationType {
		self.data.visualization_type()
	}
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VisualizationData {
	ConfusionMatrix(ConfusionMatrixData),
	RocCurve(RocCurveData),
	FeatureImportance(FeatureImportanceData),
	ResidualPlot(ResidualPlotData),
}

impl VisualizationData {
	pub fn visualization_type(&self) -> VisualizationType {
		match self {
			VisualizationData::ConfusionMatrix(_) => VisualizationType::ConfusionMatrix,
			VisualizationData::RocCurve(_) => VisualizationType::RocCurve,
			VisualizationData::FeatureImportance(_) => VisualizationType::FeatureImportance,
			VisualizationData::ResidualPlot(_) => VisualizationType::ResidualPlot,
		}
	}
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConfusionMatrixData {
	pub labels: Vec<String>,
	/// Rows are actual classes and columns are predicted classes, both in `labels` order.
	pub matrix: Vec<Vec<u64>>,
	pub accuracy: f32,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RocCurveData {
	/// One curve per class, or only the positive class for binary tasks.
	pub curves: Vec<ClassRocCurve>,
	pub auc: f32,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassRocCurve {
	pub class: String,
	pub points: Vec<RocPoint>,
	pub auc: f32,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RocPoint {
	pub false_positive_rate: f32,
	pub true_positive_rate: f32,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FeatureImportanceData {
	/// Sorted by descending importance.
	pub features: Vec<FeatureImportance>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FeatureImportance {
	pub feature: String,
	pub importance: f32,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResidualPlotData {
	pub points: Vec<ResidualPoint>,
	pub mse: f32,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResidualPoint {
	/// The row of the test split.
	pub index: usize,
	pub predicted: f32,
	/// The actual value minus the predicted value.
	pub residual: f32,
}

/// A `VisualizationGenerator` predicts once on the test split and derives each visualization from those predictions.
pub struct VisualizationGenerator<'a> {
	model: &'a dyn FittedModel,
	data: &'a PreparedData,
	predictions: Predictions,
}

impl<'a> VisualizationGenerator<'a> {
	pub fn new(model: &'a dyn FittedModel, data: &'a PreparedData) -> Self {
		let predictions = model.predict(data.test.features.view());
		Self {
			model,
			data,
			predictions,
		}
	}

	pub fn generate(&self, visualization_type: VisualizationType) -> Result<VisualizationData> {
		if !VisualizationType::for_task(self.data.task).contains(&visualization_type) {
			return Err(Error::Visualization(format!(
				"{} is not available for {}",
				visualization_type, self.data.task
			)));
		}
		match visualization_type {
			VisualizationType::ConfusionMatrix => self.confusion_matrix(),
			VisualizationType::RocCurve => self.roc_curve(),
			VisualizationType::FeatureImportance => Ok(self.feature_importance()),
			VisualizationType::ResidualPlot => self.residual_plot(),
		}
	}

	fn classification(&self) -> Result<(ndarray::ArrayView2<f32>, Vec<usize>)> {
		match (&self.predictions, &self.data.test.labels) {
			(Predictions::Classification(probabilities), Labels::Classification(labels)) => {
				Ok((probabilities.view(), labels.to_vec()))
			}
			_ => Err(Error::Visualization(
				"the model did not make class predictions".to_owned(),
			)),
		}
	}

	fn confusion_matrix(&self) -> Result<VisualizationData> {
		let (probabilities, labels) = self.classification()?;
		let predictions = argmax_rows(probabilities);
		let mut classification_metrics = metrics::ClassificationMetrics::new(self.data.n_classes());
		classification_metrics.update(metrics::ClassificationMetricsInput {
			predictions: &predictions,
			labels: &labels,
		});
		let output = classification_metrics.finalize();
		Ok(VisualizationData::ConfusionMatrix(ConfusionMatrixData {
			labels: self.data.classes.clone(),
			matrix: output.confusion_matrix,
			accuracy: output.accuracy,
		}))
	}

	fn roc_curve(&self) -> Result<VisualizationData> {
		let (probabilities, labels) = self.classification()?;
		let n_classes = self.data.n_classes();
		let class_indexes: Vec<usize> = if n_classes == 2 {
			vec![1]
		} else {
			(0..n_classes).collect()
		};
		let curves: Vec<ClassRocCurve> = class_indexes
			.into_iter()
			.map(|class_index| {
				let (class_probabilities, class_labels) =
					one_vs_rest(probabilities, &labels, class_index);
				let points = metrics::compute_roc_curve(&class_probabilities, &class_labels)
					.into_iter()
					.map(|point| RocPoint {
						false_positive_rate: point.false_positive_rate,
						true_positive_rate: point.true_positive_rate,
					})
					.collect();
				ClassRocCurve {
					class: self.data.classes[class_index].clone(),
					points,
					auc: metrics::auc_roc(&class_probabilities, &class_labels),
				}
			})
			.collect();
		let auc = if curves.is_empty() {
			0.0
		} else {
			curves.iter().map(|curve| curve.auc).sum::<f32>() / curves.len().to_f32().unwrap()
		};
		Ok(VisualizationData::RocCurve(RocCurveData { curves, auc }))
	}

	fn feature_importance(&self) -> VisualizationData {
		let mut features: Vec<FeatureImportance> = self
			.data
			.feature_names
			.iter()
			.zip(self.model.feature_importances())
			.map(|(feature, importance)| FeatureImportance {
				feature: feature.clone(),
				importance,
			})
			.collect();
		features.sort_by(|a, b| {
			b.importance
				.partial_cmp(&a.importance)
				.unwrap_or(std::cmp::Ordering::Equal)
		});
		VisualizationData::FeatureImportance(FeatureImportanceData { features })
	}

	fn residual_plot(&self) -> Result<VisualizationData> {
		let (predictions, labels) = match (&self.predictions, &self.data.test.labels) {
			(Predictions::Regression(predictions), Labels::Regression(labels)) => {
				(predictions, labels)
			}
			_ => {
				return Err(Error::Visualization(
					"the model did not make numeric predictions".to_owned(),
				))
			}
		};
		let points: Vec<ResidualPoint> = predictions
			.iter()
			.zip(labels.iter())
			.enumerate()
			.map(|(index, (predicted, label))| ResidualPoint {
				index,
				predicted: *predicted,
				residual: label - predicted,
			})
			.collect();
		let mut mean = metrics::Mean::default();
		for point in points.iter() {
			mean.update(point.residual * point.residual);
		}
		Ok(VisualizationData::ResidualPlot(ResidualPlotData {
			points,
			mse: mean.finalize().unwrap_or(0.0),
		}))
	}
}

#[cfg(test)]
struct ConstantModel {
	predictions: Predictions,
	importances: Vec<f32>,
}

#[cfg(test)]
impl FittedModel for ConstantModel {
	fn predict(&self, _features: ndarray::ArrayView2<f32>) -> Predictions {
		self.predictions.clone()
	}
	fn feature_importances(&self) -> Vec<f32> {
		self.importances.clone()
	}
}

#[test]
fn test_classification_visualizations() {
	use ndarray::prelude::*;
	let data = crate::trainer::test_data(TaskType::Classification);
	let labels = match &data.test.labels {
		Labels::Classification(labels) => labels.clone(),
		_ => unreachable!(),
	};
	let mut probabilities = Array2::zeros((labels.len(), 3));
	for (row, label) in labels.iter().enumerate() {
		probabilities[(row, *label)] = 1.0;
	}
	let model = ConstantModel {
		predictions: Predictions::Classification(probabilities),
		importances: vec![0.25, 0.5, 0.25],
	};
	let generator = VisualizationGenerator::new(&model, &data);
	match generator.generate(VisualizationType::ConfusionMatrix).unwrap() {
		VisualizationData::ConfusionMatrix(confusion_matrix) => {
			assert_eq!(confusion_matrix.labels, vec!["a", "b", "c"]);
			assert_eq!(confusion_matrix.accuracy, 1.0);
			let total: u64 = confusion_matrix.matrix.iter().flatten().sum();
			assert_eq!(total, labels.len() as u64);
			for (i, row) in confusion_matrix.matrix.iter().enumerate() {
				for (j, count) in row.iter().enumerate() {
					if i != j {
						assert_eq!(*count, 0);
					}
				}
			}
		}
		_ => panic!("expected a confusion matrix"),
	}
	match generator.generate(VisualizationType::RocCurve).unwrap() {
		VisualizationData::RocCurve(roc_curve) => {
			assert_eq!(roc_curve.curves.len(), 3);
			for (class_index, curve) in roc_curve.curves.iter().enumerate() {
				assert_eq!(curve.points[0].true_positive_rate, 0.0);
				if labels.iter().any(|label| *label == class_index) {
					assert_eq!(curve.auc, 1.0);
				}
			}
		}
		_ => panic!("expected a roc curve"),
	}
	match generator.generate(VisualizationType::FeatureImportance).unwrap() {
		VisualizationData::FeatureImportance(feature_importance) => {
			let features: Vec<&str> = feature_importance
				.features
				.iter()
				.map(|feature| feature.feature.as_str())
				.collect();
			assert_eq!(features, vec!["group", "x", "noise"]);
		}
		_ => panic!("expected feature importances"),
	}
	assert!(matches!(
		generator.generate(VisualizationType::ResidualPlot),
		Err(Error::Visualization(_))
	));
}

#[test]
fn test_residual_plot() {
	let data = crate::trainer::test_data(TaskType::Regression);
	let labels = match &data.test.labels {
		Labels::Regression(labels) => labels.clone(),
		_ => unreachable!(),
	};
	let model = ConstantModel {
		predictions: Predictions::Regression(&labels - 1.0),
		importances: vec![1.0, 0.0, 0.0],
	};
	let generator = VisualizationGenerator::new(&model, &data);
	let data = generator.generate(VisualizationType::ResidualPlot).unwrap();
	let value = serde_json::to_value(&data).unwrap();
	assert_eq!(value["type"], "residual_plot");
	match data {
		VisualizationData::ResidualPlot(residual_plot) => {
			assert_eq!(residual_plot.points.len(), labels.len());
			assert_eq!(residual_plot.points[0].index, 0);
			for point in residual_plot.points.iter() {
				assert!((point.residual - 1.0).abs() < 1e-5);
			}
			assert!((residual_plot.mse - 1.0).abs() < 1e-4);
		}
		_ => panic!("expected a residual plot"),
	}
	assert!(generator.generate(VisualizationType::RocCurve).is_err());
}
