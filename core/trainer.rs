/*!
This module defines the [`Trainer`](trait.Trainer.html) trait, which fits one candidate model type, and [`LocalTrainer`](struct.LocalTrainer.html), which fits models in process with the `automl_linear` and `automl_tree` crates.
*/

use crate::{
	error::TrainingError,
	model::{
		DecisionTreeHyperparameters, Hyperparameters, LinearHyperparameters, MaxFeatures,
		Metrics, ModelType, RandomForestHyperparameters, XgboostHyperparameters,
	},
	prepare::{Labels, PreparedData},
	test::evaluate,
};
use automl_linear::{EarlyStoppingOptions, MulticlassClassifier, Regressor};
use automl_tree::{
	DecisionTreeClassifier, DecisionTreeRegressor, GradientBoostingClassifier,
	GradientBoostingOptions, GradientBoostingRegressor, RandomForestClassifier,
	RandomForestOptions, RandomForestRegressor, TreeOptions,
};
use automl_util::{id::Id, progress_counter::ProgressCounter};
use ndarray::prelude::*;
use std::time::{Duration, Instant};
use tracing::debug;

/// The seed for every source of randomness in model training.
const SEED: u64 = 42;

/// How often the progress of a model being trained is polled.
const PROGRESS_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub trait Trainer: Send + Sync {
	/// Fit `model_type` to `data.train` and compute its metrics on `data.test`. `update_progress` is called with values in [0, 1] that never decrease.
	fn train(
		&self,
		dataset_id: Id,
		model_type: ModelType,
		hyperparameters: &Hyperparameters,
		data: &PreparedData,
		update_progress: &mut dyn FnMut(f32),
	) -> Result<TrainOutput, TrainingError>;
}

pub struct TrainOutput {
	pub metrics: Metrics,
	/// Wall clock seconds spent fitting and evaluating the model.
	pub training_time: f64,
	pub hyperparameters: Hyperparameters,
	pub model: Box<dyn FittedModel>,
}

impl std::fmt::Debug for TrainOutput {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TrainOutput")
			.field("metrics", &self.metrics)
			.field("training_time", &self.training_time)
			.field("hyperparameters", &self.hyperparameters)
			.finish()
	}
}

#[derive(Clone, Debug)]
pub enum Predictions {
	/// (n_examples, n_classes)
	Classification(Array2<f32>),
	/// (n_examples)
	Regression(Array1<f32>),
}

impl Predictions {
	pub fn is_finite(&self) -> bool {
		match self {
			Predictions::Classification(probabilities) => {
				probabilities.iter().all(|value| value.is_finite())
			}
			Predictions::Regression(predictions) => {
				predictions.iter().all(|value| value.is_finite())
			}
		}
	}
}

/// A trained model that can make predictions.
pub trait FittedModel: Send + Sync {
	fn predict(&self, features: ArrayView2<f32>) -> Predictions;
	/// One non negative importance per feature, in feature order.
	fn feature_importances(&self) -> Vec<f32>;
}

macro_rules! impl_fitted_classifier {
	($model:ty) => {
		impl FittedModel for $model {
			fn predict(&self, features: ArrayView2<f32>) -> Predictions {
				let mut probabilities = Array2::zeros((features.nrows(), self.n_classes()));
				<$model>::predict(self, features, probabilities.view_mut());
				Predictions::Classification(probabilities)
			}
			fn feature_importances(&self) -> Vec<f32> {
				self.importances()
			}
		}
	};
}

macro_rules! impl_fitted_regressor {
	($model:ty) => {
		impl FittedModel for $model {
			fn predict(&self, features: ArrayView2<f32>) -> Predictions {
				let mut predictions = Array1::zeros(features.nrows());
				<$model>::predict(self, features, predictions.view_mut());
				Predictions::Regression(predictions)
			}
			fn feature_importances(&self) -> Vec<f32> {
				self.importances()
			}
		}
	};
}

/// Shape and importance accessors that differ in name between the model crates.
trait ModelInfo {
	fn n_classes(&self) -> usize {
		1
	}
	fn importances(&self) -> Vec<f32>;
}

impl ModelInfo for RandomForestClassifier {
	fn n_classes(&self) -> usize {
		self.n_classes
	}
	fn importances(&self) -> Vec<f32> {
		self.feature_importances.clone()
	}
}

impl ModelInfo for DecisionTreeClassifier {
	fn n_classes(&self) -> usize {
		self.n_classes
	}
	fn importances(&self) -> Vec<f32> {
		self.feature_importances.clone()
	}
}

impl ModelInfo for GradientBoostingClassifier {
	fn n_classes(&self) -> usize {
		self.biases.len()
	}
	fn importances(&self) -> Vec<f32> {
		self.feature_importances.clone()
	}
}

impl ModelInfo for MulticlassClassifier {
	fn n_classes(&self) -> usize {
		self.biases.len()
	}
	fn importances(&self) -> Vec<f32> {
		MulticlassClassifier::feature_importances(self)
	}
}

impl ModelInfo for RandomForestRegressor {
	fn importances(&self) -> Vec<f32> {
		self.feature_importances.clone()
	}
}

impl ModelInfo for DecisionTreeRegressor {
	fn importances(&self) -> Vec<f32> {
		self.feature_importances.clone()
	}
}

impl ModelInfo for GradientBoostingRegressor {
	fn importances(&self) -> Vec<f32> {
		self.feature_importances.clone()
	}
}

impl ModelInfo for Regressor {
	fn importances(&self) -> Vec<f32> {
		Regressor::feature_importances(self)
	}
}

impl_fitted_classifier!(RandomForestClassifier);
impl_fitted_classifier!(DecisionTreeClassifier);
impl_fitted_classifier!(GradientBoostingClassifier);
impl_fitted_classifier!(MulticlassClassifier);
impl_fitted_regressor!(RandomForestRegressor);
impl_fitted_regressor!(DecisionTreeRegressor);
impl_fitted_regressor!(GradientBoostingRegressor);
impl_fitted_regressor!(Regressor);

/// The `LocalTrainer` fits models on the calling thread's process using the workspace's model crates.
#[derive(Clone, Debug, Default)]
pub struct LocalTrainer;

impl Trainer for LocalTrainer {
	fn train(
		&self,
		dataset_id: Id,
		model_type: ModelType,
		hyperparameters: &Hyperparameters,
		data: &PreparedData,
		update_progress: &mut dyn FnMut(f32),
	) -> Result<TrainOutput, TrainingError> {
		if model_type.task() != data.task {
			return Err(TrainingError::invalid_data(
				Some(model_type),
				format!("{} cannot be trained for {}", model_type, data.task),
			));
		}
		let start = Instant::now();
		let progress_counter = ProgressCounter::new(hyperparameters.n_progress_steps());
		let model = std::thread::scope(|scope| {
			let handle = scope.spawn(|| fit(model_type, hyperparameters, data, &progress_counter));
			let mut reported = 0.0;
			while !handle.is_finished() {
				std::thread::sleep(PROGRESS_POLL_INTERVAL);
				let fraction = progress_counter.fraction();
				if fraction > reported {
					reported = fraction;
					update_progress(fraction);
				}
			}
			match handle.join() {
				Ok(model) => model,
				Err(_) => Err(TrainingError::did_not_converge(
					model_type,
					"training panicked",
				)),
			}
		})?;
		update_progress(1.0);
		let predictions = model.predict(data.test.features.view());
		if !predictions.is_finite() {
			return Err(TrainingError::did_not_converge(
				model_type,
				"the model made non finite predictions",
			));
		}
		let metrics = evaluate(&predictions, data).map_err(|error| TrainingError {
			model_type: Some(model_type),
			..error
		})?;
		let training_time = start.elapsed().as_secs_f64();
		debug!(%dataset_id, %model_type, training_time, "trained model");
		Ok(TrainOutput {
			metrics,
			training_time,
			hyperparameters: hyperparameters.clone(),
			model,
		})
	}
}

fn fit(
	model_type: ModelType,
	hyperparameters: &Hyperparameters,
	data: &PreparedData,
	progress_counter: &ProgressCounter,
) -> Result<Box<dyn FittedModel>, TrainingError> {
	let features = data.train.features.view();
	let n_classes = data.n_classes();
	let mismatch = || {
		TrainingError::invalid_data(
			Some(model_type),
			"the hyperparameters are for a different model family",
		)
	};
	let model: Box<dyn FittedModel> = match (&data.train.labels, hyperparameters) {
		(Labels::Classification(labels), Hyperparameters::RandomForest(h))
			if model_type == ModelType::RandomForest =>
		{
			Box::new(RandomForestClassifier::train(
				features,
				labels.view(),
				n_classes,
				&random_forest_options(h),
				progress_counter,
			))
		}
		(Labels::Classification(labels), Hyperparameters::Xgboost(h))
			if model_type == ModelType::Xgboost =>
		{
			Box::new(GradientBoostingClassifier::train(
				features,
				labels.view(),
				n_classes,
				&gradient_boosting_options(h),
				progress_counter,
			))
		}
		(Labels::Classification(labels), Hyperparameters::DecisionTree(h))
			if model_type == ModelType::DecisionTree =>
		{
			Box::new(DecisionTreeClassifier::train(
				features,
				labels.view(),
				n_classes,
				&decision_tree_options(h),
				SEED,
				progress_counter,
			))
		}
		(Labels::Classification(labels), Hyperparameters::Linear(h))
			if model_type == ModelType::LogisticRegression =>
		{
			Box::new(MulticlassClassifier::train(
				features,
				labels.view(),
				n_classes,
				&linear_options(h),
				progress_counter,
			))
		}
		(Labels::Regression(labels), Hyperparameters::RandomForest(h))
			if model_type == ModelType::RandomForestRegressor =>
		{
			Box::new(RandomForestRegressor::train(
				features,
				labels.view(),
				&random_forest_options(h),
				progress_counter,
			))
		}
		(Labels::Regression(labels), Hyperparameters::Xgboost(h))
			if model_type == ModelType::XgboostRegressor =>
		{
			Box::new(GradientBoostingRegressor::train(
				features,
				labels.view(),
				&gradient_boosting_options(h),
				progress_counter,
			))
		}
		(Labels::Regression(labels), Hyperparameters::DecisionTree(h))
			if model_type == ModelType::DecisionTreeRegressor =>
		{
			Box::new(DecisionTreeRegressor::train(
				features,
				labels.view(),
				&decision_tree_options(h),
				SEED,
				progress_counter,
			))
		}
		(Labels::Regression(labels), Hyperparameters::Linear(h))
			if model_type == ModelType::LinearRegression =>
		{
			Box::new(Regressor::train(
				features,
				labels.view(),
				&linear_options(h),
				progress_counter,
			))
		}
		_ => return Err(mismatch()),
	};
	Ok(model)
}

fn random_forest_options(h: &RandomForestHyperparameters) -> RandomForestOptions {
	RandomForestOptions {
		n_estimators: h.n_estimators,
		tree_options: TreeOptions {
			max_depth: h.max_depth,
			min_samples_split: h.min_samples_split,
			min_samples_leaf: h.min_samples_leaf,
			max_features: match h.max_features {
				MaxFeatures::All => automl_tree::MaxFeatures::All,
				MaxFeatures::Sqrt => automl_tree::MaxFeatures::Sqrt,
			},
		},
		seed: SEED,
	}
}

fn gradient_boosting_options(h: &XgboostHyperparameters) -> GradientBoostingOptions {
	GradientBoostingOptions {
		n_estimators: h.n_estimators,
		learning_rate: h.learning_rate,
		max_depth: h.max_depth,
		min_child_weight: h.min_child_weight,
		l2_regularization: h.l2_regularization,
	}
}

fn decision_tree_options(h: &DecisionTreeHyperparameters) -> TreeOptions {
	TreeOptions {
		max_depth: h.max_depth,
		min_samples_split: h.min_samples_split,
		min_samples_leaf: h.min_samples_leaf,
		max_features: automl_tree::MaxFeatures::All,
	}
}

fn linear_options(h: &LinearHyperparameters) -> automl_linear::TrainOptions {
	automl_linear::TrainOptions {
		early_stopping_options: if h.early_stopping {
			Some(EarlyStoppingOptions::default())
		} else {
			None
		},
		l2_regularization: h.l2_regularization,
		learning_rate: h.learning_rate,
		max_epochs: h.max_epochs,
		n_examples_per_batch: h.n_examples_per_batch,
	}
}

#[cfg(test)]
pub(crate) fn test_data(task: crate::task::TaskType) -> PreparedData {
	use crate::prepare::{prepare, PrepareOptions};
	use automl_dataframe::{DataFrame, Value};
	let rows = (0..60)
		.map(|i| {
			let x = i as f32 / 10.0;
			let label = match task {
				crate::task::TaskType::Classification => Value::from(match i % 3 {
					0 => "a",
					1 => "b",
					_ => "c",
				}),
				crate::task::TaskType::Regression => Value::Number(3.0 * x + 1.0),
			};
			vec![
				Value::Number(x),
				Value::Number((i % 3) as f32),
				Value::Number(((i * 7) % 5) as f32),
				label,
			]
		})
		.collect();
	let dataframe = DataFrame::from_rows(
		vec!["x".to_owned(), "group".to_owned(), "noise".to_owned(), "y".to_owned()],
		rows,
	)
	.unwrap();
	prepare(&dataframe, "y", task, &PrepareOptions::default()).unwrap()
}

#[cfg(test)]
fn small_hyperparameters(model_type: ModelType) -> Hyperparameters {
	let mut hyperparameters = Hyperparameters::default_for(model_type);
	hyperparameters.apply(&crate::model::HyperparameterOverrides {
		n_estimators: Some(10),
		..Default::default()
	});
	hyperparameters
}

#[test]
fn test_train_classifiers() {
	use crate::task::TaskType;
	let data = test_data(TaskType::Classification);
	for model_type in ModelType::for_task(TaskType::Classification) {
		let mut progress = Vec::new();
		let output = LocalTrainer
			.train(
				Id::new(),
				*model_type,
				&small_hyperparameters(*model_type),
				&data,
				&mut |value| progress.push(value),
			)
			.unwrap();
		assert_eq!(progress.last(), Some(&1.0));
		assert!(progress.windows(2).all(|window| window[0] <= window[1]));
		assert!(output.training_time >= 0.0);
		assert_eq!(output.model.feature_importances().len(), 3);
		match output.metrics {
			Metrics::Classification(metrics) => {
				assert!((0.0..=1.0).contains(&metrics.accuracy));
				if matches!(model_type, ModelType::DecisionTree | ModelType::Xgboost) {
					assert!(metrics.accuracy > 0.9);
				}
			}
			Metrics::Regression(_) => panic!("expected classification metrics"),
		}
	}
}

#[test]
fn test_train_regressors() {
	use crate::task::TaskType;
	let data = test_data(TaskType::Regression);
	for model_type in ModelType::for_task(TaskType::Regression) {
		let output = LocalTrainer
			.train(
				Id::new(),
				*model_type,
				&small_hyperparameters(*model_type),
				&data,
				&mut |_| {},
			)
			.unwrap();
		match output.metrics {
			Metrics::Regression(metrics) => {
				assert!(metrics.rmse.is_finite());
				assert!((metrics.rmse * metrics.rmse - metrics.mse).abs() < 1e-3);
			}
			Metrics::Classification(_) => panic!("expected regression metrics"),
		}
	}
}

#[test]
fn test_train_mismatch() {
	use crate::task::TaskType;
	let data = test_data(TaskType::Regression);
	let error = LocalTrainer
		.train(
			Id::new(),
			ModelType::RandomForest,
			&Hyperparameters::default_for(ModelType::RandomForest),
			&data,
			&mut |_| {},
		)
		.unwrap_err();
	assert_eq!(error.model_type, Some(ModelType::RandomForest));
	let error = LocalTrainer
		.train(
			Id::new(),
			ModelType::LinearRegression,
			&Hyperparameters::default_for(ModelType::XgboostRegressor),
			&data,
			&mut |_| {},
		)
		.unwrap_err();
	assert_eq!(
		error.to_string(),
		"failed to train linear_regression: invalid data: the hyperparameters are for a different model family"
	);
}
