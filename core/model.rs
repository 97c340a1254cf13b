/*!
This module defines the `Model` record, one per candidate model type per training job, along with the model types, their hyperparameters, and the metrics a trained model reports.
*/

use crate::task::TaskType;
use automl_util::id::Id;
use chrono::{DateTime, Utc};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
	RandomForest,
	Xgboost,
	DecisionTree,
	LogisticRegression,
	RandomForestRegressor,
	XgboostRegressor,
	DecisionTreeRegressor,
	LinearRegression,
}

const CLASSIFICATION_MODEL_TYPES: &[ModelType] = &[
	ModelType::RandomForest,
	ModelType::Xgboost,
	ModelType::DecisionTree,
	ModelType::LogisticRegression,
];

const REGRESSION_MODEL_TYPES: &[ModelType] = &[
	ModelType::RandomForestRegressor,
	ModelType::XgboostRegressor,
	ModelType::DecisionTreeRegressor,
	ModelType::LinearRegression,
];

impl ModelType {
	/// The candidate model types for `task`, in the order they are trained.
	pub fn for_task(task: TaskType) -> &'static [ModelType] {
		match task {
			TaskType::Classification => CLASSIFICATION_MODEL_TYPES,
			TaskType::Regression => REGRESSION_MODEL_TYPES,
		}
	}

	pub fn task(self) -> TaskType {
		match self {
			ModelType::RandomForest
			| ModelType::Xgboost
			| ModelType::DecisionTree
			| ModelType::LogisticRegression => TaskType::Classification,
			ModelType::RandomForestRegressor
			| ModelType::XgboostRegressor
			| ModelType::DecisionTreeRegressor
			| ModelType::LinearRegression => TaskType::Regression,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			ModelType::RandomForest => "random_forest",
			ModelType::Xgboost => "xgboost",
			ModelType::DecisionTree => "decision_tree",
			ModelType::LogisticRegression => "logistic_regression",
			ModelType::RandomForestRegressor => "random_forest_regressor",
			ModelType::XgboostRegressor => "xgboost_regressor",
			ModelType::DecisionTreeRegressor => "decision_tree_regressor",
			ModelType::LinearRegression => "linear_regression",
		}
	}
}

impl std::fmt::Display for ModelType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
	Pending,
	Training,
	Completed,
	Failed,
}

impl ModelStatus {
	pub fn is_terminal(self) -> bool {
		matches!(self, ModelStatus::Completed | ModelStatus::Failed)
	}
}

/// The metrics of a trained model, computed on the test split. Which variant is populated depends on the task.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Metrics {
	Classification(ClassificationMetrics),
	Regression(RegressionMetrics),
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationMetrics {
	pub accuracy: f32,
	/// weighted by the number of examples of each class
	pub precision: f32,
	pub recall: f32,
	pub f1_score: f32,
	pub auc_roc: f32,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionMetrics {
	pub rmse: f32,
	pub mae: f32,
	pub r2_score: f32,
	pub mse: f32,
}

/// The hyperparameters of each model family. They serialize as a map with a `family` key.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Hyperparameters {
	RandomForest(RandomForestHyperparameters),
	Xgboost(XgboostHyperparameters),
	DecisionTree(DecisionTreeHyperparameters),
	Linear(LinearHyperparameters),
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RandomForestHyperparameters {
	pub n_estimators: usize,
	pub max_depth: Option<usize>,
	pub min_samples_split: usize,
	pub min_samples_leaf: usize,
	pub max_features: MaxFeatures,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct XgboostHyperparameters {
	pub n_estimators: usize,
	pub learning_rate: f32,
	pub max_depth: usize,
	pub min_child_weight: f32,
	pub l2_regularization: f32,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DecisionTreeHyperparameters {
	pub max_depth: Option<usize>,
	pub min_samples_split: usize,
	pub min_samples_leaf: usize,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LinearHyperparameters {
	pub learning_rate: f32,
	pub l2_regularization: f32,
	pub max_epochs: usize,
	pub n_examples_per_batch: usize,
	pub early_stopping: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
	All,
	Sqrt,
}

/// Overrides for the default hyperparameters of a model type. Fields that do not apply to the model's family are ignored.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HyperparameterOverrides {
	pub n_estimators: Option<usize>,
	pub max_depth: Option<usize>,
	pub min_samples_split: Option<usize>,
	pub min_samples_leaf: Option<usize>,
	pub max_features: Option<MaxFeatures>,
	pub learning_rate: Option<f32>,
	pub min_child_weight: Option<f32>,
	pub l2_regularization: Option<f32>,
	pub max_epochs: Option<usize>,
	pub n_examples_per_batch: Option<usize>,
	pub early_stopping: Option<bool>,
}

impl Hyperparameters {
	/// The default hyperparameters for `model_type`.
	pub fn default_for(model_type: ModelType) -> Self {
		match model_type {
			ModelType::RandomForest | ModelType::RandomForestRegressor => {
				Hyperparameters::RandomForest(RandomForestHyperparameters {
					n_estimators: 100,
					max_depth: None,
					min_samples_split: 2,
					min_samples_leaf: 1,
					max_features: if model_type == ModelType::RandomForest {
						MaxFeatures::Sqrt
					} else {
						MaxFeatures::All
					},
				})
			}
			ModelType::Xgboost | ModelType::XgboostRegressor => {
				Hyperparameters::Xgboost(XgboostHyperparameters {
					n_estimators: 100,
					learning_rate: 0.1,
					max_depth: 6,
					min_child_weight: 1.0,
					l2_regularization: 1.0,
				})
			}
			ModelType::DecisionTree | ModelType::DecisionTreeRegressor => {
				Hyperparameters::DecisionTree(DecisionTreeHyperparameters {
					max_depth: None,
					min_samples_split: 2,
					min_samples_leaf: 1,
				})
			}
			ModelType::LogisticRegression | ModelType::LinearRegression => {
				Hyperparameters::Linear(LinearHyperparameters {
					learning_rate: 0.1,
					l2_regularization: 0.0,
					max_epochs: 100,
					n_examples_per_batch: 32,
					early_stopping: true,
				})
			}
		}
	}

	pub fn apply(&mut self, overrides: &HyperparameterOverrides) {
		match self {
			Hyperparameters::RandomForest(h) => {
				set(&mut h.n_estimators, overrides.n_estimators);
				if overrides.max_depth.is_some() {
					h.max_depth = overrides.max_depth;
				}
				set(&mut h.min_samples_split, overrides.min_samples_split);
				set(&mut h.min_samples_leaf, overrides.min_samples_leaf);
				set(&mut h.max_features, overrides.max_features);
			}
			Hyperparameters::Xgboost(h) => {
				set(&mut h.n_estimators, overrides.n_estimators);
				set(&mut h.learning_rate, overrides.learning_rate);
				set(&mut h.max_depth, overrides.max_depth);
				set(&mut h.min_child_weight, overrides.min_child_weight);
				set(&mut h.l2_regularization, overrides.l2_regularization);
			}
			Hyperparameters::DecisionTree(h) => {
				if overrides.max_depth.is_some() {
					h.max_depth = overrides.max_depth;
				}
				set(&mut h.min_samples_split, overrides.min_samples_split);
				set(&mut h.min_samples_leaf, overrides.min_samples_leaf);
			}
			Hyperparameters::Linear(h) => {
				set(&mut h.learning_rate, overrides.learning_rate);
				set(&mut h.l2_regularization, overrides.l2_regularization);
				set(&mut h.max_epochs, overrides.max_epochs);
				set(&mut h.n_examples_per_batch, overrides.n_examples_per_batch);
				set(&mut h.early_stopping, overrides.early_stopping);
			}
		}
	}

	/// The number of units of work training reports progress in: trees, boosting rounds, or epochs.
	pub fn n_progress_steps(&self) -> u64 {
		let n = match self {
			Hyperparameters::RandomForest(h) => h.n_estimators,
			Hyperparameters::Xgboost(h) => h.n_estimators,
			Hyperparameters::DecisionTree(_) => 1,
			Hyperparameters::Linear(h) => h.max_epochs,
		};
		n as u64
	}
}

fn set<T>(field: &mut T, value: Option<T>) {
	if let Some(value) = value {
		*field = value;
	}
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
	pub id: Id,
	pub dataset_id: Id,
	pub job_id: Id,
	pub model_type: ModelType,
	pub status: ModelStatus,
	pub progress: f32,
	/// Populated only when `status` is `completed`.
	pub metrics: Option<Metrics>,
	/// Wall clock training time in seconds.
	pub training_time: Option<f64>,
	pub hyperparameters: Hyperparameters,
	pub error: Option<String>,
	pub created_at: DateTime<Utc>,
	pub completed_at: Option<DateTime<Utc>>,
}

impl Model {
	pub fn new(
		dataset_id: Id,
		job_id: Id,
		model_type: ModelType,
		status: ModelStatus,
		hyperparameters: Hyperparameters,
	) -> Self {
		Self {
			id: Id::new(),
			dataset_id,
			job_id,
			model_type,
			status,
			progress: 0.0,
			metrics: None,
			training_time: None,
			hyperparameters,
			error: None,
			created_at: Utc::now(),
			completed_at: None,
		}
	}
}

/// A partial update to a `Model`. Fields that are `None` keep their current values.
#[derive(Clone, Debug, Default)]
pub struct ModelUpdate {
	pub status: Option<ModelStatus>,
	pub progress: Option<f32>,
	pub metrics: Option<Metrics>,
	pub training_time: Option<f64>,
	pub hyperparameters: Option<Hyperparameters>,
	pub error: Option<String>,
}

#[test]
fn test_model_types() {
	assert_eq!(
		ModelType::for_task(TaskType::Classification)
			.iter()
			.map(|model_type| model_type.to_string())
			.collect::<Vec<_>>(),
		vec![
			"random_forest",
			"xgboost",
			"decision_tree",
			"logistic_regression"
		]
	);
	for model_type in ModelType::for_task(TaskType::Regression) {
		assert_eq!(model_type.task(), TaskType::Regression);
	}
	let model_type: ModelType = serde_json::from_str("\"xgboost_regressor\"").unwrap();
	assert_eq!(model_type, ModelType::XgboostRegressor);
}

#[test]
fn test_hyperparameters() {
	let mut hyperparameters = Hyperparameters::default_for(ModelType::RandomForest);
	hyperparameters.apply(&HyperparameterOverrides {
		n_estimators: Some(10),
		max_depth: Some(4),
		learning_rate: Some(0.5),
		..Default::default()
	});
	insta::assert_json_snapshot!(hyperparameters, @r###"
 {
   "family": "random_forest",
   "n_estimators": 10,
   "max_depth": 4,
   "min_samples_split": 2,
   "min_samples_leaf": 1,
   "max_features": "sqrt"
 }
 "###);
	assert_eq!(hyperparameters.n_progress_steps(), 10);
}
