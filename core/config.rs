/*!
This module defines the `Config` struct, which is read from a YAML file to configure a training job, and the `TrainOptions` it resolves to.
*/

use crate::{
	model::{HyperparameterOverrides, Metrics, ModelType},
	prepare::PrepareOptions,
	task::{TaskType, DEFAULT_CLASSIFICATION_MAX_UNIQUE_VALUES},
	Error, Result,
};
use std::{collections::BTreeMap, path::Path};

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
	pub target_column: Option<String>,
	pub test_fraction: Option<f32>,
	pub shuffle: Option<Shuffle>,
	pub classification_max_unique_values: Option<usize>,
	pub comparison_metric: Option<ComparisonMetric>,
	pub model_types: Option<Vec<ModelType>>,
	pub hyperparameters: Option<BTreeMap<ModelType, HyperparameterOverrides>>,
	pub concurrency: Option<Concurrency>,
	pub failure_policy: Option<FailurePolicy>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
pub enum Shuffle {
	Enabled(bool),
	Options { seed: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concurrency {
	Sequential,
	Parallel { max_workers: usize },
}

/// What a job does when one of its models fails to train.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
	/// Fail the job.
	Abort,
	/// Skip the model. The job fails only if no model completes.
	Continue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMetric {
	Accuracy,
	F1,
	AucRoc,
	R2,
	Rmse,
	Mae,
}

impl ComparisonMetric {
	pub fn default_for(task: TaskType) -> Self {
		match task {
			TaskType::Classification => ComparisonMetric::Accuracy,
			TaskType::Regression => ComparisonMetric::R2,
		}
	}

	pub fn task(self) -> TaskType {
		match self {
			ComparisonMetric::Accuracy | ComparisonMetric::F1 | ComparisonMetric::AucRoc => {
				TaskType::Classification
			}
			ComparisonMetric::R2 | ComparisonMetric::Rmse | ComparisonMetric::Mae => {
				TaskType::Regression
			}
		}
	}

	/// Errors are better when they are smaller.
	pub fn is_minimized(self) -> bool {
		matches!(self, ComparisonMetric::Rmse | ComparisonMetric::Mae)
	}

	/// Read this metric from `metrics`, or `None` if `metrics` are for the other task.
	pub fn value(self, metrics: &Metrics) -> Option<f32> {
		match (self, metrics) {
			(ComparisonMetric::Accuracy, Metrics::Classification(metrics)) => Some(metrics.accuracy),
			(ComparisonMetric::F1, Metrics::Classification(metrics)) => Some(metrics.f1_score),
			(ComparisonMetric::AucRoc, Metrics::Classification(metrics)) => Some(metrics.auc_roc),
			(ComparisonMetric::R2, Metrics::Regression(metrics)) => Some(metrics.r2_score),
			(ComparisonMetric::Rmse, Metrics::Regression(metrics)) => Some(metrics.rmse),
			(ComparisonMetric::Mae, Metrics::Regression(metrics)) => Some(metrics.mae),
			_ => None,
		}
	}
}

impl std::fmt::Display for ComparisonMetric {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			ComparisonMetric::Accuracy => "Accuracy",
			ComparisonMetric::F1 => "F1",
			ComparisonMetric::AucRoc => "Area Under the Receiver Operating Characteristic Curve",
			ComparisonMetric::R2 => "R2",
			ComparisonMetric::Rmse => "Root Mean Squared Error",
			ComparisonMetric::Mae => "Mean Absolute Error",
		};
		write!(f, "{}", s)
	}
}

impl Config {
	pub fn from_path(path: &Path) -> Result<Self> {
		let bytes = std::fs::read(path)?;
		serde_yaml::from_slice(&bytes)
			.map_err(|error| Error::Config(format!("{}: {}", path.display(), error)))
	}

	pub fn from_yaml(yaml: &str) -> Result<Self> {
		serde_yaml::from_str(yaml).map_err(|error| Error::Config(error.to_string()))
	}

	pub fn train_options(&self) -> TrainOptions {
		let defaults = TrainOptions::default();
		let shuffle_seed = match self.shuffle {
			None | Some(Shuffle::Enabled(true)) => defaults.prepare.shuffle_seed,
			Some(Shuffle::Enabled(false)) => None,
			Some(Shuffle::Options { seed }) => Some(seed),
		};
		TrainOptions {
			prepare: PrepareOptions {
				test_fraction: self.test_fraction.unwrap_or(defaults.prepare.test_fraction),
				shuffle_seed,
			},
			comparison_metric: self.comparison_metric,
			model_types: self.model_types.clone(),
			hyperparameters: self.hyperparameters.clone().unwrap_or_default(),
			concurrency: self.concurrency.unwrap_or(defaults.concurrency),
			failure_policy: self.failure_policy.unwrap_or(defaults.failure_policy),
		}
	}

	pub fn classification_max_unique_values(&self) -> usize {
		self.classification_max_unique_values
			.unwrap_or(DEFAULT_CLASSIFICATION_MAX_UNIQUE_VALUES)
	}
}

/// The options the training orchestrator runs a job with.
#[derive(Clone, Debug)]
pub struct TrainOptions {
	pub prepare: PrepareOptions,
	/// If this is `None`, the default metric for the dataset's task is used.
	pub comparison_metric: Option<ComparisonMetric>,
	/// Restrict training to these model types. Order follows the task's candidate list.
	pub model_types: Option<Vec<ModelType>>,
	pub hyperparameters: BTreeMap<ModelType, HyperparameterOverrides>,
	pub concurrency: Concurrency,
	pub failure_policy: FailurePolicy,
}

impl Default for TrainOptions {
	fn default() -> Self {
		Self {
			prepare: PrepareOptions::default(),
			comparison_metric: None,
			model_types: None,
			hyperparameters: BTreeMap::new(),
			concurrency: Concurrency::Sequential,
			failure_policy: FailurePolicy::Abort,
		}
	}
}

impl TrainOptions {
	/// Check these options against the dataset's task and return the comparison metric and the model types to train, in order.
	pub fn resolve(&self, task: TaskType) -> Result<(ComparisonMetric, Vec<ModelType>)> {
		if !(0.0..1.0).contains(&self.prepare.test_fraction) {
			return Err(Error::Config(format!(
				"test_fraction must be at least 0 and less than 1 but was {}",
				self.prepare.test_fraction
			)));
		}
		if let Concurrency::Parallel { max_workers: 0 } = self.concurrency {
			return Err(Error::Config("max_workers must be at least 1".to_owned()));
		}
		let comparison_metric = self
			.comparison_metric
			.unwrap_or_else(|| ComparisonMetric::default_for(task));
		if comparison_metric.task() != task {
			return Err(Error::Config(format!(
				"the comparison metric {} cannot be used for {}",
				comparison_metric, task
			)));
		}
		let candidates = ModelType::for_task(task);
		let model_types = match &self.model_types {
			None => candidates.to_vec(),
			Some(model_types) => {
				if let Some(model_type) = model_types
					.iter()
					.find(|model_type| model_type.task() != task)
				{
					return Err(Error::Config(format!(
						"the model type {} cannot be used for {}",
						model_type, task
					)));
				}
				candidates
					.iter()
					.filter(|candidate| model_types.contains(candidate))
					.cloned()
					.collect()
			}
		};
		if model_types.is_empty() {
			return Err(Error::Config("no model types to train".to_owned()));
		}
		Ok((comparison_metric, model_types))
	}
}

#[test]
fn test_config() {
	let config = Config::from_yaml(
		r#"
test_fraction: 0.3
shuffle:
  seed: 7
comparison_metric: f1
model_types: [logistic_regression, random_forest]
hyperparameters:
  random_forest:
    n_estimators: 10
concurrency:
  parallel:
    max_workers: 2
failure_policy: continue
"#,
	)
	.unwrap();
	let options = config.train_options();
	assert_eq!(options.prepare.test_fraction, 0.3);
	assert_eq!(options.prepare.shuffle_seed, Some(7));
	assert_eq!(options.concurrency, Concurrency::Parallel { max_workers: 2 });
	assert_eq!(options.failure_policy, FailurePolicy::Continue);
	assert_eq!(
		options.hyperparameters[&ModelType::RandomForest].n_estimators,
		Some(10)
	);
	let (metric, model_types) = options.resolve(TaskType::Classification).unwrap();
	assert_eq!(metric, ComparisonMetric::F1);
	assert_eq!(
		model_types,
		vec![ModelType::RandomForest, ModelType::LogisticRegression]
	);
	assert!(matches!(
		options.resolve(TaskType::Regression),
		Err(Error::Config(_))
	));
}

#[test]
fn test_config_defaults() {
	let config = Config::from_yaml("shuffle: false").unwrap();
	let options = config.train_options();
	assert_eq!(options.prepare.shuffle_seed, None);
	assert_eq!(config.classification_max_unique_values(), 20);
	let (metric, model_types) = options.resolve(TaskType::Regression).unwrap();
	assert_eq!(metric, ComparisonMetric::R2);
	assert_eq!(model_types.len(), 4);
	assert!(Config::from_yaml("unknown_field: 1").is_err());
	let options = TrainOptions {
		concurrency: Concurrency::Parallel { max_workers: 0 },
		..Default::default()
	};
	assert!(options.resolve(TaskType::Regression).is_err());
}
