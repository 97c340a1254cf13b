use crate::model::ModelType;
use automl_dataframe::DataFrameError;
use automl_util::id::Id;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
	#[error("dataset {0} not found")]
	DatasetNotFound(Id),
	#[error("training job {0} not found")]
	JobNotFound(Id),
	#[error("did not find target column \"{column}\" among column names \"{}\"", .columns.join(", "))]
	TargetColumnNotFound { column: String, columns: Vec<String> },
	#[error(transparent)]
	Training(#[from] TrainingError),
	#[error(transparent)]
	Repository(#[from] RepositoryError),
	#[error("visualization error: {0}")]
	Visualization(String),
	#[error("no model completed training")]
	NoCompletedModels,
	#[error("invalid configuration: {0}")]
	Config(String),
	#[error(transparent)]
	DataFrame(#[from] DataFrameError),
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
}

/// A `TrainingError` is raised when a candidate model cannot be fit. `model_type` is `None` when the prepared data is invalid for every model type.
#[derive(Debug, Error)]
pub struct TrainingError {
	pub model_type: Option<ModelType>,
	pub cause: TrainingErrorCause,
}

impl std::fmt::Display for TrainingError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.model_type {
			Some(model_type) => write!(f, "failed to train {}: {}", model_type, self.cause),
			None => write!(f, "failed to prepare training data: {}", self.cause),
		}
	}
}

#[derive(Debug, Error)]
pub enum TrainingErrorCause {
	#[error("invalid data: {0}")]
	InvalidData(String),
	#[error("did not converge: {0}")]
	DidNotConverge(String),
}

impl TrainingError {
	pub fn invalid_data(model_type: Option<ModelType>, message: impl Into<String>) -> Self {
		Self {
			model_type,
			cause: TrainingErrorCause::InvalidData(message.into()),
		}
	}

	pub fn did_not_converge(model_type: ModelType, message: impl Into<String>) -> Self {
		Self {
			model_type: Some(model_type),
			cause: TrainingErrorCause::DidNotConverge(message.into()),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
	Dataset,
	Model,
	TrainingJob,
	Visualization,
}

impl std::fmt::Display for RecordKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			RecordKind::Dataset => "dataset",
			RecordKind::Model => "model",
			RecordKind::TrainingJob => "training job",
			RecordKind::Visualization => "visualization",
		};
		write!(f, "{}", s)
	}
}

#[derive(Debug, Error, PartialEq)]
pub enum RepositoryError {
	#[error("{kind} {id} not found")]
	NotFound { kind: RecordKind, id: Id },
	#[error("{kind} {id} already exists")]
	AlreadyExists { kind: RecordKind, id: Id },
}

#[test]
fn test_display() {
	let error = Error::TargetColumnNotFound {
		column: "label".to_owned(),
		columns: vec!["a".to_owned(), "b".to_owned()],
	};
	assert_eq!(
		error.to_string(),
		"did not find target column \"label\" among column names \"a, b\""
	);
	let error = Error::from(TrainingError::did_not_converge(
		ModelType::LinearRegression,
		"non-finite predictions",
	));
	assert_eq!(
		error.to_string(),
		"failed to train linear_regression: did not converge: non-finite predictions"
	);
}
