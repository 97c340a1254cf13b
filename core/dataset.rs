/*!
This module defines the `Dataset` record and [`ingest`](fn.ingest.html), which summarizes an uploaded dataframe and stores it in a repository.
*/

use crate::{
	preprocess::PreprocessingSummary,
	repository::Repository,
	task::{default_target_column, TaskDetector, TaskType, DEFAULT_CLASSIFICATION_MAX_UNIQUE_VALUES},
	Error, Result,
};
use automl_dataframe::DataFrame;
use automl_util::id::Id;
use chrono::{DateTime, Utc};
use num_traits::ToPrimitive;
use tracing::info;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
	pub id: Id,
	pub name: String,
	pub row_count: usize,
	pub column_count: usize,
	pub task_type: TaskType,
	pub target_column: String,
	pub missing_values: usize,
	pub data_quality: DataQuality,
	pub preprocessed: bool,
	pub preprocessing_summary: Option<PreprocessingSummary>,
	pub created_at: DateTime<Utc>,
}

/// A coarse grade of how complete a dataset is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
	Excellent,
	Good,
	Fair,
	Poor,
}

impl DataQuality {
	/// Grade a dataset by the percentage of its cells that are not null. A dataset with no cells is complete.
	pub fn from_counts(n_cells: usize, n_missing: usize) -> Self {
		let completeness = if n_cells == 0 {
			100.0
		} else {
			100.0 * (1.0 - n_missing.to_f64().unwrap() / n_cells.to_f64().unwrap())
		};
		if completeness > 95.0 {
			DataQuality::Excellent
		} else if completeness > 85.0 {
			DataQuality::Good
		} else if completeness > 70.0 {
			DataQuality::Fair
		} else {
			DataQuality::Poor
		}
	}
}

#[derive(Clone, Debug, Default)]
pub struct DatasetUpdate {
	pub name: Option<String>,
	pub preprocessed: Option<bool>,
	pub preprocessing_summary: Option<PreprocessingSummary>,
}

#[derive(Clone, Debug)]
pub struct IngestOptions {
	/// The column to predict. If this is `None`, the last column is used.
	pub target_column: Option<String>,
	pub classification_max_unique_values: usize,
}

impl Default for IngestOptions {
	fn default() -> Self {
		Self {
			target_column: None,
			classification_max_unique_values: DEFAULT_CLASSIFICATION_MAX_UNIQUE_VALUES,
		}
	}
}

/// Summarize `dataframe`, detect its task, and store it in `repository`.
pub fn ingest(
	repository: &dyn Repository,
	name: &str,
	dataframe: DataFrame,
	options: &IngestOptions,
) -> Result<Dataset> {
	let detector = TaskDetector {
		classification_max_unique_values: options.classification_max_unique_values,
	};
	let (target_column, task_type) = match &options.target_column {
		Some(target_column) => {
			let column =
				dataframe
					.column(target_column)
					.ok_or_else(|| Error::TargetColumnNotFound {
						column: target_column.clone(),
						columns: dataframe
							.column_names()
							.into_iter()
							.map(ToOwned::to_owned)
							.collect(),
					})?;
			(target_column.clone(), detector.detect_column(column))
		}
		None => {
			let target_column = default_target_column(&dataframe)
				.map(ToOwned::to_owned)
				.unwrap_or_default();
			(target_column, detector.detect(&dataframe))
		}
	};
	let row_count = dataframe.nrows();
	let column_count = dataframe.ncols();
	let missing_values = dataframe.null_count();
	let dataset = Dataset {
		id: Id::new(),
		name: name.to_owned(),
		row_count,
		column_count,
		task_type,
		target_column,
		missing_values,
		data_quality: DataQuality::from_counts(row_count * column_count, missing_values),
		preprocessed: false,
		preprocessing_summary: None,
		created_at: Utc::now(),
	};
	repository.create_dataset(dataset.clone(), dataframe)?;
	info!(
		dataset_id = %dataset.id,
		rows = row_count,
		columns = column_count,
		task = %task_type,
		target = %dataset.target_column,
		"ingested dataset"
	);
	Ok(dataset)
}

#[test]
fn test_data_quality() {
	assert_eq!(DataQuality::from_counts(0, 0), DataQuality::Excellent);
	assert_eq!(DataQuality::from_counts(100, 5), DataQuality::Good);
	assert_eq!(DataQuality::from_counts(100, 4), DataQuality::Excellent);
	assert_eq!(DataQuality::from_counts(100, 20), DataQuality::Fair);
	assert_eq!(DataQuality::from_counts(100, 30), DataQuality::Poor);
}

#[test]
fn test_ingest() {
	use crate::repository::MemoryRepository;
	use automl_dataframe::Value;
	let rows = (0..30)
		.map(|i| {
			vec![
				if i == 0 { Value::Null } else { Value::Number(i as f32) },
				Value::Number(i as f32 * 1.5),
				Value::from(if i % 3 == 0 { "yes" } else { "no" }),
			]
		})
		.collect();
	let dataframe = DataFrame::from_rows(
		vec!["age".to_owned(), "income".to_owned(), "default".to_owned()],
		rows,
	)
	.unwrap();
	let repository = MemoryRepository::new();
	let dataset = ingest(&repository, "loans", dataframe.clone(), &IngestOptions::default()).unwrap();
	assert_eq!(dataset.row_count, 30);
	assert_eq!(dataset.column_count, 3);
	assert_eq!(dataset.missing_values, 1);
	assert_eq!(dataset.target_column, "default");
	assert_eq!(dataset.task_type, TaskType::Classification);
	assert_eq!(repository.get_dataset(dataset.id), Some(dataset.clone()));

	let options = IngestOptions {
		target_column: Some("income".to_owned()),
		..Default::default()
	};
	let dataset = ingest(&repository, "loans", dataframe.clone(), &options).unwrap();
	assert_eq!(dataset.target_column, "income");
	assert_eq!(dataset.task_type, TaskType::Regression);

	let options = IngestOptions {
		target_column: Some("missing".to_owned()),
		..Default::default()
	};
	let error = ingest(&repository, "loans", dataframe, &options).unwrap_err();
	assert!(matches!(error, Error::TargetColumnNotFound { .. }));
	assert_eq!(repository.list_datasets().len(), 2);
}
