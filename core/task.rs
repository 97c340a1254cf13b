use automl_dataframe::{Column, DataFrame, Value};
use automl_util::finite::Finite;
use std::collections::HashSet;

/// A target column with fewer distinct values than this is treated as a class label.
pub const DEFAULT_CLASSIFICATION_MAX_UNIQUE_VALUES: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
	Classification,
	Regression,
}

impl std::fmt::Display for TaskType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			TaskType::Classification => write!(f, "classification"),
			TaskType::Regression => write!(f, "regression"),
		}
	}
}

/// The target column when none is given is the last column.
pub fn default_target_column(dataframe: &DataFrame) -> Option<&str> {
	dataframe.last_column().map(|column| column.name.as_str())
}

/// The `TaskDetector` infers whether a target column should be predicted by a classifier or a regressor.
#[derive(Clone, Debug)]
pub struct TaskDetector {
	pub classification_max_unique_values: usize,
}

impl Default for TaskDetector {
	fn default() -> Self {
		Self {
			classification_max_unique_values: DEFAULT_CLASSIFICATION_MAX_UNIQUE_VALUES,
		}
	}
}

impl TaskDetector {
	/// Detect the task for a dataframe whose target is its last column. A dataframe with no columns or no rows is classification.
	pub fn detect(&self, dataframe: &DataFrame) -> TaskType {
		match dataframe.last_column() {
			Some(column) => self.detect_column(column),
			None => TaskType::Classification,
		}
	}

	pub fn detect_column(&self, column: &Column) -> TaskType {
		let mut unique_values = HashSet::new();
		for value in column.data.iter() {
			match value {
				Value::Null => continue,
				Value::Text(_) => return TaskType::Classification,
				Value::Number(value) => {
					if let Ok(value) = Finite::new(*value) {
						unique_values.insert(value);
					}
				}
			}
		}
		if unique_values.len() < self.classification_max_unique_values {
			TaskType::Classification
		} else {
			TaskType::Regression
		}
	}
}

#[cfg(test)]
fn column(values: Vec<Value>) -> Column {
	Column::new("target", values)
}

#[test]
fn test_detect_regression() {
	let detector = TaskDetector::default();
	let values = (0..150).map(|i| Value::Number(i as f32 * 0.37)).collect();
	assert_eq!(detector.detect_column(&column(values)), TaskType::Regression);
	let values = (0..20).map(|i| Value::Number(i as f32)).collect();
	assert_eq!(detector.detect_column(&column(values)), TaskType::Regression);
}

#[test]
fn test_detect_classification() {
	let detector = TaskDetector::default();
	let values = (0..19).map(|i| Value::Number(i as f32)).collect();
	assert_eq!(
		detector.detect_column(&column(values)),
		TaskType::Classification
	);
	let mut values: Vec<Value> = (0..150).map(|i| Value::Number(i as f32)).collect();
	values.push(Value::from("unknown"));
	assert_eq!(
		detector.detect_column(&column(values)),
		TaskType::Classification
	);
	assert_eq!(
		detector.detect_column(&column(vec![Value::Null; 30])),
		TaskType::Classification
	);
}

#[test]
fn test_detect_empty() {
	let detector = TaskDetector::default();
	assert_eq!(
		detector.detect(&DataFrame::default()),
		TaskType::Classification
	);
	let dataframe = DataFrame::from_rows(vec!["a".to_owned(), "b".to_owned()], vec![]).unwrap();
	assert_eq!(detector.detect(&dataframe), TaskType::Classification);
}

#[test]
fn test_detect_uses_last_column() {
	let rows = (0..50)
		.map(|i| vec![Value::Number(i as f32), Value::from(if i % 2 == 0 { "a" } else { "b" })])
		.collect();
	let dataframe = DataFrame::from_rows(vec!["x".to_owned(), "y".to_owned()], rows).unwrap();
	assert_eq!(
		TaskDetector::default().detect(&dataframe),
		TaskType::Classification
	);
}
