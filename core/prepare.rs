use crate::{error::TrainingError, task::TaskType};
use automl_dataframe::{DataFrame, Value};
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use rand::{seq::SliceRandom, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use std::collections::BTreeSet;
use tracing::warn;

/// The data every candidate model in a job is trained and evaluated on.
#[derive(Clone, Debug)]
pub struct PreparedData {
	pub task: TaskType,
	pub target_column: String,
	pub feature_names: Vec<String>,
	/// The class names of a classification task, sorted. Labels are indexes into this list. Empty for regression.
	pub classes: Vec<String>,
	pub train: Split,
	pub test: Split,
}

#[derive(Clone, Debug)]
pub struct Split {
	pub features: Array2<f32>,
	pub labels: Labels,
}

#[derive(Clone, Debug)]
pub enum Labels {
	Classification(Array1<usize>),
	Regression(Array1<f32>),
}

impl Labels {
	pub fn len(&self) -> usize {
		match self {
			Labels::Classification(labels) => labels.len(),
			Labels::Regression(labels) => labels.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl PreparedData {
	pub fn n_classes(&self) -> usize {
		self.classes.len()
	}
}

#[derive(Clone, Debug)]
pub struct PrepareOptions {
	pub test_fraction: f32,
	/// Shuffle the rows with this seed before splitting. If this is `None`, rows keep their order.
	pub shuffle_seed: Option<u64>,
}

impl Default for PrepareOptions {
	fn default() -> Self {
		Self {
			test_fraction: 0.2,
			shuffle_seed: Some(42),
		}
	}
}

/// Split a preprocessed dataframe into train and test feature matrices and labels.
pub fn prepare(
	dataframe: &DataFrame,
	target_column: &str,
	task: TaskType,
	options: &PrepareOptions,
) -> Result<PreparedData, TrainingError> {
	let target = dataframe.column(target_column).ok_or_else(|| {
		TrainingError::invalid_data(None, format!("missing target column \"{}\"", target_column))
	})?;
	let feature_columns: Vec<_> = dataframe
		.columns
		.iter()
		.filter(|column| column.name != target_column)
		.collect();
	if feature_columns.is_empty() {
		return Err(TrainingError::invalid_data(None, "there are no feature columns"));
	}

	let mut row_indexes: Vec<usize> = (0..dataframe.nrows())
		.filter(|index| !target.data[*index].is_null())
		.collect();
	let n_dropped = dataframe.nrows() - row_indexes.len();
	if n_dropped > 0 {
		warn!(n_dropped, "dropped rows with a missing target");
	}
	if row_indexes.is_empty() {
		return Err(TrainingError::invalid_data(None, "there are no rows with a target value"));
	}
	if let Some(seed) = options.shuffle_seed {
		let mut rng = Xoshiro256Plus::seed_from_u64(seed);
		row_indexes.shuffle(&mut rng);
	}

	let mut features = Array2::zeros((row_indexes.len(), feature_columns.len()));
	for (feature_index, column) in feature_columns.iter().enumerate() {
		for (row, row_index) in row_indexes.iter().enumerate() {
			match &column.data[*row_index] {
				Value::Number(value) if value.is_finite() => {
					features[(row, feature_index)] = *value;
				}
				value => {
					return Err(TrainingError::invalid_data(
						None,
						format!(
							"feature column \"{}\" has the non numeric value \"{}\"",
							column.name, value
						),
					))
				}
			}
		}
	}

	let (classes, labels) = match task {
		TaskType::Classification => {
			let names: Vec<String> = row_indexes
				.iter()
				.map(|index| target.data[*index].to_string())
				.collect();
			let classes: Vec<String> = names
				.iter()
				.cloned()
				.collect::<BTreeSet<_>>()
				.into_iter()
				.collect();
			let labels = names
				.iter()
				.map(|name| classes.binary_search(name).unwrap_or(0))
				.collect::<Array1<usize>>();
			(classes, Labels::Classification(labels))
		}
		TaskType::Regression => {
			let labels = row_indexes
				.iter()
				.map(|index| match &target.data[*index] {
					Value::Number(value) => Ok(*value),
					value => Err(TrainingError::invalid_data(
						None,
						format!("the regression target has the non numeric value \"{}\"", value),
					)),
				})
				.collect::<Result<Array1<f32>, _>>()?;
			(Vec::new(), Labels::Regression(labels))
		}
	};

	let n_examples = row_indexes.len();
	let n_train = ((1.0 - options.test_fraction) * n_examples.to_f32().unwrap())
		.to_usize()
		.unwrap()
		.max(1)
		.min(n_examples);
	let train = Split {
		features: features.slice(s![..n_train, ..]).to_owned(),
		labels: slice_labels(&labels, 0, n_train),
	};
	let test = if n_train == n_examples {
		train.clone()
	} else {
		Split {
			features: features.slice(s![n_train.., ..]).to_owned(),
			labels: slice_labels(&labels, n_train, n_examples),
		}
	};
	Ok(PreparedData {
		task,
		target_column: target_column.to_owned(),
		feature_names: feature_columns
			.iter()
			.map(|column| column.name.clone())
			.collect(),
		classes,
		train,
		test,
	})
}

fn slice_labels(labels: &Labels, start: usize, end: usize) -> Labels {
	match labels {
		Labels::Classification(labels) => {
			Labels::Classification(labels.slice(s![start..end]).to_owned())
		}
		Labels::Regression(labels) => Labels::Regression(labels.slice(s![start..end]).to_owned()),
	}
}

#[cfg(test)]
fn test_dataframe(n: usize) -> DataFrame {
	let rows = (0..n)
		.map(|i| {
			vec![
				Value::Number(i as f32),
				if i == 3 {
					Value::Null
				} else {
					Value::from(if i % 2 == 0 { "even" } else { "odd" })
				},
			]
		})
		.collect();
	DataFrame::from_rows(vec!["x".to_owned(), "parity".to_owned()], rows).unwrap()
}

#[test]
fn test_prepare_classification() {
	let data = prepare(
		&test_dataframe(11),
		"parity",
		TaskType::Classification,
		&PrepareOptions::default(),
	)
	.unwrap();
	assert_eq!(data.classes, vec!["even", "odd"]);
	assert_eq!(data.feature_names, vec!["x"]);
	assert_eq!(data.train.labels.len(), 8);
	assert_eq!(data.test.labels.len(), 2);
	let (features, labels) = match (&data.train.features, &data.train.labels) {
		(features, Labels::Classification(labels)) => (features, labels),
		_ => unreachable!(),
	};
	for (x, label) in features.column(0).iter().zip(labels.iter()) {
		assert_eq!((*x as usize) % 2, *label);
		assert_ne!(*x, 3.0);
	}
}

#[test]
fn test_prepare_without_shuffle() {
	let options = PrepareOptions {
		test_fraction: 0.0,
		shuffle_seed: None,
	};
	let data = prepare(&test_dataframe(5), "x", TaskType::Regression, &options);
	// "parity" is text so it cannot be a feature.
	assert!(data.is_err());
	let dataframe = DataFrame::from_rows(
		vec!["a".to_owned(), "b".to_owned()],
		(0..5)
			.map(|i| vec![Value::Number(i as f32), Value::Number(2.0 * i as f32)])
			.collect(),
	)
	.unwrap();
	let data = prepare(&dataframe, "b", TaskType::Regression, &options).unwrap();
	assert_eq!(data.train.features.column(0).to_vec(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
	assert_eq!(data.test.labels.len(), 5);
	match data.test.labels {
		Labels::Regression(labels) => assert_eq!(labels.to_vec(), vec![0.0, 2.0, 4.0, 6.0, 8.0]),
		_ => unreachable!(),
	}
}

#[test]
fn test_prepare_empty() {
	let dataframe = DataFrame::from_rows(vec!["a".to_owned(), "b".to_owned()], vec![]).unwrap();
	let error = prepare(
		&dataframe,
		"b",
		TaskType::Classification,
		&PrepareOptions::default(),
	)
	.unwrap_err();
	assert_eq!(
		error.to_string(),
		"failed to prepare training data: invalid data: there are no rows with a target value"
	);
}
