/*!
This module defines the [`Preprocessor`](trait.Preprocessor.html) trait and the default [`StandardPreprocessor`](struct.StandardPreprocessor.html), which turns a raw dataframe into one where every feature column is a finite number.
*/

use crate::Result;
use automl_dataframe::{Column, DataFrame, Value};
use automl_metrics::{MeanVariance, Metric, Mode, StreamingMetric};
use num_traits::ToPrimitive;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

pub trait Preprocessor: Send + Sync {
	/// Produce a new dataframe from `dataframe` with the same rows in the same order. `target_column` is passed through unchanged.
	fn preprocess(
		&self,
		dataframe: &DataFrame,
		target_column: &str,
	) -> Result<(DataFrame, PreprocessingSummary)>;
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessingSummary {
	/// (rows, columns) of the input.
	pub original_shape: (usize, usize),
	pub final_shape: (usize, usize),
	pub missing_values_handled: usize,
	pub engineered_features: Vec<String>,
	pub encoded_columns: Vec<String>,
	pub scaled_columns: Vec<String>,
}

/**
The `StandardPreprocessor` imputes missing values, adds engineered credit features when their source columns are present, label encodes categorical columns, and standard scales numeric columns.
*/
#[derive(Clone, Debug, Default)]
pub struct StandardPreprocessor;

#[derive(Clone, Copy, Debug, PartialEq)]
enum ColumnKind {
	Target,
	Number,
	Enum,
}

struct ImputedColumn {
	column: Column,
	kind: ColumnKind,
	n_filled: usize,
}

impl Preprocessor for StandardPreprocessor {
	fn preprocess(
		&self,
		dataframe: &DataFrame,
		target_column: &str,
	) -> Result<(DataFrame, PreprocessingSummary)> {
		let original_shape = (dataframe.nrows(), dataframe.ncols());

		let mut columns: Vec<ImputedColumn> = dataframe
			.columns
			.par_iter()
			.map(|column| {
				if column.name == target_column {
					ImputedColumn {
						column: column.clone(),
						kind: ColumnKind::Target,
						n_filled: 0,
					}
				} else {
					impute_column(column)
				}
			})
			.collect();
		let missing_values_handled = columns.iter().map(|column| column.n_filled).sum();

		let engineered = engineer_features(&columns);
		let engineered_features: Vec<String> = engineered
			.iter()
			.map(|column| column.name.clone())
			.collect();
		let target_index = columns
			.iter()
			.position(|column| column.kind == ColumnKind::Target)
			.unwrap_or_else(|| columns.len());
		for (offset, column) in engineered.into_iter().enumerate() {
			columns.insert(
				target_index + offset,
				ImputedColumn {
					column,
					kind: ColumnKind::Number,
					n_filled: 0,
				},
			);
		}

		let encoded_columns = columns
			.iter()
			.filter(|column| column.kind == ColumnKind::Enum)
			.map(|column| column.column.name.clone())
			.collect();
		let scaled_columns = columns
			.iter()
			.filter(|column| column.kind == ColumnKind::Number)
			.map(|column| column.column.name.clone())
			.collect();
		let columns: Vec<Column> = columns
			.into_par_iter()
			.map(|column| match column.kind {
				ColumnKind::Target => column.column,
				ColumnKind::Number => scale_column(column.column),
				ColumnKind::Enum => encode_column(column.column),
			})
			.collect();
		let output = DataFrame::from_columns(columns)?;

		let summary = PreprocessingSummary {
			original_shape,
			final_shape: (output.nrows(), output.ncols()),
			missing_values_handled,
			engineered_features,
			encoded_columns,
			scaled_columns,
		};
		debug!(
			missing_values_handled = summary.missing_values_handled,
			engineered = summary.engineered_features.len(),
			encoded = summary.encoded_columns.len(),
			scaled = summary.scaled_columns.len(),
			"preprocessed dataframe"
		);
		Ok((output, summary))
	}
}

fn impute_column(column: &Column) -> ImputedColumn {
	let n_filled = column.null_count();
	if column.is_numeric() {
		let fill = if n_filled == 0 {
			0.0
		} else {
			let mut mean_variance = MeanVariance::new();
			column.numbers().flatten().for_each(|value| mean_variance.update(value));
			mean_variance.finalize().map(|output| output.mean).unwrap_or(0.0)
		};
		let data = column
			.data
			.iter()
			.map(|value| match value {
				Value::Null => Value::Number(fill),
				value => value.clone(),
			})
			.collect();
		ImputedColumn {
			column: Column::new(column.name.clone(), data),
			kind: ColumnKind::Number,
			n_filled,
		}
	} else {
		let strings: Vec<String> = column
			.data
			.iter()
			.filter(|value| !value.is_null())
			.map(|value| value.to_string())
			.collect();
		let strings: Vec<&str> = strings.iter().map(|value| value.as_str()).collect();
		let fill = Mode::compute(strings.as_slice()).unwrap_or_default().to_owned();
		let data = column
			.data
			.iter()
			.map(|value| match value {
				Value::Null => Value::Text(fill.clone()),
				value => value.clone(),
			})
			.collect();
		ImputedColumn {
			column: Column::new(column.name.clone(), data),
			kind: ColumnKind::Enum,
			n_filled,
		}
	}
}

fn engineer_features(columns: &[ImputedColumn]) -> Vec<Column> {
	let number_column = |name: &str| -> Option<Vec<f32>> {
		columns
			.iter()
			.find(|column| column.kind == ColumnKind::Number && column.column.name == name)
			.map(|column| column.column.numbers().map(|value| value.unwrap_or(0.0)).collect())
	};
	let ratio = |name: &str, numerator: &str, denominator: &str| -> Option<Column> {
		let numerator = number_column(numerator)?;
		let denominator = number_column(denominator)?;
		let data = numerator
			.iter()
			.zip(denominator.iter())
			.map(|(numerator, denominator)| Value::Number(safe_divide(*numerator, *denominator)))
			.collect();
		Some(Column::new(name, data))
	};
	let mut engineered = Vec::new();
	engineered.extend(ratio("debt_to_income_ratio", "debt_payments", "income"));
	engineered.extend(ratio("credit_utilization_rate", "credit_used", "credit_limit"));
	let payment_delays: Vec<Vec<f32>> = columns
		.iter()
		.filter(|column| {
			column.kind == ColumnKind::Number
				&& column.column.name.to_lowercase().contains("payment_delay")
		})
		.map(|column| column.column.numbers().map(|value| value.unwrap_or(0.0)).collect())
		.collect();
	if !payment_delays.is_empty() {
		let n_rows = payment_delays[0].len();
		let n_columns = payment_delays.len().to_f32().unwrap();
		let data = (0..n_rows)
			.map(|row| {
				let sum: f32 = payment_delays.iter().map(|column| column[row]).sum();
				Value::Number(sum / n_columns)
			})
			.collect();
		engineered.push(Column::new("avg_payment_delays", data));
	}
	// Never shadow a column that was already in the input.
	engineered.retain(|engineered| {
		!columns
			.iter()
			.any(|column| column.column.name == engineered.name)
	});
	engineered
}

fn safe_divide(numerator: f32, denominator: f32) -> f32 {
	if denominator == 0.0 {
		0.0
	} else {
		numerator / denominator
	}
}

fn scale_column(column: Column) -> Column {
	let mut mean_variance = MeanVariance::new();
	column.numbers().flatten().for_each(|value| mean_variance.update(value));
	let (mean, std) = match mean_variance.finalize() {
		Some(output) => (output.mean, output.variance.sqrt()),
		None => (0.0, 0.0),
	};
	let data = column
		.numbers()
		.map(|value| {
			let value = value.unwrap_or(mean);
			if std == 0.0 || !std.is_finite() {
				Value::Number(0.0)
			} else {
				Value::Number((value - mean) / std)
			}
		})
		.collect();
	Column::new(column.name, data)
}

fn encode_column(column: Column) -> Column {
	let mut categories: BTreeMap<String, usize> = column
		.data
		.iter()
		.map(|value| (value.to_string(), 0))
		.collect();
	for (index, code) in categories.values_mut().enumerate() {
		*code = index;
	}
	let data = column
		.data
		.iter()
		.map(|value| Value::Number(categories[&value.to_string()].to_f32().unwrap()))
		.collect();
	Column::new(column.name, data)
}

#[cfg(test)]
fn test_dataframe() -> DataFrame {
	DataFrame::from_rows(
		vec![
			"income".to_owned(),
			"debt_payments".to_owned(),
			"home".to_owned(),
			"payment_delay_1".to_owned(),
			"payment_delay_2".to_owned(),
			"default".to_owned(),
		],
		vec![
			vec![Value::Number(1000.0), Value::Number(100.0), "rent".into(), Value::Number(0.0), Value::Number(2.0), "no".into()],
			vec![Value::Null, Value::Number(300.0), "own".into(), Value::Number(1.0), Value::Number(3.0), "yes".into()],
			vec![Value::Number(3000.0), Value::Number(0.0), Value::Null, Value::Number(4.0), Value::Null, Value::Null],
			vec![Value::Number(0.0), Value::Number(50.0), "rent".into(), Value::Number(1.0), Value::Number(1.0), "no".into()],
		],
	)
	.unwrap()
}

#[test]
fn test_standard_preprocessor() {
	let input = test_dataframe();
	let (output, summary) = StandardPreprocessor.preprocess(&input, "default").unwrap();
	assert_eq!(input, test_dataframe());
	assert_eq!(summary.original_shape, (4, 6));
	assert_eq!(summary.final_shape, (4, 8));
	assert_eq!(summary.missing_values_handled, 3);
	assert_eq!(
		summary.engineered_features,
		vec!["debt_to_income_ratio", "avg_payment_delays"]
	);
	assert_eq!(summary.encoded_columns, vec!["home"]);
	assert_eq!(
		summary.scaled_columns,
		vec![
			"income",
			"debt_payments",
			"payment_delay_1",
			"payment_delay_2",
			"debt_to_income_ratio",
			"avg_payment_delays"
		]
	);
	assert_eq!(
		output.column_names(),
		vec![
			"income",
			"debt_payments",
			"home",
			"payment_delay_1",
			"payment_delay_2",
			"debt_to_income_ratio",
			"avg_payment_delays",
			"default"
		]
	);
	// The target passes through untouched, nulls included.
	assert_eq!(output.column("default"), input.column("default"));
	// The missing "home" is filled with the mode, "rent", which encodes after "own".
	let home: Vec<Option<f32>> = output.column("home").unwrap().numbers().collect();
	assert_eq!(home, vec![Some(1.0), Some(0.0), Some(1.0), Some(1.0)]);
}

#[test]
fn test_scaling() {
	let (output, _) = StandardPreprocessor.preprocess(&test_dataframe(), "default").unwrap();
	for name in &["income", "debt_payments", "avg_payment_delays"] {
		let values: Vec<f32> = output.column(name).unwrap().numbers().flatten().collect();
		assert_eq!(values.len(), 4);
		let mean = values.iter().sum::<f32>() / 4.0;
		let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / 4.0;
		assert!(mean.abs() < 1e-5);
		assert!((variance - 1.0).abs() < 1e-4);
	}
	let constant = DataFrame::from_rows(
		vec!["x".to_owned(), "y".to_owned()],
		vec![
			vec![Value::Number(5.0), Value::Number(1.0)],
			vec![Value::Number(5.0), Value::Number(2.0)],
		],
	)
	.unwrap();
	let (output, _) = StandardPreprocessor.preprocess(&constant, "y").unwrap();
	let x: Vec<Option<f32>> = output.column("x").unwrap().numbers().collect();
	assert_eq!(x, vec![Some(0.0), Some(0.0)]);
}

#[test]
fn test_safe_divide() {
	assert_eq!(safe_divide(5.0, 0.0), 0.0);
	assert_eq!(safe_divide(5.0, 2.0), 2.5);
}
