/*!
This crate provides a basic implementation of dataframes, which are two dimensional tables where each column has a name and each cell holds a [`Value`](enum.Value.html). Unlike a typed columnar store, a column may mix numbers, text and nulls, because raw uploaded data frequently does. Deciding what a column means is left to the code that consumes the dataframe.
*/

#![allow(clippy::tabs_in_doc_comments)]

use thiserror::Error;

mod load;

pub use self::load::*;

/// A single cell.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Value {
	Null,
	Number(f32),
	Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
	pub name: String,
	pub data: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataFrame {
	pub columns: Vec<Column>,
}

#[derive(Debug, Error)]
pub enum DataFrameError {
	#[error("row {row} has {actual} values but there are {expected} columns")]
	RowLength {
		row: usize,
		expected: usize,
		actual: usize,
	},
	#[error("column \"{column}\" has {actual} values but the other columns have {expected}")]
	ColumnLength {
		column: String,
		expected: usize,
		actual: usize,
	},
	#[error("duplicate column name \"{0}\"")]
	DuplicateColumn(String),
	#[error("csv error: {0}")]
	Csv(#[from] csv::Error),
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
}

impl Value {
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	pub fn as_number(&self) -> Option<f32> {
		match self {
			Value::Number(value) => Some(*value),
			_ => None,
		}
	}

	pub fn as_text(&self) -> Option<&str> {
		match self {
			Value::Text(value) => Some(value),
			_ => None,
		}
	}
}

impl std::fmt::Display for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::Null => Ok(()),
			Value::Number(value) => write!(f, "{}", value),
			Value::Text(value) => write!(f, "{}", value),
		}
	}
}

impl From<f32> for Value {
	fn from(value: f32) -> Self {
		if value.is_finite() {
			Value::Number(value)
		} else {
			Value::Null
		}
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::Text(value.to_owned())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::Text(value)
	}
}

impl<T> From<Option<T>> for Value
where
	T: Into<Value>,
{
	fn from(value: Option<T>) -> Self {
		value.map(Into::into).unwrap_or(Value::Null)
	}
}

impl Column {
	pub fn new(name: impl Into<String>, data: Vec<Value>) -> Self {
		Self {
			name: name.into(),
			data,
		}
	}

	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	pub fn null_count(&self) -> usize {
		self.data.iter().filter(|value| value.is_null()).count()
	}

	/// A column is numeric if every value that is not null is a number. A column of only nulls is numeric.
	pub fn is_numeric(&self) -> bool {
		self.data
			.iter()
			.all(|value| matches!(value, Value::Null | Value::Number(_)))
	}

	/// A column is categorical if it contains at least one text value.
	pub fn is_categorical(&self) -> bool {
		!self.is_numeric()
	}

	/// Iterate over the numbers in this column. Nulls and text values yield `None`.
	pub fn numbers(&self) -> impl Iterator<Item = Option<f32>> + '_ {
		self.data.iter().map(|value| value.as_number())
	}
}

impl DataFrame {
	/// Create a dataframe from columns, which must all have the same length and distinct names.
	pub fn from_columns(columns: Vec<Column>) -> Result<Self, DataFrameError> {
		let dataframe = Self { columns };
		dataframe.validate()?;
		Ok(dataframe)
	}

	/// Create a dataframe from a header and rows of values in header order.
	pub fn from_rows(
		column_names: Vec<String>,
		rows: Vec<Vec<Value>>,
	) -> Result<Self, DataFrameError> {
		let n_columns = column_names.len();
		let mut columns: Vec<Column> = column_names
			.into_iter()
			.map(|name| Column::new(name, Vec::with_capacity(rows.len())))
			.collect();
		for (row_index, row) in rows.into_iter().enumerate() {
			if row.len() != n_columns {
				return Err(DataFrameError::RowLength {
					row: row_index,
					expected: n_columns,
					actual: row.len(),
				});
			}
			for (column, value) in columns.iter_mut().zip(row.into_iter()) {
				column.data.push(value);
			}
		}
		Self::from_columns(columns)
	}

	fn validate(&self) -> Result<(), DataFrameError> {
		let expected = self.nrows();
		for (index, column) in self.columns.iter().enumerate() {
			if column.len() != expected {
				return Err(DataFrameError::ColumnLength {
					column: column.name.clone(),
					expected,
					actual: column.len(),
				});
			}
			if self.columns[..index]
				.iter()
				.any(|other| other.name == column.name)
			{
				return Err(DataFrameError::DuplicateColumn(column.name.clone()));
			}
		}
		Ok(())
	}

	pub fn ncols(&self) -> usize {
		self.columns.len()
	}

	pub fn nrows(&self) -> usize {
		self.columns.first().map(|column| column.len()).unwrap_or(0)
	}

	pub fn column_names(&self) -> Vec<&str> {
		self.columns
			.iter()
			.map(|column| column.name.as_str())
			.collect()
	}

	pub fn column_index(&self, name: &str) -> Option<usize> {
		self.columns.iter().position(|column| column.name == name)
	}

	pub fn column(&self, name: &str) -> Option<&Column> {
		self.columns.iter().find(|column| column.name == name)
	}

	pub fn last_column(&self) -> Option<&Column> {
		self.columns.last()
	}

	/// The total number of null cells across all columns.
	pub fn null_count(&self) -> usize {
		self.columns.iter().map(|column| column.null_count()).sum()
	}

	/// Insert a column at `index`, shifting the columns after it to the right.
	pub fn insert_column(&mut self, index: usize, column: Column) -> Result<(), DataFrameError> {
		if !self.columns.is_empty() && column.len() != self.nrows() {
			let actual = column.len();
			return Err(DataFrameError::ColumnLength {
				column: column.name,
				expected: self.nrows(),
				actual,
			});
		}
		if self.column_index(&column.name).is_some() {
			return Err(DataFrameError::DuplicateColumn(column.name));
		}
		let index = index.min(self.columns.len());
		self.columns.insert(index, column);
		Ok(())
	}

	/// Return the values of the row at `index` in column order.
	pub fn row(&self, index: usize) -> Option<Vec<&Value>> {
		if index >= self.nrows() {
			return None;
		}
		Some(self.columns.iter().map(|column| &column.data[index]).collect())
	}
}

#[test]
fn test_from_rows() {
	let dataframe = DataFrame::from_rows(
		vec!["a".to_owned(), "b".to_owned()],
		vec![
			vec![Value::Number(1.0), "x".into()],
			vec![Value::Null, "y".into()],
		],
	)
	.unwrap();
	assert_eq!(dataframe.nrows(), 2);
	assert_eq!(dataframe.ncols(), 2);
	assert_eq!(dataframe.null_count(), 1);
	assert!(dataframe.column("a").unwrap().is_numeric());
	assert!(dataframe.column("b").unwrap().is_categorical());
	assert_eq!(dataframe.last_column().unwrap().name, "b");
	assert_eq!(
		dataframe.row(1).unwrap(),
		vec![&Value::Null, &Value::Text("y".to_owned())]
	);
	assert!(dataframe.row(2).is_none());
}

#[test]
fn test_from_rows_errors() {
	let result = DataFrame::from_rows(
		vec!["a".to_owned(), "b".to_owned()],
		vec![vec![Value::Number(1.0)]],
	);
	assert!(matches!(
		result,
		Err(DataFrameError::RowLength {
			row: 0,
			expected: 2,
			actual: 1
		})
	));
	let result = DataFrame::from_rows(vec!["a".to_owned(), "a".to_owned()], vec![]);
	assert!(matches!(result, Err(DataFrameError::DuplicateColumn(_))));
}

#[test]
fn test_insert_column() {
	let mut dataframe = DataFrame::from_rows(
		vec!["a".to_owned(), "target".to_owned()],
		vec![vec![Value::Number(1.0), "x".into()]],
	)
	.unwrap();
	dataframe
		.insert_column(1, Column::new("b", vec![Value::Number(2.0)]))
		.unwrap();
	assert_eq!(dataframe.column_names(), vec!["a", "b", "target"]);
	match dataframe.insert_column(0, Column::new("c", vec![])) {
		Err(DataFrameError::ColumnLength {
			column,
			expected,
			actual,
		}) => {
			assert_eq!(column, "c");
			assert_eq!(expected, 1);
			assert_eq!(actual, 0);
		}
		_ => panic!("expected a column length error"),
	}
	assert!(matches!(
		dataframe.insert_column(0, Column::new("a", vec![Value::Null])),
		Err(DataFrameError::DuplicateColumn(_))
	));
	assert_eq!(dataframe.ncols(), 3);
}
