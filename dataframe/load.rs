use super::*;
use std::path::Path;

#[derive(Clone)]
pub struct FromCsvOptions<'a> {
	/// Cells equal to one of these strings are loaded as `Value::Null`.
	pub invalid_values: &'a [&'a str],
}

impl<'a> Default for FromCsvOptions<'a> {
	fn default() -> Self {
		Self {
			invalid_values: DEFAULT_INVALID_VALUES,
		}
	}
}

/// These values are the default values that are considered invalid.
pub const DEFAULT_INVALID_VALUES: &[&str] = &[
	"", "null", "NULL", "n/a", "N/A", "nan", "-nan", "NaN", "-NaN", "?",
];

impl DataFrame {
	pub fn from_path(
		path: &Path,
		options: FromCsvOptions,
		progress: impl Fn(u64),
	) -> Result<Self, DataFrameError> {
		let mut reader = csv::ReaderBuilder::new()
			.trim(csv::Trim::All)
			.from_path(path)?;
		Self::from_csv(&mut reader, options, progress)
	}

	/// Load a dataframe from a csv reader. `progress` is called with the byte offset of each record as it is read.
	pub fn from_csv<R>(
		reader: &mut csv::Reader<R>,
		options: FromCsvOptions,
		progress: impl Fn(u64),
	) -> Result<Self, DataFrameError>
	where
		R: std::io::Read,
	{
		let column_names: Vec<String> = reader
			.headers()?
			.into_iter()
			.map(|column_name| column_name.to_owned())
			.collect();
		let mut columns: Vec<Column> = column_names
			.into_iter()
			.map(|name| Column::new(name, Vec::new()))
			.collect();
		// Read each csv record and insert the values into the columns of the dataframe.
		let mut record = csv::ByteRecord::new();
		let mut row = 0;
		while reader.read_byte_record(&mut record)? {
			if let Some(position) = record.position() {
				progress(position.byte());
			}
			if record.len() != columns.len() {
				return Err(DataFrameError::RowLength {
					row,
					expected: columns.len(),
					actual: record.len(),
				});
			}
			for (column, value) in columns.iter_mut().zip(record.iter()) {
				column.data.push(parse_value(value, options.invalid_values));
			}
			row += 1;
		}
		Self::from_columns(columns)
	}
}

fn parse_value(value: &[u8], invalid_values: &[&str]) -> Value {
	let text = String::from_utf8_lossy(value);
	if invalid_values.iter().any(|invalid| *invalid == text) {
		return Value::Null;
	}
	match lexical::parse::<f32, &[u8]>(value) {
		Ok(number) if number.is_finite() => Value::Number(number),
		_ => Value::Text(text.into_owned()),
	}
}

#[test]
fn test_from_csv() {
	let csv = "age,income,grade\n31,52000,A\n?,48000.5,B\n27,n/a,\n45,61000,C\n";
	let mut reader = csv::Reader::from_reader(csv.as_bytes());
	let dataframe = DataFrame::from_csv(&mut reader, FromCsvOptions::default(), |_| {}).unwrap();
	assert_eq!(dataframe.column_names(), vec!["age", "income", "grade"]);
	assert_eq!(dataframe.nrows(), 4);
	assert_eq!(dataframe.null_count(), 3);
	insta::assert_debug_snapshot!(dataframe.column("income").unwrap().data, @r###"
 [
     Number(
         52000.0,
     ),
     Number(
         48000.5,
     ),
     Null,
     Number(
         61000.0,
     ),
 ]
 "###);
	assert!(dataframe.column("grade").unwrap().is_categorical());
}

#[test]
fn test_from_csv_ragged() {
	let csv = "a,b\n1,2\n3\n";
	let mut reader = csv::ReaderBuilder::new()
		.flexible(true)
		.from_reader(csv.as_bytes());
	let result = DataFrame::from_csv(&mut reader, FromCsvOptions::default(), |_| {});
	assert!(matches!(result, Err(DataFrameError::RowLength { row: 1, .. })));
}
