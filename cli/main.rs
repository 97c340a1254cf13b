//! This module contains the main entrypoint to the automl cli.

use anyhow::{Context, Result};
use automl_core::{
	config::Config,
	dataset::{ingest, IngestOptions},
	preprocess::{Preprocessor, StandardPreprocessor},
	repository::MemoryRepository,
	task::default_target_column,
};
use automl_dataframe::{DataFrame, FromCsvOptions};
use clap::Parser;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod train;

#[derive(Parser)]
#[clap(
	name = "automl",
	about = "Train, compare and pick the best machine learning model for a csv file.",
	disable_help_subcommand = true
)]
enum Options {
	#[clap(name = "detect")]
	Detect(DetectOptions),
	#[clap(name = "preprocess")]
	Preprocess(PreprocessOptions),
	#[clap(name = "train")]
	Train(TrainOptions),
}

#[derive(Parser, Debug)]
#[clap(about = "detect the prediction task of a csv file")]
struct DetectOptions {
	#[clap(short, long, help = "the path to your .csv file")]
	file: PathBuf,
	#[clap(short, long, help = "the name of the column to predict, defaults to the last column")]
	target: Option<String>,
	#[clap(short, long, help = "the path to a config file")]
	config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[clap(about = "preprocess a csv file and print a summary of the transformations")]
struct PreprocessOptions {
	#[clap(short, long, help = "the path to your .csv file")]
	file: PathBuf,
	#[clap(short, long, help = "the name of the column to predict, defaults to the last column")]
	target: Option<String>,
}

#[derive(Parser, Debug)]
#[clap(about = "train and compare models")]
#[clap(long_about = "train every candidate model for the task of a csv file and pick the best one")]
pub struct TrainOptions {
	#[clap(short, long, help = "the path to your .csv file")]
	pub file: PathBuf,
	#[clap(short, long, help = "the name of the column to predict, defaults to the last column")]
	pub target: Option<String>,
	#[clap(short, long, help = "the path to a config file")]
	pub config: Option<PathBuf>,
	#[clap(short, long, help = "the path to write a json report to")]
	pub output: Option<PathBuf>,
	#[clap(long = "no-progress", help = "do not print progress while training", parse(from_flag = std::ops::Not::not))]
	pub progress: bool,
}

fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("automl=info")),
		)
		.with_writer(std::io::stderr)
		.init();
	let options = Options::parse();
	let result = match options {
		Options::Detect(options) => cli_detect(options),
		Options::Preprocess(options) => cli_preprocess(options),
		Options::Train(options) => train::train(options),
	};
	if let Err(error) = result {
		eprintln!("{}: {:#}", "error".red().bold(), error);
		std::process::exit(1);
	}
}

fn cli_detect(options: DetectOptions) -> Result<()> {
	let config = load_config(options.config.as_deref())?;
	let dataframe = load_dataframe(&options.file)?;
	let ingest_options = ingest_options(options.target, &config);
	let repository = MemoryRepository::new();
	let dataset = ingest(&repository, &file_name(&options.file), dataframe, &ingest_options)?;
	println!("target column: {}", dataset.target_column.bold());
	println!("task type: {}", dataset.task_type.to_string().bold());
	println!(
		"rows: {}, columns: {}, missing values: {}",
		dataset.row_count, dataset.column_count, dataset.missing_values
	);
	Ok(())
}

fn cli_preprocess(options: PreprocessOptions) -> Result<()> {
	let dataframe = load_dataframe(&options.file)?;
	let target_column = match options.target {
		Some(target_column) => target_column,
		None => default_target_column(&dataframe)
			.map(ToOwned::to_owned)
			.unwrap_or_default(),
	};
	if dataframe.column(&target_column).is_none() {
		anyhow::bail!("did not find target column \"{}\"", target_column);
	}
	let (_, summary) = StandardPreprocessor.preprocess(&dataframe, &target_column)?;
	println!("{}", serde_json::to_string_pretty(&summary)?);
	Ok(())
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
	match path {
		Some(path) => Ok(Config::from_path(path)?),
		None => Ok(Config::default()),
	}
}

pub fn load_dataframe(path: &Path) -> Result<DataFrame> {
	DataFrame::from_path(path, FromCsvOptions::default(), |_| {})
		.with_context(|| format!("failed to load {}", path.display()))
}

/// The command line target takes precedence over the config file's.
pub fn ingest_options(target_column: Option<String>, config: &Config) -> IngestOptions {
	IngestOptions {
		target_column: target_column.or_else(|| config.target_column.clone()),
		classification_max_unique_values: config.classification_max_unique_values(),
	}
}

pub fn file_name(path: &Path) -> String {
	path.file_stem()
		.map(|stem| stem.to_string_lossy().into_owned())
		.unwrap_or_else(|| "dataset".to_owned())
}
