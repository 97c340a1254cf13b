/*!
This crate implements an automated machine learning pipeline. A dataset is ingested into a [`Repository`](repository/trait.Repository.html), its prediction task is detected, and a [`TrainingOrchestrator`](train/struct.TrainingOrchestrator.html) runs a training job on a background thread: it preprocesses the data, trains each candidate model type, evaluates the models on a held out test split, generates diagnostic visualizations, and selects the best model. The job's progress can be polled at any time with [`job_progress`](progress/fn.job_progress.html).

```
use automl_core::{dataset::{ingest, IngestOptions}, repository::MemoryRepository, train::TrainingOrchestrator};
use automl_dataframe::{DataFrame, Value};
use std::sync::Arc;

let rows = (0..40)
	.map(|i| vec![Value::from(i as f32), Value::from(if i < 20 { "no" } else { "yes" })])
	.collect();
let dataframe = DataFrame::from_rows(vec!["income".into(), "default".into()], rows).unwrap();
let repository = Arc::new(MemoryRepository::new());
let dataset = ingest(&*repository, "loans", dataframe, &IngestOptions::default()).unwrap();
let orchestrator = TrainingOrchestrator::new(repository);
let job = orchestrator.start(dataset.id).unwrap().wait().unwrap();
assert!(job.best_model_id.is_some());
```
*/

#![allow(clippy::tabs_in_doc_comments)]

pub mod config;
pub mod dataset;
pub mod error;
pub mod job;
pub mod model;
pub mod prepare;
pub mod preprocess;
pub mod progress;
pub mod repository;
pub mod task;
pub mod test;
pub mod train;
pub mod trainer;
pub mod visualization;

pub use self::error::{Error, Result};
pub use automl_util::id::Id;
