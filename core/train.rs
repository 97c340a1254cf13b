/*!
This module implements the [`TrainingOrchestrator`](struct.TrainingOrchestrator.html), the state machine that takes a dataset through preprocessing, training, evaluation and model selection on a background thread.

A job moves through these states, reporting each one to the repository:

```text
running(initializing) -> running(preprocessing) -> running(training) -> running(evaluation) -> completed
```

Any error moves the job to `failed`, records the error message, and leaves its progress where it was.
*/

use crate::{
	config::{ComparisonMetric, Concurrency, FailurePolicy, TrainOptions},
	dataset::{Dataset, DatasetUpdate},
	job::{JobStatus, JobStep, TrainingJob, TrainingJobUpdate},
	model::{Hyperparameters, Model, ModelStatus, ModelType, ModelUpdate},
	prepare::{prepare, PreparedData},
	preprocess::{Preprocessor, StandardPreprocessor},
	progress::{job_progress, JobProgress},
	repository::Repository,
	trainer::{LocalTrainer, Trainer},
	visualization::{Visualization, VisualizationGenerator, VisualizationType},
	Error, Result,
};
use automl_util::id::Id;
use rayon::prelude::*;
use std::{
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	thread::JoinHandle,
};
use tracing::{debug, error, info, warn};

/// A model's progress is written to the repository only when it has advanced by at least this much, or reached 1.
const MODEL_PROGRESS_STEP: f32 = 0.01;

pub struct TrainingOrchestrator {
	repository: Arc<dyn Repository>,
	preprocessor: Arc<dyn Preprocessor>,
	trainer: Arc<dyn Trainer>,
	options: TrainOptions,
}

impl TrainingOrchestrator {
	/// Create an orchestrator that uses the `StandardPreprocessor`, the `LocalTrainer` and the default options.
	pub fn new(repository: Arc<dyn Repository>) -> Self {
		Self {
			repository,
			preprocessor: Arc::new(StandardPreprocessor),
			trainer: Arc::new(LocalTrainer),
			options: TrainOptions::default(),
		}
	}

	pub fn with_preprocessor(mut self, preprocessor: Arc<dyn Preprocessor>) -> Self {
		self.preprocessor = preprocessor;
		self
	}

	pub fn with_trainer(mut self, trainer: Arc<dyn Trainer>) -> Self {
		self.trainer = trainer;
		self
	}

	pub fn with_options(mut self, options: TrainOptions) -> Self {
		self.options = options;
		self
	}

	pub fn repository(&self) -> &Arc<dyn Repository> {
		&self.repository
	}

	/**
	Start a training job for the dataset with id `dataset_id` and return immediately. The job runs on its own thread and reports its state only through the repository.

	Returns `Error::DatasetNotFound` if there is no such dataset and `Error::Config` if the options cannot be used for the dataset's task. In both cases no job is created.
	*/
	pub fn start(&self, dataset_id: Id) -> Result<JobHandle> {
		let dataset = self
			.repository
			.get_dataset(dataset_id)
			.ok_or(Error::DatasetNotFound(dataset_id))?;
		let (comparison_metric, model_types) = self.options.resolve(dataset.task_type)?;
		let job = TrainingJob::new(dataset_id);
		let job_id = job.id;
		self.repository.create_training_job(job)?;
		info!(%job_id, %dataset_id, task = %dataset.task_type, "started training job");
		let pipeline = Pipeline {
			repository: self.repository.clone(),
			preprocessor: self.preprocessor.clone(),
			trainer: self.trainer.clone(),
			options: self.options.clone(),
			job_id,
			dataset,
			comparison_metric,
			model_types,
		};
		let spawn_result = std::thread::Builder::new()
			.name(format!("automl-job-{}", job_id))
			.spawn(move || pipeline.run());
		match spawn_result {
			Ok(handle) => Ok(JobHandle { job_id, handle }),
			Err(spawn_error) => {
				self.repository.update_training_job(
					job_id,
					TrainingJobUpdate {
						status: Some(JobStatus::Failed),
						current_step: Some(JobStep::Failed),
						error: Some(spawn_error.to_string()),
						..Default::default()
					},
				)?;
				Err(spawn_error.into())
			}
		}
	}

	/// Start a training job and block until it finishes.
	pub fn run(&self, dataset_id: Id) -> Result<TrainingJob> {
		self.start(dataset_id)?.wait()
	}

	pub fn progress(&self, job_id: Id) -> Result<JobProgress> {
		job_progress(self.repository.as_ref(), job_id)
	}
}

/// A `JobHandle` refers to a job running on a background thread.
#[derive(Debug)]
pub struct JobHandle {
	job_id: Id,
	handle: JoinHandle<Result<TrainingJob>>,
}

impl JobHandle {
	pub fn job_id(&self) -> Id {
		self.job_id
	}

	pub fn is_finished(&self) -> bool {
		self.handle.is_finished()
	}

	/// Block until the job finishes. Returns the completed job, or the error that failed it.
	pub fn wait(self) -> Result<TrainingJob> {
		match self.handle.join() {
			Ok(result) => result,
			Err(panic) => std::panic::resume_unwind(panic),
		}
	}
}

/// Everything one job needs, moved onto the job's thread.
struct Pipeline {
	repository: Arc<dyn Repository>,
	preprocessor: Arc<dyn Preprocessor>,
	trainer: Arc<dyn Trainer>,
	options: TrainOptions,
	job_id: Id,
	dataset: Dataset,
	comparison_metric: ComparisonMetric,
	model_types: Vec<ModelType>,
}

impl Pipeline {
	fn run(self) -> Result<TrainingJob> {
		match self.run_steps() {
			Ok(best_model_id) => {
				let job = self.repository.update_training_job(
					self.job_id,
					TrainingJobUpdate {
						status: Some(JobStatus::Completed),
						progress: Some(1.0),
						current_step: Some(JobStep::Completed),
						best_model_id: Some(best_model_id),
						..Default::default()
					},
				)?;
				info!(job_id = %self.job_id, %best_model_id, "training job completed");
				Ok(job)
			}
			Err(job_error) => {
				error!(job_id = %self.job_id, error = %job_error, "training job failed");
				self.repository.update_training_job(
					self.job_id,
					TrainingJobUpdate {
						status: Some(JobStatus::Failed),
						current_step: Some(JobStep::Failed),
						error: Some(job_error.to_string()),
						..Default::default()
					},
				)?;
				Err(job_error)
			}
		}
	}

	fn run_steps(&self) -> Result<Id> {
		let dataset_id = self.dataset.id;

		// preprocessing
		self.step(JobStep::Preprocessing, 0.25)?;
		let dataframe = self
			.repository
			.get_dataset_data(dataset_id)
			.ok_or(Error::DatasetNotFound(dataset_id))?;
		let (dataframe, summary) = self
			.preprocessor
			.preprocess(&dataframe, &self.dataset.target_column)?;
		self.repository.update_dataset(
			dataset_id,
			DatasetUpdate {
				preprocessed: Some(true),
				preprocessing_summary: Some(summary),
				..Default::default()
			},
		)?;

		// training
		self.step(JobStep::Training, 0.5)?;
		let data = prepare(
			&dataframe,
			&self.dataset.target_column,
			self.dataset.task_type,
			&self.options.prepare,
		)?;
		debug!(
			job_id = %self.job_id,
			n_train = data.train.labels.len(),
			n_test = data.test.labels.len(),
			n_features = data.feature_names.len(),
			"prepared data"
		);
		match self.options.concurrency {
			Concurrency::Sequential => self.train_sequential(&data)?,
			Concurrency::Parallel { max_workers } => self.train_parallel(&data, max_workers)?,
		}

		// evaluation
		self.step(JobStep::Evaluation, 0.75)?;
		let models = self.repository.get_models_by_job(self.job_id);
		for model in models
			.iter()
			.filter(|model| model.status == ModelStatus::Completed)
		{
			let value = model
				.metrics
				.as_ref()
				.and_then(|metrics| self.comparison_metric.value(metrics));
			info!(
				job_id = %self.job_id,
				model_type = %model.model_type,
				metric = %self.comparison_metric,
				value = ?value,
				"model comparison"
			);
		}
		choose_best_model(&models, self.comparison_metric).ok_or(Error::NoCompletedModels)
	}

	fn step(&self, current_step: JobStep, progress: f32) -> Result<()> {
		self.repository
			.update_training_job(self.job_id, TrainingJobUpdate::step(current_step, progress))?;
		info!(job_id = %self.job_id, step = %current_step, progress, "training job step");
		Ok(())
	}

	fn hyperparameters(&self, model_type: ModelType) -> Hyperparameters {
		let mut hyperparameters = Hyperparameters::default_for(model_type);
		if let Some(overrides) = self.options.hyperparameters.get(&model_type) {
			hyperparameters.apply(overrides);
		}
		hyperparameters
	}

	/// Whether the job should go on training after `error`.
	fn can_continue(&self, error: &Error) -> bool {
		self.options.failure_policy == FailurePolicy::Continue && matches!(error, Error::Training(_))
	}

	fn train_sequential(&self, data: &PreparedData) -> Result<()> {
		for model_type in self.model_types.iter().cloned() {
			let model = Model::new(
				self.dataset.id,
				self.job_id,
				model_type,
				ModelStatus::Training,
				self.hyperparameters(model_type),
			);
			self.repository.create_model(model.clone())?;
			if let Err(model_error) = self.train_model(&model, data) {
				if !self.can_continue(&model_error) {
					return Err(model_error);
				}
			}
		}
		Ok(())
	}

	fn train_parallel(&self, data: &PreparedData, max_workers: usize) -> Result<()> {
		let models: Vec<Model> = self
			.model_types
			.iter()
			.map(|model_type| {
				Model::new(
					self.dataset.id,
					self.job_id,
					*model_type,
					ModelStatus::Pending,
					self.hyperparameters(*model_type),
				)
			})
			.collect();
		for model in models.iter() {
			self.repository.create_model(model.clone())?;
		}
		let pool = rayon::ThreadPoolBuilder::new()
			.num_threads(max_workers)
			.thread_name(|index| format!("automl-trainer-{}", index))
			.build()
			.map_err(|pool_error| Error::Config(pool_error.to_string()))?;
		let abort = AtomicBool::new(false);
		let results: Vec<Result<()>> = pool.install(|| {
			models
				.par_iter()
				.map(|model| {
					if abort.load(Ordering::SeqCst) {
						self.repository.update_model(
							model.id,
							ModelUpdate {
								status: Some(ModelStatus::Failed),
								error: Some("another model failed to train".to_owned()),
								..Default::default()
							},
						)?;
						return Ok(());
					}
					let result = self.train_model(model, data);
					if let Err(model_error) = &result {
						if !self.can_continue(model_error) {
							abort.store(true, Ordering::SeqCst);
						}
					}
					result
				})
				.collect()
		});
		for result in results {
			if let Err(model_error) = result {
				if !self.can_continue(&model_error) {
					return Err(model_error);
				}
			}
		}
		Ok(())
	}

	/// Train one model, record its outcome, and generate its visualizations once it has completed.
	fn train_model(&self, model: &Model, data: &PreparedData) -> Result<()> {
		let model_id = model.id;
		let model_type = model.model_type;
		if model.status != ModelStatus::Training {
			self.repository.update_model(
				model_id,
				ModelUpdate {
					status: Some(ModelStatus::Training),
					..Default::default()
				},
			)?;
		}
		debug!(job_id = %self.job_id, %model_type, "training model");
		let mut reported = 0.0;
		let mut progress_error = None;
		let result = self.trainer.train(
			self.dataset.id,
			model_type,
			&model.hyperparameters,
			data,
			&mut |progress| {
				if progress > reported
					&& (progress >= 1.0 || progress - reported >= MODEL_PROGRESS_STEP)
				{
					reported = progress;
					let update = ModelUpdate {
						progress: Some(progress.min(1.0)),
						..Default::default()
					};
					if let Err(repository_error) = self.repository.update_model(model_id, update) {
						progress_error.get_or_insert(repository_error);
					}
				}
			},
		);
		if let Some(repository_error) = progress_error {
			warn!(job_id = %self.job_id, %model_type, error = %repository_error, "failed to record model progress");
			self.repository.update_model(
				model_id,
				ModelUpdate {
					status: Some(ModelStatus::Failed),
					error: Some(repository_error.to_string()),
					..Default::default()
				},
			)?;
			return Err(repository_error.into());
		}
		let output = match result {
			Ok(output) => output,
			Err(training_error) => {
				warn!(job_id = %self.job_id, %model_type, error = %training_error, "model failed to train");
				self.repository.update_model(
					model_id,
					ModelUpdate {
						status: Some(ModelStatus::Failed),
						error: Some(training_error.to_string()),
						..Default::default()
					},
				)?;
				return Err(training_error.into());
			}
		};
		self.repository.update_model(
			model_id,
			ModelUpdate {
				status: Some(ModelStatus::Completed),
				progress: Some(1.0),
				metrics: Some(output.metrics),
				training_time: Some(output.training_time),
				hyperparameters: Some(output.hyperparameters),
				..Default::default()
			},
		)?;
		info!(
			job_id = %self.job_id,
			%model_type,
			training_time = output.training_time,
			"model completed"
		);
		let generator = VisualizationGenerator::new(output.model.as_ref(), data);
		for visualization_type in VisualizationType::for_task(data.task) {
			let visualization_data = generator.generate(*visualization_type)?;
			self.repository
				.create_visualization(Visualization::new(model_id, visualization_data))?;
		}
		Ok(())
	}
}

/**
Choose the completed model with the best value of `comparison_metric`. A missing or non finite value is treated as 0 for metrics that are maximized and as infinitely bad for errors that are minimized. Ties go to the model that comes first.
*/
pub fn choose_best_model(models: &[Model], comparison_metric: ComparisonMetric) -> Option<Id> {
	let mut best: Option<(Id, f32)> = None;
	for model in models
		.iter()
		.filter(|model| model.status == ModelStatus::Completed)
	{
		let value = model
			.metrics
			.as_ref()
			.and_then(|metrics| comparison_metric.value(metrics))
			.filter(|value| value.is_finite());
		let score = if comparison_metric.is_minimized() {
			-value.unwrap_or(f32::INFINITY)
		} else {
			value.unwrap_or(0.0)
		};
		match best {
			Some((_, best_score)) if best_score >= score => {}
			_ => best = Some((model.id, score)),
		}
	}
	best.map(|(id, _)| id)
}

#[cfg(test)]
fn test_model(status: ModelStatus, metrics: Option<crate::model::Metrics>) -> Model {
	let mut model = Model::new(
		Id::new(),
		Id::new(),
		ModelType::LinearRegression,
		status,
		Hyperparameters::default_for(ModelType::LinearRegression),
	);
	model.metrics = metrics;
	model
}

#[cfg(test)]
fn regression_metrics(r2_score: f32, rmse: f32) -> crate::model::Metrics {
	crate::model::Metrics::Regression(crate::model::RegressionMetrics {
		rmse,
		mae: rmse,
		r2_score,
		mse: rmse * rmse,
	})
}

#[test]
fn test_choose_best_model() {
	let models = vec![
		test_model(ModelStatus::Completed, Some(regression_metrics(0.5, 2.0))),
		test_model(ModelStatus::Failed, Some(regression_metrics(0.99, 0.1))),
		test_model(ModelStatus::Completed, Some(regression_metrics(0.8, 1.0))),
		test_model(ModelStatus::Completed, Some(regression_metrics(0.8, 1.0))),
		test_model(ModelStatus::Completed, Some(regression_metrics(f32::NAN, 0.5))),
	];
	assert_eq!(
		choose_best_model(&models, ComparisonMetric::R2),
		Some(models[2].id)
	);
	assert_eq!(
		choose_best_model(&models, ComparisonMetric::Rmse),
		Some(models[4].id)
	);
	assert_eq!(choose_best_model(&models[1..2], ComparisonMetric::R2), None);
	assert_eq!(choose_best_model(&[], ComparisonMetric::Accuracy), None);
}

#[test]
fn test_choose_best_model_missing_metrics() {
	let models = vec![
		test_model(ModelStatus::Completed, None),
		test_model(ModelStatus::Completed, Some(regression_metrics(-0.5, 3.0))),
		test_model(ModelStatus::Completed, None),
	];
	// A missing r2 counts as 0, which beats a negative r2.
	assert_eq!(
		choose_best_model(&models, ComparisonMetric::R2),
		Some(models[0].id)
	);
	// A missing rmse never beats a real one.
	assert_eq!(
		choose_best_model(&models, ComparisonMetric::Rmse),
		Some(models[1].id)
	);
}
