use automl_core::{
	config::{ComparisonMetric, Concurrency, FailurePolicy, TrainOptions},
	dataset::{ingest, Dataset, DatasetUpdate, IngestOptions},
	error::{RecordKind, RepositoryError, TrainingError},
	job::{JobStatus, JobStep, TrainingJob, TrainingJobUpdate},
	model::{
		HyperparameterOverrides, Hyperparameters, Metrics, Model, ModelStatus, ModelType,
		ModelUpdate,
	},
	prepare::PreparedData,
	preprocess::{Preprocessor, StandardPreprocessor},
	repository::{MemoryRepository, Repository, RepositoryResult},
	task::{TaskDetector, TaskType},
	train::{choose_best_model, TrainingOrchestrator},
	trainer::{LocalTrainer, TrainOutput, Trainer},
	visualization::{Visualization, VisualizationType},
	Error, Id,
};
use automl_dataframe::{DataFrame, Value};
use std::{collections::HashMap, sync::Arc, time::Duration};

const CLASSES: [&str; 3] = ["setosa", "versicolor", "virginica"];

fn classification_dataframe() -> DataFrame {
	let rows = (0..150)
		.map(|i| {
			let class = i % 3;
			vec![
				Value::Number(class as f32 * 2.0 + (i % 7) as f32 * 0.1),
				Value::Number((i % 11) as f32),
				Value::Number(i as f32 * 0.5),
				Value::Number(((i * 13) % 17) as f32),
				Value::from(CLASSES[class]),
			]
		})
		.collect();
	DataFrame::from_rows(
		vec![
			"sepal_length".to_owned(),
			"sepal_width".to_owned(),
			"petal_length".to_owned(),
			"petal_width".to_owned(),
			"species".to_owned(),
		],
		rows,
	)
	.unwrap()
}

fn regression_dataframe() -> DataFrame {
	let rows = (0..150)
		.map(|i| {
			let x = i as f32 * 0.1;
			let z = (i % 5) as f32;
			vec![
				Value::Number(x),
				Value::Number(z),
				Value::Number(2.0 * x + 0.5 * z + 0.37),
			]
		})
		.collect();
	DataFrame::from_rows(
		vec!["x".to_owned(), "z".to_owned(), "price".to_owned()],
		rows,
	)
	.unwrap()
}

/// Small models keep the tests fast.
fn fast_options() -> TrainOptions {
	let overrides = HyperparameterOverrides {
		n_estimators: Some(10),
		max_epochs: Some(20),
		..Default::default()
	};
	TrainOptions {
		hyperparameters: ModelType::for_task(TaskType::Classification)
			.iter()
			.chain(ModelType::for_task(TaskType::Regression))
			.map(|model_type| (*model_type, overrides.clone()))
			.collect(),
		..Default::default()
	}
}

fn setup(dataframe: DataFrame) -> (Arc<MemoryRepository>, Id) {
	let repository = Arc::new(MemoryRepository::new());
	let dataset = ingest(&*repository, "test", dataframe, &IngestOptions::default()).unwrap();
	(repository, dataset.id)
}

/// Fails on one model type and trains every other type with the `LocalTrainer`.
struct FailingTrainer {
	fail_on: ModelType,
}

impl Trainer for FailingTrainer {
	fn train(
		&self,
		dataset_id: Id,
		model_type: ModelType,
		hyperparameters: &Hyperparameters,
		data: &PreparedData,
		update_progress: &mut dyn FnMut(f32),
	) -> Result<TrainOutput, TrainingError> {
		if model_type == self.fail_on {
			update_progress(0.3);
			return Err(TrainingError::did_not_converge(model_type, "loss diverged"));
		}
		LocalTrainer.train(dataset_id, model_type, hyperparameters, data, update_progress)
	}
}

fn primary_metric(metrics: &Metrics) -> f32 {
	match metrics {
		Metrics::Classification(metrics) => metrics.accuracy,
		Metrics::Regression(metrics) => metrics.r2_score,
	}
}

fn assert_best_model(repository: &dyn Repository, job_id: Id) {
	let job = repository.get_training_job(job_id).unwrap();
	let best_model_id = job.best_model_id.unwrap();
	let models = repository.get_models_by_job(job_id);
	let best = models.iter().find(|model| model.id == best_model_id).unwrap();
	assert_eq!(best.status, ModelStatus::Completed);
	let best_value = primary_metric(best.metrics.as_ref().unwrap());
	let first_best = models
		.iter()
		.filter(|model| model.status == ModelStatus::Completed)
		.position(|model| primary_metric(model.metrics.as_ref().unwrap()) >= best_value);
	for model in models
		.iter()
		.filter(|model| model.status == ModelStatus::Completed)
	{
		assert!(best_value >= primary_metric(model.metrics.as_ref().unwrap()));
	}
	assert_eq!(
		models[first_best.unwrap()].id,
		best_model_id,
		"ties go to the first model"
	);
}

#[test]
fn test_classification_job() {
	let (repository, dataset_id) = setup(classification_dataframe());
	let dataset = repository.get_dataset(dataset_id).unwrap();
	assert_eq!(dataset.task_type, TaskType::Classification);
	assert_eq!(dataset.target_column, "species");
	let orchestrator = TrainingOrchestrator::new(repository.clone()).with_options(fast_options());
	let job = orchestrator.run(dataset_id).unwrap();
	assert_eq!(job.status, JobStatus::Completed);
	assert_eq!(job.current_step, JobStep::Completed);
	assert_eq!(job.progress, 1.0);
	assert!(job.completed_at.is_some());

	let models = repository.get_models_by_job(job.id);
	let model_types: Vec<ModelType> = models.iter().map(|model| model.model_type).collect();
	assert_eq!(model_types, ModelType::for_task(TaskType::Classification));
	for model in models.iter() {
		assert_eq!(model.status, ModelStatus::Completed);
		assert_eq!(model.progress, 1.0);
		assert!(matches!(model.metrics, Some(Metrics::Classification(_))));
		assert!(model.training_time.is_some());
		assert!(model.completed_at.is_some());
		let visualization_types: Vec<VisualizationType> = repository
			.get_visualizations_by_model(model.id)
			.iter()
			.map(|visualization| visualization.visualization_type())
			.collect();
		assert_eq!(
			visualization_types,
			VisualizationType::for_task(TaskType::Classification)
		);
	}
	assert_best_model(&*repository, job.id);

	let dataset = repository.get_dataset(dataset_id).unwrap();
	assert!(dataset.preprocessed);
	let summary = dataset.preprocessing_summary.unwrap();
	assert_eq!(summary.original_shape, (150, 5));
	assert_eq!(summary.scaled_columns.len(), 4);
}

#[test]
fn test_regression_job() {
	let (repository, dataset_id) = setup(regression_dataframe());
	assert_eq!(
		repository.get_dataset(dataset_id).unwrap().task_type,
		TaskType::Regression
	);
	let orchestrator = TrainingOrchestrator::new(repository.clone()).with_options(fast_options());
	let job = orchestrator.run(dataset_id).unwrap();
	assert_eq!(job.status, JobStatus::Completed);
	let models = repository.get_models_by_job(job.id);
	let model_types: Vec<ModelType> = models.iter().map(|model| model.model_type).collect();
	assert_eq!(model_types, ModelType::for_task(TaskType::Regression));
	for model in models.iter() {
		assert!(matches!(model.metrics, Some(Metrics::Regression(_))));
		assert_eq!(repository.get_visualizations_by_model(model.id).len(), 2);
	}
	assert_best_model(&*repository, job.id);
}

#[test]
fn test_failing_model_aborts_job() {
	let (repository, dataset_id) = setup(classification_dataframe());
	let orchestrator = TrainingOrchestrator::new(repository.clone())
		.with_options(fast_options())
		.with_trainer(Arc::new(FailingTrainer {
			fail_on: ModelType::DecisionTree,
		}));
	let handle = orchestrator.start(dataset_id).unwrap();
	let job_id = handle.job_id();
	let error = handle.wait().unwrap_err();
	assert!(matches!(error, Error::Training(_)));

	let job = repository.get_training_job(job_id).unwrap();
	assert_eq!(job.status, JobStatus::Failed);
	assert_eq!(job.current_step, JobStep::Failed);
	assert_eq!(job.progress, 0.5);
	assert!(job.best_model_id.is_none());
	assert!(job.completed_at.is_none());
	assert_eq!(
		job.error.as_deref(),
		Some("failed to train decision_tree: did not converge: loss diverged")
	);

	let models = repository.get_models_by_job(job_id);
	let statuses: Vec<ModelStatus> = models.iter().map(|model| model.status).collect();
	assert_eq!(
		statuses,
		vec![
			ModelStatus::Completed,
			ModelStatus::Completed,
			ModelStatus::Failed
		]
	);
	assert!(models[2].metrics.is_none());
	assert!(models[2].completed_at.is_none());
	assert_eq!(repository.get_visualizations_by_model(models[0].id).len(), 3);
	assert_eq!(repository.get_visualizations_by_model(models[2].id).len(), 0);
}

#[test]
fn test_continue_policy() {
	let (repository, dataset_id) = setup(classification_dataframe());
	let options = TrainOptions {
		failure_policy: FailurePolicy::Continue,
		..fast_options()
	};
	let orchestrator = TrainingOrchestrator::new(repository.clone())
		.with_options(options)
		.with_trainer(Arc::new(FailingTrainer {
			fail_on: ModelType::Xgboost,
		}));
	let job = orchestrator.run(dataset_id).unwrap();
	assert_eq!(job.status, JobStatus::Completed);
	let models = repository.get_models_by_job(job.id);
	assert_eq!(models.len(), 4);
	assert_eq!(models[1].status, ModelStatus::Failed);
	assert_ne!(job.best_model_id, Some(models[1].id));
	assert_best_model(&*repository, job.id);
}

#[test]
fn test_parallel_job() {
	let (repository, dataset_id) = setup(regression_dataframe());
	let options = TrainOptions {
		concurrency: Concurrency::Parallel { max_workers: 2 },
		..fast_options()
	};
	let orchestrator = TrainingOrchestrator::new(repository.clone()).with_options(options);
	let job = orchestrator.run(dataset_id).unwrap();
	assert_eq!(job.status, JobStatus::Completed);
	let models = repository.get_models_by_job(job.id);
	let model_types: Vec<ModelType> = models.iter().map(|model| model.model_type).collect();
	assert_eq!(model_types, ModelType::for_task(TaskType::Regression));
	assert!(models
		.iter()
		.all(|model| model.status == ModelStatus::Completed));
	assert_best_model(&*repository, job.id);
}

#[test]
fn test_parallel_failure_leaves_every_model_terminal() {
	let (repository, dataset_id) = setup(classification_dataframe());
	let options = TrainOptions {
		concurrency: Concurrency::Parallel { max_workers: 1 },
		..fast_options()
	};
	let orchestrator = TrainingOrchestrator::new(repository.clone())
		.with_options(options)
		.with_trainer(Arc::new(FailingTrainer {
			fail_on: ModelType::RandomForest,
		}));
	let handle = orchestrator.start(dataset_id).unwrap();
	let job_id = handle.job_id();
	assert!(handle.wait().is_err());
	let job = repository.get_training_job(job_id).unwrap();
	assert_eq!(job.status, JobStatus::Failed);
	assert!(job.best_model_id.is_none());
	let models = repository.get_models_by_job(job_id);
	assert_eq!(models.len(), 4);
	assert_eq!(models[0].status, ModelStatus::Failed);
	assert!(models.iter().all(|model| model.status.is_terminal()));
}

#[test]
fn test_progress_is_monotonic() {
	let (repository, dataset_id) = setup(classification_dataframe());
	let orchestrator = TrainingOrchestrator::new(repository.clone()).with_options(fast_options());
	let handle = orchestrator.start(dataset_id).unwrap();
	let job_id = handle.job_id();
	let mut job_progress = Vec::new();
	let mut model_progress: HashMap<Id, Vec<f32>> = HashMap::new();
	loop {
		let progress = orchestrator.progress(job_id).unwrap();
		job_progress.push(progress.progress);
		for model in progress.models.iter() {
			model_progress.entry(model.id).or_default().push(model.progress);
		}
		if progress.status.is_terminal() {
			break;
		}
		std::thread::sleep(Duration::from_millis(5));
	}
	handle.wait().unwrap();
	assert!(job_progress.windows(2).all(|window| window[0] <= window[1]));
	assert_eq!(job_progress.last(), Some(&1.0));
	for progress in model_progress.values() {
		assert!(progress.windows(2).all(|window| window[0] <= window[1]));
	}
}

#[test]
fn test_progress_is_idempotent() {
	let (repository, dataset_id) = setup(regression_dataframe());
	let orchestrator = TrainingOrchestrator::new(repository.clone()).with_options(fast_options());
	let job = orchestrator.run(dataset_id).unwrap();
	let first = serde_json::to_string(&orchestrator.progress(job.id).unwrap()).unwrap();
	let second = serde_json::to_string(&orchestrator.progress(job.id).unwrap()).unwrap();
	assert_eq!(first, second);
	let progress: serde_json::Value = serde_json::from_str(&first).unwrap();
	assert_eq!(progress["status"], "completed");
	assert_eq!(progress["currentStep"], "completed");
	assert_eq!(progress["totalSteps"], 4);
	assert_eq!(progress["bestModelId"], job.best_model_id.unwrap().to_string());
	assert_eq!(progress["models"].as_array().unwrap().len(), 4);
}

#[test]
fn test_start_errors() {
	let (repository, dataset_id) = setup(classification_dataframe());
	let orchestrator = TrainingOrchestrator::new(repository.clone());
	let missing = Id::new();
	assert!(matches!(
		orchestrator.start(missing),
		Err(Error::DatasetNotFound(id)) if id == missing
	));
	let orchestrator = orchestrator.with_options(TrainOptions {
		comparison_metric: Some(ComparisonMetric::R2),
		..Default::default()
	});
	assert!(matches!(orchestrator.start(dataset_id), Err(Error::Config(_))));
	assert!(repository.list_training_jobs(None).is_empty());
	assert!(matches!(
		orchestrator.progress(missing),
		Err(Error::JobNotFound(_))
	));
}

#[test]
fn test_comparison_metric_option() {
	let (repository, dataset_id) = setup(regression_dataframe());
	let options = TrainOptions {
		comparison_metric: Some(ComparisonMetric::Rmse),
		model_types: Some(vec![
			ModelType::LinearRegression,
			ModelType::DecisionTreeRegressor,
		]),
		..fast_options()
	};
	let orchestrator = TrainingOrchestrator::new(repository.clone()).with_options(options);
	let job = orchestrator.run(dataset_id).unwrap();
	let models = repository.get_models_by_job(job.id);
	let model_types: Vec<ModelType> = models.iter().map(|model| model.model_type).collect();
	assert_eq!(
		model_types,
		vec![ModelType::DecisionTreeRegressor, ModelType::LinearRegression]
	);
	assert_eq!(
		job.best_model_id,
		choose_best_model(&models, ComparisonMetric::Rmse)
	);
}

#[test]
fn test_empty_dataset_is_classification() {
	assert_eq!(
		TaskDetector::default().detect(&DataFrame::default()),
		TaskType::Classification
	);
	let (repository, dataset_id) = setup(
		DataFrame::from_rows(vec!["a".to_owned(), "b".to_owned()], vec![]).unwrap(),
	);
	let dataset = repository.get_dataset(dataset_id).unwrap();
	assert_eq!(dataset.task_type, TaskType::Classification);
	assert_eq!(dataset.row_count, 0);
	// There is nothing to train on, so the job fails instead of hanging.
	let orchestrator = TrainingOrchestrator::new(repository.clone());
	let handle = orchestrator.start(dataset_id).unwrap();
	let job_id = handle.job_id();
	assert!(matches!(handle.wait(), Err(Error::Training(_))));
	assert_eq!(
		repository.get_training_job(job_id).unwrap().status,
		JobStatus::Failed
	);
}

#[test]
fn test_preprocessor_preserves_rows() {
	let input = classification_dataframe();
	let (output, summary) = StandardPreprocessor.preprocess(&input, "species").unwrap();
	assert_eq!(input, classification_dataframe());
	assert_eq!(output.nrows(), input.nrows());
	assert_eq!(output.column("species"), input.column("species"));
	assert_eq!(summary.final_shape, (150, 5));
	assert_eq!(summary.missing_values_handled, 0);
}

/// Stores everything in a `MemoryRepository` but rejects every write of model progress.
struct ProgressRejectingRepository {
	inner: MemoryRepository,
}

impl Repository for ProgressRejectingRepository {
	fn create_dataset(&self, dataset: Dataset, data: DataFrame) -> RepositoryResult<()> {
		self.inner.create_dataset(dataset, data)
	}
	fn get_dataset(&self, id: Id) -> Option<Dataset> {
		self.inner.get_dataset(id)
	}
	fn get_dataset_data(&self, id: Id) -> Option<Arc<DataFrame>> {
		self.inner.get_dataset_data(id)
	}
	fn update_dataset(&self, id: Id, update: DatasetUpdate) -> RepositoryResult<Dataset> {
		self.inner.update_dataset(id, update)
	}
	fn list_datasets(&self) -> Vec<Dataset> {
		self.inner.list_datasets()
	}
	fn create_model(&self, model: Model) -> RepositoryResult<()> {
		self.inner.create_model(model)
	}
	fn get_model(&self, id: Id) -> Option<Model> {
		self.inner.get_model(id)
	}
	fn update_model(&self, id: Id, update: ModelUpdate) -> RepositoryResult<Model> {
		if update.progress.is_some() && update.status.is_none() {
			return Err(RepositoryError::NotFound {
				kind: RecordKind::Model,
				id,
			});
		}
		self.inner.update_model(id, update)
	}
	fn get_models_by_dataset(&self, dataset_id: Id) -> Vec<Model> {
		self.inner.get_models_by_dataset(dataset_id)
	}
	fn get_models_by_job(&self, job_id: Id) -> Vec<Model> {
		self.inner.get_models_by_job(job_id)
	}
	fn create_training_job(&self, job: TrainingJob) -> RepositoryResult<()> {
		self.inner.create_training_job(job)
	}
	fn get_training_job(&self, id: Id) -> Option<TrainingJob> {
		self.inner.get_training_job(id)
	}
	fn update_training_job(
		&self,
		id: Id,
		update: TrainingJobUpdate,
	) -> RepositoryResult<TrainingJob> {
		self.inner.update_training_job(id, update)
	}
	fn list_training_jobs(&self, dataset_id: Option<Id>) -> Vec<TrainingJob> {
		self.inner.list_training_jobs(dataset_id)
	}
	fn create_visualization(&self, visualization: Visualization) -> RepositoryResult<()> {
		self.inner.create_visualization(visualization)
	}
	fn get_visualizations_by_model(&self, model_id: Id) -> Vec<Visualization> {
		self.inner.get_visualizations_by_model(model_id)
	}
}

#[test]
fn test_lost_progress_write_fails_model() {
	let repository = Arc::new(ProgressRejectingRepository {
		inner: MemoryRepository::new(),
	});
	let dataset = ingest(
		&*repository,
		"test",
		regression_dataframe(),
		&IngestOptions::default(),
	)
	.unwrap();
	let orchestrator = TrainingOrchestrator::new(repository.clone()).with_options(fast_options());
	let error = orchestrator.run(dataset.id).unwrap_err();
	assert!(matches!(error, Error::Repository(_)));
	let jobs = repository.list_training_jobs(Some(dataset.id));
	assert_eq!(jobs.len(), 1);
	assert_eq!(jobs[0].status, JobStatus::Failed);
	let models = repository.get_models_by_job(jobs[0].id);
	assert_eq!(models.len(), 1);
	assert_eq!(models[0].status, ModelStatus::Failed);
	assert_eq!(models[0].error.as_deref(), Some(error.to_string().as_str()));
	assert!(repository.get_visualizations_by_model(models[0].id).is_empty());
}
