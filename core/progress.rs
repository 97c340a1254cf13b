use crate::{
	job::{JobStatus, JobStep},
	model::{Metrics, ModelStatus, ModelType},
	repository::Repository,
	Error, Result,
};
use automl_util::id::Id;

/// A snapshot of a training job and its models, which is everything a client polling for progress needs.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
	pub status: JobStatus,
	pub progress: f32,
	pub current_step: JobStep,
	pub total_steps: usize,
	pub best_model_id: Option<Id>,
	pub error: Option<String>,
	pub models: Vec<ModelSummary>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSummary {
	pub id: Id,
	pub model_type: ModelType,
	pub status: ModelStatus,
	pub progress: f32,
	pub metrics: Option<Metrics>,
	pub training_time: Option<f64>,
}

/// Read the progress of the job with id `job_id`. Models are listed in the order they were created.
pub fn job_progress(repository: &dyn Repository, job_id: Id) -> Result<JobProgress> {
	let job = repository
		.get_training_job(job_id)
		.ok_or(Error::JobNotFound(job_id))?;
	let models = repository
		.get_models_by_job(job_id)
		.into_iter()
		.map(|model| ModelSummary {
			id: model.id,
			model_type: model.model_type,
			status: model.status,
			progress: model.progress,
			metrics: if model.status == ModelStatus::Completed {
				model.metrics
			} else {
				None
			},
			training_time: model.training_time,
		})
		.collect();
	Ok(JobProgress {
		status: job.status,
		progress: job.progress,
		current_step: job.current_step,
		total_steps: job.total_steps,
		best_model_id: job.best_model_id,
		error: job.error,
		models,
	})
}

#[test]
fn test_job_progress() {
	use crate::{
		job::TrainingJob,
		model::{Hyperparameters, Model, ModelUpdate, RegressionMetrics},
		repository::MemoryRepository,
	};
	let repository = MemoryRepository::new();
	assert!(matches!(
		job_progress(&repository, Id::new()),
		Err(Error::JobNotFound(_))
	));
	let job = TrainingJob::new(Id::new());
	repository.create_training_job(job.clone()).unwrap();
	let model = Model::new(
		job.dataset_id,
		job.id,
		ModelType::LinearRegression,
		ModelStatus::Training,
		Hyperparameters::default_for(ModelType::LinearRegression),
	);
	repository.create_model(model.clone()).unwrap();
	let metrics = Metrics::Regression(RegressionMetrics {
		rmse: 1.0,
		mae: 1.0,
		r2_score: 0.5,
		mse: 1.0,
	});
	repository
		.update_model(
			model.id,
			ModelUpdate {
				progress: Some(0.5),
				metrics: Some(metrics.clone()),
				..Default::default()
			},
		)
		.unwrap();
	let progress = job_progress(&repository, job.id).unwrap();
	assert_eq!(progress.models.len(), 1);
	assert_eq!(progress.models[0].progress, 0.5);
	assert_eq!(progress.models[0].metrics, None);
	repository
		.update_model(
			model.id,
			ModelUpdate {
				status: Some(ModelStatus::Completed),
				..Default::default()
			},
		)
		.unwrap();
	let progress = job_progress(&repository, job.id).unwrap();
	assert_eq!(progress.models[0].metrics, Some(metrics));
	let json = serde_json::to_value(&progress).unwrap();
	assert_eq!(json["totalSteps"], 4);
	assert_eq!(json["models"][0]["modelType"], "linear_regression");
	assert_eq!(json["models"][0]["metrics"]["r2Score"], 0.5);
}
