use automl_util::id::Id;
use chrono::{DateTime, Utc};

/// A training job always moves through the same four running steps.
pub const TOTAL_STEPS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
	Pending,
	Running,
	Completed,
	Failed,
}

impl JobStatus {
	pub fn is_terminal(self) -> bool {
		matches!(self, JobStatus::Completed | JobStatus::Failed)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStep {
	Initializing,
	Preprocessing,
	Training,
	Evaluation,
	Completed,
	Failed,
}

impl std::fmt::Display for JobStep {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			JobStep::Initializing => "initializing",
			JobStep::Preprocessing => "preprocessing",
			JobStep::Training => "training",
			JobStep::Evaluation => "evaluation",
			JobStep::Completed => "completed",
			JobStep::Failed => "failed",
		};
		write!(f, "{}", s)
	}
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingJob {
	pub id: Id,
	pub dataset_id: Id,
	pub status: JobStatus,
	pub progress: f32,
	pub current_step: JobStep,
	pub total_steps: usize,
	/// Set only when the job completes.
	pub best_model_id: Option<Id>,
	pub error: Option<String>,
	pub created_at: DateTime<Utc>,
	pub completed_at: Option<DateTime<Utc>>,
}

impl TrainingJob {
	/// Create a job that is running and initializing.
	pub fn new(dataset_id: Id) -> Self {
		Self {
			id: Id::new(),
			dataset_id,
			status: JobStatus::Running,
			progress: 0.0,
			current_step: JobStep::Initializing,
			total_steps: TOTAL_STEPS,
			best_model_id: None,
			error: None,
			created_at: Utc::now(),
			completed_at: None,
		}
	}
}

#[derive(Clone, Debug, Default)]
pub struct TrainingJobUpdate {
	pub status: Option<JobStatus>,
	pub progress: Option<f32>,
	pub current_step: Option<JobStep>,
	pub best_model_id: Option<Id>,
	pub error: Option<String>,
}

impl TrainingJobUpdate {
	/// Move the job to a running step and report its progress.
	pub fn step(current_step: JobStep, progress: f32) -> Self {
		Self {
			status: Some(JobStatus::Running),
			progress: Some(progress),
			current_step: Some(current_step),
			..Default::default()
		}
	}
}

#[test]
fn test_new_job() {
	let dataset_id = Id::new();
	let job = TrainingJob::new(dataset_id);
	assert_eq!(job.dataset_id, dataset_id);
	assert_eq!(job.status, JobStatus::Running);
	assert_eq!(job.current_step, JobStep::Initializing);
	assert_eq!(job.total_steps, 4);
	assert!(!job.status.is_terminal());
	let value = serde_json::to_value(&job).unwrap();
	assert_eq!(value["currentStep"], "initializing");
	assert_eq!(value["bestModelId"], serde_json::Value::Null);
}
