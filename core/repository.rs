/*!
This module defines the [`Repository`](trait.Repository.html) trait, the storage contract the training orchestrator depends on, and [`MemoryRepository`](struct.MemoryRepository.html), an in process implementation.

Every `update_*` method merges the fields that are set on the update into the stored record. The first time a job or model transitions to `completed`, the repository stamps its `completed_at`. Failed records are never stamped.
*/

use crate::{
	dataset::{Dataset, DatasetUpdate},
	error::{RecordKind, RepositoryError},
	job::{JobStatus, TrainingJob, TrainingJobUpdate},
	model::{Model, ModelStatus, ModelUpdate},
	visualization::Visualization,
};
use automl_dataframe::DataFrame;
use automl_util::id::Id;
use chrono::Utc;
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

pub trait Repository: Send + Sync {
	fn create_dataset(&self, dataset: Dataset, data: DataFrame) -> RepositoryResult<()>;
	fn get_dataset(&self, id: Id) -> Option<Dataset>;
	fn get_dataset_data(&self, id: Id) -> Option<Arc<DataFrame>>;
	fn update_dataset(&self, id: Id, update: DatasetUpdate) -> RepositoryResult<Dataset>;
	fn list_datasets(&self) -> Vec<Dataset>;

	fn create_model(&self, model: Model) -> RepositoryResult<()>;
	fn get_model(&self, id: Id) -> Option<Model>;
	fn update_model(&self, id: Id, update: ModelUpdate) -> RepositoryResult<Model>;
	fn get_models_by_dataset(&self, dataset_id: Id) -> Vec<Model>;
	fn get_models_by_job(&self, job_id: Id) -> Vec<Model>;

	fn create_training_job(&self, job: TrainingJob) -> RepositoryResult<()>;
	fn get_training_job(&self, id: Id) -> Option<TrainingJob>;
	fn update_training_job(&self, id: Id, update: TrainingJobUpdate)
		-> RepositoryResult<TrainingJob>;
	fn list_training_jobs(&self, dataset_id: Option<Id>) -> Vec<TrainingJob>;

	fn create_visualization(&self, visualization: Visualization) -> RepositoryResult<()>;
	fn get_visualizations_by_model(&self, model_id: Id) -> Vec<Visualization>;
}

/// A `Table` keeps its records in insertion order and indexes them by id.
struct Table<T> {
	kind: RecordKind,
	records: Vec<T>,
	index: HashMap<Id, usize>,
}

impl<T> Table<T> {
	fn new(kind: RecordKind) -> Self {
		Self {
			kind,
			records: Vec::new(),
			index: HashMap::new(),
		}
	}

	fn insert(&mut self, id: Id, record: T) -> RepositoryResult<()> {
		if self.index.contains_key(&id) {
			return Err(RepositoryError::AlreadyExists {
				kind: self.kind,
				id,
			});
		}
		self.index.insert(id, self.records.len());
		self.records.push(record);
		Ok(())
	}

	fn get(&self, id: Id) -> Option<&T> {
		self.index.get(&id).map(|index| &self.records[*index])
	}

	fn get_mut(&mut self, id: Id) -> RepositoryResult<&mut T> {
		let kind = self.kind;
		match self.index.get(&id) {
			Some(index) => Ok(&mut self.records[*index]),
			None => Err(RepositoryError::NotFound { kind, id }),
		}
	}

	fn iter(&self) -> impl Iterator<Item = &T> {
		self.records.iter()
	}
}

struct State {
	datasets: Table<Dataset>,
	data: HashMap<Id, Arc<DataFrame>>,
	models: Table<Model>,
	jobs: Table<TrainingJob>,
	visualizations: Table<Visualization>,
}

pub struct MemoryRepository {
	state: RwLock<State>,
}

impl Default for MemoryRepository {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryRepository {
	pub fn new() -> Self {
		Self {
			state: RwLock::new(State {
				datasets: Table::new(RecordKind::Dataset),
				data: HashMap::new(),
				models: Table::new(RecordKind::Model),
				jobs: Table::new(RecordKind::TrainingJob),
				visualizations: Table::new(RecordKind::Visualization),
			}),
		}
	}
}

impl Repository for MemoryRepository {
	fn create_dataset(&self, dataset: Dataset, data: DataFrame) -> RepositoryResult<()> {
		let mut state = self.state.write();
		let id = dataset.id;
		state.datasets.insert(id, dataset)?;
		state.data.insert(id, Arc::new(data));
		Ok(())
	}

	fn get_dataset(&self, id: Id) -> Option<Dataset> {
		self.state.read().datasets.get(id).cloned()
	}

	fn get_dataset_data(&self, id: Id) -> Option<Arc<DataFrame>> {
		self.state.read().data.get(&id).cloned()
	}

	fn update_dataset(&self, id: Id, update: DatasetUpdate) -> RepositoryResult<Dataset> {
		let mut state = self.state.write();
		let dataset = state.datasets.get_mut(id)?;
		if let Some(name) = update.name {
			dataset.name = name;
		}
		if let Some(preprocessed) = update.preprocessed {
			dataset.preprocessed = preprocessed;
		}
		if let Some(preprocessing_summary) = update.preprocessing_summary {
			dataset.preprocessing_summary = Some(preprocessing_summary);
		}
		Ok(dataset.clone())
	}

	fn list_datasets(&self) -> Vec<Dataset> {
		self.state.read().datasets.iter().cloned().collect()
	}

	fn create_model(&self, model: Model) -> RepositoryResult<()> {
		self.state.write().models.insert(model.id, model)
	}

	fn get_model(&self, id: Id) -> Option<Model> {
		self.state.read().models.get(id).cloned()
	}

	fn update_model(&self, id: Id, update: ModelUpdate) -> RepositoryResult<Model> {
		let mut state = self.state.write();
		let model = state.models.get_mut(id)?;
		if let Some(status) = update.status {
			if status == ModelStatus::Completed && model.completed_at.is_none() {
				model.completed_at = Some(Utc::now());
			}
			model.status = status;
		}
		if let Some(progress) = update.progress {
			model.progress = progress;
		}
		if let Some(metrics) = update.metrics {
			model.metrics = Some(metrics);
		}
		if let Some(training_time) = update.training_time {
			model.training_time = Some(training_time);
		}
		if let Some(hyperparameters) = update.hyperparameters {
			model.hyperparameters = hyperparameters;
		}
		if let Some(error) = update.error {
			model.error = Some(error);
		}
		Ok(model.clone())
	}

	fn get_models_by_dataset(&self, dataset_id: Id) -> Vec<Model> {
		self.state
			.read()
			.models
			.iter()
			.filter(|model| model.dataset_id == dataset_id)
			.cloned()
			.collect()
	}

	fn get_models_by_job(&self, job_id: Id) -> Vec<Model> {
		self.state
			.read()
			.models
			.iter()
			.filter(|model| model.job_id == job_id)
			.cloned()
			.collect()
	}

	fn create_training_job(&self, job: TrainingJob) -> RepositoryResult<()> {
		self.state.write().jobs.insert(job.id, job)
	}

	fn get_training_job(&self, id: Id) -> Option<TrainingJob> {
		self.state.read().jobs.get(id).cloned()
	}

	fn update_training_job(
		&self,
		id: Id,
		update: TrainingJobUpdate,
	) -> RepositoryResult<TrainingJob> {
		let mut state = self.state.write();
		let job = state.jobs.get_mut(id)?;
		if let Some(status) = update.status {
			if status == JobStatus::Completed && job.completed_at.is_none() {
				job.completed_at = Some(Utc::now());
			}
			job.status = status;
		}
		if let Some(progress) = update.progress {
			job.progress = progress;
		}
		if let Some(current_step) = update.current_step {
			job.current_step = current_step;
		}
		if let Some(best_model_id) = update.best_model_id {
			job.best_model_id = Some(best_model_id);
		}
		if let Some(error) = update.error {
			job.error = Some(error);
		}
		Ok(job.clone())
	}

	fn list_training_jobs(&self, dataset_id: Option<Id>) -> Vec<TrainingJob> {
		self.state
			.read()
			.jobs
			.iter()
			.filter(|job| dataset_id.map_or(true, |dataset_id| job.dataset_id == dataset_id))
			.cloned()
			.collect()
	}

	fn create_visualization(&self, visualization: Visualization) -> RepositoryResult<()> {
		self.state
			.write()
			.visualizations
			.insert(visualization.id, visualization)
	}

	fn get_visualizations_by_model(&self, model_id: Id) -> Vec<Visualization> {
		self.state
			.read()
			.visualizations
			.iter()
			.filter(|visualization| visualization.model_id == model_id)
			.cloned()
			.collect()
	}
}

#[cfg(test)]
fn test_model(repository: &MemoryRepository, dataset_id: Id, job_id: Id) -> Model {
	use crate::model::{Hyperparameters, ModelType};
	let model = Model::new(
		dataset_id,
		job_id,
		ModelType::DecisionTree,
		ModelStatus::Training,
		Hyperparameters::default_for(ModelType::DecisionTree),
	);
	repository.create_model(model.clone()).unwrap();
	model
}

#[test]
fn test_job_completed_at() {
	let repository = MemoryRepository::new();
	let job = TrainingJob::new(Id::new());
	repository.create_training_job(job.clone()).unwrap();
	let updated = repository
		.update_training_job(
			job.id,
			TrainingJobUpdate {
				progress: Some(0.5),
				..Default::default()
			},
		)
		.unwrap();
	assert_eq!(updated.progress, 0.5);
	assert_eq!(updated.current_step, job.current_step);
	assert!(updated.completed_at.is_none());
	let completed = repository
		.update_training_job(
			job.id,
			TrainingJobUpdate {
				status: Some(JobStatus::Completed),
				..Default::default()
			},
		)
		.unwrap();
	let completed_at = completed.completed_at.unwrap();
	let again = repository
		.update_training_job(
			job.id,
			TrainingJobUpdate {
				status: Some(JobStatus::Completed),
				progress: Some(1.0),
				..Default::default()
			},
		)
		.unwrap();
	assert_eq!(again.completed_at, Some(completed_at));
	assert_eq!(again.progress, 1.0);
}

#[test]
fn test_failed_is_not_stamped() {
	let repository = MemoryRepository::new();
	let job = TrainingJob::new(Id::new());
	repository.create_training_job(job.clone()).unwrap();
	let failed = repository
		.update_training_job(
			job.id,
			TrainingJobUpdate {
				status: Some(JobStatus::Failed),
				error: Some("boom".to_owned()),
				..Default::default()
			},
		)
		.unwrap();
	assert!(failed.completed_at.is_none());
	assert_eq!(failed.error.as_deref(), Some("boom"));
	let model = test_model(&repository, job.dataset_id, job.id);
	let model = repository
		.update_model(
			model.id,
			ModelUpdate {
				status: Some(ModelStatus::Failed),
				..Default::default()
			},
		)
		.unwrap();
	assert!(model.completed_at.is_none());
	let model = repository
		.update_model(
			model.id,
			ModelUpdate {
				status: Some(ModelStatus::Completed),
				..Default::default()
			},
		)
		.unwrap();
	assert!(model.completed_at.is_some());
}

#[test]
fn test_missing_and_duplicate_ids() {
	let repository = MemoryRepository::new();
	let id = Id::new();
	assert!(repository.get_training_job(id).is_none());
	assert_eq!(
		repository
			.update_training_job(id, TrainingJobUpdate::default())
			.unwrap_err(),
		RepositoryError::NotFound {
			kind: RecordKind::TrainingJob,
			id
		}
	);
	assert!(matches!(
		repository.update_model(id, ModelUpdate::default()),
		Err(RepositoryError::NotFound {
			kind: RecordKind::Model,
			..
		})
	));
	let job = TrainingJob::new(Id::new());
	repository.create_training_job(job.clone()).unwrap();
	assert!(matches!(
		repository.create_training_job(job),
		Err(RepositoryError::AlreadyExists { .. })
	));
}

#[test]
fn test_listing_order() {
	let repository = MemoryRepository::new();
	let dataset_id = Id::new();
	let job_id = Id::new();
	let ids: Vec<Id> = (0..5)
		.map(|_| test_model(&repository, dataset_id, job_id).id)
		.collect();
	test_model(&repository, Id::new(), Id::new());
	let listed: Vec<Id> = repository
		.get_models_by_job(job_id)
		.into_iter()
		.map(|model| model.id)
		.collect();
	assert_eq!(listed, ids);
	assert_eq!(repository.get_models_by_dataset(dataset_id).len(), 5);
}
