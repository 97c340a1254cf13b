use crate::{file_name, ingest_options, load_config, load_dataframe, TrainOptions};
use anyhow::{bail, Context, Result};
use automl_core::{
	dataset::{ingest, Dataset},
	job::JobStep,
	model::{Metrics, ModelStatus},
	progress::{JobProgress, ModelSummary},
	repository::{MemoryRepository, Repository},
	train::TrainingOrchestrator,
	visualization::Visualization,
	Id,
};
use colored::Colorize;
use std::{collections::BTreeMap, sync::Arc, time::Duration};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Everything known about a training run, written with `--output`.
#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
	dataset: Dataset,
	job: JobProgress,
	/// Keyed by model id.
	visualizations: BTreeMap<String, Vec<Visualization>>,
}

pub fn train(options: TrainOptions) -> Result<()> {
	let config = load_config(options.config.as_deref())?;
	let dataframe = load_dataframe(&options.file)?;
	let repository = Arc::new(MemoryRepository::new());
	let dataset = ingest(
		&*repository,
		&file_name(&options.file),
		dataframe,
		&ingest_options(options.target.clone(), &config),
	)?;
	eprintln!(
		"Training {} models to predict {}.",
		dataset.task_type.to_string().bold(),
		dataset.target_column.bold()
	);
	let orchestrator =
		TrainingOrchestrator::new(repository.clone()).with_options(config.train_options());
	let handle = orchestrator.start(dataset.id)?;
	let job_id = handle.job_id();

	if options.progress {
		let mut printer = ProgressPrinter::default();
		while !handle.is_finished() {
			printer.print(&orchestrator.progress(job_id)?);
			std::thread::sleep(POLL_INTERVAL);
		}
		printer.print(&orchestrator.progress(job_id)?);
	}
	let job_result = handle.wait();

	let progress = orchestrator.progress(job_id)?;
	print_comparison(&progress);
	if let Some(output) = options.output.as_ref() {
		write_report(&*repository, dataset.id, progress, output)?;
		eprintln!("The report was written to {}.", output.display());
	}
	let job = job_result?;
	if let Some(best_model_id) = job.best_model_id {
		let best = repository
			.get_model(best_model_id)
			.context("the best model is missing")?;
		eprintln!(
			"The best model is {} ({}).",
			best.model_type.to_string().green().bold(),
			best_model_id
		);
	} else {
		bail!("the job completed without a best model");
	}
	Ok(())
}

/// Prints a line whenever the job changes step or a model changes status.
#[derive(Default)]
struct ProgressPrinter {
	step: Option<JobStep>,
	model_statuses: BTreeMap<Id, ModelStatus>,
}

impl ProgressPrinter {
	fn print(&mut self, progress: &JobProgress) {
		if self.step != Some(progress.current_step) {
			self.step = Some(progress.current_step);
			eprintln!(
				"{} {} ({:.0}%)",
				"step".blue().bold(),
				progress.current_step,
				progress.progress * 100.0
			);
		}
		for model in progress.models.iter() {
			if self.model_statuses.get(&model.id) != Some(&model.status) {
				self.model_statuses.insert(model.id, model.status);
				let status = match model.status {
					ModelStatus::Pending => "pending".dimmed(),
					ModelStatus::Training => "training".yellow(),
					ModelStatus::Completed => "completed".green(),
					ModelStatus::Failed => "failed".red(),
				};
				eprintln!("  {} {}", model.model_type, status);
			}
		}
	}
}

fn print_comparison(progress: &JobProgress) {
	eprintln!();
	let header = format!(
		"{:<26}{:<12}{:<40}{:>10}",
		"model", "status", "metrics", "time (s)"
	);
	eprintln!("{}", header.bold());
	for model in progress.models.iter() {
		let marker = if Some(model.id) == progress.best_model_id {
			"*"
		} else {
			" "
		};
		eprintln!(
			"{}{:<25}{:<12}{:<40}{:>10}",
			marker,
			model.model_type.to_string(),
			format!("{:?}", model.status).to_lowercase(),
			format_metrics(model),
			model
				.training_time
				.map(|time| format!("{:.2}", time))
				.unwrap_or_default()
		);
	}
	if let Some(error) = progress.error.as_ref() {
		eprintln!("{}: {}", "job failed".red().bold(), error);
	}
	eprintln!();
}

fn format_metrics(model: &ModelSummary) -> String {
	match &model.metrics {
		Some(Metrics::Classification(metrics)) => format!(
			"accuracy {:.4} f1 {:.4} auc {:.4}",
			metrics.accuracy, metrics.f1_score, metrics.auc_roc
		),
		Some(Metrics::Regression(metrics)) => format!(
			"r2 {:.4} rmse {:.4} mae {:.4}",
			metrics.r2_score, metrics.rmse, metrics.mae
		),
		None => String::new(),
	}
}

fn write_report(
	repository: &dyn Repository,
	dataset_id: Id,
	job: JobProgress,
	output: &std::path::Path,
) -> Result<()> {
	let dataset = repository
		.get_dataset(dataset_id)
		.context("the dataset is missing")?;
	let visualizations = job
		.models
		.iter()
		.map(|model| {
			(
				model.id.to_string(),
				repository.get_visualizations_by_model(model.id),
			)
		})
		.collect();
	let report = Report {
		dataset,
		job,
		visualizations,
	};
	let file = std::fs::File::create(output)
		.with_context(|| format!("failed to create {}", output.display()))?;
	serde_json::to_writer_pretty(std::io::BufWriter::new(file), &report)?;
	tracing::info!(path = %output.display(), "wrote report");
	Ok(())
}
