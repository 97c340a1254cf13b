use super::StreamingMetric;
use ndarray::prelude::*;
use num_traits::ToPrimitive;

/// `ClassificationMetrics` accumulates a confusion matrix from predicted and actual class indexes and computes the per-class and aggregate metrics from it.
pub struct ClassificationMetrics {
	/// The shape of the confusion matrix is (n_classes x n_classes).
	confusion_matrix: Array2<u64>,
}

pub struct ClassificationMetricsInput<'a> {
	/// (n_examples), 0-indexed
	pub predictions: &'a [usize],
	/// (n_examples), 0-indexed
	pub labels: &'a [usize],
}

#[derive(Debug)]
pub struct ClassificationMetricsOutput {
	/// Rows are actual classes, columns are predicted classes.
	pub confusion_matrix: Vec<Vec<u64>>,
	pub class_metrics: Vec<ClassMetrics>,
	pub accuracy: f32,
	pub precision_unweighted: f32,
	pub precision_weighted: f32,
	pub recall_unweighted: f32,
	pub recall_weighted: f32,
	pub f1_score_unweighted: f32,
	pub f1_score_weighted: f32,
	pub baseline_accuracy: f32,
}

#[derive(Debug)]
pub struct ClassMetrics {
	pub true_positives: u64,
	pub false_positives: u64,
	pub true_negatives: u64,
	pub false_negatives: u64,
	pub accuracy: f32,
	pub precision: f32,
	pub recall: f32,
	pub f1_score: f32,
}

impl ClassificationMetrics {
	pub fn new(n_classes: usize) -> Self {
		//                                             label     prediction
		//                                               |           |
		//                                               v           v
		let confusion_matrix = <Array2<u64>>::zeros((n_classes, n_classes));
		Self { confusion_matrix }
	}
}

impl<'a> StreamingMetric<'a> for ClassificationMetrics {
	type Input = ClassificationMetricsInput<'a>;
	type Output = ClassificationMetricsOutput;

	fn update(&mut self, value: ClassificationMetricsInput) {
		for (label, prediction) in value.labels.iter().zip(value.predictions.iter()) {
			self.confusion_matrix[(*label, *prediction)] += 1;
		}
	}

	fn merge(&mut self, other: Self) {
		self.confusion_matrix += &other.confusion_matrix;
	}

	fn finalize(self) -> ClassificationMetricsOutput {
		let n_classes = self.confusion_matrix.nrows();
		let n_examples = self.confusion_matrix.sum();
		let confusion_matrix = self.confusion_matrix;
		let class_metrics: Vec<_> = (0..n_classes)
			.map(|class_index| {
				let true_positives = confusion_matrix[(class_index, class_index)];
				let false_positives = confusion_matrix.column(class_index).sum() - true_positives;
				let false_negatives = confusion_matrix.row(class_index).sum() - true_positives;
				let true_negatives =
					n_examples - true_positives - false_positives - false_negatives;
				let accuracy = (true_positives + true_negatives).to_f32().unwrap()
					/ n_examples.to_f32().unwrap();
				let precision = ratio(true_positives, true_positives + false_positives);
				let recall = ratio(true_positives, true_positives + false_negatives);
				let f1_score = if precision + recall > 0.0 {
					2.0 * (precision * recall) / (precision + recall)
				} else {
					0.0
				};
				ClassMetrics {
					true_positives,
					false_positives,
					true_negatives,
					false_negatives,
					accuracy,
					precision,
					recall,
					f1_score,
				}
			})
			.collect();
		let n_correct: u64 = confusion_matrix.diag().sum();
		let accuracy = n_correct.to_f32().unwrap() / n_examples.to_f32().unwrap();
		let precision_unweighted = class_metrics
			.iter()
			.map(|class| class.precision)
			.sum::<f32>()
			/ n_classes.to_f32().unwrap();
		let recall_unweighted = class_metrics.iter().map(|class| class.recall).sum::<f32>()
			/ n_classes.to_f32().unwrap();
		let f1_score_unweighted = class_metrics
			.iter()
			.map(|class| class.f1_score)
			.sum::<f32>()
			/ n_classes.to_f32().unwrap();
		let n_examples_per_class = confusion_matrix.sum_axis(Axis(1));
		let weighted = |metric: fn(&ClassMetrics) -> f32| {
			class_metrics
				.iter()
				.zip(n_examples_per_class.iter())
				.map(|(class, &n_examples_in_class)| {
					metric(class) * n_examples_in_class.to_f32().unwrap()
				})
				.sum::<f32>()
				/ n_examples.to_f32().unwrap()
		};
		let precision_weighted = weighted(|class| class.precision);
		let recall_weighted = weighted(|class| class.recall);
		let f1_score_weighted = weighted(|class| class.f1_score);
		let baseline_accuracy = n_examples_per_class
			.iter()
			.copied()
			.max()
			.unwrap_or(0)
			.to_f32()
			.unwrap() / n_examples.to_f32().unwrap();
		let confusion_matrix = confusion_matrix
			.genrows()
			.into_iter()
			.map(|row| row.to_vec())
			.collect();
		ClassificationMetricsOutput {
			confusion_matrix,
			class_metrics,
			accuracy,
			precision_unweighted,
			precision_weighted,
			recall_unweighted,
			recall_weighted,
			f1_score_unweighted,
			f1_score_weighted,
			baseline_accuracy,
		}
	}
}

/// Precision and recall are reported as zero for classes that were never predicted or never seen.
fn ratio(numerator: u64, denominator: u64) -> f32 {
	if denominator == 0 {
		0.0
	} else {
		numerator.to_f32().unwrap() / denominator.to_f32().unwrap()
	}
}

#[test]
fn test_binary() {
	let mut metrics = ClassificationMetrics::new(2);
	let labels = [0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1];
	let predictions = [
		0, // correct
		0, // correct
		0, // correct
		0, // correct
		0, // correct
		1, // incorrect
		1, // incorrect
		1, // incorrect
		1, // correct
		1, // correct
		1, // correct
		0, // incorrect
		0, // incorrect
	];
	metrics.update(ClassificationMetricsInput {
		predictions: &predictions,
		labels: &labels,
	});
	let metrics = metrics.finalize();
	assert_eq!(metrics.confusion_matrix, vec![vec![5, 3], vec![2, 3]]);
	insta::assert_debug_snapshot!(metrics.class_metrics, @r###"
 [
     ClassMetrics {
         true_positives: 5,
         false_positives: 2,
         true_negatives: 3,
         false_negatives: 3,
         accuracy: 0.61538464,
         precision: 0.71428573,
         recall: 0.625,
         f1_score: 0.6666667,
     },
     ClassMetrics {
         true_positives: 3,
         false_positives: 3,
         true_negatives: 5,
         false_negatives: 2,
         accuracy: 0.61538464,
         precision: 0.5,
         recall: 0.6,
         f1_score: 0.54545456,
     },
 ]
 "###);
	assert!((metrics.accuracy - 0.61538464).abs() < 1e-6);
	assert!((metrics.precision_weighted - 0.6318681).abs() < 1e-6);
	assert!((metrics.recall_weighted - 0.61538464).abs() < 1e-6);
	assert!((metrics.f1_score_weighted - 0.6200466).abs() < 1e-5);
	assert!((metrics.baseline_accuracy - 0.61538464).abs() < 1e-6);
}

#[test]
fn test_multiclass() {
	// example taken from https://en.wikipedia.org/wiki/Confusion_matrix
	let mut metrics = ClassificationMetrics::new(3);
	let labels = [
		0, 0, 0, 0, 0, 1, 1, 0, 0, 0, 1, 1, 1, 2, 2, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
	];
	let predictions = [
		0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
	];
	metrics.update(ClassificationMetricsInput {
		predictions: &predictions,
		labels: &labels,
	});
	let metrics = metrics.finalize();
	assert_eq!(
		metrics.confusion_matrix,
		vec![vec![5, 3, 0], vec![2, 3, 1], vec![0, 2, 11]]
	);
	insta::assert_debug_snapshot!(metrics.class_metrics, @r###"
 [
     ClassMetrics {
         true_positives: 5,
         false_positives: 2,
         true_negatives: 17,
         false_negatives: 3,
         accuracy: 0.8148148,
         precision: 0.71428573,
         recall: 0.625,
         f1_score: 0.6666667,
     },
     ClassMetrics {
         true_positives: 3,
         false_positives: 5,
         true_negatives: 16,
         false_negatives: 3,
         accuracy: 0.7037037,
         precision: 0.375,
         recall: 0.5,
         f1_score: 0.42857143,
     },
     ClassMetrics {
         true_positives: 11,
         false_positives: 1,
         true_negatives: 13,
         false_negatives: 2,
         accuracy: 0.8888889,
         precision: 0.9166667,
         recall: 0.84615386,
         f1_score: 0.88,
     },
 ]
 "###);
	assert!((metrics.accuracy - 0.7037037).abs() < 1e-6);
	assert!((metrics.precision_weighted - 0.7363316).abs() < 1e-6);
	assert!((metrics.recall_weighted - 0.7037037).abs() < 1e-6);
	assert!((metrics.f1_score_weighted - 0.716473).abs() < 1e-5);
	assert!((metrics.baseline_accuracy - 0.4814815).abs() < 1e-6);
}

#[test]
fn test_unpredicted_class() {
	let mut metrics = ClassificationMetrics::new(2);
	metrics.update(ClassificationMetricsInput {
		predictions: &[0, 0, 0],
		labels: &[0, 1, 0],
	});
	let metrics = metrics.finalize();
	assert_eq!(metrics.class_metrics[1].precision, 0.0);
	assert_eq!(metrics.class_metrics[1].f1_score, 0.0);
	assert!(metrics.f1_score_weighted.is_finite());
}
