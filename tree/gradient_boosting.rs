use crate::{
	feature_importances::compute_feature_importances,
	train_tree::{train_tree, Criterion},
	MaxFeatures, Tree, TreeOptions,
};
use automl_util::progress_counter::ProgressCounter;
use itertools::izip;
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;

/// These are the options passed to `GradientBoostingClassifier::train` and `GradientBoostingRegressor::train`.
#[derive(Clone, Debug, PartialEq)]
pub struct GradientBoostingOptions {
	/// The number of rounds of boosting. Classifiers train one tree per class in each round.
	pub n_estimators: usize,
	/// The learning rate scales the leaf values to control the effect each tree has on the output.
	pub learning_rate: f32,
	/// The depth of a single tree will never exceed this value.
	pub max_depth: usize,
	/// A split will only be considered valid if the sum of hessians in each of the resulting children is at least this value.
	pub min_child_weight: f32,
	/// This is the L2 regularization applied to leaf values.
	pub l2_regularization: f32,
}

impl Default for GradientBoostingOptions {
	fn default() -> Self {
		Self {
			n_estimators: 100,
			learning_rate: 0.1,
			max_depth: 6,
			min_child_weight: 1.0,
			l2_regularization: 1.0,
		}
	}
}

impl GradientBoostingOptions {
	fn tree_options(&self) -> TreeOptions {
		TreeOptions {
			max_depth: Some(self.max_depth),
			min_samples_split: 2,
			min_samples_leaf: 1,
			max_features: MaxFeatures::All,
		}
	}
}

/// A gradient boosted classifier minimizes the softmax cross entropy. Each round adds one tree per class.
#[derive(Clone, Debug)]
pub struct GradientBoostingClassifier {
	/// (n_classes)
	pub biases: Array1<f32>,
	/// (n_rounds, n_classes)
	pub trees: Vec<Vec<Tree>>,
	pub feature_importances: Vec<f32>,
}

/// A gradient boosted regressor minimizes the squared error.
#[derive(Clone, Debug)]
pub struct GradientBoostingRegressor {
	pub bias: f32,
	pub trees: Vec<Tree>,
	pub feature_importances: Vec<f32>,
}

const MIN_HESSIAN: f32 = 1e-6;

impl GradientBoostingClassifier {
	/// Train a gradient boosted classifier. `labels` are 0-indexed and less than `n_classes`. `progress_counter` is incremented once per round.
	pub fn train(
		features: ArrayView2<f32>,
		labels: ArrayView1<usize>,
		n_classes: usize,
		options: &GradientBoostingOptions,
		progress_counter: &ProgressCounter,
	) -> Self {
		let n_examples = features.nrows();
		let tree_options = options.tree_options();
		// The biases are the log of each class's frequency.
		let mut class_counts = vec![0usize; n_classes];
		for label in labels.iter() {
			class_counts[*label] += 1;
		}
		let biases: Array1<f32> = class_counts
			.iter()
			.map(|count| {
				let frequency = count.to_f32().unwrap() / n_examples.max(1).to_f32().unwrap();
				frequency.max(MIN_HESSIAN).ln()
			})
			.collect();
		let mut logits = Array2::from_shape_fn((n_examples, n_classes), |(_, class_index)| {
			biases[class_index]
		});
		let mut probabilities = logits.clone();
		let mut trees: Vec<Vec<Tree>> = Vec::with_capacity(options.n_estimators);
		for _ in 0..options.n_estimators {
			probabilities.assign(&logits);
			softmax(probabilities.view_mut());
			let round_trees: Vec<Tree> = (0..n_classes)
				.into_par_iter()
				.map(|class_index| {
					let class_probabilities = probabilities.column(class_index);
					let gradients: Vec<f32> = izip!(class_probabilities.iter(), labels.iter())
						.map(|(probability, label)| {
							probability - if *label == class_index { 1.0 } else { 0.0 }
						})
						.collect();
					let hessians: Vec<f32> = class_probabilities
						.iter()
						.map(|probability| (probability * (1.0 - probability)).max(MIN_HESSIAN))
						.collect();
					let criterion = Criterion::SecondOrder {
						gradients: &gradients,
						hessians: &hessians,
						l2_regularization: options.l2_regularization,
						min_child_weight: options.min_child_weight,
						learning_rate: options.learning_rate,
					};
					let mut rng = Xoshiro256Plus::seed_from_u64(class_index.to_u64().unwrap());
					train_tree(
						features,
						(0..n_examples).collect(),
						&criterion,
						&tree_options,
						&mut rng,
					)
				})
				.collect();
			for (example, mut logits) in features.axis_iter(Axis(0)).zip(logits.axis_iter_mut(Axis(0)))
			{
				for (logit, tree) in logits.iter_mut().zip(round_trees.iter()) {
					*logit += tree.predict(example)[0];
				}
			}
			trees.push(round_trees);
			progress_counter.inc(1);
		}
		let all_trees: Vec<Tree> = trees.iter().flatten().cloned().collect();
		let feature_importances = compute_feature_importances(&all_trees, features.ncols());
		Self {
			biases,
			trees,
			feature_importances,
		}
	}

	/// Write class probabilities into `probabilities`, which has shape (n_examples, n_classes).
	pub fn predict(&self, features: ArrayView2<f32>, mut probabilities: ArrayViewMut2<f32>) {
		for (example, mut logits) in features
			.axis_iter(Axis(0))
			.zip(probabilities.axis_iter_mut(Axis(0)))
		{
			logits.assign(&self.biases);
			for round_trees in self.trees.iter() {
				for (logit, tree) in logits.iter_mut().zip(round_trees.iter()) {
					*logit += tree.predict(example)[0];
				}
			}
		}
		softmax(probabilities);
	}
}

impl GradientBoostingRegressor {
	pub fn train(
		features: ArrayView2<f32>,
		labels: ArrayView1<f32>,
		options: &GradientBoostingOptions,
		progress_counter: &ProgressCounter,
	) -> Self {
		let n_examples = features.nrows();
		let tree_options = options.tree_options();
		let bias = labels.mean().unwrap_or(0.0);
		let mut predictions = Array1::from_elem(n_examples, bias);
		let hessians = vec![1.0; n_examples];
		let mut rng = Xoshiro256Plus::seed_from_u64(0);
		let mut trees = Vec::with_capacity(options.n_estimators);
		for _ in 0..options.n_estimators {
			let gradients: Vec<f32> = izip!(predictions.iter(), labels.iter())
				.map(|(prediction, label)| prediction - label)
				.collect();
			let criterion = Criterion::SecondOrder {
				gradients: &gradients,
				hessians: &hessians,
				l2_regularization: options.l2_regularization,
				min_child_weight: options.min_child_weight,
				learning_rate: options.learning_rate,
			};
			let tree = train_tree(
				features,
				(0..n_examples).collect(),
				&criterion,
				&tree_options,
				&mut rng,
			);
			for (example, prediction) in features.axis_iter(Axis(0)).zip(predictions.iter_mut()) {
				*prediction += tree.predict(example)[0];
			}
			trees.push(tree);
			progress_counter.inc(1);
		}
		let feature_importances = compute_feature_importances(&trees, features.ncols());
		Self {
			bias,
			trees,
			feature_importances,
		}
	}

	/// Write predictions into `predictions` for the input `features`.
	pub fn predict(&self, features: ArrayView2<f32>, mut predictions: ArrayViewMut1<f32>) {
		for (example, prediction) in features.axis_iter(Axis(0)).zip(predictions.iter_mut()) {
			*prediction = self.bias
				+ self
					.trees
					.iter()
					.map(|tree| tree.predict(example)[0])
					.sum::<f32>();
		}
	}
}

fn softmax(mut logits: ArrayViewMut2<f32>) {
	for mut logits in logits.genrows_mut() {
		let max = logits.iter().fold(std::f32::MIN, |a, &b| a.max(b));
		logits -= max;
		logits.mapv_inplace(|l| l.exp());
		let sum = logits.iter().fold(0.0, |a, b| a + b);
		logits /= sum;
	}
}

#[test]
fn test_gradient_boosting_classifier() {
	let n = 60;
	let features = Array2::from_shape_fn((n, 2), |(i, j)| {
		if j == 0 {
			(i % 3) as f32
		} else {
			(i % 4) as f32
		}
	});
	let labels = Array1::from_shape_fn(n, |i| i % 3);
	let options = GradientBoostingOptions {
		n_estimators: 20,
		..Default::default()
	};
	let progress_counter = ProgressCounter::new(20);
	let model = GradientBoostingClassifier::train(
		features.view(),
		labels.view(),
		3,
		&options,
		&progress_counter,
	);
	assert_eq!(progress_counter.fraction(), 1.0);
	assert_eq!(model.trees.len(), 20);
	assert_eq!(model.trees[0].len(), 3);
	let mut probabilities = Array2::zeros((n, 3));
	model.predict(features.view(), probabilities.view_mut());
	for (probabilities, label) in probabilities.axis_iter(Axis(0)).zip(labels.iter()) {
		assert_eq!(crate::argmax(probabilities), *label);
		assert!((probabilities.sum() - 1.0).abs() < 1e-4);
	}
	assert!(model.feature_importances[0] > 0.9);
}

#[test]
fn test_gradient_boosting_regressor() {
	let features = Array2::from_shape_fn((50, 1), |(i, _)| i as f32);
	let labels = features.column(0).mapv(|x| if x < 25.0 { -1.0 } else { 1.0 });
	let progress_counter = ProgressCounter::new(100);
	let model = GradientBoostingRegressor::train(
		features.view(),
		labels.view(),
		&GradientBoostingOptions::default(),
		&progress_counter,
	);
	let mut predictions = Array1::zeros(50);
	model.predict(features.view(), predictions.view_mut());
	for (prediction, label) in predictions.iter().zip(labels.iter()) {
		assert!((prediction - label).abs() < 0.1);
	}
	assert_eq!(model.feature_importances, vec![1.0]);
}
