use crate::{
	feature_importances::compute_feature_importances,
	train_tree::{train_tree, Criterion},
	MaxFeatures, Tree, TreeOptions,
};
use automl_util::progress_counter::ProgressCounter;
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;

/// These are the options passed to `RandomForestClassifier::train` and `RandomForestRegressor::train`.
#[derive(Clone, Debug, PartialEq)]
pub struct RandomForestOptions {
	/// The number of trees in the forest.
	pub n_estimators: usize,
	pub tree_options: TreeOptions,
	/// Each tree is trained on a bootstrap sample drawn with a generator seeded from this value and the tree's index, so training is deterministic regardless of how trees are scheduled across threads.
	pub seed: u64,
}

impl RandomForestOptions {
	pub fn classifier_default() -> Self {
		Self {
			n_estimators: 100,
			tree_options: TreeOptions {
				max_features: MaxFeatures::Sqrt,
				..Default::default()
			},
			seed: 42,
		}
	}

	pub fn regressor_default() -> Self {
		Self {
			n_estimators: 100,
			tree_options: TreeOptions::default(),
			seed: 42,
		}
	}
}

/// A random forest classifier averages the class probabilities of its trees.
#[derive(Clone, Debug)]
pub struct RandomForestClassifier {
	pub trees: Vec<Tree>,
	pub n_classes: usize,
	pub feature_importances: Vec<f32>,
}

/// A random forest regressor averages the predictions of its trees.
#[derive(Clone, Debug)]
pub struct RandomForestRegressor {
	pub trees: Vec<Tree>,
	pub feature_importances: Vec<f32>,
}

/// Train `options.n_estimators` trees in parallel, each on its own bootstrap sample.
fn train_trees(
	features: ArrayView2<f32>,
	criterion: &Criterion,
	options: &RandomForestOptions,
	progress_counter: &ProgressCounter,
) -> Vec<Tree> {
	let n_examples = features.nrows();
	(0..options.n_estimators)
		.into_par_iter()
		.map(|tree_index| {
			let mut rng =
				Xoshiro256Plus::seed_from_u64(options.seed.wrapping_add(tree_index.to_u64().unwrap()));
			let example_indexes = (0..n_examples)
				.map(|_| rng.gen_range(0, n_examples))
				.collect();
			let tree = train_tree(
				features,
				example_indexes,
				criterion,
				&options.tree_options,
				&mut rng,
			);
			progress_counter.inc(1);
			tree
		})
		.collect()
}

impl RandomForestClassifier {
	/// Train a random forest classifier. `labels` are 0-indexed and less than `n_classes`.
	pub fn train(
		features: ArrayView2<f32>,
		labels: ArrayView1<usize>,
		n_classes: usize,
		options: &RandomForestOptions,
		progress_counter: &ProgressCounter,
	) -> Self {
		let criterion = Criterion::Gini { labels, n_classes };
		let trees = train_trees(features, &criterion, options, progress_counter);
		let feature_importances = compute_feature_importances(&trees, features.ncols());
		Self {
			trees,
			n_classes,
			feature_importances,
		}
	}

	/// Write class probabilities into `probabilities`, which has shape (n_examples, n_classes).
	pub fn predict(&self, features: ArrayView2<f32>, mut probabilities: ArrayViewMut2<f32>) {
		let n_trees = self.trees.len().max(1).to_f32().unwrap();
		probabilities.fill(0.0);
		for (example, mut probabilities) in features
			.axis_iter(Axis(0))
			.zip(probabilities.axis_iter_mut(Axis(0)))
		{
			for tree in self.trees.iter() {
				for (probability, value) in probabilities.iter_mut().zip(tree.predict(example)) {
					*probability += *value;
				}
			}
			probabilities /= n_trees;
		}
	}
}

impl RandomForestRegressor {
	pub fn train(
		features: ArrayView2<f32>,
		labels: ArrayView1<f32>,
		options: &RandomForestOptions,
		progress_counter: &ProgressCounter,
	) -> Self {
		let criterion = Criterion::Variance { labels };
		let trees = train_trees(features, &criterion, options, progress_counter);
		let feature_importances = compute_feature_importances(&trees, features.ncols());
		Self {
			trees,
			feature_importances,
		}
	}

	/// Write predictions into `predictions` for the input `features`.
	pub fn predict(&self, features: ArrayView2<f32>, mut predictions: ArrayViewMut1<f32>) {
		let n_trees = self.trees.len().max(1).to_f32().unwrap();
		for (example, prediction) in features.axis_iter(Axis(0)).zip(predictions.iter_mut()) {
			*prediction = self
				.trees
				.iter()
				.map(|tree| tree.predict(example)[0])
				.sum::<f32>()
				/ n_trees;
		}
	}
}

#[test]
fn test_random_forest_classifier() {
	let n = 60;
	let features = Array2::from_shape_fn((n, 3), |(i, j)| match j {
		0 => (i % 2) as f32,
		_ => ((i * 7 + j * 3) % 5) as f32,
	});
	let labels = Array1::from_shape_fn(n, |i| i % 2);
	let options = RandomForestOptions {
		n_estimators: 10,
		..RandomForestOptions::classifier_default()
	};
	let progress_counter = ProgressCounter::new(10);
	let model = RandomForestClassifier::train(
		features.view(),
		labels.view(),
		2,
		&options,
		&progress_counter,
	);
	assert_eq!(progress_counter.fraction(), 1.0);
	assert_eq!(model.trees.len(), 10);
	let mut probabilities = Array2::zeros((n, 2));
	model.predict(features.view(), probabilities.view_mut());
	let mut n_correct = 0;
	for (probabilities, label) in probabilities.axis_iter(Axis(0)).zip(labels.iter()) {
		if crate::argmax(probabilities) == *label {
			n_correct += 1;
		}
		assert!((probabilities.sum() - 1.0).abs() < 1e-4);
	}
	assert!(n_correct >= 57);
	assert!(model.feature_importances[0] > 0.5);
	// Training with the same seed is deterministic.
	let other = RandomForestClassifier::train(
		features.view(),
		labels.view(),
		2,
		&options,
		&ProgressCounter::new(10),
	);
	assert_eq!(other.feature_importances, model.feature_importances);
}

#[test]
fn test_random_forest_regressor() {
	let features = Array2::from_shape_fn((40, 1), |(i, _)| i as f32);
	let labels = Array1::from_shape_fn(40, |i| if i < 20 { 0.0 } else { 10.0 });
	let options = RandomForestOptions {
		n_estimators: 5,
		..RandomForestOptions::regressor_default()
	};
	let model = RandomForestRegressor::train(
		features.view(),
		labels.view(),
		&options,
		&ProgressCounter::new(5),
	);
	let mut predictions = Array1::zeros(2);
	model.predict(arr2(&[[2.0], [37.0]]).view(), predictions.view_mut());
	assert!(predictions[0] < 1.0);
	assert!(predictions[1] > 9.0);
}
