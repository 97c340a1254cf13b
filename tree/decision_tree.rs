use crate::{
	feature_importances::compute_feature_importances,
	train_tree::{train_tree, Criterion},
	Tree, TreeOptions,
};
use automl_util::progress_counter::ProgressCounter;
use ndarray::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

/// A single classification tree, grown by minimizing the gini impurity.
#[derive(Clone, Debug)]
pub struct DecisionTreeClassifier {
	pub tree: Tree,
	pub n_classes: usize,
	pub feature_importances: Vec<f32>,
}

/// A single regression tree, grown by minimizing the squared error.
#[derive(Clone, Debug)]
pub struct DecisionTreeRegressor {
	pub tree: Tree,
	pub feature_importances: Vec<f32>,
}

impl DecisionTreeClassifier {
	/// Train a decision tree classifier. `labels` are 0-indexed and less than `n_classes`.
	pub fn train(
		features: ArrayView2<f32>,
		labels: ArrayView1<usize>,
		n_classes: usize,
		options: &TreeOptions,
		seed: u64,
		progress_counter: &ProgressCounter,
	) -> Self {
		let criterion = Criterion::Gini { labels, n_classes };
		let mut rng = Xoshiro256Plus::seed_from_u64(seed);
		let tree = train_tree(
			features,
			(0..features.nrows()).collect(),
			&criterion,
			options,
			&mut rng,
		);
		progress_counter.set(progress_counter.total());
		let feature_importances =
			compute_feature_importances(std::slice::from_ref(&tree), features.ncols());
		Self {
			tree,
			n_classes,
			feature_importances,
		}
	}

	/// Write class probabilities into `probabilities`, which has shape (n_examples, n_classes).
	pub fn predict(&self, features: ArrayView2<f32>, mut probabilities: ArrayViewMut2<f32>) {
		for (example, mut probabilities) in features
			.axis_iter(Axis(0))
			.zip(probabilities.axis_iter_mut(Axis(0)))
		{
			for (probability, value) in probabilities.iter_mut().zip(self.tree.predict(example)) {
				*probability = *value;
			}
		}
	}
}

impl DecisionTreeRegressor {
	pub fn train(
		features: ArrayView2<f32>,
		labels: ArrayView1<f32>,
		options: &TreeOptions,
		seed: u64,
		progress_counter: &ProgressCounter,
	) -> Self {
		let criterion = Criterion::Variance { labels };
		let mut rng = Xoshiro256Plus::seed_from_u64(seed);
		let tree = train_tree(
			features,
			(0..features.nrows()).collect(),
			&criterion,
			options,
			&mut rng,
		);
		progress_counter.set(progress_counter.total());
		let feature_importances =
			compute_feature_importances(std::slice::from_ref(&tree), features.ncols());
		Self {
			tree,
			feature_importances,
		}
	}

	/// Write predictions into `predictions` for the input `features`.
	pub fn predict(&self, features: ArrayView2<f32>, mut predictions: ArrayViewMut1<f32>) {
		for (example, prediction) in features.axis_iter(Axis(0)).zip(predictions.iter_mut()) {
			*prediction = self.tree.predict(example)[0];
		}
	}
}

#[test]
fn test_decision_tree_classifier() {
	let features = arr2(&[
		[0.0, 1.0],
		[0.1, 1.0],
		[0.2, 0.0],
		[0.9, 0.0],
		[1.0, 1.0],
		[1.1, 0.0],
	]);
	let labels = arr1(&[0, 0, 0, 1, 1, 1]);
	let progress_counter = ProgressCounter::new(1);
	let model = DecisionTreeClassifier::train(
		features.view(),
		labels.view(),
		2,
		&TreeOptions::default(),
		42,
		&progress_counter,
	);
	assert_eq!(progress_counter.fraction(), 1.0);
	assert_eq!(model.feature_importances, vec![1.0, 0.0]);
	let mut probabilities = Array2::zeros((2, 2));
	model.predict(arr2(&[[0.05, 0.0], [0.95, 1.0]]).view(), probabilities.view_mut());
	assert_eq!(crate::argmax(probabilities.row(0)), 0);
	assert_eq!(crate::argmax(probabilities.row(1)), 1);
}

#[test]
fn test_decision_tree_regressor() {
	let features = Array2::from_shape_fn((20, 1), |(i, _)| i as f32);
	let labels = Array1::from_shape_fn(20, |i| if i < 10 { 1.0 } else { 3.0 });
	let progress_counter = ProgressCounter::new(1);
	let model = DecisionTreeRegressor::train(
		features.view(),
		labels.view(),
		&TreeOptions::default(),
		42,
		&progress_counter,
	);
	let mut predictions = Array1::zeros(2);
	model.predict(arr2(&[[2.0], [15.0]]).view(), predictions.view_mut());
	assert_eq!(predictions, arr1(&[1.0, 3.0]));
}
