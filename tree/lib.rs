/*!
This crate implements machine learning models for regression and classification built from decision trees: single [CART](https://en.wikipedia.org/wiki/Decision_tree_learning) trees, random forests, and gradient boosted trees in the style of [XGBoost](github.com/dmlc/xgboost). It is written in pure Rust.

Every model exposes a `train` function that reports progress through a `ProgressCounter`, a `predict` function, and normalized feature importances computed from the total gain of the splits that use each feature.
*/

#![allow(clippy::tabs_in_doc_comments)]

use ndarray::prelude::*;

mod decision_tree;
mod feature_importances;
mod gradient_boosting;
mod random_forest;
mod train_tree;

pub use self::decision_tree::{DecisionTreeClassifier, DecisionTreeRegressor};
pub use self::gradient_boosting::{
	GradientBoostingClassifier, GradientBoostingOptions, GradientBoostingRegressor,
};
pub use self::random_forest::{
	RandomForestClassifier, RandomForestOptions, RandomForestRegressor,
};

/// These options control the growth of a single tree.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeOptions {
	/// The depth of a single tree will never exceed this value. If it is `None`, trees grow until their leaves are pure or cannot be split.
	pub max_depth: Option<usize>,
	/// A node will only be split if it contains at least this many training examples.
	pub min_samples_split: usize,
	/// A split will only be considered valid if each of the resulting children receives at least this many training examples.
	pub min_samples_leaf: usize,
	/// The number of features considered when searching for the best split at each node.
	pub max_features: MaxFeatures,
}

impl Default for TreeOptions {
	fn default() -> Self {
		Self {
			max_depth: None,
			min_samples_split: 2,
			min_samples_leaf: 1,
			max_features: MaxFeatures::All,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MaxFeatures {
	All,
	/// The square root of the number of features, rounded down, and at least one.
	Sqrt,
	Count(usize),
}

impl MaxFeatures {
	pub fn resolve(self, n_features: usize) -> usize {
		let n = match self {
			MaxFeatures::All => n_features,
			MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
			MaxFeatures::Count(count) => count,
		};
		n.max(1).min(n_features.max(1))
	}
}

/// Trees are stored as a `Vec` of `Node`s. Each branch in the tree has two indexes into the `Vec`, one for each of its children. The root is at index 0.
#[derive(Clone, Debug)]
pub struct Tree {
	pub nodes: Vec<Node>,
}

impl Tree {
	/// Make a prediction for a given example. Classification trees output class probabilities, all other trees output a single value.
	pub fn predict(&self, example: ArrayView1<f32>) -> &[f32] {
		// Start at the root node.
		let mut node_index = 0;
		// Traverse the tree until we get to a leaf.
		loop {
			match &self.nodes[node_index] {
				Node::Branch(BranchNode {
					left_child_index,
					right_child_index,
					feature_index,
					split_value,
					..
				}) => {
					node_index = if example[*feature_index] <= *split_value {
						*left_child_index
					} else {
						*right_child_index
					};
				}
				Node::Leaf(LeafNode { value, .. }) => return value,
			}
		}
	}
}

/// A node is either a branch or a leaf.
#[derive(Clone, Debug)]
pub enum Node {
	Branch(BranchNode),
	Leaf(LeafNode),
}

impl Node {
	pub fn examples_fraction(&self) -> f32 {
		match self {
			Self::Leaf(LeafNode {
				examples_fraction, ..
			}) => *examples_fraction,
			Self::Branch(BranchNode {
				examples_fraction, ..
			}) => *examples_fraction,
		}
	}
}

/// A `BranchNode` is a branch in a tree. An example whose value for `feature_index` is <= `split_value` is sent to the left child, otherwise it is sent to the right child.
#[derive(Clone, Debug)]
pub struct BranchNode {
	pub left_child_index: usize,
	pub right_child_index: usize,
	pub feature_index: usize,
	pub split_value: f32,
	/// The decrease in impurity achieved by this split.
	pub gain: f32,
	/// The fraction of training examples that passed through this node during training.
	pub examples_fraction: f32,
}

/// The leaves in a tree hold the values to output for examples that get sent to them.
#[derive(Clone, Debug)]
pub struct LeafNode {
	pub value: Vec<f32>,
	/// The fraction of training examples that were sent to this leaf during training.
	pub examples_fraction: f32,
}

#[cfg(test)]
fn argmax(values: ArrayView1<f32>) -> usize {
	values
		.iter()
		.enumerate()
		.fold((0, std::f32::NEG_INFINITY), |best, (index, &value)| {
			if value > best.1 {
				(index, value)
			} else {
				best
			}
		})
		.0
}

#[test]
fn test_max_features() {
	assert_eq!(MaxFeatures::All.resolve(9), 9);
	assert_eq!(MaxFeatures::Sqrt.resolve(9), 3);
	assert_eq!(MaxFeatures::Sqrt.resolve(10), 3);
	assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
	assert_eq!(MaxFeatures::Count(20).resolve(4), 4);
}
