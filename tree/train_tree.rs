use crate::{BranchNode, LeafNode, Node, Tree, TreeOptions};
use itertools::izip;
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use rand::seq::index::sample;
use rand::Rng;
use std::cmp::Ordering;

/// The `Criterion` determines the statistics accumulated for each node, how good a node's examples are grouped, and what value a leaf outputs.
pub enum Criterion<'a> {
	/// Classification trees minimize the gini impurity. Stats are the count of examples per class.
	Gini {
		labels: ArrayView1<'a, usize>,
		n_classes: usize,
	},
	/// Regression trees minimize the sum of squared errors. Stats are `[n, sum, sum of squares]`.
	Variance { labels: ArrayView1<'a, f32> },
	/// Gradient boosted trees maximize the second order gain. Stats are `[sum of gradients, sum of hessians]`.
	SecondOrder {
		gradients: &'a [f32],
		hessians: &'a [f32],
		l2_regularization: f32,
		min_child_weight: f32,
		learning_rate: f32,
	},
}

impl<'a> Criterion<'a> {
	fn n_stats(&self) -> usize {
		match self {
			Criterion::Gini { n_classes, .. } => *n_classes,
			Criterion::Variance { .. } => 3,
			Criterion::SecondOrder { .. } => 2,
		}
	}

	fn add(&self, stats: &mut [f64], example_index: usize) {
		match self {
			Criterion::Gini { labels, .. } => {
				stats[labels[example_index]] += 1.0;
			}
			Criterion::Variance { labels } => {
				let label = labels[example_index].to_f64().unwrap();
				stats[0] += 1.0;
				stats[1] += label;
				stats[2] += label * label;
			}
			Criterion::SecondOrder {
				gradients,
				hessians,
				..
			} => {
				stats[0] += gradients[example_index].to_f64().unwrap();
				stats[1] += hessians[example_index].to_f64().unwrap();
			}
		}
	}

	/// The impurity of a node with `stats`, scaled by the node's size. A split's gain is the parent's score minus the children's scores.
	fn score(&self, stats: &[f64]) -> f64 {
		match self {
			Criterion::Gini { .. } => {
				let n = stats.iter().sum::<f64>();
				if n == 0.0 {
					return 0.0;
				}
				n - stats.iter().map(|count| count * count).sum::<f64>() / n
			}
			Criterion::Variance { .. } => {
				if stats[0] == 0.0 {
					return 0.0;
				}
				(stats[2] - stats[1] * stats[1] / stats[0]).max(0.0)
			}
			Criterion::SecondOrder {
				l2_regularization, ..
			} => -(stats[0] * stats[0]) / (stats[1] + l2_regularization.to_f64().unwrap()),
		}
	}

	fn is_valid_child(&self, stats: &[f64]) -> bool {
		match self {
			Criterion::SecondOrder {
				min_child_weight, ..
			} => stats[1] >= min_child_weight.to_f64().unwrap(),
			_ => true,
		}
	}

	fn is_pure(&self, stats: &[f64]) -> bool {
		match self {
			Criterion::Gini { .. } => stats.iter().filter(|count| **count > 0.0).count() <= 1,
			Criterion::Variance { .. } => self.score(stats) <= std::f64::EPSILON,
			Criterion::SecondOrder { .. } => false,
		}
	}

	fn leaf_value(&self, stats: &[f64]) -> Vec<f32> {
		match self {
			Criterion::Gini { .. } => {
				let n = stats.iter().sum::<f64>();
				stats
					.iter()
					.map(|count| if n > 0.0 { (count / n) as f32 } else { 0.0 })
					.collect()
			}
			Criterion::Variance { .. } => {
				let mean = if stats[0] > 0.0 {
					stats[1] / stats[0]
				} else {
					0.0
				};
				vec![mean as f32]
			}
			Criterion::SecondOrder {
				l2_regularization,
				learning_rate,
				..
			} => {
				let value = -stats[0] / (stats[1] + l2_regularization.to_f64().unwrap());
				vec![(value * learning_rate.to_f64().unwrap()) as f32]
			}
		}
	}
}

struct Split {
	feature_index: usize,
	split_value: f32,
	gain: f64,
}

struct TreeBuilder<'a, 'b, 'c, R: Rng> {
	features: ArrayView2<'a, f32>,
	criterion: &'b Criterion<'c>,
	options: &'b TreeOptions,
	n_features_per_split: usize,
	n_root_examples: f32,
	rng: &'b mut R,
	nodes: Vec<Node>,
}

/// Grow a single tree on the examples at `example_indexes`. The same example may appear more than once, as it does in a bootstrap sample.
pub fn train_tree<R: Rng>(
	features: ArrayView2<f32>,
	example_indexes: Vec<usize>,
	criterion: &Criterion,
	options: &TreeOptions,
	rng: &mut R,
) -> Tree {
	let n_features_per_split = options.max_features.resolve(features.ncols());
	let n_root_examples = example_indexes.len().max(1).to_f32().unwrap();
	let mut builder = TreeBuilder {
		features,
		criterion,
		options,
		n_features_per_split,
		n_root_examples,
		rng,
		nodes: Vec::new(),
	};
	builder.grow(example_indexes, 0);
	Tree {
		nodes: builder.nodes,
	}
}

impl<'a, 'b, 'c, R: Rng> TreeBuilder<'a, 'b, 'c, R> {
	/// Add the node for `example_indexes` and its descendants, returning the new node's index.
	fn grow(&mut self, example_indexes: Vec<usize>, depth: usize) -> usize {
		let mut stats = vec![0.0; self.criterion.n_stats()];
		for example_index in example_indexes.iter() {
			self.criterion.add(&mut stats, *example_index);
		}
		let examples_fraction = example_indexes.len().to_f32().unwrap() / self.n_root_examples;
		let node_index = self.nodes.len();
		let leaf = Node::Leaf(LeafNode {
			value: self.criterion.leaf_value(&stats),
			examples_fraction,
		});
		self.nodes.push(leaf);
		let can_split = self
			.options
			.max_depth
			.map(|max_depth| depth < max_depth)
			.unwrap_or(true)
			&& example_indexes.len() >= self.options.min_samples_split.max(2)
			&& example_indexes.len() >= 2 * self.options.min_samples_leaf.max(1)
			&& !self.criterion.is_pure(&stats);
		if !can_split {
			return node_index;
		}
		let split = match self.choose_best_split(&example_indexes, &stats) {
			Some(split) => split,
			None => return node_index,
		};
		let (left_examples, right_examples): (Vec<usize>, Vec<usize>) = example_indexes
			.into_iter()
			.partition(|example_index| {
				self.features[(*example_index, split.feature_index)] <= split.split_value
			});
		let left_child_index = self.grow(left_examples, depth + 1);
		let right_child_index = self.grow(right_examples, depth + 1);
		self.nodes[node_index] = Node::Branch(BranchNode {
			left_child_index,
			right_child_index,
			feature_index: split.feature_index,
			split_value: split.split_value,
			gain: split.gain.to_f32().unwrap(),
			examples_fraction,
		});
		node_index
	}

	/// Find the split with the largest gain over a random sample of `n_features_per_split` features. If none of the sampled features admits a valid split, the remaining features are inspected until one does. Ties keep the first split found.
	fn choose_best_split(&mut self, example_indexes: &[usize], stats: &[f64]) -> Option<Split> {
		let n_features = self.features.ncols();
		let feature_indexes: Vec<usize> = if self.n_features_per_split < n_features {
			sample(&mut *self.rng, n_features, n_features).into_vec()
		} else {
			(0..n_features).collect()
		};
		let parent_score = self.criterion.score(stats);
		let min_samples_leaf = self.options.min_samples_leaf.max(1);
		let n_examples = example_indexes.len();
		let mut best: Option<Split> = None;
		let mut sorted: Vec<(f32, usize)> = Vec::with_capacity(n_examples);
		let mut left = vec![0.0; stats.len()];
		let mut right = vec![0.0; stats.len()];
		for (n_inspected, feature_index) in feature_indexes.into_iter().enumerate() {
			if n_inspected >= self.n_features_per_split && best.is_some() {
				break;
			}
			sorted.clear();
			let features = self.features;
			sorted.extend(example_indexes.iter().map(|example_index| {
				(features[(*example_index, feature_index)], *example_index)
			}));
			sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
			left.iter_mut().for_each(|value| *value = 0.0);
			for i in 0..n_examples - 1 {
				self.criterion.add(&mut left, sorted[i].1);
				let (value, next_value) = (sorted[i].0, sorted[i + 1].0);
				if value == next_value {
					continue;
				}
				let n_left = i + 1;
				let n_right = n_examples - n_left;
				if n_left < min_samples_leaf || n_right < min_samples_leaf {
					continue;
				}
				for (right_stat, total_stat, left_stat) in izip!(right.iter_mut(), stats, left.iter()) {
					*right_stat = total_stat - left_stat;
				}
				if !self.criterion.is_valid_child(&left) || !self.criterion.is_valid_child(&right)
				{
					continue;
				}
				let gain =
					parent_score - self.criterion.score(&left) - self.criterion.score(&right);
				let is_better = match &best {
					Some(best) => gain > best.gain,
					None => gain > 1e-9,
				};
				if is_better {
					let midpoint = value + (next_value - value) / 2.0;
					let split_value = if midpoint < next_value { midpoint } else { value };
					best = Some(Split {
						feature_index,
						split_value,
						gain,
					});
				}
			}
		}
		best
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use rand::SeedableRng;
	use rand_xoshiro::Xoshiro256Plus;

	#[test]
	fn test_gini_split() {
		let features = arr2(&[[1.0, 5.0], [2.0, 5.0], [3.0, 5.0], [4.0, 5.0]]);
		let labels = arr1(&[0, 0, 1, 1]);
		let criterion = Criterion::Gini {
			labels: labels.view(),
			n_classes: 2,
		};
		let mut rng = Xoshiro256Plus::seed_from_u64(42);
		let tree = train_tree(
			features.view(),
			(0..4).collect(),
			&criterion,
			&TreeOptions::default(),
			&mut rng,
		);
		assert_eq!(tree.nodes.len(), 3);
		match &tree.nodes[0] {
			Node::Branch(branch) => {
				assert_eq!(branch.feature_index, 0);
				assert_eq!(branch.split_value, 2.5);
				assert!((branch.gain - 2.0).abs() < 1e-6);
			}
			Node::Leaf(_) => panic!("expected a branch"),
		}
		assert_eq!(tree.predict(arr1(&[1.5, 0.0]).view()), &[1.0, 0.0]);
		assert_eq!(tree.predict(arr1(&[3.5, 0.0]).view()), &[0.0, 1.0]);
	}

	#[test]
	fn test_max_depth_and_min_samples_leaf() {
		let features = Array2::from_shape_fn((8, 1), |(i, _)| i as f32);
		let labels = Array1::from_shape_fn(8, |i| i as f32);
		let criterion = Criterion::Variance {
			labels: labels.view(),
		};
		let mut rng = Xoshiro256Plus::seed_from_u64(42);
		let options = TreeOptions {
			max_depth: Some(1),
			..Default::default()
		};
		let tree = train_tree(features.view(), (0..8).collect(), &criterion, &options, &mut rng);
		assert_eq!(tree.nodes.len(), 3);
		assert_eq!(tree.predict(arr1(&[0.0]).view()), &[1.5]);
		assert_eq!(tree.predict(arr1(&[7.0]).view()), &[5.5]);
		let options = TreeOptions {
			min_samples_leaf: 4,
			..Default::default()
		};
		let tree = train_tree(features.view(), (0..8).collect(), &criterion, &options, &mut rng);
		assert_eq!(tree.nodes.len(), 3);
	}

	#[test]
	fn test_second_order_tree_with_round_local_gradients() {
		let features = Array2::from_shape_fn((6, 1), |(i, _)| i as f32);
		let mut rng = Xoshiro256Plus::seed_from_u64(42);
		let options = TreeOptions {
			max_depth: Some(1),
			..Default::default()
		};
		// The gradients live for one boosting round while the features outlive every tree.
		let tree = {
			let gradients = vec![-1.0, -1.0, -1.0, 1.0, 1.0, 1.0];
			let hessians = vec![1.0; 6];
			let criterion = Criterion::SecondOrder {
				gradients: &gradients,
				hessians: &hessians,
				l2_regularization: 0.0,
				min_child_weight: 1.0,
				learning_rate: 1.0,
			};
			train_tree(features.view(), (0..6).collect(), &criterion, &options, &mut rng)
		};
		assert_eq!(tree.nodes.len(), 3);
		assert_eq!(tree.predict(arr1(&[0.0]).view()), &[1.0]);
		assert_eq!(tree.predict(arr1(&[5.0]).view()), &[-1.0]);
	}
}
