use crate::{BranchNode, Node, Tree};

/// This function computes feature importances using the "gain" method, where a feature's importance is proportional to the total decrease in impurity of the branches that split on it. The importances sum to one unless no tree contains a branch, in which case they are all zero.
pub fn compute_feature_importances(trees: &[Tree], n_features: usize) -> Vec<f32> {
	let mut feature_importances = vec![0.0f64; n_features];
	for tree in trees.iter() {
		for node in tree.nodes.iter() {
			if let Node::Branch(BranchNode {
				feature_index,
				gain,
				..
			}) = node
			{
				feature_importances[*feature_index] += f64::from(*gain);
			}
		}
	}
	// Normalize the feature importances.
	let total: f64 = feature_importances.iter().sum();
	feature_importances
		.into_iter()
		.map(|feature_importance| {
			if total > 0.0 {
				(feature_importance / total) as f32
			} else {
				0.0
			}
		})
		.collect()
}

#[test]
fn test_feature_importances() {
	use crate::LeafNode;
	let leaf = || {
		Node::Leaf(LeafNode {
			value: vec![0.0],
			examples_fraction: 0.5,
		})
	};
	let tree = Tree {
		nodes: vec![
			Node::Branch(BranchNode {
				left_child_index: 1,
				right_child_index: 2,
				feature_index: 2,
				split_value: 0.0,
				gain: 3.0,
				examples_fraction: 1.0,
			}),
			leaf(),
			Node::Branch(BranchNode {
				left_child_index: 3,
				right_child_index: 4,
				feature_index: 0,
				split_value: 0.0,
				gain: 1.0,
				examples_fraction: 0.5,
			}),
			leaf(),
			leaf(),
		],
	};
	assert_eq!(
		compute_feature_importances(&[tree], 3),
		vec![0.25, 0.0, 0.75]
	);
	assert_eq!(compute_feature_importances(&[], 2), vec![0.0, 0.0]);
}
