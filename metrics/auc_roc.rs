use num_traits::ToPrimitive;
use std::cmp::Ordering;

#[derive(Clone, Debug, PartialEq)]
pub struct RocCurvePoint {
	/// The classification threshold.
	pub threshold: f32,
	/// The true positive rate for all predictions with probability >= threshold.
	pub true_positive_rate: f32,
	/// The false positive rate for all predictions with probability >= threshold.
	pub false_positive_rate: f32,
}

/// This function computes the area under the receiver operating characteristic curve using the trapezoidal rule.
pub fn auc_roc(probabilities: &[f32], labels: &[bool]) -> f32 {
	let roc_curve = compute_roc_curve(probabilities, labels);
	roc_curve
		.windows(2)
		.map(|window| {
			let left = &window[0];
			let right = &window[1];
			let y_average = (left.true_positive_rate + right.true_positive_rate) / 2.0;
			let dx = right.false_positive_rate - left.false_positive_rate;
			y_average * dx
		})
		.sum()
}

/**
This function computes the ROC curve for a single positive class. The ROC curve plots the false positive rate on the x axis and the true positive rate on the y axis for each distinct classification threshold, starting at (0, 0).

A rate whose denominator is zero, because the labels contain no positives or no negatives, is reported as zero.
*/
pub fn compute_roc_curve(probabilities: &[f32], labels: &[bool]) -> Vec<RocCurvePoint> {
	let mut tps_fps = compute_tps_fps_by_threshold(probabilities, labels);
	for i in 1..tps_fps.len() {
		tps_fps[i].true_positives += tps_fps[i - 1].true_positives;
		tps_fps[i].false_positives += tps_fps[i - 1].false_positives;
	}
	let count_positives = labels.iter().filter(|label| **label).count();
	let count_negatives = labels.len() - count_positives;
	let rate = |count: usize, total: usize| {
		if total == 0 {
			0.0
		} else {
			count.to_f32().unwrap() / total.to_f32().unwrap()
		}
	};
	let mut roc_curve = vec![RocCurvePoint {
		threshold: 1.0,
		true_positive_rate: 0.0,
		false_positive_rate: 0.0,
	}];
	for point in tps_fps.iter() {
		roc_curve.push(RocCurvePoint {
			threshold: point.threshold,
			true_positive_rate: rate(point.true_positives, count_positives),
			false_positive_rate: rate(point.false_positives, count_negatives),
		});
	}
	roc_curve
}

#[derive(Debug)]
struct TpsFpsPoint {
	threshold: f32,
	true_positives: usize,
	false_positives: usize,
}

/// This function computes the counts of true positives and false positives at each distinct probability, in descending order of probability. Unlike the roc curve, each point contains just the counts at this threshold instead of the cumulative counts.
fn compute_tps_fps_by_threshold(probabilities: &[f32], labels: &[bool]) -> Vec<TpsFpsPoint> {
	let mut probabilities_labels: Vec<(f32, bool)> = probabilities
		.iter()
		.copied()
		.zip(labels.iter().copied())
		.collect();
	probabilities_labels.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
	let mut tps_fps: Vec<TpsFpsPoint> = Vec::new();
	for (probability, label) in probabilities_labels {
		let (tp, fp) = if label { (1, 0) } else { (0, 1) };
		match tps_fps.last_mut() {
			Some(last) if last.threshold == probability => {
				last.true_positives += tp;
				last.false_positives += fp;
			}
			_ => tps_fps.push(TpsFpsPoint {
				threshold: probability,
				true_positives: tp,
				false_positives: fp,
			}),
		}
	}
	tps_fps
}

#[test]
fn test_roc_curve() {
	let labels = vec![true, true, false, false];
	let probabilities = vec![0.9, 0.4, 0.4, 0.2];
	let left = compute_roc_curve(&probabilities, &labels);
	let right = vec![
		RocCurvePoint {
			threshold: 1.0,
			true_positive_rate: 0.0,
			false_positive_rate: 0.0,
		},
		RocCurvePoint {
			threshold: 0.9,
			true_positive_rate: 0.5,
			false_positive_rate: 0.0,
		},
		RocCurvePoint {
			threshold: 0.4,
			true_positive_rate: 1.0,
			false_positive_rate: 0.5,
		},
		RocCurvePoint {
			threshold: 0.2,
			true_positive_rate: 1.0,
			false_positive_rate: 1.0,
		},
	];
	assert_eq!(left, right);
	let auc = auc_roc(&probabilities, &labels);
	assert!(f32::abs(auc - 0.875) < f32::EPSILON)
}

#[test]
fn test_roc_curve_single_class() {
	let labels = vec![true, true];
	let probabilities = vec![0.7, 0.3];
	let roc_curve = compute_roc_curve(&probabilities, &labels);
	assert!(roc_curve
		.iter()
		.all(|point| point.false_positive_rate == 0.0));
	assert_eq!(auc_roc(&probabilities, &labels), 0.0);
}
