use super::Metric;
use std::collections::BTreeMap;

/// The most frequent value. When several values are equally frequent, the smallest wins.
pub struct Mode;

impl<'a> Metric<'a> for Mode {
	type Input = &'a [&'a str];
	type Output = Option<&'a str>;

	fn compute(input: Self::Input) -> Self::Output {
		let mut histogram: BTreeMap<&str, usize> = BTreeMap::new();
		for value in input.iter() {
			*histogram.entry(*value).or_insert(0) += 1;
		}
		let mut mode: Option<(&str, usize)> = None;
		for (value, count) in histogram.into_iter() {
			match mode {
				Some((_, mode_count)) if mode_count >= count => {}
				_ => mode = Some((value, count)),
			}
		}
		mode.map(|(value, _)| value)
	}
}

#[test]
fn test_mode() {
	assert_eq!(Mode::compute(&["b", "a", "b", "c"]), Some("b"));
	assert_eq!(Mode::compute(&["rent", "own", "own", "rent"]), Some("own"));
	assert_eq!(Mode::compute(&[]), None);
}
