use num_traits::Float;
use std::{
	cmp::{Ord, Ordering},
	fmt::Debug,
	hash::{Hash, Hasher},
};
use thiserror::Error;

/// A `Finite` wraps a float that is known to be neither NaN nor infinite, which makes it safe to totally order and hash. Task detection uses it to count the distinct values of a number column.
#[derive(Clone, Copy, Debug)]
pub struct Finite<T>(T)
where
	T: Float;

#[derive(Debug, Error)]
#[error("not finite")]
pub struct NotFiniteError;

impl<T> Finite<T>
where
	T: Float,
{
	pub fn new(value: T) -> Result<Self, NotFiniteError> {
		if value.is_finite() {
			Ok(Self(value))
		} else {
			Err(NotFiniteError)
		}
	}

	pub fn get(self) -> T {
		self.0
	}
}

impl<T> std::ops::Deref for Finite<T>
where
	T: Float,
{
	type Target = T;
	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<T> std::fmt::Display for Finite<T>
where
	T: Float + std::fmt::Display,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl<T> PartialEq for Finite<T>
where
	T: Float,
{
	#[inline]
	fn eq(&self, other: &Self) -> bool {
		self.0.eq(&other.0)
	}
}

impl<T> Eq for Finite<T> where T: Float {}

impl<T> PartialOrd for Finite<T>
where
	T: Float,
{
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl<T> Ord for Finite<T>
where
	T: Float,
{
	fn cmp(&self, other: &Self) -> Ordering {
		// Neither value can be NaN, so the comparison always succeeds.
		self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
	}
}

impl Hash for Finite<f32> {
	#[inline]
	fn hash<H: Hasher>(&self, state: &mut H) {
		// 0.0 and -0.0 compare equal, so they must hash equally too.
		let value = if self.0 == 0.0 { 0.0f32 } else { self.0 };
		value.to_bits().hash(state);
	}
}

impl Hash for Finite<f64> {
	#[inline]
	fn hash<H: Hasher>(&self, state: &mut H) {
		let value = if self.0 == 0.0 { 0.0f64 } else { self.0 };
		value.to_bits().hash(state);
	}
}

pub trait ToFinite<T>
where
	T: Float,
{
	/// If the value is finite, return `Ok(Finite(self))`, otherwise return `Err(NotFiniteError)`.
	fn to_finite(self) -> Result<Finite<T>, NotFiniteError>;
}

impl<T> ToFinite<T> for T
where
	T: Float,
{
	fn to_finite(self) -> Result<Finite<T>, NotFiniteError> {
		Finite::new(self)
	}
}

#[test]
fn test_finite() {
	assert!(Finite::new(f32::NAN).is_err());
	assert!(Finite::new(f32::INFINITY).is_err());
	let mut values: Vec<Finite<f32>> = [3.0f32, -1.0, 2.5]
		.iter()
		.map(|v| v.to_finite().unwrap())
		.collect();
	values.sort();
	let values: Vec<f32> = values.into_iter().map(|v| v.get()).collect();
	assert_eq!(values, vec![-1.0, 2.5, 3.0]);
	let set: std::collections::HashSet<Finite<f32>> = [0.0f32, -0.0]
		.iter()
		.map(|v| v.to_finite().unwrap())
		.collect();
	assert_eq!(set.len(), 1);
}
