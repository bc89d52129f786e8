//! Geometric and attribute similarity between a primary feature and one secondary candidate.

pub mod geometry;
pub mod tags;
