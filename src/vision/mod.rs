//! Frame analysis: pixel color classification and the calibrated target map.

pub mod classify;
pub mod target;
