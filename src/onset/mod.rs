//! Onset extraction from activation curves.
//!
//! An activation row is turned into a novelty curve, enhanced by subtracting
//! a 7-frame local average, and peak-picked against a threshold relative to
//! the curve's maximum.

pub mod detect;
pub mod novelty;

pub use detect::{OnsetExtractor, extract_onsets, find_peaks};
pub use novelty::{enhanced_novelty, local_average, novelty};
