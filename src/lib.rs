//! Drum onset estimation by template-seeded matrix factorization.
//!
//! Rattle estimates when each percussion instrument of a drum loop sounds.
//! The loop's magnitude spectrogram is factorized against spectra of the
//! kit's isolated instruments, either with NMF (one spectral vector per
//! instrument) or NMFD (one spectro-temporal pattern per instrument). Peaks
//! in each instrument's activation curve become onsets, which are scored
//! against MIDI ground truth.
//!
//! # Quick Start
//!
//! ```rust
//! use rattle::config::{NmfType, Params};
//! use rattle::factorize::{FactorizeOptions, Templates, factorize};
//! use rattle::onset::OnsetExtractor;
//! use ndarray::Array2;
//! use rand::SeedableRng;
//!
//! // One instrument, hitting on frames 10 and 30.
//! let spectrum = [1.0, 0.5, 0.1];
//! let v = Array2::from_shape_fn((3, 40), |(k, n)| {
//!     if n == 10 || n == 30 { spectrum[k] } else { 1e-9 }
//! });
//! let w = Array2::from_shape_fn((3, 1), |(k, _)| spectrum[k]);
//!
//! let params = Params::new().with_nmf_type(NmfType::Nmf).with_max_iter(100);
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let result = factorize(&v, &Templates::Flat(w), &FactorizeOptions::from(&params), &mut rng)
//!     .unwrap();
//!
//! let extractor = OnsetExtractor::from_params(&params);
//! let row = result.instrument_activations().row(0).to_vec();
//! assert_eq!(extractor.frames(&row), vec![9, 29]);
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Run parameters (`Params`) and the option enums |
//! | [`spectrogram`] | Floored magnitude spectrograms and spectrogram stores |
//! | [`template`] | Log compression, noise injection, 1D and 2D templates |
//! | [`factorize`] | NMF, NMFD, the shift operator and the convolutive model |
//! | [`onset`] | Novelty curves and peak picking |
//! | [`eval`] | Greedy onset matching, precision, recall and F-measure |
//! | [`labels`] | MIDI ground truth and tick-to-seconds clocks |
//! | [`sample`] | Per-sample metadata and pipeline |
//! | [`dataset`] | Directory discovery and evaluation over many samples |
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`], which is an alias for
//! `std::result::Result<T, Error>`. Numerical degeneracy never errors: every
//! division in the solvers adds a small epsilon to its denominator.
//!
//! # Feature Flags
//!
//! | Flag | Description |
//! |------|-------------|
//! | `parallel` (default) | Evaluate dataset samples in parallel with rayon |

#![deny(unsafe_code)]

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub mod dataset;
pub mod eval;
pub mod factorize;
pub mod labels;
pub mod onset;
pub mod sample;
pub mod spectrogram;
pub mod template;
