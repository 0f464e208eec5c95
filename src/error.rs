/// Crate-level error type for the rattle onset estimation library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid parameter value.
    #[error("invalid parameter `{name}`: got {value}, {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// A required dimension is zero or invalid.
    #[error("invalid size for `{name}`: {value} ({reason})")]
    InvalidSize {
        name: &'static str,
        value: usize,
        reason: &'static str,
    },

    /// Input array has incorrect shape for the operation.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// A magnitude spectrogram contained a negative or non-finite entry.
    #[error("spectrogram entry at ({row}, {col}) is {value}, expected a finite non-negative value")]
    NegativeInput { row: usize, col: usize, value: f64 },

    /// The interference recording is too short to cover the target.
    #[error("noise spectrogram has {noise_frames} frames, need at least {required}")]
    NoiseTooShort {
        noise_frames: usize,
        required: usize,
    },

    /// Onset lists handed to the evaluator must be ascending.
    #[error("{which} onsets are not sorted ascending at index {index}")]
    UnsortedOnsets { which: &'static str, index: usize },

    /// Ground-truth note set disagrees with the sample metadata.
    #[error("MIDI notes {found:?} don't match the declared instruments {declared:?}")]
    NoteMismatch { found: Vec<u8>, declared: Vec<u8> },

    /// No spectrogram registered for the requested source and resolution.
    #[error("no spectrogram for `{source_id}` at window {window}")]
    MissingSpectrogram { source_id: String, window: usize },

    /// Malformed sample metadata.
    #[error("metadata: {0}")]
    Metadata(String),

    /// MIDI parsing errors.
    #[error(transparent)]
    Midi(#[from] midly::Error),

    /// `.npy` decoding errors.
    #[error(transparent)]
    Npy(#[from] ndarray_npy::ReadNpyError),

    /// File I/O errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for rattle operations.
pub type Result<T> = std::result::Result<T, Error>;
