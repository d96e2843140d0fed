//! Shared error type for context construction and scoring.

/// Errors reported by context construction and interaction scoring.
///
/// Degenerate inputs (zero samples, one-bin features, a single target
/// class, an empty feature group) are *not* errors: they have a
/// well-defined score of zero and are reported as success.
#[derive(Debug, thiserror::Error)]
pub enum InteractionError {
    #[error("count cannot be negative: {0}")]
    NegativeCount(i64),

    #[error("value {0} is too large to index memory")]
    NotRepresentable(i64),

    #[error("feature kind code {0} is not recognized (0 = ordinal, 1 = nominal)")]
    UnknownFeatureKind(i64),

    #[error("feature {feature} declares 0 bins but the dataset has {n_samples} samples")]
    ZeroBinsWithSamples { feature: usize, n_samples: usize },

    #[error("feature index {index} is out of range for {n_features} features")]
    FeatureIndexOutOfRange { index: usize, n_features: usize },

    #[error("bin code {code} for feature {feature} must be below its bin count {bin_count}")]
    BinCodeOutOfRange {
        feature: usize,
        code: i64,
        bin_count: usize,
    },

    #[error("target class {target} must be below the class count {n_classes}")]
    TargetOutOfRange { target: i64, n_classes: usize },

    #[error("input slice for {name} holds {got} values, expected {expected}")]
    ShapeMismatch {
        name: &'static str,
        got: usize,
        expected: usize,
    },

    #[error("feature group holds {0} features, above the supported maximum")]
    TooManyDimensions(usize),

    #[error("size arithmetic overflowed while sizing the histogram tensor")]
    SizeOverflow,

    #[error("allocation of {words} tensor words failed")]
    OutOfMemory { words: usize },
}
