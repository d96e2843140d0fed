//! Owned dataset view behind an interaction context.
//!
//! Construction copies everything the scoring kernel will touch: bin
//! codes are re-packed into word-aligned bit fields, predictor scores
//! are copied, and per-sample residuals are computed once up front so
//! the binning pass is a pure scatter over precomputed values.
//!
//! # Layout
//!
//! Bin codes are stored per feature, `64 / width` codes to a word, where
//! `width` is the smallest bit width that represents `bin_count - 1`.
//! Scores and residuals are `(n_samples, V)` row-major matrices.

use ndarray::Array2;

use crate::context::Learning;
use crate::error::InteractionError;
use crate::feature::Feature;
use crate::guards::{bits_required, is_mul_overflow};
use crate::stats;

/// Bit-packed bin codes of a single feature, one code per sample.
#[derive(Debug, Clone)]
pub(crate) struct PackedCodes {
    words: Box<[u64]>,
    width: u32,
    codes_per_word: usize,
    mask: u64,
    len: usize,
}

impl PackedCodes {
    /// Pack `len` codes produced by `code_at`, `width` bits each.
    ///
    /// `width` is clamped to at least one bit so the degenerate one-bin
    /// (or zero-bin, zero-sample) feature still has a well-formed store.
    fn pack(len: usize, width: u32, code_at: impl Fn(usize) -> u64) -> Self {
        let width = width.max(1);
        let codes_per_word = (u64::BITS / width) as usize;
        let n_words = len.div_ceil(codes_per_word);
        let mask = if width == u64::BITS {
            u64::MAX
        } else {
            (1u64 << width) - 1
        };

        let mut words = vec![0u64; n_words];
        for index in 0..len {
            let code = code_at(index);
            debug_assert!(code <= mask);
            let shift = (index % codes_per_word) as u32 * width;
            words[index / codes_per_word] |= code << shift;
        }

        Self {
            words: words.into_boxed_slice(),
            width,
            codes_per_word,
            mask,
            len,
        }
    }

    /// Decode the bin code of one sample.
    #[inline]
    pub(crate) fn get(&self, index: usize) -> usize {
        debug_assert!(index < self.len);
        let word = self.words[index / self.codes_per_word];
        let shift = (index % self.codes_per_word) as u32 * self.width;
        ((word >> shift) & self.mask) as usize
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

/// Target data, shaped by the learning type.
#[derive(Debug, Clone)]
pub(crate) enum Targets {
    Regression(Box<[f64]>),
    Classification(Box<[usize]>),
}

/// Everything the kernel reads per sample, owned by the context.
#[derive(Debug, Clone)]
pub(crate) struct InteractionDataSet {
    n_samples: usize,
    codes: Box<[PackedCodes]>,
    #[allow(dead_code)] // retained alongside scores for future gain variants
    targets: Targets,
    #[allow(dead_code)]
    scores: Array2<f64>,
    residuals: Array2<f64>,
}

impl InteractionDataSet {
    /// Build the regression view: residual = `target - score`.
    pub(crate) fn regression(
        features: &[Feature],
        n_samples: usize,
        binned: &[i64],
        targets: &[f64],
        scores: &[f64],
    ) -> Result<Self, InteractionError> {
        let codes = pack_all_features(features, n_samples, binned)?;
        let scores = scores_matrix(n_samples, 1, scores)?;
        if targets.len() != n_samples {
            return Err(InteractionError::ShapeMismatch {
                name: "targets",
                got: targets.len(),
                expected: n_samples,
            });
        }

        let mut residuals = Array2::<f64>::zeros((n_samples, 1));
        for s in 0..n_samples {
            residuals[[s, 0]] = stats::regression_residual(targets[s], scores[[s, 0]]);
        }

        Ok(Self {
            n_samples,
            codes,
            targets: Targets::Regression(targets.to_vec().into_boxed_slice()),
            scores,
            residuals,
        })
    }

    /// Build the classification view.
    ///
    /// Targets are class indexes below `n_classes`. With one or two
    /// classes the score vector is a single logit and residuals take the
    /// sigmoid form; otherwise residuals are softmax-derived, one per
    /// class.
    pub(crate) fn classification(
        n_classes: usize,
        features: &[Feature],
        n_samples: usize,
        binned: &[i64],
        targets: &[i64],
        scores: &[f64],
    ) -> Result<Self, InteractionError> {
        let vector_len = Learning::Classification { n_classes }.vector_len();

        let codes = pack_all_features(features, n_samples, binned)?;
        let scores = scores_matrix(n_samples, vector_len, scores)?;
        if targets.len() != n_samples {
            return Err(InteractionError::ShapeMismatch {
                name: "targets",
                got: targets.len(),
                expected: n_samples,
            });
        }

        let mut owned_targets = Vec::with_capacity(n_samples);
        for &t in targets {
            let class = crate::guards::usize_from_i64(t)
                .filter(|&c| c < n_classes)
                .ok_or(InteractionError::TargetOutOfRange {
                    target: t,
                    n_classes,
                })?;
            owned_targets.push(class);
        }

        let mut residuals = Array2::<f64>::zeros((n_samples, vector_len));
        if vector_len == 1 {
            for s in 0..n_samples {
                residuals[[s, 0]] = stats::binary_residual(owned_targets[s], scores[[s, 0]]);
            }
        } else {
            let mut score_buf = vec![0.0; vector_len];
            let mut residual_buf = vec![0.0; vector_len];
            for s in 0..n_samples {
                for (v, slot) in score_buf.iter_mut().enumerate() {
                    *slot = scores[[s, v]];
                }
                stats::multiclass_residuals(owned_targets[s], &score_buf, &mut residual_buf);
                for (v, &r) in residual_buf.iter().enumerate() {
                    residuals[[s, v]] = r;
                }
            }
        }

        Ok(Self {
            n_samples,
            codes,
            targets: Targets::Classification(owned_targets.into_boxed_slice()),
            scores,
            residuals,
        })
    }

    #[inline]
    pub(crate) fn n_samples(&self) -> usize {
        self.n_samples
    }

    #[inline]
    pub(crate) fn codes(&self, feature: usize) -> &PackedCodes {
        &self.codes[feature]
    }

    /// Precomputed residuals, `(n_samples, V)`.
    #[inline]
    pub(crate) fn residuals(&self) -> &Array2<f64> {
        &self.residuals
    }
}

/// Validate and pack the bin codes of every feature.
///
/// `binned` is row-major `(n_samples, n_features)`; each entry must be a
/// non-negative index below its feature's bin count.
fn pack_all_features(
    features: &[Feature],
    n_samples: usize,
    binned: &[i64],
) -> Result<Box<[PackedCodes]>, InteractionError> {
    let n_features = features.len();
    if is_mul_overflow(n_samples, n_features) {
        return Err(InteractionError::SizeOverflow);
    }
    let expected = n_samples * n_features;
    if binned.len() != expected {
        return Err(InteractionError::ShapeMismatch {
            name: "binned data",
            got: binned.len(),
            expected,
        });
    }

    let mut codes = Vec::with_capacity(n_features);
    for (f, feature) in features.iter().enumerate() {
        let bin_count = feature.bin_count();
        for s in 0..n_samples {
            let code = binned[s * n_features + f];
            if code < 0 || (code as u64) >= bin_count as u64 {
                return Err(InteractionError::BinCodeOutOfRange {
                    feature: f,
                    code,
                    bin_count,
                });
            }
        }
        let width = bits_required(bin_count.saturating_sub(1) as u64);
        codes.push(PackedCodes::pack(n_samples, width, |s| {
            binned[s * n_features + f] as u64
        }));
    }
    Ok(codes.into_boxed_slice())
}

fn scores_matrix(
    n_samples: usize,
    vector_len: usize,
    scores: &[f64],
) -> Result<Array2<f64>, InteractionError> {
    if is_mul_overflow(n_samples, vector_len) {
        return Err(InteractionError::SizeOverflow);
    }
    let expected = n_samples * vector_len;
    if scores.len() != expected {
        return Err(InteractionError::ShapeMismatch {
            name: "predictor scores",
            got: scores.len(),
            expected,
        });
    }
    Array2::from_shape_vec((n_samples, vector_len), scores.to_vec())
        .map_err(|_| InteractionError::SizeOverflow)
}
