//! Scatter samples into the 2-D histogram.
//!
//! The pass zeroes the whole tensor buffer (main and auxiliary regions),
//! then walks the samples once, decoding the bit-packed bin code of each
//! paired feature and accumulating count, per-class residual and, for
//! classification, the per-class denominator into the addressed cell.
//!
//! Monomorphized over the vector length so the per-class inner loop has
//! a compile-time bound for the common class counts; `V = 0` selects the
//! runtime-length fallback.

use crate::dataset::InteractionDataSet;
use crate::stats::denominator_step;

use super::bucket::{bucket_at_mut, resolve_vector_len, BucketLayout};

/// Populate the histogram for the feature pair `(first, second)`.
///
/// `shape` is the grid `(bin_count_first, bin_count_second)`; cells are
/// row-major by `(bin_first, bin_second)`. `words` must span the main
/// region plus the auxiliary records and is zeroed in full before the
/// scatter.
pub(crate) fn bin_interaction<const V: usize, const CLS: bool>(
    dataset: &InteractionDataSet,
    pair: (usize, usize),
    shape: (usize, usize),
    words: &mut [u64],
    layout: BucketLayout,
) {
    debug_assert_eq!(CLS, layout.is_classification());
    let vector_len = resolve_vector_len::<V>(layout.vector_len());

    words.fill(0);

    let codes_first = dataset.codes(pair.0);
    let codes_second = dataset.codes(pair.1);
    debug_assert_eq!(codes_first.len(), dataset.n_samples());
    debug_assert_eq!(codes_second.len(), dataset.n_samples());
    let residuals = dataset.residuals();
    let (b1, b2) = shape;

    for sample in 0..dataset.n_samples() {
        let bin_first = codes_first.get(sample);
        let bin_second = codes_second.get(sample);
        debug_assert!(bin_first < b1 && bin_second < b2);

        let mut bucket = bucket_at_mut(words, layout, bin_first * b2 + bin_second);
        bucket.increment_count();
        for v in 0..vector_len {
            let residual = residuals[[sample, v]];
            bucket.add_residual(v, residual);
            if CLS {
                bucket.add_denominator(v, denominator_step(residual));
            }
        }
    }
}
