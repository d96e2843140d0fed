//! The pair-sweep kernel: maximum splitting gain over all interior
//! 2-by-2 partitions of the grid.
//!
//! For every cut pair the four quadrant totals are materialized into the
//! reserved auxiliary records, the minimum-samples constraint is checked
//! quadrant by quadrant (counts are monotone along cuts, so the first
//! failing quadrant aborts the candidate without computing the rest),
//! and the gain is the per-class sum of `sum_residual² / count` over the
//! four quadrants. The enumeration order is fixed, outer `cut1`, inner
//! `cut2`, which makes the first cut pair reaching a given gain the
//! deterministic winner.

use crate::histogram::bucket::{bucket_at, bucket_at_mut, resolve_vector_len, BucketLayout};
use crate::histogram::totals::{
    quadrant_sum, QUAD_HIGH_HIGH, QUAD_HIGH_LOW, QUAD_LOW_HIGH, QUAD_LOW_LOW,
};
use crate::stats::node_split_score;

const SLOT_LOW_LOW: usize = 0;
const SLOT_LOW_HIGH: usize = 1;
const SLOT_HIGH_LOW: usize = 2;
const SLOT_HIGH_HIGH: usize = 3;

/// Sweep all cut pairs of the prefix tensor in `main` and return the
/// best gain, never below zero.
///
/// NaN produced anywhere in the accumulation is absorbing: the
/// comparison is written `!(gain <= best)` so a NaN gain replaces the
/// running best and survives to the caller, which clamps it at the
/// boundary.
pub(crate) fn sweep_pairs<const V: usize, const CLS: bool>(
    main: &[u64],
    aux: &mut [u64],
    layout: BucketLayout,
    shape: (usize, usize),
    min_samples_per_child: u64,
) -> f64 {
    debug_assert_eq!(CLS, layout.is_classification());
    debug_assert!(min_samples_per_child >= 1);
    let vector_len = resolve_vector_len::<V>(layout.vector_len());
    let (b1, b2) = shape;
    debug_assert!(b1 >= 2 && b2 >= 2);

    let mut best = 0.0f64;

    for cut1 in 0..b1 - 1 {
        for cut2 in 0..b2 - 1 {
            let cuts = (cut1, cut2);

            quadrant_sum(main, layout, shape, cuts, QUAD_LOW_LOW, bucket_at_mut(aux, layout, SLOT_LOW_LOW));
            let count_low_low = bucket_at(aux, layout, SLOT_LOW_LOW).count();
            if count_low_low < min_samples_per_child {
                continue;
            }

            quadrant_sum(main, layout, shape, cuts, QUAD_LOW_HIGH, bucket_at_mut(aux, layout, SLOT_LOW_HIGH));
            let count_low_high = bucket_at(aux, layout, SLOT_LOW_HIGH).count();
            if count_low_high < min_samples_per_child {
                continue;
            }

            quadrant_sum(main, layout, shape, cuts, QUAD_HIGH_LOW, bucket_at_mut(aux, layout, SLOT_HIGH_LOW));
            let count_high_low = bucket_at(aux, layout, SLOT_HIGH_LOW).count();
            if count_high_low < min_samples_per_child {
                continue;
            }

            quadrant_sum(main, layout, shape, cuts, QUAD_HIGH_HIGH, bucket_at_mut(aux, layout, SLOT_HIGH_HIGH));
            let count_high_high = bucket_at(aux, layout, SLOT_HIGH_HIGH).count();
            if count_high_high < min_samples_per_child {
                continue;
            }

            let low_low = bucket_at(aux, layout, SLOT_LOW_LOW);
            let low_high = bucket_at(aux, layout, SLOT_LOW_HIGH);
            let high_low = bucket_at(aux, layout, SLOT_HIGH_LOW);
            let high_high = bucket_at(aux, layout, SLOT_HIGH_HIGH);

            let mut gain = 0.0f64;
            for v in 0..vector_len {
                gain += node_split_score(low_low.sum_residual(v), count_low_low as f64);
                gain += node_split_score(low_high.sum_residual(v), count_low_high as f64);
                gain += node_split_score(high_low.sum_residual(v), count_high_low as f64);
                gain += node_split_score(high_high.sum_residual(v), count_high_high as f64);
            }
            debug_assert!(gain.is_nan() || gain >= 0.0);

            // NaN must win this comparison, so it cannot be `gain > best`.
            if !(gain <= best) {
                best = gain;
            }
        }
    }

    best
}
