//! The scoring entry point: validation, tensor sizing, dispatch and
//! final clamping.
//!
//! A call validates its arguments, short-circuits the degenerate cases
//! whose answer is trivially zero, sizes the histogram tensor with
//! guarded arithmetic, borrows storage from a scratch arena and runs the
//! three kernel stages under a class count fixed at compile time where
//! possible. The returned score is clamped so callers always receive a
//! usable non-negative finite value.

use log::{info, warn};

use crate::arena::ScratchArena;
use crate::context::{InteractionContext, Learning};
use crate::error::InteractionError;
use crate::feature::{FeatureGroup, MAX_DIMENSIONS};
use crate::guards::{is_add_overflow, is_mul_overflow};
use crate::histogram::binning::bin_interaction;
use crate::histogram::bucket::AUX_QUADRANT_SLOTS;
use crate::histogram::totals::build_totals;
use crate::histogram::BucketLayout;
use crate::sweep::sweep_pairs;

/// Highest class count with a dedicated monomorphized kernel; larger
/// counts take the runtime-length fallback.
const COMPILED_CLASSES_MAX: usize = 8;

/// Score one candidate feature group against the context.
///
/// Returns the interaction score, `0.0` for every degenerate input
/// (empty group, empty dataset, a referenced feature with fewer than two
/// bins, fewer than two target classes) and for the currently
/// unsupported arities other than two. Invalid indexes, a group larger
/// than [`MAX_DIMENSIONS`] and resource failures are errors.
///
/// `min_samples_per_child` below one is clamped to one with a warning.
///
/// # Example
///
/// ```
/// use glassboost::{Feature, InteractionContext, calculate_interaction_score};
///
/// let ctx = InteractionContext::regression(
///     vec![Feature::ordinal(2), Feature::ordinal(2)],
///     4,
///     &[0, 0, 0, 1, 1, 0, 1, 1],
///     &[1.0, 1.0, -1.0, -1.0],
///     &[0.0; 4],
/// )
/// .unwrap();
/// let score = calculate_interaction_score(&ctx, &[0, 1], 1).unwrap();
/// assert_eq!(score, 4.0);
/// ```
pub fn calculate_interaction_score(
    ctx: &InteractionContext,
    feature_indexes: &[usize],
    min_samples_per_child: u64,
) -> Result<f64, InteractionError> {
    ctx.log_scoring_enter();

    if feature_indexes.is_empty() {
        info!("empty feature group, score 0");
        ctx.log_scoring_exit(0.0);
        return Ok(0.0);
    }
    if ctx.n_samples() == 0 {
        // No samples, no basis for an interaction.
        info!("zero samples, score 0");
        ctx.log_scoring_exit(0.0);
        return Ok(0.0);
    }

    let min_samples_per_child = if min_samples_per_child < 1 {
        warn!("min samples per child cannot be below 1, adjusting to 1");
        1
    } else {
        min_samples_per_child
    };

    for &index in feature_indexes {
        if index >= ctx.n_features() {
            return Err(InteractionError::FeatureIndexOutOfRange {
                index,
                n_features: ctx.n_features(),
            });
        }
        if ctx.feature(index).bin_count() <= 1 {
            // A one-bin feature always has the same value; it cannot
            // carry an interaction.
            info!("feature {index} has fewer than 2 bins, score 0");
            ctx.log_scoring_exit(0.0);
            return Ok(0.0);
        }
    }

    let group = FeatureGroup::from_indexes(feature_indexes)?;

    if let Learning::Classification { n_classes } = ctx.learning() {
        if n_classes <= 1 {
            // A single-class target is predicted perfectly without any
            // model; interactions cannot help.
            info!("target with {n_classes} classes, score 0");
            ctx.log_scoring_exit(0.0);
            return Ok(0.0);
        }
    }

    if group.len() != 2 {
        // TODO: support arity 3+ once the sweep generalizes past pairs.
        warn!("only pairs are supported, got arity {}; score 0", group.len());
        ctx.log_scoring_exit(0.0);
        return Ok(0.0);
    }

    let score = score_pair(
        ctx,
        (group.indexes()[0], group.indexes()[1]),
        min_samples_per_child,
    )?;

    // The sweep starts at zero and only ever replaces with larger
    // values, so anything below zero or non-finite is numerical fallout;
    // clamp it so the caller always gets a usable score.
    debug_assert!(score.is_nan() || score >= 0.0);
    if ctx.learning().is_classification() {
        debug_assert!(score.is_nan() || score != f64::INFINITY);
    }
    let score = if score.is_nan() || score >= f64::MAX {
        0.0
    } else {
        score
    };

    ctx.log_scoring_exit(score);
    Ok(score)
}

/// Size the tensor, borrow scratch and run bin → totals → sweep for one
/// pair.
fn score_pair(
    ctx: &InteractionContext,
    pair: (usize, usize),
    min_samples_per_child: u64,
) -> Result<f64, InteractionError> {
    let b1 = ctx.feature(pair.0).bin_count();
    let b2 = ctx.feature(pair.1).bin_count();
    debug_assert!(b1 >= 2 && b2 >= 2);

    // Main region: the grid itself. The caller hands us arbitrary
    // feature pairs, so unlike fixed training tensors this product must
    // be checked at runtime.
    if is_mul_overflow(b1, b2) {
        warn!("histogram of {b1} x {b2} bins overflows the size type");
        return Err(InteractionError::SizeOverflow);
    }
    let main_records = b1 * b2;

    // Auxiliary region: enough for the prefix-build staging cells and
    // the four quadrant records of the sweep.
    if is_add_overflow(b1, b2) {
        return Err(InteractionError::SizeOverflow);
    }
    let aux_records = (b1 + b2 - 1).max(AUX_QUADRANT_SLOTS);
    if is_add_overflow(main_records, aux_records) {
        return Err(InteractionError::SizeOverflow);
    }
    let total_records = main_records + aux_records;

    let layout = ctx.bucket_layout();
    if is_mul_overflow(total_records, layout.stride_words()) {
        warn!("histogram records overflow the size type");
        return Err(InteractionError::SizeOverflow);
    }
    let total_words = total_records * layout.stride_words();

    // TODO: hoist the arena into per-thread state so repeated scoring
    // calls stop paying one allocation each.
    let mut arena = ScratchArena::new();
    let words = arena.request(total_words)?;

    let shape = (b1, b2);
    let main_words = main_records * layout.stride_words();
    let score = match (ctx.learning(), ctx.vector_len()) {
        (Learning::Regression, _) => {
            run_kernel::<1, false>(ctx, pair, shape, words, main_words, layout, min_samples_per_child)
        }
        (Learning::Classification { .. }, 1) => {
            run_kernel::<1, true>(ctx, pair, shape, words, main_words, layout, min_samples_per_child)
        }
        (Learning::Classification { .. }, 2) => {
            run_kernel::<2, true>(ctx, pair, shape, words, main_words, layout, min_samples_per_child)
        }
        (Learning::Classification { .. }, 3) => {
            run_kernel::<3, true>(ctx, pair, shape, words, main_words, layout, min_samples_per_child)
        }
        (Learning::Classification { .. }, 4) => {
            run_kernel::<4, true>(ctx, pair, shape, words, main_words, layout, min_samples_per_child)
        }
        (Learning::Classification { .. }, 5) => {
            run_kernel::<5, true>(ctx, pair, shape, words, main_words, layout, min_samples_per_child)
        }
        (Learning::Classification { .. }, 6) => {
            run_kernel::<6, true>(ctx, pair, shape, words, main_words, layout, min_samples_per_child)
        }
        (Learning::Classification { .. }, 7) => {
            run_kernel::<7, true>(ctx, pair, shape, words, main_words, layout, min_samples_per_child)
        }
        (Learning::Classification { .. }, COMPILED_CLASSES_MAX) => {
            run_kernel::<{ COMPILED_CLASSES_MAX }, true>(
                ctx, pair, shape, words, main_words, layout, min_samples_per_child,
            )
        }
        // Past the compiled range the vector length stays a runtime
        // value; the `0` marker selects the dynamic kernel.
        (Learning::Classification { .. }, _) => {
            run_kernel::<0, true>(ctx, pair, shape, words, main_words, layout, min_samples_per_child)
        }
    };
    Ok(score)
}

#[allow(clippy::too_many_arguments)]
fn run_kernel<const V: usize, const CLS: bool>(
    ctx: &InteractionContext,
    pair: (usize, usize),
    shape: (usize, usize),
    words: &mut [u64],
    main_words: usize,
    layout: BucketLayout,
    min_samples_per_child: u64,
) -> f64 {
    bin_interaction::<V, CLS>(ctx.dataset(), pair, shape, words, layout);
    let (main, aux) = words.split_at_mut(main_words);
    build_totals(main, aux, layout, shape);
    sweep_pairs::<V, CLS>(main, aux, layout, shape, min_samples_per_child)
}
