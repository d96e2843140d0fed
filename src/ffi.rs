//! Flat C-compatible boundary.
//!
//! All integers crossing the boundary are signed 64-bit, all floats are
//! double precision. A context handle is an opaque pointer obtained from
//! one of the initializers and released with [`FreeInteraction`]; it
//! must outlive every scoring call that references it. Status codes are
//! `0` for success and `1` for error; degenerate inputs score zero with
//! a success status.
//!
//! Every entry point tolerates a null handle or null required pointers
//! by reporting an error instead of crashing, and the score
//! out-parameter may be null when the caller wants to discard the score.

use log::{error, trace, warn};

use crate::context::InteractionContext;
use crate::feature::{Feature, MAX_DIMENSIONS};
use crate::guards::{is_mul_overflow, usize_from_i64};
use crate::score::calculate_interaction_score;

/// Feature descriptor record as the caller lays it out.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NativeFeature {
    /// Number of bins, `>= 0`.
    pub bin_count: i64,
    /// `0` = ordinal, `1` = nominal.
    pub feature_kind: i64,
    /// `0` = no missing indicator bin, `1` = present.
    pub has_missing: i64,
}

/// Opaque context handle.
pub type InteractionHandle = *mut InteractionContext;

const STATUS_OK: i64 = 0;
const STATUS_ERROR: i64 = 1;

/// Marshal the shared initializer arguments into owned Rust data.
///
/// Returns `None` (after logging) when any count is negative or
/// non-representable, or when a required pointer is null.
///
/// # Safety
///
/// Non-null pointers must honor the advertised array shapes.
unsafe fn marshal_common<'a>(
    count_features: i64,
    features: *const NativeFeature,
    count_samples: i64,
    binned_data: *const i64,
) -> Option<(Vec<Feature>, usize, &'a [i64])> {
    let n_features = match usize_from_i64(count_features) {
        Some(n) => n,
        None => {
            error!("countFeatures must be a representable non-negative count");
            return None;
        }
    };
    if n_features != 0 && features.is_null() {
        error!("features cannot be null when 0 < countFeatures");
        return None;
    }
    let n_samples = match usize_from_i64(count_samples) {
        Some(n) => n,
        None => {
            error!("countSamples must be a representable non-negative count");
            return None;
        }
    };
    if n_samples != 0 && n_features != 0 && binned_data.is_null() {
        error!("binnedData cannot be null when there are samples and features");
        return None;
    }
    if is_mul_overflow(n_samples, n_features) {
        error!("countSamples * countFeatures overflows the size type");
        return None;
    }

    let raw_features = if n_features == 0 {
        &[]
    } else {
        // SAFETY: non-null, caller guarantees n_features records.
        unsafe { std::slice::from_raw_parts(features, n_features) }
    };
    let mut owned = Vec::with_capacity(n_features);
    for record in raw_features {
        match Feature::from_raw(record.bin_count, record.feature_kind, record.has_missing) {
            Ok(feature) => owned.push(feature),
            Err(err) => {
                error!("invalid feature descriptor: {err}");
                return None;
            }
        }
    }

    let binned = if n_samples == 0 || n_features == 0 {
        &[]
    } else {
        // SAFETY: non-null, caller guarantees the (samples, features) shape.
        unsafe { std::slice::from_raw_parts(binned_data, n_samples * n_features) }
    };

    Some((owned, n_samples, binned))
}

/// Build a classification context over `countTargetClasses` classes.
///
/// `targets` are class indexes; `predictorScores` is row-major
/// `(countSamples, V)` with `V = 1` for up to two classes and
/// `V = countTargetClasses` above that. Returns null on failure.
///
/// # Safety
///
/// All non-null pointers must reference arrays of the advertised
/// shapes, valid for the duration of the call.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn InitializeInteractionClassification(
    countTargetClasses: i64,
    countFeatures: i64,
    features: *const NativeFeature,
    countSamples: i64,
    binnedData: *const i64,
    targets: *const i64,
    predictorScores: *const f64,
    optionalTempParams: *const f64,
) -> InteractionHandle {
    trace!(
        "entered InitializeInteractionClassification: {countTargetClasses} classes, \
         {countFeatures} features, {countSamples} samples"
    );
    // Experimental passthrough, accepted and unused.
    let _ = optionalTempParams;

    let n_classes = match usize_from_i64(countTargetClasses) {
        Some(n) => n,
        None => {
            error!("countTargetClasses must be a representable non-negative count");
            return std::ptr::null_mut();
        }
    };
    if n_classes == 0 && countSamples != 0 {
        error!("countTargetClasses cannot be zero when there are samples");
        return std::ptr::null_mut();
    }

    let Some((owned_features, n_samples, binned)) =
        // SAFETY: forwarded caller guarantees.
        (unsafe { marshal_common(countFeatures, features, countSamples, binnedData) })
    else {
        return std::ptr::null_mut();
    };

    if n_samples != 0 && targets.is_null() {
        error!("targets cannot be null when 0 < countSamples");
        return std::ptr::null_mut();
    }
    if n_samples != 0 && predictorScores.is_null() {
        error!("predictorScores cannot be null when 0 < countSamples");
        return std::ptr::null_mut();
    }

    let vector_len = if n_classes <= 2 { 1 } else { n_classes };
    if is_mul_overflow(n_samples, vector_len) {
        error!("countSamples * vector length overflows the size type");
        return std::ptr::null_mut();
    }
    let targets = if n_samples == 0 {
        &[]
    } else {
        // SAFETY: non-null, one class index per sample.
        unsafe { std::slice::from_raw_parts(targets, n_samples) }
    };
    let scores = if n_samples == 0 {
        &[]
    } else {
        // SAFETY: non-null, row-major (samples, vector length).
        unsafe { std::slice::from_raw_parts(predictorScores, n_samples * vector_len) }
    };

    match InteractionContext::classification(
        n_classes,
        owned_features,
        n_samples,
        binned,
        targets,
        scores,
    ) {
        Ok(ctx) => Box::into_raw(Box::new(ctx)),
        Err(err) => {
            error!("InitializeInteractionClassification failed: {err}");
            std::ptr::null_mut()
        }
    }
}

/// Build a regression context. Returns null on failure.
///
/// # Safety
///
/// All non-null pointers must reference arrays of the advertised
/// shapes, valid for the duration of the call.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn InitializeInteractionRegression(
    countFeatures: i64,
    features: *const NativeFeature,
    countSamples: i64,
    binnedData: *const i64,
    targets: *const f64,
    predictorScores: *const f64,
    optionalTempParams: *const f64,
) -> InteractionHandle {
    trace!(
        "entered InitializeInteractionRegression: {countFeatures} features, \
         {countSamples} samples"
    );
    let _ = optionalTempParams;

    let Some((owned_features, n_samples, binned)) =
        // SAFETY: forwarded caller guarantees.
        (unsafe { marshal_common(countFeatures, features, countSamples, binnedData) })
    else {
        return std::ptr::null_mut();
    };

    if n_samples != 0 && targets.is_null() {
        error!("targets cannot be null when 0 < countSamples");
        return std::ptr::null_mut();
    }
    if n_samples != 0 && predictorScores.is_null() {
        error!("predictorScores cannot be null when 0 < countSamples");
        return std::ptr::null_mut();
    }
    let targets = if n_samples == 0 {
        &[]
    } else {
        // SAFETY: non-null, one target per sample.
        unsafe { std::slice::from_raw_parts(targets, n_samples) }
    };
    let scores = if n_samples == 0 {
        &[]
    } else {
        // SAFETY: non-null, one predicted value per sample.
        unsafe { std::slice::from_raw_parts(predictorScores, n_samples) }
    };

    match InteractionContext::regression(owned_features, n_samples, binned, targets, scores) {
        Ok(ctx) => Box::into_raw(Box::new(ctx)),
        Err(err) => {
            error!("InitializeInteractionRegression failed: {err}");
            std::ptr::null_mut()
        }
    }
}

/// Score one candidate feature group.
///
/// Writes the score through `interactionScoreOut` when it is non-null
/// and returns `0` on success, `1` on error. On every failure path the
/// score, if writable, is set to zero first.
///
/// # Safety
///
/// `ebmInteraction` must be a live handle from an initializer;
/// `featureIndexes` must hold `countFeaturesInGroup` values when that
/// count is positive.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn CalculateInteractionScore(
    ebmInteraction: InteractionHandle,
    countFeaturesInGroup: i64,
    featureIndexes: *const i64,
    countSamplesRequiredForChildSplitMin: i64,
    interactionScoreOut: *mut f64,
) -> i64 {
    trace!(
        "entered CalculateInteractionScore: arity {countFeaturesInGroup}, \
         min child samples {countSamplesRequiredForChildSplitMin}"
    );

    let write_score = |value: f64| {
        if !interactionScoreOut.is_null() {
            // SAFETY: non-null out-parameter provided by the caller.
            unsafe { *interactionScoreOut = value };
        }
    };
    write_score(0.0);

    if ebmInteraction.is_null() {
        error!("ebmInteraction cannot be null");
        return STATUS_ERROR;
    }
    // SAFETY: non-null handle from an initializer.
    let ctx = unsafe { &*ebmInteraction };

    let arity = match usize_from_i64(countFeaturesInGroup) {
        Some(n) => n,
        None => {
            error!("countFeaturesInGroup must be a representable non-negative count");
            return STATUS_ERROR;
        }
    };
    if arity != 0 && featureIndexes.is_null() {
        error!("featureIndexes cannot be null when 0 < countFeaturesInGroup");
        return STATUS_ERROR;
    }
    let raw_indexes = if arity == 0 {
        &[]
    } else {
        // SAFETY: non-null, arity entries.
        unsafe { std::slice::from_raw_parts(featureIndexes, arity) }
    };

    // The group descriptor is assembled on the stack; reject negative or
    // unrepresentable indexes while filling it. Range checks against the
    // context happen in the scoring call.
    let mut index_buf = [0usize; MAX_DIMENSIONS];
    for (slot, &raw) in raw_indexes.iter().take(MAX_DIMENSIONS).enumerate() {
        match usize_from_i64(raw) {
            Some(index) => index_buf[slot] = index,
            None => {
                error!("featureIndexes value {raw} cannot reference memory");
                return STATUS_ERROR;
            }
        }
    }
    if arity > MAX_DIMENSIONS {
        // An oversized group still gets the full per-index validation
        // first, so a bad index or a degenerate feature in a huge group
        // reports the same way as in a small one.
        for &raw in raw_indexes {
            let index = match usize_from_i64(raw) {
                Some(index) => index,
                None => {
                    error!("featureIndexes value {raw} cannot reference memory");
                    return STATUS_ERROR;
                }
            };
            if index >= ctx.n_features() {
                error!(
                    "featureIndexes value {index} must be below the feature count {}",
                    ctx.n_features()
                );
                return STATUS_ERROR;
            }
            if ctx.feature(index).bin_count() <= 1 {
                write_score(0.0);
                return STATUS_OK;
            }
        }
        warn!("feature group of {arity} exceeds the supported maximum {MAX_DIMENSIONS}");
        return STATUS_ERROR;
    }

    let min_samples = countSamplesRequiredForChildSplitMin.max(0) as u64;

    match calculate_interaction_score(ctx, &index_buf[..arity], min_samples) {
        Ok(score) => {
            write_score(score);
            trace!("exited CalculateInteractionScore, score {score}");
            STATUS_OK
        }
        Err(err) => {
            error!("CalculateInteractionScore failed: {err}");
            STATUS_ERROR
        }
    }
}

/// Destroy a context handle. A null handle is tolerated.
///
/// # Safety
///
/// `ebmInteraction` must be null or a live handle from an initializer,
/// and must not be used after this call.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn FreeInteraction(ebmInteraction: InteractionHandle) {
    trace!("entered FreeInteraction");
    if !ebmInteraction.is_null() {
        // SAFETY: exclusive ownership returns to the box and drops.
        drop(unsafe { Box::from_raw(ebmInteraction) });
    }
    trace!("exited FreeInteraction");
}
