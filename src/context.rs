//! The interaction context: immutable state shared by all scoring calls
//! against one dataset.
//!
//! A context is built once per dataset, carries the feature descriptors,
//! the owned dataset view with precomputed residuals, and the cached
//! bucket layout, and is then read-only. Scoring calls borrow it
//! immutably, so calls on different contexts may run on different
//! threads; the scratch storage of a call is never shared.

use std::sync::atomic::{AtomicI64, Ordering};

use log::{debug, info};

use crate::dataset::InteractionDataSet;
use crate::error::InteractionError;
use crate::feature::Feature;
use crate::histogram::BucketLayout;

/// How many enter/exit scoring log lines a context will emit before
/// going quiet.
const SCORING_LOG_BUDGET: i64 = 1000;

/// Learning type of the model whose residuals the context carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Learning {
    Regression,
    Classification { n_classes: usize },
}

impl Learning {
    #[inline]
    pub fn is_classification(self) -> bool {
        matches!(self, Self::Classification { .. })
    }

    /// Length of the per-sample score/residual vector.
    ///
    /// Regression and binary classification use a single value (binary
    /// keeps the compressed single-logit encoding); multiclass uses one
    /// value per class.
    #[inline]
    pub fn vector_len(self) -> usize {
        match self {
            Self::Regression => 1,
            Self::Classification { n_classes } => {
                if n_classes <= 2 {
                    1
                } else {
                    n_classes
                }
            }
        }
    }
}

/// Racy countdown for rate-limited log lines.
///
/// The decrement is load/store rather than read-modify-write: under
/// concurrent misuse the only consequence is a few extra log lines,
/// which is acceptable for a diagnostics counter.
#[derive(Debug)]
struct LogBudget(AtomicI64);

impl LogBudget {
    fn new(budget: i64) -> Self {
        Self(AtomicI64::new(budget))
    }

    fn consume(&self) -> bool {
        let remaining = self.0.load(Ordering::Relaxed);
        if remaining <= 0 {
            return false;
        }
        self.0.store(remaining - 1, Ordering::Relaxed);
        true
    }
}

/// Immutable handle carrying dataset, feature metadata, and learning
/// type. Built once, reused across scoring calls.
#[derive(Debug)]
pub struct InteractionContext {
    learning: Learning,
    features: Box<[Feature]>,
    dataset: InteractionDataSet,
    vector_len: usize,
    layout: BucketLayout,
    enter_budget: LogBudget,
    exit_budget: LogBudget,
}

impl InteractionContext {
    /// Build a regression context.
    ///
    /// `binned` is row-major `(n_samples, n_features)` bin codes;
    /// `scores` is one predicted value per sample.
    pub fn regression(
        features: Vec<Feature>,
        n_samples: usize,
        binned: &[i64],
        targets: &[f64],
        scores: &[f64],
    ) -> Result<Self, InteractionError> {
        let learning = Learning::Regression;
        validate_features(&features, n_samples)?;
        let dataset = InteractionDataSet::regression(&features, n_samples, binned, targets, scores)?;
        Self::assemble(learning, features, dataset)
    }

    /// Build a classification context for `n_classes` target classes.
    ///
    /// `scores` is row-major `(n_samples, V)` logits with `V` given by
    /// [`Learning::vector_len`]; `targets` are class indexes.
    pub fn classification(
        n_classes: usize,
        features: Vec<Feature>,
        n_samples: usize,
        binned: &[i64],
        targets: &[i64],
        scores: &[f64],
    ) -> Result<Self, InteractionError> {
        let learning = Learning::Classification { n_classes };
        validate_features(&features, n_samples)?;
        let dataset =
            InteractionDataSet::classification(n_classes, &features, n_samples, binned, targets, scores)?;
        Self::assemble(learning, features, dataset)
    }

    fn assemble(
        learning: Learning,
        features: Vec<Feature>,
        dataset: InteractionDataSet,
    ) -> Result<Self, InteractionError> {
        // Raises the overflow flag for absurd class counts before any
        // scoring call can size a tensor with the layout.
        let layout = BucketLayout::new(learning)?;
        debug!(
            "built interaction context: {:?}, {} features, {} samples",
            learning,
            features.len(),
            dataset.n_samples()
        );
        Ok(Self {
            learning,
            features: features.into_boxed_slice(),
            dataset,
            vector_len: learning.vector_len(),
            layout,
            enter_budget: LogBudget::new(SCORING_LOG_BUDGET),
            exit_budget: LogBudget::new(SCORING_LOG_BUDGET),
        })
    }

    #[inline]
    pub fn learning(&self) -> Learning {
        self.learning
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.dataset.n_samples()
    }

    #[inline]
    pub fn vector_len(&self) -> usize {
        self.vector_len
    }

    #[inline]
    pub fn feature(&self, index: usize) -> &Feature {
        &self.features[index]
    }

    #[inline]
    pub(crate) fn dataset(&self) -> &InteractionDataSet {
        &self.dataset
    }

    #[inline]
    pub(crate) fn bucket_layout(&self) -> BucketLayout {
        self.layout
    }

    pub(crate) fn log_scoring_enter(&self) {
        if self.enter_budget.consume() {
            debug!("entered interaction scoring");
        }
    }

    pub(crate) fn log_scoring_exit(&self, score: f64) {
        if self.exit_budget.consume() {
            debug!("exited interaction scoring, score {score}");
        }
    }
}

fn validate_features(features: &[Feature], n_samples: usize) -> Result<(), InteractionError> {
    for (index, feature) in features.iter().enumerate() {
        match feature.bin_count() {
            0 if n_samples != 0 => {
                return Err(InteractionError::ZeroBinsWithSamples {
                    feature: index,
                    n_samples,
                });
            }
            0 => info!("feature {index} has no bins (empty dataset)"),
            1 => info!("feature {index} has a single bin and cannot contribute gain"),
            _ => {}
        }
    }
    Ok(())
}
