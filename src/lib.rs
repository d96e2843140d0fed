//! glassboost: pairwise interaction strength engine for explainable
//! boosting machines.
//!
//! Given a trained additive model's residual state over a binned
//! dataset, the engine computes a scalar interaction score for a
//! candidate feature pair: how much splitting gain a two-dimensional
//! shape function over those features could unlock beyond what the
//! additive model already captures. It is the inner primitive of a
//! pair-ranking search; dataset ingestion, binning and the boosting
//! loop itself live with the caller.
//!
//! # Overview
//!
//! A scoring call builds a 2-D histogram with per-class residual
//! accumulators over the pair's bins, rewrites it in place into a
//! prefix-sum tensor from which any axis-aligned rectangle sum is O(1),
//! and sweeps all interior 2-by-2 partitions of the grid for the
//! maximum splitting gain under a minimum-samples-per-cell constraint.
//!
//! The engine is exposed twice: as a safe Rust API
//! ([`InteractionContext`] plus [`calculate_interaction_score`]) and as
//! a flat C boundary ([`ffi`]) for host-language bindings.
//!
//! # Example
//!
//! ```
//! use glassboost::{Feature, InteractionContext, calculate_interaction_score};
//!
//! // Four samples on a 2x2 grid with perfectly interacting residuals.
//! let ctx = InteractionContext::regression(
//!     vec![Feature::ordinal(2), Feature::ordinal(2)],
//!     4,
//!     &[0, 0, 0, 1, 1, 0, 1, 1],
//!     &[1.0, 1.0, -1.0, -1.0],
//!     &[0.0; 4],
//! )
//! .unwrap();
//!
//! assert_eq!(calculate_interaction_score(&ctx, &[0, 1], 1).unwrap(), 4.0);
//! ```

pub mod arena;
pub mod context;
pub mod error;
pub mod feature;
pub mod ffi;
pub mod guards;
pub mod score;
pub mod stats;

mod dataset;
mod histogram;
mod sweep;

pub use context::{InteractionContext, Learning};
pub use error::InteractionError;
pub use feature::{Feature, FeatureKind, MAX_DIMENSIONS};
pub use score::calculate_interaction_score;
