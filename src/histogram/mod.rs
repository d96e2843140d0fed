//! The 2-D histogram pipeline: bucket layout, binning, prefix totals
//! and rectangle sums.
//!
//! One scoring call runs the stages in order over a single flat word
//! buffer: [`binning::bin_interaction`] scatters samples into cells,
//! [`totals::build_totals`] rewrites the cells into an inclusive
//! prefix-sum tensor, and [`totals::quadrant_sum`] answers the sweep's
//! quadrant queries in O(1) reads each.

pub(crate) mod binning;
pub(crate) mod bucket;
pub(crate) mod totals;

pub(crate) use bucket::BucketLayout;
