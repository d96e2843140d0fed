//! Variable-width histogram records over a flat word buffer.
//!
//! A bucket is one cell of the 2-D grid: a sample count plus one
//! accumulator entry per class. The entry width depends on the learning
//! type (regression stores a residual sum; classification additionally
//! stores a denominator sum) and the class count is a runtime value in
//! the dynamic code path, so records cannot be a fixed struct type.
//! Instead the tensor is a flat `[u64]` buffer: word 0 of a record is
//! the count, the remaining words are `f64` bit patterns, and every
//! access multiplies a bucket index by the per-layout stride. The 8-byte
//! word granularity keeps each record aligned for its float fields
//! wherever it starts.
//!
//! Count arithmetic uses wrapping add/sub: the rectangle-sum oracle
//! accumulates signed partial sums whose intermediates may dip below
//! zero before cancelling, exactly like unsigned arithmetic in the
//! 2's-complement sense.

use crate::context::Learning;
use crate::error::InteractionError;
use crate::guards::{is_add_overflow, is_mul_overflow};

/// Auxiliary records reserved for the four quadrant sums of the sweep.
pub(crate) const AUX_QUADRANT_SLOTS: usize = 4;

/// Cached stride information for bucket records.
///
/// Built once per context; construction fails if the record size
/// overflows, so scoring calls can multiply by the stride freely.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BucketLayout {
    classification: bool,
    vector_len: usize,
    entry_words: usize,
    stride_words: usize,
}

impl BucketLayout {
    pub(crate) fn new(learning: Learning) -> Result<Self, InteractionError> {
        let classification = learning.is_classification();
        let vector_len = learning.vector_len();
        let entry_words = if classification { 2 } else { 1 };

        if is_mul_overflow(vector_len, entry_words) {
            return Err(InteractionError::SizeOverflow);
        }
        let entries = vector_len * entry_words;
        if is_add_overflow(entries, 1) {
            return Err(InteractionError::SizeOverflow);
        }

        Ok(Self {
            classification,
            vector_len,
            entry_words,
            stride_words: entries + 1,
        })
    }

    #[inline]
    pub(crate) fn is_classification(&self) -> bool {
        self.classification
    }

    #[inline]
    pub(crate) fn vector_len(&self) -> usize {
        self.vector_len
    }

    /// Words per bucket record: one count word plus the class entries.
    #[inline]
    pub(crate) fn stride_words(&self) -> usize {
        self.stride_words
    }

    /// Word offset of class `v`'s residual sum within a record.
    #[inline]
    fn entry_word(&self, v: usize) -> usize {
        debug_assert!(v < self.vector_len);
        1 + v * self.entry_words
    }
}

/// Resolve the monomorphized vector length.
///
/// `V = 0` marks the runtime-dispatch fallback; any other `V` is a
/// compile-time constant the optimizer can unroll against.
#[inline(always)]
pub(crate) fn resolve_vector_len<const V: usize>(runtime: usize) -> usize {
    if V == 0 {
        runtime
    } else {
        debug_assert_eq!(V, runtime);
        V
    }
}

/// Shared view of one bucket record.
#[derive(Clone, Copy)]
pub(crate) struct BucketRef<'a> {
    words: &'a [u64],
    layout: BucketLayout,
}

impl<'a> BucketRef<'a> {
    #[inline]
    pub(crate) fn count(&self) -> u64 {
        self.words[0]
    }

    #[inline]
    pub(crate) fn sum_residual(&self, v: usize) -> f64 {
        f64::from_bits(self.words[self.layout.entry_word(v)])
    }

    #[inline]
    pub(crate) fn sum_denominator(&self, v: usize) -> f64 {
        debug_assert!(self.layout.is_classification());
        f64::from_bits(self.words[self.layout.entry_word(v) + 1])
    }
}

/// Exclusive view of one bucket record.
pub(crate) struct BucketMut<'a> {
    words: &'a mut [u64],
    layout: BucketLayout,
}

impl<'a> BucketMut<'a> {
    #[inline]
    pub(crate) fn as_ref(&self) -> BucketRef<'_> {
        BucketRef {
            words: self.words,
            layout: self.layout,
        }
    }

    #[inline]
    pub(crate) fn count(&self) -> u64 {
        self.words[0]
    }

    #[inline]
    pub(crate) fn zero(&mut self) {
        self.words.fill(0);
    }

    #[inline]
    pub(crate) fn increment_count(&mut self) {
        self.words[0] += 1;
    }

    #[inline]
    fn add_f64(&mut self, word: usize, value: f64) {
        self.words[word] = (f64::from_bits(self.words[word]) + value).to_bits();
    }

    #[inline]
    pub(crate) fn add_residual(&mut self, v: usize, residual: f64) {
        self.add_f64(self.layout.entry_word(v), residual);
    }

    #[inline]
    pub(crate) fn add_denominator(&mut self, v: usize, denominator: f64) {
        debug_assert!(self.layout.is_classification());
        self.add_f64(self.layout.entry_word(v) + 1, denominator);
    }

    /// Field-wise `self += src`.
    #[inline]
    pub(crate) fn accumulate(&mut self, src: BucketRef<'_>) {
        debug_assert_eq!(self.words.len(), src.words.len());
        self.words[0] = self.words[0].wrapping_add(src.words[0]);
        for w in 1..self.words.len() {
            self.add_f64(w, f64::from_bits(src.words[w]));
        }
    }

    /// Field-wise `self -= src`.
    #[inline]
    pub(crate) fn subtract(&mut self, src: BucketRef<'_>) {
        debug_assert_eq!(self.words.len(), src.words.len());
        self.words[0] = self.words[0].wrapping_sub(src.words[0]);
        for w in 1..self.words.len() {
            self.add_f64(w, -f64::from_bits(src.words[w]));
        }
    }

    #[inline]
    pub(crate) fn copy_from(&mut self, src: BucketRef<'_>) {
        self.words.copy_from_slice(src.words);
    }
}

/// View of the record at `index` in a flat tensor buffer.
///
/// This is the only sanctioned way to reach a bucket: index times
/// stride, never a fixed-size element type.
#[inline]
pub(crate) fn bucket_at<'a>(words: &'a [u64], layout: BucketLayout, index: usize) -> BucketRef<'a> {
    let stride = layout.stride_words();
    let start = index * stride;
    BucketRef {
        words: &words[start..start + stride],
        layout,
    }
}

/// Exclusive counterpart of [`bucket_at`].
#[inline]
pub(crate) fn bucket_at_mut<'a>(
    words: &'a mut [u64],
    layout: BucketLayout,
    index: usize,
) -> BucketMut<'a> {
    let stride = layout.stride_words();
    let start = index * stride;
    BucketMut {
        words: &mut words[start..start + stride],
        layout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn regression_layout() -> BucketLayout {
        BucketLayout::new(Learning::Regression).unwrap()
    }

    fn multiclass_layout(k: usize) -> BucketLayout {
        BucketLayout::new(Learning::Classification { n_classes: k }).unwrap()
    }

    #[test]
    fn stride_by_learning_type() {
        assert_eq!(regression_layout().stride_words(), 2);
        assert_eq!(multiclass_layout(2).stride_words(), 3); // 1 + 1 entry * 2 words
        assert_eq!(multiclass_layout(3).stride_words(), 7); // 1 + 3 entries * 2 words
        assert_eq!(multiclass_layout(8).stride_words(), 17);
    }

    #[test]
    fn accumulators_round_trip() {
        let layout = multiclass_layout(3);
        let mut words = vec![0u64; layout.stride_words() * 2];

        let mut b = bucket_at_mut(&mut words, layout, 1);
        b.increment_count();
        b.increment_count();
        b.add_residual(0, 1.5);
        b.add_residual(2, -0.25);
        b.add_denominator(2, 0.1875);

        let b = bucket_at(&words, layout, 1);
        assert_eq!(b.count(), 2);
        assert_relative_eq!(b.sum_residual(0), 1.5);
        assert_relative_eq!(b.sum_residual(1), 0.0);
        assert_relative_eq!(b.sum_residual(2), -0.25);
        assert_relative_eq!(b.sum_denominator(2), 0.1875);

        // Bucket 0 was untouched.
        let untouched = bucket_at(&words, layout, 0);
        assert_eq!(untouched.count(), 0);
        assert_relative_eq!(untouched.sum_residual(0), 0.0);
    }

    #[test]
    fn accumulate_and_subtract_cancel() {
        let layout = regression_layout();
        let mut words = vec![0u64; layout.stride_words() * 2];

        {
            let mut a = bucket_at_mut(&mut words, layout, 0);
            a.increment_count();
            a.add_residual(0, 2.5);
        }
        {
            let mut b = bucket_at_mut(&mut words, layout, 1);
            b.increment_count();
            b.increment_count();
            b.add_residual(0, -1.0);
        }

        let (left, right) = words.split_at_mut(layout.stride_words());
        let mut a = bucket_at_mut(left, layout, 0);
        let b = bucket_at(right, layout, 0);

        a.accumulate(b);
        assert_eq!(a.count(), 3);
        assert_relative_eq!(a.as_ref().sum_residual(0), 1.5);

        a.subtract(b);
        a.subtract(b);
        // Count dipped through the subtraction and stays consistent
        // after adding back.
        a.accumulate(b);
        assert_eq!(a.count(), 1);
        assert_relative_eq!(a.as_ref().sum_residual(0), 2.5);
    }

    #[test]
    fn wrapping_count_survives_negative_intermediates() {
        let layout = regression_layout();
        let mut words = vec![0u64; layout.stride_words() * 2];
        {
            let mut b = bucket_at_mut(&mut words, layout, 1);
            for _ in 0..5 {
                b.increment_count();
            }
        }

        let (out_words, src_words) = words.split_at_mut(layout.stride_words());
        let mut out = bucket_at_mut(out_words, layout, 0);
        let src = bucket_at(src_words, layout, 0);

        // 0 - 5 + 5 + 5 = 5, with a wrapped intermediate.
        out.subtract(src);
        out.accumulate(src);
        out.accumulate(src);
        assert_eq!(out.count(), 5);
    }

    #[test]
    fn resolve_vector_len_marker() {
        assert_eq!(resolve_vector_len::<0>(5), 5);
        assert_eq!(resolve_vector_len::<3>(3), 3);
    }
}
