//! In-place prefix-sum tensor and the rectangle-sum oracle.
//!
//! After binning, the main region holds per-cell sums. [`build_totals`]
//! rewrites it so cell `(i, j)` holds the inclusive prefix sum over
//! `(i' ≤ i, j' ≤ j)`, by running one 1-D inclusive sweep per dimension
//! (the form generalizes to higher-rank tensors: D sweeps, one per
//! axis). Each sweep threads a running accumulator through a line of
//! cells; the accumulator lives in the auxiliary region, past the main
//! bounds, so the sweep never aliases the cells it updates.
//!
//! With the prefix tensor in place, the sum over any axis-aligned
//! sub-rectangle is 2^D signed corner reads: for D = 2 the four reads
//! carry signs `+ − − +`. [`quadrant_sum`] wraps that for the four
//! quadrants induced by an interior cut pair.

use super::bucket::{bucket_at, bucket_at_mut, BucketLayout, BucketMut};

/// Side-selection masks for [`quadrant_sum`]. Bit 0 picks the high side
/// of the first dimension, bit 1 of the second.
pub(crate) const QUAD_LOW_LOW: u8 = 0b00;
pub(crate) const QUAD_HIGH_LOW: u8 = 0b01;
pub(crate) const QUAD_LOW_HIGH: u8 = 0b10;
pub(crate) const QUAD_HIGH_HIGH: u8 = 0b11;

/// Rewrite the main region into an inclusive 2-D prefix-sum tensor.
///
/// `aux` must hold at least one record; its first record is clobbered as
/// the sweep accumulator.
pub(crate) fn build_totals(
    main: &mut [u64],
    aux: &mut [u64],
    layout: BucketLayout,
    shape: (usize, usize),
) {
    let (b1, b2) = shape;
    debug_assert!(main.len() >= b1 * b2 * layout.stride_words());
    debug_assert!(aux.len() >= layout.stride_words());

    // Sweep along dimension 2: prefix within each row.
    for row in 0..b1 {
        let mut acc = bucket_at_mut(aux, layout, 0);
        acc.zero();
        for col in 0..b2 {
            let index = row * b2 + col;
            acc.accumulate(bucket_at(main, layout, index));
            bucket_at_mut(main, layout, index).copy_from(acc.as_ref());
        }
    }

    // Sweep along dimension 1: prefix within each column.
    for col in 0..b2 {
        let mut acc = bucket_at_mut(aux, layout, 0);
        acc.zero();
        for row in 0..b1 {
            let index = row * b2 + col;
            acc.accumulate(bucket_at(main, layout, index));
            bucket_at_mut(main, layout, index).copy_from(acc.as_ref());
        }
    }
}

/// Sum the cells of `[lo1..=hi1] × [lo2..=hi2]` into `out` using
/// inclusion–exclusion reads against the prefix tensor.
///
/// Corners whose coordinate would be `lo - 1` with `lo == 0` fall off
/// the tensor and contribute nothing.
pub(crate) fn rectangle_sum(
    main: &[u64],
    layout: BucketLayout,
    shape: (usize, usize),
    lo: [usize; 2],
    hi: [usize; 2],
    mut out: BucketMut<'_>,
) {
    let (b1, b2) = shape;
    debug_assert!(lo[0] <= hi[0] && hi[0] < b1);
    debug_assert!(lo[1] <= hi[1] && hi[1] < b2);

    out.zero();
    'corners: for corner in 0u8..4 {
        let mut coords = [0usize; 2];
        for (dim, coord) in coords.iter_mut().enumerate() {
            if corner & (1 << dim) != 0 {
                *coord = hi[dim];
            } else if lo[dim] == 0 {
                continue 'corners; // read off the low edge: zero term
            } else {
                *coord = lo[dim] - 1;
            }
        }

        let bucket = bucket_at(main, layout, coords[0] * b2 + coords[1]);
        // Even number of low-side corners adds, odd subtracts.
        if corner.count_ones() % 2 == 0 {
            out.accumulate(bucket);
        } else {
            out.subtract(bucket);
        }
    }
}

/// Sum one quadrant induced by the interior cut pair `cuts` into `out`.
///
/// The low side of dimension `d` is `[0..=cut_d]`, the high side is
/// `[cut_d + 1 .. bin_count_d]`; `side_mask` selects one side per
/// dimension via the `QUAD_*` constants.
pub(crate) fn quadrant_sum(
    main: &[u64],
    layout: BucketLayout,
    shape: (usize, usize),
    cuts: (usize, usize),
    side_mask: u8,
    out: BucketMut<'_>,
) {
    let (b1, b2) = shape;
    debug_assert!(cuts.0 + 1 < b1 && cuts.1 + 1 < b2);

    let (lo1, hi1) = if side_mask & QUAD_HIGH_LOW != 0 {
        (cuts.0 + 1, b1 - 1)
    } else {
        (0, cuts.0)
    };
    let (lo2, hi2) = if side_mask & QUAD_LOW_HIGH != 0 {
        (cuts.1 + 1, b2 - 1)
    } else {
        (0, cuts.1)
    };

    rectangle_sum(main, layout, shape, [lo1, lo2], [hi1, hi2], out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Learning;
    use crate::histogram::bucket::AUX_QUADRANT_SLOTS;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn layout() -> BucketLayout {
        BucketLayout::new(Learning::Regression).unwrap()
    }

    /// Build a (b1, b2) histogram from per-cell (count, residual) pairs
    /// and return (main, aux) word buffers.
    fn tensor_from_cells(
        b1: usize,
        b2: usize,
        cells: &[(u64, f64)],
    ) -> (Vec<u64>, Vec<u64>, BucketLayout) {
        let layout = layout();
        assert_eq!(cells.len(), b1 * b2);
        let aux_records = (b1 + b2 - 1).max(AUX_QUADRANT_SLOTS);
        let mut main = vec![0u64; b1 * b2 * layout.stride_words()];
        let aux = vec![0u64; aux_records * layout.stride_words()];
        for (index, &(count, residual)) in cells.iter().enumerate() {
            let mut b = bucket_at_mut(&mut main, layout, index);
            for _ in 0..count {
                b.increment_count();
            }
            b.add_residual(0, residual);
        }
        (main, aux, layout)
    }

    #[test]
    fn prefix_of_a_two_by_three_grid() {
        // Counts:      1 2 3        Prefix:  1  3  6
        //              4 5 6                 5 12 21
        let cells: Vec<(u64, f64)> = (1..=6).map(|c| (c as u64, c as f64)).collect();
        let (mut main, mut aux, layout) = tensor_from_cells(2, 3, &cells);

        build_totals(&mut main, &mut aux, layout, (2, 3));

        let expected = [1u64, 3, 6, 5, 12, 21];
        for (index, &count) in expected.iter().enumerate() {
            let b = bucket_at(&main, layout, index);
            assert_eq!(b.count(), count, "cell {index}");
            assert_relative_eq!(b.sum_residual(0), count as f64);
        }
    }

    #[test]
    fn rectangle_sums_match_naive_sums() {
        let b1 = 4;
        let b2 = 5;
        let cells: Vec<(u64, f64)> = (0..b1 * b2)
            .map(|i| ((i % 3 + 1) as u64, (i as f64) * 0.5 - 3.0))
            .collect();
        let (mut main, mut aux, layout) = tensor_from_cells(b1, b2, &cells);
        let original = cells.clone();

        build_totals(&mut main, &mut aux, layout, (b1, b2));

        for lo1 in 0..b1 {
            for hi1 in lo1..b1 {
                for lo2 in 0..b2 {
                    for hi2 in lo2..b2 {
                        rectangle_sum(
                            &main,
                            layout,
                            (b1, b2),
                            [lo1, lo2],
                            [hi1, hi2],
                            bucket_at_mut(&mut aux, layout, 0),
                        );

                        let mut count = 0u64;
                        let mut residual = 0.0;
                        for i in lo1..=hi1 {
                            for j in lo2..=hi2 {
                                count += original[i * b2 + j].0;
                                residual += original[i * b2 + j].1;
                            }
                        }

                        let out = bucket_at(&aux, layout, 0);
                        assert_eq!(out.count(), count);
                        assert_relative_eq!(out.sum_residual(0), residual, epsilon = 1e-9);
                    }
                }
            }
        }
    }

    #[test]
    fn quadrants_partition_the_grid() {
        let b1 = 3;
        let b2 = 4;
        let cells: Vec<(u64, f64)> = (0..b1 * b2).map(|i| (1, i as f64)).collect();
        let (mut main, mut aux, layout) = tensor_from_cells(b1, b2, &cells);
        build_totals(&mut main, &mut aux, layout, (b1, b2));

        let total_residual: f64 = (0..b1 * b2).map(|i| i as f64).sum();
        for cut1 in 0..b1 - 1 {
            for cut2 in 0..b2 - 1 {
                let mut count = 0u64;
                let mut residual = 0.0;
                for (slot, mask) in [QUAD_LOW_LOW, QUAD_LOW_HIGH, QUAD_HIGH_LOW, QUAD_HIGH_HIGH]
                    .into_iter()
                    .enumerate()
                {
                    quadrant_sum(
                        &main,
                        layout,
                        (b1, b2),
                        (cut1, cut2),
                        mask,
                        bucket_at_mut(&mut aux, layout, slot),
                    );
                    let out = bucket_at(&aux, layout, slot);
                    count += out.count();
                    residual += out.sum_residual(0);
                }
                assert_eq!(count, (b1 * b2) as u64);
                assert_relative_eq!(residual, total_residual, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn large_grid_oracle_against_brute_force() {
        use rand::{Rng, SeedableRng};
        use rand_xoshiro::Xoshiro256PlusPlus;

        let b1 = 100;
        let b2 = 100;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0x5eed);
        let cells: Vec<(u64, f64)> = (0..b1 * b2)
            .map(|_| (rng.gen_range(0..4u64), rng.gen_range(-1.0f64..1.0)))
            .collect();
        let (mut main, mut aux, layout) = tensor_from_cells(b1, b2, &cells);
        build_totals(&mut main, &mut aux, layout, (b1, b2));

        for _ in 0..1000 {
            let (a, b) = (rng.gen_range(0..b1), rng.gen_range(0..b1));
            let (c, d) = (rng.gen_range(0..b2), rng.gen_range(0..b2));
            let (lo1, hi1) = (a.min(b), a.max(b));
            let (lo2, hi2) = (c.min(d), c.max(d));

            rectangle_sum(
                &main,
                layout,
                (b1, b2),
                [lo1, lo2],
                [hi1, hi2],
                bucket_at_mut(&mut aux, layout, 0),
            );

            let mut count = 0u64;
            let mut residual = 0.0;
            for i in lo1..=hi1 {
                for j in lo2..=hi2 {
                    count += cells[i * b2 + j].0;
                    residual += cells[i * b2 + j].1;
                }
            }

            let out = bucket_at(&aux, layout, 0);
            assert_eq!(out.count(), count);
            assert_relative_eq!(out.sum_residual(0), residual, epsilon = 1e-6);
        }
    }

    proptest! {
        /// Prefix correctness on arbitrary grids: every prefix cell
        /// equals the naive sum over its dominated rectangle.
        #[test]
        fn prefix_matches_naive(
            b1 in 1usize..8,
            b2 in 1usize..8,
            seed_cells in proptest::collection::vec((0u64..5, -10.0f64..10.0), 64),
        ) {
            let cells: Vec<(u64, f64)> = (0..b1 * b2).map(|i| seed_cells[i]).collect();
            let (mut main, mut aux, layout) = tensor_from_cells(b1, b2, &cells);
            build_totals(&mut main, &mut aux, layout, (b1, b2));

            for i in 0..b1 {
                for j in 0..b2 {
                    let mut count = 0u64;
                    let mut residual = 0.0;
                    for i2 in 0..=i {
                        for j2 in 0..=j {
                            count += cells[i2 * b2 + j2].0;
                            residual += cells[i2 * b2 + j2].1;
                        }
                    }
                    let b = bucket_at(&main, layout, i * b2 + j);
                    prop_assert_eq!(b.count(), count);
                    prop_assert!((b.sum_residual(0) - residual).abs() < 1e-9);
                }
            }
        }

        /// Rectangle oracle agrees with the naive O(area) sum on random
        /// rectangles of random grids.
        #[test]
        fn oracle_matches_naive(
            b1 in 1usize..8,
            b2 in 1usize..8,
            seed_cells in proptest::collection::vec((0u64..5, -10.0f64..10.0), 64),
            corners in proptest::collection::vec((0usize..8, 0usize..8, 0usize..8, 0usize..8), 16),
        ) {
            let cells: Vec<(u64, f64)> = (0..b1 * b2).map(|i| seed_cells[i]).collect();
            let (mut main, mut aux, layout) = tensor_from_cells(b1, b2, &cells);
            build_totals(&mut main, &mut aux, layout, (b1, b2));

            for &(a, b, c, d) in &corners {
                let (lo1, hi1) = ((a % b1).min(b % b1), (a % b1).max(b % b1));
                let (lo2, hi2) = ((c % b2).min(d % b2), (c % b2).max(d % b2));

                rectangle_sum(
                    &main,
                    layout,
                    (b1, b2),
                    [lo1, lo2],
                    [hi1, hi2],
                    bucket_at_mut(&mut aux, layout, 0),
                );

                let mut count = 0u64;
                let mut residual = 0.0;
                for i in lo1..=hi1 {
                    for j in lo2..=hi2 {
                        count += cells[i * b2 + j].0;
                        residual += cells[i * b2 + j].1;
                    }
                }

                let out = bucket_at(&aux, layout, 0);
                prop_assert_eq!(out.count(), count);
                prop_assert!((out.sum_residual(0) - residual).abs() < 1e-9);
            }
        }
    }
}
