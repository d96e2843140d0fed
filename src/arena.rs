//! Reusable scratch storage for the histogram tensor.
//!
//! One arena backs the tensor of one scoring call. The buffer doubles
//! whenever a request outgrows it, so a sequence of calls with growing
//! grids settles into a steady state with no further allocation. Growth
//! is fallible: a failed reservation surfaces as an error instead of
//! aborting the process, and the arena retains no partial state after a
//! failure.

use log::trace;

use crate::error::InteractionError;

/// Growable word buffer serving tensor storage requests.
///
/// Words are `u64` so a bucket record (one count word plus `f64` bit
/// patterns) is naturally aligned wherever it starts.
#[derive(Debug, Default)]
pub struct ScratchArena {
    words: Vec<u64>,
}

impl ScratchArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current capacity in words.
    #[inline]
    pub fn capacity_words(&self) -> usize {
        self.words.len()
    }

    /// Borrow at least `n_words` of scratch, growing if needed.
    ///
    /// When the buffer is too small it is released and replaced by one of
    /// `2 * n_words`, amortizing growth across calls. The returned slice
    /// holds whatever the previous user left behind; callers zero what
    /// they use.
    pub fn request(&mut self, n_words: usize) -> Result<&mut [u64], InteractionError> {
        if self.words.len() < n_words {
            let target = n_words
                .checked_mul(2)
                .ok_or(InteractionError::SizeOverflow)?;
            trace!("growing scratch arena to {target} words");

            // Release the old buffer before reserving the new one so peak
            // usage stays at one buffer.
            self.words = Vec::new();
            let mut fresh: Vec<u64> = Vec::new();
            fresh
                .try_reserve_exact(target)
                .map_err(|_| InteractionError::OutOfMemory { words: target })?;
            fresh.resize(target, 0);
            self.words = fresh;
        }
        Ok(&mut self.words[..n_words])
    }
}
