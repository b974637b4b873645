// Copyright 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! Packed claim ledger
//!
//! One bit per allocation index, packed into 64-bit atomic words. The bit for an
//! index flips to claimed exactly once and is never reset. `mark_claimed` is the
//! single serialization point of the claim path: a lock-free read-modify-write on
//! the word holding the target bit, so claims on indices in different words never
//! contend at all.

use std::sync::atomic::{AtomicU64, Ordering};

const WORD_BITS: usize = u64::BITS as usize;

/// Record of which allocation indices have already been paid out
pub struct ClaimedBitmap {
    words: Vec<AtomicU64>,
    len: usize,
}

impl ClaimedBitmap {
    /// All-unclaimed bitmap covering `len` allocation indices
    pub fn new(len: usize) -> Self {
        let word_count = len.div_ceil(WORD_BITS);
        Self {
            words: (0..word_count).map(|_| AtomicU64::new(0)).collect(),
            len,
        }
    }

    /// Number of allocation indices covered
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the allocation at `index` has been claimed.
    ///
    /// Out-of-range indices read as unclaimed. Note that a `false` here can be stale
    /// under concurrency; only [`Self::mark_claimed`] decides a race.
    pub fn is_claimed(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        let word = self.words[index / WORD_BITS].load(Ordering::Acquire);
        word & (1u64 << (index % WORD_BITS)) != 0
    }

    /// Atomically set the claimed bit for `index`.
    ///
    /// Returns `true` if this call flipped the bit (claimed now) and `false` if it
    /// was already set. Under concurrent invocation for the same index, exactly one
    /// caller observes `true`. Out-of-range indices report `false` and set nothing.
    pub fn mark_claimed(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        let mask = 1u64 << (index % WORD_BITS);
        let previous = self.words[index / WORD_BITS].fetch_or(mask, Ordering::AcqRel);
        previous & mask == 0
    }

    /// Number of indices claimed so far
    pub fn count_claimed(&self) -> usize {
        self.words
            .iter()
            .map(|word| word.load(Ordering::Acquire).count_ones() as usize)
            .sum()
    }
}
