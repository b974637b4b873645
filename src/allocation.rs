// Copyright 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! Allocations and leaf encoding
//!
//! An allocation is one recipient's `(index, account, amount)` entry in a distribution.
//! This module validates the full set at build time and defines the canonical byte
//! encoding that turns an allocation into a Merkle leaf.

use crate::common::{Address, Amount, Hash};
use alloy::primitives::keccak256;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Size of an encoded leaf record: index (32) || account (20) || amount (32)
pub const LEAF_RECORD_SIZE: usize = 84;

/// Errors rejected when sealing an allocation set, before any tree is built
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocationSetError {
    #[error("Allocation set is empty")]
    Empty,
    #[error("Account appears more than once in allocation set: {0}")]
    DuplicateAccount(Address),
    #[error("Total allocated amount overflows U256")]
    TotalOverflow,
}

/// One recipient's entry in the distribution: an account and the amount it is owed.
///
/// The allocation's index is its position in the [`AllocationSet`] it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub account: Address,
    pub amount: Amount,
}

/// An ordered, validated set of allocations.
///
/// Indices are assigned by position and are stable for the lifetime of the
/// distribution: a proof generated for an `(index, account, amount)` triple is only
/// valid against the root built from this exact ordering. Changing any entry requires
/// a new root and a new distribution instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationSet {
    allocations: Vec<Allocation>,
    total: Amount,
}

impl AllocationSet {
    /// Validate and seal an ordered list of allocations.
    ///
    /// Rejects an empty list, an account that appears more than once, and a token
    /// total that does not fit in a `U256`. Duplicate indices cannot occur: the index
    /// is the position in the list.
    pub fn new(allocations: Vec<Allocation>) -> Result<Self, AllocationSetError> {
        if allocations.is_empty() {
            return Err(AllocationSetError::Empty);
        }

        let mut seen = HashSet::with_capacity(allocations.len());
        let mut total = Amount::ZERO;
        for allocation in &allocations {
            if !seen.insert(allocation.account) {
                return Err(AllocationSetError::DuplicateAccount(allocation.account));
            }
            total = total
                .checked_add(allocation.amount)
                .ok_or(AllocationSetError::TotalOverflow)?;
        }

        Ok(Self { allocations, total })
    }

    /// Number of allocations in the set
    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    /// Always false: empty sets are rejected at construction
    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    /// Sum of all allocated amounts, the token total committed by the distribution
    pub fn total(&self) -> Amount {
        self.total
    }

    /// The allocation at `index`, if it exists
    pub fn get(&self, index: usize) -> Option<&Allocation> {
        self.allocations.get(index)
    }

    /// Iterate the allocations in index order
    pub fn iter(&self) -> std::slice::Iter<'_, Allocation> {
        self.allocations.iter()
    }
}

/// Encode one allocation into its fixed-width leaf record.
///
/// Layout is `index as u256 BE (32 bytes) || account (20 bytes) || amount BE (32 bytes)`.
/// Every field is fixed-width so two distinct triples never encode to the same bytes,
/// and the 84-byte record length differs from the 64-byte internal-node preimage, so a
/// leaf can never be re-interpreted as an internal node (second-preimage guard).
pub fn encode_leaf(index: u64, account: Address, amount: Amount) -> [u8; LEAF_RECORD_SIZE] {
    let mut record = [0u8; LEAF_RECORD_SIZE];
    record[..32].copy_from_slice(&Amount::from(index).to_be_bytes::<32>());
    record[32..52].copy_from_slice(account.as_slice());
    record[52..].copy_from_slice(&amount.to_be_bytes::<32>());
    record
}

/// Hash one allocation into its Merkle leaf digest
pub fn leaf_hash(index: u64, account: Address, amount: Amount) -> Hash {
    keccak256(encode_leaf(index, account, amount))
}
