// Copyright 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! Claim manifest
//!
//! The full out-of-band package for one distribution: the published commitment
//! (root, token total, allocation count) plus each recipient's `(index, amount,
//! proof)` tuple. Serialisable so callers can snapshot and deliver it; how it is
//! stored or shipped is up to them.

use crate::allocation::AllocationSet;
use crate::common::{Address, Amount, Hash};
use crate::tree::{BalanceTree, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything one recipient needs to redeem its allocation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimEntry {
    pub index: u64,
    pub amount: Amount,
    pub proof: Vec<Hash>,
}

/// The published commitment plus per-recipient claim material for a distribution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimManifest {
    /// The single digest committed ahead of the distribution
    pub merkle_root: Hash,
    /// Total token amount committed across all allocations
    pub token_total: Amount,
    /// Number of allocations under the root
    pub allocation_count: usize,
    /// Per-account claim tuples, delivered to recipients out-of-band
    pub claims: BTreeMap<Address, ClaimEntry>,
}

impl ClaimManifest {
    /// Build the tree for a validated allocation set and extract every proof
    pub fn build(allocations: AllocationSet) -> Result<Self> {
        let tree = BalanceTree::new(allocations);

        let mut claims = BTreeMap::new();
        for (index, allocation) in tree.allocations().iter().enumerate() {
            let proof = tree.proof(index)?;
            claims.insert(
                allocation.account,
                ClaimEntry {
                    index: index as u64,
                    amount: allocation.amount,
                    proof,
                },
            );
        }

        Ok(Self {
            merkle_root: tree.root(),
            token_total: tree.total(),
            allocation_count: tree.leaf_count(),
            claims,
        })
    }
}
