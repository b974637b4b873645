// Copyright 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! Balance tree: the Merkle commitment over an allocation set
//!
//! Leaves are allocation hashes in index order. Internal nodes combine adjacent pairs
//! with sorted-pair hashing (`keccak256(min || max)`), so a proof is just the sibling
//! hashes from leaf to root with no left/right bookkeeping. A layer with an odd node
//! count pairs its last node with itself.

use crate::allocation::{leaf_hash, AllocationSet};
use crate::common::{Address, Amount, Hash};
use alloy::primitives::keccak256;
use thiserror::Error;

/// Errors that can occur when extracting proofs from a balance tree
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("Invalid leaf index: {index} (tree has {leaf_count} leaves)")]
    InvalidLeafIndex { index: usize, leaf_count: usize },
}

pub type Result<T> = std::result::Result<T, TreeError>;

/// A Merkle tree committing to an ordered set of balance allocations.
///
/// The root is the public commitment published ahead of the distribution; the tree
/// itself only needs to live long enough to extract per-recipient proofs. Building
/// the same allocation set twice yields an identical root and identical proofs.
pub struct BalanceTree {
    allocations: AllocationSet,

    /// Hash layers, leaves first, ending with the single-element root layer
    layers: Vec<Vec<Hash>>,

    root: Hash,
}

impl BalanceTree {
    /// Build the tree for a validated allocation set.
    ///
    /// Leaf `i` is `leaf_hash(i, account_i, amount_i)`. A single-allocation set
    /// produces a tree whose root is that leaf's hash and whose proof is empty.
    pub fn new(allocations: AllocationSet) -> Self {
        let leaves: Vec<Hash> = allocations
            .iter()
            .enumerate()
            .map(|(index, allocation)| {
                leaf_hash(index as u64, allocation.account, allocation.amount)
            })
            .collect();

        let mut layers = Vec::new();
        let mut current = leaves;
        while current.len() > 1 {
            let next: Vec<Hash> = current
                .chunks(2)
                .map(|pair| hash_pair(&pair[0], pair.get(1).unwrap_or(&pair[0])))
                .collect();
            layers.push(current);
            current = next;
        }
        let root = current[0];
        layers.push(current);

        Self {
            allocations,
            layers,
            root,
        }
    }

    /// The root hash: the single value committed on behalf of the whole set
    pub fn root(&self) -> Hash {
        self.root
    }

    /// Number of allocations committed by this tree
    pub fn leaf_count(&self) -> usize {
        self.allocations.len()
    }

    /// Height of the tree: `ceil(log2(leaf_count))`, and the length of every proof
    pub fn height(&self) -> usize {
        self.layers.len() - 1
    }

    /// Token total committed by this tree
    pub fn total(&self) -> Amount {
        self.allocations.total()
    }

    /// The allocation set this tree was built from
    pub fn allocations(&self) -> &AllocationSet {
        &self.allocations
    }

    /// Generate the inclusion proof for the allocation at `index`.
    ///
    /// Returns the sibling hashes ordered leaf-to-root. The same duplicate-last-node
    /// rule used during construction applies: at an odd layer the last node is its
    /// own sibling.
    pub fn proof(&self, index: usize) -> Result<Vec<Hash>> {
        if index >= self.leaf_count() {
            return Err(TreeError::InvalidLeafIndex {
                index,
                leaf_count: self.leaf_count(),
            });
        }

        let mut siblings = Vec::with_capacity(self.height());
        let mut pos = index;
        for layer in &self.layers[..self.layers.len() - 1] {
            let sibling = layer.get(pos ^ 1).unwrap_or(&layer[pos]);
            siblings.push(*sibling);
            pos /= 2;
        }

        Ok(siblings)
    }
}

/// Combine two nodes into their parent with order-independent hashing.
///
/// The pair is sorted before concatenation, so verification never needs to know
/// whether the running hash was the left or the right child.
fn hash_pair(a: &Hash, b: &Hash) -> Hash {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(lo.as_slice());
    data[32..].copy_from_slice(hi.as_slice());
    keccak256(data)
}

/// Check that `(index, account, amount)` is committed under `root`.
///
/// Recomputes the leaf hash and folds the proof with the same sorted-pair rule used
/// during construction. Pure and side-effect-free: a proof of the wrong length for
/// the tree, or one with any tampered element, is simply "not included" and yields
/// `false`, never an error.
pub fn verify_proof(
    index: u64,
    account: Address,
    amount: Amount,
    proof: &[Hash],
    root: Hash,
) -> bool {
    let mut node = leaf_hash(index, account, amount);
    for sibling in proof {
        node = hash_pair(&node, sibling);
    }
    node == root
}
