// Copyright 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! Merkle-tree token distribution engine
//!
//! Distributes a fixed pool of tokens to a known set of recipients exactly once each.
//! The recipient list is committed to with a single Merkle root, so eligibility and
//! amounts are verifiable from a per-recipient inclusion proof without the full list.
//!
//! The flow:
//! - Collect `account -> amount` entries into an [`AllocationSet`] (indices are assigned
//!   by position and are stable thereafter).
//! - Build a [`BalanceTree`] over the set: leaves are keccak256 over the packed
//!   `(index, account, amount)` record, internal nodes use sorted-pair hashing so proofs
//!   carry no left/right bookkeeping.
//! - Publish the root (and optionally a full [`ClaimManifest`] with every recipient's
//!   `(index, amount, proof)` tuple, delivered out-of-band).
//! - Run claims through a [`MerkleDistributor`]: each request is verified against the
//!   committed root, recorded in a packed atomic bitmap so an index pays out at most
//!   once, then paid through an external [`TokenLedger`].

#[macro_use]
extern crate tracing;

pub mod allocation;
pub mod claimed_bitmap;
pub mod common;
pub mod distributor;
pub mod manifest;
pub mod tree;

pub use allocation::{encode_leaf, leaf_hash, Allocation, AllocationSet, AllocationSetError};
pub use claimed_bitmap::ClaimedBitmap;
pub use distributor::{
    ClaimReceipt, DistributorError, InsufficientFunds, MerkleDistributor, TokenLedger,
};
pub use manifest::{ClaimEntry, ClaimManifest};
pub use tree::{verify_proof, BalanceTree, TreeError};
