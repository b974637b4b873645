// Copyright 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! Distribution controller
//!
//! Drives the claim state machine against a published Merkle root: verify the proof,
//! atomically record the index as claimed, then pay out through the external token
//! ledger. Per-index state only ever moves `Unclaimed -> Claimed`; the distribution
//! as a whole moves `Unfunded -> Funded` at most once.

use crate::claimed_bitmap::ClaimedBitmap;
use crate::common::{Address, Amount, Hash};
use crate::tree::{verify_proof, BalanceTree};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Failure reported by the external transfer capability
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("Insufficient funds in backing ledger: have {have}, need {need}")]
pub struct InsufficientFunds {
    pub have: Amount,
    pub need: Amount,
}

/// The external token ledger a distribution pays out of.
///
/// The distributor never manages the underlying balance; it only decides whether and
/// how much to request. `transfer` is the sole suspension point of the claim path and
/// is treated as a synchronous capability that either moves the tokens or reports
/// insufficient funds.
pub trait TokenLedger: Send + Sync {
    /// Balance currently backing this distribution
    fn balance(&self) -> Amount;

    /// Move `amount` tokens to `to`
    fn transfer(&self, to: Address, amount: Amount) -> Result<(), InsufficientFunds>;
}

/// Errors returned by the distribution controller. All are recoverable by the caller;
/// the controller never retries internally.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DistributorError {
    #[error("Invalid proof for index {index}")]
    InvalidProof { index: u64 },
    #[error("Allocation {index} has already been claimed")]
    AlreadyClaimed { index: u64 },
    #[error("Distribution has already been funded")]
    AlreadyFunded,
    #[error("Insufficient token balance: have {have}, need {need}")]
    InsufficientBalance { have: Amount, need: Amount },
}

/// Notification emitted for a completed claim
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub index: u64,
    pub account: Address,
    pub amount: Amount,
}

/// Orchestrates claims against a committed allocation root.
///
/// Holds only the published commitment (root, allocation count, token total), the
/// packed claim ledger and the funded flag, so a claim processor can run from the
/// commitment metadata alone, without the tree that produced it.
///
/// The claim path is safe under concurrent invocation: proof verification is pure,
/// and the bitmap's check-and-set decides every same-index race.
pub struct MerkleDistributor<L: TokenLedger> {
    merkle_root: Hash,
    allocation_count: usize,
    total: Amount,
    claimed: ClaimedBitmap,
    funded: AtomicBool,
    ledger: L,
}

impl<L: TokenLedger> MerkleDistributor<L> {
    /// Set up a distribution against a published commitment
    pub fn new(merkle_root: Hash, allocation_count: usize, total: Amount, ledger: L) -> Self {
        Self {
            merkle_root,
            allocation_count,
            total,
            claimed: ClaimedBitmap::new(allocation_count),
            funded: AtomicBool::new(false),
            ledger,
        }
    }

    /// Set up a distribution straight from a freshly built tree
    pub fn from_tree(tree: &BalanceTree, ledger: L) -> Self {
        Self::new(tree.root(), tree.leaf_count(), tree.total(), ledger)
    }

    /// The committed Merkle root
    pub fn merkle_root(&self) -> Hash {
        self.merkle_root
    }

    /// Token total committed by the distribution
    pub fn total(&self) -> Amount {
        self.total
    }

    /// Number of allocations under the committed root
    pub fn allocation_count(&self) -> usize {
        self.allocation_count
    }

    /// Whether the explicit funding step has completed
    pub fn is_funded(&self) -> bool {
        self.funded.load(Ordering::Acquire)
    }

    /// Whether the allocation at `index` has been claimed
    pub fn is_claimed(&self, index: u64) -> bool {
        usize::try_from(index).is_ok_and(|index| self.claimed.is_claimed(index))
    }

    /// Number of allocations claimed so far
    pub fn claimed_count(&self) -> usize {
        self.claimed.count_claimed()
    }

    /// The external ledger backing this distribution
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// One-time `Unfunded -> Funded` transition.
    ///
    /// Requires the backing ledger to already hold at least the committed total;
    /// an insufficient balance leaves the flag untouched, so funding can be retried
    /// once the ledger is topped up. A second successful attempt, including one that
    /// loses the compare-and-set race, is rejected with `AlreadyFunded`.
    ///
    /// Claims do not require this step: a distribution whose ledger was funded by any
    /// other route pays out as long as the balance covers each claim.
    pub fn fund(&self) -> Result<(), DistributorError> {
        if self.funded.load(Ordering::Acquire) {
            return Err(DistributorError::AlreadyFunded);
        }

        let have = self.ledger.balance();
        if have < self.total {
            return Err(DistributorError::InsufficientBalance {
                have,
                need: self.total,
            });
        }

        if self
            .funded
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DistributorError::AlreadyFunded);
        }

        info!(
            "Distribution funded: {} tokens backing {} allocations under root {}",
            self.total, self.allocation_count, self.merkle_root
        );
        Ok(())
    }

    /// Process one claim request.
    ///
    /// Transition order:
    /// 1. Reject on a proof that does not reproduce the committed root (covers wrong
    ///    index, account, amount, tampered proof, or a proof for a different tree).
    /// 2. Reject if the index is already claimed.
    /// 3. Atomically set the claimed bit; losing a race here is the same rejection,
    ///    and no transfer is attempted.
    /// 4. Invoke the external transfer. On insufficient funds the claim fails but
    ///    the claimed bit stays set: the slot can never pay out twice, even across
    ///    a failed transfer and a retry.
    /// 5. Emit the claim-completed notification.
    pub fn claim(
        &self,
        index: u64,
        account: Address,
        amount: Amount,
        proof: &[Hash],
    ) -> Result<ClaimReceipt, DistributorError> {
        debug!("Claim request for index {index}: {amount} tokens to {account}");

        if index >= self.allocation_count as u64
            || !verify_proof(index, account, amount, proof, self.merkle_root)
        {
            return Err(DistributorError::InvalidProof { index });
        }
        let slot = index as usize;

        if self.claimed.is_claimed(slot) {
            return Err(DistributorError::AlreadyClaimed { index });
        }
        if !self.claimed.mark_claimed(slot) {
            return Err(DistributorError::AlreadyClaimed { index });
        }

        // Deliberately no rollback of the claimed bit on failure; see above.
        self.ledger.transfer(account, amount).map_err(
            |InsufficientFunds { have, need }| DistributorError::InsufficientBalance {
                have,
                need,
            },
        )?;

        info!("Claimed allocation {index}: {amount} tokens to {account}");
        Ok(ClaimReceipt {
            index,
            account,
            amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::{Allocation, AllocationSet};
    use std::sync::Mutex;

    /// In-memory stand-in for the external token ledger
    struct MockLedger {
        pool: Mutex<Amount>,
        paid: Mutex<Vec<(Address, Amount)>>,
    }

    impl MockLedger {
        fn with_pool(amount: u64) -> Self {
            Self {
                pool: Mutex::new(Amount::from(amount)),
                paid: Mutex::new(Vec::new()),
            }
        }

        fn pool(&self) -> Amount {
            *self.pool.lock().unwrap()
        }

        fn paid(&self) -> Vec<(Address, Amount)> {
            self.paid.lock().unwrap().clone()
        }
    }

    impl TokenLedger for MockLedger {
        fn balance(&self) -> Amount {
            *self.pool.lock().unwrap()
        }

        fn transfer(&self, to: Address, amount: Amount) -> Result<(), InsufficientFunds> {
            let mut pool = self.pool.lock().unwrap();
            if *pool < amount {
                return Err(InsufficientFunds {
                    have: *pool,
                    need: amount,
                });
            }
            *pool -= amount;
            self.paid.lock().unwrap().push((to, amount));
            Ok(())
        }
    }

    fn two_account_tree() -> BalanceTree {
        // The (A, 100), (B, 101) scenario at indices 0 and 1
        let set = AllocationSet::new(vec![
            Allocation {
                account: Address::repeat_byte(0xaa),
                amount: Amount::from(100u64),
            },
            Allocation {
                account: Address::repeat_byte(0xbb),
                amount: Amount::from(101u64),
            },
        ])
        .unwrap();
        BalanceTree::new(set)
    }

    #[test]
    fn test_claim_both_allocations_exactly_once() {
        let tree = two_account_tree();
        let a = *tree.allocations().get(0).unwrap();
        let b = *tree.allocations().get(1).unwrap();
        let distributor = MerkleDistributor::from_tree(&tree, MockLedger::with_pool(201));

        let proof0 = tree.proof(0).unwrap();
        let proof1 = tree.proof(1).unwrap();

        let receipt = distributor.claim(0, a.account, a.amount, &proof0).unwrap();
        assert_eq!(
            receipt,
            ClaimReceipt {
                index: 0,
                account: a.account,
                amount: a.amount
            }
        );
        assert_eq!(
            distributor.claim(0, a.account, a.amount, &proof0),
            Err(DistributorError::AlreadyClaimed { index: 0 })
        );

        distributor.claim(1, b.account, b.amount, &proof1).unwrap();

        assert!(distributor.is_claimed(0));
        assert!(distributor.is_claimed(1));
        assert_eq!(distributor.claimed_count(), 2);
        // Total transferred is 201, draining the pool
        assert_eq!(distributor.ledger.pool(), Amount::ZERO);
        assert_eq!(
            distributor.ledger.paid(),
            vec![(a.account, a.amount), (b.account, b.amount)]
        );
    }

    #[test]
    fn test_claim_with_wrong_proof_rejected() {
        let tree = two_account_tree();
        let a = *tree.allocations().get(0).unwrap();
        let b = *tree.allocations().get(1).unwrap();
        let distributor = MerkleDistributor::from_tree(&tree, MockLedger::with_pool(201));
        let proof0 = tree.proof(0).unwrap();

        // proof0 is the wrong path for index 1
        assert_eq!(
            distributor.claim(1, b.account, b.amount, &proof0),
            Err(DistributorError::InvalidProof { index: 1 })
        );
        // Wrong amount with the right proof
        assert_eq!(
            distributor.claim(0, a.account, Amount::from(101u64), &proof0),
            Err(DistributorError::InvalidProof { index: 0 })
        );
        // Index beyond the allocation count
        assert_eq!(
            distributor.claim(2, a.account, a.amount, &proof0),
            Err(DistributorError::InvalidProof { index: 2 })
        );
        // Empty proof against a two-leaf root
        assert_eq!(
            distributor.claim(0, a.account, a.amount, &[]),
            Err(DistributorError::InvalidProof { index: 0 })
        );

        assert_eq!(distributor.claimed_count(), 0);
        assert!(distributor.ledger.paid().is_empty());
    }

    #[test]
    fn test_claim_rejection_leaves_other_indices_untouched() {
        let tree = two_account_tree();
        let a = *tree.allocations().get(0).unwrap();
        let distributor = MerkleDistributor::from_tree(&tree, MockLedger::with_pool(201));
        let proof0 = tree.proof(0).unwrap();

        distributor.claim(0, a.account, a.amount, &proof0).unwrap();
        assert!(distributor.is_claimed(0));
        assert!(!distributor.is_claimed(1));
    }

    #[test]
    fn test_fund_once_then_rejected() {
        let tree = two_account_tree();
        let distributor = MerkleDistributor::from_tree(&tree, MockLedger::with_pool(201));

        assert!(!distributor.is_funded());
        distributor.fund().unwrap();
        assert!(distributor.is_funded());
        assert_eq!(distributor.fund(), Err(DistributorError::AlreadyFunded));
    }

    #[test]
    fn test_fund_requires_committed_total_and_is_retryable() {
        let tree = two_account_tree();
        let distributor = MerkleDistributor::from_tree(&tree, MockLedger::with_pool(200));

        assert_eq!(
            distributor.fund(),
            Err(DistributorError::InsufficientBalance {
                have: Amount::from(200u64),
                need: Amount::from(201u64),
            })
        );
        assert!(!distributor.is_funded());

        // Top the ledger up and retry
        *distributor.ledger.pool.lock().unwrap() = Amount::from(201u64);
        distributor.fund().unwrap();
        assert!(distributor.is_funded());
    }

    #[test]
    fn test_claims_succeed_without_explicit_funding() {
        // Tokens that arrived by any route back claims just the same
        let tree = two_account_tree();
        let a = *tree.allocations().get(0).unwrap();
        let distributor = MerkleDistributor::from_tree(&tree, MockLedger::with_pool(201));
        let proof0 = tree.proof(0).unwrap();

        assert!(!distributor.is_funded());
        distributor.claim(0, a.account, a.amount, &proof0).unwrap();
    }

    #[test]
    fn test_failed_transfer_still_consumes_the_slot() {
        let tree = two_account_tree();
        let a = *tree.allocations().get(0).unwrap();
        let distributor = MerkleDistributor::from_tree(&tree, MockLedger::with_pool(99));
        let proof0 = tree.proof(0).unwrap();

        assert_eq!(
            distributor.claim(0, a.account, a.amount, &proof0),
            Err(DistributorError::InsufficientBalance {
                have: Amount::from(99u64),
                need: Amount::from(100u64),
            })
        );

        // The claimed bit is set despite the failed payout, so a retry with the same
        // valid proof is deterministically rejected and no tokens ever move.
        assert!(distributor.is_claimed(0));
        assert_eq!(
            distributor.claim(0, a.account, a.amount, &proof0),
            Err(DistributorError::AlreadyClaimed { index: 0 })
        );
        assert_eq!(distributor.ledger.pool(), Amount::from(99u64));
        assert!(distributor.ledger.paid().is_empty());
    }

    #[test]
    fn test_concurrent_claims_on_same_index_pay_once() {
        let tree = two_account_tree();
        let a = *tree.allocations().get(0).unwrap();
        let distributor = MerkleDistributor::from_tree(&tree, MockLedger::with_pool(201));
        let proof0 = tree.proof(0).unwrap();

        let mut successes = 0;
        let mut already_claimed = 0;
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    let distributor = &distributor;
                    let proof0 = &proof0;
                    scope.spawn(move || distributor.claim(0, a.account, a.amount, proof0))
                })
                .collect();
            for handle in handles {
                match handle.join().unwrap() {
                    Ok(_) => successes += 1,
                    Err(DistributorError::AlreadyClaimed { index: 0 }) => already_claimed += 1,
                    Err(other) => panic!("unexpected claim error: {other:?}"),
                }
            }
        });

        assert_eq!(successes, 1);
        assert_eq!(already_claimed, 15);
        assert_eq!(distributor.ledger.paid(), vec![(a.account, a.amount)]);
    }
}
