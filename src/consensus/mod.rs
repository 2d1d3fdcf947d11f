//! Replica state and the proofing round
//!
//! A round moves through `commit` (freeze and broadcast `StartProofing`),
//! parallel mining on every replica, `proof_found` (first valid proof wins)
//! and `add_block` (commit and hand the block to the ledger store).

pub mod node;
pub mod registry;

pub use node::{Node, Round};
pub use registry::{Admission, RejectReason, UserRegistry};
