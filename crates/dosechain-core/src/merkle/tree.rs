//! Append-only Merkle tree over committed fingerprints.
//!
//! Every level of the tree is kept, so an append rehashes only the right
//! edge (one node per level) and proofs are read straight from storage.
//! Leaf and interior hashes are domain separated (`0x00` / `0x01` prefix)
//! so an interior node can never pass as a leaf.

use std::collections::HashMap;

use thiserror::Error;

use crate::identity::hash_data;

use super::proof::{MerkleProof, ProofStep, Side};

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// Audit tree errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("Leaf not found: {0}")]
    LeafNotFound(String),

    #[error("Leaf already present: {0}")]
    DuplicateLeaf(String),

    #[error("Invalid tree state: {0}")]
    InvalidState(String),
}

pub type AuditResult<T> = Result<T, AuditError>;

/// Result of appending a leaf.
#[derive(Debug, Clone)]
pub struct LeafCommit {
    /// The appended leaf
    pub leaf_hash: String,
    /// New root hash after the append
    pub root_hash: String,
    /// New tree height
    pub tree_height: u32,
    /// Total leaf count
    pub leaf_count: u32,
}

/// Tree statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeStats {
    pub root_hash: Option<String>,
    pub height: u32,
    pub leaf_count: u32,
}

/// In-memory append-only Merkle tree. Leaves are fingerprints in commit order.
#[derive(Debug, Clone, Default)]
pub struct AuditTree {
    leaves: Vec<String>,
    positions: HashMap<String, usize>,
    /// `levels[0]` holds leaf nodes, the last level holds only the root
    levels: Vec<Vec<String>>,
}

impl AuditTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a leaf and update the path to the root.
    ///
    /// Duplicate leaves are rejected and leave the tree untouched.
    pub fn append(&mut self, leaf_hash: &str) -> AuditResult<LeafCommit> {
        if self.positions.contains_key(leaf_hash) {
            return Err(AuditError::DuplicateLeaf(leaf_hash.to_string()));
        }

        let mut index = self.leaves.len();
        self.positions.insert(leaf_hash.to_string(), index);
        self.leaves.push(leaf_hash.to_string());
        if self.levels.is_empty() {
            self.levels.push(Vec::new());
        }
        self.levels[0].push(leaf_node_hash(leaf_hash));

        let mut depth = 0;
        while self.levels[depth].len() > 1 {
            let level = &self.levels[depth];
            let parent = index / 2;
            let left = &level[2 * parent];
            // Odd node at the end pairs with itself
            let right = level.get(2 * parent + 1).unwrap_or(left);
            let node = hash_pair(left, right);

            if self.levels.len() == depth + 1 {
                self.levels.push(Vec::new());
            }
            let next = &mut self.levels[depth + 1];
            if parent < next.len() {
                next[parent] = node;
            } else {
                next.push(node);
            }

            index = parent;
            depth += 1;
        }

        let root_hash = self.levels[depth][0].clone();
        Ok(LeafCommit {
            leaf_hash: leaf_hash.to_string(),
            root_hash,
            tree_height: self.levels.len() as u32,
            leaf_count: self.leaves.len() as u32,
        })
    }

    pub fn contains(&self, leaf_hash: &str) -> bool {
        self.positions.contains_key(leaf_hash)
    }

    pub fn root_hash(&self) -> Option<&str> {
        self.levels
            .last()
            .and_then(|level| level.first())
            .map(String::as_str)
    }

    pub fn leaves(&self) -> &[String] {
        &self.leaves
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats {
            root_hash: self.root_hash().map(str::to_string),
            height: self.levels.len() as u32,
            leaf_count: self.leaves.len() as u32,
        }
    }

    /// Generate an inclusion proof for a leaf.
    pub fn generate_proof(&self, leaf_hash: &str) -> AuditResult<MerkleProof> {
        let root_hash = self
            .root_hash()
            .map(str::to_string)
            .ok_or_else(|| AuditError::InvalidState("Tree has no root".into()))?;

        let leaf_index = *self
            .positions
            .get(leaf_hash)
            .ok_or_else(|| AuditError::LeafNotFound(leaf_hash.to_string()))?;

        let mut path = Vec::with_capacity(self.levels.len().saturating_sub(1));
        let mut index = leaf_index;

        for level in &self.levels[..self.levels.len() - 1] {
            let (sibling_index, side) = if index % 2 == 0 {
                (index + 1, Side::Right)
            } else {
                (index - 1, Side::Left)
            };
            let sibling = level.get(sibling_index).unwrap_or(&level[index]).clone();
            path.push(ProofStep { sibling, side });
            index /= 2;
        }

        Ok(MerkleProof {
            leaf_hash: leaf_hash.to_string(),
            root_hash,
            leaf_index,
            path,
        })
    }
}

/// Hash of the leaf node holding a fingerprint.
pub fn leaf_node_hash(leaf: &str) -> String {
    let mut preimage = Vec::with_capacity(1 + leaf.len());
    preimage.push(LEAF_PREFIX);
    preimage.extend_from_slice(leaf.as_bytes());
    hash_data(&preimage)
}

fn hash_pair(left: &str, right: &str) -> String {
    let mut preimage = Vec::with_capacity(1 + left.len() + right.len());
    preimage.push(NODE_PREFIX);
    preimage.extend_from_slice(left.as_bytes());
    preimage.extend_from_slice(right.as_bytes());
    hash_data(&preimage)
}

/// Check a proof on its own, without access to the tree.
///
/// Each step's side must agree with the claimed leaf index.
pub fn verify_proof(proof: &MerkleProof) -> bool {
    let mut current = leaf_node_hash(&proof.leaf_hash);
    let mut index = proof.leaf_index;

    for step in &proof.path {
        current = match (step.side, index % 2) {
            (Side::Right, 0) => hash_pair(&current, &step.sibling),
            (Side::Left, 1) => hash_pair(&step.sibling, &current),
            _ => return false,
        };
        index /= 2;
    }

    index == 0 && current == proof.root_hash
}
