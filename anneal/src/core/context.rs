//! Append-only provenance tree for sampling sessions.
//!
//! Every turn, generation attempt, and validation record becomes a node.
//! Sibling branches represent alternative attempts from the same parent, so
//! the structure is a DAG of shared prefixes rather than a linear history.
//! Nodes are arena-owned and never mutated or deleted while the tree lives;
//! handles are opaque [`NodeId`]s rather than pointers, so branches can share
//! ancestors without duplication or cycles.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque handle to a node in one [`ContextTree`].
///
/// Carries the owning tree's identity so that handles from a different tree
/// are rejected instead of silently resolving to an unrelated node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    tree: u64,
    index: u32,
}

impl NodeId {
    /// Monotonic sequence index of this node within its tree (root is 0).
    pub fn seq(&self) -> u32 {
        self.index
    }
}

/// What a node records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// A conversational turn (instruction, system prompt, repair feedback).
    Turn { role: Role, content: String },
    /// One generation output produced during a sampling loop.
    Attempt { output: String, tier: Tier },
    /// The outcome of checking one requirement against one attempt.
    Validation {
        requirement: String,
        passed: bool,
        reason: String,
    },
}

/// Speaker of a [`Payload::Turn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Which backend tier produced an attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Fast,
    Slow,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Fast => write!(f, "fast"),
            Tier::Slow => write!(f, "slow"),
        }
    }
}

/// An immutable node record. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub payload: Payload,
}

/// Raised when a [`NodeId`] that does not belong to this tree is used.
/// Programming error, always propagated.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InvalidParentError {
    #[error("node {node_index} belongs to tree {node_tree}, not tree {tree}")]
    ForeignTree {
        tree: u64,
        node_tree: u64,
        node_index: u32,
    },
    /// The tree id matches but no such node was ever allocated. Happens
    /// with handles deserialized from a previous process, whose tree ids
    /// restart from 1.
    #[error("node {node_index} does not exist in tree {tree} ({len} nodes)")]
    UnknownNode {
        tree: u64,
        node_index: u32,
        len: usize,
    },
}

/// Arena-owned, append-only tree of [`NodeRecord`]s.
///
/// Appending takes a short allocation lock; records are handed out as `Arc`
/// clones so reads never hold the lock. The root node exists from
/// construction and carries an empty system turn.
#[derive(Debug)]
pub struct ContextTree {
    id: u64,
    nodes: Mutex<Vec<Arc<NodeRecord>>>,
}

impl Default for ContextTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextTree {
    pub fn new() -> Self {
        let id = NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed);
        let root = Arc::new(NodeRecord {
            id: NodeId { tree: id, index: 0 },
            parent: None,
            payload: Payload::Turn {
                role: Role::System,
                content: String::new(),
            },
        });
        Self {
            id,
            nodes: Mutex::new(vec![root]),
        }
    }

    /// Handle to the initial empty-history node.
    pub fn root(&self) -> NodeId {
        NodeId {
            tree: self.id,
            index: 0,
        }
    }

    /// Create a new node under `parent` and return its handle.
    ///
    /// Neither `parent` nor any sibling is touched; alternative attempts
    /// branch by appending to the same parent repeatedly.
    pub fn append(&self, parent: NodeId, payload: Payload) -> Result<NodeId, InvalidParentError> {
        let mut nodes = self.nodes.lock().expect("context tree lock poisoned");
        self.check_owned(parent, &nodes)?;
        let id = NodeId {
            tree: self.id,
            index: u32::try_from(nodes.len()).expect("context tree node count overflow"),
        };
        nodes.push(Arc::new(NodeRecord {
            id,
            parent: Some(parent),
            payload,
        }));
        Ok(id)
    }

    /// Fetch one node record.
    pub fn get(&self, node: NodeId) -> Result<Arc<NodeRecord>, InvalidParentError> {
        let nodes = self.nodes.lock().expect("context tree lock poisoned");
        self.check_owned(node, &nodes)?;
        Ok(Arc::clone(&nodes[node.index as usize]))
    }

    /// The path from root to `node` inclusive, in creation order.
    ///
    /// This is the history a collaborator renders into a prompt or
    /// transcript. Sibling branches (other attempts, validation records
    /// hanging off attempts) do not appear.
    pub fn lineage(&self, node: NodeId) -> Result<Lineage, InvalidParentError> {
        let nodes = self.nodes.lock().expect("context tree lock poisoned");
        self.check_owned(node, &nodes)?;
        let mut chain = Vec::new();
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            let record = Arc::clone(&nodes[id.index as usize]);
            cursor = record.parent;
            chain.push(record);
        }
        chain.reverse();
        Ok(Lineage { nodes: chain })
    }

    /// Number of nodes allocated, root included.
    pub fn len(&self) -> usize {
        self.nodes.lock().expect("context tree lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        // The root always exists.
        false
    }

    fn check_owned(
        &self,
        node: NodeId,
        nodes: &[Arc<NodeRecord>],
    ) -> Result<(), InvalidParentError> {
        if node.tree != self.id {
            return Err(InvalidParentError::ForeignTree {
                tree: self.id,
                node_tree: node.tree,
                node_index: node.index,
            });
        }
        if node.index as usize >= nodes.len() {
            return Err(InvalidParentError::UnknownNode {
                tree: self.id,
                node_index: node.index,
                len: nodes.len(),
            });
        }
        Ok(())
    }
}

/// A root-to-node path snapshot. Restartable: iterate as often as needed.
#[derive(Debug, Clone)]
pub struct Lineage {
    nodes: Vec<Arc<NodeRecord>>,
}

impl Lineage {
    pub fn iter(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.iter().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node the lineage was requested for.
    pub fn tip(&self) -> &NodeRecord {
        self.nodes.last().expect("lineage always contains the root")
    }
}
