//! Reply-tree reconstruction: breadth-first link-and-shrink over a candidate pool.
//!
//! The tree is an arena of slots addressed by `NodeId`; slot 0 is always the root.
//! Nodes are only ever appended with a parent that already exists, so parent chains
//! are acyclic by construction. `ancestry` still bounds its walk by the arena size.

use crate::error::ConvoError;
use crate::node::PostNode;
use ahash::{AHashMap, AHashSet};
use std::collections::VecDeque;

/// Index of a node inside its `ConversationTree`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Whether a freshly linked reply is expanded further.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExpandPolicy {
    /// Skip replies reporting `reply_count == 0`. Cheap, but the count can be stale,
    /// in which case deeper replies are dropped as orphans.
    #[default]
    TrustReplyCount,
    /// Expand every linked reply.
    AlwaysExpand,
}

impl ExpandPolicy {
    #[inline]
    fn should_expand(self, post: &PostNode) -> bool {
        match self {
            ExpandPolicy::TrustReplyCount => post.reply_count != 0,
            ExpandPolicy::AlwaysExpand => true,
        }
    }
}

/// One breadth-first step: the node expanded and what it did to the pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepStats {
    pub expanded: NodeId,
    pub pool_before: usize,
    pub pool_after: usize,
    pub linked: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconstructionStats {
    pub steps: Vec<StepStats>,
    pub linked: usize,
    /// Candidates left in the pool when reconstruction stopped (parent never found).
    pub orphaned: usize,
    /// Candidates dropped up front: the root itself or a repeated id.
    pub duplicates: usize,
}

#[derive(Debug)]
struct Slot {
    post: PostNode,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A single conversation rooted at one post.
#[derive(Debug)]
pub struct ConversationTree {
    slots: Vec<Slot>,
    index: AHashMap<String, NodeId>,
    /// Every node linked during reconstruction, in discovery order (root excluded).
    linked: Vec<NodeId>,
    populated: bool,
}

impl ConversationTree {
    pub fn new(root: PostNode) -> Self {
        let mut index = AHashMap::new();
        index.insert(root.id.clone(), NodeId::ROOT);
        Self {
            slots: vec![Slot { post: root, parent: None, children: Vec::new() }],
            index,
            linked: Vec::new(),
            populated: false,
        }
    }

    #[inline]
    pub fn root(&self) -> &PostNode {
        &self.slots[0].post
    }

    #[inline]
    pub fn conversation_id(&self) -> &str {
        &self.root().conversation_id
    }

    /// Rebuild the reply tree from `candidates` (any order, membership unverified).
    ///
    /// FIFO over discovered nodes: each dequeued node takes its direct replies out of the
    /// pool (in pool order), links them, and queues those allowed by `policy`. Stops when
    /// the queue or the pool runs dry. Candidates whose parent never shows up stay in the
    /// pool and are reported as `orphaned`.
    ///
    /// Linkage is written once; a second call fails.
    pub fn populate<I>(&mut self, candidates: I, policy: ExpandPolicy) -> Result<ReconstructionStats, ConvoError>
    where
        I: IntoIterator<Item = PostNode>,
    {
        if self.populated {
            return Err(ConvoError::InternalInvariantViolation(format!(
                "conversation {} already populated",
                self.conversation_id()
            )));
        }
        self.populated = true;

        let mut stats = ReconstructionStats::default();
        let mut seen: AHashSet<String> = self.index.keys().cloned().collect();
        let mut pool: Vec<PostNode> = Vec::new();
        for c in candidates {
            if seen.insert(c.id.clone()) {
                pool.push(c);
            } else {
                stats.duplicates += 1;
            }
        }

        let mut queue: VecDeque<NodeId> = VecDeque::from([NodeId::ROOT]);
        while !pool.is_empty() {
            let Some(node) = queue.pop_front() else { break };
            let node_id = self.slots[node.0].post.id.clone();

            let pool_before = pool.len();
            let (direct, remainder): (Vec<PostNode>, Vec<PostNode>) =
                pool.into_iter().partition(|c| c.replies_to(&node_id));
            pool = remainder;

            let linked = direct.len();
            for reply in direct {
                let expand = policy.should_expand(&reply);
                let child = self.link(node, reply)?;
                if expand {
                    queue.push_back(child);
                }
            }

            stats.linked += linked;
            stats.steps.push(StepStats { expanded: node, pool_before, pool_after: pool.len(), linked });
        }

        stats.orphaned = pool.len();
        if stats.orphaned > 0 {
            tracing::debug!(
                conversation = %self.conversation_id(),
                orphaned = stats.orphaned,
                "candidates left unlinked"
            );
        }
        Ok(stats)
    }

    /// Append `post` under `parent`. The post must not already be in the tree.
    fn link(&mut self, parent: NodeId, post: PostNode) -> Result<NodeId, ConvoError> {
        if parent.0 >= self.slots.len() {
            return Err(ConvoError::InternalInvariantViolation(format!(
                "parent slot {} out of range ({} nodes)",
                parent.0,
                self.slots.len()
            )));
        }
        if self.index.contains_key(&post.id) {
            return Err(ConvoError::InternalInvariantViolation(format!("post {} linked twice", post.id)));
        }

        let id = NodeId(self.slots.len());
        self.index.insert(post.id.clone(), id);
        self.slots.push(Slot { post, parent: Some(parent), children: Vec::new() });
        self.slots[parent.0].children.push(id);
        self.linked.push(id);
        Ok(id)
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&PostNode> {
        self.slots.get(id.0).map(|s| &s.post)
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots.get(id.0).and_then(|s| s.parent)
    }

    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.slots.get(id.0).map(|s| s.children.as_slice()).unwrap_or(&[])
    }

    pub fn find(&self, post_id: &str) -> Option<NodeId> {
        self.index.get(post_id).copied()
    }

    /// Nodes in the tree, root included.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn linked_ids(&self) -> &[NodeId] {
        &self.linked
    }

    pub fn linked(&self) -> impl Iterator<Item = &PostNode> + '_ {
        self.linked.iter().map(move |id| &self.slots[id.0].post)
    }

    /// Linked nodes with no linked replies.
    pub fn terminal_ids(&self) -> Vec<NodeId> {
        self.linked
            .iter()
            .copied()
            .filter(|id| self.slots[id.0].children.is_empty())
            .collect()
    }

    /// Path from the root to `id`, both inclusive.
    pub fn ancestry(&self, id: NodeId) -> Result<Vec<NodeId>, ConvoError> {
        if id.0 >= self.slots.len() {
            return Err(ConvoError::InternalInvariantViolation(format!("unknown node slot {}", id.0)));
        }
        let limit = self.slots.len();
        let mut path = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            if path.len() >= limit {
                return Err(ConvoError::InternalInvariantViolation(format!(
                    "cyclic parent chain at post {} in conversation {}",
                    self.slots[id.0].post.id,
                    self.conversation_id()
                )));
            }
            path.push(c);
            cur = self.slots.get(c.0).and_then(|s| s.parent);
        }
        path.reverse();
        if path.first() != Some(&NodeId::ROOT) {
            return Err(ConvoError::InternalInvariantViolation(format!(
                "parent chain of post {} does not reach the root",
                self.slots[id.0].post.id
            )));
        }
        Ok(path)
    }

    /// Messages from the root down to `id`, oldest first.
    pub fn conversation(&self, id: NodeId) -> Result<Vec<String>, ConvoError> {
        Ok(self
            .ancestry(id)?
            .into_iter()
            .map(|n| self.slots[n.0].post.message.clone())
            .collect())
    }

    /// Edges between `id` and the root.
    pub fn depth(&self, id: NodeId) -> Result<usize, ConvoError> {
        Ok(self.ancestry(id)?.len() - 1)
    }
}

impl std::ops::Index<NodeId> for ConversationTree {
    type Output = PostNode;

    fn index(&self, id: NodeId) -> &PostNode {
        &self.slots[id.0].post
    }
}
