//! Branching move history.
//!
//! The tree is an append-only arena: nodes are stored in a `Vec` and refer
//! to each other by [`NodeId`]. Nothing is ever removed; "undo" just moves
//! the current pointer. Each tree carries a process-unique tag that is baked
//! into its ids, so an id minted by a tree that has since been replaced is
//! rejected instead of silently addressing an unrelated node.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::position::{Move, to_gtp};

static NEXT_TREE_TAG: AtomicU64 = AtomicU64::new(1);

/// Handle to a node of one particular [`GameTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    tree: u64,
    index: usize,
}

impl NodeId {
    /// Position of the node in its tree's creation order (root = 0).
    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationRole {
    User,
    Model,
    Engine,
}

/// One entry of a node's discussion history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub role: AnnotationRole,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl Annotation {
    pub fn new(role: AnnotationRole, content: impl Into<String>) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            role,
            content: content.into(),
            timestamp_ms,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GameNode {
    id: NodeId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    mv: Option<Move>,
    properties: BTreeMap<String, String>,
    comment: Option<String>,
    annotations: Vec<Annotation>,
}

impl GameNode {
    fn new(id: NodeId, parent: Option<NodeId>, mv: Option<Move>) -> Self {
        Self {
            id,
            parent,
            children: Vec::new(),
            mv,
            properties: BTreeMap::new(),
            comment: None,
            annotations: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order; the first one is the main line.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn mv(&self) -> Option<Move> {
        self.mv
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}

#[derive(Debug, Clone)]
pub struct GameTree {
    tag: u64,
    nodes: Vec<GameNode>,
    current: NodeId,
}

impl Default for GameTree {
    fn default() -> Self {
        Self::new()
    }
}

impl GameTree {
    /// A fresh tree holding only an empty root, which is also current.
    pub fn new() -> Self {
        let tag = NEXT_TREE_TAG.fetch_add(1, Ordering::Relaxed);
        let root = NodeId { tree: tag, index: 0 };
        Self {
            tag,
            nodes: vec![GameNode::new(root, None, None)],
            current: root,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId {
            tree: self.tag,
            index: 0,
        }
    }

    pub fn current(&self) -> NodeId {
        self.current
    }

    pub fn current_node(&self) -> &GameNode {
        &self.nodes[self.current.index]
    }

    pub fn root_node(&self) -> &GameNode {
        &self.nodes[0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the tree holds only its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.tree == self.tag && id.index < self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&GameNode> {
        if id.tree != self.tag {
            return None;
        }
        self.nodes.get(id.index)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut GameNode> {
        if id.tree != self.tag {
            return None;
        }
        self.nodes.get_mut(id.index)
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Make `id` current. Returns false (and does nothing) for foreign ids.
    pub fn go_to(&mut self, id: NodeId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.current = id;
        true
    }

    pub fn first(&mut self) -> NodeId {
        self.current = self.root();
        self.current
    }

    pub fn prev(&mut self) -> NodeId {
        if let Some(parent) = self.current_node().parent {
            self.current = parent;
        }
        self.current
    }

    /// Step into child `branch`, falling back to the first child when that
    /// branch does not exist. No-op at a leaf.
    pub fn next(&mut self, branch: usize) -> NodeId {
        let children = &self.current_node().children;
        let target = children.get(branch).or_else(|| children.first()).copied();
        if let Some(child) = target {
            self.current = child;
        }
        self.current
    }

    /// Follow first children until a leaf.
    pub fn last(&mut self) -> NodeId {
        while let Some(&child) = self.current_node().children.first() {
            self.current = child;
        }
        self.current
    }

    /// Jump to ply `depth` (root = 0).
    ///
    /// Depths on the current path are reached directly; deeper ones are
    /// reached by descending first children from the current node, stopping
    /// at a leaf if the tree is not that deep.
    pub fn jump_to_depth(&mut self, depth: usize) -> NodeId {
        let path = self.path_to(self.current);
        if let Some(&ancestor) = path.get(depth) {
            self.current = ancestor;
            return self.current;
        }
        let mut reached = path.len().saturating_sub(1);
        while reached < depth {
            let Some(&child) = self.current_node().children.first() else {
                break;
            };
            self.current = child;
            reached += 1;
        }
        self.current
    }

    // =========================================================================
    // Growth
    // =========================================================================

    /// Play `mv` from the current node.
    ///
    /// Reuses an existing child carrying the identical move, otherwise
    /// appends a new child. Either way the child becomes current. Legality
    /// is the caller's concern.
    pub fn insert_move(&mut self, mv: Move) -> NodeId {
        let existing = self
            .current_node()
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c.index].mv == Some(mv));
        let id = match existing {
            Some(id) => id,
            None => self.push_node(self.current, Some(mv)),
        };
        self.current = id;
        id
    }

    /// Append a new child to `parent` unconditionally.
    pub(crate) fn add_child(&mut self, parent: NodeId, mv: Option<Move>) -> Option<NodeId> {
        self.contains(parent).then(|| self.push_node(parent, mv))
    }

    fn push_node(&mut self, parent: NodeId, mv: Option<Move>) -> NodeId {
        let id = NodeId {
            tree: self.tag,
            index: self.nodes.len(),
        };
        self.nodes.push(GameNode::new(id, Some(parent), mv));
        self.nodes[parent.index].children.push(id);
        log::debug!("node {} added under {}", id.index, parent.index);
        id
    }

    // =========================================================================
    // Node content
    // =========================================================================

    pub(crate) fn set_property(&mut self, id: NodeId, key: &str, value: &str) -> bool {
        self.node_mut(id)
            .map(|n| n.properties.insert(key.to_string(), value.to_string()))
            .is_some()
    }

    pub fn set_comment(&mut self, id: NodeId, comment: impl Into<String>) -> bool {
        self.node_mut(id)
            .map(|n| n.comment = Some(comment.into()))
            .is_some()
    }

    /// Append to the node's comment, separated from existing text by a blank line.
    pub fn append_comment(&mut self, id: NodeId, text: &str) -> bool {
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        node.comment = Some(match node.comment.take() {
            Some(existing) if !existing.is_empty() => format!("{existing}\n\n{text}"),
            _ => text.to_string(),
        });
        true
    }

    pub fn push_annotation(&mut self, id: NodeId, annotation: Annotation) -> bool {
        self.node_mut(id)
            .map(|n| n.annotations.push(annotation))
            .is_some()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Ids from the root down to `id`, inclusive. Empty for foreign ids.
    pub fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut ptr = self.node(id).map(|n| n.id);
        while let Some(pid) = ptr {
            path.push(pid);
            ptr = self.nodes[pid.index].parent;
        }
        path.reverse();
        path
    }

    /// Plies from the root to `id`.
    pub fn depth(&self, id: NodeId) -> Option<usize> {
        self.contains(id).then(|| self.path_to(id).len() - 1)
    }

    /// Ids along first children, starting at the root.
    pub fn main_line(&self) -> Vec<NodeId> {
        let mut line = vec![self.root()];
        let mut ptr = self.root_node();
        while let Some(&child) = ptr.children.first() {
            line.push(child);
            ptr = &self.nodes[child.index];
        }
        line
    }

    /// Moves on the path to `id` as GTP vertices, oldest first.
    pub fn gtp_history(&self, id: NodeId) -> Vec<String> {
        self.path_to(id)
            .into_iter()
            .filter_map(|pid| self.nodes[pid.index].mv)
            .map(|mv| to_gtp(mv.point))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Color;

    fn b(x: usize, y: usize) -> Move {
        Move::new(Color::Black, x, y)
    }

    fn w(x: usize, y: usize) -> Move {
        Move::new(Color::White, x, y)
    }

    #[test]
    fn test_new_tree() {
        let tree = GameTree::new();
        assert_eq!(tree.current(), tree.root());
        assert!(tree.root_node().parent().is_none());
        assert!(tree.root_node().mv().is_none());
        assert!(tree.root_node().properties().is_empty());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_insert_move_dedupes() {
        let mut tree = GameTree::new();
        let first = tree.insert_move(b(3, 3));
        tree.prev();
        let again = tree.insert_move(b(3, 3));
        assert_eq!(first, again);
        assert_eq!(tree.root_node().children().len(), 1);
    }

    #[test]
    fn test_insert_move_branches_in_order() {
        let mut tree = GameTree::new();
        let main = tree.insert_move(b(3, 3));
        tree.first();
        let side = tree.insert_move(b(15, 15));
        assert_eq!(tree.root_node().children(), &[main, side]);

        // Same point, other color, is a different move.
        tree.first();
        let third = tree.insert_move(w(3, 3));
        assert_ne!(third, main);
        assert_eq!(tree.root_node().children().len(), 3);
    }

    #[test]
    fn test_navigation() {
        let mut tree = GameTree::new();
        let m1 = tree.insert_move(b(3, 3));
        let m2 = tree.insert_move(w(15, 15));
        let m3 = tree.insert_move(b(15, 3));

        assert_eq!(tree.first(), tree.root());
        assert_eq!(tree.prev(), tree.root(), "prev at root is a no-op");
        assert_eq!(tree.next(0), m1);
        assert_eq!(tree.next(7), m2, "missing branch falls back to first child");
        assert_eq!(tree.last(), m3);
        assert_eq!(tree.next(0), m3, "next at a leaf is a no-op");
        assert_eq!(tree.prev(), m2);
    }

    #[test]
    fn test_next_selects_branch() {
        let mut tree = GameTree::new();
        tree.insert_move(b(3, 3));
        tree.first();
        let side = tree.insert_move(b(4, 4));
        tree.first();
        assert_eq!(tree.next(1), side);
    }

    #[test]
    fn test_jump_to_depth() {
        let mut tree = GameTree::new();
        let m1 = tree.insert_move(b(3, 3));
        let m2 = tree.insert_move(w(15, 15));
        let m3 = tree.insert_move(b(15, 3));
        let m4 = tree.insert_move(w(3, 15));

        tree.go_to(m2);
        assert_eq!(tree.jump_to_depth(1), m1, "ancestor on current path");
        assert_eq!(tree.jump_to_depth(0), tree.root());
        assert_eq!(tree.jump_to_depth(3), m3, "descends first children");
        assert_eq!(tree.jump_to_depth(99), m4, "stops at the leaf");
        assert_eq!(tree.len(), 5, "never fabricates nodes");
    }

    #[test]
    fn test_jump_follows_current_branch() {
        let mut tree = GameTree::new();
        tree.insert_move(b(3, 3));
        tree.insert_move(w(15, 15));
        tree.first();
        let side1 = tree.insert_move(b(9, 9));
        let side2 = tree.insert_move(w(10, 10));
        assert_eq!(tree.jump_to_depth(1), side1);
        tree.go_to(side2);
        assert_eq!(tree.jump_to_depth(2), side2);
        assert_eq!(tree.depth(side2), Some(2));
    }

    #[test]
    fn test_foreign_ids_rejected() {
        let mut old = GameTree::new();
        let stale = old.insert_move(b(3, 3));

        let mut fresh = GameTree::new();
        fresh.insert_move(b(4, 4));
        assert!(fresh.node(stale).is_none());
        assert!(!fresh.go_to(stale));
        assert!(!fresh.set_comment(stale, "lost"));
        assert!(fresh.path_to(stale).is_empty());
        assert_eq!(fresh.depth(stale), None);
    }

    #[test]
    fn test_comments_and_annotations() {
        let mut tree = GameTree::new();
        let id = tree.insert_move(b(3, 3));
        assert!(tree.append_comment(id, "first"));
        assert!(tree.append_comment(id, "second"));
        assert_eq!(tree.node(id).unwrap().comment(), Some("first\n\nsecond"));

        tree.push_annotation(id, Annotation::new(AnnotationRole::User, "why?"));
        tree.push_annotation(id, Annotation::new(AnnotationRole::Model, "because"));
        let roles: Vec<_> = tree
            .node(id)
            .unwrap()
            .annotations()
            .iter()
            .map(|a| a.role)
            .collect();
        assert_eq!(roles, vec![AnnotationRole::User, AnnotationRole::Model]);
    }

    #[test]
    fn test_gtp_history_and_main_line() {
        let mut tree = GameTree::new();
        tree.insert_move(b(3, 15));
        tree.insert_move(Move::pass(Color::White));
        let leaf = tree.insert_move(b(15, 3));
        assert_eq!(tree.gtp_history(leaf), vec!["D4", "pass", "Q16"]);
        assert_eq!(tree.main_line().len(), 4);
        assert_eq!(tree.main_line().last(), Some(&leaf));
    }
}
