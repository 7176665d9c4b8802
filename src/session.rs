//! One game being reviewed: a tree, its current node and that node's board.
//!
//! A session serializes every mutation of its tree. The board shown for the
//! current node is re-derived after each navigation step, so it always
//! matches the path from the root.

use crate::analysis::AnalysisResult;
use crate::board::{Color, Point};
use crate::constants::DEFAULT_KOMI;
use crate::position::{Move, MoveError, apply_move};
use crate::replay::{DerivedPosition, derive_current};
use crate::sgf;
use crate::tree::{Annotation, AnnotationRole, GameTree, NodeId};

/// Game information read from the root node.
#[derive(Debug, Clone, PartialEq)]
pub struct GameInfo {
    pub black_player: String,
    pub white_player: String,
    pub black_rank: String,
    pub white_rank: String,
    pub result: String,
    pub komi: f64,
}

/// Parse a komi property, falling back to the default.
pub fn parse_komi(value: Option<&str>) -> f64 {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|k| k.is_finite())
        .unwrap_or(DEFAULT_KOMI)
}

#[derive(Debug, Clone, Default)]
pub struct GameSession {
    tree: GameTree,
    position: DerivedPosition,
}

impl GameSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sgf(text: &str) -> Self {
        Self::from_tree(sgf::parse(text))
    }

    pub fn from_tree(tree: GameTree) -> Self {
        let position = derive_current(&tree);
        Self { tree, position }
    }

    /// Replace the whole game with the record in `text`.
    pub fn load_sgf(&mut self, text: &str) {
        *self = Self::from_sgf(text);
        log::debug!("loaded record with {} nodes", self.tree.len());
    }

    pub fn to_sgf(&self) -> String {
        sgf::generate(&self.tree)
    }

    pub fn tree(&self) -> &GameTree {
        &self.tree
    }

    pub fn position(&self) -> &DerivedPosition {
        &self.position
    }

    pub fn to_move(&self) -> Color {
        self.position.to_move
    }

    pub fn current(&self) -> NodeId {
        self.tree.current()
    }

    pub fn current_depth(&self) -> usize {
        self.tree.depth(self.tree.current()).unwrap_or_default()
    }

    /// Moves leading to the current node, as GTP vertices.
    pub fn gtp_history(&self) -> Vec<String> {
        self.tree.gtp_history(self.tree.current())
    }

    pub fn game_info(&self) -> GameInfo {
        let root = self.tree.root_node();
        let prop = |key: &str, default: &str| root.property(key).unwrap_or(default).to_string();
        GameInfo {
            black_player: prop("PB", "Black"),
            white_player: prop("PW", "White"),
            black_rank: prop("BR", ""),
            white_rank: prop("WR", ""),
            result: prop("RE", "?"),
            komi: parse_komi(root.property("KM")),
        }
    }

    // =========================================================================
    // Moves
    // =========================================================================

    /// Play at `point` for the side to move.
    ///
    /// An existing child with the same move is reused without re-checking.
    /// An illegal move leaves the session untouched.
    pub fn play(&mut self, point: Point) -> Result<NodeId, MoveError> {
        self.play_move(Move::play(self.to_move(), point))
    }

    pub fn pass(&mut self) -> NodeId {
        let mv = Move::pass(self.to_move());
        let id = self.tree.insert_move(mv);
        self.refresh();
        id
    }

    fn play_move(&mut self, mv: Move) -> Result<NodeId, MoveError> {
        let known = self
            .tree
            .current_node()
            .children()
            .iter()
            .any(|&c| self.tree.node(c).and_then(|n| n.mv()) == Some(mv));
        if !known {
            apply_move(&self.position.state, mv)?;
        }
        let id = self.tree.insert_move(mv);
        self.refresh();
        Ok(id)
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn first(&mut self) -> NodeId {
        self.tree.first();
        self.refresh()
    }

    pub fn prev(&mut self) -> NodeId {
        self.tree.prev();
        self.refresh()
    }

    pub fn next(&mut self, branch: usize) -> NodeId {
        self.tree.next(branch);
        self.refresh()
    }

    pub fn last(&mut self) -> NodeId {
        self.tree.last();
        self.refresh()
    }

    pub fn jump_to_depth(&mut self, depth: usize) -> NodeId {
        self.tree.jump_to_depth(depth);
        self.refresh()
    }

    pub fn go_to(&mut self, id: NodeId) -> bool {
        let moved = self.tree.go_to(id);
        if moved {
            self.refresh();
        }
        moved
    }

    fn refresh(&mut self) -> NodeId {
        self.position = derive_current(&self.tree);
        self.tree.current()
    }

    // =========================================================================
    // Annotations
    // =========================================================================

    pub fn set_comment(&mut self, node: NodeId, comment: impl Into<String>) -> bool {
        self.tree.set_comment(node, comment)
    }

    pub fn append_comment(&mut self, node: NodeId, text: &str) -> bool {
        self.tree.append_comment(node, text)
    }

    pub fn annotate(&mut self, node: NodeId, annotation: Annotation) -> bool {
        self.tree.push_annotation(node, annotation)
    }

    /// Record an analysis result on the node it was requested for.
    ///
    /// Returns false when `node` is not part of this session's tree, e.g.
    /// because a different record was loaded while the request was pending.
    pub fn attach_analysis(&mut self, node: NodeId, result: &AnalysisResult) -> bool {
        let content = match serde_json::to_string(result) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("could not encode analysis result: {e}");
                return false;
            }
        };
        self.tree
            .push_annotation(node, Annotation::new(AnnotationRole::Engine, content))
    }
}
