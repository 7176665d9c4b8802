//! Rebuild the board for any node by replaying its path from the root.
//!
//! Trees can come from arbitrary record files, so an illegal move on the
//! path does not abort the replay: that stone is skipped and the rest of
//! the path is still applied.

use crate::board::Color;
use crate::position::{BoardState, apply_move};
use crate::tree::{GameTree, NodeId};

/// Board state of a node together with the side to move there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedPosition {
    pub state: BoardState,
    pub to_move: Color,
}

impl Default for DerivedPosition {
    fn default() -> Self {
        Self {
            state: BoardState::new(),
            to_move: Color::Black,
        }
    }
}

/// Replay the root-to-`id` path from an empty board.
///
/// Returns `None` if `id` does not belong to `tree`.
pub fn derive(tree: &GameTree, id: NodeId) -> Option<DerivedPosition> {
    let node = tree.node(id)?;
    let mut state = BoardState::new();

    for pid in tree.path_to(id) {
        let Some(mv) = tree.node(pid).and_then(|n| n.mv()) else {
            continue;
        };
        match apply_move(&state, mv) {
            Ok(next) => state = next,
            Err(e) => log::warn!("skipping move at node {} during replay: {e}", pid.index()),
        }
    }

    Some(DerivedPosition {
        state,
        to_move: side_to_move(tree, id, node.mv().map(|m| m.color)),
    })
}

/// The opponent of whoever moved into `id`; for a moveless node, Black
/// unless the parent's move was Black.
fn side_to_move(tree: &GameTree, id: NodeId, mover: Option<Color>) -> Color {
    if let Some(color) = mover {
        return color.opponent();
    }
    let parent_move = tree
        .node(id)
        .and_then(|n| n.parent())
        .and_then(|p| tree.node(p))
        .and_then(|p| p.mv());
    match parent_move {
        Some(mv) if mv.color == Color::Black => Color::White,
        _ => Color::Black,
    }
}

/// Derive the tree's current node.
pub fn derive_current(tree: &GameTree) -> DerivedPosition {
    derive(tree, tree.current()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Move;

    #[test]
    fn test_root_is_empty_black_to_move() {
        let tree = GameTree::new();
        let pos = derive_current(&tree);
        assert_eq!(pos, DerivedPosition::default());
    }

    #[test]
    fn test_replay_applies_captures() {
        let mut tree = GameTree::new();
        tree.insert_move(Move::new(Color::White, 0, 0));
        tree.insert_move(Move::new(Color::Black, 1, 0));
        tree.insert_move(Move::pass(Color::White));
        let last = tree.insert_move(Move::new(Color::Black, 0, 1));

        let pos = derive(&tree, last).unwrap();
        assert_eq!(pos.state.grid.get((0, 0)), None);
        assert_eq!(pos.state.captures.black, 1);
        assert_eq!(pos.to_move, Color::White);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let mut tree = GameTree::new();
        for (i, p) in [(3, 3), (15, 15), (3, 15), (15, 3)].into_iter().enumerate() {
            let color = if i % 2 == 0 { Color::Black } else { Color::White };
            tree.insert_move(Move::play(color, p));
        }
        let id = tree.current();
        assert_eq!(derive(&tree, id), derive(&tree, id));
    }

    #[test]
    fn test_illegal_move_skipped() {
        let mut tree = GameTree::new();
        tree.insert_move(Move::new(Color::Black, 3, 3));
        tree.insert_move(Move::new(Color::White, 3, 3));
        let last = tree.insert_move(Move::new(Color::Black, 4, 4));

        let pos = derive(&tree, last).unwrap();
        assert_eq!(pos.state.grid.get((3, 3)), Some(Color::Black));
        assert_eq!(pos.state.grid.get((4, 4)), Some(Color::Black));
        assert_eq!(pos.state.last_move, Some((4, 4)));
    }

    #[test]
    fn test_side_to_move_after_pass() {
        let mut tree = GameTree::new();
        tree.insert_move(Move::new(Color::Black, 3, 3));
        let pass = tree.insert_move(Move::pass(Color::White));
        assert_eq!(derive(&tree, pass).unwrap().to_move, Color::Black);
    }

    #[test]
    fn test_foreign_id() {
        let mut other = GameTree::new();
        let id = other.insert_move(Move::new(Color::Black, 3, 3));
        assert!(derive(&GameTree::new(), id).is_none());
    }
}
