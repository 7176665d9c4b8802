//! Move legality and board-state transitions.
//!
//! [`apply_move`] is a pure function: it takes a [`BoardState`] by reference
//! and returns a fresh state, so earlier states stay valid for history.
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. the target must be empty ([`MoveError::Occupied`]),
//! 2. the target must not be the ko point ([`MoveError::Ko`]),
//! 3. adjacent enemy groups left without liberties are removed,
//! 4. if nothing was captured, the new stone's own group needs a liberty
//!    ([`MoveError::Suicide`]).
//!
//! This module also holds the GTP and SGF coordinate codecs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::{Color, Grid, Point};
use crate::constants::{GTP_COLUMNS, GTP_PASS, N, SGF_BASE};

/// Why a move was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("illegal move: point is occupied")]
    Occupied,
    #[error("illegal move: retakes ko")]
    Ko,
    #[error("illegal move: suicide")]
    Suicide,
}

/// Stones captured by each color over the course of a game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Captures {
    pub black: u32,
    pub white: u32,
}

impl Captures {
    pub fn by(&self, color: Color) -> u32 {
        match color {
            Color::Black => self.black,
            Color::White => self.white,
        }
    }

    fn credit(&mut self, color: Color, stones: u32) {
        match color {
            Color::Black => self.black += stones,
            Color::White => self.white += stones,
        }
    }
}

/// A stone placement or a pass (`point == None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub color: Color,
    pub point: Option<Point>,
}

impl Move {
    /// Build a move from raw coordinates. Off-board coordinates mean pass.
    pub fn new(color: Color, x: usize, y: usize) -> Self {
        let point = Some((x, y)).filter(|&p| Grid::in_bounds(p));
        Self { color, point }
    }

    pub fn play(color: Color, point: Point) -> Self {
        Self::new(color, point.0, point.1)
    }

    pub fn pass(color: Color) -> Self {
        Self { color, point: None }
    }

    pub fn is_pass(&self) -> bool {
        self.point.is_none()
    }
}

/// Everything needed to judge the next move.
///
/// `ko_point`, when set, is empty in `grid` and marks the single stone that
/// was just captured by a lone recapturing stone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BoardState {
    pub grid: Grid,
    pub captures: Captures,
    pub last_move: Option<Point>,
    pub ko_point: Option<Point>,
}

impl BoardState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Apply `mv` to `state`, returning the resulting state or why it is illegal.
///
/// Passes always succeed: they clear the ko point and the last-move marker
/// and leave the grid and captures untouched.
pub fn apply_move(state: &BoardState, mv: Move) -> Result<BoardState, MoveError> {
    let Some(pt) = mv.point.filter(|&p| Grid::in_bounds(p)) else {
        return Ok(pass_move(state));
    };

    if state.grid.get(pt).is_some() {
        return Err(MoveError::Occupied);
    }
    if state.ko_point == Some(pt) {
        return Err(MoveError::Ko);
    }

    let mut grid = state.grid.clone();
    grid.set(pt, Some(mv.color));

    let opponent = mv.color.opponent();
    let mut captured: Vec<Point> = Vec::new();
    for n in Grid::neighbors(pt) {
        if grid.get(n) != Some(opponent) || captured.contains(&n) {
            continue;
        }
        if let Some(group) = grid.group_at(n) {
            if !group.has_liberties() {
                captured.extend(group.stones);
            }
        }
    }
    for &p in &captured {
        grid.set(p, None);
    }

    let own = grid.group_at(pt);
    if captured.is_empty() && !own.as_ref().is_some_and(|g| g.has_liberties()) {
        return Err(MoveError::Suicide);
    }

    let mut captures = state.captures;
    captures.credit(mv.color, captured.len() as u32);

    // Only the lone-stone-takes-lone-stone shape forbids the immediate retake.
    let ko_point = match captured.as_slice() {
        [single] if own.as_ref().is_some_and(|g| g.stones.len() == 1 && g.has_liberties()) => {
            Some(*single)
        }
        _ => None,
    };

    Ok(BoardState {
        grid,
        captures,
        last_move: Some(pt),
        ko_point,
    })
}

/// State after a pass: the ko restriction lapses and there is no last move.
pub fn pass_move(state: &BoardState) -> BoardState {
    BoardState {
        grid: state.grid.clone(),
        captures: state.captures,
        last_move: None,
        ko_point: None,
    }
}

/// Check legality of `mv` without keeping the resulting state.
pub fn is_legal(state: &BoardState, mv: Move) -> bool {
    apply_move(state, mv).is_ok()
}

// =============================================================================
// Coordinates
// =============================================================================

/// Parse a GTP vertex (e.g. `"D4"`, `"pass"`).
///
/// Returns `Some(None)` for a pass, `Some(Some(point))` for a vertex on the
/// board, and `None` if the text is not a vertex.
pub fn parse_gtp(s: &str) -> Option<Option<Point>> {
    let s = s.trim();
    if s.eq_ignore_ascii_case(GTP_PASS) {
        return Some(None);
    }
    let mut chars = s.chars();
    let col_char = chars.next()?.to_ascii_uppercase();
    let x = GTP_COLUMNS.iter().position(|&c| c as char == col_char)?;
    let row: usize = chars.as_str().parse().ok()?;
    if row == 0 || row > N {
        return None;
    }
    Some(Some((x, N - row)))
}

/// Format a point as a GTP vertex. `None` and off-board points are `"pass"`.
pub fn to_gtp(point: Option<Point>) -> String {
    match point.filter(|&p| Grid::in_bounds(p)) {
        Some((x, y)) => format!("{}{}", GTP_COLUMNS[x] as char, N - y),
        None => GTP_PASS.to_string(),
    }
}

/// Decode a two-letter SGF point (`"pd"`). Empty or off-board values are a pass.
///
/// Returns `None` when the value is not a point at all.
pub fn parse_sgf_point(value: &str) -> Option<Option<Point>> {
    let bytes = value.as_bytes();
    match bytes {
        [] => Some(None),
        [cx, cy] if cx.is_ascii_lowercase() && cy.is_ascii_lowercase() => {
            let p = ((cx - SGF_BASE) as usize, (cy - SGF_BASE) as usize);
            Some(Some(p).filter(|&p| Grid::in_bounds(p)))
        }
        _ => None,
    }
}

/// Encode a point as two SGF letters. A pass encodes as the empty string.
pub fn to_sgf_point(point: Option<Point>) -> String {
    match point.filter(|&p| Grid::in_bounds(p)) {
        Some((x, y)) => [SGF_BASE + x as u8, SGF_BASE + y as u8]
            .iter()
            .map(|&b| b as char)
            .collect(),
        None => String::new(),
    }
}
