//! Goban-Rust: game records, move legality and engine analysis for 19x19 Go.
//!
//! The crate models a game under review: a board engine that judges moves,
//! a branching history of positions, an SGF reader/writer, and a resilient
//! client for an external analysis oracle.
//!
//! ## Modules
//!
//! - [`constants`] - Board dimensions, coordinate alphabets, analysis defaults
//! - [`board`] - Colors, points, the grid and group flood-fill
//! - [`position`] - Board state, move legality (captures, suicide, ko), coordinates
//! - [`tree`] - Append-only game tree with navigation
//! - [`replay`] - Rebuild the board for any node of a tree
//! - [`sgf`] - Best-effort SGF parsing and main-line export
//! - [`analysis`] - Analysis oracle client with retries and correlation ids
//! - [`session`] - A game under review, tying the pieces together
//! - [`logging`] - Logger setup for the binary
//!
//! ## Example
//!
//! ```
//! use goban_rust::session::GameSession;
//!
//! let mut session = GameSession::from_sgf("(;GM[1]FF[4]SZ[19]PB[Black];B[pd];W[dp])");
//! session.last();
//! assert_eq!(session.gtp_history(), vec!["Q16", "D4"]);
//!
//! // Branch off from the first move.
//! session.jump_to_depth(1);
//! session.play((2, 16)).unwrap();
//! assert_eq!(session.tree().len(), 4);
//! ```

pub mod analysis;
pub mod board;
pub mod constants;
pub mod logging;
pub mod position;
pub mod replay;
pub mod session;
pub mod sgf;
pub mod tree;
