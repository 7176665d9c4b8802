//! Constants for board geometry, coordinate alphabets, and analysis defaults.
//!
//! The board is a fixed 19x19 grid addressed by zero-based `(x, y)` pairs,
//! `x` growing to the right and `y` growing downwards (row 0 is the top line).

use std::time::Duration;

// =============================================================================
// Board Geometry
// =============================================================================

/// Board size (NxN).
pub const N: usize = 19;

/// Number of intersections on the board.
pub const BOARD_POINTS: usize = N * N;

// =============================================================================
// Coordinate Alphabets
// =============================================================================

/// GTP column letters. `I` is skipped to avoid confusion with `J`.
pub const GTP_COLUMNS: &[u8; N] = b"ABCDEFGHJKLMNOPQRST";

/// Vertex string used by GTP for a pass.
pub const GTP_PASS: &str = "pass";

/// First letter of the SGF coordinate alphabet (`a` = 0).
pub const SGF_BASE: u8 = b'a';

/// Fixed header written at the start of every generated record.
pub const SGF_HEADER: &str = "(;GM[1]FF[4]SZ[19]";

// =============================================================================
// Game Defaults
// =============================================================================

/// Komi used when a record has none, or an unparseable one.
pub const DEFAULT_KOMI: f64 = 6.5;

// =============================================================================
// Analysis Oracle
// =============================================================================

/// Remote analysis endpoint.
pub const ANALYSIS_ENDPOINT: &str = "https://katago-proxy.vercel.app/api/katago";

/// Maximum number of attempts for one logical analysis request.
pub const ANALYSIS_MAX_ATTEMPTS: u32 = 3;

/// Time allowed for a single attempt before it is aborted.
pub const ANALYSIS_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(20);

/// Delay after a transport failure, timeout, or non-success status.
pub const ANALYSIS_FAILURE_BACKOFF: Duration = Duration::from_millis(1000);

/// Delay after a response whose correlation id did not match.
pub const ANALYSIS_MISMATCH_BACKOFF: Duration = Duration::from_millis(500);
