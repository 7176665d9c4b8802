//! Integration tests for goban-rust
//!
//! These drive the public API the way a review front-end would: build or
//! load a record, walk it, play moves into it, and ask for analysis.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::{Value, json};

use goban_rust::analysis::{
    AnalysisClient, AnalysisConfig, AnalysisRequest, AnalysisTransport, TransportError,
};
use goban_rust::board::Color;
use goban_rust::position::{BoardState, Move, MoveError, apply_move, parse_gtp};
use goban_rust::replay::derive;
use goban_rust::session::GameSession;
use goban_rust::sgf;
use goban_rust::tree::{AnnotationRole, GameTree};

// =============================================================================
// Helper functions
// =============================================================================

/// Play alternating GTP vertices from an empty board, Black first.
fn setup_position(moves: &[&str]) -> Result<BoardState, MoveError> {
    let mut state = BoardState::new();
    let mut color = Color::Black;
    for vertex in moves {
        let point = parse_gtp(vertex).unwrap_or_else(|| panic!("bad vertex {vertex}"));
        let mv = Move { color, point };
        state = apply_move(&state, mv)?;
        color = color.opponent();
    }
    Ok(state)
}

fn fast_config() -> AnalysisConfig {
    AnalysisConfig::default()
        .with_endpoint("http://oracle.test/analyze")
        .with_attempt_timeout(Duration::from_millis(200))
        .with_backoff(Duration::from_millis(1), Duration::from_millis(1))
}

/// Transport that answers from a script and records every request.
struct FakeOracle {
    answers: Mutex<Vec<Answer>>,
    seen: Mutex<Vec<AnalysisRequest>>,
    calls: AtomicU32,
}

#[derive(Clone)]
enum Answer {
    Echo(Value),
    WrongId,
    Down,
}

impl FakeOracle {
    fn new(answers: Vec<Answer>) -> Self {
        Self {
            answers: Mutex::new(answers),
            seen: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }
}

impl AnalysisTransport for FakeOracle {
    async fn post(
        &self,
        _endpoint: &str,
        request: &AnalysisRequest,
    ) -> Result<Value, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());
        let answer = {
            let mut answers = self.answers.lock().unwrap();
            if answers.is_empty() {
                Answer::Down
            } else {
                answers.remove(0)
            }
        };
        match answer {
            Answer::Echo(mut body) => {
                body["request_id"] = json!(request.config.request_id);
                Ok(body)
            }
            Answer::WrongId => Ok(json!({"request_id": "someone-else", "bot_move": "A1"})),
            Answer::Down => Err(TransportError::Unavailable("oracle down".into())),
        }
    }
}

// =============================================================================
// Board engine
// =============================================================================

#[test]
fn test_occupied_point_rejected() {
    let state = setup_position(&["D16", "Q4"]).unwrap();
    let again = Move::play(Color::Black, (3, 3));
    assert_eq!(apply_move(&state, again), Err(MoveError::Occupied));
}

#[test]
fn test_ko_fight() {
    // White's D15 stone ends up surrounded; Black captures at E15 and
    // White may not immediately retake at D15.
    let state = setup_position(&[
        "D14", "E14", "C15", "F15", "D16", "E16", "R4", "D15", "E15",
    ])
    .unwrap();
    assert_eq!(state.captures.black, 1);
    assert_eq!(state.ko_point, Some((3, 4)));

    let retake = Move::play(Color::White, (3, 4));
    assert_eq!(apply_move(&state, retake), Err(MoveError::Ko));

    // After a tenuki exchange the ko is open again.
    let state = apply_move(&state, Move::play(Color::White, (15, 15))).unwrap();
    let state = apply_move(&state, Move::play(Color::Black, (15, 3))).unwrap();
    assert_eq!(state.ko_point, None);
    assert!(apply_move(&state, retake).is_ok());
}

#[test]
fn test_suicide_rejected() {
    let state = setup_position(&["B19", "pass", "A18"]).unwrap();
    let suicide = Move::play(Color::White, (0, 0));
    assert_eq!(apply_move(&state, suicide), Err(MoveError::Suicide));
}

// =============================================================================
// Tree and replay
// =============================================================================

#[test]
fn test_insert_move_reuses_child() {
    let mut tree = GameTree::new();
    let a = tree.insert_move(Move::play(Color::Black, (3, 3)));
    tree.first();
    let b = tree.insert_move(Move::play(Color::Black, (3, 3)));
    assert_eq!(a, b);
    assert_eq!(tree.len(), 2);
    assert_eq!(tree.root_node().children().len(), 1);

    tree.first();
    let c = tree.insert_move(Move::play(Color::Black, (15, 15)));
    assert_ne!(a, c);
    assert_eq!(tree.root_node().children().len(), 2);
}

#[test]
fn test_derive_skips_illegal_and_is_deterministic() {
    let mut tree = GameTree::new();
    tree.insert_move(Move::play(Color::Black, (3, 3)));
    tree.insert_move(Move::play(Color::White, (3, 3)));
    let leaf = tree.insert_move(Move::play(Color::White, (15, 15)));

    let first = derive(&tree, leaf).unwrap();
    let second = derive(&tree, leaf).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.state.grid.stones().count(), 2);
    assert_eq!(first.to_move, Color::Black);
}

#[test]
fn test_navigation_clamps() {
    let mut session = GameSession::from_sgf("(;SZ[19];B[pd];W[dp];B[pp])");
    assert_eq!(session.current_depth(), 0);
    session.prev();
    assert_eq!(session.current_depth(), 0);
    session.last();
    assert_eq!(session.current_depth(), 3);
    session.next(0);
    assert_eq!(session.current_depth(), 3);
    session.jump_to_depth(99);
    assert_eq!(session.current_depth(), 3);
    session.jump_to_depth(2);
    assert_eq!(session.gtp_history(), vec!["Q16", "D4"]);
}

// =============================================================================
// SGF
// =============================================================================

#[test]
fn test_sgf_round_trip_main_line() {
    let text = "(;GM[1]FF[4]SZ[19]PB[Honinbo]PW[Jowa]KM[0];B[pd]C[opening];W[dp](;B[pp])(;B[dd]))";
    let tree = sgf::parse(text);
    assert_eq!(tree.main_line().len(), 4);

    let out = sgf::generate(&tree);
    assert!(out.starts_with("(;GM[1]FF[4]SZ[19]"));
    assert!(out.contains("PB[Honinbo]"));
    assert!(out.contains(";B[pd]C[opening]"));
    assert!(out.contains(";B[pp]"));
    assert!(!out.contains("B[dd]"));

    let reparsed = sgf::parse(&out);
    let moves = |t: &GameTree| -> Vec<Option<Move>> {
        t.main_line().iter().map(|&id| t.node(id).and_then(|n| n.mv())).collect()
    };
    assert_eq!(moves(&tree), moves(&reparsed));
}

#[test]
fn test_sgf_comment_escapes_survive() {
    let mut session = GameSession::from_sgf("(;SZ[19];B[pd])");
    session.last();
    let node = session.current();
    session.set_comment(node, "a ] bracket and \\ slash");
    let reloaded = GameSession::from_sgf(&session.to_sgf());
    let last = *reloaded.tree().main_line().last().unwrap();
    assert_eq!(
        reloaded.tree().node(last).unwrap().comment(),
        Some("a ] bracket and \\ slash")
    );
}

// =============================================================================
// Analysis
// =============================================================================

#[tokio::test]
async fn test_analysis_sends_history_and_komi() {
    let oracle = FakeOracle::new(vec![Answer::Echo(json!({
        "bot_move": "Q4",
        "diagnostics": {
            "winprob": 0.55,
            "score": 1.5,
            "best_ten": [{"move": "Q4", "winprob": 0.55}]
        }
    }))]);
    let client = AnalysisClient::with_transport(oracle, fast_config());

    let mut session = GameSession::from_sgf("(;KM[7.5];B[pd];W[dp])");
    session.last();
    let result = client
        .request_analysis(&session.gtp_history(), session.game_info().komi)
        .await
        .unwrap();

    assert_eq!(result.best_move.as_deref(), Some("Q4"));
    assert_eq!(result.win_probability, Some(0.55));
    let seen = client.transport().seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].moves, vec!["Q16", "D4"]);
    assert_eq!(seen[0].config.komi, 7.5);
    assert_eq!(seen[0].board_size, 19);
    assert_eq!(seen[0].config.request_id, result.request_id);
}

#[tokio::test]
async fn test_analysis_retries_then_succeeds() {
    let oracle = FakeOracle::new(vec![
        Answer::Down,
        Answer::WrongId,
        Answer::Echo(json!({"bot_move": "D4"})),
    ]);
    let client = AnalysisClient::with_transport(oracle, fast_config());
    let result = client.request_analysis(&[], 6.5).await;
    assert_matches!(result, Some(r) if r.best_move.as_deref() == Some("D4"));
    assert_eq!(client.transport().calls.load(Ordering::SeqCst), 3);

    let ids: Vec<String> = client
        .transport()
        .seen
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.config.request_id.clone())
        .collect();
    assert_ne!(ids[0], ids[1]);
    assert_ne!(ids[1], ids[2]);
}

#[tokio::test]
async fn test_analysis_gives_up_after_three_attempts() {
    let oracle = FakeOracle::new(vec![Answer::Down, Answer::WrongId, Answer::Down, Answer::Down]);
    let client = AnalysisClient::with_transport(oracle, fast_config());
    assert!(client.request_analysis(&[], 6.5).await.is_none());
    assert_eq!(client.transport().calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_background_analysis_lands_on_requesting_node() {
    let oracle = FakeOracle::new(vec![Answer::Echo(json!({"bot_move": "C3"}))]);
    let client = AnalysisClient::with_transport(oracle, fast_config());

    let mut session = GameSession::new();
    let asked = session.play((3, 3)).unwrap();
    let pending = client.spawn(asked, session.gtp_history(), 6.5);

    // The user keeps playing while the request is in flight.
    session.play((15, 15)).unwrap();

    let (node, result) = pending.join().await;
    assert_eq!(node, asked);
    assert!(session.attach_analysis(node, &result.unwrap()));
    let annotations = session.tree().node(asked).unwrap().annotations();
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0].role, AnnotationRole::Engine);
    assert!(session.tree().current_node().annotations().is_empty());
}
