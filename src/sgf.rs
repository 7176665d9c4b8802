//! Reading and writing game records in SGF.
//!
//! Parsing is best effort. Nodes that carry no recognisable `KEY[value]`
//! property are dropped, unreadable move values are ignored, and nothing
//! ever fails. Only the main line survives: at every fork the first
//! variation is followed and its siblings are skipped. Writing likewise
//! emits only the first-child chain of the tree.

use log::debug;

use crate::board::Color;
use crate::constants::SGF_HEADER;
use crate::position::{Move, parse_sgf_point, to_sgf_point};
use crate::tree::{GameTree, NodeId};

/// Root keys that the fixed header already covers or that are written per node.
const RESERVED_ROOT_KEYS: &[&str] = &["GM", "FF", "SZ", "B", "W", "C"];

/// Keys that carry a node's move.
const MOVE_KEYS: &[&str] = &["B", "W"];

type Properties = Vec<(String, String)>;

/// Build a tree from record text. The returned tree's current node is its root.
pub fn parse(text: &str) -> GameTree {
    let mut tree = GameTree::new();
    let mut parent: Option<NodeId> = None;

    for props in lex(text) {
        let mv = props.iter().find_map(|(k, v)| decode_move(k, v));
        let id = match parent {
            Some(p) => tree.add_child(p, mv),
            // The root never holds a move; a record that starts with one
            // gets an empty root above it.
            None if mv.is_some() => tree.add_child(tree.root(), mv),
            None => Some(tree.root()),
        };
        let Some(id) = id else {
            continue;
        };
        for (key, value) in &props {
            if key == "C" {
                tree.set_comment(id, value.as_str());
            } else {
                tree.set_property(id, key, value);
            }
        }
        parent = Some(id);
    }

    tree
}

/// Serialize the main line of `tree`.
pub fn generate(tree: &GameTree) -> String {
    let mut out = String::from(SGF_HEADER);

    let root = tree.root_node();
    for (key, value) in root.properties() {
        if !RESERVED_ROOT_KEYS.contains(&key.as_str()) {
            out.push_str(&format!("{key}[{}]", escape(value)));
        }
    }
    if let Some(comment) = root.comment() {
        out.push_str(&format!("C[{}]", escape(comment)));
    }

    for id in tree.main_line().into_iter().skip(1) {
        let Some(node) = tree.node(id) else {
            continue;
        };
        let extra: Vec<_> = node
            .properties()
            .iter()
            .filter(|(key, _)| node.mv().is_none() || !MOVE_KEYS.contains(&key.as_str()))
            .collect();
        if node.mv().is_none() && node.comment().is_none() && extra.is_empty() {
            debug!("not writing empty node {}", id.index());
            continue;
        }
        out.push(';');
        if let Some(mv) = node.mv() {
            out.push_str(&format!("{}[{}]", mv.color.sgf_key(), to_sgf_point(mv.point)));
        }
        // Unreadable moves and other node properties are kept verbatim, so
        // the node survives a reload.
        for (key, value) in extra {
            out.push_str(&format!("{key}[{}]", escape(value)));
        }
        if let Some(comment) = node.comment() {
            out.push_str(&format!("C[{}]", escape(comment)));
        }
    }

    out.push(')');
    out
}

fn decode_move(key: &str, value: &str) -> Option<Move> {
    let color = match key {
        "B" => Color::Black,
        "W" => Color::White,
        _ => return None,
    };
    match parse_sgf_point(value) {
        Some(point) => Some(Move { color, point }),
        None => {
            debug!("ignoring unreadable move {key}[{value}]");
            None
        }
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == ']' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn flush(node: &mut Option<Properties>, nodes: &mut Vec<Properties>) {
    if let Some(props) = node.take() {
        if props.is_empty() {
            debug!("skipping node without properties");
        } else {
            nodes.push(props);
        }
    }
}

/// Split record text into the main-line nodes' property lists.
///
/// Brackets are honoured, so `;`, `(` and `)` inside values are plain text.
/// Only the first value of a multi-valued property is kept.
fn lex(text: &str) -> Vec<Properties> {
    let mut nodes: Vec<Properties> = Vec::new();
    let mut node: Option<Properties> = None;

    // taken[d]: a child variation at depth d has already been followed.
    let mut taken = vec![false];
    let mut depth = 0usize;
    let mut skip_from: Option<usize> = None;

    let mut key = String::new();
    let mut value_key: Option<String> = None;
    let mut value = String::new();
    let mut in_value = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_value {
            if escaped {
                escaped = false;
                // Escaped line break is a soft break and disappears.
                if c != '\n' && c != '\r' {
                    value.push(c);
                }
            } else if c == '\\' {
                escaped = true;
            } else if c == ']' {
                in_value = false;
                if let (Some(props), Some(k)) = (node.as_mut(), value_key.take()) {
                    props.push((k, std::mem::take(&mut value)));
                }
                value.clear();
            } else {
                value.push(c);
            }
            continue;
        }

        match c {
            '[' => {
                in_value = true;
                // A bare `[..]` continues the previous property and is dropped.
                value_key = (!key.is_empty()).then(|| std::mem::take(&mut key));
            }
            '(' => {
                flush(&mut node, &mut nodes);
                key.clear();
                if skip_from.is_none() {
                    if taken[depth] {
                        skip_from = Some(depth);
                    } else {
                        taken[depth] = true;
                    }
                }
                depth += 1;
                taken.resize(depth + 1, false);
                taken[depth] = false;
            }
            ')' => {
                flush(&mut node, &mut nodes);
                key.clear();
                depth = depth.saturating_sub(1);
                if skip_from == Some(depth) {
                    skip_from = None;
                }
            }
            ';' => {
                flush(&mut node, &mut nodes);
                key.clear();
                if skip_from.is_none() {
                    node = Some(Vec::new());
                }
            }
            'A'..='Z' => key.push(c),
            c if c.is_whitespace() => {}
            _ => key.clear(),
        }
    }
    flush(&mut node, &mut nodes);

    nodes
}
