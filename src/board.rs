//! Grid storage and group flood-fill.
//!
//! A [`Grid`] is a plain 19x19 matrix of optional stones. It knows nothing
//! about turns, captures or ko; those live in [`crate::position`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{GTP_COLUMNS, N};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    Black,
    White,
}

impl Color {
    pub fn opponent(self) -> Color {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    /// Property key used for this color's moves in a game record.
    pub fn sgf_key(self) -> &'static str {
        match self {
            Color::Black => "B",
            Color::White => "W",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Black => f.write_str("Black"),
            Color::White => f.write_str("White"),
        }
    }
}

/// Zero-based `(x, y)` intersection, `y = 0` being the top line.
pub type Point = (usize, usize);

/// A maximal 4-connected set of same-colored stones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub color: Color,
    pub stones: Vec<Point>,
    /// Number of distinct empty points adjacent to the group.
    pub liberties: usize,
}

impl Group {
    pub fn has_liberties(&self) -> bool {
        self.liberties > 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Grid {
    cells: [[Option<Color>; N]; N],
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

impl Grid {
    pub fn new() -> Self {
        Self {
            cells: [[None; N]; N],
        }
    }

    pub fn in_bounds((x, y): Point) -> bool {
        x < N && y < N
    }

    pub fn get(&self, (x, y): Point) -> Option<Color> {
        if !Self::in_bounds((x, y)) {
            return None;
        }
        self.cells[y][x]
    }

    pub fn is_empty_at(&self, p: Point) -> bool {
        Self::in_bounds(p) && self.get(p).is_none()
    }

    pub(crate) fn set(&mut self, (x, y): Point, stone: Option<Color>) {
        self.cells[y][x] = stone;
    }

    /// Iterate over every occupied intersection.
    pub fn stones(&self) -> impl Iterator<Item = (Point, Color)> + '_ {
        self.cells.iter().enumerate().flat_map(|(y, row)| {
            row.iter()
                .enumerate()
                .filter_map(move |(x, c)| c.map(|c| ((x, y), c)))
        })
    }

    pub fn count(&self, color: Color) -> usize {
        self.stones().filter(|&(_, c)| c == color).count()
    }

    pub fn neighbors((x, y): Point) -> impl Iterator<Item = Point> {
        let mut v = Vec::with_capacity(4);
        if x > 0 {
            v.push((x - 1, y));
        }
        if x + 1 < N {
            v.push((x + 1, y));
        }
        if y > 0 {
            v.push((x, y - 1));
        }
        if y + 1 < N {
            v.push((x, y + 1));
        }
        v.into_iter()
    }

    /// Flood-fill the group containing `start`.
    ///
    /// Returns `None` when `start` is empty or off the board.
    pub fn group_at(&self, start: Point) -> Option<Group> {
        let color = self.get(start)?;
        let mut stack = vec![start];
        let mut visited = [[false; N]; N];
        let mut liberty_seen = [[false; N]; N];
        let mut stones = Vec::new();
        let mut liberties = 0;

        while let Some((cx, cy)) = stack.pop() {
            if visited[cy][cx] {
                continue;
            }
            visited[cy][cx] = true;
            stones.push((cx, cy));
            for (nx, ny) in Self::neighbors((cx, cy)) {
                match self.cells[ny][nx] {
                    None => {
                        if !liberty_seen[ny][nx] {
                            liberty_seen[ny][nx] = true;
                            liberties += 1;
                        }
                    }
                    Some(c) if c == color && !visited[ny][nx] => stack.push((nx, ny)),
                    _ => {}
                }
            }
        }

        Some(Group {
            color,
            stones,
            liberties,
        })
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns = || GTP_COLUMNS.iter().map(|&c| c as char);
        write!(f, "   ")?;
        for c in columns() {
            write!(f, "{c} ")?;
        }
        writeln!(f)?;
        for y in 0..N {
            let row = N - y;
            write!(f, "{row:>2} ")?;
            for x in 0..N {
                let ch = match self.cells[y][x] {
                    Some(Color::Black) => 'X',
                    Some(Color::White) => 'O',
                    None => '.',
                };
                write!(f, "{ch} ")?;
            }
            writeln!(f, "{row}")?;
        }
        write!(f, "   ")?;
        for c in columns() {
            write!(f, "{c} ")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_grid() {
        let grid = Grid::new();
        assert_eq!(grid.stones().count(), 0);
        assert_eq!(grid.get((9, 9)), None);
        assert!(grid.is_empty_at((0, 0)));
        assert!(!grid.is_empty_at((N, 0)), "off-board is never empty");
    }

    #[test]
    fn test_neighbors_at_edges() {
        assert_eq!(Grid::neighbors((0, 0)).count(), 2);
        assert_eq!(Grid::neighbors((0, 5)).count(), 3);
        assert_eq!(Grid::neighbors((N - 1, N - 1)).count(), 2);
        assert_eq!(Grid::neighbors((9, 9)).count(), 4);
    }

    #[test]
    fn test_group_liberties_shared_once() {
        let mut grid = Grid::new();
        grid.set((3, 3), Some(Color::Black));
        grid.set((4, 3), Some(Color::Black));
        let group = grid.group_at((3, 3)).unwrap();
        assert_eq!(group.stones.len(), 2);
        assert_eq!(group.liberties, 6);
    }

    #[test]
    fn test_group_without_liberties() {
        let mut grid = Grid::new();
        grid.set((0, 0), Some(Color::White));
        grid.set((1, 0), Some(Color::Black));
        grid.set((0, 1), Some(Color::Black));
        let group = grid.group_at((0, 0)).unwrap();
        assert_eq!(group.color, Color::White);
        assert!(!group.has_liberties());
    }

    #[test]
    fn test_group_at_empty_point() {
        assert!(Grid::new().group_at((4, 4)).is_none());
    }

    #[test]
    fn test_display_labels() {
        let mut grid = Grid::new();
        grid.set((0, 0), Some(Color::Black));
        grid.set((18, 18), Some(Color::White));
        let text = grid.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), N + 2);
        assert!(lines[0].contains("H J"), "column I is skipped");
        assert!(lines[1].starts_with("19 X"));
        assert!(lines[N].starts_with(" 1 ") && lines[N].contains("O 1"));
    }
}
