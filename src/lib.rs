//! A perfect solver for 7x6 Connect 4
//!
//! Given any legal, undecided position this crate computes the exact
//! minimax score under optimal play from both sides, or (more cheaply)
//! just who wins.
//!
//! # Basic Usage
//!
//! ```
//! use connect4_solver::{bitboard::BitBoard, solver::Solver};
//!
//! # fn main() -> anyhow::Result<()> {
//! let board = BitBoard::from_moves("112233")?;
//! let mut solver = Solver::new();
//!
//! // the first player completes a row with their fourth tile
//! assert_eq!(solver.solve(&board, false), 18);
//! # Ok(())
//! # }
//! ```

use static_assertions::*;
pub use anyhow;

pub mod bitboard;

pub mod opening_book;

pub mod solver;

pub mod transposition_table;

mod test;

/// Board width in columns
pub const WIDTH: usize = 7;

/// Board height in rows
pub const HEIGHT: usize = 6;

// seven columns of seven bits each (one guard bit per column) must fit a u64
const_assert!(WIDTH * (HEIGHT + 1) < 64);
