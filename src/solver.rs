//! Exact game tree search over Connect 4 positions

use log::{debug, info};

use crate::bitboard::BitBoard;
use crate::opening_book::OpeningBook;
use crate::transposition_table::TranspositionTable;
use crate::{HEIGHT, WIDTH};

use std::path::Path;

/// The lowest score any position can take: losing to the opponent's 4th tile
pub const MIN_SCORE: i32 = 3 - (WIDTH * HEIGHT) as i32 / 2;
/// The highest score any position can take: winning with our own 4th tile
pub const MAX_SCORE: i32 = ((WIDTH * HEIGHT + 1) / 2) as i32 - 3;

// score bounds are packed into one small nonzero table value: upper bounds
// occupy [1, MAX_SCORE - MIN_SCORE + 1], lower bounds everything above
const UPPER_BOUND_BASE: i32 = 1 - MIN_SCORE;
const LOWER_BOUND_BASE: i32 = MAX_SCORE - 2 * MIN_SCORE + 2;

/// Keeps up to one candidate move per column, ordered by score
///
/// A bounded insertion sort: entries stay sorted ascending and iteration
/// pops from the tail, so the best score comes out first and tied scores
/// come out in the reverse of their insertion order
pub(crate) struct MoveSorter {
    entries: [(u64, i32); WIDTH],
    len: usize,
}

impl MoveSorter {
    pub fn new() -> Self {
        Self {
            entries: [(0, 0); WIDTH],
            len: 0,
        }
    }

    pub fn push(&mut self, move_bitmap: u64, score: i32) {
        let mut slot = self.len;
        // shift strictly better entries up to open a gap
        while slot > 0 && self.entries[slot - 1].1 > score {
            self.entries[slot] = self.entries[slot - 1];
            slot -= 1;
        }
        self.entries[slot] = (move_bitmap, score);
        self.len += 1;
    }
}

impl Iterator for MoveSorter {
    type Item = u64;

    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(self.entries[self.len].0)
    }
}

/// The order in which columns are considered: centre first, edges last
///
/// Central cells join more potential alignments, which makes them the
/// strongest moves on average
pub const fn column_exploration_order() -> [usize; WIDTH] {
    let mut order = [0; WIDTH];
    let mut column = WIDTH / 2;
    let mut step = 1;
    let mut slot = 0;
    while slot < WIDTH {
        order[slot] = column;
        // zig-zag outwards, alternating side to side
        if step % 2 == 1 {
            column += step;
        } else {
            column -= step;
        }
        step += 1;
        slot += 1;
    }
    order
}

/// Solves Connect 4 positions exactly
///
/// # Notes
/// The solver pairs a depth-unbounded negamax search with a transposition
/// table and aggressive move ordering, refined from the outside by a binary
/// search over null windows
///
/// # Score Convention
/// Scores count how early a forced win arrives. Winning with the 4th tile
/// played (the earliest possible) is worth 18, winning with the 21st and
/// final tile is worth 1, and a forced draw is worth 0; forced losses take
/// the mirrored negative values. Equivalently, a win on a board holding `m`
/// tiles is worth `(43 - m) / 2` to the side about to move
pub struct Solver {
    node_count: u64,
    transposition_table: TranspositionTable,
}

impl Solver {
    /// Creates a new `Solver` with an empty transposition table
    pub fn new() -> Self {
        Self {
            node_count: 0,
            transposition_table: TranspositionTable::new(),
        }
    }

    /// Seeds the transposition table of an existing `Solver` from an opening
    /// book file
    ///
    /// A book that cannot be read leaves the table untouched
    pub fn with_opening_book<P: AsRef<Path>>(mut self, path: P) -> Self {
        match OpeningBook::open(&path) {
            Ok(book) => book.load_into(&mut self.transposition_table),
            Err(error) => info!("no opening book detected: {:#}", error),
        }
        self
    }

    /// The number of nodes searched since the last reset (for diagnostics only)
    pub fn node_count(&self) -> u64 {
        self.node_count
    }

    /// Clears the node counter and the transposition table
    pub fn reset(&mut self) {
        self.node_count = 0;
        self.transposition_table.reset();
    }

    /// Scores a position with a negamax alpha-beta search
    ///
    /// The score is relative to the player whose turn it is. That player
    /// must not be able to win at once; `solve` settles such positions
    /// before calling
    fn negamax(&mut self, board: &BitBoard, mut alpha: i32, mut beta: i32) -> i32 {
        debug_assert!(alpha < beta);
        debug_assert!(!board.can_win_next());

        self.node_count += 1;
        let moves = board.num_moves() as i32;

        let survivable = board.non_losing_moves();
        if survivable == 0 {
            // whatever we play, the opponent finishes next turn
            return -((WIDTH * HEIGHT) as i32 - moves) / 2;
        }

        if moves >= (WIDTH * HEIGHT - 2) as i32 {
            // two plies left and neither of them wins: a draw
            return 0;
        }

        // the absence of an immediate win on either side also squeezes the
        // a-priori score range
        let floor = -((WIDTH * HEIGHT - 2) as i32 - moves) / 2;
        if alpha < floor {
            alpha = floor;
            if alpha >= beta {
                return alpha;
            }
        }
        let ceiling = ((WIDTH * HEIGHT - 1) as i32 - moves) / 2;
        if beta > ceiling {
            beta = ceiling;
            if alpha >= beta {
                return beta;
            }
        }

        // bounds proven on earlier visits narrow the window further
        let key = board.key();
        let stored = self.transposition_table.get(key) as i32;
        if stored != 0 {
            if stored > MAX_SCORE - MIN_SCORE + 1 {
                let proven_floor = stored - LOWER_BOUND_BASE;
                if alpha < proven_floor {
                    alpha = proven_floor;
                    if alpha >= beta {
                        return alpha;
                    }
                }
            } else {
                let proven_ceiling = stored - UPPER_BOUND_BASE;
                if beta > proven_ceiling {
                    beta = proven_ceiling;
                    if alpha >= beta {
                        return beta;
                    }
                }
            }
        }

        // queue the surviving moves, most threatening first
        let mut queue = MoveSorter::new();
        for column in column_exploration_order() {
            let candidate = survivable & BitBoard::column_mask(column);
            if candidate != 0 {
                queue.push(candidate, board.move_score(candidate));
            }
        }

        for move_bitmap in queue {
            let mut child = *board;
            child.play(move_bitmap);

            // the child's score from the opponent's seat, negated back
            let score = -self.negamax(&child, -beta, -alpha);

            if score >= beta {
                // too good: the opponent steers the game elsewhere, so this
                // only stands as a lower bound
                self.transposition_table
                    .set(key, (score + LOWER_BOUND_BASE) as u8);
                return score;
            }
            if score > alpha {
                alpha = score;
            }
        }

        // every surviving reply was tried and none beat alpha: an upper bound
        self.transposition_table
            .set(key, (alpha + UPPER_BOUND_BASE) as u8);
        alpha
    }

    /// Calculates the exact score of a position
    ///
    /// When `weak` is true only the sign of the score is resolved: the result
    /// is 1 if the current player forces a win, -1 if the opponent does, and
    /// 0 for a draw.
    ///
    /// The position must not already contain an alignment for either player
    pub fn solve(&mut self, board: &BitBoard, weak: bool) -> i32 {
        // negamax assumes no win is hanging, so settle that case here
        if board.can_win_next() {
            return ((WIDTH * HEIGHT + 1) as i32 - board.num_moves() as i32) / 2;
        }

        let mut min = -((WIDTH * HEIGHT) as i32 - board.num_moves() as i32) / 2;
        let mut max = ((WIDTH * HEIGHT + 1) as i32 - board.num_moves() as i32) / 2 - 1;
        if weak {
            min = -1;
            max = 1;
        }

        // home in on the score by bisection, one null-window probe per step
        while min < max {
            let mut target = min + (max - min) / 2;
            // probe near zero first: draw-range searches stay shallow, and
            // most refinements never need the far window edges
            if target <= 0 && min / 2 < target {
                target = min / 2;
            } else if target >= 0 && max / 2 > target {
                target = max / 2;
            }

            debug!(
                "null-window probe at {} with {} <= score <= {}, {} nodes searched",
                target, min, max, self.node_count
            );

            // the probe does not return the exact score, only which side of
            // the target it falls on
            let result = self.negamax(board, target, target + 1);
            if result <= target {
                max = result;
            } else {
                min = result;
            }
        }
        min
    }

    /// Scores every column of a position
    ///
    /// Returns `None` for full columns and `Some` exact score of playing each
    /// remaining column otherwise, from the current player's perspective
    pub fn analyze(&mut self, board: &BitBoard) -> [Option<i32>; WIDTH] {
        let mut scores = [None; WIDTH];
        for (column, score) in scores.iter_mut().enumerate() {
            if !board.playable(column) {
                continue;
            }
            *score = if board.check_winning_move(column) {
                Some(((WIDTH * HEIGHT + 1) as i32 - board.num_moves() as i32) / 2)
            } else {
                let mut next = *board;
                next.play_column(column);
                Some(-self.solve(&next, false))
            };
        }
        scores
    }
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}
