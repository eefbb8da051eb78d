//! A bit-parallel representation of a Connect 4 position

use anyhow::{anyhow, bail, Result};

use crate::{HEIGHT, WIDTH};

// the lowest cell of every column
const BOTTOM_ROW: u64 = {
    let mut mask = 0;
    let mut column = 0;
    while column < WIDTH {
        mask |= 1 << (column * (HEIGHT + 1));
        column += 1;
    }
    mask
};

// every playable cell; multiplying the bottom row by 0b111111 stacks it
// six rows high
const PLAYABLE_CELLS: u64 = BOTTOM_ROW * ((1 << HEIGHT) - 1);

/// A Connect 4 position packed into two 64-bit words
///
/// # Notes
/// Cells are numbered column-major with seven bits per column: bit
/// `7 * c + r` is row `r` (counted from the bottom) of column `c`, and the
/// seventh bit of each column is a guard row no move ever occupies:
///
/// ```comment
/// guard    6 13 20 27 34 41 48
///         ----------------------
/// row 5 |  5 12 19 26 33 40 47 |
/// row 4 |  4 11 18 25 32 39 46 |
/// row 3 |  3 10 17 24 31 38 45 |
/// row 2 |  2  9 16 23 30 37 44 |
/// row 1 |  1  8 15 22 29 36 43 |
/// row 0 |  0  7 14 21 28 35 42 |
///         ----------------------
/// column   0  1  2  3  4  5  6
/// ```
///
/// The guard row keeps per-column arithmetic carry-free and stops shifted
/// diagonal and horizontal patterns from leaking between columns.
///
/// Two words describe the whole position: the cells held by the player
/// whose turn it is, and the cells held by anyone. Passing the turn is then
/// a single XOR, and `player_mask + board_mask` gives a 49-bit key that
/// identifies the position uniquely, because the addition plants a
/// terminator bit just above the top tile of every column (see
/// [`BitBoard::key`])
///
/// [`BitBoard::key`]: #method.key
#[derive(Copy, Clone)]
pub struct BitBoard {
    // cells of the player to move
    player_mask: u64,
    // cells of both players
    board_mask: u64,
    num_moves: usize,
}
impl BitBoard {
    /// An empty board, first player to move
    pub fn new() -> Self {
        Self {
            player_mask: 0,
            board_mask: 0,
            num_moves: 0,
        }
    }

    /// Creates a board from a string of 1-indexed moves
    ///
    /// # Notes
    /// Each character names the column the next tile drops into, counted
    /// from 1 (so `"0"` never parses)
    ///
    /// Returns `Err` unless the whole string describes a playable, still
    /// undecided game: unknown characters, overfilled columns and moves
    /// played after a completed alignment are all rejected
    ///
    /// # Example
    /// ```
    /// # fn main() -> anyhow::Result<()> {
    /// use connect4_solver::bitboard::BitBoard;
    ///
    /// // three stacks on the left; the move string counts columns from 1
    /// let board = BitBoard::from_moves("112233")?;
    ///
    /// // the first player now wins in (0-indexed) column 3
    /// assert!(board.check_winning_move(3));
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_moves<S: AsRef<str>>(moves: S) -> Result<Self> {
        let mut board = Self::new();

        for column_char in moves.as_ref().chars() {
            let column = column_char
                .to_digit(10)
                .map(|digit| digit as usize)
                .filter(|digit| (1..=WIDTH).contains(digit))
                .ok_or_else(|| anyhow!("could not parse '{}' as a valid move", column_char))?
                - 1;
            if !board.playable(column) {
                bail!("invalid move, column {} is already full", column + 1);
            }
            if board.check_winning_move(column) {
                bail!("invalid position, the game is already decided");
            }
            board.play_column(column);
        }
        Ok(board)
    }

    /// Plays a string of 1-indexed moves, stopping at the first bad one
    ///
    /// A move is refused if it is not a digit between 1 and the board width,
    /// if its column is full, or if it would win the game. Returns the number
    /// of moves played; a caller can compare it against the sequence length
    /// to learn whether the whole string was applied
    pub fn play_moves<S: AsRef<str>>(&mut self, moves: S) -> usize {
        let mut played = 0;
        for column_char in moves.as_ref().chars() {
            let column = match column_char.to_digit(10).map(|digit| digit as usize) {
                Some(digit @ 1..=WIDTH) => digit - 1,
                _ => break,
            };
            if !self.playable(column) || self.check_winning_move(column) {
                break;
            }
            self.play_column(column);
            played += 1;
        }
        played
    }

    /// Reassembles a board from its two masks and move counter
    pub fn from_parts(player_mask: u64, board_mask: u64, num_moves: usize) -> Self {
        Self {
            player_mask,
            board_mask,
            num_moves,
        }
    }

    /// The cells held by the player to move
    pub fn player_mask(&self) -> u64 {
        self.player_mask
    }

    /// The cells held by either player
    pub fn board_mask(&self) -> u64 {
        self.board_mask
    }

    /// A mask of the highest playable cell of a column
    pub const fn top_mask(column: usize) -> u64 {
        1 << (column * (HEIGHT + 1) + HEIGHT - 1)
    }

    /// A mask of the lowest cell of a column
    pub const fn bottom_mask(column: usize) -> u64 {
        1 << (column * (HEIGHT + 1))
    }

    /// A mask of every playable cell of a column
    pub const fn column_mask(column: usize) -> u64 {
        ((1 << HEIGHT) - 1) << (column * (HEIGHT + 1))
    }

    /// Returns the bitmap of moves that don't hand the opponent the game
    ///
    /// Meaningful only when the current player has no immediate win of their
    /// own; 0 means every playable move loses on the spot
    pub fn non_losing_moves(&self) -> u64 {
        debug_assert!(!self.can_win_next());

        let opponent_wins = self.win_cells(self.player_mask ^ self.board_mask);
        let mut candidates = self.possible_moves();

        let must_block = candidates & opponent_wins;
        if must_block != 0 {
            // two open threats at once cannot both be answered
            if must_block & (must_block - 1) != 0 {
                return 0;
            }
            candidates = must_block;
        }
        // dropping just below an opponent's winning cell serves it to them
        candidates & !(opponent_wins >> 1)
    }

    /// Returns a bitmap holding the lowest free cell of every unfilled column
    pub fn possible_moves(&self) -> u64 {
        (self.board_mask + BOTTOM_ROW) & PLAYABLE_CELLS
    }

    /// Returns whether the current player can finish the game this turn
    pub fn can_win_next(&self) -> bool {
        self.win_cells(self.player_mask) & self.possible_moves() != 0
    }

    /// Returns the empty cells that would complete a four-in-a-row for the
    /// given set of tiles
    fn win_cells(&self, tiles: u64) -> u64 {
        let mut completions = 0;
        // cell strides of the four line directions: vertical, falling
        // diagonal, horizontal, rising diagonal
        for stride in [1, HEIGHT, HEIGHT + 1, HEIGHT + 2] {
            let ahead = (tiles << stride) & (tiles << (2 * stride));
            let behind = (tiles >> stride) & (tiles >> (2 * stride));

            // a triple with a free cell past either end
            completions |= ahead & (tiles << (3 * stride));
            completions |= behind & (tiles >> (3 * stride));
            // or a pair and a lone tile split around a gap
            completions |= ahead & (tiles >> stride);
            completions |= behind & (tiles << stride);
        }
        // only empty cells inside the board count
        completions & (PLAYABLE_CELLS ^ self.board_mask)
    }

    /// Counts the winning cells the current player would own after a move
    ///
    /// Used for move ordering: moves that build threats are searched sooner
    pub fn move_score(&self, move_bitmap: u64) -> i32 {
        self.win_cells(self.player_mask | move_bitmap).count_ones() as i32
    }

    /// The number of plies played so far
    pub fn num_moves(&self) -> usize {
        self.num_moves
    }

    /// Returns whether a column still has room
    pub fn playable(&self, column: usize) -> bool {
        self.board_mask & Self::top_mask(column) == 0
    }

    /// Applies a move bitmap for the current player and passes the turn
    pub fn play(&mut self, move_bitmap: u64) {
        // viewed from the next player, all of our tiles are theirs
        self.player_mask ^= self.board_mask;
        self.board_mask |= move_bitmap;
        self.num_moves += 1;
    }

    /// Drops a tile of the current player into a playable column
    pub fn play_column(&mut self, column: usize) {
        debug_assert!(self.playable(column));
        self.play((self.board_mask + Self::bottom_mask(column)) & Self::column_mask(column));
    }

    /// Returns whether dropping into a column wins for the current player
    ///
    /// The board itself is left untouched
    pub fn check_winning_move(&self, column: usize) -> bool {
        // place the tile on a scratch copy of the player's cells
        let tiles = self.player_mask
            | ((self.board_mask + Self::bottom_mask(column)) & Self::column_mask(column));

        // a four-in-a-row along any direction is two overlapping pairs
        [1, HEIGHT, HEIGHT + 1, HEIGHT + 2].into_iter().any(|stride| {
            let pairs = tiles & (tiles >> stride);
            pairs & (pairs >> (2 * stride)) != 0
        })
    }

    /// Returns the key used for indexing into the transposition table
    ///
    /// The sum is injective over reachable positions: adding the two masks
    /// carries a terminator bit to just above the top tile of each column,
    /// so the occupied cells and their owners can both be read back out
    pub fn key(&self) -> u64 {
        self.player_mask + self.board_mask
    }
}

impl Default for BitBoard {
    fn default() -> Self {
        Self::new()
    }
}
