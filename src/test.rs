#[cfg(test)]
pub mod test {
    use anyhow::Result;
    use std::collections::HashMap;

    use crate::bitboard::BitBoard;
    use crate::opening_book::OpeningBook;
    use crate::solver::{MoveSorter, Solver, MAX_SCORE, MIN_SCORE};
    use crate::transposition_table::{log2, next_prime, TranspositionTable, LOG_SIZE};
    use crate::{HEIGHT, WIDTH};

    // A tiling with no four-in-a-row anywhere on the board: in even columns
    // rows 0, 1, 4 and 5 belong to the first player, in odd columns rows 2
    // and 3 do.
    fn first_player_tile(column: usize, row: usize) -> bool {
        (column % 2 == 0) != (row / 2 == 1)
    }

    // Builds a board holding the tiling on the given cells. The cell set must
    // give both players the same number of tiles, leaving the first player to
    // move.
    fn striped_board(cells: &[(usize, usize)]) -> BitBoard {
        let mut player_mask = 0u64;
        let mut board_mask = 0u64;
        let mut first_player_tiles = 0;
        for &(column, row) in cells {
            let bit = 1u64 << (column * (HEIGHT + 1) + row);
            board_mask |= bit;
            if first_player_tile(column, row) {
                player_mask |= bit;
                first_player_tiles += 1;
            }
        }
        assert_eq!(first_player_tiles * 2, cells.len());
        BitBoard::from_parts(player_mask, board_mask, cells.len())
    }

    fn full_columns(columns: std::ops::Range<usize>) -> Vec<(usize, usize)> {
        columns
            .flat_map(|column| (0..HEIGHT).map(move |row| (column, row)))
            .collect()
    }

    // Reflects a board left to right; scores are invariant under this.
    fn mirrored(board: &BitBoard) -> BitBoard {
        let mut player_mask = 0u64;
        let mut board_mask = 0u64;
        let column_bits = (1u64 << (HEIGHT + 1)) - 1;
        for column in 0..WIDTH {
            let from = column * (HEIGHT + 1);
            let to = (WIDTH - 1 - column) * (HEIGHT + 1);
            player_mask |= ((board.player_mask() >> from) & column_bits) << to;
            board_mask |= ((board.board_mask() >> from) & column_bits) << to;
        }
        BitBoard::from_parts(player_mask, board_mask, board.num_moves())
    }

    #[test]
    fn reachable_positions_keep_invariants_and_unique_keys() {
        let full_board_mask = (0..WIDTH).fold(0u64, |mask, column| {
            mask | (((1u64 << HEIGHT) - 1) << (column * (HEIGHT + 1)))
        });

        // an empty board offers exactly the bottom row
        assert_eq!(BitBoard::new().possible_moves(), 0x40810204081);

        // breadth-first over every position a few plies deep, de-duplicated
        // by key; a key collision must mean an identical position
        let mut seen: HashMap<u64, (u64, u64)> = HashMap::new();
        let mut frontier = vec![BitBoard::new()];
        for _ in 0..5 {
            let mut next_frontier = Vec::new();
            for board in frontier {
                for column in 0..WIDTH {
                    if !board.playable(column) || board.check_winning_move(column) {
                        continue;
                    }
                    let mut next = board;
                    next.play_column(column);

                    assert_eq!(next.board_mask().count_ones() as usize, next.num_moves());
                    assert_eq!(next.player_mask() & !next.board_mask(), 0);
                    assert_eq!(next.board_mask() & !full_board_mask, 0);

                    let identity = (next.player_mask(), next.board_mask());
                    match seen.insert(next.key(), identity) {
                        Some(previous) => assert_eq!(previous, identity),
                        None => next_frontier.push(next),
                    }
                }
            }
            frontier = next_frontier;
        }
    }

    #[test]
    fn move_sequences_stop_at_the_first_bad_move() {
        let mut board = BitBoard::new();
        assert_eq!(board.play_moves("112233"), 6);
        // the next move in column 4 would win for the first player
        assert_eq!(board.play_moves("44"), 0);

        let mut board = BitBoard::new();
        // a column only holds six tiles
        assert_eq!(board.play_moves("4444444"), 6);

        let mut board = BitBoard::new();
        assert_eq!(board.play_moves("8123"), 0);
        assert_eq!(board.play_moves("12x3"), 2);
    }

    #[test]
    fn invalid_sequences_are_rejected() -> Result<()> {
        assert!(BitBoard::from_moves("0").is_err());
        assert!(BitBoard::from_moves("4444444").is_err());
        // the final move completes an alignment, so the position is over
        assert!(BitBoard::from_moves("1122334").is_err());
        assert!(BitBoard::from_moves("112233").is_ok());
        Ok(())
    }

    #[test]
    fn forced_block_is_the_only_non_losing_move() -> Result<()> {
        let board = BitBoard::from_moves("11223")?;
        // the second player must answer the three-in-a-row on the bottom rank
        assert_eq!(board.non_losing_moves(), 1 << (3 * (HEIGHT + 1)));
        Ok(())
    }

    #[test]
    fn immediate_win_is_detected() -> Result<()> {
        let board = BitBoard::from_moves("454545")?;
        assert!(board.can_win_next());
        assert!(board.check_winning_move(3));

        // winning with the fourth tile is the best score there is
        let mut solver = Solver::new();
        assert_eq!(solver.solve(&board, false), MAX_SCORE);
        assert_eq!(solver.node_count(), 0);
        Ok(())
    }

    #[test]
    fn unanswerable_double_threat_loses_at_once() -> Result<()> {
        // the first player owns the bottom of columns 2, 3 and 4, leaving
        // open winning squares on both sides
        let board = BitBoard::from_moves("33442")?;
        assert_eq!(board.non_losing_moves(), 0);

        let mut solver = Solver::new();
        assert_eq!(solver.solve(&board, false), -18);
        solver.reset();
        assert_eq!(solver.solve(&board, true), -1);
        Ok(())
    }

    #[test]
    fn draw_cutoff_at_two_remaining_plies() {
        // forty tiles down, two empty squares in the last column and no
        // threats anywhere
        let mut cells = full_columns(0..6);
        cells.extend((0..4).map(|row| (6, row)));
        let board = striped_board(&cells);

        let mut solver = Solver::new();
        assert_eq!(solver.solve(&board, false), 0);
        // the first probe hits the draw cutoff without recursing
        assert_eq!(solver.node_count(), 1);

        solver.reset();
        assert_eq!(solver.solve(&board, true), 0);
    }

    #[test]
    fn weak_solves_match_the_strong_sign() {
        let board = striped_board(&full_columns(0..4));
        let mut solver = Solver::new();
        let strong = solver.solve(&board, false);
        solver.reset();
        assert_eq!(solver.solve(&board, true), strong.signum());
    }

    #[test]
    fn solving_is_deterministic() {
        let board = striped_board(&full_columns(0..4));
        let mut solver = Solver::new();
        let first = (solver.solve(&board, false), solver.node_count());
        solver.reset();
        let second = (solver.solve(&board, false), solver.node_count());
        assert_eq!(first, second);
    }

    #[test]
    fn mirrored_positions_share_a_score() {
        let board = striped_board(&full_columns(0..4));
        let mirror = mirrored(&board);
        assert_ne!(board.key(), mirror.key());

        let mut solver = Solver::new();
        let score = solver.solve(&board, false);
        let mut solver = Solver::new();
        assert_eq!(solver.solve(&mirror, false), score);
    }

    #[test]
    fn solve_matches_best_child_score() {
        let board = striped_board(&full_columns(0..4));
        let mut solver = Solver::new();
        let score = solver.solve(&board, false);

        // the negamax identity: a position is worth the best of its children,
        // seen through the opponent's sign
        let best = solver.analyze(&board).iter().flatten().copied().max();
        assert_eq!(best, Some(score));
    }

    #[test]
    fn analyze_reports_wins_and_full_columns() {
        // a board with a single empty square, whose occupation completes a
        // diagonal for the player to move
        let mut player_mask = 0u64;
        let mut board_mask = 0u64;
        for column in 0..WIDTH - 1 {
            for row in 0..HEIGHT {
                let bit = 1u64 << (column * (HEIGHT + 1) + row);
                board_mask |= bit;
                // one flipped tile hands the diagonal to the second player
                let first_player = (column, row) != (3, 2) && first_player_tile(column, row);
                if !first_player {
                    player_mask |= bit;
                }
            }
        }
        for (row, first_player) in [true, true, false, true, true].into_iter().enumerate() {
            let bit = 1u64 << ((WIDTH - 1) * (HEIGHT + 1) + row);
            board_mask |= bit;
            if !first_player {
                player_mask |= bit;
            }
        }
        // 41 tiles down, the second player to move
        let board = BitBoard::from_parts(player_mask, board_mask, 41);
        assert!(board.can_win_next());

        let mut solver = Solver::new();
        let scores = solver.analyze(&board);
        // only the last column is open, and dropping there wins on the spot
        assert_eq!(scores[WIDTH - 1], Some(1));
        assert!(scores[..WIDTH - 1].iter().all(|score| score.is_none()));

        assert_eq!(solver.solve(&board, false), 1);
    }

    #[test]
    fn move_sorter_pops_best_scores_first() {
        let mut sorter = MoveSorter::new();
        sorter.push(0b001, 0);
        sorter.push(0b010, 2);
        sorter.push(0b100, 1);
        assert_eq!(sorter.collect::<Vec<_>>(), vec![0b010, 0b100, 0b001]);

        // equal scores pop in reverse insertion order
        let mut sorter = MoveSorter::new();
        for (index, score) in [1, 0, 1, 1].into_iter().enumerate() {
            sorter.push(1 << index, score);
        }
        assert_eq!(sorter.collect::<Vec<_>>(), vec![0b1000, 0b0100, 0b0001, 0b0010]);
    }

    #[test]
    fn compile_time_helpers() {
        assert_eq!(next_prime(2), 2);
        assert_eq!(next_prime(14), 17);
        // the table size used by the solver
        assert_eq!(next_prime(1 << LOG_SIZE), (1 << LOG_SIZE) + 9);

        assert_eq!(log2(1), 0);
        assert_eq!(log2(64), 6);
        assert_eq!(log2(127), 6);
    }

    #[test]
    fn transposition_table_stores_and_overwrites() {
        let size = next_prime(1 << LOG_SIZE);
        let mut table = TranspositionTable::new();
        assert_eq!(table.get(42), 0);

        table.set(42, 7);
        assert_eq!(table.get(42), 7);

        // a colliding key evicts the previous occupant
        table.set(42 + size, 9);
        assert_eq!(table.get(42 + size), 9);
        assert_eq!(table.get(42), 0);

        table.reset();
        assert_eq!(table.get(42 + size), 0);
    }

    #[test]
    fn opening_book_round_trip() -> Result<()> {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("book.bin");

        let positions = [
            (1u64, 3i32),
            (2, -11),
            (3, 0),
            (4, MAX_SCORE),
            (5, MIN_SCORE),
        ];
        let mut book = OpeningBook::new(&path);
        for &(key, score) in &positions {
            book.save(key, score);
        }
        book.write()?;

        let reloaded = OpeningBook::open(&path)?;
        assert_eq!(reloaded.records(), &positions[..]);

        let mut table = TranspositionTable::new();
        reloaded.load_into(&mut table);
        for &(key, score) in &positions {
            let value = table.get(key) as i32;
            // the seeded value must decode as a lower bound
            assert!(value > MAX_SCORE - MIN_SCORE + 1);
            assert_eq!(value, score + 2 * MAX_SCORE - 3 * MIN_SCORE + 3);
        }
        Ok(())
    }

    #[test]
    fn opening_book_ignores_a_truncated_tail() -> Result<()> {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("book.bin");

        let mut book = OpeningBook::new(&path);
        book.save(1, 5);
        book.save(2, -5);
        book.write()?;

        // chop into the middle of the second record
        let bytes = std::fs::read(&path)?;
        std::fs::write(&path, &bytes[..bytes.len() - 5])?;

        let reloaded = OpeningBook::open(&path)?;
        assert_eq!(reloaded.records(), &[(1u64, 5i32)][..]);
        Ok(())
    }

    #[test]
    fn a_missing_opening_book_is_ignored() -> Result<()> {
        let mut solver = Solver::new().with_opening_book("no_such_file.book");
        let board = BitBoard::from_moves("454545")?;
        assert_eq!(solver.solve(&board, false), MAX_SCORE);
        Ok(())
    }

    #[test]
    #[ignore = "searches the full game tree from the opening"]
    fn empty_board_is_a_first_player_win() {
        let board = BitBoard::new();
        let mut solver = Solver::new();
        assert_eq!(solver.solve(&board, true), 1);
        solver.reset();
        // the first player wins with their very last tile
        assert_eq!(solver.solve(&board, false), 1);
    }

    #[test]
    #[ignore = "searches the full game tree from the opening"]
    fn centre_opening_wins_for_the_first_player() -> Result<()> {
        let board = BitBoard::from_moves("4")?;
        let mut solver = Solver::new();
        assert_eq!(solver.solve(&board, true), -1);

        // a full centre column leaves the first player winning elsewhere
        let board = BitBoard::from_moves("444444")?;
        solver.reset();
        assert!(solver.solve(&board, false) > 0);
        Ok(())
    }

    #[test]
    #[ignore = "deep tactical line, slow without an opening book"]
    fn weak_and_strong_solutions_agree_out_of_the_opening() -> Result<()> {
        let board = BitBoard::from_moves("4455454")?;
        let mut solver = Solver::new();
        let strong = solver.solve(&board, false);
        solver.reset();
        assert_eq!(solver.solve(&board, true), strong.signum());
        Ok(())
    }
}
