use std::time::{Duration, Instant};

use crate_chess_engine::board::Board;
use crate_chess_engine::search::{iterative_deepening, SearchLimits, SearchParams, SearchState};
use crate_chess_engine::sync::StopFlag;
use crate_chess_engine::tt::TranspositionTable;

#[test]
fn engine_depth_search_returns_move() {
    let mut board = Board::new();
    let mut tt = TranspositionTable::new(8);
    let mut state = SearchState::new(&mut tt, StopFlag::new(), SearchParams::default());
    let limits = SearchLimits {
        max_depth: 1,
        ..SearchLimits::default()
    };

    let result = iterative_deepening(&mut state, &mut board, &limits, None);
    assert!(result.best_move.is_some(), "depth 1 from startpos should find a move");
}

#[test]
fn engine_time_limited_search_returns_move_within_time() {
    let mut board = Board::new();
    let mut tt = TranspositionTable::new(8);
    let mut state = SearchState::new(&mut tt, StopFlag::new(), SearchParams::default());
    let limits = SearchLimits {
        max_depth: 64,
        deadline: Some(Instant::now() + Duration::from_millis(50)),
        ..SearchLimits::default()
    };

    let start = Instant::now();
    let result = iterative_deepening(&mut state, &mut board, &limits, None);
    assert!(result.best_move.is_some());
    assert!(start.elapsed() < Duration::from_secs(5), "hard deadline should cut the search off promptly");
}
