use crate_chess_engine::board::Board;
use crate_chess_engine::tt::{ProbeResult, TranspositionTable};
use crate_chess_engine::types::BoundType;

#[test]
fn make_then_unmake_restores_hash_and_fen() {
    let mut board =
        Board::from_fen("r1bqkbnr/pppppppp/2n5/8/4P3/5Q2/PPPP1PPP/RNB1KBNR w KQkq - 2 3")
            .expect("valid fen");
    let before_hash = board.hash;
    let before_fen = board.to_fen();

    let m = *board
        .generate_legal_moves()
        .as_slice()
        .first()
        .expect("position has legal moves");
    let info = board.make_move(m);
    assert_ne!(board.hash, before_hash, "hash should change after a move");
    board.unmake_move(m, info);

    assert_eq!(board.hash, before_hash);
    assert_eq!(board.to_fen(), before_fen);
}

#[test]
fn detects_back_rank_checkmate() {
    let board = Board::from_fen("6k1/5ppp/8/8/8/8/8/4Q1K1 b - - 0 1").expect("valid fen");
    assert!(board.is_checkmate());
    assert!(!board.is_stalemate());
}

#[test]
fn detects_stalemate() {
    let board = Board::from_fen("k7/8/1QK5/8/8/8/8/8 b - - 0 1").expect("valid fen");
    assert!(board.is_stalemate());
    assert!(!board.is_checkmate());
}

#[test]
fn rejects_malformed_fen() {
    assert!(Board::from_fen("not a fen at all").is_err());
}

#[test]
fn transposition_table_store_and_probe_respects_depth() {
    let mut tt = TranspositionTable::new(1);
    let key = 0xdead_beef_u64;
    let mv = *Board::new()
        .generate_legal_moves()
        .as_slice()
        .first()
        .unwrap();

    tt.store(key, 5, 200, 0, BoundType::Exact, mv, 0);
    match tt.probe(key, -1000, 1000, 1, 0) {
        ProbeResult::Hit { depth, .. } => assert_eq!(depth, 5),
        ProbeResult::Miss => panic!("expected a hit"),
    }

    // A shallower store must not overwrite a deeper entry in the same generation.
    tt.store(key, 1, 50, 0, BoundType::Exact, mv, 0);
    match tt.probe(key, -1000, 1000, 1, 0) {
        ProbeResult::Hit { depth, .. } => assert_eq!(depth, 5),
        ProbeResult::Miss => panic!("expected a hit"),
    }

    assert_eq!(tt.best_move(key), Some(mv));
}
