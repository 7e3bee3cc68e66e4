use std::io::Write;
use std::process::{Command, Stdio};

use crate_chess_engine::board::Board;

#[test]
fn uci_smoke_test_returns_legal_move() {
    let exe = env!("CARGO_BIN_EXE_crate_chess_engine");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("failed to spawn engine binary");

    let input = b"uci\nisready\nposition startpos moves e2e4\ngo movetime 50\nquit\n";
    child.stdin.as_mut().unwrap().write_all(input).unwrap();

    let output = child.wait_with_output().expect("failed to read output");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("uciok"));
    assert!(stdout.contains("readyok"));

    let bestmove_line = stdout
        .lines()
        .filter(|line| line.starts_with("bestmove"))
        .last()
        .expect("no bestmove found");
    let parts: Vec<&str> = bestmove_line.split_whitespace().collect();
    assert!(parts.len() >= 2, "bestmove missing move: {bestmove_line}");
    let mv_uci = parts[1];
    assert_ne!(mv_uci, "0000", "engine returned null move");

    let mut board = Board::new();
    let e2e4 = *board
        .generate_legal_moves()
        .as_slice()
        .iter()
        .find(|m| m.to_uci() == "e2e4")
        .expect("e2e4 should be legal from the start position");
    let info = board.make_move(e2e4);
    let _ = info;

    let legal = board
        .generate_legal_moves()
        .as_slice()
        .iter()
        .any(|m| m.to_uci() == mv_uci);
    assert!(legal, "bestmove {mv_uci} not legal in position after 1.e4");
}
