//! UCI adapter: reads commands from stdin, drives search, writes `info`/
//! `bestmove` lines to stdout.

use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};

use crate::board::Board;
use crate::perft::{perft, perft_divide};
use crate::search::{
    iterative_deepening, SearchLimits, SearchLine, SearchObserver, SearchParams, SearchResult, SearchState,
};
use crate::sync::StopFlag;
use crate::tt::TranspositionTable;
use crate::types::Move;

const ENGINE_NAME: &str = "crate_chess_engine";
const ENGINE_AUTHOR: &str = "the crate chess engine project";

/// Stockfish's skew-logistic weighting of how important the move at `ply`
/// plies from now is, used to split a time budget across a game rather than
/// dividing it evenly by `movestogo`.
fn move_importance(ply: i32) -> f64 {
    const X_SCALE: f64 = 6.85;
    const X_SHIFT: f64 = 64.5;
    const SKEW: f64 = 0.171;
    (1.0 + ((ply as f64 - X_SHIFT) / X_SCALE).exp()).powf(-SKEW)
}

struct TimeBudget {
    optimum: Duration,
    maximum: Duration,
}

/// Splits the side's remaining clock into an "optimum" time (the point at
/// which it is no longer worth starting another iteration) and a hard
/// "maximum" time, weighting the moves remaining by [`move_importance`].
fn compute_time_budget(time_left_ms: u64, inc_ms: u64, moves_to_go: Option<u32>, ply: i32, move_overhead_ms: u64) -> TimeBudget {
    let my_time = (time_left_ms as f64 - move_overhead_ms as f64).max(1.0);
    let horizon = moves_to_go.unwrap_or(50).max(1) as i32;

    let this_move = move_importance(ply);
    let mut total_importance = this_move;
    for i in 1..horizon {
        total_importance += move_importance(ply + i);
    }

    let ratio = this_move / total_importance;
    let mut optimum_ms = my_time * ratio + inc_ms as f64 * 0.8;
    let mut maximum_ms = (my_time * (ratio * 4.0).min(0.8)).max(optimum_ms) + inc_ms as f64;

    optimum_ms = optimum_ms.min(my_time * 0.8);
    maximum_ms = maximum_ms.min(my_time * 0.95);

    TimeBudget {
        optimum: Duration::from_millis(optimum_ms.max(1.0) as u64),
        maximum: Duration::from_millis(maximum_ms.max(1.0) as u64),
    }
}

/// Runtime-configurable `setoption` knobs (spec.md §6.1's option table).
pub struct UciOptions {
    pub hash_mb: usize,
    pub move_overhead_ms: u64,
    pub threads: usize,
    pub multi_pv: usize,
}

impl Default for UciOptions {
    fn default() -> Self {
        UciOptions {
            hash_mb: 16,
            move_overhead_ms: 10,
            threads: 1,
            multi_pv: 1,
        }
    }
}

fn apply_setoption(options: &mut UciOptions, tt: &mut TranspositionTable, parts: &[&str]) {
    let Some(name_pos) = parts.iter().position(|&p| p == "name") else { return };
    let Some(value_pos) = parts.iter().position(|&p| p == "value") else { return };
    if value_pos <= name_pos + 1 {
        return;
    }
    let name = parts[name_pos + 1..value_pos].join(" ");
    let value = parts[value_pos + 1..].join(" ");

    match name.as_str() {
        "Hash" => {
            if let Ok(mb) = value.parse::<usize>() {
                options.hash_mb = mb.clamp(1, 33_554_432);
                tt.resize(options.hash_mb);
            }
        }
        "Move Overhead" => {
            if let Ok(ms) = value.parse::<u64>() {
                options.move_overhead_ms = ms.clamp(0, 5000);
            }
        }
        "Threads" => {
            if let Ok(n) = value.parse::<usize>() {
                options.threads = n.max(1);
            }
        }
        "MultiPV" => {
            if let Ok(n) = value.parse::<usize>() {
                options.multi_pv = n.max(1);
            }
        }
        _ => {}
    }
}

fn print_uci_options(options: &UciOptions) {
    println!("id name {ENGINE_NAME}");
    println!("id author {ENGINE_AUTHOR}");
    println!("option name Hash type spin default {} min 1 max 33554432", options.hash_mb);
    println!(
        "option name Move Overhead type spin default {} min 0 max 5000",
        options.move_overhead_ms
    );
    println!("option name Threads type spin default {} min 1 max 512", options.threads);
    println!("option name MultiPV type spin default {} min 1 max 256", options.multi_pv);
    println!("uciok");
}

/// Parses a UCI long-algebraic token (e.g. `e2e4`, `e7e8q`) against the
/// position's legal moves; invalid or illegal tokens return `None` rather
/// than panicking, so `position ... moves ...` can skip bad tokens.
fn parse_uci_move(board: &Board, token: &str) -> Option<Move> {
    board
        .generate_legal_moves()
        .as_slice()
        .iter()
        .find(|m| m.to_uci() == token)
        .copied()
}

fn apply_position_command(board: &mut Board, parts: &[&str]) {
    let mut i = 1;
    if parts.get(1) == Some(&"startpos") {
        *board = Board::new();
        i = 2;
    } else if parts.get(1) == Some(&"fen") {
        let moves_at = parts.iter().position(|&p| p == "moves").unwrap_or(parts.len());
        let fen = parts[2..moves_at].join(" ");
        match Board::from_fen(&fen) {
            Ok(b) => *board = b,
            Err(_) => {
                println!("info string Invalid fen!");
                return;
            }
        }
        i = moves_at;
    } else {
        return;
    }

    if parts.get(i) == Some(&"moves") {
        i += 1;
        while i < parts.len() {
            match parse_uci_move(board, parts[i]) {
                Some(m) => {
                    board.make_move(m);
                }
                None => eprintln!("info string skipping unparseable move {}", parts[i]),
            }
            i += 1;
        }
    }
}

struct GoRequest {
    depth: Option<i32>,
    movetime: Option<Duration>,
    infinite: bool,
    perft_depth: Option<u32>,
    multi_pv: Option<usize>,
    wtime: Option<u64>,
    btime: Option<u64>,
    winc: u64,
    binc: u64,
    movestogo: Option<u32>,
}

fn parse_go_command(parts: &[&str]) -> GoRequest {
    let mut req = GoRequest {
        depth: None,
        movetime: None,
        infinite: false,
        perft_depth: None,
        multi_pv: None,
        wtime: None,
        btime: None,
        winc: 0,
        binc: 0,
        movestogo: None,
    };
    let mut i = 1;
    while i < parts.len() {
        match parts[i] {
            "depth" => {
                req.depth = parts.get(i + 1).and_then(|s| s.parse().ok());
                i += 2;
            }
            "movetime" => {
                req.movetime = parts.get(i + 1).and_then(|s| s.parse().ok()).map(Duration::from_millis);
                i += 2;
            }
            "perft" => {
                req.perft_depth = parts.get(i + 1).and_then(|s| s.parse().ok());
                i += 2;
            }
            "multipv" => {
                req.multi_pv = parts.get(i + 1).and_then(|s| s.parse().ok());
                i += 2;
            }
            "wtime" => {
                req.wtime = parts.get(i + 1).and_then(|s| s.parse().ok());
                i += 2;
            }
            "btime" => {
                req.btime = parts.get(i + 1).and_then(|s| s.parse().ok());
                i += 2;
            }
            "winc" => {
                req.winc = parts.get(i + 1).and_then(|s| s.parse().ok()).unwrap_or(0);
                i += 2;
            }
            "binc" => {
                req.binc = parts.get(i + 1).and_then(|s| s.parse().ok()).unwrap_or(0);
                i += 2;
            }
            "movestogo" => {
                req.movestogo = parts.get(i + 1).and_then(|s| s.parse().ok());
                i += 2;
            }
            "infinite" => {
                req.infinite = true;
                i += 1;
            }
            _ => i += 1,
        }
    }
    req
}

fn format_score(score: i32) -> String {
    if score.abs() >= crate::tt::CHECKMATE_SCORE - 1000 {
        let mate_in = (crate::tt::CHECKMATE_SCORE - score.abs() + 1) / 2;
        format!("mate {}", if score > 0 { mate_in } else { -mate_in })
    } else {
        format!("cp {score}")
    }
}

fn format_pv(pv: &[Move]) -> String {
    pv.iter().map(Move::to_uci).collect::<Vec<_>>().join(" ")
}

struct InfoPrinter;

impl SearchObserver for InfoPrinter {
    fn on_iteration(&mut self, result: &SearchResult, elapsed: Duration) {
        let nps = if elapsed.as_millis() > 0 {
            (result.nodes as u128 * 1000 / elapsed.as_millis()) as u64
        } else {
            0
        };
        for (idx, line) in result.lines.iter().enumerate() {
            print_info_line(result.depth, result.seldepth, idx + 1, line, result.nodes, nps, elapsed);
        }
    }
}

fn print_info_line(depth: i32, seldepth: i32, multipv: usize, line: &SearchLine, nodes: u64, nps: u64, elapsed: Duration) {
    println!(
        "info depth {} seldepth {} multipv {} score {} nodes {} nps {} time {} pv {}",
        depth,
        seldepth,
        multipv,
        format_score(line.score),
        nodes,
        nps,
        elapsed.as_millis(),
        format_pv(&line.pv)
    );
}

/// Reads UCI commands from stdin until `quit`, driving the search and
/// printing `info`/`bestmove` lines to stdout.
pub fn run_uci_loop() {
    let stdin = io::stdin();
    let mut board = Board::new();
    let mut options = UciOptions::default();
    let mut tt = TranspositionTable::new(options.hash_mb);
    let stop = StopFlag::new();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        match parts[0] {
            "uci" => print_uci_options(&options),
            "isready" => println!("readyok"),
            "ucinewgame" => {
                stop.reset();
                tt.clear();
                board = Board::new();
            }
            "position" => apply_position_command(&mut board, &parts),
            "setoption" => apply_setoption(&mut options, &mut tt, &parts),
            "go" => {
                let req = parse_go_command(&parts);
                if let Some(depth) = req.perft_depth {
                    run_perft_command(&mut board, depth);
                    continue;
                }
                stop.reset();
                let limits = build_search_limits(&board, &req, &options);
                let mut state = SearchState::new(&mut tt, stop.clone(), SearchParams::default());
                let mut printer = InfoPrinter;
                let result = iterative_deepening(&mut state, &mut board, &limits, Some(&mut printer));
                announce_bestmove(&result);
            }
            "stop" => stop.stop(),
            "ponderhit" => {}
            "quit" => break,
            _ => println!("info string Invalid command!"),
        }

        io::stdout().flush().ok();
    }
}

fn run_perft_command(board: &mut Board, depth: u32) {
    let start = Instant::now();
    let divide = perft_divide(board, depth.max(1));
    let mut total = 0u64;
    for (mv, nodes) in &divide {
        println!("{mv}: {nodes}");
        total += nodes;
    }
    let nodes = if depth == 0 { perft(board, 0) } else { total };
    println!("perft {} nodes in {:?}", nodes, start.elapsed());
}

fn build_search_limits(board: &Board, req: &GoRequest, options: &UciOptions) -> SearchLimits {
    let mut limits = SearchLimits {
        max_depth: req.depth.unwrap_or(64),
        deadline: None,
        soft_deadline: None,
        max_nodes: 0,
        multi_pv: req.multi_pv.unwrap_or(options.multi_pv),
    };

    if let Some(movetime) = req.movetime {
        limits.deadline = Some(Instant::now() + movetime);
        return limits;
    }
    if req.infinite || req.depth.is_some() {
        return limits;
    }

    let (time_left, inc) = match board.side_to_move {
        crate::types::Color::White => (req.wtime, req.winc),
        crate::types::Color::Black => (req.btime, req.binc),
    };
    if let Some(time_left) = time_left {
        let ply = board.fullmove_number as i32 * 2;
        let budget = compute_time_budget(time_left, inc, req.movestogo, ply, options.move_overhead_ms);
        let now = Instant::now();
        limits.soft_deadline = Some(now + budget.optimum);
        limits.deadline = Some(now + budget.maximum);
    }
    limits
}

fn announce_bestmove(result: &SearchResult) {
    match result.best_move {
        Some(m) => {
            if let Some(ponder) = result.ponder_move {
                println!("bestmove {} ponder {}", m.to_uci(), ponder.to_uci());
            } else {
                println!("bestmove {}", m.to_uci());
            }
        }
        None => println!("bestmove 0000"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_uci_move_from_start_position() {
        let board = Board::new();
        let m = parse_uci_move(&board, "e2e4").expect("e2e4 is legal from the start position");
        assert_eq!(m.to_uci(), "e2e4");
    }

    #[test]
    fn unparseable_move_returns_none() {
        let board = Board::new();
        assert!(parse_uci_move(&board, "z9z9").is_none());
    }

    #[test]
    fn position_command_applies_moves_in_sequence() {
        let mut board = Board::new();
        apply_position_command(&mut board, &["position", "startpos", "moves", "e2e4", "e7e5"]);
        assert_ne!(board.to_fen(), Board::new().to_fen());
    }

    #[test]
    fn invalid_fen_keeps_previous_position() {
        let mut board = Board::new();
        let before = board.to_fen();
        apply_position_command(&mut board, &["position", "fen", "not", "a", "fen"]);
        assert_eq!(board.to_fen(), before);
    }

    #[test]
    fn score_format_reports_mate_distance() {
        assert_eq!(format_score(crate::tt::CHECKMATE_SCORE - 3), "mate 2");
    }
}
