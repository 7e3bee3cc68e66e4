//! Transposition table: a direct-mapped array of entries indexed by the
//! high bits of the Zobrist key, replaced by a depth-based policy and
//! carrying mate scores distance-independently.

use std::sync::atomic::{AtomicU16, Ordering};

use crate::types::{BoundType, Move, MoveFlag, Square};

pub const CHECKMATE_SCORE: i32 = 30_000;
/// Scores within this many points of mate are treated as mate scores for
/// the distance adjustment on store/probe.
const MATE_THRESHOLD: i32 = CHECKMATE_SCORE - 1000;

#[derive(Clone, Copy, Debug)]
struct TTEntry {
    key: u64,
    depth: u8,
    score: i32,
    static_eval: i32,
    bound: BoundType,
    best_move: Move,
    generation: u16,
}

impl TTEntry {
    fn empty() -> Self {
        TTEntry {
            key: 0,
            depth: 0,
            score: 0,
            static_eval: 0,
            bound: BoundType::Exact,
            best_move: Move::null(),
            generation: 0,
        }
    }
}

pub enum ProbeResult {
    /// A usable bound, already adjusted for mate distance at `ply`.
    Hit { score: i32, bound: BoundType, depth: u8 },
    /// No usable score, but a move to try first if present.
    Miss,
}

pub struct TranspositionTable {
    entries: Vec<TTEntry>,
    generation: AtomicU16,
}

impl TranspositionTable {
    pub fn new(size_mb: usize) -> Self {
        let bytes = size_mb.max(1) * 1024 * 1024;
        let count = (bytes / std::mem::size_of::<TTEntry>()).max(1);
        TranspositionTable {
            entries: vec![TTEntry::empty(); count],
            generation: AtomicU16::new(0),
        }
    }

    pub fn resize(&mut self, size_mb: usize) {
        *self = TranspositionTable::new(size_mb);
    }

    pub fn new_generation(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    /// `floor(zobrist * len / 2^64)`, the usual high-bits mix: multiplying a
    /// 64-bit key by the table length and keeping the top word spreads keys
    /// evenly without a division per probe.
    #[inline]
    fn index(&self, key: u64) -> usize {
        (((key as u128) * (self.entries.len() as u128)) >> 64) as usize
    }

    pub fn probe(&self, key: u64, alpha: i32, beta: i32, depth: u8, ply: u16) -> ProbeResult {
        let entry = &self.entries[self.index(key)];
        if entry.key != key || entry.depth < depth {
            return ProbeResult::Miss;
        }
        let score = from_tt_score(entry.score, ply);
        match entry.bound {
            BoundType::Exact => ProbeResult::Hit {
                score,
                bound: BoundType::Exact,
                depth: entry.depth,
            },
            BoundType::LowerBound if score >= beta => ProbeResult::Hit {
                score,
                bound: BoundType::LowerBound,
                depth: entry.depth,
            },
            BoundType::UpperBound if score <= alpha => ProbeResult::Hit {
                score,
                bound: BoundType::UpperBound,
                depth: entry.depth,
            },
            _ => ProbeResult::Miss,
        }
    }

    /// Looks up a best/refutation move to try first, independent of whether
    /// the stored score is itself usable at this depth/window.
    pub fn best_move(&self, key: u64) -> Option<Move> {
        let entry = &self.entries[self.index(key)];
        if entry.key == key && !entry.best_move.is_null() {
            Some(entry.best_move)
        } else {
            None
        }
    }

    pub fn static_eval(&self, key: u64) -> Option<i32> {
        let entry = &self.entries[self.index(key)];
        (entry.key == key).then_some(entry.static_eval)
    }

    pub fn store(
        &mut self,
        key: u64,
        depth: u8,
        score: i32,
        static_eval: i32,
        bound: BoundType,
        best_move: Move,
        ply: u16,
    ) {
        let idx = self.index(key);
        let generation = self.generation.load(Ordering::Relaxed);
        let slot = &mut self.entries[idx];
        if slot.key == key && slot.depth > depth && slot.generation == generation {
            return;
        }
        *slot = TTEntry {
            key,
            depth,
            score: to_tt_score(score, ply),
            static_eval,
            bound,
            best_move,
            generation,
        };
    }

    pub fn hashfull_per_mille(&self) -> u32 {
        let generation = self.generation.load(Ordering::Relaxed);
        let sample = self.entries.len().min(4000);
        if sample == 0 {
            return 0;
        }
        let filled = self.entries[..sample]
            .iter()
            .filter(|e| e.key != 0 && e.generation == generation)
            .count();
        ((filled as u64 * 1000) / sample as u64) as u32
    }

    pub fn clear(&mut self) {
        for entry in &mut self.entries {
            *entry = TTEntry::empty();
        }
    }
}

/// Converts a mate score found at `ply` plies from the search root into the
/// ply-independent form stored in the table (distance from *this* node).
fn to_tt_score(score: i32, ply: u16) -> i32 {
    if score > MATE_THRESHOLD {
        score + ply as i32
    } else if score < -MATE_THRESHOLD {
        score - ply as i32
    } else {
        score
    }
}

/// Inverse of [`to_tt_score`]: re-expresses a stored mate score relative to
/// the probing node's ply.
fn from_tt_score(score: i32, ply: u16) -> i32 {
    if score > MATE_THRESHOLD {
        score - ply as i32
    } else if score < -MATE_THRESHOLD {
        score + ply as i32
    } else {
        score
    }
}
