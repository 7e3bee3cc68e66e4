//! Zobrist hashing for chess positions.
//!
//! Deterministic 64-bit random numbers for piece/square/colour, castling
//! state, en-passant file and side-to-move, seeded from a compile-time
//! constant (spec.md §9: "Zobrist random table read from disk" is replaced
//! with a deterministic in-process build) so the table never touches disk.

use std::sync::LazyLock;

use rand::prelude::*;

use crate::types::{Color, Piece, Square};

const ZOBRIST_SEED: u64 = 1_234_567_890;

struct ZobristKeys {
    piece_keys: [[[u64; 64]; 6]; 2], // [color][piece][square]
    side_to_move_key: u64,
    castling_keys: [u64; 16], // indexed directly by the 4-bit castling-rights mask
    en_passant_keys: [u64; 8],
}

impl ZobristKeys {
    fn new() -> Self {
        let mut rng = StdRng::seed_from_u64(ZOBRIST_SEED);
        let mut piece_keys = [[[0u64; 64]; 6]; 2];
        for color in &mut piece_keys {
            for piece in color.iter_mut() {
                for key in piece.iter_mut() {
                    *key = rng.gen();
                }
            }
        }

        let side_to_move_key = rng.gen();

        let mut castling_keys = [0u64; 16];
        for key in &mut castling_keys {
            *key = rng.gen();
        }

        let mut en_passant_keys = [0u64; 8];
        for key in &mut en_passant_keys {
            *key = rng.gen();
        }

        ZobristKeys {
            piece_keys,
            side_to_move_key,
            castling_keys,
            en_passant_keys,
        }
    }
}

static ZOBRIST: LazyLock<ZobristKeys> = LazyLock::new(ZobristKeys::new);

#[inline]
pub fn piece_key(color: Color, piece: Piece, sq: Square) -> u64 {
    ZOBRIST.piece_keys[color.index()][piece.index()][sq.index()]
}

#[inline]
pub fn side_to_move_key() -> u64 {
    ZOBRIST.side_to_move_key
}

/// Castling rights are combined with a single XOR of the whole 4-bit mask's
/// key rather than per-bit keys, so that toggling multiple rights at once
/// (e.g. a rook capture removing one right while nothing else changes) is a
/// cheap "old mask key XOR new mask key" instead of bit-by-bit bookkeeping.
#[inline]
pub fn castling_key(rights: u8) -> u64 {
    ZOBRIST.castling_keys[(rights & 0xF) as usize]
}

#[inline]
pub fn en_passant_key(file: Option<u8>) -> u64 {
    match file {
        Some(f) => ZOBRIST.en_passant_keys[f as usize],
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Piece;

    #[test]
    fn keys_are_deterministic_across_calls() {
        let a = piece_key(Color::White, Piece::Pawn, Square(12));
        let b = piece_key(Color::White, Piece::Pawn, Square(12));
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_squares_get_distinct_keys() {
        let a = piece_key(Color::White, Piece::Pawn, Square(12));
        let b = piece_key(Color::White, Piece::Pawn, Square(13));
        assert_ne!(a, b);
    }

    #[test]
    fn castling_mask_zero_has_zero_key_sentinel_differs_from_nonzero() {
        let empty = castling_key(0);
        let full = castling_key(0b1111);
        assert_ne!(empty, full);
    }
}
