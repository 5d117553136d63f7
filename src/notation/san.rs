/*
 *  Levers, a rules engine and match server for a chess variant.
 *  Copyright (C) 2024 ToTheAnd
 *
 *  Levers is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  Levers is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with Levers. If not, see <https://www.gnu.org/licenses/>.
 */
use std::fmt;
use std::fmt::Write;

use itertools::Itertools;

use crate::board::pieces::Color;
use crate::general::squares::{file_to_char, Point};
use crate::legal_moves::LegalMoveSet;
use crate::moves::{Move, SpecialMoveType};

/// Formats `mov` in the algebraic notation of this variant. `legal` must be the set `mov` was taken from,
/// it's used to find the moves that need disambiguation. `side` is the side that plays the move.
pub fn format_san(mov: &Move, legal: &LegalMoveSet, side: Color) -> String {
    let mut res = String::new();
    // writing to a String can't fail
    _ = write_san(&mut res, mov, legal, side);
    res
}

fn write_san(f: &mut impl Write, mov: &Move, legal: &LegalMoveSet, side: Color) -> fmt::Result {
    match mov.special_move_type {
        SpecialMoveType::IlVaticano => return write!(f, "B-O-O-B"),
        SpecialMoveType::KingsideCastle | SpecialMoveType::QueensideCastle => {
            let name = if mov.special_move_type == SpecialMoveType::KingsideCastle { "O-O" } else { "O-O-O" };
            write!(f, "{name}")?;
            for capture in &mov.captures {
                write!(f, "x{}", capture.position)?;
            }
            return Ok(());
        }
        _ => {}
    }
    let piece = mov.piece.piece_type;
    if !piece.is_pawn_type() {
        write!(f, "{}", piece.to_char())?;
    }
    let origins = legal
        .iter()
        .filter(|m| m.piece.piece_type == piece && m.to == mov.to)
        .map(|m| m.from)
        .unique()
        .collect_vec();
    if piece.is_pawn_type() && mov.is_capture() {
        write!(f, "{}", file_to_char(mov.from.file()))?;
    } else {
        write_origin(f, mov.from, &origins)?;
    }

    if mov.captures_square(mov.to) {
        write!(f, "x")?;
    }
    write!(f, "{}", mov.to)?;
    for capture in mov.captures.iter().filter(|c| c.position != mov.to) {
        write!(f, "x{}", capture.position)?;
    }
    for square in &mov.intermediate_squares {
        write!(f, "~{square}")?;
    }
    if let Some(promo) = mov.promotes_to {
        write!(f, "={}", promo.to_char())?;
    }
    if mov.captures_king_of(side.other()) {
        write!(f, "#")?;
    }
    Ok(())
}

/// The source file if that is unique among the pieces that can reach the same square, else the rank, else the square.
fn write_origin(f: &mut impl Write, from: Point, origins: &[Point]) -> fmt::Result {
    if origins.len() <= 1 {
        return Ok(());
    }
    if origins.iter().filter(|s| s.file() == from.file()).count() <= 1 {
        write!(f, "{}", file_to_char(from.file()))
    } else if origins.iter().filter(|s| s.rank() == from.rank()).count() <= 1 {
        write!(f, "{}", from.rank() + 1)
    } else {
        write!(f, "{from}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::pieces::Color::{Black, White};
    use crate::board::pieces::Piece;
    use crate::board::pieces::PieceType::*;
    use crate::board::Board;
    use crate::legal_moves::calculate_legal_moves;

    fn sq(s: &str) -> Point {
        s.parse().unwrap()
    }

    fn san_of(board: &Board, side: Color, from: &str, to: &str) -> String {
        let legal = calculate_legal_moves(board, side);
        let mov = legal.find(sq(from), sq(to), None).unwrap();
        format_san(mov, &legal, side)
    }

    #[test]
    fn simple_moves_test() {
        let board = Board::startpos();
        assert_eq!(san_of(&board, White, "b1", "c3"), "Hc3");
        assert_eq!(san_of(&board, White, "e2", "e4"), "e4");
        assert_eq!(san_of(&board, Black, "e5", "e7"), "Te7");
    }

    #[test]
    fn capture_order_test() {
        let rook = Piece::of(Rook, White);
        let legal = LegalMoveSet::default();
        let side_captures = Move::new(sq("a1"), sq("a5"), rook)
            .capturing(Piece::of(Pawn, Black), sq("b5"))
            .capturing(Piece::of(Horsey, Black), sq("c5"));
        assert_eq!(format_san(&side_captures, &legal, White), "Ra5xb5xc5");
        let on_destination = Move::new(sq("a1"), sq("a5"), rook)
            .capturing(Piece::of(Pawn, Black), sq("a5"))
            .capturing(Piece::of(King, Black), sq("c5"));
        assert_eq!(format_san(&on_destination, &legal, White), "Rxa5xc5#");
    }

    #[test]
    fn disambiguation_test() {
        let mut board = Board::empty_default_size();
        board.place(sq("a1"), Piece::of(Rook, White));
        board.place(sq("a5"), Piece::of(Rook, White));
        board.place(sq("e3"), Piece::of(Rook, White));
        assert_eq!(san_of(&board, White, "a1", "a3"), "R1a3");
        assert_eq!(san_of(&board, White, "e3", "a3"), "Rea3");
        assert_eq!(san_of(&board, White, "a1", "b1"), "Rb1");
        board.place(sq("c1"), Piece::of(Rook, White));
        board.place(sq("c5"), Piece::of(Rook, White));
        assert_eq!(san_of(&board, White, "c1", "c3"), "R1c3");
        board.place(sq("j3"), Piece::of(Rook, White));
        board.place(sq("e3"), Piece::of(Horsey, White));
        // the horsey on e3 hides the other rooks
        assert_eq!(san_of(&board, White, "j3", "f3"), "Rf3");
    }

    #[test]
    fn special_moves_test() {
        let mut board = Board::empty_default_size();
        board.place(sq("f1"), Piece::of(King, White));
        board.place(sq("j1"), Piece::of(Rook, White));
        board.place(sq("g1"), Piece::of(Bishop, White));
        board.place(sq("a1"), Piece::of(Rook, White));
        board.place(sq("c4"), Piece::of(Bishop, White));
        board.place(sq("f4"), Piece::of(Bishop, White));
        board.place(sq("d4"), Piece::of(Pawn, Black));
        board.place(sq("e4"), Piece::of(Pawn, Black));
        let legal = calculate_legal_moves(&board, White);
        let san = |from: &str, to: &str| format_san(legal.find(sq(from), sq(to), None).unwrap(), &legal, White);
        assert_eq!(san("f1", "h1"), "O-Oxg1");
        assert_eq!(san("f1", "d1"), "O-O-O");
        assert_eq!(san("c4", "e4"), "B-O-O-B");
    }

    #[test]
    fn chains_and_promotions_test() {
        let mut board = Board::empty_default_size();
        board.place(sq("e3"), Piece::of(Checker, White));
        board.place(sq("d4"), Piece::of(Horsey, Black));
        board.place(sq("d6"), Piece::of(Horsey, Black));
        board.place(sq("h9"), Piece::of(Pawn, White).moved(5));
        let legal = calculate_legal_moves(&board, White);
        let chain = legal.find(sq("e3"), sq("e7"), None).unwrap();
        assert_eq!(format_san(chain, &legal, White), "Ce7xd4xd6~c5");
        let promo = legal.find(sq("h9"), sq("h10"), Some(Knook)).unwrap();
        assert_eq!(format_san(promo, &legal, White), "h10=N");
    }

    #[test]
    fn pawn_captures_test() {
        let mut board = Board::empty_default_size();
        board.place(sq("e4"), Piece::of(Pawn, White).moved(1));
        board.place(sq("c4"), Piece::of(Pawn, White).moved(1));
        board.place(sq("d5"), Piece::of(Rook, Black));
        assert_eq!(san_of(&board, White, "e4", "d5"), "exd5");
        assert_eq!(san_of(&board, White, "c4", "d5"), "cxd5");
        assert_eq!(san_of(&board, White, "e4", "e5"), "e5");
    }
}
