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
use std::fmt::{Display, Formatter};

use anyhow::ensure;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::board::pieces::PieceType::*;
use crate::board::pieces::{Color, Piece, PieceType};
use crate::general::common::Res;
use crate::general::squares::{file_to_char, DimT, Point};
use crate::moves::{Move, SpecialMoveType};

pub mod pieces;

pub const DEFAULT_WIDTH: DimT = 10;
pub const DEFAULT_HEIGHT: DimT = 10;

pub const START_FEN: &str = "rhnqbkbnhr/cppuppuppc/10/10/5T4/4T5/10/10/CPPUPPUPPC/RHNQBKBNHR";

const BACK_RANK: [PieceType; 10] = [Rook, Horsey, Knook, Queen, Bishop, King, Bishop, Knook, Horsey, Rook];
const PAWN_RANK: [PieceType; 10] =
    [Checker, Pawn, Pawn, UnderagePawn, Pawn, Pawn, UnderagePawn, Pawn, Pawn, Checker];

/// A rectangular grid of optional pieces. Besides the placement, the board only remembers the last
/// played move, which is all that en passant needs.
///
/// The board doesn't check any rules. [`Board::play`] assumes that the move has been generated for this board.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct Board {
    width: DimT,
    height: DimT,
    squares: Vec<Option<Piece>>,
    last_move: Option<Move>,
}

impl Default for Board {
    fn default() -> Self {
        Self::startpos()
    }
}

impl Board {
    pub fn empty(width: DimT, height: DimT) -> Self {
        assert!(width > 0 && height > 0 && width <= 26, "invalid board size {width}x{height}");
        Self { width, height, squares: vec![None; (width * height) as usize], last_move: None }
    }

    pub fn empty_default_size() -> Self {
        Self::empty(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }

    pub fn startpos() -> Self {
        let mut board = Self::empty_default_size();
        for (x, (&back, &pawn)) in BACK_RANK.iter().zip(PAWN_RANK.iter()).enumerate() {
            let x = x as DimT;
            board.place(Point::new(x, 0), Piece::of(back, Color::White));
            board.place(Point::new(x, 1), Piece::of(pawn, Color::White));
            board.place(Point::new(x, DEFAULT_HEIGHT - 2), Piece::of(pawn, Color::Black));
            board.place(Point::new(x, DEFAULT_HEIGHT - 1), Piece::of(back, Color::Black));
        }
        board.place(Point::new(4, 4), Piece::neutral(TraitorRook));
        board.place(Point::new(5, 5), Piece::neutral(TraitorRook));
        board
    }

    pub fn width(&self) -> DimT {
        self.width
    }

    pub fn height(&self) -> DimT {
        self.height
    }

    pub fn in_bounds(&self, square: Point) -> bool {
        (0..self.width).contains(&square.x) && (0..self.height).contains(&square.y)
    }

    /// Boards that were deserialized can have any shape, so this must hold before they're used.
    pub fn validate(&self) -> Res<()> {
        ensure!(
            self.width > 0 && self.height > 0 && self.width <= 26,
            "Invalid board size {0}x{1}",
            self.width,
            self.height
        );
        let expected = (i64::from(self.width) * i64::from(self.height)) as usize;
        ensure!(
            self.squares.len() == expected,
            "A {0}x{1} board needs {expected} squares, but there are {2}",
            self.width,
            self.height,
            self.squares.len()
        );
        if let Some(mov) = &self.last_move {
            ensure!(
                self.in_bounds(mov.from) && self.in_bounds(mov.to),
                "The last move {0}{1} doesn't fit on the board",
                mov.from,
                mov.to
            );
        }
        Ok(())
    }

    fn idx(&self, square: Point) -> usize {
        debug_assert!(self.in_bounds(square), "{square} is out of bounds");
        (square.y * self.width + square.x) as usize
    }

    /// Returns `None` for empty squares and for squares outside the board.
    pub fn piece_on(&self, square: Point) -> Option<Piece> {
        if self.in_bounds(square) {
            self.squares[self.idx(square)]
        } else {
            None
        }
    }

    pub fn is_empty(&self, square: Point) -> bool {
        self.in_bounds(square) && self.squares[self.idx(square)].is_none()
    }

    pub fn place(&mut self, square: Point, piece: Piece) {
        let idx = self.idx(square);
        self.squares[idx] = Some(piece);
    }

    pub fn remove(&mut self, square: Point) -> Option<Piece> {
        if !self.in_bounds(square) {
            return None;
        }
        let idx = self.idx(square);
        self.squares[idx].take()
    }

    pub fn last_move(&self) -> Option<&Move> {
        self.last_move.as_ref()
    }

    /// Only used when restoring a board, [`Self::play`] sets this automatically.
    pub fn set_last_move(&mut self, mov: Option<Move>) {
        self.last_move = mov;
    }

    /// All squares in row-major order, starting at `a1`.
    pub fn squares(&self) -> impl Iterator<Item = Point> + '_ {
        (0..self.height).cartesian_product(0..self.width).map(|(y, x)| Point::new(x, y))
    }

    pub fn pieces(&self) -> impl Iterator<Item = (Point, Piece)> + '_ {
        self.squares().filter_map(|sq| self.piece_on(sq).map(|p| (sq, p)))
    }

    pub fn rank_is_empty_except(&self, rank: DimT, except: Point) -> bool {
        (0..self.width).map(|x| Point::new(x, rank)).filter(|&sq| sq != except).all(|sq| self.is_empty(sq))
    }

    pub fn find(&self, piece_type: PieceType, color: Color) -> Option<Point> {
        self.pieces().find(|(_, p)| p.piece_type == piece_type && p.is_color(color)).map(|(sq, _)| sq)
    }

    /// Applies all parts of a move at once: captures, the moving piece, side effects and spawns.
    /// Every piece that lands on a square through a move has its move counter incremented.
    pub fn play(&mut self, mov: &Move) {
        // lift every moving piece first, so that relocations can't overwrite each other
        let mover = self.remove(mov.from);
        for capture in &mov.captures {
            _ = self.remove(capture.position);
        }
        let relocated = mov.side_effects.iter().map(|effect| (effect.to, self.remove(effect.from))).collect_vec();

        if mov.special_move_type != SpecialMoveType::RadioactiveDecay {
            if let Some(mut piece) = mover {
                piece.times_moved += 1;
                if let Some(promotion) = mov.promotes_to {
                    piece.piece_type = promotion;
                }
                self.place(mov.to, piece);
            }
        }
        for (to, piece) in relocated {
            if let Some(mut piece) = piece {
                piece.times_moved += 1;
                self.place(to, piece);
            }
        }
        for spawn in &mov.piece_spawns {
            self.place(spawn.position, spawn.piece);
        }
        self.last_move = Some(mov.clone());
    }

    /// A plain text diagram with rank 10 at the top, like the FEN.
    pub fn as_diagram(&self) -> String {
        let mut res = String::new();
        for y in (0..self.height).rev() {
            res += &format!("{:>2} ", y + 1);
            for x in 0..self.width {
                let c = self.piece_on(Point::new(x, y)).map_or('.', |p| p.to_char());
                res.push(c);
                res.push(' ');
            }
            res.push('\n');
        }
        res += "   ";
        res += &(0..self.width).map(|x| file_to_char(x).to_string()).join(" ");
        res.push('\n');
        res
    }
}

impl Display for Board {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_fen())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::pieces::PieceColor;
    use crate::moves::MoveSideEffect;

    fn sq(s: &str) -> Point {
        s.parse().unwrap()
    }

    #[test]
    fn startpos_test() {
        let board = Board::startpos();
        assert_eq!(board.width(), 10);
        assert_eq!(board.height(), 10);
        assert_eq!(board.pieces().count(), 42);
        assert_eq!(board.find(King, Color::White), Some(sq("f1")));
        assert_eq!(board.find(King, Color::Black), Some(sq("f10")));
        assert_eq!(board.piece_on(sq("d2")), Some(Piece::of(UnderagePawn, Color::White)));
        assert_eq!(board.piece_on(sq("j9")), Some(Piece::of(Checker, Color::Black)));
        assert_eq!(board.piece_on(sq("e5")).unwrap().color, PieceColor::Neutral);
        assert!(board.last_move().is_none());
        assert_eq!(board.as_fen(), START_FEN);
    }

    #[test]
    fn bounds_test() {
        let board = Board::empty_default_size();
        assert!(board.in_bounds(sq("a1")));
        assert!(board.in_bounds(sq("j10")));
        assert!(!board.in_bounds(Point::new(10, 0)));
        assert!(!board.in_bounds(Point::new(0, -1)));
        assert!(!board.is_empty(Point::new(-1, 3)));
        assert!(board.piece_on(Point::new(42, 42)).is_none());
    }

    #[test]
    fn validate_test() {
        assert!(Board::startpos().validate().is_ok());
        let mut board = Board::empty_default_size();
        _ = board.squares.pop();
        assert!(board.validate().is_err());
        let board = Board { width: 0, height: 10, squares: vec![], last_move: None };
        assert!(board.validate().is_err());
        let board = Board { width: 30, height: 1, squares: vec![None; 30], last_move: None };
        assert!(board.validate().is_err());
    }

    #[test]
    fn play_castle_test() {
        let mut board = Board::empty_default_size();
        let king = Piece::of(King, Color::White);
        let rook = Piece::of(Rook, Color::White);
        let bishop = Piece::of(Bishop, Color::White);
        board.place(sq("f1"), king);
        board.place(sq("j1"), rook);
        board.place(sq("g1"), bishop);
        let mut mov = Move::new(sq("f1"), sq("h1"), king)
            .capturing(bishop, sq("g1"))
            .with_special(SpecialMoveType::KingsideCastle);
        mov.side_effects.push(MoveSideEffect { from: sq("j1"), to: sq("g1"), piece: rook });
        board.play(&mov);
        assert_eq!(board.piece_on(sq("h1")), Some(king.moved(1)));
        assert_eq!(board.piece_on(sq("g1")), Some(rook.moved(1)));
        assert!(board.is_empty(sq("f1")));
        assert!(board.is_empty(sq("j1")));
        assert_eq!(board.pieces().count(), 2);
        assert_eq!(board.last_move(), Some(&mov));
    }

    #[test]
    fn play_promotion_and_decay_test() {
        let mut board = Board::empty_default_size();
        let pawn = Piece::of(Pawn, Color::Black).moved(4);
        board.place(sq("c2"), pawn);
        let mut mov = Move::new(sq("c2"), sq("c1"), pawn);
        mov.promotes_to = Some(Knook);
        board.play(&mov);
        assert_eq!(board.piece_on(sq("c1")), Some(Piece::of(Knook, Color::Black).moved(5)));

        let queen = Piece::of(Queen, Color::White);
        board.place(sq("e6"), queen);
        let mut decay = Move::new(sq("e6"), sq("e6"), queen)
            .capturing(queen, sq("e6"))
            .with_special(SpecialMoveType::RadioactiveDecay);
        decay.piece_spawns.push(crate::moves::PieceOnSquare { piece: Piece::of(Rook, Color::White), position: sq("e1") });
        board.play(&decay);
        assert!(board.is_empty(sq("e6")));
        assert_eq!(board.piece_on(sq("e1")), Some(Piece::of(Rook, Color::White)));
    }

    #[test]
    fn diagram_test() {
        let diagram = Board::startpos().as_diagram();
        assert_eq!(diagram.lines().count(), 11);
        assert!(diagram.starts_with("10 r h n q b k b n h r"));
        assert!(diagram.trim_end().ends_with("a b c d e f g h i j"));
    }
}
