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
use serde::{Deserialize, Serialize};

use crate::board::pieces::{Color, PieceType};
use crate::board::Board;
use crate::error::GameError;
use crate::general::squares::Point;
use crate::legal_moves::{calculate_legal_moves, LegalMoveSet};
use crate::moves::Move;
use crate::notation::{format_san, Fen};

/// A move that has been played, together with its notation.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PlayedMove {
    pub mov: Move,
    pub san: String,
    pub mover: Color,
    /// The position after the move
    pub fen: Fen,
}

/// The rules state of one match: the board, whose turn it is, and the cached legal moves of that side.
#[derive(Debug, Clone)]
#[must_use]
pub struct GameCore {
    board: Board,
    side_to_move: Color,
    fen: Fen,
    legal_moves: LegalMoveSet,
}

impl Default for GameCore {
    fn default() -> Self {
        Self::from_board(Board::startpos(), Color::White)
    }
}

impl GameCore {
    pub fn from_board(board: Board, side_to_move: Color) -> Self {
        let fen = board.as_fen();
        let legal_moves = calculate_legal_moves(&board, side_to_move);
        Self { board, side_to_move, fen, legal_moves }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    pub fn fen(&self) -> &Fen {
        &self.fen
    }

    pub fn legal_moves(&self) -> &LegalMoveSet {
        &self.legal_moves
    }

    /// Plays the legal move from `from` to `to` and recomputes everything for the opponent.
    /// Leaves the core unchanged if there is no such move.
    pub fn make_move(
        &mut self,
        from: Point,
        to: Point,
        promotes_to: Option<PieceType>,
    ) -> Result<PlayedMove, GameError> {
        let mov = self.legal_moves.find(from, to, promotes_to).ok_or(GameError::MoveInvalid { from, to })?.clone();
        let mover = self.side_to_move;
        let san = format_san(&mov, &self.legal_moves, mover);
        self.board.play(&mov);
        self.side_to_move = mover.other();
        self.fen = self.board.as_fen();
        self.legal_moves = calculate_legal_moves(&self.board, self.side_to_move);
        Ok(PlayedMove { mov, san, mover, fen: self.fen.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::pieces::Piece;
    use crate::board::pieces::PieceType::{King, Rook};
    use crate::board::START_FEN;

    fn sq(s: &str) -> Point {
        s.parse().unwrap()
    }

    #[test]
    fn make_move_test() {
        let mut core = GameCore::default();
        assert_eq!(core.fen(), START_FEN);
        let played = core.make_move(sq("b1"), sq("c3"), None).unwrap();
        assert_eq!(played.san, "Hc3");
        assert_eq!(played.mover, Color::White);
        assert_eq!(core.side_to_move(), Color::Black);
        assert_eq!(core.legal_moves().color(), Color::Black);
        assert_eq!(&played.fen, core.fen());
        assert_eq!(core.board().piece_on(sq("c3")).unwrap().times_moved, 1);
        assert_eq!(core.board().last_move(), Some(&played.mov));
    }

    #[test]
    fn illegal_move_is_a_no_op_test() {
        let mut core = GameCore::default();
        let before = core.fen().clone();
        assert_eq!(core.make_move(sq("b1"), sq("b3"), None), Err(GameError::MoveInvalid { from: sq("b1"), to: sq("b3") }));
        // black pieces can't be moved by white
        assert!(core.make_move(sq("b10"), sq("c8"), None).is_err());
        assert_eq!(core.fen(), &before);
        assert_eq!(core.side_to_move(), Color::White);
    }

    #[test]
    fn king_capture_test() {
        let mut board = Board::empty_default_size();
        board.place(sq("a1"), Piece::of(Rook, Color::White));
        board.place(sq("a9"), Piece::of(King, Color::Black));
        let mut core = GameCore::from_board(board, Color::White);
        let played = core.make_move(sq("a1"), sq("a9"), None).unwrap();
        assert!(played.mov.captures_king_of(Color::Black));
        assert_eq!(played.san, "Rxa9#");
    }
}
