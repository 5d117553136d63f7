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
use crate::board::pieces::Color::{Black, White};
use crate::board::pieces::Piece;
use crate::board::pieces::PieceType::{King, Pawn, Rook, UnderagePawn};
use crate::board::Board;
use crate::draw::{AutoDrawReason, AutoDrawState};
use crate::error::GameError;
use crate::game::GameCore;
use crate::general::squares::Point;
use crate::moves::ForcedPriority;

fn sq(s: &str) -> Point {
    s.parse().unwrap()
}

#[test]
fn fifty_move_rule_test() {
    let mut board = Board::empty_default_size();
    board.place(sq("a1"), Piece::of(King, White));
    board.place(sq("a10"), Piece::of(King, Black));
    board.place(sq("a3"), Piece::of(Rook, White));
    board.place(sq("a8"), Piece::of(Rook, Black));
    let mut core = GameCore::from_board(board, White);
    let mut draws = AutoDrawState::new(core.fen());
    // the rooks circle on their ranks with different periods, so no position occurs three times
    let white_squares = (0..10).map(|x| Point::new(x, 2)).collect::<Vec<_>>();
    let black_squares = (0..9).map(|x| Point::new(x, 7)).collect::<Vec<_>>();
    let (mut w, mut b) = (0, 0);
    for ply in 1..=100 {
        let (from, to) = if ply % 2 == 1 {
            let from = white_squares[w];
            w = (w + 1) % white_squares.len();
            (from, white_squares[w])
        } else {
            let from = black_squares[b];
            b = (b + 1) % black_squares.len();
            (from, black_squares[b])
        };
        let played = core.make_move(from, to, None).unwrap();
        let draw = draws.evaluate(&played.mov, &played.fen);
        if ply < 100 {
            assert_eq!(draw, None, "ply {ply}");
        } else {
            assert_eq!(draw, Some(AutoDrawReason::FiftyMoves));
        }
    }
    assert_eq!(draws.halfmove_clock(), 100);
}

#[test]
fn forced_capture_test() {
    let mut board = Board::empty_default_size();
    board.place(sq("a1"), Piece::of(King, White));
    board.place(sq("j10"), Piece::of(King, Black));
    board.place(sq("h1"), Piece::of(Rook, White));
    board.place(sq("e4"), Piece::of(Pawn, White).moved(1));
    board.place(sq("d5"), Piece::of(UnderagePawn, Black).moved(1));
    let mut core = GameCore::from_board(board, White);
    let legal = core.legal_moves();
    assert!(legal.has_forced_moves());
    assert_eq!(legal.len(), 1);
    assert_eq!(legal.iter().next().unwrap().forced_priority, ForcedPriority::UnderagePawn);
    assert_eq!(core.make_move(sq("h1"), sq("h5"), None), Err(GameError::MoveInvalid { from: sq("h1"), to: sq("h5") }));
    let played = core.make_move(sq("e4"), sq("d5"), None).unwrap();
    assert_eq!(played.san, "exd5");
    assert!(!core.legal_moves().has_forced_moves());
}

#[test]
fn fen_follows_the_game_test() {
    let mut core = GameCore::default();
    for (from, to) in [("b1", "c3"), ("e9", "e7"), ("d2", "d4")] {
        let played = core.make_move(sq(from), sq(to), None).unwrap();
        let parsed = Board::from_fen(&played.fen).unwrap();
        assert_eq!(parsed.as_fen(), played.fen);
        assert_eq!(core.board().pieces().count(), parsed.pieces().count());
    }
    assert_eq!(core.side_to_move(), Black);
}
