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
use crate::board::pieces::{Color, Piece};
use crate::board::Board;
use crate::general::squares::{Offset, Point};

/// Purely geometric move patterns. A behaviour only knows the board size, never which squares are occupied;
/// interpreting blockers is the job of the [`AttackMode`](crate::rules::AttackMode).
#[derive(Debug, Clone)]
pub enum Behaviour {
    /// Every offset is tried once. Leaping pieces like the horsey use this.
    /// `relative` offsets are given from white's point of view and flipped for black.
    Step { offsets: &'static [Offset], relative: bool },
    /// Every direction is repeated until the edge of the board.
    Slide(&'static [Offset]),
    /// Pawn pushes. The distance depends on the piece type and whether the piece has moved before.
    Forward,
}

impl Behaviour {
    /// Each ray is ordered from the origin outwards, so that a blocker hides all squares after it.
    /// Steps produce one ray per offset.
    pub fn rays(&self, board: &Board, from: Point, piece: Piece, side: Color) -> Vec<Vec<Point>> {
        match self {
            Behaviour::Step { offsets, relative } => offsets
                .iter()
                .map(|&offset| if *relative && side == Color::Black { offset.flip_vertical() } else { offset })
                .map(|offset| from + offset)
                .filter(|&to| board.in_bounds(to))
                .map(|to| vec![to])
                .collect(),
            Behaviour::Slide(directions) => directions
                .iter()
                .map(|&dir| {
                    (1..)
                        .map(|dist| from + dir.scaled(dist))
                        .take_while(|&to| board.in_bounds(to))
                        .collect::<Vec<_>>()
                })
                .filter(|ray| !ray.is_empty())
                .collect(),
            Behaviour::Forward => {
                let max = if piece.times_moved == 0 { piece.piece_type.first_move_distance() } else { 1 };
                let dir = Offset::new(0, side.forward());
                let ray: Vec<Point> =
                    (1..=max).map(|dist| from + dir.scaled(dist)).take_while(|&to| board.in_bounds(to)).collect();
                if ray.is_empty() {
                    vec![]
                } else {
                    vec![ray]
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::pieces::PieceType::{Pawn, Queen, UnderagePawn};
    use crate::general::squares::{DIAGONAL, KNIGHT, ORTHOGONAL};

    fn sq(s: &str) -> Point {
        s.parse().unwrap()
    }

    #[test]
    fn slide_test() {
        let board = Board::empty_default_size();
        let queen = Piece::of(Queen, Color::White);
        let rays = Behaviour::Slide(&ORTHOGONAL).rays(&board, sq("a1"), queen, Color::White);
        assert_eq!(rays.len(), 2);
        assert!(rays.iter().all(|r| r.len() == 9));
        assert_eq!(rays[0][0], sq("a2"));
        let rays = Behaviour::Slide(&DIAGONAL).rays(&board, sq("e5"), queen, Color::White);
        assert_eq!(rays.iter().map(Vec::len).sum::<usize>(), 4 + 4 + 4 + 5);
    }

    #[test]
    fn step_test() {
        let board = Board::empty_default_size();
        let piece = Piece::of(Queen, Color::Black);
        let rays = Behaviour::Step { offsets: &KNIGHT, relative: false }.rays(&board, sq("a1"), piece, Color::Black);
        assert_eq!(rays.len(), 2);
        const FORWARD_RIGHT: [Offset; 1] = [Offset::new(1, 1)];
        let rays =
            Behaviour::Step { offsets: &FORWARD_RIGHT, relative: true }.rays(&board, sq("c5"), piece, Color::Black);
        assert_eq!(rays, vec![vec![sq("d4")]]);
    }

    #[test]
    fn forward_test() {
        let board = Board::empty_default_size();
        let pawn = Piece::of(Pawn, Color::Black);
        let rays = Behaviour::Forward.rays(&board, sq("b9"), pawn, Color::Black);
        assert_eq!(rays, vec![vec![sq("b8"), sq("b7"), sq("b6")]]);
        let rays = Behaviour::Forward.rays(&board, sq("b2"), pawn, Color::Black);
        assert_eq!(rays, vec![vec![sq("b1")]]);
        let underage = Piece::of(UnderagePawn, Color::White).moved(2);
        assert!(Behaviour::Forward.rays(&board, sq("h10"), underage, Color::White).is_empty());
    }
}
