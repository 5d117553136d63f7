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

use serde::{Deserialize, Serialize};

use crate::board::pieces::{Color, Piece, PieceColor, PieceType};
use crate::general::squares::Point;

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[must_use]
pub enum SpecialMoveType {
    #[default]
    None,
    KingsideCastle,
    QueensideCastle,
    EnPassant,
    IlVaticano,
    RadioactiveDecay,
}

/// If any legal move of a side has a higher priority than `None`, only moves with the highest
/// priority present are legal in that ply.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[must_use]
pub enum ForcedPriority {
    #[default]
    None,
    ChildPawn,
    UnderagePawn,
    EnPassant,
}

/// A piece together with the square it occupies, used both for captures and for spawned pieces.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PieceOnSquare {
    pub piece: Piece,
    pub position: Point,
}

/// A secondary relocation that happens together with the move, like the rook when castling.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct MoveSideEffect {
    pub from: Point,
    pub to: Point,
    pub piece: Piece,
}

/// Moves can have the same source and destination but different promotions, so all three together identify a move.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct MoveKey {
    pub from: Point,
    pub to: Point,
    pub promotes_to: Option<PieceType>,
}

impl Display for MoveKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{0}{1}", self.from, self.to)?;
        if let Some(piece) = self.promotes_to {
            write!(f, "{}", piece.to_char().to_ascii_lowercase())?;
        }
        Ok(())
    }
}

/// A fully resolved move. Everything that happens to the board is spelled out, so applying a move doesn't
/// need to look at the rules again.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct Move {
    pub from: Point,
    pub to: Point,
    /// The moving piece as it was before the move
    pub piece: Piece,
    pub captures: Vec<PieceOnSquare>,
    /// Squares whose occupancy enabled this move. Only used for notation and input, never re-validated.
    pub trigger_squares: Vec<Point>,
    pub side_effects: Vec<MoveSideEffect>,
    pub piece_spawns: Vec<PieceOnSquare>,
    pub intermediate_squares: Vec<Point>,
    pub promotes_to: Option<PieceType>,
    pub special_move_type: SpecialMoveType,
    pub forced_priority: ForcedPriority,
}

impl Move {
    pub fn new(from: Point, to: Point, piece: Piece) -> Self {
        Self {
            from,
            to,
            piece,
            captures: vec![],
            trigger_squares: vec![],
            side_effects: vec![],
            piece_spawns: vec![],
            intermediate_squares: vec![],
            promotes_to: None,
            special_move_type: SpecialMoveType::None,
            forced_priority: ForcedPriority::None,
        }
    }

    pub fn capturing(mut self, piece: Piece, position: Point) -> Self {
        self.captures.push(PieceOnSquare { piece, position });
        self
    }

    pub fn with_special(mut self, special: SpecialMoveType) -> Self {
        self.special_move_type = special;
        self
    }

    pub fn key(&self) -> MoveKey {
        MoveKey { from: self.from, to: self.to, promotes_to: self.promotes_to }
    }

    pub fn is_capture(&self) -> bool {
        !self.captures.is_empty()
    }

    pub fn captures_square(&self, square: Point) -> bool {
        self.captures.iter().any(|c| c.position == square)
    }

    /// Captures of pieces that the moving side doesn't own. Castling can capture an own bishop and decay
    /// removes the moving piece itself; neither of these counts.
    pub fn enemy_captures(&self, mover: Color) -> impl Iterator<Item = &PieceOnSquare> + '_ {
        let own = PieceColor::from(mover);
        self.captures.iter().filter(move |c| c.piece.color != own)
    }

    /// The game ends as soon as a king is captured; there is no check or checkmate.
    pub fn captures_king_of(&self, color: Color) -> bool {
        self.captures.iter().any(|c| c.piece.piece_type == PieceType::King && c.piece.is_color(color))
    }

    /// A move that resets the fifty move counter.
    pub fn is_progress(&self) -> bool {
        self.piece.piece_type.is_pawn_type() || self.is_capture()
    }
}

impl Display for Move {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Compact, serializable description of a move that clients use to draw and select moves.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct MovePath {
    pub from: Point,
    pub to: Point,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub via: Vec<Point>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub captures: Vec<Point>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotes_to: Option<PieceType>,
}

impl From<&Move> for MovePath {
    fn from(mov: &Move) -> Self {
        Self {
            from: mov.from,
            to: mov.to,
            via: mov.intermediate_squares.clone(),
            captures: mov.captures.iter().map(|c| c.position).collect(),
            triggers: mov.trigger_squares.clone(),
            promotes_to: mov.promotes_to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::pieces::PieceType::{Bishop, King, Pawn, Queen, Rook};

    fn sq(s: &str) -> Point {
        s.parse().unwrap()
    }

    #[test]
    fn priority_order_test() {
        assert!(ForcedPriority::None < ForcedPriority::ChildPawn);
        assert!(ForcedPriority::ChildPawn < ForcedPriority::UnderagePawn);
        assert!(ForcedPriority::UnderagePawn < ForcedPriority::EnPassant);
        assert_eq!(ForcedPriority::default(), ForcedPriority::None);
    }

    #[test]
    fn captures_test() {
        let rook = Piece::of(Rook, Color::White);
        let mov = Move::new(sq("a1"), sq("a5"), rook)
            .capturing(Piece::of(Pawn, Color::Black), sq("a5"))
            .capturing(Piece::of(King, Color::Black), sq("b5"));
        assert!(mov.is_capture());
        assert!(mov.is_progress());
        assert!(mov.captures_square(sq("b5")));
        assert!(mov.captures_king_of(Color::Black));
        assert!(!mov.captures_king_of(Color::White));
        assert_eq!(mov.enemy_captures(Color::White).count(), 2);

        let castle = Move::new(sq("f1"), sq("h1"), Piece::of(King, Color::White))
            .capturing(Piece::of(Bishop, Color::White), sq("g1"))
            .with_special(SpecialMoveType::KingsideCastle);
        assert_eq!(castle.enemy_captures(Color::White).count(), 0);
        assert!(!Move::new(sq("e1"), sq("e4"), Piece::of(Queen, Color::White)).is_progress());
    }

    #[test]
    fn path_test() {
        let mut mov = Move::new(sq("e3"), sq("e7"), Piece::of(Pawn, Color::White));
        mov.intermediate_squares.push(sq("c5"));
        mov.promotes_to = Some(Queen);
        let path = MovePath::from(&mov);
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, r#"{"from":"e3","to":"e7","via":["c5"],"promotes_to":"Queen"}"#);
        assert_eq!(mov.key().to_string(), "e3e7q");
    }
}
