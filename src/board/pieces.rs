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
use std::ops::Not;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::board::pieces::PieceType::*;

/// One of the two players. Neutral pieces don't belong to a player, see [`PieceColor`].
#[derive(
    Debug, Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, EnumIter, derive_more::Display, Serialize, Deserialize,
)]
#[must_use]
pub enum Color {
    #[default]
    White,
    Black,
}

impl Color {
    pub fn other(self) -> Self {
        !self
    }

    pub fn idx(self) -> usize {
        self as usize
    }

    /// The direction in which this player's pawns advance.
    pub fn forward(self) -> i32 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }

    /// The rank where this player's pieces start, which is the edge opposite the enemy.
    pub fn home_rank(self, height: i32) -> i32 {
        match self {
            Color::White => 0,
            Color::Black => height - 1,
        }
    }

    /// The rank on which this player's pawns promote.
    pub fn far_rank(self, height: i32) -> i32 {
        self.other().home_rank(height)
    }
}

impl Not for Color {
    type Output = Color;

    fn not(self) -> Self::Output {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, EnumIter, derive_more::Display, Serialize, Deserialize)]
#[must_use]
pub enum PieceColor {
    White,
    Black,
    Neutral,
}

impl PieceColor {
    pub fn player(self) -> Option<Color> {
        match self {
            PieceColor::White => Some(Color::White),
            PieceColor::Black => Some(Color::Black),
            PieceColor::Neutral => None,
        }
    }
}

impl From<Color> for PieceColor {
    fn from(value: Color) -> Self {
        match value {
            Color::White => PieceColor::White,
            Color::Black => PieceColor::Black,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, EnumIter, strum_macros::Display, Serialize, Deserialize)]
#[must_use]
pub enum PieceType {
    King,
    Queen,
    Rook,
    Bishop,
    Horsey,
    Knook,
    Checker,
    Pawn,
    UnderagePawn,
    ChildPawn,
    TraitorRook,
}

/// Pieces a pawn-type piece can turn into on the far rank, in the order the moves are generated.
pub const PROMOTABLE_PIECES: [PieceType; 5] = [Queen, Rook, Bishop, Horsey, Knook];

/// The pieces a decaying queen leaves behind.
pub const DECAY_SPAWNS: [PieceType; 3] = [Rook, Bishop, Horsey];

impl PieceType {
    /// The uppercase letter used in FENs and SAN.
    pub fn to_char(self) -> char {
        match self {
            King => 'K',
            Queen => 'Q',
            Rook => 'R',
            Bishop => 'B',
            Horsey => 'H',
            Knook => 'N',
            Checker => 'C',
            Pawn => 'P',
            UnderagePawn => 'U',
            ChildPawn => 'I',
            TraitorRook => 'T',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        let upper = c.to_ascii_uppercase();
        PieceType::iter().find(|p| p.to_char() == upper)
    }

    /// Pawn moves reset the fifty move counter, can be captured en passant and promote.
    pub fn is_pawn_type(self) -> bool {
        matches!(self, Pawn | UnderagePawn | ChildPawn)
    }

    /// Neutral pieces never belong to a player. Their controller is decided anew every ply.
    pub fn is_neutral(self) -> bool {
        self == TraitorRook
    }

    /// How far a pawn-type can advance on its first move.
    pub fn first_move_distance(self) -> i32 {
        match self {
            Pawn => 3,
            UnderagePawn => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[must_use]
pub struct Piece {
    pub piece_type: PieceType,
    pub color: PieceColor,
    pub times_moved: u32,
}

impl Piece {
    pub fn new(piece_type: PieceType, color: PieceColor) -> Self {
        Self { piece_type, color, times_moved: 0 }
    }

    pub fn of(piece_type: PieceType, color: Color) -> Self {
        Self::new(piece_type, color.into())
    }

    pub fn neutral(piece_type: PieceType) -> Self {
        Self::new(piece_type, PieceColor::Neutral)
    }

    pub fn moved(mut self, times: u32) -> Self {
        self.times_moved = times;
        self
    }

    pub fn is_color(&self, color: Color) -> bool {
        self.color == color.into()
    }

    pub fn is_neutral(&self) -> bool {
        self.color == PieceColor::Neutral
    }

    /// White pieces are uppercase, black pieces lowercase, neutral pieces use the uppercase letter.
    pub fn to_char(&self) -> char {
        let c = self.piece_type.to_char();
        match self.color {
            PieceColor::Black => c.to_ascii_lowercase(),
            PieceColor::White | PieceColor::Neutral => c,
        }
    }

    /// Inverse of [`Self::to_char`]. Neutral piece types are always neutral, no matter the case.
    pub fn from_char(c: char) -> Option<Self> {
        let piece_type = PieceType::from_char(c)?;
        let color = if piece_type.is_neutral() {
            PieceColor::Neutral
        } else if c.is_ascii_uppercase() {
            PieceColor::White
        } else {
            PieceColor::Black
        };
        Some(Self::new(piece_type, color))
    }
}

impl Display for Piece {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{0} {1}", self.color, self.piece_type)
    }
}
