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
use std::collections::HashMap;

use log::warn;

use crate::board::pieces::{Color, PieceType};
use crate::board::Board;
use crate::general::squares::Point;
use crate::moves::{ForcedPriority, Move, MoveKey, MovePath};
use crate::rules::piece_moves;

/// All legal moves of one side in one position. There is no check in this game, so a move is legal
/// as soon as some rule generates it and the forced move filter keeps it.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct LegalMoveSet {
    color: Color,
    moves: Vec<Move>,
    by_key: HashMap<MoveKey, usize>,
    has_forced_moves: bool,
    dropped_duplicates: usize,
}

impl LegalMoveSet {
    /// Applies the forced move filter to all generated moves and deduplicates them by key.
    /// If two rules produce a move with the same key, the first one wins and the other one is logged and dropped.
    pub fn from_candidates(color: Color, candidates: Vec<Move>) -> Self {
        let max_priority = candidates.iter().map(|m| m.forced_priority).max().unwrap_or_default();
        let has_forced_moves = max_priority > ForcedPriority::None;
        let mut res = Self { color, has_forced_moves, ..Self::default() };
        for mov in candidates.into_iter().filter(|m| m.forced_priority == max_priority) {
            let key = mov.key();
            if let Some(&existing) = res.by_key.get(&key) {
                warn!(
                    "Dropping duplicate move {key} for {color}: kept {0:?}, dropped {1:?}",
                    res.moves[existing], mov
                );
                res.dropped_duplicates += 1;
                continue;
            }
            _ = res.by_key.insert(key, res.moves.len());
            res.moves.push(mov);
        }
        res
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn has_forced_moves(&self) -> bool {
        self.has_forced_moves
    }

    /// How many generated moves were dropped because another rule produced the same key.
    /// This should always be zero, anything else points to a bug in the rule configuration.
    pub fn dropped_duplicates(&self) -> usize {
        self.dropped_duplicates
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Move> {
        self.moves.iter()
    }

    pub fn get(&self, key: &MoveKey) -> Option<&Move> {
        self.by_key.get(key).map(|&idx| &self.moves[idx])
    }

    /// Looks up the move a player means. An exact key wins; without a promotion piece the first move between the
    /// two squares is used, which promotes to a queen for pawns. Moves can also be selected by one of their
    /// trigger squares, which is how castling is entered by clicking on the rook.
    pub fn find(&self, from: Point, to: Point, promotes_to: Option<PieceType>) -> Option<&Move> {
        if let Some(mov) = self.get(&MoveKey { from, to, promotes_to }) {
            return Some(mov);
        }
        if promotes_to.is_none() {
            if let Some(mov) = self.moves.iter().find(|m| m.from == from && m.to == to) {
                return Some(mov);
            }
        }
        self.moves
            .iter()
            .find(|m| m.from == from && m.promotes_to == promotes_to && m.trigger_squares.contains(&to))
    }

    /// All moves of the piece on `from`.
    pub fn moves_from(&self, from: Point) -> impl Iterator<Item = &Move> {
        self.moves.iter().filter(move |m| m.from == from)
    }

    /// The compact form sent to clients.
    pub fn paths(&self) -> Vec<MovePath> {
        self.moves.iter().map(MovePath::from).collect()
    }
}

/// Generates all legal moves of `side`, including moves of neutral pieces the side controls.
pub fn calculate_legal_moves(board: &Board, side: Color) -> LegalMoveSet {
    let candidates = board
        .pieces()
        .filter(|(_, piece)| piece.is_neutral() || piece.is_color(side))
        .flat_map(|(square, _)| piece_moves(board, square, side))
        .collect();
    LegalMoveSet::from_candidates(side, candidates)
}
