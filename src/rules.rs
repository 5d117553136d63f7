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

//! Movegen is organized as a small interpreter: every piece type is mapped to a static tree of
//! [`MovementRule`]s (see [`wiring`]). Leaves produce moves from [`Behaviour`]s and an [`AttackMode`],
//! inner nodes combine or post-process the moves of their children.

use arrayvec::ArrayVec;

use crate::board::pieces::{Color, Piece, PieceColor, PieceType};
use crate::board::Board;
use crate::general::squares::{Offset, Point, DIAGONAL, ORTHOGONAL};
use crate::moves::{ForcedPriority, Move};
use crate::rules::behaviour::Behaviour;

pub mod behaviour;
pub mod special;
pub mod wiring;

/// How a rule treats occupied squares along a ray produced by a [`Behaviour`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AttackMode {
    /// Stop on the first occupied square, which is a target only if it holds an enemy.
    All,
    /// Only squares with an enemy are targets.
    Captures,
    /// Only empty squares are targets. A slide still stops at the first blocker.
    NoCaptures,
}

impl AttackMode {
    /// The reachable squares of a single ray, together with the piece that would be captured there.
    pub fn targets(
        self,
        board: &Board,
        ray: &[Point],
        mut is_enemy: impl FnMut(Piece) -> bool,
    ) -> Vec<(Point, Option<Piece>)> {
        let mut res = vec![];
        for &square in ray {
            match board.piece_on(square) {
                None => {
                    if self != AttackMode::Captures {
                        res.push((square, None));
                    }
                }
                Some(piece) => {
                    if self != AttackMode::NoCaptures && is_enemy(piece) {
                        res.push((square, Some(piece)));
                    }
                    break;
                }
            }
        }
        res
    }
}

/// Predicate of a [`MovementRule::Forced`] decorator.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ForcedCondition {
    CapturesEnemy(PieceType),
}

impl ForcedCondition {
    pub fn holds(self, mov: &Move, side: Color) -> bool {
        match self {
            ForcedCondition::CapturesEnemy(typ) => mov.enemy_captures(side).any(|c| c.piece.piece_type == typ),
        }
    }
}

#[derive(Debug, Clone)]
pub enum MovementRule {
    Basic { behaviour: Behaviour, mode: AttackMode },
    Composite(Vec<MovementRule>),
    Castle,
    EnPassant,
    CheckerJump,
    IlVaticano,
    RadioactiveDecay { spawns: &'static [PieceType] },
    /// Expands every move of `base` that reaches the far rank into one move per piece type.
    Promotion { base: Box<MovementRule>, pieces: &'static [PieceType] },
    /// Raises the priority of the moves of `base` that satisfy `condition` to at least `priority`.
    Forced { base: Box<MovementRule>, priority: ForcedPriority, condition: ForcedCondition },
    /// Only lets the side that currently controls a neutral piece use `base`.
    NeutralControl { base: Box<MovementRule> },
}

/// Everything a rule needs to know about the piece it generates moves for.
#[derive(Debug, Copy, Clone)]
pub struct GenContext<'a> {
    pub board: &'a Board,
    pub from: Point,
    pub piece: Piece,
    /// The side whose moves are generated. For neutral pieces this is the controlling side.
    pub side: Color,
}

impl GenContext<'_> {
    /// Neutral pieces are enemies of every colored piece, but a neutral mover only captures
    /// pieces of the side that doesn't control it.
    pub fn is_enemy(&self, target: Piece) -> bool {
        match target.color.player() {
            None => !self.piece.is_neutral(),
            Some(color) => color != self.side,
        }
    }

    pub fn is_friend(&self, target: Piece) -> bool {
        target.is_color(self.side)
    }

    fn moves_from_targets(&self, targets: Vec<(Point, Option<Piece>)>, out: &mut Vec<Move>) {
        for (to, captured) in targets {
            let mov = Move::new(self.from, to, self.piece);
            out.push(match captured {
                Some(victim) => mov.capturing(victim, to),
                None => mov,
            });
        }
    }
}

/// Which sides may move a neutral piece, and whether captures are allowed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum NeutralController {
    Majority(Color),
    Tie,
}

pub fn neutral_controller(board: &Board, square: Point) -> NeutralController {
    let neighbours: ArrayVec<Point, 8> =
        ORTHOGONAL.iter().chain(DIAGONAL.iter()).map(|&d: &Offset| square + d).collect();
    let mut counts = [0; 2];
    for piece in neighbours.into_iter().filter_map(|sq| board.piece_on(sq)) {
        if let Some(color) = piece.color.player() {
            counts[color.idx()] += 1;
        }
    }
    match counts[0].cmp(&counts[1]) {
        std::cmp::Ordering::Greater => NeutralController::Majority(Color::White),
        std::cmp::Ordering::Less => NeutralController::Majority(Color::Black),
        std::cmp::Ordering::Equal => NeutralController::Tie,
    }
}

impl MovementRule {
    pub fn basic(behaviour: Behaviour, mode: AttackMode) -> Self {
        MovementRule::Basic { behaviour, mode }
    }

    pub fn promotion(self, pieces: &'static [PieceType]) -> Self {
        MovementRule::Promotion { base: Box::new(self), pieces }
    }

    pub fn forced(self, priority: ForcedPriority, condition: ForcedCondition) -> Self {
        MovementRule::Forced { base: Box::new(self), priority, condition }
    }

    pub fn neutral(self) -> Self {
        MovementRule::NeutralControl { base: Box::new(self) }
    }

    /// Appends all moves this rule produces for the piece described by `ctx` to `out`.
    pub fn generate(&self, ctx: &GenContext, out: &mut Vec<Move>) {
        match self {
            MovementRule::Basic { behaviour, mode } => {
                for ray in behaviour.rays(ctx.board, ctx.from, ctx.piece, ctx.side) {
                    let targets = mode.targets(ctx.board, &ray, |p| ctx.is_enemy(p));
                    ctx.moves_from_targets(targets, out);
                }
            }
            MovementRule::Composite(rules) => {
                for rule in rules {
                    rule.generate(ctx, out);
                }
            }
            MovementRule::Castle => special::castle(ctx, out),
            MovementRule::EnPassant => special::en_passant(ctx, out),
            MovementRule::CheckerJump => special::checker_jump(ctx, out),
            MovementRule::IlVaticano => special::il_vaticano(ctx, out),
            MovementRule::RadioactiveDecay { spawns } => special::radioactive_decay(ctx, spawns, out),
            MovementRule::Promotion { base, pieces } => {
                let far_rank = ctx.side.far_rank(ctx.board.height());
                let mut moves = vec![];
                base.generate(ctx, &mut moves);
                for mov in moves {
                    if mov.to.rank() != far_rank {
                        out.push(mov);
                        continue;
                    }
                    for &piece in pieces.iter() {
                        let mut promo = mov.clone();
                        promo.promotes_to = Some(piece);
                        out.push(promo);
                    }
                }
            }
            MovementRule::Forced { base, priority, condition } => {
                let start = out.len();
                base.generate(ctx, out);
                for mov in &mut out[start..] {
                    if condition.holds(mov, ctx.side) {
                        mov.forced_priority = mov.forced_priority.max(*priority);
                    }
                }
            }
            MovementRule::NeutralControl { base } => match neutral_controller(ctx.board, ctx.from) {
                NeutralController::Majority(color) if color == ctx.side => base.generate(ctx, out),
                NeutralController::Majority(_) => {}
                NeutralController::Tie => {
                    let mut moves = vec![];
                    base.generate(ctx, &mut moves);
                    out.extend(moves.into_iter().filter(|m| !m.is_capture()));
                }
            },
        }
    }
}

/// Generates the moves of the piece on `from` for `side`, using the static rule of its type.
/// Returns nothing if the square is empty or the piece belongs to the other side.
pub fn piece_moves(board: &Board, from: Point, side: Color) -> Vec<Move> {
    let Some(piece) = board.piece_on(from) else {
        return vec![];
    };
    if piece.color != PieceColor::Neutral && !piece.is_color(side) {
        return vec![];
    }
    let ctx = GenContext { board, from, piece, side };
    let mut res = vec![];
    wiring::rule_for(piece.piece_type).generate(&ctx, &mut res);
    res
}
