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

use lazy_static::lazy_static;
use strum::IntoEnumIterator;

use crate::board::pieces::PieceType::*;
use crate::board::pieces::{PieceType, DECAY_SPAWNS, PROMOTABLE_PIECES};
use crate::general::squares::{Offset, DIAGONAL, KNIGHT, ORTHOGONAL};
use crate::moves::ForcedPriority;
use crate::rules::behaviour::Behaviour::{Forward, Slide, Step};
use crate::rules::AttackMode::{All, Captures, NoCaptures};
use crate::rules::{ForcedCondition, MovementRule};

const ALL_DIRECTIONS: [Offset; 8] = [
    Offset::new(0, 1),
    Offset::new(1, 1),
    Offset::new(1, 0),
    Offset::new(1, -1),
    Offset::new(0, -1),
    Offset::new(-1, -1),
    Offset::new(-1, 0),
    Offset::new(-1, 1),
];

/// Seen from white, black flips them.
const FORWARD_DIAGONALS: [Offset; 2] = [Offset::new(-1, 1), Offset::new(1, 1)];

lazy_static! {
    static ref RULES: HashMap<PieceType, MovementRule> = PieceType::iter().map(|p| (p, build_rule(p))).collect();
}

fn pawn_rule() -> MovementRule {
    MovementRule::Composite(vec![
        MovementRule::basic(Forward, NoCaptures),
        MovementRule::basic(Step { offsets: &FORWARD_DIAGONALS, relative: true }, Captures),
        MovementRule::EnPassant,
    ])
    .promotion(&PROMOTABLE_PIECES)
}

/// Vulnerable pawns must be taken when possible. En passant moves carry their priority already.
fn with_forced_captures(rule: MovementRule) -> MovementRule {
    rule.forced(ForcedPriority::ChildPawn, ForcedCondition::CapturesEnemy(ChildPawn))
        .forced(ForcedPriority::UnderagePawn, ForcedCondition::CapturesEnemy(UnderagePawn))
}

fn build_rule(piece: PieceType) -> MovementRule {
    let rule = match piece {
        King => MovementRule::Composite(vec![
            MovementRule::basic(Step { offsets: &ALL_DIRECTIONS, relative: false }, All),
            MovementRule::Castle,
        ]),
        Queen => MovementRule::Composite(vec![
            MovementRule::basic(Slide(&ALL_DIRECTIONS), All),
            MovementRule::RadioactiveDecay { spawns: &DECAY_SPAWNS },
        ]),
        Rook => MovementRule::basic(Slide(&ORTHOGONAL), All),
        Bishop => MovementRule::Composite(vec![MovementRule::basic(Slide(&DIAGONAL), All), MovementRule::IlVaticano]),
        Horsey => MovementRule::basic(Step { offsets: &KNIGHT, relative: false }, All),
        Knook => MovementRule::Composite(vec![
            MovementRule::basic(Slide(&ORTHOGONAL), All),
            MovementRule::basic(Step { offsets: &KNIGHT, relative: false }, All),
        ]),
        Checker => MovementRule::Composite(vec![
            MovementRule::basic(Step { offsets: &FORWARD_DIAGONALS, relative: true }, NoCaptures),
            MovementRule::CheckerJump,
        ]),
        Pawn | UnderagePawn | ChildPawn => pawn_rule(),
        TraitorRook => return MovementRule::basic(Slide(&ORTHOGONAL), All).neutral(),
    };
    with_forced_captures(rule)
}

/// The rule tree of a piece type. Built once on first use and never changed afterwards.
pub fn rule_for(piece: PieceType) -> &'static MovementRule {
    &RULES[&piece]
}
