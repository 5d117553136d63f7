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

//! Moves that don't fit the behaviour + attack mode scheme.
//! The two chain rules (en passant and checker jumps) emit every prefix of a chain as its own move
//! and use an explicit worklist instead of recursion.

use itertools::Itertools;

use crate::board::pieces::PieceType::{Bishop, Rook};
use crate::board::pieces::{Piece, PieceType};
use crate::general::squares::{DimT, Offset, Point, DIAGONAL, ORTHOGONAL};
use crate::moves::SpecialMoveType::{EnPassant, IlVaticano, KingsideCastle, QueensideCastle, RadioactiveDecay};
use crate::moves::{ForcedPriority, Move, MoveSideEffect, PieceOnSquare};
use crate::rules::GenContext;

/// The king moves two files towards an unmoved rook on the edge of its rank, and the rook lands on the square
/// the king crossed. An own bishop may stand on that square, it gets captured.
pub fn castle(ctx: &GenContext, out: &mut Vec<Move>) {
    if ctx.piece.times_moved != 0 {
        return;
    }
    let board = ctx.board;
    let from = ctx.from;
    for (dir, special) in [(1, KingsideCastle), (-1, QueensideCastle)] {
        let rook_file = if dir > 0 { board.width() - 1 } else { 0 };
        let rook_square = Point::new(rook_file, from.rank());
        // the king needs to pass over the rook's landing square and land before the rook
        if (rook_file - from.file()) * dir < 3 {
            continue;
        }
        let Some(rook) = board.piece_on(rook_square) else {
            continue;
        };
        if rook.piece_type != Rook || !ctx.is_friend(rook) || rook.times_moved != 0 {
            continue;
        }
        let step = Offset::new(dir, 0);
        let king_to = from + step.scaled(2);
        let rook_to = from + step;

        let between = (1..(rook_file - from.file()).abs()).map(|dist| from + step.scaled(dist)).collect_vec();
        let mut bishop = None;
        let mut blocked = false;
        for &square in &between {
            match board.piece_on(square) {
                None => {}
                Some(piece) if square == rook_to && piece.piece_type == Bishop && ctx.is_friend(piece) => {
                    bishop = Some(piece);
                }
                Some(_) => blocked = true,
            }
        }
        if blocked {
            continue;
        }
        let mut mov = Move::new(from, king_to, ctx.piece).with_special(special);
        if let Some(bishop) = bishop {
            mov = mov.capturing(bishop, rook_to);
        }
        mov.side_effects.push(MoveSideEffect { from: rook_square, to: rook_to, piece: rook });
        mov.trigger_squares = between.iter().copied().filter(|sq| (sq.file() - king_to.file()) * dir > 0).collect();
        mov.trigger_squares.push(rook_square);
        out.push(mov);
    }
}

/// Squares an enemy pawn-type skipped over with its last move, if that move can be taken en passant.
fn passed_squares(ctx: &GenContext) -> Option<(Point, Piece, Vec<Point>)> {
    let last = ctx.board.last_move()?;
    let advanced = last.to;
    if !last.piece.piece_type.is_pawn_type()
        || !last.piece.is_color(ctx.side.other())
        || last.from.file() != advanced.file()
        || (advanced.rank() - last.from.rank()).abs() < 2
    {
        return None;
    }
    // the pawn has to still be there and still be a pawn-type, it could have promoted
    let victim = ctx.board.piece_on(advanced).filter(|p| p.piece_type.is_pawn_type() && p.is_color(ctx.side.other()))?;
    let dir = if advanced.rank() > last.from.rank() { 1 } else { -1 };
    let passed =
        (1..(advanced.rank() - last.from.rank()).abs()).map(|dist| last.from + Offset::new(0, dir * dist)).collect();
    Some((advanced, victim, passed))
}

/// Chain en passant. The first hop lands diagonally forward on a square the enemy pawn passed through and captures it.
/// Every following hop continues in the same diagonal direction, onto an empty square whose rear neighbour holds
/// an enemy piece, which is captured as well.
pub fn en_passant(ctx: &GenContext, out: &mut Vec<Move>) {
    let Some((advanced, victim, passed)) = passed_squares(ctx) else {
        return;
    };
    let board = ctx.board;
    let forward = ctx.side.forward();
    for dx in [-1, 1] {
        let hop = Offset::new(dx, forward);
        let mut land = ctx.from + hop;
        if !passed.contains(&land) || !board.is_empty(land) {
            continue;
        }
        let mut captures = vec![PieceOnSquare { piece: victim, position: advanced }];
        let mut via = vec![];
        loop {
            let mut mov = Move::new(ctx.from, land, ctx.piece).with_special(EnPassant);
            mov.captures = captures.clone();
            mov.intermediate_squares = via.clone();
            mov.trigger_squares = vec![advanced];
            mov.forced_priority = ForcedPriority::EnPassant;
            out.push(mov);

            let next = land + hop;
            // `is_empty` is false for squares outside the board, which ends the chain at the edge
            if !board.is_empty(next) {
                break;
            }
            let behind = next - Offset::new(0, forward);
            let Some(defender) = board.piece_on(behind) else {
                break;
            };
            if !ctx.is_enemy(defender) || captures.iter().any(|c| c.position == behind) {
                break;
            }
            captures.push(PieceOnSquare { piece: defender, position: behind });
            via.push(land);
            land = next;
        }
    }
}

/// Checker jumps in all four diagonal directions. Jumping over an enemy captures it and the checker may keep jumping,
/// jumping over a friendly piece is only possible as a single hop and ends the move.
pub fn checker_jump(ctx: &GenContext, out: &mut Vec<Move>) {
    let board = ctx.board;
    let from = ctx.from;
    // the checker itself has left its origin square
    let vacant = |square: Point| square == from || board.is_empty(square);
    let mut worklist: Vec<(Point, Vec<PieceOnSquare>, Vec<Point>)> = vec![(from, vec![], vec![])];
    while let Some((pos, captures, via)) = worklist.pop() {
        for dir in DIAGONAL {
            let over = pos + dir;
            let land = over + dir;
            if over == from || !board.in_bounds(land) || !vacant(land) {
                continue;
            }
            let Some(jumped) = board.piece_on(over) else {
                continue;
            };
            if captures.iter().any(|c| c.position == over) {
                continue;
            }
            if ctx.is_enemy(jumped) {
                let mut captures = captures.clone();
                captures.push(PieceOnSquare { piece: jumped, position: over });
                let mut via = via.clone();
                if pos != from {
                    via.push(pos);
                }
                let mut mov = Move::new(from, land, ctx.piece);
                mov.captures = captures.clone();
                mov.intermediate_squares = via.clone();
                out.push(mov);
                worklist.push((land, captures, via));
            } else if pos == from {
                let mut mov = Move::new(from, land, ctx.piece);
                mov.trigger_squares.push(over);
                out.push(mov);
            }
        }
    }
}

/// Two bishops of the same side three squares apart on a rank or file, with two enemy pawn-types between them,
/// swap over the pawns: the mover lands on the far pawn, the partner on the near pawn, both pawns are captured.
pub fn il_vaticano(ctx: &GenContext, out: &mut Vec<Move>) {
    let board = ctx.board;
    for dir in ORTHOGONAL {
        let near = ctx.from + dir;
        let far = ctx.from + dir.scaled(2);
        let partner_square = ctx.from + dir.scaled(3);
        let Some(partner) = board.piece_on(partner_square) else {
            continue;
        };
        if partner.piece_type != Bishop || !ctx.is_friend(partner) {
            continue;
        }
        let vulnerable = |square: Point| {
            board.piece_on(square).filter(|&p| p.piece_type.is_pawn_type() && ctx.is_enemy(p))
        };
        let (Some(near_pawn), Some(far_pawn)) = (vulnerable(near), vulnerable(far)) else {
            continue;
        };
        let mut mov =
            Move::new(ctx.from, far, ctx.piece).capturing(near_pawn, near).capturing(far_pawn, far).with_special(IlVaticano);
        mov.side_effects.push(MoveSideEffect { from: partner_square, to: near, piece: partner });
        mov.trigger_squares.push(partner_square);
        out.push(mov);
    }
}

/// Files of a rank ordered by their distance to the centre of the board, the left file first on ties.
pub fn files_from_centre(width: DimT) -> Vec<DimT> {
    (0..width).sorted_by_key(|&x| ((2 * x - (width - 1)).abs(), x)).collect()
}

/// A piece alone on its rank may decay: it disappears and leaves `spawns` behind on its side's home rank.
/// Spawns fill the empty squares closest to the centre first; spawns that don't fit are lost.
pub fn radioactive_decay(ctx: &GenContext, spawns: &[PieceType], out: &mut Vec<Move>) {
    let board = ctx.board;
    if !board.rank_is_empty_except(ctx.from.rank(), ctx.from) {
        return;
    }
    let home = ctx.side.home_rank(board.height());
    let free = files_from_centre(board.width())
        .into_iter()
        .map(|x| Point::new(x, home))
        .filter(|&sq| sq == ctx.from || board.is_empty(sq));
    let mut mov = Move::new(ctx.from, ctx.from, ctx.piece).capturing(ctx.piece, ctx.from).with_special(RadioactiveDecay);
    mov.piece_spawns = spawns
        .iter()
        .zip(free)
        .map(|(&typ, position)| PieceOnSquare { piece: Piece::of(typ, ctx.side), position })
        .collect();
    out.push(mov);
}
