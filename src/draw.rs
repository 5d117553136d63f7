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

use serde::{Deserialize, Serialize};

use crate::board::pieces::Color;
use crate::error::GameError;
use crate::moves::Move;
use crate::notation::Fen;

/// Number of plies without a capture or pawn move after which the game is drawn.
pub const FIFTY_MOVE_PLIES: u32 = 100;

pub const REPETITIONS_FOR_DRAW: u32 = 3;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum AutoDrawReason {
    Threefold,
    FiftyMoves,
}

/// Tracks repetitions and the fifty move counter of one match. Created once at game start.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct AutoDrawState {
    occurrences: HashMap<Fen, u32>,
    halfmove_clock: u32,
}

impl AutoDrawState {
    /// The starting position counts as the first occurrence.
    pub fn new(initial: &Fen) -> Self {
        let mut res = Self::default();
        _ = res.occurrences.insert(initial.clone(), 1);
        res
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    pub fn occurrences(&self, fen: &str) -> u32 {
        self.occurrences.get(fen).copied().unwrap_or_default()
    }

    /// Must be called after every ply with the position it produced.
    /// Both counters are always updated; repetition is reported before the fifty move rule.
    pub fn evaluate(&mut self, mov: &Move, fen: &Fen) -> Option<AutoDrawReason> {
        let count = self.occurrences.entry(fen.clone()).or_default();
        *count += 1;
        let repeated = *count >= REPETITIONS_FOR_DRAW;
        if mov.is_progress() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }
        if repeated {
            Some(AutoDrawReason::Threefold)
        } else if self.halfmove_clock >= FIFTY_MOVE_PLIES {
            Some(AutoDrawReason::FiftyMoves)
        } else {
            None
        }
    }
}

/// What a draw request did.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[must_use]
pub enum DrawRequestOutcome {
    /// The request is pending until the opponent answers or a move is played.
    Offered,
    /// The opponent had already offered a draw, so the game is drawn by agreement.
    Accepted,
}

/// Draw offers of one match. After a declined offer, the offering side has to wait a few moves before offering again.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct DrawRequestState {
    pending: Option<Color>,
    cooldowns: [u32; 2],
}

impl DrawRequestState {
    pub fn pending(&self) -> Option<Color> {
        self.pending
    }

    pub fn cooldown(&self, color: Color) -> u32 {
        self.cooldowns[color.idx()]
    }

    pub fn request(&mut self, color: Color) -> Result<DrawRequestOutcome, GameError> {
        match self.pending {
            Some(requester) if requester == color => Err(GameError::DrawAlreadyRequested),
            Some(_) => {
                self.pending = None;
                Ok(DrawRequestOutcome::Accepted)
            }
            None if self.cooldowns[color.idx()] > 0 => Err(GameError::DrawOnCooldown(self.cooldowns[color.idx()])),
            None => {
                self.pending = Some(color);
                Ok(DrawRequestOutcome::Offered)
            }
        }
    }

    /// `color` declines the opponent's pending offer, which puts the opponent on cooldown.
    pub fn decline(&mut self, color: Color, cooldown: u32) -> Result<Color, GameError> {
        match self.pending {
            Some(requester) if requester != color => {
                self.pending = None;
                self.cooldowns[requester.idx()] = cooldown;
                Ok(requester)
            }
            _ => Err(GameError::DrawNotRequested),
        }
    }

    /// Called for every played move. Playing a move declines a pending offer of the opponent,
    /// and an offer of the mover is withdrawn. Returns the requester of a cancelled offer.
    pub fn on_move(&mut self, mover: Color, cooldown: u32) -> Option<Color> {
        for c in &mut self.cooldowns {
            *c = c.saturating_sub(1);
        }
        let requester = self.pending.take()?;
        if requester != mover {
            self.cooldowns[requester.idx()] = cooldown;
        }
        Some(requester)
    }
}
