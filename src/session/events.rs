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

use crate::board::pieces::Color;
use crate::moves::MoveKey;
use crate::notation::Fen;
use crate::session::{ClockView, GameResult, GameToken};

/// Notifications for players and spectators. Delivery is best effort: a subscriber that lags behind
/// misses events, and can catch up with a state request.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameEvent {
    MoveMade { token: GameToken, key: MoveKey, san: String, fen: Fen, clocks: ClockView },
    DrawRequested { token: GameToken, requester: Color },
    /// Either declined explicitly or implicitly by playing a move.
    DrawDeclined { token: GameToken, requester: Color },
    GameEnded { token: GameToken, result: GameResult },
}

impl GameEvent {
    pub fn token(&self) -> &GameToken {
        match self {
            GameEvent::MoveMade { token, .. }
            | GameEvent::DrawRequested { token, .. }
            | GameEvent::DrawDeclined { token, .. }
            | GameEvent::GameEnded { token, .. } => token,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GameEvent::GameEnded { .. })
    }
}
