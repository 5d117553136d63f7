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
use thiserror::Error;

use crate::general::squares::Point;

/// Errors reported to a player. A command that fails with one of these hasn't changed the match.
#[derive(Debug, Clone, Eq, PartialEq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("There is no active game with this token")]
    GameNotFound,
    #[error("The game has already ended")]
    GameAlreadyEnded,
    #[error("The game has already started")]
    GameAlreadyStarted,
    #[error("The game isn't over yet")]
    GameNotOver,
    #[error("The user isn't a player of this game")]
    PlayerInvalid,
    #[error("It's not this player's turn")]
    NotYourTurn,
    #[error("There is no legal move from {from} to {to}")]
    MoveInvalid { from: Point, to: Point },
    #[error("A draw has already been offered")]
    DrawAlreadyRequested,
    #[error("Draw offers are on cooldown for {0} more moves")]
    DrawOnCooldown(u32),
    #[error("There is no draw offer to decline")]
    DrawNotRequested,
    #[error("The game host isn't running")]
    HostUnavailable,
}
