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

/// Rules and live matches of a chess variant on a 10x10 board, where the game ends when a king is captured.
///
/// This crate is grouped in 3 broad layers:
/// - The board and the pieces, together with the notation (FEN and SAN)
/// - The rules: movement rules are composed per piece type, and the legal move calculator applies forced moves
/// - The session: one match with its clock, draw handling and players, hosted in its own tokio task
pub mod general;

pub mod board;

pub mod moves;

pub mod rules;

pub mod legal_moves;

pub mod notation;

pub mod game;

pub mod draw;
pub mod clock;

pub mod error;
pub mod config;

pub mod session;


pub use board::Board;
pub use error::GameError;
pub use game::{GameCore, PlayedMove};
pub use session::host::GameHost;
