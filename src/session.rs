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

//! The state machine of a single match. A [`GameSession`] is plain synchronous state; the
//! [`host`] runs every session in its own task, which is what serializes the commands of a match.

use std::fmt;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::board::pieces::{Color, PieceType};
use crate::clock::{GameClock, TimeControl};
use crate::config::SessionConfig;
use crate::draw::{AutoDrawReason, AutoDrawState, DrawRequestOutcome, DrawRequestState};
use crate::error::GameError;
use crate::game::{GameCore, PlayedMove};
use crate::general::squares::Point;
use crate::moves::{MoveKey, MovePath, PieceOnSquare};
use crate::notation::Fen;
use crate::session::events::GameEvent;

pub mod events;
pub mod host;
pub mod services;
pub mod snapshot;

pub type UserId = String;
pub type GameToken = String;

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub user_id: UserId,
    pub display_name: String,
    pub rating: Option<u32>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    pub white: PlayerInfo,
    pub black: PlayerInfo,
}

impl Roster {
    pub fn color_of(&self, user: &str) -> Option<Color> {
        if self.white.user_id == user {
            Some(Color::White)
        } else if self.black.user_id == user {
            Some(Color::Black)
        } else {
            None
        }
    }

    pub fn player(&self, color: Color) -> &PlayerInfo {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, derive_more::Display)]
pub enum Lifecycle {
    #[default]
    NotStarted,
    Playing,
    Finished,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, derive_more::Display)]
pub enum Outcome {
    WhiteWin,
    BlackWin,
    Draw,
    /// The game ended too early to count. Aborted games aren't rated.
    Aborted,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, derive_more::Display)]
pub enum EndReason {
    KingCaptured,
    Timeout,
    Resignation,
    Threefold,
    FiftyMoves,
    Agreement,
    /// The side to move has no legal move left.
    NoLegalMoves,
    Abort,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    pub outcome: Outcome,
    pub reason: EndReason,
}

impl GameResult {
    pub fn win(winner: Color, reason: EndReason) -> Self {
        let outcome = match winner {
            Color::White => Outcome::WhiteWin,
            Color::Black => Outcome::BlackWin,
        };
        Self { outcome, reason }
    }

    pub fn draw(reason: EndReason) -> Self {
        Self { outcome: Outcome::Draw, reason }
    }

    pub fn aborted() -> Self {
        Self { outcome: Outcome::Aborted, reason: EndReason::Abort }
    }

    pub fn winner(&self) -> Option<Color> {
        match self.outcome {
            Outcome::WhiteWin => Some(Color::White),
            Outcome::BlackWin => Some(Color::Black),
            Outcome::Draw | Outcome::Aborted => None,
        }
    }

    pub fn is_rated_outcome(&self) -> bool {
        self.outcome != Outcome::Aborted
    }
}

impl Display for GameResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{0} ({1})", self.outcome, self.reason)
    }
}

impl From<AutoDrawReason> for EndReason {
    fn from(value: AutoDrawReason) -> Self {
        match value {
            AutoDrawReason::Threefold => EndReason::Threefold,
            AutoDrawReason::FiftyMoves => EndReason::FiftyMoves,
        }
    }
}

/// One entry of the move list.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub key: MoveKey,
    pub san: String,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClockView {
    pub white_ms: i64,
    pub black_ms: i64,
    pub running: Option<Color>,
}

/// Which finalization steps have already succeeded. Stored with the session, so that a restarted host
/// neither repeats nor skips a step.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct FinalizationProgress {
    pub rated: bool,
    pub archived: bool,
}

impl FinalizationProgress {
    pub fn is_complete(&self) -> bool {
        self.rated && self.archived
    }
}

/// Everything a player or spectator gets to see of a match.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct GameStateView {
    pub token: GameToken,
    pub lifecycle: Lifecycle,
    pub white: PlayerInfo,
    pub black: PlayerInfo,
    pub fen: Fen,
    pub pieces: Vec<PieceOnSquare>,
    pub side_to_move: Color,
    pub clocks: ClockView,
    /// Only present for the player whose turn it is.
    pub legal_moves: Option<Vec<MovePath>>,
    pub has_forced_moves: bool,
    pub draw_offer: Option<Color>,
    pub draw_cooldowns: [u32; 2],
    pub history: Vec<MoveRecord>,
}

/// All data needed to archive and rate a finished match.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub token: GameToken,
    pub roster: Roster,
    pub result: GameResult,
    pub time_control: TimeControl,
    pub ranked: bool,
    pub history: Vec<MoveRecord>,
    pub final_fen: Fen,
}

#[derive(Debug, Clone)]
pub struct GameSession {
    token: GameToken,
    config: SessionConfig,
    lifecycle: Lifecycle,
    roster: Option<Roster>,
    ranked: bool,
    core: GameCore,
    clock: GameClock,
    auto_draw: AutoDrawState,
    draw_requests: DrawRequestState,
    history: Vec<MoveRecord>,
    result: Option<GameResult>,
    finalization: FinalizationProgress,
    /// Events since the last call to [`Self::drain_events`]. Not persisted.
    outbox: Vec<GameEvent>,
}

impl GameSession {
    pub fn new(token: GameToken, config: SessionConfig, now: DateTime<Utc>) -> Self {
        let core = GameCore::default();
        let auto_draw = AutoDrawState::new(core.fen());
        let clock = GameClock::new(config.default_time_control, now);
        Self {
            token,
            config,
            lifecycle: Lifecycle::NotStarted,
            roster: None,
            ranked: false,
            core,
            clock,
            auto_draw,
            draw_requests: DrawRequestState::default(),
            history: vec![],
            result: None,
            finalization: FinalizationProgress::default(),
            outbox: vec![],
        }
    }

    pub fn token(&self) -> &GameToken {
        &self.token
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn core(&self) -> &GameCore {
        &self.core
    }

    pub fn clock(&self) -> &GameClock {
        &self.clock
    }

    pub fn roster(&self) -> Option<&Roster> {
        self.roster.as_ref()
    }

    pub fn is_ranked(&self) -> bool {
        self.ranked
    }

    pub fn history(&self) -> &[MoveRecord] {
        &self.history
    }

    pub fn plies_played(&self) -> usize {
        self.history.len()
    }

    pub fn draw_requests(&self) -> &DrawRequestState {
        &self.draw_requests
    }

    pub fn finalization(&self) -> FinalizationProgress {
        self.finalization
    }

    pub fn finalization_mut(&mut self) -> &mut FinalizationProgress {
        &mut self.finalization
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Commands of players can only be applied to a running game.
    fn ensure_playing(&self) -> Result<(), GameError> {
        match self.lifecycle {
            Lifecycle::NotStarted => Err(GameError::GameNotFound),
            Lifecycle::Playing => Ok(()),
            Lifecycle::Finished => Err(GameError::GameAlreadyEnded),
        }
    }

    fn color_of(&self, user: &str) -> Result<Color, GameError> {
        self.roster.as_ref().and_then(|r| r.color_of(user)).ok_or(GameError::PlayerInvalid)
    }

    fn clock_view(&self, now: DateTime<Utc>) -> ClockView {
        ClockView {
            white_ms: self.clock.calculate_time_left(Color::White, now),
            black_ms: self.clock.calculate_time_left(Color::Black, now),
            running: (!self.clock.is_frozen()).then(|| self.clock.running()),
        }
    }

    pub fn start_game(
        &mut self,
        roster: Roster,
        time_control: TimeControl,
        ranked: bool,
        now: DateTime<Utc>,
    ) -> Result<(), GameError> {
        match self.lifecycle {
            Lifecycle::NotStarted => {}
            Lifecycle::Playing => return Err(GameError::GameAlreadyStarted),
            Lifecycle::Finished => return Err(GameError::GameAlreadyEnded),
        }
        info!(
            "Starting game {0}: {1} vs {2}, {time_control}, ranked: {ranked}",
            self.token, roster.white.display_name, roster.black.display_name
        );
        self.roster = Some(roster);
        self.ranked = ranked;
        self.core = GameCore::default();
        self.auto_draw = AutoDrawState::new(self.core.fen());
        self.clock = GameClock::new(time_control, now);
        self.lifecycle = Lifecycle::Playing;
        Ok(())
    }

    pub fn move_piece(
        &mut self,
        user: &str,
        from: Point,
        to: Point,
        promotes_to: Option<PieceType>,
        now: DateTime<Utc>,
    ) -> Result<PlayedMove, GameError> {
        self.ensure_playing()?;
        let color = self.color_of(user)?;
        if color != self.core.side_to_move() {
            return Err(GameError::NotYourTurn);
        }
        // the last tick can be up to one interval old
        if self.tick_clock(now).is_some() {
            return Err(GameError::GameAlreadyEnded);
        }
        let played = self.core.make_move(from, to, promotes_to)?;
        debug!("Game {0}: {1} played {2}", self.token, color, played.san);
        self.clock.commit_turn(color, now);
        if let Some(requester) = self.draw_requests.on_move(color, self.config.draw_cooldown_moves) {
            if requester != color {
                self.outbox.push(GameEvent::DrawDeclined { token: self.token.clone(), requester });
            }
        }
        self.history.push(MoveRecord { key: played.mov.key(), san: played.san.clone() });
        let auto_draw = self.auto_draw.evaluate(&played.mov, &played.fen);
        self.outbox.push(GameEvent::MoveMade {
            token: self.token.clone(),
            key: played.mov.key(),
            san: played.san.clone(),
            fen: played.fen.clone(),
            clocks: self.clock_view(now),
        });

        if played.mov.captures_king_of(color.other()) {
            self.finish(GameResult::win(color, EndReason::KingCaptured), now);
        } else if let Some(reason) = auto_draw {
            self.finish(GameResult::draw(reason.into()), now);
        } else if self.core.legal_moves().is_empty() {
            self.finish(GameResult::draw(EndReason::NoLegalMoves), now);
        }
        Ok(played)
    }

    /// Periodic check whether the side to move has run out of time. Returns the result if that ended the game.
    pub fn tick_clock(&mut self, now: DateTime<Utc>) -> Option<GameResult> {
        if self.lifecycle != Lifecycle::Playing {
            return None;
        }
        let side = self.core.side_to_move();
        if !self.clock.is_flagged(side, now) {
            return None;
        }
        let result = GameResult::win(side.other(), EndReason::Timeout);
        self.finish(result, now);
        Some(result)
    }

    pub fn request_draw(&mut self, user: &str, now: DateTime<Utc>) -> Result<DrawRequestOutcome, GameError> {
        self.ensure_playing()?;
        let color = self.color_of(user)?;
        let outcome = self.draw_requests.request(color)?;
        match outcome {
            DrawRequestOutcome::Offered => {
                self.outbox.push(GameEvent::DrawRequested { token: self.token.clone(), requester: color })
            }
            DrawRequestOutcome::Accepted => self.finish(GameResult::draw(EndReason::Agreement), now),
        }
        Ok(outcome)
    }

    pub fn decline_draw(&mut self, user: &str) -> Result<(), GameError> {
        self.ensure_playing()?;
        let color = self.color_of(user)?;
        let requester = self.draw_requests.decline(color, self.config.draw_cooldown_moves)?;
        self.outbox.push(GameEvent::DrawDeclined { token: self.token.clone(), requester });
        Ok(())
    }

    /// Resignation. A game that ends before enough plies have been played is aborted instead.
    pub fn end_game(&mut self, user: &str, now: DateTime<Utc>) -> Result<GameResult, GameError> {
        self.ensure_playing()?;
        let color = self.color_of(user)?;
        let result = if self.plies_played() < self.config.abort_ply_threshold {
            GameResult::aborted()
        } else {
            GameResult::win(color.other(), EndReason::Resignation)
        };
        self.finish(result, now);
        Ok(result)
    }

    /// Spectators can see the game as well, but only the player to move gets the legal moves.
    pub fn get_state(&self, user: &str, now: DateTime<Utc>) -> Result<GameStateView, GameError> {
        self.ensure_playing()?;
        let Some(roster) = &self.roster else {
            return Err(GameError::GameNotFound);
        };
        let side_to_move = self.core.side_to_move();
        let legal = self.core.legal_moves();
        let legal_moves = (roster.color_of(user) == Some(side_to_move)).then(|| legal.paths());
        Ok(GameStateView {
            token: self.token.clone(),
            lifecycle: self.lifecycle,
            white: roster.white.clone(),
            black: roster.black.clone(),
            fen: self.core.fen().clone(),
            pieces: self.core.board().pieces().map(|(position, piece)| PieceOnSquare { piece, position }).collect(),
            side_to_move,
            clocks: self.clock_view(now),
            legal_moves,
            has_forced_moves: legal.has_forced_moves(),
            draw_offer: self.draw_requests.pending(),
            draw_cooldowns: [self.draw_requests.cooldown(Color::White), self.draw_requests.cooldown(Color::Black)],
            history: self.history.clone(),
        })
    }

    /// The result of a finished game.
    pub fn result(&self) -> Result<GameResult, GameError> {
        match (self.lifecycle, self.result) {
            (Lifecycle::Finished, Some(result)) => Ok(result),
            (Lifecycle::NotStarted, _) => Err(GameError::GameNotFound),
            _ => Err(GameError::GameNotOver),
        }
    }

    fn finish(&mut self, result: GameResult, now: DateTime<Utc>) {
        info!("Game {0} ended: {result}", self.token);
        self.clock.freeze(now);
        self.lifecycle = Lifecycle::Finished;
        self.result = Some(result);
        self.outbox.push(GameEvent::GameEnded { token: self.token.clone(), result });
    }

    /// The record handed to the archive and the rating service. Only available for finished games.
    pub fn record(&self) -> Result<GameRecord, GameError> {
        let result = self.result()?;
        let roster = self.roster.clone().ok_or(GameError::GameNotFound)?;
        Ok(GameRecord {
            token: self.token.clone(),
            roster,
            result,
            time_control: self.clock.time_control(),
            ranked: self.ranked,
            history: self.history.clone(),
            final_fen: self.core.fen().clone(),
        })
    }
}
