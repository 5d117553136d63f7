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
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};

use crate::board::pieces::Color;
use crate::board::Board;
use crate::clock::GameClock;
use crate::config::SessionConfig;
use crate::draw::{AutoDrawState, DrawRequestState};
use crate::game::GameCore;
use crate::general::common::Res;
use crate::notation::Fen;
use crate::session::{FinalizationProgress, GameResult, GameSession, GameToken, Lifecycle, MoveRecord, Roster};

/// The persisted form of a [`GameSession`]. Legal moves aren't stored, they are recomputed from the board.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub token: GameToken,
    pub lifecycle: Lifecycle,
    pub roster: Option<Roster>,
    pub ranked: bool,
    pub board: Board,
    pub side_to_move: Color,
    /// Redundant with the board, used to detect corrupted snapshots.
    pub fen: Fen,
    pub clock: GameClock,
    pub auto_draw: AutoDrawState,
    pub draw_requests: DrawRequestState,
    pub history: Vec<MoveRecord>,
    pub result: Option<GameResult>,
    #[serde(default)]
    pub finalization: FinalizationProgress,
}

impl SessionSnapshot {
    pub fn to_json(&self) -> Res<String> {
        serde_json::to_string(self).with_context(|| format!("Couldn't serialize the session {}", self.token))
    }

    pub fn from_json(json: &str) -> Res<Self> {
        serde_json::from_str(json).context("Invalid session snapshot")
    }

    /// A finished match whose rating or archiving hasn't gone through yet.
    pub fn needs_finalization(&self) -> bool {
        self.lifecycle == Lifecycle::Finished && !self.finalization.is_complete()
    }
}

impl GameSession {
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            token: self.token.clone(),
            lifecycle: self.lifecycle,
            roster: self.roster.clone(),
            ranked: self.ranked,
            board: self.core.board().clone(),
            side_to_move: self.core.side_to_move(),
            fen: self.core.fen().clone(),
            clock: self.clock.clone(),
            auto_draw: self.auto_draw.clone(),
            draw_requests: self.draw_requests.clone(),
            history: self.history.clone(),
            result: self.result,
            finalization: self.finalization,
        }
    }

    pub fn restore(snapshot: SessionSnapshot, config: SessionConfig) -> Res<Self> {
        snapshot.board.validate().with_context(|| format!("The snapshot of {} has a broken board", snapshot.token))?;
        let core = GameCore::from_board(snapshot.board, snapshot.side_to_move);
        ensure!(
            core.fen() == &snapshot.fen,
            "The snapshot of {0} is inconsistent: the board is '{1}' but the stored position is '{2}'",
            snapshot.token,
            core.fen(),
            snapshot.fen
        );
        ensure!(
            snapshot.lifecycle == Lifecycle::NotStarted || snapshot.roster.is_some(),
            "The snapshot of {} has no players",
            snapshot.token
        );
        ensure!(
            (snapshot.lifecycle == Lifecycle::Finished) == snapshot.result.is_some(),
            "The snapshot of {} has a result iff the game is finished",
            snapshot.token
        );
        Ok(Self {
            token: snapshot.token,
            config,
            lifecycle: snapshot.lifecycle,
            roster: snapshot.roster,
            ranked: snapshot.ranked,
            core,
            clock: snapshot.clock,
            auto_draw: snapshot.auto_draw,
            draw_requests: snapshot.draw_requests,
            history: snapshot.history,
            result: snapshot.result,
            finalization: snapshot.finalization,
            outbox: vec![],
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeDelta, Utc};

    use super::*;
    use crate::clock::TimeControl;
    use crate::error::GameError;
    use crate::general::squares::Point;
    use crate::session::PlayerInfo;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::milliseconds(ms)
    }

    fn sq(s: &str) -> Point {
        s.parse().unwrap()
    }

    fn session() -> GameSession {
        let player = |id: &str| PlayerInfo { user_id: id.to_string(), display_name: id.to_string(), rating: None };
        let mut session = GameSession::new("snap".to_string(), SessionConfig::default(), at(0));
        let roster = Roster { white: player("w"), black: player("b") };
        session.start_game(roster, TimeControl::default(), false, at(0)).unwrap();
        session.move_piece("w", sq("e2"), sq("e4"), None, at(1500)).unwrap();
        session.request_draw("w", at(1600)).unwrap();
        session
    }

    #[test]
    fn restore_test() {
        let original = session();
        let json = original.snapshot().to_json().unwrap();
        let mut restored = GameSession::restore(SessionSnapshot::from_json(&json).unwrap(), SessionConfig::default()).unwrap();
        assert_eq!(restored.snapshot(), original.snapshot());
        assert_eq!(restored.core().legal_moves().len(), original.core().legal_moves().len());
        assert_eq!(restored.draw_requests().pending(), Some(Color::White));
        assert!(restored.drain_events().is_empty());
        // the restored game goes on where it stopped
        assert_eq!(restored.move_piece("w", sq("b1"), sq("c3"), None, at(2000)), Err(GameError::NotYourTurn));
        let played = restored.move_piece("b", sq("e9"), sq("e7"), None, at(2000)).unwrap();
        assert_eq!(played.san, "e7");
        assert_eq!(restored.draw_requests().cooldown(Color::White), 3);
    }

    #[test]
    fn corrupted_snapshot_test() {
        let mut snapshot = session().snapshot();
        snapshot.fen = "10/10/10/10/10/10/10/10/10/10".to_string();
        assert!(GameSession::restore(snapshot, SessionConfig::default()).is_err());

        let mut snapshot = session().snapshot();
        snapshot.lifecycle = Lifecycle::Finished;
        assert!(snapshot.needs_finalization());
        assert!(GameSession::restore(snapshot, SessionConfig::default()).is_err());
        assert!(SessionSnapshot::from_json("{}").is_err());
    }

    #[test]
    fn broken_board_test() {
        let mut json: serde_json::Value = serde_json::from_str(&session().snapshot().to_json().unwrap()).unwrap();
        let squares = json["board"]["squares"].as_array_mut().unwrap();
        _ = squares.pop();
        let snapshot = SessionSnapshot::from_json(&json.to_string()).unwrap();
        assert!(GameSession::restore(snapshot, SessionConfig::default()).is_err());

        let mut json: serde_json::Value = serde_json::from_str(&session().snapshot().to_json().unwrap()).unwrap();
        json["board"]["width"] = serde_json::json!(11);
        let snapshot = SessionSnapshot::from_json(&json.to_string()).unwrap();
        assert!(GameSession::restore(snapshot, SessionConfig::default()).is_err());
    }
}
