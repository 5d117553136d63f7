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
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};

use crate::clock::TimeControl;
use crate::general::common::Res;

/// Tunables of the match host. Every field has a default, so a config file only needs to list what it changes.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Resigning before this many plies have been played aborts the game instead.
    pub abort_ply_threshold: usize,
    /// Moves a player has to wait after a declined draw offer.
    pub draw_cooldown_moves: u32,
    pub tick_interval_ms: u64,
    /// How often finalization (rating, archive) is attempted before giving up.
    pub finalize_retries: u32,
    pub finalize_retry_delay_ms: u64,
    pub mailbox_capacity: usize,
    /// How many ended matches the host remembers. Older ones only answer from the store, if they're still there.
    pub ended_games_retained: usize,
    pub default_time_control: TimeControl,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            abort_ply_threshold: 2,
            draw_cooldown_moves: 3,
            tick_interval_ms: 1000,
            finalize_retries: 3,
            finalize_retry_delay_ms: 100,
            mailbox_capacity: 64,
            ended_games_retained: 4096,
            default_time_control: TimeControl::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Res<Self> {
        let value: serde_json::Value = serde_json::from_str(json).context("Invalid session config")?;
        ensure!(value.is_object(), "The session config must be a JSON object, not '{value}'");
        let res: Self = serde_json::from_value(value).context("Invalid session config")?;
        res.validate()?;
        Ok(res)
    }

    pub fn load(path: &Path) -> Res<Self> {
        let json = fs::read_to_string(path).with_context(|| format!("Couldn't read config file '{}'", path.display()))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Res<()> {
        ensure!(self.tick_interval_ms > 0, "The tick interval must be positive");
        ensure!(self.mailbox_capacity > 0, "The mailbox capacity must be positive");
        ensure!(self.finalize_retries > 0, "Finalization needs at least one attempt");
        ensure!(self.default_time_control.base_seconds > 0, "The default time control needs a positive base time");
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn finalize_retry_delay(&self) -> Duration {
        Duration::from_millis(self.finalize_retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_test() {
        let config = SessionConfig::from_json(r#"{"draw_cooldown_moves": 5, "mailbox_capacity": 8}"#).unwrap();
        assert_eq!(config.draw_cooldown_moves, 5);
        assert_eq!(config.mailbox_capacity, 8);
        assert_eq!(config.abort_ply_threshold, SessionConfig::default().abort_ply_threshold);
        let config =
            SessionConfig::from_json(r#"{"default_time_control": {"base_seconds": 60, "increment_seconds": 1}}"#)
                .unwrap();
        assert_eq!(config.default_time_control.to_string(), "60+1");
    }

    #[test]
    fn invalid_config_test() {
        assert!(SessionConfig::from_json(r#"{"tick_interval_ms": 0}"#).is_err());
        assert!(SessionConfig::from_json(r#"{"no_such_field": 1}"#).is_err());
        assert!(SessionConfig::from_json("[]").is_err());
        assert!(SessionConfig::from_json("[64]").is_err());
        assert!(SessionConfig::from_json("null").is_err());
        assert!(SessionConfig::load(Path::new("/this/file/does/not/exist.json")).is_err());
    }
}
