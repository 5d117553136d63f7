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
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use anyhow::bail;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::board::pieces::Color;
use crate::general::common::{parse_fp_from_str, Res};

/// Base time and increment of a match, both in seconds.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct TimeControl {
    pub base_seconds: u32,
    pub increment_seconds: u32,
}

impl Default for TimeControl {
    fn default() -> Self {
        Self { base_seconds: 600, increment_seconds: 5 }
    }
}

impl Display for TimeControl {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{0}+{1}", self.base_seconds, self.increment_seconds)
    }
}

impl FromStr for TimeControl {
    type Err = anyhow::Error;

    /// Parses `base+increment`, for example `600+5`. The increment is optional.
    fn from_str(s: &str) -> Res<Self> {
        let mut parts = s.split('+');
        let base = parts.next().unwrap_or_default().trim();
        let base = parse_fp_from_str(base, "the base time")?;
        let increment = match parts.next() {
            Some(inc) => parse_fp_from_str(inc.trim(), "the increment")?,
            None => 0.0,
        };
        if parts.next().is_some() {
            bail!("A time control has at most one '+', but '{s}' has more");
        }
        if increment < 0.0 {
            bail!("The increment can't be negative, but got '{s}'");
        }
        let res = Self { base_seconds: base.round() as u32, increment_seconds: increment.round() as u32 };
        if res.base_seconds == 0 {
            bail!("The base time must be at least one second, but got '{s}'");
        }
        Ok(res)
    }
}

impl TimeControl {
    pub fn base_ms(&self) -> i64 {
        i64::from(self.base_seconds) * 1000
    }

    pub fn increment_ms(&self) -> i64 {
        i64::from(self.increment_seconds) * 1000
    }
}

/// Where the clock gets the current time from. Tests use a [`ManualTimeSource`].
pub trait TimeSource: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Copy, Clone)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A time source that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualTimeSource(Arc<Mutex<DateTime<Utc>>>);

impl Default for ManualTimeSource {
    fn default() -> Self {
        Self::starting_at(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl ManualTimeSource {
    pub fn starting_at(time: DateTime<Utc>) -> Self {
        Self(Arc::new(Mutex::new(time)))
    }

    pub fn advance_ms(&self, ms: i64) {
        let mut time = self.0.lock().unwrap_or_else(|e| e.into_inner());
        *time += TimeDelta::milliseconds(ms);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Countdown clock of both players. Only the side to move loses time, and the stored values only change in
/// [`Self::commit_turn`]; everything else is computed from the time of the last commit.
///
/// The last update is a wall clock timestamp, so a restored clock also counts the time the match wasn't loaded.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct GameClock {
    time_control: TimeControl,
    remaining_ms: [i64; 2],
    #[serde(with = "chrono::serde::ts_milliseconds")]
    last_update: DateTime<Utc>,
    running: Color,
    frozen: bool,
}

impl GameClock {
    pub fn new(time_control: TimeControl, now: DateTime<Utc>) -> Self {
        Self {
            time_control,
            remaining_ms: [time_control.base_ms(); 2],
            last_update: now,
            running: Color::White,
            frozen: false,
        }
    }

    pub fn time_control(&self) -> TimeControl {
        self.time_control
    }

    pub fn running(&self) -> Color {
        self.running
    }

    pub fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_update).num_milliseconds().max(0)
    }

    /// Can become negative, which means that `color` has run out of time.
    pub fn calculate_time_left(&self, color: Color, now: DateTime<Utc>) -> i64 {
        let stored = self.remaining_ms[color.idx()];
        if self.frozen || color != self.running {
            stored
        } else {
            stored - self.elapsed_ms(now)
        }
    }

    /// Called once per ply for the side that just moved: subtracts the time it used, adds the increment and
    /// starts the opponent's clock.
    pub fn commit_turn(&mut self, color: Color, now: DateTime<Utc>) {
        if self.frozen {
            return;
        }
        let elapsed = self.elapsed_ms(now);
        self.remaining_ms[color.idx()] += self.time_control.increment_ms() - elapsed;
        self.last_update = now;
        self.running = color.other();
    }

    pub fn reset(&mut self, now: DateTime<Utc>) {
        *self = Self::new(self.time_control, now);
    }

    /// Stops the clock for good, keeping the times as they are at `now`.
    pub fn freeze(&mut self, now: DateTime<Utc>) {
        if self.frozen {
            return;
        }
        let running = self.running;
        self.remaining_ms[running.idx()] = self.calculate_time_left(running, now);
        self.last_update = now;
        self.frozen = true;
    }

    pub fn is_flagged(&self, color: Color, now: DateTime<Utc>) -> bool {
        self.calculate_time_left(color, now) <= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Color::{Black, White};

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::milliseconds(ms)
    }

    #[test]
    fn time_control_parse_test() {
        let tc = TimeControl::from_str("600+5").unwrap();
        assert_eq!(tc, TimeControl { base_seconds: 600, increment_seconds: 5 });
        assert_eq!(tc.to_string(), "600+5");
        assert_eq!(TimeControl::from_str(" 180 ").unwrap().increment_seconds, 0);
        assert_eq!(TimeControl::from_str("0.6+0").unwrap().base_seconds, 1);
        for invalid in ["", "+5", "0+1", "0.4+0", "-3+0", "60+-1", "1+2+3", "abc", "inf"] {
            assert!(TimeControl::from_str(invalid).is_err(), "{invalid}");
        }
    }

    #[test]
    fn commit_turn_test() {
        let tc = TimeControl { base_seconds: 60, increment_seconds: 2 };
        let mut clock = GameClock::new(tc, at(0));
        assert_eq!(clock.calculate_time_left(White, at(1500)), 58_500);
        assert_eq!(clock.calculate_time_left(Black, at(1500)), 60_000);
        clock.commit_turn(White, at(1500));
        assert_eq!(clock.calculate_time_left(White, at(1500)), 60_000 - 1500 + 2000);
        assert_eq!(clock.calculate_time_left(Black, at(1500)), 60_000);
        assert_eq!(clock.running(), Black);
        assert_eq!(clock.calculate_time_left(White, at(9000)), 60_500);
        assert_eq!(clock.calculate_time_left(Black, at(9000)), 60_000 - 7500);
    }

    #[test]
    fn timeout_and_freeze_test() {
        let tc = TimeControl { base_seconds: 1, increment_seconds: 0 };
        let mut clock = GameClock::new(tc, at(0));
        assert!(!clock.is_flagged(White, at(999)));
        assert!(clock.is_flagged(White, at(1000)));
        assert_eq!(clock.calculate_time_left(White, at(3000)), -2000);
        clock.freeze(at(400));
        assert!(clock.is_frozen());
        assert_eq!(clock.calculate_time_left(White, at(100_000)), 600);
        clock.commit_turn(White, at(100_000));
        assert_eq!(clock.calculate_time_left(White, at(100_000)), 600);
        clock.reset(at(5));
        assert!(!clock.is_frozen());
        assert_eq!(clock.calculate_time_left(White, at(5)), 1000);
    }

    #[test]
    fn manual_time_source_test() {
        let source = ManualTimeSource::default();
        let shared = source.clone();
        source.advance_ms(1234);
        assert_eq!(shared.now(), at(1234));
        assert!(SystemTimeSource.now() > at(0));
    }

    #[test]
    fn serde_test() {
        let clock = GameClock::new(TimeControl::default(), at(42));
        let json = serde_json::to_string(&clock).unwrap();
        let restored: GameClock = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, clock);
    }
}
