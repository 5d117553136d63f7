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

//! Everything the host needs from the outside world. The implementations in this file keep all data in
//! memory; they are used by the binary and in tests.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use log::info;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::clock::{SystemTimeSource, TimeSource};
use crate::general::common::Res;
use crate::session::snapshot::SessionSnapshot;
use crate::session::{GameRecord, GameToken, PlayerInfo, UserId};

pub trait IdentityLookup: Send + Sync + Debug {
    fn lookup(&self, user: &str) -> Res<PlayerInfo>;
}

pub trait RatingService: Send + Sync + Debug {
    /// Only called for ranked games that weren't aborted.
    fn record_result(&self, game: &GameRecord) -> Res<()>;
}

pub trait GameArchive: Send + Sync + Debug {
    fn archive(&self, game: &GameRecord) -> Res<()>;
}

/// Persistence of running matches, so that they survive a restart of the host.
pub trait SessionStore: Send + Sync + Debug {
    fn save(&self, snapshot: &SessionSnapshot) -> Res<()>;

    fn load(&self, token: &str) -> Res<Option<SessionSnapshot>>;

    fn remove(&self, token: &str) -> Res<()>;

    fn tokens(&self) -> Res<Vec<GameToken>>;
}

pub trait TokenGenerator: Send + Sync + Debug {
    fn generate(&self) -> GameToken;
}

/// The collaborators of a [`GameHost`](crate::session::host::GameHost).
#[derive(Debug, Clone)]
pub struct Services {
    pub identities: Arc<dyn IdentityLookup>,
    pub ratings: Arc<dyn RatingService>,
    pub archive: Arc<dyn GameArchive>,
    pub store: Arc<dyn SessionStore>,
    pub tokens: Arc<dyn TokenGenerator>,
    pub time: Arc<dyn TimeSource>,
}

impl Services {
    /// In-memory services with the given users and the system clock.
    pub fn in_memory(identities: StaticIdentities) -> Self {
        Self {
            identities: Arc::new(identities),
            ratings: Arc::new(MemoryRatings::default()),
            archive: Arc::new(MemoryArchive::default()),
            store: Arc::new(MemorySessionStore::default()),
            tokens: Arc::new(RandomTokens::default()),
            time: Arc::new(SystemTimeSource),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Default, Clone)]
pub struct StaticIdentities {
    users: HashMap<UserId, PlayerInfo>,
}

impl StaticIdentities {
    pub fn with_user(mut self, user_id: &str, display_name: &str, rating: Option<u32>) -> Self {
        let info = PlayerInfo { user_id: user_id.to_string(), display_name: display_name.to_string(), rating };
        _ = self.users.insert(user_id.to_string(), info);
        self
    }
}

impl IdentityLookup for StaticIdentities {
    fn lookup(&self, user: &str) -> Res<PlayerInfo> {
        self.users.get(user).cloned().ok_or_else(|| anyhow!("Unknown user '{user}'"))
    }
}

/// Doesn't compute ratings, only logs and remembers the games it was given.
#[derive(Debug, Default)]
pub struct MemoryRatings {
    recorded: Mutex<Vec<GameRecord>>,
}

impl MemoryRatings {
    pub fn recorded(&self) -> Vec<GameRecord> {
        lock(&self.recorded).clone()
    }
}

impl RatingService for MemoryRatings {
    fn record_result(&self, game: &GameRecord) -> Res<()> {
        info!(
            "Rating game {0}: {1} vs {2}, {3}",
            game.token, game.roster.white.display_name, game.roster.black.display_name, game.result
        );
        lock(&self.recorded).push(game.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryArchive {
    games: Mutex<Vec<GameRecord>>,
}

impl MemoryArchive {
    pub fn games(&self) -> Vec<GameRecord> {
        lock(&self.games).clone()
    }
}

impl GameArchive for MemoryArchive {
    fn archive(&self, game: &GameRecord) -> Res<()> {
        lock(&self.games).push(game.clone());
        Ok(())
    }
}

/// Stores snapshots as JSON, like a real store would.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    snapshots: Mutex<HashMap<GameToken, String>>,
}

impl SessionStore for MemorySessionStore {
    fn save(&self, snapshot: &SessionSnapshot) -> Res<()> {
        let json = snapshot.to_json()?;
        _ = lock(&self.snapshots).insert(snapshot.token.clone(), json);
        Ok(())
    }

    fn load(&self, token: &str) -> Res<Option<SessionSnapshot>> {
        let Some(json) = lock(&self.snapshots).get(token).cloned() else {
            return Ok(None);
        };
        SessionSnapshot::from_json(&json).map(Some)
    }

    fn remove(&self, token: &str) -> Res<()> {
        _ = lock(&self.snapshots).remove(token);
        Ok(())
    }

    fn tokens(&self) -> Res<Vec<GameToken>> {
        Ok(lock(&self.snapshots).keys().cloned().collect())
    }
}

#[derive(Debug, Copy, Clone)]
pub struct RandomTokens {
    pub length: usize,
}

impl Default for RandomTokens {
    fn default() -> Self {
        Self { length: 12 }
    }
}

impl TokenGenerator for RandomTokens {
    fn generate(&self) -> GameToken {
        rand::thread_rng().sample_iter(&Alphanumeric).take(self.length).map(char::from).collect()
    }
}
