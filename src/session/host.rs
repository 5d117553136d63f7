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

//! Every match runs in its own task, which owns the [`GameSession`] and processes the commands from its mailbox
//! one after another, interleaved with clock ticks. The [`GameHost`] only knows how to reach these tasks.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::spawn_blocking;
use tokio::time::{interval, sleep, MissedTickBehavior};

use crate::board::pieces::PieceType;
use crate::clock::TimeControl;
use crate::config::SessionConfig;
use crate::draw::DrawRequestOutcome;
use crate::error::GameError;
use crate::game::PlayedMove;
use crate::general::common::Res;
use crate::general::squares::Point;
use crate::session::events::GameEvent;
use crate::session::host::SessionReceives::*;
use crate::session::services::Services;
use crate::session::{GameResult, GameSession, GameStateView, GameToken, Lifecycle, PlayerInfo, Roster, UserId};

type Reply<T> = oneshot::Sender<Result<T, GameError>>;

/// The mailbox messages of a match task. Every command carries the channel its answer goes to.
#[derive(Debug)]
pub enum SessionReceives {
    Start { roster: Roster, time_control: TimeControl, ranked: bool, reply: Reply<()> },
    MakeMove { user: UserId, from: Point, to: Point, promotes_to: Option<PieceType>, reply: Reply<PlayedMove> },
    RequestDraw { user: UserId, reply: Reply<DrawRequestOutcome> },
    DeclineDraw { user: UserId, reply: Reply<()> },
    Resign { user: UserId, reply: Reply<GameResult> },
    GetState { user: UserId, reply: Reply<GameStateView> },
}

impl SessionReceives {
    fn reject(self, err: GameError) {
        match self {
            Start { reply, .. } => {
                _ = reply.send(Err(err));
            }
            MakeMove { reply, .. } => {
                _ = reply.send(Err(err));
            }
            RequestDraw { reply, .. } => {
                _ = reply.send(Err(err));
            }
            DeclineDraw { reply, .. } => {
                _ = reply.send(Err(err));
            }
            Resign { reply, .. } => {
                _ = reply.send(Err(err));
            }
            GetState { reply, .. } => {
                _ = reply.send(Err(err));
            }
        }
    }
}

/// Ended matches stay in the registry for a while, so that late commands can be told apart from unknown tokens.
#[derive(Debug, Clone)]
enum Entry {
    Active(mpsc::Sender<SessionReceives>),
    /// Being rated and archived right now.
    Finalizing(GameResult),
    Ended(GameResult),
}

#[derive(Debug, Default)]
struct Registry {
    entries: HashMap<GameToken, Entry>,
    /// Exactly the tokens with an `Ended` entry, oldest first.
    ended: VecDeque<GameToken>,
}

impl Registry {
    fn begin_finalizing(&mut self, token: &str, result: GameResult) {
        if let Some(Entry::Ended(_)) = self.entries.insert(token.to_string(), Entry::Finalizing(result)) {
            self.ended.retain(|t| t != token);
        }
    }

    /// Keeps at most `retained` tombstones. Evicted matches are only known to the store, if at all.
    fn end(&mut self, token: &str, result: GameResult, retained: usize) {
        if !matches!(self.entries.insert(token.to_string(), Entry::Ended(result)), Some(Entry::Ended(_))) {
            self.ended.push_back(token.to_string());
        }
        while self.ended.len() > retained {
            let Some(oldest) = self.ended.pop_front() else {
                break;
            };
            _ = self.entries.remove(&oldest);
        }
    }
}

#[derive(Debug)]
struct HostState {
    config: SessionConfig,
    services: Services,
    registry: Mutex<Registry>,
    events: broadcast::Sender<GameEvent>,
}

/// Runs the collaborator calls, which may block, outside of the async workers.
async fn blocking<T: Send + 'static>(f: impl FnOnce() -> Res<T> + Send + 'static) -> Res<T> {
    spawn_blocking(f).await?
}

/// Cheap to clone; all clones refer to the same matches.
#[derive(Debug, Clone)]
pub struct GameHost {
    state: Arc<HostState>,
}

impl GameHost {
    pub fn new(config: SessionConfig, services: Services) -> Self {
        let (events, _) = broadcast::channel(config.mailbox_capacity.max(16));
        let state = HostState { config, services, registry: Mutex::default(), events };
        Self { state: Arc::new(state) }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.state.config
    }

    pub fn services(&self) -> &Services {
        &self.state.services
    }

    /// Events of all matches of this host. Subscribers only get events sent after subscribing.
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.state.events.subscribe()
    }

    fn now(&self) -> DateTime<Utc> {
        self.state.services.time.now()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.state.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn entry(&self, token: &str) -> Option<Entry> {
        self.registry().entries.get(token).cloned()
    }

    pub fn active_games(&self) -> usize {
        self.registry().entries.values().filter(|e| matches!(e, Entry::Active(_))).count()
    }

    async fn lookup(&self, user: &str) -> Result<PlayerInfo, GameError> {
        let identities = self.state.services.identities.clone();
        let name = user.to_string();
        blocking(move || identities.lookup(&name)).await.map_err(|err| {
            warn!("Couldn't look up user '{user}': {err:#}");
            GameError::PlayerInvalid
        })
    }

    fn new_token(&self) -> GameToken {
        let registry = self.registry();
        loop {
            let token = self.state.services.tokens.generate();
            if !registry.entries.contains_key(&token) {
                return token;
            }
        }
    }

    /// Creates a match between two known users and returns its token.
    /// Without a time control, the configured default is used.
    pub async fn start_game(
        &self,
        white: &str,
        black: &str,
        time_control: Option<TimeControl>,
        ranked: bool,
    ) -> Result<GameToken, GameError> {
        if white == black {
            return Err(GameError::PlayerInvalid);
        }
        let roster = Roster { white: self.lookup(white).await?, black: self.lookup(black).await? };
        let time_control = time_control.unwrap_or(self.config().default_time_control);
        let token = self.new_token();
        let session = GameSession::new(token.clone(), self.config().clone(), self.now());
        let Some(sender) = self.spawn_actor(session) else {
            return Err(GameError::GameAlreadyEnded);
        };
        self.request(&token, &sender, |reply| Start { roster, time_control, ranked, reply }).await?;
        Ok(token)
    }

    pub async fn make_move(
        &self,
        token: &str,
        user: &str,
        from: Point,
        to: Point,
        promotes_to: Option<PieceType>,
    ) -> Result<PlayedMove, GameError> {
        let user = user.to_string();
        self.route(token, |reply| MakeMove { user, from, to, promotes_to, reply }).await
    }

    pub async fn request_draw(&self, token: &str, user: &str) -> Result<DrawRequestOutcome, GameError> {
        let user = user.to_string();
        self.route(token, |reply| RequestDraw { user, reply }).await
    }

    pub async fn decline_draw(&self, token: &str, user: &str) -> Result<(), GameError> {
        let user = user.to_string();
        self.route(token, |reply| DeclineDraw { user, reply }).await
    }

    pub async fn resign(&self, token: &str, user: &str) -> Result<GameResult, GameError> {
        let user = user.to_string();
        self.route(token, |reply| Resign { user, reply }).await
    }

    /// Players and spectators alike can ask for the state; legal moves are only included for the player to move.
    pub async fn get_state(&self, token: &str, user: &str) -> Result<GameStateView, GameError> {
        let user = user.to_string();
        self.route(token, |reply| GetState { user, reply }).await
    }

    pub async fn result(&self, token: &str) -> Result<GameResult, GameError> {
        match self.entry(token) {
            Some(Entry::Finalizing(result) | Entry::Ended(result)) => return Ok(result),
            Some(Entry::Active(_)) => return Err(GameError::GameNotOver),
            None => {}
        }
        let store = self.state.services.store.clone();
        let name = token.to_string();
        match blocking(move || store.load(&name)).await {
            Ok(Some(snapshot)) => snapshot.result.ok_or(GameError::GameNotOver),
            Ok(None) => Err(GameError::GameNotFound),
            Err(err) => {
                error!("Couldn't load game {token}: {err:#}");
                Err(GameError::HostUnavailable)
            }
        }
    }

    async fn route<T>(&self, token: &str, make: impl FnOnce(Reply<T>) -> SessionReceives) -> Result<T, GameError> {
        let entry = match self.entry(token) {
            Some(entry) => entry,
            // a concurrent request may have reactivated the match, so this looks at the registry again
            None => match self.reactivate(token).await {
                Ok(_) => self.entry(token).ok_or(GameError::GameNotFound)?,
                Err(err) => {
                    error!("Couldn't reactivate game {token}: {err:#}");
                    return Err(GameError::HostUnavailable);
                }
            },
        };
        match entry {
            Entry::Active(sender) => self.request(token, &sender, make).await,
            Entry::Finalizing(_) | Entry::Ended(_) => Err(GameError::GameAlreadyEnded),
        }
    }

    async fn request<T>(
        &self,
        token: &str,
        sender: &mpsc::Sender<SessionReceives>,
        make: impl FnOnce(Reply<T>) -> SessionReceives,
    ) -> Result<T, GameError> {
        let (reply, response) = oneshot::channel();
        if sender.send(make(reply)).await.is_err() {
            return Err(self.closed_error(token));
        }
        response.await.unwrap_or_else(|_| Err(self.closed_error(token)))
    }

    /// The mailbox of a match closes when it ends, or if its task died.
    fn closed_error(&self, token: &str) -> GameError {
        match self.entry(token) {
            Some(Entry::Finalizing(_) | Entry::Ended(_)) => GameError::GameAlreadyEnded,
            _ => GameError::HostUnavailable,
        }
    }

    /// Registers and spawns the task of a running match. Returns `None` if the token is already known.
    fn spawn_actor(&self, session: GameSession) -> Option<mpsc::Sender<SessionReceives>> {
        let mut registry = self.registry();
        if registry.entries.contains_key(session.token()) {
            return None;
        }
        let (sender, receiver) = mpsc::channel(self.config().mailbox_capacity);
        _ = registry.entries.insert(session.token().clone(), Entry::Active(sender.clone()));
        let actor = SessionActor { host: self.clone(), session, receiver };
        _ = tokio::spawn(actor.main_loop());
        Some(sender)
    }

    /// Loads a match from the store. Running matches get a new task, finished ones are finalized again if that
    /// hasn't gone through yet, also when they ended on this host. Returns whether a task was started, so it's
    /// `false` for unknown tokens and for matches that already have a task.
    pub async fn reactivate(&self, token: &str) -> Res<bool> {
        if matches!(self.entry(token), Some(Entry::Active(_) | Entry::Finalizing(_))) {
            return Ok(false);
        }
        let store = self.state.services.store.clone();
        let name = token.to_string();
        let Some(snapshot) = blocking(move || store.load(&name)).await? else {
            return Ok(false);
        };
        let mut session = GameSession::restore(snapshot, self.config().clone())?;
        match session.result() {
            Ok(result) => {
                {
                    let mut registry = self.registry();
                    if matches!(registry.entries.get(token), Some(Entry::Active(_) | Entry::Finalizing(_))) {
                        return Ok(false);
                    }
                    registry.begin_finalizing(token, result);
                }
                info!("Finishing the finalization of game {token}");
                let host = self.clone();
                _ = tokio::spawn(async move { host.finish(&mut session, result).await });
                Ok(true)
            }
            Err(_) => {
                let spawned = self.spawn_actor(session).is_some();
                if spawned {
                    info!("Reactivating game {token}");
                }
                Ok(spawned)
            }
        }
    }

    /// Reactivates all stored matches, usually after a restart. Returns for how many that started a task.
    pub async fn resume_all(&self) -> Res<usize> {
        let store = self.state.services.store.clone();
        let tokens = blocking(move || store.tokens()).await?;
        let mut count = 0;
        for token in tokens {
            match self.reactivate(&token).await {
                Ok(true) => count += 1,
                Ok(false) => {}
                Err(err) => error!("Couldn't resume game {token}: {err:#}"),
            }
        }
        Ok(count)
    }

    fn publish(&self, events: Vec<GameEvent>) {
        for event in events {
            // nobody listening isn't an error
            _ = self.state.events.send(event);
        }
    }

    async fn persist(&self, session: &GameSession) {
        let store = self.state.services.store.clone();
        let snapshot = session.snapshot();
        let token = snapshot.token.clone();
        if let Err(err) = blocking(move || store.save(&snapshot)).await {
            error!("Couldn't save game {token}: {err:#}");
        }
    }

    /// Finalizes an ended match and then leaves a tombstone. If finalization failed, the next
    /// [`Self::reactivate`] of the token tries again.
    async fn finish(&self, session: &mut GameSession, result: GameResult) {
        self.finalize(session).await;
        self.registry().end(session.token(), result, self.config().ended_games_retained);
    }

    /// Rates and archives a finished match. Steps that succeeded are remembered in the stored snapshot,
    /// so no step runs twice. The snapshot is only removed once everything went through.
    async fn finalize(&self, session: &mut GameSession) {
        let record = match session.record() {
            Ok(record) => record,
            Err(err) => {
                error!("Game {0} can't be finalized: {err}", session.token());
                return;
            }
        };
        let services = &self.state.services;
        let retries = self.config().finalize_retries;
        for attempt in 1..=retries {
            let progress = session.finalization();
            if !progress.rated {
                if !record.ranked || !record.result.is_rated_outcome() {
                    session.finalization_mut().rated = true;
                } else {
                    let ratings = services.ratings.clone();
                    let game = record.clone();
                    match blocking(move || ratings.record_result(&game)).await {
                        Ok(()) => session.finalization_mut().rated = true,
                        Err(err) => warn!("Attempt {attempt}/{retries} to rate game {0} failed: {err:#}", record.token),
                    }
                }
            }
            if !progress.archived {
                let archive = services.archive.clone();
                let game = record.clone();
                match blocking(move || archive.archive(&game)).await {
                    Ok(()) => session.finalization_mut().archived = true,
                    Err(err) => warn!("Attempt {attempt}/{retries} to archive game {0} failed: {err:#}", record.token),
                }
            }
            self.persist(session).await;
            if session.finalization().is_complete() {
                break;
            }
            if attempt < retries {
                sleep(self.config().finalize_retry_delay()).await;
            }
        }
        if !session.finalization().is_complete() {
            error!("Giving up on finalizing game {0} for now, it stays stored until it's reactivated", record.token);
            return;
        }
        let store = services.store.clone();
        let token = record.token.clone();
        if let Err(err) = blocking(move || store.remove(&token)).await {
            error!("Couldn't remove the finished game {0} from the store: {err:#}", record.token);
        }
        info!("Game {0} is finalized", record.token);
    }
}

/// The task of one match.
struct SessionActor {
    host: GameHost,
    session: GameSession,
    receiver: mpsc::Receiver<SessionReceives>,
}

impl SessionActor {
    async fn main_loop(mut self) {
        let mut ticker = interval(self.host.config().tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            let playing = self.session.lifecycle() == Lifecycle::Playing;
            tokio::select! {
                received = self.receiver.recv() => match received {
                    Some(command) => self.handle_input(command).await,
                    None => break,
                },
                _ = ticker.tick(), if playing => {
                    if self.session.tick_clock(self.host.now()).is_some() {
                        self.after_change().await;
                    }
                }
            }
            if self.session.lifecycle() == Lifecycle::Finished {
                self.shut_down().await;
                return;
            }
        }
        debug!("The mailbox of game {0} was closed", self.session.token());
    }

    async fn handle_input(&mut self, received: SessionReceives) {
        let now = self.host.now();
        match received {
            Start { roster, time_control, ranked, reply } => {
                let res = self.session.start_game(roster, time_control, ranked, now);
                self.respond(reply, res).await
            }
            MakeMove { user, from, to, promotes_to, reply } => {
                let res = self.session.move_piece(&user, from, to, promotes_to, now);
                self.respond(reply, res).await
            }
            RequestDraw { user, reply } => {
                let res = self.session.request_draw(&user, now);
                self.respond(reply, res).await
            }
            DeclineDraw { user, reply } => {
                let res = self.session.decline_draw(&user);
                self.respond(reply, res).await
            }
            Resign { user, reply } => {
                let res = self.session.end_game(&user, now);
                self.respond(reply, res).await
            }
            GetState { user, reply } => {
                _ = reply.send(self.session.get_state(&user, now));
            }
        }
    }

    /// Failed commands haven't changed anything, unless the clock of the player had already run out.
    /// Changes are persisted before the reply is sent.
    async fn respond<T>(&mut self, reply: Reply<T>, res: Result<T, GameError>) {
        if res.is_ok() || self.session.lifecycle() == Lifecycle::Finished {
            self.after_change().await;
        }
        _ = reply.send(res);
    }

    async fn after_change(&mut self) {
        self.host.publish(self.session.drain_events());
        self.host.persist(&self.session).await;
    }

    async fn shut_down(mut self) {
        let token = self.session.token().clone();
        let result = match self.session.result() {
            Ok(result) => result,
            Err(err) => {
                error!("Game {token} stopped without a result: {err}");
                return;
            }
        };
        self.host.registry().begin_finalizing(&token, result);
        self.receiver.close();
        while let Some(late) = self.receiver.recv().await {
            late.reject(GameError::GameAlreadyEnded);
        }
        self.host.finish(&mut self.session, result).await;
        debug!("The task of game {token} has finished");
    }
}
