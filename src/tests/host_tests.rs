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
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::bail;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};

use crate::board::pieces::Color::{Black, White};
use crate::clock::{ManualTimeSource, TimeControl};
use crate::config::SessionConfig;
use crate::draw::DrawRequestOutcome;
use crate::error::GameError;
use crate::general::common::Res;
use crate::general::squares::Point;
use crate::session::events::GameEvent;
use crate::session::services::{
    GameArchive, MemoryArchive, MemoryRatings, MemorySessionStore, RandomTokens, Services, SessionStore,
    StaticIdentities,
};
use crate::session::{EndReason, GameRecord, GameResult, Outcome};
use crate::GameHost;

fn sq(s: &str) -> Point {
    s.parse().unwrap()
}

fn fast_config() -> SessionConfig {
    SessionConfig { tick_interval_ms: 5, finalize_retry_delay_ms: 1, ..SessionConfig::default() }
}

const MINUTE: Option<TimeControl> = Some(TimeControl { base_seconds: 60, increment_seconds: 0 });

struct Fixture {
    host: GameHost,
    time: ManualTimeSource,
    ratings: Arc<MemoryRatings>,
    archive: Arc<MemoryArchive>,
    store: Arc<MemorySessionStore>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_store(fast_config(), Arc::default())
    }

    fn with_store(config: SessionConfig, store: Arc<MemorySessionStore>) -> Self {
        let time = ManualTimeSource::default();
        let ratings = Arc::new(MemoryRatings::default());
        let archive = Arc::new(MemoryArchive::default());
        let identities = StaticIdentities::default()
            .with_user("alice", "Alice", Some(1500))
            .with_user("bob", "Bob", Some(1600))
            .with_user("carol", "Carol", None);
        let services = Services {
            identities: Arc::new(identities),
            ratings: ratings.clone(),
            archive: archive.clone(),
            store: store.clone(),
            tokens: Arc::new(RandomTokens::default()),
            time: Arc::new(time.clone()),
        };
        Self { host: GameHost::new(config, services), time, ratings, archive, store }
    }

    async fn start(&self) -> String {
        self.host.start_game("alice", "bob", MINUTE, true).await.unwrap()
    }
}

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..400 {
        if check() {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("Timed out waiting until {what}");
}

async fn next_event(events: &mut broadcast::Receiver<GameEvent>) -> GameEvent {
    timeout(Duration::from_secs(2), events.recv()).await.expect("no event arrived").unwrap()
}

#[tokio::test]
async fn play_moves_test() {
    let fixture = Fixture::new();
    let host = &fixture.host;
    let token = fixture.start().await;
    assert_eq!(host.active_games(), 1);
    fixture.time.advance_ms(2000);
    let played = host.make_move(&token, "alice", sq("b1"), sq("c3"), None).await.unwrap();
    assert_eq!(played.san, "Hc3");
    assert_eq!(host.make_move(&token, "alice", sq("c3"), sq("b1"), None).await, Err(GameError::NotYourTurn));
    assert_eq!(host.make_move(&token, "carol", sq("b10"), sq("c8"), None).await, Err(GameError::PlayerInvalid));
    assert!(matches!(
        host.make_move(&token, "bob", sq("b10"), sq("b9"), None).await,
        Err(GameError::MoveInvalid { .. })
    ));

    let for_bob = host.get_state(&token, "bob").await.unwrap();
    assert_eq!(for_bob.side_to_move, Black);
    assert!(for_bob.legal_moves.is_some());
    assert_eq!(for_bob.clocks.white_ms, 58_000);
    assert_eq!(for_bob.history.len(), 1);
    let for_carol = host.get_state(&token, "carol").await.unwrap();
    assert!(for_carol.legal_moves.is_none());
    assert_eq!(for_carol.fen, for_bob.fen);

    assert_eq!(host.make_move("nope", "alice", sq("b1"), sq("c3"), None).await, Err(GameError::GameNotFound));
    assert_eq!(host.result(&token).await, Err(GameError::GameNotOver));
    assert_eq!(host.result("nope").await, Err(GameError::GameNotFound));
    // the snapshot is saved before the reply arrives
    assert_eq!(fixture.store.load(&token).unwrap().unwrap().history.len(), 1);
}

#[tokio::test]
async fn start_game_test() {
    let fixture = Fixture::new();
    let host = &fixture.host;
    assert_eq!(host.start_game("alice", "mallory", None, false).await, Err(GameError::PlayerInvalid));
    assert_eq!(host.start_game("alice", "alice", None, false).await, Err(GameError::PlayerInvalid));
    assert_eq!(host.active_games(), 0);
    let token = host.start_game("carol", "alice", None, false).await.unwrap();
    let state = host.get_state(&token, "alice").await.unwrap();
    assert_eq!(state.white.user_id, "carol");
    assert_eq!(state.clocks.black_ms, host.config().default_time_control.base_ms());
    assert_ne!(fixture.start().await, token);
}

#[tokio::test]
async fn resign_finalizes_test() {
    let fixture = Fixture::new();
    let host = &fixture.host;
    let token = fixture.start().await;
    host.make_move(&token, "alice", sq("b1"), sq("c3"), None).await.unwrap();
    host.make_move(&token, "bob", sq("b10"), sq("c8"), None).await.unwrap();
    let result = host.resign(&token, "alice").await.unwrap();
    assert_eq!(result, GameResult::win(Black, EndReason::Resignation));
    assert_eq!(host.make_move(&token, "alice", sq("c3"), sq("b1"), None).await, Err(GameError::GameAlreadyEnded));

    eventually("the game is finalized", || fixture.store.tokens().unwrap().is_empty()).await;
    assert_eq!(host.result(&token).await, Ok(result));
    assert_eq!(host.active_games(), 0);
    let archived = fixture.archive.games();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].history.len(), 2);
    assert_eq!(archived[0].history[1].san, "Hc8");
    assert_eq!(fixture.ratings.recorded().len(), 1);
    assert_eq!(host.get_state(&token, "bob").await, Err(GameError::GameAlreadyEnded));
    assert_eq!(host.request_draw(&token, "bob").await, Err(GameError::GameAlreadyEnded));
}

#[tokio::test]
async fn early_resignation_aborts_test() {
    let fixture = Fixture::new();
    let token = fixture.start().await;
    fixture.host.make_move(&token, "alice", sq("b1"), sq("c3"), None).await.unwrap();
    let result = fixture.host.resign(&token, "bob").await.unwrap();
    assert_eq!(result.outcome, Outcome::Aborted);
    eventually("the game is archived", || fixture.archive.games().len() == 1).await;
    assert!(fixture.ratings.recorded().is_empty());
}

#[tokio::test]
async fn timeout_test() {
    let fixture = Fixture::new();
    let mut events = fixture.host.subscribe();
    let token = fixture.start().await;
    fixture.time.advance_ms(59_000);
    sleep(Duration::from_millis(30)).await;
    assert_eq!(fixture.host.result(&token).await, Err(GameError::GameNotOver));
    fixture.time.advance_ms(1000);
    let event = next_event(&mut events).await;
    assert_eq!(event, GameEvent::GameEnded { token: token.clone(), result: GameResult::win(Black, EndReason::Timeout) });
    eventually("the result is known", || fixture.archive.games().len() == 1).await;
    assert_eq!(fixture.host.result(&token).await.unwrap().reason, EndReason::Timeout);
}

#[tokio::test]
async fn move_after_flag_fall_test() {
    // the clock task won't get to check before the move arrives
    let config = SessionConfig { tick_interval_ms: 3_600_000, ..fast_config() };
    let fixture = Fixture::with_store(config, Arc::default());
    let mut events = fixture.host.subscribe();
    let token = fixture.start().await;
    fixture.time.advance_ms(61_000);
    assert_eq!(
        fixture.host.make_move(&token, "alice", sq("b1"), sq("c3"), None).await,
        Err(GameError::GameAlreadyEnded)
    );
    let event = next_event(&mut events).await;
    assert_eq!(event, GameEvent::GameEnded { token: token.clone(), result: GameResult::win(Black, EndReason::Timeout) });
    assert_eq!(fixture.host.result(&token).await.unwrap().reason, EndReason::Timeout);
    eventually("the game is archived", || fixture.archive.games().len() == 1).await;
    assert!(fixture.archive.games()[0].history.is_empty());
}

#[tokio::test]
async fn draw_events_test() {
    let fixture = Fixture::new();
    let host = &fixture.host;
    let mut events = host.subscribe();
    let token = fixture.start().await;
    host.make_move(&token, "alice", sq("e2"), sq("e4"), None).await.unwrap();
    let GameEvent::MoveMade { san, clocks, .. } = next_event(&mut events).await else {
        panic!("expected a move");
    };
    assert_eq!(san, "e4");
    assert_eq!(clocks.running, Some(Black));

    assert_eq!(host.request_draw(&token, "alice").await, Ok(DrawRequestOutcome::Offered));
    assert_eq!(next_event(&mut events).await, GameEvent::DrawRequested { token: token.clone(), requester: White });
    assert_eq!(host.decline_draw(&token, "alice").await, Err(GameError::DrawNotRequested));
    assert_eq!(host.decline_draw(&token, "bob").await, Ok(()));
    assert_eq!(next_event(&mut events).await, GameEvent::DrawDeclined { token: token.clone(), requester: White });
    assert_eq!(host.request_draw(&token, "alice").await, Err(GameError::DrawOnCooldown(3)));

    assert_eq!(host.request_draw(&token, "bob").await, Ok(DrawRequestOutcome::Offered));
    _ = next_event(&mut events).await;
    assert_eq!(host.request_draw(&token, "alice").await, Ok(DrawRequestOutcome::Accepted));
    assert_eq!(
        next_event(&mut events).await,
        GameEvent::GameEnded { token: token.clone(), result: GameResult::draw(EndReason::Agreement) }
    );
}

#[tokio::test]
async fn threefold_repetition_test() {
    let fixture = Fixture::new();
    let host = &fixture.host;
    let token = fixture.start().await;
    let shuffle = [("alice", "b1", "c3"), ("bob", "b10", "c8"), ("alice", "c3", "b1"), ("bob", "c8", "b10")];
    for (user, from, to) in shuffle.iter().cycle().take(7) {
        host.make_move(&token, user, sq(from), sq(to), None).await.unwrap();
    }
    assert_eq!(host.result(&token).await, Err(GameError::GameNotOver));
    host.make_move(&token, "bob", sq("c8"), sq("b10"), None).await.unwrap();
    eventually("the game is finalized", || fixture.archive.games().len() == 1).await;
    assert_eq!(host.result(&token).await, Ok(GameResult::draw(EndReason::Threefold)));
}

#[tokio::test]
async fn concurrent_moves_test() {
    let fixture = Fixture::new();
    let token = fixture.start().await;
    let attempts = (0..10).map(|_| {
        let host = fixture.host.clone();
        let token = token.clone();
        tokio::spawn(async move { host.make_move(&token, "alice", sq("b1"), sq("c3"), None).await })
    });
    let mut successes = 0;
    for attempt in attempts.collect::<Vec<_>>() {
        match attempt.await.unwrap() {
            Ok(_) => successes += 1,
            Err(err) => assert!(matches!(err, GameError::NotYourTurn | GameError::MoveInvalid { .. }), "{err}"),
        }
    }
    assert_eq!(successes, 1);
    let state = fixture.host.get_state(&token, "bob").await.unwrap();
    assert_eq!(state.history.len(), 1);
}

#[tokio::test]
async fn reactivation_test() {
    let store = Arc::new(MemorySessionStore::default());
    let first = Fixture::with_store(fast_config(), store.clone());
    let token = first.start().await;
    first.host.make_move(&token, "alice", sq("b1"), sq("c3"), None).await.unwrap();

    // a second host with the same store, as after a restart
    let second = Fixture::with_store(fast_config(), store.clone());
    assert_eq!(second.host.active_games(), 0);
    let played = second.host.make_move(&token, "bob", sq("b10"), sq("c8"), None).await.unwrap();
    assert_eq!(played.san, "Hc8");
    assert_eq!(second.host.active_games(), 1);
    assert_eq!(second.host.get_state(&token, "alice").await.unwrap().history.len(), 2);

    let third = Fixture::with_store(fast_config(), store);
    assert_eq!(third.host.resume_all().await.unwrap(), 1);
    assert_eq!(third.host.active_games(), 1);
    // already running, so there is nothing to resume
    assert_eq!(third.host.resume_all().await.unwrap(), 0);
    assert_eq!(third.host.active_games(), 1);
    assert!(!third.host.reactivate("nope").await.unwrap());
}

#[derive(Debug, Default)]
struct FlakyArchive {
    failures_left: AtomicU32,
    games: Mutex<Vec<GameRecord>>,
}

impl GameArchive for FlakyArchive {
    fn archive(&self, game: &GameRecord) -> Res<()> {
        if self.failures_left.load(SeqCst) > 0 {
            _ = self.failures_left.fetch_sub(1, SeqCst);
            bail!("The archive is down");
        }
        self.games.lock().unwrap().push(game.clone());
        Ok(())
    }
}

fn host_with_archive(archive: Arc<FlakyArchive>, store: Arc<MemorySessionStore>, retries: u32) -> GameHost {
    let identities = StaticIdentities::default().with_user("alice", "Alice", None).with_user("bob", "Bob", None);
    let services = Services { archive, store, ..Services::in_memory(identities) };
    GameHost::new(SessionConfig { finalize_retries: retries, ..fast_config() }, services)
}

#[tokio::test]
async fn finalization_retry_test() {
    let archive = Arc::new(FlakyArchive { failures_left: AtomicU32::new(2), ..FlakyArchive::default() });
    let store = Arc::new(MemorySessionStore::default());
    let host = host_with_archive(archive.clone(), store.clone(), 3);
    let token = host.start_game("alice", "bob", MINUTE, false).await.unwrap();
    _ = host.resign(&token, "bob").await.unwrap();
    eventually("the game is archived", || archive.games.lock().unwrap().len() == 1).await;
    eventually("the snapshot is removed", || store.tokens().unwrap().is_empty()).await;
}

#[tokio::test]
async fn failed_finalization_is_retried_by_the_same_host_test() {
    let archive = Arc::new(FlakyArchive { failures_left: AtomicU32::new(2), ..FlakyArchive::default() });
    let store = Arc::new(MemorySessionStore::default());
    let host = host_with_archive(archive.clone(), store.clone(), 2);
    let token = host.start_game("alice", "bob", MINUTE, false).await.unwrap();
    let result = host.resign(&token, "bob").await.unwrap();
    eventually("both attempts failed", || archive.failures_left.load(SeqCst) == 0).await;
    assert!(archive.games.lock().unwrap().is_empty());

    // nothing is scheduled while the first finalization is still running
    let mut resumed = 0;
    for _ in 0..400 {
        resumed = host.resume_all().await.unwrap();
        if resumed > 0 {
            break;
        }
        sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(resumed, 1);
    assert_eq!(host.result(&token).await, Ok(result));
    assert_eq!(host.make_move(&token, "alice", sq("b1"), sq("c3"), None).await, Err(GameError::GameAlreadyEnded));
    eventually("the game is archived", || archive.games.lock().unwrap().len() == 1).await;
    eventually("the snapshot is removed", || store.tokens().unwrap().is_empty()).await;
    assert_eq!(host.resume_all().await.unwrap(), 0);
    assert_eq!(archive.games.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn ended_games_are_forgotten_test() {
    let config = SessionConfig { ended_games_retained: 1, ..fast_config() };
    let fixture = Fixture::with_store(config, Arc::default());
    let host = &fixture.host;
    let first = fixture.start().await;
    let second = fixture.start().await;
    _ = host.resign(&first, "alice").await.unwrap();
    _ = host.resign(&second, "bob").await.unwrap();
    eventually("both games are archived", || fixture.archive.games().len() == 2).await;

    let mut forgotten = vec![];
    for _ in 0..400 {
        forgotten.clear();
        for token in [&first, &second] {
            if host.result(token).await == Err(GameError::GameNotFound) {
                forgotten.push(token.clone());
            }
        }
        if !forgotten.is_empty() {
            break;
        }
        sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(forgotten.len(), 1);
    let remembered = if forgotten[0] == first { &second } else { &first };
    assert!(host.result(remembered).await.is_ok());
    assert_eq!(host.get_state(remembered, "bob").await, Err(GameError::GameAlreadyEnded));
    assert_eq!(host.get_state(&forgotten[0], "bob").await, Err(GameError::GameNotFound));
}

#[tokio::test]
async fn failed_finalization_is_resumed_test() {
    let archive = Arc::new(FlakyArchive { failures_left: AtomicU32::new(5), ..FlakyArchive::default() });
    let store = Arc::new(MemorySessionStore::default());
    let host = host_with_archive(archive.clone(), store.clone(), 2);
    let token = host.start_game("alice", "bob", MINUTE, false).await.unwrap();
    let result = host.resign(&token, "bob").await.unwrap();
    eventually("both attempts failed", || archive.failures_left.load(SeqCst) == 3).await;
    eventually("the progress is saved", || {
        store.load(&token).unwrap().is_some_and(|s| s.needs_finalization() && s.result == Some(result))
    })
    .await;
    assert!(archive.games.lock().unwrap().is_empty());

    // after a restart, the finalization is tried again
    archive.failures_left.store(0, SeqCst);
    let restarted = host_with_archive(archive.clone(), store.clone(), 2);
    assert_eq!(restarted.resume_all().await.unwrap(), 1);
    assert_eq!(restarted.result(&token).await, Ok(result));
    assert_eq!(restarted.make_move(&token, "alice", sq("b1"), sq("c3"), None).await, Err(GameError::GameAlreadyEnded));
    eventually("the game is archived", || archive.games.lock().unwrap().len() == 1).await;
    eventually("the snapshot is removed", || store.tokens().unwrap().is_empty()).await;
}
