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
use std::process::exit;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::timeout;

use levers::board::pieces::Color;
use levers::config::SessionConfig;
use levers::draw::DrawRequestOutcome;
use levers::general::common::Res;
use levers::session::events::GameEvent;
use levers::session::services::{Services, StaticIdentities};
use levers::session::GameStateView;
use levers::{Board, GameError, GameHost};

use crate::cli::{CommandLineArgs, Input, HELP};

mod cli;
mod logger;

const WHITE: &str = "white";
const BLACK: &str = "black";

fn user_of(color: Color) -> &'static str {
    match color {
        Color::White => WHITE,
        Color::Black => BLACK,
    }
}

fn format_ms(ms: i64) -> String {
    let ms = ms.max(0);
    format!("{0}:{1:02}.{2}", ms / 60_000, ms / 1000 % 60, ms / 100 % 10)
}

fn print_state(view: &GameStateView) -> Res<()> {
    let board = Board::from_fen(&view.fen)?;
    println!("{}", board.as_diagram());
    println!("{}", view.fen.dimmed());
    println!(
        "White {0}   Black {1}   {2} to move{3}",
        format_ms(view.clocks.white_ms),
        format_ms(view.clocks.black_ms),
        view.side_to_move,
        if view.has_forced_moves { " (forced)" } else { "" }
    );
    if let Some(offer) = view.draw_offer {
        println!("{offer} offers a draw");
    }
    Ok(())
}

/// Applies one line of input. Returns `false` if the program should stop.
async fn handle_input(host: &GameHost, token: &str, input: Input) -> Res<bool> {
    let to_move = host.get_state(token, WHITE).await?.side_to_move;
    let actor = |color: Option<Color>| user_of(color.unwrap_or(to_move));
    match input {
        Input::Move { from, to, promotes_to } => {
            let played = host.make_move(token, user_of(to_move), from, to, promotes_to).await?;
            println!("{0} played {1}", played.mover, played.san.bold());
        }
        Input::Draw(color) => match host.request_draw(token, actor(color)).await? {
            DrawRequestOutcome::Offered => println!("Draw offered"),
            DrawRequestOutcome::Accepted => println!("Draw accepted"),
        },
        Input::Decline(color) => host.decline_draw(token, actor(color)).await?,
        Input::Resign(color) => {
            _ = host.resign(token, actor(color)).await?;
        }
        Input::State => print_state(&host.get_state(token, user_of(to_move)).await?)?,
        Input::Help => println!("{HELP}"),
        Input::Quit => return Ok(false),
    }
    Ok(true)
}

async fn run(args: CommandLineArgs) -> Res<()> {
    logger::init(args.log_level)?;
    let config = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    let identities = StaticIdentities::default().with_user(WHITE, "White", None).with_user(BLACK, "Black", None);
    let host = GameHost::new(config, Services::in_memory(identities));
    let mut events = host.subscribe();
    let token = host.start_game(WHITE, BLACK, args.time_control, args.ranked).await?;

    // runs in the background, so that a timeout is reported even while waiting for input
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(GameEvent::GameEnded { result, .. }) => {
                    println!("{}", format!("Game over: {result}").bold());
                    return;
                }
                Ok(GameEvent::DrawDeclined { requester, .. }) => println!("The draw offer of {requester} was declined"),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return,
            }
        }
    });

    print_state(&host.get_state(&token, WHITE).await?)?;
    println!("{}", "Enter 'help' for a list of commands".dimmed());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let input = match line.parse::<Input>() {
            Ok(input) => input,
            Err(err) => {
                println!("{}", format!("{err:#}").red());
                continue;
            }
        };
        let was_move = matches!(input, Input::Move { .. });
        match handle_input(&host, &token, input).await {
            Ok(false) => break,
            Ok(true) => {}
            Err(err) => println!("{}", format!("{err:#}").red()),
        }
        match host.get_state(&token, WHITE).await {
            Ok(view) if was_move => print_state(&view)?,
            Ok(_) => {}
            Err(GameError::GameAlreadyEnded) => break,
            Err(err) => return Err(err.into()),
        }
    }
    if host.result(&token).await.is_ok() {
        _ = timeout(Duration::from_secs(1), printer).await;
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = CommandLineArgs::parse();
    if let Err(err) = run(args).await {
        eprintln!("{}", format!("Error: {err:#}").red());
        exit(1);
    }
}
