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
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail};
use clap::Parser;
use log::LevelFilter;

use levers::board::pieces::{Color, PieceType};
use levers::clock::TimeControl;
use levers::general::common::{tokens, Res};
use levers::general::squares::Point;

/// Plays a local match of the variant, both players entering their moves on the same terminal.
#[derive(Parser, Debug)]
#[command(name = "levers", author = "ToTheAnd", version, about, long_about = None)]
pub struct CommandLineArgs {
    /// JSON file with the session configuration. Missing fields use their default values.
    #[arg(long, short)]
    pub config: Option<PathBuf>,
    /// Time control as `base+increment` in seconds, e.g. `600+5`. Defaults to the configured time control.
    #[arg(long, short)]
    pub time_control: Option<TimeControl>,
    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,
    /// Report the result to the rating service.
    #[arg(long)]
    pub ranked: bool,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Input {
    Move { from: Point, to: Point, promotes_to: Option<PieceType> },
    /// Draw offers, declines and resignations are made by the side to move unless a color is given.
    Draw(Option<Color>),
    Decline(Option<Color>),
    Resign(Option<Color>),
    State,
    Help,
    Quit,
}

fn parse_color(word: Option<&str>) -> Res<Option<Color>> {
    match word.map(str::to_ascii_lowercase).as_deref() {
        None => Ok(None),
        Some("white" | "w") => Ok(Some(Color::White)),
        Some("black" | "b") => Ok(Some(Color::Black)),
        Some(other) => bail!("Expected 'white' or 'black', not '{other}'"),
    }
}

/// Splits `e2e4` into `e2` and `e4`, and `h9h10q` into `h9`, `h10` and `q`.
fn split_squares(text: &str) -> Vec<String> {
    let mut parts = vec![];
    let mut current = String::new();
    for c in text.chars() {
        if c.is_ascii_alphabetic() && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn parse_move(text: &str) -> Res<Input> {
    let parts: Vec<String> = tokens(text).flat_map(split_squares).collect();
    let [from, to, rest @ ..] = parts.as_slice() else {
        bail!("A move needs a source and a destination square, like 'e2e4' or 'e2 e4'");
    };
    let promotes_to = match rest {
        [] => None,
        [piece] if piece.len() == 1 => {
            let c = piece.chars().next().unwrap_or_default().to_ascii_uppercase();
            Some(PieceType::from_char(c).ok_or_else(|| anyhow!("Unknown piece '{piece}'"))?)
        }
        _ => bail!("Unexpected input after the move: '{}'", rest.join(" ")),
    };
    Ok(Input::Move { from: Point::from_str(from)?, to: Point::from_str(to)?, promotes_to })
}

impl FromStr for Input {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Res<Self> {
        let mut words = tokens(s);
        let Some(first) = words.next() else {
            bail!("Empty input");
        };
        let color = || parse_color(words.clone().next());
        Ok(match first.to_ascii_lowercase().as_str() {
            "draw" | "offer" => Input::Draw(color()?),
            "decline" => Input::Decline(color()?),
            "resign" => Input::Resign(color()?),
            "state" | "show" | "s" => Input::State,
            "help" | "?" => Input::Help,
            "quit" | "exit" | "q" => Input::Quit,
            _ => parse_move(s)?,
        })
    }
}

pub const HELP: &str = "Commands:
  <from><to>[piece]    play a move, e.g. 'e2e4', 'b1 c3' or 'h9h10q'
  draw [white|black]   offer a draw, or accept the opponent's offer
  decline [white|black] decline the opponent's draw offer
  resign [white|black] resign the game
  state                show the board and the clocks
  quit                 end the program";
