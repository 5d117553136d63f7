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
use std::str::{FromStr, SplitWhitespace};

use anyhow::{anyhow, bail};
use colored::Colorize;

pub type Res<T> = anyhow::Result<T>;

pub fn parse_int_from_str<T: FromStr>(as_str: &str, name: &str) -> Res<T> {
    // for some weird Rust reason, parse::<T>() returns a completely unbounded Err on failure,
    // so we just write the error message ourselves
    as_str
        .parse::<T>()
        .map_err(|_err| anyhow!("Couldn't parse {name} ('{}')", as_str.red()))
}

pub fn parse_fp_from_str(as_str: &str, name: &str) -> Res<f64> {
    let res = as_str
        .parse::<f64>()
        .map_err(|_err| anyhow!("Couldn't parse {name} ('{}')", as_str.red()))?;
    if !res.is_finite() {
        bail!("The {name} must be a finite number, not '{}'", as_str.red())
    }
    Ok(res)
}

/// Splits `input` into whitespace-separated tokens. Used by the command line front end.
pub fn tokens(input: &str) -> SplitWhitespace<'_> {
    input.split_whitespace()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_test() {
        assert_eq!(parse_int_from_str::<u32>("42", "answer").unwrap(), 42);
        assert!(parse_int_from_str::<u32>("-1", "answer").is_err());
        let mut words = tokens(" 7  x ");
        assert_eq!(parse_int_from_str::<i64>(words.next().unwrap(), "first").unwrap(), 7);
        assert!(parse_int_from_str::<i64>(words.next().unwrap(), "second").is_err());
        assert!(words.next().is_none());
    }

    #[test]
    fn parse_fp_test() {
        assert_eq!(parse_fp_from_str("1.5", "time").unwrap(), 1.5);
        assert!(parse_fp_from_str("inf", "time").is_err());
        assert!(parse_fp_from_str("abc", "time").is_err());
    }
}
