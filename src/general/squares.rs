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
use std::ops::{Add, Sub};
use std::str::FromStr;

use anyhow::bail;
use colored::Colorize;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::general::common::{parse_int_from_str, Res};

pub type DimT = i32;

pub fn file_to_char(file: DimT) -> char {
    debug_assert!((0..26).contains(&file));
    (file as u8 + b'a') as char
}

pub fn char_to_file(file: char) -> DimT {
    debug_assert!(file.is_ascii_lowercase());
    (file as u8 - b'a') as DimT
}

/// A square on the board. `x` is the file (column), `y` is the rank (row), both 0-based,
/// so `a1` is `(0, 0)` and `j10` is `(9, 9)` on the default board.
///
/// Points are serialized in algebraic notation, which keeps move paths sent to clients compact.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[must_use]
pub struct Point {
    pub x: DimT,
    pub y: DimT,
}

impl Point {
    pub const fn new(x: DimT, y: DimT) -> Self {
        Self { x, y }
    }

    pub fn file(self) -> DimT {
        self.x
    }

    pub fn rank(self) -> DimT {
        self.y
    }

    pub fn algebraic(file: char, rank: usize) -> Res<Self> {
        if !file.is_ascii_alphabetic() {
            bail!("file (column) '{}' must be a valid ascii letter", file.to_string().red());
        }
        if rank == 0 {
            bail!("ranks (rows) are 1-based, so '{}' isn't a valid rank", "0".red());
        }
        let x = char_to_file(file.to_ascii_lowercase());
        let y = DimT::try_from(rank)? - 1;
        Ok(Self { x, y })
    }
}

impl Display for Point {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if (0..26).contains(&self.x) {
            // output 1-indexed
            write!(f, "{0}{1}", file_to_char(self.x), self.y + 1)
        } else {
            write!(f, "<invalid {0},{1}>", self.x, self.y)
        }
    }
}

impl FromStr for Point {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let Some(file) = chars.next() else { bail!("Empty square") };
        let rank = chars.as_str();
        if rank.is_empty() {
            bail!("Missing rank (row) in square '{}'", s.red())
        }
        Self::algebraic(file, parse_int_from_str(rank, "rank (row)")?)
    }
}

impl Serialize for Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Point {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A displacement between two squares.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
#[must_use]
pub struct Offset {
    pub dx: DimT,
    pub dy: DimT,
}

impl Offset {
    pub const fn new(dx: DimT, dy: DimT) -> Self {
        Self { dx, dy }
    }

    pub fn scaled(self, factor: DimT) -> Self {
        Self { dx: self.dx * factor, dy: self.dy * factor }
    }

    /// Flips the vertical component, which turns a white-relative offset into the black one.
    pub fn flip_vertical(self) -> Self {
        Self { dx: self.dx, dy: -self.dy }
    }
}

impl Add<Offset> for Point {
    type Output = Point;

    fn add(self, rhs: Offset) -> Self::Output {
        Point { x: self.x + rhs.dx, y: self.y + rhs.dy }
    }
}

impl Sub<Offset> for Point {
    type Output = Point;

    fn sub(self, rhs: Offset) -> Self::Output {
        Point { x: self.x - rhs.dx, y: self.y - rhs.dy }
    }
}

pub const ORTHOGONAL: [Offset; 4] = [Offset::new(0, 1), Offset::new(1, 0), Offset::new(0, -1), Offset::new(-1, 0)];

pub const DIAGONAL: [Offset; 4] = [Offset::new(1, 1), Offset::new(1, -1), Offset::new(-1, -1), Offset::new(-1, 1)];

pub const KNIGHT: [Offset; 8] = [
    Offset::new(1, 2),
    Offset::new(2, 1),
    Offset::new(2, -1),
    Offset::new(1, -2),
    Offset::new(-1, -2),
    Offset::new(-2, -1),
    Offset::new(-2, 1),
    Offset::new(-1, 2),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algebraic_test() {
        let a1 = Point::from_str("a1").unwrap();
        assert_eq!(a1, Point::new(0, 0));
        let j10 = Point::from_str("j10").unwrap();
        assert_eq!(j10, Point::new(9, 9));
        assert_eq!(j10.to_string(), "j10");
        assert_eq!(Point::from_str(" D7 ").unwrap(), Point::new(3, 6));
        for invalid in ["", "a", "10", "a0", "?3", "b-1", "c2x"] {
            assert!(Point::from_str(invalid).is_err(), "{invalid}");
        }
    }

    #[test]
    fn serde_test() {
        let p = Point::new(4, 5);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"e6\"");
        assert_eq!(serde_json::from_str::<Point>(&json).unwrap(), p);
    }
}
