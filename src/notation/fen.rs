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
use anyhow::{bail, ensure};
use colored::Colorize;

use crate::board::pieces::Piece;
use crate::board::Board;
use crate::general::common::{parse_int_from_str, Res};
use crate::general::squares::{DimT, Point};

/// The placement part of a FEN. Unlike chess FENs, it contains neither the side to move nor move counters,
/// and it ignores how often each piece has moved.
pub type Fen = String;

impl Board {
    /// Rank 10 comes first, runs of empty squares are written as one number, which can have more than one digit.
    pub fn as_fen(&self) -> Fen {
        let mut res = Fen::default();
        for y in (0..self.height()).rev() {
            let mut empty_ctr = 0;
            for x in 0..self.width() {
                match self.piece_on(Point::new(x, y)) {
                    None => empty_ctr += 1,
                    Some(piece) => {
                        if empty_ctr > 0 {
                            res += &empty_ctr.to_string();
                        }
                        empty_ctr = 0;
                        res.push(piece.to_char());
                    }
                }
            }
            if empty_ctr > 0 {
                res += &empty_ctr.to_string();
            }
            if y > 0 {
                res.push('/');
            }
        }
        res
    }

    /// Inverse of [`Self::as_fen`]. The board size is taken from the FEN, all pieces count as unmoved.
    pub fn from_fen(fen: &str) -> Res<Self> {
        let lines: Vec<&str> = fen.trim().split('/').collect();
        let height = lines.len() as DimT;
        let mut rows = vec![];
        for line in &lines {
            rows.push(parse_row(line)?);
        }
        let width = rows[0].len();
        ensure!(width > 0 && width <= 26, "FEN rows must contain between 1 and 26 squares, not {width}");
        let mut board = Board::empty(width as DimT, height);
        for (row, line) in rows.iter().zip(lines.iter()) {
            if row.len() != width {
                bail!("Line '{}' has incorrect width: {}, should be {width}", line.red(), row.len());
            }
        }
        for (i, row) in rows.into_iter().enumerate() {
            let y = height - 1 - i as DimT;
            for (x, piece) in row.into_iter().enumerate() {
                if let Some(piece) = piece {
                    board.place(Point::new(x as DimT, y), piece);
                }
            }
        }
        Ok(board)
    }
}

fn flush_empty_run(digits: &mut String, row: &mut Vec<Option<Piece>>) -> Res<()> {
    if digits.is_empty() {
        return Ok(());
    }
    let num: usize = parse_int_from_str(digits, "number of empty squares")?;
    ensure!(num > 0, "FEN position can't contain the number 0");
    row.extend(std::iter::repeat(None).take(num));
    digits.clear();
    Ok(())
}

fn parse_row(line: &str) -> Res<Vec<Option<Piece>>> {
    let mut res = vec![];
    let mut digits = String::new();
    for c in line.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        flush_empty_run(&mut digits, &mut res)?;
        let Some(piece) = Piece::from_char(c) else {
            bail!("Invalid character in FEN position description (not a piece): {}", c.to_string().red());
        };
        res.push(Some(piece));
    }
    flush_empty_run(&mut digits, &mut res)?;
    Ok(res)
}
