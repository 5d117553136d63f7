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
use std::io::{stderr, Write};

use anyhow::anyhow;
use colored::{ColoredString, Colorize};
use log::{Level, LevelFilter, Log, Metadata, Record};

use levers::general::common::Res;

/// Writes log messages to stderr, so that they don't get mixed up with the board on stdout.
#[derive(Debug)]
pub struct TextLogger {
    level: LevelFilter,
}

fn message_prefix(level: Level) -> ColoredString {
    match level {
        Level::Error => "Error:".red(),
        Level::Warn => "Warning:".yellow(),
        Level::Info => "Info:".normal(),
        Level::Debug => "Debug:".dimmed(),
        Level::Trace => "Trace:".dimmed(),
    }
}

impl Log for TextLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let time = chrono::offset::Utc::now().format("%H:%M:%S%.3f");
        // there's nowhere to report a failed write to stderr
        _ = writeln!(stderr(), "[{time}] {0} {1}", message_prefix(record.level()), record.args());
    }

    fn flush(&self) {
        _ = stderr().flush();
    }
}

pub fn init(level: LevelFilter) -> Res<()> {
    log::set_boxed_logger(Box::new(TextLogger { level }))
        .map_err(|err| anyhow!("Couldn't install the logger: {err}"))?;
    log::set_max_level(level);
    log::info!("[Starting logging at {}]", chrono::offset::Utc::now().to_rfc2822());
    Ok(())
}
