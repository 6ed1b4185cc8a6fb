//! Structured, column-aligned logger setup for the gateway process.
//!
//! Bold line, color-coded level, and a fixed-width `module:line` field
//! ahead of the message -- with this crate's pipeline stages (`director`,
//! `transport`, `response_modifier`, ...) each logging through their own
//! module path, the `target` column doubles as a component tag without
//! needing every log line to repeat its own module name.

use chrono::Local;
use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Visible width of the `[LEVEL]` column, padding included.
const LEVEL_FIELD_WIDTH: usize = 8;
/// Visible width of the `target:line` column, padding included.
const TARGET_LINE_FIELD_WIDTH: usize = 26;

/// Visible length of `s`, ignoring `\x1b[...m` ANSI escapes. Used to pad
/// colored fields to a fixed column width without counting escape bytes.
fn visible_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut visible = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == 0x1b {
            i += 1;
            if i < bytes.len() && bytes[i] == b'[' {
                i += 1;
            }
            while i < bytes.len() {
                let b = bytes[i];
                i += 1;
                if b == b'm' {
                    break;
                }
            }
        } else {
            let first = bytes[i];
            let width = if first < 0x80 {
                1
            } else if first >> 5 == 0b110 {
                2
            } else if first >> 4 == 0b1110 {
                3
            } else if first >> 3 == 0b11110 {
                4
            } else {
                1
            };
            visible += 1;
            i += width;
        }
    }
    visible
}

/// Initializes the process-wide logger.
///
/// Format: `Timestamp | [LEVEL] | module:line | message`, e.g.
/// `Dec 15 24 02:30:45 PM | [INFO ] | director:41          | director: clientip=... host=...`.
/// Honors `RUST_LOG` for level filtering and `NO_COLOR` to disable ANSI
/// coloring (e.g. when logs are shipped to a collector that doesn't strip
/// escape codes). Call once at startup.
pub fn configure_logger() {
    let no_color = env::var("NO_COLOR").is_ok();

    Builder::new()
        .format(move |buf, record| {
            let level = record.level();
            let level_plain = level.to_string();

            let (prefix, colored_level, suffix) = if no_color {
                ("".to_string(), level_plain.clone(), "".to_string())
            } else {
                let prefix = "\x1b[1m".to_string();
                let colored = match level {
                    log::Level::Error => format!("\x1b[31m{}\x1b[39m", level_plain),
                    log::Level::Warn => format!("\x1b[33m{}\x1b[39m", level_plain),
                    log::Level::Info => format!("\x1b[32m{}\x1b[39m", level_plain),
                    log::Level::Debug => format!("\x1b[34m{}\x1b[39m", level_plain),
                    log::Level::Trace => format!("\x1b[35m{}\x1b[39m", level_plain),
                };
                let suffix = "\x1b[0m".to_string();
                (prefix, colored, suffix)
            };

            let level_display = format!("[{}]", colored_level);
            let level_vis_len = visible_len(&level_display);
            let level_padding = if level_vis_len >= LEVEL_FIELD_WIDTH {
                1
            } else {
                LEVEL_FIELD_WIDTH - level_vis_len
            };

            let target_line = format!("{}:{}", record.target(), record.line().unwrap_or(0));
            let target_line_vis_len = visible_len(&target_line);
            let target_line_padding = if target_line_vis_len >= TARGET_LINE_FIELD_WIDTH {
                1
            } else {
                TARGET_LINE_FIELD_WIDTH - target_line_vis_len
            };

            writeln!(
                buf,
                "{}{} | {}{}| {}{}| {}{}",
                prefix,
                Local::now().format("%b %d %y %I:%M:%S %p"),
                level_display,
                " ".repeat(level_padding),
                target_line,
                " ".repeat(target_line_padding),
                record.args(),
                suffix,
            )
        })
        .filter_level(LevelFilter::Debug)
        .init();

    log::set_max_level(LevelFilter::Trace);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_len_strips_ansi_escapes() {
        assert_eq!(visible_len("hello"), 5);
        assert_eq!(visible_len("\x1b[31mred\x1b[0m"), 3);
        assert_eq!(visible_len("\x1b[1;32m[INFO]\x1b[0m"), 6);
    }
}
