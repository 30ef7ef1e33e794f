//! Incremental parsing of encoder status output into [`StatSnapshot`] fields

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::domain::model::{SharedStats, StatSnapshot};

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)?$").expect("valid status pattern"));
static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").expect("valid status pattern"));
static TIMECODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2,}:\d{2}:\d{2})(?:\.\d+)?$").expect("valid status pattern"));
static RATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)?[A-Za-z][A-Za-z/]*$").expect("valid status pattern"));
static SPEED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)?x$").expect("valid status pattern"));
static SIZE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)?[A-Za-z]+$").expect("valid status pattern"));

/// Which field a recognised key feeds, and how its value is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Fps,
    Time,
    Bitrate,
    Speed,
    Size,
    /// `total_size=<bytes>` from `-progress` output
    TotalSize,
    Drop,
    Dup,
}

impl Field {
    fn for_key(key: &str) -> Option<Self> {
        Some(match key {
            "fps" => Self::Fps,
            "time" | "out_time" => Self::Time,
            "bitrate" => Self::Bitrate,
            "speed" => Self::Speed,
            "size" | "Lsize" => Self::Size,
            "total_size" => Self::TotalSize,
            "drop" | "drop_frames" => Self::Drop,
            "dup" | "dup_frames" => Self::Dup,
            _ => return None,
        })
    }

    /// Store `value` if it is well formed; returns whether the field changed hands
    fn apply(self, stats: &mut StatSnapshot, value: &str) -> bool {
        let (slot, text) = match self {
            Self::Fps if NUMBER.is_match(value) => (&mut stats.fps, value.to_string()),
            Self::Time => match TIMECODE.captures(value) {
                Some(caps) => (&mut stats.time, caps[1].to_string()),
                None => return false,
            },
            Self::Bitrate if RATE.is_match(value) => (&mut stats.bitrate, value.to_string()),
            Self::Speed if SPEED.is_match(value) => (&mut stats.speed, value.to_string()),
            Self::Size if SIZE.is_match(value) => (&mut stats.size, value.to_string()),
            Self::TotalSize => match value.parse::<u64>() {
                Ok(bytes) => (&mut stats.size, format!("{}kB", bytes / 1024)),
                Err(_) => return false,
            },
            Self::Drop if INTEGER.is_match(value) => (&mut stats.drop, value.to_string()),
            Self::Dup if INTEGER.is_match(value) => (&mut stats.dup, value.to_string()),
            _ => return false,
        };
        *slot = text;
        true
    }
}

/// Split a line into `(key, value)` pairs.
///
/// FFmpeg pads values for alignment (`size=     256kB`), so a key whose `=` is
/// followed only by blanks takes the next whitespace-free token as its value,
/// unless that token is itself a `key=value` pair.
fn tokens(line: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();
    let mut words = line.split_whitespace().peekable();

    while let Some(word) = words.next() {
        let Some((key, value)) = word.split_once('=') else {
            continue;
        };
        if key.is_empty() {
            continue;
        }
        if !value.is_empty() {
            pairs.push((key, value));
            continue;
        }
        if let Some(next) = words.peek() {
            if !next.contains('=') {
                pairs.push((key, *next));
                words.next();
            }
        }
    }

    pairs
}

/// Apply every recognised token of `line` to `stats`.
///
/// Returns the number of fields updated. Malformed values and unknown keys are
/// skipped, so log noise leaves `stats` untouched.
pub fn apply_line(stats: &mut StatSnapshot, line: &str) -> usize {
    let mut updated = 0;
    for (key, value) in tokens(line) {
        if let Some(field) = Field::for_key(key) {
            if field.apply(stats, value) {
                updated += 1;
            } else {
                trace!(key, value, "ignoring malformed status token");
            }
        }
    }
    updated
}

/// Feeds process output lines into shared statistics
#[derive(Debug, Clone, Default)]
pub struct StreamStatsParser {
    stats: SharedStats,
}

impl StreamStatsParser {
    pub fn new(stats: SharedStats) -> Self {
        Self { stats }
    }

    /// Parse one line of output. Never fails.
    pub fn parse_line(&self, line: &str) {
        if line.trim().is_empty() || !line.contains('=') {
            return;
        }
        self.stats.update(|stats| apply_line(stats, line));
    }

    pub fn stats(&self) -> &SharedStats {
        &self.stats
    }
}
