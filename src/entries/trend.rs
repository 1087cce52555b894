//! Rolling mood/sleep averages over a user's latest entries.
//!
//! The newest five entries form the current window and the five before them
//! the previous window. Trends compare the unrounded window means with a
//! ±0.1 deadband; only the reported averages are rounded.

use serde::Serialize;

use super::repo_types::MoodEntry;

pub const WINDOW: usize = 5;
/// Entries considered in total: current window plus previous window.
pub const MAX_ENTRIES: usize = 2 * WINDOW;
const DEADBAND: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increase,
    Decrease,
    Same,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodAverages {
    pub current_mood_avg: f64,
    pub current_sleep_avg: f64,
    pub previous_mood_avg: Option<f64>,
    pub previous_sleep_avg: Option<f64>,
    pub mood_trend: Trend,
    pub sleep_trend: Trend,
    pub entries_count: usize,
}

impl MoodAverages {
    fn empty() -> Self {
        Self {
            current_mood_avg: 0.0,
            current_sleep_avg: 0.0,
            previous_mood_avg: None,
            previous_sleep_avg: None,
            mood_trend: Trend::Same,
            sleep_trend: Trend::Same,
            entries_count: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Means {
    mood: f64,
    sleep: f64,
}

fn means(window: &[MoodEntry]) -> Option<Means> {
    if window.is_empty() {
        return None;
    }
    let n = window.len() as f64;
    let mood: f64 = window.iter().map(|e| f64::from(e.mood)).sum();
    let sleep: f64 = window.iter().map(|e| e.sleep_hours).sum();
    Some(Means {
        mood: mood / n,
        sleep: sleep / n,
    })
}

/// Two decimals, exact ties to even (7.125 -> 7.12, 0.375 -> 0.38).
fn round2(v: f64) -> f64 {
    (v * 100.0).round_ties_even() / 100.0
}

pub fn trend(current: f64, previous: Option<f64>) -> Trend {
    let Some(previous) = previous else {
        return Trend::Same;
    };
    let diff = current - previous;
    if diff > DEADBAND {
        Trend::Increase
    } else if diff < -DEADBAND {
        Trend::Decrease
    } else {
        Trend::Same
    }
}

/// `entries` must be most-recent-first; anything past the tenth is ignored.
pub fn analyze(entries: &[MoodEntry]) -> MoodAverages {
    let entries = &entries[..entries.len().min(MAX_ENTRIES)];
    let split = entries.len().min(WINDOW);
    let (current, previous) = entries.split_at(split);

    let Some(current) = means(current) else {
        return MoodAverages::empty();
    };
    let previous = means(previous);

    MoodAverages {
        current_mood_avg: round2(current.mood),
        current_sleep_avg: round2(current.sleep),
        previous_mood_avg: previous.map(|p| round2(p.mood)),
        previous_sleep_avg: previous.map(|p| round2(p.sleep)),
        mood_trend: trend(current.mood, previous.map(|p| p.mood)),
        sleep_trend: trend(current.sleep, previous.map(|p| p.sleep)),
        entries_count: entries.len(),
    }
}
