use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::models::game_state::{Clocks, Side};

/// Remaining time per side at a given instant
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveClock {
    pub white_ms: i64,
    pub black_ms: i64,
}

/// Remaining time at `now`: the side to move has been losing time since the
/// server last stamped the clocks.
pub fn live_clock(clocks: &Clocks, turn: Side, now: DateTime<Utc>, game_over: bool) -> LiveClock {
    let white_ms = clocks.white_ms.max(0);
    let black_ms = clocks.black_ms.max(0);
    let stamped = clocks.last_clock_at.as_deref().and_then(parse_timestamp);

    let stamped = match stamped {
        Some(stamped) if clocks.is_timed() && !game_over => stamped,
        _ => return LiveClock { white_ms, black_ms },
    };

    let elapsed = (now - stamped).num_milliseconds().max(0);
    match turn {
        Side::White => LiveClock {
            white_ms: (white_ms - elapsed).max(0),
            black_ms,
        },
        Side::Black => LiveClock {
            white_ms,
            black_ms: (black_ms - elapsed).max(0),
        },
    }
}

/// `MM:SS`, clamped at zero.
pub fn format_clock(ms: i64) -> String {
    let total_secs = ms.max(0) / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
        return Some(stamp.with_timezone(&Utc));
    }
    // some backends drop the offset; treat those as UTC
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}
