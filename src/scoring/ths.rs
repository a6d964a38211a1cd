use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::components::{ScoreComponents, ThsComponents};
use crate::models::{DailyAggregate, Score};
use crate::scoring::{from_ceiling, mean};

pub const HEALTH_WINDOW_DAYS: usize = 7;
const RECENT_DAYS: usize = 3;
const RECENT_WEIGHT: f64 = 0.6;
const OLDER_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, PartialEq)]
pub struct ThsResult {
    pub score: f64,
    pub components: ThsComponents,
}

impl ThsResult {
    pub fn to_score(&self, tutor_id: Uuid, computed_at: DateTime<Utc>) -> Score {
        Score::new(
            tutor_id,
            None,
            self.score,
            ScoreComponents::Ths(self.components.clone()),
            computed_at,
        )
    }
}

pub fn reschedule_penalty(rate: f64) -> u32 {
    match rate {
        r if r >= 0.30 => 25,
        r if r >= 0.20 => 15,
        r if r >= 0.10 => 5,
        _ => 0,
    }
}

pub fn no_show_penalty(no_shows: i32) -> u32 {
    match no_shows {
        n if n >= 6 => 30,
        n if n >= 3 => 20,
        n if n >= 1 => 10,
        _ => 0,
    }
}

pub fn lateness_penalty(weighted_minutes: f64) -> u32 {
    match weighted_minutes {
        m if m >= 15.0 => 25,
        m if m >= 10.0 => 15,
        m if m >= 5.0 => 5,
        _ => 0,
    }
}

/// Recent three days carry 60%, the older rest 40%. `rows` must be newest first.
fn weighted_lateness(rows: &[&DailyAggregate]) -> f64 {
    let split = rows.len().min(RECENT_DAYS);
    let recent: Vec<f64> = rows[..split].iter().map(|r| r.avg_lateness_min).collect();
    let older: Vec<f64> = rows[split..].iter().map(|r| r.avg_lateness_min).collect();

    match (recent.is_empty(), older.is_empty()) {
        (false, false) => mean(&recent) * RECENT_WEIGHT + mean(&older) * OLDER_WEIGHT,
        (false, true) => mean(&recent),
        (true, false) => mean(&older),
        (true, true) => 0.0,
    }
}

pub fn score_health(rows: &[DailyAggregate]) -> Option<ThsResult> {
    if rows.is_empty() {
        return None;
    }

    let mut window: Vec<&DailyAggregate> = rows.iter().collect();
    window.sort_by(|a, b| b.date.cmp(&a.date));
    window.truncate(HEALTH_WINDOW_DAYS);

    let completed: i32 = window.iter().map(|r| r.sessions_completed).sum();
    let reschedules: i32 = window.iter().map(|r| r.reschedules_tutor_initiated).sum();
    let no_shows: i32 = window.iter().map(|r| r.no_shows).sum();

    let scheduled = completed + reschedules + no_shows;
    let reschedule_rate = if scheduled > 0 {
        f64::from(reschedules) / f64::from(scheduled)
    } else {
        0.0
    };
    let weighted_lateness_min = weighted_lateness(&window);

    let components = ThsComponents {
        days_of_data: window.len(),
        reschedule_rate,
        reschedule_penalty: reschedule_penalty(reschedule_rate),
        no_shows,
        no_show_penalty: no_show_penalty(no_shows),
        weighted_lateness_min,
        lateness_penalty: lateness_penalty(weighted_lateness_min),
    };

    let total = components.reschedule_penalty + components.no_show_penalty + components.lateness_penalty;

    Some(ThsResult {
        score: from_ceiling(total),
        components,
    })
}
