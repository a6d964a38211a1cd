use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::components::{ScoreComponents, TcrsComponents, Trend};
use crate::models::{DailyAggregate, Score};
use crate::scoring::mean;

pub const CHURN_WINDOW_DAYS: usize = 14;
const TREND_DEAD_BAND: f64 = 0.5;
const INCONSISTENCY_WEIGHT: f64 = 0.45;
const DECLINING_PENALTY: f64 = 0.4;
const IMPROVING_CREDIT: f64 = 0.2;
const SPARSITY_WEIGHT: f64 = 0.15;

#[derive(Debug, Clone, PartialEq)]
pub struct TcrsResult {
    pub score: f64,
    pub components: TcrsComponents,
}

impl TcrsResult {
    pub fn to_score(&self, tutor_id: Uuid, computed_at: DateTime<Utc>) -> Score {
        Score::new(
            tutor_id,
            None,
            self.score,
            ScoreComponents::Tcrs(self.components.clone()),
            computed_at,
        )
    }
}

/// `1 / (1 + CV)` using the sample standard deviation.
///
/// An all-zero series is perfectly consistent; it is already penalized for inactivity.
pub fn consistency(counts: &[f64]) -> f64 {
    if counts.iter().all(|c| *c == 0.0) {
        return 1.0;
    }
    let avg = mean(counts);
    if avg == 0.0 {
        return 0.0;
    }
    if counts.len() < 2 {
        return 1.0;
    }
    let variance = counts.iter().map(|c| (c - avg).powi(2)).sum::<f64>() / (counts.len() - 1) as f64;
    let cv = variance.sqrt() / avg;
    (1.0 / (1.0 + cv)).clamp(0.0, 1.0)
}

/// Mean of the later half of an oldest-first series against the earlier half.
pub fn trend(counts: &[f64]) -> Trend {
    let half = counts.len() / 2;
    if half == 0 {
        return Trend::Stable;
    }
    let (earlier, later) = counts.split_at(half);
    Trend::classify(mean(earlier), mean(later), TREND_DEAD_BAND)
}

pub fn activity_penalty(avg_daily: f64) -> f64 {
    if avg_daily < 0.5 {
        0.5
    } else if avg_daily < 1.0 {
        (1.0 - avg_daily) * 0.5
    } else if avg_daily < 2.0 {
        (2.0 - avg_daily) / 2.0 * 0.25
    } else {
        0.0
    }
}

pub fn score_churn_risk(rows: &[DailyAggregate]) -> Option<TcrsResult> {
    if rows.is_empty() {
        return None;
    }

    let mut window: Vec<&DailyAggregate> = rows.iter().collect();
    window.sort_by(|a, b| b.date.cmp(&a.date));
    window.truncate(CHURN_WINDOW_DAYS);
    window.reverse();

    let counts: Vec<f64> = window.iter().map(|r| f64::from(r.sessions_completed)).collect();
    let days_of_data = counts.len();
    let avg_daily_sessions = mean(&counts);
    let consistency = consistency(&counts);
    let trend = trend(&counts);

    let activity_penalty = activity_penalty(avg_daily_sessions);
    let inconsistency_penalty = (1.0 - consistency) * INCONSISTENCY_WEIGHT;
    let trend_adjustment = match trend {
        Trend::Declining => DECLINING_PENALTY,
        Trend::Improving if consistency > 0.5 => -IMPROVING_CREDIT * consistency,
        Trend::Improving | Trend::Stable => 0.0,
    };
    let sparsity_penalty = if days_of_data < CHURN_WINDOW_DAYS {
        (CHURN_WINDOW_DAYS - days_of_data) as f64 / CHURN_WINDOW_DAYS as f64 * SPARSITY_WEIGHT
    } else {
        0.0
    };

    let risk = (activity_penalty + inconsistency_penalty + trend_adjustment + sparsity_penalty)
        .clamp(0.0, 1.0);

    Some(TcrsResult {
        score: risk,
        components: TcrsComponents {
            days_of_data,
            avg_daily_sessions,
            consistency,
            trend,
            activity_penalty,
            inconsistency_penalty,
            trend_adjustment,
            sparsity_penalty,
        },
    })
}
