use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::ScoreType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLabel {
    Risk,
    Warn,
    Ok,
}

impl QualityLabel {
    /// `<60` risk, `60..=75` warn, `>75` ok.
    pub fn from_score(score: f64) -> Self {
        if score < 60.0 {
            QualityLabel::Risk
        } else if score <= 75.0 {
            QualityLabel::Warn
        } else {
            QualityLabel::Ok
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLabel::Risk => "risk",
            QualityLabel::Warn => "warn",
            QualityLabel::Ok => "ok",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

impl Trend {
    /// Classify `later - earlier` with a symmetric dead-band.
    pub fn classify(earlier: f64, later: f64, dead_band: f64) -> Self {
        let delta = later - earlier;
        if delta > dead_band {
            Trend::Improving
        } else if delta < -dead_band {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Improving => "improving",
            Trend::Declining => "declining",
            Trend::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqsComponents {
    pub lateness_penalty: u32,
    pub shortfall_penalty: u32,
    pub tech_penalty: u32,
    pub confusion_penalty: u32,
    pub word_share_penalty: u32,
    pub goal_setting_penalty: u32,
    pub encouragement_penalty: u32,
    pub closing_summary_penalty: u32,
    pub negative_phrasing_penalty: u32,
    #[serde(default)]
    pub tutor_word_share: Option<f64>,
    pub label: QualityLabel,
}

impl SqsComponents {
    pub fn total_penalty(&self) -> u32 {
        self.lateness_penalty
            + self.shortfall_penalty
            + self.tech_penalty
            + self.confusion_penalty
            + self.word_share_penalty
            + self.goal_setting_penalty
            + self.encouragement_penalty
            + self.closing_summary_penalty
            + self.negative_phrasing_penalty
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsqsComponents {
    pub confusion_penalty: u32,
    pub word_share_penalty: u32,
    pub goal_setting_penalty: u32,
    pub encouragement_penalty: u32,
    pub negative_phrasing_penalty: u32,
    pub closing_summary_penalty: u32,
    pub tech_lateness_penalty: u32,
    pub greeting_penalty: u32,
    pub intro_penalty: u32,
    pub future_planning_penalty: u32,
    #[serde(default)]
    pub what_went_well: String,
    #[serde(default)]
    pub improvement_idea: Option<String>,
}

impl FsqsComponents {
    pub fn total_penalty(&self) -> u32 {
        self.confusion_penalty
            + self.word_share_penalty
            + self.goal_setting_penalty
            + self.encouragement_penalty
            + self.negative_phrasing_penalty
            + self.closing_summary_penalty
            + self.tech_lateness_penalty
            + self.greeting_penalty
            + self.intro_penalty
            + self.future_planning_penalty
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThsComponents {
    pub days_of_data: usize,
    pub reschedule_rate: f64,
    pub reschedule_penalty: u32,
    pub no_shows: i32,
    pub no_show_penalty: u32,
    pub weighted_lateness_min: f64,
    pub lateness_penalty: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcrsComponents {
    pub days_of_data: usize,
    pub avg_daily_sessions: f64,
    pub consistency: f64,
    pub trend: Trend,
    pub activity_penalty: f64,
    pub inconsistency_penalty: f64,
    pub trend_adjustment: f64,
    pub sparsity_penalty: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScoreComponents {
    Sqs(SqsComponents),
    Fsqs(FsqsComponents),
    Ths(ThsComponents),
    Tcrs(TcrsComponents),
}

impl ScoreComponents {
    pub fn score_type(&self) -> ScoreType {
        match self {
            ScoreComponents::Sqs(_) => ScoreType::Sqs,
            ScoreComponents::Fsqs(_) => ScoreType::Fsqs,
            ScoreComponents::Ths(_) => ScoreType::Ths,
            ScoreComponents::Tcrs(_) => ScoreType::Tcrs,
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        let value = match self {
            ScoreComponents::Sqs(inner) => serde_json::to_value(inner)?,
            ScoreComponents::Fsqs(inner) => serde_json::to_value(inner)?,
            ScoreComponents::Ths(inner) => serde_json::to_value(inner)?,
            ScoreComponents::Tcrs(inner) => serde_json::to_value(inner)?,
        };
        Ok(value)
    }

    pub fn from_json(score_type: ScoreType, value: serde_json::Value) -> Result<Self> {
        let components = match score_type {
            ScoreType::Sqs => ScoreComponents::Sqs(serde_json::from_value(value)?),
            ScoreType::Fsqs => ScoreComponents::Fsqs(serde_json::from_value(value)?),
            ScoreType::Ths => ScoreComponents::Ths(serde_json::from_value(value)?),
            ScoreType::Tcrs => ScoreComponents::Tcrs(serde_json::from_value(value)?),
        };
        Ok(components)
    }

    pub fn as_sqs(&self) -> Option<&SqsComponents> {
        match self {
            ScoreComponents::Sqs(inner) => Some(inner),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_boundaries() {
        assert_eq!(QualityLabel::from_score(59.0), QualityLabel::Risk);
        assert_eq!(QualityLabel::from_score(60.0), QualityLabel::Warn);
        assert_eq!(QualityLabel::from_score(75.0), QualityLabel::Warn);
        assert_eq!(QualityLabel::from_score(76.0), QualityLabel::Ok);
    }

    #[test]
    fn trend_dead_band_is_inclusive() {
        assert_eq!(Trend::classify(2.0, 2.5, 0.5), Trend::Stable);
        assert_eq!(Trend::classify(2.0, 1.5, 0.5), Trend::Stable);
        assert_eq!(Trend::classify(2.0, 2.6, 0.5), Trend::Improving);
        assert_eq!(Trend::classify(3.0, 0.0, 0.5), Trend::Declining);
    }

    #[test]
    fn components_map_to_a_flat_json_object() {
        let components = ScoreComponents::Ths(ThsComponents {
            days_of_data: 7,
            reschedule_rate: 0.1,
            reschedule_penalty: 5,
            no_shows: 1,
            no_show_penalty: 10,
            weighted_lateness_min: 2.0,
            lateness_penalty: 0,
        });
        let json = components.to_json().unwrap();
        assert_eq!(json["reschedule_penalty"], 5);
        assert_eq!(json["no_shows"], 1);

        let restored = ScoreComponents::from_json(ScoreType::Ths, json).unwrap();
        assert_eq!(restored, components);
    }

    #[test]
    fn from_json_rejects_a_mismatched_shape() {
        let json = serde_json::json!({ "days_of_data": 3 });
        assert!(ScoreComponents::from_json(ScoreType::Tcrs, json).is_err());
    }
}
