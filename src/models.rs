use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::components::ScoreComponents;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::NoShow => "no_show",
            SessionStatus::Rescheduled => "rescheduled",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            "no_show" => Ok(SessionStatus::NoShow),
            "rescheduled" => Ok(SessionStatus::Rescheduled),
            other => Err(Error::InvalidInput(format!("unknown session status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescheduleInitiator {
    Tutor,
    Student,
}

impl RescheduleInitiator {
    pub fn as_str(&self) -> &'static str {
        match self {
            RescheduleInitiator::Tutor => "tutor",
            RescheduleInitiator::Student => "student",
        }
    }
}

impl FromStr for RescheduleInitiator {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "tutor" => Ok(RescheduleInitiator::Tutor),
            "student" => Ok(RescheduleInitiator::Student),
            other => Err(Error::InvalidInput(format!(
                "unknown reschedule initiator: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub tutor_id: Uuid,
    pub student_id: Uuid,
    pub scheduled_start_at: Option<DateTime<Utc>>,
    pub scheduled_end_at: Option<DateTime<Utc>>,
    pub actual_start_at: Option<DateTime<Utc>>,
    pub actual_end_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub reschedule_initiator: Option<RescheduleInitiator>,
    pub tech_issue: bool,
    pub first_session_for_student: bool,
}

impl Session {
    /// Minutes between scheduled and actual start. Negative when the tutor was early.
    pub fn lateness_minutes(&self) -> Option<f64> {
        match (self.scheduled_start_at, self.actual_start_at) {
            (Some(scheduled), Some(actual)) => Some(minutes_between(scheduled, actual)),
            _ => None,
        }
    }

    /// Minutes the session ended before its scheduled end. Negative when it ran over.
    pub fn shortfall_minutes(&self) -> Option<f64> {
        match (self.actual_end_at, self.scheduled_end_at) {
            (Some(actual), Some(scheduled)) => Some(minutes_between(actual, scheduled)),
            _ => None,
        }
    }

    pub fn scheduled_date(&self) -> Option<NaiveDate> {
        self.scheduled_start_at.map(|at| at.date_naive())
    }

    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }
}

fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / 60.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakerRole {
    Tutor,
    Student,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptTurn {
    #[serde(default)]
    pub speaker: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub word_count: u32,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl TranscriptTurn {
    pub fn role(&self) -> Option<SpeakerRole> {
        match self.speaker.trim().to_ascii_lowercase().as_str() {
            "tutor" => Some(SpeakerRole::Tutor),
            "student" => Some(SpeakerRole::Student),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptMetadata {
    #[serde(default)]
    pub tutor_words: u64,
    #[serde(default)]
    pub student_words: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub session_id: Uuid,
    #[serde(default)]
    pub turns: Vec<TranscriptTurn>,
    #[serde(default)]
    pub metadata: TranscriptMetadata,
}

impl Transcript {
    /// Turns exist and at least one carries a non-blank speaker tag.
    pub fn has_diarization(&self) -> bool {
        !self.turns.is_empty() && self.turns.iter().any(|turn| !turn.speaker.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreType {
    Sqs,
    Fsqs,
    Ths,
    Tcrs,
}

impl ScoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreType::Sqs => "sqs",
            ScoreType::Fsqs => "fsqs",
            ScoreType::Ths => "ths",
            ScoreType::Tcrs => "tcrs",
        }
    }

    pub fn is_daily(&self) -> bool {
        matches!(self, ScoreType::Ths | ScoreType::Tcrs)
    }
}

impl fmt::Display for ScoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoreType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "sqs" => Ok(ScoreType::Sqs),
            "fsqs" => Ok(ScoreType::Fsqs),
            "ths" => Ok(ScoreType::Ths),
            "tcrs" => Ok(ScoreType::Tcrs),
            other => Err(Error::InvalidInput(format!("unknown score type: {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Score {
    pub id: Uuid,
    pub tutor_id: Uuid,
    pub session_id: Option<Uuid>,
    pub value: f64,
    pub components: ScoreComponents,
    pub computed_at: DateTime<Utc>,
}

impl Score {
    pub fn new(
        tutor_id: Uuid,
        session_id: Option<Uuid>,
        value: f64,
        components: ScoreComponents,
        computed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tutor_id,
            session_id,
            value,
            components,
            computed_at,
        }
    }

    pub fn score_type(&self) -> ScoreType {
        self.components.score_type()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyAggregate {
    pub tutor_id: Uuid,
    pub date: NaiveDate,
    pub sessions_completed: i32,
    pub reschedules_tutor_initiated: i32,
    pub no_shows: i32,
    pub avg_lateness_min: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowFirstSessionQuality,
    HighReliabilityRisk,
    ChurnRisk,
}

impl AlertType {
    pub const ALL: [AlertType; 3] = [
        AlertType::LowFirstSessionQuality,
        AlertType::HighReliabilityRisk,
        AlertType::ChurnRisk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::LowFirstSessionQuality => "low_first_session_quality",
            AlertType::HighReliabilityRisk => "high_reliability_risk",
            AlertType::ChurnRisk => "churn_risk",
        }
    }

    pub fn source(&self) -> ScoreType {
        match self {
            AlertType::LowFirstSessionQuality => ScoreType::Fsqs,
            AlertType::HighReliabilityRisk => ScoreType::Ths,
            AlertType::ChurnRisk => ScoreType::Tcrs,
        }
    }

    pub fn severity(&self) -> AlertSeverity {
        match self {
            AlertType::LowFirstSessionQuality => AlertSeverity::High,
            AlertType::HighReliabilityRisk => AlertSeverity::High,
            AlertType::ChurnRisk => AlertSeverity::Medium,
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        AlertType::ALL
            .into_iter()
            .find(|alert_type| alert_type.as_str() == value)
            .ok_or_else(|| Error::InvalidInput(format!("unknown alert type: {value}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
        }
    }
}

impl FromStr for AlertSeverity {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "low" => Ok(AlertSeverity::Low),
            "medium" => Ok(AlertSeverity::Medium),
            "high" => Ok(AlertSeverity::High),
            other => Err(Error::InvalidInput(format!("unknown alert severity: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Open => "open",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
        }
    }

    /// Open and acknowledged alerts both still represent a live incident.
    pub fn is_active(&self) -> bool {
        !matches!(self, AlertStatus::Resolved)
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertStatus {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "open" => Ok(AlertStatus::Open),
            "acknowledged" => Ok(AlertStatus::Acknowledged),
            "resolved" => Ok(AlertStatus::Resolved),
            other => Err(Error::InvalidInput(format!("unknown alert status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Auto,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditNote {
    pub at: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertMetadata {
    pub triggering_value: f64,
    #[serde(default)]
    pub triggering_components: serde_json::Value,
    pub latest_value: f64,
    pub last_checked_at: DateTime<Utc>,
    #[serde(default)]
    pub check_count: u32,
    #[serde(default)]
    pub auto_resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_value: Option<f64>,
    #[serde(default)]
    pub notes: Vec<AuditNote>,
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub id: Uuid,
    pub tutor_id: Uuid,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub triggered_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub metadata: AlertMetadata,
}
