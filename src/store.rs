use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Alert, AlertStatus, AlertType, DailyAggregate, Score, ScoreType, Session, Transcript};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_session(&self, session: &Session) -> Result<()>;

    async fn insert_transcript(&self, transcript: &Transcript) -> Result<()>;

    async fn transcript_for(&self, session_id: Uuid) -> Result<Option<Transcript>>;

    /// Sessions whose scheduled start falls on a date in `[start, end]`.
    async fn sessions_scheduled_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Session>>;

    async fn sessions_missing_sqs(&self) -> Result<Vec<Session>>;

    async fn sessions_missing_fsqs(&self) -> Result<Vec<Session>>;

    async fn insert_score(&self, score: &Score) -> Result<()>;

    /// Insert or replace the tutor's score of this type for the calendar day of
    /// `score.computed_at`. The stored row keeps its original id on update.
    async fn upsert_daily_score(&self, score: &Score) -> Result<UpsertOutcome>;

    async fn latest_score(&self, tutor_id: Uuid, score_type: ScoreType) -> Result<Option<Score>>;

    /// Newest first.
    async fn recent_scores(&self, tutor_id: Uuid, score_type: ScoreType, limit: usize) -> Result<Vec<Score>>;

    async fn tutors_with_scores(&self) -> Result<Vec<Uuid>>;

    async fn upsert_daily_aggregate(&self, aggregate: &DailyAggregate) -> Result<UpsertOutcome>;

    /// Deletes rows dated within `[start, end]` whose `(tutor_id, date)` is not in `keep`.
    async fn prune_daily_aggregates(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        keep: &[(Uuid, NaiveDate)],
    ) -> Result<u64>;

    /// Rows on or after `since`, newest first, at most `limit`.
    async fn recent_aggregates(&self, tutor_id: Uuid, since: NaiveDate, limit: usize) -> Result<Vec<DailyAggregate>>;

    async fn tutors_with_aggregates_since(&self, since: NaiveDate) -> Result<Vec<Uuid>>;

    async fn active_alert(&self, tutor_id: Uuid, alert_type: AlertType) -> Result<Option<Alert>>;

    async fn alert(&self, alert_id: Uuid) -> Result<Option<Alert>>;

    async fn insert_alert(&self, alert: &Alert) -> Result<()>;

    async fn update_alert(&self, alert: &Alert) -> Result<()>;

    async fn alerts_with_status(&self, status: AlertStatus) -> Result<Vec<Alert>>;
}
