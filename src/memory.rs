use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Alert, AlertStatus, AlertType, DailyAggregate, Score, ScoreType, Session, Transcript};
use crate::store::{Store, UpsertOutcome};

#[derive(Default)]
struct Tables {
    sessions: Vec<Session>,
    transcripts: HashMap<Uuid, Transcript>,
    scores: Vec<Score>,
    aggregates: Vec<DailyAggregate>,
    alerts: Vec<Alert>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn score_count(&self, tutor_id: Uuid, score_type: ScoreType) -> usize {
        let tables = self.tables.lock().await;
        tables
            .scores
            .iter()
            .filter(|s| s.tutor_id == tutor_id && s.score_type() == score_type)
            .count()
    }

    pub async fn alerts_for(&self, tutor_id: Uuid, alert_type: AlertType) -> Vec<Alert> {
        let tables = self.tables.lock().await;
        tables
            .alerts
            .iter()
            .filter(|a| a.tutor_id == tutor_id && a.alert_type == alert_type)
            .cloned()
            .collect()
    }

    pub async fn aggregate_count(&self) -> usize {
        self.tables.lock().await.aggregates.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_session(&self, session: &Session) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.sessions.retain(|s| s.id != session.id);
        tables.sessions.push(session.clone());
        Ok(())
    }

    async fn insert_transcript(&self, transcript: &Transcript) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.transcripts.insert(transcript.session_id, transcript.clone());
        Ok(())
    }

    async fn transcript_for(&self, session_id: Uuid) -> Result<Option<Transcript>> {
        Ok(self.tables.lock().await.transcripts.get(&session_id).cloned())
    }

    async fn sessions_scheduled_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Session>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .iter()
            .filter(|s| s.scheduled_date().is_some_and(|d| d >= start && d <= end))
            .cloned()
            .collect())
    }

    async fn sessions_missing_sqs(&self) -> Result<Vec<Session>> {
        let tables = self.tables.lock().await;
        Ok(unscored(&tables, ScoreType::Sqs, Session::is_completed))
    }

    async fn sessions_missing_fsqs(&self) -> Result<Vec<Session>> {
        let tables = self.tables.lock().await;
        Ok(unscored(&tables, ScoreType::Fsqs, |s| s.first_session_for_student))
    }

    async fn insert_score(&self, score: &Score) -> Result<()> {
        self.tables.lock().await.scores.push(score.clone());
        Ok(())
    }

    async fn upsert_daily_score(&self, score: &Score) -> Result<UpsertOutcome> {
        let mut tables = self.tables.lock().await;
        let day = score.computed_at.date_naive();
        let existing = tables.scores.iter_mut().find(|s| {
            s.tutor_id == score.tutor_id
                && s.score_type() == score.score_type()
                && s.computed_at.date_naive() == day
        });

        match existing {
            Some(row) => {
                row.value = score.value;
                row.components = score.components.clone();
                row.computed_at = score.computed_at;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                tables.scores.push(score.clone());
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn latest_score(&self, tutor_id: Uuid, score_type: ScoreType) -> Result<Option<Score>> {
        Ok(self.recent_scores(tutor_id, score_type, 1).await?.into_iter().next())
    }

    async fn recent_scores(&self, tutor_id: Uuid, score_type: ScoreType, limit: usize) -> Result<Vec<Score>> {
        let tables = self.tables.lock().await;
        let mut scores: Vec<Score> = tables
            .scores
            .iter()
            .filter(|s| s.tutor_id == tutor_id && s.score_type() == score_type)
            .cloned()
            .collect();
        scores.sort_by(|a, b| b.computed_at.cmp(&a.computed_at));
        scores.truncate(limit);
        Ok(scores)
    }

    async fn tutors_with_scores(&self) -> Result<Vec<Uuid>> {
        let tables = self.tables.lock().await;
        let tutors: BTreeSet<Uuid> = tables.scores.iter().map(|s| s.tutor_id).collect();
        Ok(tutors.into_iter().collect())
    }

    async fn upsert_daily_aggregate(&self, aggregate: &DailyAggregate) -> Result<UpsertOutcome> {
        let mut tables = self.tables.lock().await;
        match tables
            .aggregates
            .iter_mut()
            .find(|a| a.tutor_id == aggregate.tutor_id && a.date == aggregate.date)
        {
            Some(row) => {
                *row = aggregate.clone();
                Ok(UpsertOutcome::Updated)
            }
            None => {
                tables.aggregates.push(aggregate.clone());
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn prune_daily_aggregates(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        keep: &[(Uuid, NaiveDate)],
    ) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.aggregates.len();
        tables.aggregates.retain(|a| {
            a.date < start || a.date > end || keep.contains(&(a.tutor_id, a.date))
        });
        Ok((before - tables.aggregates.len()) as u64)
    }

    async fn recent_aggregates(&self, tutor_id: Uuid, since: NaiveDate, limit: usize) -> Result<Vec<DailyAggregate>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<DailyAggregate> = tables
            .aggregates
            .iter()
            .filter(|a| a.tutor_id == tutor_id && a.date >= since)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn tutors_with_aggregates_since(&self, since: NaiveDate) -> Result<Vec<Uuid>> {
        let tables = self.tables.lock().await;
        let tutors: BTreeSet<Uuid> = tables
            .aggregates
            .iter()
            .filter(|a| a.date >= since)
            .map(|a| a.tutor_id)
            .collect();
        Ok(tutors.into_iter().collect())
    }

    async fn active_alert(&self, tutor_id: Uuid, alert_type: AlertType) -> Result<Option<Alert>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .alerts
            .iter()
            .find(|a| a.tutor_id == tutor_id && a.alert_type == alert_type && a.status.is_active())
            .cloned())
    }

    async fn alert(&self, alert_id: Uuid) -> Result<Option<Alert>> {
        let tables = self.tables.lock().await;
        Ok(tables.alerts.iter().find(|a| a.id == alert_id).cloned())
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let duplicate = tables.alerts.iter().any(|a| {
            a.tutor_id == alert.tutor_id && a.alert_type == alert.alert_type && a.status.is_active()
        });
        if duplicate && alert.status.is_active() {
            return Err(Error::InvalidInput(format!(
                "tutor {} already has an active {} alert",
                alert.tutor_id, alert.alert_type
            )));
        }
        tables.alerts.push(alert.clone());
        Ok(())
    }

    async fn update_alert(&self, alert: &Alert) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let row = tables
            .alerts
            .iter_mut()
            .find(|a| a.id == alert.id)
            .ok_or_else(|| Error::NotFound(format!("alert {}", alert.id)))?;
        *row = alert.clone();
        Ok(())
    }

    async fn alerts_with_status(&self, status: AlertStatus) -> Result<Vec<Alert>> {
        let tables = self.tables.lock().await;
        let mut alerts: Vec<Alert> = tables
            .alerts
            .iter()
            .filter(|a| a.status == status)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        Ok(alerts)
    }
}

fn unscored(tables: &Tables, score_type: ScoreType, eligible: impl Fn(&Session) -> bool) -> Vec<Session> {
    tables
        .sessions
        .iter()
        .filter(|s| eligible(*s))
        .filter(|s| {
            !tables
                .scores
                .iter()
                .any(|score| score.session_id == Some(s.id) && score.score_type() == score_type)
        })
        .cloned()
        .collect()
}
