use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::components::ScoreComponents;
use crate::error::{Error, Result};
use crate::models::{
    Alert, AlertStatus, AlertType, DailyAggregate, RescheduleInitiator, Score, ScoreType, Session,
    SessionStatus, Transcript, TranscriptMetadata, TranscriptTurn,
};
use crate::store::{Store, UpsertOutcome};

const SESSION_COLUMNS: &str = "id, tutor_id, student_id, scheduled_start_at, scheduled_end_at, \
     actual_start_at, actual_end_at, status, reschedule_initiator, tech_issue, \
     first_session_for_student";

const SCORE_COLUMNS: &str = "id, tutor_id, session_id, score_type, value, components, computed_at";

const ALERT_COLUMNS: &str =
    "id, tutor_id, alert_type, severity, status, triggered_at, resolved_at, metadata";

pub async fn init_db(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Flags the earliest scheduled session of every (tutor, student) pair.
    pub async fn refresh_first_session_flags(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE tutor_quality.sessions s
            SET first_session_for_student = (s.id = f.id)
            FROM (
                SELECT DISTINCT ON (tutor_id, student_id) tutor_id, student_id, id
                FROM tutor_quality.sessions
                ORDER BY tutor_id, student_id, scheduled_start_at ASC NULLS LAST, id
            ) f
            WHERE s.tutor_id = f.tutor_id
              AND s.student_id = f.student_id
              AND s.first_session_for_student IS DISTINCT FROM (s.id = f.id)
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

fn session_from_row(row: &PgRow) -> Result<Session> {
    let status: String = row.try_get("status")?;
    let initiator: Option<String> = row.try_get("reschedule_initiator")?;
    Ok(Session {
        id: row.try_get("id")?,
        tutor_id: row.try_get("tutor_id")?,
        student_id: row.try_get("student_id")?,
        scheduled_start_at: row.try_get("scheduled_start_at")?,
        scheduled_end_at: row.try_get("scheduled_end_at")?,
        actual_start_at: row.try_get("actual_start_at")?,
        actual_end_at: row.try_get("actual_end_at")?,
        status: status.parse()?,
        reschedule_initiator: initiator
            .as_deref()
            .map(str::parse::<RescheduleInitiator>)
            .transpose()?,
        tech_issue: row.try_get("tech_issue")?,
        first_session_for_student: row.try_get("first_session_for_student")?,
    })
}

fn score_from_row(row: &PgRow) -> Result<Score> {
    let score_type: ScoreType = row.try_get::<String, _>("score_type")?.parse()?;
    let components: serde_json::Value = row.try_get("components")?;
    Ok(Score {
        id: row.try_get("id")?,
        tutor_id: row.try_get("tutor_id")?,
        session_id: row.try_get("session_id")?,
        value: row.try_get("value")?,
        components: ScoreComponents::from_json(score_type, components)?,
        computed_at: row.try_get("computed_at")?,
    })
}

fn aggregate_from_row(row: &PgRow) -> Result<DailyAggregate> {
    Ok(DailyAggregate {
        tutor_id: row.try_get("tutor_id")?,
        date: row.try_get("date")?,
        sessions_completed: row.try_get("sessions_completed")?,
        reschedules_tutor_initiated: row.try_get("reschedules_tutor_initiated")?,
        no_shows: row.try_get("no_shows")?,
        avg_lateness_min: row.try_get("avg_lateness_min")?,
    })
}

fn alert_from_row(row: &PgRow) -> Result<Alert> {
    let metadata: serde_json::Value = row.try_get("metadata")?;
    Ok(Alert {
        id: row.try_get("id")?,
        tutor_id: row.try_get("tutor_id")?,
        alert_type: row.try_get::<String, _>("alert_type")?.parse()?,
        severity: row.try_get::<String, _>("severity")?.parse()?,
        status: row.try_get::<String, _>("status")?.parse()?,
        triggered_at: row.try_get("triggered_at")?,
        resolved_at: row.try_get("resolved_at")?,
        metadata: serde_json::from_value(metadata)?,
    })
}

fn outcome(inserted: bool) -> UpsertOutcome {
    if inserted {
        UpsertOutcome::Inserted
    } else {
        UpsertOutcome::Updated
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tutor_quality.sessions
            (id, tutor_id, student_id, scheduled_start_at, scheduled_end_at,
             actual_start_at, actual_end_at, status, reschedule_initiator,
             tech_issue, first_session_for_student)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE
            SET scheduled_start_at = EXCLUDED.scheduled_start_at,
                scheduled_end_at = EXCLUDED.scheduled_end_at,
                actual_start_at = EXCLUDED.actual_start_at,
                actual_end_at = EXCLUDED.actual_end_at,
                status = EXCLUDED.status,
                reschedule_initiator = EXCLUDED.reschedule_initiator,
                tech_issue = EXCLUDED.tech_issue,
                first_session_for_student = EXCLUDED.first_session_for_student
            "#,
        )
        .bind(session.id)
        .bind(session.tutor_id)
        .bind(session.student_id)
        .bind(session.scheduled_start_at)
        .bind(session.scheduled_end_at)
        .bind(session.actual_start_at)
        .bind(session.actual_end_at)
        .bind(session.status.as_str())
        .bind(session.reschedule_initiator.map(|i| i.as_str()))
        .bind(session.tech_issue)
        .bind(session.first_session_for_student)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_transcript(&self, transcript: &Transcript) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tutor_quality.transcripts (session_id, turns, metadata)
            VALUES ($1, $2, $3)
            ON CONFLICT (session_id) DO UPDATE
            SET turns = EXCLUDED.turns, metadata = EXCLUDED.metadata
            "#,
        )
        .bind(transcript.session_id)
        .bind(serde_json::to_value(&transcript.turns)?)
        .bind(serde_json::to_value(&transcript.metadata)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn transcript_for(&self, session_id: Uuid) -> Result<Option<Transcript>> {
        let row = sqlx::query(
            "SELECT session_id, turns, metadata FROM tutor_quality.transcripts WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let turns: serde_json::Value = row.try_get("turns")?;
        let metadata: serde_json::Value = row.try_get("metadata")?;
        Ok(Some(Transcript {
            session_id: row.try_get("session_id")?,
            turns: serde_json::from_value::<Vec<TranscriptTurn>>(turns)?,
            metadata: serde_json::from_value::<TranscriptMetadata>(metadata)?,
        }))
    }

    async fn sessions_scheduled_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Session>> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM tutor_quality.sessions \
             WHERE (scheduled_start_at AT TIME ZONE 'UTC')::date BETWEEN $1 AND $2 \
             ORDER BY scheduled_start_at"
        );
        let rows = sqlx::query(&query)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(session_from_row).collect()
    }

    async fn sessions_missing_sqs(&self) -> Result<Vec<Session>> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM tutor_quality.sessions s \
             WHERE s.status = 'completed' \
             AND NOT EXISTS (SELECT 1 FROM tutor_quality.scores sc \
                             WHERE sc.session_id = s.id AND sc.score_type = 'sqs') \
             ORDER BY s.scheduled_start_at"
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(session_from_row).collect()
    }

    async fn sessions_missing_fsqs(&self) -> Result<Vec<Session>> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM tutor_quality.sessions s \
             WHERE s.first_session_for_student \
             AND NOT EXISTS (SELECT 1 FROM tutor_quality.scores sc \
                             WHERE sc.session_id = s.id AND sc.score_type = 'fsqs') \
             ORDER BY s.scheduled_start_at"
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(session_from_row).collect()
    }

    async fn insert_score(&self, score: &Score) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tutor_quality.scores
            (id, tutor_id, session_id, score_type, value, components, computed_at, score_day)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(score.id)
        .bind(score.tutor_id)
        .bind(score.session_id)
        .bind(score.score_type().as_str())
        .bind(score.value)
        .bind(score.components.to_json()?)
        .bind(score.computed_at)
        .bind(score.computed_at.date_naive())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_daily_score(&self, score: &Score) -> Result<UpsertOutcome> {
        if !score.score_type().is_daily() {
            return Err(Error::InvalidInput(format!(
                "{} scores are append-only",
                score.score_type()
            )));
        }

        let inserted: bool = sqlx::query(
            r#"
            INSERT INTO tutor_quality.scores
            (id, tutor_id, session_id, score_type, value, components, computed_at, score_day)
            VALUES ($1, $2, NULL, $3, $4, $5, $6, $7)
            ON CONFLICT (tutor_id, score_type, score_day)
                WHERE score_type IN ('ths', 'tcrs')
            DO UPDATE
            SET value = EXCLUDED.value,
                components = EXCLUDED.components,
                computed_at = EXCLUDED.computed_at
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(score.id)
        .bind(score.tutor_id)
        .bind(score.score_type().as_str())
        .bind(score.value)
        .bind(score.components.to_json()?)
        .bind(score.computed_at)
        .bind(score.computed_at.date_naive())
        .fetch_one(&self.pool)
        .await?
        .try_get("inserted")?;

        Ok(outcome(inserted))
    }

    async fn latest_score(&self, tutor_id: Uuid, score_type: ScoreType) -> Result<Option<Score>> {
        Ok(self.recent_scores(tutor_id, score_type, 1).await?.into_iter().next())
    }

    async fn recent_scores(
        &self,
        tutor_id: Uuid,
        score_type: ScoreType,
        limit: usize,
    ) -> Result<Vec<Score>> {
        let query = format!(
            "SELECT {SCORE_COLUMNS} FROM tutor_quality.scores \
             WHERE tutor_id = $1 AND score_type = $2 \
             ORDER BY computed_at DESC LIMIT $3"
        );
        let rows = sqlx::query(&query)
            .bind(tutor_id)
            .bind(score_type.as_str())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(score_from_row).collect()
    }

    async fn tutors_with_scores(&self) -> Result<Vec<Uuid>> {
        let tutors = sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT tutor_id FROM tutor_quality.scores ORDER BY tutor_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tutors)
    }

    async fn upsert_daily_aggregate(&self, aggregate: &DailyAggregate) -> Result<UpsertOutcome> {
        let inserted: bool = sqlx::query(
            r#"
            INSERT INTO tutor_quality.daily_aggregates
            (tutor_id, date, sessions_completed, reschedules_tutor_initiated, no_shows, avg_lateness_min)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tutor_id, date) DO UPDATE
            SET sessions_completed = EXCLUDED.sessions_completed,
                reschedules_tutor_initiated = EXCLUDED.reschedules_tutor_initiated,
                no_shows = EXCLUDED.no_shows,
                avg_lateness_min = EXCLUDED.avg_lateness_min,
                updated_at = NOW()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(aggregate.tutor_id)
        .bind(aggregate.date)
        .bind(aggregate.sessions_completed)
        .bind(aggregate.reschedules_tutor_initiated)
        .bind(aggregate.no_shows)
        .bind(aggregate.avg_lateness_min)
        .fetch_one(&self.pool)
        .await?
        .try_get("inserted")?;

        Ok(outcome(inserted))
    }

    async fn prune_daily_aggregates(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        keep: &[(Uuid, NaiveDate)],
    ) -> Result<u64> {
        let (tutors, dates): (Vec<Uuid>, Vec<NaiveDate>) = keep.iter().copied().unzip();
        let result = sqlx::query(
            r#"
            DELETE FROM tutor_quality.daily_aggregates
            WHERE date BETWEEN $1 AND $2
              AND (tutor_id, date) NOT IN (
                  SELECT k.tutor_id, k.date FROM UNNEST($3::uuid[], $4::date[]) AS k(tutor_id, date)
              )
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(tutors)
        .bind(dates)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn recent_aggregates(
        &self,
        tutor_id: Uuid,
        since: NaiveDate,
        limit: usize,
    ) -> Result<Vec<DailyAggregate>> {
        let rows = sqlx::query(
            r#"
            SELECT tutor_id, date, sessions_completed, reschedules_tutor_initiated,
                   no_shows, avg_lateness_min
            FROM tutor_quality.daily_aggregates
            WHERE tutor_id = $1 AND date >= $2
            ORDER BY date DESC
            LIMIT $3
            "#,
        )
        .bind(tutor_id)
        .bind(since)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(aggregate_from_row).collect()
    }

    async fn tutors_with_aggregates_since(&self, since: NaiveDate) -> Result<Vec<Uuid>> {
        let tutors = sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT tutor_id FROM tutor_quality.daily_aggregates \
             WHERE date >= $1 ORDER BY tutor_id",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(tutors)
    }

    async fn active_alert(&self, tutor_id: Uuid, alert_type: AlertType) -> Result<Option<Alert>> {
        let query = format!(
            "SELECT {ALERT_COLUMNS} FROM tutor_quality.alerts \
             WHERE tutor_id = $1 AND alert_type = $2 AND status <> 'resolved'"
        );
        let row = sqlx::query(&query)
            .bind(tutor_id)
            .bind(alert_type.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(alert_from_row).transpose()
    }

    async fn alert(&self, alert_id: Uuid) -> Result<Option<Alert>> {
        let query = format!("SELECT {ALERT_COLUMNS} FROM tutor_quality.alerts WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(alert_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(alert_from_row).transpose()
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tutor_quality.alerts
            (id, tutor_id, alert_type, severity, status, triggered_at, resolved_at, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(alert.id)
        .bind(alert.tutor_id)
        .bind(alert.alert_type.as_str())
        .bind(alert.severity.as_str())
        .bind(alert.status.as_str())
        .bind(alert.triggered_at)
        .bind(alert.resolved_at)
        .bind(serde_json::to_value(&alert.metadata)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_alert(&self, alert: &Alert) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE tutor_quality.alerts
            SET severity = $2, status = $3, resolved_at = $4, metadata = $5
            WHERE id = $1
            "#,
        )
        .bind(alert.id)
        .bind(alert.severity.as_str())
        .bind(alert.status.as_str())
        .bind(alert.resolved_at)
        .bind(serde_json::to_value(&alert.metadata)?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("alert {}", alert.id)));
        }
        Ok(())
    }

    async fn alerts_with_status(&self, status: AlertStatus) -> Result<Vec<Alert>> {
        let query = format!(
            "SELECT {ALERT_COLUMNS} FROM tutor_quality.alerts \
             WHERE status = $1 ORDER BY triggered_at DESC"
        );
        let rows = sqlx::query(&query)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(alert_from_row).collect()
    }
}

pub async fn seed(store: &PgStore, today: NaiveDate) -> Result<usize> {
    let steady = Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")
        .map_err(|e| Error::InvalidInput(e.to_string()))?;
    let fading = Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")
        .map_err(|e| Error::InvalidInput(e.to_string()))?;
    let student = Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")
        .map_err(|e| Error::InvalidInput(e.to_string()))?;

    let mut inserted = 0usize;
    for offset in 1..=14i64 {
        let date = today - Duration::days(offset);
        let start = Utc
            .from_utc_datetime(&date.and_hms_opt(16, 0, 0).ok_or_else(|| {
                Error::InvalidInput(format!("invalid seed date {date}"))
            })?);

        let steady_session = seed_session(steady, student, start, offset, SessionStatus::Completed, 0);
        store.insert_session(&steady_session).await?;
        store.insert_transcript(&seed_transcript(steady_session.id, true)).await?;
        inserted += 1;

        // The second tutor stops teaching a week ago and starts arriving late before that.
        if offset > 7 {
            let fading_session =
                seed_session(fading, student, start, offset, SessionStatus::Completed, offset - 4);
            store.insert_session(&fading_session).await?;
            store.insert_transcript(&seed_transcript(fading_session.id, false)).await?;
            inserted += 1;
        } else if offset % 3 == 0 {
            let mut rescheduled =
                seed_session(fading, student, start, offset, SessionStatus::Rescheduled, 0);
            rescheduled.reschedule_initiator = Some(RescheduleInitiator::Tutor);
            store.insert_session(&rescheduled).await?;
            inserted += 1;
        }
    }

    let flagged = store.refresh_first_session_flags().await?;
    debug!(flagged, "refreshed first-session flags after seeding");
    info!(inserted, "seed sessions written");
    Ok(inserted)
}

fn seed_session(
    tutor_id: Uuid,
    student_id: Uuid,
    start: DateTime<Utc>,
    offset: i64,
    status: SessionStatus,
    late_minutes: i64,
) -> Session {
    let completed = status == SessionStatus::Completed;
    Session {
        id: Uuid::new_v4(),
        tutor_id,
        student_id,
        scheduled_start_at: Some(start),
        scheduled_end_at: Some(start + Duration::hours(1)),
        actual_start_at: completed.then(|| start + Duration::minutes(late_minutes)),
        actual_end_at: completed.then(|| start + Duration::hours(1)),
        status,
        reschedule_initiator: None,
        tech_issue: completed && offset % 5 == 0,
        first_session_for_student: false,
    }
}

fn seed_transcript(session_id: Uuid, engaged: bool) -> Transcript {
    let lines: &[(&str, &str, u32)] = if engaged {
        &[
            ("tutor", "Hello! Good to see you again. Our goal for today is quadratics.", 12),
            ("student", "Okay, I tried the homework but got stuck on factoring.", 11),
            ("tutor", "Let's walk through one together. What do you notice first?", 11),
            ("student", "Both terms share an x, so I can pull it out.", 11),
            ("tutor", "Great job, that's right.", 4),
            ("tutor", "To recap, we covered factoring out common terms.", 8),
            ("tutor", "Next session we'll move on to completing the square.", 9),
        ]
    } else {
        &[
            ("tutor", "Okay, open the worksheet. Problem four is the one everyone misses, obviously, because the sign flips and you have to carry it through every step.", 30),
            ("student", "I'm confused about the sign.", 5),
            ("tutor", "Come on, we did this. That's wrong, you keep dropping it.", 11),
            ("student", "What do you mean by carry it?", 6),
            ("student", "I don't get it.", 4),
            ("tutor", "Just do the rest on your own.", 7),
        ]
    };

    Transcript {
        session_id,
        turns: lines
            .iter()
            .enumerate()
            .map(|(i, (speaker, text, words))| TranscriptTurn {
                speaker: speaker.to_string(),
                text: text.to_string(),
                word_count: *words,
                timestamp: Some(i as f64 * 90.0),
            })
            .collect(),
        metadata: TranscriptMetadata::default(),
    }
}

/// Imports sessions from a CSV file; an optional `transcript_path` column points at a
/// JSON transcript (`{"turns": [...], "metadata": {...}}`) relative to the CSV.
pub async fn import_csv(store: &PgStore, csv_path: &Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        id: Option<Uuid>,
        tutor_id: Uuid,
        student_id: Uuid,
        scheduled_start_at: Option<DateTime<Utc>>,
        scheduled_end_at: Option<DateTime<Utc>>,
        actual_start_at: Option<DateTime<Utc>>,
        actual_end_at: Option<DateTime<Utc>>,
        status: SessionStatus,
        reschedule_initiator: Option<RescheduleInitiator>,
        #[serde(default)]
        tech_issue: bool,
        transcript_path: Option<String>,
    }

    #[derive(serde::Deserialize)]
    struct TranscriptFile {
        #[serde(default)]
        turns: Vec<TranscriptTurn>,
        #[serde(default)]
        metadata: TranscriptMetadata,
    }

    let base = csv_path.parent().unwrap_or_else(|| Path::new("."));
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut imported = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let session = Session {
            id: row.id.unwrap_or_else(Uuid::new_v4),
            tutor_id: row.tutor_id,
            student_id: row.student_id,
            scheduled_start_at: row.scheduled_start_at,
            scheduled_end_at: row.scheduled_end_at,
            actual_start_at: row.actual_start_at,
            actual_end_at: row.actual_end_at,
            status: row.status,
            reschedule_initiator: row.reschedule_initiator,
            tech_issue: row.tech_issue,
            first_session_for_student: false,
        };
        store.insert_session(&session).await?;

        if let Some(relative) = row.transcript_path.filter(|p| !p.trim().is_empty()) {
            let raw = std::fs::read_to_string(base.join(&relative))?;
            let file: TranscriptFile = serde_json::from_str(&raw)?;
            store
                .insert_transcript(&Transcript {
                    session_id: session.id,
                    turns: file.turns,
                    metadata: file.metadata,
                })
                .await?;
        }
        imported += 1;
    }

    let flagged = store.refresh_first_session_flags().await?;
    debug!(flagged, "refreshed first-session flags after import");
    Ok(imported)
}
