use std::fmt::Display;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregate::aggregate_sessions;
use crate::alerts::AlertEngine;
use crate::config::Settings;
use crate::error::Result;
use crate::models::{Alert, Session};
use crate::scoring::{fsqs, sqs, tcrs, ths};
use crate::store::{Store, UpsertOutcome};
use crate::summary::SummaryGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    Done,
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitFailure {
    pub unit: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub job: &'static str,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: Vec<UnitFailure>,
}

impl BatchReport {
    pub fn new(job: &'static str) -> Self {
        Self {
            job,
            succeeded: 0,
            skipped: 0,
            failed: Vec::new(),
        }
    }

    pub fn record(&mut self, unit: impl Display, result: Result<UnitOutcome>) {
        match result {
            Ok(UnitOutcome::Done) => self.succeeded += 1,
            Ok(UnitOutcome::Skipped) => self.skipped += 1,
            Err(e) => {
                warn!(job = self.job, unit = %unit, error = %e, "unit failed; continuing batch");
                self.failed.push(UnitFailure {
                    unit: unit.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    pub fn log(&self) {
        info!(
            job = self.job,
            succeeded = self.succeeded,
            skipped = self.skipped,
            failed = self.failed.len(),
            "batch finished"
        );
    }
}

#[derive(Debug)]
pub struct AlertSweep {
    pub report: BatchReport,
    pub created: Vec<Alert>,
    pub resolved: Vec<Alert>,
}

#[derive(Debug)]
pub struct CycleReport {
    pub scoring: BatchReport,
    pub aggregation: BatchReport,
    pub health: BatchReport,
    pub churn: BatchReport,
    pub alerts: AlertSweep,
}

pub struct Pipeline {
    settings: Settings,
    engine: AlertEngine,
    summaries: SummaryGenerator,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Self {
        let engine = AlertEngine::new(settings.alerts.clone());
        let summaries = SummaryGenerator::new(&settings.summary);
        Self {
            settings,
            engine,
            summaries,
        }
    }

    pub fn with_summaries(mut self, summaries: SummaryGenerator) -> Self {
        self.summaries = summaries;
        self
    }

    pub fn summaries(&self) -> &SummaryGenerator {
        &self.summaries
    }

    fn lookback_start(&self, today: NaiveDate) -> NaiveDate {
        today - Duration::days(self.settings.windows.lookback_days)
    }

    pub async fn score_sessions<S: Store + ?Sized>(
        &self,
        store: &S,
        now: DateTime<Utc>,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::new("score_sessions");

        for session in store.sessions_missing_sqs().await? {
            let result = self.score_sqs(store, &session, now).await;
            report.record(format_args!("sqs:{}", session.id), result);
        }
        for session in store.sessions_missing_fsqs().await? {
            let result = score_fsqs(store, &session, now).await;
            report.record(format_args!("fsqs:{}", session.id), result);
        }

        report.log();
        Ok(report)
    }

    async fn score_sqs<S: Store + ?Sized>(
        &self,
        store: &S,
        session: &Session,
        now: DateTime<Utc>,
    ) -> Result<UnitOutcome> {
        let transcript = store.transcript_for(session.id).await?;
        let Some(result) = sqs::score_session(session, transcript.as_ref()) else {
            debug!(session_id = %session.id, "no diarized transcript; sqs skipped");
            return Ok(UnitOutcome::Skipped);
        };
        store.insert_score(&result.to_score(session, now)).await?;
        self.summaries.invalidate(session.tutor_id);
        Ok(UnitOutcome::Done)
    }

    /// Rebuilds daily rows over the trailing window ending `today`.
    pub async fn aggregate_daily<S: Store + ?Sized>(
        &self,
        store: &S,
        today: NaiveDate,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::new("aggregate_daily");
        let start = today - Duration::days(self.settings.windows.aggregate_days);
        let sessions = store.sessions_scheduled_between(start, today).await?;

        let rows = aggregate_sessions(&sessions);
        for row in &rows {
            let result = store
                .upsert_daily_aggregate(row)
                .await
                .map(|_| UnitOutcome::Done);
            report.record(format_args!("{}@{}", row.tutor_id, row.date), result);
        }

        // Rows left over from sessions that have since moved or disappeared.
        let keep: Vec<(Uuid, NaiveDate)> = rows.iter().map(|r| (r.tutor_id, r.date)).collect();
        match store.prune_daily_aggregates(start, today, &keep).await {
            Ok(0) => {}
            Ok(pruned) => info!(pruned, %start, %today, "stale daily rows removed"),
            Err(e) => report.record(format_args!("prune:{start}..{today}"), Err(e)),
        }

        report.log();
        Ok(report)
    }

    pub async fn recompute_health<S: Store + ?Sized>(
        &self,
        store: &S,
        now: DateTime<Utc>,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::new("recompute_health");
        let since = self.lookback_start(now.date_naive());

        for tutor_id in store.tutors_with_aggregates_since(since).await? {
            let result = health_for(store, tutor_id, since, now).await;
            report.record(tutor_id, result);
        }

        report.log();
        Ok(report)
    }

    pub async fn recompute_churn<S: Store + ?Sized>(
        &self,
        store: &S,
        now: DateTime<Utc>,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::new("recompute_churn");
        let since = self.lookback_start(now.date_naive());

        for tutor_id in store.tutors_with_aggregates_since(since).await? {
            let result = churn_for(store, tutor_id, since, now).await;
            report.record(tutor_id, result);
        }

        report.log();
        Ok(report)
    }

    pub async fn evaluate_alerts<S: Store + ?Sized>(
        &self,
        store: &S,
        now: DateTime<Utc>,
    ) -> Result<AlertSweep> {
        let mut sweep = AlertSweep {
            report: BatchReport::new("evaluate_alerts"),
            created: Vec::new(),
            resolved: Vec::new(),
        };

        for tutor_id in store.tutors_with_scores().await? {
            match self.engine.evaluate(store, tutor_id, now).await {
                Ok(evaluation) => {
                    sweep.created.extend(evaluation.created);
                    sweep.resolved.extend(evaluation.resolved);
                    sweep.report.record(tutor_id, Ok(UnitOutcome::Done));
                }
                Err(e) => sweep.report.record(tutor_id, Err(e)),
            }
        }

        sweep.report.log();
        if !sweep.created.is_empty() {
            info!(created = sweep.created.len(), "new alerts raised");
        }
        Ok(sweep)
    }

    /// One full cycle; aggregation always runs before THS/TCRS.
    pub async fn run_cycle<S: Store + ?Sized>(
        &self,
        store: &S,
        now: DateTime<Utc>,
    ) -> Result<CycleReport> {
        let scoring = self.score_sessions(store, now).await?;
        let aggregation = self.aggregate_daily(store, now.date_naive()).await?;
        let health = self.recompute_health(store, now).await?;
        let churn = self.recompute_churn(store, now).await?;
        let alerts = self.evaluate_alerts(store, now).await?;

        Ok(CycleReport {
            scoring,
            aggregation,
            health,
            churn,
            alerts,
        })
    }
}

async fn score_fsqs<S: Store + ?Sized>(
    store: &S,
    session: &Session,
    now: DateTime<Utc>,
) -> Result<UnitOutcome> {
    let transcript = store.transcript_for(session.id).await?;
    let Some(result) = fsqs::score_first_session(session, transcript.as_ref()) else {
        debug!(session_id = %session.id, "no diarized transcript; fsqs skipped");
        return Ok(UnitOutcome::Skipped);
    };
    store.insert_score(&result.to_score(session, now)).await?;
    Ok(UnitOutcome::Done)
}

async fn health_for<S: Store + ?Sized>(
    store: &S,
    tutor_id: Uuid,
    since: NaiveDate,
    now: DateTime<Utc>,
) -> Result<UnitOutcome> {
    let rows = store
        .recent_aggregates(tutor_id, since, ths::HEALTH_WINDOW_DAYS)
        .await?;
    let Some(result) = ths::score_health(&rows) else {
        return Ok(UnitOutcome::Skipped);
    };
    let outcome = store.upsert_daily_score(&result.to_score(tutor_id, now)).await?;
    let replaced = outcome == UpsertOutcome::Updated;
    debug!(tutor_id = %tutor_id, score = result.score, replaced, "ths stored");
    Ok(UnitOutcome::Done)
}

async fn churn_for<S: Store + ?Sized>(
    store: &S,
    tutor_id: Uuid,
    since: NaiveDate,
    now: DateTime<Utc>,
) -> Result<UnitOutcome> {
    let rows = store
        .recent_aggregates(tutor_id, since, tcrs::CHURN_WINDOW_DAYS)
        .await?;
    let Some(result) = tcrs::score_churn_risk(&rows) else {
        return Ok(UnitOutcome::Skipped);
    };
    let outcome = store.upsert_daily_score(&result.to_score(tutor_id, now)).await?;
    let replaced = outcome == UpsertOutcome::Updated;
    debug!(tutor_id = %tutor_id, risk = result.score, replaced, "tcrs stored");
    Ok(UnitOutcome::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::memory::MemoryStore;
    use crate::models::{
        AlertType, DailyAggregate, Score, ScoreType, SessionStatus, Transcript,
    };
    use crate::transcript::tests::exemplary_transcript;
    use async_trait::async_trait;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 6, 0, 0).unwrap()
    }

    fn completed(tutor_id: Uuid, days_ago: i64, first: bool) -> Session {
        let start = now() - Duration::days(days_ago) + Duration::hours(8);
        Session {
            id: Uuid::new_v4(),
            tutor_id,
            student_id: Uuid::new_v4(),
            scheduled_start_at: Some(start),
            scheduled_end_at: Some(start + Duration::hours(1)),
            actual_start_at: Some(start),
            actual_end_at: Some(start + Duration::hours(1)),
            status: SessionStatus::Completed,
            reschedule_initiator: None,
            tech_issue: false,
            first_session_for_student: first,
        }
    }

    async fn with_transcript(store: &MemoryStore, session: &Session) {
        store.insert_session(session).await.unwrap();
        let transcript = Transcript {
            session_id: session.id,
            ..exemplary_transcript()
        };
        store.insert_transcript(&transcript).await.unwrap();
    }

    #[tokio::test]
    async fn scoring_skips_sessions_without_transcripts_and_never_rescores() {
        let store = MemoryStore::new();
        let tutor = Uuid::new_v4();
        let scored = completed(tutor, 1, true);
        with_transcript(&store, &scored).await;
        let bare = completed(tutor, 1, false);
        store.insert_session(&bare).await.unwrap();

        let pipeline = Pipeline::new(Settings::default());
        let report = pipeline.score_sessions(&store, now()).await.unwrap();
        // sqs + fsqs for the transcript session; the bare one is skipped.
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.skipped, 1);
        assert!(report.failed.is_empty());
        assert_eq!(store.score_count(tutor, ScoreType::Sqs).await, 1);
        assert_eq!(store.score_count(tutor, ScoreType::Fsqs).await, 1);

        let again = pipeline.score_sessions(&store, now()).await.unwrap();
        assert_eq!(again.succeeded, 0);
        assert_eq!(store.score_count(tutor, ScoreType::Sqs).await, 1);
    }

    #[tokio::test]
    async fn aggregation_is_idempotent_over_overlapping_windows() {
        let store = MemoryStore::new();
        let tutor = Uuid::new_v4();
        for days_ago in [1, 1, 2, 40] {
            store.insert_session(&completed(tutor, days_ago, false)).await.unwrap();
        }

        let pipeline = Pipeline::new(Settings::default());
        let first = pipeline.aggregate_daily(&store, now().date_naive()).await.unwrap();
        assert_eq!(first.succeeded, 2);
        let second = pipeline.aggregate_daily(&store, now().date_naive()).await.unwrap();
        assert_eq!(second.succeeded, 2);
        assert_eq!(store.aggregate_count().await, 2);
    }

    #[tokio::test]
    async fn moved_session_is_counted_only_on_its_new_date() {
        let store = MemoryStore::new();
        let tutor = Uuid::new_v4();
        let mut session = completed(tutor, 3, false);
        store.insert_session(&session).await.unwrap();

        let pipeline = Pipeline::new(Settings::default());
        pipeline.aggregate_daily(&store, now().date_naive()).await.unwrap();

        for field in [
            &mut session.scheduled_start_at,
            &mut session.scheduled_end_at,
            &mut session.actual_start_at,
            &mut session.actual_end_at,
        ] {
            *field = field.map(|t| t + Duration::days(1));
        }
        store.insert_session(&session).await.unwrap();
        pipeline.aggregate_daily(&store, now().date_naive()).await.unwrap();

        let since = now().date_naive() - Duration::days(30);
        let rows = store.recent_aggregates(tutor, since, 30).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, now().date_naive() - Duration::days(2));
        let total: i32 = rows.iter().map(|r| r.sessions_completed).sum();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn same_day_recompute_updates_in_place() {
        let store = MemoryStore::new();
        let tutor = Uuid::new_v4();
        for days_ago in 1..=14 {
            let row = DailyAggregate {
                tutor_id: tutor,
                date: now().date_naive() - Duration::days(days_ago),
                sessions_completed: 3,
                reschedules_tutor_initiated: 0,
                no_shows: 0,
                avg_lateness_min: 0.0,
            };
            store.upsert_daily_aggregate(&row).await.unwrap();
        }

        let pipeline = Pipeline::new(Settings::default());
        pipeline.recompute_health(&store, now()).await.unwrap();
        pipeline.recompute_churn(&store, now()).await.unwrap();
        let first_ths = store.latest_score(tutor, ScoreType::Ths).await.unwrap().unwrap();
        assert_eq!(first_ths.value, 100.0);

        // New no-shows arrive later the same day.
        let row = DailyAggregate {
            tutor_id: tutor,
            date: now().date_naive() - Duration::days(1),
            sessions_completed: 0,
            reschedules_tutor_initiated: 0,
            no_shows: 3,
            avg_lateness_min: 0.0,
        };
        store.upsert_daily_aggregate(&row).await.unwrap();
        let later = now() + Duration::hours(10);
        pipeline.recompute_health(&store, later).await.unwrap();
        pipeline.recompute_churn(&store, later).await.unwrap();

        assert_eq!(store.score_count(tutor, ScoreType::Ths).await, 1);
        assert_eq!(store.score_count(tutor, ScoreType::Tcrs).await, 1);
        let second_ths = store.latest_score(tutor, ScoreType::Ths).await.unwrap().unwrap();
        assert_eq!(second_ths.id, first_ths.id);
        assert_eq!(second_ths.value, 80.0);
        assert_eq!(second_ths.computed_at, later);
    }

    #[tokio::test]
    async fn tutors_outside_the_lookback_are_not_scored() {
        let store = MemoryStore::new();
        let tutor = Uuid::new_v4();
        let row = DailyAggregate {
            tutor_id: tutor,
            date: now().date_naive() - Duration::days(45),
            sessions_completed: 2,
            reschedules_tutor_initiated: 0,
            no_shows: 0,
            avg_lateness_min: 0.0,
        };
        store.upsert_daily_aggregate(&row).await.unwrap();

        let pipeline = Pipeline::new(Settings::default());
        let report = pipeline.recompute_health(&store, now()).await.unwrap();
        assert_eq!(report.succeeded + report.skipped, 0);
        assert!(store.latest_score(tutor, ScoreType::Ths).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn full_cycle_flags_a_tutor_who_stopped_teaching() {
        let store = MemoryStore::new();
        let steady = Uuid::new_v4();
        let fading = Uuid::new_v4();
        for days_ago in 1..=14 {
            for _ in 0..3 {
                store.insert_session(&completed(steady, days_ago, false)).await.unwrap();
            }
            let fading_count = if days_ago > 7 { 3 } else { 0 };
            for _ in 0..fading_count {
                store.insert_session(&completed(fading, days_ago, false)).await.unwrap();
            }
        }
        // Rows for the quiet week still exist, with nothing completed.
        for days_ago in 1..=7 {
            let mut cancelled = completed(fading, days_ago, false);
            cancelled.status = SessionStatus::Cancelled;
            store.insert_session(&cancelled).await.unwrap();
        }

        let pipeline = Pipeline::new(Settings::default());
        let cycle = pipeline.run_cycle(&store, now()).await.unwrap();
        assert_eq!(cycle.aggregation.succeeded, 28);
        assert_eq!(cycle.churn.succeeded, 2);

        let risk = store.latest_score(fading, ScoreType::Tcrs).await.unwrap().unwrap();
        assert!(risk.value >= 0.6);
        assert_eq!(cycle.alerts.created.len(), 1);
        assert_eq!(cycle.alerts.created[0].tutor_id, fading);
        assert_eq!(cycle.alerts.created[0].alert_type, AlertType::ChurnRisk);
        assert!(store.alerts_for(steady, AlertType::ChurnRisk).await.is_empty());
    }

    struct FlakyStore {
        inner: MemoryStore,
        broken_tutor: Uuid,
    }

    #[async_trait]
    impl Store for FlakyStore {
        async fn insert_session(&self, session: &Session) -> Result<()> {
            self.inner.insert_session(session).await
        }
        async fn insert_transcript(&self, transcript: &Transcript) -> Result<()> {
            self.inner.insert_transcript(transcript).await
        }
        async fn transcript_for(&self, session_id: Uuid) -> Result<Option<Transcript>> {
            self.inner.transcript_for(session_id).await
        }
        async fn sessions_scheduled_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Session>> {
            self.inner.sessions_scheduled_between(start, end).await
        }
        async fn sessions_missing_sqs(&self) -> Result<Vec<Session>> {
            self.inner.sessions_missing_sqs().await
        }
        async fn sessions_missing_fsqs(&self) -> Result<Vec<Session>> {
            self.inner.sessions_missing_fsqs().await
        }
        async fn insert_score(&self, score: &Score) -> Result<()> {
            if score.tutor_id == self.broken_tutor {
                return Err(Error::Upstream("disk full".to_string()));
            }
            self.inner.insert_score(score).await
        }
        async fn upsert_daily_score(&self, score: &Score) -> Result<UpsertOutcome> {
            self.inner.upsert_daily_score(score).await
        }
        async fn latest_score(&self, tutor_id: Uuid, score_type: ScoreType) -> Result<Option<Score>> {
            self.inner.latest_score(tutor_id, score_type).await
        }
        async fn recent_scores(&self, tutor_id: Uuid, score_type: ScoreType, limit: usize) -> Result<Vec<Score>> {
            self.inner.recent_scores(tutor_id, score_type, limit).await
        }
        async fn tutors_with_scores(&self) -> Result<Vec<Uuid>> {
            self.inner.tutors_with_scores().await
        }
        async fn upsert_daily_aggregate(&self, aggregate: &DailyAggregate) -> Result<UpsertOutcome> {
            self.inner.upsert_daily_aggregate(aggregate).await
        }
        async fn prune_daily_aggregates(&self, start: NaiveDate, end: NaiveDate, keep: &[(Uuid, NaiveDate)]) -> Result<u64> {
            self.inner.prune_daily_aggregates(start, end, keep).await
        }
        async fn recent_aggregates(&self, tutor_id: Uuid, since: NaiveDate, limit: usize) -> Result<Vec<DailyAggregate>> {
            self.inner.recent_aggregates(tutor_id, since, limit).await
        }
        async fn tutors_with_aggregates_since(&self, since: NaiveDate) -> Result<Vec<Uuid>> {
            self.inner.tutors_with_aggregates_since(since).await
        }
        async fn active_alert(&self, tutor_id: Uuid, alert_type: AlertType) -> Result<Option<Alert>> {
            self.inner.active_alert(tutor_id, alert_type).await
        }
        async fn alert(&self, alert_id: Uuid) -> Result<Option<Alert>> {
            self.inner.alert(alert_id).await
        }
        async fn insert_alert(&self, alert: &Alert) -> Result<()> {
            self.inner.insert_alert(alert).await
        }
        async fn update_alert(&self, alert: &Alert) -> Result<()> {
            self.inner.update_alert(alert).await
        }
        async fn alerts_with_status(&self, status: crate::models::AlertStatus) -> Result<Vec<Alert>> {
            self.inner.alerts_with_status(status).await
        }
    }

    #[tokio::test]
    async fn one_failing_unit_does_not_stop_the_batch() {
        let broken = Uuid::new_v4();
        let healthy = Uuid::new_v4();
        let store = FlakyStore {
            inner: MemoryStore::new(),
            broken_tutor: broken,
        };
        with_transcript(&store.inner, &completed(broken, 1, false)).await;
        with_transcript(&store.inner, &completed(healthy, 1, false)).await;

        let pipeline = Pipeline::new(Settings::default());
        let report = pipeline.score_sessions(&store, now()).await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].unit.starts_with("sqs:"));
        assert!(report.failed[0].reason.contains("disk full"));
        assert_eq!(store.inner.score_count(healthy, ScoreType::Sqs).await, 1);
    }
}
