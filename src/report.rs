use std::fmt::Write;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Alert, AlertStatus, ScoreType};
use crate::store::Store;

const RECENT_SQS: usize = 10;
const LISTED_SESSIONS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct TutorSnapshot {
    pub tutor_id: Uuid,
    pub health: Option<f64>,
    pub churn_risk: Option<f64>,
    pub lowest_sqs: Option<f64>,
    pub sqs_count: usize,
}

#[derive(Debug, Clone)]
pub struct ReportData {
    pub generated_at: DateTime<Utc>,
    pub tutors: Vec<TutorSnapshot>,
    pub active_alerts: Vec<Alert>,
}

pub async fn collect<S: Store + ?Sized>(store: &S, now: DateTime<Utc>) -> Result<ReportData> {
    let mut tutors = Vec::new();
    for tutor_id in store.tutors_with_scores().await? {
        let health = store.latest_score(tutor_id, ScoreType::Ths).await?.map(|s| s.value);
        let churn_risk = store.latest_score(tutor_id, ScoreType::Tcrs).await?.map(|s| s.value);
        let sqs = store.recent_scores(tutor_id, ScoreType::Sqs, RECENT_SQS).await?;
        let lowest_sqs = sqs.iter().map(|s| s.value).reduce(f64::min);
        tutors.push(TutorSnapshot {
            tutor_id,
            health,
            churn_risk,
            lowest_sqs,
            sqs_count: sqs.len(),
        });
    }

    let mut active_alerts = store.alerts_with_status(AlertStatus::Open).await?;
    active_alerts.extend(store.alerts_with_status(AlertStatus::Acknowledged).await?);
    active_alerts.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));

    Ok(ReportData {
        generated_at: now,
        tutors,
        active_alerts,
    })
}

fn fmt_score(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.precision$}"))
}

pub fn build_report(data: &ReportData) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Tutor Quality Report");
    let _ = writeln!(output, "Generated at {}", data.generated_at.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Active Alerts");

    if data.active_alerts.is_empty() {
        let _ = writeln!(output, "No open or acknowledged alerts.");
    } else {
        for alert in &data.active_alerts {
            let _ = writeln!(
                output,
                "- [{}] {} for tutor {} ({}, since {}, latest {:.2})",
                alert.severity.as_str(),
                alert.alert_type,
                alert.tutor_id,
                alert.status,
                alert.triggered_at.format("%Y-%m-%d"),
                alert.metadata.latest_value
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Reliability and Churn");

    if data.tutors.is_empty() {
        let _ = writeln!(output, "No tutors have been scored yet.");
    } else {
        let mut by_risk: Vec<&TutorSnapshot> = data.tutors.iter().collect();
        by_risk.sort_by(|a, b| {
            b.churn_risk
                .unwrap_or(0.0)
                .total_cmp(&a.churn_risk.unwrap_or(0.0))
                .then(a.tutor_id.cmp(&b.tutor_id))
        });
        for tutor in by_risk {
            let _ = writeln!(
                output,
                "- {}: health {} churn risk {}",
                tutor.tutor_id,
                fmt_score(tutor.health, 0),
                fmt_score(tutor.churn_risk, 2)
            );
        }
    }

    let mut scored: Vec<&TutorSnapshot> = data
        .tutors
        .iter()
        .filter(|t| t.lowest_sqs.is_some())
        .collect();
    scored.sort_by(|a, b| {
        a.lowest_sqs
            .unwrap_or(f64::MAX)
            .total_cmp(&b.lowest_sqs.unwrap_or(f64::MAX))
    });

    let _ = writeln!(output);
    let _ = writeln!(output, "## Lowest Recent Session Quality");

    if scored.is_empty() {
        let _ = writeln!(output, "No session quality scores recorded.");
    } else {
        for tutor in scored.iter().take(LISTED_SESSIONS) {
            let _ = writeln!(
                output,
                "- {}: lowest SQS {} across {} recent sessions",
                tutor.tutor_id,
                fmt_score(tutor.lowest_sqs, 0),
                tutor.sqs_count
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertEngine;
    use crate::components::{QualityLabel, ScoreComponents, SqsComponents, TcrsComponents, Trend};
    use crate::config::AlertThresholds;
    use crate::memory::MemoryStore;
    use crate::models::Score;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 7, 0, 0).unwrap()
    }

    fn sqs(tutor_id: Uuid, value: f64) -> Score {
        Score::new(
            tutor_id,
            Some(Uuid::new_v4()),
            value,
            ScoreComponents::Sqs(SqsComponents {
                lateness_penalty: 0,
                shortfall_penalty: 0,
                tech_penalty: 0,
                confusion_penalty: 0,
                word_share_penalty: 0,
                goal_setting_penalty: 0,
                encouragement_penalty: 0,
                closing_summary_penalty: 0,
                negative_phrasing_penalty: 0,
                tutor_word_share: None,
                label: QualityLabel::from_score(value),
            }),
            now(),
        )
    }

    fn tcrs(tutor_id: Uuid, value: f64) -> Score {
        Score::new(
            tutor_id,
            None,
            value,
            ScoreComponents::Tcrs(TcrsComponents {
                days_of_data: 14,
                avg_daily_sessions: 1.5,
                consistency: 0.5,
                trend: Trend::Declining,
                activity_penalty: 0.06,
                inconsistency_penalty: 0.23,
                trend_adjustment: 0.4,
                sparsity_penalty: 0.0,
            }),
            now(),
        )
    }

    #[test]
    fn empty_report_still_has_every_section() {
        let report = build_report(&ReportData {
            generated_at: now(),
            tutors: Vec::new(),
            active_alerts: Vec::new(),
        });
        assert!(report.starts_with("# Tutor Quality Report"));
        assert!(report.contains("No open or acknowledged alerts."));
        assert!(report.contains("No tutors have been scored yet."));
        assert!(report.contains("No session quality scores recorded."));
    }

    #[tokio::test]
    async fn report_lists_alerts_and_lowest_sessions() {
        let store = MemoryStore::new();
        let fading = Uuid::new_v4();
        let steady = Uuid::new_v4();
        store.upsert_daily_score(&tcrs(fading, 0.72)).await.unwrap();
        store.insert_score(&sqs(steady, 92.0)).await.unwrap();
        store.insert_score(&sqs(steady, 58.0)).await.unwrap();

        let engine = AlertEngine::new(AlertThresholds::default());
        engine.evaluate(&store, fading, now()).await.unwrap();

        let data = collect(&store, now()).await.unwrap();
        assert_eq!(data.tutors.len(), 2);
        assert_eq!(data.active_alerts.len(), 1);

        let report = build_report(&data);
        assert!(report.contains(&format!("churn_risk for tutor {fading} (open")));
        assert!(report.contains(&format!("{fading}: health n/a churn risk 0.72")));
        assert!(report.contains(&format!("{steady}: lowest SQS 58 across 2 recent sessions")));
    }
}
