use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AlertThresholds;
use crate::error::{Error, Result};
use crate::models::{Alert, AlertMetadata, AlertStatus, AlertType, AuditNote, Resolution, Score};
use crate::store::Store;

const ENGINE_ACTOR: &str = "alert-engine";

#[derive(Debug, Default)]
pub struct AlertEvaluation {
    pub created: Vec<Alert>,
    pub refreshed: Vec<Alert>,
    pub resolved: Vec<Alert>,
}

impl AlertEvaluation {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.refreshed.is_empty() && self.resolved.is_empty()
    }
}

pub struct AlertEngine {
    thresholds: AlertThresholds,
}

impl AlertEngine {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds }
    }

    pub fn breached(&self, alert_type: AlertType, value: f64) -> bool {
        match alert_type {
            AlertType::LowFirstSessionQuality => value >= self.thresholds.fsqs_threshold,
            AlertType::HighReliabilityRisk => value < self.thresholds.ths_threshold,
            AlertType::ChurnRisk => value >= self.thresholds.tcrs_threshold,
        }
    }

    /// Evaluates all three alert types independently against the tutor's latest scores.
    /// A missing score leaves that alert type untouched.
    pub async fn evaluate<S: Store + ?Sized>(
        &self,
        store: &S,
        tutor_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<AlertEvaluation> {
        let mut evaluation = AlertEvaluation::default();

        for alert_type in AlertType::ALL {
            let Some(score) = store.latest_score(tutor_id, alert_type.source()).await? else {
                debug!(tutor_id = %tutor_id, alert_type = %alert_type, "no score; skipping");
                continue;
            };
            let active = store.active_alert(tutor_id, alert_type).await?;

            match (self.breached(alert_type, score.value), active) {
                (true, None) => {
                    let alert = open_alert(tutor_id, alert_type, &score, now)?;
                    store.insert_alert(&alert).await?;
                    info!(
                        tutor_id = %tutor_id,
                        alert_type = %alert_type,
                        value = score.value,
                        "alert opened"
                    );
                    evaluation.created.push(alert);
                }
                (true, Some(mut alert)) => {
                    refresh(&mut alert, &score, now);
                    store.update_alert(&alert).await?;
                    evaluation.refreshed.push(alert);
                }
                (false, Some(mut alert)) => {
                    auto_resolve(&mut alert, &score, now)?;
                    store.update_alert(&alert).await?;
                    info!(
                        tutor_id = %tutor_id,
                        alert_type = %alert_type,
                        value = score.value,
                        "alert auto-resolved"
                    );
                    evaluation.resolved.push(alert);
                }
                (false, None) => {}
            }
        }

        Ok(evaluation)
    }
}

pub fn open_alert(
    tutor_id: Uuid,
    alert_type: AlertType,
    score: &Score,
    now: DateTime<Utc>,
) -> Result<Alert> {
    Ok(Alert {
        id: Uuid::new_v4(),
        tutor_id,
        alert_type,
        severity: alert_type.severity(),
        status: AlertStatus::Open,
        triggered_at: now,
        resolved_at: None,
        metadata: AlertMetadata {
            triggering_value: score.value,
            triggering_components: score.components.to_json()?,
            latest_value: score.value,
            last_checked_at: now,
            check_count: 1,
            auto_resolved: false,
            resolution: None,
            resolved_value: None,
            notes: vec![AuditNote {
                at: now,
                actor: ENGINE_ACTOR.to_string(),
                action: "opened".to_string(),
                note: None,
            }],
        },
    })
}

/// Re-triggered breach: merge the latest reading, keep `triggered_at` and status.
fn refresh(alert: &mut Alert, score: &Score, now: DateTime<Utc>) {
    alert.metadata.latest_value = score.value;
    alert.metadata.last_checked_at = now;
    alert.metadata.check_count += 1;
}

fn auto_resolve(alert: &mut Alert, score: &Score, now: DateTime<Utc>) -> Result<()> {
    alert.metadata.latest_value = score.value;
    alert.metadata.last_checked_at = now;
    alert.metadata.resolved_value = Some(score.value);
    alert.metadata.auto_resolved = true;
    transition(alert, AlertStatus::Resolved, now, ENGINE_ACTOR, None, Some(Resolution::Auto))
}

fn allowed(from: AlertStatus, to: AlertStatus) -> bool {
    matches!(
        (from, to),
        (AlertStatus::Open, AlertStatus::Acknowledged)
            | (AlertStatus::Open, AlertStatus::Resolved)
            | (AlertStatus::Acknowledged, AlertStatus::Resolved)
    )
}

fn transition(
    alert: &mut Alert,
    to: AlertStatus,
    now: DateTime<Utc>,
    actor: &str,
    note: Option<String>,
    resolution: Option<Resolution>,
) -> Result<()> {
    if !allowed(alert.status, to) {
        return Err(Error::InvalidTransition {
            from: alert.status,
            to,
        });
    }

    alert.status = to;
    if to == AlertStatus::Resolved {
        alert.resolved_at = Some(now);
        alert.metadata.resolution = resolution;
    }
    alert.metadata.notes.push(AuditNote {
        at: now,
        actor: actor.to_string(),
        action: to.as_str().to_string(),
        note,
    });
    Ok(())
}

async fn load<S: Store + ?Sized>(store: &S, alert_id: Uuid) -> Result<Alert> {
    store
        .alert(alert_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("alert {alert_id}")))
}

/// Marks an open alert as seen. Auto-resolution still applies afterwards.
pub async fn acknowledge<S: Store + ?Sized>(
    store: &S,
    alert_id: Uuid,
    actor: &str,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Result<Alert> {
    let mut alert = load(store, alert_id).await?;
    transition(&mut alert, AlertStatus::Acknowledged, now, actor, note, None)?;
    store.update_alert(&alert).await?;
    Ok(alert)
}

pub async fn resolve_manually<S: Store + ?Sized>(
    store: &S,
    alert_id: Uuid,
    actor: &str,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Result<Alert> {
    let mut alert = load(store, alert_id).await?;
    transition(
        &mut alert,
        AlertStatus::Resolved,
        now,
        actor,
        note,
        Some(Resolution::Manual),
    )?;
    store.update_alert(&alert).await?;
    Ok(alert)
}

/// Appends a note without changing status. Allowed on resolved alerts too.
pub async fn annotate<S: Store + ?Sized>(
    store: &S,
    alert_id: Uuid,
    actor: &str,
    note: String,
    now: DateTime<Utc>,
) -> Result<Alert> {
    if note.trim().is_empty() {
        return Err(Error::InvalidInput("annotation must not be blank".to_string()));
    }
    let mut alert = load(store, alert_id).await?;
    alert.metadata.notes.push(AuditNote {
        at: now,
        actor: actor.to_string(),
        action: "annotated".to_string(),
        note: Some(note),
    });
    store.update_alert(&alert).await?;
    Ok(alert)
}
