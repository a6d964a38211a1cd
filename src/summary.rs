//! Summaries are cached per tutor; the scoring job invalidates a tutor's entry
//! whenever it stores a new SQS for them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::sync::Cache;
use tracing::warn;
use uuid::Uuid;

use crate::components::{SqsComponents, Trend};
use crate::config::{SummarySettings, MAX_CACHE_TTL_SECS};
use crate::error::Result;
use crate::feedback::{most_common_issue, NarrativeProvider, RuleBasedNarrative, SummaryFacts};
use crate::models::ScoreType;
use crate::scoring::mean;
use crate::store::Store;

const SCORE_TREND_DEAD_BAND: f64 = 5.0;
const MAX_CACHED_TUTORS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSummary {
    pub tutor_id: Uuid,
    pub facts: SummaryFacts,
    pub narrative: String,
    /// The narrative came from the rule-based renderer after the provider failed.
    pub fallback: bool,
    pub generated_at: DateTime<Utc>,
}

pub struct SummaryGenerator {
    cache: Cache<Uuid, PerformanceSummary>,
    history_limit: usize,
    provider: Arc<dyn NarrativeProvider>,
}

impl SummaryGenerator {
    pub fn new(settings: &SummarySettings) -> Self {
        let ttl = settings.cache_ttl_secs.clamp(1, MAX_CACHE_TTL_SECS);
        Self {
            cache: Cache::builder()
                .max_capacity(MAX_CACHED_TUTORS)
                .time_to_live(Duration::from_secs(ttl))
                .build(),
            history_limit: settings.history_limit.max(1),
            provider: Arc::new(RuleBasedNarrative),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn NarrativeProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn invalidate(&self, tutor_id: Uuid) {
        self.cache.invalidate(&tutor_id);
    }

    pub async fn summary<S: Store + ?Sized>(
        &self,
        store: &S,
        tutor_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<PerformanceSummary>> {
        if let Some(cached) = self.cache.get(&tutor_id) {
            return Ok(Some(cached));
        }

        let history = store
            .recent_scores(tutor_id, ScoreType::Sqs, self.history_limit)
            .await?;
        if history.is_empty() {
            return Ok(None);
        }

        // Newest first from the store; flip for the trend split.
        let values: Vec<f64> = history.iter().rev().map(|s| s.value).collect();
        let components: Vec<SqsComponents> = history
            .iter()
            .filter_map(|s| s.components.as_sqs().cloned())
            .collect();

        let facts = SummaryFacts {
            sessions_considered: history.len(),
            average_score: mean(&values),
            latest_score: history[0].value,
            trend: score_trend(&values),
            most_common_issue: most_common_issue(&components),
        };

        let (narrative, fallback) = match self.provider.narrate(&facts).await {
            Ok(text) => (text, false),
            Err(e) => {
                warn!(tutor_id = %tutor_id, error = %e, "narrative provider failed; using rule-based text");
                (RuleBasedNarrative::render(&facts), true)
            }
        };

        let summary = PerformanceSummary {
            tutor_id,
            facts,
            narrative,
            fallback,
            generated_at: now,
        };
        self.cache.insert(tutor_id, summary.clone());
        Ok(Some(summary))
    }
}

/// Newer half against older half of an oldest-first series.
fn score_trend(values: &[f64]) -> Trend {
    let half = values.len() / 2;
    if half == 0 {
        return Trend::Stable;
    }
    let (older, newer) = values.split_at(half);
    Trend::classify(mean(older), mean(newer), SCORE_TREND_DEAD_BAND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{QualityLabel, ScoreComponents};
    use crate::error::Error;
    use crate::feedback::SessionIssue;
    use crate::memory::MemoryStore;
    use crate::models::Score;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap()
    }

    fn sqs(tutor_id: Uuid, value: f64, hours: i64, goal_penalty: u32) -> Score {
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
                goal_setting_penalty: goal_penalty,
                encouragement_penalty: 0,
                closing_summary_penalty: 0,
                negative_phrasing_penalty: 0,
                tutor_word_share: None,
                label: QualityLabel::from_score(value),
            }),
            t0() + Duration::hours(hours),
        )
    }

    struct FailingProvider;

    #[async_trait]
    impl NarrativeProvider for FailingProvider {
        async fn narrate(&self, _facts: &SummaryFacts) -> Result<String> {
            Err(Error::Upstream("generator timed out".to_string()))
        }
    }

    #[tokio::test]
    async fn no_history_means_no_summary() {
        let store = MemoryStore::new();
        let generator = SummaryGenerator::new(&SummarySettings::default());
        assert!(generator.summary(&store, Uuid::new_v4(), t0()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn summary_reports_trend_and_common_issue() {
        let store = MemoryStore::new();
        let tutor = Uuid::new_v4();
        for (i, value) in [60.0, 65.0, 80.0, 100.0].into_iter().enumerate() {
            let penalty = if value < 100.0 { 20 } else { 0 };
            store.insert_score(&sqs(tutor, value, i as i64, penalty)).await.unwrap();
        }

        let generator = SummaryGenerator::new(&SummarySettings::default());
        let summary = generator.summary(&store, tutor, t0()).await.unwrap().unwrap();
        assert_eq!(summary.facts.sessions_considered, 4);
        assert_eq!(summary.facts.latest_score, 100.0);
        assert!((summary.facts.average_score - 76.25).abs() < 1e-9);
        assert_eq!(summary.facts.trend, Trend::Improving);
        assert_eq!(summary.facts.most_common_issue, Some(SessionIssue::GoalSetting));
        assert!(!summary.fallback);
    }

    #[tokio::test]
    async fn cached_until_invalidated() {
        let store = MemoryStore::new();
        let tutor = Uuid::new_v4();
        store.insert_score(&sqs(tutor, 70.0, 0, 20)).await.unwrap();

        let generator = SummaryGenerator::new(&SummarySettings::default());
        let first = generator.summary(&store, tutor, t0()).await.unwrap().unwrap();

        store.insert_score(&sqs(tutor, 100.0, 1, 0)).await.unwrap();
        let cached = generator.summary(&store, tutor, t0()).await.unwrap().unwrap();
        assert_eq!(cached, first);

        generator.invalidate(tutor);
        let fresh = generator.summary(&store, tutor, t0()).await.unwrap().unwrap();
        assert_eq!(fresh.facts.sessions_considered, 2);
        assert_eq!(fresh.facts.latest_score, 100.0);
    }

    #[tokio::test]
    async fn oversized_ttl_is_capped() {
        let store = MemoryStore::new();
        let tutor = Uuid::new_v4();
        store.insert_score(&sqs(tutor, 88.0, 0, 0)).await.unwrap();

        let settings = SummarySettings {
            cache_ttl_secs: 100_000_000_000_000,
            ..SummarySettings::default()
        };
        let generator = SummaryGenerator::new(&settings);
        let summary = generator.summary(&store, tutor, t0()).await.unwrap().unwrap();
        assert_eq!(summary.facts.latest_score, 88.0);
    }

    #[tokio::test]
    async fn provider_failure_degrades_to_rule_based_text() {
        let store = MemoryStore::new();
        let tutor = Uuid::new_v4();
        store.insert_score(&sqs(tutor, 90.0, 0, 0)).await.unwrap();

        let generator = SummaryGenerator::new(&SummarySettings::default())
            .with_provider(Arc::new(FailingProvider));
        let summary = generator.summary(&store, tutor, t0()).await.unwrap().unwrap();
        assert!(summary.fallback);
        assert_eq!(summary.narrative, RuleBasedNarrative::render(&summary.facts));
    }

    #[test]
    fn score_trend_uses_a_five_point_band() {
        assert_eq!(score_trend(&[80.0]), Trend::Stable);
        assert_eq!(score_trend(&[80.0, 84.0]), Trend::Stable);
        assert_eq!(score_trend(&[80.0, 70.0]), Trend::Declining);
    }
}
