use chrono::{DateTime, Utc};

use crate::components::{QualityLabel, ScoreComponents, SqsComponents};
use crate::models::{Score, Session, Transcript};
use crate::scoring::from_ceiling;
use crate::transcript::{penalty, TranscriptSignals};

const LATENESS_POINTS_PER_MINUTE: f64 = 2.0;
const MAX_LATENESS_PENALTY: f64 = 20.0;
const MAX_SHORTFALL_PENALTY: f64 = 10.0;
const TECH_PENALTY: u32 = 10;

const CONFUSION_PENALTY: u32 = 20;
const WORD_SHARE_PENALTY: u32 = 20;
const GOAL_SETTING_PENALTY: u32 = 20;
const ENCOURAGEMENT_PENALTY: u32 = 10;
const CLOSING_SUMMARY_PENALTY: u32 = 15;
const NEGATIVE_PHRASING_PENALTY: u32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct SqsResult {
    pub score: f64,
    pub label: QualityLabel,
    pub components: SqsComponents,
}

impl SqsResult {
    pub fn to_score(&self, session: &Session, computed_at: DateTime<Utc>) -> Score {
        Score::new(
            session.tutor_id,
            Some(session.id),
            self.score,
            ScoreComponents::Sqs(self.components.clone()),
            computed_at,
        )
    }
}

/// `min(20, 2 * ceil(minutes))` for positive lateness.
pub fn lateness_penalty(minutes: f64) -> u32 {
    if minutes <= 0.0 {
        return 0;
    }
    (LATENESS_POINTS_PER_MINUTE * minutes.ceil()).min(MAX_LATENESS_PENALTY) as u32
}

/// `min(10, ceil(minutes))` for a positive early end.
pub fn shortfall_penalty(minutes: f64) -> u32 {
    if minutes <= 0.0 {
        return 0;
    }
    minutes.ceil().min(MAX_SHORTFALL_PENALTY) as u32
}

pub fn score_session(session: &Session, transcript: Option<&Transcript>) -> Option<SqsResult> {
    if !session.is_completed() {
        return None;
    }
    let transcript = transcript.filter(|t| t.has_diarization())?;
    let signals = TranscriptSignals::analyze(transcript);

    let mut components = SqsComponents {
        lateness_penalty: session.lateness_minutes().map(lateness_penalty).unwrap_or(0),
        shortfall_penalty: session.shortfall_minutes().map(shortfall_penalty).unwrap_or(0),
        tech_penalty: penalty(session.tech_issue, TECH_PENALTY),
        confusion_penalty: penalty(signals.confusion_triggered(), CONFUSION_PENALTY),
        word_share_penalty: penalty(signals.word_share_triggered(), WORD_SHARE_PENALTY),
        goal_setting_penalty: penalty(!signals.has_goal_setting, GOAL_SETTING_PENALTY),
        encouragement_penalty: penalty(!signals.has_encouragement, ENCOURAGEMENT_PENALTY),
        closing_summary_penalty: penalty(!signals.has_closing_summary, CLOSING_SUMMARY_PENALTY),
        negative_phrasing_penalty: penalty(signals.negative_triggered(), NEGATIVE_PHRASING_PENALTY),
        tutor_word_share: signals.tutor_word_share,
        label: QualityLabel::Ok,
    };

    let score = from_ceiling(components.total_penalty());
    let label = QualityLabel::from_score(score);
    components.label = label;

    Some(SqsResult {
        score,
        label,
        components,
    })
}
