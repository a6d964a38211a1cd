use async_trait::async_trait;

use crate::components::{SqsComponents, Trend};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionIssue {
    Lateness,
    Shortfall,
    TechIssue,
    Confusion,
    WordShare,
    GoalSetting,
    Encouragement,
    ClosingSummary,
    NegativePhrasing,
}

impl SessionIssue {
    pub const ALL: [SessionIssue; 9] = [
        SessionIssue::Lateness,
        SessionIssue::Shortfall,
        SessionIssue::TechIssue,
        SessionIssue::Confusion,
        SessionIssue::WordShare,
        SessionIssue::GoalSetting,
        SessionIssue::Encouragement,
        SessionIssue::ClosingSummary,
        SessionIssue::NegativePhrasing,
    ];

    pub fn present_in(&self, components: &SqsComponents) -> bool {
        let points = match self {
            SessionIssue::Lateness => components.lateness_penalty,
            SessionIssue::Shortfall => components.shortfall_penalty,
            SessionIssue::TechIssue => components.tech_penalty,
            SessionIssue::Confusion => components.confusion_penalty,
            SessionIssue::WordShare => components.word_share_penalty,
            SessionIssue::GoalSetting => components.goal_setting_penalty,
            SessionIssue::Encouragement => components.encouragement_penalty,
            SessionIssue::ClosingSummary => components.closing_summary_penalty,
            SessionIssue::NegativePhrasing => components.negative_phrasing_penalty,
        };
        points > 0
    }

    pub fn advice(&self) -> &'static str {
        match self {
            SessionIssue::Lateness => "starting sessions on time",
            SessionIssue::Shortfall => "using the full scheduled time",
            SessionIssue::TechIssue => "checking your audio and video before sessions",
            SessionIssue::Confusion => "checking for understanding more often",
            SessionIssue::WordShare => "letting your students do more of the talking",
            SessionIssue::GoalSetting => "setting a goal at the start of each session",
            SessionIssue::Encouragement => "recognizing what your students do well",
            SessionIssue::ClosingSummary => "closing with a short recap",
            SessionIssue::NegativePhrasing => "framing corrections positively",
        }
    }
}

/// The issue failing in the most sessions. Ties go to the earlier issue in
/// [`SessionIssue::ALL`]; `None` when nothing failed.
pub fn most_common_issue(history: &[SqsComponents]) -> Option<SessionIssue> {
    let mut best: Option<(SessionIssue, usize)> = None;
    for issue in SessionIssue::ALL {
        let count = history.iter().filter(|c| issue.present_in(c)).count();
        if count == 0 {
            continue;
        }
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((issue, count));
        }
    }
    best.map(|(issue, _)| issue)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryFacts {
    pub sessions_considered: usize,
    pub average_score: f64,
    pub latest_score: f64,
    pub trend: Trend,
    pub most_common_issue: Option<SessionIssue>,
}

#[async_trait]
pub trait NarrativeProvider: Send + Sync {
    async fn narrate(&self, facts: &SummaryFacts) -> Result<String>;
}

pub struct RuleBasedNarrative;

impl RuleBasedNarrative {
    pub fn render(facts: &SummaryFacts) -> String {
        let mut text = format!(
            "Across your last {} sessions you averaged {:.1} (latest {:.0}).",
            facts.sessions_considered, facts.average_score, facts.latest_score
        );
        text.push(' ');
        text.push_str(match facts.trend {
            Trend::Improving => "Your scores are trending up.",
            Trend::Declining => "Your scores have slipped recently.",
            Trend::Stable => "Your scores have been steady.",
        });
        match facts.most_common_issue {
            Some(issue) => {
                text.push_str(" Biggest opportunity: ");
                text.push_str(issue.advice());
                text.push('.');
            }
            None => text.push_str(" Every check passed; keep it up."),
        }
        text
    }
}

#[async_trait]
impl NarrativeProvider for RuleBasedNarrative {
    async fn narrate(&self, facts: &SummaryFacts) -> Result<String> {
        Ok(Self::render(facts))
    }
}
