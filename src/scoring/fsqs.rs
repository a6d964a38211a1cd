use chrono::{DateTime, Utc};

use crate::components::{FsqsComponents, ScoreComponents};
use crate::models::{Score, Session, Transcript};
use crate::scoring::from_ceiling;
use crate::transcript::{penalty, TranscriptSignals};

const LATENESS_DISRUPTION_MINUTES: f64 = 5.0;

struct Check {
    points: u32,
    failed: bool,
    went_well: &'static str,
    improvement: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FsqsResult {
    pub score: f64,
    pub components: FsqsComponents,
}

impl FsqsResult {
    pub fn to_score(&self, session: &Session, computed_at: DateTime<Utc>) -> Score {
        Score::new(
            session.tutor_id,
            Some(session.id),
            self.score,
            ScoreComponents::Fsqs(self.components.clone()),
            computed_at,
        )
    }
}

pub fn score_first_session(
    session: &Session,
    transcript: Option<&Transcript>,
) -> Option<FsqsResult> {
    if !session.first_session_for_student {
        return None;
    }
    let transcript = transcript.filter(|t| t.has_diarization())?;
    let signals = TranscriptSignals::analyze(transcript);

    let disrupted = session.tech_issue
        || session
            .lateness_minutes()
            .map(|minutes| minutes > LATENESS_DISRUPTION_MINUTES)
            .unwrap_or(false);

    // Declaration order doubles as the tie-break for the improvement idea.
    let checks = [
        Check {
            points: 20,
            failed: signals.confusion_triggered(),
            went_well: "Your student stayed with you and rarely sounded confused.",
            improvement: "Pause to check understanding more often; your student sounded confused several times.",
        },
        Check {
            points: 20,
            failed: signals.word_share_triggered(),
            went_well: "You gave your student plenty of room to talk.",
            improvement: "Ask more open questions so your student does more of the talking.",
        },
        Check {
            points: 20,
            failed: !signals.has_goal_setting,
            went_well: "You set a clear goal at the start of the session.",
            improvement: "Open the session by agreeing on a goal for the hour.",
        },
        Check {
            points: 10,
            failed: !signals.has_encouragement,
            went_well: "You encouraged your student along the way.",
            improvement: "Call out what your student does well to build confidence.",
        },
        Check {
            points: 5,
            failed: signals.negative_triggered(),
            went_well: "Your feedback stayed constructive throughout.",
            improvement: "Reframe corrections positively instead of saying an answer is wrong.",
        },
        Check {
            points: 15,
            failed: !signals.has_closing_summary,
            went_well: "You wrapped up with a clear summary.",
            improvement: "Close with a short recap of what you covered together.",
        },
        Check {
            points: 10,
            failed: disrupted,
            went_well: "The session started on time without technical trouble.",
            improvement: "Join a few minutes early and test your audio and video before the session.",
        },
        Check {
            points: 15,
            failed: !signals.has_greeting,
            went_well: "You greeted your student warmly.",
            improvement: "Start with a friendly greeting to put your student at ease.",
        },
        Check {
            points: 15,
            failed: !signals.has_intro,
            went_well: "You introduced yourself and learned about your student.",
            improvement: "Introduce yourself and ask about your student's background and goals.",
        },
        Check {
            points: 15,
            failed: !signals.has_future_planning,
            went_well: "You planned the next steps for future sessions.",
            improvement: "Before ending, plan what you will work on in the next session.",
        },
    ];

    let what_went_well = checks
        .iter()
        .filter(|check| !check.failed)
        .map(|check| check.went_well)
        .collect::<Vec<_>>()
        .join(" ");

    let mut improvement: Option<&Check> = None;
    for check in checks.iter().filter(|check| check.failed) {
        if improvement.map_or(true, |best| check.points > best.points) {
            improvement = Some(check);
        }
    }

    let components = FsqsComponents {
        confusion_penalty: penalty(checks[0].failed, checks[0].points),
        word_share_penalty: penalty(checks[1].failed, checks[1].points),
        goal_setting_penalty: penalty(checks[2].failed, checks[2].points),
        encouragement_penalty: penalty(checks[3].failed, checks[3].points),
        negative_phrasing_penalty: penalty(checks[4].failed, checks[4].points),
        closing_summary_penalty: penalty(checks[5].failed, checks[5].points),
        tech_lateness_penalty: penalty(checks[6].failed, checks[6].points),
        greeting_penalty: penalty(checks[7].failed, checks[7].points),
        intro_penalty: penalty(checks[8].failed, checks[8].points),
        future_planning_penalty: penalty(checks[9].failed, checks[9].points),
        what_went_well,
        improvement_idea: improvement.map(|check| check.improvement.to_string()),
    };

    Some(FsqsResult {
        score: from_ceiling(components.total_penalty()),
        components,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionStatus;
    use crate::transcript::tests::{exemplary_transcript, transcript, turn};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
    }

    fn first_session() -> Session {
        Session {
            id: Uuid::new_v4(),
            tutor_id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            scheduled_start_at: Some(at(9, 0)),
            scheduled_end_at: Some(at(10, 0)),
            actual_start_at: Some(at(9, 0)),
            actual_end_at: Some(at(10, 0)),
            status: SessionStatus::Completed,
            reschedule_initiator: None,
            tech_issue: false,
            first_session_for_student: true,
        }
    }

    #[test]
    fn perfect_first_session_scores_100_with_no_improvement() {
        let result = score_first_session(&first_session(), Some(&exemplary_transcript())).unwrap();
        assert_eq!(result.score, 100.0);
        assert!(result.components.improvement_idea.is_none());
        assert!(result.components.what_went_well.contains("greeted your student"));
        assert!(result.components.what_went_well.contains("started on time"));
    }

    #[test]
    fn not_a_first_session_is_skipped() {
        let mut session = first_session();
        session.first_session_for_student = false;
        assert!(score_first_session(&session, Some(&exemplary_transcript())).is_none());
    }

    #[test]
    fn missing_transcript_is_skipped() {
        assert!(score_first_session(&first_session(), None).is_none());
        let untagged = transcript(vec![turn(" ", "hello", 1)]);
        assert!(score_first_session(&first_session(), Some(&untagged)).is_none());
    }

    #[test]
    fn tech_issue_and_lateness_are_one_penalty() {
        let mut session = first_session();
        session.tech_issue = true;
        session.actual_start_at = Some(at(9, 20));
        let result = score_first_session(&session, Some(&exemplary_transcript())).unwrap();
        assert_eq!(result.components.tech_lateness_penalty, 10);
        assert_eq!(result.score, 90.0);
    }

    #[test]
    fn lateness_must_exceed_five_minutes() {
        let mut session = first_session();
        session.actual_start_at = Some(at(9, 5));
        let on_edge = score_first_session(&session, Some(&exemplary_transcript())).unwrap();
        assert_eq!(on_edge.components.tech_lateness_penalty, 0);

        session.actual_start_at = Some(at(9, 6));
        let late = score_first_session(&session, Some(&exemplary_transcript())).unwrap();
        assert_eq!(late.components.tech_lateness_penalty, 10);
    }

    #[test]
    fn improvement_idea_is_the_costliest_failure() {
        // Fails greeting (15), intro (15), encouragement (10); greeting wins the tie.
        let t = transcript(vec![
            turn("tutor", "Okay let's start.", 3),
            turn("tutor", "Our goal for today is geometry.", 6),
            turn("student", "Sure, triangles then.", 30),
            turn("tutor", "To recap, we covered triangles. Next session: circles.", 8),
        ]);
        let result = score_first_session(&first_session(), Some(&t)).unwrap();
        assert_eq!(result.components.greeting_penalty, 15);
        assert_eq!(result.components.intro_penalty, 15);
        assert_eq!(result.components.encouragement_penalty, 10);
        assert_eq!(result.score, 60.0);
        assert_eq!(
            result.components.improvement_idea.as_deref(),
            Some("Start with a friendly greeting to put your student at ease.")
        );
        assert!(!result.components.what_went_well.contains("greeted"));
    }

    #[test]
    fn score_never_drops_below_zero() {
        let t = transcript(vec![
            turn("student", "I'm confused, I'm lost, what do you mean", 10),
            turn("tutor", "That's wrong. Come on, obviously.", 90),
        ]);
        let mut session = first_session();
        session.tech_issue = true;
        let result = score_first_session(&session, Some(&t)).unwrap();
        assert_eq!(result.components.total_penalty(), 145);
        assert_eq!(result.score, 0.0);
    }
}
