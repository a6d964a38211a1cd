use std::collections::BTreeMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{DailyAggregate, RescheduleInitiator, Session, SessionStatus};

#[derive(Default)]
struct DayTally {
    completed: i32,
    tutor_reschedules: i32,
    no_shows: i32,
    lateness_total: f64,
    late_sessions: u32,
}

/// Groups sessions by tutor and the calendar date of their scheduled start.
///
/// Average lateness only counts completed sessions that actually started late.
/// Sessions without a scheduled start have no day and are ignored.
pub fn aggregate_sessions(sessions: &[Session]) -> Vec<DailyAggregate> {
    let mut tallies: BTreeMap<(Uuid, NaiveDate), DayTally> = BTreeMap::new();

    for session in sessions {
        let Some(date) = session.scheduled_date() else {
            continue;
        };
        let tally = tallies.entry((session.tutor_id, date)).or_default();

        match session.status {
            SessionStatus::Completed => {
                tally.completed += 1;
                if let Some(minutes) = session.lateness_minutes().filter(|m| *m > 0.0) {
                    tally.lateness_total += minutes;
                    tally.late_sessions += 1;
                }
            }
            SessionStatus::Rescheduled => {
                if session.reschedule_initiator == Some(RescheduleInitiator::Tutor) {
                    tally.tutor_reschedules += 1;
                }
            }
            SessionStatus::NoShow => tally.no_shows += 1,
            SessionStatus::Cancelled => {}
        }
    }

    tallies
        .into_iter()
        .map(|((tutor_id, date), tally)| DailyAggregate {
            tutor_id,
            date,
            sessions_completed: tally.completed,
            reschedules_tutor_initiated: tally.tutor_reschedules,
            no_shows: tally.no_shows,
            avg_lateness_min: if tally.late_sessions == 0 {
                0.0
            } else {
                tally.lateness_total / f64::from(tally.late_sessions)
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, day, hour, minute, 0).unwrap()
    }

    fn session(tutor_id: Uuid, day: u32, status: SessionStatus, late_by: i64) -> Session {
        let start = at(day, 10, 0);
        Session {
            id: Uuid::new_v4(),
            tutor_id,
            student_id: Uuid::new_v4(),
            scheduled_start_at: Some(start),
            scheduled_end_at: Some(at(day, 11, 0)),
            actual_start_at: Some(start + chrono::Duration::minutes(late_by)),
            actual_end_at: Some(at(day, 11, 0)),
            status,
            reschedule_initiator: None,
            tech_issue: false,
            first_session_for_student: false,
        }
    }

    #[test]
    fn groups_by_tutor_and_day() {
        let tutor_a = Uuid::new_v4();
        let tutor_b = Uuid::new_v4();
        let sessions = vec![
            session(tutor_a, 4, SessionStatus::Completed, 0),
            session(tutor_a, 4, SessionStatus::Completed, 0),
            session(tutor_a, 5, SessionStatus::Completed, 0),
            session(tutor_b, 4, SessionStatus::NoShow, 0),
        ];
        let rows = aggregate_sessions(&sessions);
        assert_eq!(rows.len(), 3);

        let a_day4 = rows
            .iter()
            .find(|r| r.tutor_id == tutor_a && r.date.to_string() == "2026-05-04")
            .unwrap();
        assert_eq!(a_day4.sessions_completed, 2);

        let b_day4 = rows.iter().find(|r| r.tutor_id == tutor_b).unwrap();
        assert_eq!(b_day4.no_shows, 1);
        assert_eq!(b_day4.sessions_completed, 0);
    }

    #[test]
    fn only_tutor_initiated_reschedules_count() {
        let tutor = Uuid::new_v4();
        let mut by_tutor = session(tutor, 6, SessionStatus::Rescheduled, 0);
        by_tutor.reschedule_initiator = Some(RescheduleInitiator::Tutor);
        let mut by_student = session(tutor, 6, SessionStatus::Rescheduled, 0);
        by_student.reschedule_initiator = Some(RescheduleInitiator::Student);

        let rows = aggregate_sessions(&[by_tutor, by_student]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].reschedules_tutor_initiated, 1);
    }

    #[test]
    fn average_lateness_skips_on_time_sessions() {
        let tutor = Uuid::new_v4();
        let sessions = vec![
            session(tutor, 7, SessionStatus::Completed, 10),
            session(tutor, 7, SessionStatus::Completed, 4),
            session(tutor, 7, SessionStatus::Completed, 0),
            session(tutor, 7, SessionStatus::Completed, -3),
            // No-shows never contribute lateness.
            session(tutor, 7, SessionStatus::NoShow, 30),
        ];
        let rows = aggregate_sessions(&sessions);
        assert_eq!(rows[0].sessions_completed, 4);
        assert!((rows[0].avg_lateness_min - 7.0).abs() < 1e-9);
    }

    #[test]
    fn unscheduled_sessions_are_ignored() {
        let mut orphan = session(Uuid::new_v4(), 8, SessionStatus::Completed, 0);
        orphan.scheduled_start_at = None;
        assert!(aggregate_sessions(&[orphan]).is_empty());
    }
}
