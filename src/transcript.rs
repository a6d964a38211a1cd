//! Behavioral signal extraction from speaker-tagged transcripts.
//!
//! Matching is plain lowercase substring search against fixed phrase lists.
//! Each window (first N / last N tutor turns) is counted over tutor turns only.

use crate::models::{SpeakerRole, Transcript, TranscriptTurn};

pub const CONFUSION_PHRASES: &[&str] = &[
    "i don't understand",
    "i dont understand",
    "i'm confused",
    "i am confused",
    "i'm lost",
    "i don't get it",
    "i dont get it",
    "what do you mean",
    "can you explain that again",
    "that doesn't make sense",
    "i'm not sure what",
];

pub const GOAL_SETTING_PHRASES: &[&str] = &[
    "today we",
    "today we'll",
    "our goal",
    "goal for today",
    "goal today",
    "by the end of",
    "let's focus on",
    "we're going to work on",
    "plan for today",
    "objective",
];

pub const ENCOURAGEMENT_PHRASES: &[&str] = &[
    "great job",
    "good job",
    "well done",
    "nice work",
    "great work",
    "excellent",
    "you got it",
    "keep it up",
    "that's right",
    "exactly right",
    "awesome",
    "i'm proud of",
];

pub const NEGATIVE_PHRASES: &[&str] = &[
    "that's wrong",
    "you're wrong",
    "no, that's not",
    "that's incorrect",
    "you should know this",
    "obviously",
    "that's easy",
    "come on",
    "how do you not",
    "are you even",
];

pub const CLOSING_SUMMARY_PHRASES: &[&str] = &[
    "to summarize",
    "in summary",
    "to recap",
    "let's recap",
    "today we covered",
    "we covered",
    "we learned",
    "to wrap up",
    "key takeaway",
];

pub const GREETING_PHRASES: &[&str] = &[
    "hello",
    " hi ",
    " hi,",
    " hi!",
    " hi.",
    " hey ",
    " hey,",
    " hey!",
    " hey.",
    "good morning",
    "good afternoon",
    "good evening",
    "welcome",
    "nice to meet you",
];

pub const INTRO_PHRASES: &[&str] = &[
    "my name is",
    "i'm your tutor",
    "i am your tutor",
    "i'll be your tutor",
    "tell me about yourself",
    "tell me a little about",
    "what grade are you",
    "what are you studying",
    "your background",
    "about me",
];

pub const FUTURE_PLANNING_PHRASES: &[&str] = &[
    "next session",
    "next time",
    "next week",
    "see you on",
    "before we meet again",
    "schedule",
    "homework",
    "practice before",
    "when we meet",
];

const CONFUSION_THRESHOLD: usize = 3;
const NEGATIVE_THRESHOLD: usize = 2;
const MAX_TUTOR_WORD_SHARE: f64 = 0.75;

const GOAL_SETTING_WINDOW: usize = 3;
const CLOSING_WINDOW: usize = 3;
const GREETING_WINDOW: usize = 2;
const INTRO_WINDOW: usize = 5;
const FUTURE_PLANNING_WINDOW: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSignals {
    pub confusion_matches: usize,
    /// `None` when neither speaker has any words.
    pub tutor_word_share: Option<f64>,
    pub has_goal_setting: bool,
    pub has_encouragement: bool,
    pub negative_matches: usize,
    pub has_closing_summary: bool,
    pub has_greeting: bool,
    pub has_intro: bool,
    pub has_future_planning: bool,
}

impl TranscriptSignals {
    pub fn analyze(transcript: &Transcript) -> Self {
        let tutor = turns_by(transcript, SpeakerRole::Tutor);
        let student = turns_by(transcript, SpeakerRole::Student);

        Self {
            confusion_matches: count_turn_matches(&student, CONFUSION_PHRASES),
            tutor_word_share: tutor_word_share(transcript),
            has_goal_setting: any_match(first(&tutor, GOAL_SETTING_WINDOW), GOAL_SETTING_PHRASES),
            has_encouragement: any_match(&tutor, ENCOURAGEMENT_PHRASES),
            negative_matches: count_occurrences(&tutor, NEGATIVE_PHRASES),
            has_closing_summary: any_match(last(&tutor, CLOSING_WINDOW), CLOSING_SUMMARY_PHRASES),
            has_greeting: any_match(first(&tutor, GREETING_WINDOW), GREETING_PHRASES),
            has_intro: any_match(first(&tutor, INTRO_WINDOW), INTRO_PHRASES),
            has_future_planning: any_match(
                last(&tutor, FUTURE_PLANNING_WINDOW),
                FUTURE_PLANNING_PHRASES,
            ),
        }
    }

    pub fn confusion_triggered(&self) -> bool {
        self.confusion_matches >= CONFUSION_THRESHOLD
    }

    pub fn word_share_triggered(&self) -> bool {
        self.tutor_word_share
            .map(|share| share > MAX_TUTOR_WORD_SHARE)
            .unwrap_or(false)
    }

    pub fn negative_triggered(&self) -> bool {
        self.negative_matches >= NEGATIVE_THRESHOLD
    }
}

pub fn penalty(triggered: bool, points: u32) -> u32 {
    if triggered {
        points
    } else {
        0
    }
}

fn turns_by(transcript: &Transcript, role: SpeakerRole) -> Vec<&TranscriptTurn> {
    transcript
        .turns
        .iter()
        .filter(|turn| turn.role() == Some(role))
        .collect()
}

fn first<'a, 'b>(turns: &'b [&'a TranscriptTurn], n: usize) -> &'b [&'a TranscriptTurn] {
    &turns[..turns.len().min(n)]
}

fn last<'a, 'b>(turns: &'b [&'a TranscriptTurn], n: usize) -> &'b [&'a TranscriptTurn] {
    &turns[turns.len().saturating_sub(n)..]
}

/// Text is padded with a space on both sides so short phrases can anchor on word edges.
fn any_match(turns: &[&TranscriptTurn], phrases: &[&str]) -> bool {
    turns.iter().any(|turn| {
        let text = format!(" {} ", turn.text.to_lowercase());
        phrases.iter().any(|phrase| text.contains(phrase))
    })
}

/// One hit per (turn, phrase) pair present.
fn count_turn_matches(turns: &[&TranscriptTurn], phrases: &[&str]) -> usize {
    turns
        .iter()
        .map(|turn| {
            let text = turn.text.to_lowercase();
            phrases.iter().filter(|phrase| text.contains(*phrase)).count()
        })
        .sum()
}

/// Every non-overlapping occurrence of every phrase.
fn count_occurrences(turns: &[&TranscriptTurn], phrases: &[&str]) -> usize {
    turns
        .iter()
        .map(|turn| {
            let text = turn.text.to_lowercase();
            phrases
                .iter()
                .map(|phrase| text.matches(phrase).count())
                .sum::<usize>()
        })
        .sum()
}

fn tutor_word_share(transcript: &Transcript) -> Option<f64> {
    let mut tutor_words = transcript.metadata.tutor_words;
    let mut student_words = transcript.metadata.student_words;

    if tutor_words == 0 && student_words == 0 {
        for turn in &transcript.turns {
            match turn.role() {
                Some(SpeakerRole::Tutor) => tutor_words += u64::from(turn.word_count),
                Some(SpeakerRole::Student) => student_words += u64::from(turn.word_count),
                None => {}
            }
        }
    }

    let total = tutor_words + student_words;
    if total == 0 {
        return None;
    }
    Some(tutor_words as f64 / total as f64)
}
