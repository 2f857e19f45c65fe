use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{PracticeMode, PracticeSession, percent};

/// Per-topic performance inside the reporting window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicAnalytics {
    pub topic: String,
    pub session_count: u32,
    /// Correct answers over questions asked in this topic, in percent.
    pub average_score: f64,
    /// Mean of the later half of session scores minus the earlier half.
    pub improvement: f64,
    /// Active time attributed to this topic by its share of each session's questions.
    pub time_spent_seconds: f64,
    pub last_practiced_at: DateTime<Utc>,
}

/// Per-mode performance inside the reporting window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModePerformance {
    pub mode: PracticeMode,
    pub session_count: u32,
    pub average_score: f64,
    pub total_time_seconds: u64,
}

#[derive(Default)]
struct TopicAccumulator {
    sessions: u32,
    asked: u32,
    correct: u32,
    time_spent_seconds: f64,
    last_practiced_at: Option<DateTime<Utc>>,
    scores: Vec<(DateTime<Utc>, f64)>,
}

/// Topic breakdown, sorted by topic name.
///
/// `sessions` may be in any order; scores are put in chronological order
/// before the improvement is computed.
#[must_use]
pub fn topic_breakdown(sessions: &[&PracticeSession]) -> Vec<TopicAnalytics> {
    let mut by_topic: BTreeMap<&str, TopicAccumulator> = BTreeMap::new();

    for session in sessions {
        let total = session.questions().len();
        for topic in session.topics() {
            let asked = session.questions().iter().filter(|q| q.topic() == topic).count();
            let correct = session
                .answers()
                .iter()
                .filter(|a| a.correct && a.topic == topic)
                .count();

            let acc = by_topic.entry(topic).or_default();
            acc.sessions += 1;
            acc.asked = acc.asked.saturating_add(u32::try_from(asked).unwrap_or(u32::MAX));
            acc.correct = acc
                .correct
                .saturating_add(u32::try_from(correct).unwrap_or(u32::MAX));
            #[allow(clippy::cast_precision_loss)]
            let share = asked as f64 / total.max(1) as f64;
            #[allow(clippy::cast_precision_loss)]
            let session_seconds = session.time_spent_seconds() as f64;
            acc.time_spent_seconds += session_seconds * share;
            acc.last_practiced_at = acc.last_practiced_at.max(Some(session.start_time()));
            if let Some(score) = session.topic_score_percent(topic) {
                acc.scores.push((session.start_time(), score));
            }
        }
    }

    by_topic
        .into_iter()
        .filter_map(|(topic, mut acc)| {
            acc.scores.sort_by_key(|(at, _)| *at);
            let scores: Vec<f64> = acc.scores.iter().map(|(_, s)| *s).collect();
            Some(TopicAnalytics {
                topic: topic.to_owned(),
                session_count: acc.sessions,
                average_score: percent(acc.correct, acc.asked),
                improvement: improvement(&scores),
                time_spent_seconds: acc.time_spent_seconds,
                last_practiced_at: acc.last_practiced_at?,
            })
        })
        .collect()
}

/// Mean of the second half minus mean of the first half, split at `n / 2`.
///
/// Fewer than two points give 0.
#[must_use]
pub fn improvement(chronological_scores: &[f64]) -> f64 {
    if chronological_scores.len() < 2 {
        return 0.0;
    }
    let (first, second) = chronological_scores.split_at(chronological_scores.len() / 2);
    mean(second) - mean(first)
}

/// Mode breakdown, in `PracticeMode` order.
#[must_use]
pub fn mode_breakdown(sessions: &[&PracticeSession]) -> Vec<ModePerformance> {
    let mut by_mode: BTreeMap<PracticeMode, (Vec<f64>, u64)> = BTreeMap::new();
    for session in sessions {
        let entry = by_mode.entry(session.mode()).or_default();
        entry.0.push(session.score_percent());
        entry.1 = entry.1.saturating_add(session.time_spent_seconds());
    }

    by_mode
        .into_iter()
        .map(|(mode, (scores, total_time_seconds))| ModePerformance {
            mode,
            session_count: u32::try_from(scores.len()).unwrap_or(u32::MAX),
            average_score: mean(&scores),
            total_time_seconds,
        })
        .collect()
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    values.iter().sum::<f64>() / n
}
