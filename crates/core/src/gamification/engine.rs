use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::achievements::{AchievementDefinition, AchievementId, AchievementProgress};
use super::badges::{Badge, newly_earned};
use super::levels::{Level, LevelProgress, XpRewards};
use crate::analytics::AnalyticsReport;
use crate::model::{EventPayload, InteractionEvent, PracticeId, PracticeMode, PracticeSession};
use crate::practice::{SpeedTier, answers_per_minute};

//
// ─── EVENTS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelUp {
    pub old_level: u32,
    pub new_level: u32,
    pub new_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockedAchievement {
    pub definition: AchievementDefinition,
    pub unlocked_at: DateTime<Utc>,
}

/// Something the host may want to celebrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GamificationEvent {
    XpAwarded { amount: u32, reason: String },
    LevelUp(LevelUp),
    AchievementUnlocked(UnlockedAchievement),
    BadgeUnlocked(Badge),
    StreakExtended { days: u32 },
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Lifetime counters that drive achievements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeCounters {
    pub sessions_completed: u32,
    pub perfect_sessions: u32,
    pub cards_reviewed: u32,
    pub best_drill_tier: Option<SpeedTier>,
    pub best_streak: u32,
    pub last_streak: u32,
}

/// XP, levels, achievements and badges for one learner.
///
/// The state is serializable so the host can persist it next to the
/// session history. Every mutation returns the events it caused; reads
/// never emit anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamificationEngine {
    total_xp: u32,
    counters: PracticeCounters,
    achievements: Vec<AchievementProgress>,
    badges: Vec<Badge>,
    rewarded_sessions: BTreeSet<PracticeId>,
}

impl GamificationEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            total_xp: 0,
            counters: PracticeCounters::default(),
            achievements: AchievementId::all()
                .iter()
                .copied()
                .map(AchievementProgress::new)
                .collect(),
            badges: Vec::new(),
            rewarded_sessions: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn total_xp(&self) -> u32 {
        self.total_xp
    }

    #[must_use]
    pub fn level_progress(&self) -> LevelProgress {
        LevelProgress::for_xp(self.total_xp)
    }

    #[must_use]
    pub fn counters(&self) -> &PracticeCounters {
        &self.counters
    }

    #[must_use]
    pub fn achievements(&self) -> &[AchievementProgress] {
        &self.achievements
    }

    #[must_use]
    pub fn achievement(&self, id: AchievementId) -> Option<&AchievementProgress> {
        self.achievements.iter().find(|a| a.id() == id)
    }

    #[must_use]
    pub fn badges(&self) -> &[Badge] {
        &self.badges
    }

    /// Add XP. Returns a `LevelUp` exactly when the level increases.
    pub fn award_xp(&mut self, amount: u32) -> Option<LevelUp> {
        let old = Level::for_xp(self.total_xp);
        self.total_xp = self.total_xp.saturating_add(amount);
        let new = Level::for_xp(self.total_xp);

        (new.level > old.level).then(|| LevelUp {
            old_level: old.level,
            new_level: new.level,
            new_title: new.title.to_owned(),
        })
    }

    /// Reward a completed practice session.
    ///
    /// `report` should be aggregated from a history that already contains
    /// `session`. Open sessions and sessions rewarded before are ignored.
    pub fn apply_session(
        &mut self,
        session: &PracticeSession,
        report: &AnalyticsReport,
        now: DateTime<Utc>,
    ) -> Vec<GamificationEvent> {
        if !session.is_complete() || !self.rewarded_sessions.insert(session.id()) {
            debug!(practice_id = %session.id(), "session skipped by gamification");
            return Vec::new();
        }

        let mut events = Vec::new();
        let perfect = session.total_questions() > 0
            && session.correct_count() == session.total_questions();

        self.counters.sessions_completed = self.counters.sessions_completed.saturating_add(1);
        if perfect {
            self.counters.perfect_sessions = self.counters.perfect_sessions.saturating_add(1);
        }
        if session.mode() == PracticeMode::SpeedDrill {
            let active = i64::try_from(session.time_spent_seconds())
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX);
            let tier = SpeedTier::from_rate(answers_per_minute(session.answered_count(), active));
            self.counters.best_drill_tier = self.counters.best_drill_tier.max(Some(tier));
        }

        let mut xp = XpRewards::SESSION_COMPLETED
            .saturating_add(session.correct_count().saturating_mul(XpRewards::CORRECT_ANSWER));
        if perfect {
            xp = xp.saturating_add(XpRewards::PERFECT_SESSION);
        }

        let streak = report.streak.current;
        if streak > self.counters.last_streak {
            events.push(GamificationEvent::StreakExtended { days: streak });
            xp = xp.saturating_add(XpRewards::streak_bonus(streak));
        }
        self.counters.last_streak = streak;
        self.counters.best_streak = self.counters.best_streak.max(report.streak.longest).max(streak);

        self.push_xp(&mut events, xp, format!("{} session completed", session.mode().label()));
        self.check_achievements(&mut events, now);

        for id in newly_earned(report, &self.badges) {
            let badge = Badge {
                id,
                unlocked_at: now,
            };
            info!(badge = id.title(), "badge unlocked");
            self.badges.push(badge);
            events.push(GamificationEvent::BadgeUnlocked(badge));
        }

        events
    }

    /// React to a single telemetry event (flashcard reviews, finished videos).
    pub fn apply_event(
        &mut self,
        event: &InteractionEvent,
        now: DateTime<Utc>,
    ) -> Vec<GamificationEvent> {
        let mut events = Vec::new();
        match event.payload() {
            EventPayload::FlashcardReviewed { outcome, .. } if outcome.is_graded() => {
                self.counters.cards_reviewed = self.counters.cards_reviewed.saturating_add(1);
                self.push_xp(&mut events, XpRewards::CARD_REVIEWED, "flashcard reviewed".to_owned());
                self.check_achievements(&mut events, now);
            }
            EventPayload::VideoCompleted { .. } => {
                self.push_xp(&mut events, XpRewards::VIDEO_COMPLETED, "video completed".to_owned());
            }
            _ => {}
        }
        events
    }

    fn push_xp(&mut self, events: &mut Vec<GamificationEvent>, amount: u32, reason: String) {
        if amount == 0 {
            return;
        }
        events.push(GamificationEvent::XpAwarded { amount, reason });
        if let Some(level_up) = self.award_xp(amount) {
            info!(
                level = level_up.new_level,
                title = %level_up.new_title,
                "level up"
            );
            events.push(GamificationEvent::LevelUp(level_up));
        }
    }

    fn progress_value(&self, id: AchievementId) -> u32 {
        let c = &self.counters;
        match id {
            AchievementId::FirstSession | AchievementId::TenSessions | AchievementId::FiftySessions => {
                c.sessions_completed
            }
            AchievementId::PerfectSession | AchievementId::FivePerfect => c.perfect_sessions,
            AchievementId::HundredCards | AchievementId::ThousandCards => c.cards_reviewed,
            AchievementId::DrillAdvanced => u32::from(c.best_drill_tier >= Some(SpeedTier::Advanced)),
            AchievementId::DrillMaster => u32::from(c.best_drill_tier >= Some(SpeedTier::Master)),
            AchievementId::Streak3 | AchievementId::Streak7 | AchievementId::Streak30 => c.best_streak,
        }
    }

    fn check_achievements(&mut self, events: &mut Vec<GamificationEvent>, now: DateTime<Utc>) {
        let mut unlocked = Vec::new();
        for index in 0..self.achievements.len() {
            let value = self.progress_value(self.achievements[index].id());
            if self.achievements[index].update(value, now) {
                unlocked.push(self.achievements[index].id().definition());
            }
        }

        for definition in unlocked {
            info!(achievement = definition.id.as_str(), "achievement unlocked");
            events.push(GamificationEvent::AchievementUnlocked(UnlockedAchievement {
                definition,
                unlocked_at: now,
            }));
            self.push_xp(events, definition.xp_reward, format!("achievement: {}", definition.title));
        }
    }
}

impl Default for GamificationEngine {
    fn default() -> Self {
        Self::new()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{ReportContext, TimeRange, aggregate};
    use crate::gamification::BadgeId;
    use crate::model::{
        AnswerRecord, CardId, Difficulty, PracticeQuestion, QuestionId, ReviewOutcome, SessionId,
    };
    use crate::time::fixed_now;

    fn completed(mode: PracticeMode, correct: u32, total: u32, at: DateTime<Utc>, secs: i64) -> PracticeSession {
        let questions = (0..total)
            .map(|i| PracticeQuestion::free_text(QuestionId::new(u64::from(i)), "q", "a", "t", 1).unwrap())
            .collect();
        let mut s = PracticeSession::start(mode, questions, Difficulty::default(), at);
        for i in 0..total {
            s.record_answer(AnswerRecord {
                question_id: QuestionId::new(u64::from(i)),
                topic: "t".into(),
                correct: i < correct,
                response_ms: 1_000,
                points_awarded: u32::from(i < correct),
                answered_at: at,
            })
            .unwrap();
        }
        s.complete(at + Duration::seconds(secs), Duration::seconds(secs)).unwrap();
        s
    }

    fn report_for(history: &[PracticeSession], now: DateTime<Utc>) -> AnalyticsReport {
        aggregate(history, &ReportContext::new(now, TimeRange::AllTime))
    }

    #[test]
    fn award_xp_signals_level_up_only_on_increase() {
        let mut engine = GamificationEngine::new();
        assert_eq!(engine.award_xp(49), None);
        let up = engine.award_xp(1).unwrap();
        assert_eq!((up.old_level, up.new_level), (1, 2));
        assert_eq!(engine.award_xp(10), None);
        assert_eq!(engine.level_progress().level, 2);
        assert_eq!(engine.level_progress().level, 2);
    }

    #[test]
    fn first_perfect_session_unlocks_and_is_not_rewarded_twice() {
        let now = fixed_now();
        let history = vec![completed(PracticeMode::Quiz, 4, 4, now, 600)];
        let report = report_for(&history, now);
        let mut engine = GamificationEngine::new();

        let events = engine.apply_session(&history[0], &report, now);
        let unlocked: Vec<AchievementId> = events
            .iter()
            .filter_map(|e| match e {
                GamificationEvent::AchievementUnlocked(u) => Some(u.definition.id),
                _ => None,
            })
            .collect();
        assert_eq!(unlocked, vec![AchievementId::FirstSession, AchievementId::PerfectSession]);
        assert!(events.contains(&GamificationEvent::StreakExtended { days: 1 }));
        assert_eq!(
            engine.achievement(AchievementId::FirstSession).and_then(|a| a.unlocked_at()),
            Some(now)
        );

        let xp = engine.total_xp();
        assert!(engine.apply_session(&history[0], &report, now).is_empty());
        assert_eq!(engine.total_xp(), xp);
    }

    #[test]
    fn rewarded_sessions_survive_a_save_and_reload() {
        let now = fixed_now();
        let history = vec![
            completed(PracticeMode::Quiz, 2, 4, now, 300),
            completed(PracticeMode::Quiz, 3, 4, now, 300),
        ];
        let report = report_for(&history, now);
        let mut engine = GamificationEngine::new();
        for session in &history {
            engine.apply_session(session, &report, now);
        }

        let json = serde_json::to_string(&engine).unwrap();
        let mut reloaded: GamificationEngine = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded, engine);
        for session in &history {
            assert!(reloaded.apply_session(session, &report, now).is_empty());
        }
        assert_eq!(reloaded.counters().sessions_completed, 2);
    }

    #[test]
    fn open_session_is_ignored() {
        let now = fixed_now();
        let open = PracticeSession::start(PracticeMode::Quiz, Vec::new(), Difficulty::default(), now);
        let mut engine = GamificationEngine::new();
        assert!(engine.apply_session(&open, &AnalyticsReport::default(), now).is_empty());
        assert_eq!(engine.counters().sessions_completed, 0);
    }

    #[test]
    fn fast_drill_unlocks_speed_achievement() {
        let now = fixed_now();
        // 40 answers in one minute
        let history = vec![completed(PracticeMode::SpeedDrill, 40, 40, now, 60)];
        let report = report_for(&history, now);
        let mut engine = GamificationEngine::new();
        engine.apply_session(&history[0], &report, now);

        assert_eq!(engine.counters().best_drill_tier, Some(SpeedTier::Advanced));
        assert!(engine.achievement(AchievementId::DrillAdvanced).is_some_and(AchievementProgress::is_unlocked));
        assert!(!engine.achievement(AchievementId::DrillMaster).is_some_and(AchievementProgress::is_unlocked));
    }

    #[test]
    fn graded_flashcard_reviews_count_towards_cards() {
        let now = fixed_now();
        let session_id = SessionId::generate();
        let review = |outcome| {
            InteractionEvent::new(
                session_id,
                EventPayload::FlashcardReviewed {
                    card_id: CardId::new(1),
                    outcome,
                    response_ms: 900,
                },
                now,
            )
        };

        let mut engine = GamificationEngine::new();
        let mut unlocked = 0;
        for _ in 0..100 {
            let events = engine.apply_event(&review(ReviewOutcome::Correct), now);
            unlocked += events
                .iter()
                .filter(|e| matches!(e, GamificationEvent::AchievementUnlocked(_)))
                .count();
        }
        assert!(engine.apply_event(&review(ReviewOutcome::Skip), now).is_empty());
        assert_eq!(engine.counters().cards_reviewed, 100);
        assert_eq!(unlocked, 1);
    }

    #[test]
    fn badge_unlocks_once() {
        let now = fixed_now();
        let history: Vec<PracticeSession> = (0..30)
            .map(|d| completed(PracticeMode::Quiz, 1, 2, now - Duration::days(d), 300))
            .collect();
        let report = report_for(&history, now);
        let mut engine = GamificationEngine::new();

        let first = engine.apply_session(&history[0], &report, now);
        assert!(first.iter().any(|e| matches!(e, GamificationEvent::BadgeUnlocked(b) if b.id == BadgeId::MonthlyStreak)));

        let second = engine.apply_session(&history[1], &report, now);
        assert!(!second.iter().any(|e| matches!(e, GamificationEvent::BadgeUnlocked(_))));
        assert_eq!(engine.badges().len(), 1);
    }
}
