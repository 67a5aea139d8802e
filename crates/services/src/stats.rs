//! Dashboard statistics derived from a user's recent sessions.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use quiz_core::Clock;
use quiz_core::model::{Category, QuestionId, QuizSession, UserId};
use quiz_core::scoring::percent;
use quiz_core::skills::SkillGroup;
use quiz_core::time::calendar_days_between;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::catalog::QuestionCatalog;
use crate::error::SyncError;
use crate::quiz::SessionSync;
use crate::tasks::ViewScope;

const ACTIVITY_DAYS: i64 = 7;

pub const REFRESH_STATS_TASK: &str = "refresh-stats";

/// The rolling weekly challenge shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeConfig {
    pub category: Category,
    pub target: u32,
    pub bonus_xp: u64,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            category: Category::React,
            target: 3,
            bonus_xp: 500,
        }
    }
}

impl ChallengeConfig {
    #[must_use]
    pub fn description(&self) -> String {
        format!(
            "Complete {} {} quizzes to earn {} XP",
            self.target,
            self.category.label(),
            self.bonus_xp
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkillScore {
    pub group: SkillGroup,
    pub correct: u64,
    pub total: u64,
    /// Rounded percent correct; 0 when the group has no answers.
    pub score: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityDay {
    pub weekday: Weekday,
    pub score: u64,
}

impl ActivityDay {
    /// Short weekday label, e.g. "Mon".
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self.weekday {
            Weekday::Mon => "Mon",
            Weekday::Tue => "Tue",
            Weekday::Wed => "Wed",
            Weekday::Thu => "Thu",
            Weekday::Fri => "Fri",
            Weekday::Sat => "Sat",
            Weekday::Sun => "Sun",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyChallenge {
    pub category: Category,
    pub completed: u32,
    pub target: u32,
    pub bonus_xp: u64,
}

impl WeeklyChallenge {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed >= self.target
    }

    /// Completion percentage, capped at 100.
    #[must_use]
    pub fn progress_percent(&self) -> u32 {
        let done = u64::from(self.completed.min(self.target));
        percent(done, u64::from(self.target))
    }
}

/// Everything the dashboard renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardStats {
    /// One entry per skill group, in `SkillGroup::ALL` order.
    pub skill_matrix: Vec<SkillScore>,
    /// Seven buckets, oldest day first, today last.
    pub activity: Vec<ActivityDay>,
    pub weekly_challenge: WeeklyChallenge,
    pub accuracy: u32,
    pub correct: u64,
    pub wrong: u64,
    pub sessions: usize,
}

impl DashboardStats {
    /// Aggregate `sessions` as of `now`.
    ///
    /// `lookup` resolves a question's category; unknown questions count toward
    /// the category of the session they were answered in.
    pub fn from_sessions(
        sessions: &[QuizSession],
        now: DateTime<Utc>,
        lookup: impl Fn(&QuestionId) -> Option<Category>,
        challenge: &ChallengeConfig,
    ) -> Self {
        let mut groups: HashMap<SkillGroup, (u64, u64)> = HashMap::new();
        let mut correct = 0_u64;
        let mut answered = 0_u64;
        let mut asked = 0_u64;

        for session in sessions {
            for answer in session.answers() {
                let category = lookup(answer.question_id())
                    .unwrap_or_else(|| session.category().clone());
                let entry = groups.entry(SkillGroup::for_category(&category)).or_default();
                entry.1 += 1;
                if answer.is_correct() {
                    entry.0 += 1;
                }
            }
            correct += session.correct_count() as u64;
            answered += session.answers().len() as u64;
            asked += session.question_ids().len() as u64;
        }

        let skill_matrix = SkillGroup::ALL
            .iter()
            .map(|&group| {
                let (hit, total) = groups.get(&group).copied().unwrap_or_default();
                SkillScore {
                    group,
                    correct: hit,
                    total,
                    score: percent(hit, total),
                }
            })
            .collect();

        Self {
            skill_matrix,
            activity: activity_chart(sessions, now),
            weekly_challenge: weekly_challenge(sessions, now, challenge),
            accuracy: percent(correct, asked),
            correct,
            wrong: answered.saturating_sub(correct),
            sessions: sessions.len(),
        }
    }
}

fn activity_chart(sessions: &[QuizSession], now: DateTime<Utc>) -> Vec<ActivityDay> {
    let mut days: Vec<ActivityDay> = (0..ACTIVITY_DAYS)
        .rev()
        .map(|offset| ActivityDay {
            weekday: (now - Duration::days(offset)).weekday(),
            score: 0,
        })
        .collect();

    for session in sessions {
        let age = calendar_days_between(session.started_at(), now);
        if !(0..ACTIVITY_DAYS).contains(&age) {
            continue;
        }
        // Oldest day first, so today is the last bucket.
        if let Some(day) = usize::try_from(ACTIVITY_DAYS - 1 - age)
            .ok()
            .and_then(|i| days.get_mut(i))
        {
            day.score += u64::from(session.total_score());
        }
    }
    days
}

fn weekly_challenge(
    sessions: &[QuizSession],
    now: DateTime<Utc>,
    challenge: &ChallengeConfig,
) -> WeeklyChallenge {
    let window_start = now - Duration::days(ACTIVITY_DAYS);
    let completed = sessions
        .iter()
        .filter(|s| s.category() == &challenge.category)
        .filter(|s| s.started_at() >= window_start && s.started_at() <= now)
        .count();

    WeeklyChallenge {
        category: challenge.category.clone(),
        completed: u32::try_from(completed).unwrap_or(u32::MAX),
        target: challenge.target,
        bonus_xp: challenge.bonus_xp,
    }
}

/// Loads and aggregates dashboard stats for a user.
#[derive(Clone)]
pub struct StatsService {
    sessions: SessionSync,
    catalog: Arc<QuestionCatalog>,
    clock: Clock,
    recent: u32,
    challenge: ChallengeConfig,
}

impl StatsService {
    #[must_use]
    pub fn new(
        sessions: SessionSync,
        catalog: Arc<QuestionCatalog>,
        clock: Clock,
        recent: u32,
        challenge: ChallengeConfig,
    ) -> Self {
        Self {
            sessions,
            catalog,
            clock,
            recent,
            challenge,
        }
    }

    #[must_use]
    pub fn challenge(&self) -> &ChallengeConfig {
        &self.challenge
    }

    /// Read the latest sessions and aggregate them. Returns `Ok(None)` when
    /// `scope` was unmounted before the read finished.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` once the bounded retry of the session read is spent.
    pub async fn load(
        &self,
        user_id: &UserId,
        scope: &ViewScope,
    ) -> Result<Option<DashboardStats>, SyncError> {
        let read = self.sessions.list_recent(user_id, Some(self.recent));
        let Some(sessions) = scope.guard(read).await.transpose()? else {
            debug!(user_id = %user_id, "dashboard view gone, dropping stats");
            return Ok(None);
        };

        let stats = DashboardStats::from_sessions(
            &sessions,
            self.clock.now(),
            |id| self.catalog.category_of(id),
            &self.challenge,
        );
        debug!(
            user_id = %user_id,
            sessions = stats.sessions,
            accuracy = stats.accuracy,
            "dashboard stats computed"
        );
        Ok(Some(stats))
    }

    /// Load stats in the background for as long as `scope` stays mounted. The
    /// handle yields `None` if the view went away or the read failed.
    pub fn refresh(
        self: &Arc<Self>,
        user_id: UserId,
        scope: &ViewScope,
    ) -> JoinHandle<Option<DashboardStats>> {
        let service = Arc::clone(self);
        let view = scope.clone();
        let task = scope.spawn(REFRESH_STATS_TASK, async move {
            service.load(&user_id, &view).await
        });
        tokio::spawn(async move { task.await.ok().flatten().flatten() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{AnswerChoice, AnswerProps, QuizSessionProps};
    use quiz_core::time::fixed_now;

    /// Session with one answer per `(question, correct)` pair; every question weighs 2.
    fn session(
        n: u32,
        category: Category,
        started_at: DateTime<Utc>,
        answers: &[(&str, bool)],
    ) -> QuizSession {
        let question_ids: Vec<String> = answers.iter().map(|(q, _)| (*q).to_owned()).collect();
        let correct = answers.iter().filter(|(_, ok)| *ok).count() as u32;
        QuizSession::create(QuizSessionProps {
            id: format!("s{n}"),
            user_id: "u1".to_owned(),
            category,
            max_score: 2 * question_ids.len() as u32,
            question_ids,
            answers: answers
                .iter()
                .map(|(q, ok)| AnswerProps {
                    question_id: (*q).to_owned(),
                    user_answer: AnswerChoice::Single(0),
                    is_correct: *ok,
                    time_spent: 1.0,
                    answered_at: started_at,
                })
                .collect(),
            started_at,
            completed_at: Some(started_at),
            total_score: 2 * correct,
        })
        .unwrap()
    }

    fn no_lookup(_: &QuestionId) -> Option<Category> {
        None
    }

    #[test]
    fn empty_history_yields_zeroed_stable_shape() {
        let stats =
            DashboardStats::from_sessions(&[], fixed_now(), no_lookup, &ChallengeConfig::default());
        assert_eq!(stats.skill_matrix.len(), 5);
        assert!(stats.skill_matrix.iter().all(|s| s.score == 0 && s.total == 0));
        assert_eq!(stats.activity.len(), 7);
        assert!(stats.activity.iter().all(|d| d.score == 0));
        assert_eq!(stats.accuracy, 0);
        assert_eq!(stats.sessions, 0);
        assert!(!stats.weekly_challenge.is_complete());
    }

    #[test]
    fn activity_buckets_run_oldest_to_today() {
        let stats =
            DashboardStats::from_sessions(&[], fixed_now(), no_lookup, &ChallengeConfig::default());
        let labels: Vec<_> = stats.activity.iter().map(ActivityDay::label).collect();
        // fixed_now() is a Tuesday
        assert_eq!(labels, ["Wed", "Thu", "Fri", "Sat", "Sun", "Mon", "Tue"]);
    }

    #[test]
    fn old_sessions_skip_activity_but_count_elsewhere() {
        let now = fixed_now();
        let sessions = [
            session(1, Category::Css, now - Duration::hours(2), &[("c1", true), ("c2", false)]),
            session(2, Category::Css, now - Duration::days(30), &[("c3", true), ("c4", true)]),
        ];
        let stats =
            DashboardStats::from_sessions(&sessions, now, no_lookup, &ChallengeConfig::default());

        let activity_total: u64 = stats.activity.iter().map(|d| d.score).sum();
        assert_eq!(activity_total, 2);
        assert_eq!(stats.activity[6].score, 2);
        assert_eq!(stats.correct, 3);
        assert_eq!(stats.wrong, 1);
        assert_eq!(stats.accuracy, 75);

        let frontend = &stats.skill_matrix[0];
        assert_eq!(frontend.group, SkillGroup::FrontendFoundations);
        assert_eq!((frontend.correct, frontend.total, frontend.score), (3, 4, 75));
    }

    #[test]
    fn lookup_overrides_session_category() {
        let now = fixed_now();
        let sessions = [session(1, Category::React, now, &[("ts-1", true), ("r-1", false)])];
        let lookup = |id: &QuestionId| (id.as_str() == "ts-1").then_some(Category::TypeScript);
        let stats =
            DashboardStats::from_sessions(&sessions, now, lookup, &ChallengeConfig::default());

        let by_group: HashMap<_, _> = stats
            .skill_matrix
            .iter()
            .map(|s| (s.group, (s.correct, s.total)))
            .collect();
        assert_eq!(by_group[&SkillGroup::ProgrammingLanguages], (1, 1));
        assert_eq!(by_group[&SkillGroup::FrontendFoundations], (0, 1));
        assert_eq!(by_group[&SkillGroup::DeveloperTools], (0, 0));
    }

    #[test]
    fn unanswered_questions_lower_overall_accuracy() {
        let now = fixed_now();
        let mut props = session(1, Category::Html, now, &[("h1", true)]).to_props();
        props.question_ids.push("h2".to_owned());
        props.max_score = 4;
        let partial = QuizSession::create(props).unwrap();

        let stats =
            DashboardStats::from_sessions(&[partial], now, no_lookup, &ChallengeConfig::default());
        assert_eq!(stats.accuracy, 50);
        assert_eq!(stats.wrong, 0);
    }

    #[test]
    fn weekly_challenge_uses_sliding_window() {
        let now = fixed_now();
        let sessions = [
            session(1, Category::React, now - Duration::hours(1), &[("r1", true)]),
            session(2, Category::React, now - Duration::days(6), &[("r2", true)]),
            session(3, Category::React, now - Duration::days(7), &[("r3", true)]),
            session(4, Category::React, now - Duration::days(7) - Duration::seconds(1), &[("r4", true)]),
            session(5, Category::Css, now, &[("c1", true)]),
        ];
        let challenge = ChallengeConfig::default();
        let stats = DashboardStats::from_sessions(&sessions, now, no_lookup, &challenge);

        let weekly = &stats.weekly_challenge;
        assert_eq!(weekly.completed, 3);
        assert!(weekly.is_complete());
        assert_eq!(weekly.progress_percent(), 100);
        assert_eq!(weekly.bonus_xp, 500);
        assert_eq!(challenge.description(), "Complete 3 React quizzes to earn 500 XP");
    }

    #[test]
    fn activity_covers_seven_calendar_days() {
        // fixed_now() is Tuesday 22:13 UTC.
        let now = fixed_now();
        let sessions = [
            session(1, Category::Css, now - Duration::hours(22), &[("c1", true)]),
            session(2, Category::Css, now - Duration::hours(23), &[("c2", true)]),
            session(3, Category::Css, now - Duration::days(6) - Duration::hours(22), &[("c3", true)]),
            session(4, Category::Css, now - Duration::days(6) - Duration::hours(23), &[("c4", true)]),
            session(5, Category::Css, now - Duration::days(7), &[("c5", true)]),
        ];
        let stats =
            DashboardStats::from_sessions(&sessions, now, no_lookup, &ChallengeConfig::default());

        assert_eq!(stats.activity[6].weekday, Weekday::Tue);
        assert_eq!(stats.activity[6].score, 2);
        assert_eq!(stats.activity[5].weekday, Weekday::Mon);
        assert_eq!(stats.activity[5].score, 2);
        assert_eq!(stats.activity[0].weekday, Weekday::Wed);
        assert_eq!(stats.activity[0].score, 2);
        let total: u64 = stats.activity.iter().map(|d| d.score).sum();
        assert_eq!(total, 6);
        assert_eq!(stats.sessions, 5);
    }

    #[test]
    fn partial_challenge_progress_rounds() {
        let weekly = WeeklyChallenge {
            category: Category::React,
            completed: 2,
            target: 3,
            bonus_xp: 500,
        };
        assert!(!weekly.is_complete());
        assert_eq!(weekly.progress_percent(), 67);
    }
}
