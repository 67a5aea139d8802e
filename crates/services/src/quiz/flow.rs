use std::sync::{Arc, Mutex, PoisonError};

use quiz_core::Clock;
use quiz_core::model::{AnswerChoice, Category, Question, QuestionId, QuizSession, User, UserId};
use quiz_core::scoring::{Progression, apply_reward};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::catalog::{QuestionCatalog, QuestionFilter};
use crate::error::FlowError;
use crate::quiz::state::{QuizAction, QuizState, reduce};
use crate::quiz::sync::{ProfileSync, SessionSync};
use crate::quiz::user_store::{SyncStatus, SyncedUser, UserStore};
use crate::tasks::ViewScope;

pub const SAVE_SESSION_TASK: &str = "save-session";
pub const SAVE_PROFILE_TASK: &str = "save-profile";

/// What `finish` produced, plus handles on the writes it started.
#[derive(Debug)]
pub struct FinishReport {
    pub session: QuizSession,
    /// `None` when no user could be resolved to reward.
    pub progression: Option<Progression>,
    /// Yields `Some(())` once the session write landed.
    pub session_write: JoinHandle<Option<()>>,
    /// Yields the settled status of the optimistic user update.
    pub profile_write: Option<JoinHandle<Option<SyncStatus>>>,
}

/// Drives one quiz at a time: start, answer, finish.
pub struct QuizFlowService {
    clock: Clock,
    catalog: Arc<QuestionCatalog>,
    sessions: SessionSync,
    profiles: ProfileSync,
    users: UserStore,
    question_count: usize,
    state: Mutex<QuizState>,
}

impl QuizFlowService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<QuestionCatalog>,
        sessions: SessionSync,
        profiles: ProfileSync,
        users: UserStore,
        question_count: usize,
    ) -> Self {
        Self {
            clock,
            catalog,
            sessions,
            profiles,
            users,
            question_count,
            state: Mutex::new(QuizState::default()),
        }
    }

    #[must_use]
    pub fn state(&self) -> QuizState {
        self.lock().clone()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<Question> {
        self.lock().current_question().cloned()
    }

    /// Sample a question set for `category` and open a new, unsaved session.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::NoQuestions` if the catalog has nothing in `category`.
    pub fn start(&self, user_id: &UserId, category: Category) -> Result<QuizState, FlowError> {
        let filter = QuestionFilter::new().category(category.clone());
        let questions = self.catalog.sample(self.question_count, &filter);
        if questions.is_empty() {
            return Err(FlowError::NoQuestions(category));
        }
        let session = QuizSession::start(user_id, category, &questions, self.clock.now())?;
        info!(
            session_id = %session.id(),
            questions = questions.len(),
            "quiz started"
        );
        Ok(self.dispatch(QuizAction::Start { session, questions }))
    }

    /// Answer `question_id`, which must be the current question.
    pub fn answer(
        &self,
        question_id: &QuestionId,
        choice: AnswerChoice,
        time_spent: f64,
    ) -> QuizState {
        self.dispatch(QuizAction::Answer {
            question_id: question_id.clone(),
            choice,
            time_spent,
            answered_at: self.clock.now(),
        })
    }

    pub fn clear_error(&self) -> QuizState {
        self.dispatch(QuizAction::ClearError)
    }

    pub fn reset(&self) -> QuizState {
        self.dispatch(QuizAction::Reset)
    }

    /// Complete the quiz.
    ///
    /// The session write is started first, then the user is read (remote, with
    /// the local copy as fallback), rewarded, pushed to the user store as
    /// pending, and merge-upserted in the background. Both writes run detached
    /// from `scope`, so unmounting the view never drops them, and neither can
    /// fail this call. Returns `None` when the quiz is not ready to finish; the
    /// reason is in `state().error`.
    pub async fn finish(&self, scope: &ViewScope) -> Option<FinishReport> {
        let state = self.dispatch(QuizAction::BeginFinish {
            completed_at: self.clock.now(),
        });
        if let Some(e) = &state.error {
            warn!(error = %e, "quiz not finished");
            return None;
        }
        let session = state.session?;

        let session_write = {
            let sessions = self.sessions.clone();
            let session = session.clone();
            scope.spawn_detached(SAVE_SESSION_TASK, async move {
                if sessions.record_completed(&session).await {
                    Ok(())
                } else {
                    Err("session was not saved")
                }
            })
        };

        let progression = match self.load_user(session.user_id()).await {
            Some(user) => match apply_reward(&user, session.total_score()) {
                Ok(progression) => Some(progression),
                Err(e) => {
                    error!(user_id = %user.id(), error = %e, "could not apply reward");
                    None
                }
            },
            None => {
                warn!(user_id = %session.user_id(), "no user to reward");
                None
            }
        };

        let profile_write = progression.as_ref().map(|p| {
            if p.leveled_up() {
                info!(user_id = %p.user.id(), level = p.new_level(), "level up");
            }
            self.users.set(SyncedUser::pending(p.user.clone()));
            let profiles = self.profiles.clone();
            let users = self.users.clone();
            let updated = p.user.clone();
            scope.spawn_detached(SAVE_PROFILE_TASK, async move {
                let landed = profiles.save(&updated).await;
                let status = users.resolve(&updated, landed).unwrap_or(if landed {
                    SyncStatus::Confirmed
                } else {
                    SyncStatus::FailedKeptLocally
                });
                Ok::<_, std::convert::Infallible>(status)
            })
        });

        self.dispatch(QuizAction::Finished);
        info!(
            session_id = %session.id(),
            total_score = session.total_score(),
            max_score = session.max_score(),
            "quiz finished"
        );

        Some(FinishReport {
            session,
            progression,
            session_write,
            profile_write,
        })
    }

    async fn load_user(&self, id: &UserId) -> Option<User> {
        let local = self.users.user().filter(|u| u.id() == id);
        match self.profiles.fetch(id).await {
            Ok(Some(remote)) => Some(remote),
            Ok(None) => local,
            Err(e) => {
                warn!(user_id = %id, error = %e, "user read failed, using local state");
                local
            }
        }
    }

    fn dispatch(&self, action: QuizAction) -> QuizState {
        let mut state = self.lock();
        let next = reduce(std::mem::take(&mut *state), action);
        *state = next.clone();
        next
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QuizState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
