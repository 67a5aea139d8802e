//! Quiz-taking flow and the sync protocol behind it.

mod flow;
mod state;
mod sync;
mod user_store;

pub use flow::{FinishReport, QuizFlowService, SAVE_PROFILE_TASK, SAVE_SESSION_TASK};
pub use state::{QuizAction, QuizPhase, QuizState, QuizStateError, reduce};
pub use sync::{ProfileSync, SessionSync};
pub use user_store::{SyncStatus, SyncedUser, UserStore};
