use std::sync::Arc;

use quiz_core::model::{Category, Question};
use quiz_core::time::fixed_clock;
use services::quiz::{SAVE_PROFILE_TASK, SAVE_SESSION_TASK};
use services::{
    AppServices, LocalIdentity, QuestionCatalog, QuizPhase, RetryPolicy, SyncConfig, SyncStatus,
    TaskOutcome,
};

fn services(question_count: usize) -> AppServices {
    let config = SyncConfig {
        retry: RetryPolicy::none(),
        question_count,
        ..SyncConfig::default()
    };
    AppServices::in_memory(
        fixed_clock(),
        config,
        QuestionCatalog::builtin().unwrap(),
        Arc::new(LocalIdentity::new()),
    )
}

fn answer_everything_correctly(app: &AppServices) -> Vec<Question> {
    let quiz = app.quiz();
    let mut asked = Vec::new();
    while let Some(q) = quiz.current_question() {
        let state = quiz.answer(q.id(), q.correct_answer().clone(), 4.0);
        assert_eq!(state.error, None);
        asked.push(q);
    }
    asked
}

#[tokio::test]
async fn sign_up_play_and_see_dashboard() {
    let app = services(3);
    let signed_up = app
        .auth()
        .sign_up("ada@example.com", "hunter2", "Ada")
        .await
        .unwrap();
    assert_eq!(signed_up.enrichment.await.unwrap(), SyncStatus::Confirmed);
    let user = signed_up.user;

    let state = app.quiz().start(user.id(), Category::React).unwrap();
    assert_eq!(state.questions.len(), 3);
    let asked = answer_everything_correctly(&app);
    let max: u32 = asked.iter().map(|q| u32::from(q.weight())).sum();

    let scope = app.view_scope();
    let report = app.quiz().finish(&scope).await.unwrap();
    assert_eq!(report.session.total_score(), max);
    assert_eq!(report.session.max_score(), max);
    assert_eq!(report.session.accuracy(), 100);

    let progression = report.progression.clone().unwrap();
    assert_eq!(progression.reward, u64::from(max) * 10);
    assert_eq!(app.users().current().unwrap().user.xp(), progression.new_xp());

    assert_eq!(report.session_write.await.unwrap(), Some(()));
    assert_eq!(
        report.profile_write.unwrap().await.unwrap(),
        Some(SyncStatus::Confirmed)
    );
    assert_eq!(app.quiz().state().phase, QuizPhase::Completed);
    assert_eq!(
        app.task_log().outcomes_for(SAVE_SESSION_TASK),
        vec![TaskOutcome::Completed]
    );
    assert_eq!(
        app.task_log().outcomes_for(SAVE_PROFILE_TASK),
        vec![TaskOutcome::Completed]
    );

    let stats = app
        .stats()
        .load(user.id(), &app.view_scope())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.sessions, 1);
    assert_eq!(stats.accuracy, 100);
    assert_eq!(stats.correct, 3);
    assert_eq!(stats.wrong, 0);
    assert_eq!(stats.weekly_challenge.completed, 1);
    assert_eq!(stats.activity.last().unwrap().score, u64::from(max));
    let skill_total: u64 = stats.skill_matrix.iter().map(|s| s.total).sum();
    assert_eq!(skill_total, 3);
}

#[tokio::test]
async fn duplicate_session_write_is_swallowed() {
    let app = services(1);
    let user = app
        .auth()
        .sign_up("bob@example.com", "pw", "Bob")
        .await
        .unwrap()
        .user;

    // Both quizzes start at the same fixed instant, so they share a session id.
    for _ in 0..2 {
        app.quiz().start(user.id(), Category::Css).unwrap();
        answer_everything_correctly(&app);
        let report = app.quiz().finish(&app.view_scope()).await.unwrap();
        let _ = report.session_write.await.unwrap();
        if let Some(write) = report.profile_write {
            write.await.unwrap();
        }
        assert_eq!(app.quiz().state().phase, QuizPhase::Completed);
    }

    let outcomes = app.task_log().outcomes_for(SAVE_SESSION_TASK);
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0], TaskOutcome::Completed);
    assert!(matches!(outcomes[1], TaskOutcome::Failed(_)));
}

#[tokio::test]
async fn unmounted_dashboard_discards_stats() {
    let app = services(2);
    let user = app
        .auth()
        .sign_up("cy@example.com", "pw", "Cy")
        .await
        .unwrap()
        .user;

    let scope = app.view_scope();
    scope.unmount();
    let stats = app.stats().load(user.id(), &scope).await.unwrap();
    assert!(stats.is_none());
}

#[tokio::test]
async fn answering_without_a_quiz_is_a_state_error() {
    let app = services(2);
    let catalog = app.catalog();
    let any = catalog.by_category(&Category::Html, Some(1)).remove(0);

    let state = app.quiz().answer(any.id(), any.correct_answer().clone(), 1.0);
    assert!(state.error.is_some());
    assert_eq!(state.phase, QuizPhase::Idle);
    assert_eq!(app.quiz().clear_error().error, None);
}

#[tokio::test]
async fn dashboard_refresh_runs_in_the_background() {
    let app = services(2);
    let user = app
        .auth()
        .sign_up("di@example.com", "pw", "Di")
        .await
        .unwrap()
        .user;
    app.quiz().start(user.id(), Category::Css).unwrap();
    answer_everything_correctly(&app);
    let report = app.quiz().finish(&app.view_scope()).await.unwrap();
    report.session_write.await.unwrap();

    let scope = app.view_scope();
    let stats = app.stats().refresh(user.id().clone(), &scope).await.unwrap().unwrap();
    assert_eq!(stats.sessions, 1);

    scope.unmount();
    let gone = app.stats().refresh(user.id().clone(), &scope).await.unwrap();
    assert!(gone.is_none());
}
