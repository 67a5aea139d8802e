use quiz_core::model::{
    AnswerChoice, Category, Difficulty, Question, QuestionProps, QuestionType, User, UserProps,
};
use quiz_core::time::fixed_now;

/// True/false question whose correct answer is option 0.
pub(crate) fn question(id: &str, category: Category, weight: u8) -> Question {
    Question::create(QuestionProps {
        id: id.to_owned(),
        category,
        difficulty: Difficulty::Middle,
        kind: QuestionType::TrueFalse,
        question: format!("Is {id} true?"),
        code: None,
        options: vec!["True".to_owned(), "False".to_owned()],
        correct_answer: AnswerChoice::Single(0),
        explanation: "It is.".to_owned(),
        tags: Vec::new(),
        weight,
    })
    .unwrap()
}

pub(crate) fn user(id: &str, xp: u64, level: u32) -> User {
    User::create(UserProps {
        id: id.to_owned(),
        email: format!("{id}@example.com"),
        display_name: format!("Player {id}"),
        photo_url: None,
        created_at: fixed_now(),
        level,
        xp,
    })
    .unwrap()
}
