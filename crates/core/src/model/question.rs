use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question id cannot be empty")]
    EmptyId,

    #[error("question text cannot be empty")]
    EmptyText,

    #[error("question must have at least 2 options, got {count}")]
    TooFewOptions { count: usize },

    #[error("option {index} cannot be empty")]
    EmptyOption { index: usize },

    #[error("question weight must be between 1 and 10, got {weight}")]
    InvalidWeight { weight: u8 },

    #[error("correct answer index {index} is out of range for {options} options")]
    CorrectAnswerOutOfRange { index: usize, options: usize },

    #[error("correct answer set cannot be empty")]
    EmptyCorrectAnswer,
}

//
// ─── CLASSIFICATION ────────────────────────────────────────────────────────────
//

/// Topic tag a question belongs to.
///
/// The set is open: tags this build does not know about are preserved verbatim
/// in `Other` so a newer corpus or remote document never fails to load on them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    React,
    Html,
    Css,
    Browser,
    NextJs,
    ReactNative,
    Web3,
    Mobile,
    JavaScript,
    TypeScript,
    SystemDesign,
    Architecture,
    Networking,
    Algorithms,
    Performance,
    Security,
    Testing,
    Tooling,
    SoftSkills,
    Other(String),
}

impl Category {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Category::React => "react",
            Category::Html => "html",
            Category::Css => "css",
            Category::Browser => "browser",
            Category::NextJs => "nextjs",
            Category::ReactNative => "react-native",
            Category::Web3 => "web3",
            Category::Mobile => "mobile",
            Category::JavaScript => "javascript",
            Category::TypeScript => "typescript",
            Category::SystemDesign => "system-design",
            Category::Architecture => "architecture",
            Category::Networking => "networking",
            Category::Algorithms => "algorithms",
            Category::Performance => "performance",
            Category::Security => "security",
            Category::Testing => "testing",
            Category::Tooling => "tooling",
            Category::SoftSkills => "soft-skills",
            Category::Other(raw) => raw,
        }
    }

    /// Human-readable name for headings and challenge text.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Category::React => "React",
            Category::Html => "HTML",
            Category::Css => "CSS",
            Category::Browser => "Browser",
            Category::NextJs => "Next.js",
            Category::ReactNative => "React Native",
            Category::Web3 => "Web3",
            Category::Mobile => "Mobile",
            Category::JavaScript => "JavaScript",
            Category::TypeScript => "TypeScript",
            Category::SystemDesign => "System Design",
            Category::Architecture => "Architecture",
            Category::Networking => "Networking",
            Category::Algorithms => "Algorithms",
            Category::Performance => "Performance",
            Category::Security => "Security",
            Category::Testing => "Testing",
            Category::Tooling => "Tooling",
            Category::SoftSkills => "Soft Skills",
            Category::Other(raw) => raw,
        }
    }

    /// Parses a wire tag. Never fails; unknown tags become `Other`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "react" => Category::React,
            "html" => Category::Html,
            "css" => Category::Css,
            "browser" => Category::Browser,
            "nextjs" => Category::NextJs,
            "react-native" => Category::ReactNative,
            "web3" => Category::Web3,
            "mobile" => Category::Mobile,
            "javascript" => Category::JavaScript,
            "typescript" => Category::TypeScript,
            "system-design" => Category::SystemDesign,
            "architecture" => Category::Architecture,
            "networking" => Category::Networking,
            "algorithms" => Category::Algorithms,
            "performance" => Category::Performance,
            "security" => Category::Security,
            "testing" => Category::Testing,
            "tooling" => Category::Tooling,
            "soft-skills" => Category::SoftSkills,
            other => Category::Other(other.to_owned()),
        }
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Category::parse(&value)
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Junior,
    Middle,
    Senior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    MultipleChoice,
    CodeReview,
    TrueFalse,
}

//
// ─── ANSWER CHOICE ─────────────────────────────────────────────────────────────
//

/// A selected option index, or a set of indices for multi-select questions.
///
/// On the wire this is a bare number or an array of numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerChoice {
    Single(usize),
    Multiple(Vec<usize>),
}

impl AnswerChoice {
    /// All indices referenced by this choice.
    #[must_use]
    pub fn indices(&self) -> Vec<usize> {
        match self {
            AnswerChoice::Single(idx) => vec![*idx],
            AnswerChoice::Multiple(set) => set.clone(),
        }
    }

    /// Compares two choices; index sets compare irrespective of order.
    #[must_use]
    pub fn matches(&self, other: &AnswerChoice) -> bool {
        match (self, other) {
            (AnswerChoice::Single(a), AnswerChoice::Single(b)) => a == b,
            (AnswerChoice::Multiple(a), AnswerChoice::Multiple(b)) => {
                if a.len() != b.len() {
                    return false;
                }
                let mut a = a.clone();
                let mut b = b.clone();
                a.sort_unstable();
                b.sort_unstable();
                a == b
            }
            _ => false,
        }
    }
}

impl From<usize> for AnswerChoice {
    fn from(value: usize) -> Self {
        AnswerChoice::Single(value)
    }
}

impl From<Vec<usize>> for AnswerChoice {
    fn from(value: Vec<usize>) -> Self {
        AnswerChoice::Multiple(value)
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Serialized form of a `Question`, as found in the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionProps {
    pub id: String,
    pub category: Category,
    pub difficulty: Difficulty,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub options: Vec<String>,
    pub correct_answer: AnswerChoice,
    pub explanation: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub weight: u8,
}

pub const MIN_WEIGHT: u8 = 1;
pub const MAX_WEIGHT: u8 = 10;

/// Immutable quiz question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    category: Category,
    difficulty: Difficulty,
    kind: QuestionType,
    question: String,
    code: Option<String>,
    options: Vec<String>,
    correct_answer: AnswerChoice,
    explanation: String,
    tags: Vec<String>,
    weight: u8,
}

impl Question {
    /// Validate and build a question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the id or text is blank, fewer than two options are
    /// given, the weight is outside 1..=10, or a correct-answer index is out of range.
    pub fn create(props: QuestionProps) -> Result<Self, QuestionError> {
        let id = QuestionId::new(props.id).map_err(|_| QuestionError::EmptyId)?;

        if props.question.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if props.options.len() < 2 {
            return Err(QuestionError::TooFewOptions {
                count: props.options.len(),
            });
        }
        if let Some(index) = props.options.iter().position(|o| o.trim().is_empty()) {
            return Err(QuestionError::EmptyOption { index });
        }
        if !(MIN_WEIGHT..=MAX_WEIGHT).contains(&props.weight) {
            return Err(QuestionError::InvalidWeight {
                weight: props.weight,
            });
        }

        let indices = props.correct_answer.indices();
        if indices.is_empty() {
            return Err(QuestionError::EmptyCorrectAnswer);
        }
        if let Some(&index) = indices.iter().find(|&&i| i >= props.options.len()) {
            return Err(QuestionError::CorrectAnswerOutOfRange {
                index,
                options: props.options.len(),
            });
        }

        Ok(Self {
            id,
            category: props.category,
            difficulty: props.difficulty,
            kind: props.kind,
            question: props.question,
            code: props.code,
            options: props.options,
            correct_answer: props.correct_answer,
            explanation: props.explanation,
            tags: props.tags,
            weight: props.weight,
        })
    }

    #[must_use]
    pub fn to_props(&self) -> QuestionProps {
        QuestionProps {
            id: self.id.to_string(),
            category: self.category.clone(),
            difficulty: self.difficulty,
            kind: self.kind,
            question: self.question.clone(),
            code: self.code.clone(),
            options: self.options.clone(),
            correct_answer: self.correct_answer.clone(),
            explanation: self.explanation.clone(),
            tags: self.tags.clone(),
            weight: self.weight,
        }
    }

    /// Returns true when `given` selects exactly the correct option(s).
    #[must_use]
    pub fn is_correct_answer(&self, given: &AnswerChoice) -> bool {
        self.correct_answer.matches(given)
    }

    /// Returns true if the question carries any of the given tags.
    #[must_use]
    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.tags.contains(t))
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn category(&self) -> &Category {
        &self.category
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn kind(&self) -> QuestionType {
        self.kind
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> &AnswerChoice {
        &self.correct_answer
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Contribution of this question to a session's max score.
    #[must_use]
    pub fn weight(&self) -> u8 {
        self.weight
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn props(id: &str, weight: u8, correct: AnswerChoice) -> QuestionProps {
        QuestionProps {
            id: id.to_owned(),
            category: Category::React,
            difficulty: Difficulty::Junior,
            kind: QuestionType::MultipleChoice,
            question: "What does useState return?".to_owned(),
            code: None,
            options: vec![
                "a value".to_owned(),
                "a tuple of value and setter".to_owned(),
                "a promise".to_owned(),
            ],
            correct_answer: correct,
            explanation: "It returns the state and a setter.".to_owned(),
            tags: vec!["hooks".to_owned()],
            weight,
        }
    }

    #[test]
    fn rejects_fewer_than_two_options() {
        let mut p = props("q1", 3, AnswerChoice::Single(0));
        p.options.truncate(1);
        let err = Question::create(p).unwrap_err();
        assert_eq!(err, QuestionError::TooFewOptions { count: 1 });
    }

    #[test]
    fn rejects_weight_outside_bounds() {
        for weight in [0, 11] {
            let err = Question::create(props("q1", weight, AnswerChoice::Single(0))).unwrap_err();
            assert_eq!(err, QuestionError::InvalidWeight { weight });
        }
        assert!(Question::create(props("q1", 1, AnswerChoice::Single(0))).is_ok());
        assert!(Question::create(props("q1", 10, AnswerChoice::Single(0))).is_ok());
    }

    #[test]
    fn rejects_out_of_range_correct_answer() {
        let err = Question::create(props("q1", 3, AnswerChoice::Single(3))).unwrap_err();
        assert!(matches!(err, QuestionError::CorrectAnswerOutOfRange { index: 3, .. }));

        let err =
            Question::create(props("q1", 3, AnswerChoice::Multiple(vec![0, 7]))).unwrap_err();
        assert!(matches!(err, QuestionError::CorrectAnswerOutOfRange { index: 7, .. }));
    }

    #[test]
    fn rejects_blank_id() {
        let err = Question::create(props(" ", 3, AnswerChoice::Single(0))).unwrap_err();
        assert_eq!(err, QuestionError::EmptyId);
    }

    #[test]
    fn single_answer_compares_by_equality() {
        let q = Question::create(props("q1", 3, AnswerChoice::Single(1))).unwrap();
        assert!(q.is_correct_answer(&AnswerChoice::Single(1)));
        assert!(!q.is_correct_answer(&AnswerChoice::Single(0)));
        assert!(!q.is_correct_answer(&AnswerChoice::Multiple(vec![1])));
    }

    #[test]
    fn multi_answer_ignores_order() {
        let q = Question::create(props("q1", 3, AnswerChoice::Multiple(vec![2, 0]))).unwrap();
        assert!(q.is_correct_answer(&AnswerChoice::Multiple(vec![0, 2])));
        assert!(!q.is_correct_answer(&AnswerChoice::Multiple(vec![0])));
        assert!(!q.is_correct_answer(&AnswerChoice::Multiple(vec![0, 1])));
        assert!(!q.is_correct_answer(&AnswerChoice::Single(0)));
    }

    #[test]
    fn props_round_trip_through_json() {
        let q = Question::create(props("q1", 4, AnswerChoice::Multiple(vec![0, 1]))).unwrap();
        let json = serde_json::to_string(&q.to_props()).unwrap();
        assert!(json.contains("\"correctAnswer\":[0,1]"));
        assert!(json.contains("\"type\":\"multiple-choice\""));

        let back: QuestionProps = serde_json::from_str(&json).unwrap();
        assert_eq!(Question::create(back).unwrap(), q);
    }

    #[test]
    fn unknown_category_is_preserved() {
        let cat = Category::parse("rust");
        assert_eq!(cat, Category::Other("rust".to_owned()));
        assert_eq!(cat.to_string(), "rust");
        assert_eq!(Category::parse("react-native"), Category::ReactNative);
    }
}
