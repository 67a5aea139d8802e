//! Question corpus loading, filtering, and random sampling.

use std::collections::HashMap;
use std::path::Path;

use quiz_core::model::{Category, Difficulty, Question, QuestionId, QuestionProps};
use rand::Rng;
use serde::Deserialize;
use tracing::debug;

use crate::error::CatalogError;

const BUILTIN_CORPUS: &str = include_str!("../data/questions.json");

#[derive(Debug, Deserialize)]
struct CorpusDocument {
    #[serde(default)]
    categories: Vec<Category>,
    questions: Vec<QuestionProps>,
}

/// Optional predicates applied in order: category, difficulty, any-tag, then limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionFilter {
    pub category: Option<Category>,
    pub difficulty: Option<Difficulty>,
    pub tags: Vec<String>,
    pub limit: Option<usize>,
}

impl QuestionFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    #[must_use]
    pub fn difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn accepts(&self, question: &Question) -> bool {
        self.category
            .as_ref()
            .is_none_or(|c| question.category() == c)
            && self.difficulty.is_none_or(|d| question.difficulty() == d)
            && (self.tags.is_empty() || question.has_any_tag(&self.tags))
    }
}

/// Immutable, validated question corpus.
#[derive(Debug, Clone)]
pub struct QuestionCatalog {
    categories: Vec<Category>,
    questions: Vec<Question>,
    by_id: HashMap<QuestionId, usize>,
}

impl QuestionCatalog {
    /// Parse a `{categories, questions}` corpus document.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON, on the first question that violates an entity
    /// invariant, and on duplicate question ids.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let doc: CorpusDocument = serde_json::from_str(raw)?;
        Self::from_props(doc.categories, doc.questions)
    }

    /// Validate `questions` and build a catalog. An empty `categories` list is
    /// derived from the questions in first-seen order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidQuestion` or `CatalogError::DuplicateId`.
    pub fn from_props(
        categories: Vec<Category>,
        questions: Vec<QuestionProps>,
    ) -> Result<Self, CatalogError> {
        let mut built = Vec::with_capacity(questions.len());
        let mut by_id = HashMap::with_capacity(questions.len());

        for (index, props) in questions.into_iter().enumerate() {
            let id = props.id.clone();
            let question = Question::create(props)
                .map_err(|source| CatalogError::InvalidQuestion { index, id, source })?;
            if by_id.insert(question.id().clone(), index).is_some() {
                return Err(CatalogError::DuplicateId(question.id().to_string()));
            }
            built.push(question);
        }

        let categories = if categories.is_empty() {
            let mut seen: Vec<Category> = Vec::new();
            for q in &built {
                if !seen.contains(q.category()) {
                    seen.push(q.category().clone());
                }
            }
            seen
        } else {
            categories
        };

        debug!(questions = built.len(), "question catalog loaded");
        Ok(Self {
            categories,
            questions: built,
            by_id,
        })
    }

    /// The corpus compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the bundled corpus fails validation.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CORPUS)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Io` if the file cannot be read, or any `from_json` error.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn all(&self, filter: &QuestionFilter) -> Vec<Question> {
        let matching = self.questions.iter().filter(|q| filter.accepts(q));
        match filter.limit {
            Some(limit) => matching.take(limit).cloned().collect(),
            None => matching.cloned().collect(),
        }
    }

    #[must_use]
    pub fn get(&self, id: &QuestionId) -> Option<&Question> {
        self.by_id.get(id).map(|&index| &self.questions[index])
    }

    /// Category of the question with `id`, if the catalog knows it.
    #[must_use]
    pub fn category_of(&self, id: &QuestionId) -> Option<Category> {
        self.get(id).map(|q| q.category().clone())
    }

    #[must_use]
    pub fn by_category(&self, category: &Category, limit: Option<usize>) -> Vec<Question> {
        let filter = QuestionFilter {
            category: Some(category.clone()),
            limit,
            ..QuestionFilter::default()
        };
        self.all(&filter)
    }

    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Up to `count` distinct questions drawn uniformly from the filtered pool.
    #[must_use]
    pub fn sample(&self, count: usize, filter: &QuestionFilter) -> Vec<Question> {
        self.sample_with(&mut rand::rng(), count, filter)
    }

    /// `sample` with a caller-supplied random source.
    #[must_use]
    pub fn sample_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
        filter: &QuestionFilter,
    ) -> Vec<Question> {
        let mut pool = self.all(filter);
        fisher_yates(&mut pool, rng);
        pool.truncate(count.min(pool.len()));
        pool
    }
}

/// In-place Fisher–Yates shuffle: walk from the last index down to 1, swapping
/// each slot with a uniformly chosen slot in `0..=i`.
pub fn fisher_yates<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}
