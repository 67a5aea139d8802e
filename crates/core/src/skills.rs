use std::fmt;

use crate::model::Category;

/// The five buckets question categories roll up into for the skill matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkillGroup {
    FrontendFoundations,
    ProgrammingLanguages,
    SystemArchitecture,
    QualityPerformance,
    DeveloperTools,
}

impl SkillGroup {
    /// All groups in display order.
    pub const ALL: [SkillGroup; 5] = [
        SkillGroup::FrontendFoundations,
        SkillGroup::ProgrammingLanguages,
        SkillGroup::SystemArchitecture,
        SkillGroup::QualityPerformance,
        SkillGroup::DeveloperTools,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            SkillGroup::FrontendFoundations => "Frontend Foundations",
            SkillGroup::ProgrammingLanguages => "Programming Languages",
            SkillGroup::SystemArchitecture => "System & Architecture",
            SkillGroup::QualityPerformance => "Quality & Performance",
            SkillGroup::DeveloperTools => "Developer Tools",
        }
    }

    /// Static category lookup; unknown categories fall into the first group.
    #[must_use]
    pub fn for_category(category: &Category) -> Self {
        match category {
            Category::React
            | Category::Html
            | Category::Css
            | Category::Browser
            | Category::NextJs
            | Category::ReactNative
            | Category::Web3
            | Category::Mobile => SkillGroup::FrontendFoundations,
            Category::JavaScript | Category::TypeScript => SkillGroup::ProgrammingLanguages,
            Category::SystemDesign
            | Category::Architecture
            | Category::Networking
            | Category::Algorithms => SkillGroup::SystemArchitecture,
            Category::Performance | Category::Security | Category::Testing => {
                SkillGroup::QualityPerformance
            }
            Category::Tooling | Category::SoftSkills => SkillGroup::DeveloperTools,
            Category::Other(_) => SkillGroup::FrontendFoundations,
        }
    }
}

impl fmt::Display for SkillGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_map_to_groups() {
        assert_eq!(
            SkillGroup::for_category(&Category::NextJs),
            SkillGroup::FrontendFoundations
        );
        assert_eq!(
            SkillGroup::for_category(&Category::TypeScript),
            SkillGroup::ProgrammingLanguages
        );
        assert_eq!(
            SkillGroup::for_category(&Category::Algorithms),
            SkillGroup::SystemArchitecture
        );
        assert_eq!(
            SkillGroup::for_category(&Category::Security),
            SkillGroup::QualityPerformance
        );
        assert_eq!(
            SkillGroup::for_category(&Category::SoftSkills),
            SkillGroup::DeveloperTools
        );
    }

    #[test]
    fn unknown_category_defaults_to_first_group() {
        let unknown = Category::parse("cobol");
        assert_eq!(SkillGroup::for_category(&unknown), SkillGroup::ALL[0]);
    }
}
