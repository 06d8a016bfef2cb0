use serde::{Deserialize, Serialize};

use crate::entity::EntityRef;
use crate::template::collapse_whitespace;

/// Question categories, in the order they are generated for each entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Factual,
    ReverseLookup,
    Troubleshooting,
    Integration,
    Comparison,
}

impl Category {
    pub const ALL: [Self; 5] = [
        Self::Factual,
        Self::ReverseLookup,
        Self::Troubleshooting,
        Self::Integration,
        Self::Comparison,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Factual => "factual",
            Self::ReverseLookup => "reverse_lookup",
            Self::Troubleshooting => "troubleshooting",
            Self::Integration => "integration",
            Self::Comparison => "comparison",
        }
    }

    /// Categories asked about a single entity; the rest need a pair.
    #[must_use]
    pub fn is_single_entity(&self) -> bool {
        matches!(
            self,
            Self::Factual | Self::ReverseLookup | Self::Troubleshooting
        )
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        match self {
            Self::Factual | Self::ReverseLookup => Difficulty::Basic,
            Self::Comparison => Difficulty::Intermediate,
            Self::Troubleshooting | Self::Integration => Difficulty::Advanced,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "factual" => Ok(Self::Factual),
            "reverse_lookup" => Ok(Self::ReverseLookup),
            "troubleshooting" => Ok(Self::Troubleshooting),
            "integration" => Ok(Self::Integration),
            "comparison" => Ok(Self::Comparison),
            _ => Err(crate::Error::InvalidCategory(s.to_string())),
        }
    }
}

/// How much understanding a question needs beyond reading one fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Basic,
    Intermediate,
    Advanced,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
    pub category: Category,
    pub difficulty: Difficulty,
    pub source_entities: Vec<EntityRef>,
    pub dedup_key: String,
}

impl QaPair {
    #[must_use]
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        category: Category,
        source_entities: Vec<EntityRef>,
    ) -> Self {
        let question = question.into();
        let dedup_key = dedup_key(&question);
        Self {
            question,
            answer: answer.into(),
            category,
            difficulty: category.difficulty(),
            source_entities,
            dedup_key,
        }
    }
}

/// Lower-cased, whitespace-collapsed question text.
#[must_use]
pub fn dedup_key(question: &str) -> String {
    collapse_whitespace(question).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_order() {
        let mut shuffled = vec![Category::Comparison, Category::Factual, Category::Integration];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![Category::Factual, Category::Integration, Category::Comparison]
        );
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
        }
        assert!("trivia".parse::<Category>().is_err());
    }

    #[test]
    fn test_difficulty_follows_category() {
        let pair = QaPair::new("Why is Pin 3 low?", "x", Category::Troubleshooting, vec![]);
        assert_eq!(pair.difficulty, Difficulty::Advanced);
        assert_eq!(Category::ReverseLookup.difficulty(), Difficulty::Basic);
        assert_eq!(Category::Comparison.difficulty(), Difficulty::Intermediate);

        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json["difficulty"], "advanced");
    }

    #[test]
    fn test_dedup_key_normalizes_case_and_spacing() {
        let a = QaPair::new("What is  the function of Pin 7? ", "x", Category::Factual, vec![]);
        let b = QaPair::new("what is the function\nof pin 7?", "y", Category::Factual, vec![]);
        assert_eq!(a.dedup_key, b.dedup_key);
        assert_eq!(a.dedup_key, "what is the function of pin 7?");
    }
}
