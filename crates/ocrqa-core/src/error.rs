use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::EntityType;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid entity type: {0}")]
    InvalidEntityType(String),

    #[error("Invalid question category: {0}")]
    InvalidCategory(String),

    #[error("Invalid relation: {0}")]
    InvalidRelation(String),

    #[error("Invalid table kind: {0}")]
    InvalidTableKind(String),

    #[error("Rule '{rule}' has an invalid pattern: {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("Rule '{rule}' references unknown capture group '{group}'")]
    UnknownCaptureGroup { rule: String, group: String },

    #[error("Invalid rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("Template for {entity_type} cannot use category {category}")]
    CategoryNotAllowed {
        entity_type: EntityType,
        category: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Non-fatal outcomes. Each one drops a single candidate and is counted in
/// the run statistics; processing continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("rule '{rule}' matched {text:?} but it is not a valid {entity_type}: {reason}")]
    PatternMismatch {
        rule: String,
        entity_type: EntityType,
        text: String,
        reason: String,
    },

    #[error("table row at line {line} has {found} cells, expected {expected}")]
    MalformedTableRow {
        line: usize,
        found: usize,
        expected: usize,
    },

    #[error("table region at line {line} kept {rows} consistent row(s), discarded")]
    MalformedTableRegion { line: usize, rows: usize },

    #[error("template {template:?} has no value for slot '{slot}' on {entity}")]
    EmptyTemplateSlot {
        template: String,
        slot: String,
        entity: String,
    },

    #[error("duplicate question {question:?}")]
    DuplicateQuestion { question: String },
}

impl Rejection {
    #[must_use]
    pub fn kind(&self) -> RejectionKind {
        match self {
            Self::PatternMismatch { .. } => RejectionKind::PatternMismatch,
            Self::MalformedTableRow { .. } => RejectionKind::MalformedTableRow,
            Self::MalformedTableRegion { .. } => RejectionKind::MalformedTableRegion,
            Self::EmptyTemplateSlot { .. } => RejectionKind::EmptyTemplateSlot,
            Self::DuplicateQuestion { .. } => RejectionKind::DuplicateQuestion,
        }
    }
}

/// Counter key for [`Rejection`]s in run statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    PatternMismatch,
    MalformedTableRow,
    MalformedTableRegion,
    EmptyTemplateSlot,
    DuplicateQuestion,
}

impl RejectionKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PatternMismatch => "pattern_mismatch",
            Self::MalformedTableRow => "malformed_table_row",
            Self::MalformedTableRegion => "malformed_table_region",
            Self::EmptyTemplateSlot => "empty_template_slot",
            Self::DuplicateQuestion => "duplicate_question",
        }
    }
}

impl std::fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
