use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// Kinds of technical fact the extractor recognizes.
///
/// Declaration order is the registry order: extraction and Q&A generation
/// both walk the types in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Pin,
    Register,
    Voltage,
    Timing,
    Frequency,
    Current,
    BitField,
    ErrorCode,
    Procedure,
    Table,
}

impl EntityType {
    pub const ALL: [Self; 10] = [
        Self::Pin,
        Self::Register,
        Self::Voltage,
        Self::Timing,
        Self::Frequency,
        Self::Current,
        Self::BitField,
        Self::ErrorCode,
        Self::Procedure,
        Self::Table,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pin => "pin",
            Self::Register => "register",
            Self::Voltage => "voltage",
            Self::Timing => "timing",
            Self::Frequency => "frequency",
            Self::Current => "current",
            Self::BitField => "bit_field",
            Self::ErrorCode => "error_code",
            Self::Procedure => "procedure",
            Self::Table => "table",
        }
    }

    /// Human label used in generated text ("bit field", "error code").
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::BitField => "bit field",
            Self::ErrorCode => "error code",
            other => other.as_str(),
        }
    }

    #[must_use]
    pub fn registry_index(&self) -> usize {
        *self as usize
    }

    /// Types whose facts can be checked on a bench (meter, scope or register read).
    #[must_use]
    pub fn is_physically_checkable(&self) -> bool {
        matches!(self, Self::Pin | Self::Voltage | Self::Register)
    }

    /// Attribute keys an entity of this type may carry.
    #[must_use]
    pub fn attribute_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Pin => &["description"],
            Self::Register => &["reset", "width", "description"],
            Self::Voltage | Self::Current => &["unit", "nominal", "tolerance"],
            Self::Timing | Self::Frequency => &["unit", "nominal"],
            Self::BitField => &["bit_range", "register", "description", "active_state"],
            Self::ErrorCode => &["code"],
            Self::Procedure => &["step"],
            Self::Table => &[
                "headers",
                "kind",
                "header_detected",
                "row_count",
                "column_count",
            ],
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pin" => Ok(Self::Pin),
            "register" => Ok(Self::Register),
            "voltage" => Ok(Self::Voltage),
            "timing" => Ok(Self::Timing),
            "frequency" => Ok(Self::Frequency),
            "current" => Ok(Self::Current),
            "bit_field" | "bitfield" => Ok(Self::BitField),
            "error_code" => Ok(Self::ErrorCode),
            "procedure" => Ok(Self::Procedure),
            "table" => Ok(Self::Table),
            _ => Err(crate::Error::InvalidEntityType(s.to_string())),
        }
    }
}

/// Byte range of an entity inside its chunk's cleaned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub chunk_id: usize,
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    #[must_use]
    pub fn new(chunk_id: usize, start: usize, end: usize) -> Self {
        Self {
            chunk_id,
            start,
            end,
        }
    }

    #[must_use]
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && start < self.end
    }

    #[must_use]
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.start..self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_type: EntityType,
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    pub source_span: SourceSpan,
    /// Id of the registry rule that produced the entity.
    pub rule: String,
}

impl Entity {
    #[must_use]
    pub fn new(
        entity_type: EntityType,
        name: impl Into<String>,
        value: impl Into<String>,
        source_span: SourceSpan,
    ) -> Self {
        Self {
            entity_type,
            name: name.into(),
            value: value.into(),
            attributes: BTreeMap::new(),
            source_span,
            rule: String::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = rule.into();
        self
    }

    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn reference(&self) -> EntityRef {
        EntityRef {
            entity_type: self.entity_type,
            name: self.name.clone(),
            source_span: self.source_span,
        }
    }

    /// Numeric magnitude and unit of a measurement entity.
    #[must_use]
    pub fn measurement(&self) -> Option<(f64, &str)> {
        let nominal = self.attribute("nominal")?.parse::<f64>().ok()?;
        Some((nominal, self.attribute("unit")?))
    }

    /// Typed view of a `Table` entity.
    #[must_use]
    pub fn table(&self) -> Option<TableData> {
        if self.entity_type != EntityType::Table {
            return None;
        }
        TableData::from_entity(self)
    }
}

/// Non-owning link from a generated pair back to the entity it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub name: String,
    pub source_span: SourceSpan,
}

/// What a reconstructed table lists, judged from its headers or cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TableKind {
    #[serde(rename = "pin_table")]
    Pin,
    #[serde(rename = "register_table")]
    Register,
    #[serde(rename = "bit_field_table")]
    BitField,
    #[serde(rename = "spec_table")]
    Spec,
    #[serde(rename = "error_table")]
    Error,
    #[serde(rename = "generic_table")]
    Generic,
}

impl TableKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pin => "pin_table",
            Self::Register => "register_table",
            Self::BitField => "bit_field_table",
            Self::Spec => "spec_table",
            Self::Error => "error_table",
            Self::Generic => "generic_table",
        }
    }

    /// Name used in generated text.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pin => "pin table",
            Self::Register => "register table",
            Self::BitField => "bit field table",
            Self::Spec => "specification table",
            Self::Error => "error code table",
            Self::Generic => "table",
        }
    }

    /// How a row is referred to in generated text, given its first cell.
    #[must_use]
    pub fn row_label(&self, key: &str) -> String {
        let bare = !key.to_ascii_lowercase().starts_with("pin");
        match self {
            Self::Pin if bare => format!("Pin {key}"),
            Self::Error if key.chars().all(|c| c.is_ascii_digit()) => format!("error code {key}"),
            _ => key.to_string(),
        }
    }
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TableKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pin_table" => Ok(Self::Pin),
            "register_table" => Ok(Self::Register),
            "bit_field_table" => Ok(Self::BitField),
            "spec_table" => Ok(Self::Spec),
            "error_table" => Ok(Self::Error),
            "generic_table" => Ok(Self::Generic),
            _ => Err(crate::Error::InvalidTableKind(s.to_string())),
        }
    }
}

/// Reconstructed table: header row plus equally wide data rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub header_detected: bool,
    pub kind: TableKind,
}

impl TableData {
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    #[must_use]
    pub fn from_entity(entity: &Entity) -> Option<Self> {
        let headers: Vec<String> = serde_json::from_str(entity.attribute("headers")?).ok()?;
        let rows: Vec<Vec<String>> = serde_json::from_str(&entity.value).ok()?;
        let header_detected = entity.attribute("header_detected") == Some("true");
        let kind = entity
            .attribute("kind")
            .and_then(|k| k.parse().ok())
            .unwrap_or(TableKind::Generic);
        Some(Self {
            headers,
            rows,
            header_detected,
            kind,
        })
    }

    /// Cells of `column` across all data rows.
    pub fn column(&self, column: usize) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .filter_map(move |row| row.get(column).map(String::as_str))
    }
}

/// Per-chunk entity set keeping the first entity seen for each `(type, name)`.
#[derive(Debug, Clone, Default)]
pub struct EntitySet {
    entities: Vec<Entity>,
    seen: HashSet<(EntityType, String)>,
}

impl EntitySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the entity unless its `(type, name)` is already present.
    /// Returns whether it was kept.
    pub fn insert(&mut self, entity: Entity) -> bool {
        if !self.seen.insert((entity.entity_type, entity.name.clone())) {
            return false;
        }
        self.entities.push(entity);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities ordered by appearance, ties broken by registry order.
    #[must_use]
    pub fn into_ordered(mut self) -> Vec<Entity> {
        self.entities.sort_by_key(|e| {
            (
                e.source_span.start,
                e.entity_type.registry_index(),
                e.source_span.end,
            )
        });
        self.entities
    }
}
