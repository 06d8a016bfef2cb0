//! Question/answer templates as swappable data.
//!
//! [`TemplateConfig`] is the serialized form (built-in default or a JSON
//! file); [`TemplateSet`] is the validated, compiled form the generator
//! reads.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityType, TableKind};
use crate::relation::RelationKind;
use crate::template::Template;
use crate::{Error, Result};

use super::pair::Category;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTemplateDef {
    pub entity_type: EntityType,
    /// Restricts a `table` template to tables of this kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_kind: Option<TableKind>,
    pub category: Category,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairTemplateDef {
    pub relation: RelationKind,
    /// Restricts the template to pairs whose `a` side has this type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    #[serde(default)]
    pub entity: Vec<EntityTemplateDef>,
    #[serde(default)]
    pub pairs: Vec<PairTemplateDef>,
}

impl TemplateConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            entity: default_entity_templates(),
            pairs: default_pair_templates(),
        }
    }
}

/// How often a `Table` template is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableScope {
    Table,
    Row,
    Cell,
}

#[derive(Debug, Clone)]
pub struct EntityTemplate {
    pub entity_type: EntityType,
    pub table_kind: Option<TableKind>,
    pub category: Category,
    pub question: Template,
    pub answer: Template,
    pub scope: TableScope,
}

#[derive(Debug, Clone)]
pub struct PairTemplate {
    pub relation: RelationKind,
    pub entity_type: Option<EntityType>,
    pub question: Template,
    pub answer: Template,
}

#[derive(Debug, Clone)]
pub struct TemplateSet {
    entity: Vec<EntityTemplate>,
    pairs: Vec<PairTemplate>,
}

const ENTITY_SLOTS: &[&str] = &["name", "value", "type"];
const TABLE_SLOTS: &[&str] = &["columns", "kind", "first_label"];
const ROW_SLOTS: &[&str] = &[
    "row.key",
    "row.key_header",
    "row.label",
    "row.value",
    "row.values",
    "row.address",
    "row.register",
];
const CELL_SLOTS: &[&str] = &["row.column", "row.cell"];
const PAIR_SLOTS: &[&str] = &["relation", "difference", "higher", "lower"];

impl TemplateSet {
    pub fn compile(config: &TemplateConfig) -> Result<Self> {
        let entity = config
            .entity
            .iter()
            .map(compile_entity_template)
            .collect::<Result<Vec<_>>>()?;
        let pairs = config
            .pairs
            .iter()
            .map(compile_pair_template)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entity, pairs })
    }

    pub fn builtin() -> Result<Self> {
        Self::compile(&TemplateConfig::default())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::compile(&TemplateConfig::from_json(json)?)
    }

    /// Single-entity templates for one type and category, in declaration order.
    pub fn for_entity(
        &self,
        entity_type: EntityType,
        category: Category,
    ) -> impl Iterator<Item = &EntityTemplate> {
        self.entity
            .iter()
            .filter(move |t| t.entity_type == entity_type && t.category == category)
    }

    /// Table templates for one category that apply to tables of `kind`.
    pub fn for_table(
        &self,
        kind: TableKind,
        category: Category,
    ) -> impl Iterator<Item = &EntityTemplate> {
        self.for_entity(EntityType::Table, category)
            .filter(move |t| t.table_kind.map_or(true, |k| k == kind))
    }

    /// Pair templates for a relation whose `a` side has type `a_type`.
    pub fn for_relation(
        &self,
        relation: RelationKind,
        a_type: EntityType,
    ) -> impl Iterator<Item = &PairTemplate> {
        self.pairs.iter().filter(move |t| {
            t.relation == relation && t.entity_type.map_or(true, |ty| ty == a_type)
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entity.len() + self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn is_entity_slot(entity_type: EntityType, slot: &str) -> bool {
    ENTITY_SLOTS.contains(&slot)
        || entity_type.attribute_keys().contains(&slot)
        || (entity_type == EntityType::Timing && slot == "frequency")
}

fn unknown_slot(source: &str, slot: &str) -> Error {
    Error::InvalidTemplate {
        template: source.to_string(),
        reason: format!("unknown slot '{slot}'"),
    }
}

fn compile_entity_template(def: &EntityTemplateDef) -> Result<EntityTemplate> {
    let not_allowed = || Error::CategoryNotAllowed {
        entity_type: def.entity_type,
        category: def.category.to_string(),
    };
    if !def.category.is_single_entity() {
        return Err(not_allowed());
    }
    if def.category == Category::Troubleshooting && !def.entity_type.is_physically_checkable() {
        return Err(not_allowed());
    }

    let question = Template::parse(&def.question)?;
    let answer = Template::parse(&def.answer)?;
    let is_table = def.entity_type == EntityType::Table;
    if def.table_kind.is_some() && !is_table {
        return Err(Error::InvalidTemplate {
            template: def.question.clone(),
            reason: format!("table_kind set on a {} template", def.entity_type),
        });
    }

    for template in [&question, &answer] {
        for slot in template.slots() {
            let known = is_entity_slot(def.entity_type, slot)
                || (is_table
                    && (TABLE_SLOTS.contains(&slot)
                        || ROW_SLOTS.contains(&slot)
                        || CELL_SLOTS.contains(&slot)));
            if !known {
                return Err(unknown_slot(template.source(), slot));
            }
        }
    }

    let uses = |slots: &[&str]| {
        [&question, &answer]
            .iter()
            .any(|t| slots.iter().any(|s| t.uses_slot(s)))
    };
    let scope = if uses(CELL_SLOTS) {
        TableScope::Cell
    } else if uses(ROW_SLOTS) {
        TableScope::Row
    } else {
        TableScope::Table
    };

    Ok(EntityTemplate {
        entity_type: def.entity_type,
        table_kind: def.table_kind,
        category: def.category,
        question,
        answer,
        scope,
    })
}

fn compile_pair_template(def: &PairTemplateDef) -> Result<PairTemplate> {
    let question = Template::parse(&def.question)?;
    let answer = Template::parse(&def.answer)?;

    for template in [&question, &answer] {
        for slot in template.slots() {
            let known = if let Some(key) = slot.strip_prefix("a.").or_else(|| slot.strip_prefix("b.")) {
                match def.entity_type {
                    Some(ty) if slot.starts_with("a.") => is_entity_slot(ty, key),
                    _ => EntityType::ALL.iter().any(|ty| is_entity_slot(*ty, key)),
                }
            } else {
                PAIR_SLOTS.contains(&slot)
            };
            if !known {
                return Err(unknown_slot(template.source(), slot));
            }
        }
    }

    Ok(PairTemplate {
        relation: def.relation,
        entity_type: def.entity_type,
        question,
        answer,
    })
}

fn entity(entity_type: EntityType, category: Category, question: &str, answer: &str) -> EntityTemplateDef {
    EntityTemplateDef {
        entity_type,
        table_kind: None,
        category,
        question: question.to_string(),
        answer: answer.to_string(),
    }
}

fn table(kind: Option<TableKind>, category: Category, question: &str, answer: &str) -> EntityTemplateDef {
    EntityTemplateDef {
        table_kind: kind,
        ..entity(EntityType::Table, category, question, answer)
    }
}

fn pair(
    relation: RelationKind,
    entity_type: Option<EntityType>,
    question: &str,
    answer: &str,
) -> PairTemplateDef {
    PairTemplateDef {
        relation,
        entity_type,
        question: question.to_string(),
        answer: answer.to_string(),
    }
}

#[must_use]
pub fn default_entity_templates() -> Vec<EntityTemplateDef> {
    use Category::{Factual, ReverseLookup, Troubleshooting};
    use EntityType::{
        BitField, Current, ErrorCode, Frequency, Pin, Procedure, Register, Timing, Voltage,
    };

    vec![
        entity(
            Pin,
            Factual,
            "What is the function of {name}?",
            "{name} carries the {value} signal ({description}).",
        ),
        entity(
            Pin,
            Factual,
            "Which signal is assigned to {name}?",
            "{name} is assigned to {value}.",
        ),
        entity(
            Pin,
            ReverseLookup,
            "Which pin carries the {value} signal?",
            "The {value} signal is on {name}.",
        ),
        entity(
            Pin,
            Troubleshooting,
            "How can I verify that {name} is working correctly?",
            "Measure {name} and confirm that the {value} signal is present and behaves as expected.",
        ),
        entity(
            Register,
            Factual,
            "What is the address of the {name} register?",
            "The {name} register is located at address {value}.",
        ),
        entity(
            Register,
            Factual,
            "What is the reset value of the {name} register?",
            "The {name} register resets to {reset}.",
        ),
        entity(
            Register,
            Factual,
            "How wide is the {name} register?",
            "The {name} register is {width} bits wide.",
        ),
        entity(
            Register,
            ReverseLookup,
            "Which register is located at address {value}?",
            "Address {value} holds the {name} register.",
        ),
        entity(
            Register,
            Troubleshooting,
            "How can I check that the {name} register is configured correctly?",
            "Read address {value} and compare the contents of {name} with the expected configuration.",
        ),
        entity(
            Voltage,
            Factual,
            "What is the nominal voltage of {name}?",
            "{name} operates at {value}.",
        ),
        entity(
            Voltage,
            Factual,
            "What is the voltage tolerance of {name}?",
            "{name} is specified at {value} with a tolerance of {tolerance}.",
        ),
        entity(
            Voltage,
            ReverseLookup,
            "Which supply rail operates at {value}?",
            "{name} operates at {value}.",
        ),
        entity(
            Voltage,
            Troubleshooting,
            "How do I check the {name} supply?",
            "Measure {name} with a multimeter. It should read {value}.",
        ),
        entity(
            Timing,
            Factual,
            "What is the specified value of {name}?",
            "{name} is specified as {value}.",
        ),
        entity(
            Timing,
            Factual,
            "If {name} is {value}, what is the maximum frequency?",
            "With {name} at {value}, the maximum frequency is about {frequency}.",
        ),
        entity(
            Timing,
            ReverseLookup,
            "Which timing parameter is specified as {value}?",
            "{name} is specified as {value}.",
        ),
        entity(
            Frequency,
            Factual,
            "What is the frequency of {name}?",
            "{name} runs at {value}.",
        ),
        entity(
            Frequency,
            ReverseLookup,
            "Which clock runs at {value}?",
            "{name} runs at {value}.",
        ),
        entity(
            Current,
            Factual,
            "What is the specified {name}?",
            "The specified {name} is {value}.",
        ),
        entity(
            Current,
            ReverseLookup,
            "Which current specification is {value}?",
            "{name} is specified as {value}.",
        ),
        entity(
            BitField,
            Factual,
            "Which bits does the {name} field occupy?",
            "The {name} field occupies bits {value}.",
        ),
        entity(
            BitField,
            Factual,
            "Which register contains the {name} field?",
            "The {name} field is part of the {register} register.",
        ),
        entity(
            BitField,
            Factual,
            "What does the {name} field do?",
            "{name} (bits {value}): {description}",
        ),
        entity(
            BitField,
            Factual,
            "What is the active state of {name}?",
            "{name} is active when bit {bit_range} is {active_state}.",
        ),
        entity(
            BitField,
            ReverseLookup,
            "Which field occupies bits {value} of the {register} register?",
            "Bits {value} of {register} hold the {name} field.",
        ),
        entity(
            ErrorCode,
            Factual,
            "What does error code {code} mean?",
            "Error code {code} means: {value}",
        ),
        entity(
            ErrorCode,
            ReverseLookup,
            "Which error code reports \"{value}\"?",
            "Error code {code} reports \"{value}\".",
        ),
        entity(
            Procedure,
            Factual,
            "What is step {step} of the procedure?",
            "Step {step}: {value}",
        ),
        table(
            None,
            Factual,
            "What information does the {kind} starting with {first_label} provide?",
            "The {kind} starting with {first_label} lists {columns}.",
        ),
        table(
            Some(TableKind::Pin),
            Factual,
            "How many pins does the pin table starting with {first_label} define?",
            "The pin table starting with {first_label} defines {row_count} pins.",
        ),
        table(
            None,
            Factual,
            "What is the {row.column} of {row.label}?",
            "The {row.column} of {row.label} is {row.cell}.",
        ),
        table(
            None,
            Factual,
            "What values does the {kind} list for {row.label}?",
            "The {kind} lists {row.label} with {row.values}.",
        ),
        table(
            Some(TableKind::Pin),
            Factual,
            "What is the function of {row.label}?",
            "{row.label} carries the {row.value} signal.",
        ),
        table(
            Some(TableKind::Register),
            Factual,
            "What is located at address {row.address}?",
            "Address {row.address} holds {row.register}.",
        ),
        table(
            None,
            ReverseLookup,
            "Which {row.key_header} has a {row.column} of {row.cell}?",
            "{row.label} has a {row.column} of {row.cell}.",
        ),
        table(
            Some(TableKind::Pin),
            ReverseLookup,
            "Which pin in the pin table carries {row.value}?",
            "{row.value} is on {row.label}.",
        ),
    ]
}

#[must_use]
pub fn default_pair_templates() -> Vec<PairTemplateDef> {
    use EntityType::{Current, Frequency, Register, Timing, Voltage};
    use RelationKind::{
        AdjacentPins, Comparable, ConsecutiveSteps, FieldOfRegister, PowerPin,
        SharedAddressBlock, SharedSignalGroup,
    };

    let mut pairs = vec![
        pair(
            AdjacentPins,
            None,
            "Which signal is on the pin next to {a.name} ({a.value})?",
            "{b.name}, next to {a.name}, carries the {b.value} signal.",
        ),
        pair(
            SharedSignalGroup,
            None,
            "Which signal is in the same group as {a.value}?",
            "{b.value} on {b.name} is {relation} as {a.value} on {a.name}.",
        ),
        pair(
            SharedAddressBlock,
            None,
            "How are the {a.name} and {b.name} registers related?",
            "{a.name} ({a.value}) and {b.name} ({b.value}) are {relation}.",
        ),
        pair(
            FieldOfRegister,
            None,
            "Where is the {b.name} field located in the address map?",
            "{b.name} is bits {b.value} of the {a.name} register at address {a.value}.",
        ),
        pair(
            PowerPin,
            None,
            "Which pin provides the {b.name} supply?",
            "{a.name} ({a.value}) provides the {b.name} supply at {b.value}.",
        ),
        pair(
            ConsecutiveSteps,
            None,
            "What comes after step {a.step} ({a.value})?",
            "After step {a.step}, step {b.step} is: {b.value}",
        ),
        pair(
            Comparable,
            Some(Register),
            "How do the addresses of {a.name} and {b.name} compare?",
            "{a.name} is at {a.value} and {b.name} is at {b.value}.",
        ),
        pair(
            Comparable,
            Some(Voltage),
            "Which supply rail is higher, {a.name} or {b.name}?",
            "{higher} is higher: {a.name} is {a.value} and {b.name} is {b.value}.",
        ),
    ];

    for ty in [Voltage, Timing, Frequency, Current] {
        pairs.push(pair(
            Comparable,
            Some(ty),
            "How do {a.name} and {b.name} compare?",
            "{a.name} is {a.value} while {b.name} is {b.value}.",
        ));
        pairs.push(pair(
            Comparable,
            Some(ty),
            "What is the difference between {a.name} and {b.name}?",
            "{a.name} is {a.value} and {b.name} is {b.value}, so {higher} exceeds {lower} by {difference}.",
        ));
    }

    pairs
}
