use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityRef, EntityType, TableData};
use crate::error::Rejection;
use crate::relation::{relations_between, Relation, RelationKind};
use crate::template::{MissingSlot, Template};

use super::ledger::QuestionLedger;
use super::pair::{dedup_key, Category, QaPair};
use super::templates::{EntityTemplate, TableScope, TemplateSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Values too common to identify an entity in a reverse lookup.
    pub generic_values: Vec<String>,
    pub min_specific_len: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            generic_values: [
                "GND", "VCC", "NC", "N/A", "RESERVED", "0", "1", "0x0", "0x00", "TBD", "-",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            min_specific_len: 3,
        }
    }
}

impl GeneratorConfig {
    fn is_generic(&self, value: &str) -> bool {
        value.chars().count() < self.min_specific_len
            || self
                .generic_values
                .iter()
                .any(|g| g.eq_ignore_ascii_case(value.trim()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Generation {
    pub pairs: Vec<QaPair>,
    pub rejections: Vec<Rejection>,
}

/// One data row of a table, as seen by `row.*` template slots.
struct RowContext<'a> {
    key: &'a str,
    key_header: Option<&'a str>,
    /// The key as generated text refers to it ("Pin 3" in a pin table).
    label: String,
    value: Option<&'a str>,
    values: String,
    address: Option<&'a str>,
    register: Option<&'a str>,
    column: Option<&'a str>,
    cell: Option<&'a str>,
}

impl RowContext<'_> {
    fn slot(&self, key: &str) -> Option<String> {
        match key {
            "row.key" => Some(self.key.to_string()),
            "row.key_header" => self.key_header.map(str::to_string),
            "row.label" => Some(self.label.clone()),
            "row.value" => self.value.map(str::to_string),
            "row.values" => Some(self.values.clone()),
            "row.address" => self.address.map(str::to_string),
            "row.register" => self.register.map(str::to_string),
            "row.column" => self.column.map(str::to_string),
            "row.cell" => self.cell.map(str::to_string),
            _ => None,
        }
    }
}

/// Numeric comparison slots, present only for measurements in the same unit.
struct Comparison {
    difference: String,
    higher: String,
    lower: String,
}

/// Per-chunk state: the chunk's local dedup set and the output buffers.
struct Emitter<'g> {
    ledger: &'g QuestionLedger,
    local: HashSet<String>,
    out: Generation,
}

impl Emitter<'_> {
    fn emit(&mut self, question: String, answer: String, category: Category, sources: Vec<EntityRef>) {
        let key = dedup_key(&question);
        if self.local.contains(&key) || !self.ledger.claim(&key) {
            let rejection = Rejection::DuplicateQuestion { question };
            tracing::trace!(%rejection);
            self.out.rejections.push(rejection);
            return;
        }
        self.local.insert(key);
        self.out
            .pairs
            .push(QaPair::new(question, answer, category, sources));
    }

    fn skip(&mut self, template: &Template, missing: MissingSlot, entity: &str) {
        let rejection = Rejection::EmptyTemplateSlot {
            template: template.source().to_string(),
            slot: missing.0,
            entity: entity.to_string(),
        };
        tracing::trace!(%rejection);
        self.out.rejections.push(rejection);
    }

    fn fill_and_emit<F>(
        &mut self,
        question: &Template,
        answer: &Template,
        category: Category,
        sources: Vec<EntityRef>,
        entity: &str,
        lookup: F,
    ) where
        F: Fn(&str) -> Option<String>,
    {
        let filled = question
            .fill(&lookup)
            .map_err(|m| (question, m))
            .and_then(|q| answer.fill(&lookup).map(|a| (q, a)).map_err(|m| (answer, m)));
        match filled {
            Ok((q, a)) => self.emit(q, a, category, sources),
            Err((template, missing)) => self.skip(template, missing, entity),
        }
    }
}

pub struct QaGenerator {
    templates: Arc<TemplateSet>,
    config: GeneratorConfig,
    ledger: Arc<QuestionLedger>,
}

impl QaGenerator {
    #[must_use]
    pub fn new(templates: Arc<TemplateSet>, ledger: Arc<QuestionLedger>) -> Self {
        Self {
            templates,
            config: GeneratorConfig::default(),
            ledger,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: GeneratorConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<QuestionLedger> {
        &self.ledger
    }

    /// Generates the pairs for one chunk's entities.
    ///
    /// Entities are visited in registry order, then appearance. Each entity
    /// produces its categories in [`Category`] order. A relation between two
    /// entities is asked about once, while visiting the earlier one.
    #[must_use]
    pub fn generate(&self, entities: &[Entity]) -> Generation {
        let mut ordered: Vec<&Entity> = entities.iter().collect();
        ordered.sort_by_key(|e| (e.entity_type.registry_index(), e.source_span.start));

        let mut emitter = Emitter {
            ledger: &self.ledger,
            local: HashSet::new(),
            out: Generation::default(),
        };

        for (idx, entity) in ordered.iter().enumerate() {
            self.factual(entity, &mut emitter);
            if self.is_specific(entity, &ordered) {
                self.single(entity, Category::ReverseLookup, &mut emitter);
            } else if entity.entity_type == EntityType::Table {
                self.table_rows(entity, Category::ReverseLookup, &mut emitter);
            }
            if entity.entity_type.is_physically_checkable() {
                self.single(entity, Category::Troubleshooting, &mut emitter);
            }

            let relations: Vec<Relation<'_>> = ordered[idx + 1..]
                .iter()
                .flat_map(|other| relations_between(entity, other))
                .collect();
            for category in [Category::Integration, Category::Comparison] {
                for relation in relations.iter().filter(|r| r.kind.category() == category) {
                    self.relation(relation, &mut emitter);
                }
            }
        }

        emitter.out
    }

    fn factual(&self, entity: &Entity, emitter: &mut Emitter<'_>) {
        if entity.entity_type == EntityType::Table {
            self.table_rows(entity, Category::Factual, emitter);
        } else {
            self.single(entity, Category::Factual, emitter);
        }
    }

    fn single(&self, entity: &Entity, category: Category, emitter: &mut Emitter<'_>) {
        for template in self.templates.for_entity(entity.entity_type, category) {
            emitter.fill_and_emit(
                &template.question,
                &template.answer,
                category,
                vec![entity.reference()],
                &entity.name,
                |key| entity_slot(entity, key),
            );
        }
    }

    /// Table templates for the table's kind, expanded per table, per row or
    /// per cell.
    fn table_rows(&self, table: &Entity, category: Category, emitter: &mut Emitter<'_>) {
        let Some(data) = table.table() else {
            return;
        };

        for template in self.templates.for_table(data.kind, category) {
            match template.scope {
                TableScope::Table => self.apply_table(template, table, &data, None, emitter),
                TableScope::Row => {
                    for row in &data.rows {
                        let ctx = row_context(&data, row, None);
                        if category == Category::ReverseLookup {
                            let value = ctx.value.unwrap_or_default();
                            let in_column = data.column(1).map(str::to_string);
                            if !self.is_specific_cell(value, in_column) {
                                continue;
                            }
                        }
                        self.apply_table(template, table, &data, Some(&ctx), emitter);
                    }
                }
                TableScope::Cell => {
                    for row in &data.rows {
                        for column in 1..data.column_count() {
                            let ctx = row_context(&data, row, Some(column));
                            if category == Category::ReverseLookup {
                                let cell = ctx.cell.unwrap_or_default();
                                let in_column = data.column(column).map(str::to_string);
                                if !self.is_specific_cell(cell, in_column) {
                                    continue;
                                }
                            }
                            self.apply_table(template, table, &data, Some(&ctx), emitter);
                        }
                    }
                }
            }
        }
    }

    fn apply_table(
        &self,
        template: &EntityTemplate,
        table: &Entity,
        data: &TableData,
        row: Option<&RowContext<'_>>,
        emitter: &mut Emitter<'_>,
    ) {
        emitter.fill_and_emit(
            &template.question,
            &template.answer,
            template.category,
            vec![table.reference()],
            &table.name,
            |key| match (key.starts_with("row."), row) {
                (true, Some(ctx)) => ctx.slot(key),
                (true, None) => None,
                (false, _) => table_slot(table, data, key),
            },
        );
    }

    fn relation(&self, relation: &Relation<'_>, emitter: &mut Emitter<'_>) {
        let Relation { kind, a, b } = *relation;
        let comparison = (kind == RelationKind::Comparable)
            .then(|| compare(a, b))
            .flatten();

        for template in self.templates.for_relation(kind, a.entity_type) {
            emitter.fill_and_emit(
                &template.question,
                &template.answer,
                kind.category(),
                vec![a.reference(), b.reference()],
                &format!("{} / {}", a.name, b.name),
                |key| pair_slot(kind, a, b, comparison.as_ref(), key),
            );
        }
    }

    /// A value identifies its entity when it is long enough, not a generic
    /// placeholder, and not shared with another entity of the same type.
    fn is_specific(&self, entity: &Entity, chunk: &[&Entity]) -> bool {
        if entity.entity_type == EntityType::Table || self.config.is_generic(&entity.value) {
            return false;
        }
        !chunk.iter().any(|other| {
            other.entity_type == entity.entity_type
                && other.name != entity.name
                && other.value == entity.value
        })
    }

    fn is_specific_cell(&self, cell: &str, column: impl Iterator<Item = String>) -> bool {
        !self.config.is_generic(cell) && column.filter(|c| c == cell).count() == 1
    }
}

fn row_context<'a>(data: &'a TableData, row: &'a [String], column: Option<usize>) -> RowContext<'a> {
    let header = |idx: usize| {
        data.header_detected
            .then(|| data.headers.get(idx).map(String::as_str))
            .flatten()
    };
    let key = row.first().map_or("", String::as_str);
    let address = row.iter().map(String::as_str).find(|c| is_hex_literal(c));
    RowContext {
        key,
        key_header: header(0),
        label: data.kind.row_label(key),
        value: row.get(1).map(String::as_str),
        values: row_values(row),
        address,
        register: address.and_then(|_| {
            row.iter()
                .map(String::as_str)
                .find(|c| !c.is_empty() && !is_hex_literal(c))
        }),
        column: column.and_then(header),
        cell: column.and_then(|c| row.get(c)).map(String::as_str),
    }
}

fn is_hex_literal(cell: &str) -> bool {
    cell.strip_prefix("0x")
        .or_else(|| cell.strip_prefix("0X"))
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Table-level slots: the kind and first row label on top of the entity's own.
fn table_slot(table: &Entity, data: &TableData, key: &str) -> Option<String> {
    match key {
        "kind" => Some(data.kind.label().to_string()),
        "first_label" => data
            .rows
            .first()
            .and_then(|row| row.first())
            .map(|first| data.kind.row_label(first)),
        _ => entity_slot(table, key),
    }
}

fn row_values(row: &[String]) -> String {
    row.get(1..).map(|v| v.join(", ")).unwrap_or_default()
}

fn entity_slot(entity: &Entity, key: &str) -> Option<String> {
    match key {
        "name" => Some(entity.name.clone()),
        "value" => Some(entity.value.clone()),
        "type" => Some(entity.entity_type.label().to_string()),
        "columns" => entity
            .table()
            .filter(|t| t.header_detected)
            .map(|t| t.headers.join(", ")),
        "frequency" if entity.entity_type == EntityType::Timing => max_frequency(entity),
        attribute => entity.attribute(attribute).map(str::to_string),
    }
}

fn pair_slot(
    kind: RelationKind,
    a: &Entity,
    b: &Entity,
    comparison: Option<&Comparison>,
    key: &str,
) -> Option<String> {
    if let Some(key) = key.strip_prefix("a.") {
        return entity_slot(a, key);
    }
    if let Some(key) = key.strip_prefix("b.") {
        return entity_slot(b, key);
    }
    match key {
        "relation" => Some(kind.phrase().to_string()),
        "difference" => comparison.map(|c| c.difference.clone()),
        "higher" => comparison.map(|c| c.higher.clone()),
        "lower" => comparison.map(|c| c.lower.clone()),
        _ => None,
    }
}

fn compare(a: &Entity, b: &Entity) -> Option<Comparison> {
    let (va, unit) = a.measurement()?;
    let (vb, unit_b) = b.measurement()?;
    if unit != unit_b || (va - vb).abs() < f64::EPSILON {
        return None;
    }
    let (higher, lower) = if va > vb { (a, b) } else { (b, a) };
    Some(Comparison {
        difference: format!("{}{unit}", format_number((va - vb).abs())),
        higher: higher.name.clone(),
        lower: lower.name.clone(),
    })
}

/// Reciprocal of a timing value, in the largest unit that keeps it at or
/// above one. The small tolerance absorbs float error such as 1ns giving
/// 999999999.99Hz.
fn max_frequency(timing: &Entity) -> Option<String> {
    let (nominal, unit) = timing.measurement()?;
    let scale = match unit {
        "ns" => 1e-9,
        "us" | "µs" | "μs" => 1e-6,
        "ms" => 1e-3,
        "s" => 1.0,
        _ => return None,
    };
    if nominal <= 0.0 {
        return None;
    }
    let hz = 1.0 / (nominal * scale);
    let (value, unit) = [(1e9, "GHz"), (1e6, "MHz"), (1e3, "kHz")]
        .into_iter()
        .find(|(factor, _)| hz * (1.0 + 1e-9) >= *factor)
        .map_or((hz, "Hz"), |(factor, unit)| (hz / factor, unit));
    let rounded = (value * 100.0).round() / 100.0;
    Some(format!("{}{unit}", format_number(rounded)))
}

/// Formats with up to six decimals, dropping trailing zeros.
fn format_number(value: f64) -> String {
    let text = format!("{value:.6}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::SourceSpan;

    fn generator() -> QaGenerator {
        QaGenerator::new(
            Arc::new(TemplateSet::builtin().unwrap()),
            Arc::new(QuestionLedger::new()),
        )
    }

    fn at(start: usize) -> SourceSpan {
        SourceSpan::new(0, start, start + 1)
    }

    fn voltage(name: &str, nominal: &str, start: usize) -> Entity {
        Entity::new(EntityType::Voltage, name, format!("{nominal}V"), at(start))
            .with_attribute("nominal", nominal)
            .with_attribute("unit", "V")
    }

    #[test]
    fn test_pin_factual_with_description() {
        let pin = Entity::new(EntityType::Pin, "Pin 7", "GPIO_12", at(0))
            .with_attribute("description", "General Purpose Input/Output");
        let out = generator().generate(&[pin]);

        let factual = out
            .pairs
            .iter()
            .find(|p| p.question == "What is the function of Pin 7?")
            .unwrap();
        assert_eq!(factual.category, Category::Factual);
        assert!(factual.answer.contains("GPIO_12"));
        assert!(factual.answer.contains("General Purpose Input/Output"));

        let categories: Vec<_> = out.pairs.iter().map(|p| p.category).collect();
        assert_eq!(
            categories,
            vec![
                Category::Factual,
                Category::Factual,
                Category::ReverseLookup,
                Category::Troubleshooting
            ]
        );
    }

    #[test]
    fn test_missing_slot_skips_template() {
        let pin = Entity::new(EntityType::Pin, "Pin 4", "GND", at(0));
        let out = generator().generate(&[pin]);

        assert!(out.pairs.iter().all(|p| !p.question.contains("function")));
        assert!(out.pairs.iter().all(|p| p.category != Category::ReverseLookup));
        assert!(out.rejections.iter().any(|r| matches!(
            r,
            Rejection::EmptyTemplateSlot { slot, .. } if slot == "description"
        )));
        for pair in &out.pairs {
            assert!(!pair.answer.contains('{'));
            assert!(!pair.answer.contains("()"));
        }
    }

    #[test]
    fn test_shared_value_is_not_reverse_looked_up() {
        let a = Entity::new(EntityType::Register, "CTRL_A", "0x1000", at(0));
        let b = Entity::new(EntityType::Register, "CTRL_B", "0x1000", at(10));
        let out = generator().generate(&[a, b]);
        assert!(out.pairs.iter().all(|p| p.category != Category::ReverseLookup));
    }

    #[test]
    fn test_voltage_comparison() {
        let out = generator().generate(&[voltage("VDD_CORE", "1.8", 0), voltage("VDD_IO", "3.3", 20)]);
        let comparisons: Vec<_> = out
            .pairs
            .iter()
            .filter(|p| p.category == Category::Comparison)
            .collect();

        assert!(!comparisons.is_empty());
        assert!(comparisons
            .iter()
            .any(|p| p.answer.contains("1.8V") && p.answer.contains("3.3V")));
        let difference = comparisons
            .iter()
            .find(|p| p.question.starts_with("What is the difference"))
            .unwrap();
        assert!(difference.answer.ends_with("VDD_IO exceeds VDD_CORE by 1.5V."));
        assert_eq!(difference.source_entities.len(), 2);
    }

    #[test]
    fn test_integration_pairs() {
        let p1 = Entity::new(EntityType::Pin, "Pin 1", "USB_D-", at(0));
        let p2 = Entity::new(EntityType::Pin, "Pin 2", "USB_D+", at(10));
        let out = generator().generate(&[p2, p1]);
        let integration: Vec<_> = out
            .pairs
            .iter()
            .filter(|p| p.category == Category::Integration)
            .map(|p| p.question.as_str())
            .collect();
        assert_eq!(
            integration,
            vec![
                "Which signal is on the pin next to Pin 1 (USB_D-)?",
                "Which signal is in the same group as USB_D-?"
            ]
        );
    }

    fn table(rows: &str, headers: &str, kind: &str, row_count: usize) -> Entity {
        Entity::new(EntityType::Table, "Table 1", rows, at(0))
            .with_attribute("headers", headers)
            .with_attribute("header_detected", "true")
            .with_attribute("kind", kind)
            .with_attribute("row_count", row_count.to_string())
    }

    fn answer_to<'a>(out: &'a Generation, question: &str) -> &'a str {
        out.pairs
            .iter()
            .find(|p| p.question == question)
            .map(|p| p.answer.as_str())
            .unwrap_or_else(|| panic!("no pair for {question:?}"))
    }

    #[test]
    fn test_register_table_questions() {
        let registers = table(
            r#"[["CONTROL_REG","0x1234"],["STATUS_REG","0x1238"]]"#,
            r#"["REG_NAME","ADDR"]"#,
            "register_table",
            2,
        );
        let out = generator().generate(&[registers]);

        assert_eq!(
            answer_to(&out, "What is the ADDR of CONTROL_REG?"),
            "The ADDR of CONTROL_REG is 0x1234."
        );
        assert_eq!(
            answer_to(&out, "What is located at address 0x1238?"),
            "Address 0x1238 holds STATUS_REG."
        );
        assert_eq!(
            answer_to(
                &out,
                "What information does the register table starting with CONTROL_REG provide?"
            ),
            "The register table starting with CONTROL_REG lists REG_NAME, ADDR."
        );
        assert_eq!(
            answer_to(&out, "Which REG_NAME has a ADDR of 0x1238?"),
            "STATUS_REG has a ADDR of 0x1238."
        );
        assert!(out.pairs.iter().all(|p| !p.question.contains("Table 1")));
    }

    #[test]
    fn test_pin_table_rows_name_the_pin() {
        let pins = table(
            r#"[["1","VBUS","IN"],["2","USB_D-","IO"],["4","GND","PWR"]]"#,
            r#"["PIN","SIGNAL","DIR"]"#,
            "pin_table",
            3,
        );
        let out = generator().generate(&[pins]);
        let questions: Vec<_> = out.pairs.iter().map(|p| p.question.as_str()).collect();

        assert_eq!(
            answer_to(&out, "What is the function of Pin 1?"),
            "Pin 1 carries the VBUS signal."
        );
        assert_eq!(
            answer_to(&out, "What is the SIGNAL of Pin 2?"),
            "The SIGNAL of Pin 2 is USB_D-."
        );
        assert_eq!(
            answer_to(&out, "How many pins does the pin table starting with Pin 1 define?"),
            "The pin table starting with Pin 1 defines 3 pins."
        );
        assert_eq!(
            answer_to(&out, "Which pin in the pin table carries VBUS?"),
            "VBUS is on Pin 1."
        );
        assert!(!questions.contains(&"Which pin in the pin table carries GND?"));
        assert!(!questions.contains(&"What is the SIGNAL of 1?"));
        assert!(!questions.iter().any(|q| q.contains("Table 1")));
    }

    #[test]
    fn test_tables_in_later_chunks_keep_their_questions() {
        let generator = generator();
        let first = generator.generate(&[table(
            r#"[["CONTROL_REG","0x1234"],["STATUS_REG","0x1238"]]"#,
            r#"["REG_NAME","ADDR"]"#,
            "register_table",
            2,
        )]);
        let second = generator.generate(&[table(
            r#"[["DMA_CTRL","0x2000"],["DMA_STAT","0x2004"]]"#,
            r#"["REG_NAME","ADDR"]"#,
            "register_table",
            2,
        )]);

        assert!(!first.pairs.is_empty());
        assert!(second
            .rejections
            .iter()
            .all(|r| !matches!(r, Rejection::DuplicateQuestion { .. })));
        assert!(second.pairs.iter().any(|p| p.question
            == "What information does the register table starting with DMA_CTRL provide?"));
    }

    #[test]
    fn test_timing_maximum_frequency() {
        let setup = Entity::new(EntityType::Timing, "tSU", "10ns", at(0))
            .with_attribute("nominal", "10")
            .with_attribute("unit", "ns");
        let out = generator().generate(&[setup]);
        let pair = out
            .pairs
            .iter()
            .find(|p| p.question == "If tSU is 10ns, what is the maximum frequency?")
            .unwrap();
        assert_eq!(
            pair.answer,
            "With tSU at 10ns, the maximum frequency is about 100MHz."
        );
        assert_eq!(pair.difficulty, crate::qa::Difficulty::Basic);
    }

    #[test]
    fn test_max_frequency_units() {
        let timing = |nominal: &str, unit: &str| {
            Entity::new(EntityType::Timing, "t", format!("{nominal}{unit}"), at(0))
                .with_attribute("nominal", nominal)
                .with_attribute("unit", unit)
        };
        assert_eq!(max_frequency(&timing("1", "ns")).as_deref(), Some("1GHz"));
        assert_eq!(max_frequency(&timing("3", "ns")).as_deref(), Some("333.33MHz"));
        assert_eq!(max_frequency(&timing("1", "us")).as_deref(), Some("1MHz"));
        assert_eq!(max_frequency(&timing("2", "ms")).as_deref(), Some("500Hz"));
        assert_eq!(max_frequency(&timing("0", "ns")), None);
    }

    #[test]
    fn test_ledger_blocks_repeats_across_calls() {
        let generator = generator();
        let pin = Entity::new(EntityType::Pin, "Pin 9", "SPI_MOSI", at(0));
        let first = generator.generate(std::slice::from_ref(&pin));
        let second = generator.generate(&[pin]);

        assert!(!first.pairs.is_empty());
        assert!(second.pairs.is_empty());
        assert!(second
            .rejections
            .iter()
            .any(|r| matches!(r, Rejection::DuplicateQuestion { .. })));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let entities = vec![
            voltage("VDD_CORE", "1.8", 0),
            Entity::new(EntityType::Pin, "Pin 1", "VDD_CORE", at(5)),
            voltage("VDD_IO", "3.3", 9),
        ];
        let a = generator().generate(&entities);
        let b = generator().generate(&entities);
        assert_eq!(a.pairs, b.pairs);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.3 - 1.8), "1.5");
        assert_eq!(format_number(10.0), "10");
        assert_eq!(format_number(0.25), "0.25");
    }
}
