use std::sync::Arc;

use crate::chunk::Chunk;
use crate::entity::{Entity, EntitySet, SourceSpan};
use crate::error::Rejection;

use super::registry::PatternRegistry;
use super::table::TableScan;

#[derive(Debug, Clone, Default)]
pub struct ExtractionOutput {
    /// Ordered by appearance in the chunk, ties by registry order.
    pub entities: Vec<Entity>,
    pub rejections: Vec<Rejection>,
}

/// Applies a [`PatternRegistry`] to one chunk.
pub struct EntityExtractor {
    registry: Arc<PatternRegistry>,
}

impl EntityExtractor {
    #[must_use]
    pub fn new(registry: Arc<PatternRegistry>) -> Self {
        Self { registry }
    }

    /// Runs every rule over the chunk text. Text inside reconstructed tables
    /// is skipped, and within one type the first rule to match a span owns
    /// it.
    #[must_use]
    pub fn extract(&self, chunk: &Chunk, tables: &TableScan) -> ExtractionOutput {
        let mut set = EntitySet::new();
        let mut rejections = Vec::new();

        for table in &tables.tables {
            set.insert(table.clone());
        }

        for entity_type in self.registry.entity_types() {
            let mut claimed: Vec<(usize, usize)> = Vec::new();

            for rule in self.registry.rules_for(entity_type) {
                for caps in rule.regex.captures_iter(&chunk.text) {
                    let Some(whole) = caps.get(0) else {
                        continue;
                    };
                    let (start, end) = (whole.start(), whole.end());
                    if start == end || tables.is_consumed(start, end) {
                        continue;
                    }
                    if claimed.iter().any(|&(s, e)| s < end && start < e) {
                        continue;
                    }

                    let candidate = match rule.candidate(&caps) {
                        Ok(candidate) => candidate,
                        Err(reason) => {
                            let rejection = Rejection::PatternMismatch {
                                rule: rule.id.clone(),
                                entity_type,
                                text: whole.as_str().to_string(),
                                reason,
                            };
                            tracing::trace!(chunk = chunk.id, %rejection);
                            rejections.push(rejection);
                            continue;
                        }
                    };

                    claimed.push((start, end));
                    let mut entity = Entity::new(
                        entity_type,
                        candidate.name,
                        candidate.value,
                        SourceSpan::new(chunk.id, start, end),
                    )
                    .with_rule(rule.id.as_str());
                    entity.attributes = candidate.attributes;

                    if !set.insert(entity) {
                        tracing::trace!(
                            chunk = chunk.id,
                            rule = %rule.id,
                            "entity already defined earlier in chunk, keeping first"
                        );
                    }
                }
            }
        }

        ExtractionOutput {
            entities: set.into_ordered(),
            rejections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityType;
    use crate::ingest::table::TableReconstructor;

    fn extract(text: &str) -> ExtractionOutput {
        let registry = Arc::new(PatternRegistry::builtin().unwrap());
        let chunk = Chunk::new(0, text);
        let tables = TableReconstructor::new()
            .with_registry(Arc::clone(&registry))
            .reconstruct(&chunk);
        EntityExtractor::new(registry).extract(&chunk, &tables)
    }

    fn find<'a>(out: &'a ExtractionOutput, ty: EntityType, name: &str) -> Option<&'a Entity> {
        out.entities
            .iter()
            .find(|e| e.entity_type == ty && e.name == name)
    }

    #[test]
    fn test_pin_with_description() {
        let out = extract("Pin 7: GPIO_12 - General Purpose Input/Output");
        let pin = find(&out, EntityType::Pin, "Pin 7").unwrap();
        assert_eq!(pin.value, "GPIO_12");
        assert_eq!(pin.attribute("description"), Some("General Purpose Input/Output"));
        assert_eq!(pin.rule, "pin_signal_description");
        assert_eq!(out.entities.len(), 1);
    }

    #[test]
    fn test_first_definition_wins() {
        let out = extract("Pin 7: GPIO_12 - Primary function\n\nPin 7: UART_TX - Remapped function");
        let pins: Vec<_> = out
            .entities
            .iter()
            .filter(|e| e.entity_type == EntityType::Pin)
            .collect();
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].value, "GPIO_12");
    }

    #[test]
    fn test_mixed_entities_in_appearance_order() {
        let text = "VDD_CORE = 1.8V ± 5%\nCONTROL_REG = 0x1234\nBits [7:4] of CONTROL_REG: MODE\nError 0x1F: Overcurrent detected";
        let out = extract(text);
        let types: Vec<_> = out.entities.iter().map(|e| e.entity_type).collect();
        assert_eq!(
            types,
            vec![
                EntityType::Voltage,
                EntityType::Register,
                EntityType::BitField,
                EntityType::ErrorCode
            ]
        );
        let error = find(&out, EntityType::ErrorCode, "Error 0x1F").unwrap();
        assert_eq!(error.value, "Overcurrent detected");
    }

    #[test]
    fn test_table_lines_are_not_rematched() {
        let text = "REG_NAME ADDR\nCONTROL_REG 0x1234\nSTATUS_REG 0x1238";
        let out = extract(text);
        assert_eq!(out.entities.len(), 1);
        assert_eq!(out.entities[0].entity_type, EntityType::Table);
    }

    #[test]
    fn test_rejected_match_is_counted() {
        let set = crate::ingest::registry::RuleSet {
            rules: vec![crate::ingest::registry::RuleDef {
                id: "loose_voltage".into(),
                entity_type: EntityType::Voltage,
                pattern: r"(?P<rail>[A-Z]+) at (?P<nominal>\S+) (?P<unit>\S+)".into(),
                name: "{rail}".into(),
                value: "{nominal}{unit}".into(),
                attributes: [
                    ("nominal".to_string(), "{nominal}".to_string()),
                    ("unit".to_string(), "{unit}".to_string()),
                ]
                .into(),
            }],
        };
        let registry = Arc::new(PatternRegistry::from_rule_set(&set).unwrap());
        let chunk = Chunk::new(0, "VDD at high level\nVIO at 3.3 V");
        let out = EntityExtractor::new(registry).extract(&chunk, &TableScan::default());

        assert_eq!(out.entities.len(), 1);
        assert_eq!(out.entities[0].value, "3.3V");
        assert_eq!(out.rejections.len(), 1);
        assert!(matches!(out.rejections[0], Rejection::PatternMismatch { .. }));
    }

    #[test]
    fn test_empty_chunk() {
        let out = extract("");
        assert!(out.entities.is_empty());
        assert!(out.rejections.is_empty());
    }
}
