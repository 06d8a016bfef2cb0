use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityType};
use crate::qa::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    // Pin, Pin
    AdjacentPins,
    SharedSignalGroup,

    // Register, Register
    SharedAddressBlock,

    // Register, BitField
    FieldOfRegister,

    // Pin, Voltage
    PowerPin,

    // Procedure, Procedure
    ConsecutiveSteps,

    // Any two entities of one type
    Comparable,
}

impl RelationKind {
    pub const ALL: [Self; 7] = [
        Self::AdjacentPins,
        Self::SharedSignalGroup,
        Self::SharedAddressBlock,
        Self::FieldOfRegister,
        Self::PowerPin,
        Self::ConsecutiveSteps,
        Self::Comparable,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdjacentPins => "adjacent_pins",
            Self::SharedSignalGroup => "shared_signal_group",
            Self::SharedAddressBlock => "shared_address_block",
            Self::FieldOfRegister => "field_of_register",
            Self::PowerPin => "power_pin",
            Self::ConsecutiveSteps => "consecutive_steps",
            Self::Comparable => "comparable",
        }
    }

    /// Phrase used for the `{relation}` template slot.
    #[must_use]
    pub fn phrase(&self) -> &'static str {
        match self {
            Self::AdjacentPins => "adjacent pins",
            Self::SharedSignalGroup => "in the same signal group",
            Self::SharedAddressBlock => "in the same address block",
            Self::FieldOfRegister => "a field of",
            Self::PowerPin => "supplied by",
            Self::ConsecutiveSteps => "consecutive steps",
            Self::Comparable => "comparable",
        }
    }

    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Self::Comparable => Category::Comparison,
            _ => Category::Integration,
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RelationKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adjacent_pins" => Ok(Self::AdjacentPins),
            "shared_signal_group" => Ok(Self::SharedSignalGroup),
            "shared_address_block" => Ok(Self::SharedAddressBlock),
            "field_of_register" => Ok(Self::FieldOfRegister),
            "power_pin" => Ok(Self::PowerPin),
            "consecutive_steps" => Ok(Self::ConsecutiveSteps),
            "comparable" => Ok(Self::Comparable),
            _ => Err(crate::Error::InvalidRelation(s.to_string())),
        }
    }
}

/// A relation between two entities of one chunk, oriented so that `a` is
/// the side the question is asked from.
#[derive(Debug, Clone, Copy)]
pub struct Relation<'a> {
    pub kind: RelationKind,
    pub a: &'a Entity,
    pub b: &'a Entity,
}

/// Every relation that holds between `first` and `second`. `first` is the
/// entity that appears earlier in generation order.
#[must_use]
pub fn relations_between<'a>(first: &'a Entity, second: &'a Entity) -> Vec<Relation<'a>> {
    use EntityType::{BitField, Pin, Procedure, Register, Table, Voltage};

    let mut found = Vec::new();
    if first.entity_type == Table || second.entity_type == Table {
        return found;
    }

    let mut push = |kind, a, b| found.push(Relation { kind, a, b });

    match (first.entity_type, second.entity_type) {
        (Pin, Pin) => {
            if let Some((a, b)) = adjacent_pins(first, second) {
                push(RelationKind::AdjacentPins, a, b);
            }
            if shared_signal_group(&first.value, &second.value) {
                push(RelationKind::SharedSignalGroup, first, second);
            }
        }
        (Register, Register) => {
            if let Some((a, b)) = shared_address_block(first, second) {
                push(RelationKind::SharedAddressBlock, a, b);
            }
        }
        (Register, BitField) if field_of_register(first, second) => {
            push(RelationKind::FieldOfRegister, first, second);
        }
        (BitField, Register) if field_of_register(second, first) => {
            push(RelationKind::FieldOfRegister, second, first);
        }
        (Pin, Voltage) if power_pin(first, second) => {
            push(RelationKind::PowerPin, first, second);
        }
        (Voltage, Pin) if power_pin(second, first) => {
            push(RelationKind::PowerPin, second, first);
        }
        (Procedure, Procedure) => {
            if let Some((a, b)) = consecutive_steps(first, second) {
                push(RelationKind::ConsecutiveSteps, a, b);
            }
        }
        _ => {}
    }

    if first.entity_type == second.entity_type && first.value != second.value {
        push(RelationKind::Comparable, first, second);
    }

    found
}

/// Splits `Pin A12` into `("A", 12)`.
#[must_use]
pub fn pin_position(name: &str) -> Option<(&str, u32)> {
    let id = name
        .strip_prefix("Pin ")
        .or_else(|| name.strip_prefix("pin "))?
        .trim();
    let digits = id.find(|c: char| c.is_ascii_digit())?;
    let (prefix, number) = id.split_at(digits);
    Some((prefix, number.parse().ok()?))
}

fn adjacent_pins<'a>(x: &'a Entity, y: &'a Entity) -> Option<(&'a Entity, &'a Entity)> {
    let (px, nx) = pin_position(&x.name)?;
    let (py, ny) = pin_position(&y.name)?;
    if px != py || nx.abs_diff(ny) != 1 {
        return None;
    }
    Some(if nx < ny { (x, y) } else { (y, x) })
}

/// Functional-block prefix of a signal: text before the first `_`.
fn signal_group(signal: &str) -> Option<&str> {
    let (group, _) = signal.split_once('_')?;
    (group.len() >= 2).then_some(group)
}

fn shared_signal_group(x: &str, y: &str) -> bool {
    x != y && signal_group(x).is_some_and(|g| signal_group(y) == Some(g))
}

#[must_use]
pub fn parse_hex(text: &str) -> Option<u64> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))?;
    u64::from_str_radix(digits, 16).ok()
}

fn shared_address_block<'a>(x: &'a Entity, y: &'a Entity) -> Option<(&'a Entity, &'a Entity)> {
    let ax = parse_hex(&x.value)?;
    let ay = parse_hex(&y.value)?;
    if ax == ay || ax >> 8 != ay >> 8 {
        return None;
    }
    Some(if ax < ay { (x, y) } else { (y, x) })
}

fn field_of_register(register: &Entity, field: &Entity) -> bool {
    field
        .attribute("register")
        .is_some_and(|name| name.eq_ignore_ascii_case(&register.name))
}

fn power_pin(pin: &Entity, voltage: &Entity) -> bool {
    let signal = pin.value.to_lowercase();
    let rail = voltage.name.to_lowercase();
    let (short, long) = if signal.len() <= rail.len() {
        (&signal, &rail)
    } else {
        (&rail, &signal)
    };
    short.len() >= 3 && long.contains(short.as_str())
}

fn consecutive_steps<'a>(x: &'a Entity, y: &'a Entity) -> Option<(&'a Entity, &'a Entity)> {
    let sx: u32 = x.attribute("step")?.parse().ok()?;
    let sy: u32 = y.attribute("step")?.parse().ok()?;
    match sx.checked_sub(sy) {
        Some(1) => Some((y, x)),
        _ if sy.checked_sub(sx) == Some(1) => Some((x, y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::SourceSpan;

    fn entity(ty: EntityType, name: &str, value: &str) -> Entity {
        Entity::new(ty, name, value, SourceSpan::new(0, 0, 1))
    }

    fn kinds(x: &Entity, y: &Entity) -> Vec<RelationKind> {
        relations_between(x, y).iter().map(|r| r.kind).collect()
    }

    #[test]
    fn test_relation_kind_round_trip() {
        for kind in RelationKind::ALL {
            assert_eq!(kind.as_str().parse::<RelationKind>().unwrap(), kind);
        }
        assert!("sibling_of".parse::<RelationKind>().is_err());
    }

    #[test]
    fn test_adjacent_pins_orientation() {
        let p8 = entity(EntityType::Pin, "Pin 8", "USB_D+");
        let p7 = entity(EntityType::Pin, "Pin 7", "USB_D-");
        let rels = relations_between(&p8, &p7);
        assert_eq!(rels[0].kind, RelationKind::AdjacentPins);
        assert_eq!(rels[0].a.name, "Pin 7");
        assert_eq!(
            kinds(&p8, &p7),
            vec![
                RelationKind::AdjacentPins,
                RelationKind::SharedSignalGroup,
                RelationKind::Comparable
            ]
        );
    }

    #[test]
    fn test_pins_with_different_prefix_are_not_adjacent() {
        let a = entity(EntityType::Pin, "Pin A1", "VBUS");
        let b = entity(EntityType::Pin, "Pin B2", "GND");
        assert_eq!(kinds(&a, &b), vec![RelationKind::Comparable]);
        assert_eq!(pin_position("Pin A12"), Some(("A", 12)));
    }

    #[test]
    fn test_register_blocks_and_fields() {
        let ctrl = entity(EntityType::Register, "CTRL_REG", "0x1204");
        let stat = entity(EntityType::Register, "STAT_REG", "0x1200");
        let far = entity(EntityType::Register, "DMA_REG", "0x2000");
        let rels = relations_between(&ctrl, &stat);
        assert_eq!(rels[0].kind, RelationKind::SharedAddressBlock);
        assert_eq!(rels[0].a.name, "STAT_REG");
        assert_eq!(kinds(&ctrl, &far), vec![RelationKind::Comparable]);

        let mode = entity(EntityType::BitField, "MODE", "[7:4]").with_attribute("register", "CTRL_REG");
        let rels = relations_between(&mode, &ctrl);
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].kind, RelationKind::FieldOfRegister);
        assert_eq!(rels[0].a.name, "CTRL_REG");
    }

    #[test]
    fn test_power_pin() {
        let pin = entity(EntityType::Pin, "Pin 1", "VBUS");
        let rail = entity(EntityType::Voltage, "VBUS", "5V");
        let other = entity(EntityType::Voltage, "VDD_CORE", "1.8V");
        assert_eq!(kinds(&rail, &pin), vec![RelationKind::PowerPin]);
        assert!(kinds(&pin, &other).is_empty());
    }

    #[test]
    fn test_consecutive_steps() {
        let s1 = entity(EntityType::Procedure, "Step 1", "Remove the cover.").with_attribute("step", "1");
        let s2 = entity(EntityType::Procedure, "Step 2", "Disconnect power.").with_attribute("step", "2");
        let s4 = entity(EntityType::Procedure, "Step 4", "Replace the fuse.").with_attribute("step", "4");
        let rels = relations_between(&s2, &s1);
        assert_eq!(rels[0].kind, RelationKind::ConsecutiveSteps);
        assert_eq!(rels[0].a.name, "Step 1");
        assert_eq!(kinds(&s1, &s4), vec![RelationKind::Comparable]);
    }

    #[test]
    fn test_equal_values_are_not_comparable() {
        let a = entity(EntityType::Voltage, "VDD_A", "3.3V");
        let b = entity(EntityType::Voltage, "VDD_B", "3.3V");
        assert!(kinds(&a, &b).is_empty());
        let table = entity(EntityType::Table, "Table 1", "[]");
        assert!(kinds(&table, &table.clone()).is_empty());
    }
}
