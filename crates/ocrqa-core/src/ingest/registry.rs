//! Declarative recognition rules, grouped per entity type in priority order.
//!
//! Rules are plain data ([`RuleDef`]) so a whole rule set can be loaded from
//! JSON and swapped without touching the extractor. [`PatternRegistry`]
//! compiles a rule set once and is read-only afterwards.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::entity::EntityType;
use crate::template::{collapse_whitespace, Template};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDef {
    pub id: String,
    pub entity_type: EntityType,
    pub pattern: String,
    /// Template over capture group names producing the entity name.
    pub name: String,
    /// Template producing the primary value.
    pub value: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub rules: Vec<RuleDef>,
}

impl RuleSet {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

/// Filled-in rule output before it becomes an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub value: String,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct Rule {
    pub id: String,
    pub entity_type: EntityType,
    pub regex: Regex,
    name: Template,
    value: Template,
    attributes: Vec<(String, Template)>,
}

impl Rule {
    pub fn compile(def: &RuleDef) -> Result<Self> {
        if def.entity_type == EntityType::Table {
            return Err(Error::InvalidRule {
                rule: def.id.clone(),
                reason: "tables come from the table reconstructor, not from rules".into(),
            });
        }

        let regex = Regex::new(&def.pattern).map_err(|source| Error::InvalidPattern {
            rule: def.id.clone(),
            source,
        })?;

        let name = Template::parse(&def.name)?;
        let value = Template::parse(&def.value)?;
        let attributes = def
            .attributes
            .iter()
            .map(|(key, t)| Ok((key.clone(), Template::parse(t)?)))
            .collect::<Result<Vec<_>>>()?;

        let groups: HashSet<&str> = regex.capture_names().flatten().collect();
        let all_templates = std::iter::once(&name)
            .chain(std::iter::once(&value))
            .chain(attributes.iter().map(|(_, t)| t));
        for template in all_templates {
            if let Some(missing) = template.slots().find(|s| !groups.contains(s)) {
                return Err(Error::UnknownCaptureGroup {
                    rule: def.id.clone(),
                    group: missing.to_string(),
                });
            }
        }

        Ok(Self {
            id: def.id.clone(),
            entity_type: def.entity_type,
            regex,
            name,
            value,
            attributes,
        })
    }

    /// Fills the rule's templates from a match and runs the type's sanity
    /// checks. `Err` carries the reason the match was not usable.
    pub fn candidate(&self, caps: &Captures<'_>) -> std::result::Result<Candidate, String> {
        let lookup = |group: &str| caps.name(group).map(|m| collapse_whitespace(m.as_str()));

        let name = self
            .name
            .fill(lookup)
            .map_err(|missing| format!("no name (empty group '{}')", missing.0))?;
        let value = self
            .value
            .fill(lookup)
            .map_err(|missing| format!("no value (empty group '{}')", missing.0))?;

        let mut attributes = BTreeMap::new();
        for (key, template) in &self.attributes {
            if let Ok(filled) = template.fill(lookup) {
                attributes.insert(key.clone(), filled);
            }
        }

        let mut candidate = Candidate {
            name,
            value,
            attributes,
        };
        check_candidate(self.entity_type, &mut candidate)?;
        Ok(candidate)
    }
}

#[derive(Debug)]
pub struct PatternRegistry {
    rules: BTreeMap<EntityType, Vec<Rule>>,
}

impl PatternRegistry {
    pub fn from_rule_set(set: &RuleSet) -> Result<Self> {
        let mut ids = HashSet::new();
        let mut rules: BTreeMap<EntityType, Vec<Rule>> = BTreeMap::new();

        for def in &set.rules {
            if !ids.insert(def.id.as_str()) {
                return Err(Error::InvalidRule {
                    rule: def.id.clone(),
                    reason: "duplicate rule id".into(),
                });
            }
            let rule = Rule::compile(def)?;
            rules.entry(rule.entity_type).or_default().push(rule);
        }

        Ok(Self { rules })
    }

    pub fn builtin() -> Result<Self> {
        Self::from_rule_set(&RuleSet::default())
    }

    /// Rules for one type, most specific first.
    #[must_use]
    pub fn rules_for(&self, entity_type: EntityType) -> &[Rule] {
        self.rules.get(&entity_type).map_or(&[], Vec::as_slice)
    }

    /// Types that have at least one rule, in registry order.
    pub fn entity_types(&self) -> impl Iterator<Item = EntityType> + '_ {
        self.rules.keys().copied()
    }

    /// Whether some rule yields a usable candidate anywhere in `text`.
    #[must_use]
    pub fn recognizes(&self, text: &str) -> bool {
        self.rules.values().flatten().any(|rule| {
            rule.regex
                .captures_iter(text)
                .any(|caps| rule.candidate(&caps).is_ok())
        })
    }

    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }
}

static HEX_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b0[xX]([0-9A-Fa-f]+)\b").expect("static regex"));

static HEX_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0[xX][0-9A-Fa-f]+$").expect("static regex"));

static BIT_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)(?::(\d+))?$").expect("static regex"));

#[must_use]
pub fn normalize_hex(text: &str) -> String {
    HEX_LITERAL
        .replace_all(text, |caps: &Captures<'_>| {
            format!("0x{}", caps[1].to_ascii_uppercase())
        })
        .into_owned()
}

#[must_use]
pub fn units_for(entity_type: EntityType) -> &'static [&'static str] {
    match entity_type {
        EntityType::Voltage => &["V", "mV"],
        EntityType::Timing => &["ns", "us", "µs", "μs", "ms", "s"],
        EntityType::Frequency => &["Hz", "kHz", "KHz", "MHz", "GHz"],
        EntityType::Current => &["A", "mA", "uA", "µA", "μA"],
        _ => &[],
    }
}

fn check_candidate(entity_type: EntityType, c: &mut Candidate) -> std::result::Result<(), String> {
    match entity_type {
        EntityType::Pin => {
            if !c.name.chars().any(|ch| ch.is_ascii_digit()) {
                return Err("pin name has no number".into());
            }
            if c.value.chars().all(|ch| !ch.is_uppercase()) {
                return Err("pin signal is a plain word".into());
            }
        }
        EntityType::Register => {
            if !HEX_ONLY.is_match(&c.value) {
                return Err(format!("address {:?} is not a hex literal", c.value));
            }
            c.value = normalize_hex(&c.value);
            c.name = normalize_hex(&c.name);
            if let Some(reset) = c.attributes.get_mut("reset") {
                *reset = normalize_hex(reset);
            }
        }
        EntityType::Voltage | EntityType::Timing | EntityType::Frequency | EntityType::Current => {
            let nominal = c
                .attributes
                .get("nominal")
                .ok_or("measurement has no numeric component")?;
            if nominal.parse::<f64>().is_err() {
                return Err(format!("{nominal:?} is not a number"));
            }
            let unit = c.attributes.get("unit").ok_or("measurement has no unit")?;
            if !units_for(entity_type).contains(&unit.as_str()) {
                return Err(format!("unit {unit:?} does not fit a {entity_type}"));
            }
        }
        EntityType::BitField => {
            let range = c.attributes.get("bit_range").ok_or("bit field has no range")?;
            let caps = BIT_RANGE
                .captures(range)
                .ok_or_else(|| format!("bit range {range:?} is not numeric"))?;
            let high: u32 = caps[1].parse().map_err(|_| "bit index overflow")?;
            let normalized = match caps.get(2) {
                Some(low) => {
                    let low: u32 = low.as_str().parse().map_err(|_| "bit index overflow")?;
                    let (hi, lo) = if high >= low { (high, low) } else { (low, high) };
                    format!("{hi}:{lo}")
                }
                None => high.to_string(),
            };
            c.value = format!("[{normalized}]");
            c.attributes.insert("bit_range".into(), normalized);
        }
        EntityType::ErrorCode => {
            let code = c.attributes.get_mut("code").ok_or("error code has no code")?;
            *code = normalize_hex(code);
            c.name = normalize_hex(&c.name);
        }
        EntityType::Procedure => {
            if c.value.split_whitespace().count() < 2 {
                return Err("procedure step is a single word".into());
            }
        }
        EntityType::Table => return Err("tables are not rule-produced".into()),
    }
    Ok(())
}

fn rule(
    id: &str,
    entity_type: EntityType,
    pattern: &str,
    name: &str,
    value: &str,
    attributes: &[(&str, &str)],
) -> RuleDef {
    RuleDef {
        id: id.to_string(),
        entity_type,
        pattern: pattern.to_string(),
        name: name.to_string(),
        value: value.to_string(),
        attributes: attributes
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
    }
}

/// The built-in rule set, most specific rule first within each type.
#[must_use]
pub fn default_rules() -> Vec<RuleDef> {
    let mut rules = Vec::new();
    rules.extend(pin_rules());
    rules.extend(register_rules());
    rules.extend(voltage_rules());
    rules.extend(timing_rules());
    rules.extend(frequency_rules());
    rules.extend(current_rules());
    rules.extend(bit_field_rules());
    rules.extend(error_code_rules());
    rules.extend(procedure_rules());
    rules
}

const SIGNAL: &str = r"(?P<signal>[A-Z][A-Z0-9_]*[+#-]?)";
const MAGNITUDE: &str = r"(?P<nominal>\d+(?:\.\d+)?)";
const TOLERANCE: &str = r"(?:\s*(?:±|\+/-|\+-)\s*(?P<tolerance>\d+(?:\.\d+)?)\s*%)?";
const HEX: &str = r"0[xX][0-9A-Fa-f]+";

fn pin_rules() -> Vec<RuleDef> {
    use EntityType::Pin;
    vec![
        rule(
            "pin_signal_description",
            Pin,
            &format!(
                r"\b[Pp]in\s+(?P<pin>[A-Z]?\d+)\s*[:=]\s*{SIGNAL}[ \t]+[-–][ \t]+(?P<description>[^\n]+)"
            ),
            "Pin {pin}",
            "{signal}",
            &[("description", "{description}")],
        ),
        rule(
            "pin_signal",
            Pin,
            &format!(
                r"(?m)\b[Pp]in\s+(?P<pin>[A-Z]?\d+)\s*[:=]\s*{SIGNAL}(?:[ \t]+(?P<description>[^\n]+))?[ \t]*$"
            ),
            "Pin {pin}",
            "{signal}",
            &[("description", "{description}")],
        ),
        rule(
            "signal_on_pin",
            Pin,
            &format!(r"\b{SIGNAL}\s+(?:is\s+)?on\s+[Pp]in\s+(?P<pin>[A-Z]?\d+)\b"),
            "Pin {pin}",
            "{signal}",
            &[],
        ),
    ]
}

fn register_rules() -> Vec<RuleDef> {
    use EntityType::Register;
    let reset = format!(
        r"(?:[ \t]*[,;(]?[ \t]*(?:[Rr]eset|[Dd]efault)(?:[ \t]+value)?[ \t]*[=:]?[ \t]*(?P<reset>{HEX}))?"
    );
    vec![
        rule(
            "register_suffixed_name",
            Register,
            &format!(
                r"\b(?P<register>[A-Z][A-Z0-9_]*_(?:REG|CTRL|CFG|CONF|CONFIG|STAT|STATUS|CR|SR|DR|MASK))\s*(?:[=:@]|at)\s*(?P<address>{HEX})\b{reset}"
            ),
            "{register}",
            "{address}",
            &[("reset", "{reset}")],
        ),
        rule(
            "register_keyword",
            Register,
            &format!(
                r"\b(?P<register>[A-Z][A-Z0-9_]+)\s+[Rr]egister\s*(?:\(\s*(?P<width>\d+)-bit\s*\)\s*)?(?:at\s+(?:address\s+|offset\s+)?|[=:@]\s*)(?P<address>{HEX})\b{reset}"
            ),
            "{register}",
            "{address}",
            &[("reset", "{reset}"), ("width", "{width}")],
        ),
        rule(
            "register_parenthesized",
            Register,
            &format!(r"\b[Rr]egister\s+(?P<register>[A-Z][A-Z0-9_]+)\s*\(\s*(?P<address>{HEX})\s*\)"),
            "{register}",
            "{address}",
            &[],
        ),
        rule(
            "register_assignment",
            Register,
            &format!(r"\b(?P<register>[A-Z][A-Z0-9_]{{2,}})\s*[=:]\s*(?P<address>{HEX})\b{reset}"),
            "{register}",
            "{address}",
            &[("reset", "{reset}")],
        ),
        rule(
            "register_bare_address",
            Register,
            &format!(r"\b[Rr]egister\s+(?:at\s+)?(?P<address>{HEX})\b"),
            "Register {address}",
            "{address}",
            &[],
        ),
    ]
}

fn measurement_attrs() -> [(&'static str, &'static str); 3] {
    [
        ("unit", "{unit}"),
        ("nominal", "{nominal}"),
        ("tolerance", "±{tolerance}%"),
    ]
}

fn voltage_rules() -> Vec<RuleDef> {
    use EntityType::Voltage;
    let unit = r"\s*(?P<unit>mV|V)\b";
    vec![
        rule(
            "voltage_rail_assignment",
            Voltage,
            &format!(r"\b(?P<rail>[A-Z][A-Z0-9_]+)\s*[=:]\s*{MAGNITUDE}{unit}{TOLERANCE}"),
            "{rail}",
            "{nominal}{unit}",
            &measurement_attrs(),
        ),
        rule(
            "voltage_rail_keyword",
            Voltage,
            &format!(
                r"\b(?P<rail>[A-Z][A-Z0-9_]+)\s+(?:[Vv]oltage|[Rr]ail|[Ss]upply)\s*(?:is\s+|of\s+|[=:]\s*)?{MAGNITUDE}{unit}{TOLERANCE}"
            ),
            "{rail}",
            "{nominal}{unit}",
            &measurement_attrs(),
        ),
        rule(
            "voltage_requirement",
            Voltage,
            &format!(
                r"\b(?P<rail>[A-Z][A-Z0-9_]+)\s+(?:requires|operates\s+at|runs\s+at)\s+{MAGNITUDE}{unit}{TOLERANCE}"
            ),
            "{rail}",
            "{nominal}{unit}",
            &measurement_attrs(),
        ),
        rule(
            "voltage_parenthesized",
            Voltage,
            &format!(r"\b(?P<rail>[A-Z][A-Z0-9_]+)\s*\(\s*{MAGNITUDE}{unit}{TOLERANCE}\s*\)"),
            "{rail}",
            "{nominal}{unit}",
            &measurement_attrs(),
        ),
    ]
}

fn timing_rules() -> Vec<RuleDef> {
    use EntityType::Timing;
    let unit = r"\s*(?P<unit>ns|us|µs|μs|ms|s)\b";
    let attrs = [("unit", "{unit}"), ("nominal", "{nominal}")];
    vec![
        rule(
            "timing_labeled",
            Timing,
            &format!(
                r"\b(?P<label>(?:[A-Za-z]+[ \t]+){{1,3}}(?:time|delay|period|width|latency))\s*[=:]\s*{MAGNITUDE}{unit}"
            ),
            "{label}",
            "{nominal}{unit}",
            &attrs,
        ),
        rule(
            "timing_value_first",
            Timing,
            &format!(
                r"\b{MAGNITUDE}\s*(?P<unit>ns|us|µs|μs|ms)[ \t]+(?P<label>(?:[a-z]+[ \t]+)?(?:setup|hold|rise|fall|access|cycle|settling|propagation|reset|startup|response)[ \t]+time)\b"
            ),
            "{label}",
            "{nominal}{unit}",
            &attrs,
        ),
        rule(
            "timing_symbol",
            Timing,
            &format!(r"\b(?P<label>t[A-Z][A-Z0-9]{{0,5}})\s*[=:]\s*{MAGNITUDE}{unit}"),
            "{label}",
            "{nominal}{unit}",
            &attrs,
        ),
        rule(
            "timing_keyword",
            Timing,
            &format!(r"\b(?P<label>[Dd]elay|[Tt]iming|[Ll]atency|[Pp]eriod)\s*[=:]\s*{MAGNITUDE}{unit}"),
            "{label}",
            "{nominal}{unit}",
            &attrs,
        ),
    ]
}

fn frequency_rules() -> Vec<RuleDef> {
    use EntityType::Frequency;
    let unit = r"\s*(?P<unit>[kKMG]?Hz)\b";
    let attrs = [("unit", "{unit}"), ("nominal", "{nominal}")];
    vec![
        rule(
            "frequency_labeled",
            Frequency,
            &format!(
                r"\b(?P<label>(?:[A-Za-z_]+[ \t]+){{0,2}}(?:[Cc]lock|[Ff]requency|[Ff]req))\s*[=:]\s*{MAGNITUDE}{unit}"
            ),
            "{label}",
            "{nominal}{unit}",
            &attrs,
        ),
        rule(
            "frequency_clock_signal",
            Frequency,
            &format!(
                r"\b(?P<label>[A-Z][A-Z0-9_]*(?:CLK|OSC|FREQ)[A-Z0-9_]*)\s*[=:]\s*{MAGNITUDE}{unit}"
            ),
            "{label}",
            "{nominal}{unit}",
            &attrs,
        ),
        rule(
            "frequency_value_first",
            Frequency,
            &format!(
                r"\b{MAGNITUDE}\s*(?P<unit>[kKMG]?Hz)[ \t]+(?P<label>(?:[a-z]+[ \t]+)?(?:clock|oscillator|crystal))\b"
            ),
            "{label}",
            "{nominal}{unit}",
            &attrs,
        ),
    ]
}

fn current_rules() -> Vec<RuleDef> {
    use EntityType::Current;
    let unit = r"\s*(?P<unit>mA|µA|μA|uA|A)\b";
    vec![
        rule(
            "current_labeled",
            Current,
            &format!(
                r"\b(?P<label>(?:[Mm]aximum|[Mm]ax|[Tt]ypical|[Tt]yp|[Mm]inimum|[Mm]in|[Ii]dle|[Pp]eak|[Ss]upply|[Ss]tandby|[Oo]perating|[Ss]leep)[ \t]+current)\s*[=:]?\s*{MAGNITUDE}{unit}{TOLERANCE}"
            ),
            "{label}",
            "{nominal}{unit}",
            &measurement_attrs(),
        ),
        rule(
            "current_symbol",
            Current,
            &format!(r"\b(?P<label>I[A-Z][A-Z0-9_]*)\s*[=:]\s*{MAGNITUDE}{unit}{TOLERANCE}"),
            "{label}",
            "{nominal}{unit}",
            &measurement_attrs(),
        ),
    ]
}

fn bit_field_rules() -> Vec<RuleDef> {
    use EntityType::BitField;
    let register = r"(?:[ \t]+(?:of|in)[ \t]+(?P<register>[A-Z][A-Z0-9_]+))?";
    let field = r"(?P<field>[A-Z][A-Z0-9_]*)";
    let description = r"(?:[ \t]+[-–][ \t]+(?P<description>[^\n]+))?";
    let range_attrs = [
        ("bit_range", "{high}:{low}"),
        ("register", "{register}"),
        ("description", "{description}"),
    ];
    vec![
        rule(
            "bit_field_bracketed_range",
            BitField,
            &format!(
                r"\b[Bb]its?\s*\[\s*(?P<high>\d+)\s*:\s*(?P<low>\d+)\s*\]{register}\s*[=:]\s*{field}{description}"
            ),
            "{field}",
            "[{high}:{low}]",
            &range_attrs,
        ),
        rule(
            "bit_field_state",
            BitField,
            &format!(
                r"\b[Bb]it\s+(?P<bit>\d+){register}\s*[=:]\s*(?P<active_state>[01])\s*[=:]\s*{field}{description}"
            ),
            "{field}",
            "[{bit}]",
            &[
                ("bit_range", "{bit}"),
                ("register", "{register}"),
                ("description", "{description}"),
                ("active_state", "{active_state}"),
            ],
        ),
        rule(
            "bit_field_dashed_range",
            BitField,
            &format!(
                r"\b[Bb]its\s+(?P<high>\d+)\s*[-–]\s*(?P<low>\d+){register}\s*[=:]\s*{field}{description}"
            ),
            "{field}",
            "[{high}:{low}]",
            &range_attrs,
        ),
        rule(
            "bit_field_single",
            BitField,
            &format!(r"\b[Bb]it\s*\[?\s*(?P<bit>\d+)\s*\]?{register}\s*[=:]\s*{field}{description}"),
            "{field}",
            "[{bit}]",
            &[
                ("bit_range", "{bit}"),
                ("register", "{register}"),
                ("description", "{description}"),
            ],
        ),
    ]
}

fn error_code_rules() -> Vec<RuleDef> {
    use EntityType::ErrorCode;
    vec![
        rule(
            "error_code_described",
            ErrorCode,
            &format!(
                r"\b[Ee]rror\s+(?:[Cc]ode\s+)?(?P<code>{HEX}|\d+)\s*[=:\-–]\s*(?P<message>[^\n]+)"
            ),
            "Error {code}",
            "{message}",
            &[("code", "{code}")],
        ),
        rule(
            "error_code_symbol",
            ErrorCode,
            &format!(
                r"\b(?P<code>{HEX})\s*[=:]\s*(?P<message>[A-Z][A-Z0-9_]*_(?:ERROR|ERR|FAULT|FAIL|FAILURE|TIMEOUT))\b"
            ),
            "Error {code}",
            "{message}",
            &[("code", "{code}")],
        ),
        rule(
            "error_code_prefixed",
            ErrorCode,
            r"(?m)^[ \t]*(?P<code>E\d{2,4})\s*[=:\-–]\s*(?P<message>[^\n]+)",
            "Error {code}",
            "{message}",
            &[("code", "{code}")],
        ),
    ]
}

fn procedure_rules() -> Vec<RuleDef> {
    use EntityType::Procedure;
    vec![
        rule(
            "procedure_step",
            Procedure,
            r"(?m)^[ \t]*[Ss]tep\s+(?P<step>\d+)\s*[:.)\-–]\s*(?P<action>[^\n]+)",
            "Step {step}",
            "{action}",
            &[("step", "{step}")],
        ),
        rule(
            "procedure_numbered_sentence",
            Procedure,
            r"(?m)^[ \t]*(?P<step>\d{1,2})[.)][ \t]+(?P<action>[A-Z][^\n]*[.!])[ \t]*$",
            "Step {step}",
            "{action}",
            &[("step", "{step}")],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_candidate(registry: &PatternRegistry, ty: EntityType, text: &str) -> Option<Candidate> {
        registry.rules_for(ty).iter().find_map(|rule| {
            rule.regex
                .captures(text)
                .and_then(|caps| rule.candidate(&caps).ok())
        })
    }

    #[test]
    fn test_builtin_rules_compile() {
        let registry = PatternRegistry::builtin().unwrap();
        assert_eq!(registry.rule_count(), default_rules().len());
        assert!(registry.rules_for(EntityType::Table).is_empty());
        let types: Vec<_> = registry.entity_types().collect();
        assert_eq!(types.first(), Some(&EntityType::Pin));
        assert_eq!(types.last(), Some(&EntityType::Procedure));
    }

    #[test]
    fn test_pin_rule_captures_description() {
        let registry = PatternRegistry::builtin().unwrap();
        let c = first_candidate(
            &registry,
            EntityType::Pin,
            "Pin 7: GPIO_12 - General Purpose Input/Output",
        )
        .unwrap();
        assert_eq!(c.name, "Pin 7");
        assert_eq!(c.value, "GPIO_12");
        assert_eq!(
            c.attributes.get("description").map(String::as_str),
            Some("General Purpose Input/Output")
        );
    }

    #[test]
    fn test_voltage_tolerance_is_optional() {
        let registry = PatternRegistry::builtin().unwrap();
        let c = first_candidate(&registry, EntityType::Voltage, "VDD_CORE = 1.8V ± 5%").unwrap();
        assert_eq!(c.name, "VDD_CORE");
        assert_eq!(c.value, "1.8V");
        assert_eq!(c.attributes.get("tolerance").map(String::as_str), Some("±5%"));

        let c = first_candidate(&registry, EntityType::Voltage, "VDD_IO = 3.3V").unwrap();
        assert!(!c.attributes.contains_key("tolerance"));
        assert_eq!(c.attributes.get("nominal").map(String::as_str), Some("3.3"));
    }

    #[test]
    fn test_register_address_is_normalized() {
        let registry = PatternRegistry::builtin().unwrap();
        let c = first_candidate(&registry, EntityType::Register, "CONTROL_REG = 0x1a2f").unwrap();
        assert_eq!(c.name, "CONTROL_REG");
        assert_eq!(c.value, "0x1A2F");

        let c = first_candidate(&registry, EntityType::Register, "register at 0xff").unwrap();
        assert_eq!(c.name, "Register 0xFF");
    }

    #[test]
    fn test_bit_range_is_normalized() {
        let registry = PatternRegistry::builtin().unwrap();
        let c = first_candidate(&registry, EntityType::BitField, "Bits [4:7] of CTRL_REG: MODE").unwrap();
        assert_eq!(c.name, "MODE");
        assert_eq!(c.value, "[7:4]");
        assert_eq!(c.attributes.get("register").map(String::as_str), Some("CTRL_REG"));
    }

    #[test]
    fn test_measurement_sanity_checks() {
        let mut c = Candidate {
            name: "VDD".into(),
            value: "x".into(),
            attributes: BTreeMap::from([("unit".to_string(), "V".to_string())]),
        };
        assert!(check_candidate(EntityType::Voltage, &mut c).is_err());

        c.attributes.insert("nominal".into(), "1.2".into());
        c.attributes.insert("unit".into(), "MHz".into());
        assert!(check_candidate(EntityType::Voltage, &mut c).is_err());

        c.attributes.insert("unit".into(), "mV".into());
        assert!(check_candidate(EntityType::Voltage, &mut c).is_ok());
    }

    #[test]
    fn test_rule_set_validation() {
        let mut set = RuleSet {
            rules: vec![rule("p", EntityType::Pin, r"Pin (?P<pin>\d+)", "Pin {pin}", "{signal}", &[])],
        };
        assert!(matches!(
            PatternRegistry::from_rule_set(&set),
            Err(Error::UnknownCaptureGroup { .. })
        ));

        set.rules[0].pattern = r"Pin (?P<pin>\d+".into();
        assert!(matches!(
            PatternRegistry::from_rule_set(&set),
            Err(Error::InvalidPattern { .. })
        ));

        set.rules[0] = rule("t", EntityType::Table, r"(?P<x>x)", "{x}", "{x}", &[]);
        assert!(matches!(
            PatternRegistry::from_rule_set(&set),
            Err(Error::InvalidRule { .. })
        ));

        let dup = rule("same", EntityType::Pin, r"(?P<x>x)", "{x}", "{x}", &[]);
        set.rules = vec![dup.clone(), dup];
        assert!(matches!(
            PatternRegistry::from_rule_set(&set),
            Err(Error::InvalidRule { .. })
        ));
    }

    #[test]
    fn test_rule_set_json_round_trip() {
        let set = RuleSet::default();
        let json = set.to_json_pretty().unwrap();
        let parsed = RuleSet::from_json(&json).unwrap();
        assert_eq!(parsed, set);
    }
}
