//! `{slot}` templates shared by extraction rules and question templates.
//!
//! A template is literal text with named slots. Filling fails when any slot
//! has no value or only whitespace, so callers can skip the template instead
//! of producing text with holes in it. `{{` and `}}` produce literal braces.

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

/// Name of the first slot that could not be filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingSlot(pub String);

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidTemplate {
            template: source.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut slot = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        slot.push(c);
                    }
                    if !closed {
                        return Err(invalid("unclosed slot"));
                    }
                    if slot.is_empty() {
                        return Err(invalid("empty slot name"));
                    }
                    if !slot
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
                    {
                        return Err(invalid(&format!("bad slot name '{slot}'")));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Slot(slot));
                }
                '}' => return Err(invalid("unmatched '}'")),
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Slot(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    #[must_use]
    pub fn uses_slot(&self, name: &str) -> bool {
        self.slots().any(|s| s == name)
    }

    pub fn fill<F>(&self, mut lookup: F) -> std::result::Result<String, MissingSlot>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(name) => {
                    let value = lookup(name.as_str())
                        .filter(|v| !v.trim().is_empty())
                        .ok_or_else(|| MissingSlot(name.clone()))?;
                    out.push_str(value.trim());
                }
            }
        }
        Ok(out.trim().to_string())
    }
}

/// Collapses every whitespace run (newlines included) into one space.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(key: &str) -> Option<String> {
        match key {
            "name" => Some("Pin 7".into()),
            "value" => Some("GPIO_12".into()),
            "blank" => Some("   ".into()),
            _ => None,
        }
    }

    #[test]
    fn test_fill_all_slots() {
        let t = Template::parse("What is the function of {name}? {value}").unwrap();
        assert_eq!(t.fill(lookup).unwrap(), "What is the function of Pin 7? GPIO_12");
    }

    #[test]
    fn test_missing_and_blank_slots_fail() {
        let t = Template::parse("{name} has {description}").unwrap();
        assert_eq!(t.fill(lookup), Err(MissingSlot("description".into())));

        let t = Template::parse("{name}: {blank}").unwrap();
        assert_eq!(t.fill(lookup), Err(MissingSlot("blank".into())));
    }

    #[test]
    fn test_escaped_braces() {
        let t = Template::parse("{{literal}} {name}").unwrap();
        assert_eq!(t.fill(lookup).unwrap(), "{literal} Pin 7");
        assert_eq!(t.slots().collect::<Vec<_>>(), vec!["name"]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Template::parse("{name").is_err());
        assert!(Template::parse("name}").is_err());
        assert!(Template::parse("{}").is_err());
        assert!(Template::parse("{bad slot}").is_err());
    }

    #[test]
    fn test_slot_queries() {
        let t = Template::parse("{row.key} {row.cell} {a.name}").unwrap();
        assert!(t.uses_slot("row.cell"));
        assert!(t.uses_slot("a.name"));
        assert!(!t.uses_slot("name"));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  c "), "a b c");
    }
}
