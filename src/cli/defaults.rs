use anyhow::Result;
use ocrqa_core::{RuleSet, TemplateConfig};

use super::DefaultsKind;
use crate::config::PipelineConfig;

pub fn run(what: DefaultsKind) -> Result<()> {
    println!("{}", render(what)?);
    Ok(())
}

/// Built-in configuration, ready to be edited and passed back in.
pub fn render(what: DefaultsKind) -> Result<String> {
    let json = match what {
        DefaultsKind::Patterns => RuleSet::default().to_json_pretty()?,
        DefaultsKind::Templates => TemplateConfig::default().to_json_pretty()?,
        DefaultsKind::Config => serde_json::to_string_pretty(&PipelineConfig::default())?,
    };
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocrqa_core::{PatternRegistry, TemplateSet};

    #[test]
    fn test_rendered_defaults_load_back() {
        let rules = RuleSet::from_json(&render(DefaultsKind::Patterns).unwrap()).unwrap();
        assert_eq!(rules, RuleSet::default());
        assert!(PatternRegistry::from_rule_set(&rules).is_ok());

        let templates = render(DefaultsKind::Templates).unwrap();
        assert!(TemplateSet::from_json(&templates).is_ok());

        let config: PipelineConfig =
            serde_json::from_str(&render(DefaultsKind::Config).unwrap()).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }
}
