use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ocrqa_core::ingest::{OcrCleaner, DEFAULT_CHUNK_SIZE};
use ocrqa_core::{
    ChunkProcessor, DatasetPipeline, GeneratorConfig, PatternRegistry, QuestionLedger, RuleSet,
    TemplateSet,
};
use serde::{Deserialize, Serialize};

/// Run settings, loaded from a JSON file with every field optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    /// Run the OCR cleaner before chunking.
    pub clean: bool,
    pub remove_compliance: bool,
    pub parallel: bool,
    pub generator: GeneratorConfig,
    /// Pattern rule file; built-in rules when absent.
    pub rules: Option<PathBuf>,
    /// Template file; built-in templates when absent.
    pub templates: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            clean: true,
            remove_compliance: true,
            parallel: false,
            generator: GeneratorConfig::default(),
            rules: None,
            templates: None,
        }
    }
}

impl PipelineConfig {
    /// Relative rule and template paths resolve against the config file's
    /// directory.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: Self = serde_json::from_str(&json)
            .with_context(|| format!("invalid config {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.rules = config.rules.map(|p| base.join(p));
        config.templates = config.templates.map(|p| base.join(p));
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    pub fn registry(&self) -> Result<PatternRegistry> {
        let Some(path) = &self.rules else {
            return Ok(PatternRegistry::builtin()?);
        };
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read rules {}", path.display()))?;
        let set = RuleSet::from_json(&json)
            .with_context(|| format!("invalid rules {}", path.display()))?;
        PatternRegistry::from_rule_set(&set)
            .with_context(|| format!("invalid rules {}", path.display()))
    }

    pub fn templates(&self) -> Result<TemplateSet> {
        let Some(path) = &self.templates else {
            return Ok(TemplateSet::builtin()?);
        };
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read templates {}", path.display()))?;
        TemplateSet::from_json(&json)
            .with_context(|| format!("invalid templates {}", path.display()))
    }

    pub fn cleaner(&self) -> Option<OcrCleaner> {
        self.clean
            .then(|| OcrCleaner::new().with_compliance_removal(self.remove_compliance))
    }

    pub fn pipeline(&self) -> Result<DatasetPipeline> {
        let processor = ChunkProcessor::new(
            self.registry()?.into(),
            self.templates()?.into(),
            QuestionLedger::new().into(),
        )
        .with_generator_config(self.generator.clone());

        Ok(DatasetPipeline::new(processor)
            .with_cleaner(self.cleaner())
            .with_chunk_size(self.chunk_size)
            .with_parallel(self.parallel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"chunk_size": 50}"#).unwrap();
        assert_eq!(config.chunk_size, 50);
        assert!(config.clean);
        assert!(!config.parallel);
        assert_eq!(config.generator, GeneratorConfig::default());
    }

    #[test]
    fn test_paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ocrqa.json");
        std::fs::write(&path, r#"{"rules": "rules.json"}"#).unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.rules, Some(dir.path().join("rules.json")));
        assert!(config.templates.is_none());
    }

    #[test]
    fn test_missing_rules_file_is_an_error() {
        let config = PipelineConfig {
            rules: Some(PathBuf::from("/nonexistent/rules.json")),
            ..PipelineConfig::default()
        };
        let err = config.registry().unwrap_err();
        assert!(err.to_string().contains("failed to read rules"));
    }

    #[test]
    fn test_cleaner_toggle() {
        let config = PipelineConfig {
            clean: false,
            ..PipelineConfig::default()
        };
        assert!(config.cleaner().is_none());
        assert!(PipelineConfig::default().cleaner().is_some());
    }
}
