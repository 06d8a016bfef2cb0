//! Final dataset: ordered, de-duplicated pairs plus run statistics.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{EntityType, TableKind};
use crate::error::RejectionKind;
use crate::ingest::ChunkOutput;
use crate::qa::{Category, Difficulty, QaPair};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub chunks: usize,
    /// Chunks that yielded no entities.
    pub empty_chunks: usize,
    pub total_entities: usize,
    pub entities_by_type: BTreeMap<EntityType, usize>,
    pub total_tables: usize,
    pub tables_by_kind: BTreeMap<TableKind, usize>,
    pub total_qa_pairs: usize,
    pub qa_by_category: BTreeMap<Category, usize>,
    pub qa_by_difficulty: BTreeMap<Difficulty, usize>,
    pub rejections: BTreeMap<RejectionKind, usize>,
    pub generated_at: DateTime<Utc>,
}

impl DatasetStats {
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunks: 0,
            empty_chunks: 0,
            total_entities: 0,
            entities_by_type: BTreeMap::new(),
            total_tables: 0,
            tables_by_kind: BTreeMap::new(),
            total_qa_pairs: 0,
            qa_by_category: BTreeMap::new(),
            qa_by_difficulty: BTreeMap::new(),
            rejections: BTreeMap::new(),
            generated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn rejected(&self, kind: RejectionKind) -> usize {
        self.rejections.get(&kind).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_rejected(&self) -> usize {
        self.rejections.values().sum()
    }
}

impl Default for DatasetStats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRecord<'a> {
    messages: [Message<'a>; 2],
}

impl<'a> From<&'a QaPair> for ChatRecord<'a> {
    fn from(pair: &'a QaPair) -> Self {
        Self {
            messages: [
                Message {
                    role: "user",
                    content: &pair.question,
                },
                Message {
                    role: "assistant",
                    content: &pair.answer,
                },
            ],
        }
    }
}

/// Collects chunk outputs in chunk order.
#[derive(Debug, Default)]
pub struct DatasetAssembler {
    pairs: Vec<QaPair>,
    seen: HashSet<String>,
    stats: DatasetStats,
}

impl DatasetAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one chunk's pairs. A pair whose key is already in the dataset is
    /// dropped and counted as a duplicate.
    pub fn add(&mut self, output: ChunkOutput) {
        let stats = &mut self.stats;
        stats.chunks += 1;
        if output.entities.is_empty() {
            stats.empty_chunks += 1;
        }
        for (ty, n) in &output.stats.entities_by_type {
            *stats.entities_by_type.entry(*ty).or_default() += n;
            stats.total_entities += n;
        }
        for (kind, n) in &output.stats.tables_by_kind {
            *stats.tables_by_kind.entry(*kind).or_default() += n;
            stats.total_tables += n;
        }
        for (kind, n) in &output.stats.rejections {
            *stats.rejections.entry(*kind).or_default() += n;
        }

        for pair in output.pairs {
            if !self.seen.insert(pair.dedup_key.clone()) {
                tracing::debug!(question = %pair.question, "dropping duplicate question");
                *stats
                    .rejections
                    .entry(RejectionKind::DuplicateQuestion)
                    .or_default() += 1;
                continue;
            }
            *stats.qa_by_category.entry(pair.category).or_default() += 1;
            *stats.qa_by_difficulty.entry(pair.difficulty).or_default() += 1;
            stats.total_qa_pairs += 1;
            self.pairs.push(pair);
        }
    }

    #[must_use]
    pub fn pairs(&self) -> &[QaPair] {
        &self.pairs
    }

    #[must_use]
    pub fn stats(&self) -> &DatasetStats {
        &self.stats
    }

    /// One `{"messages": [...]}` record per line.
    pub fn write_jsonl_to<W: Write>(&self, mut writer: W) -> Result<()> {
        for pair in &self.pairs {
            serde_json::to_writer(&mut writer, &ChatRecord::from(pair))?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_jsonl(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        self.write_jsonl_to(BufWriter::new(file))?;
        tracing::info!(path = %path.display(), pairs = self.pairs.len(), "wrote dataset");
        Ok(())
    }

    pub fn write_stats(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.stats)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "wrote statistics");
        Ok(())
    }

    /// Evenly spaced pairs for manual review, in readable form.
    pub fn write_samples(&self, path: &Path, count: usize) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        for (idx, pair) in self.sample(count).into_iter().enumerate() {
            writeln!(
                out,
                "Sample {} [{}, {}]",
                idx + 1,
                pair.category,
                pair.difficulty
            )?;
            writeln!(out, "Q: {}", pair.question)?;
            writeln!(out, "A: {}", pair.answer)?;
            writeln!(out)?;
        }
        out.flush()?;
        Ok(())
    }

    #[must_use]
    pub fn sample(&self, count: usize) -> Vec<&QaPair> {
        if count == 0 || self.pairs.is_empty() {
            return Vec::new();
        }
        let step = self.pairs.len().div_ceil(count).max(1);
        self.pairs.iter().step_by(step).take(count).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, SourceSpan};
    use crate::ingest::ChunkStats;

    fn output(chunk_id: usize, questions: &[&str]) -> ChunkOutput {
        let pairs: Vec<QaPair> = questions
            .iter()
            .map(|q| QaPair::new(*q, "answer", Category::Factual, vec![]))
            .collect();
        let mut stats = ChunkStats::new(chunk_id);
        stats.entities_by_type.insert(EntityType::Pin, 1);
        stats
            .pairs_by_category
            .insert(Category::Factual, pairs.len());
        ChunkOutput {
            chunk_id,
            entities: vec![Entity::new(
                EntityType::Pin,
                "Pin 1",
                "VBUS",
                SourceSpan::new(chunk_id, 0, 5),
            )],
            pairs,
            stats,
        }
    }

    #[test]
    fn test_cross_chunk_duplicates_dropped() {
        let mut assembler = DatasetAssembler::new();
        assembler.add(output(0, &["What is Pin 1?", "Which pin is VBUS?"]));
        assembler.add(output(1, &["what is  pin 1?", "What is Pin 2?"]));

        let questions: Vec<_> = assembler.pairs().iter().map(|p| p.question.as_str()).collect();
        assert_eq!(questions, vec!["What is Pin 1?", "Which pin is VBUS?", "What is Pin 2?"]);

        let stats = assembler.stats();
        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.total_entities, 2);
        assert_eq!(stats.total_qa_pairs, 3);
        assert_eq!(stats.qa_by_category.get(&Category::Factual), Some(&3));
        assert_eq!(stats.qa_by_difficulty.get(&Difficulty::Basic), Some(&3));
        assert_eq!(stats.rejected(RejectionKind::DuplicateQuestion), 1);
    }

    #[test]
    fn test_jsonl_shape() {
        let mut assembler = DatasetAssembler::new();
        assembler.add(output(0, &["What is Pin 1?", "Which pin is VBUS?"]));

        let mut buf = Vec::new();
        assembler.write_jsonl_to(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record["messages"][0]["role"], "user");
        assert_eq!(record["messages"][0]["content"], "What is Pin 1?");
        assert_eq!(record["messages"][1]["role"], "assistant");
        assert_eq!(record["messages"][1]["content"], "answer");
    }

    #[test]
    fn test_write_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut assembler = DatasetAssembler::new();
        assembler.add(output(0, &["What is Pin 1?"]));

        let stats_path = dir.path().join("stats.json");
        assembler.write_stats(&stats_path).unwrap();
        let stats: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&stats_path).unwrap()).unwrap();
        assert_eq!(stats["total_qa_pairs"], 1);
        assert_eq!(stats["entities_by_type"]["pin"], 1);
        assert_eq!(stats["qa_by_difficulty"]["basic"], 1);
        assert!(stats["generated_at"].is_string());

        let samples_path = dir.path().join("samples.txt");
        assembler.write_samples(&samples_path, 5).unwrap();
        let samples = std::fs::read_to_string(&samples_path).unwrap();
        assert!(samples.starts_with("Sample 1 [factual, basic]\nQ: What is Pin 1?"));
    }

    #[test]
    fn test_sample_is_evenly_spaced() {
        let mut assembler = DatasetAssembler::new();
        let questions: Vec<String> = (0..10).map(|i| format!("Question {i}?")).collect();
        let refs: Vec<&str> = questions.iter().map(String::as_str).collect();
        assembler.add(output(0, &refs));

        let picked: Vec<_> = assembler.sample(3).iter().map(|p| p.question.clone()).collect();
        assert_eq!(picked, vec!["Question 0?", "Question 4?", "Question 8?"]);
        assert!(assembler.sample(0).is_empty());
    }
}
