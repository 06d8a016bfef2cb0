use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::chunker::Chunker;
use super::cleaner::OcrCleaner;
use super::extractor::{EntityExtractor, ExtractionOutput};
use super::registry::PatternRegistry;
use super::table::TableReconstructor;
use crate::chunk::Chunk;
use crate::dataset::DatasetAssembler;
use crate::entity::{Entity, EntityType, TableKind};
use crate::error::{Rejection, RejectionKind};
use crate::qa::{Category, GeneratorConfig, QaGenerator, QaPair, QuestionLedger, TemplateSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkStats {
    pub chunk_id: usize,
    pub entities_by_type: BTreeMap<EntityType, usize>,
    pub tables_by_kind: BTreeMap<TableKind, usize>,
    pub pairs_by_category: BTreeMap<Category, usize>,
    pub rejections: BTreeMap<RejectionKind, usize>,
}

impl ChunkStats {
    #[must_use]
    pub fn new(chunk_id: usize) -> Self {
        Self {
            chunk_id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn total_entities(&self) -> usize {
        self.entities_by_type.values().sum()
    }

    #[must_use]
    pub fn total_tables(&self) -> usize {
        self.tables_by_kind.values().sum()
    }

    #[must_use]
    pub fn total_pairs(&self) -> usize {
        self.pairs_by_category.values().sum()
    }

    #[must_use]
    pub fn rejected(&self, kind: RejectionKind) -> usize {
        self.rejections.get(&kind).copied().unwrap_or(0)
    }

    fn count_entities(&mut self, entities: &[Entity]) {
        for entity in entities {
            *self.entities_by_type.entry(entity.entity_type).or_default() += 1;
            if entity.entity_type == EntityType::Table {
                let kind = entity
                    .attribute("kind")
                    .and_then(|k| k.parse().ok())
                    .unwrap_or(TableKind::Generic);
                *self.tables_by_kind.entry(kind).or_default() += 1;
            }
        }
    }

    fn count_pairs(&mut self, pairs: &[QaPair]) {
        for pair in pairs {
            *self.pairs_by_category.entry(pair.category).or_default() += 1;
        }
    }

    fn count_rejections(&mut self, rejections: &[Rejection]) {
        for rejection in rejections {
            *self.rejections.entry(rejection.kind()).or_default() += 1;
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChunkOutput {
    pub chunk_id: usize,
    pub entities: Vec<Entity>,
    pub pairs: Vec<QaPair>,
    pub stats: ChunkStats,
}

/// Table reconstruction, entity extraction and Q&A generation for one chunk.
pub struct ChunkProcessor {
    reconstructor: TableReconstructor,
    extractor: EntityExtractor,
    generator: QaGenerator,
}

impl ChunkProcessor {
    #[must_use]
    pub fn new(
        registry: Arc<PatternRegistry>,
        templates: Arc<TemplateSet>,
        ledger: Arc<QuestionLedger>,
    ) -> Self {
        Self {
            reconstructor: TableReconstructor::new().with_registry(Arc::clone(&registry)),
            extractor: EntityExtractor::new(registry),
            generator: QaGenerator::new(templates, ledger),
        }
    }

    /// Processor with the built-in rules and templates and a fresh ledger.
    pub fn builtin() -> crate::Result<Self> {
        Ok(Self::new(
            Arc::new(PatternRegistry::builtin()?),
            Arc::new(TemplateSet::builtin()?),
            Arc::new(QuestionLedger::new()),
        ))
    }

    #[must_use]
    pub fn with_generator_config(mut self, config: GeneratorConfig) -> Self {
        self.generator = self.generator.with_config(config);
        self
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<QuestionLedger> {
        self.generator.ledger()
    }

    /// Tables first, then rule matches outside them. Pure, safe to run on
    /// many chunks at once.
    #[must_use]
    pub fn extract(&self, chunk: &Chunk) -> ExtractionOutput {
        let tables = self.reconstructor.reconstruct(chunk);
        let mut output = self.extractor.extract(chunk, &tables);
        output.rejections.splice(0..0, tables.rejections);
        output
    }

    /// Generates pairs for an extracted chunk. Claims questions in the
    /// shared ledger, so calls must happen in chunk order.
    #[must_use]
    pub fn generate(&self, chunk_id: usize, extraction: ExtractionOutput) -> ChunkOutput {
        let generation = self.generator.generate(&extraction.entities);

        let mut stats = ChunkStats::new(chunk_id);
        stats.count_entities(&extraction.entities);
        stats.count_pairs(&generation.pairs);
        stats.count_rejections(&extraction.rejections);
        stats.count_rejections(&generation.rejections);

        tracing::debug!(
            chunk = chunk_id,
            entities = extraction.entities.len(),
            tables = stats.total_tables(),
            pairs = generation.pairs.len(),
            rejected = extraction.rejections.len() + generation.rejections.len(),
            "processed chunk"
        );

        ChunkOutput {
            chunk_id,
            entities: extraction.entities,
            pairs: generation.pairs,
            stats,
        }
    }

    #[must_use]
    pub fn process(&self, chunk: &Chunk) -> ChunkOutput {
        if chunk.is_blank() {
            tracing::warn!(chunk = chunk.id, "chunk has no text");
        }
        self.generate(chunk.id, self.extract(chunk))
    }
}

/// Raw OCR text to assembled dataset: clean, chunk, process, assemble.
pub struct DatasetPipeline {
    cleaner: Option<OcrCleaner>,
    chunker: Chunker,
    processor: ChunkProcessor,
    parallel: bool,
}

impl DatasetPipeline {
    #[must_use]
    pub fn new(processor: ChunkProcessor) -> Self {
        Self {
            cleaner: Some(OcrCleaner::new()),
            chunker: Chunker::default(),
            processor,
            parallel: false,
        }
    }

    #[must_use]
    pub fn with_cleaner(mut self, cleaner: Option<OcrCleaner>) -> Self {
        self.cleaner = cleaner;
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunker = Chunker::new(chunk_size);
        self
    }

    /// Extract on the rayon pool; generation still runs in chunk order.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    #[must_use]
    pub fn processor(&self) -> &ChunkProcessor {
        &self.processor
    }

    #[must_use]
    pub fn chunks(&self, raw_text: &str) -> Vec<Chunk> {
        match &self.cleaner {
            Some(cleaner) => self.chunker.split(&cleaner.clean(raw_text)),
            None => self.chunker.split(raw_text),
        }
    }

    #[must_use]
    pub fn process_chunks(&self, chunks: &[Chunk]) -> Vec<ChunkOutput> {
        let extractions: Vec<ExtractionOutput> = if self.parallel {
            chunks
                .par_iter()
                .map(|chunk| self.processor.extract(chunk))
                .collect()
        } else {
            chunks
                .iter()
                .map(|chunk| self.processor.extract(chunk))
                .collect()
        };

        chunks
            .iter()
            .zip(extractions)
            .map(|(chunk, extraction)| {
                if chunk.is_blank() {
                    tracing::warn!(chunk = chunk.id, "chunk has no text");
                }
                self.processor.generate(chunk.id, extraction)
            })
            .collect()
    }

    #[must_use]
    pub fn run(&self, raw_text: &str) -> DatasetAssembler {
        let chunks = self.chunks(raw_text);
        tracing::info!(
            chunks = chunks.len(),
            parallel = self.parallel,
            chunk_size = self.chunker.chunk_size(),
            "processing text"
        );

        let mut assembler = DatasetAssembler::new();
        for output in self.process_chunks(&chunks) {
            assembler.add(output);
        }

        let stats = assembler.stats();
        tracing::info!(
            entities = stats.total_entities,
            tables = stats.total_tables,
            pairs = stats.total_qa_pairs,
            "dataset assembled"
        );
        assembler
    }
}
