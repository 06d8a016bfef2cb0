pub mod chunk;
pub mod dataset;
pub mod entity;
pub mod error;
pub mod ingest;
pub mod qa;
pub mod relation;
pub mod template;

pub use chunk::Chunk;
pub use dataset::{DatasetAssembler, DatasetStats};
pub use entity::{Entity, EntityRef, EntitySet, EntityType, SourceSpan, TableData, TableKind};
pub use error::{Error, Rejection, RejectionKind, Result};
pub use ingest::{
    ChunkOutput, ChunkProcessor, ChunkStats, Chunker, DatasetPipeline, EntityExtractor,
    ExtractionOutput, OcrCleaner, PatternRegistry, RuleSet, TableReconstructor, TableScan,
};
pub use qa::{
    Category, Difficulty, GeneratorConfig, QaGenerator, QaPair, QuestionLedger, TemplateConfig,
    TemplateSet,
};
pub use relation::{relations_between, Relation, RelationKind};
pub use template::Template;
