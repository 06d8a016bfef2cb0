mod chunker;
mod cleaner;
mod extractor;
mod pipeline;
mod registry;
mod table;

pub use chunker::{Chunker, DEFAULT_CHUNK_SIZE};
pub use cleaner::OcrCleaner;
pub use extractor::{EntityExtractor, ExtractionOutput};
pub use pipeline::{ChunkOutput, ChunkProcessor, ChunkStats, DatasetPipeline};
pub use registry::{
    default_rules, normalize_hex, units_for, Candidate, PatternRegistry, Rule, RuleDef, RuleSet,
};
pub use table::{TableReconstructor, TableScan};
