mod generator;
mod ledger;
mod pair;
mod templates;

pub use generator::{Generation, GeneratorConfig, QaGenerator};
pub use ledger::QuestionLedger;
pub use pair::{dedup_key, Category, Difficulty, QaPair};
pub use templates::{
    default_entity_templates, default_pair_templates, EntityTemplate, EntityTemplateDef,
    PairTemplate, PairTemplateDef, TableScope, TemplateConfig, TemplateSet,
};
