use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use console::style;
use ocrqa_core::DatasetStats;

use super::RunArgs;

pub struct Outputs<'a> {
    pub dataset: &'a Path,
    pub stats: Option<&'a Path>,
    pub samples: Option<&'a Path>,
    pub sample_count: usize,
}

pub fn run(input: &Path, outputs: &Outputs<'_>, args: &RunArgs) -> Result<()> {
    let config = args.resolve()?;
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;

    let assembler = config.pipeline()?.run(&text);

    assembler
        .write_jsonl(outputs.dataset)
        .with_context(|| format!("failed to write {}", outputs.dataset.display()))?;

    let stats_path = outputs
        .stats
        .map_or_else(|| stats_path_for(outputs.dataset), Path::to_path_buf);
    assembler
        .write_stats(&stats_path)
        .with_context(|| format!("failed to write {}", stats_path.display()))?;

    if let Some(samples) = outputs.samples {
        assembler
            .write_samples(samples, outputs.sample_count)
            .with_context(|| format!("failed to write {}", samples.display()))?;
    }

    print_summary(assembler.stats(), outputs.dataset, &stats_path);
    Ok(())
}

/// `out/qa.jsonl` -> `out/qa_stats.json`
fn stats_path_for(dataset: &Path) -> PathBuf {
    let stem = dataset
        .file_stem()
        .map_or_else(|| "dataset".to_string(), |s| s.to_string_lossy().to_string());
    dataset.with_file_name(format!("{stem}_stats.json"))
}

fn print_summary(stats: &DatasetStats, dataset: &Path, stats_path: &Path) {
    let marker = if stats.total_qa_pairs > 0 {
        style("●").green()
    } else {
        style("○").dim()
    };
    eprintln!(
        "{marker} {} Q&A pairs -> {}",
        style(stats.total_qa_pairs).bold(),
        dataset.display()
    );
    eprintln!(
        "  Chunks: {} ({} without entities)",
        stats.chunks, stats.empty_chunks
    );
    eprintln!(
        "  Entities: {} ({} tables)",
        stats.total_entities, stats.total_tables
    );
    for (ty, count) in &stats.entities_by_type {
        eprintln!("    {:<16} {count}", ty.label());
    }
    for (category, count) in &stats.qa_by_category {
        eprintln!("  {:<18} {count}", format!("{category}:"));
    }
    let by_difficulty: Vec<String> = stats
        .qa_by_difficulty
        .iter()
        .map(|(difficulty, count)| format!("{difficulty} {count}"))
        .collect();
    if !by_difficulty.is_empty() {
        eprintln!("  Difficulty: {}", by_difficulty.join(", "));
    }

    let rejected = stats.total_rejected();
    if rejected > 0 {
        eprintln!("  {} {rejected} rejected", style("!").yellow());
        for (kind, count) in &stats.rejections {
            eprintln!("    {:<24} {count}", kind.as_str());
        }
    }
    eprintln!("  Stats: {}", stats_path.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_path_next_to_dataset() {
        assert_eq!(
            stats_path_for(Path::new("out/qa.jsonl")),
            PathBuf::from("out/qa_stats.json")
        );
        assert_eq!(
            stats_path_for(Path::new("qa_dataset.jsonl")),
            PathBuf::from("qa_dataset_stats.json")
        );
    }
}
