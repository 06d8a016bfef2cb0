use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use super::RunArgs;

pub fn run(input: &Path, args: &RunArgs) -> Result<()> {
    let config = args.resolve()?;
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;

    let pipeline = config.pipeline()?;
    let chunks = pipeline.chunks(&text);

    let mut out = std::io::stdout().lock();
    let mut total = 0usize;
    let mut rejected = 0usize;
    for chunk in &chunks {
        let extraction = pipeline.processor().extract(chunk);
        for rejection in &extraction.rejections {
            tracing::debug!(chunk = chunk.id, %rejection, "rejected");
        }
        rejected += extraction.rejections.len();
        for entity in &extraction.entities {
            serde_json::to_writer(&mut out, entity)?;
            writeln!(out)?;
        }
        total += extraction.entities.len();
    }
    out.flush()?;

    eprintln!(
        "{} {} entities in {} chunks ({rejected} rejected)",
        style("●").green(),
        style(total).bold(),
        chunks.len()
    );
    Ok(())
}
