use anyhow::Context;
use clap::Parser;
use photomosaic::{ImageChoice, MatchingPipeline, PipelineConfig};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod library;

use library::{read_photo, DirectoryLibrary};

/// Command line arguments structure.
#[derive(Parser, Debug)]
#[command(author, version, about = "CLI for choosing photomosaic tiles from an image library.")]
struct Args {
    /// Reference photo the mosaic should resemble
    #[arg()]
    reference: PathBuf,

    /// Directory holding the candidate library images (searched recursively)
    #[arg()]
    library: PathBuf,

    /// Edge length of a mosaic cell, in reference pixels
    #[arg(long, default_value_t = 32)]
    grid_size: usize,

    /// Tiles are decoded at grid size times this factor
    #[arg(long, default_value_t = 1)]
    quality: usize,

    /// Number of concurrent matching workers
    #[arg(long, default_value_t = photomosaic::matching_pipeline::DEFAULT_WORKER_COUNT)]
    workers: usize,

    /// Optionally write the chosen tile for every cell as a text file
    #[arg(long)]
    output_choices: Option<PathBuf>,

    /// Optionally write the built library index as a JSON snapshot
    #[arg(long)]
    save_index: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    info!(path = %args.reference.display(), "reading reference image");
    let reference = read_photo(&args.reference)?;
    let library = DirectoryLibrary::scan(&args.library)?;
    info!(images = library.len(), "library scanned");

    let pipeline: MatchingPipeline<PathBuf, _, _> = MatchingPipeline::with_config(
        reference,
        library.clone(),
        library,
        PipelineConfig::default().with_worker_count(args.workers),
    );
    info!(
        width = pipeline.reference().width,
        height = pipeline.reference().height,
        workers = pipeline.config().worker_count,
        "pipeline configured"
    );

    pipeline
        .preprocess(|report| {
            info!(
                indexed = report.indexed,
                rejected = report.rejected,
                depth = report.depth,
                "index ready"
            )
        })
        .await?;

    if let Some(index_path) = &args.save_index {
        if let Some(index) = pipeline.index() {
            let snapshot = index.serialize()?;
            write_text(index_path, &snapshot)?;
            info!(path = %index_path.display(), "index snapshot written");
        }
    }

    let mut choices = Vec::new();
    let report = pipeline
        .select(args.grid_size, args.quality, |choice| choices.push(choice))
        .await?;
    choices.sort_by_key(|choice| (choice.row, choice.col));

    if let Some(choices_path) = &args.output_choices {
        write_text(choices_path, &to_choice_listing(&choices))?;
        info!(path = %choices_path.display(), "tile choices written");
    }

    info!(
        cells = report.cells,
        delivered = report.delivered,
        failed = report.failures.len(),
        "Done."
    );
    Ok(())
}

/// One line per cell: `row col score path`.
fn to_choice_listing(choices: &[ImageChoice<PathBuf>]) -> String {
    let mut out = String::with_capacity(choices.len() * 64);
    for choice in choices {
        out.push_str(&format!(
            "{} {} {:.5} {}\n",
            choice.row,
            choice.col,
            choice.score,
            choice.asset.display()
        ));
    }
    out
}

fn write_text(path: &Path, text: &str) -> anyhow::Result<()> {
    let mut file = File::create(path).with_context(|| format!("Could not create output file {}", path.display()))?;
    file.write_all(text.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
