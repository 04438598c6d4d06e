use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use annotation_spans::labels::LabelTable;
use annotation_spans::pipeline::{run_batch, PipelineConfig, DEFAULT_BOILERPLATE};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory tree with the raw HTML documents.
    #[arg(long)]
    html_dir: PathBuf,

    /// Directory tree with the JSON annotation files.
    #[arg(long)]
    ann_dir: PathBuf,

    #[arg(long, default_value = ".txt.plain.html")]
    html_suffix: String,

    #[arg(long, default_value = ".txt.ann.json")]
    ann_suffix: String,

    /// Prepended to HTML keys. Empty string disables; `--legacy-strip` defaults it to `a`.
    #[arg(long)]
    html_prefix: Option<String>,

    /// Prepended to annotation keys. Empty string disables; `--legacy-strip` defaults it to `a`.
    #[arg(long)]
    ann_prefix: Option<String>,

    /// JSON object mapping class ids to tags (built-in essay scheme if omitted).
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Literal text removed from every document before alignment. Repeatable.
    #[arg(long, default_values_t = [DEFAULT_BOILERPLATE.to_string()])]
    boilerplate: Vec<String>,

    /// Write spreadsheets here instead of next to each annotation file.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Trim any suffix characters from both ends of file names instead of removing
    /// the literal suffix, and prefix both sides with `a`.
    #[arg(long)]
    legacy_strip: bool,

    /// Refuse to run when the label table misses class ids used in the corpus.
    #[arg(long)]
    strict_labels: bool,
}

impl TryFrom<Args> for PipelineConfig {
    type Error = anyhow::Error;

    fn try_from(a: Args) -> Result<Self> {
        let labels = match &a.labels {
            Some(p) => LabelTable::from_json_file(p)?,
            None => LabelTable::builtin(),
        };
        if labels.is_empty() {
            return Err(anyhow!("label table is empty"));
        }
        let mut cfg = PipelineConfig::new(a.html_dir, a.ann_dir);
        if a.legacy_strip {
            cfg = cfg.with_legacy_naming();
        }
        cfg.html_suffix = a.html_suffix;
        cfg.ann_suffix = a.ann_suffix;
        if let Some(p) = a.html_prefix {
            cfg.html_prefix = Some(p).filter(|p| !p.is_empty());
        }
        if let Some(p) = a.ann_prefix {
            cfg.ann_prefix = Some(p).filter(|p| !p.is_empty());
        }
        cfg.labels = labels;
        cfg.boilerplate = a.boilerplate;
        cfg.out_dir = a.out_dir;
        cfg.strict_labels = a.strict_labels;
        Ok(cfg)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("annotation_spans=info")),
        )
        .init();

    let args = Args::parse();
    let cfg = PipelineConfig::try_from(args)?;
    let report = run_batch(&cfg)?;

    println!(
        "{} written, {} without annotations, {} failed",
        report.written.len(),
        report.unmatched.len(),
        report.failed.len()
    );
    Ok(())
}
