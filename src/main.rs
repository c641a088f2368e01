// paper2audio - read academic papers aloud, or render them as plain HTML
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use paper2audio::audio::{self, AudioCache, AudioGenerator, ExternalPlayer, GoogleTts};
use paper2audio::config::{self, AppConfig};
use paper2audio::pdf_extraction::{
    Granularity, LayoutPipeline, LayoutTokenizer, OnnxLayoutModel, PdfiumExtractor, PipelineOptions,
};
use paper2audio::render::render_html;
use paper2audio::{Label, LabeledBlock};

#[derive(Parser)]
#[command(name = "paper2audio")]
#[command(author, version, about = "Turn academic PDFs into narrated audio or clean HTML")]
struct Cli {
    /// Config file (TOML); defaults to $PAPER2AUDIO_CONFIG or the user config dir
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Narrate a paper through the speakers
    ToAudio {
        /// Path to PDF file
        path: PathBuf,
        #[arg(long, default_value = config::DEFAULT_VOICE)]
        voice_name: String,
        /// Where synthesized audio is cached
        #[arg(long, default_value = config::DEFAULT_CACHE_DIR)]
        cache_dir: PathBuf,
    },
    /// Write the paper as a minimal HTML document
    ToHtml {
        /// Path to PDF file
        path: PathBuf,
        #[arg(short, long, default_value = "output.html")]
        output: PathBuf,
    },
    /// Dump labelled blocks as JSON
    Extract {
        /// Path to PDF file
        path: PathBuf,
        #[arg(long, value_enum, default_value_t = Granularity::Line)]
        level: Granularity,
        /// Drop units with this label (repeatable)
        #[arg(long)]
        exclude: Vec<Label>,
        /// Stop at the section header with exactly this text
        #[arg(long)]
        stop_at_section: Option<String>,
        #[arg(long)]
        merge: bool,
        #[arg(long)]
        remove_citations: bool,
        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "paper2audio=debug" } else { "paper2audio=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Build the pipeline from config and run it on `path`. Blocking.
fn extract_blocks(config: &AppConfig, path: &Path, options: &PipelineOptions) -> Result<Vec<LabeledBlock>> {
    let tokenizer = LayoutTokenizer::from_file(&config.models.tokenizer_path)
        .with_context(|| format!("loading tokenizer {}", config.models.tokenizer_path.display()))?;
    let model = OnnxLayoutModel::load(&config.models).context("loading layout model")?;
    let source = PdfiumExtractor::new(config.pdfium_path());

    let mut pipeline = LayoutPipeline::new(tokenizer, model);
    let blocks = pipeline
        .extract_layout(&source, path, options)
        .with_context(|| format!("extracting layout from {}", path.display()))?;
    info!(blocks = blocks.len(), "extraction complete");
    Ok(blocks)
}

async fn extract_in_background(config: AppConfig, path: PathBuf, options: PipelineOptions) -> Result<Vec<LabeledBlock>> {
    tokio::task::spawn_blocking(move || extract_blocks(&config, &path, &options))
        .await
        .context("extraction task panicked")?
}

async fn to_audio(config: AppConfig, path: PathBuf, voice_name: String, cache_dir: PathBuf) -> Result<()> {
    // Fail on missing credentials or player before spending time on the model
    let synthesizer = GoogleTts::from_config(&config.tts)?;
    let player = ExternalPlayer::from_config(&config.player)?;
    let cache = AudioCache::open(&cache_dir)
        .await
        .with_context(|| format!("creating cache dir {}", cache_dir.display()))?;

    let blocks = extract_in_background(config, path, PipelineOptions::for_papers()).await?;
    if blocks.is_empty() {
        return Ok(());
    }

    let parts = audio::prepare_parts(blocks, &voice_name);
    let generator = AudioGenerator::new(Arc::new(synthesizer), cache, config::SYNTHESIS_WORKERS);
    let run = generator.start(&parts);

    let mut stdout = io::stdout();
    let report = audio::narrate(&parts, &run, &player, &mut stdout).await?;
    run.finish().await;
    info!(played = report.played, skipped = report.skipped, "narration finished");
    Ok(())
}

async fn to_html(config: AppConfig, path: PathBuf, output: PathBuf) -> Result<()> {
    let blocks = extract_in_background(config, path, PipelineOptions::for_papers()).await?;
    tokio::fs::write(&output, render_html(&blocks))
        .await
        .with_context(|| format!("writing {}", output.display()))?;
    info!(output = %output.display(), blocks = blocks.len(), "wrote HTML");
    Ok(())
}

async fn extract(config: AppConfig, path: PathBuf, options: PipelineOptions, output: Option<PathBuf>) -> Result<()> {
    let blocks = extract_in_background(config, path, options).await?;
    let json = serde_json::to_string_pretty(&blocks)?;
    match output {
        Some(output) => tokio::fs::write(&output, json)
            .await
            .with_context(|| format!("writing {}", output.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::ToAudio { path, voice_name, cache_dir } => {
            to_audio(config, path, voice_name, cache_dir).await?;
        }
        Commands::ToHtml { path, output } => {
            to_html(config, path, output).await?;
        }
        Commands::Extract {
            path,
            level,
            exclude,
            stop_at_section,
            merge,
            remove_citations,
            output,
        } => {
            let options = PipelineOptions {
                granularity: level,
                exclude: exclude.into_iter().collect(),
                stop_at_section,
                merge_consecutive: merge,
                remove_citations,
            };
            extract(config, path, options, output).await?;
        }
    }

    Ok(())
}
