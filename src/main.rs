//! plotline — episode coherence scoring and key-item Q&A over story data.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use plotline::ai::AiConfig;
use plotline::error::PlotlineError;
use plotline::splitter::{RecursiveSplitter, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use plotline::{evaluate, qa};

#[derive(Parser)]
#[command(name = "plotline", version, about = "LLM-assisted story continuity tools")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score every episode for coherence and track key items across them
    Evaluate {
        /// Story JSON: storyline -> "Episode N" -> { initialRecords: [...] }
        #[arg(env = "PLOTLINE_INPUT")]
        input: PathBuf,

        /// Where to write the scored document (defaults to rewriting the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Answer questions about one key item from per-episode character annotations
    Ask {
        /// Annotation JSON: episode -> { characters: { name -> details } }
        #[arg(env = "PLOTLINE_INPUT")]
        input: PathBuf,

        /// Key item whose interactions are indexed
        #[arg(long, default_value = qa::DEFAULT_ITEM, env = "PLOTLINE_ITEM")]
        item: String,

        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
        chunk_overlap: usize,

        /// Chunks retrieved per question
        #[arg(long, default_value_t = qa::DEFAULT_TOP_K)]
        top_k: usize,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!(error = %e, "plotline failed");
        std::process::exit(e.exit_code());
    }
}

async fn run(args: Args) -> Result<(), PlotlineError> {
    let cfg = AiConfig::from_env().ok_or(PlotlineError::AiNotConfigured)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        llm = %cfg.llm_model,
        embed = %cfg.embed_model,
        "plotline starting"
    );

    match args.command {
        Command::Evaluate { input, output } => {
            let output = output.unwrap_or_else(|| input.clone());
            let report = evaluate::evaluate_file(&cfg, &input, &output).await?;
            info!(scored = report.scored, skipped = report.skipped, "evaluation complete");
        }
        Command::Ask { input, item, chunk_size, chunk_overlap, top_k } => {
            let splitter = RecursiveSplitter::new(chunk_size, chunk_overlap)?;
            let doc = plotline::load_json(&input).await?;
            let documents = qa::load_documents(&doc, &item)?;
            info!(item = %item, documents = documents.len(), "loaded annotations");

            let system = qa::QaSystem::build(cfg, &documents, &splitter, top_k).await?;
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            qa::ask_loop(&system, stdin, tokio::io::stdout()).await?;
        }
    }
    Ok(())
}
