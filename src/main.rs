use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use inkfuse::oracle::DictionaryOracle;
use inkfuse::pipeline::{load_fusion_config, load_oracle, run, run_batch, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "inkfuse")]
#[command(
    version,
    about = "Fuse two handwriting OCR engines into one reading-order text",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fuse one pair of engine outputs
    Fuse {
        /// Engine A detections (JSON)
        engine_a: PathBuf,

        /// Engine B detections (JSON)
        engine_b: PathBuf,

        /// Output directory (default: ./fusion_output)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Dictionary used to break confidence ties
        #[arg(short, long)]
        dictionary: Option<PathBuf>,

        /// Fusion tunables (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Include the alignment report in fusion.json
        #[arg(long)]
        debug: bool,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Fuse many directories, each holding engine_a.json and engine_b.json
    Batch {
        /// Input directories
        inputs: Vec<PathBuf>,

        /// Output directory for all results
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Dictionary used to break confidence ties
        #[arg(short, long)]
        dictionary: Option<PathBuf>,

        /// Fusion tunables (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show how a dictionary entry was loaded
    Lookup {
        /// Dictionary file (JSON)
        dictionary: PathBuf,

        /// Headword to look up
        symbol: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fuse {
            engine_a,
            engine_b,
            output,
            dictionary,
            config,
            debug,
            quiet,
        } => fuse_single(engine_a, engine_b, output, dictionary, config, debug, quiet),
        Commands::Batch {
            inputs,
            output,
            dictionary,
            config,
        } => fuse_batch(inputs, output, dictionary, config),
        Commands::Lookup { dictionary, symbol } => lookup(dictionary, symbol),
    }
}

fn fuse_single(
    engine_a: PathBuf,
    engine_b: PathBuf,
    output: Option<PathBuf>,
    dictionary: Option<PathBuf>,
    config: Option<PathBuf>,
    debug: bool,
    quiet: bool,
) -> Result<()> {
    for input in [&engine_a, &engine_b] {
        if !input.is_file() {
            anyhow::bail!("Input file does not exist: {}", input.display());
        }
    }

    let output_dir = output.unwrap_or_else(|| PathBuf::from("fusion_output"));
    let mut fusion = load_fusion_config(config.as_deref())?;
    fusion.include_debug |= debug;
    let oracle = load_oracle(dictionary.as_deref())?;

    if !quiet {
        println!("[*] Engine A: {}", engine_a.display());
        println!("[*] Engine B: {}", engine_b.display());
        println!("[*] Output: {}", output_dir.display());
    }

    let pipeline = PipelineConfig::new(engine_a, engine_b, output_dir.clone()).with_fusion(fusion);
    let result = run(&pipeline, oracle.as_ref())?;

    if !quiet {
        println!("\n[✓] {} glyph(s) fused", result.glyphs.len());
        println!("{}", result.full_text);
        println!("\n[✓] Done! Results saved to: {}", output_dir.display());
    }

    Ok(())
}

fn fuse_batch(
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
    dictionary: Option<PathBuf>,
    config: Option<PathBuf>,
) -> Result<()> {
    if inputs.is_empty() {
        anyhow::bail!("No input directories specified");
    }

    let base_output = output.unwrap_or_else(|| PathBuf::from("batch_output"));
    let fusion = load_fusion_config(config.as_deref())?;
    let oracle = load_oracle(dictionary.as_deref())?;

    println!("[*] Batch fusing {} input(s)", inputs.len());
    println!("[*] Base output: {}\n", base_output.display());

    let results = run_batch(&inputs, &base_output, &fusion, oracle.as_ref());

    let mut success = 0;
    let mut failed = 0;
    for (input, result) in results {
        match result {
            Ok(output) => {
                println!("  [✓] {} ({} glyphs)", input.display(), output.glyphs.len());
                success += 1;
            }
            Err(e) => {
                eprintln!("  [✗] {}: {:#}", input.display(), e);
                failed += 1;
            }
        }
    }

    println!("\n[*] Summary: {} succeeded, {} failed", success, failed);

    if failed > 0 {
        anyhow::bail!("{} input(s) failed to fuse", failed);
    }

    Ok(())
}

fn lookup(dictionary: PathBuf, symbol: String) -> Result<()> {
    let oracle = DictionaryOracle::load(&dictionary)
        .with_context(|| format!("Failed to open dictionary: {}", dictionary.display()))?;

    match oracle.get(&symbol) {
        Some(record) => {
            println!("{symbol}");
            println!("  gloss: {}", record.gloss.as_deref().unwrap_or("-"));
            println!("  pronunciation: {}", record.pronunciation.as_deref().unwrap_or("-"));
        }
        None => println!("{symbol}: not in dictionary ({} entries)", oracle.len()),
    }

    Ok(())
}
