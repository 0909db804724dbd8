use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::info;

use crate::core::config::FusionConfig;
use crate::core::model::FusionOutput;
use crate::export::json_export::JsonExporter;
use crate::export::text_export::TextExporter;
use crate::export::Exporter;
use crate::fusion::{CharFusionEngine, FusionEngine};
use crate::ocr::bridge::{load_detections, RawDetection};
use crate::oracle::{DictionaryOracle, NoOracle, TieBreakOracle};

/// File names expected inside each batch input directory.
pub const ENGINE_A_FILE: &str = "engine_a.json";
pub const ENGINE_B_FILE: &str = "engine_b.json";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub engine_a: PathBuf,
    pub engine_b: PathBuf,
    pub output: PathBuf,
    pub fusion: FusionConfig,
}

impl PipelineConfig {
    pub fn new(engine_a: PathBuf, engine_b: PathBuf, output: PathBuf) -> Self {
        Self {
            engine_a,
            engine_b,
            output,
            fusion: FusionConfig::default(),
        }
    }

    /// Reads `engine_a.json` and `engine_b.json` from `dir`.
    pub fn from_dir(dir: &Path, output: PathBuf) -> Self {
        Self::new(dir.join(ENGINE_A_FILE), dir.join(ENGINE_B_FILE), output)
    }

    pub fn with_fusion(mut self, fusion: FusionConfig) -> Self {
        self.fusion = fusion;
        self
    }
}

pub fn load_fusion_config(path: Option<&Path>) -> Result<FusionConfig> {
    match path {
        Some(path) => FusionConfig::load(path)
            .with_context(|| format!("Failed to load fusion config: {}", path.display())),
        None => Ok(FusionConfig::default()),
    }
}

/// Without a dictionary every tie goes to the preferred engine.
pub fn load_oracle(path: Option<&Path>) -> Result<Box<dyn TieBreakOracle>> {
    match path {
        Some(path) => {
            let dictionary = DictionaryOracle::load(path)
                .with_context(|| format!("Failed to load dictionary: {}", path.display()))?;
            Ok(Box::new(dictionary))
        }
        None => Ok(Box::new(NoOracle)),
    }
}

/// Reads both engines' outputs in parallel.
pub fn load_engine_outputs(
    config: &PipelineConfig,
) -> Result<(Vec<RawDetection>, Vec<RawDetection>)> {
    let (a, b) = rayon::join(
        || load_detections(&config.engine_a),
        || load_detections(&config.engine_b),
    );
    let a = a.with_context(|| format!("Failed to read engine A: {}", config.engine_a.display()))?;
    let b = b.with_context(|| format!("Failed to read engine B: {}", config.engine_b.display()))?;
    Ok((a, b))
}

pub fn fuse_files(config: &PipelineConfig, oracle: &dyn TieBreakOracle) -> Result<FusionOutput> {
    let (a, b) = load_engine_outputs(config)?;
    let engine = CharFusionEngine::new(config.fusion.clone(), oracle);
    let output = engine.fuse(&a, &b);
    info!(
        detections_a = a.len(),
        detections_b = b.len(),
        glyphs = output.glyphs.len(),
        "fused engine outputs"
    );
    Ok(output)
}

pub fn export_output(output: &FusionOutput, dir: &Path) -> Result<()> {
    JsonExporter::new(dir.to_path_buf()).export(output)?;
    TextExporter::new(dir.to_path_buf()).export(output)?;
    Ok(())
}

pub fn run(config: &PipelineConfig, oracle: &dyn TieBreakOracle) -> Result<FusionOutput> {
    let output = fuse_files(config, oracle)?;
    export_output(&output, &config.output)
        .with_context(|| format!("Failed to export to: {}", config.output.display()))?;
    Ok(output)
}

/// Fuses every input directory concurrently against one shared oracle.
/// Results keep the order of `inputs`; each is written to
/// `output_root/<directory name>`.
pub fn run_batch(
    inputs: &[PathBuf],
    output_root: &Path,
    fusion: &FusionConfig,
    oracle: &dyn TieBreakOracle,
) -> Vec<(PathBuf, Result<FusionOutput>)> {
    inputs
        .par_iter()
        .enumerate()
        .map(|(idx, dir)| {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("input_{idx:03}"));
            let config = PipelineConfig::from_dir(dir, output_root.join(name))
                .with_fusion(fusion.clone());
            (dir.clone(), run(&config, oracle))
        })
        .collect()
}
