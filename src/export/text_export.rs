use std::fs;
use std::path::PathBuf;

use anyhow::Result;

use crate::core::model::FusionOutput;
use crate::export::Exporter;

pub const TEXT_FILE_NAME: &str = "full_text.txt";

/// Writes `full_text` verbatim, break markers included.
#[derive(Debug, Clone)]
pub struct TextExporter {
    out_dir: PathBuf,
}

impl TextExporter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }
}

impl Exporter for TextExporter {
    fn export(&self, output: &FusionOutput) -> Result<()> {
        fs::create_dir_all(&self.out_dir)?;
        fs::write(self.out_dir.join(TEXT_FILE_NAME), &output.full_text)?;
        Ok(())
    }
}
