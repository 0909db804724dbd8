use std::fs;
use std::path::PathBuf;

use anyhow::Result;

use crate::core::model::FusionOutput;
use crate::export::Exporter;

pub const JSON_FILE_NAME: &str = "fusion.json";

#[derive(Debug, Clone)]
pub struct JsonExporter {
    out_dir: PathBuf,
}

impl JsonExporter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }
}

impl Exporter for JsonExporter {
    fn export(&self, output: &FusionOutput) -> Result<()> {
        fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join(JSON_FILE_NAME);
        let data = serde_json::to_string_pretty(output)?;
        fs::write(path, data)?;
        Ok(())
    }
}
