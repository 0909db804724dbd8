pub mod core;
pub mod export;
pub mod fusion;
pub mod ocr;
pub mod oracle;
pub mod pipeline;

pub use core::config::FusionConfig;
pub use core::model::{FusionOutput, Glyph};
pub use fusion::{CharFusionEngine, FusionEngine};
