pub mod align;
pub mod breaks;
pub mod compare;
pub mod finalize;
pub mod lines;
pub mod resolve;

use std::collections::BTreeMap;

use tracing::debug;

use crate::core::config::FusionConfig;
use crate::core::model::{
    BreakDecision, EngineId, FusionDebug, FusionMode, FusionOutput, Glyph, LinePairDebug,
    NormalizedOcrResult, Resolution,
};
use crate::ocr::bridge::RawDetection;
use crate::ocr::normalize::normalize_detections;
use crate::oracle::TieBreakOracle;

use align::LinePair;
use resolve::FusionResolver;

pub trait FusionEngine {
    /// Fuses two engines' raw detections. Never fails; malformed or empty
    /// input degrades to a best-effort result.
    fn fuse(&self, engine_a: &[RawDetection], engine_b: &[RawDetection]) -> FusionOutput;
}

/// Character-level fusion of two recognition engines.
///
/// Holds no per-call state, so one instance can serve concurrent requests.
pub struct CharFusionEngine<'o> {
    config: FusionConfig,
    oracle: &'o dyn TieBreakOracle,
}

impl<'o> CharFusionEngine<'o> {
    pub fn new(config: FusionConfig, oracle: &'o dyn TieBreakOracle) -> Self {
        Self { config, oracle }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// `a` fills the engine A slot and `b` the engine B slot, whatever
    /// engine ids their candidates carry.
    pub fn fuse_normalized(
        &self,
        a: &NormalizedOcrResult,
        b: &NormalizedOcrResult,
    ) -> FusionOutput {
        let mut output = match (a.is_empty(), b.is_empty()) {
            (true, true) => {
                debug!("both engines empty");
                FusionOutput {
                    debug: self.debug_report(
                        FusionMode::Empty,
                        a,
                        b,
                        Vec::new(),
                        BTreeMap::new(),
                    ),
                    ..FusionOutput::default()
                }
            }
            (false, true) => self.pass_through(a, b, EngineId::A),
            (true, false) => self.pass_through(a, b, EngineId::B),
            (false, false) => self.fuse_aligned(a, b),
        };
        if !self.config.include_debug {
            output.debug = None;
        }
        output
    }

    /// Emits the candidates of the non-empty `slot` unchanged, one glyph per
    /// candidate.
    fn pass_through(
        &self,
        a: &NormalizedOcrResult,
        b: &NormalizedOcrResult,
        slot: EngineId,
    ) -> FusionOutput {
        let source = match slot {
            EngineId::A => a,
            EngineId::B => b,
        };
        debug!(
            engine = %slot,
            candidates = source.candidates.len(),
            "single-engine pass-through"
        );
        let pairs: Vec<LinePair> = (0..source.lines.len())
            .map(|idx| match slot {
                EngineId::A => LinePair { a: Some(idx), b: None },
                EngineId::B => LinePair { a: None, b: Some(idx) },
            })
            .collect();
        let breaks = breaks::detect_line_breaks(&pairs, a, b, &self.config);

        let lines: Vec<Vec<Glyph>> = source
            .lines
            .iter()
            .map(|line| {
                source
                    .line_candidates(line)
                    .map(|c| Glyph {
                        symbol: c.symbol.clone(),
                        bbox: c.bbox,
                        confidence: c.confidence,
                        provenance: slot.into(),
                    })
                    .collect()
            })
            .collect();
        let mut resolutions = BTreeMap::new();
        resolutions.insert(Resolution::SingleEngine, source.candidates.len());
        let line_debug = self.line_debug(&pairs, a, b, &breaks);

        let mut output = finalize::assemble(lines, &breaks);
        output.debug = self.debug_report(FusionMode::PassThrough, a, b, line_debug, resolutions);
        output
    }

    fn fuse_aligned(&self, a: &NormalizedOcrResult, b: &NormalizedOcrResult) -> FusionOutput {
        let pairs = align::align_lines(a, b, &self.config);
        let breaks = breaks::detect_line_breaks(&pairs, a, b, &self.config);
        let resolver = FusionResolver::new(self.oracle, &self.config);
        let mut resolutions: BTreeMap<Resolution, usize> = BTreeMap::new();

        let lines: Vec<Vec<Glyph>> = pairs
            .iter()
            .map(|pair| {
                let line_a = pair.a.and_then(|i| a.lines.get(i));
                let line_b = pair.b.and_then(|j| b.lines.get(j));
                let mut positions = align::align_line_chars(a, line_a, b, line_b, &self.config);
                positions
                    .iter_mut()
                    .filter_map(|position| {
                        let glyph = resolver.resolve(position, a, b)?;
                        if let Some(resolution) = position.resolution {
                            *resolutions.entry(resolution).or_default() += 1;
                        }
                        Some(glyph)
                    })
                    .collect()
            })
            .collect();

        debug!(
            line_pairs = pairs.len(),
            glyphs = lines.iter().map(Vec::len).sum::<usize>(),
            "fused aligned engines"
        );
        let line_debug = self.line_debug(&pairs, a, b, &breaks);
        let mut output = finalize::assemble(lines, &breaks);
        output.debug = self.debug_report(FusionMode::Aligned, a, b, line_debug, resolutions);
        output
    }

    fn line_debug(
        &self,
        pairs: &[LinePair],
        a: &NormalizedOcrResult,
        b: &NormalizedOcrResult,
        breaks: &[BreakDecision],
    ) -> Vec<LinePairDebug> {
        if !self.config.include_debug {
            return Vec::new();
        }
        pairs
            .iter()
            .enumerate()
            .map(|(idx, pair)| {
                let text_a = pair.a.and_then(|i| a.lines.get(i)).map(|l| a.line_text(l));
                let text_b = pair.b.and_then(|j| b.lines.get(j)).map(|l| b.line_text(l));
                let similarity = match (&text_a, &text_b) {
                    (Some(x), Some(y)) => Some(compare::text_similarity(x, y)),
                    _ => None,
                };
                LinePairDebug {
                    engine_a_text: text_a,
                    engine_b_text: text_b,
                    similarity,
                    break_after: breaks.get(idx).copied(),
                }
            })
            .collect()
    }

    fn debug_report(
        &self,
        mode: FusionMode,
        a: &NormalizedOcrResult,
        b: &NormalizedOcrResult,
        lines: Vec<LinePairDebug>,
        resolutions: BTreeMap<Resolution, usize>,
    ) -> Option<FusionDebug> {
        self.config.include_debug.then(|| FusionDebug {
            mode,
            engine_a_text: a.text(),
            engine_b_text: b.text(),
            lines,
            resolutions,
        })
    }
}

impl FusionEngine for CharFusionEngine<'_> {
    fn fuse(&self, engine_a: &[RawDetection], engine_b: &[RawDetection]) -> FusionOutput {
        let a = normalize_detections(EngineId::A, engine_a, &self.config);
        let b = normalize_detections(EngineId::B, engine_b, &self.config);
        self.fuse_normalized(&a, &b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Provenance;
    use crate::oracle::{DictionaryOracle, NoOracle};
    use pretty_assertions::assert_eq;

    fn det(x: f64, y: f64, text: &str, confidence: f64) -> RawDetection {
        let width = 20.0 * text.chars().count() as f64;
        RawDetection::new(
            crate::core::geometry::Rectangle::new(x, y, x + width, y + 20.0),
            text,
            confidence,
        )
    }

    #[test]
    fn agreeing_engines_reproduce_the_input() {
        let detections = vec![
            det(0.0, 0.0, "床前明月光", 0.8),
            det(0.0, 30.0, "疑是地上霜", 0.7),
        ];
        let engine = CharFusionEngine::new(FusionConfig::default(), &NoOracle);
        let output = engine.fuse(&detections, &detections);

        assert_eq!(output.full_text, "床前明月光 疑是地上霜");
        assert!(output.glyphs.iter().all(|g| g.provenance == Provenance::Agreed));
        assert_eq!(output.glyphs[0].confidence, 0.8);
        assert_eq!(output.glyphs[9].confidence, 0.7);
    }

    #[test]
    fn resolves_disagreement_with_oracle() {
        let oracle = DictionaryOracle::from_headwords(["日"]);
        let engine = CharFusionEngine::new(FusionConfig::default(), &oracle);
        let output = engine.fuse(
            &[det(0.0, 0.0, "目出", 0.7)],
            &[det(1.0, 1.0, "日出", 0.7)],
        );
        assert_eq!(output.symbols(), vec!["日", "出"]);
        assert_eq!(output.full_text, "日出");
    }

    #[test]
    fn engine_b_fills_a_missing_line() {
        let engine = CharFusionEngine::new(FusionConfig::default(), &NoOracle);
        let output = engine.fuse(
            &[det(0.0, 0.0, "一行", 0.9), det(0.0, 100.0, "三行", 0.9)],
            &[
                det(0.0, 0.0, "一行", 0.8),
                det(0.0, 30.0, "二行", 0.8),
                det(0.0, 100.0, "三行", 0.8),
            ],
        );
        assert_eq!(output.full_text, "一行 二行\n\n三行");
        assert_eq!(output.glyphs[2].provenance, Provenance::B);
        assert_eq!(output.glyphs[2].confidence, 0.8);
    }

    #[test]
    fn slots_decide_provenance_for_normalized_input() {
        let config = FusionConfig::default();
        let engine = CharFusionEngine::new(config.clone(), &NoOracle);
        // Both results carry engine A's tag; the second still fills slot B.
        let a = normalize_detections(EngineId::A, &[det(0.0, 0.0, "人", 0.4)], &config);
        let b = normalize_detections(EngineId::A, &[det(0.0, 0.0, "入", 0.9)], &config);

        let output = engine.fuse_normalized(&a, &b);
        assert_eq!(output.symbols(), vec!["入"]);
        assert_eq!(output.glyphs[0].provenance, Provenance::B);

        let empty = NormalizedOcrResult::empty(EngineId::A);
        let output = engine.fuse_normalized(&empty, &b);
        assert_eq!(output.symbols(), vec!["入"]);
        assert_eq!(output.glyphs[0].provenance, Provenance::B);
    }

    #[test]
    fn debug_report_is_opt_in() {
        let detections = vec![det(0.0, 0.0, "字", 0.9)];
        let plain = CharFusionEngine::new(FusionConfig::default(), &NoOracle);
        assert!(plain.fuse(&detections, &detections).debug.is_none());

        let config = FusionConfig {
            include_debug: true,
            ..FusionConfig::default()
        };
        let verbose = CharFusionEngine::new(config, &NoOracle);
        let debug = verbose.fuse(&detections, &[]).debug.unwrap();
        assert_eq!(debug.mode, FusionMode::PassThrough);
        assert_eq!(debug.engine_a_text, "字");
        assert_eq!(debug.resolutions.get(&Resolution::SingleEngine), Some(&1));

        let debug = verbose.fuse(&detections, &detections).debug.unwrap();
        assert_eq!(debug.mode, FusionMode::Aligned);
        assert_eq!(debug.lines[0].similarity, Some(1.0));
        assert_eq!(debug.resolutions.get(&Resolution::Agreement), Some(&1));
    }
}
