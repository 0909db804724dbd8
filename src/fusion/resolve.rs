use crate::core::confidence::{corroborated, is_tie};
use crate::core::config::FusionConfig;
use crate::core::model::{
    CharacterCandidate, EngineId, FusedPosition, Glyph, NormalizedOcrResult, Provenance,
    Resolution,
};
use crate::oracle::TieBreakOracle;

/// Picks the winning character at each aligned position.
///
/// Arbitration order for two disagreeing candidates: confidence, then the
/// oracle when confidences tie, then `preferred_engine`.
pub struct FusionResolver<'o> {
    oracle: &'o dyn TieBreakOracle,
    tie_epsilon: f64,
    preferred_engine: EngineId,
}

impl<'o> FusionResolver<'o> {
    pub fn new(oracle: &'o dyn TieBreakOracle, config: &FusionConfig) -> Self {
        Self {
            oracle,
            tie_epsilon: config.tie_epsilon,
            preferred_engine: config.preferred_engine,
        }
    }

    /// Decides between two candidates carrying different symbols. `a` fills
    /// the engine A slot of the position and `b` the engine B slot; the
    /// returned id names the winning slot.
    pub fn arbitrate(
        &self,
        a: &CharacterCandidate,
        b: &CharacterCandidate,
    ) -> (EngineId, Resolution) {
        if !is_tie(a.confidence, b.confidence, self.tie_epsilon) {
            let winner = if a.confidence > b.confidence {
                EngineId::A
            } else {
                EngineId::B
            };
            return (winner, Resolution::HigherConfidence);
        }
        match (
            self.oracle.has_entry(&a.symbol),
            self.oracle.has_entry(&b.symbol),
        ) {
            (true, false) => (EngineId::A, Resolution::Oracle),
            (false, true) => (EngineId::B, Resolution::Oracle),
            _ => (self.preferred_engine, Resolution::PreferredEngine),
        }
    }

    /// Records the winner on `position` and returns the emitted glyph, or
    /// `None` for a position without contributors.
    pub fn resolve(
        &self,
        position: &mut FusedPosition,
        a: &NormalizedOcrResult,
        b: &NormalizedOcrResult,
    ) -> Option<Glyph> {
        let cand_a = position.a.and_then(|i| a.candidates.get(i));
        let cand_b = position.b.and_then(|j| b.candidates.get(j));

        let (winner, resolution, glyph) = match (cand_a, cand_b) {
            (None, None) => return None,
            (Some(x), None) => (
                EngineId::A,
                Resolution::SingleEngine,
                single_glyph(x, EngineId::A),
            ),
            (None, Some(y)) => (
                EngineId::B,
                Resolution::SingleEngine,
                single_glyph(y, EngineId::B),
            ),
            (Some(x), Some(y)) if x.symbol == y.symbol => (
                self.preferred_engine,
                Resolution::Agreement,
                Glyph {
                    symbol: x.symbol.clone(),
                    bbox: x.bbox.average(&y.bbox),
                    confidence: corroborated(x.confidence, y.confidence),
                    provenance: Provenance::Agreed,
                },
            ),
            (Some(x), Some(y)) => {
                let (slot, resolution) = self.arbitrate(x, y);
                let chosen = match slot {
                    EngineId::A => x,
                    EngineId::B => y,
                };
                (
                    slot,
                    resolution,
                    Glyph {
                        symbol: chosen.symbol.clone(),
                        bbox: x.bbox.average(&y.bbox),
                        confidence: chosen.confidence,
                        provenance: slot.into(),
                    },
                )
            }
        };

        position.winner = Some(winner);
        position.resolution = Some(resolution);
        Some(glyph)
    }
}

fn single_glyph(candidate: &CharacterCandidate, slot: EngineId) -> Glyph {
    Glyph {
        symbol: candidate.symbol.clone(),
        bbox: candidate.bbox,
        confidence: candidate.confidence,
        provenance: slot.into(),
    }
}
