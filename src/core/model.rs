use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::geometry::Rectangle;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EngineId {
    A,
    B,
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineId::A => write!(f, "engine A"),
            EngineId::B => write!(f, "engine B"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    A,
    B,
    /// Both engines proposed the same symbol.
    Agreed,
}

impl From<EngineId> for Provenance {
    fn from(engine: EngineId) -> Self {
        match engine {
            EngineId::A => Provenance::A,
            EngineId::B => Provenance::B,
        }
    }
}

/// One character proposed by one engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacterCandidate {
    pub symbol: String,
    #[serde(rename = "box")]
    pub bbox: Rectangle,
    pub confidence: f64,
    pub engine: EngineId,
}

/// A horizontal cluster of candidates. `members` index into the owning
/// [`NormalizedOcrResult::candidates`] and are ordered left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub members: Vec<usize>,
    pub bounds: Rectangle,
    pub avg_char_height: f64,
}

impl Line {
    pub fn top(&self) -> f64 {
        self.bounds.y1
    }

    pub fn bottom(&self) -> f64 {
        self.bounds.y2
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// One engine's output after normalization. Candidates are stored in reading
/// order and every line covers a contiguous run of them.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedOcrResult {
    pub engine: EngineId,
    pub candidates: Vec<CharacterCandidate>,
    pub lines: Vec<Line>,
}

impl NormalizedOcrResult {
    pub fn empty(engine: EngineId) -> Self {
        Self {
            engine,
            candidates: Vec::new(),
            lines: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn line_candidates<'a>(
        &'a self,
        line: &'a Line,
    ) -> impl Iterator<Item = &'a CharacterCandidate> + 'a {
        line.members.iter().map(move |&idx| &self.candidates[idx])
    }

    pub fn line_text(&self, line: &Line) -> String {
        self.line_candidates(line)
            .map(|c| c.symbol.as_str())
            .collect()
    }

    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|line| self.line_text(line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    SingleEngine,
    Agreement,
    HigherConfidence,
    Oracle,
    PreferredEngine,
}

/// One aligned reading-order slot. `a` and `b` index into the candidates of
/// the respective engine; `winner` is set once by the resolver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FusedPosition {
    pub a: Option<usize>,
    pub b: Option<usize>,
    pub winner: Option<EngineId>,
    pub resolution: Option<Resolution>,
}

impl FusedPosition {
    pub fn new(a: Option<usize>, b: Option<usize>) -> Self {
        Self {
            a,
            b,
            winner: None,
            resolution: None,
        }
    }

    pub fn contributor_count(&self) -> usize {
        usize::from(self.a.is_some()) + usize::from(self.b.is_some())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Glyph {
    pub symbol: String,
    #[serde(rename = "box")]
    pub bbox: Rectangle,
    pub confidence: f64,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum BreakDecision {
    None,
    Line,
    Paragraph,
}

impl BreakDecision {
    pub fn marker(self) -> &'static str {
        match self {
            BreakDecision::None => "",
            BreakDecision::Line => " ",
            BreakDecision::Paragraph => "\n\n",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FusionMode {
    Empty,
    PassThrough,
    Aligned,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FusionOutput {
    pub glyphs: Vec<Glyph>,
    pub full_text: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub debug: Option<FusionDebug>,
}

impl FusionOutput {
    pub fn symbols(&self) -> Vec<&str> {
        self.glyphs.iter().map(|g| g.symbol.as_str()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FusionDebug {
    pub mode: FusionMode,
    pub engine_a_text: String,
    pub engine_b_text: String,
    pub lines: Vec<LinePairDebug>,
    pub resolutions: BTreeMap<Resolution, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinePairDebug {
    pub engine_a_text: Option<String>,
    pub engine_b_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    pub break_after: Option<BreakDecision>,
}
