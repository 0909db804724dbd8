use crate::core::config::FusionConfig;
use crate::core::model::{BreakDecision, Line, NormalizedOcrResult};
use crate::fusion::align::LinePair;
use crate::fusion::lines::MIN_CHAR_HEIGHT;

/// Vertical extent of a resolved line, averaged over the engines that saw it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSpan {
    pub top: f64,
    pub bottom: f64,
    pub avg_char_height: f64,
}

impl LineSpan {
    pub fn from_line(line: &Line) -> Self {
        Self {
            top: line.top(),
            bottom: line.bottom(),
            avg_char_height: line.avg_char_height,
        }
    }

    pub fn from_pair(
        pair: &LinePair,
        a: &NormalizedOcrResult,
        b: &NormalizedOcrResult,
    ) -> Option<Self> {
        let span_a = pair.a.and_then(|i| a.lines.get(i)).map(Self::from_line);
        let span_b = pair.b.and_then(|j| b.lines.get(j)).map(Self::from_line);
        match (span_a, span_b) {
            (Some(x), Some(y)) => Some(Self {
                top: (x.top + y.top) * 0.5,
                bottom: (x.bottom + y.bottom) * 0.5,
                avg_char_height: mean_height(x.avg_char_height, y.avg_char_height),
            }),
            (Some(x), None) | (None, Some(x)) => Some(x),
            (None, None) => None,
        }
    }
}

fn mean_height(x: f64, y: f64) -> f64 {
    match (x > 0.0, y > 0.0) {
        (true, true) => (x + y) * 0.5,
        (true, false) => x,
        (false, true) => y,
        (false, false) => MIN_CHAR_HEIGHT,
    }
}

/// Classifies the gap between two consecutive lines, measured in local
/// character heights.
pub fn classify_gap(prev: &LineSpan, next: &LineSpan, config: &FusionConfig) -> BreakDecision {
    let scale = mean_height(prev.avg_char_height, next.avg_char_height);
    let gap = (next.top - prev.bottom) / scale;
    if !gap.is_finite() || gap < config.small_gap_ratio {
        BreakDecision::None
    } else if gap <= config.large_gap_ratio {
        BreakDecision::Line
    } else {
        BreakDecision::Paragraph
    }
}

/// One decision per boundary between consecutive line pairs.
pub fn detect_line_breaks(
    line_pairs: &[LinePair],
    a: &NormalizedOcrResult,
    b: &NormalizedOcrResult,
    config: &FusionConfig,
) -> Vec<BreakDecision> {
    let spans: Vec<LineSpan> = line_pairs
        .iter()
        .filter_map(|pair| LineSpan::from_pair(pair, a, b))
        .collect();
    spans
        .windows(2)
        .map(|w| classify_gap(&w[0], &w[1], config))
        .collect()
}

/// Joins line texts, placing the marker for `breaks[i]` between line `i`
/// and line `i + 1`. Missing decisions default to a line break.
pub fn insert_breaks_into_text<S: AsRef<str>>(lines: &[S], breaks: &[BreakDecision]) -> String {
    let mut text = String::new();
    for (idx, line) in lines.iter().enumerate() {
        if idx > 0 {
            let decision = breaks.get(idx - 1).copied().unwrap_or(BreakDecision::Line);
            text.push_str(decision.marker());
        }
        text.push_str(line.as_ref());
    }
    text
}
