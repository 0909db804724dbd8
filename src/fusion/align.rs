//! Edit-distance alignment of two engines' outputs, first line against line,
//! then character against character inside each paired line.

use tracing::debug;

use crate::core::config::FusionConfig;
use crate::core::model::{CharacterCandidate, FusedPosition, Line, NormalizedOcrResult};
use crate::fusion::lines::{geometric_similarity, lines_overlap};

const COST_EPSILON: f64 = 1e-9;
const MAX_SUBSTITUTION_COST: f64 = 1.0;

/// Indices into `NormalizedOcrResult::lines` of engine A and engine B.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePair {
    pub a: Option<usize>,
    pub b: Option<usize>,
}

impl LinePair {
    pub fn is_matched(&self) -> bool {
        self.a.is_some() && self.b.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Diagonal,
    OnlyA,
    OnlyB,
}

/// Minimum-cost alignment of two sequences of lengths `n` and `m`.
///
/// `substitution(i, j)` is clamped to `[0, 1]` and `gap` is charged for every
/// unmatched element, so the total cost is bounded by `(n + m) * gap`.
/// Equal-cost choices prefer the diagonal, then an A-only step.
pub fn align_sequences<F>(
    n: usize,
    m: usize,
    gap: f64,
    substitution: F,
) -> Vec<(Option<usize>, Option<usize>)>
where
    F: Fn(usize, usize) -> f64,
{
    let width = m + 1;
    let mut cost = vec![0.0_f64; (n + 1) * width];
    let mut steps = vec![Step::Diagonal; (n + 1) * width];

    for i in 0..=n {
        for j in 0..=m {
            if i == 0 && j == 0 {
                continue;
            }
            let mut best = f64::INFINITY;
            let mut step = Step::Diagonal;
            if i > 0 && j > 0 {
                let sub = substitution(i - 1, j - 1);
                let sub = if sub.is_finite() {
                    sub.clamp(0.0, MAX_SUBSTITUTION_COST)
                } else {
                    MAX_SUBSTITUTION_COST
                };
                best = cost[(i - 1) * width + j - 1] + sub;
            }
            if i > 0 {
                let candidate = cost[(i - 1) * width + j] + gap;
                if candidate < best - COST_EPSILON {
                    best = candidate;
                    step = Step::OnlyA;
                }
            }
            if j > 0 {
                let candidate = cost[i * width + j - 1] + gap;
                if candidate < best - COST_EPSILON {
                    best = candidate;
                    step = Step::OnlyB;
                }
            }
            cost[i * width + j] = best;
            steps[i * width + j] = step;
        }
    }

    let mut path = Vec::with_capacity(n + m);
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        let step = if i == 0 {
            Step::OnlyB
        } else if j == 0 {
            Step::OnlyA
        } else {
            steps[i * width + j]
        };
        match step {
            Step::Diagonal => {
                path.push((Some(i - 1), Some(j - 1)));
                i -= 1;
                j -= 1;
            }
            Step::OnlyA => {
                path.push((Some(i - 1), None));
                i -= 1;
            }
            Step::OnlyB => {
                path.push((None, Some(j - 1)));
                j -= 1;
            }
        }
    }
    path.reverse();
    path
}

/// Re-sorts each maximal run of unmatched entries by `key`, leaving matched
/// entries in place. Stable, so each engine keeps its own relative order.
fn order_unmatched_runs<T>(
    items: &mut [T],
    is_unmatched: impl Fn(&T) -> bool,
    key: impl Fn(&T) -> f64,
) {
    let mut start = 0;
    while start < items.len() {
        if !is_unmatched(&items[start]) {
            start += 1;
            continue;
        }
        let mut end = start;
        while end < items.len() && is_unmatched(&items[end]) {
            end += 1;
        }
        items[start..end].sort_by(|x, y| key(x).total_cmp(&key(y)));
        start = end;
    }
}

/// Pairs up the lines of both engines. Lines whose vertical extents do not
/// overlap are never substituted for each other.
pub fn align_lines(
    a: &NormalizedOcrResult,
    b: &NormalizedOcrResult,
    config: &FusionConfig,
) -> Vec<LinePair> {
    let substitution = |i: usize, j: usize| {
        let (la, lb) = (&a.lines[i], &b.lines[j]);
        if lines_overlap(la, lb, config.line_overlap_threshold) {
            1.0 - geometric_similarity(la, lb)
        } else {
            MAX_SUBSTITUTION_COST
        }
    };
    let mut pairs: Vec<LinePair> = align_sequences(
        a.lines.len(),
        b.lines.len(),
        config.line_gap_penalty,
        substitution,
    )
    .into_iter()
    .map(|(a, b)| LinePair { a, b })
    .collect();

    order_unmatched_runs(
        &mut pairs,
        |pair| !pair.is_matched(),
        |pair| match (pair.a, pair.b) {
            (Some(i), _) => a.lines[i].top(),
            (None, Some(j)) => b.lines[j].top(),
            (None, None) => f64::INFINITY,
        },
    );

    debug!(
        lines_a = a.lines.len(),
        lines_b = b.lines.len(),
        matched = pairs.iter().filter(|p| p.is_matched()).count(),
        "aligned lines"
    );
    pairs
}

/// Cost of pairing two characters. Differing symbols cost at least
/// `mismatch_penalty`; overlapping identical symbols cost below
/// `1 - mismatch_penalty`, so at 0.5 any shared symbol beats any mismatch.
/// Characters that do not overlap cost the maximum.
pub fn char_substitution_cost(
    a: &CharacterCandidate,
    b: &CharacterCandidate,
    mismatch_penalty: f64,
) -> f64 {
    let iou = a.bbox.iou(&b.bbox);
    if iou <= 0.0 {
        return MAX_SUBSTITUTION_COST;
    }
    let spatial = (1.0 - mismatch_penalty) * (1.0 - iou);
    if a.symbol == b.symbol {
        spatial
    } else {
        mismatch_penalty + spatial
    }
}

/// Aligns the characters of one line pair. Either side may be absent, in
/// which case every position carries a single contributor.
pub fn align_line_chars(
    a: &NormalizedOcrResult,
    line_a: Option<&Line>,
    b: &NormalizedOcrResult,
    line_b: Option<&Line>,
    config: &FusionConfig,
) -> Vec<FusedPosition> {
    let seq_a: &[usize] = line_a.map(|line| line.members.as_slice()).unwrap_or_default();
    let seq_b: &[usize] = line_b.map(|line| line.members.as_slice()).unwrap_or_default();

    let substitution = |i: usize, j: usize| {
        char_substitution_cost(
            &a.candidates[seq_a[i]],
            &b.candidates[seq_b[j]],
            config.symbol_mismatch_penalty,
        )
    };

    let mut positions: Vec<FusedPosition> = align_sequences(
        seq_a.len(),
        seq_b.len(),
        config.char_gap_penalty,
        substitution,
    )
    .into_iter()
    .map(|(i, j)| FusedPosition::new(i.map(|i| seq_a[i]), j.map(|j| seq_b[j])))
    .collect();

    order_unmatched_runs(
        &mut positions,
        |pos| pos.contributor_count() < 2,
        |pos| match (pos.a, pos.b) {
            (Some(i), _) => a.candidates[i].bbox.x1,
            (None, Some(j)) => b.candidates[j].bbox.x1,
            (None, None) => f64::INFINITY,
        },
    );
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Rectangle;
    use crate::core::model::EngineId;
    use crate::fusion::lines::group_into_lines;
    use pretty_assertions::assert_eq;

    fn result(engine: EngineId, chars: &[(&str, f64, f64)]) -> NormalizedOcrResult {
        let candidates: Vec<CharacterCandidate> = chars
            .iter()
            .map(|&(symbol, x, y)| CharacterCandidate {
                symbol: symbol.to_string(),
                bbox: Rectangle::new(x, y, x + 20.0, y + 20.0),
                confidence: 0.8,
                engine,
            })
            .collect();
        let lines = group_into_lines(&candidates, 0.5);
        NormalizedOcrResult {
            engine,
            candidates,
            lines,
        }
    }

    #[test]
    fn identical_sequences_align_diagonally() {
        let path = align_sequences(3, 3, 0.45, |i, j| if i == j { 0.0 } else { 1.0 });
        assert_eq!(
            path,
            vec![(Some(0), Some(0)), (Some(1), Some(1)), (Some(2), Some(2))]
        );
    }

    #[test]
    fn equal_costs_prefer_substitution() {
        // Diagonal costs exactly two gaps.
        let path = align_sequences(1, 1, 0.5, |_, _| 1.0);
        assert_eq!(path, vec![(Some(0), Some(0))]);
    }

    #[test]
    fn unbounded_costs_still_terminate() {
        let path = align_sequences(2, 3, 0.45, |_, _| f64::NAN);
        assert_eq!(path.iter().filter(|(a, _)| a.is_some()).count(), 2);
        assert_eq!(path.iter().filter(|(_, b)| b.is_some()).count(), 3);
    }

    #[test]
    fn empty_side_yields_gaps_only() {
        let path = align_sequences(0, 2, 0.45, |_, _| 0.0);
        assert_eq!(path, vec![(None, Some(0)), (None, Some(1))]);
    }

    #[test]
    fn missing_line_is_left_unmatched() {
        let a = result(
            EngineId::A,
            &[("一", 0.0, 0.0), ("二", 0.0, 40.0), ("三", 0.0, 80.0)],
        );
        let b = result(EngineId::B, &[("一", 0.0, 1.0), ("三", 0.0, 81.0)]);
        let pairs = align_lines(&a, &b, &FusionConfig::default());
        assert_eq!(
            pairs,
            vec![
                LinePair { a: Some(0), b: Some(0) },
                LinePair { a: Some(1), b: None },
                LinePair { a: Some(2), b: Some(1) },
            ]
        );
    }

    #[test]
    fn disjoint_lines_never_pair() {
        let a = result(EngineId::A, &[("上", 0.0, 0.0)]);
        let b = result(EngineId::B, &[("下", 0.0, 200.0)]);
        let pairs = align_lines(&a, &b, &FusionConfig::default());
        assert_eq!(
            pairs,
            vec![
                LinePair { a: Some(0), b: None },
                LinePair { a: None, b: Some(0) },
            ]
        );
    }

    #[test]
    fn extra_character_becomes_single_contributor_slot() {
        let a = result(
            EngineId::A,
            &[("天", 0.0, 0.0), ("地", 22.0, 0.0), ("人", 44.0, 0.0)],
        );
        let b = result(EngineId::B, &[("天", 1.0, 0.0), ("人", 45.0, 0.0)]);
        let positions = align_line_chars(
            &a,
            a.lines.first(),
            &b,
            b.lines.first(),
            &FusionConfig::default(),
        );
        let slots: Vec<_> = positions.iter().map(|p| (p.a, p.b)).collect();
        assert_eq!(
            slots,
            vec![(Some(0), Some(0)), (Some(1), None), (Some(2), Some(1))]
        );
    }

    fn run(engine: EngineId, text: &str, width: f64) -> NormalizedOcrResult {
        let step = width / text.chars().count() as f64;
        let chars: Vec<(String, f64)> = text
            .chars()
            .enumerate()
            .map(|(idx, c)| (c.to_string(), idx as f64 * step))
            .collect();
        let candidates: Vec<CharacterCandidate> = chars
            .into_iter()
            .map(|(symbol, x)| CharacterCandidate {
                symbol,
                bbox: Rectangle::new(x, 0.0, x + step, 20.0),
                confidence: 0.8,
                engine,
            })
            .collect();
        let lines = group_into_lines(&candidates, 0.5);
        NormalizedOcrResult {
            engine,
            candidates,
            lines,
        }
    }

    #[test]
    fn same_symbol_outranks_closer_different_symbol() {
        let config = FusionConfig::default();
        let a = run(EngineId::A, "日出", 40.0);
        let b = run(EngineId::B, "日出东", 40.0);
        // A's 出 overlaps B's 东 more than B's 出.
        assert!(a.candidates[1].bbox.iou(&b.candidates[2].bbox)
            > a.candidates[1].bbox.iou(&b.candidates[1].bbox));
        assert!(
            char_substitution_cost(&a.candidates[1], &b.candidates[1], 0.5)
                < char_substitution_cost(&a.candidates[1], &b.candidates[2], 0.5)
        );

        let positions = align_line_chars(&a, a.lines.first(), &b, b.lines.first(), &config);
        let slots: Vec<_> = positions.iter().map(|p| (p.a, p.b)).collect();
        assert_eq!(
            slots,
            vec![(Some(0), Some(0)), (Some(1), Some(1)), (None, Some(2))]
        );
    }

    #[test]
    fn disjoint_characters_cost_the_maximum() {
        let a = run(EngineId::A, "口", 20.0);
        let mut b = run(EngineId::B, "口", 20.0);
        b.candidates[0].bbox = Rectangle::new(100.0, 0.0, 120.0, 20.0);
        assert_eq!(char_substitution_cost(&a.candidates[0], &b.candidates[0], 0.5), 1.0);
    }

    #[test]
    fn unmatched_runs_follow_geometry() {
        let a = result(EngineId::A, &[("甲", 50.0, 0.0)]);
        let b = result(EngineId::B, &[("乙", 0.0, 0.0)]);
        let positions = align_line_chars(
            &a,
            a.lines.first(),
            &b,
            b.lines.first(),
            &FusionConfig::default(),
        );
        let slots: Vec<_> = positions.iter().map(|p| (p.a, p.b)).collect();
        assert_eq!(slots, vec![(None, Some(0)), (Some(0), None)]);
    }
}
