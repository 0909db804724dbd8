use crate::core::model::{BreakDecision, FusionOutput, Glyph};
use crate::fusion::breaks::insert_breaks_into_text;

/// Flattens per-line glyphs into the output, joining line texts with the
/// break markers. `breaks[i]` sits between line `i` and line `i + 1`.
///
/// A line that produced no glyphs is skipped and the strongest break around
/// it is kept.
pub fn assemble(lines: Vec<Vec<Glyph>>, breaks: &[BreakDecision]) -> FusionOutput {
    let mut texts: Vec<String> = Vec::with_capacity(lines.len());
    let mut kept_breaks: Vec<BreakDecision> = Vec::with_capacity(breaks.len());
    let mut pending: Option<BreakDecision> = None;
    let mut glyphs = Vec::new();

    for (idx, line) in lines.into_iter().enumerate() {
        let before = idx
            .checked_sub(1)
            .map(|i| breaks.get(i).copied().unwrap_or(BreakDecision::Line));
        if let Some(decision) = before {
            pending = Some(pending.map_or(decision, |p| p.max(decision)));
        }
        if line.is_empty() {
            continue;
        }
        if !texts.is_empty() {
            kept_breaks.push(pending.unwrap_or(BreakDecision::Line));
        }
        pending = None;
        texts.push(line.iter().map(|g| g.symbol.as_str()).collect());
        glyphs.extend(line);
    }

    FusionOutput {
        glyphs,
        full_text: insert_breaks_into_text(&texts, &kept_breaks),
        debug: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Rectangle;
    use crate::core::model::Provenance;
    use pretty_assertions::assert_eq;

    fn glyphs(text: &str) -> Vec<Glyph> {
        text.chars()
            .map(|c| Glyph {
                symbol: c.to_string(),
                bbox: Rectangle::new(0.0, 0.0, 1.0, 1.0),
                confidence: 0.5,
                provenance: Provenance::A,
            })
            .collect()
    }

    #[test]
    fn joins_lines_with_markers() {
        let output = assemble(
            vec![glyphs("你好"), glyphs("世界")],
            &[BreakDecision::Paragraph],
        );
        assert_eq!(output.full_text, "你好\n\n世界");
        assert_eq!(output.symbols(), vec!["你", "好", "世", "界"]);
    }

    #[test]
    fn empty_line_keeps_strongest_neighbouring_break() {
        let output = assemble(
            vec![glyphs("甲"), Vec::new(), glyphs("乙")],
            &[BreakDecision::None, BreakDecision::Paragraph],
        );
        assert_eq!(output.full_text, "甲\n\n乙");
    }

    #[test]
    fn no_lines_is_empty_output() {
        let output = assemble(Vec::new(), &[]);
        assert!(output.glyphs.is_empty());
        assert_eq!(output.full_text, "");
    }
}
