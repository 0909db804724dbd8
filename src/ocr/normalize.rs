//! Splits word- and line-level detections into per-character candidates.

use tracing::warn;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

use crate::core::confidence::normalize_confidence;
use crate::core::config::{FusionConfig, RunLayout};
use crate::core::model::{CharacterCandidate, EngineId, NormalizedOcrResult};
use crate::fusion::lines::group_into_lines;
use crate::ocr::bridge::RawDetection;

/// Expands a detection into one candidate per grapheme.
///
/// Each grapheme gets an equal slot of the run's box along the configured
/// layout axis and inherits the run's confidence. Whitespace graphemes take a
/// slot but produce no candidate. Returns `None` for malformed detections.
pub fn split_detection(
    engine: EngineId,
    detection: &RawDetection,
    layout: RunLayout,
) -> Option<Vec<CharacterCandidate>> {
    let bbox = detection.region.to_rectangle()?;
    let confidence = normalize_confidence(detection.confidence)?;
    let text: String = detection.text.nfc().collect();
    let graphemes: Vec<&str> = text.graphemes(true).collect();
    if graphemes.iter().all(|g| g.trim().is_empty()) {
        return None;
    }
    let vertical = layout == RunLayout::Vertical;
    Some(
        graphemes
            .iter()
            .enumerate()
            .filter(|(_, g)| !g.trim().is_empty())
            .map(|(idx, g)| CharacterCandidate {
                symbol: (*g).to_string(),
                bbox: bbox.slice(idx, graphemes.len(), vertical),
                confidence,
                engine,
            })
            .collect(),
    )
}

/// Normalizes one engine's detections into reading-ordered candidates and
/// their lines. Malformed detections are dropped with a warning.
pub fn normalize_detections(
    engine: EngineId,
    detections: &[RawDetection],
    config: &FusionConfig,
) -> NormalizedOcrResult {
    let mut candidates = Vec::new();
    for (index, detection) in detections.iter().enumerate() {
        match split_detection(engine, detection, config.run_layout) {
            Some(chars) => candidates.extend(chars),
            None => warn!(
                %engine,
                index,
                reason = malformed_reason(detection),
                "dropping malformed detection"
            ),
        }
    }

    let mut lines = group_into_lines(&candidates, config.line_overlap_threshold);

    // Store candidates in reading order so each line is a contiguous run.
    let mut slots: Vec<Option<CharacterCandidate>> = candidates.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(slots.len());
    for line in &mut lines {
        for member in &mut line.members {
            if let Some(candidate) = slots[*member].take() {
                *member = ordered.len();
                ordered.push(candidate);
            }
        }
    }

    NormalizedOcrResult {
        engine,
        candidates: ordered,
        lines,
    }
}

fn malformed_reason(detection: &RawDetection) -> &'static str {
    if detection.region.to_rectangle().is_none() {
        "box needs 4 finite coordinates or 4 points"
    } else if normalize_confidence(detection.confidence).is_none() {
        "confidence is not a finite number"
    } else {
        "text is empty"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Rectangle;
    use crate::ocr::bridge::Region;
    use pretty_assertions::assert_eq;

    fn det(coords: &[f64], text: &str, confidence: f64) -> RawDetection {
        RawDetection::new(Region::Coords(coords.to_vec()), text, confidence)
    }

    #[test]
    fn interpolates_boxes_across_run() {
        let result = normalize_detections(
            EngineId::A,
            &[det(&[0.0, 0.0, 60.0, 20.0], "永字八", 0.8)],
            &FusionConfig::default(),
        );
        let boxes: Vec<_> = result.candidates.iter().map(|c| c.bbox).collect();
        assert_eq!(
            boxes,
            vec![
                Rectangle::new(0.0, 0.0, 20.0, 20.0),
                Rectangle::new(20.0, 0.0, 40.0, 20.0),
                Rectangle::new(40.0, 0.0, 60.0, 20.0),
            ]
        );
        assert!(result.candidates.iter().all(|c| c.confidence == 0.8));
        assert_eq!(result.lines.len(), 1);
    }

    #[test]
    fn vertical_layout_slices_top_to_bottom() {
        let config = FusionConfig {
            run_layout: RunLayout::Vertical,
            ..FusionConfig::default()
        };
        let chars = split_detection(
            EngineId::B,
            &det(&[0.0, 0.0, 20.0, 40.0], "上下", 0.5),
            config.run_layout,
        )
        .unwrap();
        assert_eq!(chars[1].bbox, Rectangle::new(0.0, 20.0, 20.0, 40.0));
    }

    #[test]
    fn keeps_combining_sequences_together() {
        let chars = split_detection(
            EngineId::A,
            &det(&[0.0, 0.0, 20.0, 10.0], "e\u{301}a", 0.9),
            RunLayout::Horizontal,
        )
        .unwrap();
        let symbols: Vec<_> = chars.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["\u{e9}", "a"]);
    }

    #[test]
    fn whitespace_occupies_a_slot_without_a_candidate() {
        let chars = split_detection(
            EngineId::A,
            &det(&[0.0, 0.0, 30.0, 10.0], "a b", 0.9),
            RunLayout::Horizontal,
        )
        .unwrap();
        assert_eq!(chars.len(), 2);
        assert_eq!(chars[1].bbox, Rectangle::new(20.0, 0.0, 30.0, 10.0));
    }

    #[test]
    fn drops_malformed_detections_without_failing() {
        let detections = vec![
            det(&[0.0, 0.0, 10.0], "短", 0.9),
            det(&[0.0, 0.0, 10.0, 10.0], "", 0.9),
            det(&[0.0, 0.0, 10.0, 10.0], "   ", 0.9),
            det(&[0.0, 0.0, 10.0, 10.0], "坏", f64::NAN),
            det(&[0.0, 0.0, 10.0, 10.0], "好", 1.7),
        ];
        let result = normalize_detections(EngineId::A, &detections, &FusionConfig::default());
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].symbol, "好");
        assert_eq!(result.candidates[0].confidence, 1.0);
    }

    #[test]
    fn orders_candidates_by_line_then_x() {
        let detections = vec![
            det(&[0.0, 50.0, 40.0, 70.0], "三四", 0.9),
            det(&[45.0, 2.0, 65.0, 22.0], "二", 0.9),
            det(&[0.0, 0.0, 20.0, 20.0], "一", 0.9),
        ];
        let result = normalize_detections(EngineId::A, &detections, &FusionConfig::default());
        assert_eq!(result.text(), "一二\n三四");
        assert_eq!(result.lines[0].members, vec![0, 1]);
        assert_eq!(result.lines[1].members, vec![2, 3]);
    }
}
