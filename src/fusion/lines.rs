//! Clustering per-character candidates into horizontal lines.
//!
//! Membership is decided by vertical overlap relative to the smaller of the
//! two heights involved, so the grouping scales with the handwriting instead
//! of relying on pixel thresholds.

use crate::core::geometry::Rectangle;
use crate::core::model::{CharacterCandidate, Line};

/// Scale used when every box on a line is degenerate.
pub const MIN_CHAR_HEIGHT: f64 = 1.0;

/// Mean height over candidates with a positive height.
///
/// Returns `0.0` for an empty input and [`MIN_CHAR_HEIGHT`] when every box is
/// degenerate, so a non-empty line always has a positive scale.
pub fn calculate_avg_char_height<'a, I>(candidates: I) -> f64
where
    I: IntoIterator<Item = &'a CharacterCandidate>,
{
    let mut seen = 0usize;
    let mut total = 0.0;
    let mut counted = 0usize;
    for candidate in candidates {
        seen += 1;
        let height = candidate.bbox.height();
        if height > 0.0 && height.is_finite() {
            total += height;
            counted += 1;
        }
    }
    if seen == 0 {
        0.0
    } else if counted == 0 {
        MIN_CHAR_HEIGHT
    } else {
        total / counted as f64
    }
}

/// Shared vertical extent as a fraction of the smaller height.
///
/// A zero-height box counts as fully overlapping when its centre lies inside
/// the other box's vertical interval.
pub fn vertical_overlap_ratio(a: &Rectangle, b: &Rectangle) -> f64 {
    let min_height = a.height().min(b.height());
    if min_height <= 0.0 {
        let inside = |flat: &Rectangle, other: &Rectangle| {
            let cy = flat.center().1;
            flat.height() <= 0.0 && cy >= other.y1 && cy <= other.y2
        };
        return if inside(a, b) || inside(b, a) { 1.0 } else { 0.0 };
    }
    a.vertical_overlap(b) / min_height
}

pub fn lines_overlap(a: &Line, b: &Line, threshold: f64) -> bool {
    vertical_overlap_ratio(&a.bounds, &b.bounds) > threshold
}

/// Closeness of two lines in `[0, 1]`: vertical centre distance relative to
/// character height, blended with the IoU of the line bounds.
pub fn geometric_similarity(a: &Line, b: &Line) -> f64 {
    let scale = a.avg_char_height.max(b.avg_char_height).max(MIN_CHAR_HEIGHT);
    let dy = (a.bounds.center().1 - b.bounds.center().1).abs();
    let closeness = (1.0 - dy / scale).max(0.0);
    let overlap = a.bounds.iou(&b.bounds);
    (0.6 * closeness + 0.4 * overlap).clamp(0.0, 1.0)
}

struct Band {
    members: Vec<usize>,
    top_sum: f64,
    bottom_sum: f64,
}

impl Band {
    fn extent(&self) -> Rectangle {
        let n = self.members.len().max(1) as f64;
        Rectangle::new(0.0, self.top_sum / n, 0.0, self.bottom_sum / n)
    }

    fn push(&mut self, idx: usize, bbox: &Rectangle) {
        self.members.push(idx);
        self.top_sum += bbox.y1;
        self.bottom_sum += bbox.y2;
    }
}

/// Groups candidates into lines sorted top to bottom, members left to right.
///
/// Candidates are visited by vertical centre; each joins the band whose mean
/// vertical extent it overlaps most, provided the overlap exceeds
/// `threshold`, otherwise it opens a new band.
pub fn group_into_lines(candidates: &[CharacterCandidate], threshold: f64) -> Vec<Line> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&i, &j| {
        let (a, b) = (&candidates[i].bbox, &candidates[j].bbox);
        a.center()
            .1
            .total_cmp(&b.center().1)
            .then(a.x1.total_cmp(&b.x1))
    });

    let mut bands: Vec<Band> = Vec::new();
    for idx in order {
        let bbox = &candidates[idx].bbox;
        let mut best: Option<(usize, f64)> = None;
        for (band_idx, band) in bands.iter().enumerate() {
            let ratio = vertical_overlap_ratio(bbox, &band.extent());
            if ratio > threshold && best.map_or(true, |(_, r)| ratio > r) {
                best = Some((band_idx, ratio));
            }
        }
        match best {
            Some((band_idx, _)) => bands[band_idx].push(idx, bbox),
            None => {
                let mut band = Band {
                    members: Vec::new(),
                    top_sum: 0.0,
                    bottom_sum: 0.0,
                };
                band.push(idx, bbox);
                bands.push(band);
            }
        }
    }

    let mut lines: Vec<Line> = bands
        .into_iter()
        .map(|band| build_line(candidates, band.members))
        .collect();
    lines.sort_by(|a, b| {
        a.top()
            .total_cmp(&b.top())
            .then(a.bounds.x1.total_cmp(&b.bounds.x1))
    });
    lines
}

fn build_line(candidates: &[CharacterCandidate], mut members: Vec<usize>) -> Line {
    members.sort_by(|&i, &j| {
        let (a, b) = (&candidates[i].bbox, &candidates[j].bbox);
        a.x1.total_cmp(&b.x1)
            .then(a.center().0.total_cmp(&b.center().0))
            .then(i.cmp(&j))
    });
    let bounds = members
        .iter()
        .map(|&idx| candidates[idx].bbox)
        .reduce(|acc, bbox| acc.union(&bbox))
        .unwrap_or(Rectangle::new(0.0, 0.0, 0.0, 0.0));
    let avg_char_height = calculate_avg_char_height(members.iter().map(|&idx| &candidates[idx]));
    Line {
        members,
        bounds,
        avg_char_height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::EngineId;
    use pretty_assertions::assert_eq;

    fn cand(symbol: &str, x: f64, y: f64, w: f64, h: f64) -> CharacterCandidate {
        CharacterCandidate {
            symbol: symbol.to_string(),
            bbox: Rectangle::new(x, y, x + w, y + h),
            confidence: 0.9,
            engine: EngineId::A,
        }
    }

    fn text(candidates: &[CharacterCandidate], line: &Line) -> String {
        line.members
            .iter()
            .map(|&i| candidates[i].symbol.as_str())
            .collect()
    }

    #[test]
    fn avg_height_skips_degenerate_boxes() {
        let cs = vec![
            cand("a", 0.0, 0.0, 10.0, 20.0),
            cand("b", 10.0, 0.0, 10.0, 0.0),
            cand("c", 20.0, 0.0, 10.0, 30.0),
        ];
        assert_eq!(calculate_avg_char_height(&cs), 25.0);
    }

    #[test]
    fn avg_height_is_positive_for_degenerate_only_input() {
        let cs = vec![cand("a", 0.0, 5.0, 10.0, 0.0)];
        assert!(calculate_avg_char_height(&cs) > 0.0);
        assert_eq!(calculate_avg_char_height(&Vec::<CharacterCandidate>::new()), 0.0);
    }

    #[test]
    fn groups_wavy_handwriting_into_lines() {
        let cs = vec![
            cand("d", 0.0, 62.0, 20.0, 22.0),
            cand("b", 22.0, 3.0, 20.0, 24.0),
            cand("a", 0.0, 0.0, 20.0, 20.0),
            cand("e", 21.0, 58.0, 20.0, 20.0),
            cand("c", 44.0, 6.0, 20.0, 18.0),
        ];
        let lines = group_into_lines(&cs, 0.5);
        assert_eq!(lines.len(), 2);
        assert_eq!(text(&cs, &lines[0]), "abc");
        assert_eq!(text(&cs, &lines[1]), "de");
        assert!(lines.iter().all(|l| l.avg_char_height > 0.0));
    }

    #[test]
    fn degenerate_box_stays_on_its_line() {
        let cs = vec![
            cand("a", 0.0, 0.0, 20.0, 20.0),
            cand(".", 20.0, 18.0, 4.0, 0.0),
            cand("b", 30.0, 0.0, 20.0, 20.0),
        ];
        let lines = group_into_lines(&cs, 0.5);
        assert_eq!(lines.len(), 1);
        assert_eq!(text(&cs, &lines[0]), "a.b");
        assert_eq!(lines[0].avg_char_height, 20.0);
    }

    #[test]
    fn overlap_predicate_uses_smaller_height() {
        let small = Rectangle::new(0.0, 0.0, 10.0, 10.0);
        let tall = Rectangle::new(0.0, 4.0, 10.0, 104.0);
        assert_eq!(vertical_overlap_ratio(&small, &tall), 0.6);
        assert_eq!(vertical_overlap_ratio(&tall, &small), 0.6);
    }

    #[test]
    fn similarity_prefers_vertically_close_lines() {
        let cs = vec![
            cand("a", 0.0, 0.0, 20.0, 20.0),
            cand("b", 0.0, 2.0, 20.0, 20.0),
            cand("c", 0.0, 60.0, 20.0, 20.0),
        ];
        let line = |i: usize| build_line(&cs, vec![i]);
        let near = geometric_similarity(&line(0), &line(1));
        let far = geometric_similarity(&line(0), &line(2));
        assert!(near > 0.8);
        assert_eq!(far, 0.0);
        assert!(lines_overlap(&line(0), &line(1), 0.5));
        assert!(!lines_overlap(&line(0), &line(2), 0.5));
    }
}
