//! Shared recognizer infrastructure: ROI handling, result ordering,
//! non-maximum suppression and index resolution.
//!
//! Concrete matchers compose with these free functions; there is no base
//! type to instantiate.

use super::types::{MatchResult, OrderBy, Rect, RecoResult};
use image::RgbImage;
use rand::seq::SliceRandom;
use std::cmp::Ordering;

/// The single capability interface the pipeline dispatches recognition
/// through. `roi = None` means the whole frame.
pub trait Recognizer {
    fn analyze(&self, frame: &RgbImage, roi: Option<Rect>) -> RecoResult;
}

/// Resolve an optional ROI against a frame. Absent means the whole frame;
/// a rectangle reaching past the frame is clipped to its extents.
pub fn resolve_roi(frame: &RgbImage, roi: Option<Rect>) -> Rect {
    let full = Rect::new(0, 0, frame.width() as i32, frame.height() as i32);
    match roi {
        None => full,
        Some(rect) => {
            let clipped = rect.clipped_to(frame.width(), frame.height());
            if clipped != rect {
                log::warn!(
                    "roi {:?} exceeds frame {}x{}, clipped to {:?}",
                    rect.to_list(),
                    frame.width(),
                    frame.height(),
                    clipped.to_list()
                );
            }
            clipped
        }
    }
}

/// Copy the ROI sub-image out of a frame. `roi` must already be clipped.
pub fn crop_to_roi(frame: &RgbImage, roi: Rect) -> RgbImage {
    image::imageops::crop_imm(
        frame,
        roi.x as u32,
        roi.y as u32,
        roi.width as u32,
        roi.height as u32,
    )
    .to_image()
}

/// Order results by the requested strategy. Stable for ties, so equal keys
/// keep their original relative order.
pub fn sort_results(mut results: Vec<MatchResult>, order_by: OrderBy) -> Vec<MatchResult> {
    match order_by {
        OrderBy::Horizontal => results.sort_by_key(|r| (r.box_.x, r.box_.y)),
        OrderBy::Vertical => results.sort_by_key(|r| (r.box_.y, r.box_.x)),
        OrderBy::Score => results.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal)
        }),
        OrderBy::Area => results.sort_by_key(|r| std::cmp::Reverse(r.box_.area())),
        OrderBy::Random => results.shuffle(&mut rand::thread_rng()),
    }
    results
}

/// Intersection-over-union of two rectangles. Zero when they do not
/// overlap or either rectangle is degenerate.
pub fn iou(a: Rect, b: Rect) -> f64 {
    let Some(inter) = a.intersection(&b) else {
        return 0.0;
    };
    let inter_area = inter.area() as f64;
    let union = (a.area() + b.area()) as f64 - inter_area;
    if union > 0.0 { inter_area / union } else { 0.0 }
}

/// Greedy non-maximum suppression.
///
/// Drops results below `score_threshold`, then repeatedly keeps the
/// highest-scoring remaining result and discards every other result whose
/// IoU with it reaches `iou_threshold`. Deterministic: equal scores keep
/// their original relative order.
pub fn nms(results: &[MatchResult], iou_threshold: f64, score_threshold: f64) -> Vec<MatchResult> {
    let mut remaining: Vec<MatchResult> = results
        .iter()
        .filter(|r| r.score >= score_threshold)
        .cloned()
        .collect();
    remaining.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut keep = Vec::new();
    while !remaining.is_empty() {
        let best = remaining.remove(0);
        remaining.retain(|r| iou(best.box_, r.box_) < iou_threshold);
        keep.push(best);
    }
    keep
}

/// Default thresholds for [`nms`].
pub const NMS_IOU_THRESHOLD: f64 = 0.5;
pub const NMS_SCORE_THRESHOLD: f64 = 0.0;

/// Resolve a possibly-negative logical index into a list of `length`
/// elements. Negative values count from the end (`-1` = last); anything
/// resolving outside `[0, length)` is `None`.
pub fn pythonic_index(length: usize, index: i64) -> Option<usize> {
    if length == 0 {
        return None;
    }
    let resolved = if index < 0 {
        length as i64 + index
    } else {
        index
    };
    if (0..length as i64).contains(&resolved) {
        Some(resolved as usize)
    } else {
        None
    }
}

/// Pick the result at the logical `index` of an already-ordered list.
pub fn select_result(results: &[MatchResult], index: i64) -> Option<MatchResult> {
    pythonic_index(results.len(), index).map(|i| results[i].clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_at(x: i32, y: i32) -> MatchResult {
        MatchResult::new(Rect::new(x, y, 10, 10), 0.5)
    }

    fn result_scored(x: i32, y: i32, w: i32, h: i32, score: f64) -> MatchResult {
        MatchResult::new(Rect::new(x, y, w, h), score)
    }

    #[test]
    fn horizontal_ordering_breaks_ties_by_y() {
        let results = vec![result_at(5, 0), result_at(1, 0), result_at(1, 5)];
        let sorted = sort_results(results, OrderBy::Horizontal);
        let positions: Vec<(i32, i32)> =
            sorted.iter().map(|r| (r.box_.x, r.box_.y)).collect();
        assert_eq!(positions, vec![(1, 0), (1, 5), (5, 0)]);
    }

    #[test]
    fn vertical_ordering_breaks_ties_by_x() {
        let results = vec![result_at(5, 0), result_at(1, 0), result_at(1, 5)];
        let sorted = sort_results(results, OrderBy::Vertical);
        let positions: Vec<(i32, i32)> =
            sorted.iter().map(|r| (r.box_.x, r.box_.y)).collect();
        assert_eq!(positions, vec![(1, 0), (5, 0), (1, 5)]);
    }

    #[test]
    fn score_and_area_order_descending() {
        let results = vec![
            result_scored(0, 0, 2, 2, 0.3),
            result_scored(0, 0, 5, 5, 0.9),
            result_scored(0, 0, 3, 3, 0.6),
        ];
        let by_score = sort_results(results.clone(), OrderBy::Score);
        assert_eq!(by_score[0].score, 0.9);
        assert_eq!(by_score[2].score, 0.3);

        let by_area = sort_results(results, OrderBy::Area);
        assert_eq!(by_area[0].box_.area(), 25);
        assert_eq!(by_area[2].box_.area(), 4);
    }

    #[test]
    fn random_ordering_keeps_all_results() {
        let results: Vec<MatchResult> = (0..8).map(|i| result_at(i, 0)).collect();
        let shuffled = sort_results(results.clone(), OrderBy::Random);
        assert_eq!(shuffled.len(), results.len());
        for r in &results {
            assert!(shuffled.contains(r));
        }
    }

    #[test]
    fn iou_is_symmetric_and_bounded() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(iou(a, b), iou(b, a));
        assert_eq!(iou(a, a), 1.0);
        assert_eq!(iou(a, Rect::new(50, 50, 10, 10)), 0.0);
        assert!(iou(a, b) > 0.0 && iou(a, b) < 1.0);
    }

    #[test]
    fn nms_suppresses_overlapping_boxes() {
        let results = vec![
            result_scored(0, 0, 10, 10, 0.9),
            result_scored(1, 1, 10, 10, 0.8), // heavy overlap with the first
            result_scored(50, 50, 10, 10, 0.7),
        ];
        let kept = nms(&results, 0.5, 0.0);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.9);
        assert_eq!(kept[1].score, 0.7);
    }

    #[test]
    fn nms_is_idempotent() {
        let results = vec![
            result_scored(0, 0, 10, 10, 0.9),
            result_scored(2, 2, 10, 10, 0.8),
            result_scored(4, 4, 10, 10, 0.7),
            result_scored(40, 40, 10, 10, 0.6),
        ];
        let once = nms(&results, 0.5, 0.0);
        let twice = nms(&once, 0.5, 0.0);
        assert_eq!(once, twice);
    }

    #[test]
    fn nms_looser_iou_threshold_keeps_at_least_as_many() {
        let results: Vec<MatchResult> = (0..6)
            .map(|i| result_scored(i * 3, 0, 10, 10, 0.9 - i as f64 * 0.05))
            .collect();
        for (t1, t2) in [(0.2, 0.5), (0.3, 0.8), (0.0, 1.0)] {
            let strict = nms(&results, t1, 0.0);
            let loose = nms(&results, t2, 0.0);
            assert!(
                strict.len() <= loose.len(),
                "nms({t1}) kept {} > nms({t2}) kept {}",
                strict.len(),
                loose.len()
            );
        }
    }

    #[test]
    fn nms_applies_score_threshold_first() {
        let results = vec![
            result_scored(0, 0, 10, 10, 0.9),
            result_scored(50, 50, 10, 10, 0.2),
        ];
        let kept = nms(&results, 0.5, 0.5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].score, 0.9);
    }

    #[test]
    fn pythonic_index_resolves_negatives() {
        assert_eq!(pythonic_index(3, -1), Some(2));
        assert_eq!(pythonic_index(3, -3), Some(0));
        assert_eq!(pythonic_index(3, -4), None);
        assert_eq!(pythonic_index(3, 0), Some(0));
        assert_eq!(pythonic_index(3, 5), None);
        assert_eq!(pythonic_index(0, 0), None);
    }

    #[test]
    fn roi_resolution_defaults_to_whole_frame() {
        let frame = RgbImage::new(64, 48);
        assert_eq!(resolve_roi(&frame, None), Rect::new(0, 0, 64, 48));
        assert_eq!(
            resolve_roi(&frame, Some(Rect::new(10, 10, 200, 200))),
            Rect::new(10, 10, 54, 38)
        );
    }

    #[test]
    fn crop_extracts_the_sub_image() {
        let frame = RgbImage::from_fn(8, 8, |x, y| {
            image::Rgb([x as u8, y as u8, 0])
        });
        let sub = crop_to_roi(&frame, Rect::new(2, 3, 4, 2));
        assert_eq!(sub.width(), 4);
        assert_eq!(sub.height(), 2);
        assert_eq!(sub.get_pixel(0, 0), &image::Rgb([2, 3, 0]));
    }
}
