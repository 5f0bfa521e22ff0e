//! Color matcher: locate regions whose pixels fall inside channel ranges.

use super::base::{self, Recognizer};
use super::types::{MatchResult, OrderBy, Rect, RecoResult};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{BorderType, find_contours};
use imageproc::point::Point as ContourPoint;
use imageproc::region_labelling::{Connectivity, connected_components};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

pub const ALGORITHM: &str = "ColorMatch";

/// Color space the range test runs in. Frames arrive as RGB; the other
/// spaces are converted per pixel before testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColorSpace {
    /// Native channel order of captured frames; no conversion.
    #[default]
    Rgb,
    /// OpenCV-style HSV: H in `[0, 179]`, S and V in `[0, 255]`.
    Hsv,
    /// RGB with the first and third channel swapped.
    Bgr,
}

/// Per-call color matching configuration.
#[derive(Debug, Clone)]
pub struct ColorMatcherParam {
    /// `(lower, upper)` channel bound pairs; a pixel is in range when all
    /// three channels fall inside any one pair. Empty means zero candidates.
    pub ranges: Vec<([u8; 3], [u8; 3])>,
    pub color_space: ColorSpace,
    /// Minimum qualifying pixel/area count for a region to pass filtering.
    pub count: u32,
    /// `true`: 8-connected component per region, score = pixel area.
    /// `false`: external contour per region, score = contour area.
    pub connected: bool,
    pub order_by: OrderBy,
    pub result_index: i64,
}

impl Default for ColorMatcherParam {
    fn default() -> Self {
        Self {
            ranges: Vec::new(),
            color_space: ColorSpace::default(),
            count: 1,
            connected: false,
            order_by: OrderBy::default(),
            result_index: 0,
        }
    }
}

/// Finds screen regions whose pixels fall within the configured color
/// ranges, either as connected components or as separate contours.
pub struct ColorMatcher {
    param: ColorMatcherParam,
}

impl ColorMatcher {
    pub fn new(param: ColorMatcherParam) -> Self {
        Self { param }
    }

    /// Binary mask of the pixels matching any configured range, 255 = hit.
    fn build_mask(&self, sub: &RgbImage) -> GrayImage {
        GrayImage::from_fn(sub.width(), sub.height(), |x, y| {
            let channels = convert_pixel(self.param.color_space, sub.get_pixel(x, y).0);
            let hit = self.param.ranges.iter().any(|(lower, upper)| {
                (0..3).all(|i| lower[i] <= channels[i] && channels[i] <= upper[i])
            });
            Luma([if hit { 255u8 } else { 0 }])
        })
    }
}

impl Recognizer for ColorMatcher {
    fn analyze(&self, frame: &RgbImage, roi: Option<Rect>) -> RecoResult {
        let start = Instant::now();
        let mut result = RecoResult::new(ALGORITHM);

        let roi = base::resolve_roi(frame, roi);
        if self.param.ranges.is_empty() || !roi.is_valid() {
            result.cost_ms = start.elapsed().as_secs_f64() * 1000.0;
            return result;
        }

        let sub = base::crop_to_roi(frame, roi);
        let mask = self.build_mask(&sub);

        let mut all = if self.param.connected {
            connected_regions(&mask)
        } else {
            contour_regions(&mask)
        };
        // Map boxes back to frame coordinates.
        for region in &mut all {
            region.box_.x += roi.x;
            region.box_.y += roi.y;
        }

        let filtered: Vec<MatchResult> = all
            .iter()
            .filter(|r| r.score >= self.param.count as f64)
            .cloned()
            .collect();
        log::debug!(
            "color match found {} regions, {} above count {}",
            all.len(),
            filtered.len(),
            self.param.count
        );

        result.all_results = base::sort_results(all, self.param.order_by);
        result.filtered_results = base::sort_results(filtered, self.param.order_by);
        result.best_result =
            base::select_result(&result.filtered_results, self.param.result_index);
        result.cost_ms = start.elapsed().as_secs_f64() * 1000.0;
        result
    }
}

fn convert_pixel(space: ColorSpace, [r, g, b]: [u8; 3]) -> [u8; 3] {
    match space {
        ColorSpace::Rgb => [r, g, b],
        ColorSpace::Bgr => [b, g, r],
        ColorSpace::Hsv => rgb_to_hsv(r, g, b),
    }
}

/// RGB to OpenCV-convention HSV: H in `[0, 179]`, S and V in `[0, 255]`.
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let rf = r as f32 / 255.0;
    let gf = g as f32 / 255.0;
    let bf = b as f32 / 255.0;
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let hue_deg = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (((gf - bf) / delta).rem_euclid(6.0))
    } else if max == gf {
        60.0 * ((bf - rf) / delta + 2.0)
    } else {
        60.0 * ((rf - gf) / delta + 4.0)
    };

    let h = ((hue_deg / 2.0).round() as i32).rem_euclid(180) as u8;
    let s = if max == 0.0 {
        0
    } else {
        (delta / max * 255.0).round() as u8
    };
    let v = (max * 255.0).round() as u8;
    [h, s, v]
}

/// One result per 8-connected component, tight bounding box, score = pixel
/// area. Label order keeps the extraction deterministic.
fn connected_regions(mask: &GrayImage) -> Vec<MatchResult> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    // label -> (min_x, min_y, max_x, max_y, pixel count)
    let mut stats: BTreeMap<u32, (u32, u32, u32, u32, u64)> = BTreeMap::new();
    for (x, y, pixel) in labels.enumerate_pixels() {
        let label = pixel[0];
        if label == 0 {
            continue;
        }
        let entry = stats.entry(label).or_insert((x, y, x, y, 0));
        entry.0 = entry.0.min(x);
        entry.1 = entry.1.min(y);
        entry.2 = entry.2.max(x);
        entry.3 = entry.3.max(y);
        entry.4 += 1;
    }

    stats
        .into_values()
        .map(|(min_x, min_y, max_x, max_y, count)| {
            let box_ = Rect::new(
                min_x as i32,
                min_y as i32,
                (max_x - min_x + 1) as i32,
                (max_y - min_y + 1) as i32,
            );
            MatchResult::new(box_, count as f64)
        })
        .collect()
}

/// One result per top-level external contour, score = polygon area;
/// contours with an area below one pixel are discarded as noise. Regions
/// nested inside another region's hole belong to that region's hierarchy
/// and are not reported separately.
fn contour_regions(mask: &GrayImage) -> Vec<MatchResult> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .filter_map(|contour| {
            if contour.points.is_empty() {
                return None;
            }
            let area = polygon_area(&contour.points);
            if area < 1.0 {
                return None;
            }

            let min_x = contour.points.iter().map(|p| p.x).min()?;
            let min_y = contour.points.iter().map(|p| p.y).min()?;
            let max_x = contour.points.iter().map(|p| p.x).max()?;
            let max_y = contour.points.iter().map(|p| p.y).max()?;
            let box_ = Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1);
            Some(MatchResult::new(box_, area))
        })
        .collect()
}

/// Shoelace area of a closed contour polygon.
fn polygon_area(points: &[ContourPoint<i32>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut doubled = 0i64;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        doubled += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
    }
    doubled.unsigned_abs() as f64 / 2.0
}
