//! Stages 6 and 7: reconstructs a lane-center path from the cleaned
//! boundaries, then checks it for the kind of divergence that signals an
//! intersection.

use rover_config::{DivergenceConfig, GeometryConfig, PathConfig};

use crate::boundary::Boundaries;

/// Which side(s) of the lane contributed to a sampled center point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSource {
    Both,
    LeftOnly,
    RightOnly,
}

/// One sampled point of the reconstructed lane-center path, band-center `y`
/// together with its `x` and which side(s) it came from.
#[derive(Debug, Clone, Copy)]
pub struct PathPoint {
    pub x: f32,
    pub y: i32,
    pub source: PathSource,
}

/// Resamples the ROI into `cfg.scanlines` equal horizontal bands from
/// bottom to top and computes one lane-center point per band.
///
/// When both boundaries have points in a band, the center is their
/// average. When only one side has points, the other is estimated using
/// the configured half-lane-width model (which narrows with distance, via
/// `lane_width_decrease_rate`). When neither side has points, the band is
/// skipped.
pub fn compute_lane_center(
    boundaries: &Boundaries,
    roi_height: u32,
    geometry: &GeometryConfig,
    cfg: &PathConfig,
) -> Vec<PathPoint> {
    compute_path(boundaries, roi_height, geometry, cfg, ForceSide::Either)
}

/// Which side(s) of the lane may be used to anchor the path; `Either`
/// behaves like [`compute_lane_center`], while `LeftOnly`/`RightOnly`
/// force the reconstruction to treat the other side as always missing.
/// Used when one side is known to be unreliable (e.g. mid-intersection).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceSide {
    Either,
    LeftOnly,
    RightOnly,
}

pub fn compute_path(
    boundaries: &Boundaries,
    roi_height: u32,
    geometry: &GeometryConfig,
    cfg: &PathConfig,
    force: ForceSide,
) -> Vec<PathPoint> {
    let half_lane_full = cfg.default_lane_width_of_roi * geometry.frame_w as f32 / 2.0;
    let band_h = roi_height as f32 / cfg.scanlines as f32;

    let mut points = Vec::with_capacity(cfg.scanlines);

    for band in 0..cfg.scanlines {
        let y0 = roi_height as f32 - (band as f32 + 1.0) * band_h;
        let y1 = roi_height as f32 - band as f32 * band_h;
        let band_center_y = ((y0 + y1) / 2.0).round() as i32;

        let left_x = if force == ForceSide::RightOnly {
            None
        } else {
            band_average(&boundaries.left, y0, y1)
        };
        let right_x = if force == ForceSide::LeftOnly {
            None
        } else {
            band_average(&boundaries.right, y0, y1)
        };

        // half-lane-width narrows toward the top of the ROI
        let depth_fraction = band as f32 / cfg.scanlines.max(1) as f32;
        let half_lane =
            (half_lane_full * (1.0 - cfg.lane_width_decrease_rate * depth_fraction)).max(1.0);

        let (x, source) = match (left_x, right_x) {
            (Some(l), Some(r)) => ((l + r) / 2.0, PathSource::Both),
            (Some(l), None) => (l + half_lane, PathSource::LeftOnly),
            (None, Some(r)) => (r - half_lane, PathSource::RightOnly),
            (None, None) => continue,
        };

        points.push(PathPoint {
            x,
            y: band_center_y,
            source,
        });
    }

    points
}

fn band_average(side: &[(i32, i32)], y0: f32, y1: f32) -> Option<f32> {
    let xs: Vec<f32> = side
        .iter()
        .filter(|&&(_, y)| (y as f32) >= y0 && (y as f32) < y1)
        .map(|&(x, _)| x as f32)
        .collect();

    if xs.is_empty() {
        None
    } else {
        Some(xs.iter().sum::<f32>() / xs.len() as f32)
    }
}

/// Result of testing a path for a lane that is diverging from straight —
/// the signature of an oncoming intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Divergence {
    None,
    Diverging,
}

/// Compares the spread between the left-forced and right-forced paths at
/// the middle and top of the ROI against three threshold tests; any single
/// test passing signals an intersection.
///
/// `left_path`/`right_path` are the path reconstructor's output with
/// `ForceSide::LeftOnly`/`ForceSide::RightOnly` respectively, and
/// `roi_height` is the ROI's pixel height (the `H` the band `y`s are
/// measured against).
pub fn detect_divergence(
    left_path: &[PathPoint],
    right_path: &[PathPoint],
    roi_height: u32,
    cfg: &DivergenceConfig,
) -> Divergence {
    let widths = widths_on_common_y(left_path, right_path);
    if widths.is_empty() {
        return Divergence::None;
    }

    let h = roi_height as f32;
    let min_y = widths.iter().map(|&(y, _)| y).fold(f32::MAX, f32::min);

    let middle: Vec<f32> = widths
        .iter()
        .filter(|&&(y, _)| y > h / 2.0 && y < 0.8 * h)
        .map(|&(_, w)| w)
        .collect();
    let top: Vec<f32> = widths
        .iter()
        .filter(|&&(y, _)| y <= min_y + 0.10 * h)
        .map(|&(_, w)| w)
        .collect();

    if middle.is_empty() || top.is_empty() {
        return Divergence::None;
    }

    let middle_avg = average(&middle);
    let top_avg = average(&top);

    if top_avg <= middle_avg {
        return Divergence::None;
    }

    let ratio = top_avg / middle_avg.max(1.0);
    let test1 = ratio >= cfg.divergence_threshold && top_avg > cfg.min_abs_divergence;
    let test2 = ratio >= cfg.divergence_threshold_2 && top_avg > cfg.min_abs_divergence_2;
    let test3 = top_avg > cfg.abs_divergence_threshold_top;

    if test1 || test2 || test3 {
        Divergence::Diverging
    } else {
        Divergence::None
    }
}

/// `(y, |right.x - left.x|)` for every band `y` present in both paths.
fn widths_on_common_y(left_path: &[PathPoint], right_path: &[PathPoint]) -> Vec<(f32, f32)> {
    use std::collections::BTreeMap;

    let left_by_y: BTreeMap<i32, f32> = left_path.iter().map(|p| (p.y, p.x)).collect();
    let right_by_y: BTreeMap<i32, f32> = right_path.iter().map(|p| (p.y, p.x)).collect();

    left_by_y
        .iter()
        .filter_map(|(y, &lx)| {
            right_by_y
                .get(y)
                .map(|&rx| (*y as f32, (rx - lx).abs()))
        })
        .collect()
}

fn average(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_lane(height: i32, width: i32) -> Boundaries {
        let left: Vec<(i32, i32)> = (0..height).map(|y| (100, y)).collect();
        let right: Vec<(i32, i32)> = (0..height).map(|y| (100 + width, y)).collect();
        Boundaries { left, right }
    }

    fn force_paths(boundaries: &Boundaries, roi_height: u32) -> (Vec<PathPoint>, Vec<PathPoint>) {
        let geometry = GeometryConfig::default();
        let cfg = PathConfig::default();
        let left = compute_path(boundaries, roi_height, &geometry, &cfg, ForceSide::LeftOnly);
        let right = compute_path(boundaries, roi_height, &geometry, &cfg, ForceSide::RightOnly);
        (left, right)
    }

    #[test]
    fn straight_lane_has_no_divergence() {
        let boundaries = straight_lane(300, 200);
        let (left, right) = force_paths(&boundaries, 300);
        let cfg = DivergenceConfig::default();
        assert_eq!(detect_divergence(&left, &right, 300, &cfg), Divergence::None);
    }

    #[test]
    fn flaring_lane_is_diverging() {
        let mut boundaries = straight_lane(300, 150);
        for (x, y) in boundaries.right.iter_mut() {
            let depth = 300 - *y;
            *x += depth * 3; // right edge drifts rightward sharply with distance
        }
        let (left, right) = force_paths(&boundaries, 300);
        let cfg = DivergenceConfig::default();
        assert_eq!(detect_divergence(&left, &right, 300, &cfg), Divergence::Diverging);
    }

    #[test]
    fn both_sides_present_averages_centers() {
        let boundaries = straight_lane(300, 200);
        let geometry = GeometryConfig::default();
        let cfg = PathConfig::default();
        let points = compute_lane_center(&boundaries, 300, &geometry, &cfg);
        assert_eq!(points.len(), cfg.scanlines);
        for p in &points {
            assert!(matches!(p.source, PathSource::Both));
            assert!((p.x - 200.0).abs() < 1.0);
        }
    }

    #[test]
    fn left_only_estimates_right_edge() {
        let left: Vec<(i32, i32)> = (0..300).map(|y| (100, y)).collect();
        let boundaries = Boundaries { left, right: vec![] };
        let geometry = GeometryConfig::default();
        let cfg = PathConfig::default();
        let points = compute_lane_center(&boundaries, 300, &geometry, &cfg);
        assert!(!points.is_empty());
        for p in &points {
            assert!(matches!(p.source, PathSource::LeftOnly));
            assert!(p.x > 100.0);
        }
    }
}
