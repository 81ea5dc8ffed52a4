//! Stage 5: turns labeled stop-line/left/right clusters into two clean
//! boundary point sequences, one per side, indexed by row.

use rover_config::BoundaryConfig;

use crate::cluster::{cluster_points, Cluster, ClusterType, PointMethod};

/// A single boundary point in ROI-local coordinates.
pub type BoundaryPoint = (i32, i32);

/// Left and right lane boundary points, sorted by ascending `y`, with at
/// most one point per `y`.
#[derive(Debug, Clone, Default)]
pub struct Boundaries {
    pub left: Vec<BoundaryPoint>,
    pub right: Vec<BoundaryPoint>,
}

/// Collects candidate points from classified clusters, keeps only the
/// point closest to the ROI horizontal center at each row, and removes
/// outliers whose position deviates too far from a running median.
///
/// A stop-line cluster contributes its outer edges (`row_left`/`row_right`)
/// to both sides; a `Left`/`Right` cluster contributes its `row_center`.
pub fn build_boundaries(clusters: &[Cluster], roi_width: u32, cfg: &BoundaryConfig) -> Boundaries {
    let roi_center = roi_width as f32 / 2.0;

    let left_candidates = collect_side(clusters, roi_center, Side::Left);
    let right_candidates = collect_side(clusters, roi_center, Side::Right);

    Boundaries {
        left: clean_side(left_candidates, cfg.max_boundary_deviation),
        right: clean_side(right_candidates, cfg.max_boundary_deviation),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Buckets candidate points by row, keeping the one closest to
/// `roi_center` when several clusters contribute to the same row.
fn collect_side(clusters: &[Cluster], roi_center: f32, side: Side) -> Vec<BoundaryPoint> {
    use std::collections::BTreeMap;

    let mut by_row: BTreeMap<i32, BoundaryPoint> = BTreeMap::new();

    let mut push_all = |points: Vec<BoundaryPoint>, by_row: &mut BTreeMap<i32, BoundaryPoint>| {
        for (x, y) in points {
            by_row
                .entry(y)
                .and_modify(|existing| {
                    let closer = (x as f32 - roi_center).abs() < (existing.0 as f32 - roi_center).abs();
                    if closer {
                        *existing = (x, y);
                    }
                })
                .or_insert((x, y));
        }
    };

    for cluster in clusters {
        match cluster.ctype {
            ClusterType::StopLine => {
                let method = match side {
                    Side::Left => PointMethod::Left,
                    Side::Right => PointMethod::Right,
                };
                push_all(cluster_points(cluster, method), &mut by_row);
            }
            ClusterType::Left if side == Side::Left => {
                push_all(cluster_points(cluster, PointMethod::Center), &mut by_row);
            }
            ClusterType::Right if side == Side::Right => {
                push_all(cluster_points(cluster, PointMethod::Center), &mut by_row);
            }
            _ => {}
        }
    }

    by_row.into_values().collect()
}

/// Removes points whose `x` deviates from the running median of already
/// accepted points by more than `max_deviation`, sweeping outward in both
/// directions from the median-`y` point.
fn clean_side(mut points: Vec<BoundaryPoint>, max_deviation: i32) -> Vec<BoundaryPoint> {
    if points.len() < 3 {
        return points;
    }
    points.sort_unstable_by_key(|p| p.1);

    let anchor_idx = points.len() / 2;
    let mut accepted = vec![points[anchor_idx]];

    let mut x_prev = points[anchor_idx].0;
    for &(x, y) in points[anchor_idx + 1..].iter() {
        if (x - x_prev).abs() <= max_deviation {
            accepted.push((x, y));
            x_prev = x;
        }
    }

    x_prev = points[anchor_idx].0;
    for &(x, y) in points[..anchor_idx].iter().rev() {
        if (x - x_prev).abs() <= max_deviation {
            accepted.push((x, y));
            x_prev = x;
        }
    }

    accepted.sort_unstable_by_key(|p| p.1);
    accepted
}

/// Sanity check for a detected stop-line: true if `boundary` looks like an
/// actual lane edge rather than the stop-line cluster itself. Computes the
/// 90th-percentile `|Δx|` between consecutive points, then requires every
/// segment within that percentile to be steep (`|Δy|/max(|Δx|,1) ≥ 2/5`).
pub fn looks_like_lane(boundary: &[BoundaryPoint]) -> bool {
    if boundary.len() < 2 {
        return false;
    }

    let diffs: Vec<(i32, i32)> = boundary
        .windows(2)
        .map(|w| ((w[1].0 - w[0].0).abs(), (w[1].1 - w[0].1).abs()))
        .collect();

    let mut abs_dx: Vec<i32> = diffs.iter().map(|&(dx, _)| dx).collect();
    abs_dx.sort_unstable();
    let idx = (((abs_dx.len() as f32) * 0.90) as usize).min(abs_dx.len() - 1);
    let p90 = abs_dx[idx];

    diffs
        .iter()
        .filter(|&&(dx, _)| dx <= p90)
        .all(|&(dx, dy)| (dy as f32) / (dx.max(1) as f32) >= 2.0 / 5.0)
}

/// Applies [`looks_like_lane`] to both boundaries, emptying whichever side
/// fails the test. Only meaningful when a stop line was detected this
/// frame.
pub fn apply_stop_line_sanity_check(boundaries: &mut Boundaries) {
    if !looks_like_lane(&boundaries.left) {
        boundaries.left.clear();
    }
    if !looks_like_lane(&boundaries.right) {
        boundaries.right.clear();
    }
}

/// Median lane width as a fraction of `width`, computed directly from the
/// cleaned boundaries rather than from any sampled path: for every row
/// present in both sides, width = `right.x - left.x`; negative widths
/// (crossed boundaries) are discarded before taking the median.
pub fn compute_median_lane(boundaries: &Boundaries, width: f32) -> Option<f32> {
    use std::collections::BTreeMap;

    if boundaries.left.is_empty() || boundaries.right.is_empty() {
        return None;
    }

    let left_by_y: BTreeMap<i32, i32> = boundaries.left.iter().copied().collect();
    let right_by_y: BTreeMap<i32, i32> = boundaries.right.iter().copied().collect();

    let mut widths: Vec<f32> = left_by_y
        .iter()
        .filter_map(|(y, &lx)| right_by_y.get(y).map(|&rx| (rx - lx) as f32))
        .filter(|&w| w > 0.0)
        .collect();

    if widths.is_empty() {
        return None;
    }

    widths.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = widths.len() / 2;
    let median = if widths.len() % 2 == 0 {
        (widths[mid - 1] + widths[mid]) / 2.0
    } else {
        widths[mid]
    };

    Some(median / width)
}
