//! Stage 8: runs the full per-frame pipeline and turns its output into a
//! steering heading and a target path to visualize.

use rover_config::VisionConfig;

use crate::binarize::binarize;
use crate::boundary::{apply_stop_line_sanity_check, build_boundaries, compute_median_lane, Boundaries};
use crate::classify::{find_stop_line, label_left_right, reject_non_line_clusters};
use crate::cluster::{find_clusters, Cluster, ClusterType};
use crate::image::{Frame, LabeledBinary, Roi};
use crate::path::{compute_path, detect_divergence, Divergence, ForceSide, PathPoint};
use crate::roi::extract_roi;

/// The commanded turn direction fed into the frame coordinator while an
/// intersection is being driven through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// Carries the previously emitted heading across frames so a frame with no
/// target point can hold it rather than falling back to a magic global.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadingState {
    pub previous_heading_deg: f32,
}

/// Output of one full pass of the pipeline, ready for the route/state
/// coordinator to act on.
#[derive(Debug, Clone)]
pub struct FrameResult {
    pub heading_deg: f32,
    pub stop_point_full_frame: Option<(i32, i32)>,
    pub target_path: Vec<PathPoint>,
    pub other_path: Option<Vec<PathPoint>>,
    pub both_edges_found: bool,
    pub median_lane_width: Option<f32>,
    pub roi: Roi,
    pub labeled: LabeledBinary,
    pub clusters: Vec<Cluster>,
    pub boundaries: Boundaries,
}

/// Runs ROI extraction through divergence detection and assembles the
/// frame's steering decision.
///
/// `force_dir` is true while the route/state coordinator considers an
/// intersection active, which pins the target path to `direction`'s
/// branch regardless of the divergence test.
pub fn run_frame(
    frame: &Frame,
    direction: Direction,
    force_dir: bool,
    heading_state: &mut HeadingState,
    cfg: &VisionConfig,
) -> FrameResult {
    let roi = extract_roi(frame, &cfg.geometry, &cfg.roi);
    let binary = binarize(&roi.frame, &cfg.roi);
    let (labeled, mut clusters) = find_clusters(&binary, &cfg.cluster);

    reject_non_line_clusters(&mut clusters, &cfg.classifier);
    let stop_point = find_stop_line(&labeled, &mut clusters, cfg.geometry.frame_w, &cfg.classifier);
    label_left_right(&labeled, &mut clusters);

    let mut boundaries = build_boundaries(&clusters, roi.width(), &cfg.boundary);
    if stop_point.is_some() {
        apply_stop_line_sanity_check(&mut boundaries);
    }

    let left_path = compute_path(&boundaries, roi.height(), &cfg.geometry, &cfg.path, ForceSide::LeftOnly);
    let right_path = compute_path(&boundaries, roi.height(), &cfg.geometry, &cfg.path, ForceSide::RightOnly);
    let center_path = compute_path(&boundaries, roi.height(), &cfg.geometry, &cfg.path, ForceSide::Either);

    let divergence = detect_divergence(&left_path, &right_path, roi.height(), &cfg.divergence);

    let (dir_path, dir_other) = match direction {
        Direction::Left => (&left_path, &right_path),
        Direction::Right => (&right_path, &left_path),
    };

    let target_path = if force_dir || divergence == Divergence::Diverging {
        if dir_path.is_empty() { dir_other.clone() } else { dir_path.clone() }
    } else {
        center_path
    };

    // `other_path` only ever reflects an actually diverging pair of paths,
    // independent of `force_dir`: a forced direction alone pins the target
    // path, but does not by itself mean the other branch is known.
    let other_path = if divergence == Divergence::Diverging {
        Some(if dir_path.is_empty() { dir_path.clone() } else { dir_other.clone() })
    } else {
        None
    };

    let both_edges_found = !left_path.is_empty() && !right_path.is_empty();
    let median_lane_width = if both_edges_found {
        compute_median_lane(&boundaries, cfg.geometry.frame_w as f32)
    } else {
        None
    };

    let heading_deg = match lookahead_point(&target_path, roi.height(), cfg.path.lookahead_pos) {
        Some(point) => {
            let (full_x, _full_y) = roi.to_full_frame(point);
            let dx = full_x as f32 - (cfg.geometry.frame_w as f32 / 2.0 + cfg.geometry.camera_x_offset);
            let heading = (dx / cfg.geometry.focal_length_pix).atan().to_degrees();
            heading_state.previous_heading_deg = heading;
            heading
        }
        None => heading_state.previous_heading_deg,
    };

    let stop_point_full_frame = stop_point.map(|p| roi.to_full_frame(p));

    FrameResult {
        heading_deg,
        stop_point_full_frame,
        target_path,
        other_path,
        both_edges_found,
        median_lane_width,
        roi,
        labeled,
        clusters,
        boundaries,
    }
}

/// The path point whose `y` is closest to `(roi_h - 1) * (1 - lookahead_pos)`.
fn lookahead_point(path: &[PathPoint], roi_h: u32, lookahead_pos: f32) -> Option<(i32, i32)> {
    let target_y = (roi_h as f32 - 1.0) * (1.0 - lookahead_pos);
    path.iter()
        .min_by(|a, b| {
            let da = (a.y as f32 - target_y).abs();
            let db = (b.y as f32 - target_y).abs();
            da.partial_cmp(&db).unwrap()
        })
        .map(|p| (p.x.round() as i32, p.y))
}

/// Ensures reaching this module with a cluster still tagged [`ClusterType::Ok`]
/// is treated as a logic error rather than silently ignored: stage 4
/// guarantees every surviving, non-stop-line cluster is labeled `Left` or
/// `Right` before the boundary builder runs.
#[allow(dead_code)]
fn debug_assert_fully_classified(clusters: &[Cluster]) {
    debug_assert!(
        clusters.iter().all(|c| c.ctype != ClusterType::Ok),
        "cluster reached the boundary builder without a side label"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_frame(w: u32, h: u32, left_x_at: impl Fn(u32) -> u32, right_x_at: impl Fn(u32) -> u32) -> Frame {
        let mut data = vec![230u8; w as usize * h as usize * 3];
        for y in 0..h {
            let lx = left_x_at(y);
            let rx = right_x_at(y);
            for x in [lx, lx + 1, rx, rx + 1] {
                if x < w {
                    let idx = (y as usize * w as usize + x as usize) * 3;
                    data[idx] = 10;
                    data[idx + 1] = 10;
                    data[idx + 2] = 10;
                }
            }
        }
        Frame::new(w, h, data)
    }

    #[test]
    fn straight_road_heading_near_zero() {
        let cfg = VisionConfig::default();
        let w = cfg.geometry.frame_w;
        let h = cfg.geometry.frame_h;
        let frame = synthetic_frame(
            w,
            h,
            |_| (w as f32 * 0.25) as u32,
            |_| (w as f32 * 0.75) as u32,
        );

        let mut heading_state = HeadingState::default();
        let result = run_frame(&frame, Direction::Left, false, &mut heading_state, &cfg);

        assert!(result.heading_deg.abs() < 3.0, "heading = {}", result.heading_deg);
    }

    #[test]
    fn forced_direction_alone_does_not_populate_other_path() {
        let cfg = VisionConfig::default();
        let w = cfg.geometry.frame_w;
        let h = cfg.geometry.frame_h;
        // straight, non-diverging lane: force_dir = true simulates an
        // intersection already in progress but the road itself is still
        // parallel, so detect_divergence should report `None`.
        let frame = synthetic_frame(
            w,
            h,
            |_| (w as f32 * 0.25) as u32,
            |_| (w as f32 * 0.75) as u32,
        );

        let mut heading_state = HeadingState::default();
        let result = run_frame(&frame, Direction::Left, true, &mut heading_state, &cfg);

        assert!(result.other_path.is_none());
    }

    #[test]
    fn heading_holds_when_no_target_point() {
        let cfg = VisionConfig::default();
        let w = cfg.geometry.frame_w;
        let h = cfg.geometry.frame_h;
        let frame = Frame::new(w, h, vec![230u8; w as usize * h as usize * 3]);

        let mut heading_state = HeadingState {
            previous_heading_deg: 7.5,
        };
        let result = run_frame(&frame, Direction::Left, false, &mut heading_state, &cfg);

        assert_eq!(result.heading_deg, 7.5);
        assert_eq!(heading_state.previous_heading_deg, 7.5);
    }
}
