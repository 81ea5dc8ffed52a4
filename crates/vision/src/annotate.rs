//! Draws the debug overlay sent to the remote GUI: boundaries, the target
//! and other paths, cluster bounding boxes, and the stop/lookahead points.
//!
//! Grounded on the original implementation's visualization pass: a
//! rotating palette per cluster id, optional per-cluster text labels gated
//! by config, and a handful of fixed-color markers for the derived points.

use rover_config::DebugConfig;

use crate::cluster::Cluster;
use crate::coordinate::FrameResult;
use crate::image::{Frame, Roi};
use crate::path::PathPoint;

const PALETTE: [(u8, u8, u8); 6] = [
    (230, 25, 75),
    (60, 180, 75),
    (255, 225, 25),
    (0, 130, 200),
    (245, 130, 48),
    (145, 30, 180),
];

/// Draws `result`'s overlay directly onto a copy of the full frame it was
/// derived from; `frame` must be the same frame `result` was computed from.
pub fn annotate_frame(frame: &Frame, result: &FrameResult, cfg: &DebugConfig) -> Frame {
    let mut out = frame.clone();

    if cfg.show_cluster_boxes {
        draw_cluster_boxes(&mut out, &result.clusters, &result.roi);
    }
    if cfg.show_cluster_text {
        // cluster ids are drawn as small colored tick marks at the
        // centroid since this pipeline has no text rasterizer; a real
        // glyph renderer is a GUI-side concern
        draw_cluster_markers(&mut out, &result.clusters, &result.roi);
    }

    draw_boundary(&mut out, &result.boundaries.left, &result.roi, (0, 200, 0));
    draw_boundary(&mut out, &result.boundaries.right, &result.roi, (0, 0, 220));

    draw_path(&mut out, &result.target_path, &result.roi, (255, 255, 0));
    if let Some(other) = &result.other_path {
        draw_path(&mut out, other, &result.roi, (120, 120, 120));
    }

    if let Some((x, y)) = result.stop_point_full_frame {
        draw_marker(&mut out, (x, y), (255, 0, 255), 3);
    }

    out
}

fn draw_cluster_boxes(frame: &mut Frame, clusters: &[Cluster], roi: &Roi) {
    for cluster in clusters {
        let color = PALETTE[(cluster.id as usize - 1) % PALETTE.len()];
        let (y0, y1, x0, x1) = cluster.bbox;

        for x in x0..x1 {
            set_if_in_bounds(frame, roi.to_full_frame((x, y0)), color);
            set_if_in_bounds(frame, roi.to_full_frame((x, y1 - 1)), color);
        }
        for y in y0..y1 {
            set_if_in_bounds(frame, roi.to_full_frame((x0, y)), color);
            set_if_in_bounds(frame, roi.to_full_frame((x1 - 1, y)), color);
        }
    }
}

fn draw_cluster_markers(frame: &mut Frame, clusters: &[Cluster], roi: &Roi) {
    for cluster in clusters {
        let color = PALETTE[(cluster.id as usize - 1) % PALETTE.len()];
        let centroid = (cluster.centroid.0.round() as i32, cluster.centroid.1.round() as i32);
        draw_marker(frame, roi.to_full_frame(centroid), color, 2);
    }
}

fn draw_boundary(frame: &mut Frame, points: &[(i32, i32)], roi: &Roi, color: (u8, u8, u8)) {
    for &p in points {
        set_if_in_bounds(frame, roi.to_full_frame(p), color);
    }
}

fn draw_path(frame: &mut Frame, points: &[PathPoint], roi: &Roi, color: (u8, u8, u8)) {
    for p in points {
        let point = (p.x.round() as i32, p.y);
        draw_marker(frame, roi.to_full_frame(point), color, 2);
    }
}

fn draw_marker(frame: &mut Frame, center: (i32, i32), color: (u8, u8, u8), radius: i32) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            set_if_in_bounds(frame, (center.0 + dx, center.1 + dy), color);
        }
    }
}

fn set_if_in_bounds(frame: &mut Frame, point: (i32, i32), color: (u8, u8, u8)) {
    let (x, y) = point;
    if x < 0 || y < 0 || x as u32 >= frame.width() || y as u32 >= frame.height() {
        return;
    }
    frame.set_pixel(x as u32, y as u32, color);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::{run_frame, Direction, HeadingState};
    use rover_config::VisionConfig;

    #[test]
    fn annotate_does_not_panic_on_empty_frame() {
        let cfg = VisionConfig::default();
        let w = cfg.geometry.frame_w;
        let h = cfg.geometry.frame_h;
        let frame = Frame::new(w, h, vec![230u8; w as usize * h as usize * 3]);

        let mut heading_state = HeadingState::default();
        let result = run_frame(&frame, Direction::Left, false, &mut heading_state, &cfg);

        let annotated = annotate_frame(&frame, &result, &cfg.debug);
        assert_eq!(annotated.width(), w);
        assert_eq!(annotated.height(), h);
    }
}
