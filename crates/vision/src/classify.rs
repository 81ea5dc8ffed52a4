//! Stage 4: rejects non-tape-like clusters, finds the stop line (if any),
//! and labels the remainder as left/right lane boundary candidates.

use rover_config::ClassifierConfig;

use crate::cluster::{cluster_points, Cluster, ClusterType, PointMethod};
use crate::image::LabeledBinary;

/// Marks clusters that are too thin/short or too irregular in thickness to
/// be tape as [`ClusterType::Ignore`]. Everything else is left `Ok` for the
/// later passes to label.
pub fn reject_non_line_clusters(clusters: &mut [Cluster], cfg: &ClassifierConfig) {
    for cluster in clusters.iter_mut() {
        let h = cluster.height();
        let w = cluster.width().max(1);

        if (h as f32) / (w as f32) < 0.25 {
            cluster.ctype = ClusterType::Ignore;
            continue;
        }

        if !resembles_line(cluster, cfg) {
            cluster.ctype = ClusterType::Ignore;
        }
    }
}

fn resembles_line(cluster: &Cluster, cfg: &ClassifierConfig) -> bool {
    let widths: Vec<f32> = cluster
        .row_widths
        .iter()
        .copied()
        .filter(|&w| w > 0 && w < cfg.max_line_width_px)
        .map(|w| w as f32)
        .collect();

    if widths.len() < cfg.min_y_px_per_line {
        return false;
    }

    let mean = widths.iter().sum::<f32>() / widths.len() as f32;
    if mean == 0.0 {
        return false;
    }

    let variance = widths.iter().map(|w| (w - mean).powi(2)).sum::<f32>() / widths.len() as f32;
    let rel_std = variance.sqrt() / mean;

    rel_std <= cfg.max_line_thickness_deviation
}

/// Finds the first stop-line cluster, if any, tags it, and returns its
/// `(x, y)` stop point in ROI-local coordinates.
pub fn find_stop_line(
    labeled: &LabeledBinary,
    clusters: &mut [Cluster],
    frame_w: u32,
    cfg: &ClassifierConfig,
) -> Option<(i32, i32)> {
    let stop_line_min_width = cfg.stop_line_min_width * frame_w as f32;

    for cluster in clusters.iter_mut() {
        let width = cluster.width();
        let height = cluster.height();

        if (width as f32) <= stop_line_min_width || height <= cfg.stop_line_min_height {
            continue;
        }
        if !all_quadrants_activated(labeled, cluster, cfg.activation_squares_of_roi) {
            continue;
        }

        cluster.ctype = ClusterType::StopLine;
        return Some(stop_point(cluster));
    }

    None
}

fn all_quadrants_activated(labeled: &LabeledBinary, cluster: &Cluster, lim: f32) -> bool {
    let (y0, y1, x0, x1) = cluster.bbox;
    let h = y1 - y0;
    let w = x1 - x0;
    if h == 0 || w == 0 {
        return false;
    }

    let y_cut = (lim * (h as f32 / 2.0)) as i32;
    let x_cut = (lim * (w as f32 / 2.0)) as i32;

    let has_pixel = |y_range: std::ops::Range<i32>, x_range: std::ops::Range<i32>| {
        y_range
            .flat_map(|y| x_range.clone().map(move |x| (x, y)))
            .any(|(x, y)| labeled.get(x0 + x, y0 + y) == cluster.id)
    };

    let q1 = has_pixel(0..y_cut, 0..x_cut);
    let q2 = has_pixel(h - y_cut..h, 0..x_cut);
    let q3 = has_pixel(0..y_cut, w - x_cut..w);
    let q4 = has_pixel(h - y_cut..h, w - x_cut..w);

    q1 && q2 && q3 && q4
}

fn stop_point(cluster: &Cluster) -> (i32, i32) {
    let (y0, _y1, x0, x1) = cluster.bbox;
    let w_local = x1 - x0;

    let mut all_xs = Vec::new();
    let mut all_ys = Vec::new();
    for (r, &width) in cluster.row_widths.iter().enumerate() {
        if width == 0 {
            continue;
        }
        let left = cluster.row_left[r];
        let right = cluster.row_right[r];
        for x in left..=right {
            all_xs.push(x0 + x);
            all_ys.push(y0 + r as i32);
        }
    }

    let cent_x = if all_xs.is_empty() {
        x0
    } else {
        (all_xs.iter().sum::<i32>() as f32 / all_xs.len() as f32).round() as i32
    };

    let mid_start = x0 + (w_local as f32 * 0.40) as i32;
    let mid_end = x0 + (w_local as f32 * 0.60) as i32;

    let central_ys: Vec<i32> = all_xs
        .iter()
        .zip(all_ys.iter())
        .filter(|(&x, _)| x >= mid_start && x < mid_end)
        .map(|(_, &y)| y)
        .collect();

    let ys_for_bottom = if central_ys.is_empty() {
        &all_ys
    } else {
        &central_ys
    };

    if ys_for_bottom.is_empty() {
        return (cent_x, y0);
    }

    let mut sorted = ys_for_bottom.clone();
    sorted.sort_unstable();
    let k = ((sorted.len() as f32) * 0.30).max(1.0) as usize;
    let bottom_k = &sorted[sorted.len() - k..];
    let cent_y = (bottom_k.iter().sum::<i32>() as f32 / bottom_k.len() as f32).round() as i32;

    (cent_x, cent_y)
}

/// Labels every remaining `Ok` cluster as [`ClusterType::Left`] or
/// [`ClusterType::Right`] based on which half of the ROI its
/// bottommost points sit in.
pub fn label_left_right(labeled: &LabeledBinary, clusters: &mut [Cluster]) {
    let roi_center_x = labeled.width() as i32 / 2;

    for cluster in clusters.iter_mut() {
        if !matches!(cluster.ctype, ClusterType::Ok) {
            continue;
        }

        let mut points = cluster_points(cluster, PointMethod::Center);
        if points.is_empty() {
            continue;
        }

        points.sort_unstable_by_key(|p| p.1);
        let n_bottom = (points.len() / 5).max(5).min(points.len());
        let bottom = &points[points.len() - n_bottom..];

        let avg_x = bottom.iter().map(|p| p.0).sum::<i32>() as f32 / bottom.len() as f32;

        cluster.ctype = if avg_x < roi_center_x as f32 {
            ClusterType::Left
        } else {
            ClusterType::Right
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::find_clusters;
    use crate::image::Binary;
    use rover_config::ClusterConfig;

    fn vertical_stripe_binary(w: u32, h: u32, x: u32, stripe_w: u32) -> Binary {
        let mut binary = Binary::new(w, h);
        for y in 0..h {
            for dx in 0..stripe_w {
                binary.set(x + dx, y, 255);
            }
        }
        binary
    }

    #[test]
    fn thin_tall_stripe_is_not_ignored() {
        let binary = vertical_stripe_binary(100, 200, 40, 6);
        let (_, mut clusters) = find_clusters(&binary, &ClusterConfig {
            min_cluster_active_px: 1,
            dilation_iter_count: 0,
        });
        reject_non_line_clusters(&mut clusters, &ClassifierConfig::default());
        assert!(matches!(clusters[0].ctype, ClusterType::Ok));
    }

    #[test]
    fn squat_blob_is_ignored() {
        let mut binary = Binary::new(60, 60);
        for y in 20..30 {
            for x in 10..50 {
                binary.set(x, y, 255);
            }
        }
        let (_, mut clusters) = find_clusters(&binary, &ClusterConfig {
            min_cluster_active_px: 1,
            dilation_iter_count: 0,
        });
        reject_non_line_clusters(&mut clusters, &ClassifierConfig::default());
        assert!(matches!(clusters[0].ctype, ClusterType::Ignore));
    }

    #[test]
    fn left_stripe_labeled_left() {
        let binary = vertical_stripe_binary(200, 200, 20, 6);
        let (labeled, mut clusters) = find_clusters(&binary, &ClusterConfig {
            min_cluster_active_px: 1,
            dilation_iter_count: 0,
        });
        reject_non_line_clusters(&mut clusters, &ClassifierConfig::default());
        label_left_right(&labeled, &mut clusters);
        assert!(matches!(clusters[0].ctype, ClusterType::Left));
    }

    #[test]
    fn right_stripe_labeled_right() {
        let binary = vertical_stripe_binary(200, 200, 180, 6);
        let (labeled, mut clusters) = find_clusters(&binary, &ClusterConfig {
            min_cluster_active_px: 1,
            dilation_iter_count: 0,
        });
        reject_non_line_clusters(&mut clusters, &ClassifierConfig::default());
        label_left_right(&labeled, &mut clusters);
        assert!(matches!(clusters[0].ctype, ClusterType::Right));
    }
}
