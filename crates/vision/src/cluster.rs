//! Stage 3: dilation, 8-connected labeling, and per-row geometry caching.

use rover_config::ClusterConfig;

use crate::binarize::dilate_3x3;
use crate::image::{Binary, LabeledBinary};

/// What a [`Cluster`] has been classified as by stage 4 (see
/// [`crate::classify`]). Freshly-found clusters start as `Ok`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterType {
    StopLine,
    Left,
    Right,
    Ignore,
    Ok,
}

/// One 8-connected blob of dark pixels in the dilated binary mask, with its
/// geometry precomputed for the stages that follow.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: i32,
    /// `(y0, y1, x0, x1)`, half-open on the high side.
    pub bbox: (i32, i32, i32, i32),
    pub centroid: (f32, f32),
    pub pixel_count: u32,
    pub bbox_area: u32,
    pub ctype: ClusterType,

    /// Per-row pixel counts, indexed from `bbox.0` (top row of the bbox).
    pub row_widths: Vec<i32>,
    /// Per-row leftmost column (bbox-local... no, frame/ROI-local), `-1` if
    /// the row is empty.
    pub row_left: Vec<i32>,
    pub row_right: Vec<i32>,
    pub row_center: Vec<i32>,
}

impl Cluster {
    pub fn height(&self) -> i32 {
        self.bbox.1 - self.bbox.0
    }

    pub fn width(&self) -> i32 {
        self.bbox.3 - self.bbox.2
    }
}

/// Runs dilation followed by 8-connected component labeling, discards
/// clusters below the minimum active pixel count, and returns the
/// relabeled image together with the surviving clusters (ids `1..=n`,
/// contiguous).
pub fn find_clusters(binary: &Binary, cfg: &ClusterConfig) -> (LabeledBinary, Vec<Cluster>) {
    let mut dilated = binary.clone();
    for _ in 0..cfg.dilation_iter_count {
        dilated = dilate_3x3(&dilated);
    }

    let (raw_labels, raw_count) = label_8_connected(&dilated);

    let mut clusters = Vec::new();
    let mut out = LabeledBinary::new(dilated.width(), dilated.height());
    let mut next_id = 1;

    for raw_id in 1..=raw_count {
        let pixels: Vec<(i32, i32)> = raw_labels
            .iter()
            .enumerate()
            .filter(|(_, &lbl)| lbl == raw_id)
            .map(|(idx, _)| {
                let x = (idx as u32 % dilated.width()) as i32;
                let y = (idx as u32 / dilated.width()) as i32;
                (x, y)
            })
            .collect();

        if pixels.len() < cfg.min_cluster_active_px as usize {
            continue;
        }

        let x0 = pixels.iter().map(|p| p.0).min().unwrap();
        let x1 = pixels.iter().map(|p| p.0).max().unwrap() + 1;
        let y0 = pixels.iter().map(|p| p.1).min().unwrap();
        let y1 = pixels.iter().map(|p| p.1).max().unwrap() + 1;

        let cx = pixels.iter().map(|p| p.0 as f32).sum::<f32>() / pixels.len() as f32;
        let cy = pixels.iter().map(|p| p.1 as f32).sum::<f32>() / pixels.len() as f32;

        let h = (y1 - y0) as usize;
        let w = (x1 - x0) as usize;
        let mut row_widths = vec![0i32; h];
        let mut row_left = vec![-1i32; h];
        let mut row_right = vec![-1i32; h];
        let mut row_center = vec![-1i32; h];

        let mut rows: Vec<Vec<i32>> = vec![Vec::new(); h];
        for &(x, y) in &pixels {
            rows[(y - y0) as usize].push(x);
            out.set(x as u32, y as u32, next_id);
        }
        for (r, xs) in rows.iter_mut().enumerate() {
            if xs.is_empty() {
                continue;
            }
            xs.sort_unstable();
            row_widths[r] = xs.len() as i32;
            row_left[r] = xs[0];
            row_right[r] = *xs.last().unwrap();
            let mean = xs.iter().sum::<i32>() as f32 / xs.len() as f32;
            row_center[r] = mean.floor() as i32;
        }

        clusters.push(Cluster {
            id: next_id,
            bbox: (y0, y1, x0, x1),
            centroid: (cx, cy),
            pixel_count: pixels.len() as u32,
            bbox_area: (w * h) as u32,
            ctype: ClusterType::Ok,
            row_widths,
            row_left,
            row_right,
            row_center,
        });

        next_id += 1;
    }

    (out, clusters)
}

/// Flood-fill based 8-connected labeling. Returns a flat `width*height`
/// label buffer (`0` = background, `1..=n` raw labels) and the number of
/// raw labels found.
fn label_8_connected(binary: &Binary) -> (Vec<i32>, i32) {
    let w = binary.width() as i32;
    let h = binary.height() as i32;
    let mut labels = vec![0i32; (w * h) as usize];
    let mut next_label = 0;
    let mut stack = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            if binary.get(x, y) == 0 || labels[idx] != 0 {
                continue;
            }

            next_label += 1;
            labels[idx] = next_label;
            stack.push((x, y));

            while let Some((cx, cy)) = stack.pop() {
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = cx + dx;
                        let ny = cy + dy;
                        if nx < 0 || ny < 0 || nx >= w || ny >= h {
                            continue;
                        }
                        let nidx = (ny * w + nx) as usize;
                        if binary.get(nx, ny) != 0 && labels[nidx] == 0 {
                            labels[nidx] = next_label;
                            stack.push((nx, ny));
                        }
                    }
                }
            }
        }
    }

    (labels, next_label)
}

/// Extracts the global `(x, y)` points for `method`, over rows that
/// actually contain pixels for this cluster.
pub fn cluster_points(cluster: &Cluster, method: PointMethod) -> Vec<(i32, i32)> {
    let y0 = cluster.bbox.0;
    let row_values = match method {
        PointMethod::Left => &cluster.row_left,
        PointMethod::Right => &cluster.row_right,
        PointMethod::Center => &cluster.row_center,
    };

    row_values
        .iter()
        .enumerate()
        .filter(|(r, _)| cluster.row_widths[*r] > 0)
        .map(|(r, &x)| (x, y0 + r as i32))
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub enum PointMethod {
    Left,
    Right,
    Center,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_from_rows(rows: &[&str]) -> Binary {
        let h = rows.len() as u32;
        let w = rows[0].len() as u32;
        let mut data = Vec::with_capacity((w * h) as usize);
        for row in rows {
            for ch in row.chars() {
                data.push(if ch == '#' { 255 } else { 0 });
            }
        }
        Binary::from_data(w, h, data)
    }

    #[test]
    fn two_separate_blobs_get_distinct_contiguous_ids() {
        let binary = binary_from_rows(&[
            "##........##",
            "##........##",
            "............",
            "............",
            "............",
        ]);
        let cfg = ClusterConfig {
            min_cluster_active_px: 2,
            dilation_iter_count: 0,
        };

        let (labeled, clusters) = find_clusters(&binary, &cfg);
        assert_eq!(clusters.len(), 2);
        let ids: Vec<i32> = clusters.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);

        for y in 0..5 {
            for x in 0..12 {
                let label = labeled.get(x, y);
                assert!(label == 0 || ids.contains(&label));
            }
        }
    }

    #[test]
    fn clusters_below_threshold_are_dropped() {
        let binary = binary_from_rows(&["#....", ".....", ".....", "....."]);
        let cfg = ClusterConfig {
            min_cluster_active_px: 5,
            dilation_iter_count: 0,
        };
        let (_, clusters) = find_clusters(&binary, &cfg);
        assert!(clusters.is_empty());
    }

    #[test]
    fn row_array_consistency_invariant_holds() {
        let binary = binary_from_rows(&[
            "..####.....",
            "..####.....",
            "..####.....",
            "..####.....",
            "..####.....",
        ]);
        let cfg = ClusterConfig {
            min_cluster_active_px: 1,
            dilation_iter_count: 0,
        };
        let (_, clusters) = find_clusters(&binary, &cfg);
        let cluster = &clusters[0];
        for r in 0..cluster.row_widths.len() {
            if cluster.row_widths[r] == 0 {
                assert_eq!(cluster.row_left[r], -1);
                assert_eq!(cluster.row_right[r], -1);
                assert_eq!(cluster.row_center[r], -1);
            } else {
                assert!(cluster.row_left[r] <= cluster.row_center[r]);
                assert!(cluster.row_center[r] <= cluster.row_right[r]);
            }
        }
    }
}
