//! Stage 2: grayscale → blur → inverse threshold → morphological close →
//! trapezoid mask.

use rover_config::RoiConfig;

use crate::image::{Binary, Frame};

/// Runs the full binarization pipeline on a cropped ROI.
pub fn binarize(roi: &Frame, cfg: &RoiConfig) -> Binary {
    let gray = to_grayscale(roi);
    let blurred = gaussian_blur_5x5(&gray, roi.width(), roi.height());
    let mut binary = inverse_threshold(&blurred, roi.width(), roi.height(), cfg.black_threshold);
    morphological_close_3x3(&mut binary);

    if cfg.roi_top_scale < 1.0 {
        apply_trapezoid_mask(&mut binary, cfg.roi_top_scale);
    }

    binary
}

fn to_grayscale(frame: &Frame) -> Vec<u8> {
    (0..frame.height())
        .flat_map(|y| (0..frame.width()).map(move |x| (x, y)))
        .map(|(x, y)| {
            let (r, g, b) = frame.pixel(x, y);
            let luma = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
            luma.round().clamp(0.0, 255.0) as u8
        })
        .collect()
}

/// A normalized 5-tap binomial approximation of a Gaussian kernel, applied
/// separably (horizontal pass then vertical pass). Edges are clamped.
const BLUR_KERNEL: [i32; 5] = [1, 4, 6, 4, 1];
const BLUR_KERNEL_SUM: i32 = 16;

fn gaussian_blur_5x5(gray: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as i32;
    let h = height as i32;
    let clamp_x = |x: i32| x.clamp(0, w - 1);
    let clamp_y = |y: i32| y.clamp(0, h - 1);
    let at = |buf: &[u8], x: i32, y: i32| i32::from(buf[(clamp_y(y) * w + clamp_x(x)) as usize]);

    let mut horizontal = vec![0u8; gray.len()];
    for y in 0..h {
        for x in 0..w {
            let sum: i32 = BLUR_KERNEL
                .iter()
                .enumerate()
                .map(|(i, k)| k * at(gray, x + i as i32 - 2, y))
                .sum();
            horizontal[(y * w + x) as usize] = (sum / BLUR_KERNEL_SUM) as u8;
        }
    }

    let mut vertical = vec![0u8; gray.len()];
    for y in 0..h {
        for x in 0..w {
            let sum: i32 = BLUR_KERNEL
                .iter()
                .enumerate()
                .map(|(i, k)| k * at(&horizontal, x, y + i as i32 - 2))
                .sum();
            vertical[(y * w + x) as usize] = (sum / BLUR_KERNEL_SUM) as u8;
        }
    }

    vertical
}

fn inverse_threshold(gray: &[u8], width: u32, height: u32, threshold: u8) -> Binary {
    let data = gray
        .iter()
        .map(|&v| if v < threshold { 255 } else { 0 })
        .collect();
    Binary::from_data(width, height, data)
}

fn morphological_close_3x3(binary: &mut Binary) {
    let dilated = dilate_3x3(binary);
    let eroded = erode_3x3(&dilated);
    *binary = eroded;
}

pub(crate) fn dilate_3x3(binary: &Binary) -> Binary {
    let w = binary.width() as i32;
    let h = binary.height() as i32;
    let mut out = Binary::new(binary.width(), binary.height());

    for y in 0..h {
        for x in 0..w {
            let mut on = false;
            'search: for dy in -1..=1 {
                for dx in -1..=1 {
                    if binary.get(x + dx, y + dy) != 0 {
                        on = true;
                        break 'search;
                    }
                }
            }
            if on {
                out.set(x as u32, y as u32, 255);
            }
        }
    }
    out
}

fn erode_3x3(binary: &Binary) -> Binary {
    let w = binary.width() as i32;
    let h = binary.height() as i32;
    let mut out = Binary::new(binary.width(), binary.height());

    for y in 0..h {
        for x in 0..w {
            let mut all_on = true;
            'search: for dy in -1..=1 {
                for dx in -1..=1 {
                    let xi = x + dx;
                    let yi = y + dy;
                    let in_bounds = xi >= 0 && yi >= 0 && xi < w && yi < h;
                    if !in_bounds || binary.get(xi, yi) == 0 {
                        all_on = false;
                        break 'search;
                    }
                }
            }
            if all_on {
                out.set(x as u32, y as u32, 255);
            }
        }
    }
    out
}

/// Zeroes every pixel outside a symmetric trapezoid whose bottom edge spans
/// the full width and whose top edge is narrowed to `top_scale` of it.
fn apply_trapezoid_mask(binary: &mut Binary, top_scale: f32) {
    let w = binary.width();
    let h = binary.height();
    if h == 0 {
        return;
    }

    let top_scale = top_scale.clamp(0.0, 1.0);
    let mid_x = w as f32 / 2.0;
    let half_bottom = w as f32 / 2.0;
    let half_top = half_bottom * top_scale;

    let last_row = (h - 1) as f32;

    for y in 0..h {
        let t = if last_row > 0.0 {
            (last_row - y as f32) / last_row
        } else {
            0.0
        };
        let x_left = (mid_x - half_top) * t;
        let x_right = (w - 1) as f32 + ((mid_x + half_top) - (w - 1) as f32) * t;

        for x in 0..w {
            let xf = x as f32;
            if xf < x_left || xf > x_right {
                binary.set(x, y, 0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(w: u32, h: u32, rgb: (u8, u8, u8)) -> Frame {
        let mut data = Vec::with_capacity(w as usize * h as usize * 3);
        for _ in 0..(w * h) {
            data.extend_from_slice(&[rgb.0, rgb.1, rgb.2]);
        }
        Frame::new(w, h, data)
    }

    #[test]
    fn dark_region_becomes_white_after_inverse_threshold() {
        let frame = solid_frame(20, 20, (10, 10, 10));
        let binary = binarize(&frame, &RoiConfig::default());
        // entire ROI is well below threshold, and far enough from the
        // trapezoid edges to survive the mask
        assert_eq!(binary.get(10, 10), 255);
    }

    #[test]
    fn bright_region_stays_black() {
        let frame = solid_frame(20, 20, (240, 240, 240));
        let binary = binarize(&frame, &RoiConfig::default());
        assert_eq!(binary.get(10, 10), 0);
    }

    #[test]
    fn trapezoid_mask_zeroes_far_corners() {
        let frame = solid_frame(40, 40, (0, 0, 0));
        let binary = binarize(&frame, &RoiConfig::default());
        // top corners fall outside the narrower top edge of the trapezoid
        assert_eq!(binary.get(0, 0), 0);
        assert_eq!(binary.get(39, 0), 0);
    }
}
