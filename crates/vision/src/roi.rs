//! Stage 1: crops a trapezoidal-ish working region out of the raw frame.
//!
//! The crop itself is a plain rectangle; the trapezoid only enters the
//! picture later, as a mask applied during binarization (see
//! [`crate::binarize`]).

use rover_config::{GeometryConfig, RoiConfig};

use crate::image::{Frame, Roi};

/// Crops `frame` to the configured region of interest.
///
/// `frame` is assumed to already be `geometry.frame_w x geometry.frame_h`;
/// callers that own the camera collaborator are responsible for resizing
/// upstream of this stage.
pub fn extract_roi(frame: &Frame, geometry: &GeometryConfig, roi: &RoiConfig) -> Roi {
    let w = geometry.frame_w as f32;
    let h = geometry.frame_h as f32;

    let top = (h * (1.0 - roi.roi_top)) as u32;
    let bottom = (h * (1.0 - roi.roi_bottom)) as u32;
    let left = (w * roi.horizontal_margin) as u32;
    let right = (w * (1.0 - roi.horizontal_margin)) as u32;

    let crop_w = right.saturating_sub(left).max(1);
    let crop_h = bottom.saturating_sub(top).max(1);

    let mut data = Vec::with_capacity(crop_w as usize * crop_h as usize * 3);
    for y in top..top + crop_h {
        for x in left..left + crop_w {
            let (r, g, b) = frame.pixel(x.min(frame.width() - 1), y.min(frame.height() - 1));
            data.push(r);
            data.push(g);
            data.push(b);
        }
    }

    Roi {
        frame: Frame::new(crop_w, crop_h, data),
        offset: (left as i32, top as i32),
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
    fn crop_matches_configured_fractions() {
        let geometry = GeometryConfig::default();
        let roi_cfg = RoiConfig::default();
        let frame = solid_frame(geometry.frame_w, geometry.frame_h, (10, 20, 30));

        let roi = extract_roi(&frame, &geometry, &roi_cfg);

        let expected_w = ((geometry.frame_w as f32) * (1.0 - 2.0 * roi_cfg.horizontal_margin))
            .round() as u32;
        let expected_h =
            ((geometry.frame_h as f32) * (roi_cfg.roi_top - roi_cfg.roi_bottom)).round() as u32;

        assert!((roi.width() as i64 - expected_w as i64).abs() <= 1);
        assert!((roi.height() as i64 - expected_h as i64).abs() <= 1);
        assert_eq!(roi.offset.1, (geometry.frame_h as f32 * (1.0 - roi_cfg.roi_top)) as i32);
    }
}
