//! The camera collaborator. Real hardware capture is out of scope for this
//! core (§1 Non-goals); [`SyntheticCamera`] stands in where a frame grabber
//! would sit, producing a moving two-stripe test pattern so the rest of
//! the loop has something to perceive.

use rover_vision::image::Frame;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera device {device} failed to initialize: {reason}")]
    InitFailed { device: String, reason: String },
}

pub trait Camera {
    fn capture(&mut self) -> Result<Frame, CameraError>;
}

/// Draws two dark vertical stripes on a light background and drifts them
/// sideways a little each frame, standing in for a forward-facing camera
/// watching lane tape.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    tick: i32,
}

impl SyntheticCamera {
    pub fn open(device: &str, width: u32, height: u32) -> Result<Self, CameraError> {
        if width == 0 || height == 0 {
            return Err(CameraError::InitFailed {
                device: device.to_string(),
                reason: "zero-sized frame requested".to_string(),
            });
        }
        Ok(Self {
            width,
            height,
            tick: 0,
        })
    }
}

impl Camera for SyntheticCamera {
    fn capture(&mut self) -> Result<Frame, CameraError> {
        let w = self.width;
        let h = self.height;
        let drift = (self.tick % 40) - 20;
        self.tick += 1;

        let mut data = vec![230u8; w as usize * h as usize * 3];
        let left_x = ((w as i32 / 4) + drift).clamp(0, w as i32 - 1) as u32;
        let right_x = ((w as i32 * 3 / 4) + drift).clamp(0, w as i32 - 1) as u32;

        for y in 0..h {
            for x in [left_x, right_x] {
                for dx in 0..3u32 {
                    let xi = (x + dx).min(w - 1);
                    let idx = (y as usize * w as usize + xi as usize) * 3;
                    data[idx] = 10;
                    data[idx + 1] = 10;
                    data[idx + 2] = 10;
                }
            }
        }

        Ok(Frame::new(w, h, data))
    }
}
