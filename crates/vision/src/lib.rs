//! Per-frame lane perception pipeline.
//!
//! Stages run in a fixed order, each taking the previous stage's output:
//! [`roi`] → [`binarize`] → [`cluster`] → [`classify`] → [`boundary`] →
//! [`path`] → [`coordinate`]. [`annotate`] renders the debug overlay the
//! streamer pushes to the remote GUI.

pub mod annotate;
pub mod binarize;
pub mod boundary;
pub mod classify;
pub mod cluster;
pub mod coordinate;
pub mod image;
pub mod path;
pub mod roi;

use thiserror::Error;

/// Failure that stops the pipeline from producing a frame result at all.
/// Per-frame "nothing found" conditions are *not* represented here — they
/// are empty sentinels (`None`, empty `Vec`) threaded through
/// [`coordinate::FrameResult`] instead, since they are expected outcomes,
/// not errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("frame dimensions {got_w}x{got_h} do not match configured {expected_w}x{expected_h}")]
    FrameSizeMismatch {
        got_w: u32,
        got_h: u32,
        expected_w: u32,
        expected_h: u32,
    },
}

/// Checks a captured frame against the configured geometry before it
/// enters the pipeline; collaborators that deliver mismatched frames are a
/// misconfiguration, not a transient condition, so this is the one place
/// the pipeline itself returns `Err`.
pub fn validate_frame_size(
    frame: &image::Frame,
    geometry: &rover_config::GeometryConfig,
) -> Result<(), PipelineError> {
    if frame.width() != geometry.frame_w || frame.height() != geometry.frame_h {
        return Err(PipelineError::FrameSizeMismatch {
            got_w: frame.width(),
            got_h: frame.height(),
            expected_w: geometry.frame_w,
            expected_h: geometry.frame_h,
        });
    }
    Ok(())
}
