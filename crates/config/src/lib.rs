//! Tuning configuration for the lane-following vision pipeline.
//!
//! All thresholds and geometry constants named in the pipeline design are
//! collected here as one `VisionConfig`, loaded once at startup from a TOML
//! file and then shared read-only by the rest of the system. The defaults
//! reproduce the stock tuning of the reference implementation exactly.

mod error;

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use error::{Error, Result};

/// Geometry of the captured frame and the camera's projection model.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeometryConfig {
    pub frame_w: u32,
    pub frame_h: u32,
    pub focal_length_pix: f32,
    pub camera_x_offset: f32,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            frame_w: 480,
            frame_h: 360,
            focal_length_pix: 470.0,
            camera_x_offset: -20.0,
        }
    }
}

/// ROI extraction and binarization thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoiConfig {
    pub roi_top: f32,
    pub roi_bottom: f32,
    pub horizontal_margin: f32,
    pub roi_top_scale: f32,
    pub black_threshold: u8,
}

impl Default for RoiConfig {
    fn default() -> Self {
        Self {
            roi_top: 0.75,
            roi_bottom: 0.20,
            horizontal_margin: 0.01,
            roi_top_scale: 0.9,
            black_threshold: 120,
        }
    }
}

/// Connected-component clustering thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterConfig {
    pub min_cluster_active_px: u32,
    pub dilation_iter_count: u32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            min_cluster_active_px: 50,
            dilation_iter_count: 2,
        }
    }
}

/// Line/stop-line classifier thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierConfig {
    pub max_line_width_px: i32,
    pub max_line_thickness_deviation: f32,
    pub min_y_px_per_line: usize,
    pub stop_line_min_width: f32,
    pub stop_line_min_height: i32,
    pub activation_squares_of_roi: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_line_width_px: 24,
            max_line_thickness_deviation: 0.5,
            min_y_px_per_line: 10,
            // fraction of `GeometryConfig::frame_w`, resolved when the
            // classifier is configured against a concrete frame size
            stop_line_min_width: 0.6,
            stop_line_min_height: 80,
            activation_squares_of_roi: 0.8,
        }
    }
}

/// Boundary point selection and cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoundaryConfig {
    pub max_boundary_deviation: i32,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            max_boundary_deviation: 12,
        }
    }
}

/// Lane-center path reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathConfig {
    pub scanlines: usize,
    pub default_lane_width_of_roi: f32,
    pub lane_width_decrease_rate: f32,
    pub lookahead_pos: f32,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            scanlines: 6,
            default_lane_width_of_roi: 0.75,
            lane_width_decrease_rate: 0.06,
            lookahead_pos: 0.5,
        }
    }
}

/// Intersection divergence-test thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DivergenceConfig {
    pub divergence_threshold: f32,
    pub min_abs_divergence: f32,
    pub divergence_threshold_2: f32,
    pub min_abs_divergence_2: f32,
    pub abs_divergence_threshold_top: f32,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self {
            divergence_threshold: 1.6,
            min_abs_divergence: 75.0,
            divergence_threshold_2: 2.4,
            min_abs_divergence_2: 65.0,
            abs_divergence_threshold_top: 100.0,
        }
    }
}

/// Route/state coordinator debounce and heading behavior.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorConfig {
    pub buffer_length: usize,
    pub into_threshold: usize,
    pub exit_threshold: usize,
    pub intersection_heading_multiplier: f32,
    pub exit_median_lane_width_threshold: f32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            buffer_length: 5,
            into_threshold: 3,
            exit_threshold: 4,
            intersection_heading_multiplier: 1.1,
            exit_median_lane_width_threshold: 0.67,
        }
    }
}

/// Networking: sockets and JPEG quality.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetConfig {
    pub motor_socket_path: String,
    pub route_socket_path: String,
    pub stream_port: u16,
    pub jpeg_quality: u8,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            motor_socket_path: "/tmp/cam_offset.sock".to_string(),
            route_socket_path: "/tmp/cpp_to_py.sock".to_string(),
            stream_port: 6000,
            jpeg_quality: 60,
        }
    }
}

/// Debug overlay toggles for the annotated frame sent to the remote GUI.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DebugConfig {
    pub show_cluster_boxes: bool,
    pub show_cluster_text: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            show_cluster_boxes: false,
            show_cluster_text: false,
        }
    }
}

/// The full set of tuning values for one run of the pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct VisionConfig {
    pub geometry: GeometryConfig,
    pub roi: RoiConfig,
    pub cluster: ClusterConfig,
    pub classifier: ClassifierConfig,
    pub boundary: BoundaryConfig,
    pub path: PathConfig,
    pub divergence: DivergenceConfig,
    pub coordinator: CoordinatorConfig,
    pub net: NetConfig,
    pub debug: DebugConfig,
}

impl VisionConfig {
    /// Loads a config from a TOML file. Missing sections fall back to their
    /// defaults, so a deployment only needs to override the values it cares
    /// about.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.display().to_string(),
            source,
        })?;

        Ok(toml::from_str(&text)?)
    }

    /// Loads a config from `path` if it exists, otherwise returns the
    /// built-in defaults. Used so the binary can run out of the box without
    /// a config file on disk.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load(path)
    }

    /// Serializes the config to a TOML file, creating or overwriting it.
    pub fn store(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = toml::to_string_pretty(self)?;

        std::fs::write(path, text).map_err(|source| Error::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_tuning() {
        let cfg = VisionConfig::default();
        assert_eq!(cfg.geometry.frame_w, 480);
        assert_eq!(cfg.geometry.frame_h, 360);
        assert_eq!(cfg.path.scanlines, 6);
        assert_eq!(cfg.coordinator.buffer_length, 5);
        assert_eq!(cfg.coordinator.into_threshold, 3);
        assert_eq!(cfg.coordinator.exit_threshold, 4);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vision.toml");
        std::fs::write(&path, "[path]\nscanlines = 10\n").unwrap();

        let cfg = VisionConfig::load(&path).unwrap();
        assert_eq!(cfg.path.scanlines, 10);
        assert_eq!(cfg.path.lookahead_pos, 0.5);
        assert_eq!(cfg.geometry.frame_w, 480);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = VisionConfig::load_or_default("/nonexistent/path/vision.toml").unwrap();
        assert_eq!(cfg, VisionConfig::default());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vision.toml");
        std::fs::write(&path, "[roi]\ntypo_field = 1\n").unwrap();

        assert!(VisionConfig::load(&path).is_err());
    }

    #[test]
    fn round_trips_through_store_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vision.toml");

        let mut cfg = VisionConfig::default();
        cfg.divergence.divergence_threshold = 2.0;
        cfg.store(&path).unwrap();

        let loaded = VisionConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);
    }
}
