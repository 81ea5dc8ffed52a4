//! Route queue and the intersection/stop-line state machine that drives
//! the perception pipeline frame by frame.
//!
//! Modeled as an explicit state machine (`WAITING_FOR_ROUTE`, `DRIVING`,
//! `IN_INTERSECTION`, `AT_STOPLINE`) built from sliding-window debounce
//! counts rather than as loose boolean flags, per the design this system
//! replaces a scattering of module-level mutable state with.

mod buffer;

use rover_config::VisionConfig;
use rover_vision::coordinate::{run_frame, Direction, FrameResult, HeadingState};
use rover_vision::image::Frame;

pub use buffer::RollingBuffer;

/// One action dequeued from a [`RouteQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Left,
    Right,
    Stop,
    /// `'S'`, accepted by the decoder but with no distinct effect beyond
    /// completing immediately; see the coordinator's open questions.
    StopNa,
}

impl Action {
    fn decode(byte: u8) -> Option<Self> {
        match byte {
            b'V' => Some(Action::Left),
            b'H' => Some(Action::Right),
            b'B' => Some(Action::Stop),
            b'S' => Some(Action::StopNa),
            _ => None,
        }
    }
}

/// Ordered list of pending action bytes, replaced wholesale when a new
/// route datagram arrives.
#[derive(Debug, Clone, Default)]
pub struct RouteQueue {
    pending: std::collections::VecDeque<u8>,
}

impl RouteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the pending list with `bytes`. Malformed bytes (outside
    /// `{'V','H','B','S'}`) are logged and skipped rather than rejecting
    /// the whole datagram.
    pub fn replace(&mut self, bytes: &[u8]) {
        self.pending.clear();
        for &b in bytes {
            if Action::decode(b).is_some() {
                self.pending.push_back(b);
            } else {
                tracing::warn!(byte = b, "dropping malformed route action byte");
            }
        }
    }

    fn pop_next(&mut self) -> Option<Action> {
        self.pending.pop_front().and_then(Action::decode)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Motor datagram payload for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    Heading(u8),
    /// `STOP_FINAL`, `0xFE`: this was the last queued action.
    StopFinal,
    /// `STOP`, `0xFF`: more actions remain queued after this stop.
    Stop,
}

impl Emission {
    pub fn byte(self) -> u8 {
        match self {
            Emission::Heading(b) => b,
            Emission::StopFinal => 0xFE,
            Emission::Stop => 0xFF,
        }
    }
}

/// Result of one coordinator tick.
pub struct StepOutput {
    pub emission: Emission,
    /// `None` only for the "waiting for route, queue empty" branch, where
    /// the pipeline does not run and the raw camera frame is pushed with
    /// no overlay.
    pub frame_result: Option<FrameResult>,
    pub waiting_for_route: bool,
}

/// Persistent state threaded across frames: the rolling debounce buffers,
/// the currently commanded direction/action, and the intersection/stop
/// section flags.
pub struct Coordinator {
    route: RouteQueue,
    direction: Direction,
    current_action: Option<Action>,
    action_completed: bool,
    intersection_active: bool,
    stop_section_active: bool,
    waiting_for_route: bool,
    last_stop: bool,
    intersection_cntr: RollingBuffer,
    stopline_cntr: RollingBuffer,
    normal_road_cntr: RollingBuffer,
    heading_state: HeadingState,
}

impl Coordinator {
    pub fn new(buffer_length: usize) -> Self {
        Self {
            route: RouteQueue::new(),
            direction: Direction::Left,
            current_action: None,
            action_completed: true,
            intersection_active: false,
            stop_section_active: false,
            waiting_for_route: true,
            last_stop: false,
            intersection_cntr: RollingBuffer::new(buffer_length),
            stopline_cntr: RollingBuffer::new(buffer_length),
            normal_road_cntr: RollingBuffer::new(buffer_length),
            heading_state: HeadingState::default(),
        }
    }

    /// Replaces the pending route atomically and marks the current action
    /// as completed so the next tick immediately dequeues from it.
    pub fn set_route(&mut self, bytes: &[u8]) {
        self.route.replace(bytes);
        self.action_completed = true;
        self.last_stop = false;
    }

    /// Runs one coordinator tick against `frame`.
    pub fn step(&mut self, frame: &Frame, cfg: &VisionConfig) -> StepOutput {
        if self.action_completed {
            match self.route.pop_next() {
                Some(action) => {
                    if let Action::Left | Action::Right = action {
                        self.direction = if action == Action::Left {
                            Direction::Left
                        } else {
                            Direction::Right
                        };
                    }
                    self.current_action = Some(action);
                    self.action_completed = false;
                    self.waiting_for_route = false;
                    if self.route.is_empty() {
                        self.last_stop = true;
                    }
                }
                None => {
                    self.waiting_for_route = true;
                    return StepOutput {
                        emission: Emission::Heading(0),
                        frame_result: None,
                        waiting_for_route: true,
                    };
                }
            }
        }

        let result = run_frame(
            frame,
            self.direction,
            self.intersection_active,
            &mut self.heading_state,
            cfg,
        );

        self.intersection_cntr.push(result.other_path.is_some());
        self.stopline_cntr.push(result.stop_point_full_frame.is_some());
        self.normal_road_cntr
            .push(result.both_edges_found && result.other_path.is_none());

        let c = &cfg.coordinator;

        if self.intersection_cntr.count_true() >= c.into_threshold
            && !self.intersection_active
            && matches!(self.current_action, Some(Action::Left) | Some(Action::Right))
        {
            self.intersection_active = true;
        }

        if self.normal_road_cntr.count_true() >= c.exit_threshold
            && self.intersection_active
            && result.median_lane_width.unwrap_or(1.0) < c.exit_median_lane_width_threshold
        {
            self.intersection_active = false;
            self.action_completed = true;
        }

        let mut stop_emission = None;
        if self.stopline_cntr.count_true() >= c.into_threshold
            && !self.stop_section_active
            && !self.intersection_active
        {
            self.stop_section_active = true;
            if self.current_action == Some(Action::Stop) && result.stop_point_full_frame.is_some() {
                stop_emission = Some(if self.last_stop {
                    Emission::StopFinal
                } else {
                    Emission::Stop
                });
            }
        }

        if self.stopline_cntr.count_false() >= c.exit_threshold && self.stop_section_active {
            self.stop_section_active = false;
            self.action_completed = true;
        }

        let emission = match stop_emission {
            Some(e) => e,
            None => {
                let mut heading = result.heading_deg;
                if self.intersection_active {
                    heading *= c.intersection_heading_multiplier;
                }
                Emission::Heading(quantize_heading(heading))
            }
        };

        StepOutput {
            emission,
            frame_result: Some(result),
            waiting_for_route: self.waiting_for_route,
        }
    }
}

/// Clamps to `[-25, 25]` degrees, linearly maps to `[0, 127]`, and masks to
/// 7 bits.
pub fn quantize_heading(deg: f32) -> u8 {
    let clamped = deg.clamp(-25.0, 25.0);
    let normalized = (clamped + 25.0) / 50.0;
    ((normalized * 127.0).round() as i32 & 0x7F) as u8
}

/// Inverse of [`quantize_heading`], used only by the round-trip property
/// test: maps a 7-bit code back to its approximate source angle.
pub fn dequantize_heading(code: u8) -> f32 {
    (code as f32 / 127.0) * 50.0 - 25.0
}
