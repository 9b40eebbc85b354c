//! Contract with the physical robot command surface.
//!
//! The actual implementation (ROS bridge, simulator, hardware driver) lives
//! outside this crate. Every call is synchronous from the script's point of
//! view: one capability call performs exactly one backend call and the step
//! loop waits for it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Reference frame used for object-relative look commands.
pub const BASE_FRAME: &str = "base_footprint";

/// A reported-but-non-fatal failure from a robot command.
///
/// Soft errors never abort the running program: the binding layer queues them
/// on the session and the engine publishes them on the error channel, once
/// per completed unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftError {
    message: String,
}

impl SoftError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for SoftError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SoftError {}

pub type RobotResult<T> = Result<T, SoftError>;

// ── Scene geometry records ───────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        // Identity rotation
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point,
    pub orientation: Quaternion,
}

/// A pose tagged with the reference frame it is expressed in.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StampedPose {
    #[serde(default)]
    pub frame_id: String,
    pub pose: Pose,
}

/// An object detected by perception, as handed to the script.
///
/// Serialized as-is into the script's value representation by `findObjects`
/// and deserialized back by `pick`; `lookAt` navigates `pose.pose.position`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneObject {
    #[serde(default)]
    pub name: String,
    pub pose: StampedPose,
}

// ── Command surface ──────────────────────────────────────

/// The robot command surface the capability bindings forward to.
///
/// Every method maps to exactly one physical capability. A failed command
/// returns a [`SoftError`] rather than panicking or aborting: whether the
/// failure matters is the script author's decision, not the backend's.
#[async_trait]
pub trait RobotBackend: Send + Sync {
    /// Presents a multiple-choice prompt and returns the selection.
    async fn ask_multiple_choice(
        &self,
        question: &str,
        choices: &[String],
        timeout: f64,
    ) -> RobotResult<String>;

    /// Shows a headline/subtext message on the robot's display.
    async fn display_message(
        &self,
        headline: &str,
        subtext: &str,
        timeout: f64,
    ) -> RobotResult<bool>;

    /// Returns the objects currently detected by perception.
    async fn find_objects(&self) -> RobotResult<Vec<SceneObject>>;

    /// Navigates to a named location.
    async fn go_to(&self, location: &str) -> RobotResult<bool>;

    /// Navigates to the charging dock.
    async fn go_to_dock(&self) -> RobotResult<bool>;

    /// Whether the named gripper is currently open.
    async fn is_gripper_open(&self, gripper: &str) -> RobotResult<bool>;

    /// Points the head at a position in the given reference frame.
    async fn look_at(&self, x: f64, y: f64, z: f64, frame_id: &str) -> RobotResult<bool>;

    /// Points the head relative to its current direction, in degrees.
    async fn look_at_degrees(&self, up: f64, left: f64) -> RobotResult<bool>;

    /// Picks up an object with the given arm.
    async fn pick(&self, object: Option<&SceneObject>, arm_id: i64) -> RobotResult<bool>;

    /// Places whatever the given arm is holding.
    async fn place(&self, arm_id: i64) -> RobotResult<bool>;

    /// Replays a stored programming-by-demonstration action.
    async fn run_pbd_action(&self, action_id: &str) -> RobotResult<bool>;

    /// Speaks the given text.
    async fn say(&self, text: &str) -> RobotResult<bool>;

    /// Opens or closes a gripper. `max_effort` of -1 means unlimited.
    async fn set_gripper(&self, side: i64, action: i64, max_effort: f64) -> RobotResult<bool>;

    /// Tucks or deploys the arms.
    async fn tuck_arms(&self, tuck_left: bool, tuck_right: bool) -> RobotResult<bool>;
}
