//! Capability Binding Layer.
//!
//! Exposes the fixed set of operations a sandboxed script may call. Each
//! operation defaults and validates its arguments, forwards to the
//! [`RobotBackend`] and wraps the result back into the script's value
//! representation. No business logic lives here.
//!
//! Failure discipline: a failed robot command is a soft error — it is queued
//! on the session for the engine to publish and a neutral value is returned
//! to the script. Only marshalling problems (unknown operation, wrong-typed
//! arguments, an object without the expected pose fields) are hard faults
//! that abort the run.

pub mod args;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use crate::robot::{RobotBackend, RobotResult, SceneObject, BASE_FRAME};
use crate::runner::session::SessionState;
use crate::script::ScriptFault;

use args::*;

/// A hard failure at the binding boundary. Propagates as a script fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    UnknownOperation(String),
    BadArguments { operation: String, message: String },
}

impl std::fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownOperation(name) => write!(f, "unknown capability: {name}"),
            Self::BadArguments { operation, message } => {
                write!(f, "bad arguments for {operation}: {message}")
            }
        }
    }
}

impl std::error::Error for CapabilityError {}

/// The capability table, bound to one robot backend.
pub struct CapabilityBindings {
    robot: Arc<dyn RobotBackend>,
}

impl CapabilityBindings {
    pub fn new(robot: Arc<dyn RobotBackend>) -> Self {
        Self { robot }
    }

    /// Invokes one named operation with JSON-object arguments.
    ///
    /// Operation names and argument keys are the script-facing ABI and must
    /// match the table bit for bit.
    pub async fn dispatch(
        &self,
        operation: &str,
        params: Value,
        session: &mut SessionState,
    ) -> Result<Value, CapabilityError> {
        debug!("Capability call: {operation}");
        match operation {
            "askMultipleChoice" => {
                let a: AskMultipleChoiceArgs = parse_args(operation, params)?;
                let result = self
                    .robot
                    .ask_multiple_choice(&a.question, &a.choices, a.timeout)
                    .await;
                Ok(record_soft(session, result, Value::Null, |s| json!(s)))
            }
            "displayMessage" => {
                let a: DisplayMessageArgs = parse_args(operation, params)?;
                let result = self
                    .robot
                    .display_message(&a.headline, &a.subtext, a.timeout)
                    .await;
                Ok(status_value(session, result))
            }
            "findObjects" => {
                let result = self.robot.find_objects().await;
                Ok(record_soft(session, result, json!([]), |objects| {
                    serde_json::to_value(objects).unwrap_or_else(|_| json!([]))
                }))
            }
            "goTo" => {
                let a: GoToArgs = parse_args(operation, params)?;
                let result = self.robot.go_to(&a.location).await;
                Ok(status_value(session, result))
            }
            "goToDock" => {
                let result = self.robot.go_to_dock().await;
                Ok(status_value(session, result))
            }
            "isGripperOpen" => {
                let a: IsGripperOpenArgs = parse_args(operation, params)?;
                let result = self.robot.is_gripper_open(&a.gripper).await;
                Ok(status_value(session, result))
            }
            "lookAt" => {
                let a: LookAtArgs = parse_args(operation, params)?;
                let (x, y, z) = object_position(operation, &a.object)?;
                let result = self.robot.look_at(x, y, z, BASE_FRAME).await;
                Ok(status_value(session, result))
            }
            "lookAtDegrees" => {
                let a: LookAtDegreesArgs = parse_args(operation, params)?;
                let result = self.robot.look_at_degrees(a.up, a.left).await;
                Ok(status_value(session, result))
            }
            "pick" => {
                let a: PickArgs = parse_args(operation, params)?;
                let object = marshal_object(operation, a.object)?;
                let result = self.robot.pick(object.as_ref(), a.arm_id).await;
                Ok(status_value(session, result))
            }
            "place" => {
                let a: PlaceArgs = parse_args(operation, params)?;
                let result = self.robot.place(a.arm_id).await;
                Ok(status_value(session, result))
            }
            "runPbdAction" => {
                let a: RunPbdActionArgs = parse_args(operation, params)?;
                let result = self.robot.run_pbd_action(&a.action_id).await;
                Ok(status_value(session, result))
            }
            "say" => {
                let a: SayArgs = parse_args(operation, params)?;
                let result = self.robot.say(&a.text).await;
                Ok(status_value(session, result))
            }
            "setGripper" => {
                let a: SetGripperArgs = parse_args(operation, params)?;
                let result = self.robot.set_gripper(a.side, a.action, a.max_effort).await;
                Ok(status_value(session, result))
            }
            "tuckArms" => {
                let a: TuckArmsArgs = parse_args(operation, params)?;
                let result = self.robot.tuck_arms(a.tuck_left, a.tuck_right).await;
                Ok(status_value(session, result))
            }
            // The only operation with no robot call: records the executing
            // block so feedback frames can point at it.
            "highlightBlock" => {
                let a: HighlightBlockArgs = parse_args(operation, params)?;
                session.set_current_block(a.block_id);
                Ok(Value::Null)
            }
            other => Err(CapabilityError::UnknownOperation(other.to_string())),
        }
    }
}

/// Handle lent to the interpreter for the duration of one unit of work.
pub struct Host<'a> {
    bindings: &'a CapabilityBindings,
    session: &'a mut SessionState,
}

impl<'a> Host<'a> {
    pub fn new(bindings: &'a CapabilityBindings, session: &'a mut SessionState) -> Self {
        Self { bindings, session }
    }

    /// Invokes a capability on behalf of the script. A hard binding error
    /// surfaces as a script fault and aborts the run.
    pub async fn call(&mut self, operation: &str, params: Value) -> Result<Value, ScriptFault> {
        self.bindings
            .dispatch(operation, params, self.session)
            .await
            .map_err(|e| ScriptFault::new(e.to_string()))
    }

    /// The id of the block currently executing, as recorded by
    /// `highlightBlock`.
    pub fn current_block(&self) -> &str {
        self.session.current_block()
    }
}

/// Deserializes the JSON-object arguments, falling back to the operation's
/// defaults when no arguments were passed at all.
fn parse_args<T: DeserializeOwned + Default>(
    operation: &str,
    params: Value,
) -> Result<T, CapabilityError> {
    if params.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(params).map_err(|e| CapabilityError::BadArguments {
        operation: operation.to_string(),
        message: e.to_string(),
    })
}

/// Queues a soft error and substitutes a neutral value, or converts the
/// successful result for the script.
fn record_soft<T>(
    session: &mut SessionState,
    result: RobotResult<T>,
    neutral: Value,
    to_value: impl FnOnce(T) -> Value,
) -> Value {
    match result {
        Ok(v) => to_value(v),
        Err(e) => {
            debug!("Robot command failed (soft): {e}");
            session.record_soft_error(e);
            neutral
        }
    }
}

fn status_value(session: &mut SessionState, result: RobotResult<bool>) -> Value {
    record_soft(session, result, json!(false), |ok| json!(ok))
}

/// Extracts `pose.pose.position.{x,y,z}` from a marshalled scene object.
fn object_position(operation: &str, object: &Value) -> Result<(f64, f64, f64), CapabilityError> {
    let position = object
        .get("pose")
        .and_then(|p| p.get("pose"))
        .and_then(|p| p.get("position"))
        .ok_or_else(|| CapabilityError::BadArguments {
            operation: operation.to_string(),
            message: "object has no pose.pose.position".to_string(),
        })?;
    let coord = |axis: &str| {
        position
            .get(axis)
            .and_then(Value::as_f64)
            .ok_or_else(|| CapabilityError::BadArguments {
                operation: operation.to_string(),
                message: format!("object position has no numeric {axis}"),
            })
    };
    Ok((coord("x")?, coord("y")?, coord("z")?))
}

/// Converts a marshalled object back into a [`SceneObject`]; `null` means
/// no object.
fn marshal_object(operation: &str, object: Value) -> Result<Option<SceneObject>, CapabilityError> {
    if object.is_null() {
        return Ok(None);
    }
    serde_json::from_value(object)
        .map(Some)
        .map_err(|e| CapabilityError::BadArguments {
            operation: operation.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::robot::{Point, Pose, SoftError, StampedPose};

    /// Records every backend call and optionally fails the next one.
    #[derive(Default)]
    struct FakeRobot {
        calls: Mutex<Vec<String>>,
        fail_next: Mutex<Option<SoftError>>,
        objects: Mutex<Vec<SceneObject>>,
    }

    impl FakeRobot {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn fail_next(&self, message: &str) {
            *self.fail_next.lock().unwrap() = Some(SoftError::new(message));
        }

        fn record<T>(&self, call: String, ok: T) -> RobotResult<T> {
            self.calls.lock().unwrap().push(call);
            match self.fail_next.lock().unwrap().take() {
                Some(e) => Err(e),
                None => Ok(ok),
            }
        }
    }

    #[async_trait]
    impl RobotBackend for FakeRobot {
        async fn ask_multiple_choice(
            &self,
            question: &str,
            choices: &[String],
            timeout: f64,
        ) -> RobotResult<String> {
            self.record(
                format!("askMultipleChoice({question}, {choices:?}, {timeout})"),
                choices.first().cloned().unwrap_or_default(),
            )
        }

        async fn display_message(
            &self,
            headline: &str,
            subtext: &str,
            timeout: f64,
        ) -> RobotResult<bool> {
            self.record(format!("displayMessage({headline}, {subtext}, {timeout})"), true)
        }

        async fn find_objects(&self) -> RobotResult<Vec<SceneObject>> {
            let objects = self.objects.lock().unwrap().clone();
            self.record("findObjects()".to_string(), objects)
        }

        async fn go_to(&self, location: &str) -> RobotResult<bool> {
            self.record(format!("goTo({location})"), true)
        }

        async fn go_to_dock(&self) -> RobotResult<bool> {
            self.record("goToDock()".to_string(), true)
        }

        async fn is_gripper_open(&self, gripper: &str) -> RobotResult<bool> {
            self.record(format!("isGripperOpen({gripper})"), true)
        }

        async fn look_at(&self, x: f64, y: f64, z: f64, frame_id: &str) -> RobotResult<bool> {
            self.record(format!("lookAt({x}, {y}, {z}, {frame_id})"), true)
        }

        async fn look_at_degrees(&self, up: f64, left: f64) -> RobotResult<bool> {
            self.record(format!("lookAtDegrees({up}, {left})"), true)
        }

        async fn pick(&self, object: Option<&SceneObject>, arm_id: i64) -> RobotResult<bool> {
            let name = object.map(|o| o.name.clone()).unwrap_or_else(|| "null".into());
            self.record(format!("pick({name}, {arm_id})"), true)
        }

        async fn place(&self, arm_id: i64) -> RobotResult<bool> {
            self.record(format!("place({arm_id})"), true)
        }

        async fn run_pbd_action(&self, action_id: &str) -> RobotResult<bool> {
            self.record(format!("runPbdAction({action_id})"), true)
        }

        async fn say(&self, text: &str) -> RobotResult<bool> {
            self.record(format!("say({text})"), true)
        }

        async fn set_gripper(&self, side: i64, action: i64, max_effort: f64) -> RobotResult<bool> {
            self.record(format!("setGripper({side}, {action}, {max_effort})"), true)
        }

        async fn tuck_arms(&self, tuck_left: bool, tuck_right: bool) -> RobotResult<bool> {
            self.record(format!("tuckArms({tuck_left}, {tuck_right})"), true)
        }
    }

    fn bindings() -> (Arc<FakeRobot>, CapabilityBindings, SessionState) {
        let robot = Arc::new(FakeRobot::default());
        let bindings = CapabilityBindings::new(robot.clone());
        (robot, bindings, SessionState::new())
    }

    fn mug_at(x: f64, y: f64, z: f64) -> SceneObject {
        SceneObject {
            name: "mug".to_string(),
            pose: StampedPose {
                frame_id: BASE_FRAME.to_string(),
                pose: Pose {
                    position: Point { x, y, z },
                    ..Default::default()
                },
            },
        }
    }

    // ── Argument defaulting ──────────────────────────────

    #[tokio::test]
    async fn test_set_gripper_defaults_max_effort() {
        let (robot, bindings, mut session) = bindings();
        bindings
            .dispatch("setGripper", json!({"side": 1, "action": 2}), &mut session)
            .await
            .unwrap();
        assert_eq!(robot.calls(), vec!["setGripper(1, 2, -1)"]);
    }

    #[tokio::test]
    async fn test_set_gripper_explicit_matches_default_shape() {
        let (robot, bindings, mut session) = bindings();
        bindings
            .dispatch(
                "setGripper",
                json!({"side": 1, "action": 2, "maxEffort": -1.0}),
                &mut session,
            )
            .await
            .unwrap();
        assert_eq!(robot.calls(), vec!["setGripper(1, 2, -1)"]);
    }

    #[tokio::test]
    async fn test_no_params_uses_all_defaults() {
        let (robot, bindings, mut session) = bindings();
        bindings
            .dispatch("tuckArms", Value::Null, &mut session)
            .await
            .unwrap();
        assert_eq!(robot.calls(), vec!["tuckArms(false, false)"]);
    }

    #[tokio::test]
    async fn test_say_forwards_text() {
        let (robot, bindings, mut session) = bindings();
        let result = bindings
            .dispatch("say", json!({"text": "hello"}), &mut session)
            .await
            .unwrap();
        assert_eq!(result, json!(true));
        assert_eq!(robot.calls(), vec!["say(hello)"]);
    }

    // ── findObjects marshalling ──────────────────────────

    #[tokio::test]
    async fn test_find_objects_empty_scene() {
        let (_robot, bindings, mut session) = bindings();
        let result = bindings
            .dispatch("findObjects", Value::Null, &mut session)
            .await
            .unwrap();
        assert_eq!(result, json!([]));
        assert!(session.take_soft_errors().is_empty());
    }

    #[tokio::test]
    async fn test_find_objects_marshals_records() {
        let (robot, bindings, mut session) = bindings();
        *robot.objects.lock().unwrap() = vec![mug_at(0.5, -0.2, 0.8)];
        let result = bindings
            .dispatch("findObjects", Value::Null, &mut session)
            .await
            .unwrap();
        assert_eq!(result[0]["name"], "mug");
        assert_eq!(result[0]["pose"]["pose"]["position"]["x"], 0.5);
    }

    // ── lookAt pose extraction ───────────────────────────

    #[tokio::test]
    async fn test_look_at_extracts_position_in_base_frame() {
        let (robot, bindings, mut session) = bindings();
        let object = serde_json::to_value(mug_at(1.0, 2.0, 3.0)).unwrap();
        bindings
            .dispatch("lookAt", json!({ "object": object }), &mut session)
            .await
            .unwrap();
        assert_eq!(robot.calls(), vec!["lookAt(1, 2, 3, base_footprint)"]);
    }

    #[tokio::test]
    async fn test_look_at_missing_pose_is_hard_fault() {
        let (robot, bindings, mut session) = bindings();
        let result = bindings
            .dispatch("lookAt", json!({"object": {"name": "mug"}}), &mut session)
            .await;
        assert!(matches!(
            result,
            Err(CapabilityError::BadArguments { .. })
        ));
        // The backend was never reached
        assert!(robot.calls().is_empty());
    }

    #[tokio::test]
    async fn test_look_at_non_numeric_coordinate_is_hard_fault() {
        let (_robot, bindings, mut session) = bindings();
        let result = bindings
            .dispatch(
                "lookAt",
                json!({"object": {"pose": {"pose": {"position": {"x": "oops", "y": 0, "z": 0}}}}}),
                &mut session,
            )
            .await;
        assert!(result.is_err());
    }

    // ── pick marshalling ─────────────────────────────────

    #[tokio::test]
    async fn test_pick_without_object() {
        let (robot, bindings, mut session) = bindings();
        bindings
            .dispatch("pick", json!({"armId": 1}), &mut session)
            .await
            .unwrap();
        assert_eq!(robot.calls(), vec!["pick(null, 1)"]);
    }

    #[tokio::test]
    async fn test_pick_with_object() {
        let (robot, bindings, mut session) = bindings();
        let object = serde_json::to_value(mug_at(0.0, 0.0, 0.0)).unwrap();
        bindings
            .dispatch("pick", json!({"object": object, "armId": 0}), &mut session)
            .await
            .unwrap();
        assert_eq!(robot.calls(), vec!["pick(mug, 0)"]);
    }

    #[tokio::test]
    async fn test_pick_malformed_object_is_hard_fault() {
        let (_robot, bindings, mut session) = bindings();
        let result = bindings
            .dispatch("pick", json!({"object": 42, "armId": 0}), &mut session)
            .await;
        assert!(matches!(
            result,
            Err(CapabilityError::BadArguments { .. })
        ));
    }

    // ── Soft error handling ──────────────────────────────

    #[tokio::test]
    async fn test_failed_command_queues_soft_error_and_returns_false() {
        let (robot, bindings, mut session) = bindings();
        robot.fail_next("nav stack offline");
        let result = bindings
            .dispatch("goTo", json!({"location": "kitchen"}), &mut session)
            .await
            .unwrap();
        // The script sees a failed status, never an exception
        assert_eq!(result, json!(false));
        let errors = session.take_soft_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message(), "nav stack offline");
    }

    #[tokio::test]
    async fn test_failed_choice_returns_null() {
        let (robot, bindings, mut session) = bindings();
        robot.fail_next("screen unavailable");
        let result = bindings
            .dispatch("askMultipleChoice", json!({"question": "?"}), &mut session)
            .await
            .unwrap();
        assert_eq!(result, Value::Null);
        assert_eq!(session.take_soft_errors().len(), 1);
    }

    // ── Hard faults ──────────────────────────────────────

    #[tokio::test]
    async fn test_unknown_operation() {
        let (_robot, bindings, mut session) = bindings();
        let result = bindings.dispatch("selfDestruct", Value::Null, &mut session).await;
        assert_eq!(
            result,
            Err(CapabilityError::UnknownOperation("selfDestruct".to_string()))
        );
    }

    #[tokio::test]
    async fn test_wrong_typed_argument() {
        let (_robot, bindings, mut session) = bindings();
        let result = bindings
            .dispatch("goTo", json!({"location": 42}), &mut session)
            .await;
        assert!(matches!(
            result,
            Err(CapabilityError::BadArguments { .. })
        ));
    }

    // ── highlightBlock ───────────────────────────────────

    #[tokio::test]
    async fn test_highlight_block_records_id_without_robot_call() {
        let (robot, bindings, mut session) = bindings();
        let result = bindings
            .dispatch("highlightBlock", json!({"blockId": "b3"}), &mut session)
            .await
            .unwrap();
        assert_eq!(result, Value::Null);
        assert_eq!(session.current_block(), "b3");
        assert!(robot.calls().is_empty());
    }

    // ── Host handle ──────────────────────────────────────

    #[tokio::test]
    async fn test_host_converts_hard_fault_to_script_fault() {
        let (_robot, bindings, mut session) = bindings();
        let mut host = Host::new(&bindings, &mut session);
        let fault = host.call("noSuchOp", Value::Null).await.unwrap_err();
        assert!(fault.message().contains("unknown capability"));
        assert!(fault.message().contains("noSuchOp"));
    }

    #[tokio::test]
    async fn test_host_exposes_current_block() {
        let (_robot, bindings, mut session) = bindings();
        let mut host = Host::new(&bindings, &mut session);
        host.call("highlightBlock", json!({"blockId": "b7"}))
            .await
            .unwrap();
        assert_eq!(host.current_block(), "b7");
    }
}
