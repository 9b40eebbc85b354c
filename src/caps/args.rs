//! Typed argument structs for the capability ABI.
//!
//! Each operation takes a JSON object with camelCase keys; absent fields take
//! the defaults below instead of failing. A wrong-typed field is a hard
//! marshalling error handled by the dispatcher.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AskMultipleChoiceArgs {
    pub question: String,
    pub choices: Vec<String>,
    pub timeout: f64,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct DisplayMessageArgs {
    pub headline: String,
    pub subtext: String,
    pub timeout: f64,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GoToArgs {
    pub location: String,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct IsGripperOpenArgs {
    pub gripper: String,
}

/// The object is kept as a raw value: only `pose.pose.position` is read, and
/// a record missing those fields is a marshalling fault.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LookAtArgs {
    pub object: Value,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LookAtDegreesArgs {
    pub up: f64,
    pub left: f64,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PickArgs {
    pub object: Value,
    pub arm_id: i64,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaceArgs {
    pub arm_id: i64,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RunPbdActionArgs {
    pub action_id: String,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SayArgs {
    pub text: String,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SetGripperArgs {
    pub side: i64,
    pub action: i64,
    pub max_effort: f64,
}

impl Default for SetGripperArgs {
    fn default() -> Self {
        Self {
            side: 0,
            action: 0,
            // -1 tells the gripper controller "no effort limit"
            max_effort: -1.0,
        }
    }
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TuckArmsArgs {
    pub tuck_left: bool,
    pub tuck_right: bool,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct HighlightBlockArgs {
    pub block_id: String,
}
