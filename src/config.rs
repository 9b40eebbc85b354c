use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub runner: RunnerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RunnerConfig {
    /// What to do when a goal arrives while a program is already running.
    pub on_busy: BusyPolicy,
    /// Capacity of the command channel into the runtime.
    pub command_capacity: usize,
    /// Capacity of each goal's feedback/result channel.
    pub feedback_capacity: usize,
    /// Capacity of the broadcast error channel.
    pub error_capacity: usize,
}

/// Policy for a start request received while a session is active.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// The new goal is immediately aborted; the running program is untouched.
    Reject,
    /// The running program is preempted and the new goal takes its place.
    Preempt,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            on_busy: BusyPolicy::Reject,
            command_capacity: 16,
            feedback_capacity: 64,
            error_capacity: 16,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        // Expand environment variables like ${ROBOT_HOST}
        let expanded = shellexpand::env(&content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }
}
