//! Inbound task-event model.
//!
//! The bus transport (owned by the deployment, not this crate) decodes each
//! delivery into a [`TaskEvent`] and hands it to the engine. Everything here
//! is the shape of that hand-off: the state enum, the pending/terminal
//! classification, and the decode error for protocol mismatches.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Task lifecycle states reported by the queue.
///
/// Wire representation is the lowercase state name used by the queue
/// exchanges (`pending`, `running`, `completed`, `exception`, `failed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Queued, not yet claimed by a worker.
    Pending,
    /// Claimed and executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Aborted by the platform (infra error, cancellation).
    Exception,
    /// Finished unsuccessfully.
    Failed,
}

/// What a state means to the coalescing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Task entered the pending pool: insert into its coalesce list.
    Pending,
    /// Task reached a final state: remove from its coalesce list.
    Terminal,
    /// Recognized but list-neutral (`running`): counted, never mutates.
    Observed,
}

/// Error returned when decoding an unrecognized task state string.
///
/// This is a protocol mismatch, not an operational condition: callers must
/// surface it (crash or log-and-drop), never swallow it silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTaskState {
    /// The unrecognized input string.
    pub raw: String,
}

impl fmt::Display for UnknownTaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown task state '{}': expected one of pending, running, \
             completed, exception, failed",
            self.raw
        )
    }
}

impl std::error::Error for UnknownTaskState {}

impl TaskState {
    /// All known states in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Running,
        Self::Completed,
        Self::Exception,
        Self::Failed,
    ];

    /// Canonical lowercase wire string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Exception => "exception",
            Self::Failed => "failed",
        }
    }

    /// Classify the state for the engine.
    ///
    /// Only `pending` inserts and only final states remove. `running` is a
    /// recognized pass-through: the queue may deliver it, but it neither
    /// inserts nor removes.
    #[must_use]
    pub const fn transition(self) -> Transition {
        match self {
            Self::Pending => Transition::Pending,
            Self::Running => Transition::Observed,
            Self::Completed | Self::Exception | Self::Failed => Transition::Terminal,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = UnknownTaskState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "exception" => Ok(Self::Exception),
            "failed" => Ok(Self::Failed),
            _ => Err(UnknownTaskState { raw: s.to_string() }),
        }
    }
}

// Custom serde: serialize as the lowercase wire string.
impl Serialize for TaskState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A decoded task event, as handed over by the bus consumer.
///
/// `routes` carries the CC routing labels from the delivery; the attribute
/// fields (`provisioner_id`, `worker_type`) come from the task status
/// payload. Which of these feeds key derivation is a [`crate::key`] policy
/// decision, not the event's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    /// Queue task identifier.
    pub task_id: String,
    /// Run index within the task; retries carry a non-zero value.
    #[serde(default)]
    pub run_id: u32,
    /// Reported lifecycle state.
    pub state: TaskState,
    /// Candidate routing labels (CC routes) from the delivery.
    #[serde(default)]
    pub routes: Vec<String>,
    /// Provisioner the task was queued for, when the payload carries it.
    #[serde(default)]
    pub provisioner_id: Option<String>,
    /// Worker type the task was queued for, when the payload carries it.
    #[serde(default)]
    pub worker_type: Option<String>,
}
