//! Checkpoint snapshot structure
//!
//! A [`Checkpoint`] captures everything needed to resume a suspended run:
//! the full state-store contents plus, when the run suspended for external
//! feedback, the serialized interruption record. The interruption is stored
//! as plain JSON so this crate has no dependency on engine types; the engine
//! deserializes it back into its own `InterruptionMetadata` on resume.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Durable snapshot of a run, keyed by thread id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Unique identifier for this snapshot
    pub id: Uuid,

    /// The thread this snapshot belongs to
    pub thread_id: String,

    /// State-store contents at the time of the snapshot
    pub state: BTreeMap<String, Value>,

    /// Serialized interruption record, present while the run is suspended
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interruption: Option<Value>,

    /// When the snapshot was taken
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Create a new checkpoint for the given thread.
    pub fn new(
        thread_id: impl Into<String>,
        state: BTreeMap<String, Value>,
        interruption: Option<Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            thread_id: thread_id.into(),
            state,
            interruption,
            created_at: Utc::now(),
        }
    }

    /// Whether this checkpoint records a suspended (not yet terminal) run.
    pub fn is_suspended(&self) -> bool {
        self.interruption.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checkpoint_roundtrip() {
        let mut state = BTreeMap::new();
        state.insert("messages".to_string(), json!(["hello"]));
        state.insert("count".to_string(), json!(3));

        let checkpoint = Checkpoint::new("thread-1", state, Some(json!({"node": "leaf"})));
        assert!(checkpoint.is_suspended());

        let encoded = serde_json::to_string(&checkpoint).unwrap();
        let decoded: Checkpoint = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded.id, checkpoint.id);
        assert_eq!(decoded.thread_id, "thread-1");
        assert_eq!(decoded.state["count"], json!(3));
        assert_eq!(decoded.interruption, Some(json!({"node": "leaf"})));
    }

    #[test]
    fn test_terminal_checkpoint_has_no_interruption() {
        let checkpoint = Checkpoint::new("thread-2", BTreeMap::new(), None);
        assert!(!checkpoint.is_suspended());
    }
}
