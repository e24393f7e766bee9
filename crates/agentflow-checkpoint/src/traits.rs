//! Extensible checkpoint storage trait for custom backend implementations
//!
//! This module defines **[`CheckpointSaver`]** - the abstraction the execution
//! engine uses to persist and restore run snapshots. The engine calls `save`
//! when an invocation suspends for external feedback, `load` when a caller
//! re-invokes with the same thread id, and `delete` once the run reaches a
//! terminal state.
//!
//! # Implementing a Backend
//!
//! ```rust,ignore
//! use agentflow_checkpoint::{Checkpoint, CheckpointSaver};
//! use async_trait::async_trait;
//!
//! struct PostgresSaver {
//!     pool: sqlx::PgPool,
//! }
//!
//! #[async_trait]
//! impl CheckpointSaver for PostgresSaver {
//!     async fn save(&self, thread_id: &str, checkpoint: Checkpoint)
//!         -> agentflow_checkpoint::Result<()>
//!     {
//!         let data = serde_json::to_value(&checkpoint)?;
//!         sqlx::query("INSERT INTO checkpoints (thread_id, data) VALUES ($1, $2)
//!                      ON CONFLICT (thread_id) DO UPDATE SET data = $2")
//!             .bind(thread_id)
//!             .bind(data)
//!             .execute(&self.pool)
//!             .await
//!             .map_err(|e| CheckpointError::Storage(e.to_string()))?;
//!         Ok(())
//!     }
//!
//!     // ... load, delete ...
//! }
//! ```
//!
//! # Requirements
//!
//! Implementations must be `Send + Sync` and safe for concurrent access from
//! multiple in-flight runs. Each thread id is an independent namespace: `save`
//! replaces only that thread's snapshot, `load` with an unknown thread id
//! returns `Ok(None)` (not an error), and `delete` of an unknown thread id is
//! a no-op.

use crate::checkpoint::Checkpoint;
use crate::error::Result;
use async_trait::async_trait;

/// Storage contract for run snapshots, keyed by thread id.
///
/// The latest snapshot per thread is the only one the engine ever asks for,
/// so backends may keep a single row per thread or retain history for audit
/// purposes - the contract only requires that `load` returns the most recent
/// `save` for the thread.
#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    /// Persist a snapshot under the given thread id, replacing any previous one.
    async fn save(&self, thread_id: &str, checkpoint: Checkpoint) -> Result<()>;

    /// Fetch the latest snapshot for a thread, or `None` if the thread has none.
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>>;

    /// Remove a thread's snapshot. Unknown thread ids are ignored.
    async fn delete(&self, thread_id: &str) -> Result<()> {
        let _ = thread_id;
        Ok(())
    }
}
