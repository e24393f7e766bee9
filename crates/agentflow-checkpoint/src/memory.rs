//! In-memory checkpoint storage for development and testing
//!
//! [`MemorySaver`] is the reference implementation of [`CheckpointSaver`]: a
//! thread-safe `HashMap` holding the latest snapshot per thread id. Data does
//! not survive a process restart, which is exactly the scope the engine
//! requires for within-session suspend/resume.
//!
//! **Use for:** development, tests, demos, short-lived interactive sessions.
//!
//! **Avoid for:** production deployments that must resume after a crash or
//! share checkpoints across processes - implement [`CheckpointSaver`] over a
//! real store instead.
//!
//! ```rust,ignore
//! use agentflow_checkpoint::{Checkpoint, CheckpointSaver, MemorySaver};
//!
//! let saver = MemorySaver::new();
//! saver.save("session-1", checkpoint).await?;
//! assert!(saver.load("session-1").await?.is_some());
//! saver.delete("session-1").await?;
//! assert!(saver.load("session-1").await?.is_none());
//! ```

use crate::checkpoint::Checkpoint;
use crate::error::Result;
use crate::traits::CheckpointSaver;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Thread-safe in-memory checkpoint store.
///
/// Cloning a `MemorySaver` produces a handle to the same underlying map, so a
/// clone handed to a compiled graph observes the same snapshots as the
/// original.
#[derive(Debug, Clone, Default)]
pub struct MemorySaver {
    checkpoints: Arc<RwLock<HashMap<String, Checkpoint>>>,
}

impl MemorySaver {
    /// Create an empty saver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of threads currently holding a snapshot. Test helper.
    pub async fn thread_count(&self) -> usize {
        self.checkpoints.read().await.len()
    }

    /// Drop every snapshot. Test helper for isolation between cases.
    pub async fn clear(&self) {
        self.checkpoints.write().await.clear();
    }
}

#[async_trait]
impl CheckpointSaver for MemorySaver {
    async fn save(&self, thread_id: &str, checkpoint: Checkpoint) -> Result<()> {
        self.checkpoints
            .write()
            .await
            .insert(thread_id.to_string(), checkpoint);
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.checkpoints.read().await.get(thread_id).cloned())
    }

    async fn delete(&self, thread_id: &str) -> Result<()> {
        self.checkpoints.write().await.remove(thread_id);
        Ok(())
    }
}
