//! # agentflow-checkpoint - State Persistence for Suspended Agent Runs
//!
//! **Trait-based checkpoint abstractions** for persisting and restoring the state of
//! agent-graph executions. Checkpoints are what make human-in-the-loop workflows
//! possible: when an agent suspends to wait for an external decision, its state is
//! saved under a durable thread identifier and reloaded when the caller resumes.
//!
//! ## Overview
//!
//! A [`Checkpoint`] is a snapshot of a run, keyed by thread id:
//!
//! - **State values** - every key/value pair of the run's state store
//! - **Interruption record** - the suspended node and its pending tool decisions,
//!   stored as opaque JSON so this crate stays independent of engine types
//! - **Identity** - a unique checkpoint id and creation timestamp
//!
//! The [`CheckpointSaver`] trait is the storage contract. This crate ships
//! [`MemorySaver`], an in-memory reference implementation suitable for development,
//! testing, and within-session resume. Production backends (PostgreSQL, Redis,
//! SQLite, object storage) implement the same trait downstream.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use agentflow_checkpoint::{Checkpoint, CheckpointSaver, MemorySaver};
//!
//! let saver = MemorySaver::new();
//!
//! let checkpoint = Checkpoint::new("session-1", state_values, Some(interruption_json));
//! saver.save("session-1", checkpoint).await?;
//!
//! // Later, on resume:
//! if let Some(snapshot) = saver.load("session-1").await? {
//!     // restore state and replay from the suspended node
//! }
//! ```
//!
//! ## Thread Isolation
//!
//! Each thread id owns an independent snapshot. Saving under one thread never
//! affects another; deleting a thread removes only that thread's checkpoint.

pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod traits;

pub use checkpoint::Checkpoint;
pub use error::{CheckpointError, Result};
pub use memory::MemorySaver;
pub use traits::CheckpointSaver;
