//! Shared key/value state with per-key merge strategies
//!
//! Every agent in a graph reads from and writes to a single [`StateStore`].
//! Writes go through a [`KeyStrategy`] registered for the key, which decides
//! how an incoming value combines with the current one:
//!
//! - [`ReplaceStrategy`] - last write wins (the default for unregistered keys)
//! - [`AppendStrategy`] - values accumulate into a JSON array
//! - [`FnStrategy`] - arbitrary user-supplied merge function
//!
//! Strategy registration is first-wins: once a key has a strategy, later
//! registrations for the same key are ignored. This lets a compiled graph seed
//! strategies up front while leaf agents opportunistically register defaults
//! (e.g. `Append` for their message history key) without clobbering an
//! explicit choice.
//!
//! The store also tracks which keys were written since the last
//! [`StateStore::clear_dirty`], which is how parallel branches report their
//! deltas back to the parent scope.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A set of pending writes, keyed by state key.
pub type StateDelta = serde_json::Map<String, Value>;

/// Errors from state store operations
#[derive(Error, Debug)]
pub enum StateError {
    /// A merge strategy rejected the combination of current and incoming values
    #[error("Merge conflict on key '{key}': {message}")]
    MergeConflict { key: String, message: String },

    /// A value could not be deserialized into the requested type
    #[error("Type mismatch on key '{key}': {message}")]
    TypeMismatch { key: String, message: String },
}

/// Decides how an incoming value for a key combines with the current value.
///
/// Strategies must be deterministic: given the same current and incoming
/// values they must produce the same result, since parallel branch merges
/// rely on replaying writes in declaration order.
pub trait KeyStrategy: Send + Sync {
    /// Merge an incoming value with the current one. `current` is `None`
    /// when the key has never been written.
    fn merge(&self, key: &str, current: Option<&Value>, incoming: Value)
        -> Result<Value, StateError>;

    /// Short human-readable name, used in graph descriptions and logs.
    fn name(&self) -> &str;
}

/// Last write wins. The default for keys without a registered strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceStrategy;

impl KeyStrategy for ReplaceStrategy {
    fn merge(
        &self,
        _key: &str,
        _current: Option<&Value>,
        incoming: Value,
    ) -> Result<Value, StateError> {
        Ok(incoming)
    }

    fn name(&self) -> &str {
        "replace"
    }
}

/// Accumulates values into a JSON array.
///
/// An incoming array is concatenated element-wise onto the current array; a
/// non-array incoming value is pushed as a single element. A current value
/// that is not an array is a merge conflict.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendStrategy;

impl KeyStrategy for AppendStrategy {
    fn merge(
        &self,
        key: &str,
        current: Option<&Value>,
        incoming: Value,
    ) -> Result<Value, StateError> {
        let mut items = match current {
            None => Vec::new(),
            Some(Value::Array(existing)) => existing.clone(),
            Some(other) => {
                return Err(StateError::MergeConflict {
                    key: key.to_string(),
                    message: format!("append requires an array, found {}", kind_of(other)),
                })
            }
        };
        match incoming {
            Value::Array(new_items) => items.extend(new_items),
            single => items.push(single),
        }
        Ok(Value::Array(items))
    }

    fn name(&self) -> &str {
        "append"
    }
}

/// A merge strategy defined by a closure.
///
/// ```rust,ignore
/// let sum = FnStrategy::new("sum", |_, current, incoming| {
///     let a = current.and_then(Value::as_i64).unwrap_or(0);
///     let b = incoming.as_i64().unwrap_or(0);
///     Ok(Value::from(a + b))
/// });
/// ```
#[derive(Clone)]
pub struct FnStrategy {
    name: String,
    merge_fn: Arc<dyn Fn(&str, Option<&Value>, Value) -> Result<Value, StateError> + Send + Sync>,
}

impl FnStrategy {
    pub fn new<F>(name: impl Into<String>, merge_fn: F) -> Self
    where
        F: Fn(&str, Option<&Value>, Value) -> Result<Value, StateError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            merge_fn: Arc::new(merge_fn),
        }
    }
}

impl KeyStrategy for FnStrategy {
    fn merge(
        &self,
        key: &str,
        current: Option<&Value>,
        incoming: Value,
    ) -> Result<Value, StateError> {
        (self.merge_fn)(key, current, incoming)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for FnStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStrategy").field("name", &self.name).finish()
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The shared state all agents in a graph read and write.
///
/// Cloning a `StateStore` is cheap-ish (values are cloned, strategies are
/// shared `Arc`s) and produces an independent store: writes to the clone do
/// not affect the original. Parallel branches run on clones and report back
/// through [`StateStore::delta`].
#[derive(Clone, Default)]
pub struct StateStore {
    values: BTreeMap<String, Value>,
    strategies: HashMap<String, Arc<dyn KeyStrategy>>,
    dirty: BTreeSet<String>,
    version: u64,
}

impl StateStore {
    /// Create an empty store where every key uses [`ReplaceStrategy`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with a pre-registered strategy map.
    pub fn with_strategies(strategies: HashMap<String, Arc<dyn KeyStrategy>>) -> Self {
        Self {
            strategies,
            ..Self::default()
        }
    }

    /// Rebuild a store from checkpointed values, re-attaching the compiled
    /// graph's strategy map.
    pub fn from_values(
        values: BTreeMap<String, Value>,
        strategies: HashMap<String, Arc<dyn KeyStrategy>>,
    ) -> Self {
        Self {
            values,
            strategies,
            dirty: BTreeSet::new(),
            version: 0,
        }
    }

    /// Register a merge strategy for a key. First registration wins; later
    /// calls for the same key are ignored.
    pub fn register_strategy(&mut self, key: impl Into<String>, strategy: Arc<dyn KeyStrategy>) {
        self.strategies.entry(key.into()).or_insert(strategy);
    }

    /// Whether a strategy is registered for the key.
    pub fn has_strategy(&self, key: &str) -> bool {
        self.strategies.contains_key(key)
    }

    /// The registered strategy map, shared with compiled graphs for
    /// checkpoint restoration.
    pub fn strategies(&self) -> &HashMap<String, Arc<dyn KeyStrategy>> {
        &self.strategies
    }

    /// Read a value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Read a value and deserialize it into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StateError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| StateError::TypeMismatch {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
        }
    }

    /// Write a value through the key's merge strategy.
    pub fn put(&mut self, key: impl Into<String>, value: Value) -> Result<(), StateError> {
        let key = key.into();
        let merged = match self.strategies.get(&key) {
            Some(strategy) => strategy.merge(&key, self.values.get(&key), value)?,
            None => value,
        };
        self.values.insert(key.clone(), merged);
        self.dirty.insert(key);
        self.version += 1;
        Ok(())
    }

    /// Apply a batch of writes, each through its key's strategy, in the
    /// map's key order.
    pub fn apply_delta(&mut self, delta: &StateDelta) -> Result<(), StateError> {
        for (key, value) in delta {
            self.put(key.clone(), value.clone())?;
        }
        Ok(())
    }

    /// Whether the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// All current values, in key order.
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Monotonic write counter. Incremented on every successful `put`.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Keys written since the last [`clear_dirty`](Self::clear_dirty).
    pub fn dirty_keys(&self) -> &BTreeSet<String> {
        &self.dirty
    }

    /// Reset dirty tracking. Parallel branches call this on their private
    /// clone so that only writes made inside the branch count as its delta.
    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Snapshot of the dirty keys and their current values.
    pub fn delta(&self) -> StateDelta {
        let mut delta = StateDelta::new();
        for key in &self.dirty {
            if let Some(value) = self.values.get(key) {
                delta.insert(key.clone(), value.clone());
            }
        }
        delta
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("values", &self.values)
            .field("dirty", &self.dirty)
            .field("version", &self.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_replace_is_default() {
        let mut state = StateStore::new();
        state.put("topic", json!("dogs")).unwrap();
        state.put("topic", json!("cats")).unwrap();
        assert_eq!(state.get("topic"), Some(&json!("cats")));
        assert_eq!(state.version(), 2);
    }

    #[test]
    fn test_append_accumulates() {
        let mut state = StateStore::new();
        state.register_strategy("messages", Arc::new(AppendStrategy));

        state.put("messages", json!(["a"])).unwrap();
        state.put("messages", json!(["b", "c"])).unwrap();
        state.put("messages", json!("d")).unwrap();

        assert_eq!(state.get("messages"), Some(&json!(["a", "b", "c", "d"])));
    }

    #[test]
    fn test_append_rejects_non_array_current() {
        let mut state = StateStore::new();
        state.put("messages", json!("oops")).unwrap();
        state.register_strategy("messages", Arc::new(AppendStrategy));

        let err = state.put("messages", json!(["a"])).unwrap_err();
        assert!(matches!(err, StateError::MergeConflict { .. }));
    }

    #[test]
    fn test_first_registration_wins() {
        let mut state = StateStore::new();
        state.register_strategy("messages", Arc::new(AppendStrategy));
        state.register_strategy("messages", Arc::new(ReplaceStrategy));

        state.put("messages", json!(["a"])).unwrap();
        state.put("messages", json!(["b"])).unwrap();
        assert_eq!(state.get("messages"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn test_fn_strategy() {
        let mut state = StateStore::new();
        state.register_strategy(
            "total",
            Arc::new(FnStrategy::new("sum", |_, current, incoming| {
                let a = current.and_then(Value::as_i64).unwrap_or(0);
                let b = incoming.as_i64().unwrap_or(0);
                Ok(Value::from(a + b))
            })),
        );

        state.put("total", json!(3)).unwrap();
        state.put("total", json!(4)).unwrap();
        assert_eq!(state.get("total"), Some(&json!(7)));
    }

    #[test]
    fn test_dirty_tracking_and_delta() {
        let mut state = StateStore::new();
        state.put("a", json!(1)).unwrap();
        state.clear_dirty();

        state.put("b", json!(2)).unwrap();
        state.put("c", json!(3)).unwrap();

        let delta = state.delta();
        assert_eq!(delta.len(), 2);
        assert_eq!(delta["b"], json!(2));
        assert!(!delta.contains_key("a"));
    }

    #[test]
    fn test_clone_is_independent() {
        let mut state = StateStore::new();
        state.register_strategy("messages", Arc::new(AppendStrategy));
        state.put("messages", json!(["a"])).unwrap();

        let mut branch = state.clone();
        branch.put("messages", json!(["b"])).unwrap();

        assert_eq!(state.get("messages"), Some(&json!(["a"])));
        assert_eq!(branch.get("messages"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn test_get_as_typed() {
        let mut state = StateStore::new();
        state.put("count", json!(5)).unwrap();

        let count: Option<u32> = state.get_as("count").unwrap();
        assert_eq!(count, Some(5));

        let missing: Option<u32> = state.get_as("absent").unwrap();
        assert_eq!(missing, None);

        let err = state.get_as::<String>("count").unwrap_err();
        assert!(matches!(err, StateError::TypeMismatch { .. }));
    }

    #[test]
    fn test_apply_delta_goes_through_strategies() {
        let mut state = StateStore::new();
        state.register_strategy("messages", Arc::new(AppendStrategy));
        state.put("messages", json!(["a"])).unwrap();

        let mut delta = StateDelta::new();
        delta.insert("messages".to_string(), json!(["b"]));
        delta.insert("topic".to_string(), json!("cats"));
        state.apply_delta(&delta).unwrap();

        assert_eq!(state.get("messages"), Some(&json!(["a", "b"])));
        assert_eq!(state.get("topic"), Some(&json!("cats")));
    }
}
