// file: src/operation.rs
// description: record transformations applied by the operation stages
// reference: filter, append, remove and prefix operations over key/value records

use crate::error::Result;
use crate::record::{Key, PairKeyPrefix, PairKeyValue, Record};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What an operation decided for a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Pass the (possibly modified) record downstream.
    Emit(Record),
    /// Drop the record silently. Not an error.
    Skip,
}

/// Applies logic (decorate/filter/modify) to a record.
///
/// Returning `Err` reports the error and drops the record; the stage keeps
/// running either way.
pub trait Operation: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, cancel: &CancellationToken, record: Record) -> Result<Outcome>;
}

pub type SharedOperation = Arc<dyn Operation>;

/// Drops a record when every pair matches it (AND). A record that misses any
/// pair is emitted unchanged.
#[derive(Debug, Clone)]
pub struct FilterOperation {
    pairs: Vec<PairKeyValue>,
}

impl FilterOperation {
    pub fn new(pairs: Vec<PairKeyValue>) -> Self {
        Self { pairs }
    }
}

impl Operation for FilterOperation {
    fn name(&self) -> &str {
        "filter"
    }

    fn apply(&self, _cancel: &CancellationToken, record: Record) -> Result<Outcome> {
        let all_match = self.pairs.iter().all(|pair| {
            record
                .get(&pair.key)
                .is_some_and(|value| pair.value.matches(value))
        });

        if all_match {
            return Ok(Outcome::Skip);
        }

        Ok(Outcome::Emit(record))
    }
}

/// Adds or replaces fields. Values are inserted as JSON strings.
#[derive(Debug, Clone)]
pub struct AppendOperation {
    pairs: Vec<PairKeyValue>,
}

impl AppendOperation {
    pub fn new(pairs: Vec<PairKeyValue>) -> Self {
        Self { pairs }
    }
}

impl Operation for AppendOperation {
    fn name(&self) -> &str {
        "append"
    }

    fn apply(&self, _cancel: &CancellationToken, mut record: Record) -> Result<Outcome> {
        for pair in &self.pairs {
            record.insert(pair.key.as_str(), Value::String(pair.value.as_str().to_string()));
        }

        Ok(Outcome::Emit(record))
    }
}

#[derive(Debug, Clone)]
pub struct RemoveOperation {
    keys: Vec<Key>,
}

impl RemoveOperation {
    pub fn new(keys: Vec<Key>) -> Self {
        Self { keys }
    }
}

impl Operation for RemoveOperation {
    fn name(&self) -> &str {
        "remove"
    }

    fn apply(&self, _cancel: &CancellationToken, mut record: Record) -> Result<Outcome> {
        for key in &self.keys {
            record.remove(key);
        }

        Ok(Outcome::Emit(record))
    }
}

/// Renames present keys to `prefix + key`. Absent keys are left alone.
#[derive(Debug, Clone)]
pub struct PrefixOperation {
    pairs: Vec<PairKeyPrefix>,
}

impl PrefixOperation {
    pub fn new(pairs: Vec<PairKeyPrefix>) -> Self {
        Self { pairs }
    }
}

impl Operation for PrefixOperation {
    fn name(&self) -> &str {
        "prefix"
    }

    fn apply(&self, _cancel: &CancellationToken, mut record: Record) -> Result<Outcome> {
        for pair in &self.pairs {
            if let Some(value) = record.remove(&pair.key) {
                record.insert(pair.prefixed_key(), value);
            }
        }

        Ok(Outcome::Emit(record))
    }
}

/// Closure-backed operation.
pub struct FnOperation<F> {
    name: String,
    func: F,
}

impl<F> fmt::Debug for FnOperation<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOperation").field("name", &self.name).finish()
    }
}

impl<F> Operation for FnOperation<F>
where
    F: Fn(Record) -> Result<Outcome> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, _cancel: &CancellationToken, record: Record) -> Result<Outcome> {
        (self.func)(record)
    }
}

pub fn from_fn<F>(name: impl Into<String>, func: F) -> SharedOperation
where
    F: Fn(Record) -> Result<Outcome> + Send + Sync + 'static,
{
    Arc::new(FnOperation {
        name: name.into(),
        func,
    })
}
