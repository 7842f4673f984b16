// file: src/cli.rs
// description: operation flags and key:value pair parsing for the command line
// reference: https://docs.rs/clap

use crate::error::{PipelineError, Result};
use crate::operation::{
    AppendOperation, FilterOperation, PrefixOperation, RemoveOperation, SharedOperation,
};
use crate::record::{Key, PairKeyPrefix, PairKeyValue};
use clap::Args;
use std::sync::Arc;

const PAIR_SEPARATOR: char = ';';
const KEY_VALUE_SEPARATOR: char = ':';

#[derive(Debug, Clone, Default, Args)]
pub struct OperationArgs {
    /// Filter out records matching every key/value pair. Format key:value;keyn:valuen. Example id:347
    #[arg(short, long, value_name = "PAIRS")]
    pub filter: Option<String>,

    /// Append or replace key/value pairs. Format key:value;keyn:valuen. Example source:gps
    #[arg(short, long, value_name = "PAIRS")]
    pub append: Option<String>,

    /// Remove keys. Format key;keyn. Example lat;lng
    #[arg(short, long, value_name = "KEYS")]
    pub remove: Option<String>,

    /// Prefix keys. Format key:prefix;keyn:prefixn. Example id:_
    #[arg(short, long, value_name = "PAIRS")]
    pub prefix: Option<String>,
}

impl OperationArgs {
    /// Builds the operations in the fixed order filter, append, remove, prefix.
    /// Fails before anything runs if a pair list is malformed.
    pub fn build_operations(&self) -> Result<Vec<SharedOperation>> {
        let mut operations: Vec<SharedOperation> = Vec::new();

        if let Some(value) = non_empty(&self.filter) {
            let pairs = split_pairs(value)?
                .into_iter()
                .map(|(key, value)| PairKeyValue::new(key, value))
                .collect();
            operations.push(Arc::new(FilterOperation::new(pairs)));
        }

        if let Some(value) = non_empty(&self.append) {
            let pairs = split_pairs(value)?
                .into_iter()
                .map(|(key, value)| PairKeyValue::new(key, value))
                .collect();
            operations.push(Arc::new(AppendOperation::new(pairs)));
        }

        if let Some(value) = non_empty(&self.remove) {
            operations.push(Arc::new(RemoveOperation::new(split_keys(value))));
        }

        if let Some(value) = non_empty(&self.prefix) {
            let pairs = split_pairs(value)?
                .into_iter()
                .map(|(key, prefix)| PairKeyPrefix::new(key, prefix))
                .collect();
            operations.push(Arc::new(PrefixOperation::new(pairs)));
        }

        Ok(operations)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Splits `key:value;keyn:valuen` into pairs.
pub fn split_pairs(value: &str) -> Result<Vec<(String, String)>> {
    value
        .split(PAIR_SEPARATOR)
        .map(|kv| {
            let parts: Vec<&str> = kv.split(KEY_VALUE_SEPARATOR).collect();
            match parts.as_slice() {
                [key, value] if !key.is_empty() => Ok((key.to_string(), value.to_string())),
                _ => Err(PipelineError::InvalidPair(kv.to_string())),
            }
        })
        .collect()
}

/// Splits a key list. Both `;` and `:` separate keys.
pub fn split_keys(value: &str) -> Vec<Key> {
    value
        .split([PAIR_SEPARATOR, KEY_VALUE_SEPARATOR])
        .filter(|key| !key.is_empty())
        .map(Key::from)
        .collect()
}
