//! Operation parameters
//!
//! This module defines the entry type accepted by `mset`
//! and the resolved batch writes handed to the client.

use crate::errors::CacheError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One value passed to `mset`, optionally carrying its own expiration
///
/// Deserializes from either a bare JSON value or a
/// `{"cacheValue": ..., "expiration": ...}` wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MsetEntry {
    Expiring {
        #[serde(rename = "cacheValue")]
        cache_value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expiration: Option<u64>,
    },
    Plain(Value),
}

impl MsetEntry {
    pub fn plain(value: impl Into<Value>) -> Self {
        MsetEntry::Plain(value.into())
    }

    pub fn expiring(value: impl Into<Value>, expiration: u64) -> Self {
        MsetEntry::Expiring {
            cache_value: value.into(),
            expiration: Some(expiration),
        }
    }

    /// Build an entry from any serializable value
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, CacheError> {
        Ok(MsetEntry::Plain(serde_json::to_value(value)?))
    }

    pub fn value(&self) -> &Value {
        match self {
            MsetEntry::Expiring { cache_value, .. } => cache_value,
            MsetEntry::Plain(value) => value,
        }
    }

    /// The entry's own expiration override, if any
    pub fn expiration(&self) -> Option<u64> {
        match self {
            MsetEntry::Expiring { expiration, .. } => *expiration,
            MsetEntry::Plain(_) => None,
        }
    }
}

impl From<Value> for MsetEntry {
    fn from(value: Value) -> Self {
        MsetEntry::Plain(value)
    }
}

/// A single write inside an atomic batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchWrite {
    pub key: String,
    pub value: String,
    /// TTL in seconds
    pub expiration: u64,
}

impl BatchWrite {
    pub fn new(key: impl Into<String>, value: impl Into<String>, expiration: u64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            expiration,
        }
    }
}
