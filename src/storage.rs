/// Key-value storage abstraction over chrome.storage.local
///
/// Values are kept as JSON under the same keys the extension has always
/// used, so stored data from earlier versions keeps loading.
use crate::error::StoreError;
use crate::rules::CategoryTable;
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

pub mod keys {
    pub const SETTINGS: &str = "settings";
    pub const BLOCKED_SITES: &str = "blockedSites";
    pub const CATEGORY_DEFINITIONS: &str = "categoryDefinitions";
    pub const POMO: &str = "pomo";
    pub const DAILY_TIME_DATA: &str = "dailyTimeData";
    pub const METRICS: &str = "metrics";
    pub const TAB_USAGE_COUNTS: &str = "tabUsageCounts";
    pub const TAB_SUMMARY: &str = "tabSummary";
    pub const FOCUS_INTERVAL: &str = "focusInterval";
    pub const POMO_NOTICES: &str = "pomoNotices";
    pub const PENDING_TRANSITION: &str = "pendingTransition";
    pub const TEMP_UNLOCKED: &str = "tempUnlocked";
    pub const DOMAIN_REDIRECT_COUNTS: &str = "domainRedirectCounts";
    pub const PRE_MORTEM_NOTE: &str = "preMortemNote";
}

/// Called with the new value and the previous one, if any
pub type Listener = Box<dyn Fn(&Value, Option<&Value>)>;

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value);
    fn subscribe(&mut self, key: &str, listener: Listener);
}

/// In-process store; also tracks which keys were written
#[derive(Default)]
pub struct MemoryStore {
    values: BTreeMap<String, Value>,
    listeners: Vec<(String, Listener)>,
    changed: BTreeSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a storage snapshot object; nothing counts as changed yet
    pub fn from_snapshot(snapshot: Value) -> Result<Self, StoreError> {
        match snapshot {
            Value::Object(map) => Ok(MemoryStore {
                values: map.into_iter().collect(),
                ..Self::default()
            }),
            Value::Null => Ok(Self::default()),
            other => Err(StoreError::InvalidSnapshot(json_kind(&other).to_string())),
        }
    }

    pub fn changed_keys(&self) -> Vec<&str> {
        self.changed.iter().map(String::as_str).collect()
    }

    /// Values written since the snapshot (or the last call), for the host to persist
    pub fn take_changes(&mut self) -> Map<String, Value> {
        std::mem::take(&mut self.changed)
            .into_iter()
            .filter_map(|key| self.values.get(&key).map(|value| (key, value.clone())))
            .collect()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        let previous = self.values.insert(key.to_string(), value.clone());
        if previous.as_ref() == Some(&value) {
            return;
        }
        self.changed.insert(key.to_string());
        for (_, listener) in self.listeners.iter().filter(|(k, _)| k == key) {
            listener(&value, previous.as_ref());
        }
    }

    fn subscribe(&mut self, key: &str, listener: Listener) {
        self.listeners.push((key.to_string(), listener));
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Read a typed value, falling back to `default` when missing or unreadable
pub fn load_or<T, S, F>(store: &S, key: &str, default: F) -> T
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
    F: FnOnce() -> T,
{
    match store.get(key) {
        None | Some(Value::Null) => default(),
        Some(value) => serde_json::from_value(value).unwrap_or_else(|err| {
            warn!("Ignoring unreadable '{}': {}", key, err);
            default()
        }),
    }
}

/// Like `load_or`, but an unreadable stored value is an error
///
/// Used before read-modify-write cycles, so a value that failed to parse
/// is never overwritten with the fallback.
pub fn try_load_or<T, S, F>(store: &S, key: &str, default: F) -> Result<T, StoreError>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
    F: FnOnce() -> T,
{
    match store.get(key) {
        None | Some(Value::Null) => Ok(default()),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}

pub fn load<T, S>(store: &S, key: &str) -> T
where
    T: DeserializeOwned + Default,
    S: KeyValueStore + ?Sized,
{
    load_or(store, key, T::default)
}

/// Category table, seeded with the built-in categories on first use
pub fn load_categories<S: KeyValueStore + ?Sized>(store: &S) -> CategoryTable {
    load_or(store, keys::CATEGORY_DEFINITIONS, CategoryTable::defaults)
}

pub fn save<T, S>(store: &mut S, key: &str, value: &T) -> Result<(), StoreError>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    store.set(key, serde_json::to_value(value)?);
    Ok(())
}
