/// Tab census for the Memento Mori tab-limit advisory
use crate::settings::AppSettings;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const UNTITLED: &str = "(untitled)";

/// A browser tab as reported by the tabs API; any field may be missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TabInfo {
    pub id: Option<i32>,
    pub pinned: Option<bool>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub active: Option<bool>,
    pub last_accessed: Option<f64>,
}

impl TabInfo {
    pub fn new(id: i32, url: &str, title: &str, pinned: bool) -> TabInfo {
        TabInfo {
            id: Some(id),
            pinned: Some(pinned),
            title: Some(title.to_string()),
            url: Some(url.to_string()),
            active: None,
            last_accessed: None,
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned.unwrap_or(false)
    }
}

/// One unpinned tab in the summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabEntry {
    pub id: i32,
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    pub usage: u32,
    pub pinned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<f64>,
}

/// Derived census (`tabSummary` key, for display only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSummary {
    pub count: usize,
    pub limit: u32,
    pub over_limit: bool,
    pub tabs: Vec<TabEntry>,
}

/// Lifetime activation count per tab id (`tabUsageCounts` key)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabUsage {
    pub counts: BTreeMap<i32, u32>,
}

impl TabUsage {
    pub fn new() -> Self {
        TabUsage { counts: BTreeMap::new() }
    }

    pub fn get(&self, tab_id: i32) -> u32 {
        self.counts.get(&tab_id).copied().unwrap_or(0)
    }

    pub fn record_activation(&mut self, tab_id: i32) -> u32 {
        let count = self.counts.entry(tab_id).or_insert(0);
        *count += 1;
        *count
    }

    /// Forget a closed tab; returns whether anything was stored for it
    pub fn prune(&mut self, tab_id: i32) -> bool {
        self.counts.remove(&tab_id).is_some()
    }
}

/// Count unpinned tabs against the configured limit
///
/// Returns `None` when the extension or the Memento Mori feature is off.
/// Over-limit is advisory; nothing here closes tabs.
pub fn compute_tab_summary(tabs: &[TabInfo], settings: &AppSettings, usage: &TabUsage) -> Option<TabSummary> {
    if !settings.memento_active() {
        return None;
    }

    let limit = settings.tab_limit;
    let entries: Vec<TabEntry> = tabs
        .iter()
        .filter(|tab| !tab.is_pinned())
        .map(|tab| TabEntry {
            id: tab.id.unwrap_or(0),
            title: tab.title.clone().filter(|t| !t.is_empty()).unwrap_or_else(|| UNTITLED.to_string()),
            url: tab.url.clone().unwrap_or_default(),
            active: tab.active,
            usage: tab.id.map(|id| usage.get(id)).unwrap_or(0),
            pinned: false,
            last_accessed: tab.last_accessed,
        })
        .collect();

    let count = entries.len();
    let over_limit = limit > 0 && count > limit as usize;
    if over_limit {
        debug!("{} unpinned tabs over the limit of {}", count, limit);
    }

    Some(TabSummary {
        count,
        limit,
        over_limit,
        tabs: entries,
    })
}
