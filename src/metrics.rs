/// Intervention counters shown on the dashboard (`metrics` key)
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppMetrics {
    pub interventions: u64,
    pub focus_score: u32,
    pub tabs_withered: u64,
    pub friction_overcome: u64,
}

impl AppMetrics {
    /// A blocklist redirect happened
    pub fn record_intervention(&mut self) -> u64 {
        self.interventions += 1;
        self.interventions
    }

    /// A tab was closed from the Memento Mori prompt
    pub fn record_tab_withered(&mut self) -> u64 {
        self.tabs_withered += 1;
        self.tabs_withered
    }

    /// A typing tax was paid to open a greylisted site
    pub fn record_friction_overcome(&mut self) -> u64 {
        self.friction_overcome += 1;
        self.friction_overcome
    }
}
