/// User settings stored under the `settings` key
use crate::session::PomoMode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Doom-scroll limit that effectively turns detection off
pub const DOOM_SCROLL_DISABLED: u32 = 9999;

const DEFAULT_DOOM_SCROLL_LIMIT: u32 = 3;

/// Extension settings
///
/// Every field has a default so partial or older settings objects still
/// load. Fields this crate does not know about (UI-only toggles, API keys)
/// are kept in `extra` and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub enabled: bool,
    pub hardcore_mode: bool,
    pub show_injected_icon: bool,
    pub sound_effects: bool,
    pub monochrome_mode: bool,
    pub memento_mori_enabled: bool,
    pub tab_limit: u32,
    pub doom_scroll_limit: u32,
    /// Minutes
    pub focus_duration: u32,
    /// Minutes
    pub break_duration: u32,
    pub negative_visualization: bool,
    /// How long a passed typing tax keeps a greylisted domain open
    pub friction_duration_minutes: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            enabled: true,
            hardcore_mode: false,
            show_injected_icon: true,
            sound_effects: true,
            monochrome_mode: false,
            memento_mori_enabled: false,
            tab_limit: 5,
            doom_scroll_limit: DEFAULT_DOOM_SCROLL_LIMIT,
            focus_duration: 25,
            break_duration: 5,
            negative_visualization: true,
            friction_duration_minutes: 10,
            extra: Map::new(),
        }
    }
}

impl AppSettings {
    /// Length of a fresh interval in seconds, never zero
    pub fn duration_secs(&self, mode: PomoMode) -> u32 {
        let minutes = match mode {
            PomoMode::Focus => self.focus_duration,
            PomoMode::Break => self.break_duration,
        };
        minutes.max(1) * 60
    }

    pub fn friction_unlock_ms(&self) -> i64 {
        i64::from(self.friction_duration_minutes) * 60_000
    }

    /// Whether the tab-limit advisory runs at all
    pub fn memento_active(&self) -> bool {
        self.enabled && self.memento_mori_enabled
    }

    /// Whether grayscale should apply to a page, given its whitelist status
    pub fn monochrome_applies(&self, whitelisted: bool) -> bool {
        self.enabled && self.monochrome_mode && !whitelisted
    }

    pub fn apply_onboarding(&mut self, prefs: &OnboardingPreferences, hardcore_mode: bool) {
        self.monochrome_mode = prefs.enable_monochrome;
        self.memento_mori_enabled = prefs.enable_memento;
        self.doom_scroll_limit = prefs.doom_scroll_limit();
        self.hardcore_mode = hardcore_mode;
    }
}

/// Settings after onboarding, starting from whatever was stored
pub fn derive_onboarding_settings(current: &AppSettings, prefs: &OnboardingPreferences, hardcore_mode: bool) -> AppSettings {
    let mut next = current.clone();
    next.apply_onboarding(prefs, hardcore_mode);
    next
}

/// Choices made during onboarding
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OnboardingPreferences {
    pub enable_monochrome: bool,
    pub enable_memento: bool,
    pub enable_doom: bool,
    pub doom_limit: Option<u32>,
}

impl OnboardingPreferences {
    pub fn doom_scroll_limit(&self) -> u32 {
        if !self.enable_doom {
            return DOOM_SCROLL_DISABLED;
        }
        match self.doom_limit {
            Some(limit) if limit > 0 => limit,
            _ => DEFAULT_DOOM_SCROLL_LIMIT,
        }
    }
}
