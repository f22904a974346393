//! Doom-scroll detection for content pages

use serde::Serialize;

/// Alert shown when scrolling runs past the limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoomAlert {
    pub label: &'static str,
    pub show_whitelist: bool,
}

/// Whether the reader has scrolled more screens than allowed
pub fn is_doom_scrolling(scroll_top: f64, viewport_height: f64, limit: u32) -> bool {
    if viewport_height <= 0.0 {
        return false;
    }
    scroll_top / viewport_height > f64::from(limit)
}

/// After one dismissal the alert also offers to whitelist the site
pub fn doom_alert(dismissed_once: bool) -> DoomAlert {
    if dismissed_once {
        DoomAlert {
            label: "DOOM SCROLL DETECTED — Block or Whitelist?",
            show_whitelist: true,
        }
    } else {
        DoomAlert {
            label: "DOOM SCROLL DETECTED",
            show_whitelist: false,
        }
    }
}
