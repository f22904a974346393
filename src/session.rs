/// Pomodoro session state machine
///
/// The persisted record is `PomoState`; every transition below first runs
/// `normalize` so a missing or non-positive `time_left` is re-derived from
/// the settings before anything else looks at it.
use crate::settings::AppSettings;
use log::{debug, info};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PomoMode {
    #[default]
    Focus,
    Break,
}

impl PomoMode {
    pub fn opposite(self) -> PomoMode {
        match self {
            PomoMode::Focus => PomoMode::Break,
            PomoMode::Break => PomoMode::Focus,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PomoMode::Focus => "Deep Work",
            PomoMode::Break => "Rest Phase",
        }
    }
}

/// Persisted session record (`pomo` key)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PomoState {
    pub is_active: bool,
    pub mode: PomoMode,
    /// Seconds; stored values may be zero or negative and are healed on read
    pub time_left: i64,
    pub pre_mortem_captured: bool,
}

/// The two machine states the record encodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle(PomoMode),
    Running(PomoMode, i64),
}

impl PomoState {
    pub fn phase(&self) -> Phase {
        if self.is_active {
            Phase::Running(self.mode, self.time_left)
        } else {
            Phase::Idle(self.mode)
        }
    }

    pub fn is_focusing(&self) -> bool {
        self.is_active && self.mode == PomoMode::Focus
    }
}

/// Re-derive `time_left` from the settings when it is not positive
pub fn normalize(state: &PomoState, settings: &AppSettings) -> PomoState {
    let mut next = state.clone();
    if next.time_left <= 0 {
        next.time_left = i64::from(settings.duration_secs(next.mode));
    }
    next
}

/// Whether the 10-second heads-up already fired, per mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NoticeFlags {
    pub focus_ending: bool,
    pub break_ending: bool,
}

impl NoticeFlags {
    pub fn is_set(&self, mode: PomoMode) -> bool {
        match mode {
            PomoMode::Focus => self.focus_ending,
            PomoMode::Break => self.break_ending,
        }
    }

    pub fn mark(&mut self, mode: PomoMode) {
        match mode {
            PomoMode::Focus => self.focus_ending = true,
            PomoMode::Break => self.break_ending = true,
        }
    }

    pub fn reset(&mut self) {
        *self = NoticeFlags::default();
    }
}

/// Heads-up text for the tick that lands on exactly 10 seconds left
pub fn transition_notice(mode: PomoMode, time_left: i64, already_notified: bool) -> Option<&'static str> {
    if already_notified || time_left != 10 {
        return None;
    }
    Some(match mode {
        PomoMode::Focus => "Rest begins in 10 seconds.",
        PomoMode::Break => "Rest ends in 10 seconds.",
    })
}

/// Title and body announcing the start of a phase
pub fn session_started_notice(mode: PomoMode) -> (&'static str, &'static str) {
    match mode {
        PomoMode::Focus => ("Deep Work Started", "Focus now. Distractions are blocked."),
        PomoMode::Break => ("Rest Started", "Take a short break. Recharge and come back strong."),
    }
}

pub fn completion_message(next_mode: PomoMode) -> String {
    format!("Timer complete. Switching to {}.", next_mode.label())
}

/// Countdown display, e.g. "24:05"
pub fn format_time(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "state", rename_all = "camelCase")]
pub enum StartOutcome {
    Started(PomoState),
    /// Negative visualization is on and no pre-mortem has been given yet
    PreMortemRequired,
    AlreadyRunning,
}

/// Start (or resume) the timer in its current mode
///
/// A pre-mortem note is required before a Focus start when negative
/// visualization is enabled and none was captured for this session.
pub fn start(state: &PomoState, settings: &AppSettings, pre_mortem: Option<&str>) -> StartOutcome {
    let mut next = normalize(state, settings);
    if next.is_active {
        return StartOutcome::AlreadyRunning;
    }

    let note_given = pre_mortem.is_some_and(|note| !note.trim().is_empty());
    if next.mode == PomoMode::Focus && settings.negative_visualization && !next.pre_mortem_captured && !note_given {
        debug!("start refused until a pre-mortem is captured");
        return StartOutcome::PreMortemRequired;
    }

    if note_given {
        next.pre_mortem_captured = true;
    }
    next.is_active = true;
    info!("{} started with {}s left", next.mode.label(), next.time_left);
    StartOutcome::Started(next)
}

/// Actions that hardcore mode puts behind an external check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatedAction {
    Pause,
    Disable,
}

/// A proposed transition awaiting external confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransition {
    pub action: GatedAction,
    pub requested_at_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "camelCase")]
pub enum PauseDecision {
    Paused(PomoState),
    /// Nothing changes until the pending transition is confirmed
    Pending(PendingTransition),
    NotRunning,
}

/// Ask to pause; hardcore mode defers the pause behind a confirmation
pub fn request_pause(state: &PomoState, settings: &AppSettings, now_ms: i64) -> PauseDecision {
    if !state.is_active {
        return PauseDecision::NotRunning;
    }
    if settings.hardcore_mode {
        return PauseDecision::Pending(PendingTransition {
            action: GatedAction::Pause,
            requested_at_ms: now_ms,
        });
    }
    PauseDecision::Paused(pause(state, settings))
}

/// Running → Idle, keeping mode, time and the pre-mortem flag
pub fn pause(state: &PomoState, settings: &AppSettings) -> PomoState {
    let mut next = normalize(state, settings);
    next.is_active = false;
    info!("{} paused with {}s left", next.mode.label(), next.time_left);
    next
}

/// Outcome of one second of countdown
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickResult {
    pub state: PomoState,
    pub notice: Option<&'static str>,
    /// Mode the timer switched into, when the countdown ran out
    pub completed_into: Option<PomoMode>,
}

/// Advance the countdown by one second
///
/// Ticks on an idle timer change nothing, so late or duplicate deliveries
/// after a pause are harmless. Reaching zero completes the phase.
pub fn tick(state: &PomoState, settings: &AppSettings, notices: &mut NoticeFlags) -> TickResult {
    if !state.is_active {
        return TickResult {
            state: state.clone(),
            notice: None,
            completed_into: None,
        };
    }

    let mut next = normalize(state, settings);
    next.time_left = (next.time_left - 1).max(0);

    let notice = transition_notice(next.mode, next.time_left, notices.is_set(next.mode));
    if notice.is_some() {
        notices.mark(next.mode);
    }

    if next.time_left > 0 {
        return TickResult {
            state: next,
            notice,
            completed_into: None,
        };
    }

    let completed = enter_mode(&next, next.mode.opposite(), settings, notices);
    info!("{} complete, switching to {}", next.mode.label(), completed.mode.label());
    TickResult {
        completed_into: Some(completed.mode),
        state: completed,
        notice,
    }
}

/// Explicit mode flip from the UI; the running flag is kept
pub fn switch_mode(state: &PomoState, settings: &AppSettings, notices: &mut NoticeFlags) -> PomoState {
    let current = normalize(state, settings);
    enter_mode(&current, current.mode.opposite(), settings, notices)
}

fn enter_mode(state: &PomoState, mode: PomoMode, settings: &AppSettings, notices: &mut NoticeFlags) -> PomoState {
    notices.reset();
    PomoState {
        is_active: state.is_active,
        mode,
        time_left: i64::from(settings.duration_secs(mode)),
        pre_mortem_captured: match mode {
            PomoMode::Focus => false,
            PomoMode::Break => state.pre_mortem_captured,
        },
    }
}
