//! Store-backed operations for the service worker
//!
//! Each call loads what it needs from the injected store, runs the pure
//! logic from the other modules and writes back only what it changed.

use crate::accrual::{AccrualEvent, DailyLedger, FocusInterval, local_date, observe_transition};
use crate::analytics::{DomainStat, domain_block_stats};
use crate::classifier::{Verdict, classify};
use crate::domain::{domains_match, is_internal_page, normalize_domain};
use crate::error::StoreError;
use crate::metrics::AppMetrics;
use crate::rules::{BlockedSite, CategoryTable, ListType, RuleSet, suggest_category};
use crate::session::{self, GatedAction, NoticeFlags, PauseDecision, PendingTransition, PomoState, StartOutcome, TickResult, normalize};
use crate::settings::{AppSettings, OnboardingPreferences, derive_onboarding_settings};
use crate::storage::{KeyValueStore, keys, load, load_categories, save, try_load_or};
use crate::tabs::{TabInfo, TabSummary, TabUsage, compute_tab_summary};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// What the worker should do with a navigation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum NavigationAction {
    Allow { verdict: Verdict },
    /// Redirect to the blocked page
    Block {
        domain: String,
        rule_id: Option<String>,
        domain_redirects: u64,
    },
    /// Redirect to the typing-tax challenge
    Challenge { domain: String, url: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "camelCase")]
pub enum DisableDecision {
    Disabled,
    Pending(PendingTransition),
    AlreadyDisabled,
}

/// Greylisted domains opened by a passed challenge (`tempUnlocked` key)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TempUnlocks {
    /// Domain → unlock expiry, ms since epoch
    pub expiries: BTreeMap<String, i64>,
}

impl TempUnlocks {
    pub fn grant(&mut self, domain: &str, until_ms: i64) {
        self.expiries.insert(normalize_domain(domain), until_ms);
    }

    pub fn is_unlocked(&self, host: &str, now_ms: i64) -> bool {
        self.expiries
            .iter()
            .any(|(domain, &until_ms)| until_ms > now_ms && domains_match(host, domain))
    }

    pub fn prune_expired(&mut self, now_ms: i64) -> usize {
        let before = self.expiries.len();
        self.expiries.retain(|_, until_ms| *until_ms > now_ms);
        before - self.expiries.len()
    }
}

pub struct FocusService<'a, S: KeyValueStore + ?Sized> {
    store: &'a mut S,
}

impl<'a, S: KeyValueStore + ?Sized> FocusService<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        FocusService { store }
    }

    pub fn settings(&self) -> AppSettings {
        load(&*self.store, keys::SETTINGS)
    }

    pub fn rules(&self) -> RuleSet {
        load(&*self.store, keys::BLOCKED_SITES)
    }

    pub fn categories(&self) -> CategoryTable {
        load_categories(&*self.store)
    }

    pub fn metrics(&self) -> AppMetrics {
        load(&*self.store, keys::METRICS)
    }

    /// Current session, with a stale countdown already healed
    pub fn pomo(&self) -> PomoState {
        let raw: PomoState = load(&*self.store, keys::POMO);
        normalize(&raw, &self.settings())
    }

    pub fn pending(&self) -> Option<PendingTransition> {
        load(&*self.store, keys::PENDING_TRANSITION)
    }

    // Navigation

    /// Classify a top-level navigation and record its side effects
    ///
    /// Blocks are charged to the responsible rule, the matched domain and
    /// the intervention counter. Friction is only counted once paid.
    pub fn handle_navigation(&mut self, url: &str, now_ms: i64) -> Result<NavigationAction, StoreError> {
        let settings = self.settings();
        if !settings.enabled || is_internal_page(url) {
            return Ok(NavigationAction::Allow {
                verdict: Verdict::Unrestricted,
            });
        }

        let mut rules = self.rules();
        let classification = classify(url, &rules, &self.categories());

        match classification.verdict {
            Verdict::Blocked => {
                let domain = classification
                    .matched_domain
                    .unwrap_or_else(|| classification.host.clone())
                    .to_lowercase();

                if let Some(rule_id) = &classification.rule_id {
                    if rules.record_hit(rule_id).is_some() {
                        save(&mut *self.store, keys::BLOCKED_SITES, &rules)?;
                    }
                }

                let mut per_domain: BTreeMap<String, u64> = load(&*self.store, keys::DOMAIN_REDIRECT_COUNTS);
                let domain_redirects = {
                    let count = per_domain.entry(domain.clone()).or_insert(0);
                    *count += 1;
                    *count
                };
                save(&mut *self.store, keys::DOMAIN_REDIRECT_COUNTS, &per_domain)?;

                let mut metrics = self.metrics();
                metrics.record_intervention();
                save(&mut *self.store, keys::METRICS, &metrics)?;

                info!("Blocked {} ({} redirects)", classification.host, domain_redirects);
                Ok(NavigationAction::Block {
                    domain,
                    rule_id: classification.rule_id,
                    domain_redirects,
                })
            }
            Verdict::Friction => {
                let unlocks: TempUnlocks = load(&*self.store, keys::TEMP_UNLOCKED);
                if unlocks.is_unlocked(&classification.host, now_ms) {
                    debug!("{} is temporarily unlocked", classification.host);
                    return Ok(NavigationAction::Allow {
                        verdict: Verdict::Friction,
                    });
                }
                Ok(NavigationAction::Challenge {
                    domain: classification.host,
                    url: url.to_string(),
                })
            }
            verdict => Ok(NavigationAction::Allow { verdict }),
        }
    }

    /// The typing tax was paid; open the domain for the configured time
    ///
    /// Returns the unlock expiry in ms since epoch.
    pub fn record_friction_overcome(&mut self, domain: &str, now_ms: i64) -> Result<i64, StoreError> {
        let until_ms = now_ms + self.settings().friction_unlock_ms();

        let mut unlocks: TempUnlocks = load(&*self.store, keys::TEMP_UNLOCKED);
        unlocks.prune_expired(now_ms);
        unlocks.grant(domain, until_ms);
        save(&mut *self.store, keys::TEMP_UNLOCKED, &unlocks)?;

        let mut metrics = self.metrics();
        metrics.record_friction_overcome();
        save(&mut *self.store, keys::METRICS, &metrics)?;

        Ok(until_ms)
    }

    // Session

    pub fn start_session(&mut self, pre_mortem: Option<&str>, now_ms: i64) -> Result<StartOutcome, StoreError> {
        let settings = self.settings();
        let before = self.pomo();
        let outcome = session::start(&before, &settings, pre_mortem);

        if let StartOutcome::Started(after) = &outcome {
            if let Some(note) = pre_mortem.map(str::trim).filter(|note| !note.is_empty()) {
                save(&mut *self.store, keys::PRE_MORTEM_NOTE, note)?;
            }
            save(&mut *self.store, keys::POMO, after)?;
            self.accrue(&before, after, now_ms)?;
        }
        Ok(outcome)
    }

    /// Pause, or in hardcore mode record the pause as pending
    pub fn request_pause(&mut self, now_ms: i64) -> Result<PauseDecision, StoreError> {
        let settings = self.settings();
        let before = self.pomo();
        let decision = session::request_pause(&before, &settings, now_ms);

        match &decision {
            PauseDecision::Paused(after) => {
                save(&mut *self.store, keys::POMO, after)?;
                self.accrue(&before, after, now_ms)?;
            }
            PauseDecision::Pending(pending) => save(&mut *self.store, keys::PENDING_TRANSITION, pending)?,
            PauseDecision::NotRunning => {}
        }
        Ok(decision)
    }

    /// Turn the extension off, or in hardcore mode record it as pending
    pub fn request_disable(&mut self, now_ms: i64) -> Result<DisableDecision, StoreError> {
        let settings = self.settings();
        if !settings.enabled {
            return Ok(DisableDecision::AlreadyDisabled);
        }
        if settings.hardcore_mode {
            let pending = PendingTransition {
                action: GatedAction::Disable,
                requested_at_ms: now_ms,
            };
            save(&mut *self.store, keys::PENDING_TRANSITION, &pending)?;
            return Ok(DisableDecision::Pending(pending));
        }

        self.disable(settings, now_ms)?;
        Ok(DisableDecision::Disabled)
    }

    /// Turn the extension off and stop a running timer with it
    fn disable(&mut self, mut settings: AppSettings, now_ms: i64) -> Result<(), StoreError> {
        settings.enabled = false;
        save(&mut *self.store, keys::SETTINGS, &settings)?;
        self.pause_running(&settings, now_ms)?;
        info!("Extension disabled");
        Ok(())
    }

    fn pause_running(&mut self, settings: &AppSettings, now_ms: i64) -> Result<(), StoreError> {
        let before = self.pomo();
        if before.is_active {
            let after = session::pause(&before, settings);
            save(&mut *self.store, keys::POMO, &after)?;
            self.accrue(&before, &after, now_ms)?;
        }
        Ok(())
    }

    /// Apply the pending transition after external confirmation
    pub fn confirm_pending(&mut self, now_ms: i64) -> Result<Option<GatedAction>, StoreError> {
        let Some(pending) = self.pending() else {
            return Ok(None);
        };
        self.store.set(keys::PENDING_TRANSITION, Value::Null);

        let settings = self.settings();
        match pending.action {
            GatedAction::Pause => self.pause_running(&settings, now_ms)?,
            GatedAction::Disable => self.disable(settings, now_ms)?,
        }
        info!("Confirmed pending {:?}", pending.action);
        Ok(Some(pending.action))
    }

    /// Drop the pending transition; returns whether there was one
    pub fn cancel_pending(&mut self) -> bool {
        if self.pending().is_none() {
            return false;
        }
        self.store.set(keys::PENDING_TRANSITION, Value::Null);
        true
    }

    /// One second of countdown; a disabled extension changes nothing
    pub fn tick(&mut self, now_ms: i64) -> Result<TickResult, StoreError> {
        let settings = self.settings();
        let raw: PomoState = load(&*self.store, keys::POMO);
        if !settings.enabled {
            return Ok(TickResult {
                state: raw,
                notice: None,
                completed_into: None,
            });
        }
        let mut notices: NoticeFlags = load(&*self.store, keys::POMO_NOTICES);
        let notices_before = notices;

        let result = session::tick(&raw, &settings, &mut notices);
        if result.state != raw {
            save(&mut *self.store, keys::POMO, &result.state)?;
        }
        if notices != notices_before {
            save(&mut *self.store, keys::POMO_NOTICES, &notices)?;
        }
        // A completed phase ran its countdown all the way to zero
        let mut closing = normalize(&raw, &settings);
        if result.completed_into.is_some() {
            closing.time_left = 0;
        }
        self.accrue(&closing, &result.state, now_ms)?;
        Ok(result)
    }

    pub fn switch_mode(&mut self, now_ms: i64) -> Result<PomoState, StoreError> {
        let settings = self.settings();
        let before = self.pomo();
        let mut notices: NoticeFlags = load(&*self.store, keys::POMO_NOTICES);

        let after = session::switch_mode(&before, &settings, &mut notices);
        save(&mut *self.store, keys::POMO, &after)?;
        save(&mut *self.store, keys::POMO_NOTICES, &notices)?;
        self.accrue(&before, &after, now_ms)?;
        Ok(after)
    }

    /// Credit or open focus intervals for a session transition
    ///
    /// Returns the hours credited when an interval closed.
    fn accrue(&mut self, before: &PomoState, after: &PomoState, now_ms: i64) -> Result<Option<f64>, StoreError> {
        let open: Option<FocusInterval> = load(&*self.store, keys::FOCUS_INTERVAL);

        match observe_transition(before, after, open.as_ref(), now_ms) {
            AccrualEvent::Opened(interval) => {
                save(&mut *self.store, keys::FOCUS_INTERVAL, &interval)?;
                Ok(None)
            }
            AccrualEvent::Closed { seconds } => {
                self.store.set(keys::FOCUS_INTERVAL, Value::Null);

                let today = local_date(now_ms);
                let mut ledger: DailyLedger = load(&*self.store, keys::DAILY_TIME_DATA);
                let hours = ledger.credit(today, seconds);
                save(&mut *self.store, keys::DAILY_TIME_DATA, &ledger)?;

                let mut metrics = self.metrics();
                metrics.focus_score = ledger.focus_score(today);
                save(&mut *self.store, keys::METRICS, &metrics)?;

                info!("Credited {:.0}s of focus to {}", seconds, today);
                Ok(Some(hours))
            }
            AccrualEvent::Unchanged => Ok(None),
        }
    }

    pub fn focus_score(&self, now_ms: i64) -> u32 {
        let ledger: DailyLedger = load(&*self.store, keys::DAILY_TIME_DATA);
        ledger.focus_score(local_date(now_ms))
    }

    // Tabs

    pub fn tab_activated(&mut self, tab_id: i32) -> Result<u32, StoreError> {
        let mut usage: TabUsage = load(&*self.store, keys::TAB_USAGE_COUNTS);
        let count = usage.record_activation(tab_id);
        save(&mut *self.store, keys::TAB_USAGE_COUNTS, &usage)?;
        Ok(count)
    }

    pub fn tab_removed(&mut self, tab_id: i32) -> Result<bool, StoreError> {
        let mut usage: TabUsage = load(&*self.store, keys::TAB_USAGE_COUNTS);
        if !usage.prune(tab_id) {
            return Ok(false);
        }
        save(&mut *self.store, keys::TAB_USAGE_COUNTS, &usage)?;
        Ok(true)
    }

    /// Recompute and store the tab census; cleared when the feature is off
    pub fn refresh_tab_summary(&mut self, tabs: &[TabInfo]) -> Result<Option<TabSummary>, StoreError> {
        let usage: TabUsage = load(&*self.store, keys::TAB_USAGE_COUNTS);
        let summary = compute_tab_summary(tabs, &self.settings(), &usage);
        save(&mut *self.store, keys::TAB_SUMMARY, &summary)?;
        Ok(summary)
    }

    pub fn record_tab_withered(&mut self) -> Result<u64, StoreError> {
        let mut metrics = self.metrics();
        let count = metrics.record_tab_withered();
        save(&mut *self.store, keys::METRICS, &metrics)?;
        Ok(count)
    }

    // Rules

    /// Read-modify-write of the rules and categories
    ///
    /// Refuses to run when either stored value is unreadable, so a parse
    /// failure never turns into an empty list written over the user's rules.
    fn edit_rules<T>(&mut self, edit: impl FnOnce(&mut RuleSet, &mut CategoryTable) -> T) -> Result<T, StoreError> {
        let mut rules: RuleSet = try_load_or(&*self.store, keys::BLOCKED_SITES, RuleSet::new)?;
        let mut categories = try_load_or(&*self.store, keys::CATEGORY_DEFINITIONS, CategoryTable::defaults)?;
        let result = edit(&mut rules, &mut categories);
        save(&mut *self.store, keys::BLOCKED_SITES, &rules)?;
        save(&mut *self.store, keys::CATEGORY_DEFINITIONS, &categories)?;
        Ok(result)
    }

    /// Add a domain rule, guessing its category when none is given
    pub fn add_site(&mut self, value: &str, list_type: ListType, category: Option<&str>) -> Result<Option<BlockedSite>, StoreError> {
        let category = match category {
            Some(category) => category.to_string(),
            None => suggest_category(&normalize_domain(value)).to_string(),
        };
        self.edit_rules(|rules, _| rules.add_site(value, list_type, Some(category.as_str())).cloned())
    }

    /// Quick-block; returns false when the domain was already blocked
    pub fn block_domain(&mut self, domain: &str) -> Result<bool, StoreError> {
        self.edit_rules(|rules, _| rules.block_domain(domain))
    }

    pub fn remove_rule(&mut self, id: &str) -> Result<bool, StoreError> {
        self.edit_rules(|rules, _| rules.remove(id))
    }

    pub fn rename_rule(&mut self, id: &str, new_name: &str) -> Result<bool, StoreError> {
        self.edit_rules(|rules, categories| rules.rename(id, new_name, categories))
    }

    pub fn reassign_list(&mut self, id: &str, list_type: ListType) -> Result<bool, StoreError> {
        self.edit_rules(|rules, _| rules.reassign_list(id, list_type))
    }

    pub fn merge_into_category(&mut self, dragged_id: &str, target_id: &str) -> Result<Option<String>, StoreError> {
        self.edit_rules(|rules, categories| rules.merge_into_category(dragged_id, target_id, categories))
    }

    pub fn split_out_of_category(&mut self, category_rule_id: &str, domain: &str) -> Result<Option<String>, StoreError> {
        self.edit_rules(|rules, categories| rules.split_out_of_category(category_rule_id, domain, categories))
    }

    pub fn domain_stats(&self) -> Vec<DomainStat> {
        let per_domain: Option<BTreeMap<String, u64>> = load(&*self.store, keys::DOMAIN_REDIRECT_COUNTS);
        domain_block_stats(&self.rules(), &self.categories(), per_domain.as_ref())
    }

    pub fn complete_onboarding(&mut self, prefs: &OnboardingPreferences, hardcore_mode: bool) -> Result<AppSettings, StoreError> {
        let settings = derive_onboarding_settings(&self.settings(), prefs, hardcore_mode);
        save(&mut *self.store, keys::SETTINGS, &settings)?;
        Ok(settings)
    }
}
