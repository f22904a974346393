/// StoicFocus - decision core for the focus extension
/// Built with Rust + WASM, driven by the extension's service worker

pub mod accrual;
pub mod analytics;
pub mod classifier;
pub mod conflicts;
pub mod doom;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod rules;
pub mod service;
pub mod session;
pub mod settings;
pub mod storage;
pub mod tabs;

use error::StoreError;
use rules::{CategoryTable, ListType, RuleSet};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use service::FocusService;
use storage::MemoryStore;
use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

/// Reply for store-backed calls: the result plus the keys to write back
#[derive(Serialize)]
struct Reply<T: Serialize> {
    result: T,
    changes: Map<String, Value>,
}

fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, StoreError> {
    Ok(serde_wasm_bindgen::from_value(value)?)
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    // Plain objects rather than JS Maps, so the host can hand them to chrome.storage
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|err| StoreError::from(err).into())
}

fn now_ms() -> i64 {
    js_sys::Date::now() as i64
}

/// Run one service call against a storage snapshot
fn with_service<T, F>(snapshot: JsValue, op: F) -> Result<JsValue, JsValue>
where
    T: Serialize,
    F: FnOnce(&mut FocusService<'_, MemoryStore>, i64) -> Result<T, StoreError>,
{
    let mut store = MemoryStore::from_snapshot(from_js(snapshot)?)?;
    let result = op(&mut FocusService::new(&mut store), now_ms())?;
    to_js(&Reply {
        result,
        changes: store.take_changes(),
    })
}

fn rules_from_js(sites: JsValue, categories: JsValue) -> Result<(RuleSet, CategoryTable), StoreError> {
    let sites: Option<RuleSet> = from_js(sites)?;
    let categories: Option<CategoryTable> = from_js(categories)?;
    Ok((sites.unwrap_or_default(), categories.unwrap_or_else(CategoryTable::defaults)))
}

// Pure helpers

#[wasm_bindgen]
pub fn normalize_domain(value: &str) -> String {
    domain::normalize_domain(value)
}

#[wasm_bindgen]
pub fn domains_match(candidate: &str, rule: &str) -> bool {
    domain::domains_match(candidate, rule)
}

#[wasm_bindgen]
pub fn classify_url(url: &str, sites: JsValue, categories: JsValue) -> Result<JsValue, JsValue> {
    let (rules, categories) = rules_from_js(sites, categories)?;
    to_js(&classifier::classify(url, &rules, &categories))
}

#[wasm_bindgen]
pub fn domain_conflicts(domain: &str, current_list: &str, sites: JsValue, categories: JsValue) -> Result<JsValue, JsValue> {
    let (rules, categories) = rules_from_js(sites, categories)?;
    to_js(&conflicts::domain_conflicts(domain, ListType::parse(current_list), &rules, &categories))
}

/// Badge text for a rule shown in `current_list`; empty when it has no conflicts
#[wasm_bindgen]
pub fn conflict_message(site: JsValue, current_list: &str, sites: JsValue, categories: JsValue) -> Result<String, JsValue> {
    let site: rules::BlockedSite = from_js(site)?;
    let (rules, categories) = rules_from_js(sites, categories)?;
    let current_list = ListType::parse(current_list);

    let found = conflicts::site_conflicts(&site, current_list, &rules, &categories);
    Ok(conflicts::build_conflict_message(current_list, &found).to_string())
}

#[wasm_bindgen]
pub fn site_has_conflicts(site: JsValue, current_list: &str, sites: JsValue, categories: JsValue) -> Result<bool, JsValue> {
    let site: rules::BlockedSite = from_js(site)?;
    let (rules, categories) = rules_from_js(sites, categories)?;
    Ok(conflicts::site_has_conflicts(&site, ListType::parse(current_list), &rules, &categories))
}

#[wasm_bindgen]
pub fn suggest_category(domain: &str) -> String {
    rules::suggest_category(domain).to_string()
}

#[wasm_bindgen]
pub fn category_label(key: &str, categories: JsValue) -> Result<String, JsValue> {
    let categories: Option<CategoryTable> = from_js(categories)?;
    Ok(analytics::category_label(key, &categories.unwrap_or_else(CategoryTable::defaults)))
}

#[wasm_bindgen]
pub fn format_time(seconds: i32) -> String {
    session::format_time(i64::from(seconds))
}

#[wasm_bindgen]
pub fn format_hours_minutes(hours: f64) -> String {
    analytics::format_hours_minutes(hours)
}

#[wasm_bindgen]
pub fn is_doom_scrolling(scroll_top: f64, viewport_height: f64, limit: u32) -> bool {
    doom::is_doom_scrolling(scroll_top, viewport_height, limit)
}

#[wasm_bindgen]
pub fn doom_alert(dismissed_once: bool) -> Result<JsValue, JsValue> {
    to_js(&doom::doom_alert(dismissed_once))
}

#[wasm_bindgen]
pub fn session_started_notice(mode: JsValue) -> Result<JsValue, JsValue> {
    let mode: session::PomoMode = from_js(mode)?;
    let (title, message) = session::session_started_notice(mode);
    to_js(&[title, message])
}

#[wasm_bindgen]
pub fn completion_message(next_mode: JsValue) -> Result<String, JsValue> {
    let next_mode: session::PomoMode = from_js(next_mode)?;
    Ok(session::completion_message(next_mode))
}

#[wasm_bindgen]
pub fn compute_tab_summary(tabs: JsValue, settings: JsValue, usage: JsValue) -> Result<JsValue, JsValue> {
    let tabs: Vec<tabs::TabInfo> = from_js(tabs)?;
    let settings: Option<settings::AppSettings> = from_js(settings)?;
    let usage: Option<tabs::TabUsage> = from_js(usage)?;
    to_js(&tabs::compute_tab_summary(&tabs, &settings.unwrap_or_default(), &usage.unwrap_or_default()))
}

// Store-backed calls: each takes the current storage snapshot

#[wasm_bindgen]
pub fn handle_navigation(snapshot: JsValue, url: String) -> Result<JsValue, JsValue> {
    with_service(snapshot, |service, now| service.handle_navigation(&url, now))
}

#[wasm_bindgen]
pub fn record_friction_overcome(snapshot: JsValue, domain: String) -> Result<JsValue, JsValue> {
    with_service(snapshot, |service, now| service.record_friction_overcome(&domain, now))
}

#[wasm_bindgen]
pub fn start_session(snapshot: JsValue, pre_mortem: Option<String>) -> Result<JsValue, JsValue> {
    with_service(snapshot, |service, now| service.start_session(pre_mortem.as_deref(), now))
}

#[wasm_bindgen]
pub fn request_pause(snapshot: JsValue) -> Result<JsValue, JsValue> {
    with_service(snapshot, |service, now| service.request_pause(now))
}

#[wasm_bindgen]
pub fn request_disable(snapshot: JsValue) -> Result<JsValue, JsValue> {
    with_service(snapshot, |service, now| service.request_disable(now))
}

#[wasm_bindgen]
pub fn confirm_pending(snapshot: JsValue) -> Result<JsValue, JsValue> {
    with_service(snapshot, |service, now| service.confirm_pending(now))
}

#[wasm_bindgen]
pub fn cancel_pending(snapshot: JsValue) -> Result<JsValue, JsValue> {
    with_service(snapshot, |service, _| Ok(service.cancel_pending()))
}

#[wasm_bindgen]
pub fn tick(snapshot: JsValue) -> Result<JsValue, JsValue> {
    with_service(snapshot, |service, now| service.tick(now))
}

#[wasm_bindgen]
pub fn switch_mode(snapshot: JsValue) -> Result<JsValue, JsValue> {
    with_service(snapshot, |service, now| service.switch_mode(now))
}

#[wasm_bindgen]
pub fn focus_score(snapshot: JsValue) -> Result<JsValue, JsValue> {
    with_service(snapshot, |service, now| Ok(service.focus_score(now)))
}

#[wasm_bindgen]
pub fn tab_activated(snapshot: JsValue, tab_id: i32) -> Result<JsValue, JsValue> {
    with_service(snapshot, |service, _| service.tab_activated(tab_id))
}

#[wasm_bindgen]
pub fn tab_removed(snapshot: JsValue, tab_id: i32) -> Result<JsValue, JsValue> {
    with_service(snapshot, |service, _| service.tab_removed(tab_id))
}

#[wasm_bindgen]
pub fn refresh_tab_summary(snapshot: JsValue, tabs: JsValue) -> Result<JsValue, JsValue> {
    let tabs: Vec<tabs::TabInfo> = from_js(tabs)?;
    with_service(snapshot, |service, _| service.refresh_tab_summary(&tabs))
}

#[wasm_bindgen]
pub fn record_tab_withered(snapshot: JsValue) -> Result<JsValue, JsValue> {
    with_service(snapshot, |service, _| service.record_tab_withered())
}

#[wasm_bindgen]
pub fn add_site(snapshot: JsValue, value: String, list_type: String, category: Option<String>) -> Result<JsValue, JsValue> {
    let list_type = ListType::parse(&list_type);
    with_service(snapshot, |service, _| service.add_site(&value, list_type, category.as_deref()))
}

#[wasm_bindgen]
pub fn block_domain(snapshot: JsValue, domain: String) -> Result<JsValue, JsValue> {
    with_service(snapshot, |service, _| service.block_domain(&domain))
}

#[wasm_bindgen]
pub fn remove_rule(snapshot: JsValue, id: String) -> Result<JsValue, JsValue> {
    with_service(snapshot, |service, _| service.remove_rule(&id))
}

#[wasm_bindgen]
pub fn rename_rule(snapshot: JsValue, id: String, new_name: String) -> Result<JsValue, JsValue> {
    with_service(snapshot, |service, _| service.rename_rule(&id, &new_name))
}

#[wasm_bindgen]
pub fn reassign_list(snapshot: JsValue, id: String, list_type: String) -> Result<JsValue, JsValue> {
    let list_type = ListType::parse(&list_type);
    with_service(snapshot, |service, _| service.reassign_list(&id, list_type))
}

#[wasm_bindgen]
pub fn merge_into_category(snapshot: JsValue, dragged_id: String, target_id: String) -> Result<JsValue, JsValue> {
    with_service(snapshot, |service, _| service.merge_into_category(&dragged_id, &target_id))
}

#[wasm_bindgen]
pub fn split_out_of_category(snapshot: JsValue, category_rule_id: String, domain: String) -> Result<JsValue, JsValue> {
    with_service(snapshot, |service, _| service.split_out_of_category(&category_rule_id, &domain))
}

#[wasm_bindgen]
pub fn domain_stats(snapshot: JsValue) -> Result<JsValue, JsValue> {
    with_service(snapshot, |service, _| Ok(service.domain_stats()))
}

#[wasm_bindgen]
pub fn complete_onboarding(snapshot: JsValue, prefs: JsValue, hardcore_mode: bool) -> Result<JsValue, JsValue> {
    let prefs: settings::OnboardingPreferences = from_js(prefs)?;
    with_service(snapshot, |service, _| service.complete_onboarding(&prefs, hardcore_mode))
}
