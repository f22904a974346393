use stoic_focus::accrual::{DailyLedger, local_date};
use stoic_focus::classifier::Verdict;
use stoic_focus::metrics::AppMetrics;
use stoic_focus::rules::{BlockedSite, CategoryTable, ListType, RuleSet};
use stoic_focus::service::{DisableDecision, FocusService, NavigationAction};
use stoic_focus::session::{GatedAction, PauseDecision, PomoMode, StartOutcome};
use stoic_focus::settings::AppSettings;
use stoic_focus::storage::{KeyValueStore, MemoryStore, keys, load, save};
use stoic_focus::tabs::TabInfo;
use serde_json::json;
use std::collections::BTreeMap;

// 2025-10-01, mid-morning UTC
const T0: i64 = 1_759_312_800_000;

fn store_with(settings: AppSettings, sites: Vec<BlockedSite>) -> MemoryStore {
    let mut store = MemoryStore::new();
    save(&mut store, keys::SETTINGS, &settings).unwrap();
    save(&mut store, keys::BLOCKED_SITES, &RuleSet::from_sites(sites)).unwrap();
    store.take_changes();
    store
}

fn hours_credited(store: &MemoryStore, now_ms: i64) -> f64 {
    let ledger: DailyLedger = load(store, keys::DAILY_TIME_DATA);
    ledger.hours_on(local_date(now_ms))
}

#[test]
fn test_blocked_navigation_records_hits() {
    let mut store = store_with(AppSettings::default(), vec![BlockedSite::domain_rule("reddit.com", ListType::Blocklist)]);

    let action = FocusService::new(&mut store)
        .handle_navigation("https://old.reddit.com/r/rust", T0)
        .unwrap();
    match action {
        NavigationAction::Block {
            domain,
            rule_id,
            domain_redirects,
        } => {
            assert_eq!(domain, "reddit.com");
            assert!(rule_id.is_some());
            assert_eq!(domain_redirects, 1);
        }
        other => panic!("expected block, got {:?}", other),
    }

    let rules: RuleSet = load(&store, keys::BLOCKED_SITES);
    assert_eq!(rules.sites[0].redirect_count, 1);
    let metrics: AppMetrics = load(&store, keys::METRICS);
    assert_eq!(metrics.interventions, 1);
    let per_domain: BTreeMap<String, u64> = load(&store, keys::DOMAIN_REDIRECT_COUNTS);
    assert_eq!(per_domain["reddit.com"], 1);
}

#[test]
fn test_disabled_or_internal_navigation_is_untouched() {
    let disabled = AppSettings {
        enabled: false,
        ..AppSettings::default()
    };
    let mut store = store_with(disabled, vec![BlockedSite::domain_rule("reddit.com", ListType::Blocklist)]);
    let action = FocusService::new(&mut store).handle_navigation("https://reddit.com", T0).unwrap();
    assert_eq!(
        action,
        NavigationAction::Allow {
            verdict: Verdict::Unrestricted
        }
    );
    assert!(store.take_changes().is_empty());

    let mut store = store_with(AppSettings::default(), vec![BlockedSite::domain_rule("extensions", ListType::Blocklist)]);
    let action = FocusService::new(&mut store).handle_navigation("chrome://extensions", T0).unwrap();
    assert_eq!(
        action,
        NavigationAction::Allow {
            verdict: Verdict::Unrestricted
        }
    );
    assert!(store.take_changes().is_empty());
}

#[test]
fn test_whitelisted_navigation_counts_nothing() {
    let mut store = store_with(AppSettings::default(), vec![BlockedSite::domain_rule("docs.rs", ListType::Whitelist)]);
    let action = FocusService::new(&mut store).handle_navigation("https://docs.rs/serde", T0).unwrap();

    assert_eq!(
        action,
        NavigationAction::Allow {
            verdict: Verdict::Whitelisted
        }
    );
    assert!(store.take_changes().is_empty());
}

#[test]
fn test_friction_unlock_expires() {
    let mut store = store_with(AppSettings::default(), vec![BlockedSite::domain_rule("youtube.com", ListType::Greylist)]);
    let url = "https://www.youtube.com/watch?v=1";

    let mut service = FocusService::new(&mut store);
    assert_eq!(
        service.handle_navigation(url, T0).unwrap(),
        NavigationAction::Challenge {
            domain: "youtube.com".to_string(),
            url: url.to_string(),
        }
    );

    let until_ms = service.record_friction_overcome("youtube.com", T0).unwrap();
    assert_eq!(until_ms, T0 + 10 * 60_000);
    assert_eq!(
        service.handle_navigation(url, T0 + 60_000).unwrap(),
        NavigationAction::Allow {
            verdict: Verdict::Friction
        }
    );
    assert!(matches!(service.handle_navigation(url, until_ms).unwrap(), NavigationAction::Challenge { .. }));
    assert_eq!(service.metrics().friction_overcome, 1);
    assert_eq!(service.metrics().interventions, 0);
}

#[test]
fn test_start_without_pre_mortem_changes_nothing() {
    let mut store = store_with(AppSettings::default(), vec![]);

    let outcome = FocusService::new(&mut store).start_session(None, T0).unwrap();
    assert_eq!(outcome, StartOutcome::PreMortemRequired);
    assert!(store.take_changes().is_empty());
}

#[test]
fn test_pause_credits_wall_clock_without_ticks() {
    let mut store = store_with(AppSettings::default(), vec![]);
    let paused_at = T0 + 125_000;

    {
        let mut service = FocusService::new(&mut store);
        assert!(matches!(service.start_session(Some("I will open Slack"), T0).unwrap(), StartOutcome::Started(_)));
        assert!(matches!(service.request_pause(paused_at).unwrap(), PauseDecision::Paused(_)));
        assert!(!service.pomo().is_active);
        assert!(service.pomo().pre_mortem_captured);
    }

    assert!((hours_credited(&store, paused_at) - 125.0 / 3600.0).abs() < 1e-9);
    assert_eq!(store.get(keys::FOCUS_INTERVAL), Some(serde_json::Value::Null));
    assert_eq!(store.get(keys::PRE_MORTEM_NOTE), Some(json!("I will open Slack")));
}

#[test]
fn test_hardcore_pause_waits_for_confirmation() {
    let settings = AppSettings {
        hardcore_mode: true,
        negative_visualization: false,
        ..AppSettings::default()
    };
    let mut store = store_with(settings, vec![]);
    let confirmed_at = T0 + 90_000;

    {
        let mut service = FocusService::new(&mut store);
        service.start_session(None, T0).unwrap();

        match service.request_pause(T0 + 30_000).unwrap() {
            PauseDecision::Pending(pending) => assert_eq!(pending.action, GatedAction::Pause),
            other => panic!("expected pending, got {:?}", other),
        }
        assert!(service.pomo().is_active);
        assert!(service.pending().is_some());

        assert_eq!(service.confirm_pending(confirmed_at).unwrap(), Some(GatedAction::Pause));
        assert!(!service.pomo().is_active);
        assert_eq!(service.pending(), None);
        assert_eq!(service.confirm_pending(confirmed_at).unwrap(), None);
    }

    assert!((hours_credited(&store, confirmed_at) - 90.0 / 3600.0).abs() < 1e-9);
}

#[test]
fn test_hardcore_disable_can_be_cancelled() {
    let settings = AppSettings {
        hardcore_mode: true,
        ..AppSettings::default()
    };
    let mut store = store_with(settings, vec![]);
    let mut service = FocusService::new(&mut store);

    assert!(matches!(service.request_disable(T0).unwrap(), DisableDecision::Pending(_)));
    assert!(service.settings().enabled);
    assert!(service.cancel_pending());
    assert!(!service.cancel_pending());

    service.request_disable(T0).unwrap();
    assert_eq!(service.confirm_pending(T0).unwrap(), Some(GatedAction::Disable));
    assert!(!service.settings().enabled);
    assert_eq!(service.request_disable(T0).unwrap(), DisableDecision::AlreadyDisabled);
}

#[test]
fn test_disable_without_hardcore_is_immediate() {
    let mut store = store_with(AppSettings::default(), vec![]);
    let mut service = FocusService::new(&mut store);

    assert_eq!(service.request_disable(T0).unwrap(), DisableDecision::Disabled);
    assert!(!service.settings().enabled);
}

#[test]
fn test_full_cycle_through_ticks() {
    let settings = AppSettings {
        focus_duration: 1,
        break_duration: 1,
        ..AppSettings::default()
    };
    let mut store = store_with(settings, vec![]);
    let mut notices = Vec::new();
    let focus_closed_at = T0 + 60_000;

    {
        let mut service = FocusService::new(&mut store);
        service.start_session(Some("Hacker News"), T0).unwrap();

        for second in 1..=60 {
            let result = service.tick(T0 + second * 1000).unwrap();
            notices.extend(result.notice);
            if second == 60 {
                assert_eq!(result.completed_into, Some(PomoMode::Break));
            }
        }

        let pomo = service.pomo();
        assert!(pomo.is_active);
        assert_eq!(pomo.mode, PomoMode::Break);
        assert_eq!(pomo.time_left, 60);
        assert!(pomo.pre_mortem_captured);
    }
    assert!((hours_credited(&store, focus_closed_at) - 60.0 / 3600.0).abs() < 1e-9);
    assert_eq!(notices, vec!["Rest begins in 10 seconds."]);

    {
        let mut service = FocusService::new(&mut store);
        for second in 61..=120 {
            service.tick(T0 + second * 1000).unwrap();
        }

        let pomo = service.pomo();
        assert!(pomo.is_active);
        assert_eq!(pomo.mode, PomoMode::Focus);
        assert!(!pomo.pre_mortem_captured);
    }
    // Break time is never credited
    assert!((hours_credited(&store, focus_closed_at) - 60.0 / 3600.0).abs() < 1e-9);
    assert!(store.get(keys::FOCUS_INTERVAL).is_some_and(|v| !v.is_null()));
}

#[test]
fn test_idle_tick_writes_nothing() {
    let mut store = store_with(AppSettings::default(), vec![]);
    save(&mut store, keys::POMO, &json!({"isActive": false, "mode": "focus", "timeLeft": 700})).unwrap();
    store.take_changes();

    let result = FocusService::new(&mut store).tick(T0).unwrap();
    assert_eq!(result.state.time_left, 700);
    assert!(store.take_changes().is_empty());
}

#[test]
fn test_switch_mode_closes_focus_interval() {
    let settings = AppSettings {
        negative_visualization: false,
        ..AppSettings::default()
    };
    let mut store = store_with(settings, vec![]);
    let switched_at = T0 + 300_000;

    {
        let mut service = FocusService::new(&mut store);
        service.start_session(None, T0).unwrap();
        let state = service.switch_mode(switched_at).unwrap();
        assert_eq!(state.mode, PomoMode::Break);
        assert!(state.is_active);
    }

    assert!((hours_credited(&store, switched_at) - 300.0 / 3600.0).abs() < 1e-9);
    let metrics: AppMetrics = load(&store, keys::METRICS);
    assert_eq!(metrics.focus_score, 1);
}

#[test]
fn test_tab_usage_and_summary() {
    let settings = AppSettings {
        memento_mori_enabled: true,
        tab_limit: 1,
        ..AppSettings::default()
    };
    let mut store = store_with(settings, vec![]);
    let mut service = FocusService::new(&mut store);

    service.tab_activated(7).unwrap();
    assert_eq!(service.tab_activated(7).unwrap(), 2);

    let tabs = vec![TabInfo::new(7, "https://a.com", "A", false), TabInfo::new(8, "https://b.com", "B", false)];
    let summary = service.refresh_tab_summary(&tabs).unwrap().unwrap();
    assert!(summary.over_limit);
    assert_eq!(summary.tabs[0].usage, 2);

    assert!(service.tab_removed(7).unwrap());
    assert!(!service.tab_removed(7).unwrap());
    assert_eq!(service.record_tab_withered().unwrap(), 1);
}

#[test]
fn test_tab_summary_cleared_when_memento_off() {
    let mut store = store_with(AppSettings::default(), vec![]);
    let summary = FocusService::new(&mut store)
        .refresh_tab_summary(&[TabInfo::new(1, "https://a.com", "A", false)])
        .unwrap();

    assert_eq!(summary, None);
    assert_eq!(store.get(keys::TAB_SUMMARY), Some(serde_json::Value::Null));
}

#[test]
fn test_rule_edits_persist() {
    let mut store = store_with(AppSettings::default(), vec![]);
    let mut service = FocusService::new(&mut store);

    let added = service.add_site("https://www.twitter.com/home", ListType::Greylist, None).unwrap().unwrap();
    assert_eq!(added.domain, "twitter.com");
    assert_eq!(added.category, "social");
    assert!(service.add_site("twitter.com", ListType::Greylist, None).unwrap().is_none());

    assert!(service.block_domain("news.ycombinator.com").unwrap());
    assert!(!service.block_domain("news.ycombinator.com").unwrap());

    assert!(service.reassign_list(&added.id, ListType::Blocklist).unwrap());
    assert_eq!(service.rules().get(&added.id).unwrap().list_type, ListType::Blocklist);

    assert!(service.remove_rule(&added.id).unwrap());
    assert_eq!(service.rules().sites.len(), 1);
    assert!(service.categories().contains("social"));
}

#[test]
fn test_merge_then_split() {
    let mut store = store_with(
        AppSettings::default(),
        vec![
            BlockedSite::domain_rule("a.com", ListType::Blocklist),
            BlockedSite::domain_rule("b.com", ListType::Blocklist),
        ],
    );
    let mut service = FocusService::new(&mut store);
    let ids: Vec<String> = service.rules().sites.iter().map(|s| s.id.clone()).collect();

    let key = service.merge_into_category(&ids[0], &ids[1]).unwrap().unwrap();
    let categories: CategoryTable = service.categories();
    assert_eq!(categories.members(&key), ["b.com".to_string(), "a.com".to_string()]);
    assert_eq!(service.rules().sites.len(), 1);

    let split_id = service.split_out_of_category(&ids[1], "a.com").unwrap().unwrap();
    assert_eq!(service.rules().get(&split_id).unwrap().domain, "a.com");
    assert_eq!(service.categories().members(&key), ["b.com".to_string()]);

    assert!(service.rename_rule(&ids[1], "reading").unwrap());
    assert!(service.categories().contains("reading"));
}

#[test]
fn test_domain_stats_prefer_per_domain_counts() {
    let mut store = store_with(AppSettings::default(), vec![BlockedSite::category_rule("social", ListType::Blocklist)]);
    let mut service = FocusService::new(&mut store);

    service.handle_navigation("https://x.com/home", T0).unwrap();
    service.handle_navigation("https://x.com/explore", T0).unwrap();
    service.handle_navigation("https://reddit.com", T0).unwrap();

    let stats: Vec<(String, u64)> = service.domain_stats().into_iter().map(|s| (s.domain, s.count)).collect();
    assert_eq!(stats, vec![("x.com".to_string(), 2), ("reddit.com".to_string(), 1)]);
}

#[test]
fn test_onboarding_writes_settings() {
    let mut store = store_with(AppSettings::default(), vec![]);
    let prefs = serde_json::from_value(json!({"enableMonochrome": true, "enableDoom": true, "doomLimit": 5})).unwrap();

    let settings = FocusService::new(&mut store).complete_onboarding(&prefs, true).unwrap();
    assert!(settings.monochrome_mode);
    assert!(settings.hardcore_mode);
    assert_eq!(settings.doom_scroll_limit, 5);

    let stored: AppSettings = load(&store, keys::SETTINGS);
    assert_eq!(stored, settings);
}

#[test]
fn test_rule_edit_keeps_rules_with_null_counts() {
    let mut store = store_with(AppSettings::default(), vec![]);
    store.set(
        keys::BLOCKED_SITES,
        json!([
            {"id": "r1", "domain": "reddit.com", "type": "domain", "category": "social", "listType": "blocklist", "redirectCount": 7},
            {"id": "x1", "domain": "x.com", "type": "domain", "category": "social", "listType": "blocklist", "redirectCount": null}
        ]),
    );

    let added = FocusService::new(&mut store)
        .add_site("news.ycombinator.com", ListType::Blocklist, None)
        .unwrap();
    assert!(added.is_some());

    let rules: RuleSet = load(&store, keys::BLOCKED_SITES);
    assert_eq!(rules.sites.len(), 3);
    assert_eq!(rules.get("r1").unwrap().redirect_count, 7);
    assert_eq!(rules.get("x1").unwrap().redirect_count, 0);
}

#[test]
fn test_rule_edit_never_overwrites_unreadable_rules() {
    let mut store = store_with(AppSettings::default(), vec![]);
    store.set(keys::BLOCKED_SITES, json!({"not": "a list"}));

    assert!(FocusService::new(&mut store).block_domain("reddit.com").is_err());
    assert_eq!(store.get(keys::BLOCKED_SITES), Some(json!({"not": "a list"})));
}

#[test]
fn test_disabled_tick_changes_nothing() {
    let disabled = AppSettings {
        enabled: false,
        ..AppSettings::default()
    };
    let mut store = store_with(disabled, vec![]);
    save(&mut store, keys::POMO, &json!({"isActive": true, "mode": "focus", "timeLeft": 100, "preMortemCaptured": true})).unwrap();
    store.take_changes();

    let result = FocusService::new(&mut store).tick(T0).unwrap();
    assert_eq!(result.state.time_left, 100);
    assert!(store.take_changes().is_empty());
}

#[test]
fn test_disable_pauses_running_session() {
    let settings = AppSettings {
        negative_visualization: false,
        ..AppSettings::default()
    };
    let mut store = store_with(settings, vec![]);
    let disabled_at = T0 + 200_000;

    {
        let mut service = FocusService::new(&mut store);
        service.start_session(None, T0).unwrap();
        assert_eq!(service.request_disable(disabled_at).unwrap(), DisableDecision::Disabled);
        assert!(!service.pomo().is_active);
        assert_eq!(service.tick(disabled_at + 1000).unwrap().state.time_left, service.pomo().time_left);
    }

    assert!((hours_credited(&store, disabled_at) - 200.0 / 3600.0).abs() < 1e-9);
}

#[test]
fn test_completion_credits_whole_countdown_when_clock_lags() {
    let settings = AppSettings {
        focus_duration: 1,
        negative_visualization: false,
        ..AppSettings::default()
    };
    let mut store = store_with(settings, vec![]);
    // Throttled host: sixty ticks delivered within one second
    let ticked_at = T0 + 1000;

    {
        let mut service = FocusService::new(&mut store);
        service.start_session(None, T0).unwrap();
        for _ in 0..60 {
            service.tick(ticked_at).unwrap();
        }
        assert_eq!(service.pomo().mode, PomoMode::Break);
    }

    assert!((hours_credited(&store, ticked_at) - 60.0 / 3600.0).abs() < 1e-9);
}
